//! Model class metadata and its one-shot builder.
//!
//! # Responsibility
//! - Declare a model's table, attributes, lifecycle hooks and codec
//!   registrations once, at definition time.
//! - Freeze that metadata behind an `Arc` shared by every record.
//!
//! # Invariants
//! - A built `ModelClass` is never mutated.
//! - Table and attribute names are plain SQL identifiers; `id` is reserved.
//! - An attribute is covered by at most one codec registration.
//! - A model extending another inherits its table, attributes, hooks and
//!   codec registrations.

use crate::codec::registrar;
use crate::codec::{AttributeCodec, CodecOptions};
use crate::hooks::{HookRegistry, HookResult, LifecyclePhase};
use crate::model::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Column name used for the record primary key.
pub const ID_COLUMN: &str = "id";

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier regex must compile")
});

/// Returns whether `name` can be used as a table or column name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidIdentifier { kind: &'static str, value: String },
    ReservedAttribute(String),
    DuplicateAttribute(String),
    /// Attribute named by more than one `custom_serialize` registration.
    DuplicateCodec(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { kind, value } => {
                write!(f, "invalid {kind} name `{value}`")
            }
            Self::ReservedAttribute(name) => write!(f, "attribute name `{name}` is reserved"),
            Self::DuplicateAttribute(name) => write!(f, "attribute `{name}` declared twice"),
            Self::DuplicateCodec(name) => {
                write!(f, "attribute `{name}` already has a codec registered")
            }
        }
    }
}

impl Error for ModelError {}

/// Attributes sharing one codec pair.
#[derive(Debug, Clone)]
pub struct CodecRegistration {
    pub attributes: Vec<String>,
    pub codec: Arc<AttributeCodec>,
}

/// Read-only metadata for one model.
#[derive(Debug)]
pub struct ModelClass {
    name: String,
    table: String,
    parent: Option<String>,
    attributes: Vec<String>,
    hooks: HookRegistry,
    codecs: Vec<CodecRegistration>,
}

impl ModelClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Name of the model this one extends, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|name| name == attribute)
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn codec_registrations(&self) -> &[CodecRegistration] {
        &self.codecs
    }

    /// Returns the codec applied to `attribute`, if one is registered.
    pub fn codec_for(&self, attribute: &str) -> Option<&AttributeCodec> {
        self.codecs
            .iter()
            .find(|registration| registration.attributes.iter().any(|name| name == attribute))
            .map(|registration| registration.codec.as_ref())
    }
}

/// Collects a model declaration and validates it on `build`.
#[derive(Debug, Clone)]
pub struct ModelClassBuilder {
    name: String,
    table: String,
    parent: Option<String>,
    attributes: Vec<String>,
    hooks: HookRegistry,
    codecs: Vec<CodecRegistration>,
}

impl ModelClassBuilder {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            parent: None,
            attributes: Vec::new(),
            hooks: HookRegistry::default(),
            codecs: Vec::new(),
        }
    }

    /// Starts a model that shares `parent`'s table and inherits its
    /// attributes, hooks and codec registrations.
    pub fn extends(name: impl Into<String>, parent: &ModelClass) -> Self {
        Self {
            name: name.into(),
            table: parent.table.clone(),
            parent: Some(parent.name.clone()),
            attributes: parent.attributes.clone(),
            hooks: parent.hooks.clone(),
            codecs: parent.codecs.clone(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Appends a hook run after a record is loaded.
    pub fn after_find<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> HookResult + Send + Sync + 'static,
    {
        self.hook(LifecyclePhase::AfterFind, hook)
    }

    /// Appends a hook run before a record is written. Returning
    /// `HookOutcome::Halt` aborts the save.
    pub fn before_save<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> HookResult + Send + Sync + 'static,
    {
        self.hook(LifecyclePhase::BeforeSave, hook)
    }

    /// Appends a hook run after a record is written.
    pub fn after_save<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Record) -> HookResult + Send + Sync + 'static,
    {
        self.hook(LifecyclePhase::AfterSave, hook)
    }

    pub fn hook<F>(mut self, phase: LifecyclePhase, hook: F) -> Self
    where
        F: Fn(&mut Record) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.chain_mut(phase).push_back(Arc::new(hook));
        self
    }

    /// Stores `attributes` through a custom codec.
    ///
    /// Attribute names are not checked here; an unknown name fails when one
    /// of the installed hooks runs.
    pub fn custom_serialize<I, S>(mut self, attributes: I, options: CodecOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registration = CodecRegistration {
            attributes: attributes.into_iter().map(Into::into).collect(),
            codec: Arc::new(options.into_codec()),
        };
        registrar::install(&mut self.hooks, &registration);
        self.codecs.push(registration);
        self
    }

    pub fn build(self) -> Result<Arc<ModelClass>, ModelError> {
        if !is_valid_identifier(&self.table) {
            return Err(ModelError::InvalidIdentifier {
                kind: "table",
                value: self.table,
            });
        }

        let mut seen = BTreeSet::new();
        for attribute in &self.attributes {
            if !is_valid_identifier(attribute) {
                return Err(ModelError::InvalidIdentifier {
                    kind: "attribute",
                    value: attribute.clone(),
                });
            }
            if attribute.eq_ignore_ascii_case(ID_COLUMN) {
                return Err(ModelError::ReservedAttribute(attribute.clone()));
            }
            if !seen.insert(attribute.to_ascii_lowercase()) {
                return Err(ModelError::DuplicateAttribute(attribute.clone()));
            }
        }

        // Stacked codecs would decode or encode an already converted value.
        let mut covered = BTreeSet::new();
        for attribute in self.codecs.iter().flat_map(|codec| &codec.attributes) {
            if !covered.insert(attribute.to_ascii_lowercase()) {
                return Err(ModelError::DuplicateCodec(attribute.clone()));
            }
        }

        Ok(Arc::new(ModelClass {
            name: self.name,
            table: self.table,
            parent: self.parent,
            attributes: self.attributes,
            hooks: self.hooks,
            codecs: self.codecs,
        }))
    }
}
