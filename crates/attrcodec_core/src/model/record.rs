//! Record instance: attribute values plus dirty tracking.
//!
//! # Responsibility
//! - Hold one row's attribute values for a `ModelClass`.
//! - Track which attributes changed since the last load or save.
//!
//! # Invariants
//! - Only attributes declared on the model can be read or written.
//! - `set` marks an attribute changed only when the value actually differs.
//! - Records built from storage start with no changed attributes.

use crate::model::class::ModelClass;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Stable identifier of a persisted record.
pub type RecordId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    UnknownAttribute { model: String, attribute: String },
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute { model, attribute } => {
                write!(f, "unknown attribute `{attribute}` for model {model}")
            }
        }
    }
}

impl Error for RecordError {}

pub type RecordResult<T> = Result<T, RecordError>;

/// Serializable snapshot of a record for display and export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    pub model: String,
    pub id: Option<RecordId>,
    pub attributes: Map<String, Value>,
}

/// In-memory state captured before a save so a failed save can be undone.
#[derive(Debug, Clone)]
pub(crate) struct RecordState {
    id: Option<RecordId>,
    attributes: BTreeMap<String, Value>,
    changed: BTreeSet<String>,
}

/// One instance of a model.
#[derive(Debug, Clone)]
pub struct Record {
    class: Arc<ModelClass>,
    id: Option<RecordId>,
    attributes: BTreeMap<String, Value>,
    changed: BTreeSet<String>,
}

impl Record {
    /// Creates a new, unsaved record with every attribute set to `null`.
    pub fn new(class: Arc<ModelClass>) -> Self {
        let attributes = class
            .attributes()
            .iter()
            .map(|name| (name.clone(), Value::Null))
            .collect();
        Self {
            class,
            id: None,
            attributes,
            changed: BTreeSet::new(),
        }
    }

    /// Builds a record from raw column values read from storage.
    ///
    /// Columns the model does not declare are ignored; declared attributes
    /// missing from `raw` stay `null`.
    pub(crate) fn from_storage(
        class: Arc<ModelClass>,
        id: RecordId,
        raw: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let mut record = Self::new(class);
        record.id = Some(id);
        for (name, value) in raw {
            if let Some(slot) = record.attributes.get_mut(&name) {
                *slot = value;
            }
        }
        record
    }

    pub fn class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    /// Returns whether this record has never been saved.
    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    pub fn get(&self, attribute: &str) -> RecordResult<&Value> {
        self.attributes
            .get(attribute)
            .ok_or_else(|| self.unknown(attribute))
    }

    /// Writes an attribute and marks it changed when the value differs.
    pub fn set(&mut self, attribute: &str, value: Value) -> RecordResult<()> {
        match self.attributes.get_mut(attribute) {
            Some(slot) => {
                if *slot != value {
                    *slot = value;
                    self.changed.insert(attribute.to_string());
                }
                Ok(())
            }
            None => Err(self.unknown(attribute)),
        }
    }

    pub fn is_changed(&self, attribute: &str) -> RecordResult<bool> {
        if !self.attributes.contains_key(attribute) {
            return Err(self.unknown(attribute));
        }
        Ok(self.changed.contains(attribute))
    }

    /// Changed attribute names in sorted order.
    pub fn changed_attributes(&self) -> Vec<&str> {
        self.changed.iter().map(String::as_str).collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Resets the changed flag of one attribute.
    pub fn clear_changed(&mut self, attribute: &str) -> RecordResult<()> {
        if !self.attributes.contains_key(attribute) {
            return Err(self.unknown(attribute));
        }
        self.changed.remove(attribute);
        Ok(())
    }

    pub fn clear_all_changed(&mut self) {
        self.changed.clear();
    }

    /// Attribute values in model declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.class.attributes().iter().filter_map(|name| {
            self.attributes
                .get(name)
                .map(|value| (name.as_str(), value))
        })
    }

    pub fn view(&self) -> RecordView {
        RecordView {
            model: self.class.name().to_string(),
            id: self.id,
            attributes: self
                .values()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }

    pub(crate) fn assign_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub(crate) fn capture_state(&self) -> RecordState {
        RecordState {
            id: self.id,
            attributes: self.attributes.clone(),
            changed: self.changed.clone(),
        }
    }

    pub(crate) fn restore_state(&mut self, state: RecordState) {
        self.id = state.id;
        self.attributes = state.attributes;
        self.changed = state.changed;
    }

    fn unknown(&self, attribute: &str) -> RecordError {
        RecordError::UnknownAttribute {
            model: self.class.name().to_string(),
            attribute: attribute.to_string(),
        }
    }
}
