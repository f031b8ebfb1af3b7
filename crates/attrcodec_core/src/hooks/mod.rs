//! Record lifecycle phases and ordered hook chains.
//!
//! # Responsibility
//! - Name the points in the load/save lifecycle where model code can run.
//! - Hold an explicit, ordered list of callables per phase.
//!
//! # Invariants
//! - Hooks run in chain order; the first `Halt` or error stops the chain.
//! - An empty chain is a no-op.

use crate::codec::CodecError;
use crate::model::record::{Record, RecordError};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Named point in a record's load/save lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecyclePhase {
    /// Record was just materialized from storage.
    AfterFind,
    /// Record is about to be written.
    BeforeSave,
    /// Record was written, transaction not yet committed.
    AfterSave,
}

impl LifecyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AfterFind => "after_find",
            Self::BeforeSave => "before_save",
            Self::AfterSave => "after_save",
        }
    }
}

impl Display for LifecyclePhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Stop the chain; during `BeforeSave` this also aborts the save.
    Halt,
}

#[derive(Debug)]
pub enum HookError {
    Codec {
        attribute: String,
        source: CodecError,
    },
    Record(RecordError),
    Message(String),
}

impl Display for HookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Codec { attribute, source } => {
                write!(f, "codec failed for attribute `{attribute}`: {source}")
            }
            Self::Record(err) => write!(f, "{err}"),
            Self::Message(message) => f.write_str(message),
        }
    }
}

impl Error for HookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec { source, .. } => Some(source),
            Self::Record(err) => Some(err),
            Self::Message(_) => None,
        }
    }
}

impl From<RecordError> for HookError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

pub type HookResult = Result<HookOutcome, HookError>;

/// Callable attached to a lifecycle phase.
pub type Hook = Arc<dyn Fn(&mut Record) -> HookResult + Send + Sync>;

/// Ordered hooks for one phase.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Hook>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook that runs after every hook already in the chain.
    pub fn push_back(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Prepends a hook that runs before every hook already in the chain.
    pub fn push_front(&mut self, hook: Hook) {
        self.hooks.insert(0, hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs hooks in order until one halts or fails.
    pub fn run(&self, record: &mut Record) -> HookResult {
        for hook in &self.hooks {
            if hook(record)? == HookOutcome::Halt {
                return Ok(HookOutcome::Halt);
            }
        }
        Ok(HookOutcome::Continue)
    }
}

impl Debug for HookChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("len", &self.hooks.len())
            .finish()
    }
}

/// Hook chains for every lifecycle phase of one model.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    after_find: HookChain,
    before_save: HookChain,
    after_save: HookChain,
}

impl HookRegistry {
    pub fn chain(&self, phase: LifecyclePhase) -> &HookChain {
        match phase {
            LifecyclePhase::AfterFind => &self.after_find,
            LifecyclePhase::BeforeSave => &self.before_save,
            LifecyclePhase::AfterSave => &self.after_save,
        }
    }

    pub fn chain_mut(&mut self, phase: LifecyclePhase) -> &mut HookChain {
        match phase {
            LifecyclePhase::AfterFind => &mut self.after_find,
            LifecyclePhase::BeforeSave => &mut self.before_save,
            LifecyclePhase::AfterSave => &mut self.after_save,
        }
    }

    pub fn run(&self, phase: LifecyclePhase, record: &mut Record) -> HookResult {
        self.chain(phase).run(record)
    }
}
