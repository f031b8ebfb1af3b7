//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the record persistence contract used by model code.
//! - Isolate SQLite query details from hooks and codecs.
//!
//! # Invariants
//! - Lifecycle hooks run inside repository calls, never outside them.
//! - Repository APIs return semantic errors (`NotFound`, `SaveHalted`) in
//!   addition to DB transport errors.

pub mod record_repo;
