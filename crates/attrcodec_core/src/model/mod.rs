//! Model declarations and record instances.
//!
//! # Responsibility
//! - Define read-only model metadata shared by all records of a model.
//! - Define the in-memory record with explicit dirty tracking.
//!
//! # Invariants
//! - Model metadata is fixed once `ModelClassBuilder::build` returns.
//! - Records only expose attributes their model declares.

pub mod class;
pub mod record;
