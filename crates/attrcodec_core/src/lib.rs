//! Per-attribute codecs applied around record persistence.
//!
//! A model declares which attributes are stored in a serialized form and
//! the codec used for them; records then expose structured values while the
//! database keeps the encoded column text.

pub mod codec;
pub mod db;
pub mod hooks;
pub mod logging;
pub mod model;
pub mod repo;

pub use codec::builtin::comma_separated_integers;
pub use codec::{AttributeCodec, CodecError, CodecOptions, CodecResult};
pub use hooks::{Hook, HookChain, HookError, HookOutcome, HookRegistry, HookResult, LifecyclePhase};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::class::{CodecRegistration, ModelClass, ModelClassBuilder, ModelError};
pub use model::record::{Record, RecordError, RecordId, RecordView};
pub use repo::record_repo::{RecordRepository, RepoError, RepoResult, SqliteRecordRepository};
pub use serde_json::Value;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
