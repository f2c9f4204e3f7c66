//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode between argument parsing and
//! the end-of-run audit, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tinsel_core::ConfigError,
    },

    /// The workshop run failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: tinsel_core::RunnerError,
    },

    /// The run summary could not be serialized.
    #[error("failed to encode run summary: {source}")]
    Json {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The final tree broke an invariant.
    #[error("tree audit failed: {message}")]
    Audit {
        /// Description of the violations.
        message: String,
    },
}
