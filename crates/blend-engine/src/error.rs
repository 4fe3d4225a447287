//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup, one-shot runs and serving.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: blend_core::ConfigError,
    },

    /// The dataset file could not be read or parsed.
    #[error("dataset error: {message}")]
    Dataset {
        /// Description of the dataset failure.
        message: String,
    },

    /// The blend run failed.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: blend_core::BlendError,
    },

    /// The HTTP server failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: blend_observer::ServerError,
    },
}
