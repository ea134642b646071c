//! Error types for the worldtrace binary.
//!
//! [`EngineError`] wraps every failure mode of startup and the session
//! run, so `main` can propagate with `?`.

/// Top-level error for the worldtrace binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: worldtrace_core::config::ConfigError,
    },

    /// The session run failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: worldtrace_core::runner::RunnerError,
    },

    /// The configured navigation policy does not exist.
    #[error("unknown navigation policy: {name}")]
    UnknownPolicy {
        /// The policy name from configuration.
        name: String,
    },
}
