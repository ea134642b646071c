//! Tracer contract.
//!
//! A tracer records one aspect of a session to its own output. The runner
//! starts every registered tracer before the first login and stops them,
//! in registration order, after logout.

use worldtrace_events::EventLogError;

use crate::session::Session;

/// Errors raised while starting or stopping a tracer.
#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    /// The trace log could not be opened, written or closed.
    #[error("trace log error: {source}")]
    Log {
        /// The underlying log error.
        #[from]
        source: EventLogError,
    },

    /// `stop_trace` was called on a tracer that was never started.
    #[error("tracer {name} is not running")]
    NotRunning {
        /// Name of the tracer.
        name: String,
    },

    /// `start_trace` was called on a tracer that is already running.
    #[error("tracer {name} is already running")]
    AlreadyRunning {
        /// Name of the tracer.
        name: String,
    },
}

/// A recorder attached to a session.
pub trait Tracer: Send {
    /// Human-readable tracer name for logging.
    fn name(&self) -> &str;

    /// Begin recording. Called once, before the first login.
    fn start_trace(&mut self, session: &Session) -> Result<(), TracerError>;

    /// Finish recording and release the output.
    fn stop_trace(&mut self) -> Result<(), TracerError>;
}
