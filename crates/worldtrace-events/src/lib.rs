//! Structured trace log for worldtrace.
//!
//! The trace is one JSON array of event objects, written incrementally to
//! an append-only sink while the session runs. Nothing is buffered beyond
//! what the sink itself buffers.
//!
//! # Modules
//!
//! - [`writer`] -- [`JsonWriter`], the streaming nested-structure emitter
//! - [`value`] -- [`Scalar`] leaf values and string escaping
//! - [`event`] -- [`TraceEvent`], the event vocabulary and its encoding
//! - [`log`] -- [`EventLog`], the shared lock-guarded log

pub mod event;
pub mod log;
pub mod value;
pub mod writer;

pub use event::{TraceEvent, format_elapsed};
pub use log::{EventLog, EventLogError, MemorySink, Sink};
pub use value::Scalar;
pub use writer::{FrameKind, JsonWriter, WriterError};
