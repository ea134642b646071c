//! Shared, append-only trace log.
//!
//! [`EventLog`] owns one [`JsonWriter`] behind a mutex. The top-level array
//! is opened on creation and closed by [`EventLog::finish`]. Each call to
//! [`EventLog::record`] holds the lock for the full emission of one event,
//! so events produced concurrently on different notification threads never
//! interleave their fields.
//!
//! A sink failure in the middle of an event leaves a partial element in the
//! output. The log is then corrupted: later records and the final
//! [`EventLog::finish`] return [`EventLogError::Corrupted`] instead of
//! writing past the damage.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::event::TraceEvent;
use crate::writer::{JsonWriter, WriterError};

/// Boxed sink type the log writes to.
pub type Sink = Box<dyn Write + Send>;

/// Errors raised by the shared trace log.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// The output file could not be created.
    #[error("failed to open trace output {path}: {source}")]
    Open {
        /// Path that was being created.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Emitting to the sink failed.
    #[error("trace writer error: {source}")]
    Writer {
        /// The underlying writer error.
        #[from]
        source: WriterError,
    },

    /// The log was already finished.
    #[error("trace log is closed")]
    Closed,

    /// An earlier write failed part way through an event.
    #[error("trace log is corrupted by an earlier write failure")]
    Corrupted,

    /// A writer panicked while holding the lock.
    #[error("trace log lock poisoned")]
    Poisoned,
}

/// Writer state guarded by the log's lock.
struct LogState {
    /// `None` once finished.
    writer: Option<JsonWriter<Sink>>,
    /// Set by the first failed record.
    corrupted: bool,
}

/// Append-only, thread-safe trace log.
pub struct EventLog {
    state: Mutex<LogState>,
    /// Number of events successfully written.
    events_written: AtomicU64,
}

impl core::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventLog")
            .field("events_written", &self.events_written())
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Create (truncating) the file at `path` and open the top-level array.
    pub fn create(path: &Path) -> Result<Self, EventLogError> {
        let file = File::create(path).map_err(|source| EventLogError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_sink(Box::new(BufWriter::new(file)))
    }

    /// Open the top-level array on an arbitrary sink.
    pub fn from_sink(sink: Sink) -> Result<Self, EventLogError> {
        let mut writer = JsonWriter::new(sink);
        writer.begin_array()?;
        Ok(Self {
            state: Mutex::new(LogState {
                writer: Some(writer),
                corrupted: false,
            }),
            events_written: AtomicU64::new(0),
        })
    }

    /// Append one event as a single uninterrupted emission.
    ///
    /// The first sink failure is returned as [`EventLogError::Writer`];
    /// every later call returns [`EventLogError::Corrupted`].
    pub fn record(&self, event: &TraceEvent) -> Result<(), EventLogError> {
        let mut guard = self.state.lock().map_err(|_poisoned| EventLogError::Poisoned)?;
        let state = &mut *guard;
        let writer = state.writer.as_mut().ok_or(EventLogError::Closed)?;
        if state.corrupted {
            return Err(EventLogError::Corrupted);
        }
        if let Err(e) = event.write_to(writer) {
            state.corrupted = true;
            tracing::error!(
                event = event.name(),
                open_frames = writer.depth(),
                error = %e,
                "Trace write failed mid-event, log marked corrupted"
            );
            return Err(e.into());
        }
        self.events_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Close the top-level array and flush the sink.
    ///
    /// Finishing an already finished log is a no-op. A corrupted log is
    /// flushed as is and reported as [`EventLogError::Corrupted`].
    pub fn finish(&self) -> Result<(), EventLogError> {
        let mut guard = self.state.lock().map_err(|_poisoned| EventLogError::Poisoned)?;
        let Some(mut writer) = guard.writer.take() else {
            return Ok(());
        };
        if guard.corrupted {
            writer.close()?;
            return Err(EventLogError::Corrupted);
        }
        writer.end_array()?;
        writer.close()?;
        Ok(())
    }

    /// Whether [`finish`](Self::finish) has run.
    pub fn is_finished(&self) -> bool {
        self.state.lock().map_or(true, |guard| guard.writer.is_none())
    }

    /// Whether a failed write has left a partial event in the output.
    pub fn is_corrupted(&self) -> bool {
        self.state.lock().map_or(true, |guard| guard.corrupted)
    }

    /// Number of events written so far.
    pub fn events_written(&self) -> u64 {
        self.events_written.load(Ordering::Relaxed)
    }
}

/// Cloneable in-memory sink, for inspecting trace output without a file.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut inner = self
            .buffer
            .lock()
            .map_err(|_poisoned| std::io::Error::other("memory sink poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::Value;
    use worldtrace_types::{GlobalId, LocalId, ObjectKind, Pose};

    use super::*;

    fn log_with_sink() -> (Arc<EventLog>, MemorySink) {
        let sink = MemorySink::new();
        let log = EventLog::from_sink(Box::new(sink.clone())).unwrap();
        (Arc::new(log), sink)
    }

    #[test]
    fn finished_log_is_a_json_array() {
        let (log, sink) = log_with_sink();
        log.record(&TraceEvent::Started { time: Utc::now() }).unwrap();
        log.finish().unwrap();
        let parsed: Value = serde_json::from_str(&sink.contents()).unwrap();
        let events = parsed.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "started");
        assert_eq!(log.events_written(), 1);
    }

    #[test]
    fn record_after_finish_is_rejected() {
        let (log, _sink) = log_with_sink();
        log.finish().unwrap();
        assert!(log.is_finished());
        let err = log.record(&TraceEvent::Kill {
            elapsed: Duration::ZERO,
            id: GlobalId::new_random(),
        });
        assert!(matches!(err, Err(EventLogError::Closed)));
        // Second finish is a no-op.
        assert!(log.finish().is_ok());
    }

    /// Sink that accepts a fixed number of writes, then fails until the
    /// budget is raised again.
    #[derive(Clone)]
    struct FlakySink {
        inner: MemorySink,
        writes_left: Arc<AtomicU64>,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let allowed = self
                .writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !allowed {
                return Err(std::io::Error::other("disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn kill_event() -> TraceEvent {
        TraceEvent::Kill {
            elapsed: Duration::from_millis(5),
            id: GlobalId::new_random(),
        }
    }

    #[test]
    fn failed_write_mid_event_corrupts_the_log() {
        let sink = FlakySink {
            inner: MemorySink::new(),
            writes_left: Arc::new(AtomicU64::new(4)),
        };
        let log = EventLog::from_sink(Box::new(sink.clone())).unwrap();

        // The opening bracket took one write; the event dies part way.
        let first = log.record(&kill_event());
        assert!(matches!(first, Err(EventLogError::Writer { .. })));
        assert!(log.is_corrupted());

        // The sink recovers, but the log must not write past the damage.
        sink.writes_left.store(1000, Ordering::SeqCst);
        assert!(matches!(log.record(&kill_event()), Err(EventLogError::Corrupted)));
        assert_eq!(log.events_written(), 0);

        let before = sink.inner.contents();
        assert!(matches!(log.finish(), Err(EventLogError::Corrupted)));
        assert_eq!(sink.inner.contents(), before);
        assert!(log.is_finished());
        assert!(matches!(log.record(&kill_event()), Err(EventLogError::Closed)));
    }

    #[test]
    fn concurrent_producers_never_interleave_fields() {
        let (log, sink) = log_with_sink();
        let mut handles = Vec::new();
        for t in 0..8_u32 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for i in 0..50_u32 {
                    let event = if i % 2 == 0 {
                        TraceEvent::Add {
                            elapsed: Duration::from_millis(u64::from(i)),
                            kind: ObjectKind::Prim,
                            id: GlobalId::new_random(),
                            local: LocalId(t * 1000 + i),
                            parent_local: Some(LocalId(t)),
                            parent: None,
                        }
                    } else {
                        TraceEvent::Loc {
                            elapsed: Duration::from_millis(u64::from(i)),
                            id: GlobalId::new_random(),
                            pose: Pose::default(),
                        }
                    };
                    log.record(&event).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        log.finish().unwrap();

        let parsed: Value = serde_json::from_str(&sink.contents()).unwrap();
        let events = parsed.as_array().unwrap();
        assert_eq!(events.len(), 400);
        for event in events {
            match event["event"].as_str().unwrap() {
                "add" => {
                    assert!(event.get("local").is_some());
                    assert!(event.get("pos").is_none());
                }
                "loc" => {
                    assert!(event["rot"].get("w").is_some());
                    assert!(event.get("local").is_none());
                }
                other => panic!("unexpected event {other}"),
            }
        }
    }
}
