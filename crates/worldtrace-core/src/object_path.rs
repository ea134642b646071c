//! The object path tracer.
//!
//! Records when objects enter and leave the observed set, how they move,
//! their sizes and their display properties. Output is one JSON array of
//! trace events, written while the session runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::info;
use worldtrace_events::{EventLog, Sink, TraceEvent};

use crate::config::TracerConfig;
use crate::mirror::ObjectGraphMirror;
use crate::session::Session;
use crate::tracer::{Tracer, TracerError};
use crate::world::WorldListener;

/// Tracer name used in logs and errors.
pub const OBJECT_PATH_TRACER: &str = "object_paths";

enum Output {
    File(PathBuf),
    /// Consumed by the first `start_trace`.
    Sink(Option<Sink>),
}

struct Running {
    log: Arc<EventLog>,
    mirror: Arc<ObjectGraphMirror>,
}

/// Tracer that mirrors the object graph into a trace log.
pub struct ObjectPathTracer {
    output: Output,
    camera_far: f32,
    running: Option<Running>,
}

impl core::fmt::Debug for ObjectPathTracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectPathTracer")
            .field("camera_far", &self.camera_far)
            .field("running", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

impl ObjectPathTracer {
    /// Tracer writing to the configured output file.
    pub fn from_config(config: &TracerConfig) -> Self {
        Self {
            output: Output::File(config.output_path.clone()),
            camera_far: config.camera_far,
            running: None,
        }
    }

    /// Tracer writing to an arbitrary sink.
    pub fn with_sink(sink: Sink, camera_far: f32) -> Self {
        Self {
            output: Output::Sink(Some(sink)),
            camera_far,
            running: None,
        }
    }

    /// The live mirror, while tracing.
    pub fn mirror(&self) -> Option<&Arc<ObjectGraphMirror>> {
        self.running.as_ref().map(|r| &r.mirror)
    }

    fn open_log(&mut self) -> Result<EventLog, TracerError> {
        let log = match &mut self.output {
            Output::File(path) => EventLog::create(path)?,
            Output::Sink(sink) => {
                let Some(sink) = sink.take() else {
                    return Err(TracerError::AlreadyRunning {
                        name: OBJECT_PATH_TRACER.to_owned(),
                    });
                };
                EventLog::from_sink(sink)?
            }
        };
        Ok(log)
    }
}

impl Tracer for ObjectPathTracer {
    fn name(&self) -> &str {
        OBJECT_PATH_TRACER
    }

    fn start_trace(&mut self, session: &Session) -> Result<(), TracerError> {
        if self.running.is_some() {
            return Err(TracerError::AlreadyRunning {
                name: OBJECT_PATH_TRACER.to_owned(),
            });
        }

        let log = Arc::new(self.open_log()?);
        let started_at = Instant::now();
        log.record(&TraceEvent::Started { time: Utc::now() })?;

        let client = session.client();
        let mirror = Arc::new(ObjectGraphMirror::new(
            Arc::clone(&log),
            Arc::clone(client),
            started_at,
        ));
        client.subscribe(Arc::clone(&mirror) as Arc<dyn WorldListener>);
        client.movement().set_draw_distance(self.camera_far);

        info!(tracer = OBJECT_PATH_TRACER, camera_far = self.camera_far, "Trace started");
        self.running = Some(Running { log, mirror });
        Ok(())
    }

    fn stop_trace(&mut self) -> Result<(), TracerError> {
        let Some(running) = self.running.take() else {
            return Err(TracerError::NotRunning {
                name: OBJECT_PATH_TRACER.to_owned(),
            });
        };
        running.log.finish()?;
        info!(
            tracer = OBJECT_PATH_TRACER,
            events = running.log.events_written(),
            live_objects = running.mirror.live_count(),
            "Trace stopped"
        );
        Ok(())
    }
}
