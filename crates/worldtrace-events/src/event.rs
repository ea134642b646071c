//! The trace event vocabulary and its on-disk encoding.
//!
//! Each [`TraceEvent`] is written as one object in the top-level trace
//! array, discriminated by its `"event"` field. Identifiers are written in
//! their canonical string form, every floating point component is written
//! as a decimal string, and elapsed times are written as `"<ms>ms"`.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use worldtrace_types::{Bounds, GlobalId, LocalId, ObjectKind, Pose, Quaternion, Vector3};

use crate::writer::{JsonWriter, WriterError};

/// One entry of the trace log.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// The trace began.
    Started {
        /// Wall-clock start time.
        time: DateTime<Utc>,
    },
    /// An object was seen for the first time, or its parent changed.
    Add {
        /// Time since the trace started.
        elapsed: Duration,
        /// Object category.
        kind: ObjectKind,
        /// Persistent identity.
        id: GlobalId,
        /// Per-connection handle.
        local: LocalId,
        /// Parent's local handle, absent for root objects.
        parent_local: Option<LocalId>,
        /// Parent's persistent identity, when the parent is currently tracked.
        parent: Option<GlobalId>,
    },
    /// A motion update.
    Loc {
        /// Time since the trace started.
        elapsed: Duration,
        /// Persistent identity.
        id: GlobalId,
        /// New kinematic state.
        pose: Pose,
    },
    /// Geometry bounds were computed.
    Size {
        /// Time since the trace started.
        elapsed: Duration,
        /// Persistent identity.
        id: GlobalId,
        /// Object-space bounding box.
        bounds: Bounds,
    },
    /// Display properties were resolved.
    Properties {
        /// Time since the trace started.
        elapsed: Duration,
        /// Persistent identity.
        id: GlobalId,
        /// Display name.
        name: String,
        /// Free-form description.
        description: String,
    },
    /// The object left the observed set.
    Kill {
        /// Time since the trace started.
        elapsed: Duration,
        /// Persistent identity.
        id: GlobalId,
    },
}

impl TraceEvent {
    /// Value of the `"event"` discriminator.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Add { .. } => "add",
            Self::Loc { .. } => "loc",
            Self::Size { .. } => "size",
            Self::Properties { .. } => "properties",
            Self::Kill { .. } => "kill",
        }
    }

    /// The object this event is about, if any.
    pub const fn subject(&self) -> Option<GlobalId> {
        match self {
            Self::Started { .. } => None,
            Self::Add { id, .. }
            | Self::Loc { id, .. }
            | Self::Size { id, .. }
            | Self::Properties { id, .. }
            | Self::Kill { id, .. } => Some(*id),
        }
    }

    /// Emit this event as one complete object element.
    pub fn write_to<W: Write>(&self, w: &mut JsonWriter<W>) -> Result<(), WriterError> {
        w.begin_object()?;
        w.field("event", self.name())?;
        match self {
            Self::Started { time } => {
                w.field("time", time.to_rfc3339().as_str())?;
            }
            Self::Add {
                elapsed,
                kind,
                id,
                local,
                parent_local,
                parent,
            } => {
                w.field("time", format_elapsed(*elapsed).as_str())?;
                w.field("type", kind.as_str())?;
                w.field("id", id.to_string().as_str())?;
                w.field("local", local.to_string().as_str())?;
                if let Some(parent_local) = parent_local {
                    w.field("parent_local", parent_local.to_string().as_str())?;
                }
                if let Some(parent) = parent {
                    w.field("parent", parent.to_string().as_str())?;
                }
            }
            Self::Loc { elapsed, id, pose } => {
                w.field("id", id.to_string().as_str())?;
                w.field("time", format_elapsed(*elapsed).as_str())?;
                write_vector(w, "pos", pose.position)?;
                write_vector(w, "vel", pose.velocity)?;
                write_quaternion(w, "rot", pose.rotation)?;
                write_vector(w, "angvel", pose.angular_velocity)?;
            }
            Self::Size {
                elapsed,
                id,
                bounds,
            } => {
                w.field("id", id.to_string().as_str())?;
                w.field("time", format_elapsed(*elapsed).as_str())?;
                write_vector(w, "min", bounds.min)?;
                write_vector(w, "max", bounds.max)?;
            }
            Self::Properties {
                elapsed,
                id,
                name,
                description,
            } => {
                w.field("id", id.to_string().as_str())?;
                w.field("time", format_elapsed(*elapsed).as_str())?;
                w.field("name", name)?;
                w.field("description", description)?;
            }
            Self::Kill { elapsed, id } => {
                w.field("time", format_elapsed(*elapsed).as_str())?;
                w.field("id", id.to_string().as_str())?;
            }
        }
        w.end_object()
    }
}

/// Render an elapsed time as `"<milliseconds>ms"` with microsecond precision.
pub fn format_elapsed(elapsed: Duration) -> String {
    let micros = elapsed.subsec_micros().checked_rem(1000).unwrap_or(0);
    format!("{}.{micros:03}ms", elapsed.as_millis())
}

fn write_vector<W: Write>(w: &mut JsonWriter<W>, key: &str, v: Vector3) -> Result<(), WriterError> {
    w.begin_object_field(key)?;
    w.field("x", v.x.to_string().as_str())?;
    w.field("y", v.y.to_string().as_str())?;
    w.field("z", v.z.to_string().as_str())?;
    w.end_object()
}

fn write_quaternion<W: Write>(
    w: &mut JsonWriter<W>,
    key: &str,
    q: Quaternion,
) -> Result<(), WriterError> {
    w.begin_object_field(key)?;
    w.field("w", q.w.to_string().as_str())?;
    w.field("x", q.x.to_string().as_str())?;
    w.field("y", q.y.to_string().as_str())?;
    w.field("z", q.z.to_string().as_str())?;
    w.end_object()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::Value;
    use uuid::Uuid;

    use super::*;

    fn encode(event: &TraceEvent) -> Value {
        let mut w = JsonWriter::new(Vec::new());
        event.write_to(&mut w).unwrap();
        serde_json::from_slice(&w.close().unwrap()).unwrap()
    }

    fn gid(n: u128) -> GlobalId {
        GlobalId(Uuid::from_u128(n))
    }

    #[test]
    fn elapsed_format() {
        assert_eq!(format_elapsed(Duration::ZERO), "0.000ms");
        assert_eq!(format_elapsed(Duration::from_micros(1_523_417)), "1523.417ms");
        assert_eq!(format_elapsed(Duration::from_secs(2)), "2000.000ms");
    }

    #[test]
    fn add_without_parent_omits_parent_fields() {
        let v = encode(&TraceEvent::Add {
            elapsed: Duration::from_millis(5),
            kind: ObjectKind::Prim,
            id: gid(1),
            local: LocalId(7),
            parent_local: None,
            parent: None,
        });
        assert_eq!(v["event"], "add");
        assert_eq!(v["type"], "prim");
        assert_eq!(v["id"], gid(1).to_string());
        assert_eq!(v["local"], "7");
        assert_eq!(v["time"], "5.000ms");
        assert!(v.get("parent_local").is_none());
        assert!(v.get("parent").is_none());
    }

    #[test]
    fn add_with_parent_linkage() {
        let v = encode(&TraceEvent::Add {
            elapsed: Duration::ZERO,
            kind: ObjectKind::Attachment,
            id: gid(2),
            local: LocalId(9),
            parent_local: Some(LocalId(3)),
            parent: Some(gid(3)),
        });
        assert_eq!(v["parent_local"], "3");
        assert_eq!(v["parent"], gid(3).to_string());
    }

    #[test]
    fn loc_components_are_decimal_strings() {
        let pose = Pose {
            position: Vector3::new(1.0, 2.0, 3.5),
            velocity: Vector3::new(0.25, 0.0, -1.0),
            rotation: Quaternion::IDENTITY,
            angular_velocity: Vector3::ZERO,
        };
        let v = encode(&TraceEvent::Loc {
            elapsed: Duration::from_millis(10),
            id: gid(4),
            pose,
        });
        assert_eq!(v["pos"]["x"], "1");
        assert_eq!(v["pos"]["z"], "3.5");
        assert_eq!(v["vel"]["x"], "0.25");
        assert_eq!(v["rot"]["w"], "1");
        assert_eq!(v["angvel"]["y"], "0");
    }

    #[test]
    fn size_and_kill_and_properties() {
        let size = encode(&TraceEvent::Size {
            elapsed: Duration::ZERO,
            id: gid(5),
            bounds: Bounds {
                min: Vector3::new(-0.5, -0.5, -0.5),
                max: Vector3::new(0.5, 0.5, 0.5),
            },
        });
        assert_eq!(size["min"]["x"], "-0.5");
        assert_eq!(size["max"]["z"], "0.5");

        let kill = encode(&TraceEvent::Kill {
            elapsed: Duration::ZERO,
            id: gid(5),
        });
        assert_eq!(kill["event"], "kill");
        assert_eq!(kill["id"], gid(5).to_string());

        let props = encode(&TraceEvent::Properties {
            elapsed: Duration::ZERO,
            id: gid(5),
            name: String::from("Sign <welcome>"),
            description: String::from("it's \"here\""),
        });
        assert_eq!(props["name"], "Sign <welcome>");
        assert_eq!(props["description"], "it's \"here\"");
    }

    #[test]
    fn subjects() {
        let started = TraceEvent::Started { time: Utc::now() };
        assert_eq!(started.subject(), None);
        assert_eq!(started.name(), "started");
        let kill = TraceEvent::Kill {
            elapsed: Duration::ZERO,
            id: gid(6),
        };
        assert_eq!(kill.subject(), Some(gid(6)));
    }
}
