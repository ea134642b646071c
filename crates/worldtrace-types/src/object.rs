//! Observation payloads describing remote objects.

use serde::{Deserialize, Serialize};

use crate::geometry::{Pose, Vector3};
use crate::ids::{GlobalId, LocalId};

/// Category of a remote object, fixed when it is first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A user-controlled avatar.
    Avatar,
    /// An inanimate primitive object placed in the world.
    Prim,
    /// An object attached to an avatar.
    Attachment,
}

impl ObjectKind {
    /// Name written to the `type` field of `add` events.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::Prim => "prim",
            Self::Attachment => "attachment",
        }
    }
}

impl core::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a remote object as carried by an observation notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedObject {
    /// Per-connection handle.
    pub local_id: LocalId,
    /// Persistent identity.
    pub global_id: GlobalId,
    /// Parent's local handle at the time of the notification; root when unattached.
    #[serde(default)]
    pub parent_local_id: LocalId,
    /// Kinematic state carried with the notification.
    #[serde(default)]
    pub pose: Pose,
    /// Object scale, used by geometry approximation.
    #[serde(default = "unit_scale")]
    pub scale: Vector3,
    /// Display name when the world delivers it inline (avatars only).
    #[serde(default)]
    pub name: Option<String>,
}

impl ObservedObject {
    /// Minimal observation with no parent, default pose and unit scale.
    pub const fn new(local_id: LocalId, global_id: GlobalId) -> Self {
        Self {
            local_id,
            global_id,
            parent_local_id: LocalId::ROOT,
            pose: Pose {
                position: Vector3::ZERO,
                velocity: Vector3::ZERO,
                rotation: crate::geometry::Quaternion::IDENTITY,
                angular_velocity: Vector3::ZERO,
            },
            scale: Vector3::new(1.0, 1.0, 1.0),
            name: None,
        }
    }

    /// Builder-style parent assignment.
    #[must_use]
    pub fn with_parent(mut self, parent: LocalId) -> Self {
        self.parent_local_id = parent;
        self
    }

    /// Builder-style inline name assignment.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

const fn unit_scale() -> Vector3 {
    Vector3::new(1.0, 1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_trace_vocabulary() {
        assert_eq!(ObjectKind::Avatar.as_str(), "avatar");
        assert_eq!(ObjectKind::Prim.to_string(), "prim");
        assert_eq!(ObjectKind::Attachment.as_str(), "attachment");
    }

    #[test]
    fn observation_builders() {
        let obj = ObservedObject::new(LocalId(7), GlobalId::new_random())
            .with_parent(LocalId(3))
            .with_name("Visitor");
        assert_eq!(obj.parent_local_id, LocalId(3));
        assert_eq!(obj.name.as_deref(), Some("Visitor"));
    }
}
