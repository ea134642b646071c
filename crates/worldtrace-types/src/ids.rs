//! Identifier wrappers for remote world objects.
//!
//! Every remote object carries two identities:
//!
//! - a [`LocalId`], a small integer handle the world assigns per connection.
//!   It is only meaningful while that connection lasts and may be handed to
//!   an unrelated object after a reconnect.
//! - a [`GlobalId`], a persistent 128-bit identity that never changes and
//!   is never reused. All cross-event correlation in the trace log uses it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistent identity of a remote object, stable across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalId(pub Uuid);

impl GlobalId {
    /// The all-zero identity. A well-formed object never carries it.
    pub const NIL: Self = Self(Uuid::nil());

    /// Create a fresh random identity (used by simulated worlds and tests).
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Whether this is the all-zero identity.
    pub const fn is_nil(self) -> bool {
        self.0.is_nil()
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl core::fmt::Display for GlobalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for GlobalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<GlobalId> for Uuid {
    fn from(id: GlobalId) -> Self {
        id.0
    }
}

/// Per-connection handle of a remote object.
///
/// `LocalId(0)` is reserved: as a parent reference it means "no parent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u32);

impl LocalId {
    /// Parent reference of an object attached to nothing.
    pub const ROOT: Self = Self(0);

    /// Whether this id is the reserved root marker.
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }

    /// Return the raw integer value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for LocalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LocalId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
