//! Shared type definitions for worldtrace.
//!
//! This crate holds the vocabulary every other worldtrace crate speaks:
//! object identities, spatial math values, and the observation payloads
//! the world client delivers.
//!
//! # Modules
//!
//! - [`ids`] -- Persistent [`GlobalId`] and per-connection [`LocalId`]
//! - [`geometry`] -- Vectors, quaternions, poses, bounds, vertex sets
//! - [`object`] -- Object kinds and observation snapshots

pub mod geometry;
pub mod ids;
pub mod object;

// Re-export all public types at crate root for convenience.
pub use geometry::{Bounds, Geometry, Pose, Quaternion, Vector3};
pub use ids::{GlobalId, LocalId};
pub use object::{ObjectKind, ObservedObject};
