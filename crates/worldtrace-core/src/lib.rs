//! Session orchestration and object graph mirroring for worldtrace.
//!
//! This crate connects to a world through the [`WorldClient`] contract,
//! mirrors the objects it reports, and keeps the session alive across
//! disconnects while a tick loop drives navigation.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `worldtrace.yaml` into
//!   strongly-typed structs.
//! - [`world`] -- [`WorldClient`] contract, login requests, and the
//!   notification vocabulary.
//! - [`mirror`] -- [`ObjectGraphMirror`], the lock-guarded local copy of
//!   the remote scene graph.
//! - [`bounds`] -- Geometry bounds computation.
//! - [`session`] -- [`Session`] and the reconnect state machine.
//! - [`control`] -- [`SessionControl`] operator stop flag.
//! - [`tracer`] -- [`Tracer`] contract.
//! - [`object_path`] -- [`ObjectPathTracer`], the trace log producer.
//! - [`navigation`] -- [`NavigationPolicy`] contract.
//! - [`runner`] -- The tick loop that drives a session end to end.
//! - [`stub`] -- [`StubWorldClient`] for running without a world.
//!
//! [`WorldClient`]: world::WorldClient
//! [`ObjectGraphMirror`]: mirror::ObjectGraphMirror
//! [`Session`]: session::Session
//! [`SessionControl`]: control::SessionControl
//! [`Tracer`]: tracer::Tracer
//! [`ObjectPathTracer`]: object_path::ObjectPathTracer
//! [`NavigationPolicy`]: navigation::NavigationPolicy
//! [`StubWorldClient`]: stub::StubWorldClient

pub mod bounds;
pub mod config;
pub mod control;
pub mod mirror;
pub mod navigation;
pub mod object_path;
pub mod runner;
pub mod session;
pub mod stub;
pub mod tracer;
pub mod world;
