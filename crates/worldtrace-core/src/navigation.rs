//! Navigation policy contract.
//!
//! A policy steers the observing avatar. It is started once with the
//! session and a movement handle, then updated once per tick. Updates must
//! not block; any timing state a policy needs is its own.

use std::sync::Arc;

use crate::session::Session;
use crate::world::MovementHandle;

/// A pluggable avatar navigation strategy.
pub trait NavigationPolicy: Send {
    /// Human-readable policy name for logging.
    fn name(&self) -> &str;

    /// Called once before the first login.
    fn start(&mut self, session: &Session, movement: Arc<dyn MovementHandle>);

    /// Called once per tick for the configured duration.
    fn update(&mut self);
}

/// A policy that never moves the avatar.
#[derive(Debug, Default)]
pub struct StationaryPolicy {
    updates: u64,
}

impl StationaryPolicy {
    /// Create a new stationary policy.
    pub const fn new() -> Self {
        Self { updates: 0 }
    }

    /// Number of updates received so far.
    pub const fn updates(&self) -> u64 {
        self.updates
    }
}

impl NavigationPolicy for StationaryPolicy {
    fn name(&self) -> &str {
        "none"
    }

    fn start(&mut self, _session: &Session, _movement: Arc<dyn MovementHandle>) {}

    fn update(&mut self) {
        self.updates = self.updates.saturating_add(1);
    }
}
