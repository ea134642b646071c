//! Static rotating navigation.
//!
//! The avatar stays where it logged in and turns about the vertical axis at
//! a fixed rate, sweeping its body, head and camera around the full circle
//! once per period so the whole surrounding region comes into view.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use worldtrace_core::config::NavigationConfig;
use worldtrace_core::navigation::NavigationPolicy;
use worldtrace_core::session::Session;
use worldtrace_core::world::MovementHandle;
use worldtrace_types::{Quaternion, Vector3};

/// Policy name in configuration.
pub const STATIC_ROTATING: &str = "static_rotating";

/// Stands still and turns once per period.
pub struct StaticRotatingPolicy {
    period: Duration,
    /// Heading in radians, in `[0, TAU)`.
    heading: f32,
    last_update: Option<Instant>,
    movement: Option<Arc<dyn MovementHandle>>,
}

impl core::fmt::Debug for StaticRotatingPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StaticRotatingPolicy")
            .field("period", &self.period)
            .field("heading", &self.heading)
            .finish_non_exhaustive()
    }
}

impl StaticRotatingPolicy {
    /// A policy completing one turn every `period`.
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            heading: 0.0,
            last_update: None,
            movement: None,
        }
    }

    /// A policy using the configured rotation period (at least one second).
    pub fn from_config(config: &NavigationConfig) -> Self {
        Self::new(Duration::from_secs(config.rotation_period_secs.max(1)))
    }

    /// Advance the heading by the share of a turn elapsed since the last update.
    fn advance(&mut self, now: Instant) -> f32 {
        let elapsed = self
            .last_update
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_update = Some(now);

        let period = self.period.as_secs_f32();
        if period > 0.0 {
            let turns = elapsed.as_secs_f32() / period;
            self.heading = turns.mul_add(TAU, self.heading).rem_euclid(TAU);
        }
        self.heading
    }

    fn face(&self, heading: f32) {
        let Some(movement) = &self.movement else {
            return;
        };
        let (sin, cos) = heading.sin_cos();
        let direction = Vector3::new(cos, sin, 0.0);
        let rotation = Quaternion::rotation_between(Vector3::UNIT_X, direction);
        movement.set_body_rotation(rotation);
        movement.set_head_rotation(rotation);
        movement.look_direction(direction);
        movement.send_update();
    }

    fn update_at(&mut self, now: Instant) {
        let heading = self.advance(now);
        debug!(heading, "Rotating view");
        self.face(heading);
    }
}

impl NavigationPolicy for StaticRotatingPolicy {
    fn name(&self) -> &str {
        STATIC_ROTATING
    }

    fn start(&mut self, _session: &Session, movement: Arc<dyn MovementHandle>) {
        self.movement = Some(movement);
        self.last_update = Some(Instant::now());
    }

    fn update(&mut self) {
        self.update_at(Instant::now());
    }
}
