//! Scripted in-process world client.
//!
//! [`StubWorldClient`] implements [`WorldClient`] without any transport.
//! Login results are scripted, outbound requests are recorded, and tests
//! push notifications to subscribers with [`StubWorldClient::deliver`].
//! This allows the session, mirror and tracers to be exercised end to end
//! without a world to connect to.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use worldtrace_types::{Geometry, LocalId, ObservedObject, Quaternion, Vector3};

use crate::world::{
    LoginRequest, MovementHandle, WorldClient, WorldClientError, WorldListener, WorldNotification,
};

/// Message returned by unscripted successful logins.
pub const STUB_LOGIN_MESSAGE: &str = "Welcome to the stub world";

#[derive(Default)]
struct StubInner {
    login_script: VecDeque<Result<String, WorldClientError>>,
    logins: Vec<LoginRequest>,
    logouts: u64,
    listeners: Vec<Arc<dyn WorldListener>>,
    property_requests: Vec<LocalId>,
    geometry: Option<Geometry>,
    login_delay: Duration,
}

/// A world client whose behaviour is scripted by the caller.
pub struct StubWorldClient {
    inner: Mutex<StubInner>,
    movement: Arc<StubMovement>,
}

impl core::fmt::Debug for StubWorldClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StubWorldClient")
            .field("logins", &self.login_count())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl Default for StubWorldClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StubWorldClient {
    /// A client whose logins all succeed until scripted otherwise.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StubInner::default()),
            movement: Arc::new(StubMovement::default()),
        }
    }

    /// Queue the result of the next unscripted login.
    pub fn script_login(&self, result: Result<String, WorldClientError>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.login_script.push_back(result);
    }

    /// Queue a rejected login.
    pub fn script_rejection(&self, message: &str) {
        self.script_login(Err(WorldClientError::LoginRejected {
            message: message.to_owned(),
        }));
    }

    /// Block every later login for `delay` before it answers.
    pub fn set_login_delay(&self, delay: Duration) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.login_delay = delay;
    }

    /// Geometry returned for every object from now on.
    pub fn set_geometry(&self, geometry: Option<Geometry>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.geometry = geometry;
    }

    /// Push a notification to every subscriber, in subscription order.
    ///
    /// Listeners are called without the stub's lock held, so they may call
    /// back into the client.
    pub fn deliver(&self, notification: &WorldNotification) {
        let listeners = match self.inner.lock() {
            Ok(inner) => inner.listeners.clone(),
            Err(_poisoned) => return,
        };
        for listener in listeners {
            listener.on_notification(notification);
        }
    }

    /// Every login request received, oldest first.
    pub fn logins(&self) -> Vec<LoginRequest> {
        self.inner
            .lock()
            .map(|inner| inner.logins.clone())
            .unwrap_or_default()
    }

    /// Number of login attempts.
    pub fn login_count(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.logins.len())
    }

    /// Number of logouts.
    pub fn logout_count(&self) -> u64 {
        self.inner.lock().map_or(0, |inner| inner.logouts)
    }

    /// Every property request received, oldest first.
    pub fn property_requests(&self) -> Vec<LocalId> {
        self.inner
            .lock()
            .map(|inner| inner.property_requests.clone())
            .unwrap_or_default()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.listeners.len())
    }

    /// Last draw distance set through the movement handle.
    pub fn draw_distance(&self) -> Option<f32> {
        self.movement.draw_distance()
    }

    /// The recording movement handle.
    pub fn stub_movement(&self) -> Arc<StubMovement> {
        Arc::clone(&self.movement)
    }
}

impl WorldClient for StubWorldClient {
    fn login(&self, request: &LoginRequest) -> Result<String, WorldClientError> {
        let Ok(mut inner) = self.inner.lock() else {
            return Err(WorldClientError::Unreachable {
                message: String::from("stub poisoned"),
            });
        };
        inner.logins.push(request.clone());
        let result = inner
            .login_script
            .pop_front()
            .unwrap_or_else(|| Ok(STUB_LOGIN_MESSAGE.to_owned()));
        let delay = inner.login_delay;
        drop(inner);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        result
    }

    fn logout(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.logouts = inner.logouts.saturating_add(1);
    }

    fn subscribe(&self, listener: Arc<dyn WorldListener>) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.listeners.push(listener);
    }

    fn request_properties(&self, local_id: LocalId) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.property_requests.push(local_id);
    }

    fn request_geometry(&self, _object: &ObservedObject) -> Option<Geometry> {
        self.inner.lock().ok().and_then(|inner| inner.geometry.clone())
    }

    fn movement(&self) -> Arc<dyn MovementHandle> {
        Arc::clone(&self.movement) as Arc<dyn MovementHandle>
    }
}

#[derive(Debug, Default)]
struct MovementState {
    body_rotation: Option<Quaternion>,
    head_rotation: Option<Quaternion>,
    look_direction: Option<Vector3>,
    draw_distance: Option<f32>,
    updates_sent: u64,
}

/// Movement handle that records the last command of each kind.
#[derive(Debug, Default)]
pub struct StubMovement {
    state: Mutex<MovementState>,
}

impl StubMovement {
    /// Last body rotation set.
    pub fn body_rotation(&self) -> Option<Quaternion> {
        self.state.lock().ok().and_then(|s| s.body_rotation)
    }

    /// Last head rotation set.
    pub fn head_rotation(&self) -> Option<Quaternion> {
        self.state.lock().ok().and_then(|s| s.head_rotation)
    }

    /// Last camera direction set.
    pub fn look_direction(&self) -> Option<Vector3> {
        self.state.lock().ok().and_then(|s| s.look_direction)
    }

    /// Last draw distance set.
    pub fn draw_distance(&self) -> Option<f32> {
        self.state.lock().ok().and_then(|s| s.draw_distance)
    }

    /// Number of movement updates sent.
    pub fn updates_sent(&self) -> u64 {
        self.state.lock().map_or(0, |s| s.updates_sent)
    }
}

impl MovementHandle for StubMovement {
    fn set_body_rotation(&self, rotation: Quaternion) {
        if let Ok(mut s) = self.state.lock() {
            s.body_rotation = Some(rotation);
        }
    }

    fn set_head_rotation(&self, rotation: Quaternion) {
        if let Ok(mut s) = self.state.lock() {
            s.head_rotation = Some(rotation);
        }
    }

    fn look_direction(&self, direction: Vector3) {
        if let Ok(mut s) = self.state.lock() {
            s.look_direction = Some(direction);
        }
    }

    fn set_draw_distance(&self, meters: f32) {
        if let Ok(mut s) = self.state.lock() {
            s.draw_distance = Some(meters);
        }
    }

    fn send_update(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.updates_sent = s.updates_sent.saturating_add(1);
        }
    }
}
