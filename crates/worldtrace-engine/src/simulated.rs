//! Offline simulated world.
//!
//! [`SimulatedWorld`] implements [`WorldClient`] without a network. After
//! the first login a background thread owns a small random scene of
//! avatars, prims and attachments. Each step it spawns, moves and kills
//! objects and answers property requests, delivering the results to the
//! subscribed listeners the same way a real client's dispatch threads do.
//!
//! Connection behaviour is simulated too. The world occasionally drops the
//! connection, and every login after the first may be rejected at random.
//! A new connection hands out fresh local ids and re-announces the whole
//! scene, parents before children.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace, warn};
use worldtrace_core::world::{
    LoginRequest, MovementHandle, WorldClient, WorldClientError, WorldListener, WorldNotification,
};
use worldtrace_types::{
    GlobalId, Geometry, LocalId, ObjectKind, ObservedObject, Pose, Quaternion, Vector3,
};

/// Side length of the simulated region in meters.
const REGION_SIZE: f32 = 256.0;

/// Name pool for simulated objects.
const NAMES: &[&str] = &[
    "Crate", "Lamp", "Bench", "Tree", "Sign", "Kiosk", "Fountain", "Rock", "Barrel", "Statue",
    "Hat", "Scarf", "Boots", "Wings", "Halo",
];

/// Tunables for the simulated world.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    /// RNG seed. `None` seeds from the operating system.
    pub seed: Option<u64>,
    /// Wall-clock time between simulation steps.
    pub step: Duration,
    /// Upper bound on live objects.
    pub max_objects: usize,
    /// Per-step probability of spawning an object.
    pub spawn_chance: f64,
    /// Per-step probability of killing an object.
    pub kill_chance: f64,
    /// Per-step probability of dropping the connection.
    pub drop_chance: f64,
    /// Probability that a login after the first is rejected.
    pub login_failure_chance: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: None,
            step: Duration::from_millis(100),
            max_objects: 40,
            spawn_chance: 0.3,
            kill_chance: 0.1,
            drop_chance: 0.002,
            login_failure_chance: 0.3,
        }
    }
}

/// State shared between the client handle and the world thread.
struct Shared {
    settings: SimulationSettings,
    listeners: Mutex<Vec<Arc<dyn WorldListener>>>,
    connected: AtomicBool,
    running: AtomicBool,
    /// Incremented on every successful login.
    epoch: AtomicU64,
    logins: AtomicU64,
    drop_requested: AtomicBool,
    login_rng: Mutex<StdRng>,
    pending_properties: Mutex<VecDeque<LocalId>>,
}

impl Shared {
    fn deliver(&self, notification: &WorldNotification) {
        let Ok(listeners) = self.listeners.lock().map(|l| l.clone()) else {
            return;
        };
        for listener in &listeners {
            listener.on_notification(notification);
        }
    }

    fn drop_connection(&self, reason: &str) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(reason, "Simulated connection dropped");
            self.deliver(&WorldNotification::ConnectionLost {
                reason: reason.to_owned(),
            });
        }
    }
}

/// A world client backed by an in-process random scene.
pub struct SimulatedWorld {
    shared: Arc<Shared>,
    movement: Arc<SimulatedMovement>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl core::fmt::Debug for SimulatedWorld {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedWorld")
            .field("settings", &self.shared.settings)
            .field("connected", &self.is_connected())
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

impl SimulatedWorld {
    /// A world with the given settings. Nothing runs until the first login.
    pub fn new(settings: SimulationSettings) -> Self {
        let login_rng = settings
            .seed
            .map_or_else(StdRng::from_os_rng, |seed| StdRng::seed_from_u64(seed.rotate_left(17)));
        Self {
            shared: Arc::new(Shared {
                settings,
                listeners: Mutex::new(Vec::new()),
                connected: AtomicBool::new(false),
                running: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                logins: AtomicU64::new(0),
                drop_requested: AtomicBool::new(false),
                login_rng: Mutex::new(login_rng),
                pending_properties: Mutex::new(VecDeque::new()),
            }),
            movement: Arc::new(SimulatedMovement::default()),
            worker: Mutex::new(None),
        }
    }

    /// Whether a connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Number of successful logins so far.
    pub fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    /// Total login attempts, successful or not.
    pub fn login_attempts(&self) -> u64 {
        self.shared.logins.load(Ordering::SeqCst)
    }

    /// The simulated avatar's movement handle.
    pub fn avatar(&self) -> &SimulatedMovement {
        &self.movement
    }

    /// Ask the world thread to drop the connection at its next step.
    #[cfg(test)]
    pub fn request_drop(&self) {
        self.shared.drop_requested.store(true, Ordering::SeqCst);
    }

    fn login_rejected(&self, attempt: u64) -> bool {
        if attempt == 0 {
            return false;
        }
        let chance = self.shared.settings.login_failure_chance.clamp(0.0, 1.0);
        self.shared
            .login_rng
            .lock()
            .is_ok_and(|mut rng| rng.random_bool(chance))
    }

    fn ensure_worker(&self) -> Result<(), WorldClientError> {
        let Ok(mut worker) = self.worker.lock() else {
            return Err(WorldClientError::Unreachable {
                message: String::from("simulated world poisoned"),
            });
        };
        if worker.is_some() {
            return Ok(());
        }
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(String::from("simulated-world"))
            .spawn(move || run_world(&shared))
            .map_err(|e| WorldClientError::Unreachable {
                message: format!("failed to start simulated world: {e}"),
            })?;
        *worker = Some(handle);
        Ok(())
    }

    fn stop_worker(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let handle = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("Simulated world thread panicked");
        }
    }
}

impl Drop for SimulatedWorld {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }
}

impl WorldClient for SimulatedWorld {
    fn login(&self, request: &LoginRequest) -> Result<String, WorldClientError> {
        let attempt = self.shared.logins.fetch_add(1, Ordering::SeqCst);
        if self.login_rejected(attempt) {
            debug!(%request, attempt, "Simulated login rejected");
            return Err(WorldClientError::LoginRejected {
                message: String::from("simulator is full, try again later"),
            });
        }
        self.ensure_worker()?;
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(format!("Welcome to the simulated world, {request}"))
    }

    fn logout(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.stop_worker();
    }

    fn subscribe(&self, listener: Arc<dyn WorldListener>) {
        if let Ok(mut listeners) = self.shared.listeners.lock() {
            listeners.push(listener);
        }
    }

    fn request_properties(&self, local_id: LocalId) {
        if let Ok(mut pending) = self.shared.pending_properties.lock() {
            pending.push_back(local_id);
        }
    }

    fn request_geometry(&self, object: &ObservedObject) -> Option<Geometry> {
        Some(box_geometry(object.scale))
    }

    fn movement(&self) -> Arc<dyn MovementHandle> {
        Arc::clone(&self.movement) as Arc<dyn MovementHandle>
    }
}

/// An axis-aligned box of the given size centred on the origin.
fn box_geometry(scale: Vector3) -> Geometry {
    let (hx, hy, hz) = (scale.x * 0.5, scale.y * 0.5, scale.z * 0.5);
    let mut vertices = Vec::with_capacity(8);
    for x in [-hx, hx] {
        for y in [-hy, hy] {
            for z in [-hz, hz] {
                vertices.push(Vector3::new(x, y, z));
            }
        }
    }
    Geometry { vertices }
}

// -----------------------------------------------------------------------
// World thread
// -----------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SimObject {
    kind: ObjectKind,
    local_id: LocalId,
    global_id: GlobalId,
    parent: Option<GlobalId>,
    name: String,
    pose: Pose,
    scale: Vector3,
}

/// Scene owned by the world thread. Parents always precede their children.
struct WorldState {
    rng: StdRng,
    objects: Vec<SimObject>,
    next_local: u32,
}

impl WorldState {
    fn new(settings: &SimulationSettings) -> Self {
        let rng = settings
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            rng,
            objects: Vec::new(),
            next_local: 1,
        }
    }

    const fn allocate_local(&mut self) -> LocalId {
        let id = LocalId(self.next_local);
        self.next_local = self.next_local.saturating_add(1);
        id
    }

    fn local_of(&self, global_id: GlobalId) -> Option<LocalId> {
        self.objects
            .iter()
            .find(|o| o.global_id == global_id)
            .map(|o| o.local_id)
    }

    fn observed(&self, object: &SimObject) -> ObservedObject {
        let parent = object
            .parent
            .and_then(|g| self.local_of(g))
            .unwrap_or(LocalId::ROOT);
        let mut observed = ObservedObject::new(object.local_id, object.global_id)
            .with_parent(parent)
            .with_name(object.name.clone());
        observed.pose = object.pose;
        observed.scale = object.scale;
        observed
    }

    fn random_id(&mut self) -> GlobalId {
        GlobalId(uuid::Builder::from_random_bytes(self.rng.random()).into_uuid())
    }

    fn random_position(&mut self) -> Vector3 {
        Vector3::new(
            self.rng.random_range(0.0..REGION_SIZE),
            self.rng.random_range(0.0..REGION_SIZE),
            self.rng.random_range(20.0..40.0),
        )
    }

    /// Create one object. Attachments need an avatar to wear them.
    fn spawn(&mut self) -> Option<SimObject> {
        let roll: f64 = self.rng.random();
        let avatar = self.pick_root(ObjectKind::Avatar);
        let prim = self.pick_root(ObjectKind::Prim);
        let (kind, parent) = if roll < 0.15 {
            (ObjectKind::Avatar, None)
        } else if roll < 0.35 {
            (ObjectKind::Attachment, Some(avatar?))
        } else if roll < 0.55 && prim.is_some() {
            (ObjectKind::Prim, prim)
        } else {
            (ObjectKind::Prim, None)
        };

        let name_index = self.rng.random_range(0..NAMES.len());
        let name = NAMES.get(name_index).copied().unwrap_or("Object");
        let position = if parent.is_some() {
            Vector3::new(
                self.rng.random_range(-1.0..1.0),
                self.rng.random_range(-1.0..1.0),
                self.rng.random_range(-1.0..1.0),
            )
        } else {
            self.random_position()
        };
        let velocity = if kind == ObjectKind::Avatar {
            Vector3::new(
                self.rng.random_range(-2.0..2.0),
                self.rng.random_range(-2.0..2.0),
                0.0,
            )
        } else {
            Vector3::ZERO
        };
        let scale = if kind == ObjectKind::Avatar {
            Vector3::new(0.6, 0.45, 1.9)
        } else {
            Vector3::new(
                self.rng.random_range(0.1..4.0),
                self.rng.random_range(0.1..4.0),
                self.rng.random_range(0.1..4.0),
            )
        };

        let object = SimObject {
            kind,
            local_id: self.allocate_local(),
            global_id: self.random_id(),
            parent,
            name: name.to_owned(),
            pose: Pose {
                position,
                velocity,
                rotation: Quaternion::IDENTITY,
                angular_velocity: Vector3::ZERO,
            },
            scale,
        };
        self.objects.push(object.clone());
        Some(object)
    }

    /// A random unparented object of `kind`.
    fn pick_root(&mut self, kind: ObjectKind) -> Option<GlobalId> {
        let candidates: Vec<GlobalId> = self
            .objects
            .iter()
            .filter(|o| o.kind == kind && o.parent.is_none())
            .map(|o| o.global_id)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..candidates.len());
        candidates.get(index).copied()
    }

    /// Remove a random object and everything attached to it, children first.
    fn kill_random(&mut self) -> Vec<LocalId> {
        if self.objects.is_empty() {
            return Vec::new();
        }
        let index = self.rng.random_range(0..self.objects.len());
        let Some(victim) = self.objects.get(index).map(|o| o.global_id) else {
            return Vec::new();
        };
        let mut removed: Vec<LocalId> = self
            .objects
            .iter()
            .filter(|o| o.parent == Some(victim))
            .map(|o| o.local_id)
            .collect();
        removed.extend(self.local_of(victim));
        self.objects
            .retain(|o| o.global_id != victim && o.parent != Some(victim));
        removed
    }

    /// Advance unparented objects by their velocity, bouncing off the region edges.
    fn step_motion(&mut self, dt: f32) -> Vec<(ObservedObject, Pose)> {
        let mut moved = Vec::new();
        for index in 0..self.objects.len() {
            let Some(object) = self.objects.get_mut(index) else {
                continue;
            };
            if object.parent.is_some() || object.pose.velocity == Vector3::ZERO {
                continue;
            }
            let pose = &mut object.pose;
            pose.position.x = bounce(pose.position.x, &mut pose.velocity.x, dt);
            pose.position.y = bounce(pose.position.y, &mut pose.velocity.y, dt);
            let pose = object.pose;
            if let Some(object) = self.objects.get(index) {
                moved.push((self.observed(object), pose));
            }
        }
        moved
    }

    /// New local ids for every object, as a fresh connection would assign.
    fn renumber(&mut self) {
        let mut next = self.next_local;
        for object in &mut self.objects {
            object.local_id = LocalId(next);
            next = next.saturating_add(1);
        }
        self.next_local = next;
    }

    fn properties_for(&self, local_id: LocalId) -> Option<WorldNotification> {
        let object = self.objects.iter().find(|o| o.local_id == local_id)?;
        Some(WorldNotification::PropertiesResolved {
            global_id: object.global_id,
            name: object.name.clone(),
            description: format!("a simulated {}", object.kind.as_str()),
        })
    }
}

/// Move `position` by `velocity * dt`, reflecting off `0..REGION_SIZE`.
fn bounce(position: f32, velocity: &mut f32, dt: f32) -> f32 {
    let next = velocity.mul_add(dt, position);
    if next < 0.0 {
        *velocity = velocity.abs();
        -next
    } else if next >= REGION_SIZE {
        *velocity = -velocity.abs();
        REGION_SIZE.mul_add(2.0, -next).max(0.0)
    } else {
        next
    }
}

fn run_world(shared: &Shared) {
    let settings = &shared.settings;
    let mut world = WorldState::new(settings);
    let mut seen_epoch = 0;
    let dt = settings.step.as_secs_f32();

    for _ in 0..settings.max_objects.div_ceil(2) {
        world.spawn();
    }
    info!(objects = world.objects.len(), "Simulated world started");

    while shared.running.load(Ordering::SeqCst) {
        std::thread::sleep(settings.step);
        if !shared.connected.load(Ordering::SeqCst) {
            continue;
        }

        // --- New connection: renumber and announce the scene ---
        let epoch = shared.epoch.load(Ordering::SeqCst);
        if epoch != seen_epoch {
            seen_epoch = epoch;
            if let Ok(mut pending) = shared.pending_properties.lock() {
                pending.clear();
            }
            world.renumber();
            debug!(epoch, objects = world.objects.len(), "Announcing scene");
            for object in &world.objects {
                shared.deliver(&WorldNotification::ObjectObserved {
                    kind: object.kind,
                    object: world.observed(object),
                });
            }
        }

        // --- Property replies ---
        let requested: Vec<LocalId> = shared
            .pending_properties
            .lock()
            .map(|mut pending| pending.drain(..).collect())
            .unwrap_or_default();
        for local_id in requested {
            if let Some(reply) = world.properties_for(local_id) {
                shared.deliver(&reply);
            }
        }

        // --- Spawn ---
        if world.objects.len() < settings.max_objects
            && world.rng.random_bool(settings.spawn_chance.clamp(0.0, 1.0))
            && let Some(object) = world.spawn()
        {
            trace!(local = %object.local_id, kind = object.kind.as_str(), "Spawned");
            shared.deliver(&WorldNotification::ObjectObserved {
                kind: object.kind,
                object: world.observed(&object),
            });
        }

        // --- Motion ---
        for (object, pose) in world.step_motion(dt) {
            shared.deliver(&WorldNotification::TerseUpdate { object, pose });
        }

        // --- Kill ---
        if world.rng.random_bool(settings.kill_chance.clamp(0.0, 1.0)) {
            for local_id in world.kill_random() {
                shared.deliver(&WorldNotification::ObjectRemoved { local_id });
            }
        }

        // --- Connection drop ---
        if shared.drop_requested.swap(false, Ordering::SeqCst) {
            shared.drop_connection("requested drop");
        } else if world.rng.random_bool(settings.drop_chance.clamp(0.0, 1.0)) {
            shared.drop_connection("simulated circuit timeout");
        }
    }
    info!("Simulated world stopped");
}

// -----------------------------------------------------------------------
// Movement
// -----------------------------------------------------------------------

#[derive(Debug, Default)]
struct AvatarView {
    look_direction: Option<Vector3>,
    draw_distance: Option<f32>,
    updates_sent: u64,
}

/// Movement handle of the simulated avatar. Records the current view.
#[derive(Debug, Default)]
pub struct SimulatedMovement {
    view: Mutex<AvatarView>,
}

impl SimulatedMovement {
    /// Last camera direction sent.
    pub fn look_direction(&self) -> Option<Vector3> {
        self.view.lock().ok().and_then(|v| v.look_direction)
    }

    /// Current draw distance.
    pub fn draw_distance(&self) -> Option<f32> {
        self.view.lock().ok().and_then(|v| v.draw_distance)
    }

    /// Number of movement updates sent.
    pub fn updates_sent(&self) -> u64 {
        self.view.lock().map_or(0, |v| v.updates_sent)
    }
}

impl MovementHandle for SimulatedMovement {
    fn set_body_rotation(&self, rotation: Quaternion) {
        trace!(?rotation, "Body rotation");
    }

    fn set_head_rotation(&self, rotation: Quaternion) {
        trace!(?rotation, "Head rotation");
    }

    fn look_direction(&self, direction: Vector3) {
        if let Ok(mut view) = self.view.lock() {
            view.look_direction = Some(direction);
        }
    }

    fn set_draw_distance(&self, meters: f32) {
        debug!(meters, "Draw distance set");
        if let Ok(mut view) = self.view.lock() {
            view.draw_distance = Some(meters);
        }
    }

    fn send_update(&self) {
        if let Ok(mut view) = self.view.lock() {
            view.updates_sent = view.updates_sent.saturating_add(1);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::time::Instant;

    use worldtrace_core::bounds::compute_bounds;
    use worldtrace_core::config::CredentialsConfig;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<WorldNotification>>,
    }

    impl WorldListener for Recorder {
        fn on_notification(&self, notification: &WorldNotification) {
            self.seen.lock().unwrap().push(notification.clone());
        }
    }

    impl Recorder {
        fn count(&self, pred: impl Fn(&WorldNotification) -> bool) -> usize {
            self.seen.lock().unwrap().iter().filter(|n| pred(n)).count()
        }

        fn wait_for(&self, pred: impl Fn(&WorldNotification) -> bool, at_least: usize) {
            let deadline = Instant::now() + Duration::from_secs(10);
            while self.count(&pred) < at_least {
                assert!(Instant::now() < deadline, "timed out waiting for notifications");
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    fn request() -> LoginRequest {
        let creds = CredentialsConfig {
            first_name: String::from("Sim"),
            last_name: String::from("Tracer"),
            password: String::new(),
        };
        LoginRequest::new(&creds, "worldtrace", "test", None)
    }

    const fn fast_settings(seed: u64) -> SimulationSettings {
        SimulationSettings {
            seed: Some(seed),
            step: Duration::from_millis(1),
            max_objects: 30,
            spawn_chance: 0.5,
            kill_chance: 0.2,
            drop_chance: 0.0,
            login_failure_chance: 0.0,
        }
    }

    const fn is_observed(n: &WorldNotification) -> bool {
        matches!(n, WorldNotification::ObjectObserved { .. })
    }

    #[test]
    fn first_login_always_succeeds() {
        let world = SimulatedWorld::new(SimulationSettings {
            login_failure_chance: 1.0,
            ..fast_settings(1)
        });
        assert!(world.login(&request()).is_ok());
        assert!(world.is_connected());
        assert!(matches!(
            world.login(&request()),
            Err(WorldClientError::LoginRejected { .. })
        ));
        assert_eq!(world.login_attempts(), 2);
        assert_eq!(world.epoch(), 1);
        world.logout();
        assert!(!world.is_connected());
    }

    #[test]
    fn geometry_is_a_box_of_the_object_scale() {
        let world = SimulatedWorld::new(fast_settings(2));
        let mut object = ObservedObject::new(LocalId(1), GlobalId::new_random());
        object.scale = Vector3::new(2.0, 4.0, 0.5);
        let geometry = world.request_geometry(&object).unwrap();
        assert_eq!(geometry.vertices.len(), 8);
        let extent = compute_bounds(&geometry).unwrap().extent();
        assert!((extent.x - 2.0).abs() < 1.0e-6);
        assert!((extent.y - 4.0).abs() < 1.0e-6);
        assert!((extent.z - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn scene_is_announced_and_properties_answered() {
        let world = SimulatedWorld::new(SimulationSettings {
            kill_chance: 0.0,
            ..fast_settings(3)
        });
        let recorder = Arc::new(Recorder::default());
        world.subscribe(recorder.clone());
        world.login(&request()).unwrap();

        recorder.wait_for(is_observed, 5);
        let first = recorder
            .seen
            .lock()
            .unwrap()
            .iter()
            .find_map(|n| match n {
                WorldNotification::ObjectObserved { object, .. } => Some(object.local_id),
                _ => None,
            })
            .unwrap();
        world.request_properties(first);
        recorder.wait_for(
            |n| matches!(n, WorldNotification::PropertiesResolved { .. }),
            1,
        );
        world.logout();
    }

    #[test]
    fn parents_precede_children_in_every_epoch() {
        let world = SimulatedWorld::new(fast_settings(4));
        let recorder = Arc::new(Recorder::default());
        world.subscribe(recorder.clone());
        world.login(&request()).unwrap();
        recorder.wait_for(is_observed, 20);

        world.request_drop();
        recorder.wait_for(
            |n| matches!(n, WorldNotification::ConnectionLost { .. }),
            1,
        );
        assert!(!world.is_connected());
        world.login(&request()).unwrap();
        let before = recorder.count(is_observed);
        recorder.wait_for(is_observed, before + 10);
        world.logout();

        let seen = recorder.seen.lock().unwrap();
        let mut live: HashSet<LocalId> = HashSet::new();
        let mut epoch_locals: Vec<HashSet<LocalId>> = vec![HashSet::new()];
        for notification in seen.iter() {
            match notification {
                WorldNotification::ConnectionLost { .. } => {
                    live.clear();
                    epoch_locals.push(HashSet::new());
                }
                WorldNotification::ObjectObserved { object, .. } => {
                    if !object.parent_local_id.is_root() {
                        assert!(live.contains(&object.parent_local_id));
                    }
                    live.insert(object.local_id);
                    epoch_locals.last_mut().unwrap().insert(object.local_id);
                }
                WorldNotification::TerseUpdate { object, .. } => {
                    assert!(live.contains(&object.local_id));
                }
                WorldNotification::ObjectRemoved { local_id } => {
                    assert!(live.remove(local_id));
                }
                WorldNotification::PropertiesResolved { .. } => {}
            }
        }
        assert_eq!(epoch_locals.len(), 2);
        assert!(epoch_locals[0].is_disjoint(&epoch_locals[1]));
    }

    #[test]
    fn bounce_reflects_at_edges() {
        let mut velocity = -2.0;
        let position = bounce(1.0, &mut velocity, 1.0);
        assert!((position - 1.0).abs() < 1.0e-6);
        assert!(velocity > 0.0);

        let mut velocity = 3.0;
        let position = bounce(255.0, &mut velocity, 1.0);
        assert!((position - 254.0).abs() < 1.0e-4);
        assert!(velocity < 0.0);
    }

    #[test]
    fn movement_records_view() {
        let world = SimulatedWorld::new(fast_settings(5));
        let movement = world.movement();
        movement.set_draw_distance(512.0);
        movement.look_direction(Vector3::UNIT_X);
        movement.send_update();
        assert_eq!(world.movement.draw_distance(), Some(512.0));
        assert_eq!(world.movement.look_direction(), Some(Vector3::UNIT_X));
        assert_eq!(world.movement.updates_sent(), 1);
    }
}
