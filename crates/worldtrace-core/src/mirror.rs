//! Object Graph Mirror: local copy of the remote scene graph.
//!
//! Notifications arrive from the world client's dispatch threads in any
//! order and possibly duplicated. The mirror turns them into mirror state
//! and an ordered stream of [`TraceEvent`]s on the shared [`EventLog`].
//!
//! # Locking
//!
//! All three maps live behind one mutex and every logical mutation
//! (observe, motion, remove, properties, epoch reset) runs inside one
//! critical section. Events for a mutation are recorded while that section
//! is held, so the lock order is always mirror first, then log. Outbound
//! requests to the world client are issued only after the mirror lock is
//! released.
//!
//! # Removal
//!
//! A removed persistent id is remembered for the rest of the run. Later
//! observations or motion updates for it are dropped, so its kill stays the
//! last event in the trace.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use worldtrace_events::{EventLog, EventLogError, TraceEvent};
use worldtrace_types::{Bounds, GlobalId, LocalId, ObjectKind, ObservedObject, Pose};

use crate::bounds::compute_bounds;
use crate::world::{WorldClient, WorldListener, WorldNotification};

/// Description recorded for avatars, whose properties are never requested.
pub const AVATAR_DESCRIPTION: &str = "avatar";

/// Kind assigned to objects first seen through a motion-only update.
pub const RESYNC_KIND: ObjectKind = ObjectKind::Prim;

/// A live object as known to the mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    /// Category, fixed at first sight.
    pub kind: ObjectKind,
    /// Per-connection handle.
    pub local_id: LocalId,
    /// Persistent identity.
    pub global_id: GlobalId,
    /// Parent handle from the most recent observation.
    pub parent_local_id: LocalId,
    /// Last known kinematic state.
    pub pose: Pose,
    /// Geometry bounds, once computed.
    pub bounds: Option<Bounds>,
    /// Display name, once resolved.
    pub name: Option<String>,
    /// Description, once resolved.
    pub description: Option<String>,
}

impl TrackedObject {
    fn new(kind: ObjectKind, object: &ObservedObject) -> Self {
        Self {
            kind,
            local_id: object.local_id,
            global_id: object.global_id,
            parent_local_id: object.parent_local_id,
            pose: object.pose,
            bounds: None,
            name: None,
            description: None,
        }
    }
}

#[derive(Debug, Default)]
struct MirrorMaps {
    by_local: HashMap<LocalId, TrackedObject>,
    local_by_global: HashMap<GlobalId, LocalId>,
    parent_by_global: HashMap<GlobalId, LocalId>,
    /// Persistent ids that were killed. Kept across epochs.
    killed: HashSet<GlobalId>,
}

impl MirrorMaps {
    /// Drop the live maps. Tombstones survive.
    fn clear(&mut self) -> usize {
        let dropped = self.by_local.len();
        self.by_local.clear();
        self.local_by_global.clear();
        self.parent_by_global.clear();
        dropped
    }
}

/// Work to do after the mirror lock is released.
#[derive(Debug, Default)]
struct FollowUp {
    property_requests: Vec<LocalId>,
    geometry_for: Option<ObservedObject>,
}

/// Thread-safe mirror of the observed object graph.
pub struct ObjectGraphMirror {
    maps: Mutex<MirrorMaps>,
    log: Arc<EventLog>,
    client: Arc<dyn WorldClient>,
    started_at: Instant,
}

impl core::fmt::Debug for ObjectGraphMirror {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectGraphMirror")
            .field("live", &self.live_count())
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

impl ObjectGraphMirror {
    /// Create an empty mirror writing to `log`; elapsed times are measured
    /// from `started_at`.
    pub fn new(log: Arc<EventLog>, client: Arc<dyn WorldClient>, started_at: Instant) -> Self {
        Self {
            maps: Mutex::new(MirrorMaps::default()),
            log,
            client,
            started_at,
        }
    }

    /// An object is newly visible or still visible.
    pub fn on_observed(&self, kind: ObjectKind, object: &ObservedObject) {
        let follow_up = {
            let Some(mut maps) = self.lock_maps() else {
                return;
            };
            self.observe_locked(&mut maps, kind, object)
        };
        self.run_follow_up(follow_up);
    }

    /// Motion-only update. Unknown objects are observed first, unless they
    /// were already killed.
    pub fn on_motion_update(&self, object: &ObservedObject, pose: Pose) {
        let follow_up = {
            let Some(mut maps) = self.lock_maps() else {
                return;
            };
            if maps.killed.contains(&object.global_id) {
                debug!(
                    local_id = %object.local_id,
                    global_id = %object.global_id,
                    "Motion update for a killed object dropped"
                );
                return;
            }
            let follow_up = match maps.by_local.get(&object.local_id) {
                Some(existing) if existing.global_id == object.global_id => FollowUp::default(),
                Some(existing) => {
                    warn!(
                        local_id = %object.local_id,
                        tracked = %existing.global_id,
                        reported = %object.global_id,
                        "Motion update for a local id owned by another object, dropped"
                    );
                    return;
                }
                None => {
                    debug!(
                        local_id = %object.local_id,
                        global_id = %object.global_id,
                        "Motion update for untracked object, re-observing"
                    );
                    self.observe_locked(&mut maps, RESYNC_KIND, object)
                }
            };
            // The re-observation may itself have been rejected.
            let Some(record) = maps.by_local.get_mut(&object.local_id) else {
                return;
            };
            record.pose = pose;
            let id = record.global_id;
            self.emit(&TraceEvent::Loc {
                elapsed: self.elapsed(),
                id,
                pose,
            });
            follow_up
        };
        self.run_follow_up(follow_up);
    }

    /// An object left the observed set. Unknown ids are ignored.
    pub fn on_removed(&self, local_id: LocalId) {
        let Some(mut maps) = self.lock_maps() else {
            return;
        };
        let Some(record) = maps.by_local.remove(&local_id) else {
            debug!(local_id = %local_id, "Kill for untracked object ignored");
            return;
        };
        let id = record.global_id;
        if maps.local_by_global.get(&id) == Some(&local_id) {
            maps.local_by_global.remove(&id);
            maps.parent_by_global.remove(&id);
        }
        maps.killed.insert(id);
        self.emit(&TraceEvent::Kill {
            elapsed: self.elapsed(),
            id,
        });
    }

    /// A property request was answered.
    ///
    /// Answers for objects that are no longer live are dropped so that a
    /// kill stays the last event for its id.
    pub fn on_properties_resolved(&self, global_id: GlobalId, name: &str, description: &str) {
        let Some(mut maps) = self.lock_maps() else {
            return;
        };
        let Some(local_id) = maps.local_by_global.get(&global_id).copied() else {
            debug!(global_id = %global_id, "Properties for untracked object dropped");
            return;
        };
        if let Some(record) = maps.by_local.get_mut(&local_id) {
            record.name = Some(name.to_owned());
            record.description = Some(description.to_owned());
        }
        self.emit(&TraceEvent::Properties {
            elapsed: self.elapsed(),
            id: global_id,
            name: name.to_owned(),
            description: description.to_owned(),
        });
    }

    /// Discard every record of the current connection epoch.
    ///
    /// Local ids are meaningless once the connection drops; objects seen
    /// again after reconnecting are reported as new.
    pub fn reset_epoch(&self) {
        let Some(mut maps) = self.lock_maps() else {
            return;
        };
        let dropped = maps.clear();
        info!(dropped, "Connection epoch ended, mirror cleared");
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.maps.lock().map_or(0, |maps| maps.by_local.len())
    }

    /// Snapshot of the live object under `local_id`.
    pub fn get(&self, local_id: LocalId) -> Option<TrackedObject> {
        self.maps
            .lock()
            .ok()
            .and_then(|maps| maps.by_local.get(&local_id).cloned())
    }

    /// Local handle currently owned by `global_id`.
    pub fn local_of(&self, global_id: GlobalId) -> Option<LocalId> {
        self.maps
            .lock()
            .ok()
            .and_then(|maps| maps.local_by_global.get(&global_id).copied())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lock_maps(&self) -> Option<MutexGuard<'_, MirrorMaps>> {
        match self.maps.lock() {
            Ok(guard) => Some(guard),
            Err(_poisoned) => {
                warn!("Mirror lock poisoned, notification dropped");
                None
            }
        }
    }

    fn observe_locked(
        &self,
        maps: &mut MirrorMaps,
        kind: ObjectKind,
        object: &ObservedObject,
    ) -> FollowUp {
        let mut follow_up = FollowUp::default();
        let local_id = object.local_id;
        let global_id = object.global_id;

        if global_id.is_nil() {
            warn!(local_id = %local_id, "Observation without a persistent id dropped");
            return follow_up;
        }
        if maps.killed.contains(&global_id) {
            debug!(
                local_id = %local_id,
                global_id = %global_id,
                "Report for a killed object dropped"
            );
            return follow_up;
        }

        let parent_global = Self::parent_global(maps, object.parent_local_id);

        if let Some(existing) = maps.by_local.get_mut(&local_id) {
            if existing.global_id != global_id {
                warn!(
                    local_id = %local_id,
                    tracked = %existing.global_id,
                    reported = %global_id,
                    "Local id reused for a different object, report dropped"
                );
                return follow_up;
            }
            existing.pose = object.pose;
            existing.parent_local_id = object.parent_local_id;
            let existing_kind = existing.kind;

            let previous = maps.parent_by_global.insert(global_id, object.parent_local_id);
            if previous != Some(object.parent_local_id) {
                debug!(
                    global_id = %global_id,
                    from = ?previous,
                    to = %object.parent_local_id,
                    "Parent changed"
                );
                self.emit(&self.add_event(existing_kind, object, parent_global));
                Self::queue_parent_request(maps, object.parent_local_id, &mut follow_up);
            }
            return follow_up;
        }

        if let Some(other) = maps.local_by_global.get(&global_id) {
            warn!(
                global_id = %global_id,
                tracked_local = %other,
                reported_local = %local_id,
                "Persistent id already live under another local id"
            );
        }

        let mut record = TrackedObject::new(kind, object);
        maps.local_by_global.insert(global_id, local_id);
        maps.parent_by_global.insert(global_id, object.parent_local_id);
        self.emit(&self.add_event(kind, object, parent_global));

        if kind == ObjectKind::Avatar {
            let name = object.name.clone().unwrap_or_default();
            self.emit(&TraceEvent::Properties {
                elapsed: self.elapsed(),
                id: global_id,
                name: name.clone(),
                description: AVATAR_DESCRIPTION.to_owned(),
            });
            record.name = Some(name);
            record.description = Some(AVATAR_DESCRIPTION.to_owned());
        } else {
            follow_up.property_requests.push(local_id);
        }
        maps.by_local.insert(local_id, record);

        Self::queue_parent_request(maps, object.parent_local_id, &mut follow_up);
        follow_up.geometry_for = Some(object.clone());
        follow_up
    }

    fn parent_global(maps: &MirrorMaps, parent: LocalId) -> Option<GlobalId> {
        if parent.is_root() {
            return None;
        }
        maps.by_local.get(&parent).map(|p| p.global_id)
    }

    fn queue_parent_request(maps: &MirrorMaps, parent: LocalId, follow_up: &mut FollowUp) {
        if parent.is_root() {
            return;
        }
        let resolved = maps
            .by_local
            .get(&parent)
            .is_some_and(|p| p.name.is_some());
        if !resolved {
            follow_up.property_requests.push(parent);
        }
    }

    fn add_event(
        &self,
        kind: ObjectKind,
        object: &ObservedObject,
        parent: Option<GlobalId>,
    ) -> TraceEvent {
        let parent_local = (!object.parent_local_id.is_root()).then_some(object.parent_local_id);
        TraceEvent::Add {
            elapsed: self.elapsed(),
            kind,
            id: object.global_id,
            local: object.local_id,
            parent_local,
            parent,
        }
    }

    fn run_follow_up(&self, follow_up: FollowUp) {
        for local_id in follow_up.property_requests {
            self.client.request_properties(local_id);
        }
        let Some(object) = follow_up.geometry_for else {
            return;
        };
        let Some(bounds) = self
            .client
            .request_geometry(&object)
            .as_ref()
            .and_then(compute_bounds)
        else {
            return;
        };

        let Some(mut maps) = self.lock_maps() else {
            return;
        };
        // Skip if the object was killed or replaced while unlocked.
        let Some(record) = maps.by_local.get_mut(&object.local_id) else {
            return;
        };
        if record.global_id != object.global_id {
            return;
        }
        record.bounds = Some(bounds);
        self.emit(&TraceEvent::Size {
            elapsed: self.elapsed(),
            id: object.global_id,
            bounds,
        });
    }

    fn emit(&self, event: &TraceEvent) {
        match self.log.record(event) {
            Ok(()) => {}
            // Notifications can trail the end of the trace.
            Err(EventLogError::Closed) => {
                debug!(event = event.name(), "Trace finished, event discarded");
            }
            // The failing write was already reported.
            Err(EventLogError::Corrupted) => {
                debug!(event = event.name(), "Trace corrupted, event discarded");
            }
            Err(e) => warn!(event = event.name(), error = %e, "Failed to record trace event"),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl WorldListener for ObjectGraphMirror {
    fn on_notification(&self, notification: &WorldNotification) {
        match notification {
            WorldNotification::ObjectObserved { kind, object } => self.on_observed(*kind, object),
            WorldNotification::TerseUpdate { object, pose } => self.on_motion_update(object, *pose),
            WorldNotification::ObjectRemoved { local_id } => self.on_removed(*local_id),
            WorldNotification::PropertiesResolved {
                global_id,
                name,
                description,
            } => self.on_properties_resolved(*global_id, name, description),
            WorldNotification::ConnectionLost { .. } => self.reset_epoch(),
        }
    }
}
