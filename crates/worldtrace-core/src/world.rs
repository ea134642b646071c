//! Contract with the external world client.
//!
//! The world client owns the transport: login handshake, packet encoding,
//! and asset transfer all live behind [`WorldClient`]. This crate only
//! calls into it and receives [`WorldNotification`]s back on the client's
//! own dispatch threads through registered [`WorldListener`]s.
//!
//! Outbound requests ([`WorldClient::request_properties`]) are fire and
//! forget: their answers arrive later as ordinary notifications.

use std::sync::Arc;

use worldtrace_types::{Geometry, GlobalId, LocalId, ObjectKind, ObservedObject, Pose, Quaternion, Vector3};

use crate::config::{CredentialsConfig, StartLocation};

/// Errors reported by a world client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldClientError {
    /// The login service refused the attempt.
    #[error("login rejected: {message}")]
    LoginRejected {
        /// Message returned by the login service.
        message: String,
    },

    /// The service could not be reached.
    #[error("world unreachable: {message}")]
    Unreachable {
        /// Description of the transport failure.
        message: String,
    },
}

/// Everything a single login attempt sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account first name.
    pub first_name: String,
    /// Account last name.
    pub last_name: String,
    /// Account password.
    pub password: String,
    /// Client name.
    pub user_agent: String,
    /// Client version.
    pub version: String,
    /// Requested start position; `None` for a plain login.
    pub start_location: Option<StartLocation>,
}

impl LoginRequest {
    /// Assemble a request from configured credentials.
    pub fn new(
        credentials: &CredentialsConfig,
        user_agent: &str,
        version: &str,
        start_location: Option<&StartLocation>,
    ) -> Self {
        Self {
            first_name: credentials.first_name.clone(),
            last_name: credentials.last_name.clone(),
            password: credentials.password.clone(),
            user_agent: user_agent.to_owned(),
            version: version.to_owned(),
            start_location: start_location.cloned(),
        }
    }

    /// Whether this attempt targets a specific region and coordinates.
    pub const fn is_located(&self) -> bool {
        self.start_location.is_some()
    }
}

impl core::fmt::Display for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)?;
        if let Some(loc) = &self.start_location {
            write!(f, " @ {}/{}/{}/{}", loc.region, loc.x, loc.y, loc.z)?;
        }
        Ok(())
    }
}

/// Asynchronous notification delivered by the world client.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldNotification {
    /// An object became (or is still) visible.
    ObjectObserved {
        /// Category reported by the world.
        kind: ObjectKind,
        /// The object's current description.
        object: ObservedObject,
    },
    /// A lightweight motion-only update.
    TerseUpdate {
        /// The object the update refers to.
        object: ObservedObject,
        /// New kinematic state.
        pose: Pose,
    },
    /// An object left the observed set.
    ObjectRemoved {
        /// Per-connection handle of the removed object.
        local_id: LocalId,
    },
    /// A property request was answered.
    PropertiesResolved {
        /// Persistent identity of the described object.
        global_id: GlobalId,
        /// Display name.
        name: String,
        /// Free-form description.
        description: String,
    },
    /// The connection to the world dropped without a logout.
    ConnectionLost {
        /// Reason reported by the transport.
        reason: String,
    },
}

/// Receiver of world notifications. Called from the client's dispatch threads.
pub trait WorldListener: Send + Sync {
    /// Handle one notification.
    fn on_notification(&self, notification: &WorldNotification);
}

/// Commands that steer the observing avatar.
pub trait MovementHandle: Send + Sync {
    /// Set the avatar body orientation.
    fn set_body_rotation(&self, rotation: Quaternion);

    /// Set the avatar head orientation.
    fn set_head_rotation(&self, rotation: Quaternion);

    /// Point the observation camera along `direction`.
    fn look_direction(&self, direction: Vector3);

    /// Widen or narrow the observation radius.
    fn set_draw_distance(&self, meters: f32);

    /// Send the accumulated movement state to the world.
    fn send_update(&self);
}

/// The external world client this core drives.
pub trait WorldClient: Send + Sync {
    /// Attempt a login. `Ok` carries the login service's message.
    ///
    /// Blocks until the login service answers.
    fn login(&self, request: &LoginRequest) -> Result<String, WorldClientError>;

    /// Log out gracefully.
    fn logout(&self);

    /// Register a listener for all notification kinds.
    fn subscribe(&self, listener: Arc<dyn WorldListener>);

    /// Ask the world to describe an object; answered by
    /// [`WorldNotification::PropertiesResolved`].
    fn request_properties(&self, local_id: LocalId);

    /// Rendered geometry approximation of an object, when one can be built.
    fn request_geometry(&self, object: &ObservedObject) -> Option<Geometry>;

    /// Handle for issuing movement and orientation commands.
    fn movement(&self) -> Arc<dyn MovementHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_located_requests() {
        let creds = CredentialsConfig {
            first_name: String::from("Trace"),
            last_name: String::from("Bot"),
            password: String::from("pw"),
        };
        let plain = LoginRequest::new(&creds, "worldtrace", "0.1.0", None);
        assert!(!plain.is_located());
        assert_eq!(plain.to_string(), "Trace Bot");

        let start = StartLocation {
            region: String::from("Ahern"),
            x: 1,
            y: 2,
            z: 3,
        };
        let located = LoginRequest::new(&creds, "worldtrace", "0.1.0", Some(&start));
        assert!(located.is_located());
        assert_eq!(located.to_string(), "Trace Bot @ Ahern/1/2/3");
    }
}
