//! Session state machine and reconnect backoff.
//!
//! ```text
//! Disconnected --login ok--> Connected
//! Disconnected --login fails--> Disconnected
//! Connected --connection lost--> AwaitingReconnect
//! AwaitingReconnect --backoff elapsed, login ok--> Connected
//! AwaitingReconnect --backoff elapsed, login fails--> AwaitingReconnect (backoff doubles)
//! Connected --stop / duration--> Disconnected
//! ```
//!
//! The reconnect state is written both by the world client's dispatch
//! threads (connection lost) and by the tick loop (reconnect attempts), so
//! it lives behind one mutex in [`ReconnectMachine`]. Login calls block, so
//! the machine passes through `Connecting` and releases the lock while the
//! world client answers. The `_async` variants of the session operations
//! run those blocking client calls on tokio's blocking pool.
//!
//! Timestamps come from [`clock_now`], which follows tokio's clock, so the
//! backoff and the tick loop measure time the same way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{ReconnectConfig, TraceConfig};
use crate::world::{LoginRequest, WorldClient, WorldClientError, WorldListener, WorldNotification};

/// Current time on tokio's clock, as a std [`Instant`].
///
/// Outside a runtime, or without a paused test clock, this is
/// [`Instant::now`].
pub fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Errors raised by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The world client refused or failed the login.
    #[error("login failed: {source}")]
    Login {
        /// The underlying client error.
        #[from]
        source: WorldClientError,
    },

    /// The operation is not valid in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },

    /// A thread panicked while holding the session lock.
    #[error("session lock poisoned")]
    Poisoned,
}

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not logged in.
    Disconnected,
    /// A login attempt is in flight.
    Connecting,
    /// Logged in and receiving notifications.
    Connected,
    /// The connection dropped; waiting for the backoff to elapse.
    AwaitingReconnect,
}

impl core::fmt::Display for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::AwaitingReconnect => "awaiting reconnect",
        };
        f.write_str(s)
    }
}

/// Whether a reconnect attempt may start now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectGate {
    /// The session is not waiting to reconnect.
    Idle,
    /// Waiting, but the backoff has not elapsed yet.
    NotDue {
        /// Time left until the next attempt is allowed.
        remaining: Duration,
    },
    /// The machine moved to `Connecting`; the caller must log in and then
    /// call [`ReconnectMachine::finish_attempt`].
    Open,
}

impl ReconnectGate {
    /// `Ok` when an attempt was opened, otherwise the poll's final outcome.
    const fn into_attempt(self) -> Result<(), ReconnectOutcome> {
        match self {
            Self::Open => Ok(()),
            Self::Idle => Err(ReconnectOutcome::Idle),
            Self::NotDue { remaining } => Err(ReconnectOutcome::NotDue { remaining }),
        }
    }
}

/// Result of one reconnect poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The session is not waiting to reconnect.
    Idle,
    /// Waiting, but the backoff has not elapsed yet.
    NotDue {
        /// Time left until the next attempt is allowed.
        remaining: Duration,
    },
    /// The attempt succeeded.
    Reconnected,
    /// The attempt failed and the backoff grew.
    Failed {
        /// Delay before the next attempt.
        next_backoff: Duration,
    },
}

#[derive(Debug)]
struct MachineInner {
    state: SessionState,
    disconnected_at: Option<Instant>,
    backoff: Duration,
    /// Whether the attempt in flight is a reconnect rather than the first login.
    reconnecting: bool,
}

/// Lock-guarded reconnect state shared by the tick loop and the client.
#[derive(Debug)]
pub struct ReconnectMachine {
    inner: Mutex<MachineInner>,
    floor: Duration,
    cap: Duration,
    reconnects: AtomicU64,
    failed_reconnects: AtomicU64,
}

impl ReconnectMachine {
    /// A disconnected machine with the configured backoff bounds.
    pub fn new(config: &ReconnectConfig) -> Self {
        let floor = config.floor();
        Self {
            inner: Mutex::new(MachineInner {
                state: SessionState::Disconnected,
                disconnected_at: None,
                backoff: floor,
                reconnecting: false,
            }),
            floor,
            cap: config.max_backoff().max(floor),
            reconnects: AtomicU64::new(0),
            failed_reconnects: AtomicU64::new(0),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner
            .lock()
            .map_or(SessionState::Disconnected, |inner| inner.state)
    }

    /// Current retry delay.
    pub fn backoff(&self) -> Duration {
        self.inner.lock().map_or(self.floor, |inner| inner.backoff)
    }

    /// When the connection was last lost or a reconnect last failed.
    pub fn disconnected_at(&self) -> Option<Instant> {
        self.inner.lock().ok().and_then(|inner| inner.disconnected_at)
    }

    /// Successful reconnects so far.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Failed reconnect attempts so far.
    pub fn failed_reconnects(&self) -> u64 {
        self.failed_reconnects.load(Ordering::Relaxed)
    }

    /// `Disconnected -> Connecting` before a first login.
    pub fn begin_login(&self) -> Result<(), SessionError> {
        let Ok(mut inner) = self.inner.lock() else {
            return Err(SessionError::Poisoned);
        };
        if inner.state != SessionState::Disconnected {
            return Err(SessionError::InvalidState {
                operation: "log in",
                state: inner.state,
            });
        }
        inner.state = SessionState::Connecting;
        inner.reconnecting = false;
        Ok(())
    }

    /// `AwaitingReconnect -> Connecting` if the backoff has elapsed at `now`.
    pub fn begin_reconnect(&self, now: Instant) -> ReconnectGate {
        let Ok(mut inner) = self.inner.lock() else {
            return ReconnectGate::Idle;
        };
        if inner.state != SessionState::AwaitingReconnect {
            return ReconnectGate::Idle;
        }
        let since = inner
            .disconnected_at
            .map_or(inner.backoff, |at| now.saturating_duration_since(at));
        if since < inner.backoff {
            return ReconnectGate::NotDue {
                remaining: inner.backoff.saturating_sub(since),
            };
        }
        inner.state = SessionState::Connecting;
        inner.reconnecting = true;
        ReconnectGate::Open
    }

    /// Apply the result of the attempt started by [`begin_login`](Self::begin_login)
    /// or [`begin_reconnect`](Self::begin_reconnect).
    pub fn finish_attempt(&self, succeeded: bool, now: Instant) -> ReconnectOutcome {
        let Ok(mut inner) = self.inner.lock() else {
            return ReconnectOutcome::Idle;
        };
        if inner.state != SessionState::Connecting {
            warn!(state = %inner.state, "Login result arrived outside an attempt");
            return ReconnectOutcome::Idle;
        }
        let reconnecting = inner.reconnecting;
        inner.reconnecting = false;

        if succeeded {
            inner.state = SessionState::Connected;
            inner.disconnected_at = None;
            inner.backoff = self.floor;
            if reconnecting {
                self.reconnects.fetch_add(1, Ordering::Relaxed);
            }
            return ReconnectOutcome::Reconnected;
        }

        if !reconnecting {
            inner.state = SessionState::Disconnected;
            return ReconnectOutcome::Idle;
        }

        inner.state = SessionState::AwaitingReconnect;
        inner.disconnected_at = Some(now);
        inner.backoff = inner.backoff.saturating_mul(2).min(self.cap);
        self.failed_reconnects.fetch_add(1, Ordering::Relaxed);
        ReconnectOutcome::Failed {
            next_backoff: inner.backoff,
        }
    }

    /// `Connected -> AwaitingReconnect`. Ignored in any other state.
    ///
    /// Returns whether the transition happened.
    pub fn connection_lost(&self, now: Instant) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.state != SessionState::Connected {
            return false;
        }
        inner.state = SessionState::AwaitingReconnect;
        inner.disconnected_at = Some(now);
        inner.backoff = self.floor;
        true
    }

    /// Move to `Disconnected`, returning the state that was left.
    pub fn disconnect(&self) -> SessionState {
        let Ok(mut inner) = self.inner.lock() else {
            return SessionState::Disconnected;
        };
        let previous = inner.state;
        inner.state = SessionState::Disconnected;
        inner.disconnected_at = None;
        inner.backoff = self.floor;
        inner.reconnecting = false;
        previous
    }
}

impl WorldListener for ReconnectMachine {
    fn on_notification(&self, notification: &WorldNotification) {
        if let WorldNotification::ConnectionLost { reason } = notification {
            if self.connection_lost(clock_now()) {
                warn!(reason = %reason, backoff = ?self.floor, "Connection lost, awaiting reconnect");
            }
        }
    }
}

/// One trace session: the world client connection and its state machine.
///
/// Tracers and navigation policies receive a reference at start instead of
/// looking the client up from global state.
pub struct Session {
    config: TraceConfig,
    client: Arc<dyn WorldClient>,
    machine: Arc<ReconnectMachine>,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a disconnected session and register its reconnect machine
    /// with the client.
    pub fn new(config: TraceConfig, client: Arc<dyn WorldClient>) -> Self {
        let machine = Arc::new(ReconnectMachine::new(&config.reconnect));
        client.subscribe(Arc::clone(&machine) as Arc<dyn WorldListener>);
        Self {
            config,
            client,
            machine,
        }
    }

    /// Configuration this session runs with.
    pub const fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// The world client this session owns.
    pub fn client(&self) -> &Arc<dyn WorldClient> {
        &self.client
    }

    /// The reconnect state machine.
    pub const fn machine(&self) -> &Arc<ReconnectMachine> {
        &self.machine
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Login request for the configured credentials.
    ///
    /// Uses the start-location variant whenever a start location is
    /// configured.
    pub fn login_request(&self) -> LoginRequest {
        LoginRequest::new(
            &self.config.credentials,
            &self.config.session.user_agent,
            &self.config.session.version,
            self.config.session.start_location.as_ref(),
        )
    }

    /// First login. A failure leaves the session disconnected; no retry
    /// happens at this layer.
    ///
    /// Blocks the calling thread while the world client answers.
    pub fn login(&self) -> Result<String, SessionError> {
        let request = self.begin_login()?;
        let result = self.client.login(&request);
        self.finish_login(result)
    }

    /// [`login`](Self::login) with the client call on the blocking pool.
    pub async fn login_async(&self) -> Result<String, SessionError> {
        let request = self.begin_login()?;
        let result = self.blocking_login(request).await;
        self.finish_login(result)
    }

    /// Attempt one reconnect if waiting and the backoff has elapsed at `now`.
    ///
    /// Blocks the calling thread while the world client answers.
    pub fn poll_reconnect(&self, now: Instant) -> ReconnectOutcome {
        if let Err(outcome) = self.machine.begin_reconnect(now).into_attempt() {
            return outcome;
        }
        let result = self.client.login(&self.login_request());
        self.finish_reconnect(&result, now)
    }

    /// [`poll_reconnect`](Self::poll_reconnect) with the client call on the
    /// blocking pool.
    pub async fn poll_reconnect_async(&self, now: Instant) -> ReconnectOutcome {
        if let Err(outcome) = self.machine.begin_reconnect(now).into_attempt() {
            return outcome;
        }
        let result = self.blocking_login(self.login_request()).await;
        self.finish_reconnect(&result, now)
    }

    /// Graceful stop. Logs out only if currently connected.
    ///
    /// Blocks the calling thread while the world client logs out.
    pub fn logout(&self) {
        if self.begin_logout() {
            self.client.logout();
            info!("Logged out");
        }
    }

    /// [`logout`](Self::logout) with the client call on the blocking pool.
    pub async fn logout_async(&self) {
        if !self.begin_logout() {
            return;
        }
        let client = Arc::clone(&self.client);
        match tokio::task::spawn_blocking(move || client.logout()).await {
            Ok(()) => info!("Logged out"),
            Err(e) => warn!(error = %e, "Logout task failed"),
        }
    }

    fn begin_login(&self) -> Result<LoginRequest, SessionError> {
        self.machine.begin_login()?;
        let request = self.login_request();
        info!(account = %request, located = request.is_located(), "Logging in");
        Ok(request)
    }

    fn finish_login(
        &self,
        result: Result<String, WorldClientError>,
    ) -> Result<String, SessionError> {
        match result {
            Ok(message) => {
                self.machine.finish_attempt(true, clock_now());
                info!(message = %message, "Logged in");
                Ok(message)
            }
            Err(e) => {
                self.machine.finish_attempt(false, clock_now());
                warn!(error = %e, "Login failed");
                Err(e.into())
            }
        }
    }

    fn finish_reconnect(
        &self,
        result: &Result<String, WorldClientError>,
        now: Instant,
    ) -> ReconnectOutcome {
        match result {
            Ok(message) => info!(message = %message, "Reconnected"),
            Err(e) => warn!(error = %e, "Reconnect attempt failed"),
        }
        // Gate the next attempt from when this one finished.
        let finished = now.max(clock_now());
        let outcome = self.machine.finish_attempt(result.is_ok(), finished);
        if let ReconnectOutcome::Failed { next_backoff } = outcome {
            info!(next_backoff = ?next_backoff, "Backing off");
        }
        outcome
    }

    /// Returns whether a connection is up and the client must log out.
    fn begin_logout(&self) -> bool {
        let previous = self.machine.disconnect();
        if previous != SessionState::Connected {
            info!(state = %previous, "Stopped without an active connection");
        }
        previous == SessionState::Connected
    }

    async fn blocking_login(&self, request: LoginRequest) -> Result<String, WorldClientError> {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || client.login(&request))
            .await
            .unwrap_or_else(|e| {
                Err(WorldClientError::Unreachable {
                    message: format!("login task failed: {e}"),
                })
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn machine() -> ReconnectMachine {
        ReconnectMachine::new(&ReconnectConfig::default())
    }

    fn connected(m: &ReconnectMachine) {
        m.begin_login().unwrap();
        m.finish_attempt(true, Instant::now());
    }

    #[test]
    fn first_login_success_and_failure() {
        let m = machine();
        m.begin_login().unwrap();
        assert_eq!(m.state(), SessionState::Connecting);
        assert_eq!(m.finish_attempt(false, Instant::now()), ReconnectOutcome::Idle);
        assert_eq!(m.state(), SessionState::Disconnected);
        assert_eq!(m.failed_reconnects(), 0);

        connected(&m);
        assert_eq!(m.state(), SessionState::Connected);
        assert_eq!(m.reconnects(), 0);
    }

    #[test]
    fn login_while_connected_is_rejected() {
        let m = machine();
        connected(&m);
        assert!(matches!(
            m.begin_login(),
            Err(SessionError::InvalidState {
                state: SessionState::Connected,
                ..
            })
        ));
    }

    #[test]
    fn connection_lost_only_from_connected() {
        let m = machine();
        assert!(!m.connection_lost(Instant::now()));
        assert_eq!(m.state(), SessionState::Disconnected);
        connected(&m);
        assert!(m.connection_lost(Instant::now()));
        assert_eq!(m.state(), SessionState::AwaitingReconnect);
        assert_eq!(m.backoff(), Duration::from_secs(1));
        // A duplicate loss notification changes nothing.
        assert!(!m.connection_lost(Instant::now()));
    }

    #[test]
    fn no_attempt_before_floor() {
        let m = machine();
        connected(&m);
        let t0 = Instant::now();
        m.connection_lost(t0);
        let early = m.begin_reconnect(t0 + Duration::from_millis(999));
        assert_eq!(
            early,
            ReconnectGate::NotDue {
                remaining: Duration::from_millis(1)
            }
        );
        assert_eq!(m.state(), SessionState::AwaitingReconnect);
    }

    #[test]
    fn backoff_doubles_and_resets() {
        let m = machine();
        connected(&m);
        let t0 = Instant::now();
        m.connection_lost(t0);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(m.begin_reconnect(t1), ReconnectGate::Open);
        assert_eq!(
            m.finish_attempt(false, t1),
            ReconnectOutcome::Failed {
                next_backoff: Duration::from_secs(2)
            }
        );

        let t2 = t1 + Duration::from_secs(2);
        assert!(matches!(
            m.begin_reconnect(t2 - Duration::from_millis(1)),
            ReconnectGate::NotDue { .. }
        ));
        assert_eq!(m.begin_reconnect(t2), ReconnectGate::Open);
        m.finish_attempt(false, t2);
        assert_eq!(m.backoff(), Duration::from_secs(4));

        let t3 = t2 + Duration::from_secs(4);
        assert_eq!(m.begin_reconnect(t3), ReconnectGate::Open);
        assert_eq!(m.finish_attempt(true, t3), ReconnectOutcome::Reconnected);
        assert_eq!(m.state(), SessionState::Connected);
        assert_eq!(m.backoff(), Duration::from_secs(1));
        assert_eq!(m.reconnects(), 1);
        assert_eq!(m.failed_reconnects(), 2);
    }

    #[test]
    fn backoff_is_capped() {
        let m = ReconnectMachine::new(&ReconnectConfig {
            floor_ms: 1000,
            max_backoff_ms: 3000,
        });
        connected(&m);
        let mut now = Instant::now();
        m.connection_lost(now);
        for _ in 0..5 {
            now += m.backoff();
            assert_eq!(m.begin_reconnect(now), ReconnectGate::Open);
            m.finish_attempt(false, now);
        }
        assert_eq!(m.backoff(), Duration::from_secs(3));
    }

    #[test]
    fn disconnect_reports_previous_state() {
        let m = machine();
        connected(&m);
        assert_eq!(m.disconnect(), SessionState::Connected);
        assert_eq!(m.disconnect(), SessionState::Disconnected);
    }
}
