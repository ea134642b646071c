//! Session run loop.
//!
//! [`run_session`] drives one trace session from start to finish:
//!
//! - **Start**: every tracer receives `start_trace`, in registration order,
//!   then the navigation policy receives `start` with a movement handle
//! - **Login**: one attempt; failure ends the run without retry
//! - **Tick loop**: navigation update, duration check, and a reconnect
//!   attempt when one is due
//! - **Stop**: graceful logout, then `stop_trace` on every tracer in
//!   registration order
//!
//! The loop ends when the configured duration has elapsed or an operator
//! requests a stop through [`SessionControl`].
//!
//! Logins and the logout block on the world client, so the loop awaits the
//! session's `_async` operations, which run them on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::control::SessionControl;
use crate::navigation::NavigationPolicy;
use crate::session::{ReconnectOutcome, Session, SessionError, SessionState};
use crate::tracer::{Tracer, TracerError};

/// Errors that end a session run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The first login failed or the session was in the wrong state.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: SessionError,
    },

    /// A tracer failed to start or stop.
    #[error("tracer error: {source}")]
    Tracer {
        /// The underlying tracer error.
        #[from]
        source: TracerError,
    },
}

/// Reason why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The configured duration elapsed.
    DurationElapsed,
    /// An operator requested a stop.
    OperatorStop,
}

/// Summary of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    /// Why the session ended.
    pub end_reason: SessionEndReason,
    /// Number of ticks executed.
    pub ticks: u64,
    /// Successful reconnects.
    pub reconnects: u64,
    /// Failed reconnect attempts.
    pub failed_reconnects: u64,
    /// Time spent in the tick loop.
    pub elapsed: Duration,
}

/// Run a session until its duration elapses or a stop is requested.
///
/// # Arguments
///
/// * `session` - The session, disconnected
/// * `tracers` - Tracers to start and stop around the run, in order
/// * `navigation` - Optional navigation policy, updated once per tick
/// * `control` - Shared stop control
///
/// # Errors
///
/// Returns [`RunnerError`] if a tracer fails to start, if the first login
/// fails, or if a tracer fails to stop. Every started tracer is stopped
/// before an error is returned.
pub async fn run_session(
    session: &Session,
    tracers: &mut [Box<dyn Tracer>],
    navigation: Option<&mut dyn NavigationPolicy>,
    control: &Arc<SessionControl>,
) -> Result<SessionResult, RunnerError> {
    let mut navigation = navigation;
    let config = &session.config().session;
    let duration = config.duration();
    let tick_interval = config.tick_interval();

    info!(
        duration_secs = config.duration_secs,
        tick_interval_ms = config.tick_interval_ms,
        tracers = tracers.len(),
        navigation = ?navigation.as_ref().map(|n| n.name()),
        "Session starting"
    );

    // --- Start collaborators ---
    for started in 0..tracers.len() {
        let Some(tracer) = tracers.get_mut(started) else {
            break;
        };
        if let Err(e) = tracer.start_trace(session) {
            warn!(tracer = tracer.name(), error = %e, "Tracer failed to start");
            if let Some(already_started) = tracers.get_mut(..started) {
                let _ = stop_tracers(already_started);
            }
            return Err(e.into());
        }
    }
    if let Some(nav) = navigation.as_mut() {
        nav.start(session, session.client().movement());
    }

    // --- First login ---
    if let Err(e) = session.login_async().await {
        let _ = stop_tracers(tracers);
        return Err(e.into());
    }

    // --- Tick loop ---
    let started_at = Instant::now();
    let mut ticks: u64 = 0;
    let end_reason = loop {
        if control.is_stop_requested() {
            info!(ticks, "Operator stop requested");
            break SessionEndReason::OperatorStop;
        }

        if let Some(nav) = navigation.as_mut() {
            nav.update();
        }
        ticks = ticks.saturating_add(1);

        if started_at.elapsed() >= duration {
            info!(ticks, duration_secs = duration.as_secs(), "Session duration elapsed");
            break SessionEndReason::DurationElapsed;
        }

        if session.state() == SessionState::AwaitingReconnect
            && session.poll_reconnect_async(Instant::now().into_std()).await
                == ReconnectOutcome::Reconnected
        {
            info!(ticks, "Session resumed");
        }

        control.sleep_or_stop(tick_interval).await;
    };
    let elapsed = started_at.elapsed();

    // --- Stop ---
    session.logout_async().await;
    let stop_result = stop_tracers(tracers);

    let machine = session.machine();
    let result = SessionResult {
        end_reason,
        ticks,
        reconnects: machine.reconnects(),
        failed_reconnects: machine.failed_reconnects(),
        elapsed,
    };
    stop_result.map(|()| result)
}

/// Stop every tracer in order, returning the first failure.
fn stop_tracers(tracers: &mut [Box<dyn Tracer>]) -> Result<(), RunnerError> {
    let mut first_error = None;
    for tracer in tracers.iter_mut() {
        if let Err(e) = tracer.stop_trace() {
            warn!(tracer = tracer.name(), error = %e, "Tracer failed to stop");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), |e| Err(e.into()))
}

/// Log the end of a session.
pub fn log_session_end(result: &SessionResult) {
    info!(
        reason = ?result.end_reason,
        ticks = result.ticks,
        reconnects = result.reconnects,
        failed_reconnects = result.failed_reconnects,
        elapsed = ?result.elapsed,
        "Session ended"
    );
    if result.failed_reconnects > 0 && result.reconnects == 0 {
        warn!("Session never recovered from its last disconnect");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TraceConfig;
    use crate::navigation::StationaryPolicy;
    use crate::stub::StubWorldClient;

    fn config(duration_secs: u64) -> TraceConfig {
        let mut config = TraceConfig::default();
        config.session.duration_secs = duration_secs;
        config.session.tick_interval_ms = 100;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn duration_bounds_the_run() {
        let client = Arc::new(StubWorldClient::new());
        let session = Session::new(config(2), client.clone());
        let control = Arc::new(SessionControl::new());
        let mut policy = StationaryPolicy::new();

        let result = run_session(&session, &mut [], Some(&mut policy), &control)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SessionEndReason::DurationElapsed);
        // 20 full sleeps of 100ms, then the tick that observes the limit.
        assert_eq!(result.ticks, 21);
        assert_eq!(policy.updates(), 21);
        assert_eq!(client.logout_count(), 1);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn operator_stop_before_first_tick() {
        let client = Arc::new(StubWorldClient::new());
        let session = Session::new(config(3600), client.clone());
        let control = Arc::new(SessionControl::new());
        control.request_stop();

        let result = run_session(&session, &mut [], None, &control).await.unwrap();

        assert_eq!(result.end_reason, SessionEndReason::OperatorStop);
        assert_eq!(result.ticks, 0);
        assert_eq!(client.login_count(), 1);
        assert_eq!(client.logout_count(), 1);
    }

    #[tokio::test]
    async fn failed_first_login_ends_run() {
        let client = Arc::new(StubWorldClient::new());
        client.script_rejection("unknown account");
        let session = Session::new(config(3600), client.clone());
        let control = Arc::new(SessionControl::new());

        let err = run_session(&session, &mut [], None, &control).await;

        assert!(matches!(err, Err(RunnerError::Session { .. })));
        assert_eq!(client.login_count(), 1);
        assert_eq!(client.logout_count(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
