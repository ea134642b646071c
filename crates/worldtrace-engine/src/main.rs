//! Trace runner binary for worldtrace.
//!
//! Wires a world client, the object path tracer and a navigation policy
//! into one session and runs it until the configured duration elapses or
//! the operator presses Ctrl-C. The world is the offline simulated world,
//! so a run needs no network access.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `worldtrace.yaml` (or `WORLDTRACE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulated world client
//! 4. Create tracers and the navigation policy
//! 5. Create the session
//! 6. Install the Ctrl-C handler
//! 7. Run the session
//! 8. Log the result

mod error;
mod rotating;
mod simulated;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worldtrace_core::config::TraceConfig;
use worldtrace_core::control::SessionControl;
use worldtrace_core::navigation::{NavigationPolicy, StationaryPolicy};
use worldtrace_core::object_path::ObjectPathTracer;
use worldtrace_core::runner::{self, log_session_end};
use worldtrace_core::session::Session;
use worldtrace_core::tracer::Tracer;
use worldtrace_core::world::WorldClient;

use crate::error::EngineError;
use crate::rotating::{STATIC_ROTATING, StaticRotatingPolicy};
use crate::simulated::{SimulatedWorld, SimulationSettings};

/// Default configuration file name.
const CONFIG_FILE: &str = "worldtrace.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the policy name is
/// unknown, or the session fails to start.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so errors here go to stderr.
    let config = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        avatar = %format!("{} {}", config.credentials.first_name, config.credentials.last_name),
        duration_secs = config.session.duration_secs,
        tick_interval_ms = config.session.tick_interval_ms,
        output = %config.tracer.output_path.display(),
        policy = %config.navigation.policy,
        "worldtrace starting"
    );

    // 3. Create the world client.
    let settings = simulation_settings();
    info!(seed = ?settings.seed, step = ?settings.step, "Using simulated world");
    let world = Arc::new(SimulatedWorld::new(settings));
    let client: Arc<dyn WorldClient> = world.clone();

    // 4. Create tracers and the navigation policy.
    let mut navigation = build_policy(&config)?;
    let mut tracers: Vec<Box<dyn Tracer>> =
        vec![Box::new(ObjectPathTracer::from_config(&config.tracer))];
    info!(
        tracers = tracers.len(),
        navigation = navigation.name(),
        "Collaborators created"
    );

    // 5. Create the session.
    let session = Session::new(config, client);

    // 6. Install the Ctrl-C handler.
    let control = Arc::new(SessionControl::new());
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping session");
                control.request_stop();
            } else {
                warn!("Failed to listen for Ctrl-C");
            }
        });
    }

    // 7. Run the session.
    let result = runner::run_session(
        &session,
        &mut tracers,
        Some(navigation.as_mut()),
        &control,
    )
    .await
    .map_err(EngineError::from)?;

    // 8. Log the result.
    log_session_end(&result);
    let avatar = world.avatar();
    info!(
        login_attempts = world.login_attempts(),
        connections = world.epoch(),
        movement_updates = avatar.updates_sent(),
        draw_distance = ?avatar.draw_distance(),
        last_look = ?avatar.look_direction(),
        "Simulated world summary"
    );
    info!("worldtrace shutdown complete");

    Ok(())
}

/// Load configuration from `WORLDTRACE_CONFIG` or `worldtrace.yaml`.
///
/// A missing file falls back to defaults with environment overrides
/// applied. A file that exists but fails to parse or validate is an error.
fn load_config() -> Result<TraceConfig, EngineError> {
    let path = std::env::var_os("WORLDTRACE_CONFIG")
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    if path.exists() {
        Ok(TraceConfig::from_file(&path)?)
    } else {
        let mut config = TraceConfig::default();
        config.credentials.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Simulated world settings, seeded from `WORLDTRACE_SEED` when set.
fn simulation_settings() -> SimulationSettings {
    let seed = std::env::var("WORLDTRACE_SEED")
        .ok()
        .and_then(|s| s.parse().ok());
    SimulationSettings {
        seed,
        ..SimulationSettings::default()
    }
}

/// Instantiate the navigation policy named in configuration.
fn build_policy(config: &TraceConfig) -> Result<Box<dyn NavigationPolicy>, EngineError> {
    match config.navigation.policy.as_str() {
        "none" => Ok(Box::new(StationaryPolicy::new())),
        STATIC_ROTATING => Ok(Box::new(StaticRotatingPolicy::from_config(
            &config.navigation,
        ))),
        other => Err(EngineError::UnknownPolicy {
            name: other.to_owned(),
        }),
    }
}
