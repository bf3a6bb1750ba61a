pub mod core;
pub mod models;
pub mod platform;

use crate::core::config::Config;
use crate::core::registry::SessionRegistry;
use crate::core::sink::{EventHub, EventSink, FanoutSink, MjpegSink};
use crate::models::exercise::{ExerciseInfo, ExerciseKind};
use crate::models::session::{ClientMessage, HealthReport, ServerEvent, SessionStatus, StopReason};
use crate::platform::capture::{CameraSourceFactory, SourceFactory, SyntheticSourceFactory};
use crate::platform::pose::{NoPoseEstimator, PoseEstimator, SimulatedPoseEstimator};
use crate::models::pose::PoseConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: SessionRegistry,
    pub hub: EventHub,
    pub mjpeg: MjpegSink,
}

/// Initialize logging from `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Wire the registry to its frame source, estimator and delivery sinks
pub fn build_state(config: Config) -> AppState {
    let config = Arc::new(config);

    let (factory, estimator): (Arc<dyn SourceFactory>, Arc<dyn PoseEstimator>) = if config.simulate {
        log::info!("Simulation mode enabled, camera will not be opened");
        (
            Arc::new(SyntheticSourceFactory),
            Arc::new(SimulatedPoseEstimator::new()),
        )
    } else {
        (
            Arc::new(CameraSourceFactory::new(config.camera.clone())),
            Arc::new(NoPoseEstimator::new(&PoseConfig::default())),
        )
    };
    log::info!("Pose estimator: {}", estimator.model_info());

    let hub = EventHub::new();
    let mjpeg = MjpegSink::new();
    let sink: Arc<dyn EventSink> = Arc::new(FanoutSink::new(vec![
        Arc::new(hub.clone()),
        Arc::new(mjpeg.clone()),
    ]));

    AppState {
        registry: SessionRegistry::new(config.clone(), factory, estimator, sink),
        config,
        hub,
        mjpeg,
    }
}

// Session commands
pub async fn start_exercise(
    state: &AppState,
    client_addr: &str,
    exercise_id: &str,
) -> Result<String, String> {
    state
        .registry
        .start(client_addr, exercise_id)
        .await
        .map_err(|e| format!("Failed to start session: {}", e))
}

/// Stop a session. Unknown or already stopped ids are a no-op.
pub async fn stop_exercise(state: &AppState, session_id: &str) -> Result<(), String> {
    if !state.registry.stop(session_id).await {
        log::debug!("Stop for inactive session {} ignored", session_id);
    }
    Ok(())
}

pub async fn heartbeat(state: &AppState, session_id: &str) -> Result<(), String> {
    if state.registry.heartbeat(session_id).await {
        Ok(())
    } else {
        Err(format!("Session not found: {}", session_id))
    }
}

pub async fn get_session_status(state: &AppState, session_id: &str) -> Result<SessionStatus, String> {
    state
        .registry
        .status(session_id)
        .await
        .ok_or_else(|| format!("Session not found: {}", session_id))
}

// Catalog and health commands
pub fn list_exercises() -> Vec<ExerciseInfo> {
    ExerciseKind::all().into_iter().map(ExerciseInfo::from).collect()
}

pub async fn health_check(state: &AppState) -> Result<HealthReport, String> {
    Ok(state.registry.health().await)
}

/// Handle one inbound client message and return the direct reply, if any.
///
/// Frames and stop notifications are delivered asynchronously through the sinks.
pub async fn handle_client_message(
    state: &AppState,
    client_addr: &str,
    msg: ClientMessage,
) -> Option<ServerEvent> {
    match msg {
        ClientMessage::Connected => Some(ServerEvent::Connected {
            client_addr: client_addr.to_string(),
        }),
        ClientMessage::Start { exercise_id } => {
            match start_exercise(state, client_addr, &exercise_id).await {
                Ok(session_id) => Some(ServerEvent::Started {
                    session_id,
                    exercise_id,
                }),
                Err(e) => Some(ServerEvent::error(None, e)),
            }
        }
        ClientMessage::Stop { session_id } => stop_exercise(state, &session_id)
            .await
            .err()
            .map(|e| ServerEvent::error(Some(&session_id), e)),
        ClientMessage::Heartbeat { session_id } => heartbeat(state, &session_id)
            .await
            .err()
            .map(|e| ServerEvent::error(Some(&session_id), e)),
        ClientMessage::Status { session_id } => {
            match get_session_status(state, &session_id).await {
                Ok(status) => Some(ServerEvent::Status(status)),
                Err(e) => Some(ServerEvent::error(Some(&session_id), e)),
            }
        }
    }
}

// ==============================================================================
// Runner
// ==============================================================================

/// What `run` should do
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub exercise_id: String,
    pub client_addr: String,
    pub duration: Duration,
    /// Write the multipart MJPEG stream here
    pub mjpeg_out: Option<PathBuf>,
}

/// Outcome of a `run`
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub session_id: String,
    pub frames_received: u64,
    pub final_status: Option<SessionStatus>,
    pub stop_reason: Option<StopReason>,
    pub mjpeg_bytes: u64,
}

/// Run one session for `duration`, acting as its client
pub async fn run(config: Config, options: RunOptions) -> Result<RunSummary, String> {
    let heartbeat_every = (config.heartbeat_timeout() / 3).min(Duration::from_secs(1));

    let file = match options.mjpeg_out.as_ref() {
        Some(path) => Some(
            tokio::fs::File::create(path)
                .await
                .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?,
        ),
        None => None,
    };

    let state = build_state(config);
    let sweeper = state.registry.spawn_sweeper();

    let session_id = match start_exercise(&state, &options.client_addr, &options.exercise_id).await {
        Ok(session_id) => session_id,
        Err(e) => {
            state.registry.shutdown().await;
            let _ = sweeper.await;
            return Err(e);
        }
    };
    let mut events = state.hub.subscribe(&session_id);

    let writer = file.map(|mut file| {
        let mut parts = state.mjpeg.subscribe(&session_id);
        tokio::spawn(async move {
            let mut written = 0u64;
            while let Some(part) = parts.recv().await {
                file.write_all(&part).await?;
                written += part.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, std::io::Error>(written)
        })
    });

    log::info!(
        "Session {} running {} for {:?}",
        session_id,
        options.exercise_id,
        options.duration
    );

    let deadline = tokio::time::sleep(options.duration);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(heartbeat_every);
    let mut stopping = false;
    let mut frames_received = 0u64;
    let mut final_status = None;

    let stop_reason = loop {
        tokio::select! {
            _ = &mut deadline, if !stopping => {
                stopping = true;
                final_status = state.registry.status(&session_id).await;
                state.registry.stop(&session_id).await;
            }
            _ = ticker.tick(), if !stopping => {
                if !state.registry.heartbeat(&session_id).await {
                    log::warn!("Session {} is gone", session_id);
                }
            }
            event = events.recv() => match event {
                Some(ServerEvent::Frame(frame)) => {
                    frames_received += 1;
                    log::debug!(
                        "Frame {} left={} right={} fps={} {}",
                        frames_received,
                        frame.left_count,
                        frame.right_count,
                        frame.fps,
                        frame.feedback_text
                    );
                }
                Some(ServerEvent::Error { message, .. }) => log::warn!("{}", message),
                Some(ServerEvent::Stopped { reason, .. }) => break Some(reason),
                Some(_) => {}
                None => break None,
            },
        }
    };

    let mjpeg_bytes = match writer {
        Some(handle) => handle
            .await
            .map_err(|e| format!("MJPEG writer crashed: {}", e))?
            .map_err(|e| format!("Failed to write MJPEG stream: {}", e))?,
        None => 0,
    };

    state.registry.shutdown().await;
    let _ = sweeper.await;

    Ok(RunSummary {
        session_id,
        frames_received,
        final_status,
        stop_reason,
        mjpeg_bytes,
    })
}
