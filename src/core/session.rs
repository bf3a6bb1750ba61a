use crate::core::config::Config;
use crate::core::exercise::{strategy_for, ExerciseState, ExerciseStrategy, Landmarks};
use crate::core::frame_encoder::{EncodeOutcome, FrameEncoder};
use crate::core::overlay::{self, Hud, OverlayItem};
use crate::core::sink::EventSink;
use crate::models::capture::{CaptureError, RawFrame, SourceKind};
use crate::models::exercise::ExerciseKind;
use crate::models::session::{FrameEvent, ServerEvent, SessionStatus, StopReason};
use crate::platform::capture::{FrameSource, SourceFactory};
use crate::platform::pose::PoseEstimator;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Frame source failed: {0}")]
    Source(#[from] CaptureError),

    #[error("Frame processing failed: {0}")]
    Processing(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

// ==============================================================================
// Shared Session State
// ==============================================================================

/// Session fields readable outside the worker.
///
/// The worker is the only writer of counters and activity; `heartbeat()` only
/// touches its timestamp, and the registry only cancels.
pub struct SessionShared {
    pub session_id: String,
    pub exercise: ExerciseKind,
    pub client_addr: String,
    started_at: Instant,
    left_count: AtomicU32,
    right_count: AtomicU32,
    fps: AtomicU32,
    source_kind: AtomicU8,
    // Millisecond offsets from `started_at`
    last_heartbeat_ms: AtomicU64,
    last_activity_ms: AtomicU64,
    cancel: CancellationToken,
}

impl SessionShared {
    pub fn new(
        session_id: String,
        exercise: ExerciseKind,
        client_addr: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            exercise,
            client_addr,
            started_at: Instant::now(),
            left_count: AtomicU32::new(0),
            right_count: AtomicU32::new(0),
            fps: AtomicU32::new(0),
            source_kind: AtomicU8::new(0),
            last_heartbeat_ms: AtomicU64::new(0),
            last_activity_ms: AtomicU64::new(0),
            cancel,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn touch_heartbeat(&self) {
        self.last_heartbeat_ms.fetch_max(self.elapsed_ms(), Ordering::Relaxed);
    }

    pub fn touch_activity(&self) {
        self.last_activity_ms.fetch_max(self.elapsed_ms(), Ordering::Relaxed);
    }

    pub fn since_heartbeat(&self) -> Duration {
        let last = self.last_heartbeat_ms.load(Ordering::Relaxed);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    pub fn since_activity(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    /// Publish counters. They only ever grow.
    pub fn record_counts(&self, left: u32, right: u32) {
        self.left_count.fetch_max(left, Ordering::Relaxed);
        self.right_count.fetch_max(right, Ordering::Relaxed);
    }

    pub fn counts(&self) -> (u32, u32) {
        (
            self.left_count.load(Ordering::Relaxed),
            self.right_count.load(Ordering::Relaxed),
        )
    }

    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    fn set_fps(&self, fps: u32) {
        self.fps.store(fps, Ordering::Relaxed);
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.source_kind.load(Ordering::Relaxed) {
            0 => SourceKind::Camera,
            _ => SourceKind::Synthetic,
        }
    }

    fn set_source_kind(&self, kind: SourceKind) {
        let value = match kind {
            SourceKind::Camera => 0,
            SourceKind::Synthetic => 1,
        };
        self.source_kind.store(value, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn status(&self) -> SessionStatus {
        let (left_count, right_count) = self.counts();
        SessionStatus {
            session_id: self.session_id.clone(),
            exercise_id: self.exercise.id().to_string(),
            left_count,
            right_count,
            fps: self.fps(),
            elapsed_secs: self.elapsed().as_secs_f64(),
        }
    }
}

// ==============================================================================
// FPS Meter
// ==============================================================================

/// Frames per second over a one second window
#[derive(Debug)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Count a frame. Returns the rate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let fps = (self.frames as f64 / elapsed.as_secs_f64()).round() as u32;
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}

// ==============================================================================
// Worker
// ==============================================================================

/// Loop state owned by the worker task
struct LoopState {
    fps: FpsMeter,
    captured: u64,
    reopened: bool,
}

/// Per-frame state, moved onto the blocking pool while a frame is annotated
struct FrameState {
    exercise: ExerciseState,
    encoder: FrameEncoder,
    feedback: String,
}

/// Result of annotating one frame
struct Annotated {
    state: FrameState,
    event: Option<ServerEvent>,
    rendered: bool,
}

pub struct SessionWorker {
    shared: Arc<SessionShared>,
    config: Arc<Config>,
    factory: Arc<dyn SourceFactory>,
    estimator: Arc<dyn PoseEstimator>,
    sink: Arc<dyn EventSink>,
}

impl SessionWorker {
    pub fn new(
        shared: Arc<SessionShared>,
        config: Arc<Config>,
        factory: Arc<dyn SourceFactory>,
        estimator: Arc<dyn PoseEstimator>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            shared,
            config,
            factory,
            estimator,
            sink,
        }
    }

    fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    /// Run until cancelled, timed out or faulted. The source is released on every exit.
    pub async fn run(self) -> StopReason {
        let mut source = self.factory.create(self.shared.exercise);
        self.shared.set_source_kind(source.kind());

        let result = self.run_loop(&mut source).await;
        source.release().await;

        let reason = match result {
            Ok(reason) => reason,
            Err(e) => {
                log::error!("Session {} faulted: {}", self.session_id(), e);
                self.sink.send(
                    self.session_id(),
                    &ServerEvent::error(Some(self.session_id()), e.to_string()),
                );
                StopReason::Faulted
            }
        };

        log::info!(
            "Stopped pose tracking for session {} ({})",
            self.session_id(),
            reason.to_string()
        );
        self.sink.send(
            self.session_id(),
            &ServerEvent::Stopped {
                session_id: self.shared.session_id.clone(),
                reason,
            },
        );
        reason
    }

    async fn run_loop(&self, source: &mut Box<dyn FrameSource>) -> SessionResult<StopReason> {
        let strategy = strategy_for(self.shared.exercise);
        let mut frame_state = FrameState {
            exercise: strategy.new_state(),
            encoder: FrameEncoder::new(
                self.config.quality(),
                self.config.frame_rate_limit,
                self.config.encode_failure_notice_threshold,
            ),
            feedback: String::new(),
        };
        let mut state = LoopState {
            fps: FpsMeter::new(Instant::now()),
            captured: 0,
            reopened: false,
        };

        if let Err(e) = source.open().await {
            self.degrade(source, e).await?;
        }

        log::info!(
            "Started pose tracking for session {} ({}, {} source)",
            self.session_id(),
            self.shared.exercise,
            source.kind().to_string()
        );

        let cancel = self.shared.cancellation().clone();
        let frame_skip = u64::from(self.config.frame_skip.max(1));

        loop {
            if cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            if self.shared.since_heartbeat() > self.config.heartbeat_timeout() {
                log::warn!("Session {} missed heartbeats, stopping", self.session_id());
                return Ok(StopReason::HeartbeatTimeout);
            }
            self.shared.touch_activity();

            let read = tokio::select! {
                _ = cancel.cancelled() => return Ok(StopReason::Cancelled),
                read = source.read() => read,
            };

            match read {
                Ok(Some(frame)) => {
                    // A good read after a reopen re-arms the reopen attempt
                    state.reopened = false;
                    state.captured += 1;
                    if state.captured % frame_skip == 0 {
                        frame_state = self
                            .process_frame(frame, frame_state, strategy, &mut state, source.kind())
                            .await?;
                    }
                }
                Ok(None) => {}
                Err(e) => self.recover(source, &mut state, e).await?,
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(StopReason::Cancelled),
                _ = tokio::time::sleep(self.config.loop_interval()) => {}
            }
        }
    }

    /// Reopen the source once after a read failure, then fall back to simulation
    async fn recover(
        &self,
        source: &mut Box<dyn FrameSource>,
        state: &mut LoopState,
        error: CaptureError,
    ) -> SessionResult<()> {
        if source.kind() == SourceKind::Synthetic || state.reopened {
            return self.degrade(source, error).await;
        }

        state.reopened = true;
        log::warn!(
            "Read failed for session {}: {}. Reopening source",
            self.session_id(),
            error
        );
        source.release().await;

        tokio::select! {
            _ = self.shared.cancellation().cancelled() => return Ok(()),
            _ = tokio::time::sleep(self.config.reopen_backoff()) => {}
        }

        match source.open().await {
            Ok(()) => Ok(()),
            Err(e) => self.degrade(source, e).await,
        }
    }

    /// Replace a failed source with the simulation feed and tell the client once
    async fn degrade(&self, source: &mut Box<dyn FrameSource>, error: CaptureError) -> SessionResult<()> {
        if source.kind() == SourceKind::Synthetic {
            return Err(SessionError::Source(error));
        }

        source.release().await;
        log::warn!(
            "Camera unavailable for session {} ({}), switching to simulation mode",
            self.session_id(),
            error
        );

        let mut fallback = self.factory.fallback(self.shared.exercise);
        fallback.open().await?;
        *source = fallback;
        self.shared.set_source_kind(source.kind());

        self.sink.send(
            self.session_id(),
            &ServerEvent::error(
                Some(self.session_id()),
                format!("Camera unavailable ({}), switched to simulation mode", error),
            ),
        );
        Ok(())
    }

    /// Annotate a frame on the blocking pool, then publish the result
    async fn process_frame(
        &self,
        frame: RawFrame,
        frame_state: FrameState,
        strategy: &'static dyn ExerciseStrategy,
        state: &mut LoopState,
        source_kind: SourceKind,
    ) -> SessionResult<FrameState> {
        let shared = self.shared.clone();
        let config = self.config.clone();
        let estimator = self.estimator.clone();

        let annotated = tokio::task::spawn_blocking(move || {
            Self::annotate_frame_sync(
                &shared,
                &config,
                estimator.as_ref(),
                strategy,
                frame,
                frame_state,
                source_kind,
            )
        })
        .await
        .map_err(|e| SessionError::Processing(format!("Task join error: {}", e)))?;

        if let Some(event) = &annotated.event {
            self.sink.send(self.session_id(), event);
        }
        if annotated.rendered {
            if let Some(fps) = state.fps.tick(Instant::now()) {
                self.shared.set_fps(fps);
            }
        }
        Ok(annotated.state)
    }

    /// Pose estimation, exercise evaluation, overlay and JPEG encoding for one frame
    fn annotate_frame_sync(
        shared: &SessionShared,
        config: &Config,
        estimator: &dyn PoseEstimator,
        strategy: &dyn ExerciseStrategy,
        mut frame: RawFrame,
        mut state: FrameState,
        source_kind: SourceKind,
    ) -> Annotated {
        let session_id = shared.session_id.as_str();
        if config.mirror_frames {
            frame.mirror_horizontal();
        }

        let landmarks = estimator.estimate(&frame).unwrap_or_else(|e| {
            log::debug!("Pose estimation failed for session {}: {}", session_id, e);
            None
        });

        let mut items: Vec<OverlayItem> = Vec::new();
        if let Some(landmarks) = landmarks.as_ref() {
            let view = Landmarks::new(landmarks, config.min_landmark_visibility);
            let evaluation = strategy.evaluate(&view, &mut state.exercise, Instant::now());
            shared.record_counts(evaluation.left_count, evaluation.right_count);
            for seconds in &evaluation.milestones {
                log::info!("Session {} held for {}s", session_id, seconds);
            }
            if let Some(feedback) = evaluation.feedback {
                state.feedback = feedback;
            }
            items = evaluation.overlay;
        }

        let mut image = match frame.into_rgb_image() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Dropping frame for session {}: {}", session_id, e);
                return Annotated {
                    state,
                    event: None,
                    rendered: false,
                };
            }
        };

        let (left_count, right_count) = shared.counts();
        overlay::render(&mut image, &items);
        overlay::draw_hud(
            &mut image,
            &Hud {
                exercise_name: shared.exercise.display_name(),
                left_count,
                right_count,
                feedback: Some(state.feedback.as_str()),
                fps: shared.fps(),
                source: source_kind,
            },
        );

        let event = match state.encoder.encode(&image) {
            EncodeOutcome::Encoded(jpeg) => Some(ServerEvent::Frame(FrameEvent {
                session_id: shared.session_id.clone(),
                jpeg,
                left_count,
                right_count,
                feedback_text: state.feedback.clone(),
                fps: shared.fps(),
                source: source_kind,
            })),
            EncodeOutcome::Throttled => None,
            EncodeOutcome::Failed { error, notify } => {
                log::warn!("Frame encoding failed for session {}: {}", session_id, error);
                notify.then(|| {
                    ServerEvent::error(
                        Some(session_id),
                        format!("Frames are failing to encode: {}", error),
                    )
                })
            }
        };

        Annotated {
            state,
            event,
            rendered: true,
        }
    }
}
