// Session admission, quotas, heartbeats and the stale-session sweeper

use crate::core::config::Config;
use crate::core::session::{SessionShared, SessionWorker};
use crate::core::sink::EventSink;
use crate::models::exercise::ExerciseKind;
use crate::models::session::{HealthReport, ServerEvent, SessionStatus, StopReason};
use crate::platform::capture::SourceFactory;
use crate::platform::pose::PoseEstimator;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unsupported exercise: {0}")]
    UnsupportedExercise(String),
    #[error("Client {client} already has {limit} active sessions")]
    QuotaExceeded { client: String, limit: usize },
    #[error("Registry is shutting down")]
    ShuttingDown,
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, Arc<SessionShared>>,
    client_counts: HashMap<String, usize>,
}

impl RegistryState {
    /// Remove a session and give back its quota slot. Only the first call for an id does anything.
    fn remove(&mut self, session_id: &str) -> Option<Arc<SessionShared>> {
        let shared = self.sessions.remove(session_id)?;
        if let Some(count) = self.client_counts.get_mut(&shared.client_addr) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.client_counts.remove(&shared.client_addr);
            }
        }
        shared.cancel();
        Some(shared)
    }
}

struct RegistryInner {
    config: Arc<Config>,
    factory: Arc<dyn SourceFactory>,
    estimator: Arc<dyn PoseEstimator>,
    sink: Arc<dyn EventSink>,
    state: Mutex<RegistryState>,
    shutdown: CancellationToken,
    started_at: Instant,
}

/// Owns every live session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(
        config: Arc<Config>,
        factory: Arc<dyn SourceFactory>,
        estimator: Arc<dyn PoseEstimator>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config,
                factory,
                estimator,
                sink,
                state: Mutex::new(RegistryState::default()),
                shutdown: CancellationToken::new(),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Admit a new session for `client_addr` and start its worker
    pub async fn start(&self, client_addr: &str, exercise_id: &str) -> RegistryResult<String> {
        let exercise = ExerciseKind::from_id(exercise_id)
            .ok_or_else(|| RegistryError::UnsupportedExercise(exercise_id.to_string()))?;
        let limit = self.inner.config.max_sessions_per_client;

        let shared = {
            let mut state = self.inner.state.lock().await;

            if self.inner.shutdown.is_cancelled() {
                return Err(RegistryError::ShuttingDown);
            }

            let active = state.client_counts.get(client_addr).copied().unwrap_or(0);
            if active >= limit {
                log::warn!(
                    "Rejected {} session for {}: {} of {} slots in use",
                    exercise,
                    client_addr,
                    active,
                    limit
                );
                return Err(RegistryError::QuotaExceeded {
                    client: client_addr.to_string(),
                    limit,
                });
            }

            let shared = Arc::new(SessionShared::new(
                Uuid::new_v4().to_string(),
                exercise,
                client_addr.to_string(),
                self.inner.shutdown.child_token(),
            ));
            state
                .sessions
                .insert(shared.session_id.clone(), shared.clone());
            *state
                .client_counts
                .entry(client_addr.to_string())
                .or_insert(0) += 1;
            shared
        };

        log::info!(
            "Starting {} session {} for {}",
            exercise,
            shared.session_id,
            client_addr
        );
        let session_id = shared.session_id.clone();
        self.spawn_supervised(shared);
        Ok(session_id)
    }

    /// Run the worker under a supervisor that reports panics and always finalizes
    fn spawn_supervised(&self, shared: Arc<SessionShared>) {
        let worker = SessionWorker::new(
            shared.clone(),
            self.inner.config.clone(),
            self.inner.factory.clone(),
            self.inner.estimator.clone(),
            self.inner.sink.clone(),
        );
        let registry = self.clone();

        tokio::spawn(async move {
            let session_id = shared.session_id.clone();
            match tokio::spawn(worker.run()).await {
                Ok(reason) => {
                    log::debug!("Worker for session {} exited: {}", session_id, reason.to_string());
                }
                Err(e) => {
                    log::error!("Worker for session {} crashed: {}", session_id, e);
                    let sink = &registry.inner.sink;
                    sink.send(
                        &session_id,
                        &ServerEvent::error(Some(&session_id), "Session terminated by an internal error"),
                    );
                    sink.send(
                        &session_id,
                        &ServerEvent::Stopped {
                            session_id: session_id.clone(),
                            reason: StopReason::Faulted,
                        },
                    );
                }
            }
            registry.finalize(&session_id).await;
        });
    }

    /// Drop the entry and free its quota slot once the worker has released its source
    async fn finalize(&self, session_id: &str) -> bool {
        self.inner.state.lock().await.remove(session_id).is_some()
    }

    /// Cancel a running session. Returns false if it was unknown or already stopping.
    ///
    /// The entry and its quota slot stay until the worker exits.
    pub async fn stop(&self, session_id: &str) -> bool {
        let state = self.inner.state.lock().await;
        match state.sessions.get(session_id) {
            Some(shared) if !shared.is_cancelled() => {
                shared.cancel();
                log::info!("Stop requested for session {}", session_id);
                true
            }
            _ => false,
        }
    }

    /// Record a client heartbeat. Returns false for unknown sessions.
    pub async fn heartbeat(&self, session_id: &str) -> bool {
        let state = self.inner.state.lock().await;
        match state.sessions.get(session_id) {
            Some(shared) => {
                shared.touch_heartbeat();
                true
            }
            None => false,
        }
    }

    pub async fn status(&self, session_id: &str) -> Option<SessionStatus> {
        let state = self.inner.state.lock().await;
        state.sessions.get(session_id).map(|shared| shared.status())
    }

    /// Remove sessions whose worker made no progress within the sweep timeout.
    ///
    /// A stuck worker may never exit, so its slot is freed here rather than on exit.
    pub async fn sweep(&self) -> Vec<String> {
        let timeout = self.inner.config.sweep_timeout();
        let mut state = self.inner.state.lock().await;

        let stale: Vec<String> = state
            .sessions
            .values()
            .filter(|shared| shared.since_activity() > timeout)
            .map(|shared| shared.session_id.clone())
            .collect();

        for session_id in &stale {
            if state.remove(session_id).is_some() {
                log::warn!("Swept stale session {}", session_id);
            }
        }
        stale
    }

    /// Run `sweep()` every sweep interval until shutdown
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let registry = self.clone();
        let shutdown = self.inner.shutdown.clone();
        let period = self.inner.config.sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.sweep().await;
                    }
                }
            }
            log::debug!("Session sweeper stopped");
        })
    }

    /// Cancel every session and the sweeper. New sessions are refused afterwards.
    pub async fn shutdown(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        self.inner.shutdown.cancel();

        let ids: Vec<String> = state.sessions.keys().cloned().collect();
        for session_id in &ids {
            state.remove(session_id);
        }
        log::info!("Registry shut down, cancelled {} sessions", ids.len());
        ids.len()
    }

    pub async fn active_sessions(&self) -> usize {
        self.inner.state.lock().await.sessions.len()
    }

    pub async fn client_session_count(&self, client_addr: &str) -> usize {
        let state = self.inner.state.lock().await;
        state.client_counts.get(client_addr).copied().unwrap_or(0)
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            uptime_secs: self.inner.started_at.elapsed().as_secs(),
            active_sessions: self.active_sessions().await,
            exercise_count: ExerciseKind::all().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture::{CaptureError, CaptureResult, RawFrame, SourceKind};
    use crate::platform::capture::FrameSource;
    use crate::platform::pose::NoPoseEstimator;
    use crate::models::pose::PoseConfig;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // ==========================================================================
    // Test doubles
    // ==========================================================================

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        Healthy,
        FailOpen,
        FailFirstRead,
        FailEveryThirdRead,
        FailReads,
        Stuck,
        Panic,
    }

    struct TestSource {
        behavior: Behavior,
        kind: SourceKind,
        open: bool,
        reads: usize,
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSource for TestSource {
        async fn open(&mut self) -> CaptureResult<()> {
            if self.behavior == Behavior::FailOpen {
                return Err(CaptureError::DeviceUnavailable("no camera".to_string()));
            }
            self.open = true;
            Ok(())
        }

        async fn read(&mut self) -> CaptureResult<Option<RawFrame>> {
            self.reads += 1;
            match self.behavior {
                Behavior::Stuck => std::future::pending().await,
                Behavior::Panic => panic!("capture driver crashed"),
                Behavior::FailReads => Err(CaptureError::CaptureFailed("read error".to_string())),
                Behavior::FailFirstRead if self.reads == 1 => {
                    Err(CaptureError::CaptureFailed("glitch".to_string()))
                }
                Behavior::FailEveryThirdRead if self.reads % 3 == 0 => {
                    Err(CaptureError::CaptureFailed("glitch".to_string()))
                }
                _ => Ok(Some(RawFrame::from_rgb_image(RgbImage::new(16, 16), 0))),
            }
        }

        async fn release(&mut self) {
            if self.open {
                self.open = false;
                self.releases.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    struct TestFactory {
        behavior: Behavior,
        releases: Arc<AtomicUsize>,
        fallbacks: Arc<AtomicUsize>,
    }

    impl TestFactory {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                releases: Arc::new(AtomicUsize::new(0)),
                fallbacks: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SourceFactory for TestFactory {
        fn create(&self, _exercise: ExerciseKind) -> Box<dyn FrameSource> {
            Box::new(TestSource {
                behavior: self.behavior,
                kind: SourceKind::Camera,
                open: false,
                reads: 0,
                releases: self.releases.clone(),
            })
        }

        fn fallback(&self, _exercise: ExerciseKind) -> Box<dyn FrameSource> {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
            Box::new(TestSource {
                behavior: Behavior::Healthy,
                kind: SourceKind::Synthetic,
                open: false,
                reads: 0,
                releases: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: std::sync::Mutex<Vec<ServerEvent>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|e| e.name()).collect()
        }

        fn stop_reason(&self) -> Option<StopReason> {
            self.events.lock().unwrap().iter().find_map(|e| match e {
                ServerEvent::Stopped { reason, .. } => Some(*reason),
                _ => None,
            })
        }

        fn frame_sources(&self) -> Vec<SourceKind> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ServerEvent::Frame(frame) => Some(frame.source),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn send(&self, _session_id: &str, event: &ServerEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn test_config() -> Config {
        Config {
            heartbeat_timeout_ms: 5_000,
            sweep_timeout_ms: 5_000,
            sweep_interval_ms: 20,
            loop_interval_ms: 5,
            frame_skip: 1,
            frame_rate_limit: 60,
            reopen_backoff_ms: 10,
            simulate: true,
            ..Config::default()
        }
    }

    fn registry_with(
        config: Config,
        factory: TestFactory,
    ) -> (SessionRegistry, Arc<TestFactory>, Arc<RecordingSink>) {
        let factory = Arc::new(factory);
        let sink = Arc::new(RecordingSink::default());
        let registry = SessionRegistry::new(
            Arc::new(config),
            factory.clone(),
            Arc::new(NoPoseEstimator::new(&PoseConfig::default())),
            sink.clone(),
        );
        (registry, factory, sink)
    }

    async fn wait_until_empty(registry: &SessionRegistry) {
        for _ in 0..400 {
            if registry.active_sessions().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sessions did not finish");
    }

    async fn wait_for_event(sink: &RecordingSink, name: &str) {
        for _ in 0..400 {
            if sink.names().iter().any(|n| *n == name) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no {} event", name);
    }

    // ==========================================================================
    // Admission
    // ==========================================================================

    #[tokio::test]
    async fn test_fourth_session_is_rejected() {
        let (registry, _, _) = registry_with(test_config(), TestFactory::new(Behavior::Healthy));

        for _ in 0..3 {
            registry.start("10.0.0.1", "squat").await.unwrap();
        }
        let rejected = registry.start("10.0.0.1", "squat").await;
        assert_eq!(
            rejected,
            Err(RegistryError::QuotaExceeded {
                client: "10.0.0.1".to_string(),
                limit: 3
            })
        );
        assert_eq!(registry.client_session_count("10.0.0.1").await, 3);
        assert_eq!(registry.active_sessions().await, 3);

        // Other clients have their own quota
        assert!(registry.start("10.0.0.2", "plank").await.is_ok());

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_exercise_is_rejected() {
        let (registry, _, _) = registry_with(test_config(), TestFactory::new(Behavior::Healthy));
        assert_eq!(
            registry.start("10.0.0.1", "deadlift").await,
            Err(RegistryError::UnsupportedExercise("deadlift".to_string()))
        );
        assert_eq!(registry.active_sessions().await, 0);
        assert_eq!(registry.client_session_count("10.0.0.1").await, 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (registry, factory, sink) =
            registry_with(test_config(), TestFactory::new(Behavior::Healthy));
        let session_id = registry.start("10.0.0.1", "hummer").await.unwrap();

        assert!(registry.stop(&session_id).await);
        assert!(!registry.stop(&session_id).await);
        assert!(!registry.stop("never-existed").await);

        wait_until_empty(&registry).await;
        assert_eq!(registry.client_session_count("10.0.0.1").await, 0);
        assert_eq!(sink.stop_reason(), Some(StopReason::Cancelled));
        assert_eq!(factory.releases.load(Ordering::SeqCst), 1);

        // The slot is free again
        assert!(registry.start("10.0.0.1", "hummer").await.is_ok());
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_heartbeat_and_status() {
        let (registry, _, sink) = registry_with(test_config(), TestFactory::new(Behavior::Healthy));
        let session_id = registry.start("10.0.0.1", "squat").await.unwrap();

        assert!(registry.heartbeat(&session_id).await);
        assert!(!registry.heartbeat("missing").await);

        let status = registry.status(&session_id).await.unwrap();
        assert_eq!(status.exercise_id, "squat");
        assert_eq!((status.left_count, status.right_count), (0, 0));
        assert!(registry.status("missing").await.is_none());

        wait_for_event(&sink, "frame").await;
        registry.shutdown().await;
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    #[tokio::test]
    async fn test_heartbeat_timeout_stops_session_once() {
        let config = Config {
            heartbeat_timeout_ms: 100,
            ..test_config()
        };
        let (registry, factory, sink) = registry_with(config, TestFactory::new(Behavior::Healthy));
        let session_id = registry.start("10.0.0.1", "hummer").await.unwrap();

        wait_until_empty(&registry).await;
        assert_eq!(sink.stop_reason(), Some(StopReason::HeartbeatTimeout));
        assert_eq!(factory.releases.load(Ordering::SeqCst), 1);

        // Late stop and sweep find nothing left to clean up
        let (stopped, swept) = tokio::join!(registry.stop(&session_id), registry.sweep());
        assert!(!stopped);
        assert!(swept.is_empty());
        assert_eq!(registry.client_session_count("10.0.0.1").await, 0);
        assert_eq!(factory.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_heartbeats_keep_session_alive() {
        let config = Config {
            heartbeat_timeout_ms: 150,
            ..test_config()
        };
        let (registry, _, _) = registry_with(config, TestFactory::new(Behavior::Healthy));
        let session_id = registry.start("10.0.0.1", "plank").await.unwrap();

        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert!(registry.heartbeat(&session_id).await);
        }
        assert_eq!(registry.active_sessions().await, 1);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_stop_and_sweep_release_once() {
        let config = Config {
            sweep_timeout_ms: 1,
            ..test_config()
        };
        let (registry, factory, sink) = registry_with(config, TestFactory::new(Behavior::Stuck));
        let session_id = registry.start("10.0.0.1", "squat").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (stopped, swept) = tokio::join!(registry.stop(&session_id), registry.sweep());
        assert!(stopped || !swept.is_empty());

        wait_for_event(&sink, "stopped").await;
        wait_until_empty(&registry).await;
        assert_eq!(registry.client_session_count("10.0.0.1").await, 0);
        assert_eq!(factory.releases.load(Ordering::SeqCst), 1);
        assert_eq!(sink.names().iter().filter(|n| **n == "stopped").count(), 1);

        // The freed slot is counted once: three new sessions still fit
        for _ in 0..3 {
            registry.start("10.0.0.1", "squat").await.unwrap();
        }
        assert!(registry.start("10.0.0.1", "squat").await.is_err());
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_frees_slot_after_source_release() {
        let (registry, factory, _) =
            registry_with(test_config(), TestFactory::new(Behavior::Healthy));
        let session_id = registry.start("10.0.0.1", "squat").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(registry.stop(&session_id).await);
        for _ in 0..400 {
            if registry.client_session_count("10.0.0.1").await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(registry.client_session_count("10.0.0.1").await, 0);
        assert_eq!(factory.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sweeper_removes_stuck_worker() {
        let config = Config {
            sweep_timeout_ms: 100,
            ..test_config()
        };
        let (registry, factory, sink) = registry_with(config, TestFactory::new(Behavior::Stuck));
        let sweeper = registry.spawn_sweeper();
        registry.start("10.0.0.1", "lunges").await.unwrap();

        wait_until_empty(&registry).await;
        wait_for_event(&sink, "stopped").await;
        assert_eq!(sink.stop_reason(), Some(StopReason::Cancelled));
        assert_eq!(factory.releases.load(Ordering::SeqCst), 1);

        registry.shutdown().await;
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_everything() {
        let (registry, _, _) = registry_with(test_config(), TestFactory::new(Behavior::Healthy));
        registry.start("10.0.0.1", "squat").await.unwrap();
        registry.start("10.0.0.2", "plank").await.unwrap();

        assert_eq!(registry.shutdown().await, 2);
        assert_eq!(registry.active_sessions().await, 0);
        assert_eq!(
            registry.start("10.0.0.1", "squat").await,
            Err(RegistryError::ShuttingDown)
        );
    }

    // ==========================================================================
    // Source recovery
    // ==========================================================================

    #[tokio::test]
    async fn test_unavailable_camera_degrades_to_synthetic() {
        let (registry, factory, sink) =
            registry_with(test_config(), TestFactory::new(Behavior::FailOpen));
        registry.start("10.0.0.1", "squat").await.unwrap();

        wait_for_event(&sink, "frame").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let names = sink.names();
        assert_eq!(names.iter().filter(|n| **n == "error").count(), 1);
        assert!(sink
            .frame_sources()
            .iter()
            .all(|kind| *kind == SourceKind::Synthetic));
        assert_eq!(factory.fallbacks.load(Ordering::SeqCst), 1);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_single_read_failure_reopens_camera() {
        let (registry, factory, sink) =
            registry_with(test_config(), TestFactory::new(Behavior::FailFirstRead));
        registry.start("10.0.0.1", "squat").await.unwrap();

        wait_for_event(&sink, "frame").await;
        assert!(!sink.names().contains(&"error"));
        assert_eq!(factory.fallbacks.load(Ordering::SeqCst), 0);
        assert_eq!(sink.frame_sources()[0], SourceKind::Camera);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_spaced_read_failures_keep_reopening_camera() {
        let (registry, factory, sink) =
            registry_with(test_config(), TestFactory::new(Behavior::FailEveryThirdRead));
        registry.start("10.0.0.1", "squat").await.unwrap();

        // Each failure is followed by good reads, so every one earns a fresh reopen
        for _ in 0..400 {
            if factory.releases.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(factory.releases.load(Ordering::SeqCst) >= 3);
        assert_eq!(factory.fallbacks.load(Ordering::SeqCst), 0);
        assert!(!sink.names().contains(&"error"));
        assert!(sink
            .frame_sources()
            .iter()
            .all(|kind| *kind == SourceKind::Camera));
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_repeated_read_failures_degrade_once() {
        let (registry, factory, sink) =
            registry_with(test_config(), TestFactory::new(Behavior::FailReads));
        registry.start("10.0.0.1", "squat").await.unwrap();

        wait_for_event(&sink, "frame").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.names().iter().filter(|n| **n == "error").count(), 1);
        assert_eq!(factory.fallbacks.load(Ordering::SeqCst), 1);
        // Opened twice (initial + reopen), released twice
        assert_eq!(factory.releases.load(Ordering::SeqCst), 2);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_panic_reports_error_and_finalizes() {
        let (registry, _, sink) = registry_with(test_config(), TestFactory::new(Behavior::Panic));
        registry.start("10.0.0.1", "squat").await.unwrap();

        wait_until_empty(&registry).await;
        wait_for_event(&sink, "stopped").await;
        assert!(sink.names().contains(&"error"));
        assert_eq!(sink.stop_reason(), Some(StopReason::Faulted));
        assert_eq!(registry.client_session_count("10.0.0.1").await, 0);
    }

    #[tokio::test]
    async fn test_health_report() {
        let (registry, _, _) = registry_with(test_config(), TestFactory::new(Behavior::Healthy));
        registry.start("10.0.0.1", "squat").await.unwrap();

        let health = registry.health().await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_sessions, 1);
        assert_eq!(health.exercise_count, 10);
        registry.shutdown().await;
    }
}
