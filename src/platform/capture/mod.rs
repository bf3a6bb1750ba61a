// Frame sources feeding the session loop
// Each source yields RGB frames through the same async interface

pub mod camera;
pub mod synthetic;

pub use camera::CameraSource;
pub use synthetic::SyntheticSource;

use crate::core::config::CameraConfig;
use crate::models::capture::{CaptureResult, RawFrame, SourceKind};
use crate::models::exercise::ExerciseKind;
use async_trait::async_trait;

/// Platform-agnostic frame source
#[async_trait]
pub trait FrameSource: Send {
    /// Acquire the underlying device or generator
    async fn open(&mut self) -> CaptureResult<()>;

    /// Next frame. `Ok(None)` means no frame is ready yet.
    ///
    /// Must be cancel-safe: dropping the future loses no buffered data.
    async fn read(&mut self) -> CaptureResult<Option<RawFrame>>;

    /// Release the device. Calling this more than once is a no-op.
    async fn release(&mut self);

    fn kind(&self) -> SourceKind;

    fn is_open(&self) -> bool;
}

/// Creates one source per session
pub trait SourceFactory: Send + Sync {
    fn create(&self, exercise: ExerciseKind) -> Box<dyn FrameSource>;

    /// Stand-in used when the primary source cannot be used
    fn fallback(&self, exercise: ExerciseKind) -> Box<dyn FrameSource> {
        Box::new(SyntheticSource::new(exercise))
    }
}

/// Opens the configured camera through ffmpeg
pub struct CameraSourceFactory {
    config: CameraConfig,
}

impl CameraSourceFactory {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl SourceFactory for CameraSourceFactory {
    fn create(&self, _exercise: ExerciseKind) -> Box<dyn FrameSource> {
        Box::new(CameraSource::new(self.config.clone()))
    }
}

/// Always produces the simulation feed
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticSourceFactory;

impl SourceFactory for SyntheticSourceFactory {
    fn create(&self, exercise: ExerciseKind) -> Box<dyn FrameSource> {
        Box::new(SyntheticSource::new(exercise))
    }
}
