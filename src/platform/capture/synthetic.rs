// Procedurally generated stand-in feed used when no camera is available

use super::FrameSource;
use crate::core::overlay::{self, GREEN, WHITE, YELLOW};
use crate::models::capture::{CaptureError, CaptureResult, RawFrame, SourceKind};
use crate::models::exercise::ExerciseKind;
use async_trait::async_trait;
use image::{Rgb, RgbImage};

/// Frames per progress-bar cycle
const PROGRESS_CYCLE: u64 = 100;

pub struct SyntheticSource {
    exercise: ExerciseKind,
    width: u32,
    height: u32,
    frame_index: u64,
    open: bool,
}

impl SyntheticSource {
    pub fn new(exercise: ExerciseKind) -> Self {
        Self::with_size(exercise, 640, 480)
    }

    pub fn with_size(exercise: ExerciseKind, width: u32, height: u32) -> Self {
        Self {
            exercise,
            width,
            height,
            frame_index: 0,
            open: false,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    fn render(&self) -> RgbImage {
        let height = self.height.max(1);
        let mut image = RgbImage::from_fn(self.width, self.height, |_, y| {
            let shade = 20 + (30 * y / height) as u8;
            Rgb([shade, shade, shade + 10])
        });

        overlay::draw_text_centered(&mut image, 40, self.exercise.display_name(), 36.0, WHITE);
        overlay::draw_text_centered(&mut image, 90, "SIMULATION MODE", 24.0, YELLOW);

        for (i, line) in self.exercise.instructions().iter().enumerate() {
            overlay::draw_text(&mut image, 40, 150 + 30 * i as i32, line, 20.0, WHITE);
        }

        let fraction = (self.frame_index % PROGRESS_CYCLE) as f64 / PROGRESS_CYCLE as f64;
        let bar_width = self.width.saturating_sub(140);
        overlay::draw_progress_bar(&mut image, 70, self.height as i32 - 100, bar_width, 20, fraction, GREEN);

        let clock = format!("SERVER TIME {}", chrono::Local::now().format("%H:%M:%S"));
        overlay::draw_text_centered(&mut image, self.height as i32 - 60, &clock, 20.0, WHITE);

        image
    }
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn open(&mut self) -> CaptureResult<()> {
        self.open = true;
        Ok(())
    }

    async fn read(&mut self) -> CaptureResult<Option<RawFrame>> {
        if !self.open {
            return Err(CaptureError::NotOpen);
        }

        let frame = RawFrame::from_rgb_image(self.render(), chrono::Utc::now().timestamp_millis());
        self.frame_index += 1;
        Ok(Some(frame))
    }

    async fn release(&mut self) {
        self.open = false;
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
