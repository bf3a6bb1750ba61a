// Data structures for frame capture

use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// A frame produced by a frame source
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

/// Pixel format of captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGB8,
    RGBA8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::RGB8 => 3,
            PixelFormat::RGBA8 => 4,
        }
    }
}

impl RawFrame {
    pub fn from_rgb_image(image: RgbImage, timestamp: i64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            timestamp,
            width,
            height,
            data: image.into_raw(),
            format: PixelFormat::RGB8,
        }
    }

    /// Expected byte length for the frame's dimensions and format
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Flip the frame left-to-right in place
    pub fn mirror_horizontal(&mut self) {
        let bpp = self.format.bytes_per_pixel();
        let width = self.width as usize;
        let row_len = width * bpp;
        if row_len == 0 || self.data.len() != self.expected_len() {
            return;
        }

        for row in self.data.chunks_exact_mut(row_len) {
            for x in 0..width / 2 {
                let (left, right) = (x * bpp, (width - 1 - x) * bpp);
                for k in 0..bpp {
                    row.swap(left + k, right + k);
                }
            }
        }
    }

    /// Convert into an RGB image, dropping alpha if present
    pub fn into_rgb_image(self) -> CaptureResult<RgbImage> {
        if self.data.len() != self.expected_len() {
            return Err(CaptureError::InvalidFrame(format!(
                "expected {} bytes for {}x{} {:?}, got {}",
                self.expected_len(),
                self.width,
                self.height,
                self.format,
                self.data.len()
            )));
        }

        match self.format {
            PixelFormat::RGB8 => ImageBuffer::from_raw(self.width, self.height, self.data)
                .ok_or_else(|| CaptureError::InvalidFrame("buffer size mismatch".to_string())),
            PixelFormat::RGBA8 => {
                let rgb: Vec<u8> = self
                    .data
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, rgb)
                    .ok_or_else(|| CaptureError::InvalidFrame("buffer size mismatch".to_string()))
            }
        }
    }
}

/// Which kind of source is currently feeding a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Camera,
    Synthetic,
}

impl SourceKind {
    pub fn to_string(&self) -> &'static str {
        match self {
            SourceKind::Camera => "camera",
            SourceKind::Synthetic => "synthetic",
        }
    }
}

/// Error types for frame source operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Stream ended")]
    StreamEnded,

    #[error("Source not open")]
    NotOpen,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
