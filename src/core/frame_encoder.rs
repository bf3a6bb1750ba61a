use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Invalid JPEG quality: {0} (must be 1-100)")]
    InvalidQuality(u8),
    #[error("Frame has no pixels")]
    EmptyFrame,
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionQuality {
    High,   // JPEG 90
    Medium, // JPEG 70 (default)
    Low,    // JPEG 50
}

impl CompressionQuality {
    pub fn to_jpeg_quality(&self) -> u8 {
        match self {
            CompressionQuality::High => 90,
            CompressionQuality::Medium => 70,
            CompressionQuality::Low => 50,
        }
    }

    pub fn from_string(value: &str) -> Option<Self> {
        match value {
            "High" => Some(CompressionQuality::High),
            "Medium" => Some(CompressionQuality::Medium),
            "Low" => Some(CompressionQuality::Low),
            _ => None,
        }
    }
}

/// Compress an RGB frame to JPEG
pub fn compress(frame: &RgbImage, quality: u8) -> EncodeResult<Bytes> {
    if !(1..=100).contains(&quality) {
        return Err(EncodeError::InvalidQuality(quality));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(EncodeError::EmptyFrame);
    }

    let mut buffer = Vec::with_capacity(frame.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(frame)?;
    Ok(Bytes::from(buffer))
}

// ==============================================================================
// Rate Limiting
// ==============================================================================

/// Caps outgoing frames at `max_fps`
#[derive(Debug)]
pub struct FrameRateLimiter {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl FrameRateLimiter {
    pub fn new(max_fps: u32) -> Self {
        Self {
            min_interval: Self::interval_for(max_fps),
            last_sent: None,
        }
    }

    /// One second divided by `max_fps`, rounded up to the next nanosecond
    fn interval_for(max_fps: u32) -> Duration {
        let fps = u64::from(max_fps.max(1));
        Duration::from_nanos((1_000_000_000 + fps - 1) / fps)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn can_send(&mut self) -> bool {
        self.can_send_at(Instant::now())
    }

    /// True when at least one interval has passed since the last `true`
    pub fn can_send_at(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

// ==============================================================================
// Frame Encoder
// ==============================================================================

/// What happened to one frame handed to the encoder
#[derive(Debug)]
pub enum EncodeOutcome {
    Encoded(Bytes),
    /// Dropped by the rate limiter
    Throttled,
    /// Compression failed; `notify` is set once per failure streak
    Failed { error: EncodeError, notify: bool },
}

pub struct FrameEncoder {
    quality: CompressionQuality,
    limiter: FrameRateLimiter,
    consecutive_failures: u32,
    notice_threshold: u32,
}

impl FrameEncoder {
    pub fn new(quality: CompressionQuality, max_fps: u32, notice_threshold: u32) -> Self {
        Self {
            quality,
            limiter: FrameRateLimiter::new(max_fps),
            consecutive_failures: 0,
            notice_threshold: notice_threshold.max(1),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn encode(&mut self, frame: &RgbImage) -> EncodeOutcome {
        self.encode_at(frame, Instant::now())
    }

    pub fn encode_at(&mut self, frame: &RgbImage, now: Instant) -> EncodeOutcome {
        if !self.limiter.can_send_at(now) {
            return EncodeOutcome::Throttled;
        }

        match compress(frame, self.quality.to_jpeg_quality()) {
            Ok(jpeg) => {
                self.consecutive_failures = 0;
                EncodeOutcome::Encoded(jpeg)
            }
            Err(error) => {
                self.consecutive_failures += 1;
                EncodeOutcome::Failed {
                    error,
                    notify: self.consecutive_failures == self.notice_threshold,
                }
            }
        }
    }
}
