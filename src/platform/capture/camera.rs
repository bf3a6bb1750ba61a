// Camera capture through an ffmpeg child process emitting raw RGB24 frames

use super::FrameSource;
use crate::core::config::CameraConfig;
use crate::models::capture::{CaptureError, CaptureResult, PixelFormat, RawFrame, SourceKind};
use async_trait::async_trait;
use bytes::BytesMut;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

type FrameReader = Box<dyn AsyncRead + Send + Unpin>;

pub struct CameraSource {
    config: CameraConfig,
    child: Option<Child>,
    reader: Option<FrameReader>,
    // Partial frame bytes survive a cancelled or timed-out read
    buffer: BytesMut,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            child: None,
            reader: None,
            buffer: BytesMut::new(),
        }
    }

    fn frame_len(&self) -> usize {
        self.config.width as usize * self.config.height as usize * 3
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.config.read_timeout_ms)
    }

    /// Command-line arguments for the capture process
    pub fn ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            self.config.input_format.clone(),
            "-framerate".to_string(),
            self.config.fps.to_string(),
            "-video_size".to_string(),
            format!("{}x{}", self.config.width, self.config.height),
            "-i".to_string(),
            self.config.device.clone(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-".to_string(),
        ]
    }

    /// Read frames from an arbitrary byte stream instead of a child process
    #[cfg(test)]
    fn attach_reader(&mut self, reader: FrameReader) {
        self.buffer = BytesMut::with_capacity(self.frame_len());
        self.reader = Some(reader);
    }
}

#[async_trait]
impl FrameSource for CameraSource {
    async fn open(&mut self) -> CaptureResult<()> {
        if self.is_open() {
            return Ok(());
        }

        log::info!(
            "Opening camera {} ({}) at {}x{}@{}",
            self.config.device,
            self.config.input_format,
            self.config.width,
            self.config.height,
            self.config.fps
        );

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(self.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::DeviceUnavailable(format!(
                    "Failed to start {}: {}",
                    self.config.ffmpeg_path, e
                ))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::DeviceUnavailable("Capture process has no stdout".to_string())
        })?;

        self.buffer = BytesMut::with_capacity(self.frame_len());
        self.reader = Some(Box::new(stdout));
        self.child = Some(child);
        Ok(())
    }

    async fn read(&mut self) -> CaptureResult<Option<RawFrame>> {
        let frame_len = self.frame_len();
        let read_timeout = self.read_timeout();
        let reader = self.reader.as_mut().ok_or(CaptureError::NotOpen)?;
        let buffer = &mut self.buffer;

        let filled = tokio::time::timeout(read_timeout, async {
            while buffer.len() < frame_len {
                if buffer.capacity() - buffer.len() == 0 {
                    buffer.reserve(frame_len);
                }
                let n = reader.read_buf(buffer).await?;
                if n == 0 {
                    return Err(CaptureError::StreamEnded);
                }
            }
            Ok::<(), CaptureError>(())
        })
        .await;

        match filled {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Ok(None),
        }

        let data = self.buffer.split_to(frame_len).to_vec();
        Ok(Some(RawFrame {
            timestamp: chrono::Utc::now().timestamp_millis(),
            width: self.config.width,
            height: self.config.height,
            data,
            format: PixelFormat::RGB8,
        }))
    }

    async fn release(&mut self) {
        self.reader = None;
        self.buffer.clear();

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                log::debug!("Capture process already exited: {}", e);
            }
            let _ = child.wait().await;
            log::info!("Released camera {}", self.config.device);
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn tiny_config() -> CameraConfig {
        CameraConfig {
            width: 2,
            height: 2,
            read_timeout_ms: 50,
            ..CameraConfig::default()
        }
    }

    #[test]
    fn test_ffmpeg_args() {
        let source = CameraSource::new(CameraConfig::default());
        let args = source.ffmpeg_args();
        assert!(args.windows(2).any(|w| w == ["-video_size", "640x480"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "rgb24"]));
        assert!(args.windows(2).any(|w| w == ["-framerate", "30"]));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_device_unavailable() {
        let mut source = CameraSource::new(CameraConfig {
            ffmpeg_path: "/nonexistent/ffmpeg-binary".to_string(),
            ..CameraConfig::default()
        });
        assert!(matches!(
            source.open().await,
            Err(CaptureError::DeviceUnavailable(_))
        ));
        assert!(!source.is_open());
    }

    #[tokio::test]
    async fn test_read_before_open_fails() {
        let mut source = CameraSource::new(tiny_config());
        assert!(matches!(source.read().await, Err(CaptureError::NotOpen)));
    }

    #[tokio::test]
    async fn test_reads_whole_frames_then_reports_eof() {
        let mut source = CameraSource::new(tiny_config());
        let bytes: Vec<u8> = (0..30u8).collect();
        source.attach_reader(Box::new(std::io::Cursor::new(bytes)));

        let first = source.read().await.unwrap().unwrap();
        assert_eq!(first.data, (0..12u8).collect::<Vec<_>>());
        let second = source.read().await.unwrap().unwrap();
        assert_eq!(second.data, (12..24u8).collect::<Vec<_>>());
        assert!(matches!(source.read().await, Err(CaptureError::StreamEnded)));
    }

    #[tokio::test]
    async fn test_partial_frame_times_out_and_resumes() {
        let mut source = CameraSource::new(tiny_config());
        let (mut writer, reader) = tokio::io::duplex(64);
        source.attach_reader(Box::new(reader));

        writer.write_all(&[1u8; 5]).await.unwrap();
        assert!(source.read().await.unwrap().is_none());

        writer.write_all(&[2u8; 7]).await.unwrap();
        let frame = source.read().await.unwrap().unwrap();
        assert_eq!(&frame.data[..5], &[1u8; 5]);
        assert_eq!(&frame.data[5..], &[2u8; 7]);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let mut source = CameraSource::new(tiny_config());
        source.attach_reader(Box::new(std::io::Cursor::new(vec![0u8; 12])));
        assert!(source.is_open());

        source.release().await;
        source.release().await;
        assert!(!source.is_open());
        assert!(matches!(source.read().await, Err(CaptureError::NotOpen)));
    }
}
