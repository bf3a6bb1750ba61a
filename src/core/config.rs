use crate::core::frame_encoder::CompressionQuality;
use crate::platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

type ConfigResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Camera capture settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// ffmpeg input format (e.g. "v4l2", "avfoundation", "dshow")
    pub input_format: String,
    /// Device name passed to ffmpeg's `-i`
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// How long a single read waits for a complete frame
    pub read_timeout_ms: u64,
    /// ffmpeg binary used to drive the camera
    pub ffmpeg_path: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            input_format: platform::default_camera_input_format().to_string(),
            device: platform::default_camera_device().to_string(),
            width: 640,
            height: 480,
            fps: 30,
            read_timeout_ms: 200,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Concurrent sessions allowed per client address
    pub max_sessions_per_client: usize,
    /// A session with no client heartbeat for this long stops itself
    pub heartbeat_timeout_ms: u64,
    /// The sweeper force-stops sessions whose worker made no progress for this long
    pub sweep_timeout_ms: u64,
    /// How often the sweeper runs
    pub sweep_interval_ms: u64,
    /// Pause between loop iterations
    pub loop_interval_ms: u64,
    /// Process every Nth captured frame
    pub frame_skip: u32,
    /// Maximum frames per second sent to a client
    pub frame_rate_limit: u32,
    /// JPEG quality preset: "High", "Medium", or "Low"
    pub video_quality: String,
    /// Mirror frames horizontally before analysis
    pub mirror_frames: bool,
    /// Skip the camera and use the synthetic feed
    pub simulate: bool,
    /// Wait before the single camera reopen attempt
    pub reopen_backoff_ms: u64,
    /// Consecutive encode failures before the client is told
    pub encode_failure_notice_threshold: u32,
    /// Landmarks below this visibility count as missing
    pub min_landmark_visibility: f32,
    pub camera: CameraConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_sessions_per_client: 3,
            heartbeat_timeout_ms: 30_000,
            sweep_timeout_ms: 60_000,
            sweep_interval_ms: 10_000,
            loop_interval_ms: 50,
            frame_skip: 2,
            frame_rate_limit: 15,
            video_quality: "Medium".to_string(),
            mirror_frames: true,
            simulate: false,
            reopen_backoff_ms: 1_000,
            encode_failure_notice_threshold: 5,
            min_landmark_visibility: 0.5,
            camera: CameraConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it with defaults if it doesn't exist
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if CompressionQuality::from_string(&self.video_quality).is_none() {
            return Err(format!(
                "Invalid video quality: {}. Must be one of: High, Medium, Low",
                self.video_quality
            )
            .into());
        }

        if self.max_sessions_per_client == 0 {
            return Err("max_sessions_per_client must be at least 1".into());
        }

        if self.frame_rate_limit == 0 || self.frame_rate_limit > 60 {
            return Err(format!(
                "Invalid frame rate limit: {}. Must be between 1 and 60",
                self.frame_rate_limit
            )
            .into());
        }

        if self.frame_skip == 0 {
            return Err("frame_skip must be at least 1".into());
        }

        if self.heartbeat_timeout_ms == 0 || self.sweep_timeout_ms == 0 {
            return Err("Timeouts must be greater than zero".into());
        }

        if self.sweep_interval_ms == 0 || self.loop_interval_ms == 0 {
            return Err("Intervals must be greater than zero".into());
        }

        if !(0.0..=1.0).contains(&self.min_landmark_visibility) {
            return Err(format!(
                "Invalid landmark visibility: {}. Must be between 0.0 and 1.0",
                self.min_landmark_visibility
            )
            .into());
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err("Camera resolution must be non-zero".into());
        }

        if self.camera.fps == 0 || self.camera.fps > 120 {
            return Err(format!(
                "Invalid camera FPS: {}. Must be between 1 and 120",
                self.camera.fps
            )
            .into());
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn quality(&self) -> CompressionQuality {
        CompressionQuality::from_string(&self.video_quality).unwrap_or(CompressionQuality::Medium)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn sweep_timeout(&self) -> Duration {
        Duration::from_millis(self.sweep_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn reopen_backoff(&self) -> Duration {
        Duration::from_millis(self.reopen_backoff_ms)
    }

    /// Get the configuration file path
    fn get_config_path() -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| "Could not determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".fitcam");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn get_test_config_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("fitcam_test_config_{}", name));
        path.push("settings.json");
        path
    }

    fn cleanup_test_config(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_sessions_per_client, 3);
        assert_eq!(config.heartbeat_timeout_ms, 30_000);
        assert_eq!(config.sweep_timeout_ms, 60_000);
        assert_eq!(config.sweep_interval_ms, 10_000);
        assert_eq!(config.frame_skip, 2);
        assert_eq!(config.frame_rate_limit, 15);
        assert_eq!(config.video_quality, "Medium");
        assert_eq!(config.quality().to_jpeg_quality(), 70);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.camera.fps, 30);
        assert!(!config.simulate);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.video_quality = "Ultra".to_string();
        assert!(config.validate().is_err());
        config.video_quality = "Low".to_string();

        config.frame_rate_limit = 0;
        assert!(config.validate().is_err());
        config.frame_rate_limit = 120;
        assert!(config.validate().is_err());
        config.frame_rate_limit = 15;

        config.frame_skip = 0;
        assert!(config.validate().is_err());
        config.frame_skip = 2;

        config.max_sessions_per_client = 0;
        assert!(config.validate().is_err());
        config.max_sessions_per_client = 3;

        config.min_landmark_visibility = 1.5;
        assert!(config.validate().is_err());
        config.min_landmark_visibility = 0.5;

        config.camera.fps = 0;
        assert!(config.validate().is_err());
        config.camera.fps = 30;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = get_test_config_path("roundtrip");
        cleanup_test_config(&path);

        let mut config = Config::default();
        config.simulate = true;
        config.max_sessions_per_client = 5;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        cleanup_test_config(&path);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = get_test_config_path("partial");
        cleanup_test_config(&path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "frame_rate_limit": 10 }"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.frame_rate_limit, 10);
        assert_eq!(loaded.max_sessions_per_client, 3);

        cleanup_test_config(&path);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = get_test_config_path("invalid");
        cleanup_test_config(&path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "video_quality": "Best" }"#).unwrap();

        assert!(Config::load_from(&path).is_err());

        cleanup_test_config(&path);
    }
}
