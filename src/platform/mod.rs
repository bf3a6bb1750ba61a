pub mod capture;
pub mod pose;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
mod linux;

/// Platform abstraction for OS-specific camera access
pub trait Platform: Send + Sync {
    /// Get the operating system name
    fn get_os_name(&self) -> &'static str;

    /// ffmpeg input format (`-f`) that reads from a local camera
    fn camera_input_format(&self) -> &'static str;

    /// Device argument (`-i`) for the first camera
    fn camera_device(&self) -> &'static str;
}

/// Used on targets without a dedicated implementation
#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
struct GenericPlatform;

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
impl Platform for GenericPlatform {
    fn get_os_name(&self) -> &'static str {
        std::env::consts::OS
    }

    fn camera_input_format(&self) -> &'static str {
        "v4l2"
    }

    fn camera_device(&self) -> &'static str {
        "/dev/video0"
    }
}

/// Get the current platform implementation
pub fn get_platform() -> Box<dyn Platform> {
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacOSPlatform::new())
    }

    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsPlatform::new())
    }

    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxPlatform::new())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        Box::new(GenericPlatform)
    }
}

pub fn default_camera_input_format() -> &'static str {
    get_platform().camera_input_format()
}

pub fn default_camera_device() -> &'static str {
    get_platform().camera_device()
}
