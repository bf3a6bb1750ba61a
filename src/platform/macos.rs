use super::Platform;

pub struct MacOSPlatform;

impl MacOSPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for MacOSPlatform {
    fn get_os_name(&self) -> &'static str {
        "macOS"
    }

    fn camera_input_format(&self) -> &'static str {
        "avfoundation"
    }

    /// AVFoundation addresses devices by index; "0" is the built-in camera
    fn camera_device(&self) -> &'static str {
        "0"
    }
}
