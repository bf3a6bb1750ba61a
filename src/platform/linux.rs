use super::Platform;

pub struct LinuxPlatform;

impl LinuxPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for LinuxPlatform {
    fn get_os_name(&self) -> &'static str {
        "Linux"
    }

    // Video4Linux2 exposes cameras as /dev/videoN
    fn camera_input_format(&self) -> &'static str {
        "v4l2"
    }

    fn camera_device(&self) -> &'static str {
        "/dev/video0"
    }
}
