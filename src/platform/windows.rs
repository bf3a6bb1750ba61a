use super::Platform;

pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for WindowsPlatform {
    fn get_os_name(&self) -> &'static str {
        "Windows"
    }

    fn camera_input_format(&self) -> &'static str {
        "dshow"
    }

    // DirectShow needs the friendly name; override it in the settings file
    fn camera_device(&self) -> &'static str {
        "video=Integrated Camera"
    }
}
