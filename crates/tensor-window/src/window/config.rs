use crate::error::{Error, Result};

/// Window configuration.
///
/// `width` x `height` is both the window's inner size in physical pixels and
/// the fixed size of the display texture.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,

    /// Requested OpenGL core profile version. The display shaders need 3.3.
    pub gl_version: (u8, u8),

    /// Sync buffer swaps to the display refresh when the driver allows it.
    pub vsync: bool,

    /// Upper bound on the render loop's frame rate; `None` disables pacing.
    pub max_fps: Option<u32>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "tensor-window".to_string(),
            width: 800,
            height: 600,
            gl_version: (3, 3),
            vsync: true,
            max_fps: Some(240),
        }
    }
}

impl WindowConfig {
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_gl_version(mut self, major: u8, minor: u8) -> Self {
        self.gl_version = (major, minor);
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_max_fps(mut self, max_fps: Option<u32>) -> Self {
        self.max_fps = max_fps;
        self
    }

    /// Rejects configurations that can never produce a window.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Windowing(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.gl_version < (3, 3) {
            let (major, minor) = self.gl_version;
            return Err(Error::Windowing(format!(
                "OpenGL {major}.{minor} requested; the display program needs 3.3 core or newer"
            )));
        }
        Ok(())
    }
}
