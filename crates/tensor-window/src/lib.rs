//! Live display of GPU-resident images.
//!
//! A [`Window`] owns a native window and a render thread that redraws a
//! single RGBA32F texture. Producers hand it device-memory images through
//! [`Window::submit`]; the copy runs device-to-device under the shared
//! GL context lock, so the pixels never round-trip through the host.

pub mod context;
pub mod error;
pub mod interop;
pub mod logging;
pub mod platform;
pub mod render;
pub mod time;
pub mod window;

pub use error::{Error, InteropError, InteropOp, InteropStatus, Result};
pub use interop::{DeviceImage, DevicePtr};
pub use window::{FrameStats, RenderState, Window, WindowConfig};
