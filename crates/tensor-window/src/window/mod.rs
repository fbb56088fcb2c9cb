//! The window facade and the render thread behind it.

mod config;
mod handle;
mod render_loop;
mod state;
mod submit;

pub use config::WindowConfig;
pub use handle::Window;
pub use state::{FrameStats, RenderState};
