//! Seam between the render loop and the native windowing/GL/interop stack.
//!
//! [`Platform::open`] runs on the render thread and returns the three halves
//! the loop needs: an event source that stays on that thread, a rendering
//! context that moves behind the context lock, and an interop handle.

mod events;
mod gl;

#[cfg(test)]
pub(crate) mod fake;

pub use events::WinitEvents;
pub use gl::{GlContext, GlPlatform};

use crate::context::ContextBinding;
use crate::error::Result;
use crate::interop::InteropApi;
use crate::render::TextureName;
use crate::window::WindowConfig;

/// Rendering operations on the owned context.
///
/// Every method except `make_current` runs with the context current on the
/// calling thread.
pub trait RenderContext: ContextBinding {
    /// Builds the program, vertex array and texture and sets blend state.
    fn prepare(&mut self, width: u32, height: u32) -> Result<TextureName>;

    /// Clears and draws the texture.
    fn draw(&mut self) -> Result<()>;

    /// Swaps the visible window's buffers.
    fn present(&mut self) -> Result<()>;

    /// Deletes GL objects and destroys the native context.
    ///
    /// Afterwards `is_destroyed` is true and `make_not_current` is a no-op.
    fn destroy(&mut self);
}

/// Input source polled by the render loop.
pub trait EventSource {
    /// Drains pending events; true once the window was asked to close.
    fn poll_close_requested(&mut self) -> Result<bool>;
}

/// Everything created when the window opens.
pub struct Opened<P: Platform + ?Sized> {
    pub events: P::Events,
    pub context: P::Context,
    pub interop: P::Interop,
}

/// Native backend.
pub trait Platform: Send + 'static {
    type Context: RenderContext + 'static;
    type Events: EventSource;
    type Interop: InteropApi + 'static;

    /// Creates the window and its rendering context. Runs on the render thread.
    ///
    /// The returned context is not current on any thread.
    fn open(self, config: &WindowConfig) -> Result<Opened<Self>>;
}

/// Backend used by [`crate::Window::new`].
pub type DefaultPlatform = GlPlatform;
