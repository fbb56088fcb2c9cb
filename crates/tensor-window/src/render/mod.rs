//! GL objects and draw calls for the textured full-screen pass.
//!
//! Everything here requires a current GL context; the render loop and the
//! GL platform arrange that through the context lock.

mod program;
mod renderer;
mod shaders;

pub use program::build_program;
pub use renderer::TextureRenderer;
pub use shaders::{FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE};

/// GL name of a texture object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureName(pub u32);
