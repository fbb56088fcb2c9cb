use glow::HasContext;

use crate::error::{Error, Result};

use super::program::build_program;
use super::shaders::{FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE};
use super::TextureName;

/// Owns the program, vertex array and RGBA32F texture of the display pass.
///
/// The texture's storage is immutable: dimensions never change after `new`.
pub struct TextureRenderer {
    gl: glow::Context,
    program: glow::Program,
    vao: glow::VertexArray,
    texture: glow::Texture,
}

impl TextureRenderer {
    /// Creates all GL objects. The context must be current.
    pub fn new(gl: glow::Context, width: u32, height: u32) -> Result<Self> {
        let program = build_program(&gl, VERTEX_SHADER_SOURCE, FRAGMENT_SHADER_SOURCE)?;

        unsafe {
            let vao = match gl.create_vertex_array() {
                Ok(vao) => vao,
                Err(e) => {
                    gl.delete_program(program);
                    return Err(Error::Windowing(format!("failed to create vertex array: {e}")));
                }
            };

            let texture = match gl.create_texture() {
                Ok(texture) => texture,
                Err(e) => {
                    gl.delete_vertex_array(vao);
                    gl.delete_program(program);
                    return Err(Error::Windowing(format!("failed to create texture: {e}")));
                }
            };

            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            // Storage only; contents stay undefined until the first submission.
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA32F as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::FLOAT,
                glow::PixelUnpackData::Slice(None),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            gl.viewport(0, 0, width as i32, height as i32);

            Ok(Self {
                gl,
                program,
                vao,
                texture,
            })
        }
    }

    pub fn texture_name(&self) -> TextureName {
        TextureName(self.texture.0.get())
    }

    /// Clears to opaque black and draws the texture over the viewport.
    pub fn draw(&self) {
        let gl = &self.gl;
        unsafe {
            gl.use_program(Some(self.program));
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
    }

    /// Deletes all GL objects. The context must be current.
    pub fn destroy(self) {
        unsafe {
            self.gl.delete_texture(self.texture);
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_program(self.program);
        }
    }
}
