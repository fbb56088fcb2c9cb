use glow::HasContext;

use crate::error::{Error, Result};

/// Compiles and links a vertex + fragment program.
///
/// Failures carry the driver's info log as [`Error::GraphicsCompile`].
pub fn build_program(gl: &glow::Context, vertex: &str, fragment: &str) -> Result<glow::Program> {
    unsafe {
        let program = gl.create_program().map_err(Error::GraphicsCompile)?;

        let stages = [
            (glow::VERTEX_SHADER, vertex, "vertex"),
            (glow::FRAGMENT_SHADER, fragment, "fragment"),
        ];

        let mut shaders = Vec::with_capacity(stages.len());
        for (kind, source, label) in stages {
            match compile_shader(gl, kind, source, label) {
                Ok(shader) => {
                    gl.attach_shader(program, shader);
                    shaders.push(shader);
                }
                Err(err) => {
                    for shader in shaders {
                        gl.delete_shader(shader);
                    }
                    gl.delete_program(program);
                    return Err(err);
                }
            }
        }

        gl.link_program(program);
        let linked = gl.get_program_link_status(program);

        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(Error::GraphicsCompile(format!("link failed: {log}")));
        }

        Ok(program)
    }
}

unsafe fn compile_shader(
    gl: &glow::Context,
    kind: u32,
    source: &str,
    label: &str,
) -> Result<glow::Shader> {
    unsafe {
        let shader = gl.create_shader(kind).map_err(Error::GraphicsCompile)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(Error::GraphicsCompile(format!("{label} shader: {log}")));
        }

        Ok(shader)
    }
}
