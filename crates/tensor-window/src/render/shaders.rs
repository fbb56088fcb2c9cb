/// Emits one triangle that covers the viewport.
///
/// Corners land at (-1, 1), (3, 1) and (-1, -3); the part outside clip space
/// is discarded. Texture coordinates run past [0, 1] at the clipped corners so
/// the visible region maps exactly onto the texture, row 0 at the top.
pub const VERTEX_SHADER_SOURCE: &str = r#"#version 330 core

out vec2 texcoords;

const vec2 positions[3] = vec2[3](
    vec2(-1.0,  1.0),
    vec2( 3.0,  1.0),
    vec2(-1.0, -3.0)
);

const vec2 texpos[3] = vec2[3](
    vec2(0.0, 0.0),
    vec2(2.0, 0.0),
    vec2(0.0, 2.0)
);

void main() {
    gl_Position = vec4(positions[gl_VertexID], 0.0, 1.0);
    texcoords = texpos[gl_VertexID];
}
"#;

pub const FRAGMENT_SHADER_SOURCE: &str = r#"#version 330 core

in vec2 texcoords;

out vec4 outputColour;

uniform sampler2D texSampler;

void main() {
    outputColour = texture(texSampler, texcoords);
}
"#;
