//! Program shared by every sprite batch of a context.

use std::rc::Rc;

use crate::backend::{GraphicsBackend, ShaderStageKind};
use crate::context::RenderContext;
use crate::error::GraphicsResult;
use crate::resources::{GpuResource, ShaderProgram, ShaderStage};

pub const POSITION_ATTRIBUTE: u32 = 0;
pub const COLOR_ATTRIBUTE: u32 = 1;
pub const UV_ATTRIBUTE: u32 = 2;

/// Name of the projection matrix uniform.
pub const PROJECTION_UNIFORM: &str = "projection";
pub const TEXTURE_UNIFORM: &str = "sprite_texture";

const VERTEX_SOURCE: &str = "#version 330 core
in vec2 vertex_pos;
in vec4 vertex_color;
in vec2 vertex_uv;

uniform mat4 projection;

out vec4 frag_color;
out vec2 frag_uv;

void main() {
    gl_Position = projection * vec4(vertex_pos, 0.0, 1.0);
    frag_color = vertex_color;
    frag_uv = vertex_uv;
}
";

const FRAGMENT_SOURCE: &str = "#version 330 core
in vec4 frag_color;
in vec2 frag_uv;

uniform sampler2D sprite_texture;

out vec4 color_out;

void main() {
    color_out = texture(sprite_texture, frag_uv) * frag_color;
}
";

/// Vertex and fragment stage linked into the sprite program.
#[derive(Debug)]
pub struct SpriteShader {
    vertex: ShaderStage,
    fragment: ShaderStage,
    program: ShaderProgram,
}

impl SpriteShader {
    /// Return the context's shared shader, creating it when no batch holds it.
    pub(crate) fn acquire<B: GraphicsBackend>(
        ctx: &mut RenderContext<B>,
    ) -> GraphicsResult<Rc<Self>> {
        if let Some(shader) = ctx.shared.sprite_shader.upgrade() {
            return Ok(shader);
        }
        let shader = Rc::new(Self::create(ctx)?);
        ctx.shared.sprite_shader = Rc::downgrade(&shader);
        log::debug!("Created sprite shader ({})", shader.program);
        Ok(shader)
    }

    fn create<B: GraphicsBackend>(ctx: &mut RenderContext<B>) -> GraphicsResult<Self> {
        let shader = Self {
            vertex: ShaderStage::new(ShaderStageKind::Vertex),
            fragment: ShaderStage::new(ShaderStageKind::Fragment),
            program: ShaderProgram::new(),
        };
        if let Err(err) = shader.build(ctx) {
            shader.dispose(ctx);
            return Err(err);
        }
        Ok(shader)
    }

    fn build<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        self.vertex.compile(ctx, VERTEX_SOURCE)?;
        self.fragment.compile(ctx, FRAGMENT_SOURCE)?;
        self.program.attach(ctx, &self.vertex)?;
        self.program.attach(ctx, &self.fragment)?;
        self.program
            .bind_attribute_location(ctx, POSITION_ATTRIBUTE, "vertex_pos")?;
        self.program
            .bind_attribute_location(ctx, COLOR_ATTRIBUTE, "vertex_color")?;
        self.program
            .bind_attribute_location(ctx, UV_ATTRIBUTE, "vertex_uv")?;
        self.program.bind_frag_data_location(ctx, 0, "color_out")?;
        self.program.link(ctx)?;
        self.program.set_uniform(ctx, TEXTURE_UNIFORM, 0i32)
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub(crate) fn dispose<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) {
        self.program.dispose(ctx);
        self.vertex.dispose(ctx);
        self.fragment.dispose(ctx);
    }
}
