//! Sprite batching
//!
//! A [`SpriteBatch`] accumulates textured quads in fixed-capacity CPU arrays
//! and turns them into one indexed draw call per flush. A flush happens
//! when asked for, when the arrays are full, when a draw switches textures,
//! and when a [`SpriteBatchScope`] ends.

use std::rc::Rc;

use glam::{Mat4, Vec2};

use crate::backend::{
    BufferUsage, Color, ComponentType, GraphicsBackend, IndexFormat, PrimitiveTopology,
    VertexAttribPointer,
};
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{Buffer, GpuResource, Texture2D, VertexArray};

use super::quad::{quad_corners, quad_uvs, Sprite, QUAD_INDICES};
use super::shader::{
    SpriteShader, COLOR_ATTRIBUTE, POSITION_ATTRIBUTE, PROJECTION_UNIFORM, UV_ATTRIBUTE,
};
use super::{SpriteBatchScope, SpriteEffects};

/// Orthographic projection mapping pixels to clip space, origin top-left, +Y down.
pub fn ortho_projection(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh_gl(0.0, width, height, 0.0, -1.0, 1.0)
}

/// Running counters of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Quads queued
    pub sprites: u64,
    /// Flushes that had pending quads
    pub flushes: u64,
    pub draw_calls: u64,
    /// Flushes forced by a full batch
    pub capacity_flushes: u64,
    /// Flushes forced by a texture switch
    pub texture_flushes: u64,
}

fn float_attribute(components: u8) -> VertexAttribPointer {
    VertexAttribPointer {
        components,
        component_type: ComponentType::Float,
        normalized: false,
        stride: 0,
        offset: 0,
    }
}

/// Batching renderer for textured quads.
#[derive(Debug)]
pub struct SpriteBatch {
    capacity: usize,
    positions: Vec<Vec2>,
    colors: Vec<Color>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
    count: usize,
    /// Texture handle the pending quads sample from
    texture: Option<u32>,
    projection: Mat4,

    position_buffer: Buffer,
    color_buffer: Buffer,
    uv_buffer: Buffer,
    index_buffer: Buffer,
    vertex_array: VertexArray,
    layout_ready: bool,

    shader: Option<Rc<SpriteShader>>,
    stats: BatchStats,
}

impl SpriteBatch {
    /// Create a batch with the context's default capacity.
    pub fn new<B: GraphicsBackend>(ctx: &mut RenderContext<B>) -> GraphicsResult<Self> {
        let capacity = ctx.config().batch_capacity;
        Self::with_capacity(ctx, capacity)
    }

    /// Create a batch holding up to `capacity` quads (at least one).
    ///
    /// Joins the context's shared sprite shader, compiling it if no other
    /// batch holds it.
    pub fn with_capacity<B: GraphicsBackend>(
        ctx: &mut RenderContext<B>,
        capacity: usize,
    ) -> GraphicsResult<Self> {
        let capacity = capacity.max(1);
        let shader = SpriteShader::acquire(ctx)?;
        log::debug!("Created sprite batch with capacity {}", capacity);
        Ok(Self {
            capacity,
            positions: vec![Vec2::ZERO; capacity * 4],
            colors: vec![Color::WHITE; capacity * 4],
            uvs: vec![Vec2::ZERO; capacity * 4],
            indices: vec![0; capacity * 6],
            count: 0,
            texture: None,
            projection: Mat4::IDENTITY,
            position_buffer: Buffer::vertex(BufferUsage::Stream),
            color_buffer: Buffer::vertex(BufferUsage::Stream),
            uv_buffer: Buffer::vertex(BufferUsage::Stream),
            index_buffer: Buffer::index(BufferUsage::Stream),
            vertex_array: VertexArray::new(),
            layout_ready: false,
            shader: Some(shader),
            stats: BatchStats::default(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pending quads.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BatchStats::default();
    }

    /// Positions of the pending quads, four per quad.
    pub fn pending_positions(&self) -> &[Vec2] {
        &self.positions[..self.count * 4]
    }

    pub fn pending_colors(&self) -> &[Color] {
        &self.colors[..self.count * 4]
    }

    pub fn pending_uvs(&self) -> &[Vec2] {
        &self.uvs[..self.count * 4]
    }

    pub fn pending_indices(&self) -> &[u32] {
        &self.indices[..self.count * 6]
    }

    /// Handle of the texture the pending quads sample from.
    pub fn texture_handle(&self) -> Option<u32> {
        self.texture
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Projection used by subsequent flushes, pending quads included.
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Number of batches sharing the sprite shader of `ctx`.
    pub fn shader_references<B: GraphicsBackend>(ctx: &RenderContext<B>) -> usize {
        ctx.shared.sprite_shader.strong_count()
    }

    /// Start a scope that flushes exactly once when it ends.
    pub fn begin<'a, B: GraphicsBackend>(
        &'a mut self,
        ctx: &'a mut RenderContext<B>,
    ) -> SpriteBatchScope<'a, B> {
        SpriteBatchScope::new(self, ctx)
    }

    /// Draw the whole texture at its own size.
    pub fn draw<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        texture: &Texture2D,
        x: f32,
        y: f32,
    ) -> GraphicsResult<()> {
        self.draw_tinted(ctx, texture, x, y, Color::WHITE)
    }

    pub fn draw_tinted<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        texture: &Texture2D,
        x: f32,
        y: f32,
        color: Color,
    ) -> GraphicsResult<()> {
        let (width, height) = (texture.width() as f32, texture.height() as f32);
        self.draw_full(
            ctx,
            texture,
            x,
            y,
            width,
            height,
            color,
            Vec2::ZERO,
            0.0,
            SpriteEffects::None,
        )
    }

    /// Draw the whole texture stretched to `width` x `height`.
    pub fn draw_sized<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        texture: &Texture2D,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> GraphicsResult<()> {
        self.draw_full(
            ctx,
            texture,
            x,
            y,
            width,
            height,
            Color::WHITE,
            Vec2::ZERO,
            0.0,
            SpriteEffects::None,
        )
    }

    /// Draw the whole texture with every parameter spelled out.
    ///
    /// `origin` is the rotation pivot in the same space as `(x, y)`;
    /// `rotation` is in radians.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_full<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        texture: &Texture2D,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
        origin: Vec2,
        rotation: f32,
        effects: SpriteEffects,
    ) -> GraphicsResult<()> {
        self.prepare(ctx, texture)?;
        let corners = quad_corners(x, y, width, height, origin, rotation);
        let uvs = quad_uvs(
            texture.coords(0.0, 0.0),
            texture.coords(texture.width() as f32, texture.height() as f32),
            effects,
        );
        self.push_quad(corners, uvs, color);
        Ok(())
    }

    /// Draw using a parameter struct, optionally from a sub-rectangle of the texture.
    pub fn draw_sprite<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        texture: &Texture2D,
        sprite: &Sprite,
    ) -> GraphicsResult<()> {
        self.prepare(ctx, texture)?;
        let (uv_min, uv_max, natural) = match sprite.source {
            Some(source) => (
                texture.coords(source.x, source.y),
                texture.coords(source.x + source.width, source.y + source.height),
                source.size(),
            ),
            None => (
                texture.coords(0.0, 0.0),
                texture.full_extent(),
                Vec2::new(texture.width() as f32, texture.height() as f32),
            ),
        };
        let size = sprite.size.unwrap_or(natural);
        let corners = quad_corners(
            sprite.position.x,
            sprite.position.y,
            size.x,
            size.y,
            sprite.origin,
            sprite.rotation,
        );
        self.push_quad(corners, quad_uvs(uv_min, uv_max, sprite.effects), sprite.color);
        Ok(())
    }

    /// Make room for one quad sampling from `texture`.
    fn prepare<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        texture: &Texture2D,
    ) -> GraphicsResult<()> {
        if self.shader.is_none() {
            return Err(GraphicsError::InvalidParameter(
                "sprite batch used after dispose".to_string(),
            ));
        }

        if self.count == self.capacity {
            log::debug!("Sprite batch full ({} quads), flushing", self.capacity);
            self.flush(ctx)?;
            self.stats.capacity_flushes += 1;
        }

        let handle = texture.id(ctx)?;
        if self.texture != Some(handle) {
            if self.count > 0 {
                log::debug!("Sprite batch texture changed, flushing {} quads", self.count);
                self.flush(ctx)?;
                self.stats.texture_flushes += 1;
            }
            texture.bind(ctx)?;
            self.texture = Some(handle);
        } else if !texture.is_loaded() {
            // New pixels for the current texture: queued quads keep the old ones.
            if self.count > 0 {
                log::debug!("Sprite batch texture reloaded, flushing {} quads", self.count);
                self.flush(ctx)?;
                self.stats.texture_flushes += 1;
            }
            texture.bind(ctx)?;
        }
        Ok(())
    }

    fn push_quad(&mut self, corners: [Vec2; 4], uvs: [Vec2; 4], color: Color) {
        let vertex = self.count * 4;
        self.positions[vertex..vertex + 4].copy_from_slice(&corners);
        self.uvs[vertex..vertex + 4].copy_from_slice(&uvs);
        self.colors[vertex..vertex + 4].fill(color);

        let base = vertex as u32;
        let index = self.count * 6;
        for (slot, offset) in self.indices[index..index + 6].iter_mut().zip(QUAD_INDICES) {
            *slot = base + offset;
        }

        self.count += 1;
        self.stats.sprites += 1;
    }

    /// Upload the pending quads and draw them with one indexed draw call.
    ///
    /// Does nothing when no quads are pending.
    pub fn flush<B: GraphicsBackend>(&mut self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        if self.count == 0 {
            return Ok(());
        }
        let Some(shader) = self.shader.clone() else {
            return Err(GraphicsError::InvalidParameter(
                "sprite batch used after dispose".to_string(),
            ));
        };

        // Uploading the index buffer binds it into whatever vertex array is
        // current, so ours has to be bound first.
        self.vertex_array.bind(ctx)?;
        if !self.layout_ready {
            self.setup_layout(ctx)?;
        }

        let vertices = self.count * 4;
        let indices = self.count * 6;
        self.position_buffer
            .set_data(ctx, &self.positions[..vertices])?;
        self.color_buffer.set_data(ctx, &self.colors[..vertices])?;
        self.uv_buffer.set_data(ctx, &self.uvs[..vertices])?;
        self.index_buffer.set_data(ctx, &self.indices[..indices])?;

        if let Some(texture) = self.texture {
            ctx.bind_texture(texture);
        }
        let program = shader.program();
        program.bind(ctx)?;
        program.set_uniform(ctx, PROJECTION_UNIFORM, self.projection)?;
        ctx.backend_mut().draw_elements(
            PrimitiveTopology::Triangles,
            indices as u32,
            IndexFormat::Uint32,
            0,
        );

        log::trace!("Sprite batch flushed {} quads", self.count);
        self.count = 0;
        self.stats.flushes += 1;
        self.stats.draw_calls += 1;
        Ok(())
    }

    fn setup_layout<B: GraphicsBackend>(&mut self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        let vao = &self.vertex_array;
        vao.bind_buffer_at(ctx, &self.position_buffer, POSITION_ATTRIBUTE, float_attribute(2))?;
        vao.bind_buffer_at(ctx, &self.color_buffer, COLOR_ATTRIBUTE, float_attribute(4))?;
        vao.bind_buffer_at(ctx, &self.uv_buffer, UV_ATTRIBUTE, float_attribute(2))?;
        vao.set_index_buffer(ctx, &self.index_buffer)?;
        self.layout_ready = true;
        Ok(())
    }

    /// Release the buffers and vertex array and drop this batch's share of
    /// the sprite shader, releasing it when no other batch holds it.
    ///
    /// Pending quads are discarded. Calling it again is a no-op.
    pub fn dispose<B: GraphicsBackend>(&mut self, ctx: &mut RenderContext<B>) {
        let Some(shader) = self.shader.take() else {
            return;
        };
        if self.count > 0 {
            log::warn!("Disposing sprite batch with {} pending quads", self.count);
            self.count = 0;
        }

        self.position_buffer.dispose(ctx);
        self.color_buffer.dispose(ctx);
        self.uv_buffer.dispose(ctx);
        self.index_buffer.dispose(ctx);
        self.vertex_array.dispose(ctx);
        self.layout_ready = false;
        self.texture = None;

        if Rc::strong_count(&shader) == 1 {
            log::debug!("Last sprite batch disposed, releasing sprite shader");
            shader.dispose(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_ortho_projection_maps_pixels_to_clip_space() {
        let projection = ortho_projection(800.0, 600.0);
        let top_left = projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let bottom_right = projection * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!(top_left.abs_diff_eq(Vec4::new(-1.0, 1.0, 0.0, 1.0), 1e-6));
        assert!(bottom_right.abs_diff_eq(Vec4::new(1.0, -1.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn test_float_attribute_is_tightly_packed() {
        let pointer = float_attribute(4);
        assert_eq!(pointer.components, 4);
        assert_eq!(pointer.stride, 0);
        assert_eq!(pointer.offset, 0);
        assert!(!pointer.normalized);
    }
}
