//! Scoped batch use

use glam::Vec2;

use crate::backend::{Color, GraphicsBackend};
use crate::context::RenderContext;
use crate::error::GraphicsResult;
use crate::resources::Texture2D;

use super::{Sprite, SpriteBatch, SpriteEffects};

/// A batch borrowed together with its context for a run of draws.
///
/// Flushes exactly once when it ends: [`end`](Self::end) returns the flush
/// result, dropping the scope flushes and logs any error.
///
/// Obtain via [`SpriteBatch::begin`].
pub struct SpriteBatchScope<'a, B: GraphicsBackend> {
    batch: &'a mut SpriteBatch,
    ctx: &'a mut RenderContext<B>,
    finished: bool,
}

impl<'a, B: GraphicsBackend> SpriteBatchScope<'a, B> {
    pub(crate) fn new(batch: &'a mut SpriteBatch, ctx: &'a mut RenderContext<B>) -> Self {
        Self {
            batch,
            ctx,
            finished: false,
        }
    }

    pub fn batch(&self) -> &SpriteBatch {
        &*self.batch
    }

    /// The context, for work interleaved with drawing.
    pub fn ctx(&mut self) -> &mut RenderContext<B> {
        &mut *self.ctx
    }

    pub fn draw(&mut self, texture: &Texture2D, x: f32, y: f32) -> GraphicsResult<()> {
        self.batch.draw(self.ctx, texture, x, y)
    }

    pub fn draw_tinted(
        &mut self,
        texture: &Texture2D,
        x: f32,
        y: f32,
        color: Color,
    ) -> GraphicsResult<()> {
        self.batch.draw_tinted(self.ctx, texture, x, y, color)
    }

    pub fn draw_sized(
        &mut self,
        texture: &Texture2D,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> GraphicsResult<()> {
        self.batch.draw_sized(self.ctx, texture, x, y, width, height)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_full(
        &mut self,
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
        self.batch.draw_full(
            self.ctx, texture, x, y, width, height, color, origin, rotation, effects,
        )
    }

    pub fn draw_sprite(&mut self, texture: &Texture2D, sprite: &Sprite) -> GraphicsResult<()> {
        self.batch.draw_sprite(self.ctx, texture, sprite)
    }

    /// Flush and end the scope.
    pub fn end(mut self) -> GraphicsResult<()> {
        self.finished = true;
        self.batch.flush(self.ctx)
    }
}

impl<B: GraphicsBackend> Drop for SpriteBatchScope<'_, B> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.batch.flush(self.ctx) {
            log::error!("Sprite batch flush at scope end failed: {}", err);
        }
    }
}
