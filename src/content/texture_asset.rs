//! Image files as textures

use std::any::Any;
use std::path::Path;

use crate::backend::GraphicsBackend;
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{GpuResource, Texture2D};

use super::Asset;

/// A [`Texture2D`] decoded from an image file.
#[derive(Debug, Default)]
pub struct TextureAsset {
    texture: Option<Texture2D>,
}

impl TextureAsset {
    /// The texture, once loaded.
    pub fn texture(&self) -> Option<&Texture2D> {
        self.texture.as_ref()
    }
}

impl<B: GraphicsBackend> Asset<B> for TextureAsset {
    fn load(&mut self, _ctx: &mut RenderContext<B>, path: &Path) -> GraphicsResult<()> {
        log::debug!("Loading texture {}", path.display());
        let texture = Texture2D::from_file(path).map_err(|e| match e {
            GraphicsError::Image(err) => GraphicsError::content_load(path, err),
            other => other,
        })?;
        self.texture = Some(texture);
        Ok(())
    }

    fn unload(&mut self, ctx: &mut RenderContext<B>) {
        if let Some(texture) = self.texture.take() {
            texture.dispose(ctx);
        }
    }

    fn is_loaded(&self) -> bool {
        self.texture.is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
