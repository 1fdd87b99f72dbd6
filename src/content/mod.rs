//! Content loading
//!
//! Assets are loaded from disk through a [`ContentManager`], which caches
//! them by resolved path. Each asset type knows how to load and unload
//! itself; the manager picks the type from the call site.

mod manager;
mod shader_collection;
mod texture_asset;

pub use manager::ContentManager;
pub use shader_collection::{ShaderCollection, ShaderCollectionDescriptor, ShaderDescriptor};
pub use texture_asset::TextureAsset;

use std::any::Any;
use std::path::Path;

use crate::backend::GraphicsBackend;
use crate::context::RenderContext;
use crate::error::GraphicsResult;

/// Something a [`ContentManager`] can load from a path.
pub trait Asset<B: GraphicsBackend>: Any {
    /// Load from `path`. On error nothing stays allocated.
    fn load(&mut self, ctx: &mut RenderContext<B>, path: &Path) -> GraphicsResult<()>;

    /// Release everything `load` allocated.
    fn unload(&mut self, ctx: &mut RenderContext<B>);

    fn is_loaded(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}
