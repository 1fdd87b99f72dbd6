//! GPU resource wrappers
//!
//! Every wrapper owns at most one backend handle. Handles are allocated
//! lazily on first use, never in a constructor, and are released only through
//! [`GpuResource::dispose`]. Dropping a wrapper never frees GPU state; the
//! context's registry reports whatever was not disposed.

mod buffer;
mod handle;
mod program;
mod shader;
mod texture;
mod vertex;
mod vertex_array;

pub use buffer::*;
pub use program::*;
pub use shader::*;
pub use texture::*;
pub use vertex::*;
pub use vertex_array::*;

pub(crate) use handle::LazyHandle;

use crate::backend::{GraphicsBackend, ResourceKind};
use crate::context::RenderContext;
use crate::error::GraphicsResult;

/// Behavior shared by all GPU resource wrappers.
pub trait GpuResource {
    /// Kind of backend object this wrapper owns.
    fn kind(&self) -> ResourceKind;

    /// Current handle, `0` when nothing is allocated. Never allocates.
    fn raw_id(&self) -> u32;

    /// Current handle, allocating it on first call.
    fn id<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<u32>;

    fn is_allocated(&self) -> bool {
        self.raw_id() != 0
    }

    /// Release the handle. Calling it again is a no-op.
    fn dispose<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>);
}
