//! GPU buffers

use std::cell::Cell;
use std::fmt;

use bytemuck::Pod;

use crate::backend::{BufferTarget, BufferUsage, GraphicsBackend, ResourceKind};
use crate::context::RenderContext;
use crate::error::GraphicsResult;

use super::{GpuResource, LazyHandle};

/// Vertex or index data living on the GPU.
///
/// The usage hint is fixed at construction. Every upload replaces the whole
/// store; there is no partial update.
#[derive(Debug)]
pub struct Buffer {
    target: BufferTarget,
    usage: BufferUsage,
    handle: LazyHandle,
    len: Cell<usize>,
    stride: Cell<usize>,
}

impl Buffer {
    pub fn new(target: BufferTarget, usage: BufferUsage) -> Self {
        Self {
            target,
            usage,
            handle: LazyHandle::new(ResourceKind::Buffer),
            len: Cell::new(0),
            stride: Cell::new(0),
        }
    }

    /// Vertex data buffer
    pub fn vertex(usage: BufferUsage) -> Self {
        Self::new(BufferTarget::Vertex, usage)
    }

    /// Index data buffer
    pub fn index(usage: BufferUsage) -> Self {
        Self::new(BufferTarget::Index, usage)
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Number of elements in the last upload.
    pub fn len(&self) -> usize {
        self.len.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Size in bytes of one element of the last upload.
    pub fn stride(&self) -> usize {
        self.stride.get()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len.get() * self.stride.get()
    }

    pub fn bind<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        let id = self.id(ctx)?;
        ctx.backend_mut().bind_buffer(self.target, id);
        Ok(())
    }

    /// Bind the buffer and upload `data`, replacing the previous contents.
    ///
    /// The buffer stays bound afterwards. Unbinding an index buffer here would
    /// detach it from whatever vertex array is current.
    pub fn set_data<B: GraphicsBackend, T: Pod>(
        &self,
        ctx: &mut RenderContext<B>,
        data: &[T],
    ) -> GraphicsResult<()> {
        self.bind(ctx)?;
        ctx.backend_mut()
            .buffer_data(self.target, bytemuck::cast_slice(data), self.usage);
        self.len.set(data.len());
        self.stride.set(std::mem::size_of::<T>());
        Ok(())
    }
}

impl GpuResource for Buffer {
    fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }

    fn raw_id(&self) -> u32 {
        self.handle.get()
    }

    fn id<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<u32> {
        self.handle.get_or_allocate(ctx, |b| b.create_buffer())
    }

    fn dispose<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) {
        if self.handle.release(ctx, |b, id| b.delete_buffer(id)) {
            self.len.set(0);
            self.stride.set(0);
        }
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer {} ({:?})", self.handle.get(), self.target)
    }
}
