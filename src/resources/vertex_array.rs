//! Vertex array objects

use std::fmt;

use crate::backend::{BufferTarget, GraphicsBackend, ResourceKind, VertexAttribPointer};
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult};

use super::{Buffer, GpuResource, LazyHandle, ShaderProgram, VertexLayout};

/// Records which buffers feed which attribute slots, plus an index buffer.
#[derive(Debug)]
pub struct VertexArray {
    handle: LazyHandle,
}

impl Default for VertexArray {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexArray {
    pub fn new() -> Self {
        Self {
            handle: LazyHandle::new(ResourceKind::VertexArray),
        }
    }

    pub fn bind<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        let id = self.id(ctx)?;
        ctx.backend_mut().bind_vertex_array(id);
        Ok(())
    }

    pub fn unbind<B: GraphicsBackend>(ctx: &mut RenderContext<B>) {
        ctx.backend_mut().bind_vertex_array(0);
    }

    /// Feed attribute `index` from `buffer` as described by `format`.
    pub fn bind_buffer_at<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        buffer: &Buffer,
        index: u32,
        format: VertexAttribPointer,
    ) -> GraphicsResult<()> {
        self.bind(ctx)?;
        buffer.bind(ctx)?;
        let backend = ctx.backend_mut();
        backend.enable_vertex_attrib(index);
        backend.vertex_attrib_pointer(index, &format);
        Ok(())
    }

    /// Feed the attribute called `name` in `program` from `buffer`.
    pub fn bind_buffer_named<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        buffer: &Buffer,
        program: &ShaderProgram,
        name: &str,
        format: VertexAttribPointer,
    ) -> GraphicsResult<()> {
        let index = program.attrib_location(ctx, name)?;
        self.bind_buffer_at(ctx, buffer, index, format)
    }

    /// Feed every element of an interleaved `layout` from `buffer`.
    pub fn bind_layout<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        buffer: &Buffer,
        layout: &VertexLayout,
    ) -> GraphicsResult<()> {
        let stride = layout.stride();
        for element in layout.elements() {
            self.bind_buffer_at(ctx, buffer, element.index, element.pointer(stride))?;
        }
        Ok(())
    }

    /// Record `buffer` as this array's index buffer.
    pub fn set_index_buffer<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        buffer: &Buffer,
    ) -> GraphicsResult<()> {
        if buffer.target() != BufferTarget::Index {
            return Err(GraphicsError::InvalidParameter(format!(
                "{buffer} is not an index buffer"
            )));
        }
        self.bind(ctx)?;
        buffer.bind(ctx)
    }
}

impl GpuResource for VertexArray {
    fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }

    fn raw_id(&self) -> u32 {
        self.handle.get()
    }

    fn id<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<u32> {
        self.handle.get_or_allocate(ctx, |b| b.create_vertex_array())
    }

    fn dispose<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) {
        self.handle.release(ctx, |b, id| b.delete_vertex_array(id));
    }
}

impl fmt::Display for VertexArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VertexArray {}", self.handle.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferUsage, ComponentType, HeadlessBackend};
    use crate::resources::{VertexPositionColorTexture, VertexType};

    #[test]
    fn test_bind_layout_describes_every_element() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let vao = VertexArray::new();
        let vertices = Buffer::vertex(BufferUsage::Static);
        vertices
            .set_data(&mut ctx, &[<VertexPositionColorTexture as bytemuck::Zeroable>::zeroed(); 4])
            .unwrap();

        vao.bind_layout(&mut ctx, &vertices, &VertexPositionColorTexture::layout())
            .unwrap();

        let backend = ctx.backend();
        for (index, offset, components) in [(0, 0, 3), (1, 12, 4), (2, 28, 2)] {
            let (buffer, pointer) = backend.vertex_attribute(vao.raw_id(), index).unwrap();
            assert_eq!(buffer, vertices.raw_id());
            assert_eq!(pointer.offset, offset);
            assert_eq!(pointer.components, components);
            assert_eq!(pointer.stride, 36);
            assert_eq!(pointer.component_type, ComponentType::Float);
            assert!(backend.is_attribute_enabled(vao.raw_id(), index));
        }

        vao.dispose(&mut ctx);
        vertices.dispose(&mut ctx);
        ctx.shutdown().unwrap();
    }

    #[test]
    fn test_index_buffer_is_recorded() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let vao = VertexArray::new();
        let indices = Buffer::index(BufferUsage::Static);

        vao.set_index_buffer(&mut ctx, &indices).unwrap();
        assert_eq!(
            ctx.backend().vertex_array_index_buffer(vao.raw_id()),
            Some(indices.raw_id())
        );

        vao.dispose(&mut ctx);
        indices.dispose(&mut ctx);
    }

    #[test]
    fn test_vertex_buffer_rejected_as_index_buffer() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let vao = VertexArray::new();
        let vertices = Buffer::vertex(BufferUsage::Static);

        let result = vao.set_index_buffer(&mut ctx, &vertices);
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
        assert_eq!(vao.raw_id(), 0);
    }
}
