//! Core backend abstraction traits
//!
//! The wrappers in [`crate::resources`] talk to the GPU exclusively through
//! [`GraphicsBackend`]. The trait mirrors a retained-mode API: objects are
//! named by non-zero `u32` handles, edited through a bind point and released
//! explicitly. Handle `0` always means "no object".

use thiserror::Error;

use crate::backend::types::*;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("failed to create {0}: {1}")]
    CreationFailed(ResourceKind, String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Main graphics backend trait
///
/// Every call is synchronous and issued in program order. Implementations
/// are only ever driven from the thread that owns the graphics context.
pub trait GraphicsBackend: 'static {
    /// Human readable backend name
    fn name(&self) -> &'static str;

    // Shader stages

    fn create_shader(&mut self, kind: ShaderStageKind) -> BackendResult<u32>;
    fn shader_source(&mut self, shader: u32, source: &str);
    fn compile_shader(&mut self, shader: u32);
    fn shader_compile_status(&self, shader: u32) -> bool;
    fn shader_info_log(&self, shader: u32) -> String;
    fn delete_shader(&mut self, shader: u32);

    // Programs

    fn create_program(&mut self) -> BackendResult<u32>;
    fn attach_shader(&mut self, program: u32, shader: u32);
    /// Takes effect on the next link.
    fn bind_attrib_location(&mut self, program: u32, index: u32, name: &str);
    /// Takes effect on the next link.
    fn bind_frag_data_location(&mut self, program: u32, color: u32, name: &str);
    fn link_program(&mut self, program: u32);
    fn program_link_status(&self, program: u32) -> bool;
    fn validate_program(&mut self, program: u32);
    fn program_validate_status(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn active_attributes(&self, program: u32) -> Vec<ActiveAttribute>;
    fn attrib_location(&self, program: u32, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: u32, name: &str) -> Option<i32>;
    /// Make `program` current; `0` unbinds.
    fn use_program(&mut self, program: u32);
    /// Write a uniform of the currently used program.
    fn set_uniform(&mut self, location: i32, value: &UniformValue);
    fn delete_program(&mut self, program: u32);

    // Buffers

    fn create_buffer(&mut self) -> BackendResult<u32>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: u32);
    /// Replace the whole store of the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn delete_buffer(&mut self, buffer: u32);

    // Vertex arrays

    fn create_vertex_array(&mut self) -> BackendResult<u32>;
    fn bind_vertex_array(&mut self, vertex_array: u32);
    fn enable_vertex_attrib(&mut self, index: u32);
    /// Describe attribute `index` as reading from the currently bound vertex buffer.
    fn vertex_attrib_pointer(&mut self, index: u32, pointer: &VertexAttribPointer);
    fn delete_vertex_array(&mut self, vertex_array: u32);

    // Textures

    fn create_texture(&mut self) -> BackendResult<u32>;
    fn bind_texture(&mut self, texture: u32);
    /// Set filters of the currently bound texture.
    fn texture_filters(&mut self, min: TextureFilter, mag: TextureFilter);
    /// Upload tightly packed RGBA8 pixels to the currently bound texture.
    fn texture_image_2d(&mut self, width: u32, height: u32, pixels: &[u8]);
    fn delete_texture(&mut self, texture: u32);

    // Drawing

    /// Indexed draw using the bound program, vertex array and texture.
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: u32,
    );
}
