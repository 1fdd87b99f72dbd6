//! OpenGL backend through `glow`
//!
//! Handles returned by this backend are the raw GL object names. The context
//! passed to [`GlBackend::new`] must be current on the calling thread for the
//! whole lifetime of the backend.

use std::num::NonZeroU32;

use glow::HasContext;

use super::traits::{BackendError, BackendResult, GraphicsBackend};
use super::types::*;

/// OpenGL graphics backend
pub struct GlBackend {
    gl: glow::Context,
}

impl GlBackend {
    /// Wrap a current OpenGL context.
    pub fn new(gl: glow::Context) -> Self {
        log::info!("Initializing OpenGL backend");
        // SAFETY: the caller guarantees the context is current.
        unsafe {
            log::info!("GL_VERSION: {}", gl.get_parameter_string(glow::VERSION));
            log::info!("GL_RENDERER: {}", gl.get_parameter_string(glow::RENDERER));
        }
        log::debug!("{} GL extensions available", gl.supported_extensions().len());
        Self { gl }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Whether the driver reports `extension`, e.g. `"GL_ARB_debug_output"`.
    pub fn has_extension(&self, extension: &str) -> bool {
        self.gl.supported_extensions().contains(extension)
    }

    /// Drain the GL error queue and log what was pending after `operation`.
    /// Debug builds only.
    #[cfg(debug_assertions)]
    fn check_error(&self, operation: &str) {
        // SAFETY: same context requirement as every other call.
        loop {
            let code = unsafe { self.gl.get_error() };
            if code == glow::NO_ERROR {
                break;
            }
            log::error!("{} after {}", gl_error_name(code), operation);
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn check_error(&self, _operation: &str) {}

    /// Wrap an object creation result, turning a pending GL error into a
    /// creation failure in debug builds.
    fn created(
        &self,
        kind: ResourceKind,
        result: Result<NonZeroU32, String>,
    ) -> BackendResult<u32> {
        let id = result.map_err(|e| creation_failed(kind, e))?;
        #[cfg(debug_assertions)]
        {
            let code = unsafe { self.gl.get_error() };
            if code != glow::NO_ERROR {
                return Err(creation_failed(kind, gl_error_name(code).to_string()));
            }
        }
        Ok(id.get())
    }
}

fn gl_error_name(code: u32) -> &'static str {
    match code {
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        _ => "unknown GL error",
    }
}

fn stage_to_gl(kind: ShaderStageKind) -> u32 {
    match kind {
        ShaderStageKind::Vertex => glow::VERTEX_SHADER,
        ShaderStageKind::Fragment => glow::FRAGMENT_SHADER,
        ShaderStageKind::Geometry => glow::GEOMETRY_SHADER,
        ShaderStageKind::TessControl => glow::TESS_CONTROL_SHADER,
        ShaderStageKind::TessEvaluation => glow::TESS_EVALUATION_SHADER,
        ShaderStageKind::Compute => glow::COMPUTE_SHADER,
    }
}

fn target_to_gl(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Vertex => glow::ARRAY_BUFFER,
        BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn usage_to_gl(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::Static => glow::STATIC_DRAW,
        BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
        BufferUsage::Stream => glow::STREAM_DRAW,
    }
}

fn component_to_gl(ty: ComponentType) -> u32 {
    match ty {
        ComponentType::Byte => glow::BYTE,
        ComponentType::UnsignedByte => glow::UNSIGNED_BYTE,
        ComponentType::Short => glow::SHORT,
        ComponentType::UnsignedShort => glow::UNSIGNED_SHORT,
        ComponentType::Int => glow::INT,
        ComponentType::UnsignedInt => glow::UNSIGNED_INT,
        ComponentType::Float => glow::FLOAT,
        ComponentType::Double => glow::DOUBLE,
    }
}

fn filter_to_gl(filter: TextureFilter) -> i32 {
    match filter {
        TextureFilter::Nearest => glow::NEAREST as i32,
        TextureFilter::Linear => glow::LINEAR as i32,
    }
}

fn topology_to_gl(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::Triangles => glow::TRIANGLES,
    }
}

fn index_format_to_gl(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::Uint32 => glow::UNSIGNED_INT,
    }
}

fn attribute_type_name(ty: u32) -> String {
    let name = match ty {
        glow::FLOAT => "float",
        glow::FLOAT_VEC2 => "vec2",
        glow::FLOAT_VEC3 => "vec3",
        glow::FLOAT_VEC4 => "vec4",
        glow::INT => "int",
        glow::UNSIGNED_INT => "uint",
        glow::FLOAT_MAT4 => "mat4",
        other => return format!("0x{other:04x}"),
    };
    name.to_string()
}

fn name(id: u32) -> Option<NonZeroU32> {
    NonZeroU32::new(id)
}

fn creation_failed(kind: ResourceKind, message: String) -> BackendError {
    BackendError::CreationFailed(kind, message)
}

// SAFETY (all blocks below): `GlBackend::new` requires a current context and
// every handle passed in was produced by this backend.
impl GraphicsBackend for GlBackend {
    fn name(&self) -> &'static str {
        "OpenGL Backend"
    }

    fn create_shader(&mut self, kind: ShaderStageKind) -> BackendResult<u32> {
        let result = unsafe { self.gl.create_shader(stage_to_gl(kind)) }.map(|shader| shader.0);
        self.created(ResourceKind::Shader, result)
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        if let Some(id) = name(shader) {
            unsafe { self.gl.shader_source(glow::NativeShader(id), source) }
        }
    }

    fn compile_shader(&mut self, shader: u32) {
        if let Some(id) = name(shader) {
            unsafe { self.gl.compile_shader(glow::NativeShader(id)) }
            self.check_error("glCompileShader");
        }
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        name(shader)
            .is_some_and(|id| unsafe { self.gl.get_shader_compile_status(glow::NativeShader(id)) })
    }

    fn shader_info_log(&self, shader: u32) -> String {
        name(shader)
            .map(|id| unsafe { self.gl.get_shader_info_log(glow::NativeShader(id)) })
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: u32) {
        if let Some(id) = name(shader) {
            unsafe { self.gl.delete_shader(glow::NativeShader(id)) }
        }
    }

    fn create_program(&mut self) -> BackendResult<u32> {
        let result = unsafe { self.gl.create_program() }.map(|program| program.0);
        self.created(ResourceKind::Program, result)
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        if let (Some(p), Some(s)) = (name(program), name(shader)) {
            unsafe {
                self.gl
                    .attach_shader(glow::NativeProgram(p), glow::NativeShader(s))
            }
        }
    }

    fn bind_attrib_location(&mut self, program: u32, index: u32, attrib: &str) {
        if let Some(p) = name(program) {
            unsafe {
                self.gl
                    .bind_attrib_location(glow::NativeProgram(p), index, attrib)
            }
        }
    }

    fn bind_frag_data_location(&mut self, program: u32, color: u32, output: &str) {
        if let Some(p) = name(program) {
            unsafe {
                self.gl
                    .bind_frag_data_location(glow::NativeProgram(p), color, output)
            }
        }
    }

    fn link_program(&mut self, program: u32) {
        if let Some(p) = name(program) {
            unsafe { self.gl.link_program(glow::NativeProgram(p)) }
            self.check_error("glLinkProgram");
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        name(program)
            .is_some_and(|p| unsafe { self.gl.get_program_link_status(glow::NativeProgram(p)) })
    }

    fn validate_program(&mut self, program: u32) {
        if let Some(p) = name(program) {
            unsafe { self.gl.validate_program(glow::NativeProgram(p)) }
        }
    }

    fn program_validate_status(&self, program: u32) -> bool {
        name(program).is_some_and(|p| unsafe {
            self.gl
                .get_program_parameter_i32(glow::NativeProgram(p), glow::VALIDATE_STATUS)
                != 0
        })
    }

    fn program_info_log(&self, program: u32) -> String {
        name(program)
            .map(|p| unsafe { self.gl.get_program_info_log(glow::NativeProgram(p)) })
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: u32) -> Vec<ActiveAttribute> {
        let Some(p) = name(program) else {
            return Vec::new();
        };
        let program = glow::NativeProgram(p);
        unsafe {
            let count = self.gl.get_active_attributes(program);
            (0..count)
                .filter_map(|index| self.gl.get_active_attribute(program, index))
                .map(|attribute| ActiveAttribute {
                    name: attribute.name,
                    size: attribute.size,
                    type_name: attribute_type_name(attribute.atype),
                })
                .collect()
        }
    }

    fn attrib_location(&self, program: u32, attrib: &str) -> Option<u32> {
        let p = name(program)?;
        unsafe { self.gl.get_attrib_location(glow::NativeProgram(p), attrib) }
    }

    fn uniform_location(&self, program: u32, uniform: &str) -> Option<i32> {
        let p = name(program)?;
        unsafe { self.gl.get_uniform_location(glow::NativeProgram(p), uniform) }
            .map(|location| location.0 as i32)
    }

    fn use_program(&mut self, program: u32) {
        unsafe { self.gl.use_program(name(program).map(glow::NativeProgram)) }
    }

    fn set_uniform(&mut self, location: i32, value: &UniformValue) {
        let location = glow::NativeUniformLocation(location as u32);
        let loc = Some(&location);
        unsafe {
            match *value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(loc, v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(loc, v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32(loc, v.x, v.y),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(loc, v.x, v.y, v.z),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(loc, v.x, v.y, v.z, v.w),
                UniformValue::Color(c) => self.gl.uniform_4_f32(loc, c.r, c.g, c.b, c.a),
                UniformValue::Mat4(m) => {
                    self.gl
                        .uniform_matrix_4_f32_slice(loc, false, &m.to_cols_array())
                }
            }
        }
        self.check_error("glUniform");
    }

    fn delete_program(&mut self, program: u32) {
        if let Some(p) = name(program) {
            unsafe { self.gl.delete_program(glow::NativeProgram(p)) }
        }
    }

    fn create_buffer(&mut self) -> BackendResult<u32> {
        let result = unsafe { self.gl.create_buffer() }.map(|buffer| buffer.0);
        self.created(ResourceKind::Buffer, result)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: u32) {
        unsafe {
            self.gl
                .bind_buffer(target_to_gl(target), name(buffer).map(glow::NativeBuffer))
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(target_to_gl(target), data, usage_to_gl(usage))
        }
        self.check_error("glBufferData");
    }

    fn delete_buffer(&mut self, buffer: u32) {
        if let Some(b) = name(buffer) {
            unsafe { self.gl.delete_buffer(glow::NativeBuffer(b)) }
        }
    }

    fn create_vertex_array(&mut self) -> BackendResult<u32> {
        let result = unsafe { self.gl.create_vertex_array() }.map(|vao| vao.0);
        self.created(ResourceKind::VertexArray, result)
    }

    fn bind_vertex_array(&mut self, vertex_array: u32) {
        unsafe {
            self.gl
                .bind_vertex_array(name(vertex_array).map(glow::NativeVertexArray))
        }
    }

    fn enable_vertex_attrib(&mut self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_pointer(&mut self, index: u32, pointer: &VertexAttribPointer) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                index,
                pointer.components as i32,
                component_to_gl(pointer.component_type),
                pointer.normalized,
                pointer.stride as i32,
                pointer.offset as i32,
            )
        }
        self.check_error("glVertexAttribPointer");
    }

    fn delete_vertex_array(&mut self, vertex_array: u32) {
        if let Some(v) = name(vertex_array) {
            unsafe { self.gl.delete_vertex_array(glow::NativeVertexArray(v)) }
        }
    }

    fn create_texture(&mut self) -> BackendResult<u32> {
        let result = unsafe { self.gl.create_texture() }.map(|texture| texture.0);
        self.created(ResourceKind::Texture, result)
    }

    fn bind_texture(&mut self, texture: u32) {
        unsafe {
            self.gl
                .bind_texture(glow::TEXTURE_2D, name(texture).map(glow::NativeTexture))
        }
    }

    fn texture_filters(&mut self, min: TextureFilter, mag: TextureFilter) {
        unsafe {
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter_to_gl(min));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter_to_gl(mag));
        }
    }

    fn texture_image_2d(&mut self, width: u32, height: u32, pixels: &[u8]) {
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(pixels),
            )
        }
        self.check_error("glTexImage2D");
    }

    fn delete_texture(&mut self, texture: u32) {
        if let Some(t) = name(texture) {
            unsafe { self.gl.delete_texture(glow::NativeTexture(t)) }
        }
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: u32,
    ) {
        unsafe {
            self.gl.draw_elements(
                topology_to_gl(topology),
                count as i32,
                index_format_to_gl(format),
                offset as i32,
            )
        }
        self.check_error("glDrawElements");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl_error_names() {
        assert_eq!(gl_error_name(glow::INVALID_OPERATION), "GL_INVALID_OPERATION");
        assert_eq!(gl_error_name(glow::OUT_OF_MEMORY), "GL_OUT_OF_MEMORY");
        assert_eq!(gl_error_name(0x1234), "unknown GL error");
    }

    #[test]
    fn test_draw_enums_map_to_gl() {
        assert_eq!(topology_to_gl(PrimitiveTopology::Triangles), glow::TRIANGLES);
        assert_eq!(index_format_to_gl(IndexFormat::Uint32), glow::UNSIGNED_INT);
    }
}
