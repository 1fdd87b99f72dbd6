//! Linked shader program

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use crate::backend::{GraphicsBackend, ResourceKind, UniformValue};
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult, LocationKind};

use super::{GpuResource, LazyHandle, ShaderStage};

/// Link state of a [`ShaderProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Unlinked,
    Linked,
    Failed,
}

/// A set of shader stages linked into one program.
///
/// The program never owns its stages; they must outlive the link and are
/// disposed by whoever created them.
#[derive(Debug)]
pub struct ShaderProgram {
    handle: LazyHandle,
    attached: RefCell<Vec<u32>>,
    state: Cell<ProgramState>,
    attributes: RefCell<HashMap<String, u32>>,
    uniforms: RefCell<HashMap<String, i32>>,
}

impl Default for ShaderProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderProgram {
    pub fn new() -> Self {
        Self {
            handle: LazyHandle::new(ResourceKind::Program),
            attached: RefCell::new(Vec::new()),
            state: Cell::new(ProgramState::Unlinked),
            attributes: RefCell::new(HashMap::new()),
            uniforms: RefCell::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> ProgramState {
        self.state.get()
    }

    pub fn is_linked(&self) -> bool {
        self.state.get() == ProgramState::Linked
    }

    /// Handles of the attached stages, in attach order.
    pub fn attached_stages(&self) -> Vec<u32> {
        self.attached.borrow().clone()
    }

    /// Attach a stage. Attaching the same stage again is ignored.
    pub fn attach<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        stage: &ShaderStage,
    ) -> GraphicsResult<()> {
        let program = self.id(ctx)?;
        let shader = stage.id(ctx)?;
        if self.attached.borrow().contains(&shader) {
            log::debug!("{} already attached to program {}", stage, program);
            return Ok(());
        }
        ctx.backend_mut().attach_shader(program, shader);
        self.attached.borrow_mut().push(shader);
        Ok(())
    }

    /// Request attribute `name` at `index`. Takes effect on the next link.
    pub fn bind_attribute_location<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        index: u32,
        name: &str,
    ) -> GraphicsResult<()> {
        let program = self.id(ctx)?;
        ctx.backend_mut().bind_attrib_location(program, index, name);
        Ok(())
    }

    /// Route fragment output `name` to `color_attachment`. Takes effect on the next link.
    pub fn bind_frag_data_location<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        color_attachment: u32,
        name: &str,
    ) -> GraphicsResult<()> {
        let program = self.id(ctx)?;
        ctx.backend_mut()
            .bind_frag_data_location(program, color_attachment, name);
        Ok(())
    }

    /// Link the attached stages.
    ///
    /// When `validate_programs` is set in the context configuration the
    /// program is validated as well. Location caches are always cleared.
    pub fn link<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        let program = self.id(ctx)?;
        self.clear_caches();

        let validate = ctx.config().validate_programs;
        let backend = ctx.backend_mut();
        backend.link_program(program);

        if !backend.program_link_status(program) {
            self.state.set(ProgramState::Failed);
            return Err(GraphicsError::Link {
                log: backend.program_info_log(program),
            });
        }

        if validate {
            backend.validate_program(program);
            if !backend.program_validate_status(program) {
                self.state.set(ProgramState::Failed);
                return Err(GraphicsError::Validate {
                    log: backend.program_info_log(program),
                });
            }
        }

        let log = backend.program_info_log(program);
        if !log.trim().is_empty() {
            log::warn!("Program {} linked with messages:\n{}", program, log);
        }

        if log::log_enabled!(log::Level::Debug) {
            for attribute in backend.active_attributes(program) {
                log::debug!(
                    "Program {} attribute `{}`: {} x{}",
                    program,
                    attribute.name,
                    attribute.type_name,
                    attribute.size
                );
            }
        }

        self.state.set(ProgramState::Linked);
        Ok(())
    }

    /// Location of vertex attribute `name`.
    pub fn attrib_location<B: GraphicsBackend>(
        &self,
        ctx: &RenderContext<B>,
        name: &str,
    ) -> GraphicsResult<u32> {
        if let Some(&location) = self.attributes.borrow().get(name) {
            return Ok(location);
        }
        let location = ctx
            .backend()
            .attrib_location(self.handle.get(), name)
            .ok_or_else(|| GraphicsError::MissingLocation {
                kind: LocationKind::Attribute,
                name: name.to_string(),
            })?;
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), location);
        Ok(location)
    }

    /// Location of uniform `name`.
    pub fn uniform_location<B: GraphicsBackend>(
        &self,
        ctx: &RenderContext<B>,
        name: &str,
    ) -> GraphicsResult<i32> {
        if let Some(&location) = self.uniforms.borrow().get(name) {
            return Ok(location);
        }
        let location = ctx
            .backend()
            .uniform_location(self.handle.get(), name)
            .filter(|&l| l >= 0)
            .ok_or_else(|| GraphicsError::MissingLocation {
                kind: LocationKind::Uniform,
                name: name.to_string(),
            })?;
        self.uniforms.borrow_mut().insert(name.to_string(), location);
        Ok(location)
    }

    /// Write uniform `name`, binding the program first.
    pub fn set_uniform<B: GraphicsBackend, V: Into<UniformValue>>(
        &self,
        ctx: &mut RenderContext<B>,
        name: &str,
        value: V,
    ) -> GraphicsResult<()> {
        let location = self.uniform_location(ctx, name)?;
        self.bind(ctx)?;
        ctx.backend_mut().set_uniform(location, &value.into());
        Ok(())
    }

    /// Make this program current, through the context's binding cache.
    pub fn bind<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        let program = self.id(ctx)?;
        ctx.bind_program(program);
        Ok(())
    }

    pub fn unbind<B: GraphicsBackend>(ctx: &mut RenderContext<B>) {
        ctx.unbind_program();
    }

    fn clear_caches(&self) {
        self.attributes.borrow_mut().clear();
        self.uniforms.borrow_mut().clear();
    }
}

impl GpuResource for ShaderProgram {
    fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }

    fn raw_id(&self) -> u32 {
        self.handle.get()
    }

    fn id<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<u32> {
        self.handle.get_or_allocate(ctx, |b| b.create_program())
    }

    fn dispose<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) {
        if self.handle.release(ctx, |b, id| b.delete_program(id)) {
            self.clear_caches();
            self.attached.borrow_mut().clear();
            self.state.set(ProgramState::Unlinked);
        }
    }
}

impl fmt::Display for ShaderProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderProgram {}", self.handle.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, HeadlessBackend, ShaderStageKind};
    use crate::config::GraphicsConfig;
    use glam::Mat4;

    const VERTEX: &str = "#version 330 core
in vec2 position;
in vec4 color;
uniform mat4 projection;
out vec4 v_color;
void main() {
    gl_Position = projection * vec4(position, 0.0, 1.0);
    v_color = color;
}
";

    const FRAGMENT: &str = "#version 330 core
in vec4 v_color;
uniform float alpha;
out vec4 color_out;
void main() {
    color_out = vec4(v_color.rgb, alpha);
}
";

    struct Fixture {
        ctx: RenderContext<HeadlessBackend>,
        vertex: ShaderStage,
        fragment: ShaderStage,
        program: ShaderProgram,
    }

    impl Fixture {
        fn new() -> Self {
            let mut ctx = RenderContext::with_config(
                HeadlessBackend::new(),
                GraphicsConfig::default().with_validate_programs(true),
            );
            let vertex =
                ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, VERTEX).unwrap();
            let fragment =
                ShaderStage::with_source(&mut ctx, ShaderStageKind::Fragment, FRAGMENT).unwrap();
            let program = ShaderProgram::new();
            program.attach(&mut ctx, &vertex).unwrap();
            program.attach(&mut ctx, &fragment).unwrap();
            Self {
                ctx,
                vertex,
                fragment,
                program,
            }
        }

        fn dispose(mut self) {
            self.program.dispose(&mut self.ctx);
            self.vertex.dispose(&mut self.ctx);
            self.fragment.dispose(&mut self.ctx);
            self.ctx.shutdown().unwrap();
        }
    }

    #[test]
    fn test_link_and_locations() {
        let mut f = Fixture::new();
        f.program.bind_attribute_location(&mut f.ctx, 3, "color").unwrap();
        f.program.link(&mut f.ctx).unwrap();

        assert!(f.program.is_linked());
        assert_eq!(f.program.attrib_location(&f.ctx, "color").unwrap(), 3);
        assert_eq!(f.program.attrib_location(&f.ctx, "position").unwrap(), 0);
        assert!(f.program.uniform_location(&f.ctx, "projection").unwrap() >= 0);
        f.dispose();
    }

    #[test]
    fn test_missing_location() {
        let mut f = Fixture::new();
        f.program.link(&mut f.ctx).unwrap();

        match f.program.uniform_location(&f.ctx, "view") {
            Err(GraphicsError::MissingLocation { kind, name }) => {
                assert_eq!(kind, LocationKind::Uniform);
                assert_eq!(name, "view");
            }
            other => panic!("expected missing location, got {other:?}"),
        }
        assert!(f.program.attrib_location(&f.ctx, "normal").is_err());
        f.dispose();
    }

    #[test]
    fn test_duplicate_attach_is_ignored() {
        let mut f = Fixture::new();
        f.program.attach(&mut f.ctx, &f.vertex).unwrap();

        assert_eq!(f.program.attached_stages().len(), 2);
        assert_eq!(
            f.ctx
                .backend()
                .count_calls(|c| matches!(c, BackendCall::AttachShader { .. })),
            2
        );
        f.dispose();
    }

    #[test]
    fn test_set_uniform_binds_program() {
        let mut f = Fixture::new();
        f.program.link(&mut f.ctx).unwrap();
        ShaderProgram::unbind(&mut f.ctx);

        f.program
            .set_uniform(&mut f.ctx, "projection", Mat4::IDENTITY)
            .unwrap();
        f.program.set_uniform(&mut f.ctx, "alpha", 0.5f32).unwrap();

        let id = f.program.raw_id();
        assert_eq!(f.ctx.backend().current_program(), id);
        assert_eq!(
            f.ctx.backend().uniform_value(id, "alpha"),
            Some(UniformValue::Float(0.5))
        );
        assert_eq!(
            f.ctx.backend().uniform_value(id, "projection"),
            Some(UniformValue::Mat4(Mat4::IDENTITY))
        );
        assert!(f.ctx.backend().errors().is_empty());
        f.dispose();
    }

    #[test]
    fn test_link_failure() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let fragment =
            ShaderStage::with_source(&mut ctx, ShaderStageKind::Fragment, FRAGMENT).unwrap();
        let program = ShaderProgram::new();
        program.attach(&mut ctx, &fragment).unwrap();

        match program.link(&mut ctx) {
            Err(GraphicsError::Link { log }) => assert!(!log.is_empty()),
            other => panic!("expected link error, got {other:?}"),
        }
        assert_eq!(program.state(), ProgramState::Failed);
        program.dispose(&mut ctx);
        fragment.dispose(&mut ctx);
    }

    #[test]
    fn test_dispose_clears_binding_and_state() {
        let mut f = Fixture::new();
        f.program.link(&mut f.ctx).unwrap();
        f.program.bind(&mut f.ctx).unwrap();
        let id = f.program.raw_id();
        assert_eq!(f.ctx.bindings().program, Some(id));

        f.program.dispose(&mut f.ctx);
        assert_eq!(f.ctx.bindings().program, None);
        assert_eq!(f.program.state(), ProgramState::Unlinked);
        assert!(f.program.attached_stages().is_empty());
        f.dispose();
    }
}
