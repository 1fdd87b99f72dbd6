//! Single shader stage

use std::cell::{Cell, Ref, RefCell};
use std::fmt;

use crate::backend::{GraphicsBackend, ResourceKind, ShaderStageKind};
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult};

use super::{GpuResource, LazyHandle};

/// Compilation state of a [`ShaderStage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderState {
    /// No handle yet.
    Unallocated,
    /// Handle allocated, source not compiled yet.
    Pending,
    Compiled,
    Failed,
}

/// One programmable pipeline stage compiled from source text.
#[derive(Debug)]
pub struct ShaderStage {
    kind: ShaderStageKind,
    handle: LazyHandle,
    source: RefCell<String>,
    state: Cell<ShaderState>,
}

impl ShaderStage {
    /// Create an unallocated stage. No backend calls are made.
    pub fn new(kind: ShaderStageKind) -> Self {
        Self {
            kind,
            handle: LazyHandle::new(ResourceKind::Shader),
            source: RefCell::new(String::new()),
            state: Cell::new(ShaderState::Unallocated),
        }
    }

    /// Create a stage and compile `source` right away.
    ///
    /// On failure the handle is released before the error is returned.
    pub fn with_source<B: GraphicsBackend>(
        ctx: &mut RenderContext<B>,
        kind: ShaderStageKind,
        source: &str,
    ) -> GraphicsResult<Self> {
        let stage = Self::new(kind);
        if let Err(err) = stage.compile(ctx, source) {
            stage.dispose(ctx);
            return Err(err);
        }
        Ok(stage)
    }

    pub fn stage_kind(&self) -> ShaderStageKind {
        self.kind
    }

    /// Source text last submitted to the compiler.
    pub fn source(&self) -> Ref<'_, str> {
        Ref::map(self.source.borrow(), String::as_str)
    }

    pub fn state(&self) -> ShaderState {
        self.state.get()
    }

    pub fn is_compiled(&self) -> bool {
        self.state.get() == ShaderState::Compiled
    }

    /// Submit `source` and compile it.
    ///
    /// A failed compile returns [`GraphicsError::Compile`] carrying exactly the
    /// submitted text and the compiler log. A successful compile with
    /// diagnostics logs them as a warning.
    pub fn compile<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        source: &str,
    ) -> GraphicsResult<()> {
        let id = self.id(ctx)?;
        self.source.replace(source.to_string());
        self.state.set(ShaderState::Pending);

        let backend = ctx.backend_mut();
        backend.shader_source(id, source);
        backend.compile_shader(id);
        let compiled = backend.shader_compile_status(id);
        let log = backend.shader_info_log(id);

        if !compiled {
            self.state.set(ShaderState::Failed);
            let log = if log.trim().is_empty() {
                "compiler reported failure without a log".to_string()
            } else {
                log
            };
            return Err(GraphicsError::Compile {
                stage: self.kind,
                source_text: source.to_string(),
                log,
            });
        }

        if !log.trim().is_empty() {
            log::warn!("{} shader {} compiled with messages:\n{}", self.kind, id, log);
        }
        self.state.set(ShaderState::Compiled);
        Ok(())
    }
}

impl GpuResource for ShaderStage {
    fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }

    fn raw_id(&self) -> u32 {
        self.handle.get()
    }

    fn id<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<u32> {
        let kind = self.kind;
        let id = self.handle.get_or_allocate(ctx, |b| b.create_shader(kind))?;
        if self.state.get() == ShaderState::Unallocated {
            self.state.set(ShaderState::Pending);
        }
        Ok(id)
    }

    fn dispose<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) {
        if self.handle.release(ctx, |b, id| b.delete_shader(id)) {
            self.state.set(ShaderState::Unallocated);
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} shader {}", self.kind, self.handle.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, HeadlessBackend};

    const VALID: &str = "#version 330 core\nin vec2 position;\nvoid main() {\n    gl_Position = vec4(position, 0.0, 1.0);\n}\n";

    #[test]
    fn test_construction_does_not_allocate() {
        let stage = ShaderStage::new(ShaderStageKind::Vertex);
        assert_eq!(stage.raw_id(), 0);
        assert_eq!(stage.state(), ShaderState::Unallocated);
    }

    #[test]
    fn test_compile_valid_source() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let stage = ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, VALID).unwrap();

        assert!(stage.is_compiled());
        assert_eq!(&*stage.source(), VALID);
        assert_ne!(stage.raw_id(), 0);
        stage.dispose(&mut ctx);
        ctx.shutdown().unwrap();
    }

    #[test]
    fn test_compile_error_carries_source_and_log() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let broken = "#version 330 core\nvoid main() {\n    gl_Position = vec4(0.0;\n}\n";
        let stage = ShaderStage::new(ShaderStageKind::Fragment);

        match stage.compile(&mut ctx, broken) {
            Err(GraphicsError::Compile {
                stage: kind,
                source_text,
                log,
            }) => {
                assert_eq!(kind, ShaderStageKind::Fragment);
                assert_eq!(source_text, broken);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(stage.state(), ShaderState::Failed);
        stage.dispose(&mut ctx);
    }

    #[test]
    fn test_with_source_failure_releases_handle() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let result = ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, "void main(");
        assert!(result.is_err());
        assert!(ctx.registry().is_empty());
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let mut ctx = RenderContext::new(HeadlessBackend::new());
        let stage = ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, VALID).unwrap();

        stage.dispose(&mut ctx);
        assert_eq!(stage.raw_id(), 0);
        let calls = ctx.backend().calls().len();

        stage.dispose(&mut ctx);
        assert_eq!(ctx.backend().calls().len(), calls);
        assert_eq!(
            ctx.backend()
                .count_calls(|c| matches!(c, BackendCall::DeleteShader { .. })),
            1
        );
    }
}
