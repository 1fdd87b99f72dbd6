//! Render context
//!
//! A [`RenderContext`] owns the backend together with all state the resource
//! wrappers share: the binding cache, the registry of live GPU handles and the
//! slot holding the sprite shader shared by every batch of this context.
//! Wrappers never reach for global state; every operation that touches the
//! GPU takes the context explicitly.

use std::collections::BTreeSet;
use std::rc::Weak;

use crate::backend::{BackendResult, GraphicsBackend, ResourceKind};
use crate::config::GraphicsConfig;
use crate::error::{GraphicsError, GraphicsResult, LeakedResource};
use crate::sprite::SpriteShader;

/// "Currently bound" program and texture of a context.
///
/// A slot is `None` when nothing is known to be bound.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BindingState {
    pub program: Option<u32>,
    pub texture: Option<u32>,
}

/// Set of GPU handles allocated through a context and not yet released.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    live: BTreeSet<LeakedResource>,
}

impl ResourceRegistry {
    fn insert(&mut self, kind: ResourceKind, id: u32) {
        self.live.insert(LeakedResource { kind, id });
    }

    fn remove(&mut self, kind: ResourceKind, id: u32) {
        self.live.remove(&LeakedResource { kind, id });
    }

    pub fn contains(&self, kind: ResourceKind, id: u32) -> bool {
        self.live.contains(&LeakedResource { kind, id })
    }

    /// Live handles ordered by kind, then handle.
    pub fn live(&self) -> Vec<LeakedResource> {
        self.live.iter().copied().collect()
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.live.iter().filter(|r| r.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Objects shared between wrappers of one context.
#[derive(Debug, Default)]
pub(crate) struct SharedResources {
    /// Held weakly; batches own the strong references.
    pub sprite_shader: Weak<SpriteShader>,
}

/// Explicit rendering context passed to every GPU operation.
pub struct RenderContext<B: GraphicsBackend> {
    backend: B,
    config: GraphicsConfig,
    bindings: BindingState,
    registry: ResourceRegistry,
    pub(crate) shared: SharedResources,
}

impl<B: GraphicsBackend> RenderContext<B> {
    /// Create a context with the default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, GraphicsConfig::default())
    }

    pub fn with_config(backend: B, config: GraphicsConfig) -> Self {
        log::info!("Creating render context on {}", backend.name());
        Self {
            backend,
            config,
            bindings: BindingState::default(),
            registry: ResourceRegistry::default(),
            shared: SharedResources::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct backend access. Calls issued here bypass the binding cache.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    pub fn bindings(&self) -> BindingState {
        self.bindings
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Make `program` current unless it already is.
    ///
    /// Returns `true` when a backend call was issued.
    pub fn bind_program(&mut self, program: u32) -> bool {
        if self.bindings.program == Some(program) {
            return false;
        }
        self.backend.use_program(program);
        self.bindings.program = Some(program);
        true
    }

    /// Bind `texture` unless it already is.
    ///
    /// Returns `true` when a backend call was issued.
    pub fn bind_texture(&mut self, texture: u32) -> bool {
        if self.bindings.texture == Some(texture) {
            return false;
        }
        self.backend.bind_texture(texture);
        self.bindings.texture = Some(texture);
        true
    }

    pub fn unbind_program(&mut self) {
        self.backend.use_program(0);
        self.bindings.program = None;
    }

    /// Bind `0` for program and texture and forget both slots.
    pub fn reset_bindings(&mut self) {
        self.backend.use_program(0);
        self.backend.bind_texture(0);
        self.bindings = BindingState::default();
    }

    /// Allocate a handle through `create` and record it as live.
    pub(crate) fn allocate(
        &mut self,
        kind: ResourceKind,
        create: impl FnOnce(&mut B) -> BackendResult<u32>,
    ) -> GraphicsResult<u32> {
        let id = create(&mut self.backend).map_err(|e| GraphicsError::Backend(e.to_string()))?;
        if id == 0 {
            return Err(GraphicsError::Backend(format!(
                "{} returned a null {kind} handle",
                self.backend.name()
            )));
        }
        self.registry.insert(kind, id);
        Ok(id)
    }

    /// Release a live handle through `delete`, forgetting any binding to it.
    pub(crate) fn release(&mut self, kind: ResourceKind, id: u32, delete: impl FnOnce(&mut B, u32)) {
        delete(&mut self.backend, id);
        self.registry.remove(kind, id);
        match kind {
            ResourceKind::Program if self.bindings.program == Some(id) => {
                self.bindings.program = None;
            }
            ResourceKind::Texture if self.bindings.texture == Some(id) => {
                self.bindings.texture = None;
            }
            _ => {}
        }
    }

    /// Report handles that were allocated and never disposed.
    ///
    /// Only checked in debug builds; release builds always return `Ok`.
    pub fn check_leaks(&self) -> GraphicsResult<()> {
        #[cfg(debug_assertions)]
        if !self.registry.is_empty() {
            return Err(GraphicsError::ResourceLeak {
                resources: self.registry.live(),
            });
        }
        Ok(())
    }

    /// Tear the context down, reporting leaks like [`check_leaks`](Self::check_leaks).
    pub fn shutdown(mut self) -> GraphicsResult<()> {
        let result = self.check_leaks();
        // Already reported, don't warn again on drop.
        self.registry.live.clear();
        log::info!("Render context shut down");
        result
    }
}

impl<B: GraphicsBackend> Drop for RenderContext<B> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        if !self.registry.is_empty() {
            let leaked: Vec<String> = self.registry.live.iter().map(ToString::to_string).collect();
            log::warn!(
                "Render context dropped with {} live GPU resource(s): {}",
                leaked.len(),
                leaked.join(", ")
            );
        }
    }
}
