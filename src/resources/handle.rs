//! Lazily allocated backend handle.

use std::cell::Cell;

use crate::backend::{BackendResult, GraphicsBackend, ResourceKind};
use crate::context::RenderContext;
use crate::error::GraphicsResult;

/// Handle slot of a single wrapper. `0` means unallocated.
#[derive(Debug)]
pub(crate) struct LazyHandle {
    kind: ResourceKind,
    id: Cell<u32>,
}

impl LazyHandle {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            id: Cell::new(0),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn get(&self) -> u32 {
        self.id.get()
    }

    /// Return the handle, allocating it through `create` on first call.
    pub fn get_or_allocate<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        create: impl FnOnce(&mut B) -> BackendResult<u32>,
    ) -> GraphicsResult<u32> {
        let id = self.id.get();
        if id != 0 {
            return Ok(id);
        }
        let id = ctx.allocate(self.kind, create)?;
        log::trace!("Allocated {} {}", self.kind, id);
        self.id.set(id);
        Ok(id)
    }

    /// Release the handle through `delete`. Returns `false` when there was
    /// nothing to release, in which case no backend call is made.
    pub fn release<B: GraphicsBackend>(
        &self,
        ctx: &mut RenderContext<B>,
        delete: impl FnOnce(&mut B, u32),
    ) -> bool {
        let id = self.id.replace(0);
        if id == 0 {
            return false;
        }
        ctx.release(self.kind, id, delete);
        log::trace!("Released {} {}", self.kind, id);
        true
    }
}

impl Drop for LazyHandle {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        if self.id.get() != 0 {
            log::debug!(
                "{} {} dropped without dispose, the GPU object stays alive",
                self.kind,
                self.id.get()
            );
        }
    }
}
