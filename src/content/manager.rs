//! Path-keyed asset cache

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::backend::GraphicsBackend;
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult};

use super::Asset;

/// Loads assets relative to a base path and caches them by resolved path.
pub struct ContentManager<B: GraphicsBackend> {
    base_path: PathBuf,
    assets: HashMap<PathBuf, Box<dyn Asset<B>>>,
}

impl<B: GraphicsBackend> Default for ContentManager<B> {
    fn default() -> Self {
        Self::new("")
    }
}

impl<B: GraphicsBackend> ContentManager<B> {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            assets: HashMap::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Change where later loads are resolved from. Cached assets are kept.
    pub fn set_base_path(&mut self, base_path: impl Into<PathBuf>) {
        self.base_path = base_path.into();
    }

    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.base_path.join(path)
    }

    /// Load `path` as a `T`, or return the cached instance.
    ///
    /// Fails with [`GraphicsError::ContentLoad`] when the path was already
    /// loaded as another type.
    pub fn load<T>(&mut self, ctx: &mut RenderContext<B>, path: impl AsRef<Path>) -> GraphicsResult<&T>
    where
        T: Asset<B> + Default,
    {
        let resolved = self.resolve(path);
        let asset = match self.assets.entry(resolved.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut asset = T::default();
                asset.load(ctx, &resolved)?;
                log::debug!("Loaded {}", resolved.display());
                entry.insert(Box::new(asset))
            }
        };
        asset.as_any().downcast_ref::<T>().ok_or_else(|| {
            GraphicsError::content_load(&resolved, "already loaded as a different type")
        })
    }

    /// Cached asset at `path`, if loaded as a `T`.
    pub fn get<T: Asset<B>>(&self, path: impl AsRef<Path>) -> Option<&T> {
        self.assets
            .get(&self.resolve(path))
            .and_then(|asset| asset.as_any().downcast_ref::<T>())
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.assets.contains_key(&self.resolve(path))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Unload every cached asset and forget them.
    pub fn unload(&mut self, ctx: &mut RenderContext<B>) {
        for (path, mut asset) in self.assets.drain() {
            if asset.is_loaded() {
                log::debug!("Unloading {}", path.display());
                asset.unload(ctx);
            }
        }
    }
}
