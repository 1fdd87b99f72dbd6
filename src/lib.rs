//! quadbatch - retained-mode GPU resource wrappers and a batching 2D sprite renderer
//!
//! The crate targets OpenGL-style APIs: integer object names, bind-to-edit
//! state and explicit compile/link. Two backends implement the
//! [`GraphicsBackend`] trait:
//! - **Headless**: in-memory simulation with a command log, always available
//! - **OpenGL**: through `glow`, behind the `gl` feature
//!
//! # Features
//! - Lazily allocated, explicitly disposed resource wrappers
//!   ([`ShaderStage`], [`ShaderProgram`], [`Buffer`], [`VertexArray`], [`Texture2D`])
//! - Leak tracking through the [`RenderContext`] registry
//! - [`SpriteBatch`]: thousands of textured quads in one draw call
//! - JSON shader collections and a path-keyed [`ContentManager`]

pub mod backend;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod resources;
pub mod sprite;

#[cfg(not(target_arch = "wasm32"))]
pub mod logging;

pub use backend::{
    Color, GraphicsBackend, HeadlessBackend, ResourceKind, ShaderStageKind, TextureFilter,
    UniformValue,
};
#[cfg(feature = "gl")]
pub use backend::GlBackend;
pub use config::GraphicsConfig;
pub use content::{Asset, ContentManager, ShaderCollection, TextureAsset};
pub use context::{BindingState, RenderContext};
pub use error::{GraphicsError, GraphicsResult};
pub use resources::{
    Buffer, GpuResource, ShaderProgram, ShaderStage, Texture2D, VertexArray, VertexLayout,
};
pub use sprite::{ortho_projection, BatchStats, Rect, Sprite, SpriteBatch, SpriteEffects};

// Re-export math types used throughout the public API
pub use glam::{Mat4, Vec2, Vec3, Vec4};
