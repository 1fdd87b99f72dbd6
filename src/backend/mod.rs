//! Backend abstraction layer
//!
//! Provides the retained-mode API trait and the types both backends share.
//!
//! # Available Backends
//!
//! - [`HeadlessBackend`] (always built): in-memory simulation with a command log,
//!   for tests and tooling without a GPU
//! - `GlBackend` (feature `gl`): OpenGL through `glow`

pub mod headless;
pub mod traits;
pub mod types;

#[cfg(feature = "gl")]
pub mod gl;

pub use headless::{BackendCall, DrawCall, HeadlessBackend};
pub use traits::*;
pub use types::*;

#[cfg(feature = "gl")]
pub use gl::GlBackend;
