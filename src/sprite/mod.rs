//! 2D sprite rendering
//!
//! [`SpriteBatch`] is the entry point. Every batch of a context draws
//! through one shared [`SpriteShader`].

mod batch;
mod effects;
mod quad;
mod scope;
mod shader;

pub use batch::{ortho_projection, BatchStats, SpriteBatch};
pub use effects::SpriteEffects;
pub use quad::{quad_corners, quad_uvs, Rect, Sprite, QUAD_INDICES};
pub use scope::SpriteBatchScope;
pub use shader::{
    SpriteShader, COLOR_ATTRIBUTE, POSITION_ATTRIBUTE, PROJECTION_UNIFORM, TEXTURE_UNIFORM,
    UV_ATTRIBUTE,
};
