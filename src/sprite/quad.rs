//! Quad geometry: corners, texture coordinates and draw parameters.

use glam::{Mat2, Vec2};

use crate::backend::Color;

use super::SpriteEffects;

/// Index pattern of one quad, relative to its first vertex.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Corners of a `width` x `height` quad at `(x, y)`, rotated by `rotation`
/// radians about `origin`.
///
/// Order: top-left, top-right, bottom-right, bottom-left. `origin` is in the
/// same space as `(x, y)`.
pub fn quad_corners(x: f32, y: f32, width: f32, height: f32, origin: Vec2, rotation: f32) -> [Vec2; 4] {
    let corners = [
        Vec2::new(x, y),
        Vec2::new(x + width, y),
        Vec2::new(x + width, y + height),
        Vec2::new(x, y + height),
    ];
    if rotation == 0.0 {
        return corners;
    }
    let rotate = Mat2::from_angle(rotation);
    corners.map(|p| rotate * (p - origin) + origin)
}

/// Texture coordinates for the corners returned by [`quad_corners`].
pub fn quad_uvs(min: Vec2, max: Vec2, effects: SpriteEffects) -> [Vec2; 4] {
    let (flip_u, flip_v) = effects.flips();
    let (u0, u1) = if flip_u { (max.x, min.x) } else { (min.x, max.x) };
    let (v0, v1) = if flip_v { (max.y, min.y) } else { (min.y, max.y) };
    [
        Vec2::new(u0, v0),
        Vec2::new(u1, v0),
        Vec2::new(u1, v1),
        Vec2::new(u0, v1),
    ]
}

/// Full set of parameters for one sprite draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub position: Vec2,
    /// Drawn size; defaults to the source rectangle or the texture size.
    pub size: Option<Vec2>,
    /// Region of the texture in pixels; defaults to the whole texture.
    pub source: Option<Rect>,
    pub color: Color,
    /// Rotation pivot, in the same space as `position`.
    pub origin: Vec2,
    /// Radians.
    pub rotation: f32,
    pub effects: SpriteEffects,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: None,
            source: None,
            color: Color::WHITE,
            origin: Vec2::ZERO,
            rotation: 0.0,
            effects: SpriteEffects::None,
        }
    }
}

impl Sprite {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Some(Vec2::new(width, height));
        self
    }

    pub fn with_source(mut self, source: Rect) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Rotate by `rotation` radians about `origin`.
    pub fn with_rotation(mut self, origin: Vec2, rotation: f32) -> Self {
        self.origin = origin;
        self.rotation = rotation;
        self
    }

    pub fn with_effects(mut self, effects: SpriteEffects) -> Self {
        self.effects = effects;
        self
    }
}
