//! Sprite flip effects

/// Mirroring applied to a sprite's texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpriteEffects {
    #[default]
    None,
    FlipHorizontally,
    FlipVertically,
    FlipBoth,
}

impl SpriteEffects {
    /// `(flip_u, flip_v)`: whether U-min/U-max and V-min/V-max are swapped.
    pub fn flips(self) -> (bool, bool) {
        match self {
            Self::None => (false, false),
            Self::FlipHorizontally => (true, false),
            Self::FlipVertically => (false, true),
            Self::FlipBoth => (true, true),
        }
    }

    pub fn from_flips(flip_u: bool, flip_v: bool) -> Self {
        match (flip_u, flip_v) {
            (false, false) => Self::None,
            (true, false) => Self::FlipHorizontally,
            (false, true) => Self::FlipVertically,
            (true, true) => Self::FlipBoth,
        }
    }
}
