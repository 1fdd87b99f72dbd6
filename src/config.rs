//! Runtime configuration carried by a [`RenderContext`](crate::RenderContext).

use crate::backend::TextureFilter;

/// Default number of quads a sprite batch holds before it must flush.
pub const DEFAULT_BATCH_CAPACITY: usize = 8192;

/// Configuration for a render context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsConfig {
    /// Quads per sprite batch when no explicit capacity is given
    pub batch_capacity: usize,
    /// Validate programs right after linking
    pub validate_programs: bool,
    /// Minification filter for new textures
    pub default_min_filter: TextureFilter,
    /// Magnification filter for new textures
    pub default_mag_filter: TextureFilter,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            validate_programs: cfg!(debug_assertions),
            default_min_filter: TextureFilter::Linear,
            default_mag_filter: TextureFilter::Nearest,
        }
    }
}

impl GraphicsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default batch capacity. Zero is clamped to one quad.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity.max(1);
        self
    }

    pub fn with_validate_programs(mut self, validate: bool) -> Self {
        self.validate_programs = validate;
        self
    }

    pub fn with_default_filters(mut self, min: TextureFilter, mag: TextureFilter) -> Self {
        self.default_min_filter = min;
        self.default_mag_filter = mag;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphicsConfig::default();
        assert_eq!(config.batch_capacity, 8192);
        assert_eq!(config.validate_programs, cfg!(debug_assertions));
        assert_eq!(config.default_min_filter, TextureFilter::Linear);
        assert_eq!(config.default_mag_filter, TextureFilter::Nearest);
    }

    #[test]
    fn test_builder() {
        let config = GraphicsConfig::new()
            .with_batch_capacity(0)
            .with_validate_programs(true)
            .with_default_filters(TextureFilter::Nearest, TextureFilter::Linear);
        assert_eq!(config.batch_capacity, 1);
        assert!(config.validate_programs);
        assert_eq!(config.default_min_filter, TextureFilter::Nearest);
    }
}
