//! Common test utilities for quadbatch integration tests.
//!
//! Tests run against [`HeadlessBackend`], whose command log lets them assert
//! on the exact calls a wrapper or batch issued.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use quadbatch::backend::{BackendCall, DrawCall};
use quadbatch::logging::{self, LoggingConfig};
use quadbatch::{GraphicsConfig, HeadlessBackend, RenderContext, Texture2D};

// ============================================================================
// Context
// ============================================================================

/// Route `log` output through the test harness.
pub fn init_logging() {
    logging::init_logging(LoggingConfig {
        is_test: true,
        ..LoggingConfig::default()
    });
}

/// Headless context with program validation on.
pub fn headless_context() -> RenderContext<HeadlessBackend> {
    context_with(GraphicsConfig::new().with_validate_programs(true))
}

pub fn context_with(config: GraphicsConfig) -> RenderContext<HeadlessBackend> {
    init_logging();
    RenderContext::with_config(HeadlessBackend::new(), config)
}

/// Fail with the backend's error log if it recorded any.
pub fn assert_no_backend_errors(ctx: &RenderContext<HeadlessBackend>) {
    let errors = ctx.backend().errors();
    assert!(errors.is_empty(), "backend errors: {errors:#?}");
}

pub fn draw_calls(ctx: &RenderContext<HeadlessBackend>) -> Vec<DrawCall> {
    ctx.backend().draw_calls().into_iter().cloned().collect()
}

pub fn count_calls(
    ctx: &RenderContext<HeadlessBackend>,
    predicate: impl Fn(&BackendCall) -> bool,
) -> usize {
    ctx.backend().count_calls(predicate)
}

// ============================================================================
// Textures
// ============================================================================

/// Solid-color texture of the given size.
pub fn solid_texture(width: u32, height: u32, rgba: [u8; 4]) -> Texture2D {
    let pixels = rgba
        .iter()
        .copied()
        .cycle()
        .take((width * height * 4) as usize)
        .collect();
    Texture2D::from_rgba(width, height, pixels).expect("Failed to create texture")
}

// ============================================================================
// Files
// ============================================================================

/// A scratch directory removed again on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "quadbatch-{}-{}-{}",
            label,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&path).expect("Failed to create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let file = self.path.join(relative);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&file, contents).expect("Failed to write file");
        file
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// ============================================================================
// Shader sources
// ============================================================================

pub const BASIC_VERTEX: &str = r#"#version 330 core
in vec2 position;
in vec4 color;
out vec4 frag_color;

void main() {
    frag_color = color;
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

pub const BASIC_FRAGMENT: &str = r#"#version 330 core
in vec4 frag_color;
out vec4 color_out;

void main() {
    color_out = frag_color;
}
"#;

/// Fragment source with a missing closing brace.
pub const BROKEN_FRAGMENT: &str = r#"#version 330 core
in vec4 frag_color;
out vec4 color_out;

void main() {
    color_out = frag_color;
"#;

/// Descriptor JSON for a vertex + fragment collection.
pub fn basic_descriptor(name: &str, vertex: &str, fragment: &str) -> String {
    format!(
        r#"{{
    "name": "{name}",
    "shaders": [
        {{ "type": "vertex", "file": "{vertex}" }},
        {{ "type": "fragment", "file": "{fragment}" }}
    ]
}}"#
    )
}
