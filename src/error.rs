//! Error types for GPU resource management and sprite rendering.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::backend::{ResourceKind, ShaderStageKind};

/// Which kind of program location lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Attribute,
    Uniform,
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute => write!(f, "attribute"),
            Self::Uniform => write!(f, "uniform"),
        }
    }
}

/// A GPU object that was still alive when leaks were checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeakedResource {
    pub kind: ResourceKind,
    pub id: u32,
}

impl fmt::Display for LeakedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Graphics error type
#[derive(Error, Debug)]
pub enum GraphicsError {
    /// A shader stage failed to compile.
    ///
    /// `source_text` is exactly the text that was submitted to the compiler.
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile {
        stage: ShaderStageKind,
        source_text: String,
        log: String,
    },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error("shader program failed to validate:\n{log}")]
    Validate { log: String },
    /// The attribute or uniform is not active in the linked program.
    #[error("couldn't find {kind} location `{name}`")]
    MissingLocation { kind: LocationKind, name: String },
    #[error("failed to load content `{}`: {reason}", .path.display())]
    ContentLoad { path: PathBuf, reason: String },
    #[error("{} GPU resource(s) were never disposed: {}", .resources.len(), format_leaks(.resources))]
    ResourceLeak { resources: Vec<LeakedResource> },
    #[error("backend error: {0}")]
    Backend(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

impl GraphicsError {
    pub(crate) fn content_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::ContentLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

fn format_leaks(resources: &[LeakedResource]) -> String {
    resources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type GraphicsResult<T> = Result<T, GraphicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::MissingLocation {
            kind: LocationKind::Uniform,
            name: "projection".to_string(),
        };
        assert_eq!(err.to_string(), "couldn't find uniform location `projection`");

        let err = GraphicsError::Link {
            log: "no main".to_string(),
        };
        assert_eq!(err.to_string(), "shader program failed to link:\nno main");
    }

    #[test]
    fn test_leak_display_lists_resources() {
        let err = GraphicsError::ResourceLeak {
            resources: vec![
                LeakedResource {
                    kind: ResourceKind::Buffer,
                    id: 3,
                },
                LeakedResource {
                    kind: ResourceKind::Texture,
                    id: 7,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 GPU resource(s) were never disposed: buffer 3, texture 7"
        );
    }

    #[test]
    fn test_content_load_display() {
        let err = GraphicsError::content_load("shaders/basic.json", "missing field `name`");
        assert_eq!(
            err.to_string(),
            "failed to load content `shaders/basic.json`: missing field `name`"
        );
    }
}
