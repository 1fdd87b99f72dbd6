//! Shader collections described by JSON files
//!
//! A descriptor names the stages of one program and optional fixed
//! locations:
//!
//! ```json
//! {
//!     "name": "basic",
//!     "shaders": [
//!         { "type": "vertex", "file": "basic.vert" },
//!         { "type": "fragment", "file": "basic.frag", "fragdata": { "color_out": 0 } }
//!     ],
//!     "attributes": { "position": 0 }
//! }
//! ```
//!
//! Stage files are resolved relative to the descriptor's directory.

use std::any::Any;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::backend::{GraphicsBackend, ShaderStageKind};
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{GpuResource, ShaderProgram, ShaderStage};

use super::Asset;

/// One stage entry of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShaderDescriptor {
    #[serde(rename = "type")]
    pub kind: ShaderStageKind,
    pub file: PathBuf,
    /// Fragment output name to color attachment. Fragment stages only.
    #[serde(default)]
    pub fragdata: BTreeMap<String, u32>,
}

/// Parsed shader collection descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShaderCollectionDescriptor {
    pub name: String,
    pub shaders: Vec<ShaderDescriptor>,
    /// Vertex attribute name to fixed binding index.
    #[serde(default)]
    pub attributes: BTreeMap<String, u32>,
}

impl ShaderCollectionDescriptor {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Stages and program loaded from a descriptor. Owns both.
#[derive(Debug, Default)]
pub struct ShaderCollection {
    name: String,
    stages: Vec<ShaderStage>,
    program: ShaderProgram,
    loaded: bool,
}

impl ShaderCollection {
    /// Descriptor file for `path`; `.json` is appended unless already present.
    pub fn descriptor_path(path: &Path) -> PathBuf {
        if path.extension().is_some_and(|ext| ext == "json") {
            return path.to_path_buf();
        }
        let mut file = OsString::from(path.as_os_str());
        file.push(".json");
        PathBuf::from(file)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    /// Make the program current.
    pub fn bind<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        self.program.bind(ctx)
    }

    /// Build the collection from an already parsed descriptor.
    ///
    /// Stage files are read from `dir`. On error everything allocated so far
    /// is released again.
    pub fn load_descriptor<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        descriptor: &ShaderCollectionDescriptor,
        dir: &Path,
    ) -> GraphicsResult<()> {
        if self.loaded {
            self.release(ctx);
        }
        log::debug!("Loading shader collection {}", descriptor.name);
        self.name = descriptor.name.clone();

        if let Err(err) = self.build(ctx, descriptor, dir) {
            self.release(ctx);
            return Err(err);
        }
        self.loaded = true;
        Ok(())
    }

    fn build<B: GraphicsBackend>(
        &mut self,
        ctx: &mut RenderContext<B>,
        descriptor: &ShaderCollectionDescriptor,
        dir: &Path,
    ) -> GraphicsResult<()> {
        for entry in &descriptor.shaders {
            let file = dir.join(&entry.file);
            let source = fs::read_to_string(&file)
                .map_err(|e| GraphicsError::content_load(&file, e))?;

            let stage = ShaderStage::new(entry.kind);
            // Pushed first so a failed compile still gets released.
            self.stages.push(stage);
            let stage = &self.stages[self.stages.len() - 1];
            stage.compile(ctx, &source)?;
            self.program.attach(ctx, stage)?;
            log::debug!("\tFound {} {}", entry.kind, entry.file.display());
        }

        for entry in &descriptor.shaders {
            if entry.fragdata.is_empty() {
                continue;
            }
            if entry.kind != ShaderStageKind::Fragment {
                log::warn!(
                    "Ignoring fragdata of {} stage {} in {}",
                    entry.kind,
                    entry.file.display(),
                    descriptor.name
                );
                continue;
            }
            for (output, &color) in &entry.fragdata {
                self.program.bind_frag_data_location(ctx, color, output)?;
            }
        }

        for (attribute, &index) in &descriptor.attributes {
            self.program.bind_attribute_location(ctx, index, attribute)?;
        }

        self.program.link(ctx)
    }

    fn release<B: GraphicsBackend>(&mut self, ctx: &mut RenderContext<B>) {
        for stage in self.stages.drain(..) {
            stage.dispose(ctx);
        }
        self.program.dispose(ctx);
        self.loaded = false;
    }
}

impl<B: GraphicsBackend> Asset<B> for ShaderCollection {
    fn load(&mut self, ctx: &mut RenderContext<B>, path: &Path) -> GraphicsResult<()> {
        let file = Self::descriptor_path(path);
        log::debug!("Attempting to load shader collection {}", file.display());

        let json =
            fs::read_to_string(&file).map_err(|e| GraphicsError::content_load(&file, e))?;
        let descriptor = ShaderCollectionDescriptor::from_json(&json)
            .map_err(|e| GraphicsError::content_load(&file, e))?;
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        self.load_descriptor(ctx, &descriptor, dir)
    }

    fn unload(&mut self, ctx: &mut RenderContext<B>) {
        self.release(ctx);
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_parsing() {
        let descriptor = ShaderCollectionDescriptor::from_json(
            r#"{
                "name": "basic",
                "shaders": [
                    { "type": "Vertex", "file": "a.vert" },
                    { "type": "FRAGMENT", "file": "a.frag", "fragdata": { "color_out": 0 } }
                ],
                "attributes": { "position": 0, "color": 1 }
            }"#,
        )
        .unwrap();

        assert_eq!(descriptor.name, "basic");
        assert_eq!(descriptor.shaders[0].kind, ShaderStageKind::Vertex);
        assert_eq!(descriptor.shaders[1].kind, ShaderStageKind::Fragment);
        assert_eq!(descriptor.shaders[1].fragdata["color_out"], 0);
        assert_eq!(descriptor.attributes["color"], 1);
        assert!(descriptor.shaders[0].fragdata.is_empty());
    }

    #[test]
    fn test_optional_maps_default_to_empty() {
        let descriptor = ShaderCollectionDescriptor::from_json(
            r#"{ "name": "basic", "shaders": [{ "type": "vertex", "file": "a.vert" }] }"#,
        )
        .unwrap();
        assert!(descriptor.attributes.is_empty());
    }

    #[test]
    fn test_unknown_stage_type_is_rejected() {
        let err = ShaderCollectionDescriptor::from_json(
            r#"{ "name": "basic", "shaders": [{ "type": "pixel", "file": "a.ps" }] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pixel"), "{err}");
    }

    #[test]
    fn test_descriptor_path() {
        assert_eq!(
            ShaderCollection::descriptor_path(Path::new("shaders/basic")),
            PathBuf::from("shaders/basic.json")
        );
        assert_eq!(
            ShaderCollection::descriptor_path(Path::new("shaders/basic.json")),
            PathBuf::from("shaders/basic.json")
        );
        assert_eq!(
            ShaderCollection::descriptor_path(Path::new("shaders/sprite.v2")),
            PathBuf::from("shaders/sprite.v2.json")
        );
    }
}
