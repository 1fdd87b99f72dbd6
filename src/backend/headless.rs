//! Headless GPU backend for testing and tooling.
//!
//! This backend doesn't talk to a GPU. It hands out object names the way a
//! GL driver does (smallest free non-zero name per object kind), keeps every
//! object's state in memory, performs a lightweight syntax check of shader
//! sources, assigns attribute and uniform locations at link time and records
//! every state-changing call in a command log that tests can inspect.
//!
//! Misuse that a real driver would flag (drawing without a program, setting
//! an unknown uniform, index range past the buffer end, ...) is collected in
//! [`HeadlessBackend::errors`] instead of panicking.

use std::collections::{BTreeMap, HashMap};

use super::traits::{BackendResult, GraphicsBackend};
use super::types::*;

/// A state-changing call recorded by [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateShader { shader: u32, kind: ShaderStageKind },
    ShaderSource { shader: u32 },
    CompileShader { shader: u32 },
    DeleteShader { shader: u32 },
    CreateProgram { program: u32 },
    AttachShader { program: u32, shader: u32 },
    BindAttribLocation { program: u32, index: u32, name: String },
    BindFragDataLocation { program: u32, color: u32, name: String },
    LinkProgram { program: u32 },
    ValidateProgram { program: u32 },
    UseProgram { program: u32 },
    SetUniform { location: i32, value: UniformValue },
    DeleteProgram { program: u32 },
    CreateBuffer { buffer: u32 },
    BindBuffer { target: BufferTarget, buffer: u32 },
    BufferData { target: BufferTarget, bytes: usize, usage: BufferUsage },
    DeleteBuffer { buffer: u32 },
    CreateVertexArray { vertex_array: u32 },
    BindVertexArray { vertex_array: u32 },
    EnableVertexAttrib { index: u32 },
    VertexAttribPointer { index: u32, pointer: VertexAttribPointer },
    DeleteVertexArray { vertex_array: u32 },
    CreateTexture { texture: u32 },
    BindTexture { texture: u32 },
    TextureFilters { min: TextureFilter, mag: TextureFilter },
    TextureImage2D { width: u32, height: u32 },
    DeleteTexture { texture: u32 },
    DrawElements(DrawCall),
}

/// Snapshot of the pipeline state at an indexed draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: u32,
    pub vertex_array: u32,
    pub texture: u32,
    pub index_buffer: u32,
    pub topology: PrimitiveTopology,
    pub count: u32,
    pub format: IndexFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    qualifier: String,
    type_name: String,
    name: String,
}

#[derive(Debug)]
struct ShaderObject {
    kind: ShaderStageKind,
    source: String,
    compiled: bool,
    log: String,
    declarations: Vec<Declaration>,
}

impl ShaderObject {
    fn declared<'a>(&'a self, qualifiers: &'a [&str]) -> impl Iterator<Item = &'a Declaration> {
        self.declarations
            .iter()
            .filter(move |d| qualifiers.contains(&d.qualifier.as_str()))
    }
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<u32>,
    attrib_bindings: BTreeMap<String, u32>,
    frag_bindings: BTreeMap<String, u32>,
    linked: bool,
    validated: bool,
    log: String,
    attributes: Vec<(String, u32, String)>,
    uniforms: Vec<(String, i32)>,
    frag_outputs: BTreeMap<String, u32>,
    uniform_values: HashMap<i32, UniformValue>,
}

#[derive(Debug, Default)]
struct BufferObject {
    target: Option<BufferTarget>,
    data: Vec<u8>,
    usage: BufferUsage,
    uploads: usize,
}

#[derive(Debug, Default)]
struct VertexArrayObject {
    attributes: BTreeMap<u32, (u32, VertexAttribPointer)>,
    enabled: Vec<u32>,
    index_buffer: u32,
}

#[derive(Debug)]
struct TextureObject {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    min_filter: TextureFilter,
    mag_filter: TextureFilter,
    uploads: usize,
}

impl Default for TextureObject {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            min_filter: TextureFilter::Nearest,
            mag_filter: TextureFilter::Linear,
            uploads: 0,
        }
    }
}

/// Headless GPU backend.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, BufferObject>,
    vertex_arrays: HashMap<u32, VertexArrayObject>,
    textures: HashMap<u32, TextureObject>,

    current_program: u32,
    current_vertex_array: u32,
    current_texture: u32,
    bound_vertex_buffer: u32,
    bound_index_buffer: u32,

    calls: Vec<BackendCall>,
    errors: Vec<String>,
}

/// Smallest non-zero name not used by a live object, like GL name generation.
fn next_name<T>(objects: &HashMap<u32, T>) -> u32 {
    (1..).find(|id| !objects.contains_key(id)).unwrap_or(0)
}

impl HeadlessBackend {
    /// Create a new headless backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every state-changing call issued so far, in order.
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Forget recorded calls (object state is kept).
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Recorded indexed draws, in order.
    pub fn draw_calls(&self) -> Vec<&DrawCall> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::DrawElements(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    /// API misuse detected so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Number of live objects of every kind.
    pub fn live_objects(&self) -> usize {
        self.shaders.len()
            + self.programs.len()
            + self.buffers.len()
            + self.vertex_arrays.len()
            + self.textures.len()
    }

    pub fn is_live(&self, kind: ResourceKind, id: u32) -> bool {
        match kind {
            ResourceKind::Shader => self.shaders.contains_key(&id),
            ResourceKind::Program => self.programs.contains_key(&id),
            ResourceKind::Buffer => self.buffers.contains_key(&id),
            ResourceKind::VertexArray => self.vertex_arrays.contains_key(&id),
            ResourceKind::Texture => self.textures.contains_key(&id),
        }
    }

    /// Source last submitted to a shader.
    pub fn shader_source_text(&self, shader: u32) -> Option<&str> {
        self.shaders.get(&shader).map(|s| s.source.as_str())
    }

    /// Shaders attached to a program, in attach order.
    pub fn attached_shaders(&self, program: u32) -> Vec<u32> {
        self.programs
            .get(&program)
            .map(|p| p.attached.clone())
            .unwrap_or_default()
    }

    /// Explicit attribute bindings requested for a program.
    pub fn attrib_bindings(&self, program: u32) -> BTreeMap<String, u32> {
        self.programs
            .get(&program)
            .map(|p| p.attrib_bindings.clone())
            .unwrap_or_default()
    }

    /// Color attachment a fragment output was assigned at link time.
    pub fn frag_data_location(&self, program: u32, name: &str) -> Option<u32> {
        self.programs
            .get(&program)
            .and_then(|p| p.frag_outputs.get(name).copied())
    }

    /// Last value written to a uniform of `program`.
    pub fn uniform_value(&self, program: u32, name: &str) -> Option<UniformValue> {
        let program = self.programs.get(&program)?;
        let (_, location) = program.uniforms.iter().find(|(n, _)| n == name)?;
        program.uniform_values.get(location).copied()
    }

    /// Current contents of a buffer.
    pub fn buffer_contents(&self, buffer: u32) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.data.as_slice())
    }

    pub fn buffer_usage(&self, buffer: u32) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|b| b.usage)
    }

    /// How many times data was uploaded to a buffer.
    pub fn buffer_uploads(&self, buffer: u32) -> usize {
        self.buffers.get(&buffer).map_or(0, |b| b.uploads)
    }

    /// Attribute slot description recorded in a vertex array.
    pub fn vertex_attribute(
        &self,
        vertex_array: u32,
        index: u32,
    ) -> Option<(u32, VertexAttribPointer)> {
        self.vertex_arrays
            .get(&vertex_array)
            .and_then(|vao| vao.attributes.get(&index).copied())
    }

    pub fn is_attribute_enabled(&self, vertex_array: u32, index: u32) -> bool {
        self.vertex_arrays
            .get(&vertex_array)
            .is_some_and(|vao| vao.enabled.contains(&index))
    }

    /// Index buffer recorded in a vertex array.
    pub fn vertex_array_index_buffer(&self, vertex_array: u32) -> Option<u32> {
        self.vertex_arrays
            .get(&vertex_array)
            .map(|vao| vao.index_buffer)
            .filter(|&b| b != 0)
    }

    /// Size of the last image uploaded to a texture.
    pub fn texture_size(&self, texture: u32) -> Option<(u32, u32)> {
        self.textures
            .get(&texture)
            .filter(|t| t.uploads > 0)
            .map(|t| (t.width, t.height))
    }

    pub fn texture_pixels(&self, texture: u32) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.pixels.as_slice())
    }

    pub fn texture_filters_of(&self, texture: u32) -> Option<(TextureFilter, TextureFilter)> {
        self.textures
            .get(&texture)
            .map(|t| (t.min_filter, t.mag_filter))
    }

    /// How many times pixels were uploaded to a texture.
    pub fn texture_uploads(&self, texture: u32) -> usize {
        self.textures.get(&texture).map_or(0, |t| t.uploads)
    }

    pub fn current_program(&self) -> u32 {
        self.current_program
    }

    pub fn current_texture(&self) -> u32 {
        self.current_texture
    }

    fn error(&mut self, message: String) {
        log::trace!("HeadlessBackend: error: {}", message);
        self.errors.push(message);
    }

    fn link(&mut self, program_id: u32) {
        let Some(program) = self.programs.get(&program_id) else {
            self.error(format!("link of unknown program {program_id}"));
            return;
        };

        let mut log = String::new();
        let mut stages = Vec::new();
        for shader_id in &program.attached {
            match self.shaders.get(shader_id) {
                Some(shader) if shader.compiled => stages.push(shader),
                Some(_) => log.push_str(&format!("error: shader {shader_id} is not compiled\n")),
                None => log.push_str(&format!("error: shader {shader_id} was deleted\n")),
            }
        }

        if program.attached.is_empty() {
            log.push_str("error: no shaders attached\n");
        }

        let has = |kind: ShaderStageKind| stages.iter().any(|s| s.kind == kind);
        if has(ShaderStageKind::Compute) && stages.len() > 1 {
            log.push_str("error: compute shaders cannot be linked with other stages\n");
        } else if !stages.is_empty() && !has(ShaderStageKind::Compute) && !has(ShaderStageKind::Vertex) {
            log.push_str("error: program lacks a vertex shader\n");
        }

        // Interface matching is only checked for the plain vertex -> fragment pipeline.
        let pass_through = has(ShaderStageKind::Geometry)
            || has(ShaderStageKind::TessControl)
            || has(ShaderStageKind::TessEvaluation);
        let vertex = stages.iter().find(|s| s.kind == ShaderStageKind::Vertex);
        let fragment = stages.iter().find(|s| s.kind == ShaderStageKind::Fragment);
        if let (Some(vertex), Some(fragment), false) = (vertex, fragment, pass_through) {
            for input in fragment.declared(&["in", "varying"]) {
                let written = vertex
                    .declared(&["out", "varying"])
                    .any(|out| out.name == input.name);
                if !written && !input.name.starts_with("gl_") {
                    log.push_str(&format!(
                        "error: fragment input `{}` is not written by the vertex stage\n",
                        input.name
                    ));
                }
            }
        }

        let linked = log.is_empty();
        let mut attributes = Vec::new();
        let mut uniforms: Vec<(String, i32)> = Vec::new();
        let mut frag_outputs = BTreeMap::new();

        if linked {
            if let Some(vertex) = vertex {
                let declared: Vec<&Declaration> = vertex.declared(&["in", "attribute"]).collect();
                let mut used: Vec<u32> = declared
                    .iter()
                    .filter_map(|d| program.attrib_bindings.get(&d.name).copied())
                    .collect();
                let mut next = 0u32;
                for decl in declared {
                    let location = match program.attrib_bindings.get(&decl.name) {
                        Some(&explicit) => explicit,
                        None => {
                            while used.contains(&next) {
                                next += 1;
                            }
                            used.push(next);
                            next
                        }
                    };
                    attributes.push((decl.name.clone(), location, decl.type_name.clone()));
                }
            }

            for stage in &stages {
                for decl in stage.declared(&["uniform"]) {
                    if !uniforms.iter().any(|(name, _)| *name == decl.name) {
                        let location = uniforms.len() as i32;
                        uniforms.push((decl.name.clone(), location));
                    }
                }
            }

            if let Some(fragment) = fragment {
                let mut next = 0u32;
                for decl in fragment.declared(&["out"]) {
                    let color = program
                        .frag_bindings
                        .get(&decl.name)
                        .copied()
                        .unwrap_or_else(|| {
                            let color = next;
                            next += 1;
                            color
                        });
                    frag_outputs.insert(decl.name.clone(), color);
                }
            }
        }

        if let Some(program) = self.programs.get_mut(&program_id) {
            program.linked = linked;
            program.validated = false;
            program.log = log;
            program.attributes = attributes;
            program.uniforms = uniforms;
            program.frag_outputs = frag_outputs;
            program.uniform_values.clear();
        }
    }
}

/// Lightweight GLSL syntax check.
///
/// Verifies balanced delimiters, a `main` entry point and terminated global
/// declarations, and collects `in`/`out`/`uniform` declarations. Returns the
/// declarations and the info log; the compile failed when the log contains an
/// `error:` line.
fn check_source(source: &str) -> (Vec<Declaration>, String) {
    let mut log = String::new();
    let code = strip_comments(source);

    if !code.lines().any(|l| l.trim_start().starts_with("#version")) {
        log.push_str("0:1: warning: no #version directive, assuming 110\n");
    }

    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut statements: Vec<(String, usize)> = Vec::new();
    let mut current = String::new();
    let mut current_line = 1;

    for (line_no, line) in code.lines().enumerate() {
        let line_no = line_no + 1;
        if line.trim_start().starts_with('#') {
            continue;
        }
        for ch in line.chars() {
            match ch {
                '(' | '{' | '[' => stack.push((ch, line_no)),
                ')' | '}' | ']' => {
                    let expected = match ch {
                        ')' => '(',
                        '}' => '{',
                        _ => '[',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            log.push_str(&format!("0:{line_no}: error: unexpected '{ch}'\n"));
                            return (Vec::new(), log);
                        }
                    }
                }
                _ => {}
            }

            if stack.is_empty() {
                if current.trim().is_empty() {
                    current_line = line_no;
                }
                if ch == ';' || ch == '}' {
                    if ch == '}' {
                        current.push(ch);
                    }
                    statements.push((std::mem::take(&mut current), current_line));
                    continue;
                }
            }
            current.push(ch);
        }
        current.push('\n');
    }

    if let Some((open, line_no)) = stack.last() {
        log.push_str(&format!(
            "0:{line_no}: error: unexpected end of file, unclosed '{open}'\n"
        ));
        return (Vec::new(), log);
    }

    if !current.trim().is_empty() {
        log.push_str(&format!(
            "0:{current_line}: error: syntax error, unexpected end of file, expecting ';'\n"
        ));
        return (Vec::new(), log);
    }

    let mut declarations = Vec::new();
    let mut has_main = false;
    for (statement, line_no) in &statements {
        let text = statement.trim();
        if let Some(brace) = text.find('{') {
            let mut head = &text[..brace];
            if let Some(rest) = head.strip_prefix("layout") {
                head = rest.find(')').map_or("", |close| &rest[close + 1..]);
            }
            // Struct and interface block bodies carry no parameter list.
            let Some(paren) = head.find('(') else {
                continue;
            };
            match function_name(&head[..paren]) {
                Some(name) => has_main |= name == "main",
                None => {
                    log.push_str(&format!(
                        "0:{line_no}: error: syntax error, unexpected IDENTIFIER, expecting ';'\n"
                    ));
                    return (Vec::new(), log);
                }
            }
            continue;
        }
        match parse_declaration(text) {
            Ok(Some(decl)) => declarations.push(decl),
            Ok(None) => {}
            Err(message) => {
                log.push_str(&format!("0:{line_no}: error: {message}\n"));
                return (Vec::new(), log);
            }
        }
    }

    if !has_main {
        log.push_str("0:0: error: missing entry point 'main'\n");
    }

    (declarations, log)
}

/// Name of a function definition whose head is `<return type> <name>`,
/// optionally preceded by precision or invariance qualifiers.
fn function_name(head: &str) -> Option<&str> {
    let words: Vec<&str> = head
        .split_whitespace()
        .filter(|word| !matches!(*word, "highp" | "mediump" | "lowp" | "precise" | "invariant"))
        .collect();
    match words.as_slice() {
        [_, name] if is_identifier(name) => Some(name),
        _ => None,
    }
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

const STORAGE_QUALIFIERS: [&str; 5] = ["in", "out", "uniform", "attribute", "varying"];
const MODIFIERS: [&str; 9] = [
    "flat",
    "smooth",
    "noperspective",
    "centroid",
    "highp",
    "mediump",
    "lowp",
    "invariant",
    "const",
];

fn parse_declaration(statement: &str) -> Result<Option<Declaration>, String> {
    let mut text = statement.trim();
    if let Some(rest) = text.strip_prefix("layout") {
        let Some(close) = rest.find(')') else {
            return Err("malformed layout qualifier".to_string());
        };
        text = rest[close + 1..].trim();
    }

    let mut tokens = text.split_whitespace().filter(|t| !MODIFIERS.contains(t));
    let Some(qualifier) = tokens.next() else {
        return Ok(None);
    };
    if !STORAGE_QUALIFIERS.contains(&qualifier) {
        return Ok(None);
    }

    let rest: Vec<&str> = tokens.collect();
    match rest.as_slice() {
        [type_name, name, ..] => {
            let name = name.split('[').next().unwrap_or(name);
            Ok(Some(Declaration {
                qualifier: qualifier.to_string(),
                type_name: type_name.to_string(),
                name: name.to_string(),
            }))
        }
        _ => Err(format!(
            "syntax error, incomplete '{qualifier}' declaration"
        )),
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "Headless Backend"
    }

    fn create_shader(&mut self, kind: ShaderStageKind) -> BackendResult<u32> {
        let shader = next_name(&self.shaders);
        log::trace!("HeadlessBackend: create {} shader {}", kind, shader);
        self.shaders.insert(
            shader,
            ShaderObject {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
                declarations: Vec::new(),
            },
        );
        self.calls.push(BackendCall::CreateShader { shader, kind });
        Ok(shader)
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        self.calls.push(BackendCall::ShaderSource { shader });
        match self.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_string(),
            None => self.error(format!("source for unknown shader {shader}")),
        }
    }

    fn compile_shader(&mut self, shader: u32) {
        self.calls.push(BackendCall::CompileShader { shader });
        let Some(object) = self.shaders.get_mut(&shader) else {
            self.error(format!("compile of unknown shader {shader}"));
            return;
        };
        let (declarations, log) = check_source(&object.source);
        object.compiled = !log.contains("error:");
        object.declarations = declarations;
        object.log = log;
        log::trace!(
            "HeadlessBackend: compiled shader {} (ok: {})",
            shader,
            object.compiled
        );
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: u32) {
        self.calls.push(BackendCall::DeleteShader { shader });
        if self.shaders.remove(&shader).is_none() {
            self.error(format!("delete of unknown shader {shader}"));
        }
    }

    fn create_program(&mut self) -> BackendResult<u32> {
        let program = next_name(&self.programs);
        log::trace!("HeadlessBackend: create program {}", program);
        self.programs.insert(program, ProgramObject::default());
        self.calls.push(BackendCall::CreateProgram { program });
        Ok(program)
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        self.calls.push(BackendCall::AttachShader { program, shader });
        if !self.shaders.contains_key(&shader) {
            self.error(format!("attach of unknown shader {shader}"));
            return;
        }
        match self.programs.get_mut(&program) {
            Some(object) if object.attached.contains(&shader) => {
                self.error(format!("shader {shader} already attached to {program}"));
            }
            Some(object) => object.attached.push(shader),
            None => self.error(format!("attach to unknown program {program}")),
        }
    }

    fn bind_attrib_location(&mut self, program: u32, index: u32, name: &str) {
        self.calls.push(BackendCall::BindAttribLocation {
            program,
            index,
            name: name.to_string(),
        });
        match self.programs.get_mut(&program) {
            Some(object) => {
                object.attrib_bindings.insert(name.to_string(), index);
            }
            None => self.error(format!("attribute binding on unknown program {program}")),
        }
    }

    fn bind_frag_data_location(&mut self, program: u32, color: u32, name: &str) {
        self.calls.push(BackendCall::BindFragDataLocation {
            program,
            color,
            name: name.to_string(),
        });
        match self.programs.get_mut(&program) {
            Some(object) => {
                object.frag_bindings.insert(name.to_string(), color);
            }
            None => self.error(format!("frag data binding on unknown program {program}")),
        }
    }

    fn link_program(&mut self, program: u32) {
        self.calls.push(BackendCall::LinkProgram { program });
        self.link(program);
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn validate_program(&mut self, program: u32) {
        self.calls.push(BackendCall::ValidateProgram { program });
        if let Some(object) = self.programs.get_mut(&program) {
            object.validated = object.linked;
            if !object.linked {
                object
                    .log
                    .push_str("error: program is not successfully linked\n");
            }
        }
    }

    fn program_validate_status(&self, program: u32) -> bool {
        self.programs.get(&program).is_some_and(|p| p.validated)
    }

    fn program_info_log(&self, program: u32) -> String {
        self.programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: u32) -> Vec<ActiveAttribute> {
        self.programs
            .get(&program)
            .map(|p| {
                p.attributes
                    .iter()
                    .map(|(name, _, type_name)| ActiveAttribute {
                        name: name.clone(),
                        size: 1,
                        type_name: type_name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        let program = self.programs.get(&program).filter(|p| p.linked)?;
        program
            .attributes
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, location, _)| *location)
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<i32> {
        let program = self.programs.get(&program).filter(|p| p.linked)?;
        program
            .uniforms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, location)| *location)
    }

    fn use_program(&mut self, program: u32) {
        self.calls.push(BackendCall::UseProgram { program });
        if program != 0 && !self.programs.get(&program).is_some_and(|p| p.linked) {
            self.error(format!("use of unlinked program {program}"));
        }
        self.current_program = program;
    }

    fn set_uniform(&mut self, location: i32, value: &UniformValue) {
        self.calls.push(BackendCall::SetUniform {
            location,
            value: *value,
        });
        let current = self.current_program;
        match self.programs.get_mut(&current) {
            Some(program) if program.uniforms.iter().any(|(_, l)| *l == location) => {
                program.uniform_values.insert(location, *value);
            }
            Some(_) => self.error(format!(
                "uniform location {location} is not active in program {current}"
            )),
            None => self.error(format!("uniform {location} set with no program in use")),
        }
    }

    fn delete_program(&mut self, program: u32) {
        self.calls.push(BackendCall::DeleteProgram { program });
        if self.programs.remove(&program).is_none() {
            self.error(format!("delete of unknown program {program}"));
        }
        if self.current_program == program {
            self.current_program = 0;
        }
    }

    fn create_buffer(&mut self) -> BackendResult<u32> {
        let buffer = next_name(&self.buffers);
        log::trace!("HeadlessBackend: create buffer {}", buffer);
        self.buffers.insert(buffer, BufferObject::default());
        self.calls.push(BackendCall::CreateBuffer { buffer });
        Ok(buffer)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: u32) {
        self.calls.push(BackendCall::BindBuffer { target, buffer });
        if buffer != 0 {
            match self.buffers.get_mut(&buffer) {
                Some(object) => object.target = Some(target),
                None => {
                    self.error(format!("bind of unknown buffer {buffer}"));
                    return;
                }
            }
        }
        match target {
            BufferTarget::Vertex => self.bound_vertex_buffer = buffer,
            BufferTarget::Index => {
                self.bound_index_buffer = buffer;
                // The index binding is part of the vertex array state.
                if let Some(vao) = self.vertex_arrays.get_mut(&self.current_vertex_array) {
                    vao.index_buffer = buffer;
                }
            }
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.calls.push(BackendCall::BufferData {
            target,
            bytes: data.len(),
            usage,
        });
        let bound = match target {
            BufferTarget::Vertex => self.bound_vertex_buffer,
            BufferTarget::Index => self.bound_index_buffer,
        };
        match self.buffers.get_mut(&bound) {
            Some(object) => {
                object.data = data.to_vec();
                object.usage = usage;
                object.uploads += 1;
            }
            None => self.error(format!("buffer data with no {target:?} buffer bound")),
        }
    }

    fn delete_buffer(&mut self, buffer: u32) {
        self.calls.push(BackendCall::DeleteBuffer { buffer });
        if self.buffers.remove(&buffer).is_none() {
            self.error(format!("delete of unknown buffer {buffer}"));
        }
        if self.bound_vertex_buffer == buffer {
            self.bound_vertex_buffer = 0;
        }
        if self.bound_index_buffer == buffer {
            self.bound_index_buffer = 0;
        }
    }

    fn create_vertex_array(&mut self) -> BackendResult<u32> {
        let vertex_array = next_name(&self.vertex_arrays);
        log::trace!("HeadlessBackend: create vertex array {}", vertex_array);
        self.vertex_arrays
            .insert(vertex_array, VertexArrayObject::default());
        self.calls.push(BackendCall::CreateVertexArray { vertex_array });
        Ok(vertex_array)
    }

    fn bind_vertex_array(&mut self, vertex_array: u32) {
        self.calls.push(BackendCall::BindVertexArray { vertex_array });
        if vertex_array != 0 && !self.vertex_arrays.contains_key(&vertex_array) {
            self.error(format!("bind of unknown vertex array {vertex_array}"));
            return;
        }
        self.current_vertex_array = vertex_array;
        self.bound_index_buffer = self
            .vertex_arrays
            .get(&vertex_array)
            .map_or(0, |vao| vao.index_buffer);
    }

    fn enable_vertex_attrib(&mut self, index: u32) {
        self.calls.push(BackendCall::EnableVertexAttrib { index });
        match self.vertex_arrays.get_mut(&self.current_vertex_array) {
            Some(vao) => {
                if !vao.enabled.contains(&index) {
                    vao.enabled.push(index);
                }
            }
            None => self.error(format!("enable attribute {index} with no vertex array bound")),
        }
    }

    fn vertex_attrib_pointer(&mut self, index: u32, pointer: &VertexAttribPointer) {
        self.calls.push(BackendCall::VertexAttribPointer {
            index,
            pointer: *pointer,
        });
        if self.bound_vertex_buffer == 0 {
            self.error(format!("attribute {index} described with no vertex buffer bound"));
            return;
        }
        let buffer = self.bound_vertex_buffer;
        match self.vertex_arrays.get_mut(&self.current_vertex_array) {
            Some(vao) => {
                vao.attributes.insert(index, (buffer, *pointer));
            }
            None => self.error(format!("attribute {index} described with no vertex array bound")),
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: u32) {
        self.calls.push(BackendCall::DeleteVertexArray { vertex_array });
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            self.error(format!("delete of unknown vertex array {vertex_array}"));
        }
        if self.current_vertex_array == vertex_array {
            self.current_vertex_array = 0;
        }
    }

    fn create_texture(&mut self) -> BackendResult<u32> {
        let texture = next_name(&self.textures);
        log::trace!("HeadlessBackend: create texture {}", texture);
        self.textures.insert(texture, TextureObject::default());
        self.calls.push(BackendCall::CreateTexture { texture });
        Ok(texture)
    }

    fn bind_texture(&mut self, texture: u32) {
        self.calls.push(BackendCall::BindTexture { texture });
        if texture != 0 && !self.textures.contains_key(&texture) {
            self.error(format!("bind of unknown texture {texture}"));
        }
        self.current_texture = texture;
    }

    fn texture_filters(&mut self, min: TextureFilter, mag: TextureFilter) {
        self.calls.push(BackendCall::TextureFilters { min, mag });
        match self.textures.get_mut(&self.current_texture) {
            Some(texture) => {
                texture.min_filter = min;
                texture.mag_filter = mag;
            }
            None => self.error("texture filters with no texture bound".to_string()),
        }
    }

    fn texture_image_2d(&mut self, width: u32, height: u32, pixels: &[u8]) {
        self.calls.push(BackendCall::TextureImage2D { width, height });
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            self.error(format!(
                "texture image of {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            ));
            return;
        }
        match self.textures.get_mut(&self.current_texture) {
            Some(texture) => {
                texture.width = width;
                texture.height = height;
                texture.pixels = pixels.to_vec();
                texture.uploads += 1;
            }
            None => self.error("texture image with no texture bound".to_string()),
        }
    }

    fn delete_texture(&mut self, texture: u32) {
        self.calls.push(BackendCall::DeleteTexture { texture });
        if self.textures.remove(&texture).is_none() {
            self.error(format!("delete of unknown texture {texture}"));
        }
        if self.current_texture == texture {
            self.current_texture = 0;
        }
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        offset: u32,
    ) {
        let index_buffer = self
            .vertex_arrays
            .get(&self.current_vertex_array)
            .map_or(0, |vao| vao.index_buffer);
        let draw = DrawCall {
            program: self.current_program,
            vertex_array: self.current_vertex_array,
            texture: self.current_texture,
            index_buffer,
            topology,
            count,
            format,
            offset,
        };
        log::trace!("HeadlessBackend: draw {:?}", draw);
        self.calls.push(BackendCall::DrawElements(draw));

        if !self.programs.get(&self.current_program).is_some_and(|p| p.linked) {
            self.error("draw with no linked program in use".to_string());
        }
        if self.current_vertex_array == 0 {
            self.error("draw with no vertex array bound".to_string());
        }
        let available = self.buffers.get(&index_buffer).map_or(0, |b| b.data.len());
        let needed = offset as usize + count as usize * format.size_bytes() as usize;
        if needed > available {
            self.error(format!(
                "draw reads {needed} index bytes but only {available} are available"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "#version 330 core
layout(location = 0) in vec2 position; // pixel position
in vec4 color;
uniform mat4 projection;
out vec4 frag_color;

void main() {
    gl_Position = projection * vec4(position, 0.0, 1.0);
    frag_color = color;
}
";

    const FRAGMENT: &str = "#version 330 core
in vec4 frag_color;
out vec4 color_out;

void main() {
    color_out = frag_color;
}
";

    fn compiled(backend: &mut HeadlessBackend, kind: ShaderStageKind, source: &str) -> u32 {
        let shader = backend.create_shader(kind).unwrap();
        backend.shader_source(shader, source);
        backend.compile_shader(shader);
        shader
    }

    #[test]
    fn test_names_start_at_one_and_are_reused() {
        let mut backend = HeadlessBackend::new();
        let a = backend.create_buffer().unwrap();
        let b = backend.create_buffer().unwrap();
        assert_eq!((a, b), (1, 2));

        backend.delete_buffer(a);
        assert_eq!(backend.create_buffer().unwrap(), 1);
        assert!(backend.errors().is_empty());
    }

    #[test]
    fn test_valid_source_compiles() {
        let (decls, log) = check_source(VERTEX);
        assert!(log.is_empty(), "unexpected log: {log}");
        let names: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["position", "color", "projection", "frag_color"]);
    }

    #[test]
    fn test_missing_brace_fails() {
        let (_, log) = check_source("#version 330\nvoid main() {\n gl_Position = vec4(0.0);\n");
        assert!(log.contains("error:"), "{log}");
        assert!(log.contains("unclosed '{'"), "{log}");
    }

    #[test]
    fn test_unterminated_declaration_fails() {
        let (_, log) = check_source("#version 330\nin vec2 position\nvoid main() {}\n");
        assert!(log.contains("0:2: error:"), "{log}");
        assert!(log.contains("expecting ';'"), "{log}");
    }

    #[test]
    fn test_helper_functions_and_blocks_compile() {
        let source = "#version 330\n\
            struct Light { vec3 position; };\n\
            layout(std140) uniform Globals { mat4 view; } globals;\n\
            highp float scale(float v) { return v * 2.0; }\n\
            void main() { gl_Position = vec4(scale(1.0)); }\n";
        let (_, log) = check_source(source);
        assert!(!log.contains("error:"), "{log}");
    }

    #[test]
    fn test_missing_main_fails() {
        let (_, log) = check_source("#version 330\nin vec2 position;\n");
        assert!(log.contains("missing entry point"), "{log}");
    }

    #[test]
    fn test_missing_version_is_only_a_warning() {
        let (_, log) = check_source("void main() {}\n");
        assert!(log.contains("warning:"));
        assert!(!log.contains("error:"));
    }

    #[test]
    fn test_link_assigns_locations() {
        let mut backend = HeadlessBackend::new();
        let vs = compiled(&mut backend, ShaderStageKind::Vertex, VERTEX);
        let fs = compiled(&mut backend, ShaderStageKind::Fragment, FRAGMENT);
        let program = backend.create_program().unwrap();
        backend.attach_shader(program, vs);
        backend.attach_shader(program, fs);
        backend.bind_attrib_location(program, 0, "color");
        backend.link_program(program);

        assert!(backend.program_link_status(program));
        assert_eq!(backend.attrib_location(program, "color"), Some(0));
        assert_eq!(backend.attrib_location(program, "position"), Some(1));
        assert_eq!(backend.uniform_location(program, "projection"), Some(0));
        assert_eq!(backend.uniform_location(program, "missing"), None);
        assert_eq!(backend.frag_data_location(program, "color_out"), Some(0));
    }

    #[test]
    fn test_link_detects_unmatched_varying() {
        let mut backend = HeadlessBackend::new();
        let vs = compiled(&mut backend, ShaderStageKind::Vertex, VERTEX);
        let fs = compiled(
            &mut backend,
            ShaderStageKind::Fragment,
            "#version 330\nin vec2 uv;\nout vec4 c;\nvoid main() { c = vec4(uv, 0.0, 1.0); }\n",
        );
        let program = backend.create_program().unwrap();
        backend.attach_shader(program, vs);
        backend.attach_shader(program, fs);
        backend.link_program(program);

        assert!(!backend.program_link_status(program));
        assert!(backend.program_info_log(program).contains("`uv`"));
    }

    #[test]
    fn test_draw_without_state_is_reported() {
        let mut backend = HeadlessBackend::new();
        backend.draw_elements(PrimitiveTopology::Triangles, 6, IndexFormat::Uint32, 0);
        assert_eq!(backend.draw_calls().len(), 1);
        assert_eq!(backend.errors().len(), 3);
    }
}
