//! Resource wrapper integration tests: lifetimes, leaks and the
//! shader → program → vertex array chain.

mod common;

use rstest::rstest;

use common::{
    assert_no_backend_errors, headless_context, solid_texture, BASIC_FRAGMENT, BASIC_VERTEX,
    BROKEN_FRAGMENT,
};
use quadbatch::backend::{BackendCall, BufferUsage, ResourceKind, ShaderStageKind, TextureFilter};
use quadbatch::error::LocationKind;
use quadbatch::resources::{VertexPositionColor, VertexType};
use quadbatch::{
    Buffer, Color, GpuResource, GraphicsError, ShaderProgram, ShaderStage, Texture2D, Vec2, Vec3,
    VertexArray,
};

// ============================================================================
// Shaders and programs
// ============================================================================

#[test]
fn test_compile_error_carries_submitted_source() {
    let mut ctx = headless_context();
    let err = ShaderStage::with_source(&mut ctx, ShaderStageKind::Fragment, BROKEN_FRAGMENT)
        .unwrap_err();

    match err {
        GraphicsError::Compile {
            stage,
            source_text,
            log,
        } => {
            assert_eq!(stage, ShaderStageKind::Fragment);
            assert_eq!(source_text, BROKEN_FRAGMENT);
            assert!(!log.is_empty());
        }
        other => panic!("expected compile error, got {other}"),
    }
    // The failed stage released its handle.
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_unterminated_declaration_is_a_compile_error() {
    let mut ctx = headless_context();
    let source = "#version 330 core\nin vec2 position\nvoid main() {\n    gl_Position = vec4(position, 0.0, 1.0);\n}\n";
    let err = ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, source).unwrap_err();

    match err {
        GraphicsError::Compile { log, .. } => assert!(log.contains("expecting ';'"), "{log}"),
        other => panic!("expected compile error, got {other}"),
    }
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_program_from_stages() {
    let mut ctx = headless_context();
    let vertex = ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, BASIC_VERTEX).unwrap();
    let fragment =
        ShaderStage::with_source(&mut ctx, ShaderStageKind::Fragment, BASIC_FRAGMENT).unwrap();

    let program = ShaderProgram::new();
    program.attach(&mut ctx, &vertex).unwrap();
    program.attach(&mut ctx, &fragment).unwrap();
    program.attach(&mut ctx, &vertex).unwrap();
    program.bind_attribute_location(&mut ctx, 0, "position").unwrap();
    program.bind_attribute_location(&mut ctx, 1, "color").unwrap();
    program.link(&mut ctx).unwrap();

    assert!(program.is_linked());
    assert_eq!(
        program.attached_stages(),
        vec![vertex.raw_id(), fragment.raw_id()]
    );
    assert_eq!(program.attrib_location(&ctx, "position").unwrap(), 0);
    assert_eq!(program.attrib_location(&ctx, "color").unwrap(), 1);
    assert_eq!(
        ctx.backend().frag_data_location(program.raw_id(), "color_out"),
        Some(0)
    );
    let attaches = common::count_calls(&ctx, |call| matches!(call, BackendCall::AttachShader { .. }));
    assert_eq!(attaches, 2);
    assert_no_backend_errors(&ctx);

    program.dispose(&mut ctx);
    vertex.dispose(&mut ctx);
    fragment.dispose(&mut ctx);
    assert!(ctx.registry().is_empty());
}

#[rstest]
#[case::attribute(LocationKind::Attribute, "normal")]
#[case::uniform(LocationKind::Uniform, "projection")]
fn test_missing_location(#[case] kind: LocationKind, #[case] name: &str) {
    let mut ctx = headless_context();
    let vertex = ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, BASIC_VERTEX).unwrap();
    let fragment =
        ShaderStage::with_source(&mut ctx, ShaderStageKind::Fragment, BASIC_FRAGMENT).unwrap();
    let program = ShaderProgram::new();
    program.attach(&mut ctx, &vertex).unwrap();
    program.attach(&mut ctx, &fragment).unwrap();
    program.link(&mut ctx).unwrap();

    let err = match kind {
        LocationKind::Attribute => program.attrib_location(&ctx, name).unwrap_err(),
        LocationKind::Uniform => program.uniform_location(&ctx, name).unwrap_err(),
    };
    match err {
        GraphicsError::MissingLocation {
            kind: actual,
            name: missing,
        } => {
            assert_eq!(actual, kind);
            assert_eq!(missing, name);
        }
        other => panic!("expected missing location, got {other}"),
    }

    program.dispose(&mut ctx);
    vertex.dispose(&mut ctx);
    fragment.dispose(&mut ctx);
}

#[test]
fn test_link_without_stages_fails() {
    let mut ctx = headless_context();
    let program = ShaderProgram::new();
    let err = program.link(&mut ctx).unwrap_err();
    assert!(matches!(err, GraphicsError::Link { .. }), "{err}");
    assert!(!program.is_linked());
    program.dispose(&mut ctx);
}

// ============================================================================
// Buffers and vertex arrays
// ============================================================================

#[test]
fn test_interleaved_layout_from_program() {
    let mut ctx = headless_context();
    let vertex = ShaderStage::with_source(&mut ctx, ShaderStageKind::Vertex, BASIC_VERTEX).unwrap();
    let fragment =
        ShaderStage::with_source(&mut ctx, ShaderStageKind::Fragment, BASIC_FRAGMENT).unwrap();
    let program = ShaderProgram::new();
    program.attach(&mut ctx, &vertex).unwrap();
    program.attach(&mut ctx, &fragment).unwrap();
    program.bind_attribute_location(&mut ctx, 0, "position").unwrap();
    program.bind_attribute_location(&mut ctx, 1, "color").unwrap();
    program.link(&mut ctx).unwrap();

    let vertices = [
        VertexPositionColor::new(Vec3::ZERO, Color::WHITE),
        VertexPositionColor::new(Vec3::X, Color::BLACK),
        VertexPositionColor::new(Vec3::Y, Color::WHITE),
    ];
    let buffer = Buffer::vertex(BufferUsage::Static);
    buffer.set_data(&mut ctx, &vertices).unwrap();
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.size_in_bytes(), 3 * 28);

    let vao = VertexArray::new();
    vao.bind_layout(&mut ctx, &buffer, &VertexPositionColor::layout())
        .unwrap();

    let (source, pointer) = ctx.backend().vertex_attribute(vao.raw_id(), 1).unwrap();
    assert_eq!(source, buffer.raw_id());
    assert_eq!(pointer.stride, 28);
    assert_eq!(pointer.offset, 12);
    assert_eq!(
        ctx.backend().buffer_contents(buffer.raw_id()).unwrap(),
        bytemuck::cast_slice::<VertexPositionColor, u8>(&vertices)
    );

    vao.dispose(&mut ctx);
    buffer.dispose(&mut ctx);
    program.dispose(&mut ctx);
    vertex.dispose(&mut ctx);
    fragment.dispose(&mut ctx);
    assert!(ctx.registry().is_empty());
}

#[test]
fn test_index_buffer_must_target_indices() {
    let mut ctx = headless_context();
    let vao = VertexArray::new();
    let vertices = Buffer::vertex(BufferUsage::Dynamic);

    let err = vao.set_index_buffer(&mut ctx, &vertices).unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidParameter(_)), "{err}");

    let indices = Buffer::index(BufferUsage::Dynamic);
    vao.set_index_buffer(&mut ctx, &indices).unwrap();
    assert_eq!(
        ctx.backend().vertex_array_index_buffer(vao.raw_id()),
        Some(indices.raw_id())
    );

    vao.dispose(&mut ctx);
    vertices.dispose(&mut ctx);
    indices.dispose(&mut ctx);
}

// ============================================================================
// Textures
// ============================================================================

#[rstest]
#[case::square(16, 16, 16)]
#[case::wide(20, 5, 32)]
#[case::tall(3, 9, 16)]
#[case::single_pixel(1, 1, 1)]
fn test_texture_padding(#[case] width: u32, #[case] height: u32, #[case] expected: u32) {
    let texture = solid_texture(width, height, [10, 20, 30, 255]);
    assert_eq!(texture.actual_size(), expected);
    assert_eq!(texture.width(), width);
    assert_eq!(texture.height(), height);

    let pixels = texture.pixels();
    assert_eq!(pixels.dimensions(), (expected, expected));
    assert_eq!(pixels.get_pixel(width - 1, height - 1).0, [10, 20, 30, 255]);
    if expected > width {
        assert_eq!(pixels.get_pixel(width, 0).0, [0, 0, 0, 0]);
    }
}

#[test]
fn test_texture_coords_use_padded_size() {
    let texture = solid_texture(20, 5, [255; 4]);
    assert_eq!(texture.coords(0.0, 0.0), Vec2::ZERO);
    assert_eq!(texture.coords(16.0, 8.0), Vec2::new(0.5, 0.25));
    assert_eq!(texture.full_extent(), Vec2::new(20.0 / 32.0, 5.0 / 32.0));
}

#[test]
fn test_texture_uploads_on_first_bind_only() {
    let mut ctx = headless_context();
    let texture = solid_texture(3, 3, [255; 4]);
    assert_eq!(texture.raw_id(), 0, "allocation is lazy");

    texture.bind(&mut ctx).unwrap();
    texture.bind(&mut ctx).unwrap();
    let id = texture.raw_id();
    assert_eq!(ctx.backend().texture_uploads(id), 1);
    assert_eq!(ctx.backend().texture_size(id), Some((4, 4)));
    assert_eq!(
        ctx.backend().texture_filters_of(id),
        Some((TextureFilter::Linear, TextureFilter::Nearest))
    );

    texture.set_mag_filter(TextureFilter::Linear);
    texture.invalidate();
    texture.bind(&mut ctx).unwrap();
    assert_eq!(ctx.backend().texture_uploads(id), 2);
    assert_eq!(
        ctx.backend().texture_filters_of(id),
        Some((TextureFilter::Linear, TextureFilter::Linear))
    );

    texture.dispose(&mut ctx);
}

#[test]
fn test_texture_from_rgba_checks_length() {
    let err = Texture2D::from_rgba(2, 2, vec![0; 15]).unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidParameter(_)), "{err}");
}

// ============================================================================
// Lifetime and leaks
// ============================================================================

#[test]
fn test_dispose_twice_is_noop() {
    let mut ctx = headless_context();
    let buffer = Buffer::vertex(BufferUsage::Static);
    buffer.set_data(&mut ctx, &[Vec2::ONE]).unwrap();
    let id = buffer.raw_id();

    buffer.dispose(&mut ctx);
    buffer.dispose(&mut ctx);
    assert!(!buffer.is_allocated());
    assert!(!ctx.backend().is_live(ResourceKind::Buffer, id));
    let deletes = common::count_calls(&ctx, |call| matches!(call, BackendCall::DeleteBuffer { .. }));
    assert_eq!(deletes, 1);
}

#[test]
fn test_unused_wrappers_allocate_nothing() {
    let mut ctx = headless_context();
    let _stage = ShaderStage::new(ShaderStageKind::Vertex);
    let _program = ShaderProgram::new();
    let _buffer = Buffer::index(BufferUsage::Stream);
    let _vao = VertexArray::new();
    let _texture = solid_texture(2, 2, [0; 4]);

    assert!(ctx.backend().calls().is_empty());
    assert_eq!(ctx.backend().live_objects(), 0);
    ctx.check_leaks().unwrap();
}

#[cfg(debug_assertions)]
#[test]
fn test_leaks_are_reported() {
    let mut ctx = headless_context();
    let texture = solid_texture(2, 2, [0; 4]);
    let buffer = Buffer::vertex(BufferUsage::Static);
    texture.bind(&mut ctx).unwrap();
    buffer.bind(&mut ctx).unwrap();

    match ctx.check_leaks().unwrap_err() {
        GraphicsError::ResourceLeak { resources } => {
            assert_eq!(resources.len(), 2);
            assert!(resources
                .iter()
                .any(|r| r.kind == ResourceKind::Texture && r.id == texture.raw_id()));
            assert!(resources
                .iter()
                .any(|r| r.kind == ResourceKind::Buffer && r.id == buffer.raw_id()));
        }
        other => panic!("expected leak report, got {other}"),
    }

    texture.dispose(&mut ctx);
    buffer.dispose(&mut ctx);
    ctx.shutdown().unwrap();
}

#[cfg(debug_assertions)]
#[test]
fn test_shutdown_reports_leaks() {
    let mut ctx = headless_context();
    let program = ShaderProgram::new();
    program.id(&mut ctx).unwrap();

    let err = ctx.shutdown().unwrap_err();
    assert!(err.to_string().contains("program"), "{err}");
}
