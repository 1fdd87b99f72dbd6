//! 2D textures

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::path::Path;

use glam::Vec2;
use image::RgbaImage;

use crate::backend::{GraphicsBackend, ResourceKind, TextureFilter};
use crate::context::RenderContext;
use crate::error::{GraphicsError, GraphicsResult};

use super::{GpuResource, LazyHandle};

/// An RGBA8 texture backed by CPU-side pixels.
///
/// Pixels are padded to a power-of-two square canvas and uploaded on the
/// first bind. Later binds don't upload again until the texture is
/// invalidated.
#[derive(Debug)]
pub struct Texture2D {
    handle: LazyHandle,
    canvas: RefCell<RgbaImage>,
    width: Cell<u32>,
    height: Cell<u32>,
    actual_size: Cell<u32>,
    min_filter: Cell<Option<TextureFilter>>,
    mag_filter: Cell<Option<TextureFilter>>,
    loaded: Cell<bool>,
}

/// Copy `image` into the top-left corner of a transparent power-of-two square.
fn pad_to_power_of_two(image: RgbaImage) -> (RgbaImage, u32) {
    let size = image.width().max(image.height()).max(1).next_power_of_two();
    if image.width() == size && image.height() == size {
        return (image, size);
    }
    let mut canvas = RgbaImage::new(size, size);
    image::imageops::replace(&mut canvas, &image, 0, 0);
    (canvas, size)
}

impl Texture2D {
    pub fn new(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let (canvas, actual_size) = pad_to_power_of_two(image);
        Self {
            handle: LazyHandle::new(ResourceKind::Texture),
            canvas: RefCell::new(canvas),
            width: Cell::new(width),
            height: Cell::new(height),
            actual_size: Cell::new(actual_size),
            min_filter: Cell::new(None),
            mag_filter: Cell::new(None),
            loaded: Cell::new(false),
        }
    }

    /// Texture from tightly packed RGBA8 pixels.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> GraphicsResult<Self> {
        let len = pixels.len();
        RgbaImage::from_raw(width, height, pixels)
            .map(Self::new)
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!(
                    "{width}x{height} RGBA texture needs {} bytes, got {len}",
                    width as usize * height as usize * 4
                ))
            })
    }

    /// Decode an image file.
    pub fn from_file(path: impl AsRef<Path>) -> GraphicsResult<Self> {
        let image = image::open(path.as_ref())?;
        Ok(Self::new(image.to_rgba8()))
    }

    /// Decode an encoded image held in memory.
    pub fn from_memory(bytes: &[u8]) -> GraphicsResult<Self> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::new(image.to_rgba8()))
    }

    /// Logical width in pixels.
    pub fn width(&self) -> u32 {
        self.width.get()
    }

    /// Logical height in pixels.
    pub fn height(&self) -> u32 {
        self.height.get()
    }

    /// Side of the padded square canvas.
    pub fn actual_size(&self) -> u32 {
        self.actual_size.get()
    }

    /// The padded canvas that gets uploaded.
    pub fn pixels(&self) -> Ref<'_, RgbaImage> {
        self.canvas.borrow()
    }

    /// Map a pixel position to texture coordinates on the padded canvas.
    pub fn coords(&self, x: f32, y: f32) -> Vec2 {
        let size = self.actual_size.get() as f32;
        Vec2::new(x / size, y / size)
    }

    /// Texture coordinates of the bottom-right corner of the logical image.
    pub fn full_extent(&self) -> Vec2 {
        self.coords(self.width.get() as f32, self.height.get() as f32)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Explicit minification filter, `None` uses the context default.
    pub fn min_filter(&self) -> Option<TextureFilter> {
        self.min_filter.get()
    }

    pub fn mag_filter(&self) -> Option<TextureFilter> {
        self.mag_filter.get()
    }

    pub fn set_min_filter(&self, filter: TextureFilter) {
        self.min_filter.set(Some(filter));
        self.note_late_filter_change();
    }

    pub fn set_mag_filter(&self, filter: TextureFilter) {
        self.mag_filter.set(Some(filter));
        self.note_late_filter_change();
    }

    fn note_late_filter_change(&self) {
        if self.loaded.get() {
            log::debug!(
                "Filter change on uploaded texture {} applies after invalidate()",
                self.handle.get()
            );
        }
    }

    /// Replace the pixels. The next bind uploads them.
    pub fn set_image(&self, image: RgbaImage) {
        let (width, height) = image.dimensions();
        let (canvas, actual_size) = pad_to_power_of_two(image);
        self.canvas.replace(canvas);
        self.width.set(width);
        self.height.set(height);
        self.actual_size.set(actual_size);
        self.invalidate();
    }

    /// Force the next bind to upload again.
    pub fn invalidate(&self) {
        self.loaded.set(false);
    }

    /// Bind through the context's binding cache, uploading on first use.
    pub fn bind<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<()> {
        let id = self.id(ctx)?;
        ctx.bind_texture(id);
        if !self.loaded.get() {
            self.load(ctx);
        }
        Ok(())
    }

    /// Upload filters and pixels to the bound texture.
    fn load<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) {
        let min = self
            .min_filter
            .get()
            .unwrap_or(ctx.config().default_min_filter);
        let mag = self
            .mag_filter
            .get()
            .unwrap_or(ctx.config().default_mag_filter);
        let canvas = self.canvas.borrow();
        let backend = ctx.backend_mut();
        backend.texture_filters(min, mag);
        backend.texture_image_2d(canvas.width(), canvas.height(), canvas.as_raw());
        self.loaded.set(true);
        log::debug!(
            "Uploaded texture {} ({}x{} on a {}x{} canvas)",
            self.handle.get(),
            self.width.get(),
            self.height.get(),
            canvas.width(),
            canvas.height()
        );
    }
}

impl GpuResource for Texture2D {
    fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }

    fn raw_id(&self) -> u32 {
        self.handle.get()
    }

    fn id<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) -> GraphicsResult<u32> {
        self.handle.get_or_allocate(ctx, |b| b.create_texture())
    }

    fn dispose<B: GraphicsBackend>(&self, ctx: &mut RenderContext<B>) {
        if self.handle.release(ctx, |b, id| b.delete_texture(id)) {
            self.loaded.set(false);
        }
    }
}

impl fmt::Display for Texture2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Texture2D {} ({}x{})",
            self.handle.get(),
            self.width.get(),
            self.height.get()
        )
    }
}
