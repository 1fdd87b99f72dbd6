//! Vertex layouts and predefined vertex types

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::backend::{Color, ComponentType, VertexAttribPointer};

/// One attribute of an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexElement {
    /// Attribute binding index
    pub index: u32,
    /// Number of components, 1 to 4
    pub components: u8,
    pub component_type: ComponentType,
    pub normalized: bool,
    /// Byte offset inside the vertex
    pub offset: u32,
}

impl VertexElement {
    pub const fn new(index: u32, components: u8, component_type: ComponentType, offset: u32) -> Self {
        Self {
            index,
            components,
            component_type,
            normalized: false,
            offset,
        }
    }

    pub const fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub fn size_bytes(&self) -> u32 {
        self.components as u32 * self.component_type.size_bytes()
    }

    /// Attribute description for a vertex of `stride` bytes.
    pub fn pointer(&self, stride: u32) -> VertexAttribPointer {
        VertexAttribPointer {
            components: self.components,
            component_type: self.component_type,
            normalized: self.normalized,
            stride,
            offset: self.offset,
        }
    }
}

/// Ordered attributes of an interleaved vertex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    elements: Vec<VertexElement>,
}

impl VertexLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout from elements with explicit offsets.
    pub fn from_elements(elements: impl IntoIterator<Item = VertexElement>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
        }
    }

    /// Append an attribute placed right after the previous ones.
    pub fn with(mut self, index: u32, components: u8, component_type: ComponentType) -> Self {
        let offset = self.stride();
        self.elements
            .push(VertexElement::new(index, components, component_type, offset));
        self
    }

    /// Like [`with`](Self::with), for normalized integer data.
    pub fn with_normalized(mut self, index: u32, components: u8, component_type: ComponentType) -> Self {
        let offset = self.stride();
        self.elements
            .push(VertexElement::new(index, components, component_type, offset).normalized());
        self
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Sum of all element sizes.
    pub fn stride(&self) -> u32 {
        self.elements.iter().map(VertexElement::size_bytes).sum()
    }
}

/// A vertex type with a known interleaved layout.
pub trait VertexType: Pod {
    fn layout() -> VertexLayout;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionColor {
    pub position: Vec3,
    pub color: Color,
}

impl VertexPositionColor {
    pub fn new(position: Vec3, color: Color) -> Self {
        Self { position, color }
    }
}

impl VertexType for VertexPositionColor {
    fn layout() -> VertexLayout {
        VertexLayout::new()
            .with(0, 3, ComponentType::Float)
            .with(1, 4, ComponentType::Float)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionTexture {
    pub position: Vec3,
    pub uv: Vec2,
}

impl VertexPositionTexture {
    pub fn new(position: Vec3, uv: Vec2) -> Self {
        Self { position, uv }
    }
}

impl VertexType for VertexPositionTexture {
    fn layout() -> VertexLayout {
        VertexLayout::new()
            .with(0, 3, ComponentType::Float)
            .with(1, 2, ComponentType::Float)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexPositionColorTexture {
    pub position: Vec3,
    pub color: Color,
    pub uv: Vec2,
}

impl VertexPositionColorTexture {
    pub fn new(position: Vec3, color: Color, uv: Vec2) -> Self {
        Self {
            position,
            color,
            uv,
        }
    }
}

impl VertexType for VertexPositionColorTexture {
    fn layout() -> VertexLayout {
        VertexLayout::new()
            .with(0, 3, ComponentType::Float)
            .with(1, 4, ComponentType::Float)
            .with(2, 2, ComponentType::Float)
    }
}
