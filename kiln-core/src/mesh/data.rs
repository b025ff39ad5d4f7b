use glam::{Vec2, Vec3, Vec4};
use thiserror::Error;

/// Failures raised while building geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("vertex count exceeds the 16-bit index range")]
    IndexOverflow,

    #[error("degree {degree} exceeds the maximum of {max}")]
    DegreeOutOfRange { degree: u32, max: u32 },

    #[error("index {index} refers past the last vertex ({vertices})")]
    DanglingIndex { index: u16, vertices: usize },

    #[error("{elements} elements do not form whole {primitive:?} primitives")]
    IncompletePrimitive {
        primitive: PrimitiveType,
        elements: usize,
    },
}

/// Interleaved vertex layout shared by the procedural generators.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vec4,
    pub normal: Vec3,
    pub uv: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    #[default]
    Triangle,
    TriangleStrip,
    Line,
    Point,
}

impl PrimitiveType {
    /// Number of primitives drawn from `elements` indices (or vertices, for
    /// unindexed meshes), or `None` if some are left over.
    pub fn primitive_count(self, elements: usize) -> Option<usize> {
        match self {
            PrimitiveType::Triangle if elements % 3 == 0 => Some(elements / 3),
            PrimitiveType::Line if elements % 2 == 0 => Some(elements / 2),
            PrimitiveType::TriangleStrip if elements == 0 => Some(0),
            PrimitiveType::TriangleStrip if elements >= 3 => Some(elements - 2),
            PrimitiveType::Point => Some(elements),
            _ => None,
        }
    }
}

/// How a mesh is to be drawn. Generators declare it and it travels with the
/// geometry to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshConfiguration {
    pub primitive: PrimitiveType,
    pub indexed: bool,
    pub has_normals: bool,
    pub has_uvs: bool,
}

impl Default for MeshConfiguration {
    fn default() -> Self {
        Self {
            primitive: PrimitiveType::Triangle,
            indexed: true,
            has_normals: true,
            has_uvs: true,
        }
    }
}

/// CPU-side geometry: a vertex stream, a 16-bit index stream and the
/// configuration describing how to draw them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    configuration: MeshConfiguration,
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configuration(configuration: MeshConfiguration) -> Self {
        Self {
            configuration,
            ..Self::default()
        }
    }

    pub fn configuration(&self) -> MeshConfiguration {
        self.configuration
    }

    /// Append a vertex, returning its index.
    pub fn push_vertex(&mut self, vertex: Vertex) -> Result<u16, MeshError> {
        let index = u16::try_from(self.vertices.len()).map_err(|_| MeshError::IndexOverflow)?;
        self.vertices.push(vertex);
        Ok(index)
    }

    pub fn push_index(&mut self, index: u16) {
        self.indices.push(index);
    }

    pub fn push_triangle(&mut self, a: u16, b: u16, c: u16) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn vertex(&self, index: u16) -> Option<&Vertex> {
        self.vertices.get(usize::from(index))
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Elements the primitives are assembled from: indices for indexed
    /// meshes, vertices otherwise.
    fn element_count(&self) -> usize {
        if self.configuration.indexed {
            self.indices.len()
        } else {
            self.vertices.len()
        }
    }

    /// Whole primitives in the mesh under its configured primitive type.
    pub fn primitive_count(&self) -> usize {
        self.configuration
            .primitive
            .primitive_count(self.element_count())
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Check that every index points at an existing vertex and that the
    /// elements form whole primitives.
    pub fn validate(&self) -> Result<(), MeshError> {
        if let Some(&index) = self
            .indices
            .iter()
            .find(|index| usize::from(**index) >= self.vertices.len())
        {
            return Err(MeshError::DanglingIndex {
                index,
                vertices: self.vertices.len(),
            });
        }
        let primitive = self.configuration.primitive;
        let elements = self.element_count();
        match primitive.primitive_count(elements) {
            Some(_) => Ok(()),
            None => Err(MeshError::IncompletePrimitive {
                primitive,
                elements,
            }),
        }
    }
}
