//! Procedural Meshes
//!
//! Mesh generators are graph nodes whose data is CPU-side geometry. A
//! [`Mesh`] node pulls one generator and uploads its output through the
//! context's GPU backend, so changing a generator property re-uploads the
//! mesh on the next pull.

mod data;
mod generator;
mod gpu_mesh;
mod icosphere;

pub use data::{MeshConfiguration, MeshData, MeshError, PrimitiveType, Vertex};
pub use generator::{MeshGenerator, MeshGeneratorNode};
pub use gpu_mesh::{Mesh, GENERATOR_SLOT};
pub use icosphere::{Icosphere, IcosphereGenerator};
