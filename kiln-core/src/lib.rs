//! Kiln Core
//!
//! This crate provides the dependency-tracked node graph that a rendering
//! engine uses to keep derived resources up to date. It implements:
//!
//! - Nodes with lazy, pull-based regeneration and dirty propagation
//! - Shader stages, includes and linked programs
//! - Procedural mesh generators and GPU meshes
//! - A diagnostics channel for editors
//!
//! The graph is single-threaded. Other threads post commands through a
//! [`CommandQueue`] that the owning thread drains.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Nodes, edges, invalidation and the node manager
//! - `cache`: Memoization used inside generators
//! - `events`: Diagnostics events and listeners
//! - `shader`: Shader sources, stages and programs
//! - `mesh`: Mesh data, generators and GPU meshes
//! - `backend`, `io`: Traits for the GPU and the file system
//!
//! # Example
//!
//! ```rust
//! use kiln_core::{GraphContext, NodeManager, StageKind};
//!
//! let manager = NodeManager::new(GraphContext::headless());
//!
//! let vs = manager.create_shader_stage()?;
//! vs.set_stage(StageKind::Vertex)?;
//! vs.set_source("void main() { gl_Position = vec4(0.0); }")?;
//!
//! let ps = manager.create_shader_stage()?;
//! ps.set_stage(StageKind::Fragment)?;
//! ps.set_source("void main() {}")?;
//!
//! let program = manager.create_program()?;
//! program.set_shader_stage(&vs)?;
//! program.set_shader_stage(&ps)?;
//!
//! // First pull compiles and links.
//! let (_, updated) = program.node().get_updated_data()?;
//! assert!(updated);
//!
//! // Editing a stage only marks the program dirty; the next pull relinks.
//! vs.set_source("void main() { gl_Position = vec4(1.0); }")?;
//! assert!(program.node().is_dirty());
//! # Ok::<(), kiln_core::GraphError>(())
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod graph;
pub mod io;
pub mod mesh;
pub mod shader;

pub use backend::{GpuBackend, GpuHandle, HeadlessBackend};
pub use config::GraphConfig;
pub use context::GraphContext;
pub use error::{GraphError, InvariantViolation, Result};
pub use events::{DiagnosticsListener, GraphEvent, RecordingListener};
pub use graph::{CommandQueue, GraphCommand, Node, NodeId, NodeManager, NodeRef};
pub use io::{FsIoManager, IoManager, IoStatus};
pub use mesh::{IcosphereGenerator, Mesh};
pub use shader::{ProgramLinkage, ShaderSource, ShaderStage, StageKind};
