//! Dependency Graph
//!
//! This module implements the node graph that tracks which derived resources
//! depend on which.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes produce data (compiled shaders, generated geometry, ...)
//! - Edges point from a parent to each child it reads; if A reads B, A holds
//!   a strong reference to B and B holds a weak back-reference to A
//!
//! When a node changes, we walk the back-references to mark every consumer
//! dirty. Nothing recomputes until someone pulls.
//!
//! # Design Decisions
//!
//! 1. Ownership is distributed rather than centralized: parents own their
//!    children through `Rc`, so a shared child lives exactly as long as its
//!    last consumer. Back-references are `Weak` and never keep a node alive.
//!
//! 2. Regeneration is lazy. A burst of edits invalidates many times and
//!    regenerates once.
//!
//! 3. The graph is single-threaded. Other threads talk to it through a
//!    [`CommandQueue`] drained by the owning thread.

mod command;
mod data;
mod manager;
pub(crate) mod node;
mod propagate;

pub use command::{CommandQueue, GraphCommand};
pub use data::{Artifact, NodeData};
pub use manager::{NodeFactory, NodeManager};
pub use node::{
    FnGenerator, GenerateContext, Generator, Lifecycle, Node, NodeId, NodeRef, Slot, WeakNodeRef,
};
pub use propagate::invalidate_upward;

pub(crate) use node::expect_kind;
