//! Graph Nodes
//!
//! This module defines the node type that lives in the dependency graph.
//!
//! A [`Node`] owns:
//!
//! - at most one generated [`NodeData`] payload and a dirty flag,
//! - strong references to its inputs, one per named [`Slot`],
//! - weak back-references to every node that consumes it.
//!
//! Consumers read data only through [`Node::get_updated_data`], which
//! regenerates on demand. Edits call [`Node::invalidate`], which marks the
//! node and everything downstream dirty without recomputing anything.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::data::{Artifact, NodeData};
use super::propagate;
use crate::error::{GraphError, InvariantViolation, Result};
use crate::events::{DiagnosticsListener, EventDispatcher, GraphEvent};

/// Identity of a node in logs, events and commands. Assigned when the node
/// is built and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owning handle to a node. Every parent-to-child edge is one of these.
pub type NodeRef = Rc<Node>;

/// Non-owning handle to a node, used for back-references.
pub type WeakNodeRef = Weak<Node>;

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Normal operation.
    Live,

    /// Edges are being torn down. Parents detaching from this node must not
    /// trip the unknown-parent check.
    TearingDown,

    /// All edges and data are gone; the node only waits for its last handle
    /// to be dropped.
    Released,
}

/// Name of an input slot on a parent node. A parent holds at most one child
/// per slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    name: &'static str,
    index: u32,
}

impl Slot {
    pub const fn named(name: &'static str) -> Self {
        Self { name, index: 0 }
    }

    /// One of several numbered slots sharing a name, e.g. `include[2]`.
    pub const fn indexed(name: &'static str, index: u32) -> Self {
        Self { name, index }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            f.write_str(self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.index)
        }
    }
}

/// The data-producing capability of a node kind.
pub trait Generator: 'static {
    /// Derive the node's artifact from its inputs and own state.
    ///
    /// Must be repeatable: calling it twice with unchanged inputs yields an
    /// equivalent artifact. On `Err` the node keeps its previous data.
    fn generate(&mut self, cx: &mut GenerateContext<'_>) -> Result<Artifact>;

    /// Reclaim external resources held by an artifact that is being replaced
    /// or dropped.
    fn release(&mut self, _artifact: &Artifact) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What a [`Generator`] sees while it runs.
pub struct GenerateContext<'a> {
    node: &'a Node,
    inputs: Vec<(Slot, NodeRef)>,
}

impl<'a> GenerateContext<'a> {
    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    pub fn kind(&self) -> &'static str {
        self.node.kind
    }

    pub fn input(&self, slot: &Slot) -> Option<&NodeRef> {
        self.inputs
            .iter()
            .find(|(candidate, _)| candidate == slot)
            .map(|(_, node)| node)
    }

    /// Inputs in attachment order.
    pub fn inputs(&self) -> impl Iterator<Item = (&Slot, &NodeRef)> {
        self.inputs.iter().map(|(slot, node)| (slot, node))
    }

    /// Send an event to the node's listener.
    pub fn emit(&self, event: GraphEvent) {
        self.node.emit(event);
    }

    /// Build the error returned for a failed generation of this node.
    pub fn failure(&self, message: impl Into<String>) -> GraphError {
        GraphError::Generation {
            node: self.node.id,
            message: message.into(),
        }
    }
}

/// A [`Generator`] backed by a closure.
pub struct FnGenerator<F> {
    generate: F,
}

impl<F> FnGenerator<F>
where
    F: FnMut(&mut GenerateContext<'_>) -> Result<Artifact> + 'static,
{
    pub fn new(generate: F) -> Self {
        Self { generate }
    }
}

impl<F> Generator for FnGenerator<F>
where
    F: FnMut(&mut GenerateContext<'_>) -> Result<Artifact> + 'static,
{
    fn generate(&mut self, cx: &mut GenerateContext<'_>) -> Result<Artifact> {
        (self.generate)(cx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
struct ParentLink {
    id: NodeId,
    node: WeakNodeRef,
}

/// A node in the dependency graph.
pub struct Node {
    id: NodeId,
    kind: &'static str,
    this: WeakNodeRef,
    lifecycle: Cell<Lifecycle>,
    dirty: Cell<bool>,
    generation: Cell<u64>,
    data: RefCell<Option<Rc<NodeData>>>,

    /// One entry per strong edge pointing at this node, so a parent using
    /// this node in two slots is listed twice.
    parents: RefCell<SmallVec<[ParentLink; 4]>>,

    inputs: RefCell<IndexMap<Slot, NodeRef>>,
    generator: RefCell<Option<Box<dyn Generator>>>,
    events: EventDispatcher,
}

impl Node {
    /// Create a node of the given kind. It starts dirty with no data.
    pub fn new(kind: &'static str, generator: impl Generator) -> NodeRef {
        Self::build(kind, Some(Box::new(generator)))
    }

    /// Create a node whose data is produced by a closure.
    pub fn from_fn<F>(kind: &'static str, generate: F) -> NodeRef
    where
        F: FnMut(&mut GenerateContext<'_>) -> Result<Artifact> + 'static,
    {
        Self::new(kind, FnGenerator::new(generate))
    }

    /// Create a node that cannot produce data. Pulling it is a contract
    /// violation; it can still take part in edges.
    pub fn without_generator(kind: &'static str) -> NodeRef {
        Self::build(kind, None)
    }

    fn build(kind: &'static str, generator: Option<Box<dyn Generator>>) -> NodeRef {
        Rc::new_cyclic(|this| Self {
            id: NodeId::next(),
            kind,
            this: this.clone(),
            lifecycle: Cell::new(Lifecycle::Live),
            dirty: Cell::new(true),
            generation: Cell::new(0),
            data: RefCell::new(None),
            parents: RefCell::new(SmallVec::new()),
            inputs: RefCell::new(IndexMap::new()),
            generator: RefCell::new(generator),
            events: EventDispatcher::new(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    pub fn is_live(&self) -> bool {
        self.lifecycle.get() == Lifecycle::Live
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Number of successful regenerations so far.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    fn strong(&self) -> Result<NodeRef> {
        if !self.is_live() {
            return Err(InvariantViolation::Released(self.id).into());
        }
        self.this
            .upgrade()
            .ok_or_else(|| InvariantViolation::Released(self.id).into())
    }

    // ------------------------------------------------------------------
    // Regeneration contract
    // ------------------------------------------------------------------

    /// Get current data, regenerating it if the node is dirty or has no
    /// valid data.
    ///
    /// Returns the data and whether this call regenerated it. On failure the
    /// node stays dirty, keeps its previous (now invalid) data and the error
    /// is returned; the next call retries.
    pub fn get_updated_data(&self) -> Result<(Rc<NodeData>, bool)> {
        if !self.is_live() {
            return Err(InvariantViolation::Released(self.id).into());
        }

        if !self.dirty.get() {
            if let Some(data) = self.data.borrow().as_ref() {
                if data.is_valid() {
                    trace!(node = %self.id, kind = self.kind, "data up to date");
                    return Ok((Rc::clone(data), false));
                }
            }
        }

        let mut slot = self
            .generator
            .try_borrow_mut()
            .map_err(|_| InvariantViolation::ReentrantGeneration(self.id))?;
        let generator = slot
            .as_mut()
            .ok_or(InvariantViolation::MissingGenerator(self.id))?;

        let mut cx = GenerateContext {
            node: self,
            inputs: self.inputs(),
        };

        match generator.generate(&mut cx) {
            Ok(artifact) => {
                let version = self.generation.get() + 1;
                self.generation.set(version);

                let data = Rc::new(NodeData::new(artifact, version));
                let previous = self.data.replace(Some(Rc::clone(&data)));
                if let Some(previous) = previous {
                    generator.release(previous.artifact());
                }
                self.dirty.set(false);

                debug!(node = %self.id, kind = self.kind, version, "regenerated data");
                Ok((data, true))
            }
            Err(err) => {
                if let Some(data) = self.data.borrow().as_ref() {
                    data.invalidate();
                }
                warn!(node = %self.id, kind = self.kind, error = %err, "generation failed");
                Err(err)
            }
        }
    }

    /// Mark the data stale. Pure state transition: nothing is recomputed and
    /// nothing upstream is touched.
    pub fn invalidate_data(&self) {
        if let Some(data) = self.data.borrow().as_ref() {
            data.invalidate();
        }
        self.dirty.set(true);
    }

    /// Invalidate this node and every node that consumes it, directly or
    /// transitively. Returns the consumers that were marked, in visit order.
    pub fn invalidate(&self) -> Vec<NodeId> {
        propagate::invalidate_upward(self)
    }

    /// The most recent data, valid or not, without regenerating.
    ///
    /// For consumers that would rather draw the last good artifact than
    /// nothing after a failed regeneration.
    pub fn fallback_data(&self) -> Option<Rc<NodeData>> {
        self.data.borrow().clone()
    }

    pub fn has_data(&self) -> bool {
        self.data.borrow().is_some()
    }

    /// Drop the data, handing its artifact back to the generator for
    /// reclamation. The node becomes dirty and regenerates on the next pull.
    pub fn release_data(&self) {
        let previous = self.data.borrow_mut().take();
        self.dirty.set(true);

        let Some(previous) = previous else {
            return;
        };
        match self.generator.try_borrow_mut() {
            Ok(mut slot) => {
                if let Some(generator) = slot.as_mut() {
                    generator.release(previous.artifact());
                }
            }
            Err(_) => warn!(node = %self.id, "data released mid-generation, artifact not reclaimed"),
        }
    }

    /// Release this node's data and, recursively, the data of its inputs.
    /// Used when the resources behind the artifacts were lost out of band.
    pub fn release_data_and_propagate(&self) {
        debug!(node = %self.id, kind = self.kind, "releasing data");
        self.release_data();
        for (_, input) in self.inputs() {
            input.release_data_and_propagate();
        }
    }

    // ------------------------------------------------------------------
    // Parents
    // ------------------------------------------------------------------

    /// Record that `parent` holds a strong edge to this node.
    pub fn register_parent(&self, parent: &NodeRef) -> Result<()> {
        if !self.is_live() {
            return Err(InvariantViolation::Released(self.id).into());
        }
        self.parents.borrow_mut().push(ParentLink {
            id: parent.id,
            node: Rc::downgrade(parent),
        });
        trace!(child = %self.id, parent = %parent.id, "registered parent");
        Ok(())
    }

    /// Remove one back-reference to `parent`.
    ///
    /// Unknown parents are a contract violation, except while this node is
    /// tearing down, where every call succeeds.
    pub fn unregister_parent(&self, parent: &Node) -> Result<()> {
        if !self.is_live() {
            return Ok(());
        }
        let mut parents = self.parents.borrow_mut();
        match parents.iter().position(|link| link.id == parent.id) {
            Some(index) => {
                parents.remove(index);
                trace!(child = %self.id, parent = %parent.id, "unregistered parent");
                Ok(())
            }
            None => Err(InvariantViolation::UnknownParent {
                child: self.id,
                parent: parent.id,
            }
            .into()),
        }
    }

    /// Live parents, one entry per edge.
    pub fn parents(&self) -> Vec<NodeRef> {
        self.parents
            .borrow()
            .iter()
            .filter_map(|link| link.node.upgrade())
            .collect()
    }

    /// Number of registered back-references, live or not.
    pub fn parent_count(&self) -> usize {
        self.parents.borrow().len()
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Attach `child` in `slot`, replacing whatever was there.
    ///
    /// Returns the replaced child. The node and its consumers are
    /// invalidated unless the slot already held `child`.
    pub fn set_input(&self, slot: Slot, child: &NodeRef) -> Result<Option<NodeRef>> {
        let this = self.strong()?;
        if !child.is_live() {
            return Err(InvariantViolation::Released(child.id).into());
        }
        if child.id == self.id || child.depends_on(self.id) {
            return Err(InvariantViolation::Cycle {
                parent: self.id,
                child: child.id,
            }
            .into());
        }
        if let Some(existing) = self.inputs.borrow().get(&slot) {
            if existing.id == child.id {
                return Ok(None);
            }
        }

        child.register_parent(&this)?;
        let previous = self.inputs.borrow_mut().insert(slot, Rc::clone(child));
        if let Some(previous) = &previous {
            previous.unregister_parent(self)?;
        }
        self.invalidate();
        Ok(previous)
    }

    /// Detach whatever child sits in `slot`.
    pub fn remove_input(&self, slot: &Slot) -> Result<Option<NodeRef>> {
        let removed = self.inputs.borrow_mut().shift_remove(slot);
        if let Some(child) = &removed {
            child.unregister_parent(self)?;
            self.invalidate();
        }
        Ok(removed)
    }

    pub fn input(&self, slot: &Slot) -> Option<NodeRef> {
        self.inputs.borrow().get(slot).cloned()
    }

    /// Inputs in attachment order.
    pub fn inputs(&self) -> Vec<(Slot, NodeRef)> {
        self.inputs
            .borrow()
            .iter()
            .map(|(slot, node)| (slot.clone(), Rc::clone(node)))
            .collect()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.borrow().len()
    }

    /// Whether `target` is reachable through this node's inputs.
    pub fn depends_on(&self, target: NodeId) -> bool {
        let mut stack: Vec<NodeRef> = self.inputs.borrow().values().cloned().collect();
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node.id == target {
                return true;
            }
            if seen.insert(node.id) {
                stack.extend(node.inputs.borrow().values().cloned());
            }
        }
        false
    }

    /// Drop every slot that points at `child`.
    fn detach_input(&self, child: &Node) {
        let mut removed = Vec::new();
        self.inputs.borrow_mut().retain(|_, node| {
            if node.id == child.id {
                removed.push(Rc::clone(node));
                false
            } else {
                true
            }
        });
        if removed.is_empty() {
            return;
        }
        for node in &removed {
            if let Err(err) = node.unregister_parent(self) {
                warn!(parent = %self.id, child = %child.id, error = %err, "detach failed");
            }
        }
        self.invalidate();
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Tear the node out of the graph: every live parent drops its slot
    /// pointing here (and is invalidated), every input forgets this node as a
    /// parent, and the data is released. Idempotent.
    ///
    /// The node itself is freed once the last handle to it is dropped.
    pub fn destroy(&self) {
        if !self.is_live() {
            return;
        }
        let _keep_alive = self.this.upgrade();
        self.lifecycle.set(Lifecycle::TearingDown);
        debug!(node = %self.id, kind = self.kind, "tearing down node");

        let parents = std::mem::take(&mut *self.parents.borrow_mut());
        for link in parents {
            if let Some(parent) = link.node.upgrade() {
                parent.detach_input(self);
            }
        }

        let inputs = std::mem::take(&mut *self.inputs.borrow_mut());
        for (slot, child) in inputs {
            if let Err(err) = child.unregister_parent(self) {
                warn!(node = %self.id, %slot, error = %err, "input lost track of parent");
            }
        }

        self.release_data();
        self.lifecycle.set(Lifecycle::Released);
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Attach the node's listener, replacing the previous one.
    pub fn set_listener(&self, listener: Rc<dyn DiagnosticsListener>) {
        self.events.set_listener(listener);
    }

    pub fn clear_listener(&self) {
        self.events.clear_listener();
    }

    pub(crate) fn emit(&self, event: GraphEvent) {
        self.events.dispatch(self.id, event);
    }

    // ------------------------------------------------------------------
    // Typed generator access
    // ------------------------------------------------------------------

    pub fn with_generator<G: Generator, R>(&self, f: impl FnOnce(&G) -> R) -> Result<R> {
        let slot = self
            .generator
            .try_borrow()
            .map_err(|_| InvariantViolation::ReentrantGeneration(self.id))?;
        let generator = slot
            .as_ref()
            .ok_or(InvariantViolation::MissingGenerator(self.id))?;
        let typed = generator
            .as_any()
            .downcast_ref::<G>()
            .ok_or_else(|| self.wrong_kind::<G>())?;
        Ok(f(typed))
    }

    pub fn with_generator_mut<G: Generator, R>(&self, f: impl FnOnce(&mut G) -> R) -> Result<R> {
        let mut slot = self
            .generator
            .try_borrow_mut()
            .map_err(|_| InvariantViolation::ReentrantGeneration(self.id))?;
        let generator = slot
            .as_mut()
            .ok_or(InvariantViolation::MissingGenerator(self.id))?;
        let typed = generator
            .as_any_mut()
            .downcast_mut::<G>()
            .ok_or_else(|| self.wrong_kind::<G>())?;
        Ok(f(typed))
    }

    fn wrong_kind<G>(&self) -> InvariantViolation {
        InvariantViolation::WrongKind {
            node: self.id,
            expected: std::any::type_name::<G>(),
            actual: self.kind,
        }
    }
}

/// Check that `node` is of `kind`.
pub(crate) fn expect_kind(node: &Node, kind: &'static str) -> Result<()> {
    if node.kind == kind {
        Ok(())
    } else {
        Err(InvariantViolation::WrongKind {
            node: node.id,
            expected: kind,
            actual: node.kind,
        }
        .into())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if self.lifecycle.get() == Lifecycle::Released {
            return;
        }
        self.lifecycle.set(Lifecycle::TearingDown);

        // Every remaining back-reference is dead: a live parent would still
        // hold a strong edge to us.
        self.parents.get_mut().clear();

        let inputs = std::mem::take(self.inputs.get_mut());
        for (_, child) in inputs {
            if let Err(err) = child.unregister_parent(self) {
                warn!(node = %self.id, error = %err, "input lost track of dropped parent");
            }
        }

        self.release_data();
        self.lifecycle.set(Lifecycle::Released);
        trace!(node = %self.id, kind = self.kind, "node dropped");
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("lifecycle", &self.lifecycle.get())
            .field("dirty", &self.dirty.get())
            .field("generation", &self.generation.get())
            .field("parents", &self.parent_count())
            .field("inputs", &self.input_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_node(kind: &'static str) -> (NodeRef, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let node = Node::from_fn(kind, move |_| {
            counter.set(counter.get() + 1);
            Ok(Artifact::Empty)
        });
        (node, runs)
    }

    #[test]
    fn nodes_get_increasing_ids() {
        let (first, _) = counting_node("Test");
        let (second, _) = counting_node("Test");
        assert!(first.id() < second.id());
        assert_ne!(first.id(), NodeId::from(0));
        assert_eq!(NodeId::from(12).to_string(), "#12");
    }

    #[test]
    fn new_node_starts_dirty_without_data() {
        let (node, runs) = counting_node("Test");
        assert!(node.is_dirty());
        assert!(!node.has_data());
        assert_eq!(node.generation(), 0);
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn clean_pull_returns_same_data() {
        let (node, runs) = counting_node("Test");

        let (first, updated) = node.get_updated_data().unwrap();
        assert!(updated);
        assert_eq!(first.version(), 1);

        for _ in 0..3 {
            let (again, updated) = node.get_updated_data().unwrap();
            assert!(!updated);
            assert!(Rc::ptr_eq(&first, &again));
        }
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn invalidate_data_forces_exactly_one_regeneration() {
        let (node, runs) = counting_node("Test");
        let (old, _) = node.get_updated_data().unwrap();

        node.invalidate_data();
        assert!(node.is_dirty());
        assert!(!old.is_valid());

        let (new, updated) = node.get_updated_data().unwrap();
        assert!(updated);
        assert_eq!(new.version(), 2);
        let (_, updated) = node.get_updated_data().unwrap();
        assert!(!updated);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn missing_generator_is_an_invariant_violation() {
        let node = Node::without_generator("Bare");
        let err = node.get_updated_data().unwrap_err();
        assert!(matches!(
            err,
            GraphError::Invariant(InvariantViolation::MissingGenerator(id)) if id == node.id()
        ));
    }

    #[test]
    fn failed_generation_keeps_prior_data_and_stays_dirty() {
        let fail = Rc::new(Cell::new(false));
        let switch = Rc::clone(&fail);
        let node = Node::from_fn("Flaky", move |cx| {
            if switch.get() {
                Err(cx.failure("nope"))
            } else {
                Ok(Artifact::Empty)
            }
        });

        let (good, _) = node.get_updated_data().unwrap();
        fail.set(true);
        node.invalidate_data();

        assert!(node.get_updated_data().is_err());
        assert!(node.is_dirty());
        let fallback = node.fallback_data().unwrap();
        assert!(Rc::ptr_eq(&good, &fallback));
        assert!(!fallback.is_valid());

        // Retries on every pull until it succeeds.
        assert!(node.get_updated_data().is_err());
        fail.set(false);
        let (recovered, updated) = node.get_updated_data().unwrap();
        assert!(updated);
        assert_eq!(recovered.version(), 2);
    }

    #[test]
    fn reentrant_pull_is_rejected() {
        let handle: Rc<RefCell<Option<WeakNodeRef>>> = Rc::new(RefCell::new(None));
        let inner = Rc::clone(&handle);
        let node = Node::from_fn("Loop", move |_| {
            let me = inner.borrow().as_ref().and_then(Weak::upgrade);
            match me {
                Some(me) => me.get_updated_data().map(|_| Artifact::Empty),
                None => Ok(Artifact::Empty),
            }
        });
        *handle.borrow_mut() = Some(Rc::downgrade(&node));

        let err = node.get_updated_data().unwrap_err();
        assert!(matches!(
            err,
            GraphError::Invariant(InvariantViolation::ReentrantGeneration(_))
        ));
    }

    #[test]
    fn set_input_registers_back_reference() {
        let parent = Node::without_generator("Parent");
        let child = Node::without_generator("Child");

        assert!(parent.set_input(Slot::named("a"), &child).unwrap().is_none());
        assert_eq!(child.parent_count(), 1);
        assert_eq!(child.parents()[0].id(), parent.id());

        // Same child in the same slot is a no-op.
        parent.set_input(Slot::named("a"), &child).unwrap();
        assert_eq!(child.parent_count(), 1);

        // A second slot adds a second back-reference.
        parent.set_input(Slot::named("b"), &child).unwrap();
        assert_eq!(child.parent_count(), 2);
    }

    #[test]
    fn replacing_a_slot_moves_the_back_reference() {
        let parent = Node::without_generator("Parent");
        let first = Node::without_generator("Child");
        let second = Node::without_generator("Child");

        parent.set_input(Slot::named("a"), &first).unwrap();
        let replaced = parent.set_input(Slot::named("a"), &second).unwrap();

        assert_eq!(replaced.unwrap().id(), first.id());
        assert_eq!(first.parent_count(), 0);
        assert_eq!(second.parent_count(), 1);
        assert_eq!(parent.input_count(), 1);
    }

    #[test]
    fn remove_input_unregisters() {
        let parent = Node::without_generator("Parent");
        let child = Node::without_generator("Child");
        parent.set_input(Slot::named("a"), &child).unwrap();

        let removed = parent.remove_input(&Slot::named("a")).unwrap();
        assert_eq!(removed.unwrap().id(), child.id());
        assert_eq!(child.parent_count(), 0);
        assert!(parent.remove_input(&Slot::named("a")).unwrap().is_none());
    }

    #[test]
    fn unregistering_unknown_parent_fails() {
        let child = Node::without_generator("Child");
        let stranger = Node::without_generator("Stranger");

        let err = child.unregister_parent(&stranger).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Invariant(InvariantViolation::UnknownParent { .. })
        ));
    }

    #[test]
    fn unregister_during_teardown_always_succeeds() {
        let child = Node::without_generator("Child");
        let stranger = Node::without_generator("Stranger");
        child.destroy();
        assert!(child.unregister_parent(&stranger).is_ok());
    }

    #[test]
    fn cycles_are_rejected() {
        let a = Node::without_generator("A");
        let b = Node::without_generator("B");
        let c = Node::without_generator("C");
        a.set_input(Slot::named("in"), &b).unwrap();
        b.set_input(Slot::named("in"), &c).unwrap();

        let err = c.set_input(Slot::named("in"), &a).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Invariant(InvariantViolation::Cycle { .. })
        ));
        assert!(a.set_input(Slot::named("self"), &a).is_err());
        assert_eq!(a.parent_count(), 0);
    }

    #[test]
    fn destroying_child_clears_every_parent_slot() {
        let p1 = Node::without_generator("Parent");
        let p2 = Node::without_generator("Parent");
        let child = Node::without_generator("Child");
        p1.set_input(Slot::named("x"), &child).unwrap();
        p2.set_input(Slot::named("y"), &child).unwrap();

        child.destroy();

        assert_eq!(p1.input_count(), 0);
        assert_eq!(p2.input_count(), 0);
        assert_eq!(child.parent_count(), 0);
        assert_eq!(child.lifecycle(), Lifecycle::Released);
        assert!(p1.is_dirty() && p2.is_dirty());

        // Idempotent.
        child.destroy();
        assert!(child.get_updated_data().is_err());
    }

    #[test]
    fn dropping_parent_unregisters_from_children() {
        let parent = Node::without_generator("Parent");
        let child = Node::without_generator("Child");
        parent.set_input(Slot::named("x"), &child).unwrap();
        assert_eq!(child.parent_count(), 1);

        drop(parent);
        assert_eq!(child.parent_count(), 0);
        assert!(child.parents().is_empty());
    }

    #[test]
    fn shared_child_outlives_first_parent() {
        let p1 = Node::without_generator("Parent");
        let p2 = Node::without_generator("Parent");
        let child = Node::without_generator("Child");
        p1.set_input(Slot::named("x"), &child).unwrap();
        p2.set_input(Slot::named("x"), &child).unwrap();
        let weak = Rc::downgrade(&child);
        drop(child);

        drop(p1);
        let child = weak.upgrade().expect("still owned by p2");
        assert_eq!(child.parent_count(), 1);
        drop(child);

        drop(p2);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn typed_generator_access_checks_type() {
        let (node, _) = counting_node("Test");
        struct Other;
        impl Generator for Other {
            fn generate(&mut self, _: &mut GenerateContext<'_>) -> Result<Artifact> {
                Ok(Artifact::Empty)
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
        let err = node.with_generator::<Other, _>(|_| ()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Invariant(InvariantViolation::WrongKind { .. })
        ));

        let typed = Node::new("Other", Other);
        assert!(typed.with_generator_mut::<Other, _>(|_| 5).is_ok());
    }
}
