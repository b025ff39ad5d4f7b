//! Invalidation Propagation
//!
//! When a node's content changes, everything that consumes it is stale too.
//! Propagation walks the weak back-references upward and marks each
//! consumer dirty. Nothing is regenerated here: the next pull from whoever
//! needs the data does that, so a burst of edits costs one regeneration.
//!
//! # Algorithm
//!
//! Breadth-first over parents with a visited set:
//!
//! 1. Invalidate the origin node.
//! 2. Queue its live parents.
//! 3. Pop a node; skip it if already visited, otherwise invalidate it and
//!    queue its parents.
//!
//! A consumer reachable through several paths (a diamond) is visited once.
//! The walk does not stop at nodes that are already dirty: a node that was
//! invalidated locally with [`Node::invalidate_data`] may still have clean
//! consumers.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::node::{Node, NodeId};

/// Invalidate `origin` and every node upstream of it.
///
/// Returns the consumers that were visited (the origin excluded), in
/// breadth-first order.
pub fn invalidate_upward(origin: &Node) -> Vec<NodeId> {
    origin.invalidate_data();

    let mut visited = HashSet::new();
    visited.insert(origin.id());

    let mut queue: VecDeque<_> = origin.parents().into();
    let mut invalidated = Vec::new();

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node.id()) {
            continue;
        }
        node.invalidate_data();
        invalidated.push(node.id());
        queue.extend(node.parents());
    }

    if !invalidated.is_empty() {
        debug!(
            origin = %origin.id(),
            consumers = invalidated.len(),
            "propagated invalidation"
        );
    }
    invalidated
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::graph::{Artifact, NodeRef, Slot};

    fn counting_node(kind: &'static str) -> (NodeRef, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let node = Node::from_fn(kind, move |cx| {
            counter.set(counter.get() + 1);
            let inputs: Vec<NodeRef> = cx.inputs().map(|(_, node)| Rc::clone(node)).collect();
            for input in inputs {
                input.get_updated_data()?;
            }
            Ok(Artifact::Empty)
        });
        (node, runs)
    }

    #[test]
    fn chain_propagates_to_every_consumer() {
        // leaf <- middle <- top
        let (leaf, _) = counting_node("Leaf");
        let (middle, _) = counting_node("Middle");
        let (top, top_runs) = counting_node("Top");
        middle.set_input(Slot::named("in"), &leaf).unwrap();
        top.set_input(Slot::named("in"), &middle).unwrap();

        top.get_updated_data().unwrap();
        assert!(!leaf.is_dirty() && !middle.is_dirty() && !top.is_dirty());

        let visited = leaf.invalidate();
        assert_eq!(visited, vec![middle.id(), top.id()]);
        assert!(leaf.is_dirty() && middle.is_dirty() && top.is_dirty());

        let (_, updated) = top.get_updated_data().unwrap();
        assert!(updated);
        assert_eq!(top_runs.get(), 2);
    }

    #[test]
    fn diamond_visits_consumer_once() {
        //      top
        //     /   \
        //   left  right
        //     \   /
        //     shared
        let (shared, shared_runs) = counting_node("Shared");
        let (left, _) = counting_node("Left");
        let (right, _) = counting_node("Right");
        let (top, top_runs) = counting_node("Top");
        left.set_input(Slot::named("in"), &shared).unwrap();
        right.set_input(Slot::named("in"), &shared).unwrap();
        top.set_input(Slot::named("l"), &left).unwrap();
        top.set_input(Slot::named("r"), &right).unwrap();

        top.get_updated_data().unwrap();
        assert_eq!(top_runs.get(), 1);
        assert_eq!(shared_runs.get(), 1);

        let visited = shared.invalidate();
        assert_eq!(visited.len(), 3);
        assert_eq!(visited.iter().filter(|id| **id == top.id()).count(), 1);

        let (_, updated) = top.get_updated_data().unwrap();
        assert!(updated);
        assert_eq!(top_runs.get(), 2);
        assert_eq!(shared_runs.get(), 2);

        let (_, updated) = top.get_updated_data().unwrap();
        assert!(!updated);
    }

    #[test]
    fn walk_continues_past_locally_dirty_nodes() {
        let (leaf, _) = counting_node("Leaf");
        let (middle, _) = counting_node("Middle");
        let (top, _) = counting_node("Top");
        middle.set_input(Slot::named("in"), &leaf).unwrap();
        top.set_input(Slot::named("in"), &middle).unwrap();
        top.get_updated_data().unwrap();

        middle.invalidate_data();
        assert!(!top.is_dirty());

        leaf.invalidate();
        assert!(top.is_dirty());
    }

    #[test]
    fn invalidating_a_root_touches_nothing_else() {
        let (leaf, _) = counting_node("Leaf");
        let (top, _) = counting_node("Top");
        top.set_input(Slot::named("in"), &leaf).unwrap();
        top.get_updated_data().unwrap();

        assert!(top.invalidate().is_empty());
        assert!(!leaf.is_dirty());
    }
}
