//! # Graph Resolution
//!
//! Generic traversal primitives over a [`GraphSnapshot`]: incomers via a
//! handle, outgoing operation chains, and transitive ancestors.
//!
//! Dangling edges (endpoints missing from the snapshot) resolve to empty
//! result sets; traversal never panics on malformed graphs. Cyclic graphs
//! are handled with visited sets.

use crate::graph::{GraphSnapshot, Handle, Node};
use std::collections::HashSet;

impl GraphSnapshot {
    /// Nodes with an edge into `node_id`'s `handle` port, in edge order.
    pub fn incomers(&self, node_id: &str, handle: Handle) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|e| e.target == node_id && e.target_handle == handle)
            .filter_map(|e| self.node(&e.source))
            .collect()
    }

    /// Nodes reachable by one outgoing edge from `node_id`, any handle.
    pub fn outgoers_any(&self, node_id: &str) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|e| e.source == node_id)
            .filter_map(|e| self.node(&e.target))
            .collect()
    }

    /// The downstream chain hanging off `start`'s `first_handle` port.
    ///
    /// The first hop leaves via `first_handle`; every further hop follows
    /// `source -> input` edges, which is how operation nodes chain. Nodes
    /// appear in traversal (edge) order, each at most once.
    pub fn outgoing_chain(&self, start: &str, first_handle: Handle) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(start.to_string());
        self.walk_chain(start, first_handle, &mut seen, &mut out);
        out
    }

    fn walk_chain<'a>(
        &'a self,
        from: &str,
        handle: Handle,
        seen: &mut HashSet<String>,
        out: &mut Vec<&'a Node>,
    ) {
        let hops: Vec<&str> = self
            .edges
            .iter()
            .filter(|e| {
                e.source == from && e.source_handle == handle && e.target_handle == Handle::Input
            })
            .map(|e| e.target.as_str())
            .collect();

        for target in hops {
            let Some(node) = self.node(target) else {
                tracing::debug!("[PGC] Skipping dangling edge target: {}", target);
                continue;
            };
            if !seen.insert(node.id.clone()) {
                continue;
            }
            out.push(node);
            self.walk_chain(&node.id, Handle::Source, seen, out);
        }
    }

    /// All transitive ancestors of `node_id` via repeated incomer resolution,
    /// any handle. Cycle-safe; `node_id` itself is excluded.
    pub fn ancestors(&self, node_id: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(node_id.to_string());
        let mut stack = vec![node_id.to_string()];

        while let Some(current) = stack.pop() {
            for edge in self.edges.iter().filter(|e| e.target == current) {
                let Some(node) = self.node(&edge.source) else {
                    continue;
                };
                if seen.insert(node.id.clone()) {
                    out.push(node);
                    stack.push(node.id.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, NodeData, OperationData, TransitionData};

    fn op(id: &str) -> Node {
        Node::new(id, NodeData::Operation(OperationData::default()))
    }

    fn chain_snapshot() -> GraphSnapshot {
        GraphSnapshot::new(
            vec![
                Node::new("t", NodeData::Transition(TransitionData::default())),
                op("a"),
                op("b"),
                op("c"),
            ],
            vec![
                Edge::new("e1", "t", Handle::Source, "a", Handle::Input),
                Edge::new("e2", "a", Handle::Source, "b", Handle::Input),
                Edge::new("e3", "b", Handle::Source, "c", Handle::Input),
            ],
        )
    }

    #[test]
    fn chain_follows_edge_order() {
        let snapshot = chain_snapshot();
        let ids: Vec<&str> = snapshot
            .outgoing_chain("t", Handle::Source)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn dangling_edges_resolve_to_nothing() {
        let snapshot = GraphSnapshot::new(
            vec![op("a")],
            vec![
                Edge::new("e1", "a", Handle::Source, "ghost", Handle::Input),
                Edge::new("e2", "ghost", Handle::Source, "a", Handle::Input),
            ],
        );
        assert!(snapshot.outgoing_chain("a", Handle::Source).is_empty());
        assert!(snapshot.incomers("a", Handle::Input).is_empty());
        assert!(snapshot.ancestors("a").is_empty());
    }

    #[test]
    fn cyclic_chain_terminates() {
        let snapshot = GraphSnapshot::new(
            vec![op("a"), op("b")],
            vec![
                Edge::new("e1", "a", Handle::Source, "b", Handle::Input),
                Edge::new("e2", "b", Handle::Source, "a", Handle::Input),
            ],
        );
        let ids: Vec<&str> = snapshot
            .outgoing_chain("a", Handle::Source)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn ancestors_are_transitive_and_cycle_safe() {
        let mut snapshot = chain_snapshot();
        // close the loop: c feeds back into a
        snapshot
            .edges
            .push(Edge::new("e4", "c", Handle::Source, "a", Handle::Input));
        let mut ids: Vec<&str> = snapshot.ancestors("c").iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b", "t"]);
    }

    #[test]
    fn incomers_filter_by_target_handle() {
        let snapshot = GraphSnapshot::new(
            vec![op("a"), op("b"), op("x")],
            vec![
                Edge::new("e1", "a", Handle::Source, "x", Handle::Function),
                Edge::new("e2", "b", Handle::Source, "x", Handle::Serialiser),
            ],
        );
        let via_function: Vec<&str> = snapshot
            .incomers("x", Handle::Function)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(via_function, vec!["a"]);
        assert!(snapshot.incomers("x", Handle::Deserialiser).is_empty());
    }
}
