//! Walks through a state space.

use serde_json::{json, Value};

use super::graph::{NodeId, StateSpaceEdge, StateSpaceNode};
use crate::explore::EdgeWeight;

/// Ordered sequence of edges where each edge starts where the previous one
/// ended. Nodes may repeat. The empty path denotes "already at the target".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    edges: Vec<StateSpaceEdge>,
}

impl Path {
    pub fn new(edges: Vec<StateSpaceEdge>) -> Self {
        debug_assert!(edges
            .windows(2)
            .all(|pair| pair[0].target() == pair[1].source()));
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[StateSpaceEdge] {
        &self.edges
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StateSpaceEdge> {
        self.edges.iter()
    }

    pub fn start(&self) -> Option<&StateSpaceNode> {
        self.edges.first().map(StateSpaceEdge::source)
    }

    pub fn end(&self) -> Option<&StateSpaceNode> {
        self.edges.last().map(StateSpaceEdge::target)
    }

    /// Node ids visited, start included.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.start().map(StateSpaceNode::id).into_iter().collect();
        nodes.extend(self.edges.iter().map(|edge| edge.target().id()));
        nodes
    }

    /// True if no node is visited twice.
    pub fn is_simple(&self) -> bool {
        let nodes = self.nodes();
        let unique: std::collections::HashSet<_> = nodes.iter().collect();
        unique.len() == nodes.len()
    }

    /// The first `length` edges.
    pub fn prefix(&self, length: usize) -> Path {
        Path {
            edges: self.edges[..length.min(self.edges.len())].to_vec(),
        }
    }

    /// Concatenate two walks.
    pub fn join(&self, other: &Path) -> Path {
        let mut edges = self.edges.clone();
        edges.extend(other.edges.iter().cloned());
        Path::new(edges)
    }

    /// Accumulated weight, starting from zero.
    pub fn cost<W: EdgeWeight + ?Sized>(&self, weight: &W) -> f64 {
        self.edges
            .iter()
            .fold(0.0, |accumulated, edge| weight.weight(accumulated, edge))
    }

    /// `[{"src", "tar", "edges": [event ids]}, ...]`
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.edges
                .iter()
                .map(|edge| {
                    json!({
                        "src": edge.source().id(),
                        "tar": edge.target().id(),
                        "edges": edge.transitions().iter().map(|e| e.id()).collect::<Vec<_>>(),
                    })
                })
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a StateSpaceEdge;
    type IntoIter = std::slice::Iter<'a, StateSpaceEdge>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(start) = self.start() else {
            return write!(f, "[]");
        };
        write!(f, "{}", start.state())?;
        for edge in &self.edges {
            write!(f, " -> {}", edge.target().state())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{chain_space, expand_everything};

    #[test]
    fn test_path_accessors() {
        let (mut space, _) = chain_space();
        expand_everything(&mut space);
        let path = space.get_path(&[0, 2, 1]).unwrap();

        assert_eq!(path.nodes(), vec![0, 2, 1]);
        assert_eq!(path.start().map(|n| n.id()), Some(0));
        assert_eq!(path.end().map(|n| n.id()), Some(1));
        assert!(path.is_simple());
        assert_eq!(path.prefix(1).len(), 1);
        assert_eq!(path.prefix(1).join(&Path::new(path.edges()[1..].to_vec())), path);
        assert_eq!(path.cost(&|acc: f64, _: &StateSpaceEdge| acc + 1.5), 3.0);
        assert_eq!(path.to_string(), "{A} -> {B} -> {C}");
    }

    #[test]
    fn test_path_json() {
        let (mut space, _) = chain_space();
        expand_everything(&mut space);
        let path = space.get_path(&[0, 2]).unwrap();
        let value = path.to_json();
        assert_eq!(value[0]["src"], 0);
        assert_eq!(value[0]["tar"], 2);
        assert_eq!(value[0]["edges"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_empty_path() {
        let path = Path::default();
        assert!(path.nodes().is_empty());
        assert!(path.is_simple());
        assert_eq!(path.to_string(), "[]");
    }
}
