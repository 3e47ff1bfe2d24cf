//! Directed graph of positioned nodes joined by polyline edges.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{CommonError, Point, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Directed edge; `polyline` runs from the source position to the target position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub polyline: Vec<Point>,
}

/// Node/edge arena; ids are indices and are never reused
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, position: Point) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            position,
            label: None,
        });
        id
    }

    pub fn add_labelled_node(&mut self, position: Point, label: impl Into<String>) -> NodeId {
        let id = self.add_node(position);
        self.nodes[id.0].label = Some(label.into());
        id
    }

    /// Add a directed edge; both endpoints must already exist
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, polyline: Vec<Point>) -> Result<EdgeId> {
        for id in [source, target] {
            if self.node(id).is_none() {
                return Err(CommonError::UnknownNode(id));
            }
        }
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            id,
            source,
            target,
            polyline,
        });
        Ok(id)
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> Result<()> {
        let node = self.nodes.get_mut(id.0).ok_or(CommonError::UnknownNode(id))?;
        node.label = Some(label.into());
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.edges.iter().filter(|e| e.source == id).count()
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.edges.iter().filter(|e| e.target == id).count()
    }

    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Node closest to `position` within `max_distance`, earliest id on ties
    pub fn nearest_node(&self, position: Point, max_distance: f64) -> Option<NodeId> {
        let mut best: Option<(f64, NodeId)> = None;
        for node in &self.nodes {
            let d = node.position.distance_to(position);
            if d > max_distance {
                continue;
            }
            if best.is_none_or(|(bd, _)| d < bd) {
                best = Some((d, node.id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Nodes with incoming edges and no outgoing ones
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .filter(|&id| self.out_degree(id) == 0 && self.in_degree(id) > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Graph, NodeId, NodeId, NodeId) {
        let mut graph = Graph::new();
        let root = graph.add_node(Point::new(0, 10));
        let a = graph.add_node(Point::new(20, 0));
        let b = graph.add_node(Point::new(20, 20));
        graph.add_edge(root, a, vec![Point::new(0, 10), Point::new(20, 0)]).unwrap();
        graph.add_edge(root, b, vec![Point::new(0, 10), Point::new(20, 20)]).unwrap();
        (graph, root, a, b)
    }

    #[test]
    fn test_degrees_and_leaves() {
        let (graph, root, a, b) = sample();
        assert_eq!(graph.out_degree(root), 2);
        assert_eq!(graph.in_degree(root), 0);
        assert_eq!(graph.in_degree(a), 1);
        assert_eq!(graph.leaves(), vec![a, b]);
        assert_eq!(graph.outgoing(root).count(), 2);
    }

    #[test]
    fn test_edge_to_unknown_node() {
        let (mut graph, root, _, _) = sample();
        let err = graph.add_edge(root, NodeId(42), Vec::new()).unwrap_err();
        assert_eq!(err, CommonError::UnknownNode(NodeId(42)));
        assert!(graph.set_label(NodeId(7), "x").is_err());
    }

    #[test]
    fn test_nearest_node() {
        let (graph, root, a, _) = sample();
        assert_eq!(graph.nearest_node(Point::new(1, 10), 3.0), Some(root));
        assert_eq!(graph.nearest_node(Point::new(19, 1), 3.0), Some(a));
        assert_eq!(graph.nearest_node(Point::new(50, 50), 3.0), None);
    }

    #[test]
    fn test_json_shape() {
        let (mut graph, _, a, _) = sample();
        graph.set_label(a, "Homo").unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"][1]["label"], "Homo");
        assert_eq!(json["edges"][0]["source"], 0);
        assert!(json["nodes"][0].get("label").is_none());
    }
}
