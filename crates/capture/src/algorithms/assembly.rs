//! Root-based assembly of the output graph.
//!
//! Segments are oriented away from the declared root and turned into edges
//! growing outwards from nodes the root already reaches. The resulting leaves
//! are paired with recognized words.

use geo::ClosestPoint;
use phylo_common::{EdgeId, Graph, NodeId, Point, Word};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::Result,
    types::{RootSide, Segment},
};

/// Existing nodes closer than this are reused
pub const NODE_SNAP_DISTANCE: f64 = 3.0;

/// Segment ends closer than this to the root attach to the root node
pub const ROOT_ATTACH_DISTANCE: f64 = 5.0;

/// Segments passing closer than this are split at the root
pub const ROOT_SPLIT_DISTANCE: f64 = 9.0;

/// Slack of the side-dependent word admissibility test
pub const LABEL_SLACK: i32 = 4;

/// A leaf and the index of the word that labels it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelAssignment {
    pub node: NodeId,
    pub word: usize,
}

/// What one assembly run added to the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assembly {
    pub root: NodeId,
    pub side: RootSide,
    pub new_nodes: Vec<NodeId>,
    pub new_edges: Vec<EdgeId>,
    pub labels: Vec<LabelAssignment>,
    /// Indices of words no leaf claimed and that were not rescued
    pub unmatched_words: Vec<usize>,
}

/// Side the tree grows away from, by majority of first segment points
pub fn root_side(root: Point, segments: &[Segment]) -> RootSide {
    let (mut right, mut left, mut below, mut above) = (0usize, 0usize, 0usize, 0usize);
    for s in segments {
        let p = s.first();
        if p.x > root.x {
            right += 1;
        } else if p.x < root.x {
            left += 1;
        }
        if p.y > root.y {
            below += 1;
        } else if p.y < root.y {
            above += 1;
        }
    }
    let counts = [
        (right, RootSide::Left),
        (left, RootSide::Right),
        (below, RootSide::Top),
        (above, RootSide::Bottom),
    ];
    let best = counts.iter().map(|(c, _)| *c).max().unwrap_or(0);
    let mut winners = counts.iter().filter(|(c, _)| *c == best);
    match (winners.next(), winners.next()) {
        (Some(&(count, side)), None) if count > 0 => side,
        _ => RootSide::Center,
    }
}

/// Distance to the root under the metric of `side`
pub fn side_distance(side: RootSide, root: Point, p: Point) -> f64 {
    match side {
        RootSide::Left | RootSide::Right => (p.x - root.x).abs() as f64,
        RootSide::Top | RootSide::Bottom => (p.y - root.y).abs() as f64,
        RootSide::Center => p.distance_to(root),
    }
}

fn closest_on_line(a: Point, b: Point, p: Point) -> (f64, Point) {
    let line = geo::Line::new(a, b);
    let q = match line.closest_point(&p.into()) {
        geo::Closest::Intersection(q) | geo::Closest::SinglePoint(q) => q,
        geo::Closest::Indeterminate => a.into(),
    };
    let q = Point::new(q.x().round() as i32, q.y().round() as i32);
    (q.distance_to(p), q)
}

fn push_distinct(points: &mut Vec<Point>, p: Point) {
    if points.last() != Some(&p) {
        points.push(p);
    }
}

/// Split the segment passing closest to `root`, pinning both halves to it
fn split_at_root(segments: &mut Vec<Segment>, root: Point) -> Result<bool> {
    let mut best: Option<(f64, usize, usize, Point)> = None;
    for (k, s) in segments.iter().enumerate() {
        for (i, pair) in s.points().windows(2).enumerate() {
            let (d, q) = closest_on_line(pair[0], pair[1], root);
            if best.is_none_or(|(bd, ..)| d < bd) {
                best = Some((d, k, i, q));
            }
        }
    }
    let Some((d, k, i, q)) = best else {
        return Ok(false);
    };
    if d > ROOT_SPLIT_DISTANCE {
        return Ok(false);
    }

    let points = segments[k].points().to_vec();
    let mut head = Vec::with_capacity(i + 3);
    for &p in &points[..=i] {
        push_distinct(&mut head, p);
    }
    push_distinct(&mut head, q);
    push_distinct(&mut head, root);

    let mut tail = vec![root];
    push_distinct(&mut tail, q);
    for &p in &points[i + 1..] {
        push_distinct(&mut tail, p);
    }

    debug!(distance = d, segment = k, "splitting segment at the root");
    segments[k] = Segment::new(head)?;
    segments.insert(k + 1, Segment::new(tail)?);
    Ok(true)
}

/// Builds a rooted, labelled graph from dusted segments and words
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhylogenyAssembler {
    pub rescue_unmatched_words: bool,
}

impl PhylogenyAssembler {
    pub fn new(rescue_unmatched_words: bool) -> Self {
        Self {
            rescue_unmatched_words,
        }
    }

    /// Assemble into a fresh graph
    pub fn assemble(&self, root: Point, segments: &[Segment], words: &[Word]) -> Result<(Graph, Assembly)> {
        let mut graph = Graph::new();
        let assembly = self.assemble_into(&mut graph, root, segments, words)?;
        Ok((graph, assembly))
    }

    /// Add nodes and edges to `graph`; returns what was added
    pub fn assemble_into(
        &self,
        graph: &mut Graph,
        root: Point,
        segments: &[Segment],
        words: &[Word],
    ) -> Result<Assembly> {
        let side = root_side(root, segments);
        let mut new_nodes = Vec::new();

        let root_node = match graph.nearest_node(root, NODE_SNAP_DISTANCE) {
            Some(id) => id,
            None => {
                let id = graph.add_node(root);
                new_nodes.push(id);
                id
            }
        };

        let mut segments = segments.to_vec();
        let attached = segments.iter().any(|s| {
            s.first().distance_to(root) <= ROOT_ATTACH_DISTANCE || s.last().distance_to(root) <= ROOT_ATTACH_DISTANCE
        });
        if !attached && !split_at_root(&mut segments, root)? && !segments.is_empty() {
            warn!(x = root.x, y = root.y, "root is not attached to any segment");
        }

        // side metric first, plain distance to the root breaks ties
        let distance = |p: Point| {
            if p.distance_to(root) <= ROOT_ATTACH_DISTANCE {
                (0.0, 0.0)
            } else {
                (side_distance(side, root, p), p.distance_to(root))
            }
        };
        let closer = |a: (f64, f64), b: (f64, f64)| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1));
        let mut pending: Vec<((f64, f64), Segment)> = segments
            .into_iter()
            .map(|mut s| {
                let (d_first, d_last) = (distance(s.first()), distance(s.last()));
                if closer(d_last, d_first).is_lt() {
                    s.reverse();
                    (d_last, s)
                } else {
                    (d_first, s)
                }
            })
            .collect();
        pending.sort_by(|a, b| closer(a.0, b.0));

        // edges grow outwards from nodes the root already reaches
        let mut reached = vec![root_node];
        let mut new_edges = Vec::new();
        while !pending.is_empty() {
            let known: &Graph = graph;
            let reaches = |p: Point| existing_node(known, root_node, root, p).is_some_and(|id| reached.contains(&id));
            let index = match pending.iter().position(|(_, s)| reaches(s.first()) || reaches(s.last())) {
                Some(index) => index,
                None => {
                    debug!(remaining = pending.len(), "segments not connected to the root");
                    0
                }
            };
            let (_, mut segment) = pending.remove(index);
            if !reaches(segment.first()) && reaches(segment.last()) {
                segment.reverse();
            }

            let source = node_for(graph, &mut new_nodes, root_node, root, segment.first());
            let target = node_for(graph, &mut new_nodes, root_node, root, segment.last());
            if source == target {
                debug!(node = %source, "skipping closed loop segment");
                continue;
            }
            for id in [source, target] {
                if !reached.contains(&id) {
                    reached.push(id);
                }
            }
            new_edges.push(graph.add_edge(source, target, segment.into_points())?);
        }

        let leaves: Vec<NodeId> = new_nodes
            .iter()
            .copied()
            .filter(|&id| id != root_node && graph.out_degree(id) == 0)
            .collect();

        let (mut labels, unmatched) = match_labels(graph, side, root, &leaves, words);
        for assignment in &labels {
            graph.set_label(assignment.node, words[assignment.word].text.clone())?;
        }

        let mut unmatched_words = Vec::new();
        for index in unmatched {
            if self.rescue_unmatched_words {
                let word = &words[index];
                let id = graph.add_labelled_node(rescue_position(side, root, word), word.text.clone());
                new_nodes.push(id);
                labels.push(LabelAssignment { node: id, word: index });
            } else {
                unmatched_words.push(index);
            }
        }

        debug!(
            ?side,
            nodes = new_nodes.len(),
            edges = new_edges.len(),
            labels = labels.len(),
            unmatched = unmatched_words.len(),
            "assembly finished"
        );
        Ok(Assembly {
            root: root_node,
            side,
            new_nodes,
            new_edges,
            labels,
            unmatched_words,
        })
    }
}

/// Node an end would snap to, without creating one
fn existing_node(graph: &Graph, root_node: NodeId, root: Point, p: Point) -> Option<NodeId> {
    if p.distance_to(root) <= ROOT_ATTACH_DISTANCE {
        return Some(root_node);
    }
    graph.nearest_node(p, NODE_SNAP_DISTANCE)
}

fn node_for(graph: &mut Graph, new_nodes: &mut Vec<NodeId>, root_node: NodeId, root: Point, p: Point) -> NodeId {
    if p.distance_to(root) <= ROOT_ATTACH_DISTANCE {
        return root_node;
    }
    if let Some(id) = graph.nearest_node(p, NODE_SNAP_DISTANCE) {
        return id;
    }
    let id = graph.add_node(p);
    new_nodes.push(id);
    id
}

/// Whether `word` may label a leaf at `leaf` for a tree growing away from `side`
pub fn admissible(side: RootSide, root: Point, leaf: Point, word: &Word) -> bool {
    let r = &word.rect;
    let s = LABEL_SLACK;
    let beside = leaf.y >= r.y - s && leaf.y <= r.bottom() + s;
    let stacked = leaf.x >= r.x - s && leaf.x <= r.right() + s;
    match side {
        RootSide::Left => r.x >= leaf.x - s && beside,
        RootSide::Right => r.right() <= leaf.x + s && beside,
        RootSide::Top => r.y >= leaf.y - s && stacked,
        RootSide::Bottom => r.bottom() <= leaf.y + s && stacked,
        RootSide::Center => {
            let (cx, cy) = r.center();
            let word_distance = ((cx - root.x as f64).powi(2) + (cy - root.y as f64).powi(2)).sqrt();
            word_distance >= leaf.distance_to(root) - s as f64
        }
    }
}

/// Greedy nearest admissible pairing of leaves and words
fn match_labels(
    graph: &Graph,
    side: RootSide,
    root: Point,
    leaves: &[NodeId],
    words: &[Word],
) -> (Vec<LabelAssignment>, Vec<usize>) {
    let positions: Vec<(NodeId, Point)> = leaves
        .iter()
        .filter_map(|&id| graph.node(id).map(|n| (id, n.position)))
        .collect();
    let mut open_leaves: Vec<bool> = vec![true; positions.len()];
    let mut open_words: Vec<bool> = vec![true; words.len()];
    let mut labels = Vec::new();

    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for (li, &(_, leaf)) in positions.iter().enumerate() {
            if !open_leaves[li] {
                continue;
            }
            for (wi, word) in words.iter().enumerate() {
                if !open_words[wi] || !admissible(side, root, leaf, word) {
                    continue;
                }
                let d = word.rect.distance_to(leaf);
                if best.is_none_or(|(bd, ..)| d < bd) {
                    best = Some((d, li, wi));
                }
            }
        }
        let Some((_, li, wi)) = best else {
            break;
        };
        open_leaves[li] = false;
        open_words[wi] = false;
        labels.push(LabelAssignment {
            node: positions[li].0,
            word: wi,
        });
    }

    let unmatched = (0..words.len()).filter(|&i| open_words[i]).collect();
    (labels, unmatched)
}

/// Middle of the word box edge facing the root
fn rescue_position(side: RootSide, root: Point, word: &Word) -> Point {
    let r = &word.rect;
    let (cx, cy) = r.center();
    let (cx, cy) = (cx.floor() as i32, cy.floor() as i32);
    match side {
        RootSide::Left => Point::new(r.x - 1, cy),
        RootSide::Right => Point::new(r.right(), cy),
        RootSide::Top => Point::new(cx, r.y - 1),
        RootSide::Bottom => Point::new(cx, r.bottom()),
        RootSide::Center => r.closest_pixel(root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylo_common::Rect;

    fn seg(points: &[(i32, i32)]) -> Segment {
        Segment::new(points.iter().map(|&p| p.into()).collect()).unwrap()
    }

    /// Root stub, junction at (50, 50), two leaves to the right
    fn cladogram() -> Vec<Segment> {
        vec![
            seg(&[(50, 50), (30, 50), (10, 50)]),
            seg(&[(90, 30), (70, 30), (50, 30), (50, 50)]),
            seg(&[(50, 50), (50, 70), (70, 70), (90, 70)]),
        ]
    }

    fn word(text: &str, x: i32, y: i32) -> Word {
        Word::new(text, 0.9, Rect::new(x, y, 30, 10).unwrap())
    }

    #[test]
    fn test_root_side_majority() {
        let segments = cladogram();
        assert_eq!(root_side(Point::new(8, 50), &segments), RootSide::Left);
        assert_eq!(root_side(Point::new(95, 50), &segments), RootSide::Right);
        assert_eq!(root_side(Point::new(50, 50), &[]), RootSide::Center);
    }

    #[test]
    fn test_root_side_vertical_votes() {
        let downwards = vec![
            seg(&[(50, 10), (50, 40)]),
            seg(&[(30, 40), (30, 80)]),
            seg(&[(70, 40), (70, 80)]),
        ];
        assert_eq!(root_side(Point::new(50, 10), &downwards), RootSide::Top);

        let upwards = vec![
            seg(&[(50, 90), (50, 60)]),
            seg(&[(30, 60), (30, 20)]),
            seg(&[(70, 60), (70, 20)]),
        ];
        assert_eq!(root_side(Point::new(50, 90), &upwards), RootSide::Bottom);

        let tied = vec![seg(&[(60, 50), (90, 50)]), seg(&[(50, 60), (50, 90)])];
        assert_eq!(root_side(Point::new(50, 50), &tied), RootSide::Center);
    }

    /// Every node but the root has exactly one parent and edges end at their target
    fn assert_rooted_tree(graph: &Graph, root: NodeId) {
        assert_eq!(graph.in_degree(root), 0);
        assert_eq!(graph.edge_count() + 1, graph.node_count());
        for node in graph.nodes().iter().filter(|n| n.id != root) {
            assert_eq!(graph.in_degree(node.id), 1, "node at {:?}", node.position);
        }
        for edge in graph.edges() {
            assert_eq!(edge.polyline.last(), Some(&graph.node(edge.target).unwrap().position));
        }
    }

    #[test]
    fn test_three_segments_make_a_rooted_tree() {
        let assembler = PhylogenyAssembler::default();
        let (graph, assembly) = assembler.assemble(Point::new(8, 50), &cladogram(), &[]).unwrap();

        assert_eq!(assembly.side, RootSide::Left);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);

        let root = assembly.root;
        assert_eq!(graph.in_degree(root), 0);
        assert_eq!(graph.out_degree(root), 1);

        let internal: Vec<NodeId> = graph
            .nodes()
            .iter()
            .map(|n| n.id)
            .filter(|&id| graph.in_degree(id) == 1 && graph.out_degree(id) == 2)
            .collect();
        assert_eq!(internal.len(), 1);
        assert_eq!(graph.node(internal[0]).unwrap().position, Point::new(50, 50));
        assert_eq!(graph.leaves().len(), 2);

        for edge in graph.edges() {
            let source = graph.node(edge.source).unwrap().position;
            let target = graph.node(edge.target).unwrap().position;
            assert!(source.x < target.x, "edge {} points towards the root", edge.id);
            assert_eq!(edge.polyline.last(), Some(&target));
        }
    }

    #[test]
    fn test_words_label_the_nearest_admissible_leaf() {
        let words = vec![word("Pan", 95, 65), word("Homo", 95, 25)];
        let (graph, assembly) = PhylogenyAssembler::default()
            .assemble(Point::new(10, 50), &cladogram(), &words)
            .unwrap();

        assert_eq!(assembly.labels.len(), 2);
        assert!(assembly.unmatched_words.is_empty());
        let label_at = |p: Point| {
            let id = graph.nearest_node(p, 1.0).unwrap();
            graph.node(id).unwrap().label.clone()
        };
        assert_eq!(label_at(Point::new(90, 30)).as_deref(), Some("Homo"));
        assert_eq!(label_at(Point::new(90, 70)).as_deref(), Some("Pan"));
    }

    #[test]
    fn test_words_behind_the_leaves_are_not_admissible() {
        let words = vec![word("left of leaf", 20, 25)];
        let (_, assembly) = PhylogenyAssembler::default()
            .assemble(Point::new(10, 50), &cladogram(), &words)
            .unwrap();
        assert!(assembly.labels.is_empty());
        assert_eq!(assembly.unmatched_words, vec![0]);
    }

    #[test]
    fn test_rescue_unmatched_word() {
        let words = vec![word("Homo", 95, 25), word("Gorilla", 95, 100)];
        let (graph, assembly) = PhylogenyAssembler::new(true)
            .assemble(Point::new(10, 50), &cladogram(), &words)
            .unwrap();
        assert!(assembly.unmatched_words.is_empty());
        assert_eq!(assembly.labels.len(), 2);
        let rescued = graph.node(assembly.labels[1].node).unwrap();
        assert_eq!(rescued.position, Point::new(94, 105));
        assert_eq!(rescued.label.as_deref(), Some("Gorilla"));
        assert_eq!(graph.in_degree(rescued.id), 0);
    }

    #[test]
    fn test_root_on_segment_interior_splits_it() {
        let segments = vec![seg(&[(0, 50), (100, 50)])];
        let (graph, assembly) = PhylogenyAssembler::default()
            .assemble(Point::new(50, 56), &segments, &[])
            .unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.out_degree(assembly.root), 2);
        for edge in graph.edges() {
            assert_eq!(edge.source, assembly.root);
            assert_eq!(edge.polyline[0], Point::new(50, 56));
            assert_eq!(edge.polyline[1], Point::new(50, 50));
        }
    }

    #[test]
    fn test_vertical_spine_is_oriented_away_from_the_root() {
        // rake: spine at x = 50, four leaves, stem from the left
        let segments = vec![
            seg(&[(50, 50), (30, 50), (10, 50)]),
            seg(&[(50, 40), (50, 45), (50, 50)]),
            seg(&[(50, 60), (50, 55), (50, 50)]),
            seg(&[(90, 20), (50, 20), (50, 40)]),
            seg(&[(50, 40), (90, 40)]),
            seg(&[(90, 60), (50, 60)]),
            seg(&[(50, 60), (50, 80), (90, 80)]),
        ];
        let (graph, assembly) = PhylogenyAssembler::default()
            .assemble(Point::new(10, 50), &segments, &[])
            .unwrap();

        assert_eq!(assembly.side, RootSide::Left);
        assert_eq!(graph.node_count(), 8);
        assert_rooted_tree(&graph, assembly.root);
        assert_eq!(graph.leaves().len(), 4);
        for y in [40, 60] {
            let id = graph.nearest_node(Point::new(50, y), 1.0).unwrap();
            let parent = graph.edges().iter().find(|e| e.target == id).unwrap().source;
            assert_eq!(graph.node(parent).unwrap().position, Point::new(50, 50));
        }
    }

    #[test]
    fn test_fully_tied_segment_follows_the_reached_end() {
        // both spine ends lie equally far from the root; the stem reaches (50, 55)
        let segments = vec![
            seg(&[(10, 50), (30, 50), (30, 55), (50, 55)]),
            seg(&[(50, 45), (50, 55)]),
            seg(&[(50, 45), (90, 45)]),
            seg(&[(50, 55), (90, 55)]),
        ];
        let (graph, assembly) = PhylogenyAssembler::default()
            .assemble(Point::new(10, 50), &segments, &[])
            .unwrap();

        assert_rooted_tree(&graph, assembly.root);
        let spine = graph
            .edges()
            .iter()
            .find(|e| e.polyline.len() == 2 && e.polyline.iter().all(|p| p.x == 50))
            .unwrap();
        assert_eq!(spine.polyline, vec![Point::new(50, 55), Point::new(50, 45)]);
        assert_eq!(graph.leaves().len(), 2);
    }

    #[test]
    fn test_top_rooted_tree_takes_labels_below_its_leaves() {
        let segments = vec![
            seg(&[(50, 10), (50, 40)]),
            seg(&[(50, 40), (30, 40), (30, 80)]),
            seg(&[(70, 80), (70, 40), (50, 40)]),
        ];
        let words = vec![word("Pan", 55, 85), word("Homo", 15, 85), word("Above", 15, 50)];
        let (graph, assembly) = PhylogenyAssembler::default()
            .assemble(Point::new(50, 8), &segments, &words)
            .unwrap();

        assert_eq!(assembly.side, RootSide::Top);
        assert_rooted_tree(&graph, assembly.root);
        let label_at = |p: Point| graph.node(graph.nearest_node(p, 1.0).unwrap()).unwrap().label.clone();
        assert_eq!(label_at(Point::new(30, 80)).as_deref(), Some("Homo"));
        assert_eq!(label_at(Point::new(70, 80)).as_deref(), Some("Pan"));
        assert_eq!(assembly.unmatched_words, vec![2]);
    }

    #[test]
    fn test_right_rooted_tree_labels_and_rescue() {
        // the cladogram mirrored, growing leftwards
        let segments = vec![
            seg(&[(90, 50), (110, 50), (130, 50)]),
            seg(&[(50, 30), (70, 30), (90, 30), (90, 50)]),
            seg(&[(90, 50), (90, 70), (70, 70), (50, 70)]),
        ];
        let words = vec![word("Homo", 15, 25), word("Pan", 15, 65), word("Gorilla", 15, 100)];
        let (graph, assembly) = PhylogenyAssembler::new(true)
            .assemble(Point::new(132, 50), &segments, &words)
            .unwrap();

        assert_eq!(assembly.side, RootSide::Right);
        let label_at = |p: Point| graph.node(graph.nearest_node(p, 1.0).unwrap()).unwrap().label.clone();
        assert_eq!(label_at(Point::new(50, 30)).as_deref(), Some("Homo"));
        assert_eq!(label_at(Point::new(50, 70)).as_deref(), Some("Pan"));

        let rescued = graph.node(assembly.labels[2].node).unwrap();
        assert_eq!(rescued.label.as_deref(), Some("Gorilla"));
        assert_eq!(rescued.position, Point::new(45, 105));
        for edge in graph.edges() {
            let source = graph.node(edge.source).unwrap().position;
            let target = graph.node(edge.target).unwrap().position;
            assert!(source.x > target.x, "edge {} points towards the root", edge.id);
        }
    }

    #[test]
    fn test_center_rooted_tree_labels_outside_the_leaf_radius() {
        let segments = vec![seg(&[(50, 50), (80, 50)]), seg(&[(50, 50), (50, 80)])];
        let words = vec![word("East", 84, 45), word("South", 35, 84), word("Inner", 52, 52)];
        let (graph, assembly) = PhylogenyAssembler::new(true)
            .assemble(Point::new(50, 50), &segments, &words)
            .unwrap();

        assert_eq!(assembly.side, RootSide::Center);
        let label_at = |p: Point| graph.node(graph.nearest_node(p, 1.0).unwrap()).unwrap().label.clone();
        assert_eq!(label_at(Point::new(80, 50)).as_deref(), Some("East"));
        assert_eq!(label_at(Point::new(50, 80)).as_deref(), Some("South"));

        // closer to the root than either leaf, rescued at the box pixel nearest the root
        let rescued = graph.node(assembly.labels[2].node).unwrap();
        assert_eq!(rescued.label.as_deref(), Some("Inner"));
        assert_eq!(rescued.position, Point::new(52, 52));
    }
}
