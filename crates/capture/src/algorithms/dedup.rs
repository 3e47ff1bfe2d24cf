use geo::EuclideanDistance;
use phylo_common::Point;

use crate::types::Segment;

/// Distance from `p` to the polyline through `points`
pub fn distance_to_polyline(p: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => p.distance_to(*single),
        _ => {
            let line: geo::LineString<f64> = points.iter().copied().collect();
            geo::Point::from(p).euclidean_distance(&line)
        }
    }
}

/// Decides whether two traced segments follow the same physical path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentDeduplicator {
    tolerance: f64,
}

impl SegmentDeduplicator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Ends pair up in either orientation and every vertex lies near the other polyline
    pub fn is_same_path(&self, a: &Segment, b: &Segment) -> bool {
        let close = |p: Point, q: Point| p.distance_to(q) <= self.tolerance;
        let ends_match = (close(a.first(), b.first()) && close(a.last(), b.last()))
            || (close(a.first(), b.last()) && close(a.last(), b.first()));
        if !ends_match {
            return false;
        }
        let covers = |from: &Segment, onto: &Segment| {
            from.points()
                .iter()
                .all(|&p| distance_to_polyline(p, onto.points()) <= self.tolerance)
        };
        covers(a, b) && covers(b, a)
    }

    /// Append `candidate` unless an existing segment is the same path
    pub fn push_unique(&self, segments: &mut Vec<Segment>, candidate: Segment) -> bool {
        if segments.iter().any(|s| self.is_same_path(s, &candidate)) {
            return false;
        }
        segments.push(candidate);
        true
    }

    /// Keep the first of every group of same-path segments
    pub fn dedup(&self, segments: Vec<Segment>) -> Vec<Segment> {
        let mut kept = Vec::with_capacity(segments.len());
        for segment in segments {
            self.push_unique(&mut kept, segment);
        }
        kept
    }
}
