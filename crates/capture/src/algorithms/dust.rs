use geo::BoundingRect;
use phylo_common::Rect;
use tracing::debug;

use crate::{cancel::CancellationCheck, error::Result, types::Segment};

/// Removes small isolated clusters of segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DustFilter {
    max_distance: f64,
    min_extent: f64,
}

/// Segments joined by transitive proximity
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Indices into the filtered segment list, ascending
    pub members: Vec<usize>,
    /// `min(width, height)` of the bounding box
    pub score: f64,
}

impl DustFilter {
    pub fn new(max_distance: f64, min_extent: f64) -> Self {
        Self {
            max_distance,
            min_extent,
        }
    }

    fn near(&self, a: &Segment, a_box: &Rect, b: &Segment, b_box: &Rect) -> bool {
        let reach = self.max_distance.ceil() as i32;
        if !a_box.expand(reach).intersects(b_box) {
            return false;
        }
        let limit = self.max_distance * self.max_distance;
        a.points()
            .iter()
            .any(|&p| b.points().iter().any(|&q| p.distance_squared(q) as f64 <= limit))
    }

    /// Group segments into clusters; one segment may merge several clusters
    pub fn cluster(&self, segments: &[Segment], cancel: &dyn CancellationCheck) -> Result<Vec<Cluster>> {
        let boxes: Vec<Rect> = segments.iter().map(Segment::bounding_rect).collect();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            let mut merged = vec![i];
            let mut remaining = Vec::with_capacity(groups.len());
            for group in groups {
                cancel.check()?;
                let touches = group
                    .iter()
                    .any(|&j| self.near(segment, &boxes[i], &segments[j], &boxes[j]));
                if touches {
                    merged.extend(group);
                } else {
                    remaining.push(group);
                }
            }
            merged.sort_unstable();
            remaining.push(merged);
            groups = remaining;
        }

        Ok(groups
            .into_iter()
            .map(|members| {
                let score = extent(members.iter().map(|&i| &segments[i]));
                Cluster { members, score }
            })
            .collect())
    }

    /// Keep the clusters with the largest extents, never all dropped
    pub fn apply(&self, segments: &[Segment], cancel: &dyn CancellationCheck) -> Result<Vec<Segment>> {
        let mut clusters = self.cluster(segments, cancel)?;
        clusters.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut keep = vec![false; segments.len()];
        let mut kept_clusters = 0;
        for cluster in &clusters {
            if kept_clusters > 0 && cluster.score < self.min_extent {
                break;
            }
            for &i in &cluster.members {
                keep[i] = true;
            }
            kept_clusters += 1;
        }

        debug!(
            clusters = clusters.len(),
            kept_clusters,
            "dust removal finished"
        );
        Ok(segments
            .iter()
            .zip(keep)
            .filter_map(|(s, k)| k.then(|| s.clone()))
            .collect())
    }
}

/// Smaller side of the bounding box of all segment points
pub fn extent<'a>(segments: impl Iterator<Item = &'a Segment>) -> f64 {
    let lines: geo::MultiLineString<f64> = segments.map(Segment::to_line_string).collect();
    lines
        .bounding_rect()
        .map(|r| r.width().min(r.height()))
        .unwrap_or(0.0)
}
