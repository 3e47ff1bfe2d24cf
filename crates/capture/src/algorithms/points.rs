use phylo_common::Point;

use crate::{algorithms::skeleton::NEIGH_OFFSETS, types::BinaryMatrix};

/// Chebyshev ring of radius 2, walked clockwise from the top-left corner
const RING2_OFFSETS: [(i32, i32); 16] = [
    (-2, -2),
    (-1, -2),
    (0, -2),
    (1, -2),
    (2, -2),
    (2, -1),
    (2, 0),
    (2, 1),
    (2, 2),
    (1, 2),
    (0, 2),
    (-1, 2),
    (-2, 2),
    (-2, 1),
    (-2, 0),
    (-2, -1),
];

/// Foreground pixels with exactly one foreground neighbour, row-major
pub fn detect_end_points(matrix: &BinaryMatrix) -> Vec<Point> {
    matrix
        .foreground()
        .filter(|p| {
            NEIGH_OFFSETS
                .iter()
                .filter(|&&(dx, dy)| matrix.get(p.x + dx, p.y + dy))
                .count()
                == 1
        })
        .collect()
}

/// Number of 8-connected groups among the foreground cells of the radius-2 ring
fn ring_branches(matrix: &BinaryMatrix, p: Point) -> usize {
    let cells: Vec<Point> = RING2_OFFSETS
        .iter()
        .map(|&(dx, dy)| p.offset(dx, dy))
        .filter(|&c| matrix.is_set(c))
        .collect();

    let mut group = vec![usize::MAX; cells.len()];
    let mut groups = 0;
    for start in 0..cells.len() {
        if group[start] != usize::MAX {
            continue;
        }
        group[start] = groups;
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            for j in 0..cells.len() {
                if group[j] == usize::MAX && cells[i].chebyshev_distance(cells[j]) == 1 {
                    group[j] = groups;
                    stack.push(j);
                }
            }
        }
        groups += 1;
    }
    groups
}

/// Foreground pixels where three or more separate branches leave the 5x5 window, row-major
pub fn detect_branch_points(matrix: &BinaryMatrix) -> Vec<Point> {
    matrix
        .foreground()
        .filter(|&p| ring_branches(matrix, p) >= 3)
        .collect()
}

/// Greedily keep points with no already-kept point within `min_distance`
pub fn remove_close_points(points: &[Point], min_distance: f64) -> Vec<Point> {
    let limit = min_distance * min_distance;
    let mut kept: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if kept.iter().all(|&k| k.distance_squared(p) as f64 > limit) {
            kept.push(p);
        }
    }
    kept
}

/// Points handed to the tracer
///
/// Both kinds pass through `merge_distance` reduction first. End points then
/// survive unconditionally, so leaf tips drawn close together keep their
/// segments; a branch point is dropped when a surviving end point lies
/// within `trace_distance`.
pub fn reduce_points(
    end_points: &[Point],
    branch_points: &[Point],
    merge_distance: f64,
    trace_distance: f64,
) -> Vec<Point> {
    let detected: Vec<Point> = end_points.iter().chain(branch_points).copied().collect();
    let light = remove_close_points(&detected, merge_distance);
    let (mut kept, branches): (Vec<Point>, Vec<Point>) = light.into_iter().partition(|p| end_points.contains(p));

    let limit = trace_distance * trace_distance;
    let ends = kept.len();
    let survivors: Vec<Point> = branches
        .into_iter()
        .filter(|&b| kept[..ends].iter().all(|&e| e.distance_squared(b) as f64 > limit))
        .collect();
    kept.extend(survivors);
    kept
}
