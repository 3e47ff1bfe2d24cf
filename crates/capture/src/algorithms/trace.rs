//! Path tracing between detected skeleton points.
//!
//! Every point owns a small disk of skeleton cells. A depth-first search
//! leaves each disk along unvisited skeleton pixels and succeeds when it
//! touches the disk of another point. The search runs on an explicit frame
//! stack and polls cancellation before each step.

use phylo_common::Point;
use tracing::debug;

use crate::{
    algorithms::{dedup::SegmentDeduplicator, skeleton::NEIGH_OFFSETS},
    cancel::CancellationCheck,
    error::Result,
    types::{BinaryMatrix, Segment},
};

/// Largest disk stamped around a point
pub const MAX_STAMP_RADIUS: i32 = 5;

/// Pixels a path must cover before returning to its own point counts as a loop
pub const MIN_LOOP_LENGTH: usize = 20;

/// Ring 1 first, then ring 2 to bridge single-pixel gaps
const SEARCH_OFFSETS: [(i32, i32); 24] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
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
    (-2, -2),
    (-1, -2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellState {
    Background,
    Unvisited,
    Visited,
    Point(u32),
}

struct TraceGrid {
    width: i32,
    height: i32,
    cells: Vec<CellState>,
}

impl TraceGrid {
    fn from_skeleton(skeleton: &BinaryMatrix) -> Self {
        let width = skeleton.width() as i32;
        let height = skeleton.height() as i32;
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(if skeleton.get(x, y) {
                    CellState::Unvisited
                } else {
                    CellState::Background
                });
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    fn get(&self, p: Point) -> CellState {
        if p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
            return CellState::Background;
        }
        self.cells[(p.y * self.width + p.x) as usize]
    }

    fn set(&mut self, p: Point, state: CellState) {
        if p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height {
            self.cells[(p.y * self.width + p.x) as usize] = state;
        }
    }

    /// First point disk touching `p` among its eight neighbours, skipping `own`
    /// unless the path is long enough to close a loop
    fn touching_point(&self, p: Point, own: u32, path_len: usize) -> Option<u32> {
        NEIGH_OFFSETS.iter().find_map(|&(dx, dy)| match self.get(p.offset(dx, dy)) {
            CellState::Point(id) if id != own || path_len >= MIN_LOOP_LENGTH => Some(id),
            _ => None,
        })
    }
}

/// Stamp radius keeping every disk clear of its nearest neighbour's disk
fn stamp_radius(points: &[Point], index: usize) -> i32 {
    let p = points[index];
    let nearest = points
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != index)
        .map(|(_, &q)| p.distance_to(q))
        .fold(f64::INFINITY, f64::min);
    if nearest.is_infinite() {
        return MAX_STAMP_RADIUS;
    }
    (((nearest - 1.0) / 2.0).floor() as i32).clamp(0, MAX_STAMP_RADIUS)
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    pos: Point,
    next: usize,
}

enum Step {
    Reached(u32),
    Advance,
    Exhausted,
}

/// Traces skeleton paths between points and drops same-path duplicates
#[derive(Debug, Clone, Copy)]
pub struct PathTracer {
    dedup: SegmentDeduplicator,
}

impl PathTracer {
    pub fn new(same_segment_tolerance: f64) -> Self {
        Self {
            dedup: SegmentDeduplicator::new(same_segment_tolerance),
        }
    }

    pub fn trace(
        &self,
        skeleton: &BinaryMatrix,
        points: &[Point],
        cancel: &dyn CancellationCheck,
    ) -> Result<Vec<Segment>> {
        let mut grid = TraceGrid::from_skeleton(skeleton);
        let disks: Vec<Vec<Point>> = (0..points.len())
            .map(|i| stamp_disk(&mut grid, points[i], i as u32, stamp_radius(points, i)))
            .collect();

        let mut segments: Vec<Segment> = Vec::new();
        let mut candidates = 0usize;
        for (i, disk) in disks.iter().enumerate() {
            cancel.check()?;
            let own = i as u32;

            let mut neighbours: Vec<u32> = Vec::new();
            let mut seeds: Vec<Point> = Vec::new();
            for &cell in disk {
                for &(dx, dy) in &NEIGH_OFFSETS {
                    let n = cell.offset(dx, dy);
                    match grid.get(n) {
                        CellState::Point(id) if id != own && !neighbours.contains(&id) => {
                            neighbours.push(id)
                        }
                        CellState::Unvisited if !seeds.contains(&n) => seeds.push(n),
                        _ => {}
                    }
                }
            }

            for id in neighbours {
                candidates += 1;
                let segment = Segment::new(vec![points[i], points[id as usize]])?;
                self.dedup.push_unique(&mut segments, segment);
            }

            for seed in seeds {
                if grid.get(seed) != CellState::Unvisited {
                    continue;
                }
                if let Some((end, path)) = search(&mut grid, seed, own, cancel)? {
                    candidates += 1;
                    let mut polyline = Vec::with_capacity(path.len() + 2);
                    polyline.push(points[i]);
                    polyline.extend(path);
                    polyline.push(points[end as usize]);
                    self.dedup.push_unique(&mut segments, Segment::new(polyline)?);
                }
            }
        }

        debug!(points = points.len(), candidates, segments = segments.len(), "path tracing finished");
        Ok(segments)
    }
}

fn stamp_disk(grid: &mut TraceGrid, center: Point, id: u32, radius: i32) -> Vec<Point> {
    let mut cells = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let p = center.offset(dx, dy);
            if (dx == 0 && dy == 0) || grid.get(p) == CellState::Unvisited {
                grid.set(p, CellState::Point(id));
                cells.push(p);
            }
        }
    }
    cells
}

/// Depth-first search from `seed` until another point disk is touched
fn search(
    grid: &mut TraceGrid,
    seed: Point,
    own: u32,
    cancel: &dyn CancellationCheck,
) -> Result<Option<(u32, Vec<Point>)>> {
    grid.set(seed, CellState::Visited);
    let mut path = vec![seed];
    if let Some(end) = grid.touching_point(seed, own, path.len()) {
        return Ok(Some((end, path)));
    }
    let mut stack = vec![Frame { pos: seed, next: 0 }];

    loop {
        cancel.check()?;
        match advance(grid, &mut stack, &mut path, own) {
            Step::Reached(end) => return Ok(Some((end, path))),
            Step::Advance => {}
            Step::Exhausted => return Ok(None),
        }
    }
}

fn advance(grid: &mut TraceGrid, stack: &mut Vec<Frame>, path: &mut Vec<Point>, own: u32) -> Step {
    let Some(frame) = stack.last_mut() else {
        return Step::Exhausted;
    };
    if frame.next >= SEARCH_OFFSETS.len() {
        stack.pop();
        path.pop();
        return if stack.is_empty() {
            Step::Exhausted
        } else {
            Step::Advance
        };
    }

    let (dx, dy) = SEARCH_OFFSETS[frame.next];
    frame.next += 1;
    let n = frame.pos.offset(dx, dy);
    match grid.get(n) {
        CellState::Unvisited => {
            grid.set(n, CellState::Visited);
            path.push(n);
            if let Some(end) = grid.touching_point(n, own, path.len()) {
                return Step::Reached(end);
            }
            stack.push(Frame { pos: n, next: 0 });
            Step::Advance
        }
        CellState::Point(id) if id != own || path.len() >= MIN_LOOP_LENGTH => Step::Reached(id),
        _ => Step::Advance,
    }
}
