use tracing::debug;

use crate::{
    cancel::CancellationCheck,
    error::Result,
    traits::Thinning,
    types::BinaryMatrix,
};

/// Clockwise neighbourhood P2..P9 starting north
pub const NEIGH_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

const N: usize = 0;
const NE: usize = 1;
const E: usize = 2;
const SE: usize = 3;
const S: usize = 4;
const SW: usize = 5;
const W: usize = 6;
const NW: usize = 7;

fn neighbourhood(matrix: &BinaryMatrix, x: i32, y: i32) -> [bool; 8] {
    NEIGH_OFFSETS.map(|(dx, dy)| matrix.get(x + dx, y + dy))
}

/// Number of background to foreground transitions around the ring
fn transitions(p: &[bool; 8]) -> usize {
    (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count()
}

/// Zhang-Suen thinning followed by removal of staircase corners
#[derive(Debug, Clone, Copy, Default)]
pub struct ZhangSuenThinning;

impl ZhangSuenThinning {
    fn subpass(matrix: &mut BinaryMatrix, first: bool) -> bool {
        let doomed: Vec<(i32, i32)> = matrix
            .foreground()
            .filter_map(|pt| {
                let p = neighbourhood(matrix, pt.x, pt.y);
                let count = p.iter().filter(|&&v| v).count();
                if !(2..=6).contains(&count) || transitions(&p) != 1 {
                    return None;
                }
                let removable = if first {
                    !(p[N] && p[E] && p[S]) && !(p[E] && p[S] && p[W])
                } else {
                    !(p[N] && p[E] && p[W]) && !(p[N] && p[S] && p[W])
                };
                removable.then_some((pt.x, pt.y))
            })
            .collect();
        for &(x, y) in &doomed {
            matrix.set(x, y, false);
        }
        !doomed.is_empty()
    }

    /// Delete corner pixels of 4-connected staircases, in raster order
    fn remove_staircases(matrix: &mut BinaryMatrix) -> usize {
        let mut removed = 0;
        for y in 0..matrix.height() as i32 {
            for x in 0..matrix.width() as i32 {
                if !matrix.get(x, y) {
                    continue;
                }
                let p = neighbourhood(matrix, x, y);
                let corner = (p[N] && p[E] && !p[S] && !p[W] && !p[SW])
                    || (p[E] && p[S] && !p[N] && !p[W] && !p[NW])
                    || (p[S] && p[W] && !p[N] && !p[E] && !p[NE])
                    || (p[W] && p[N] && !p[S] && !p[E] && !p[SE]);
                if corner {
                    matrix.set(x, y, false);
                    removed += 1;
                }
            }
        }
        removed
    }
}

impl Thinning for ZhangSuenThinning {
    fn thin(&self, matrix: &mut BinaryMatrix, cancel: &dyn CancellationCheck) -> Result<()> {
        let mut passes = 0;
        loop {
            cancel.check()?;
            let first = Self::subpass(matrix, true);
            cancel.check()?;
            let second = Self::subpass(matrix, false);
            passes += 1;
            if !first && !second {
                break;
            }
        }
        let corners = Self::remove_staircases(matrix);
        debug!(passes, corners, remaining = matrix.foreground_count(), "thinning finished");
        Ok(())
    }
}
