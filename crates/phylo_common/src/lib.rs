//! # Phylo Common - Shared Types
//!
//! Value types shared by the capture pipeline, the OCR backend and the CLI:
//! integer image geometry, recognized words and the directed output graph.
//!
//! ## Example
//!
//! ```rust
//! use phylo_common::{Point, Rect, Graph};
//!
//! let rect = Rect::new(10, 20, 30, 8).unwrap();
//! assert!(rect.contains(Point::new(12, 22)));
//!
//! let mut graph = Graph::new();
//! let root = graph.add_node(Point::new(0, 0));
//! let leaf = graph.add_node(Point::new(40, 0));
//! graph.add_edge(root, leaf, vec![Point::new(0, 0), Point::new(40, 0)]).unwrap();
//! assert_eq!(graph.out_degree(root), 1);
//! ```

pub mod graph;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use graph::{Edge, EdgeId, Graph, Node, NodeId};

/// Result type for shared-type operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared value types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommonError {
    #[error("Invalid rectangle: width {width} and height {height} must not be negative")]
    InvalidRect { width: i32, height: i32 },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown edge: {0}")]
    UnknownEdge(EdgeId),
}

/// Integer pixel position in image coordinates (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate this point by the given offsets
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Squared Euclidean distance, exact in integers
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point
    pub fn distance_to(self, other: Self) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// Chessboard distance (max of the axis distances)
    pub fn chebyshev_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for geo_types::Coord<f64> {
    fn from(p: Point) -> Self {
        geo_types::coord! { x: p.x as f64, y: p.y as f64 }
    }
}

impl From<Point> for geo_types::Point<f64> {
    fn from(p: Point) -> Self {
        geo_types::Point(p.into())
    }
}

/// Axis-aligned rectangle; `x`/`y` are inclusive, `right()`/`bottom()` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a rectangle, rejecting negative sizes
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self> {
        if width < 0 || height < 0 {
            return Err(CommonError::InvalidRect { width, height });
        }
        Ok(Self { x, y, width, height })
    }

    /// Smallest rectangle holding both pixels (inclusive corners)
    pub fn spanning(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self {
            x,
            y,
            width: a.x.max(b.x) - x + 1,
            height: a.y.max(b.y) - y + 1,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Center in continuous coordinates
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Check if a pixel is inside this rectangle
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Check if the vertical extents share at least one row
    pub fn overlaps_vertically(&self, other: &Rect) -> bool {
        self.y < other.bottom() && other.y < self.bottom()
    }

    /// Check if the horizontal extents share at least one column
    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.overlaps_vertically(other) && self.overlaps_horizontally(other)
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Grow by `margin` pixels on every side
    pub fn expand(&self, margin: i32) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }

    /// Intersect with the `[0, width) x [0, height)` image area
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let x = self.x.clamp(0, width as i32);
        let y = self.y.clamp(0, height as i32);
        let right = self.right().clamp(0, width as i32);
        let bottom = self.bottom().clamp(0, height as i32);
        Rect {
            x,
            y,
            width: (right - x).max(0),
            height: (bottom - y).max(0),
        }
    }

    /// Pixel of this rectangle closest to `point`
    pub fn closest_pixel(&self, point: Point) -> Point {
        let max_x = (self.right() - 1).max(self.x);
        let max_y = (self.bottom() - 1).max(self.y);
        Point::new(point.x.clamp(self.x, max_x), point.y.clamp(self.y, max_y))
    }

    /// Euclidean distance from `point` to the nearest pixel of this rectangle
    pub fn distance_to(&self, point: Point) -> f64 {
        self.closest_pixel(point).distance_to(point)
    }
}

/// A recognized text span with its confidence and image-space bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Word {
    pub text: String,
    /// Recognition confidence in [0, 1]
    pub confidence: f32,
    pub rect: Rect,
}

impl Word {
    pub fn new(text: impl Into<String>, confidence: f32, rect: Rect) -> Self {
        Self {
            text: text.into(),
            confidence,
            rect,
        }
    }
}
