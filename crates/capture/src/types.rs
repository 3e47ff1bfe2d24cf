use image::{GrayImage, Luma};
use phylo_common::{Point, Rect};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::error::{CaptureError, Result};

/// Width x height grid of foreground flags, indexed by (x, y)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMatrix {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl BinaryMatrix {
    /// Create an all-background matrix
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    /// Build a matrix from ASCII rows where `#` marks foreground
    pub fn from_rows(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let mut matrix = Self::new(width, rows.len() as u32);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    matrix.set(x as i32, y as i32, true);
                }
            }
        }
        matrix
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Foreground flag; cells outside the matrix read as background
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && self.cells[self.index(x, y)]
    }

    pub fn is_set(&self, p: Point) -> bool {
        self.get(p.x, p.y)
    }

    /// Set a cell; writes outside the matrix are ignored
    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if self.in_bounds(x, y) {
            let i = self.index(x, y);
            self.cells[i] = value;
        }
    }

    /// Clear every cell inside `rect`
    pub fn clear_rect(&mut self, rect: &Rect) {
        let r = rect.clamp_to(self.width, self.height);
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                self.set(x, y, false);
            }
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Foreground cells in row-major order
    pub fn foreground(&self) -> impl Iterator<Item = Point> + '_ {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(move |(i, _)| Point::new((i % width) as i32, (i / width) as i32))
    }

    /// Render foreground as black on white
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x as i32, y as i32) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }
}

/// Ordered, non-empty polyline between two terminal points
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Segment {
    points: Vec<Point>,
}

impl Segment {
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.is_empty() {
            return Err(CaptureError::InvalidInput("a segment needs at least one point".into()));
        }
        Ok(Self { points })
    }

    pub fn first(&self) -> Point {
        self.points[0]
    }

    pub fn last(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn bounding_rect(&self) -> Rect {
        let first = self.first();
        self.points
            .iter()
            .fold(Rect::spanning(first, first), |r, &p| r.union(&Rect::spanning(p, p)))
    }

    pub fn to_line_string(&self) -> geo::LineString<f64> {
        self.points.iter().copied().collect()
    }
}

impl TryFrom<Vec<Point>> for Segment {
    type Error = CaptureError;

    fn try_from(points: Vec<Point>) -> Result<Self> {
        Self::new(points)
    }
}

impl From<Segment> for Vec<Point> {
    fn from(segment: Segment) -> Self {
        segment.points
    }
}

impl JsonSchema for Segment {
    fn schema_name() -> String {
        "Segment".to_owned()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        <Vec<Point>>::json_schema(generator)
    }
}

/// Progress marker of one capture run, strictly ordered
#[derive(
    Debug, Clone, Copy, Default,
    PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    #[default]
    None,
    Image,
    Words,
    Segments,
    Dusted,
    Phylogeny,
}

impl Phase {
    /// The phase following this one
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::None => Some(Phase::Image),
            Phase::Image => Some(Phase::Words),
            Phase::Words => Some(Phase::Segments),
            Phase::Segments => Some(Phase::Dusted),
            Phase::Dusted => Some(Phase::Phylogeny),
            Phase::Phylogeny => None,
        }
    }
}

/// Direction the tree grows away from, relative to the declared root
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RootSide {
    Left,
    Right,
    Top,
    Bottom,
    Center,
}

/// One raw result of the text recognizer, confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecognizedText {
    pub text: String,
    pub confidence: f32,
    pub rect: Rect,
}

impl RecognizedText {
    pub fn new(text: impl Into<String>, confidence: f32, rect: Rect) -> Self {
        Self {
            text: text.into(),
            confidence,
            rect,
        }
    }
}
