use phylo_common::{Rect, Word};
use tracing::{debug, warn};

use crate::types::{BinaryMatrix, RecognizedText};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

const SIDES: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

/// Widest dark run still treated as a stroke crossing the box edge
const MAX_INTRUDER_WIDTH: usize = 2;

/// Turns raw recognizer output into merged, tightened word boxes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordExtractor {
    pub min_confidence: f32,
    pub max_text_height: i32,
    pub merge_gap: i32,
}

impl WordExtractor {
    pub fn new(min_confidence: f32, max_text_height: i32, merge_gap: i32) -> Self {
        Self {
            min_confidence,
            max_text_height,
            merge_gap,
        }
    }

    /// Filter, merge and tighten recognizer output against the binarized image
    pub fn extract(&self, raw: Vec<RecognizedText>, matrix: &BinaryMatrix) -> Vec<Word> {
        let total = raw.len();
        let filtered = self.filter(raw);
        let merged = self.merge(filtered);
        let words: Vec<Word> = merged
            .into_iter()
            .filter_map(|mut word| {
                let clamped = word.rect.clamp_to(matrix.width(), matrix.height());
                if clamped.is_empty() {
                    warn!(text = %word.text, "word box lies outside the image");
                    return None;
                }
                word.rect = tighten_rect(matrix, clamped);
                Some(word)
            })
            .collect();
        debug!(recognized = total, words = words.len(), "word extraction finished");
        words
    }

    /// Drop low-confidence, blank and oversized results
    pub fn filter(&self, raw: Vec<RecognizedText>) -> Vec<Word> {
        raw.into_iter()
            .filter(|r| {
                let keep = r.confidence > self.min_confidence
                    && r.rect.height <= self.max_text_height
                    && !r.rect.is_empty()
                    && !r.text.trim().is_empty();
                if !keep {
                    debug!(text = %r.text, confidence = r.confidence, "recognized text dropped");
                }
                keep
            })
            .map(|r| Word::new(r.text.trim(), r.confidence, r.rect))
            .collect()
    }

    /// Join fragments on the same line separated by at most `merge_gap`
    pub fn merge(&self, mut words: Vec<Word>) -> Vec<Word> {
        words.sort_by_key(|w| (w.rect.x, w.rect.y));
        let mut merged: Vec<Word> = Vec::with_capacity(words.len());
        for word in words {
            let target = merged.iter_mut().rev().find(|m| {
                m.rect.overlaps_vertically(&word.rect) && word.rect.x - m.rect.right() <= self.merge_gap
            });
            match target {
                Some(m) => {
                    m.text.push(' ');
                    m.text.push_str(&word.text);
                    m.confidence = m.confidence.min(word.confidence);
                    m.rect = m.rect.union(&word.rect);
                }
                None => merged.push(word),
            }
        }
        merged
    }
}

/// Cells along one edge line of `rect`, plus the offset pointing outwards
fn edge_line(rect: &Rect, side: Side) -> (Vec<(i32, i32)>, (i32, i32)) {
    match side {
        Side::Top => ((rect.x..rect.right()).map(|x| (x, rect.y)).collect(), (0, -1)),
        Side::Bottom => ((rect.x..rect.right()).map(|x| (x, rect.bottom() - 1)).collect(), (0, 1)),
        Side::Left => ((rect.y..rect.bottom()).map(|y| (rect.x, y)).collect(), (-1, 0)),
        Side::Right => ((rect.y..rect.bottom()).map(|y| (rect.right() - 1, y)).collect(), (1, 0)),
    }
}

/// Whether the edge line of `side` can be trimmed away
fn trimmable(matrix: &BinaryMatrix, rect: &Rect, side: Side) -> bool {
    let (cells, (ox, oy)) = edge_line(rect, side);
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut start = None;
    for (i, &(x, y)) in cells.iter().enumerate() {
        match (matrix.get(x, y), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, cells.len() - 1));
    }

    match runs.as_slice() {
        [] => true,
        [(first, last)] if last - first < MAX_INTRUDER_WIDTH => cells[*first..=*last].iter().any(|&(x, y)| {
            // the three cells just outside the edge, along the line direction
            let (ax, ay) = (oy.abs(), ox.abs());
            (-1..=1).any(|k| matrix.get(x + ox + k * ax, y + oy + k * ay))
        }),
        _ => false,
    }
}

/// Shrink `rect` to the dark content it frames
///
/// An edge line without dark pixels is trimmed. A line with a single narrow
/// dark run is trimmed only when that run continues outside the box, i.e. a
/// stroke intruding from beyond. Anything else stops that side. A box that
/// would vanish is returned unchanged.
///
/// This is stricter than trimming every single-run line: a run must be at
/// most two pixels wide, so a glyph stroke lying along the edge and touching
/// a neighbouring mark is kept.
pub fn tighten_rect(matrix: &BinaryMatrix, rect: Rect) -> Rect {
    let mut r = rect;
    loop {
        let mut changed = false;
        for side in SIDES {
            while !r.is_empty() && trimmable(matrix, &r, side) {
                match side {
                    Side::Top => {
                        r.y += 1;
                        r.height -= 1;
                    }
                    Side::Bottom => r.height -= 1,
                    Side::Left => {
                        r.x += 1;
                        r.width -= 1;
                    }
                    Side::Right => r.width -= 1,
                }
                changed = true;
            }
            if r.is_empty() {
                warn!(?rect, "word box contains no dark pixels, keeping it as recognized");
                return rect;
            }
        }
        if !changed {
            return r;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str, confidence: f32, x: i32, y: i32, w: i32, h: i32) -> RecognizedText {
        RecognizedText::new(text, confidence, Rect::new(x, y, w, h).unwrap())
    }

    fn text_block() -> BinaryMatrix {
        BinaryMatrix::from_rows(&[
            "..............",
            "..............",
            "...#.##.#.....",
            "...#.#..###...",
            "...###..#.#...",
            "..............",
            "..............",
        ])
    }

    #[test]
    fn test_tighten_shrinks_loose_box() {
        let m = text_block();
        let tight = tighten_rect(&m, Rect::new(0, 0, 14, 7).unwrap());
        assert_eq!(tight, Rect::new(3, 2, 8, 3).unwrap());
    }

    #[test]
    fn test_tighten_is_idempotent() {
        let m = text_block();
        let tight = Rect::new(3, 2, 8, 3).unwrap();
        assert_eq!(tighten_rect(&m, tight), tight);
    }

    #[test]
    fn test_tighten_cuts_intruding_stroke() {
        let m = BinaryMatrix::from_rows(&[
            "..........",
            "..........",
            "#####.....",
            "....#.#...",
            "....###...",
            "..........",
        ]);
        let tight = tighten_rect(&m, Rect::new(2, 1, 7, 5).unwrap());
        assert_eq!(tight, Rect::new(4, 2, 3, 3).unwrap());
    }

    #[test]
    fn test_empty_box_is_kept() {
        let m = BinaryMatrix::new(10, 10);
        let rect = Rect::new(2, 2, 4, 4).unwrap();
        assert_eq!(tighten_rect(&m, rect), rect);
    }

    #[test]
    fn test_filter_and_merge() {
        let extractor = WordExtractor::new(0.5, 20, 6);
        let words = extractor.filter(vec![
            raw("Homo", 0.9, 10, 10, 30, 10),
            raw("sapiens", 0.8, 44, 11, 40, 10),
            raw("noise", 0.3, 100, 10, 20, 10),
            raw("tall", 0.9, 100, 40, 20, 60),
            raw("  ", 0.9, 100, 80, 20, 10),
            raw("Pan", 0.95, 10, 40, 20, 10),
        ]);
        assert_eq!(words.len(), 3);

        let merged = extractor.merge(words);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text, "Homo sapiens");
        assert_eq!(merged[0].confidence, 0.8);
        assert_eq!(merged[0].rect, Rect::new(10, 10, 74, 11).unwrap());
        assert_eq!(merged[1].text, "Pan");
    }

    #[test]
    fn test_far_fragments_stay_apart() {
        let extractor = WordExtractor::new(0.0, 20, 6);
        let merged = extractor.merge(vec![
            Word::new("a", 0.9, Rect::new(0, 0, 10, 10).unwrap()),
            Word::new("b", 0.9, Rect::new(17, 0, 10, 10).unwrap()),
        ]);
        assert_eq!(merged.len(), 2);
    }
}
