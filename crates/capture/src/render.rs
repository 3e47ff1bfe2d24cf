//! Debug overlay of the committed capture artifacts.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use phylo_common::Point;

use crate::pipeline::CaptureState;

/// Colors used by [`render_overlay`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub skeleton: Rgba<u8>,
    pub segment: Rgba<u8>,
    pub end_point: Rgba<u8>,
    pub branch_point: Rgba<u8>,
    pub word: Rgba<u8>,
    pub edge: Rgba<u8>,
    pub node: Rgba<u8>,
    pub root: Rgba<u8>,
    pub point_radius: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            skeleton: Rgba([200, 200, 200, 255]),
            segment: Rgba([0, 120, 255, 255]),
            end_point: Rgba([0, 180, 0, 255]),
            branch_point: Rgba([255, 140, 0, 255]),
            word: Rgba([200, 0, 200, 255]),
            edge: Rgba([220, 0, 0, 255]),
            node: Rgba([120, 0, 0, 255]),
            root: Rgba([0, 0, 0, 255]),
            point_radius: 3,
        }
    }
}

fn to_f32(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

fn draw_polyline(canvas: &mut RgbaImage, points: &[Point], color: Rgba<u8>) {
    for pair in points.windows(2) {
        draw_line_segment_mut(canvas, to_f32(pair[0]), to_f32(pair[1]), color);
    }
}

/// Draw whatever the state has committed on top of a copy of `image`
pub fn render_overlay(
    image: &RgbaImage,
    state: &CaptureState,
    root: Option<Point>,
    style: &OverlayStyle,
) -> RgbaImage {
    let mut canvas = image.clone();
    let r = style.point_radius;

    for word in state.words() {
        if word.rect.is_empty() {
            continue;
        }
        let rect = imageproc::rect::Rect::at(word.rect.x, word.rect.y)
            .of_size(word.rect.width as u32, word.rect.height as u32);
        draw_hollow_rect_mut(&mut canvas, rect, style.word);
    }

    if let Some(artifacts) = state.segment_artifacts() {
        for p in artifacts.skeleton.foreground() {
            if p.x < canvas.width() as i32 && p.y < canvas.height() as i32 {
                canvas.put_pixel(p.x as u32, p.y as u32, style.skeleton);
            }
        }
        for s in state.latest_segments() {
            draw_polyline(&mut canvas, s.points(), style.segment);
        }
        for &p in &artifacts.end_points {
            draw_hollow_circle_mut(&mut canvas, (p.x, p.y), r, style.end_point);
        }
        for &p in &artifacts.branch_points {
            draw_hollow_circle_mut(&mut canvas, (p.x, p.y), r, style.branch_point);
        }
    }

    if let Some(graph) = state.graph() {
        for edge in graph.edges() {
            draw_polyline(&mut canvas, &edge.polyline, style.edge);
        }
        for node in graph.nodes() {
            draw_filled_circle_mut(&mut canvas, (node.position.x, node.position.y), r, style.node);
        }
    }

    if let Some(root) = root {
        draw_filled_circle_mut(&mut canvas, (root.x, root.y), r + 1, style.root);
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cancel::NeverCancel, pipeline::Pipeline, types::Phase};

    #[test]
    fn test_overlay_marks_segments_and_root() {
        let mut image = RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]));
        for x in 5..35 {
            image.put_pixel(x, 10, Rgba([0, 0, 0, 255]));
        }
        let state = Pipeline::default()
            .run_to(&image, &CaptureState::new(), Phase::Dusted, None, &NeverCancel, |_| {})
            .unwrap();
        assert_eq!(state.dusted().len(), 1);

        let style = OverlayStyle::default();
        let overlay = render_overlay(&image, &state, Some(Point::new(5, 10)), &style);
        assert_eq!(overlay.dimensions(), image.dimensions());
        assert_eq!(*overlay.get_pixel(20, 10), style.segment);
        assert_eq!(*overlay.get_pixel(5, 10), style.root);
    }
}
