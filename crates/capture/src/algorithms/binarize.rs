use image::{GrayImage, Luma};

use crate::{
    error::{CaptureError, Result},
    traits::PixelSource,
    types::BinaryMatrix,
};

/// Brightness threshold splitting dark foreground from light background
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binarizer {
    threshold: f32,
}

impl Binarizer {
    /// `threshold` must lie strictly between 0 and 1
    pub fn new(threshold: f32) -> Result<Self> {
        if threshold > 0.0 && threshold < 1.0 {
            Ok(Self { threshold })
        } else {
            Err(CaptureError::invalid(
                "brightness_threshold",
                format!("{threshold} is outside (0, 1)"),
            ))
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// A cell is foreground iff its pixel brightness is at most the threshold
    pub fn binarize<S: PixelSource + ?Sized>(&self, source: &S) -> BinaryMatrix {
        let (width, height) = source.dimensions();
        let mut matrix = BinaryMatrix::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if source.brightness(x, y) <= self.threshold {
                    matrix.set(x as i32, y as i32, true);
                }
            }
        }
        matrix
    }
}

/// True once the foreground count reaches `max_proportion` of all cells
pub fn too_much_foreground(matrix: &BinaryMatrix, max_proportion: f64) -> bool {
    let limit = max_proportion * matrix.width() as f64 * matrix.height() as f64;
    let mut count = 0usize;
    for _ in matrix.foreground() {
        count += 1;
        if count as f64 >= limit {
            return true;
        }
    }
    false
}

/// Share of foreground cells, 0 for an empty matrix
pub fn foreground_proportion(matrix: &BinaryMatrix) -> f64 {
    let total = matrix.width() as f64 * matrix.height() as f64;
    if total == 0.0 {
        return 0.0;
    }
    matrix.foreground_count() as f64 / total
}

/// Fail with `TooMuchForeground` when the guard trips
pub fn check_foreground(matrix: &BinaryMatrix, max_proportion: f64) -> Result<()> {
    if too_much_foreground(matrix, max_proportion) {
        return Err(CaptureError::TooMuchForeground {
            proportion: foreground_proportion(matrix),
            limit: max_proportion,
        });
    }
    Ok(())
}

/// Grayscale rendition of a pixel source for text recognition
pub fn to_gray<S: PixelSource + ?Sized>(source: &S) -> GrayImage {
    let (width, height) = source.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([(source.brightness(x, y).clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_rejects_threshold_outside_open_interval() {
        assert!(Binarizer::new(0.0).is_err());
        assert!(Binarizer::new(1.0).is_err());
        assert!(Binarizer::new(0.5).is_ok());
    }

    #[test]
    fn test_dark_pixels_become_foreground() {
        let mut image = GrayImage::from_pixel(4, 2, Luma([255]));
        image.put_pixel(1, 0, Luma([20]));
        image.put_pixel(2, 1, Luma([127]));
        image.put_pixel(3, 1, Luma([128]));
        let matrix = Binarizer::new(0.5).unwrap().binarize(&image);
        assert!(matrix.get(1, 0));
        assert!(matrix.get(2, 1));
        assert!(!matrix.get(3, 1));
        assert_eq!(matrix.foreground_count(), 2);
    }

    #[test]
    fn test_transparent_black_is_background() {
        let image = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 0]));
        let matrix = Binarizer::new(0.5).unwrap().binarize(&image);
        assert_eq!(matrix.foreground_count(), 0);
    }

    #[test]
    fn test_foreground_guard() {
        let matrix = BinaryMatrix::from_rows(&["##..", "....", "....", "...."]);
        assert!(!too_much_foreground(&matrix, 0.25));
        assert!(too_much_foreground(&matrix, 0.125));
        let err = check_foreground(&matrix, 0.1).unwrap_err();
        assert!(matches!(err, CaptureError::TooMuchForeground { .. }));
    }
}
