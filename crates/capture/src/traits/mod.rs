use image::{DynamicImage, GenericImageView, GrayImage, RgbaImage};

use crate::{
    cancel::CancellationCheck,
    error::Result,
    types::{BinaryMatrix, RecognizedText},
};

/// Abstract raster input: size plus per-pixel brightness
pub trait PixelSource {
    fn dimensions(&self) -> (u32, u32);

    /// Brightness in [0, 1] with transparency composited over white
    fn brightness(&self, x: u32, y: u32) -> f32;
}

/// Trait for thinning algorithms
pub trait Thinning: Send + Sync {
    /// Reduce the foreground of `matrix` to a one pixel wide skeleton, in place
    fn thin(&self, matrix: &mut BinaryMatrix, cancel: &dyn CancellationCheck) -> Result<()>;
}

/// Trait for text recognition backends
pub trait TextRecognizer: Send + Sync {
    /// Recognize word-level text regions in a grayscale raster
    fn recognize(&self, image: &GrayImage) -> Result<Vec<RecognizedText>>;
}

/// Recognizer that never finds any text
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextRecognizer;

impl TextRecognizer for NoTextRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RecognizedText>> {
        Ok(Vec::new())
    }
}

fn rgba_brightness([r, g, b, a]: [u8; 4]) -> f32 {
    let alpha = a as f32 / 255.0;
    let max = r.max(g).max(b) as f32;
    (max * alpha + 255.0 * (1.0 - alpha)) / 255.0
}

impl PixelSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        RgbaImage::dimensions(self)
    }

    fn brightness(&self, x: u32, y: u32) -> f32 {
        rgba_brightness(self.get_pixel(x, y).0)
    }
}

impl PixelSource for GrayImage {
    fn dimensions(&self) -> (u32, u32) {
        GrayImage::dimensions(self)
    }

    fn brightness(&self, x: u32, y: u32) -> f32 {
        self.get_pixel(x, y).0[0] as f32 / 255.0
    }
}

impl PixelSource for DynamicImage {
    fn dimensions(&self) -> (u32, u32) {
        GenericImageView::dimensions(self)
    }

    fn brightness(&self, x: u32, y: u32) -> f32 {
        rgba_brightness(self.get_pixel(x, y).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_transparent_pixels_are_white() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        image.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        assert_eq!(image.brightness(0, 0), 1.0);
        assert_eq!(image.brightness(1, 0), 0.0);
    }

    #[test]
    fn test_brightness_uses_max_channel() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        assert_eq!(image.brightness(0, 0), 1.0);
        let dynamic = DynamicImage::ImageRgba8(image);
        assert_eq!(PixelSource::dimensions(&dynamic), (1, 1));
        assert_eq!(dynamic.brightness(0, 0), 1.0);
    }
}
