//! Tesseract backed [`TextRecognizer`] for the capture pipeline.
//!
//! Needs the `tesseract` binary on `PATH`; use [`is_available`] to check.

use std::collections::HashMap;
use std::process::Command;

use capture::{CaptureError, RecognizedText, TextRecognizer};
use image::{DynamicImage, GrayImage, imageops::FilterType};
use phylo_common::Rect;
use rusty_tesseract::{Args, Image};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Tesseract error: {0}")]
    Tesseract(String),
    #[error("Invalid OCR configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, OcrError>;

impl From<OcrError> for CaptureError {
    fn from(err: OcrError) -> Self {
        CaptureError::Recognition(err.to_string())
    }
}

/// Tesseract invocation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct TesseractConfig {
    /// Tesseract language code, e.g. `eng`
    pub lang: String,
    /// Page segmentation mode; 11 finds sparse text in no particular order
    pub psm: i32,
    /// OCR engine mode
    pub oem: i32,
    /// Upscale small rasters before recognition
    pub upscale_small_images: bool,
    /// Extra `-c name=value` variables
    pub variables: HashMap<String, String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            lang: "eng".to_string(),
            psm: 11,
            oem: 3,
            upscale_small_images: true,
            variables: HashMap::new(),
        }
    }
}

impl TesseractConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lang.trim().is_empty() {
            return Err(OcrError::InvalidConfig("lang must not be empty".into()));
        }
        if !(0..=13).contains(&self.psm) {
            return Err(OcrError::InvalidConfig(format!("psm {} is not in 0..=13", self.psm)));
        }
        if !(0..=3).contains(&self.oem) {
            return Err(OcrError::InvalidConfig(format!("oem {} is not in 0..=3", self.oem)));
        }
        Ok(())
    }
}

/// Upscale factor for a raster whose smaller side is `min_dimension`
pub fn upscale_factor(min_dimension: u32) -> u32 {
    if min_dimension < 100 {
        4
    } else if min_dimension < 200 {
        2
    } else {
        1
    }
}

/// One row of tesseract's TSV output
#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// 0-100, -1 on rows that are not words
    pub conf: f32,
    pub text: String,
}

impl WordBox {
    /// Map back to the original raster; `None` for non-word rows
    pub fn to_recognized(&self, factor: u32) -> Option<RecognizedText> {
        let text = self.text.trim();
        if self.conf < 0.0 || text.is_empty() {
            return None;
        }
        let f = factor.max(1) as i32;
        let x = self.left.div_euclid(f);
        let y = self.top.div_euclid(f);
        let right = (self.left + self.width + f - 1).div_euclid(f);
        let bottom = (self.top + self.height + f - 1).div_euclid(f);
        let rect = Rect::new(x, y, right - x, bottom - y).ok().filter(|r| !r.is_empty())?;
        Some(RecognizedText::new(text, (self.conf / 100.0).clamp(0.0, 1.0), rect))
    }
}

/// Text recognizer running the tesseract binary on each image
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer {
    config: TesseractConfig,
}

impl TesseractRecognizer {
    pub fn new(config: TesseractConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    fn args(&self, factor: u32) -> Args {
        Args {
            lang: self.config.lang.clone(),
            config_variables: self.config.variables.clone(),
            dpi: Some(if factor > 1 { 300 } else { 150 }),
            psm: Some(self.config.psm),
            oem: Some(self.config.oem),
        }
    }

    /// Word boxes in the coordinates of `image`
    pub fn recognize_words(&self, image: &GrayImage) -> Result<Vec<RecognizedText>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let factor = if self.config.upscale_small_images {
            upscale_factor(width.min(height))
        } else {
            1
        };
        let mut dynamic = DynamicImage::ImageLuma8(image.clone());
        if factor > 1 {
            debug!(factor, width, height, "upscaling image for recognition");
            dynamic = dynamic.resize(width * factor, height * factor, FilterType::Lanczos3);
        }

        let tess_image =
            Image::from_dynamic_image(&dynamic).map_err(|e| OcrError::Tesseract(e.to_string()))?;
        let output = rusty_tesseract::image_to_data(&tess_image, &self.args(factor))
            .map_err(|e| OcrError::Tesseract(e.to_string()))?;
        let words: Vec<RecognizedText> = output
            .data
            .iter()
            .map(|d| WordBox {
                left: d.left,
                top: d.top,
                width: d.width,
                height: d.height,
                conf: d.conf,
                text: d.text.clone(),
            })
            .filter_map(|row| row.to_recognized(factor))
            .collect();
        info!(rows = output.data.len(), words = words.len(), "tesseract finished");
        Ok(words)
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage) -> capture::Result<Vec<RecognizedText>> {
        Ok(self.recognize_words(image)?)
    }
}

/// Whether the tesseract binary can be run
pub fn is_available() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
