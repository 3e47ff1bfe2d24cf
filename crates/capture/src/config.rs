use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};

/// Every tunable of the capture pipeline
///
/// Values are checked by [`CaptureConfig::validate`] and by the `with_*`
/// setters; out-of-range values are rejected, never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptureConfig {
    /// Pixels with brightness at or below this value are foreground, in (0, 1)
    pub brightness_threshold: f32,
    /// Abort when more than this share of the image is foreground, in (0, 1]
    pub max_foreground_proportion: f64,
    /// Recognized words need a confidence strictly above this value, in [0, 1]
    pub min_word_confidence: f32,
    /// Taller recognized boxes are not text labels
    pub max_text_height: i32,
    /// Largest horizontal gap bridged when merging word fragments
    pub word_merge_gap: i32,
    /// Margin cleared around each word box before tracing lines
    pub word_mask_margin: i32,
    /// Minimum distance of the light point reduction pass
    pub point_merge_distance: f64,
    /// Minimum distance of the strict point reduction pass before tracing
    pub trace_point_distance: f64,
    /// Tolerance of the "same path" test between traced segments
    pub same_segment_tolerance: f64,
    /// Segments with points this close end up in one dust cluster
    pub dust_max_distance: f64,
    /// Clusters with a smaller bounding-box extent are dust
    pub dust_min_extent: f64,
    /// Turn words no leaf claimed into labelled, unconnected nodes
    pub rescue_unmatched_words: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 0.5,
            max_foreground_proportion: 0.25,
            min_word_confidence: 0.5,
            max_text_height: 40,
            word_merge_gap: 6,
            word_mask_margin: 2,
            point_merge_distance: 3.0,
            trace_point_distance: 8.0,
            same_segment_tolerance: 3.0,
            dust_max_distance: 10.0,
            dust_min_extent: 20.0,
            rescue_unmatched_words: false,
        }
    }
}

fn check_open_unit(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(CaptureError::invalid(name, format!("{value} is outside (0, 1)")))
    }
}

fn check_distance(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CaptureError::invalid(name, format!("{value} must be a finite, non-negative distance")))
    }
}

fn check_pixels(name: &'static str, value: i32) -> Result<()> {
    if value >= 0 {
        Ok(())
    } else {
        Err(CaptureError::invalid(name, format!("{value} must not be negative")))
    }
}

impl CaptureConfig {
    /// Check every field and the relations between them
    pub fn validate(&self) -> Result<()> {
        check_open_unit("brightness_threshold", self.brightness_threshold as f64)?;
        if !(self.max_foreground_proportion > 0.0 && self.max_foreground_proportion <= 1.0) {
            return Err(CaptureError::invalid(
                "max_foreground_proportion",
                format!("{} is outside (0, 1]", self.max_foreground_proportion),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_word_confidence) {
            return Err(CaptureError::invalid(
                "min_word_confidence",
                format!("{} is outside [0, 1]", self.min_word_confidence),
            ));
        }
        if self.max_text_height <= 0 {
            return Err(CaptureError::invalid(
                "max_text_height",
                format!("{} must be positive", self.max_text_height),
            ));
        }
        check_pixels("word_merge_gap", self.word_merge_gap)?;
        check_pixels("word_mask_margin", self.word_mask_margin)?;
        check_distance("point_merge_distance", self.point_merge_distance)?;
        check_distance("trace_point_distance", self.trace_point_distance)?;
        if self.trace_point_distance < self.point_merge_distance {
            return Err(CaptureError::invalid(
                "trace_point_distance",
                format!(
                    "{} is below point_merge_distance ({})",
                    self.trace_point_distance, self.point_merge_distance
                ),
            ));
        }
        check_distance("same_segment_tolerance", self.same_segment_tolerance)?;
        check_distance("dust_max_distance", self.dust_max_distance)?;
        check_distance("dust_min_extent", self.dust_min_extent)?;
        Ok(())
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn with_brightness_threshold(mut self, value: f32) -> Result<Self> {
        self.brightness_threshold = value;
        self.validated()
    }

    pub fn with_max_foreground_proportion(mut self, value: f64) -> Result<Self> {
        self.max_foreground_proportion = value;
        self.validated()
    }

    pub fn with_min_word_confidence(mut self, value: f32) -> Result<Self> {
        self.min_word_confidence = value;
        self.validated()
    }

    pub fn with_max_text_height(mut self, value: i32) -> Result<Self> {
        self.max_text_height = value;
        self.validated()
    }

    pub fn with_word_merge_gap(mut self, value: i32) -> Result<Self> {
        self.word_merge_gap = value;
        self.validated()
    }

    pub fn with_word_mask_margin(mut self, value: i32) -> Result<Self> {
        self.word_mask_margin = value;
        self.validated()
    }

    /// Set both point reduction distances at once
    pub fn with_point_distances(mut self, merge: f64, trace: f64) -> Result<Self> {
        self.point_merge_distance = merge;
        self.trace_point_distance = trace;
        self.validated()
    }

    pub fn with_same_segment_tolerance(mut self, value: f64) -> Result<Self> {
        self.same_segment_tolerance = value;
        self.validated()
    }

    /// Set the dust clustering distance and the minimum surviving extent
    pub fn with_dust(mut self, max_distance: f64, min_extent: f64) -> Result<Self> {
        self.dust_max_distance = max_distance;
        self.dust_min_extent = min_extent;
        self.validated()
    }

    pub fn with_rescue_unmatched_words(mut self, value: bool) -> Self {
        self.rescue_unmatched_words = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CaptureConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds_are_exclusive() {
        for bad in [0.0, 1.0, -0.2, f32::NAN] {
            let err = CaptureConfig::default().with_brightness_threshold(bad).unwrap_err();
            assert!(matches!(
                err,
                CaptureError::InvalidParameter { name: "brightness_threshold", .. }
            ));
        }
        let config = CaptureConfig::default().with_brightness_threshold(0.7).unwrap();
        assert_eq!(config.brightness_threshold, 0.7);
    }

    #[test]
    fn test_rejects_without_clamping() {
        assert!(CaptureConfig::default().with_max_text_height(0).is_err());
        assert!(CaptureConfig::default().with_dust(-1.0, 10.0).is_err());
        assert!(CaptureConfig::default().with_dust(10.0, f64::INFINITY).is_err());
        assert!(CaptureConfig::default().with_point_distances(5.0, 2.0).is_err());
        assert!(CaptureConfig::default().with_min_word_confidence(1.5).is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{ "dust_min_extent": 50.0 }"#).unwrap();
        assert_eq!(config.dust_min_extent, 50.0);
        assert_eq!(config.brightness_threshold, 0.5);
    }
}
