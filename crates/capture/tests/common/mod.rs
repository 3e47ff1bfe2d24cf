pub mod synthetic_image;

use capture::{RecognizedText, Result, TextRecognizer};
use image::GrayImage;
use phylo_common::Rect;

/// Recognizer returning a fixed list of boxes whatever the image holds
pub struct StubRecognizer {
    pub texts: Vec<RecognizedText>,
}

impl StubRecognizer {
    pub fn cladogram_labels() -> Self {
        Self {
            texts: vec![
                RecognizedText::new("Homo", 0.9, Rect::new(95, 25, 30, 10).unwrap()),
                RecognizedText::new("Pan", 0.85, Rect::new(95, 65, 30, 10).unwrap()),
            ],
        }
    }
}

impl TextRecognizer for StubRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RecognizedText>> {
        Ok(self.texts.clone())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
