use crate::{
    algorithms::ZhangSuenThinning,
    config::CaptureConfig,
    error::Result,
    pipeline::Pipeline,
    traits::{NoTextRecognizer, TextRecognizer, Thinning},
};

/// Builder for creating capture pipelines with a fluent API
pub struct PipelineBuilder {
    config: CaptureConfig,
    thinning: Option<Box<dyn Thinning>>,
    recognizer: Option<Box<dyn TextRecognizer>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: CaptureConfig::default(),
            thinning: None,
            recognizer: None,
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the thinning algorithm (replaces any existing one)
    pub fn with_thinning<T>(mut self, thinning: T) -> Self
    where
        T: Thinning + 'static,
    {
        self.thinning = Some(Box::new(thinning));
        self
    }

    /// Set the text recognizer (replaces any existing one)
    pub fn with_text_recognizer<R>(mut self, recognizer: R) -> Self
    where
        R: TextRecognizer + 'static,
    {
        self.recognizer = Some(Box::new(recognizer));
        self
    }

    /// Set an already boxed text recognizer
    pub fn with_boxed_text_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Build the pipeline with default components if not specified
    pub fn build(self) -> Result<Pipeline> {
        let thinning = self.thinning.unwrap_or_else(|| Box::new(ZhangSuenThinning));
        let recognizer = self.recognizer.unwrap_or_else(|| Box::new(NoTextRecognizer));
        Pipeline::new(self.config, thinning, recognizer)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
