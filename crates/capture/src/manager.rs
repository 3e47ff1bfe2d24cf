use std::{path::Path, sync::Arc};

use image::RgbaImage;
use phylo_common::{Point, Word};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use tracing::{info, warn};

use crate::{
    cancel::{CancellationCheck, CancellationToken},
    error::{CaptureError, Result},
    io::CaptureReport,
    pipeline::{CaptureState, Pipeline},
    render::{OverlayStyle, render_overlay},
    types::{Phase, Segment},
};

#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
pub enum CaptureCommand {
    /// Run the pipeline until the goal phase is committed
    #[serde(rename = "run_to")]
    RunTo { goal: Phase },

    /// Declare the root position of the tree
    #[serde(rename = "set_root")]
    SetRoot { x: i32, y: i32 },

    /// Forget the root position
    #[serde(rename = "clear_root")]
    ClearRoot,

    /// Drop every computed phase, keeping image and root
    #[serde(rename = "reset")]
    Reset,
}

impl CaptureCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CaptureCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    /// Get a description of the command
    pub fn description(&self) -> &'static str {
        match self {
            Self::RunTo { .. } => "Run the capture pipeline up to the requested phase",
            Self::SetRoot { .. } => "Set the root position used to orient the tree",
            Self::ClearRoot => "Remove the root position",
            Self::Reset => "Discard computed phases and start again from the loaded image",
        }
    }
}

/// Owns the input image, the root and the committed capture state
pub struct CaptureManager {
    image: Option<RgbaImage>,
    root: Option<Point>,
    pipeline: Arc<Pipeline>,
    state: CaptureState,
    cancel: CancellationToken,
}

impl CaptureManager {
    pub fn new() -> Self {
        Self::with_pipeline(Pipeline::default())
    }

    /// Create a new CaptureManager with a custom pipeline
    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        Self {
            image: None,
            root: None,
            pipeline: Arc::new(pipeline),
            state: CaptureState::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Load an image from file
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let img = image::open(path)?;
        self.set_image(img.to_rgba8());
        Ok(())
    }

    /// Load an image from memory
    pub fn load_image_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let img = image::load_from_memory(bytes)?;
        self.set_image(img.to_rgba8());
        Ok(())
    }

    /// Set the image directly; all computed phases are dropped
    pub fn set_image(&mut self, image: RgbaImage) {
        self.image = Some(image);
        self.state = CaptureState::with_image();
    }

    pub fn clear_image(&mut self) {
        self.image = None;
        self.state = CaptureState::new();
    }

    /// Replace the pipeline; computed phases are dropped
    pub fn set_pipeline(&mut self, pipeline: Pipeline) {
        self.pipeline = Arc::new(pipeline);
        self.state.rewind(Phase::Image);
    }

    /// Declare the root; an assembled graph is discarded
    pub fn set_root(&mut self, root: Point) -> Result<()> {
        if let Some(image) = &self.image {
            let (width, height) = image.dimensions();
            if root.x < 0 || root.y < 0 || root.x as u32 >= width || root.y as u32 >= height {
                return Err(CaptureError::InvalidInput(format!(
                    "root ({}, {}) lies outside the {width}x{height} image",
                    root.x, root.y
                )));
            }
        }
        self.root = Some(root);
        self.state.rewind(Phase::Dusted);
        Ok(())
    }

    pub fn clear_root(&mut self) {
        self.root = None;
        self.state.rewind(Phase::Dusted);
    }

    /// Replace the words with user corrections; later phases are dropped
    pub fn override_words(&mut self, words: Vec<Word>) -> Result<()> {
        if self.image.is_none() {
            return Err(CaptureError::NoImageLoaded);
        }
        self.state.commit_words(words);
        Ok(())
    }

    /// Replace the traced segments with user corrections; later phases are dropped
    pub fn override_segments(&mut self, segments: Vec<Segment>) -> Result<()> {
        if self.image.is_none() {
            return Err(CaptureError::NoImageLoaded);
        }
        if !self.state.replace_segments(segments) {
            return Err(CaptureError::InvalidInput(
                "segments can only be corrected once the segments phase has run".into(),
            ));
        }
        Ok(())
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn root(&self) -> Option<Point> {
        self.root
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Token that cancels a run in progress; it is shared, not copied
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run up to `goal` using the manager's own cancellation token
    pub fn run_to(&mut self, goal: Phase) -> Result<&CaptureState> {
        let cancel = self.cancel.clone();
        let result = self.run_phases(goal, &cancel);
        if cancel.is_cancelled() {
            cancel.reset();
        }
        result.map(|_| &self.state)
    }

    /// Run up to `goal`, polling an external cancellation check
    pub fn run_to_with(&mut self, goal: Phase, cancel: &dyn CancellationCheck) -> Result<&CaptureState> {
        self.run_phases(goal, cancel).map(|_| &self.state)
    }

    fn run_phases(&mut self, goal: Phase, cancel: &dyn CancellationCheck) -> Result<()> {
        let image = self.image.as_ref().ok_or(CaptureError::NoImageLoaded)?;
        let pipeline = Arc::clone(&self.pipeline);
        while self.state.phase() < goal {
            match pipeline.step(image, &self.state, self.root, cancel) {
                Ok(next) => self.state = next,
                Err(err) => {
                    warn!(phase = %self.state.phase(), error = %err, "capture stopped");
                    return Err(err);
                }
            }
        }
        info!(phase = %self.state.phase(), "capture state committed");
        Ok(())
    }

    /// Execute a command; returns the phase reached afterwards
    pub fn execute(&mut self, command: CaptureCommand) -> Result<Phase> {
        match command {
            CaptureCommand::RunTo { goal } => {
                self.run_to(goal)?;
            }
            CaptureCommand::SetRoot { x, y } => self.set_root(Point::new(x, y))?,
            CaptureCommand::ClearRoot => self.clear_root(),
            CaptureCommand::Reset => {
                let phase = if self.image.is_some() { Phase::Image } else { Phase::None };
                self.state.rewind(phase);
            }
        }
        Ok(self.state.phase())
    }

    /// Snapshot of the committed results for export
    pub fn report(&self) -> Result<CaptureReport> {
        let image = self.image.as_ref().ok_or(CaptureError::NoImageLoaded)?;
        Ok(CaptureReport::from_state(&self.state, image.width(), image.height(), self.root))
    }

    /// Debug overlay of the committed artifacts
    pub fn render_overlay(&self, style: &OverlayStyle) -> Result<RgbaImage> {
        let image = self.image.as_ref().ok_or(CaptureError::NoImageLoaded)?;
        Ok(render_overlay(image, &self.state, self.root, style))
    }
}

impl Default for CaptureManager {
    fn default() -> Self {
        Self::new()
    }
}
