use std::fs;
use std::path::{Path, PathBuf};

use capture::{CancellationCheck, CaptureConfig, CaptureError, CaptureManager, CaptureReport, Phase, Pipeline};
use ocr::{OcrError, TesseractConfig, TesseractRecognizer};
use phylo_common::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Which files a job writes next to each other in `output_dir`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct OutputOptions {
    /// `<stem>.json` with the full capture report
    pub json: bool,
    /// `<stem>.geojson` feature collection
    pub geojson: bool,
    /// `<stem>.overlay.png` debug rendering
    pub overlay: bool,
    /// Douglas-Peucker tolerance applied to GeoJSON lines
    pub simplify: Option<f64>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            json: true,
            geojson: true,
            overlay: false,
            simplify: None,
        }
    }
}

fn default_goal() -> Phase {
    Phase::Phylogeny
}

/// A capture job: one image, where to write results and how to run the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CaptureJob {
    pub image: String,
    pub output_dir: String,
    /// Root position `[x, y]`; without it the run stops after dust removal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<[i32; 2]>,
    #[serde(default = "default_goal")]
    pub goal: Phase,
    #[serde(default)]
    pub outputs: OutputOptions,
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Tesseract settings; no text is recognized when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<TesseractConfig>,
}

/// What a finished job produced
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub report: CaptureReport,
    pub written: Vec<PathBuf>,
}

impl CaptureJob {
    pub fn new(image: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            output_dir: output_dir.into(),
            root: None,
            goal: default_goal(),
            outputs: OutputOptions::default(),
            capture: CaptureConfig::default(),
            ocr: None,
        }
    }

    /// Load job from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load job from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load job from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load job from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load the job
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Convert job to TOML string
    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert job to JSON string
    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Save job, choosing the format from the extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CliError> {
        let path_ref = path.as_ref();
        let content = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(CliError::UnsupportedFileFormat),
        };
        fs::write(path_ref, content)?;
        Ok(())
    }

    /// JSON schema of the job file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CaptureJob)
    }

    pub fn build_pipeline(&self) -> Result<Pipeline, CliError> {
        let mut builder = Pipeline::builder().with_config(self.capture.clone());
        if let Some(config) = &self.ocr {
            builder = builder.with_text_recognizer(TesseractRecognizer::new(config.clone())?);
        }
        Ok(builder.build()?)
    }

    fn output_path(&self, suffix: &str) -> PathBuf {
        let stem = Path::new(&self.image)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("capture");
        Path::new(&self.output_dir).join(format!("{stem}{suffix}"))
    }

    /// Run the job to its goal and write the requested outputs.
    ///
    /// A missing root is not fatal: everything up to dust removal is still written.
    pub fn execute(&self, cancel: &dyn CancellationCheck) -> Result<JobOutcome, CliError> {
        let mut manager = CaptureManager::with_pipeline(self.build_pipeline()?);
        manager.load_image(&self.image)?;
        if let Some([x, y]) = self.root {
            manager.set_root(Point::new(x, y))?;
        }

        match manager.run_to_with(self.goal, cancel) {
            Ok(_) => {}
            Err(CaptureError::NoRoot) => {
                warn!(phase = %manager.phase(), "no root given, phylogeny was not assembled");
            }
            Err(err) => return Err(err.into()),
        }

        let report = manager.report()?;
        fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();
        if self.outputs.json {
            let path = self.output_path(".json");
            report.save_json(&path)?;
            written.push(path);
        }
        if self.outputs.geojson {
            let path = self.output_path(".geojson");
            report.save_geojson(&path, self.outputs.simplify)?;
            written.push(path);
        }
        if self.outputs.overlay {
            let path = self.output_path(".overlay.png");
            manager.render_overlay(&Default::default())?.save(&path)?;
            written.push(path);
        }
        info!(phase = %report.phase, files = written.len(), "capture job finished");
        Ok(JobOutcome { report, written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::NeverCancel;
    use image::{Rgba, RgbaImage};

    fn tree_png(dir: &Path) -> PathBuf {
        let mut image = RgbaImage::from_pixel(100, 80, Rgba([255, 255, 255, 255]));
        for x in 10..=50 {
            image.put_pixel(x, 40, Rgba([0, 0, 0, 255]));
        }
        for y in 20..=60 {
            image.put_pixel(50, y, Rgba([0, 0, 0, 255]));
        }
        for x in 50..=90 {
            image.put_pixel(x, 20, Rgba([0, 0, 0, 255]));
            image.put_pixel(x, 60, Rgba([0, 0, 0, 255]));
        }
        let path = dir.join("tree.png");
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let job = CaptureJob::from_toml("image = \"tree.png\"\noutput_dir = \"out\"\n").unwrap();
        assert_eq!(job.goal, Phase::Phylogeny);
        assert_eq!(job.capture, CaptureConfig::default());
        assert!(job.outputs.geojson);
        assert!(job.ocr.is_none());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = CaptureJob::new("tree.png", "out");
        job.root = Some([8, 40]);
        job.ocr = Some(TesseractConfig::default());
        job.capture = job.capture.with_dust(12.0, 30.0).unwrap();

        for name in ["job.toml", "job.json"] {
            let path = dir.path().join(name);
            job.to_file(&path).unwrap();
            assert_eq!(CaptureJob::from_file(&path).unwrap(), job);
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        let job = CaptureJob::new("tree.png", "out");
        assert!(matches!(job.to_file(&path), Err(CliError::UnsupportedFileFormat)));
        assert!(matches!(CaptureJob::from_file(&path), Err(CliError::UnsupportedFileFormat)));
    }

    #[test]
    fn test_invalid_capture_config_is_rejected() {
        let mut job = CaptureJob::new("tree.png", "out");
        job.capture.brightness_threshold = 0.0;
        assert!(matches!(job.build_pipeline(), Err(CliError::Capture(_))));
    }

    #[test]
    fn test_execute_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let image = tree_png(dir.path());
        let out = dir.path().join("out");
        let mut job = CaptureJob::new(image.to_string_lossy(), out.to_string_lossy());
        job.root = Some([8, 40]);
        job.outputs.overlay = true;

        let outcome = job.execute(&NeverCancel).unwrap();
        assert_eq!(outcome.report.phase, Phase::Phylogeny);
        assert_eq!(outcome.report.graph.as_ref().map(|g| g.edge_count()), Some(3));
        assert_eq!(outcome.written.len(), 3);
        assert!(outcome.written.iter().all(|p| p.exists()));
        assert!(out.join("tree.geojson").exists());
    }

    #[test]
    fn test_execute_without_root_stops_at_dusted() {
        let dir = tempfile::tempdir().unwrap();
        let image = tree_png(dir.path());
        let job = CaptureJob::new(image.to_string_lossy(), dir.path().join("out").to_string_lossy());

        let outcome = job.execute(&NeverCancel).unwrap();
        assert_eq!(outcome.report.phase, Phase::Dusted);
        assert!(outcome.report.graph.is_none());
    }

    #[test]
    fn test_cancelled_job_fails() {
        let dir = tempfile::tempdir().unwrap();
        let image = tree_png(dir.path());
        let job = CaptureJob::new(image.to_string_lossy(), dir.path().join("out").to_string_lossy());
        let err = job.execute(&|| true).unwrap_err();
        assert!(matches!(err, CliError::Capture(CaptureError::Cancelled)));
    }
}
