pub mod builder;
pub mod state;

use phylo_common::{Point, Word};
use tracing::info;

use crate::{
    algorithms::{
        Binarizer, DustFilter, PathTracer, PhylogenyAssembler, WordExtractor, ZhangSuenThinning,
        check_foreground, detect_branch_points, detect_end_points, reduce_points, to_gray,
    },
    cancel::CancellationCheck,
    config::CaptureConfig,
    error::{CaptureError, Result},
    traits::{NoTextRecognizer, PixelSource, TextRecognizer, Thinning},
    types::{Phase, Segment},
};

pub use state::{CaptureState, PhylogenyArtifacts, SegmentArtifacts};

/// The capture phases with their configuration and pluggable stages
pub struct Pipeline {
    config: CaptureConfig,
    thinning: Box<dyn Thinning>,
    recognizer: Box<dyn TextRecognizer>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Create a pipeline from its parts; the configuration is validated
    pub fn new(
        config: CaptureConfig,
        thinning: Box<dyn Thinning>,
        recognizer: Box<dyn TextRecognizer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            thinning,
            recognizer,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn binarizer(&self) -> Result<Binarizer> {
        Binarizer::new(self.config.brightness_threshold)
    }

    /// Image -> Words: recognize text and refine it into word boxes
    pub fn extract_words<S: PixelSource + ?Sized>(&self, image: &S) -> Result<Vec<Word>> {
        let matrix = self.binarizer()?.binarize(image);
        check_foreground(&matrix, self.config.max_foreground_proportion)?;

        let raw = self.recognizer.recognize(&to_gray(image))?;
        let extractor = WordExtractor::new(
            self.config.min_word_confidence,
            self.config.max_text_height,
            self.config.word_merge_gap,
        );
        let words = extractor.extract(raw, &matrix);
        info!(words = words.len(), "words phase complete");
        Ok(words)
    }

    /// Words -> Segments: mask words, thin, detect points and trace paths
    pub fn extract_segments<S: PixelSource + ?Sized>(
        &self,
        image: &S,
        words: &[Word],
        cancel: &dyn CancellationCheck,
    ) -> Result<SegmentArtifacts> {
        let mut matrix = self.binarizer()?.binarize(image);
        for word in words {
            matrix.clear_rect(&word.rect.expand(self.config.word_mask_margin));
        }
        check_foreground(&matrix, self.config.max_foreground_proportion)?;

        self.thinning.thin(&mut matrix, cancel)?;

        let end_points = detect_end_points(&matrix);
        let branch_points = detect_branch_points(&matrix);
        let points = reduce_points(
            &end_points,
            &branch_points,
            self.config.point_merge_distance,
            self.config.trace_point_distance,
        );
        tracing::debug!(
            detected = end_points.len() + branch_points.len(),
            kept = points.len(),
            "points reduced"
        );

        let segments = PathTracer::new(self.config.same_segment_tolerance).trace(&matrix, &points, cancel)?;
        info!(
            end_points = end_points.len(),
            branch_points = branch_points.len(),
            segments = segments.len(),
            "segments phase complete"
        );
        Ok(SegmentArtifacts {
            skeleton: matrix,
            end_points,
            branch_points,
            points,
            segments,
        })
    }

    /// Segments -> Dusted
    pub fn remove_dust(&self, segments: &[Segment], cancel: &dyn CancellationCheck) -> Result<Vec<Segment>> {
        let filter = DustFilter::new(self.config.dust_max_distance, self.config.dust_min_extent);
        let kept = filter.apply(segments, cancel)?;
        info!(before = segments.len(), after = kept.len(), "dusted phase complete");
        Ok(kept)
    }

    /// Dusted -> Phylogeny
    pub fn assemble(&self, root: Point, segments: &[Segment], words: &[Word]) -> Result<PhylogenyArtifacts> {
        let assembler = PhylogenyAssembler::new(self.config.rescue_unmatched_words);
        let (graph, assembly) = assembler.assemble(root, segments, words)?;
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            labels = assembly.labels.len(),
            "phylogeny phase complete"
        );
        Ok(PhylogenyArtifacts { graph, assembly })
    }

    /// Perform the single transition following `state.phase()`
    pub fn step<S: PixelSource + ?Sized>(
        &self,
        image: &S,
        state: &CaptureState,
        root: Option<Point>,
        cancel: &dyn CancellationCheck,
    ) -> Result<CaptureState> {
        let mut next = state.clone();
        match state.phase() {
            Phase::None => next.commit_image(),
            Phase::Image => {
                let (width, height) = image.dimensions();
                if width == 0 || height == 0 {
                    return Err(CaptureError::InvalidInput("image is empty".into()));
                }
                next.commit_words(self.extract_words(image)?);
            }
            Phase::Words => {
                next.commit_segments(self.extract_segments(image, state.words(), cancel)?);
            }
            Phase::Segments => {
                next.commit_dusted(self.remove_dust(state.segments(), cancel)?);
            }
            Phase::Dusted => {
                let root = root.ok_or(CaptureError::NoRoot)?;
                next.commit_phylogeny(self.assemble(root, state.dusted(), state.words())?);
            }
            Phase::Phylogeny => {}
        }
        Ok(next)
    }

    /// Step until `goal` is reached, calling `on_phase` after every completed phase
    pub fn run_to<S, F>(
        &self,
        image: &S,
        state: &CaptureState,
        goal: Phase,
        root: Option<Point>,
        cancel: &dyn CancellationCheck,
        mut on_phase: F,
    ) -> Result<CaptureState>
    where
        S: PixelSource + ?Sized,
        F: FnMut(&CaptureState),
    {
        let mut current = state.clone();
        while current.phase() < goal {
            current = self.step(image, &current, root, cancel)?;
            on_phase(&current);
        }
        Ok(current)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: threshold {}, point distances {}/{}, dust {}/{}",
            self.config.brightness_threshold,
            self.config.point_merge_distance,
            self.config.trace_point_distance,
            self.config.dust_max_distance,
            self.config.dust_min_extent,
        )
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            config: CaptureConfig::default(),
            thinning: Box::new(ZhangSuenThinning),
            recognizer: Box::new(NoTextRecognizer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::NeverCancel;
    use image::{GrayImage, Luma};

    fn cross_image() -> GrayImage {
        let mut image = GrayImage::from_pixel(60, 60, Luma([255]));
        for i in 5..55 {
            image.put_pixel(i, 30, Luma([0]));
            image.put_pixel(30, i, Luma([0]));
        }
        image
    }

    #[test]
    fn test_step_advances_one_phase() {
        let pipeline = Pipeline::default();
        let image = cross_image();
        let state = pipeline.step(&image, &CaptureState::new(), None, &NeverCancel).unwrap();
        assert_eq!(state.phase(), Phase::Image);
        let state = pipeline.step(&image, &state, None, &NeverCancel).unwrap();
        assert_eq!(state.phase(), Phase::Words);
        assert!(state.words().is_empty());
    }

    #[test]
    fn test_run_to_reports_every_phase() {
        let pipeline = Pipeline::default();
        let mut seen = Vec::new();
        let state = pipeline
            .run_to(&cross_image(), &CaptureState::new(), Phase::Dusted, None, &NeverCancel, |s| {
                seen.push(s.phase())
            })
            .unwrap();
        assert_eq!(seen, vec![Phase::Image, Phase::Words, Phase::Segments, Phase::Dusted]);

        let artifacts = state.segment_artifacts().unwrap();
        assert_eq!(artifacts.end_points.len(), 4);
        assert_eq!(artifacts.points.len(), 5);
        assert_eq!(state.dusted().len(), 4);
    }

    #[test]
    fn test_close_parallel_branches_keep_every_tip() {
        // an H whose crossbar is 6 px long
        let mut image = GrayImage::from_pixel(30, 50, Luma([255]));
        for y in 5..=45 {
            image.put_pixel(10, y, Luma([0]));
            image.put_pixel(16, y, Luma([0]));
        }
        for x in 11..16 {
            image.put_pixel(x, 25, Luma([0]));
        }

        let artifacts = Pipeline::default().extract_segments(&image, &[], &NeverCancel).unwrap();
        assert_eq!(artifacts.end_points.len(), 4);
        assert_eq!(artifacts.points.len(), 6);
        assert_eq!(artifacts.segments.len(), 5);
        for tip in &artifacts.end_points {
            assert!(
                artifacts.segments.iter().any(|s| s.first() == *tip || s.last() == *tip),
                "{tip:?} ends no segment"
            );
        }
    }

    #[test]
    fn test_phylogeny_needs_root() {
        let pipeline = Pipeline::default();
        let err = pipeline
            .run_to(&cross_image(), &CaptureState::new(), Phase::Phylogeny, None, &NeverCancel, |_| {})
            .unwrap_err();
        assert!(matches!(err, CaptureError::NoRoot));
    }

    #[test]
    fn test_dark_image_is_rejected() {
        let image = GrayImage::from_pixel(20, 20, Luma([0]));
        let err = Pipeline::default().extract_words(&image).unwrap_err();
        assert!(matches!(err, CaptureError::TooMuchForeground { .. }));
    }
}
