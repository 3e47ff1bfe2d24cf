use phylo_common::{Graph, Point, Word};

use crate::{
    algorithms::Assembly,
    types::{BinaryMatrix, Phase, Segment},
};

/// Everything the Segments phase produced
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentArtifacts {
    pub skeleton: BinaryMatrix,
    pub end_points: Vec<Point>,
    pub branch_points: Vec<Point>,
    /// Reduced points the tracer connected
    pub points: Vec<Point>,
    pub segments: Vec<Segment>,
}

/// Result of the Phylogeny phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhylogenyArtifacts {
    pub graph: Graph,
    pub assembly: Assembly,
}

/// Committed progress of one capture run
///
/// Artifacts are present exactly for the phases up to [`CaptureState::phase`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureState {
    phase: Phase,
    words: Vec<Word>,
    segments: Option<SegmentArtifacts>,
    dusted: Vec<Segment>,
    phylogeny: Option<PhylogenyArtifacts>,
}

impl CaptureState {
    /// Empty state, nothing loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a freshly loaded image
    pub fn with_image() -> Self {
        Self {
            phase: Phase::Image,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn segment_artifacts(&self) -> Option<&SegmentArtifacts> {
        self.segments.as_ref()
    }

    /// Traced segments, empty before the Segments phase
    pub fn segments(&self) -> &[Segment] {
        self.segments.as_ref().map(|s| s.segments.as_slice()).unwrap_or(&[])
    }

    pub fn dusted(&self) -> &[Segment] {
        &self.dusted
    }

    pub fn phylogeny(&self) -> Option<&PhylogenyArtifacts> {
        self.phylogeny.as_ref()
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.phylogeny.as_ref().map(|p| &p.graph)
    }

    /// Most processed segment list available
    pub fn latest_segments(&self) -> &[Segment] {
        if self.phase >= Phase::Dusted {
            &self.dusted
        } else {
            self.segments()
        }
    }

    /// Drop everything computed after `phase`
    pub fn rewind(&mut self, phase: Phase) {
        if self.phase <= phase {
            return;
        }
        if phase < Phase::Phylogeny {
            self.phylogeny = None;
        }
        if phase < Phase::Dusted {
            self.dusted.clear();
        }
        if phase < Phase::Segments {
            self.segments = None;
        }
        if phase < Phase::Words {
            self.words.clear();
        }
        self.phase = phase;
    }

    pub(crate) fn commit_image(&mut self) {
        self.phase = Phase::Image;
    }

    pub(crate) fn commit_words(&mut self, words: Vec<Word>) {
        self.rewind(Phase::Image);
        self.words = words;
        self.phase = Phase::Words;
    }

    pub(crate) fn commit_segments(&mut self, artifacts: SegmentArtifacts) {
        self.rewind(Phase::Words);
        self.segments = Some(artifacts);
        self.phase = Phase::Segments;
    }

    pub(crate) fn commit_dusted(&mut self, segments: Vec<Segment>) {
        self.rewind(Phase::Segments);
        self.dusted = segments;
        self.phase = Phase::Dusted;
    }

    pub(crate) fn commit_phylogeny(&mut self, artifacts: PhylogenyArtifacts) {
        self.phylogeny = Some(artifacts);
        self.phase = Phase::Phylogeny;
    }

    /// Replace the traced segments, keeping the skeleton and points
    pub(crate) fn replace_segments(&mut self, segments: Vec<Segment>) -> bool {
        self.rewind(Phase::Segments);
        match self.segments.as_mut() {
            Some(artifacts) => {
                artifacts.segments = segments;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylo_common::Rect;

    fn artifacts() -> SegmentArtifacts {
        SegmentArtifacts {
            skeleton: BinaryMatrix::new(4, 4),
            end_points: vec![],
            branch_points: vec![],
            points: vec![],
            segments: vec![Segment::new(vec![Point::new(0, 0), Point::new(3, 0)]).unwrap()],
        }
    }

    #[test]
    fn test_rewind_drops_later_artifacts() {
        let mut state = CaptureState::with_image();
        state.commit_words(vec![Word::new("a", 1.0, Rect::new(0, 0, 1, 1).unwrap())]);
        state.commit_segments(artifacts());
        state.commit_dusted(state.segments().to_vec());
        assert_eq!(state.phase(), Phase::Dusted);
        assert_eq!(state.latest_segments().len(), 1);

        state.rewind(Phase::Words);
        assert_eq!(state.phase(), Phase::Words);
        assert!(state.segment_artifacts().is_none());
        assert!(state.dusted().is_empty());
        assert_eq!(state.words().len(), 1);

        state.rewind(Phase::Phylogeny);
        assert_eq!(state.phase(), Phase::Words);
    }

    #[test]
    fn test_replace_segments_requires_segments_phase() {
        let mut state = CaptureState::with_image();
        assert!(!state.replace_segments(vec![]));
        state.commit_segments(artifacts());
        state.commit_dusted(vec![]);
        assert!(state.replace_segments(vec![]));
        assert_eq!(state.phase(), Phase::Segments);
        assert!(state.segments().is_empty());
    }
}
