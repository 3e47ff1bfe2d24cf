use std::path::Path;

use phylo_common::{Graph, Point, Word};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::Assembly,
    error::Result,
    pipeline::CaptureState,
    types::{Phase, Segment},
};

/// Exportable snapshot of a capture run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptureReport {
    pub image_width: u32,
    pub image_height: u32,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Point>,
    pub words: Vec<Word>,
    /// Dusted segments once available, traced segments before that
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Graph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<Assembly>,
}

impl CaptureReport {
    pub fn from_state(state: &CaptureState, image_width: u32, image_height: u32, root: Option<Point>) -> Self {
        Self {
            image_width,
            image_height,
            phase: state.phase(),
            root,
            words: state.words().to_vec(),
            segments: state.latest_segments().to_vec(),
            graph: state.phylogeny().map(|p| p.graph.clone()),
            assembly: state.phylogeny().map(|p| p.assembly.clone()),
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON schema of the report format
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CaptureReport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylo_common::Rect;

    #[test]
    fn test_report_json() {
        let report = CaptureReport {
            image_width: 100,
            image_height: 80,
            phase: Phase::Dusted,
            root: None,
            words: vec![Word::new("Homo", 0.9, Rect::new(1, 2, 3, 4).unwrap())],
            segments: vec![Segment::new(vec![Point::new(0, 0), Point::new(5, 5)]).unwrap()],
            graph: None,
            assembly: None,
        };
        let json = report.to_json_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["phase"], "dusted");
        assert_eq!(value["segments"][0][1]["x"], 5);
        assert!(value.get("graph").is_none());
        assert_eq!(CaptureReport::from_json_str(&json).unwrap(), report);
    }
}
