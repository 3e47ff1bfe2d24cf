use std::path::Path;

use geo::Simplify;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use phylo_common::{Point, Rect};
use serde_json::{Map, Number, Value as JsonValue};

use crate::{error::Result, io::CaptureReport};

fn position(p: &Point) -> Vec<f64> {
    vec![p.x as f64, p.y as f64]
}

/// LineString coordinates, Douglas-Peucker simplified when a tolerance is given
fn line_coordinates(points: &[Point], tolerance: Option<f64>) -> Vec<Vec<f64>> {
    match tolerance {
        Some(epsilon) if points.len() > 2 => {
            let line: geo::LineString<f64> = points.iter().copied().collect();
            line.simplify(&epsilon).coords().map(|c| vec![c.x, c.y]).collect()
        }
        _ => points.iter().map(position).collect(),
    }
}

fn rect_ring(r: &Rect) -> Vec<Vec<Vec<f64>>> {
    let (x0, y0, x1, y1) = (r.x as f64, r.y as f64, r.right() as f64, r.bottom() as f64);
    vec![vec![
        vec![x0, y0],
        vec![x1, y0],
        vec![x1, y1],
        vec![x0, y1],
        vec![x0, y0],
    ]]
}

fn feature(id: usize, value: Value, properties: Map<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(geojson::feature::Id::Number(Number::from(id))),
        properties: Some(properties),
        foreign_members: None,
    }
}

impl CaptureReport {
    /// Nodes as Points, edges and segments as LineStrings, words as Polygons
    pub fn to_geojson(&self, simplify_tolerance: Option<f64>) -> Result<FeatureCollection> {
        let mut features = Vec::new();

        for (i, word) in self.words.iter().enumerate() {
            let mut properties = Map::new();
            properties.insert("kind".to_string(), JsonValue::from("word"));
            properties.insert("index".to_string(), JsonValue::from(i));
            properties.insert("text".to_string(), JsonValue::from(word.text.clone()));
            properties.insert(
                "confidence".to_string(),
                Number::from_f64(word.confidence as f64).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            );
            features.push(feature(features.len(), Value::Polygon(rect_ring(&word.rect)), properties));
        }

        for (i, segment) in self.segments.iter().enumerate() {
            let mut properties = Map::new();
            properties.insert("kind".to_string(), JsonValue::from("segment"));
            properties.insert("index".to_string(), JsonValue::from(i));
            let coords = line_coordinates(segment.points(), simplify_tolerance);
            features.push(feature(features.len(), Value::LineString(coords), properties));
        }

        if let Some(graph) = &self.graph {
            for node in graph.nodes() {
                let mut properties = Map::new();
                properties.insert("kind".to_string(), JsonValue::from("node"));
                properties.insert("node".to_string(), JsonValue::from(node.id.0));
                if let Some(label) = &node.label {
                    properties.insert("label".to_string(), JsonValue::from(label.clone()));
                }
                if self.assembly.as_ref().is_some_and(|a| a.root == node.id) {
                    properties.insert("root".to_string(), JsonValue::Bool(true));
                }
                features.push(feature(features.len(), Value::Point(position(&node.position)), properties));
            }
            for edge in graph.edges() {
                let mut properties = Map::new();
                properties.insert("kind".to_string(), JsonValue::from("edge"));
                properties.insert("edge".to_string(), JsonValue::from(edge.id.0));
                properties.insert("source".to_string(), JsonValue::from(edge.source.0));
                properties.insert("target".to_string(), JsonValue::from(edge.target.0));
                let coords = line_coordinates(&edge.polyline, simplify_tolerance);
                features.push(feature(features.len(), Value::LineString(coords), properties));
            }
        }

        let mut foreign_members = Map::new();
        foreign_members.insert("image_width".to_string(), JsonValue::from(self.image_width));
        foreign_members.insert("image_height".to_string(), JsonValue::from(self.image_height));
        foreign_members.insert("phase".to_string(), JsonValue::from(self.phase.to_string()));

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self, simplify_tolerance: Option<f64>) -> Result<String> {
        let geojson = self.to_geojson(simplify_tolerance)?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }

    /// Save as GeoJSON file
    pub fn save_geojson<P: AsRef<Path>>(&self, path: P, simplify_tolerance: Option<f64>) -> Result<()> {
        std::fs::write(path, self.to_geojson_string(simplify_tolerance)?)?;
        Ok(())
    }

    /// Parse a GeoJSON string produced by [`CaptureReport::to_geojson_string`]
    pub fn parse_geojson(json: &str) -> Result<FeatureCollection> {
        let geojson: geojson::GeoJson = json.parse()?;
        Ok(FeatureCollection::try_from(geojson)?)
    }
}
