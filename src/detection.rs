//! Detector output: bounding boxes and landmarks per face
//!
//! Landmark detection itself happens elsewhere. This module models what a
//! detector hands over and provides a file-backed [`LandmarkDetector`] that
//! reads the detector's JSON output.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::FaceSwapError;
use crate::landmarks::{LandmarkSet, Point};

/// Axis-aligned face region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub upper_left: Point,
    pub lower_right: Point,
}

impl BoundingBox {
    pub fn new(upper_left: Point, lower_right: Point) -> Self {
        Self {
            upper_left,
            lower_right,
        }
    }

    /// Smallest box holding all vertices of a detector polygon
    pub fn enclosing(vertices: &[Point]) -> Option<Self> {
        let first = vertices.first()?;
        let (mut min, mut max) = (*first, *first);
        for v in vertices {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
        }
        Some(Self::new(min, max))
    }

}

/// One detected face
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceFeatures {
    /// Polygon around the entire face
    pub outer_bound: Option<BoundingBox>,
    /// Polygon around the skin region only
    pub inner_bound: Option<BoundingBox>,
    pub landmarks: LandmarkSet,
}

/// Which detector box a face region comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingBoxSource {
    Outer(BoundingBox),
    Inner(BoundingBox),
    None,
}

impl BoundingBoxSource {
    /// Prefer the outer box, fall back to the inner one
    pub fn from_features(features: &FaceFeatures) -> Self {
        match (features.outer_bound, features.inner_bound) {
            (Some(outer), _) => BoundingBoxSource::Outer(outer),
            (None, Some(inner)) => BoundingBoxSource::Inner(inner),
            (None, None) => BoundingBoxSource::None,
        }
    }

    pub fn resolve(self) -> std::result::Result<BoundingBox, FaceSwapError> {
        match self {
            BoundingBoxSource::Outer(bbox) | BoundingBoxSource::Inner(bbox) => Ok(bbox),
            BoundingBoxSource::None => Err(FaceSwapError::UnsupportedBoundingBox),
        }
    }
}

/// Source of face features for an image
pub trait LandmarkDetector {
    fn detect(&self, image: &Path) -> Result<Vec<FaceFeatures>>;
}

#[derive(Debug, Deserialize)]
struct RawFace {
    #[serde(default)]
    outer_bound: Vec<Point>,
    #[serde(default)]
    inner_bound: Vec<Point>,
    landmarks: LandmarkSet,
}

impl From<RawFace> for FaceFeatures {
    fn from(raw: RawFace) -> Self {
        Self {
            outer_bound: BoundingBox::enclosing(&raw.outer_bound),
            inner_bound: BoundingBox::enclosing(&raw.inner_bound),
            landmarks: raw.landmarks,
        }
    }
}

/// Parse a detector JSON document: a single face object or an array of them
pub fn parse_detections(json: &str) -> Result<Vec<FaceFeatures>> {
    let value: serde_json::Value = serde_json::from_str(json).context("Invalid detector JSON")?;
    let faces: Vec<RawFace> = if value.is_array() {
        serde_json::from_value(value).context("Invalid face list")?
    } else {
        vec![serde_json::from_value(value).context("Invalid face object")?]
    };
    Ok(faces.into_iter().map(FaceFeatures::from).collect())
}

/// Reads detector output saved as JSON, by default from `<image>.json`
#[derive(Debug, Clone, Default)]
pub struct JsonDetections {
    overrides: HashMap<PathBuf, PathBuf>,
}

impl JsonDetections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read features for `image` from `features` instead of the sidecar file
    pub fn with_override(mut self, image: impl Into<PathBuf>, features: impl Into<PathBuf>) -> Self {
        self.overrides.insert(image.into(), features.into());
        self
    }

    pub fn features_path(&self, image: &Path) -> PathBuf {
        self.overrides
            .get(image)
            .cloned()
            .unwrap_or_else(|| image.with_extension("json"))
    }
}

impl LandmarkDetector for JsonDetections {
    fn detect(&self, image: &Path) -> Result<Vec<FaceFeatures>> {
        let path = self.features_path(image);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read detections from {:?}", path))?;
        let faces = parse_detections(&content)
            .with_context(|| format!("Failed to parse detections from {:?}", path))?;
        tracing::debug!("Loaded {} face(s) for {:?} from {:?}", faces.len(), image, path);
        Ok(faces)
    }
}

/// First face with a usable bounding box; others are logged and skipped
pub fn select_face(faces: Vec<FaceFeatures>, label: &str) -> Option<FaceFeatures> {
    for (index, face) in faces.into_iter().enumerate() {
        match BoundingBoxSource::from_features(&face).resolve() {
            Ok(bbox) => {
                tracing::info!(
                    "Using face {} in {} (box {:?} to {:?}, {} landmarks)",
                    index,
                    label,
                    bbox.upper_left,
                    bbox.lower_right,
                    face.landmarks.len()
                );
                return Some(face);
            }
            Err(e) => tracing::warn!("Skipping face {} in {}: {}", index, label, e),
        }
    }
    None
}
