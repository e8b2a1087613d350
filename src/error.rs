//! Error types for the face-swap core

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FaceSwapError>;

#[derive(Debug, Error)]
pub enum FaceSwapError {
    /// No overlapping landmarks, or a required eye subset came out empty
    #[error("no overlapping landmarks: {0}")]
    InsufficientLandmarks(String),

    /// Point set without spread (all points coincide) or otherwise unsolvable
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Paired point sequences of different lengths
    #[error("point sets differ in length ({left} vs {right})")]
    MismatchedPointSets { left: usize, right: usize },

    /// Neither the outer nor the inner bounding box was detected
    #[error("face has neither an outer nor an inner bounding box")]
    UnsupportedBoundingBox,

    /// Two rasters that must share dimensions do not
    #[error("raster size mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Encoding or writing the final raster failed
    #[error("failed to write output image to {path:?}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
