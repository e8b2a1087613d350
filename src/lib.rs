//! faceswap - landmark-driven face alignment and compositing
//!
//! Given two images and the facial landmarks detected in each, this crate
//! aligns the donor face onto the recipient with a similarity transform,
//! builds a feathered mask over both faces, matches the donor's colour to
//! the recipient's lighting and blends the result.
//!
//! Landmark detection is not done here; a [`detection::LandmarkDetector`]
//! supplies it.

pub mod blur;
pub mod color;
pub mod compositor;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod landmarks;
pub mod mask;
pub mod output;
pub mod transform;

pub use compositor::{swap_faces, FaceSwapper};
pub use config::Config;
pub use error::{FaceSwapError, Result};
pub use landmarks::{Landmark, LandmarkSet, Point};
