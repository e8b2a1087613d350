//! Facial landmark vocabulary and landmark sets
//!
//! Landmarks arrive from an external detector as named pixel coordinates.
//! The names form a closed vocabulary, so they are modelled as an enum and
//! a detector document naming anything else is rejected at parse time.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FaceSwapError, Result};

/// A 2D point in image pixel space (x = column, y = row).
///
/// Detectors emitting proto3 JSON leave out zero coordinates, so a missing
/// field reads as 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Arithmetic mean of a point set, `None` when empty
    pub fn mean(points: &[Point]) -> Option<Point> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    #[inline]
    pub fn coords(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Point> for Point2<f64> {
    fn from(p: Point) -> Self {
        Point2::new(p.x, p.y)
    }
}

impl From<Point2<f64>> for Point {
    fn from(p: Point2<f64>) -> Self {
        Point::new(p.x, p.y)
    }
}

/// Named facial points reported by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Landmark {
    UnknownLandmark,
    LeftEye,
    RightEye,
    LeftOfLeftEyebrow,
    RightOfLeftEyebrow,
    LeftOfRightEyebrow,
    RightOfRightEyebrow,
    MidpointBetweenEyes,
    NoseTip,
    UpperLip,
    LowerLip,
    MouthLeft,
    MouthRight,
    MouthCenter,
    NoseBottomRight,
    NoseBottomLeft,
    NoseBottomCenter,
    LeftEyeTopBoundary,
    LeftEyeRightCorner,
    LeftEyeBottomBoundary,
    LeftEyeLeftCorner,
    RightEyeTopBoundary,
    RightEyeRightCorner,
    RightEyeBottomBoundary,
    RightEyeLeftCorner,
    LeftEyebrowUpperMidpoint,
    RightEyebrowUpperMidpoint,
    LeftEarTragion,
    RightEarTragion,
    LeftEyePupil,
    RightEyePupil,
    ForeheadGlabella,
    ChinGnathion,
    ChinLeftGonion,
    ChinRightGonion,
}

/// Which eye a landmark belongs to under prefix classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeSide {
    Left,
    Right,
}

impl EyeSide {
    fn prefix(&self) -> &'static str {
        match self {
            EyeSide::Left => "left_eye",
            EyeSide::Right => "right_eye",
        }
    }
}

impl Landmark {
    /// Every identifier, in detector type-code order
    pub const ALL: [Landmark; 35] = [
        Landmark::UnknownLandmark,
        Landmark::LeftEye,
        Landmark::RightEye,
        Landmark::LeftOfLeftEyebrow,
        Landmark::RightOfLeftEyebrow,
        Landmark::LeftOfRightEyebrow,
        Landmark::RightOfRightEyebrow,
        Landmark::MidpointBetweenEyes,
        Landmark::NoseTip,
        Landmark::UpperLip,
        Landmark::LowerLip,
        Landmark::MouthLeft,
        Landmark::MouthRight,
        Landmark::MouthCenter,
        Landmark::NoseBottomRight,
        Landmark::NoseBottomLeft,
        Landmark::NoseBottomCenter,
        Landmark::LeftEyeTopBoundary,
        Landmark::LeftEyeRightCorner,
        Landmark::LeftEyeBottomBoundary,
        Landmark::LeftEyeLeftCorner,
        Landmark::RightEyeTopBoundary,
        Landmark::RightEyeRightCorner,
        Landmark::RightEyeBottomBoundary,
        Landmark::RightEyeLeftCorner,
        Landmark::LeftEyebrowUpperMidpoint,
        Landmark::RightEyebrowUpperMidpoint,
        Landmark::LeftEarTragion,
        Landmark::RightEarTragion,
        Landmark::LeftEyePupil,
        Landmark::RightEyePupil,
        Landmark::ForeheadGlabella,
        Landmark::ChinGnathion,
        Landmark::ChinLeftGonion,
        Landmark::ChinRightGonion,
    ];

    /// Lowercase snake_case name, e.g. `left_eye_pupil`
    pub fn as_str(&self) -> &'static str {
        match self {
            Landmark::UnknownLandmark => "unknown_landmark",
            Landmark::LeftEye => "left_eye",
            Landmark::RightEye => "right_eye",
            Landmark::LeftOfLeftEyebrow => "left_of_left_eyebrow",
            Landmark::RightOfLeftEyebrow => "right_of_left_eyebrow",
            Landmark::LeftOfRightEyebrow => "left_of_right_eyebrow",
            Landmark::RightOfRightEyebrow => "right_of_right_eyebrow",
            Landmark::MidpointBetweenEyes => "midpoint_between_eyes",
            Landmark::NoseTip => "nose_tip",
            Landmark::UpperLip => "upper_lip",
            Landmark::LowerLip => "lower_lip",
            Landmark::MouthLeft => "mouth_left",
            Landmark::MouthRight => "mouth_right",
            Landmark::MouthCenter => "mouth_center",
            Landmark::NoseBottomRight => "nose_bottom_right",
            Landmark::NoseBottomLeft => "nose_bottom_left",
            Landmark::NoseBottomCenter => "nose_bottom_center",
            Landmark::LeftEyeTopBoundary => "left_eye_top_boundary",
            Landmark::LeftEyeRightCorner => "left_eye_right_corner",
            Landmark::LeftEyeBottomBoundary => "left_eye_bottom_boundary",
            Landmark::LeftEyeLeftCorner => "left_eye_left_corner",
            Landmark::RightEyeTopBoundary => "right_eye_top_boundary",
            Landmark::RightEyeRightCorner => "right_eye_right_corner",
            Landmark::RightEyeBottomBoundary => "right_eye_bottom_boundary",
            Landmark::RightEyeLeftCorner => "right_eye_left_corner",
            Landmark::LeftEyebrowUpperMidpoint => "left_eyebrow_upper_midpoint",
            Landmark::RightEyebrowUpperMidpoint => "right_eyebrow_upper_midpoint",
            Landmark::LeftEarTragion => "left_ear_tragion",
            Landmark::RightEarTragion => "right_ear_tragion",
            Landmark::LeftEyePupil => "left_eye_pupil",
            Landmark::RightEyePupil => "right_eye_pupil",
            Landmark::ForeheadGlabella => "forehead_glabella",
            Landmark::ChinGnathion => "chin_gnathion",
            Landmark::ChinLeftGonion => "chin_left_gonion",
            Landmark::ChinRightGonion => "chin_right_gonion",
        }
    }

    /// Classify by name prefix. Note the eyebrow midpoints match too
    /// (`left_eyebrow_...` starts with `left_eye`).
    pub fn eye_side(&self) -> Option<EyeSide> {
        let name = self.as_str();
        [EyeSide::Left, EyeSide::Right]
            .into_iter()
            .find(|side| name.starts_with(side.prefix()))
    }
}

impl std::fmt::Display for Landmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Landmark identifier -> pixel coordinate, iterated in vocabulary order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: BTreeMap<Landmark, Point>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, landmark: Landmark, point: Point) -> Option<Point> {
        self.points.insert(landmark, point)
    }

    pub fn get(&self, landmark: Landmark) -> Option<Point> {
        self.points.get(&landmark).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Landmark> + '_ {
        self.points.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Landmark, Point)> + '_ {
        self.points.iter().map(|(k, v)| (*k, *v))
    }

    /// All coordinates, in vocabulary order
    pub fn points(&self) -> Vec<Point> {
        self.points.values().copied().collect()
    }

    /// Coordinates of the landmarks classified as the given eye
    pub fn eye_points(&self, side: EyeSide) -> Vec<Point> {
        self.iter()
            .filter(|(landmark, _)| landmark.eye_side() == Some(side))
            .map(|(_, point)| point)
            .collect()
    }

    /// Subset restricted to the given keys
    fn retain_keys(&self, keep: &[Landmark]) -> LandmarkSet {
        let points = keep
            .iter()
            .filter_map(|k| self.points.get(k).map(|p| (*k, *p)))
            .collect();
        LandmarkSet { points }
    }
}

impl FromIterator<(Landmark, Point)> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = (Landmark, Point)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Restrict both sets to the landmarks they have in common.
///
/// The two returned sets share an identical key set, so their `points()`
/// come out pairwise aligned.
pub fn restrict_to_common_keys(
    a: &LandmarkSet,
    b: &LandmarkSet,
) -> Result<(LandmarkSet, LandmarkSet)> {
    let common: Vec<Landmark> = a.keys().filter(|k| b.points.contains_key(k)).collect();

    if common.is_empty() {
        return Err(FaceSwapError::InsufficientLandmarks(format!(
            "{} and {} landmarks share no identifiers",
            a.len(),
            b.len()
        )));
    }

    tracing::debug!(
        "Matched {} common landmarks ({} / {} available)",
        common.len(),
        a.len(),
        b.len()
    );

    Ok((a.retain_keys(&common), b.retain_keys(&common)))
}
