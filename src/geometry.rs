//! Similarity transform between two landmark sets
//!
//! Solves the orthogonal Procrustes problem: given paired points, find the
//! uniform scale, rotation and translation that carry one set onto the
//! other with minimal squared error.

use nalgebra::{Matrix2, Matrix3, Point2, Similarity2, UnitComplex, Vector2, SVD};

use crate::error::{FaceSwapError, Result};
use crate::landmarks::Point;

/// Spread below which a point set counts as collapsed onto its centroid
const MIN_STD_DEV: f64 = 1e-9;

/// Affine map `[sR | T; 0 0 1]` with uniform scale `s > 0` and a proper
/// rotation `R`. Reflections and shears cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix {
    similarity: Similarity2<f64>,
}

impl TransformMatrix {
    pub fn identity() -> Self {
        Self {
            similarity: Similarity2::identity(),
        }
    }

    /// Build from scale, rotation angle (radians) and translation
    pub fn new(scale: f64, angle: f64, translation: Point) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(FaceSwapError::DegenerateGeometry(format!(
                "scale must be positive and finite, got {}",
                scale
            )));
        }
        Ok(Self {
            similarity: Similarity2::new(translation.coords(), angle, scale),
        })
    }

    pub fn scale(&self) -> f64 {
        self.similarity.scaling()
    }

    /// Rotation angle in radians, in (-pi, pi]
    pub fn angle(&self) -> f64 {
        self.similarity.isometry.rotation.angle()
    }

    pub fn translation(&self) -> Point {
        let t = self.similarity.isometry.translation.vector;
        Point::new(t.x, t.y)
    }

    /// Homogeneous 3x3 form
    pub fn matrix(&self) -> Matrix3<f64> {
        self.similarity.to_homogeneous()
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        self.similarity.transform_point(&Point2::from(p)).into()
    }

    pub fn inverse(&self) -> Self {
        Self {
            similarity: self.similarity.inverse(),
        }
    }
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Centroid, pooled standard deviation and normalized coordinates
fn normalize(points: &[Point]) -> Result<(Vector2<f64>, f64, Vec<Vector2<f64>>)> {
    let n = points.len() as f64;
    let centroid = points
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + p.coords())
        / n;

    let centered: Vec<Vector2<f64>> = points.iter().map(|p| p.coords() - centroid).collect();

    // Pooled over both axes, not per-axis
    let variance = centered.iter().map(|v| v.norm_squared()).sum::<f64>() / (2.0 * n);
    let std_dev = variance.sqrt();

    if !(std_dev > MIN_STD_DEV) {
        return Err(FaceSwapError::DegenerateGeometry(
            "all points coincide; cannot normalize scale".to_string(),
        ));
    }

    let normalized = centered.into_iter().map(|v| v / std_dev).collect();
    Ok((centroid, std_dev, normalized))
}

/// Find the transform `M` minimizing `sum |M(points_b[i]) - points_a[i]|^2`.
///
/// `M` maps B's frame into A's frame. Both slices must be paired index by
/// index (see [`crate::landmarks::restrict_to_common_keys`]).
pub fn solve_similarity_transform(points_a: &[Point], points_b: &[Point]) -> Result<TransformMatrix> {
    if points_a.len() != points_b.len() {
        return Err(FaceSwapError::MismatchedPointSets {
            left: points_a.len(),
            right: points_b.len(),
        });
    }
    if points_a.len() < 2 {
        return Err(FaceSwapError::DegenerateGeometry(format!(
            "need at least 2 point pairs, got {}",
            points_a.len()
        )));
    }

    let (centroid_a, std_a, norm_a) = normalize(points_a)?;
    let (centroid_b, std_b, norm_b) = normalize(points_b)?;

    // Cross-covariance A^T * B
    let covariance = norm_a
        .iter()
        .zip(&norm_b)
        .fold(Matrix2::zeros(), |acc: Matrix2<f64>, (a, b)| acc + a * b.transpose());

    let svd = SVD::new(covariance, true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(FaceSwapError::DegenerateGeometry(
                "singular value decomposition failed".to_string(),
            ))
        }
    };

    // Keep det(R) = +1: flip the axis of the weakest singular value
    let mut correction = Matrix2::identity();
    if (u * v_t).determinant() < 0.0 {
        let weakest = if svd.singular_values[0] < svd.singular_values[1] {
            0
        } else {
            1
        };
        correction[(weakest, weakest)] = -1.0;
    }
    let r = u * correction * v_t;

    let angle = r[(1, 0)].atan2(r[(0, 0)]);
    let scale = std_a / std_b;
    let rotation = UnitComplex::new(angle);
    let translation = centroid_a - scale * (rotation * centroid_b);

    tracing::debug!(
        "Solved similarity: scale={:.4}, angle={:.2} deg, translation=({:.1}, {:.1})",
        scale,
        angle.to_degrees(),
        translation.x,
        translation.y
    );

    TransformMatrix::new(scale, angle, Point::new(translation.x, translation.y))
}
