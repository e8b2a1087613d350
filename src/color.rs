//! Colour matching between donor and recipient
//!
//! The donor's local average colour is rescaled to the recipient's. The
//! locality is a Gaussian blur whose extent follows the eye separation, so
//! the correction adapts to how large the face is in the image.

use image::{ImageBuffer, Pixel};

use crate::blur::gaussian_blur;
use crate::error::{FaceSwapError, Result};
use crate::landmarks::Point;

/// Default fraction of the eye separation used as colour blur extent
pub const COLOUR_CORRECT_BLUR_FRAC: f64 = 0.6;

/// Blurred donor values at or below this are offset before dividing
const DIVISOR_FLOOR: f32 = 1.0;
const DIVISOR_OFFSET: f32 = 128.0;

/// Odd blur extent from the distance between the two eye centres
pub fn blur_amount(left_eye: &[Point], right_eye: &[Point], fraction: f64) -> Result<u32> {
    let left = Point::mean(left_eye).ok_or_else(|| {
        FaceSwapError::InsufficientLandmarks("no left-eye landmarks for colour correction".to_string())
    })?;
    let right = Point::mean(right_eye).ok_or_else(|| {
        FaceSwapError::InsufficientLandmarks("no right-eye landmarks for colour correction".to_string())
    })?;

    let amount = (fraction * left.distance(&right)).round().max(1.0) as u32;
    Ok(if amount % 2 == 0 { amount + 1 } else { amount })
}

/// Rescale `warped_donor` so its local average colour matches `recipient`.
///
/// `recipient_left_eye` and `donor_right_eye` must be in the recipient's
/// coordinate frame.
pub fn correct_colours<P>(
    recipient: &ImageBuffer<P, Vec<f32>>,
    warped_donor: &ImageBuffer<P, Vec<f32>>,
    recipient_left_eye: &[Point],
    donor_right_eye: &[Point],
    fraction: f64,
) -> Result<ImageBuffer<P, Vec<f32>>>
where
    P: Pixel<Subpixel = f32>,
{
    if recipient.dimensions() != warped_donor.dimensions() {
        return Err(FaceSwapError::ShapeMismatch {
            expected: recipient.dimensions(),
            actual: warped_donor.dimensions(),
        });
    }

    let ksize = blur_amount(recipient_left_eye, donor_right_eye, fraction)?;
    tracing::debug!("Colour correction blur extent: {}", ksize);

    let recipient_blur = gaussian_blur(recipient, ksize);
    let donor_blur = gaussian_blur(warped_donor, ksize);

    let mut corrected = warped_donor.clone();
    for ((value, &target), &local) in corrected
        .iter_mut()
        .zip(recipient_blur.iter())
        .zip(donor_blur.iter())
    {
        let divisor = if local <= DIVISOR_FLOOR {
            local + DIVISOR_OFFSET
        } else {
            local
        };
        *value = (*value as f64 * target as f64 / divisor as f64) as f32;
    }

    Ok(corrected)
}
