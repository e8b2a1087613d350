//! Face swap pipeline
//!
//! Aligns the donor face onto the recipient, colour-matches it and blends
//! it in through a feathered mask covering both faces.

use image::{Rgb, Rgb32FImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::color::{correct_colours, COLOUR_CORRECT_BLUR_FRAC};
use crate::config::Config;
use crate::error::{FaceSwapError, Result};
use crate::geometry::solve_similarity_transform;
use crate::landmarks::{restrict_to_common_keys, EyeSide, LandmarkSet};
use crate::mask::{build_face_mask, combine_masks, DEFAULT_FEATHER_AMOUNT};
use crate::output::write_image;
use crate::transform::{warp_image, warp_onto};

/// Configured face swap pipeline. Holds settings only, no image state.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSwapper {
    feather_amount: u32,
    colour_correct_blur_frac: f64,
    jpeg_quality: u8,
}

impl Default for FaceSwapper {
    fn default() -> Self {
        Self {
            feather_amount: DEFAULT_FEATHER_AMOUNT,
            colour_correct_blur_frac: COLOUR_CORRECT_BLUR_FRAC,
            jpeg_quality: 95,
        }
    }
}

impl FaceSwapper {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            feather_amount: config.swap.feather_amount,
            colour_correct_blur_frac: config.swap.colour_correct_blur_frac,
            jpeg_quality: config.output.jpeg_quality,
        })
    }

    /// Composite the donor's face over the recipient's and return the result
    pub fn swap_faces(
        &self,
        recipient: &Rgb32FImage,
        donor: &Rgb32FImage,
        recipient_landmarks: &LandmarkSet,
        donor_landmarks: &LandmarkSet,
    ) -> Result<Rgb32FImage> {
        let (recipient_set, donor_set) = restrict_to_common_keys(recipient_landmarks, donor_landmarks)?;

        let recipient_left_eye = recipient_set.eye_points(EyeSide::Left);
        let donor_right_eye = donor_set.eye_points(EyeSide::Right);
        if recipient_left_eye.is_empty() || donor_right_eye.is_empty() {
            return Err(FaceSwapError::InsufficientLandmarks(format!(
                "matched landmarks lack an eye subset (left: {}, right: {})",
                recipient_left_eye.len(),
                donor_right_eye.len()
            )));
        }

        let recipient_points = recipient_set.points();
        let donor_points = donor_set.points();
        let shape = recipient.dimensions();

        // Donor frame -> recipient frame
        let transform = solve_similarity_transform(&recipient_points, &donor_points)?;

        let donor_mask: Rgb32FImage = build_face_mask(donor.dimensions(), &donor_points, self.feather_amount)?;
        let warped_mask = warp_image(&donor_mask, &transform, shape);
        let recipient_mask: Rgb32FImage = build_face_mask(shape, &recipient_points, self.feather_amount)?;
        let combined_mask = combine_masks(&recipient_mask, &warped_mask)?;

        // Pixels the donor does not reach keep the recipient's colour
        let mut warped_donor = recipient.clone();
        warp_onto(donor, &transform, &mut warped_donor);
        let donor_right_eye: Vec<_> = donor_right_eye.iter().map(|p| transform.apply(*p)).collect();
        let corrected = correct_colours(
            recipient,
            &warped_donor,
            &recipient_left_eye,
            &donor_right_eye,
            self.colour_correct_blur_frac,
        )?;

        debug!(
            "Blending {}x{} with {} matched landmarks",
            shape.0,
            shape.1,
            recipient_points.len()
        );
        Ok(alpha_blend(recipient, &corrected, &combined_mask))
    }

    /// Swap and write the result to `destination`, returning the path written
    pub fn swap_faces_to(
        &self,
        recipient: &Rgb32FImage,
        donor: &Rgb32FImage,
        recipient_landmarks: &LandmarkSet,
        donor_landmarks: &LandmarkSet,
        destination: &Path,
    ) -> Result<PathBuf> {
        let output = self.swap_faces(recipient, donor, recipient_landmarks, donor_landmarks)?;
        info!("Writing to: {:?}", destination);
        write_image(&output, destination, self.jpeg_quality)?;
        Ok(destination.to_path_buf())
    }
}

/// Swap with default settings and write the result to `destination`
pub fn swap_faces(
    recipient: &Rgb32FImage,
    donor: &Rgb32FImage,
    recipient_landmarks: &LandmarkSet,
    donor_landmarks: &LandmarkSet,
    destination: &Path,
) -> Result<PathBuf> {
    FaceSwapper::default().swap_faces_to(recipient, donor, recipient_landmarks, donor_landmarks, destination)
}

/// `base * (1 - mask) + overlay * mask`, per channel
fn alpha_blend(base: &Rgb32FImage, overlay: &Rgb32FImage, mask: &Rgb32FImage) -> Rgb32FImage {
    let mut out = Rgb32FImage::new(base.width(), base.height());
    for (((dst, b), o), m) in out
        .pixels_mut()
        .zip(base.pixels())
        .zip(overlay.pixels())
        .zip(mask.pixels())
    {
        *dst = Rgb([0, 1, 2].map(|c| b[c] * (1.0 - m[c]) + o[c] * m[c]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, Point};
    use crate::output::load_image;

    fn textured(width: u32, height: u32) -> Rgb32FImage {
        Rgb32FImage::from_fn(width, height, |x, y| {
            Rgb([
                60.0 + (x % 17) as f32 * 5.0,
                80.0 + (y % 13) as f32 * 6.0,
                100.0 + ((x + y) % 7) as f32 * 10.0,
            ])
        })
    }

    fn face_at(dx: f64, dy: f64, scale: f64) -> LandmarkSet {
        [
            (Landmark::LeftEye, (30.0, 40.0)),
            (Landmark::LeftEyePupil, (31.0, 40.0)),
            (Landmark::RightEye, (70.0, 40.0)),
            (Landmark::RightEyePupil, (69.0, 40.0)),
            (Landmark::NoseTip, (50.0, 60.0)),
            (Landmark::MouthLeft, (35.0, 78.0)),
            (Landmark::MouthRight, (65.0, 78.0)),
            (Landmark::ChinGnathion, (50.0, 95.0)),
            (Landmark::ForeheadGlabella, (50.0, 25.0)),
        ]
        .into_iter()
        .map(|(k, (x, y))| (k, Point::new(dx + x * scale, dy + y * scale)))
        .collect()
    }

    #[test]
    fn test_identical_inputs_reproduce_recipient() {
        let img = textured(120, 120);
        let landmarks = face_at(0.0, 0.0, 1.0);

        let out = FaceSwapper::default()
            .swap_faces(&img, &img, &landmarks, &landmarks)
            .unwrap();
        assert_eq!(out.dimensions(), img.dimensions());
        for (a, b) in out.iter().zip(img.iter()) {
            assert!((a - b).abs() < 0.05, "{a} vs {b}");
        }
    }

    #[test]
    fn test_disjoint_landmarks_fail_without_output() {
        let img = textured(40, 40);
        let a: LandmarkSet = [(Landmark::NoseTip, Point::new(10.0, 10.0))].into_iter().collect();
        let b: LandmarkSet = [(Landmark::ChinGnathion, Point::new(10.0, 10.0))].into_iter().collect();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("never.png");
        let result = swap_faces(&img, &img, &a, &b, &dest);

        assert!(matches!(result, Err(FaceSwapError::InsufficientLandmarks(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_eye_subset_fails() {
        let img = textured(60, 60);
        let landmarks: LandmarkSet = [
            (Landmark::NoseTip, Point::new(30.0, 30.0)),
            (Landmark::MouthLeft, Point::new(20.0, 40.0)),
            (Landmark::MouthRight, Point::new(40.0, 40.0)),
        ]
        .into_iter()
        .collect();

        assert!(matches!(
            FaceSwapper::default().swap_faces(&img, &img, &landmarks, &landmarks),
            Err(FaceSwapError::InsufficientLandmarks(_))
        ));
    }

    #[test]
    fn test_donor_face_lands_on_recipient_face() {
        // Recipient grey with the face at one place, donor red with a
        // smaller face elsewhere
        let recipient = Rgb32FImage::from_pixel(160, 160, Rgb([120.0, 120.0, 120.0]));
        let donor = Rgb32FImage::from_pixel(100, 100, Rgb([200.0, 40.0, 40.0]));
        let recipient_face = face_at(20.0, 30.0, 1.2);
        let donor_face = face_at(5.0, 0.0, 0.8);

        let out = FaceSwapper::default()
            .swap_faces(&recipient, &donor, &recipient_face, &donor_face)
            .unwrap();

        // Colour matching pulls the donor toward the recipient's local average
        let nose = recipient_face.get(Landmark::NoseTip).unwrap();
        let centre = out.get_pixel(nose.x as u32, nose.y as u32);
        assert!((centre[0] - 120.0).abs() < 1.0);

        // Far from the face the recipient is untouched
        assert_eq!(out.get_pixel(2, 2), recipient.get_pixel(2, 2));
        assert_eq!(out.get_pixel(157, 157), recipient.get_pixel(157, 157));
    }

    #[test]
    fn test_recipient_mask_beyond_donor_blends_recipient_with_itself() {
        // The donor is a narrow crop: its pixels stop at x = 59 while the
        // recipient mask reaches well past that
        let recipient = Rgb32FImage::from_pixel(120, 120, Rgb([150.0, 150.0, 150.0]));
        let donor = Rgb32FImage::from_pixel(60, 120, Rgb([150.0, 150.0, 150.0]));
        let landmarks = face_at(0.0, 0.0, 1.0);

        let recipient_mask: Rgb32FImage =
            build_face_mask(recipient.dimensions(), &landmarks.points(), DEFAULT_FEATHER_AMOUNT).unwrap();
        assert!(recipient_mask.get_pixel(64, 60)[0] > 0.99);

        let out = FaceSwapper::default()
            .swap_faces(&recipient, &donor, &landmarks, &landmarks)
            .unwrap();
        for (a, b) in out.iter().zip(recipient.iter()) {
            assert!((a - b).abs() < 0.05, "{a} vs {b}");
        }
    }

    #[test]
    fn test_square_face_mask_coverage() {
        let corners = |x0: f64, y0: f64| -> LandmarkSet {
            [
                (Landmark::LeftEye, Point::new(x0, y0)),
                (Landmark::RightEye, Point::new(x0 + 10.0, y0)),
                (Landmark::MouthRight, Point::new(x0 + 10.0, y0 + 10.0)),
                (Landmark::MouthLeft, Point::new(x0, y0 + 10.0)),
            ]
            .into_iter()
            .collect()
        };
        let recipient_face = corners(40.0, 40.0);
        let donor_face = corners(10.0, 15.0);

        let recipient = Rgb32FImage::from_pixel(90, 90, Rgb([50.0, 50.0, 50.0]));
        let donor = Rgb32FImage::from_pixel(40, 40, Rgb([50.0, 50.0, 50.0]));

        let transform =
            solve_similarity_transform(&recipient_face.points(), &donor_face.points()).unwrap();
        assert!((transform.scale() - 1.0).abs() < 1e-9);
        let t = transform.translation();
        assert!((t.x - 30.0).abs() < 1e-9 && (t.y - 25.0).abs() < 1e-9);

        let donor_mask: Rgb32FImage =
            build_face_mask(donor.dimensions(), &donor_face.points(), DEFAULT_FEATHER_AMOUNT).unwrap();
        let warped = warp_image(&donor_mask, &transform, recipient.dimensions());
        let recipient_mask: Rgb32FImage =
            build_face_mask(recipient.dimensions(), &recipient_face.points(), DEFAULT_FEATHER_AMOUNT)
                .unwrap();
        let combined = combine_masks(&recipient_mask, &warped).unwrap();

        for y in 41..50 {
            for x in 41..50 {
                assert!((combined.get_pixel(x, y)[0] - 1.0).abs() < 1e-5);
            }
        }
        for (x, y) in [(0, 0), (89, 0), (0, 89), (89, 89)] {
            assert_eq!(combined.get_pixel(x, y)[0], 0.0);
        }

        let out = FaceSwapper::default()
            .swap_faces(&recipient, &donor, &recipient_face, &donor_face)
            .unwrap();
        assert!((out.get_pixel(45, 45)[0] - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_swap_faces_writes_destination() {
        let img = textured(100, 110);
        let landmarks = face_at(0.0, 0.0, 1.0);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("swapped.png");

        let written = swap_faces(&img, &img, &landmarks, &landmarks, &dest).unwrap();
        assert_eq!(written, dest);

        let reloaded = load_image(&dest).unwrap();
        assert_eq!(reloaded.dimensions(), (100, 110));
        for (a, b) in reloaded.iter().zip(img.iter()) {
            assert!((a - b).abs() <= 1.0);
        }
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = Config::default();
        assert_eq!(FaceSwapper::from_config(&config).unwrap(), FaceSwapper::default());

        config.swap.feather_amount = 4;
        assert!(matches!(
            FaceSwapper::from_config(&config),
            Err(FaceSwapError::InvalidConfig(_))
        ));
    }
}
