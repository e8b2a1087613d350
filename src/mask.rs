//! Feathered face masks
//!
//! A mask is a float raster with opacity in [0, 1], built from a landmark
//! set by filling its convex hull and softening the edge.

use image::{ImageBuffer, Luma, Pixel};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::geometry::convex_hull;
use imageproc::point::Point as PixelPoint;

use crate::blur::gaussian_blur;
use crate::error::{FaceSwapError, Result};
use crate::landmarks::Point;

/// Default kernel extent of the feathering blur
pub const DEFAULT_FEATHER_AMOUNT: u32 = 11;

type MaskChannel = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Fill the hull of `points` with 1.0 on a zeroed single-channel raster
fn fill_hull(width: u32, height: u32, points: &[Point]) -> MaskChannel {
    let mut canvas = MaskChannel::new(width, height);
    if width == 0 || height == 0 {
        return canvas;
    }

    let mut vertices: Vec<PixelPoint<i32>> = points
        .iter()
        .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    vertices.sort_by_key(|p| (p.x, p.y));
    vertices.dedup();

    let mut poly = convex_hull(&vertices);
    poly.dedup();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    let on = Luma([1.0f32]);
    match poly.as_slice() {
        [] => {}
        [p] => {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                canvas.put_pixel(p.x as u32, p.y as u32, on);
            }
        }
        [a, b] => {
            draw_line_segment_mut(&mut canvas, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), on);
        }
        _ => draw_polygon_mut(&mut canvas, &poly, on),
    }
    canvas
}

/// Build a feathered mask of the convex hull of `points`.
///
/// The filled hull is blurred, every touched pixel is pushed back to 1.0,
/// and the result is blurred once more. The mask is zero outside the hull
/// grown by twice the blur radius, and the single channel is replicated
/// across all channels of `P`.
pub fn build_face_mask<P>(shape: (u32, u32), points: &[Point], feather_amount: u32) -> Result<ImageBuffer<P, Vec<f32>>>
where
    P: Pixel<Subpixel = f32>,
{
    if points.is_empty() {
        return Err(FaceSwapError::InsufficientLandmarks(
            "cannot build a face mask without landmarks".to_string(),
        ));
    }
    let (width, height) = shape;

    let filled = fill_hull(width, height, points);

    let mut single = gaussian_blur(&filled, feather_amount);
    for v in single.iter_mut() {
        *v = if *v > 0.0 { 1.0 } else { 0.0 };
    }
    let mut single = gaussian_blur(&single, feather_amount);
    for v in single.iter_mut() {
        *v = v.clamp(0.0, 1.0);
    }

    let channels = P::CHANNEL_COUNT as usize;
    let mut mask = ImageBuffer::<P, Vec<f32>>::new(width, height);
    for (dst, &v) in mask.chunks_exact_mut(channels).zip(single.iter()) {
        dst.fill(v);
    }

    tracing::debug!(
        "Built {}x{} face mask from {} points (feather {})",
        width,
        height,
        points.len(),
        feather_amount
    );

    Ok(mask)
}

/// Per-pixel, per-channel maximum of two masks of equal size
pub fn combine_masks<P>(a: &ImageBuffer<P, Vec<f32>>, b: &ImageBuffer<P, Vec<f32>>) -> Result<ImageBuffer<P, Vec<f32>>>
where
    P: Pixel<Subpixel = f32>,
{
    if a.dimensions() != b.dimensions() {
        return Err(FaceSwapError::ShapeMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        });
    }

    let mut combined = a.clone();
    for (dst, &other) in combined.iter_mut().zip(b.iter()) {
        *dst = dst.max(other);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + size, y0),
            Point::new(x0 + size, y0 + size),
            Point::new(x0, y0 + size),
        ]
    }

    #[test]
    fn test_interior_and_repeated_points_do_not_change_mask() {
        let plain: ImageBuffer<Luma<f32>, Vec<f32>> =
            build_face_mask((40, 40), &square(10.0, 10.0, 16.0), 5).unwrap();

        let mut pts = square(10.0, 10.0, 16.0);
        pts.push(Point::new(18.0, 18.0)); // interior
        pts.push(Point::new(18.0, 10.0)); // on an edge
        pts.push(Point::new(26.0, 26.0)); // repeated corner
        pts.push(Point::new(10.2, 9.8)); // rounds onto a corner
        let noisy: ImageBuffer<Luma<f32>, Vec<f32>> = build_face_mask((40, 40), &pts, 5).unwrap();

        assert_eq!(plain, noisy);
    }

    #[test]
    fn test_degenerate_hulls_still_mark_pixels() {
        let single: ImageBuffer<Luma<f32>, Vec<f32>> =
            build_face_mask((20, 20), &[Point::new(10.0, 10.0), Point::new(10.1, 9.9)], 3).unwrap();
        assert!(single.get_pixel(10, 10)[0] > 0.0);
        assert_eq!(single.get_pixel(0, 0)[0], 0.0);

        let line: ImageBuffer<Luma<f32>, Vec<f32>> = build_face_mask(
            (30, 30),
            &[Point::new(5.0, 15.0), Point::new(15.0, 15.0), Point::new(25.0, 15.0)],
            3,
        )
        .unwrap();
        for x in 5..=25 {
            assert!(line.get_pixel(x, 15)[0] > 0.0, "({x}, 15)");
        }
        assert_eq!(line.get_pixel(15, 0)[0], 0.0);
    }

    #[test]
    fn test_mask_shape_and_range() {
        let mask: ImageBuffer<Rgb<f32>, Vec<f32>> =
            build_face_mask((64, 48), &square(20.0, 15.0, 20.0), DEFAULT_FEATHER_AMOUNT).unwrap();
        assert_eq!(mask.dimensions(), (64, 48));
        assert!(mask.iter().all(|&v| (0.0..=1.0).contains(&v)));

        // Channels are replicated
        for px in mask.pixels() {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }

    #[test]
    fn test_mask_one_inside_zero_far_outside() {
        let mask: ImageBuffer<Luma<f32>, Vec<f32>> =
            build_face_mask((60, 60), &square(25.0, 25.0, 10.0), DEFAULT_FEATHER_AMOUNT).unwrap();

        // Strictly inside the square, and at its centroid
        for y in 26..35 {
            for x in 26..35 {
                assert!((mask.get_pixel(x, y)[0] - 1.0).abs() < 1e-6, "({x}, {y})");
            }
        }
        assert_eq!(mask.get_pixel(30, 30)[0], 1.0);

        // Corners are far from the hull
        for (x, y) in [(0, 0), (59, 0), (0, 59), (59, 59)] {
            assert_eq!(mask.get_pixel(x, y)[0], 0.0);
        }
    }

    #[test]
    fn test_mask_zero_beyond_feather_footprint() {
        let feather = 11u32;
        let radius = feather / 2;
        let mask: ImageBuffer<Luma<f32>, Vec<f32>> =
            build_face_mask((80, 80), &square(30.0, 30.0, 20.0), feather).unwrap();

        // Hull covers columns/rows 30..=50; two blurs grow it by 2 * radius
        let lo = 30 - 2 * radius;
        let hi = 50 + 2 * radius;
        for (x, y, px) in mask.enumerate_pixels() {
            if x < lo || x > hi || y < lo || y > hi {
                assert_eq!(px[0], 0.0, "({x}, {y})");
            }
        }
        assert!(mask.get_pixel(lo, 40)[0] > 0.0);
    }

    #[test]
    fn test_mask_hull_partially_outside_image() {
        let mask: ImageBuffer<Luma<f32>, Vec<f32>> =
            build_face_mask((40, 40), &square(-10.0, -10.0, 30.0), DEFAULT_FEATHER_AMOUNT).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 1.0);
        assert_eq!(mask.get_pixel(39, 39)[0], 0.0);
    }

    #[test]
    fn test_mask_requires_points() {
        let result: Result<ImageBuffer<Luma<f32>, Vec<f32>>> = build_face_mask((10, 10), &[], 11);
        assert!(matches!(result, Err(FaceSwapError::InsufficientLandmarks(_))));
    }

    #[test]
    fn test_combine_masks_is_pointwise_max() {
        let a: ImageBuffer<Rgb<f32>, Vec<f32>> =
            build_face_mask((50, 50), &square(5.0, 5.0, 15.0), 5).unwrap();
        let b: ImageBuffer<Rgb<f32>, Vec<f32>> =
            build_face_mask((50, 50), &square(15.0, 15.0, 20.0), 5).unwrap();

        let combined = combine_masks(&a, &b).unwrap();
        for ((c, x), y) in combined.iter().zip(a.iter()).zip(b.iter()) {
            assert_eq!(*c, x.max(*y));
        }
    }

    #[test]
    fn test_combine_masks_rejects_size_mismatch() {
        let a: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::new(10, 10);
        let b: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::new(10, 11);
        assert!(matches!(
            combine_masks(&a, &b),
            Err(FaceSwapError::ShapeMismatch { .. })
        ));
    }
}
