//! Inverse-map image warping
//!
//! Each destination pixel is mapped back through the inverse of the
//! transform and sampled from the source with bilinear interpolation.
//! Destination pixels whose source coordinate falls outside the source
//! raster are left untouched (transparent border).

use image::{ImageBuffer, Pixel};

use crate::geometry::TransformMatrix;
use crate::landmarks::Point;

/// Slack for coordinates that land on the border up to rounding error
const EDGE_TOLERANCE: f64 = 1e-6;

/// Warp `source` into a fresh zeroed raster of `dest_shape`
pub fn warp_image<P>(
    source: &ImageBuffer<P, Vec<f32>>,
    transform: &TransformMatrix,
    dest_shape: (u32, u32),
) -> ImageBuffer<P, Vec<f32>>
where
    P: Pixel<Subpixel = f32>,
{
    let mut dest = ImageBuffer::new(dest_shape.0, dest_shape.1);
    warp_onto(source, transform, &mut dest);
    dest
}

/// Warp `source` onto an existing raster, keeping its pixels wherever the
/// source does not reach
pub fn warp_onto<P>(
    source: &ImageBuffer<P, Vec<f32>>,
    transform: &TransformMatrix,
    dest: &mut ImageBuffer<P, Vec<f32>>,
) where
    P: Pixel<Subpixel = f32>,
{
    let (src_w, src_h) = source.dimensions();
    let (dst_w, dst_h) = dest.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    if src_w == 0 || src_h == 0 {
        return;
    }

    let inverse = transform.inverse();
    let src: &[f32] = source;
    let dst: &mut [f32] = dest;
    let dst_stride = dst_w as usize * channels;

    let mut written = 0usize;
    for dst_y in 0..dst_h as usize {
        for dst_x in 0..dst_w as usize {
            // Map destination pixel to source coordinates
            let s = inverse.apply(Point::new(dst_x as f64, dst_y as f64));

            let offset = dst_y * dst_stride + dst_x * channels;
            let out = &mut dst[offset..offset + channels];
            if bilinear_sample(src, src_w as usize, src_h as usize, channels, s.x, s.y, out) {
                written += 1;
            }
        }
    }

    tracing::debug!(
        "Warped {}x{} -> {}x{} ({} of {} pixels covered)",
        src_w,
        src_h,
        dst_w,
        dst_h,
        written,
        dst_w as usize * dst_h as usize
    );
}

/// Bilinear sample at (x, y) into `out`; returns false and leaves `out`
/// alone when the coordinate lies outside the raster
#[inline]
fn bilinear_sample(
    src: &[f32],
    width: usize,
    height: usize,
    channels: usize,
    x: f64,
    y: f64,
    out: &mut [f32],
) -> bool {
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    if !(x >= -EDGE_TOLERANCE && x <= max_x + EDGE_TOLERANCE && y >= -EDGE_TOLERANCE && y <= max_y + EDGE_TOLERANCE) {
        return false;
    }

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let stride = width * channels;
    for (c, value) in out.iter_mut().enumerate() {
        let p00 = src[y0 * stride + x0 * channels + c] as f64;
        let p10 = src[y0 * stride + x1 * channels + c] as f64;
        let p01 = src[y1 * stride + x0 * channels + c] as f64;
        let p11 = src[y1 * stride + x1 * channels + c] as f64;

        // Exact at integer coordinates
        let top = p00 + fx * (p10 - p00);
        let bottom = p01 + fx * (p11 - p01);
        *value = (top + fy * (bottom - top)) as f32;
    }
    true
}
