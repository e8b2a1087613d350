//! Separable Gaussian blur with a fixed kernel extent
//!
//! Kernel extent is given explicitly (odd, in pixels) and sigma is derived
//! from it the way OpenCV does for `sigma = 0`. Borders reflect without
//! repeating the edge pixel (`dcb|abcd|cba`).

use image::{ImageBuffer, Pixel};

/// Fixed kernels OpenCV uses for small extents when sigma is derived
const SMALL_KERNELS: [&[f64]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
];

/// Normalized 1D Gaussian weights for an odd kernel extent
pub fn gaussian_kernel(ksize: u32) -> Vec<f64> {
    // Even extents are rounded up to the next odd one
    let ksize = (ksize.max(1) | 1) as usize;
    if let Some(fixed) = SMALL_KERNELS.get(ksize / 2) {
        return fixed.to_vec();
    }

    let sigma = 0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (ksize / 2) as f64;
    let mut kernel: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// Reflect-101 border index for an axis of length `n`
#[inline]
fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let i = i.rem_euclid(period);
    (if i >= n { period - i } else { i }) as usize
}

/// Blur every channel of a float raster with a `ksize x ksize` Gaussian
pub fn gaussian_blur<P>(image: &ImageBuffer<P, Vec<f32>>, ksize: u32) -> ImageBuffer<P, Vec<f32>>
where
    P: Pixel<Subpixel = f32>,
{
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let channels = P::CHANNEL_COUNT as usize;

    let mut out = ImageBuffer::<P, Vec<f32>>::new(width, height);
    if w == 0 || h == 0 {
        return out;
    }

    let kernel = gaussian_kernel(ksize);
    let radius = (kernel.len() / 2) as isize;
    let src: &[f32] = image;
    let stride = w * channels;

    // Accumulate in f64 so a constant region stays exactly constant
    let mut horizontal = vec![0.0f32; src.len()];
    for y in 0..h {
        let row = y * stride;
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0f64;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as isize + k as isize - radius, w);
                    acc += weight * src[row + sx * channels + c] as f64;
                }
                horizontal[row + x * channels + c] = acc as f32;
            }
        }
    }

    let dst: &mut [f32] = &mut out;
    for y in 0..h {
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0f64;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as isize + k as isize - radius, h);
                    acc += weight * horizontal[sy * stride + x * channels + c] as f64;
                }
                dst[y * stride + x * channels + c] = acc as f32;
            }
        }
    }

    out
}
