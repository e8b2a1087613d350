// Raster encoding and output
//
// Intermediate rasters are `Rgb32FImage` on the 0-255 scale. Colour
// correction and blending can push values outside that range, so encoding
// clamps and rounds back to 8 bits per channel.

use image::{ImageFormat, ImageOutputFormat, Rgb, Rgb32FImage, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{FaceSwapError, Result};

/// Widen an 8-bit image to floats without normalizing
pub fn to_float(image: &RgbImage) -> Rgb32FImage {
    let (width, height) = image.dimensions();
    Rgb32FImage::from_fn(width, height, |x, y| {
        Rgb(image.get_pixel(x, y).0.map(f32::from))
    })
}

/// Clamp to [0, 255] and round to 8 bits per channel
pub fn to_u8(image: &Rgb32FImage) -> RgbImage {
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let px = image.get_pixel(x, y);
        Rgb(px.0.map(quantize))
    })
}

#[inline]
fn quantize(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

/// Decode any supported image file into a float RGB raster
pub fn load_image(path: &Path) -> image::ImageResult<Rgb32FImage> {
    let decoded = image::open(path)?;
    Ok(to_float(&decoded.to_rgb8()))
}

/// Encode `image` in the format implied by the path extension and write it.
///
/// The file is flushed and closed on every path; a partially written file
/// is removed again.
pub fn write_image(image: &Rgb32FImage, path: &Path, jpeg_quality: u8) -> Result<()> {
    let fail = |source: image::ImageError| FaceSwapError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    let format = ImageFormat::from_path(path).map_err(fail)?;
    let encoded = to_u8(image);

    let file = File::create(path).map_err(|e| fail(image::ImageError::IoError(e)))?;
    let mut writer = BufWriter::new(file);

    let result = match format {
        ImageFormat::Jpeg => encoded.write_to(&mut writer, ImageOutputFormat::Jpeg(jpeg_quality)),
        other => encoded.write_to(&mut writer, other),
    }
    .and_then(|_| writer.flush().map_err(image::ImageError::IoError));
    drop(writer);

    if let Err(source) = result {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Could not remove partial output {:?}: {}", path, e);
        }
        return Err(fail(source));
    }

    info!(
        "Wrote {}x{} image to {:?}",
        image.width(),
        image.height(),
        path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_clamps_and_rounds() {
        assert_eq!(quantize(-12.0), 0);
        assert_eq!(quantize(300.0), 255);
        assert_eq!(quantize(127.6), 128);
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn test_u8_float_round_trip() {
        let img = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8 * 60, y as u8 * 80, 7]));
        let float = to_float(&img);
        assert_eq!(float.get_pixel(3, 2), &Rgb([180.0, 160.0, 7.0]));
        assert_eq!(to_u8(&float), img);
    }

    #[test]
    fn test_write_png_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let img = Rgb32FImage::from_pixel(6, 5, Rgb([10.0, 300.0, -4.0]));

        write_image(&img, &path, 95).unwrap();
        let reloaded = load_image(&path).unwrap();
        assert_eq!(reloaded.get_pixel(2, 2), &Rgb([10.0, 255.0, 0.0]));
    }

    #[test]
    fn test_write_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let img = Rgb32FImage::from_pixel(16, 16, Rgb([120.0, 80.0, 40.0]));

        write_image(&img, &path, 90).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unknown_extension_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.unknownext");
        let img = Rgb32FImage::new(2, 2);

        assert!(matches!(
            write_image(&img, &path, 95),
            Err(FaceSwapError::OutputWrite { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.png");
        let img = Rgb32FImage::new(2, 2);

        assert!(matches!(
            write_image(&img, &path, 95),
            Err(FaceSwapError::OutputWrite { .. })
        ));
    }
}
