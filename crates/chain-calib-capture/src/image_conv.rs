//! Conversion of raw image messages to the detector's single-channel input.

use crate::ImageError;
use chain_calib_core::{Image, ImageEncoding};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};

/// Convert an image message to an 8-bit grayscale buffer.
///
/// Row padding (`step` larger than the pixel row) is stripped. Color inputs
/// are converted with the `image` crate's luma weights; 16-bit mono is
/// rescaled to 8 bits.
pub fn to_mono8(img: &Image) -> Result<GrayImage, ImageError> {
    let (w, h) = (img.width, img.height);
    if w == 0 || h == 0 {
        return Err(ImageError::Empty);
    }
    let row_bytes = w as usize * img.encoding.pixel_size();
    let mut packed = packed_rows(img, row_bytes)?;
    let expected = row_bytes * h as usize;
    let actual = packed.len();

    let dynamic = match img.encoding {
        ImageEncoding::Mono8 => {
            return GrayImage::from_raw(w, h, packed).ok_or(buffer_error(expected, actual));
        }
        ImageEncoding::Mono16 => {
            let values: Vec<u16> = packed
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            ImageBuffer::<Luma<u16>, _>::from_raw(w, h, values).map(DynamicImage::ImageLuma16)
        }
        ImageEncoding::Rgb8 => RgbImage::from_raw(w, h, packed).map(DynamicImage::ImageRgb8),
        ImageEncoding::Bgr8 => {
            packed.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
            RgbImage::from_raw(w, h, packed).map(DynamicImage::ImageRgb8)
        }
        ImageEncoding::Rgba8 => RgbaImage::from_raw(w, h, packed).map(DynamicImage::ImageRgba8),
        ImageEncoding::Bgra8 => {
            packed.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
            RgbaImage::from_raw(w, h, packed).map(DynamicImage::ImageRgba8)
        }
    };
    dynamic
        .map(|d| d.to_luma8())
        .ok_or(buffer_error(expected, actual))
}

fn buffer_error(expected: usize, actual: usize) -> ImageError {
    ImageError::BufferTooSmall { expected, actual }
}

/// Copy the pixel rows out of `img.data`, dropping per-row padding.
fn packed_rows(img: &Image, row_bytes: usize) -> Result<Vec<u8>, ImageError> {
    let step = img.step as usize;
    if step < row_bytes {
        return Err(ImageError::StepTooSmall { step, row_bytes });
    }
    let h = img.height as usize;
    let needed = step * (h - 1) + row_bytes;
    if img.data.len() < needed {
        return Err(buffer_error(needed, img.data.len()));
    }
    if step == row_bytes {
        return Ok(img.data[..row_bytes * h].to_vec());
    }
    let mut out = Vec::with_capacity(row_bytes * h);
    for row in 0..h {
        let start = row * step;
        out.extend_from_slice(&img.data[start..start + row_bytes]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_calib_core::Header;

    fn image(encoding: ImageEncoding, w: u32, h: u32, data: Vec<u8>) -> Image {
        Image::packed(Header::default(), w, h, encoding, data)
    }

    #[test]
    fn mono8_passes_through() {
        let img = image(ImageEncoding::Mono8, 2, 2, vec![0, 50, 100, 255]);
        let gray = to_mono8(&img).unwrap();
        assert_eq!(gray.as_raw(), &vec![0, 50, 100, 255]);
    }

    #[test]
    fn row_padding_is_stripped() {
        let mut img = image(ImageEncoding::Mono8, 2, 2, vec![1, 2, 99, 3, 4, 99]);
        img.step = 3;
        let gray = to_mono8(&img).unwrap();
        assert_eq!(gray.as_raw(), &vec![1, 2, 3, 4]);
    }

    #[test]
    fn rgb_and_bgr_agree() {
        let rgb = image(ImageEncoding::Rgb8, 2, 1, vec![255, 0, 0, 0, 0, 255]);
        let bgr = image(ImageEncoding::Bgr8, 2, 1, vec![0, 0, 255, 255, 0, 0]);
        let a = to_mono8(&rgb).unwrap();
        let b = to_mono8(&bgr).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
        // red is brighter than blue under luma weights
        assert!(a.get_pixel(0, 0)[0] > a.get_pixel(1, 0)[0]);
    }

    #[test]
    fn white_stays_white() {
        let rgba = image(ImageEncoding::Rgba8, 1, 1, vec![255, 255, 255, 255]);
        assert_eq!(to_mono8(&rgba).unwrap().get_pixel(0, 0)[0], 255);

        let mono16 = image(ImageEncoding::Mono16, 1, 1, vec![0xff, 0xff]);
        assert_eq!(to_mono8(&mono16).unwrap().get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let img = image(ImageEncoding::Rgb8, 2, 2, vec![0; 5]);
        assert_eq!(
            to_mono8(&img),
            Err(ImageError::BufferTooSmall {
                expected: 12,
                actual: 5
            })
        );
        let img = image(ImageEncoding::Mono8, 0, 2, Vec::new());
        assert_eq!(to_mono8(&img), Err(ImageError::Empty));
    }
}
