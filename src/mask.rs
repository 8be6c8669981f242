use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::{Error, Result};

/// Blends an RGBA mask on top of an image of the same size.
///
/// Each colour channel becomes `(1 - a) * image + a * mask`; the result has
/// no alpha channel.
pub fn apply_mask(image: &DynamicImage, mask: &DynamicImage) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    let (mask_width, mask_height) = mask.dimensions();
    if (width, height) != (mask_width, mask_height) {
        return Err(Error::MaskMismatch {
            mask_width,
            mask_height,
            width,
            height,
        });
    }

    let base = image.to_rgb8();
    let mask = mask.to_rgba8();
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let pixel = base.get_pixel(x, y);
        let overlay = mask.get_pixel(x, y);
        let alpha = overlay[3] as f32 / 255.0;
        Rgb([0, 1, 2].map(|c| {
            (pixel[c] as f32 * (1.0 - alpha) + overlay[c] as f32 * alpha).round() as u8
        }))
    }))
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    #[test]
    fn blends_by_mask_alpha() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 1, Rgb([100, 100, 100])));
        let mut mask = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        mask.put_pixel(1, 0, Rgba([200, 0, 50, 255]));
        let blended = apply_mask(&image, &DynamicImage::ImageRgba8(mask)).unwrap();
        assert_eq!(blended.get_pixel(0, 0), &Rgb([100, 100, 100]));
        assert_eq!(blended.get_pixel(1, 0), &Rgb([200, 0, 50]));
    }

    #[test]
    fn rejects_mismatched_mask() {
        let image = DynamicImage::new_rgb8(4, 4);
        let mask = DynamicImage::new_rgba8(2, 2);
        assert!(matches!(
            apply_mask(&image, &mask),
            Err(Error::MaskMismatch { .. })
        ));
    }
}
