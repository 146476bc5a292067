//! Brightness, contrast and saturation adjustment
//!
//! A linear transform `out = in × contrast + brightness` runs over the color
//! channels, then saturation is scaled in HSV space. Any alpha channel is
//! split off first and reattached unchanged; masks and faces play no role
//! here.

use crate::error::{PhotoError, Result};
use image::{DynamicImage, Rgba, RgbaImage};

/// Inclusive brightness range accepted by [`adjust`]
pub const BRIGHTNESS_RANGE: (i32, i32) = (-100, 100);

/// Adjust brightness, contrast and saturation of an image
///
/// `brightness` is an additive offset in [-100, 100]; `contrast` and
/// `saturation` are multipliers. `adjust(img, 0, 1.0, 1.0)` is the identity
/// transform up to rounding.
///
/// # Errors
/// Returns `PhotoError::InvalidInput` for empty images, out-of-range
/// brightness, or negative/non-finite multipliers.
pub fn adjust(
    image: &DynamicImage,
    brightness: i32,
    contrast: f32,
    saturation: f32,
) -> Result<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PhotoError::invalid_input("Cannot adjust an empty image"));
    }
    if brightness < BRIGHTNESS_RANGE.0 || brightness > BRIGHTNESS_RANGE.1 {
        return Err(PhotoError::invalid_input(format!(
            "Brightness must be in [{}, {}], got {brightness}",
            BRIGHTNESS_RANGE.0, BRIGHTNESS_RANGE.1
        )));
    }
    if contrast < 0.0 || !contrast.is_finite() {
        return Err(PhotoError::invalid_input(format!(
            "Contrast multiplier must be non-negative and finite, got {contrast}"
        )));
    }
    if saturation < 0.0 || !saturation.is_finite() {
        return Err(PhotoError::invalid_input(format!(
            "Saturation multiplier must be non-negative and finite, got {saturation}"
        )));
    }

    let has_alpha = image.color().has_alpha();
    let rgba = image.to_rgba8();
    let mut out = RgbaImage::new(rgba.width(), rgba.height());

    let brightness = brightness as f32;
    let scale_saturation = (saturation - 1.0).abs() > f32::EPSILON;

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let transform =
            |c: u8| -> f32 { (f32::from(c) * contrast + brightness).clamp(0.0, 255.0) };
        let (mut r, mut g, mut b) = (transform(pixel[0]), transform(pixel[1]), transform(pixel[2]));

        if scale_saturation {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (nr, ng, nb) = hsv_to_rgb(h, (s * saturation).clamp(0.0, 1.0), v);
            (r, g, b) = (nr, ng, nb);
        }

        out.put_pixel(
            x,
            y,
            Rgba([
                r.round() as u8,
                g.round() as u8,
                b.round() as u8,
                // Alpha is split off and passes through untouched
                pixel[3],
            ]),
        );
    }

    if has_alpha {
        Ok(DynamicImage::ImageRgba8(out))
    } else {
        Ok(DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(out).to_rgb8()))
    }
}

/// RGB (0..=255 floats) → HSV with H ∈ [0, 360), S, V ∈ [0, 1]
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta < f32::EPSILON {
        0.0
    } else if (max - r).abs() < f32::EPSILON {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() < f32::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max < f32::EPSILON { 0.0 } else { delta / max };
    (hue, saturation, max)
}

/// HSV (H ∈ [0, 360), S, V ∈ [0, 1]) → RGB as 0..=255 floats
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - (h_prime.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    ((r1 + m) * 255.0, (g1 + m) * 255.0, (b1 + m) * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 11 % 256) as u8, (y * 17 % 256) as u8, ((x + y) * 7 % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_identity_up_to_rounding() {
        let image = gradient(32, 32);
        let adjusted = adjust(&image, 0, 1.0, 1.0).unwrap();
        let (a, b) = (image.to_rgb8(), adjusted.to_rgb8());
        for (pa, pb) in a.pixels().zip(b.pixels()) {
            for c in 0..3 {
                assert!((i16::from(pa[c]) - i16::from(pb[c])).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_brightness_shifts_values() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([100, 100, 100])));
        let brighter = adjust(&image, 50, 1.0, 1.0).unwrap().to_rgb8();
        assert!(brighter.pixels().all(|p| *p == Rgb([150, 150, 150])));

        let darker = adjust(&image, -50, 1.0, 1.0).unwrap().to_rgb8();
        assert!(darker.pixels().all(|p| *p == Rgb([50, 50, 50])));
    }

    #[test]
    fn test_brightness_clamps_at_channel_bounds() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([230, 230, 230])));
        let out = adjust(&image, 100, 1.0, 1.0).unwrap().to_rgb8();
        assert!(out.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_contrast_stretches_around_zero() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([60, 120, 200])));
        let out = adjust(&image, 0, 1.5, 1.0).unwrap().to_rgb8();
        assert!(out.pixels().all(|p| *p == Rgb([90, 180, 255])));
    }

    #[test]
    fn test_saturation_zero_produces_gray() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 50, 50])));
        let out = adjust(&image, 0, 1.0, 0.0).unwrap().to_rgb8();
        for pixel in out.pixels() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }

    #[test]
    fn test_saturation_boost_keeps_hue() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([180, 120, 120])));
        let out = adjust(&image, 0, 1.0, 1.5).unwrap().to_rgb8();
        let pixel = out.get_pixel(0, 0);
        // Red stays dominant and the spread widens
        assert!(pixel[0] > pixel[1]);
        assert!(i16::from(pixel[0]) - i16::from(pixel[1]) > 60);
        assert_eq!(pixel[1], pixel[2]);
    }

    #[test]
    fn test_alpha_passes_through_unchanged() {
        let mut rgba = RgbaImage::new(4, 4);
        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            *pixel = Rgba([100, 150, 200, ((x + y * 4) * 16) as u8]);
        }
        let image = DynamicImage::ImageRgba8(rgba.clone());
        let out = adjust(&image, 20, 1.2, 0.8).unwrap();

        assert!(out.color().has_alpha());
        let out_rgba = out.to_rgba8();
        for (before, after) in rgba.pixels().zip(out_rgba.pixels()) {
            assert_eq!(before[3], after[3]);
        }
    }

    #[test]
    fn test_rgb_image_stays_rgb() {
        let out = adjust(&gradient(8, 8), 10, 1.0, 1.0).unwrap();
        assert!(!out.color().has_alpha());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let image = gradient(4, 4);
        assert!(adjust(&image, 101, 1.0, 1.0).is_err());
        assert!(adjust(&image, -101, 1.0, 1.0).is_err());
        assert!(adjust(&image, 0, -0.5, 1.0).is_err());
        assert!(adjust(&image, 0, 1.0, f32::NAN).is_err());
        assert!(adjust(&image, 0, f32::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_hsv_roundtrip() {
        for &(r, g, b) in &[(255.0, 0.0, 0.0), (12.0, 200.0, 99.0), (128.0, 128.0, 128.0)] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(h, s, v);
            assert!((r - r2).abs() < 0.5, "{r} vs {r2}");
            assert!((g - g2).abs() < 0.5, "{g} vs {g2}");
            assert!((b - b2).abs() < 0.5, "{b} vs {b2}");
        }
    }
}
