//! Alpha application and background substitution
//!
//! `apply_alpha` expands an image to four channels and writes the matte as
//! its alpha channel. `composite` replaces the transparent background with
//! a solid color or a tiled background image using standard over-compositing.
//! Background images are scaled and tiled to cover the canvas, never
//! stretched anisotropically.

use crate::config::BackgroundSpec;
use crate::error::{PhotoError, Result};
use crate::types::SegmentationMask;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

/// Apply an alpha matte to an image, producing an RGBA buffer
///
/// The matte is resized with cubic interpolation when its dimensions differ
/// from the image.
///
/// # Errors
/// Returns `PhotoError::InvalidInput` for empty images.
pub fn apply_alpha(image: &DynamicImage, matte: &SegmentationMask) -> Result<RgbaImage> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PhotoError::invalid_input("Cannot apply alpha to an empty image"));
    }

    let matte_image = if matte.dimensions == (width, height) {
        matte.to_image()?
    } else {
        log::debug!(
            "Resizing matte from {}x{} to {width}x{height}",
            matte.dimensions.0,
            matte.dimensions.1
        );
        image::imageops::resize(
            &matte.to_image()?,
            width,
            height,
            image::imageops::FilterType::CatmullRom,
        )
    };

    let rgb = image.to_rgb8();
    let mut out: RgbaImage = RgbaImage::new(width, height);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let alpha = matte_image.get_pixel(x, y)[0];
        out.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
    }

    Ok(out)
}

/// Composite an RGBA image over the configured background
///
/// `None` keeps the transparent RGBA buffer; color and image backgrounds
/// produce an opaque RGB result.
///
/// # Errors
/// - Empty input buffers
/// - Undecodable background image bytes
pub fn composite(rgba: &RgbaImage, background: &BackgroundSpec) -> Result<DynamicImage> {
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(PhotoError::invalid_input("Cannot composite an empty image"));
    }

    match background {
        BackgroundSpec::None => Ok(DynamicImage::ImageRgba8(rgba.clone())),
        BackgroundSpec::Color(color) => {
            let canvas = RgbImage::from_pixel(width, height, *color);
            Ok(DynamicImage::ImageRgb8(over_composite(rgba, &canvas)))
        },
        BackgroundSpec::Image {
            data,
            scale,
            offset_x,
            offset_y,
        } => {
            let background_image = image::load_from_memory(data).map_err(|e| {
                PhotoError::invalid_input(format!("Failed to decode background image: {e}"))
            })?;
            let canvas =
                tile_background(&background_image, width, height, *scale, *offset_x, *offset_y)?;
            Ok(DynamicImage::ImageRgb8(over_composite(rgba, &canvas)))
        },
    }
}

/// Standard over-compositing of an RGBA foreground onto an RGB canvas
fn over_composite(foreground: &RgbaImage, canvas: &RgbImage) -> RgbImage {
    let mut out = canvas.clone();
    for (x, y, pixel) in foreground.enumerate_pixels() {
        let alpha = f32::from(pixel[3]) / 255.0;
        let background = out.get_pixel(x, y);
        let blend = |fg: u8, bg: u8| -> u8 {
            (f32::from(fg) * alpha + f32::from(bg) * (1.0 - alpha)).round() as u8
        };
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(pixel[0], background[0]),
                blend(pixel[1], background[1]),
                blend(pixel[2], background[2]),
            ]),
        );
    }
    out
}

/// Fill a canvas by tiling the scaled background image
///
/// The tile is the background scaled uniformly by `scale`; tiling starts at
/// an offset expressed as fractions of the tile size so the caller can pan
/// the pattern. Tiles are repeated to cover the whole canvas.
fn tile_background(
    background: &DynamicImage,
    canvas_width: u32,
    canvas_height: u32,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
) -> Result<RgbImage> {
    if background.width() == 0 || background.height() == 0 {
        return Err(PhotoError::invalid_input("Background image is empty"));
    }
    if scale <= 0.0 || !scale.is_finite() {
        return Err(PhotoError::invalid_input(format!(
            "Background scale must be positive and finite, got {scale}"
        )));
    }

    let tile_width = ((f64::from(background.width()) * scale).round() as u32).max(1);
    let tile_height = ((f64::from(background.height()) * scale).round() as u32).max(1);
    let tile = background
        .resize_exact(
            tile_width,
            tile_height,
            image::imageops::FilterType::Triangle,
        )
        .to_rgb8();

    // Offsets pan by fractions of one tile; normalize into [-tile, 0)
    let start_x = (offset_x * f64::from(tile_width)).round() as i64 % i64::from(tile_width);
    let start_y = (offset_y * f64::from(tile_height)).round() as i64 % i64::from(tile_height);

    let mut canvas = RgbImage::new(canvas_width, canvas_height);
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let tx = (i64::from(x) - start_x).rem_euclid(i64::from(tile_width)) as u32;
        let ty = (i64::from(y) - start_y).rem_euclid(i64::from(tile_height)) as u32;
        *pixel = *tile.get_pixel(tx, ty);
    }

    Ok(canvas)
}

/// Add a constant-color border around an image
///
/// The normalized passport output gets a configurable border; the alpha of
/// the border is fully opaque.
#[must_use]
pub fn add_border(image: &DynamicImage, border_width: u32, color: Rgba<u8>) -> DynamicImage {
    if border_width == 0 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let new_width = width + border_width * 2;
    let new_height = height + border_width * 2;

    let rgba = image.to_rgba8();
    let mut out = RgbaImage::from_pixel(new_width, new_height, color);
    image::imageops::overlay(
        &mut out,
        &rgba,
        i64::from(border_width),
        i64::from(border_width),
    );
    DynamicImage::ImageRgba8(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 99])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_apply_alpha_dimensions_and_channel() {
        let image = gradient_image(40, 30);
        let matte = SegmentationMask::filled(200, (40, 30));
        let rgba = apply_alpha(&image, &matte).unwrap();
        assert_eq!(rgba.dimensions(), (40, 30));
        assert!(rgba.pixels().all(|p| p[3] == 200));
    }

    #[test]
    fn test_apply_alpha_resizes_matte() {
        let image = gradient_image(64, 48);
        let matte = SegmentationMask::filled(255, (16, 12));
        let rgba = apply_alpha(&image, &matte).unwrap();
        assert_eq!(rgba.dimensions(), (64, 48));
        assert!(rgba.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_composite_none_roundtrip_with_opaque_matte() {
        let image = gradient_image(32, 32);
        let matte = SegmentationMask::filled(255, (32, 32));
        let rgba = apply_alpha(&image, &matte).unwrap();

        let out = composite(&rgba, &BackgroundSpec::None).unwrap();
        let out_rgb = out.to_rgb8();
        let original_rgb = image.to_rgb8();
        for (a, b) in out_rgb.pixels().zip(original_rgb.pixels()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_composite_color_fills_background() {
        let image = gradient_image(20, 20);
        // Fully transparent matte: result must be pure background color
        let matte = SegmentationMask::filled(0, (20, 20));
        let rgba = apply_alpha(&image, &matte).unwrap();

        let out = composite(&rgba, &BackgroundSpec::Color(Rgb([10, 200, 30]))).unwrap();
        let rgb = out.to_rgb8();
        assert!(rgb.pixels().all(|p| *p == Rgb([10, 200, 30])));
    }

    #[test]
    fn test_composite_color_keeps_opaque_foreground() {
        let image = gradient_image(20, 20);
        let matte = SegmentationMask::filled(255, (20, 20));
        let rgba = apply_alpha(&image, &matte).unwrap();

        let out = composite(&rgba, &BackgroundSpec::Color(Rgb([0, 0, 0]))).unwrap();
        let rgb = out.to_rgb8();
        for (a, b) in rgb.pixels().zip(image.to_rgb8().pixels()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_composite_image_tiles_small_background() {
        // 2×2 checker background tiled over a larger canvas
        let mut checker = RgbImage::new(2, 2);
        checker.put_pixel(0, 0, Rgb([255, 0, 0]));
        checker.put_pixel(1, 0, Rgb([0, 255, 0]));
        checker.put_pixel(0, 1, Rgb([0, 0, 255]));
        checker.put_pixel(1, 1, Rgb([255, 255, 0]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(checker)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let image = gradient_image(8, 8);
        let matte = SegmentationMask::filled(0, (8, 8));
        let rgba = apply_alpha(&image, &matte).unwrap();

        let out = composite(
            &rgba,
            &BackgroundSpec::Image {
                data: bytes,
                scale: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
            },
        )
        .unwrap();
        let rgb = out.to_rgb8();

        // Pattern repeats with period 2 in both axes
        assert_eq!(rgb.get_pixel(0, 0), rgb.get_pixel(2, 0));
        assert_eq!(rgb.get_pixel(0, 0), rgb.get_pixel(0, 2));
        assert_eq!(rgb.get_pixel(1, 1), rgb.get_pixel(3, 3));
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_composite_rejects_bad_background_bytes() {
        let rgba = RgbaImage::new(8, 8);
        let result = composite(
            &rgba,
            &BackgroundSpec::Image {
                data: vec![1, 2, 3],
                scale: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_add_border() {
        let image = gradient_image(10, 10);
        let bordered = add_border(&image, 5, Rgba([0, 0, 0, 255]));
        assert_eq!(bordered.width(), 20);
        assert_eq!(bordered.height(), 20);
        let rgba = bordered.to_rgba8();
        assert_eq!(*rgba.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(
            *rgba.get_pixel(5, 5),
            {
                let original = image.to_rgba8();
                *original.get_pixel(0, 0)
            }
        );
    }
}
