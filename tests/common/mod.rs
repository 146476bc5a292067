//! Shared fixtures for the integration tests

// Each integration test binary uses its own subset of these helpers
#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};

/// Initialize test logging once per process
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Synthetic portrait: skin-toned head with eye/mouth structure and dark
/// clothing on a blue studio backdrop
///
/// Shaped so both the face locator and the classical segmenter find a
/// subject without any model file.
pub(crate) fn synthetic_portrait(width: u32, height: u32) -> DynamicImage {
    let cx = width / 2;
    let cy = height * 2 / 5;
    let radius = (width.min(height) / 5) as i64;
    let image = RgbImage::from_fn(width, height, |x, y| {
        let dx = i64::from(x) - i64::from(cx);
        let dy = i64::from(y) - i64::from(cy);
        let in_head = dx * dx + dy * dy <= radius * radius;
        let in_torso = y > cy + (radius as u32)
            && (i64::from(x) - i64::from(cx)).abs() <= radius * 2
            && y < height - height / 10;
        if in_head {
            let eye_y = i64::from(cy) - radius / 3;
            let mouth_y = i64::from(cy) + radius / 2;
            let near = |a: i64, b: i64| (a - b).abs() <= radius / 8;
            if (near(i64::from(y), eye_y) && (near(dx, -radius / 2) || near(dx, radius / 2)))
                || (near(i64::from(y), mouth_y) && dx.abs() <= radius / 3)
            {
                Rgb([60, 30, 25])
            } else {
                Rgb([205, 150, 120])
            }
        } else if in_torso {
            Rgb([25, 25, 35])
        } else {
            Rgb([70, 100, 180])
        }
    });
    DynamicImage::ImageRgb8(image)
}

/// Encode an image as PNG bytes
pub(crate) fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("PNG encoding of a valid test image succeeds");
    bytes
}
