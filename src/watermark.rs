//! Watermark finalization: brand the output raster before delivery.
//!
//! The finalizer is deliberately non-blocking: if the incoming bytes cannot be
//! decoded (or re-encoding fails), the original image is returned unmodified
//! instead of surfacing an error. A missing watermark must never cost the user
//! their result.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{DynamicImage, RgbImage};

use crate::input::{encode_jpeg, EncodedImage};

/// JPEG quality for the finalized output.
const OUTPUT_QUALITY: u8 = 95;
/// Label bar opacity over the underlying pixels.
const BAR_OPACITY: f32 = 0.5;
/// Glyph height as a fraction of canvas width.
const TEXT_SCALE_RATIO: f32 = 0.03;
/// Minimum glyph height in pixels.
const MIN_TEXT_HEIGHT: u32 = 16;

/// Options controlling the watermark stamp.
#[derive(Debug, Clone)]
pub struct WatermarkOptions {
    /// Branded text drawn in the label bar.
    pub text: String,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: "Portrait Studio".to_string(),
        }
    }
}

/// Stamp a semi-transparent label bar with branded text onto the image.
///
/// The bar sits in the bottom-right corner and is sized proportionally to the
/// canvas width. Applying twice visibly stacks marks; this is not idempotent.
///
/// Never fails: undecodable input (or a failed re-encode) is returned as-is.
#[must_use]
pub fn finalize(image: &EncodedImage, opts: &WatermarkOptions) -> EncodedImage {
    let Ok(decoded) = image::load_from_memory(&image.data) else {
        return image.clone();
    };
    let mut canvas = decoded.to_rgb8();
    stamp(&mut canvas, &opts.text);

    match encode_jpeg(&DynamicImage::ImageRgb8(canvas), OUTPUT_QUALITY) {
        Ok(data) => EncodedImage {
            data,
            mime_type: "image/jpeg".to_string(),
        },
        Err(_) => image.clone(),
    }
}

/// Draw the label bar and text in the bottom-right corner.
fn stamp(canvas: &mut RgbImage, text: &str) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 || text.is_empty() {
        return;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let target_height = ((width as f32 * TEXT_SCALE_RATIO) as u32).max(MIN_TEXT_HEIGHT);
    let scale = (target_height / 8).max(1);
    let pad = (scale * 4) as i32;

    let (bitmap, text_w, text_h) = text_bitmap(text, scale);

    // Bar flush with the corner, covering the text plus padding.
    let bar_x0 = (width as i64 - i64::from(text_w) - i64::from(pad) * 2).max(0) as u32;
    let bar_y0 = (height as i64 - i64::from(text_h) - i64::from(pad) * 2).max(0) as u32;
    darken_region(canvas, bar_x0, bar_y0, width, height);

    let origin_x = width as i32 - text_w - pad;
    let origin_y = height as i32 - text_h - pad;
    blend_text(canvas, &bitmap, origin_x, origin_y, [255, 255, 255]);
}

/// Multiply a rectangular region toward black by the bar opacity.
fn darken_region(canvas: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) {
    for y in y0..y1 {
        for x in x0..x1 {
            let px = canvas.get_pixel_mut(x, y);
            for ch in 0..3 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    px[ch] = (f32::from(px[ch]) * (1.0 - BAR_OPACITY)) as u8;
                }
            }
        }
    }
}

/// Rasterize text into `(x, y)` pixel offsets using scaled 8x8 bitmap glyphs.
///
/// Returns the pixel list plus the text extent `(width, height)`. Unknown
/// glyphs render as `?`.
pub(crate) fn text_bitmap(text: &str, scale: u32) -> (Vec<(i32, i32)>, i32, i32) {
    let scale = scale.max(1);
    let glyph_gap = scale as i32;
    let mut cursor_x: i32 = 0;
    let mut pixels: Vec<(i32, i32)> = Vec::new();

    let total = text.chars().count();
    for (idx, ch) in text.chars().enumerate() {
        let glyph = BASIC_FONTS
            .get(ch)
            .unwrap_or_else(|| BASIC_FONTS.get('?').unwrap());

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..8usize {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let base_x = cursor_x + (col as u32 * scale) as i32;
                let base_y = (row as u32 * scale) as i32;
                for dx in 0..scale as i32 {
                    for dy in 0..scale as i32 {
                        pixels.push((base_x + dx, base_y + dy));
                    }
                }
            }
        }
        cursor_x += (8 * scale) as i32 + glyph_gap;
        if idx + 1 == total {
            cursor_x -= glyph_gap;
        }
    }

    (pixels, cursor_x.max(1), (8 * scale) as i32)
}

/// Draw a rasterized text bitmap onto the canvas at the given origin.
///
/// Pixels falling outside the canvas are skipped.
pub(crate) fn blend_text(
    canvas: &mut RgbImage,
    bitmap: &[(i32, i32)],
    origin_x: i32,
    origin_y: i32,
    color: [u8; 3],
) {
    let (width, height) = canvas.dimensions();
    for &(dx, dy) in bitmap {
        let x = origin_x + dx;
        let y = origin_y + dy;
        if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
            continue;
        }
        #[allow(clippy::cast_sign_loss)]
        let px = canvas.get_pixel_mut(x as u32, y as u32);
        px[0] = color[0];
        px[1] = color[1];
        px[2] = color[2];
    }
}
