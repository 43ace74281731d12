//! Local rendering engine: deterministic canvas compositing.
//!
//! The free fallback path. Applies the filter sequence derived from the
//! prompt to one photo, or composites two photos side by side with a shared
//! color grade, or synthesizes a branded placeholder when no photo was given.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb, Rgb32FImage, RgbImage};

use crate::error::{Error, Result};
use crate::filters;
use crate::input::{encode_jpeg, EncodedImage, EditingMode, ImageInput};
use crate::prompt::FilterParameters;
use crate::watermark::{blend_text, text_bitmap};

/// JPEG quality for filtered renders.
const RENDER_QUALITY: u8 = 98;
/// JPEG quality for the synthesized placeholder.
const PLACEHOLDER_QUALITY: u8 = 90;
/// Placeholder canvas side length in pixels.
const PLACEHOLDER_SIZE: u32 = 1000;
/// Placeholder background color.
const PLACEHOLDER_BG: [u8; 3] = [15, 23, 42];
/// Placeholder disc color.
const PLACEHOLDER_DISC: [u8; 3] = [30, 41, 59];
/// Placeholder disc radius in pixels.
const PLACEHOLDER_DISC_RADIUS: u32 = 400;

/// Options controlling local rendering.
#[derive(Debug, Clone)]
pub struct LocalOptions {
    /// Label drawn on the placeholder canvas when no photo is supplied.
    pub placeholder_label: String,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            placeholder_label: "PORTRAIT STUDIO".to_string(),
        }
    }
}

/// Render the filter sequence over the supplied photos.
///
/// - Zero photos: a fixed-size branded placeholder; `mode` is ignored.
/// - One photo (or [`EditingMode::Single`]): canvas sized to the source,
///   filters applied in derivation order.
/// - Two photos in [`EditingMode::Couple`]: both scaled to a common target
///   height of `max(h1, h2)` preserving each aspect ratio, drawn left to
///   right with no gap, and graded by one shared filter pass over the whole
///   composite so both halves receive identical treatment.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] if any source photo fails to decode (the
/// whole render aborts; no partial output) or [`Error::CanvasInit`] if the
/// composite dimensions degenerate to zero.
pub fn render(
    images: &[ImageInput],
    mode: EditingMode,
    params: &FilterParameters,
    opts: &LocalOptions,
) -> Result<EncodedImage> {
    if images.is_empty() {
        return placeholder(&opts.placeholder_label);
    }

    let mut loaded = Vec::with_capacity(images.len());
    for input in images {
        let img = image::load_from_memory(&input.data).map_err(Error::ImageLoad)?;
        loaded.push(img.to_rgb32f());
    }

    let canvas = if mode == EditingMode::Single || loaded.len() == 1 {
        loaded.swap_remove(0)
    } else {
        composite_pair(&loaded[0], &loaded[1])?
    };

    let graded = filters::apply(params.ops(), &canvas);
    encode(&graded, RENDER_QUALITY)
}

/// Join two photos side by side at a common height.
///
/// Target height is the taller of the two; each photo is scaled to that
/// height preserving its own aspect ratio.
fn composite_pair(left: &Rgb32FImage, right: &Rgb32FImage) -> Result<Rgb32FImage> {
    let target_h = left.height().max(right.height());
    let left_w = scaled_width(left, target_h);
    let right_w = scaled_width(right, target_h);
    let total_w = left_w + right_w;

    if total_w == 0 || target_h == 0 {
        return Err(Error::CanvasInit {
            width: total_w,
            height: target_h,
        });
    }

    let left_scaled = image::imageops::resize(left, left_w, target_h, FilterType::Lanczos3);
    let right_scaled = image::imageops::resize(right, right_w, target_h, FilterType::Lanczos3);

    let mut canvas = Rgb32FImage::new(total_w, target_h);
    image::imageops::replace(&mut canvas, &left_scaled, 0, 0);
    image::imageops::replace(&mut canvas, &right_scaled, i64::from(left_w), 0);
    Ok(canvas)
}

/// Width after scaling to `target_h`, preserving aspect ratio.
fn scaled_width(img: &Rgb32FImage, target_h: u32) -> u32 {
    if img.height() == 0 {
        return 0;
    }
    let ratio = f64::from(target_h) / f64::from(img.height());
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (f64::from(img.width()) * ratio).round() as u32
    }
}

/// Synthesize the no-photo placeholder: dark background, centered disc,
/// centered label text.
fn placeholder(label: &str) -> Result<EncodedImage> {
    let mut canvas = RgbImage::from_pixel(
        PLACEHOLDER_SIZE,
        PLACEHOLDER_SIZE,
        Rgb(PLACEHOLDER_BG),
    );

    let center = i64::from(PLACEHOLDER_SIZE / 2);
    let radius_sq = i64::from(PLACEHOLDER_DISC_RADIUS) * i64::from(PLACEHOLDER_DISC_RADIUS);
    for y in 0..PLACEHOLDER_SIZE {
        for x in 0..PLACEHOLDER_SIZE {
            let dx = i64::from(x) - center;
            let dy = i64::from(y) - center;
            if dx * dx + dy * dy <= radius_sq {
                canvas.put_pixel(x, y, Rgb(PLACEHOLDER_DISC));
            }
        }
    }

    let (bitmap, text_w, text_h) = text_bitmap(label, 5);
    let origin_x = (PLACEHOLDER_SIZE as i32 - text_w) / 2;
    let origin_y = (PLACEHOLDER_SIZE as i32 - text_h) / 2;
    blend_text(&mut canvas, &bitmap, origin_x, origin_y, [255, 255, 255]);

    let data = encode_jpeg(&DynamicImage::ImageRgb8(canvas), PLACEHOLDER_QUALITY)?;
    Ok(EncodedImage {
        data,
        mime_type: "image/jpeg".to_string(),
    })
}

/// Quantize a float canvas to 8-bit RGB and encode as JPEG.
fn encode(canvas: &Rgb32FImage, quality: u8) -> Result<EncodedImage> {
    let rgb8 = DynamicImage::ImageRgb32F(canvas.clone()).to_rgb8();
    let data = encode_jpeg(&DynamicImage::ImageRgb8(rgb8), quality)?;
    Ok(EncodedImage {
        data,
        mime_type: "image/jpeg".to_string(),
    })
}
