//! Image intake and shared image types.
//!
//! Uploaded files are decoded, downscaled to a bounded maximum dimension and
//! re-encoded to JPEG before anything else touches them. This caps the payload
//! shipped to the remote API and gives both engines a single canonical input
//! shape: encoded bytes plus a MIME type.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{Error, Result};

/// A normalized input photo: encoded image bytes plus MIME type.
///
/// Built once by [`normalize_bytes`] (or [`normalize_file`]) and consumed
/// read-only by both engines. Lives only for the duration of one request.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Encoded image bytes (JPEG after normalization).
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime_type: String,
}

/// An encoded output raster produced by either engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime_type: String,
}

impl EncodedImage {
    /// Render as a `data:` URI for direct display or download by a UI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }
}

/// Whether one or two subjects are being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditingMode {
    /// One photo, edited as-is.
    Single,
    /// Two photos, composited side by side.
    Couple,
}

/// Options controlling intake normalization.
#[derive(Debug, Clone)]
pub struct IntakeOptions {
    /// Longest allowed side in pixels; larger inputs are downscaled.
    pub max_dimension: u32,
    /// JPEG quality for the normalized intermediate (1-100).
    pub quality: u8,
}

impl Default for IntakeOptions {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            quality: 85,
        }
    }
}

/// Normalize raw upload bytes into an [`ImageInput`].
///
/// Decodes the bytes, downscales so the longer side does not exceed
/// `opts.max_dimension` (aspect ratio preserved, Lanczos3 resampling), and
/// re-encodes as JPEG at `opts.quality`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the bytes are not a decodable image, or
/// [`Error::Encode`] if JPEG re-encoding fails.
pub fn normalize_bytes(bytes: &[u8], opts: &IntakeOptions) -> Result<ImageInput> {
    let decoded = image::load_from_memory(bytes).map_err(Error::Decode)?;
    let bounded = bound_dimensions(decoded, opts.max_dimension);

    let data = encode_jpeg(&bounded, opts.quality)?;
    Ok(ImageInput {
        data,
        mime_type: "image/jpeg".to_string(),
    })
}

/// Normalize an image file on disk into an [`ImageInput`].
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, otherwise as
/// [`normalize_bytes`].
pub fn normalize_file(path: &Path, opts: &IntakeOptions) -> Result<ImageInput> {
    let bytes = std::fs::read(path)?;
    normalize_bytes(&bytes, opts)
}

/// Downscale so the longer side equals `max_dimension`, if it exceeds it.
fn bound_dimensions(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img;
    }
    // DynamicImage::resize fits within the bounds while preserving aspect.
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

/// Encode an image as JPEG at the given quality into a fresh buffer.
pub(crate) fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(img)?;
    Ok(buf.into_inner())
}
