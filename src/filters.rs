//! Filter operation math.
//!
//! The original pipeline leaned on the browser's `ctx.filter` string; here the
//! same operations are spelled out. Color operations are the W3C
//! filter-effects color matrices (grayscale, sepia, saturate, hue-rotate) plus
//! brightness (linear scale) and contrast (scale pivoted at 0.5); blur is a
//! gaussian with sigma equal to the radius in pixels.
//!
//! Operations apply in sequence order. Consecutive color operations compose
//! into a single matrix pass (matrix composition preserves order); a blur
//! flushes the composition because it is not a per-pixel linear map.

use image::Rgb32FImage;

/// Luma weights used by the saturate and hue-rotate matrices.
const LUMA_R: f32 = 0.213;
/// Green luma weight.
const LUMA_G: f32 = 0.715;
/// Blue luma weight.
const LUMA_B: f32 = 0.072;

/// A single named visual adjustment with its intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    /// Desaturate toward luminance; `1.0` is fully gray.
    Grayscale(f32),
    /// Sepia tint; `1.0` is fully toned.
    Sepia(f32),
    /// Linear brightness scale; `1.0` is identity.
    Brightness(f32),
    /// Contrast scale pivoted at mid-gray; `1.0` is identity.
    Contrast(f32),
    /// Saturation scale; `1.0` is identity, `0.0` is grayscale.
    Saturate(f32),
    /// Hue rotation in degrees.
    HueRotate(f32),
    /// Gaussian blur radius in pixels.
    Blur(f32),
}

impl FilterOp {
    /// The color matrix for this op, or `None` for blur.
    fn matrix(self) -> Option<ColorMatrix> {
        match self {
            Self::Grayscale(amount) => {
                let t = 1.0 - amount;
                Some(ColorMatrix {
                    m: [
                        [0.2126 + 0.7874 * t, 0.7152 - 0.7152 * t, 0.0722 - 0.0722 * t],
                        [0.2126 - 0.2126 * t, 0.7152 + 0.2848 * t, 0.0722 - 0.0722 * t],
                        [0.2126 - 0.2126 * t, 0.7152 - 0.7152 * t, 0.0722 + 0.9278 * t],
                    ],
                    offset: [0.0; 3],
                })
            }
            Self::Sepia(amount) => {
                let t = 1.0 - amount;
                Some(ColorMatrix {
                    m: [
                        [0.393 + 0.607 * t, 0.769 - 0.769 * t, 0.189 - 0.189 * t],
                        [0.349 - 0.349 * t, 0.686 + 0.314 * t, 0.168 - 0.168 * t],
                        [0.272 - 0.272 * t, 0.534 - 0.534 * t, 0.131 + 0.869 * t],
                    ],
                    offset: [0.0; 3],
                })
            }
            Self::Brightness(b) => Some(ColorMatrix::diagonal(b, 0.0)),
            Self::Contrast(c) => Some(ColorMatrix::diagonal(c, 0.5 - 0.5 * c)),
            Self::Saturate(s) => Some(ColorMatrix {
                m: [
                    [LUMA_R + 0.787 * s, LUMA_G - 0.715 * s, LUMA_B - 0.072 * s],
                    [LUMA_R - 0.213 * s, LUMA_G + 0.285 * s, LUMA_B - 0.072 * s],
                    [LUMA_R - 0.213 * s, LUMA_G - 0.715 * s, LUMA_B + 0.928 * s],
                ],
                offset: [0.0; 3],
            }),
            Self::HueRotate(degrees) => {
                let (sin, cos) = degrees.to_radians().sin_cos();
                Some(ColorMatrix {
                    m: [
                        [
                            LUMA_R + cos * 0.787 - sin * 0.213,
                            LUMA_G - cos * 0.715 - sin * 0.715,
                            LUMA_B - cos * 0.072 + sin * 0.928,
                        ],
                        [
                            LUMA_R - cos * 0.213 + sin * 0.143,
                            LUMA_G + cos * 0.285 + sin * 0.140,
                            LUMA_B - cos * 0.072 - sin * 0.283,
                        ],
                        [
                            LUMA_R - cos * 0.213 - sin * 0.787,
                            LUMA_G - cos * 0.715 + sin * 0.715,
                            LUMA_B + cos * 0.928 + sin * 0.072,
                        ],
                    ],
                    offset: [0.0; 3],
                })
            }
            Self::Blur(_) => None,
        }
    }
}

/// A 3x3 color matrix with an additive offset, in `[0, 1]` channel space.
#[derive(Debug, Clone, Copy)]
struct ColorMatrix {
    m: [[f32; 3]; 3],
    offset: [f32; 3],
}

impl ColorMatrix {
    fn diagonal(scale: f32, offset: f32) -> Self {
        Self {
            m: [[scale, 0.0, 0.0], [0.0, scale, 0.0], [0.0, 0.0, scale]],
            offset: [offset; 3],
        }
    }

    /// Compose so that `self` applies first, then `next`.
    fn then(&self, next: &Self) -> Self {
        let mut m = [[0.0f32; 3]; 3];
        let mut offset = [0.0f32; 3];
        for row in 0..3 {
            for col in 0..3 {
                for k in 0..3 {
                    m[row][col] += next.m[row][k] * self.m[k][col];
                }
            }
            offset[row] = next.offset[row];
            for k in 0..3 {
                offset[row] += next.m[row][k] * self.offset[k];
            }
        }
        Self { m, offset }
    }

    fn transform(&self, px: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0f32; 3];
        for row in 0..3 {
            out[row] = (self.m[row][0] * px[0]
                + self.m[row][1] * px[1]
                + self.m[row][2] * px[2]
                + self.offset[row])
                .clamp(0.0, 1.0);
        }
        out
    }
}

/// Apply a filter sequence to a float RGB image, in sequence order.
#[must_use]
pub fn apply(ops: &[FilterOp], img: &Rgb32FImage) -> Rgb32FImage {
    let mut out = img.clone();
    let mut pending: Option<ColorMatrix> = None;

    for &op in ops {
        if let Some(matrix) = op.matrix() {
            pending = Some(match pending {
                Some(acc) => acc.then(&matrix),
                None => matrix,
            });
        } else if let FilterOp::Blur(radius) = op {
            flush(&mut out, pending.take());
            if radius > 0.0 {
                out = image::imageops::blur(&out, radius);
            }
        }
    }

    flush(&mut out, pending);
    out
}

/// Run an accumulated color matrix over every pixel.
fn flush(img: &mut Rgb32FImage, matrix: Option<ColorMatrix>) {
    let Some(matrix) = matrix else { return };
    for px in img.pixels_mut() {
        let [r, g, b] = matrix.transform([px[0], px[1], px[2]]);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(r: f32, g: f32, b: f32) -> Rgb32FImage {
        Rgb32FImage::from_pixel(4, 4, Rgb([r, g, b]))
    }

    fn first_pixel(img: &Rgb32FImage) -> [f32; 3] {
        let px = img.get_pixel(0, 0);
        [px[0], px[1], px[2]]
    }

    #[test]
    fn full_grayscale_equalizes_channels() {
        let out = apply(&[FilterOp::Grayscale(1.0)], &solid(0.8, 0.2, 0.4));
        let [r, g, b] = first_pixel(&out);
        assert!((r - g).abs() < 1e-5);
        assert!((g - b).abs() < 1e-5);
    }

    #[test]
    fn brightness_scales_linearly() {
        let out = apply(&[FilterOp::Brightness(2.0)], &solid(0.2, 0.3, 0.4));
        let [r, g, b] = first_pixel(&out);
        assert!((r - 0.4).abs() < 1e-5);
        assert!((g - 0.6).abs() < 1e-5);
        assert!((b - 0.8).abs() < 1e-5);
    }

    #[test]
    fn identity_ops_leave_pixels_unchanged() {
        let src = solid(0.25, 0.5, 0.75);
        let out = apply(
            &[
                FilterOp::Contrast(1.0),
                FilterOp::Saturate(1.0),
                FilterOp::Brightness(1.0),
            ],
            &src,
        );
        let [r, g, b] = first_pixel(&out);
        assert!((r - 0.25).abs() < 1e-4);
        assert!((g - 0.5).abs() < 1e-4);
        assert!((b - 0.75).abs() < 1e-4);
    }

    #[test]
    fn hue_rotate_full_turn_is_near_identity() {
        let src = solid(0.6, 0.3, 0.1);
        let out = apply(&[FilterOp::HueRotate(360.0)], &src);
        let [r, g, b] = first_pixel(&out);
        assert!((r - 0.6).abs() < 1e-3);
        assert!((g - 0.3).abs() < 1e-3);
        assert!((b - 0.1).abs() < 1e-3);
    }

    #[test]
    fn operation_order_changes_the_result() {
        let src = solid(0.7, 0.4, 0.2);
        let gray_then_sepia = apply(&[FilterOp::Grayscale(1.0), FilterOp::Sepia(1.0)], &src);
        let sepia_then_gray = apply(&[FilterOp::Sepia(1.0), FilterOp::Grayscale(1.0)], &src);

        // Sepia applied last tints; grayscale applied last strips the tint.
        let a = first_pixel(&gray_then_sepia);
        let b = first_pixel(&sepia_then_gray);
        assert!((a[0] - a[2]).abs() > 0.05, "sepia-last output is tinted");
        assert!((b[0] - b[2]).abs() < 1e-4, "grayscale-last output is neutral");
    }

    #[test]
    fn composed_pass_matches_sequential_passes() {
        let src = solid(0.3, 0.5, 0.6);
        let composed = apply(&[FilterOp::Contrast(1.2), FilterOp::Saturate(1.5)], &src);
        let step1 = apply(&[FilterOp::Contrast(1.2)], &src);
        let sequential = apply(&[FilterOp::Saturate(1.5)], &step1);

        let a = first_pixel(&composed);
        let b = first_pixel(&sequential);
        for ch in 0..3 {
            assert!((a[ch] - b[ch]).abs() < 1e-4);
        }
    }

    #[test]
    fn blur_preserves_dimensions() {
        let src = solid(0.5, 0.5, 0.5);
        let out = apply(&[FilterOp::Blur(1.0)], &src);
        assert_eq!(out.dimensions(), src.dimensions());
    }
}
