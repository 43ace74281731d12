//! Prompt analysis: free-text instructions to filter parameters.
//!
//! The local engine cannot ask a model what "gaya vintage sore hari" means, so
//! it keyword-matches the prompt against curated multilingual (English and
//! Indonesian) pattern sets, one per visual intent category. Matching is
//! case-insensitive substring containment and categories are **not** mutually
//! exclusive: a prompt naming both "bright" and "warm" accumulates both
//! adjustment sets, in category declaration order.

use crate::filters::FilterOp;

/// Baseline "studio" adjustment applied to every local render.
const BASELINE: [FilterOp; 2] = [FilterOp::Contrast(1.1), FilterOp::Saturate(1.1)];

/// One visual intent category: patterns that trigger it and the ops it adds.
struct Category {
    name: &'static str,
    patterns: &'static [&'static str],
    ops: &'static [FilterOp],
}

/// The category table, iterated in declaration order. Order is part of the
/// contract: derived ops are applied in exactly this sequence, and e.g.
/// grayscale-then-sepia is not the same grade as sepia-then-grayscale.
const CATEGORIES: [Category; 8] = [
    Category {
        name: "monochrome",
        patterns: &["hitam", "putih", "black", "white", "monochrome", "bw", "abu"],
        ops: &[FilterOp::Grayscale(1.0), FilterOp::Contrast(1.2)],
    },
    Category {
        name: "vintage",
        patterns: &["vintage", "jadul", "klasik", "classic", "retro", "sepia", "old"],
        ops: &[
            FilterOp::Sepia(0.8),
            FilterOp::Contrast(0.9),
            FilterOp::Brightness(1.1),
        ],
    },
    Category {
        name: "bright",
        patterns: &["cerah", "terang", "bright", "light", "siang"],
        ops: &[FilterOp::Brightness(1.3), FilterOp::Contrast(1.1)],
    },
    Category {
        name: "dark",
        patterns: &["gelap", "dark", "malam", "night", "dramatis"],
        ops: &[
            FilterOp::Brightness(0.7),
            FilterOp::Contrast(1.4),
            FilterOp::Saturate(0.9),
        ],
    },
    Category {
        name: "vibrant",
        patterns: &["tajam", "vibrant", "sharp", "color", "pop", "kontras"],
        ops: &[
            FilterOp::Saturate(2.0),
            FilterOp::Contrast(1.3),
            FilterOp::Brightness(1.1),
        ],
    },
    Category {
        name: "soft",
        patterns: &["soft", "lembut", "blur", "dreamy", "halus"],
        ops: &[
            FilterOp::Blur(1.0),
            FilterOp::Brightness(1.05),
            FilterOp::Saturate(1.1),
        ],
    },
    Category {
        name: "cool",
        patterns: &["dingin", "cool", "biru", "blue", "ocean"],
        ops: &[FilterOp::HueRotate(180.0), FilterOp::Saturate(1.1)],
    },
    Category {
        name: "warm",
        patterns: &["hangat", "warm", "sunset", "gold", "kuning"],
        ops: &[
            FilterOp::Sepia(0.4),
            FilterOp::Saturate(1.6),
            FilterOp::Brightness(1.05),
        ],
    },
];

/// The ordered filter sequence derived from a prompt.
///
/// Application order equals derivation order; see [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParameters {
    ops: Vec<FilterOp>,
    matched: Vec<&'static str>,
}

impl FilterParameters {
    /// The ordered operations, baseline first.
    #[must_use]
    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    /// Names of the categories that matched, in declaration order.
    #[must_use]
    pub fn matched_categories(&self) -> &[&'static str] {
        &self.matched
    }

    /// Whether only the baseline fired (no recognized keyword).
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Derive filter parameters from a free-text instruction.
///
/// Always starts from the baseline studio adjustment (mild contrast and
/// saturation boost); each matching category appends its ops. An empty or
/// unrecognized prompt yields the baseline only. Deterministic: the same text
/// always produces the same sequence.
#[must_use]
pub fn analyze(prompt: &str) -> FilterParameters {
    let lowered = prompt.to_lowercase();
    let mut ops: Vec<FilterOp> = BASELINE.to_vec();
    let mut matched = Vec::new();

    for category in &CATEGORIES {
        if category.patterns.iter().any(|p| lowered.contains(p)) {
            ops.extend_from_slice(category.ops);
            matched.push(category.name);
        }
    }

    FilterParameters { ops, matched }
}
