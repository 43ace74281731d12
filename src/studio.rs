//! Engine orchestration: one configurable pipeline from inputs to result.
//!
//! A request runs IDLE -> PROCESSING -> SUCCESS/ERROR entirely within one
//! [`Studio::process`] call; the studio holds no per-request state, so
//! overlapping calls are independent. The engine order is configurable but
//! the fallback policy is fixed: every failure category of the first engine
//! triggers the second, and only both failing surfaces an error.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::cloud::CloudEngine;
use crate::error::{Error, Result};
use crate::input::{EncodedImage, EditingMode, ImageInput};
use crate::local::{self, LocalOptions};
use crate::prompt;
use crate::watermark::{self, WatermarkOptions};

/// Which engine produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// The remote generative engine.
    Cloud,
    /// The deterministic local engine.
    Local,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloud => f.write_str("AI Cloud"),
            Self::Local => f.write_str("Local Engine (Free)"),
        }
    }
}

/// Engine attempt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineOrder {
    /// Try the cloud engine, fall back to local (the default).
    #[default]
    CloudFirst,
    /// Try the local engine, fall back to cloud.
    LocalFirst,
}

impl EngineOrder {
    fn sequence(self) -> [EngineKind; 2] {
        match self {
            Self::CloudFirst => [EngineKind::Cloud, EngineKind::Local],
            Self::LocalFirst => [EngineKind::Local, EngineKind::Cloud],
        }
    }
}

/// Options controlling the pipeline.
#[derive(Debug, Clone)]
pub struct StudioOptions {
    /// Engine attempt order.
    pub engine_order: EngineOrder,
    /// Skip the watermark stamp when `false`.
    pub apply_watermark: bool,
    /// Watermark settings.
    pub watermark: WatermarkOptions,
    /// Local engine settings.
    pub local: LocalOptions,
}

impl StudioOptions {
    /// The default pipeline: cloud first, watermark on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine_order: EngineOrder::CloudFirst,
            apply_watermark: true,
            watermark: WatermarkOptions::default(),
            local: LocalOptions::default(),
        }
    }
}

impl Default for StudioOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of one successful pipeline run. Terminal and immutable; a new
/// request always produces a fresh instance.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The final (possibly watermarked) output raster.
    pub image: EncodedImage,
    /// The prompt as displayed ("Auto Enhancement" when none was given).
    pub prompt: String,
    /// Milliseconds since the Unix epoch at completion.
    pub timestamp_ms: u64,
    /// Which engine produced the raster.
    pub engine: EngineKind,
    /// Non-fatal notes for the caller (e.g. a fallback occurred).
    pub warnings: Vec<String>,
}

/// The studio pipeline: orchestrates engines, fallback, and finalization.
pub struct Studio {
    cloud: CloudEngine,
    options: StudioOptions,
}

impl Studio {
    /// Create a studio around a pre-built cloud engine.
    #[must_use]
    pub fn new(cloud: CloudEngine, options: StudioOptions) -> Self {
        Self { cloud, options }
    }

    /// Run the full pipeline for one request.
    ///
    /// Validates inputs, attempts the engines in the configured order with
    /// unconditional fallback, stamps the watermark (unless disabled), and
    /// emits a [`ProcessingResult`] recording which engine produced it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] when no image and no non-blank prompt are
    ///   supplied; neither engine is invoked.
    /// - [`Error::BothEnginesFailed`] when the fallback also fails; no
    ///   partial result is emitted.
    pub fn process(
        &self,
        images: &[ImageInput],
        prompt: &str,
        mode: EditingMode,
    ) -> Result<ProcessingResult> {
        if images.is_empty() && prompt.trim().is_empty() {
            return Err(Error::InvalidInput);
        }
        debug!(
            "processing: {} image(s), mode={mode:?}, order={:?}",
            images.len(),
            self.options.engine_order
        );

        let mut warnings = Vec::new();
        let mut failures: Vec<(EngineKind, Error)> = Vec::new();
        let mut outcome = None;

        for kind in self.options.engine_order.sequence() {
            match self.render_with(kind, images, prompt, mode) {
                Ok(image) => {
                    outcome = Some((kind, image));
                    break;
                }
                Err(err) => {
                    warn!("{kind} failed, falling back: {err}");
                    warnings.push(fallback_note(kind, &err));
                    failures.push((kind, err));
                }
            }
        }

        let Some((engine, raw)) = outcome else {
            return Err(Error::BothEnginesFailed {
                cloud: failure_message(&failures, EngineKind::Cloud),
                local: failure_message(&failures, EngineKind::Local),
            });
        };

        let image = if self.options.apply_watermark {
            watermark::finalize(&raw, &self.options.watermark)
        } else {
            raw
        };

        let display_prompt = if prompt.trim().is_empty() {
            "Auto Enhancement".to_string()
        } else {
            prompt.to_string()
        };

        Ok(ProcessingResult {
            image,
            prompt: display_prompt,
            timestamp_ms: unix_millis(),
            engine,
            warnings,
        })
    }

    fn render_with(
        &self,
        kind: EngineKind,
        images: &[ImageInput],
        prompt: &str,
        mode: EditingMode,
    ) -> Result<EncodedImage> {
        match kind {
            EngineKind::Cloud => self.cloud.render(images, prompt, mode),
            EngineKind::Local => {
                let params = prompt::analyze(prompt);
                local::render(images, mode, &params, &self.options.local)
            }
        }
    }
}

/// Human-readable note for a fallback, surfaced as a warning on the result.
fn fallback_note(kind: EngineKind, err: &Error) -> String {
    match err {
        Error::MissingCredential => {
            "Cloud API key not configured; using the local engine.".to_string()
        }
        other => format!("{kind} failed ({other}); trying the other engine."),
    }
}

fn failure_message(failures: &[(EngineKind, Error)], kind: EngineKind) -> String {
    failures
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or_else(|| "not attempted".to_string(), |(_, e)| e.to_string())
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use serde_json::{json, Value};

    use crate::cloud::{CloudConfig, RemoteReply, RemoteTransport};
    use crate::input::encode_jpeg;
    use image::{DynamicImage, Rgb, RgbImage};

    /// Counts calls and returns a canned reply.
    struct CountingTransport {
        status: u16,
        body: Value,
        calls: Rc<Cell<usize>>,
    }

    impl RemoteTransport for CountingTransport {
        fn post(&self, _endpoint: &str, _key: &str, _payload: &Value) -> Result<RemoteReply> {
            self.calls.set(self.calls.get() + 1);
            Ok(RemoteReply {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn studio_with(status: u16, body: Value, options: StudioOptions) -> (Studio, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let transport = CountingTransport {
            status,
            body,
            calls: Rc::clone(&calls),
        };
        let config = CloudConfig {
            api_key: Some("key".to_string()),
            ..CloudConfig::default()
        };
        let cloud = CloudEngine::with_transport(config, Box::new(transport));
        (Studio::new(cloud, options), calls)
    }

    fn photo(width: u32, height: u32) -> ImageInput {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([140, 110, 90]),
        ));
        ImageInput {
            data: encode_jpeg(&img, 90).unwrap(),
            mime_type: "image/jpeg".to_string(),
        }
    }

    fn rate_limit_body() -> Value {
        json!({ "error": { "message": "Too Many Requests" } })
    }

    #[test]
    fn empty_request_is_rejected_before_any_engine_runs() {
        let (studio, calls) = studio_with(200, json!({}), StudioOptions::new());
        let err = studio.process(&[], "   ", EditingMode::Single).unwrap_err();
        assert!(matches!(err, Error::InvalidInput));
        assert_eq!(calls.get(), 0, "cloud transport must not be touched");
    }

    #[test]
    fn rate_limited_cloud_falls_back_to_local() {
        let (studio, calls) = studio_with(429, rate_limit_body(), StudioOptions::new());
        let result = studio
            .process(&[photo(64, 64)], "bright", EditingMode::Single)
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(result.engine, EngineKind::Local);
        assert_eq!(result.engine.to_string(), "Local Engine (Free)");
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn missing_credential_falls_back_with_a_friendly_note() {
        let calls = Rc::new(Cell::new(0));
        let transport = CountingTransport {
            status: 200,
            body: json!({}),
            calls: Rc::clone(&calls),
        };
        let cloud = CloudEngine::with_transport(CloudConfig::default(), Box::new(transport));
        let studio = Studio::new(cloud, StudioOptions::new());

        let result = studio
            .process(&[photo(32, 32)], "warm tones", EditingMode::Single)
            .unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(result.engine, EngineKind::Local);
        assert!(result.warnings.iter().any(|w| w.contains("API key")));
    }

    #[test]
    fn both_engines_failing_is_terminal_with_no_partial_result() {
        let (studio, _) = studio_with(500, json!({}), StudioOptions::new());
        let bogus = ImageInput {
            data: b"not a jpeg".to_vec(),
            mime_type: "image/jpeg".to_string(),
        };
        let err = studio
            .process(&[bogus], "anything", EditingMode::Single)
            .unwrap_err();
        match err {
            Error::BothEnginesFailed { cloud, local } => {
                assert!(cloud.contains("500"));
                assert!(!local.is_empty());
            }
            other => panic!("expected BothEnginesFailed, got {other:?}"),
        }
    }

    #[test]
    fn local_first_order_skips_the_cloud_on_success() {
        let options = StudioOptions {
            engine_order: EngineOrder::LocalFirst,
            ..StudioOptions::new()
        };
        let (studio, calls) = studio_with(200, json!({}), options);
        let result = studio
            .process(&[photo(48, 48)], "soft", EditingMode::Single)
            .unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(result.engine, EngineKind::Local);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn blank_prompt_with_a_photo_displays_auto_enhancement() {
        let (studio, _) = studio_with(429, rate_limit_body(), StudioOptions::new());
        let result = studio
            .process(&[photo(32, 32)], "", EditingMode::Single)
            .unwrap();
        assert_eq!(result.prompt, "Auto Enhancement");
        assert!(result.timestamp_ms > 0);
    }

    #[test]
    fn watermark_toggle_changes_the_output() {
        let base = StudioOptions {
            engine_order: EngineOrder::LocalFirst,
            apply_watermark: false,
            ..StudioOptions::new()
        };
        let (plain_studio, _) = studio_with(200, json!({}), base.clone());
        let stamped_options = StudioOptions {
            apply_watermark: true,
            ..base
        };
        let (stamped_studio, _) = studio_with(200, json!({}), stamped_options);

        let photo = photo(128, 128);
        let plain = plain_studio
            .process(std::slice::from_ref(&photo), "pop", EditingMode::Single)
            .unwrap();
        let stamped = stamped_studio
            .process(std::slice::from_ref(&photo), "pop", EditingMode::Single)
            .unwrap();
        assert_ne!(plain.image.data, stamped.image.data);
    }
}
