//! Cloud rendering engine: remote generative editing.
//!
//! Builds one `generateContent` request per render (reference photos as
//! ordered inline parts, then a single composed instruction), sends it
//! synchronously, and scans the response parts for the first inline image.
//! The transport sits behind a trait so tests can inject fakes; credentials
//! travel in [`CloudConfig`], never in hidden module state.

use std::env;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::debug;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::input::{EncodedImage, EditingMode, ImageInput};

/// Default API base for the generative endpoint.
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default image-capable model.
const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
/// Transport timeout for one remote call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Fixed quality directives appended to every instruction, constraining the
/// model's stylistic variance regardless of the user's prompt wording.
const QUALITY_DIRECTIVES: &str = "\
- Hyper-realistic facial accuracy and professional studio lighting.
- Sharp textures, cinematic depth, and high anatomical detail.
- If reference photos are provided, maintain strong facial resemblance.
- Output should be a masterpiece of professional photography.";

/// Directive added when two subjects must be merged into one scene.
const COMBINE_DIRECTIVE: &str =
    "COMPOSITION: Combine both subjects into one coherent composition.";

/// Cloud engine configuration: credential, endpoint base, and model.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// API key; `None` makes every render fail with
    /// [`Error::MissingCredential`] before any transport activity.
    pub api_key: Option<String>,
    /// Endpoint base URL, without a trailing slash.
    pub api_base: String,
    /// Model identifier.
    pub model: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl CloudConfig {
    /// Build a config from the environment.
    ///
    /// Reads `GEMINI_API_KEY` falling back to `GOOGLE_API_KEY`, and honors a
    /// `GEMINI_API_BASE` override.
    #[must_use]
    pub fn from_env() -> Self {
        let api_base = non_empty_env("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            api_base,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A raw remote reply: HTTP status plus parsed JSON body.
#[derive(Debug, Clone)]
pub struct RemoteReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body; `Value::Null` when the body is not JSON.
    pub body: Value,
}

/// The transport seam between the engine and the wire.
///
/// Production uses [`HttpTransport`]; tests inject fakes to exercise the
/// engine deterministically.
pub trait RemoteTransport {
    /// POST a JSON payload to the endpoint, authenticated with the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] on transport-level failure (connect,
    /// timeout). HTTP error statuses are returned as a [`RemoteReply`], not
    /// as errors; classification is the engine's job.
    fn post(&self, endpoint: &str, api_key: &str, payload: &Value) -> Result<RemoteReply>;
}

/// Blocking reqwest transport.
pub struct HttpTransport {
    http: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport with the default client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteTransport for HttpTransport {
    fn post(&self, endpoint: &str, api_key: &str, payload: &Value) -> Result<RemoteReply> {
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", api_key)])
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .map_err(|e| Error::Remote(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().map_err(|e| Error::Remote(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(RemoteReply { status, body })
    }
}

/// The cloud rendering engine.
pub struct CloudEngine {
    config: CloudConfig,
    transport: Box<dyn RemoteTransport>,
}

impl CloudEngine {
    /// Create an engine using the blocking HTTP transport.
    #[must_use]
    pub fn new(config: CloudConfig) -> Self {
        Self::with_transport(config, Box::new(HttpTransport::new()))
    }

    /// Create an engine with an injected transport (used in tests).
    #[must_use]
    pub fn with_transport(config: CloudConfig, transport: Box<dyn RemoteTransport>) -> Self {
        Self { config, transport }
    }

    /// Generate or edit a studio image remotely.
    ///
    /// Reference photos are sent as ordered inline parts (person 1 first),
    /// followed by one composed instruction text. The response is scanned
    /// part by part for the first inline image; part order is never assumed.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCredential`] when no API key is configured; the
    ///   transport is never touched in that case.
    /// - [`Error::Permission`] / [`Error::RateLimited`] / [`Error::Remote`]
    ///   classified from the HTTP failure.
    /// - [`Error::NoImageReturned`] when no response part carries an image.
    pub fn render(
        &self,
        images: &[ImageInput],
        prompt: &str,
        mode: EditingMode,
    ) -> Result<EncodedImage> {
        let api_key = self.config.api_key.as_deref().ok_or(Error::MissingCredential)?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.config.api_base, self.config.model
        );
        let payload = build_payload(images, prompt);
        debug!(
            "cloud render: mode={mode:?}, {} reference image(s), model={}",
            images.len(),
            self.config.model
        );

        let reply = self.transport.post(&endpoint, api_key, &payload)?;
        if !(200..300).contains(&reply.status) {
            return Err(classify_failure(reply.status, &reply.body));
        }

        extract_inline_image(&reply.body).ok_or(Error::NoImageReturned)
    }
}

/// Build the `generateContent` payload: inline image parts in call order,
/// then a single instruction text, with a fixed 1:1 output aspect ratio.
fn build_payload(images: &[ImageInput], prompt: &str) -> Value {
    let mut parts: Vec<Value> = images
        .iter()
        .map(|img| {
            json!({
                "inlineData": {
                    "mimeType": img.mime_type,
                    "data": BASE64.encode(&img.data),
                }
            })
        })
        .collect();
    parts.push(json!({ "text": compose_instruction(prompt, images.len()) }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": { "aspectRatio": "1:1" },
        },
    })
}

/// Compose the instruction text for the given number of reference photos.
///
/// Generation (no photo) and editing (with photos) use distinct templates;
/// the dual-photo template additionally carries the combine directive.
fn compose_instruction(prompt: &str, image_count: usize) -> String {
    match image_count {
        0 => format!(
            "TASK: Pro Photo Generation. DESCRIPTION: {prompt}.\n\nQUALITY RULES: {QUALITY_DIRECTIVES}"
        ),
        1 => format!(
            "TASK: Pro Facial Editing. INSTRUCTION: {prompt}.\n\nQUALITY RULES: {QUALITY_DIRECTIVES}"
        ),
        _ => format!(
            "TASK: Pro Facial Editing. INSTRUCTION: {prompt}.\n\n{COMBINE_DIRECTIVE}\n\nQUALITY RULES: {QUALITY_DIRECTIVES}"
        ),
    }
}

/// Scan response parts for the first inline image payload.
///
/// Accepts both `inlineData` and `inline_data` spellings; text parts and any
/// other part types are skipped. First match wins.
fn extract_inline_image(body: &Value) -> Option<EncodedImage> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    for part in parts {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let Some(data) = inline.get("data").and_then(Value::as_str) else {
            continue;
        };
        let Ok(bytes) = BASE64.decode(data.as_bytes()) else {
            continue;
        };
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png")
            .to_string();
        return Some(EncodedImage {
            data: bytes,
            mime_type,
        });
    }
    None
}

/// Map an HTTP failure onto the error taxonomy.
///
/// 403 / `PERMISSION_DENIED` / "entity not found" mean the credential or
/// model access is bad; 429 / "Too Many Requests" means quota; everything
/// else is an unknown remote failure.
fn classify_failure(status: u16, body: &Value) -> Error {
    let message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map_or_else(|| body.to_string(), str::to_string);
    let haystack = message.to_lowercase();

    if status == 403
        || haystack.contains("permission_denied")
        || haystack.contains("permission denied")
        || haystack.contains("entity not found")
    {
        Error::Permission(message)
    } else if status == 429 || haystack.contains("too many requests") {
        Error::RateLimited(message)
    } else {
        Error::Remote(format!("HTTP {status}: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records calls and returns a canned reply.
    struct FakeTransport {
        reply: RemoteReply,
        calls: Rc<RefCell<Vec<Value>>>,
    }

    impl FakeTransport {
        fn new(status: u16, body: Value) -> Self {
            Self {
                reply: RemoteReply { status, body },
                calls: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl RemoteTransport for FakeTransport {
        fn post(&self, _endpoint: &str, _api_key: &str, payload: &Value) -> Result<RemoteReply> {
            self.calls.borrow_mut().push(payload.clone());
            Ok(self.reply.clone())
        }
    }

    fn keyed_config() -> CloudConfig {
        CloudConfig {
            api_key: Some("test-key".to_string()),
            ..CloudConfig::default()
        }
    }

    fn sample_input() -> ImageInput {
        ImageInput {
            data: vec![1, 2, 3, 4],
            mime_type: "image/jpeg".to_string(),
        }
    }

    fn image_reply(data: &[u8]) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your portrait." },
                        { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(data) } },
                    ]
                }
            }]
        })
    }

    #[test]
    fn missing_credential_fails_before_any_transport_call() {
        let transport = Box::new(FakeTransport::new(200, image_reply(b"img")));
        let engine = CloudEngine::with_transport(CloudConfig::default(), transport);
        let err = engine
            .render(&[sample_input()], "make it bright", EditingMode::Single)
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential));
    }

    #[test]
    fn image_part_is_found_even_after_text_parts() {
        let engine = CloudEngine::with_transport(
            keyed_config(),
            Box::new(FakeTransport::new(200, image_reply(b"png-bytes"))),
        );
        let out = engine
            .render(&[sample_input()], "vintage", EditingMode::Single)
            .unwrap();
        assert_eq!(out.data, b"png-bytes");
        assert_eq!(out.mime_type, "image/png");
    }

    #[test]
    fn snake_case_inline_data_is_accepted() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "inline_data": { "mime_type": "image/jpeg", "data": BASE64.encode(b"x") } },
                    ]
                }
            }]
        });
        let engine = CloudEngine::with_transport(
            keyed_config(),
            Box::new(FakeTransport::new(200, body)),
        );
        let out = engine.render(&[], "a portrait", EditingMode::Single).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
    }

    #[test]
    fn text_only_response_is_no_image_returned() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }]
        });
        let engine = CloudEngine::with_transport(
            keyed_config(),
            Box::new(FakeTransport::new(200, body)),
        );
        let err = engine
            .render(&[sample_input()], "prompt", EditingMode::Single)
            .unwrap_err();
        assert!(matches!(err, Error::NoImageReturned));
    }

    #[test]
    fn http_403_classifies_as_permission() {
        let body = json!({ "error": { "message": "PERMISSION_DENIED: key invalid" } });
        let engine = CloudEngine::with_transport(
            keyed_config(),
            Box::new(FakeTransport::new(403, body)),
        );
        let err = engine
            .render(&[sample_input()], "prompt", EditingMode::Single)
            .unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
    }

    #[test]
    fn http_429_classifies_as_rate_limited() {
        let body = json!({ "error": { "message": "Too Many Requests" } });
        let engine = CloudEngine::with_transport(
            keyed_config(),
            Box::new(FakeTransport::new(429, body)),
        );
        let err = engine
            .render(&[sample_input()], "prompt", EditingMode::Single)
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[test]
    fn other_statuses_classify_as_remote() {
        let engine = CloudEngine::with_transport(
            keyed_config(),
            Box::new(FakeTransport::new(500, json!({ "error": { "message": "boom" } }))),
        );
        let err = engine
            .render(&[sample_input()], "prompt", EditingMode::Single)
            .unwrap_err();
        match err {
            Error::Remote(msg) => assert!(msg.contains("500")),
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn payload_orders_image_parts_before_the_instruction() {
        let transport = FakeTransport::new(200, image_reply(b"ok"));
        let calls = Rc::clone(&transport.calls);
        let engine = CloudEngine::with_transport(keyed_config(), Box::new(transport));

        let person1 = ImageInput {
            data: vec![0xAA],
            mime_type: "image/jpeg".to_string(),
        };
        let person2 = ImageInput {
            data: vec![0xBB],
            mime_type: "image/png".to_string(),
        };
        engine
            .render(&[person1, person2], "studio portrait", EditingMode::Couple)
            .unwrap();

        let recorded = calls.borrow();
        let parts = recorded[0]["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["data"], BASE64.encode([0xAA]));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");

        let text = parts[2]["text"].as_str().unwrap();
        assert!(text.contains("studio portrait"));
        assert!(text.contains("Combine both subjects"));
        assert_eq!(
            recorded[0]["generationConfig"]["imageConfig"]["aspectRatio"],
            "1:1"
        );
    }

    #[test]
    fn single_image_instruction_has_no_combine_directive() {
        let single = compose_instruction("warm tones", 1);
        assert!(single.contains("Pro Facial Editing"));
        assert!(!single.contains("Combine both subjects"));

        let generation = compose_instruction("a mountain lake", 0);
        assert!(generation.contains("Pro Photo Generation"));
        assert!(generation.contains("QUALITY RULES"));
    }
}
