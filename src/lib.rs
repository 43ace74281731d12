//! Dual-engine portrait studio pipeline.
//!
//! Turns one or two portrait photos plus a free-text instruction into a
//! stylized studio output. Two interchangeable engines do the work: a cloud
//! path that forwards the photos and instruction to a generative image API,
//! and a deterministic local path that derives canvas-style filter
//! compositions from the prompt text. The orchestrator tries them in a
//! configurable order with unconditional fallback, then stamps a branded
//! watermark on the result.
//!
//! # Quick Start
//!
//! ```no_run
//! use portrait_studio::{
//!     normalize_file, CloudConfig, CloudEngine, EditingMode, IntakeOptions, Studio,
//!     StudioOptions,
//! };
//!
//! let photo = normalize_file("portrait.jpg".as_ref(), &IntakeOptions::default()).unwrap();
//! let studio = Studio::new(CloudEngine::new(CloudConfig::from_env()), StudioOptions::new());
//! let result = studio
//!     .process(&[photo], "warm golden hour portrait", EditingMode::Single)
//!     .unwrap();
//! println!("engine: {}, bytes: {}", result.engine, result.image.data.len());
//! ```
//!
//! # Engines
//!
//! The cloud engine fails for distinguishable reasons (missing credential,
//! permission denied, rate limit, no image in the response); every one of
//! them triggers the local fallback. The local engine is pure and
//! deterministic: the same photos and prompt always produce the same bytes.

#![deny(missing_docs)]

pub mod cloud;
pub mod error;
pub mod filters;
pub mod input;
pub mod local;
pub mod prompt;
pub mod studio;
pub mod watermark;

pub use cloud::{CloudConfig, CloudEngine, HttpTransport, RemoteReply, RemoteTransport};
pub use error::{Error, Result};
pub use filters::FilterOp;
pub use input::{
    normalize_bytes, normalize_file, EditingMode, EncodedImage, ImageInput, IntakeOptions,
};
pub use local::LocalOptions;
pub use prompt::{analyze, FilterParameters};
pub use studio::{EngineKind, EngineOrder, ProcessingResult, Studio, StudioOptions};
pub use watermark::{finalize, WatermarkOptions};
