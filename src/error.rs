//! Error types for the portrait-studio pipeline.

/// Errors that can occur while producing a studio image.
///
/// Cloud-engine failures (`MissingCredential`, `Permission`, `RateLimited`,
/// `NoImageReturned`, `Remote`) are caught by the orchestrator and trigger the
/// local fallback; callers only ever see them wrapped in
/// [`Error::BothEnginesFailed`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither an image nor a non-blank prompt was supplied.
    #[error("nothing to process: supply at least one photo or an instruction")]
    InvalidInput,

    /// No API credential is configured for the cloud engine.
    #[error("cloud API key not configured")]
    MissingCredential,

    /// The remote API rejected the credential or model access.
    #[error("cloud permission denied: {0}")]
    Permission(String),

    /// The remote API rate limit or quota was exhausted.
    #[error("cloud rate limit exceeded: {0}")]
    RateLimited(String),

    /// The remote response contained no inline image part.
    #[error("cloud engine returned no image part")]
    NoImageReturned,

    /// Any other remote failure (transport error, unexpected status).
    #[error("cloud request failed: {0}")]
    Remote(String),

    /// An uploaded file could not be decoded as an image.
    #[error("failed to decode input image: {0}")]
    Decode(image::ImageError),

    /// The output canvas dimensions are unusable.
    #[error("cannot allocate a {width}x{height} canvas")]
    CanvasInit {
        /// Requested canvas width in pixels.
        width: u32,
        /// Requested canvas height in pixels.
        height: u32,
    },

    /// A source image failed to decode during local rendering.
    #[error("failed to load source image: {0}")]
    ImageLoad(image::ImageError),

    /// Both the cloud and local engines failed; no output was produced.
    #[error("both engines failed (cloud: {cloud}; local: {local})")]
    BothEnginesFailed {
        /// Why the cloud engine failed.
        cloud: String,
        /// Why the local fallback failed.
        local: String,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while encoding an output image.
    #[error("image encoding error: {0}")]
    Encode(#[from] image::ImageError),
}

impl Error {
    /// Whether this error originated in the cloud engine.
    ///
    /// Every cloud-side category triggers the local fallback, so the
    /// orchestrator only needs this for log wording, not for control flow.
    #[must_use]
    pub fn is_cloud(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::Permission(_)
                | Self::RateLimited(_)
                | Self::NoImageReturned
                | Self::Remote(_)
        )
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
