//! Error types for the watermark-mask-client crate.

/// Errors that can occur while talking to the backend or editing masks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required file or folder selection is missing; no request was sent.
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    /// The HTTP transport failed (connect, timeout, body read).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint path that was called.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The backend URL could not be parsed or joined.
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// The mask catalog could not be parsed.
    #[error("invalid mask catalog: {0}")]
    Json(#[from] serde_json::Error),

    /// Packing a folder into a zip archive failed.
    #[error("zip packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A data URL was malformed or not base64.
    #[error("malformed data URL: {0}")]
    DataUrl(String),

    /// A painter operation needs an image and none is loaded.
    #[error("no image loaded in the mask painter")]
    NoImageLoaded,

    /// Download or upload was requested before the mask was finished.
    #[error("finish and preview the mask first")]
    NoPendingMask,

    /// The download link was already released.
    #[error("download link for {0} has been revoked")]
    LinkRevoked(String),

    /// A rectangle could not be parsed.
    #[error("invalid rectangle {0:?}, expected x,y,w,h")]
    InvalidRect(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while decoding or encoding an image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Whether this error is a user-input error that was caught before any request.
    #[must_use]
    pub fn is_user_input(&self) -> bool {
        matches!(self, Self::MissingInput(_) | Self::NoPendingMask)
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
