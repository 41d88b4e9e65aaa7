//! Client configuration.

use std::time::Duration;

/// Filename used when the backend sends no `Content-Disposition` hint.
pub const DEFAULT_RESULT_NAME: &str = "result.jpg";
/// Filename of the batch result archive.
pub const BATCH_RESULT_NAME: &str = "result.zip";

/// Options controlling how the client talks to the backend.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the watermark removal service.
    pub server_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// How long a download link stays usable after its first click.
    pub revoke_delay: Duration,
    /// Maximum on-screen width of the painter canvas.
    pub max_display_width: f64,
    /// Maximum on-screen height of the painter canvas.
    pub max_display_height: f64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            timeout: Some(Duration::from_secs(300)),
            revoke_delay: Duration::from_secs(2),
            max_display_width: 1280.0,
            max_display_height: 720.0,
        }
    }
}
