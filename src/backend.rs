//! The watermark removal service as seen from the client.
//!
//! [`Backend`] is the seam between the UI flows and the network: the session
//! only ever talks to the four endpoints through it, and tests substitute a
//! recording fake. [`HttpBackend`] is the real implementation.

use std::path::Path;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Url;

use crate::catalog::MaskCatalog;
use crate::config::ClientOptions;
use crate::error::{Error, Result};

/// Endpoint serving the mask catalog.
pub const MASKS: &str = "/masks";
/// Endpoint processing one high/low image pair.
pub const PROCESS_SINGLE: &str = "/process_single";
/// Endpoint processing two zip archives of images.
pub const PROCESS_BATCH: &str = "/process_batch";
/// Endpoint replacing a mask template image.
pub const UPDATE_MASK: &str = "/update_mask";

/// A named file payload for a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Filename sent with the part.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Wrap in-memory bytes.
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its base name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |f| f.to_string_lossy().into_owned());
        Ok(Self { filename, bytes })
    }

    fn into_part(self) -> Result<Part> {
        let mime = mime_for(&self.filename);
        Ok(Part::bytes(self.bytes)
            .file_name(self.filename)
            .mime_str(mime)?)
    }
}

fn mime_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Raw body of a processed single pair, with the filename hint if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleResponse {
    /// Value of the `Content-Disposition` header.
    pub content_disposition: Option<String>,
    /// Image bytes.
    pub bytes: Vec<u8>,
}

/// The four service endpoints.
pub trait Backend {
    /// `GET /masks`.
    ///
    /// # Errors
    ///
    /// Transport, status, or catalog parse failures.
    fn masks(&self) -> Result<MaskCatalog>;

    /// `POST /process_single` with `high`, `low`, `mask_type`.
    ///
    /// # Errors
    ///
    /// Transport or non-success status.
    fn process_single(&self, high: Upload, low: Upload, mask_type: &str) -> Result<SingleResponse>;

    /// `POST /process_batch` with `high_zip`, `low_zip`, `mask_type`.
    ///
    /// # Errors
    ///
    /// Transport or non-success status.
    fn process_batch(&self, high_zip: Upload, low_zip: Upload, mask_type: &str)
        -> Result<Vec<u8>>;

    /// `POST /update_mask` with `mask_type`, `file`.
    ///
    /// # Errors
    ///
    /// Transport or non-success status.
    fn update_mask(&self, mask_type: &str, file: Upload) -> Result<()>;
}

/// [`Backend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    /// Build a client for `opts.server_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for an unparsable server URL, or
    /// [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(opts: &ClientOptions) -> Result<Self> {
        let mut base =
            Url::parse(&opts.server_url).map_err(|e| Error::InvalidUrl(format!("{e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(opts.timeout).build()?;
        Ok(Self { client, base })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve an endpoint path or a catalog thumbnail URL against the base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the joined URL is invalid.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }

    fn post(&self, endpoint: &'static str, form: Form) -> Result<Response> {
        let url = self.resolve(endpoint)?;
        log::debug!("POST {url}");
        let resp = self.client.post(url).multipart(form).send()?;
        check(endpoint, resp)
    }
}

fn check(endpoint: &'static str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        log::warn!("{endpoint} answered {status}");
        Err(Error::Status {
            endpoint,
            status: status.as_u16(),
        })
    }
}

impl Backend for HttpBackend {
    fn masks(&self) -> Result<MaskCatalog> {
        let url = self.resolve(MASKS)?;
        log::debug!("GET {url}");
        let resp = check(MASKS, self.client.get(url).send()?)?;
        MaskCatalog::from_json(&resp.bytes()?)
    }

    fn process_single(&self, high: Upload, low: Upload, mask_type: &str) -> Result<SingleResponse> {
        let form = Form::new()
            .part("high", high.into_part()?)
            .part("low", low.into_part()?)
            .text("mask_type", mask_type.to_string());
        let resp = self.post(PROCESS_SINGLE, form)?;
        let content_disposition = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes()?.to_vec();
        Ok(SingleResponse {
            content_disposition,
            bytes,
        })
    }

    fn process_batch(
        &self,
        high_zip: Upload,
        low_zip: Upload,
        mask_type: &str,
    ) -> Result<Vec<u8>> {
        let form = Form::new()
            .part("high_zip", high_zip.into_part()?)
            .part("low_zip", low_zip.into_part()?)
            .text("mask_type", mask_type.to_string());
        let resp = self.post(PROCESS_BATCH, form)?;
        Ok(resp.bytes()?.to_vec())
    }

    fn update_mask(&self, mask_type: &str, file: Upload) -> Result<()> {
        let form = Form::new()
            .text("mask_type", mask_type.to_string())
            .part("file", file.into_part()?);
        self.post(UPDATE_MASK, form)?;
        Ok(())
    }
}
