//! Single-pair and batch submissions, and the download links they produce.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::backend::{Backend, Upload};
use crate::config::{BATCH_RESULT_NAME, DEFAULT_RESULT_NAME};
use crate::error::{Error, Result};

/// A downloadable result held in memory.
///
/// Links created with a revoke delay are one-shot in spirit: the first save
/// starts a timer, and once it elapses the bytes are released and further
/// saves fail with [`Error::LinkRevoked`].
#[derive(Debug, Clone)]
pub struct DownloadLink {
    filename: String,
    bytes: Option<Vec<u8>>,
    revoke_delay: Option<Duration>,
    first_save: Option<Instant>,
}

impl DownloadLink {
    /// A link released `revoke_delay` after its first save.
    #[must_use]
    pub fn one_shot(filename: impl Into<String>, bytes: Vec<u8>, revoke_delay: Duration) -> Self {
        Self {
            filename: filename.into(),
            bytes: Some(bytes),
            revoke_delay: Some(revoke_delay),
            first_save: None,
        }
    }

    /// A link that stays valid for the whole session.
    #[must_use]
    pub fn persistent(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes: Some(bytes),
            revoke_delay: None,
            first_save: None,
        }
    }

    /// Suggested download filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The payload, unless the link was revoked.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Release the payload if the revoke delay has elapsed at `now`.
    ///
    /// Returns whether the link is revoked afterwards.
    pub fn expire(&mut self, now: Instant) -> bool {
        if let (Some(first), Some(delay)) = (self.first_save, self.revoke_delay) {
            if now.saturating_duration_since(first) >= delay && self.bytes.take().is_some() {
                log::debug!("released download link {}", self.filename);
            }
        }
        self.bytes.is_none()
    }

    /// Write the payload into `dir` under the suggested filename.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LinkRevoked`] after the link was released, or
    /// [`Error::Io`] if writing fails.
    pub fn save_into(&mut self, dir: &Path) -> Result<PathBuf> {
        let dest = dir.join(&self.filename);
        self.save_as(&dest)?;
        Ok(dest)
    }

    /// Write the payload to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LinkRevoked`] after the link was released, or
    /// [`Error::Io`] if writing fails.
    pub fn save_as(&mut self, dest: &Path) -> Result<()> {
        self.save_at(dest, Instant::now())
    }

    fn save_at(&mut self, dest: &Path, now: Instant) -> Result<()> {
        if self.expire(now) {
            return Err(Error::LinkRevoked(self.filename.clone()));
        }
        let bytes = self
            .bytes
            .as_deref()
            .ok_or_else(|| Error::LinkRevoked(self.filename.clone()))?;
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(dest, bytes)?;
        self.first_save.get_or_insert(now);
        log::info!("saved {}", dest.display());
        Ok(())
    }
}

/// Extract the filename hint from a `Content-Disposition` header.
///
/// Matches `filename=` case-insensitively, with or without quotes, and
/// percent-decodes the value.
#[must_use]
pub fn disposition_filename(header: &str) -> Option<String> {
    const KEY: &str = "filename=";
    let start = header.to_ascii_lowercase().find(KEY)? + KEY.len();
    let rest = header[start..].strip_prefix('"').unwrap_or(&header[start..]);
    let end = rest.find(['"', ';']).unwrap_or(rest.len());
    let raw = &rest[..end];
    if raw.is_empty() {
        return None;
    }
    Some(
        urlencoding::decode(raw)
            .map_or_else(|_| raw.to_string(), std::borrow::Cow::into_owned),
    )
}

/// Reduce a server-suggested name to its final path component.
///
/// Returns `None` when nothing usable is left (empty, `.` or `..`), so callers
/// can fall back to a default name and never write outside their directory.
#[must_use]
pub fn bare_filename(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// Submit one high/low pair and wrap the result as a one-shot download.
///
/// Both inputs are checked before anything is read or sent.
///
/// # Errors
///
/// Returns [`Error::MissingInput`] if either image is missing, an I/O error if
/// a file cannot be read, or the backend's error.
pub fn process_single<B: Backend + ?Sized>(
    backend: &B,
    high: Option<&Path>,
    low: Option<&Path>,
    mask_type: &str,
    revoke_delay: Duration,
) -> Result<DownloadLink> {
    let (Some(high), Some(low)) = (high, low) else {
        return Err(Error::MissingInput("please upload two images"));
    };
    let high = Upload::from_path(high)?;
    let low = Upload::from_path(low)?;
    log::info!(
        "processing {} / {} with mask {mask_type:?}",
        high.filename,
        low.filename
    );
    let resp = backend.process_single(high, low, mask_type)?;
    let filename = resp
        .content_disposition
        .as_deref()
        .and_then(disposition_filename)
        .and_then(|name| bare_filename(&name))
        .unwrap_or_else(|| DEFAULT_RESULT_NAME.to_string());
    Ok(DownloadLink::one_shot(filename, resp.bytes, revoke_delay))
}

/// Pack both folders, submit them, and wrap the result archive.
///
/// # Errors
///
/// Returns [`Error::MissingInput`] if either folder is empty, a packaging
/// error, or the backend's error.
pub fn process_batch<B: Backend + ?Sized>(
    backend: &B,
    high_files: &[PathBuf],
    low_files: &[PathBuf],
    mask_type: &str,
) -> Result<DownloadLink> {
    if high_files.is_empty() || low_files.is_empty() {
        return Err(Error::MissingInput("please upload two folders"));
    }
    log::info!(
        "packing {} high and {} low files",
        high_files.len(),
        low_files.len()
    );
    let (high_zip, low_zip) = pack_pair(high_files, low_files)?;
    let archive = backend.process_batch(
        Upload::new("high.zip", high_zip),
        Upload::new("low.zip", low_zip),
        mask_type,
    )?;
    Ok(DownloadLink::persistent(BATCH_RESULT_NAME, archive))
}

/// Pack two file lists into zip archives, in parallel when `rayon` is available.
///
/// # Errors
///
/// Returns the first packaging error of either archive.
pub fn pack_pair(high: &[PathBuf], low: &[PathBuf]) -> Result<(Vec<u8>, Vec<u8>)> {
    #[cfg(feature = "cli")]
    let (h, l) = rayon::join(|| pack_files(high), || pack_files(low));

    #[cfg(not(feature = "cli"))]
    let (h, l) = (pack_files(high), pack_files(low));

    Ok((h?, l?))
}

/// Zip files under their base names only, discarding directory structure.
///
/// When two files share a base name the later one replaces the earlier one's
/// contents at the earlier position.
///
/// # Errors
///
/// Returns an I/O error if a file cannot be read, or [`Error::Zip`] if the
/// archive cannot be written.
pub fn pack_files(files: &[PathBuf]) -> Result<Vec<u8>> {
    let mut entries: Vec<(String, &Path)> = Vec::with_capacity(files.len());
    for path in files {
        let Some(name) = path.file_name() else {
            continue;
        };
        let name = name.to_string_lossy().into_owned();
        match entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = path,
            None => entries.push((name, path)),
        }
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, path) in &entries {
        let bytes = std::fs::read(path)?;
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// All regular files under `dir`, recursively, in sorted path order.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory cannot be read.
pub fn collect_folder(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}
