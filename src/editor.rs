//! The mask editor: replace a template with an existing image, or paint one.

use std::path::{Path, PathBuf};

use crate::backend::{Backend, Upload};
use crate::catalog::MaskCatalog;
use crate::error::{Error, Result};
use crate::painter::MaskPainter;
use crate::raster::{decode_data_url, mask_filename};
use crate::submit::bare_filename;

/// Editor tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorTab {
    /// Upload an existing mask image.
    #[default]
    Upload,
    /// Paint a mask over a reference image.
    Create,
}

/// An open mask editor.
///
/// Opening snapshots the catalog's options; closing the editor (dropping it)
/// discards the painter session.
#[derive(Debug, Default)]
pub struct MaskEditor {
    tab: EditorTab,
    options: Vec<(String, String)>,
    upload_type: Option<String>,
    upload_file: Option<PathBuf>,
    target_type: Option<String>,
    painter: MaskPainter,
}

impl MaskEditor {
    /// Open on the upload tab with both type selectors on the first template.
    #[must_use]
    pub fn open(catalog: &MaskCatalog) -> Self {
        let options: Vec<(String, String)> = catalog
            .options()
            .map(|(k, n)| (k.to_string(), n.to_string()))
            .collect();
        let first = options.first().map(|(k, _)| k.clone());
        Self {
            tab: EditorTab::Upload,
            options,
            upload_type: first.clone(),
            upload_file: None,
            target_type: first,
            painter: MaskPainter::new(),
        }
    }

    /// Active tab.
    #[must_use]
    pub fn tab(&self) -> EditorTab {
        self.tab
    }

    /// Switch tabs. Painter state is kept across switches.
    pub fn switch_tab(&mut self, tab: EditorTab) {
        self.tab = tab;
    }

    /// `(type, name)` options shown in both selectors.
    #[must_use]
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Template the upload tab will replace.
    pub fn select_upload_type(&mut self, kind: impl Into<String>) {
        self.upload_type = Some(kind.into());
    }

    /// Image the upload tab will send.
    pub fn choose_upload_file(&mut self, file: Option<PathBuf>) {
        self.upload_file = file;
    }

    /// Send the chosen file as the new image of the chosen template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingInput`] without a file (nothing is sent), or the
    /// read/backend error.
    pub fn upload<B: Backend + ?Sized>(&self, backend: &B) -> Result<()> {
        let file = self
            .upload_file
            .as_deref()
            .ok_or(Error::MissingInput("please choose an image"))?;
        let kind = self.upload_type.as_deref().unwrap_or_default();
        let upload = Upload::from_path(file)?;
        log::info!("replacing mask {kind:?} with {}", upload.filename);
        backend.update_mask(kind, upload)
    }

    /// Template the painted mask is saved as.
    #[must_use]
    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    /// Set the painted mask's template.
    pub fn select_target_type(&mut self, kind: impl Into<String>) {
        self.target_type = Some(kind.into());
    }

    /// The painter session.
    #[must_use]
    pub fn painter(&self) -> &MaskPainter {
        &self.painter
    }

    /// The painter session, mutably.
    pub fn painter_mut(&mut self) -> &mut MaskPainter {
        &mut self.painter
    }

    /// Load a reference image from disk into the painter.
    ///
    /// # Errors
    ///
    /// Returns an I/O or decode error; the painter is unchanged on failure.
    pub fn load_image(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.painter.load_image_bytes(&bytes)
    }

    fn download_name(&self) -> String {
        let name = mask_filename(self.target_type.as_deref().unwrap_or_default());
        bare_filename(&name).unwrap_or_else(|| mask_filename(""))
    }

    fn write_mask(&self, dir: &Path, png: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let dest = dir.join(self.download_name());
        std::fs::write(&dest, png)?;
        log::info!("saved mask {}", dest.display());
        Ok(dest)
    }

    /// Finish the mask and keep it for preview, download, or upload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImageLoaded`] without an image.
    pub fn finish_preview(&mut self) -> Result<&str> {
        self.painter.finish()
    }

    /// Rasterize and write `mask_<type>.png` into `dir` without keeping a preview.
    ///
    /// `dir` is created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImageLoaded`] without an image, or an encode/I/O error.
    pub fn finish_and_download(&self, dir: &Path) -> Result<PathBuf> {
        let png = self.painter.rasterize()?.to_png()?;
        self.write_mask(dir, &png)
    }

    /// Write the previewed mask as `mask_<type>.png` into `dir`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPendingMask`] before a preview was finished.
    pub fn download(&self, dir: &Path) -> Result<PathBuf> {
        let url = self.painter.pending_mask().ok_or(Error::NoPendingMask)?;
        let (_, png) = decode_data_url(url)?;
        self.write_mask(dir, &png)
    }

    /// Upload the previewed mask as the target template.
    ///
    /// Returns `Ok(false)` without sending when no target template is selected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPendingMask`] before a preview was finished, or the
    /// backend error.
    pub fn upload_painted<B: Backend + ?Sized>(&self, backend: &B) -> Result<bool> {
        let url = self.painter.pending_mask().ok_or(Error::NoPendingMask)?;
        let Some(kind) = self.target_type.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(false);
        };
        let (_, png) = decode_data_url(url)?;
        log::info!("uploading painted mask as {kind:?}");
        backend.update_mask(kind, Upload::new("mask.png", png))?;
        Ok(true)
    }
}
