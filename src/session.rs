//! One client session and its event dispatch loop.
//!
//! Every user interaction is an [`Event`]. [`Session::dispatch`] applies it to
//! the session state, performs any backend call it implies, and reports what
//! the user should see as an [`Outcome`]. No event is fatal: failures are
//! scoped to the action that triggered them.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use crate::backend::Backend;
use crate::catalog::{MaskCatalog, MaskSelection};
use crate::config::ClientOptions;
use crate::editor::{EditorTab, MaskEditor};
use crate::error::{Error, Result};
use crate::geometry::DisplayRect;
use crate::submit::{self, DownloadLink};

const UPLOAD_OK: &str = "mask uploaded";
const UPLOAD_FAILED: &str = "upload failed";

/// Which upload form is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// One high/low image pair.
    #[default]
    Single,
    /// Two folders of images.
    Batch,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "batch" => Ok(Self::Batch),
            other => Err(format!("unknown mode {other:?}")),
        }
    }
}

/// Contents of the result area.
#[derive(Debug, Clone, Default)]
pub enum ResultView {
    /// Nothing to show.
    #[default]
    Empty,
    /// A processed image with its one-shot download link.
    Image(DownloadLink),
    /// A processed batch archive.
    Archive(DownloadLink),
    /// Processing failed.
    Failed,
}

impl ResultView {
    fn link_mut(&mut self) -> Option<&mut DownloadLink> {
        match self {
            Self::Image(link) | Self::Archive(link) => Some(link),
            Self::Empty | Self::Failed => None,
        }
    }
}

/// User interactions.
#[derive(Debug, Clone)]
pub enum Event {
    /// Mask selector changed.
    SelectMask(String),
    /// Mode selector changed.
    SwitchMode(Mode),
    /// High-quality image picked (single mode).
    SetHighImage(Option<PathBuf>),
    /// Low-quality image picked (single mode).
    SetLowImage(Option<PathBuf>),
    /// High-quality folder picked (batch mode).
    SetHighFolder(Vec<PathBuf>),
    /// Low-quality folder picked (batch mode).
    SetLowFolder(Vec<PathBuf>),
    /// Process button.
    Process,
    /// Save the current result into the download directory.
    SaveResult,
    /// Open the mask editor.
    OpenEditor,
    /// Close the mask editor, discarding the painter.
    CloseEditor,
    /// Switch editor tab.
    SwitchTab(EditorTab),
    /// Upload tab: template to replace.
    SelectUploadType(String),
    /// Upload tab: replacement image.
    ChooseUploadFile(Option<PathBuf>),
    /// Upload tab: send.
    UploadMask,
    /// Paint tab: reference image.
    LoadPaintImage(PathBuf),
    /// Paint tab: target template.
    SelectTargetType(String),
    /// Paint tab: canvas placement on screen.
    SetDisplay(DisplayRect),
    /// Paint tab: pointer pressed at display coordinates.
    PointerDown {
        /// Horizontal display coordinate.
        x: f64,
        /// Vertical display coordinate.
        y: f64,
    },
    /// Paint tab: pointer moved to display coordinates.
    PointerMove {
        /// Horizontal display coordinate.
        x: f64,
        /// Vertical display coordinate.
        y: f64,
    },
    /// Paint tab: pointer released.
    PointerUp,
    /// Paint tab: remove last rectangle.
    Undo,
    /// Paint tab: remove all rectangles.
    Reset,
    /// Paint tab: finish and preview.
    FinishPreview,
    /// Paint tab: finish and download directly.
    FinishDownload,
    /// Paint tab: download the preview.
    DownloadMask,
    /// Paint tab: upload the preview as the target template.
    UploadPaintedMask,
}

/// What the user sees after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed visibly.
    None,
    /// State changed; re-render.
    Redraw,
    /// Blocking message box.
    Alert(String),
    /// A file was written.
    Saved(PathBuf),
    /// The catalog was reloaded and the session reset.
    Reloaded,
}

/// The selected single-mode files and batch-mode folders.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    /// High-quality image.
    pub high: Option<PathBuf>,
    /// Low-quality image.
    pub low: Option<PathBuf>,
    /// High-quality folder contents.
    pub high_folder: Vec<PathBuf>,
    /// Low-quality folder contents.
    pub low_folder: Vec<PathBuf>,
}

/// All state of one client session.
pub struct Session<B: Backend> {
    backend: B,
    opts: ClientOptions,
    download_dir: PathBuf,
    catalog: MaskCatalog,
    selection: MaskSelection,
    mode: Mode,
    inputs: Inputs,
    result: ResultView,
    editor: Option<MaskEditor>,
}

impl<B: Backend> Session<B> {
    /// Fetch the catalog and start a session.
    ///
    /// A catalog that cannot be loaded leaves the selector empty; processing
    /// and the editor stay usable.
    pub fn start(backend: B, opts: ClientOptions, download_dir: PathBuf) -> Self {
        let catalog = match backend.masks() {
            Ok(catalog) => {
                log::info!("loaded {} mask templates", catalog.len());
                catalog
            }
            Err(e) => {
                log::warn!("could not load mask catalog: {e}");
                MaskCatalog::default()
            }
        };
        let selection = MaskSelection::initial(&catalog);
        Self {
            backend,
            opts,
            download_dir,
            catalog,
            selection,
            mode: Mode::default(),
            inputs: Inputs::default(),
            result: ResultView::Empty,
            editor: None,
        }
    }

    /// The loaded catalog.
    #[must_use]
    pub fn catalog(&self) -> &MaskCatalog {
        &self.catalog
    }

    /// Mask selector state.
    #[must_use]
    pub fn selection(&self) -> &MaskSelection {
        &self.selection
    }

    /// Active upload form.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Selected files.
    #[must_use]
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    /// Result area.
    #[must_use]
    pub fn result(&self) -> &ResultView {
        &self.result
    }

    /// The open editor, if any.
    #[must_use]
    pub fn editor(&self) -> Option<&MaskEditor> {
        self.editor.as_ref()
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Apply one event.
    ///
    /// A saved result whose revoke delay has elapsed is released first.
    pub fn dispatch(&mut self, event: Event) -> Outcome {
        if let Some(link) = self.result.link_mut() {
            link.expire(Instant::now());
        }
        match event {
            Event::SelectMask(kind) => {
                self.selection.select(&self.catalog, &kind);
                Outcome::Redraw
            }
            Event::SwitchMode(mode) => {
                self.mode = mode;
                Outcome::Redraw
            }
            Event::SetHighImage(p) => {
                self.inputs.high = p;
                Outcome::None
            }
            Event::SetLowImage(p) => {
                self.inputs.low = p;
                Outcome::None
            }
            Event::SetHighFolder(files) => {
                self.inputs.high_folder = files;
                Outcome::None
            }
            Event::SetLowFolder(files) => {
                self.inputs.low_folder = files;
                Outcome::None
            }
            Event::Process => self.process(),
            Event::SaveResult => self.save_result(),
            Event::OpenEditor => self.open_editor(),
            Event::CloseEditor => {
                self.editor = None;
                Outcome::Redraw
            }
            Event::UploadMask => self.upload_mask(),
            Event::UploadPaintedMask => self.upload_painted(),
            other => self.dispatch_editor(other),
        }
    }

    fn mask_type(&self) -> String {
        self.selection.selected().unwrap_or_default().to_string()
    }

    fn process(&mut self) -> Outcome {
        let mask_type = self.mask_type();
        let outcome = match self.mode {
            Mode::Single => submit::process_single(
                &self.backend,
                self.inputs.high.as_deref(),
                self.inputs.low.as_deref(),
                &mask_type,
                self.opts.revoke_delay,
            )
            .map(ResultView::Image),
            Mode::Batch => submit::process_batch(
                &self.backend,
                &self.inputs.high_folder,
                &self.inputs.low_folder,
                &mask_type,
            )
            .map(ResultView::Archive),
        };
        match outcome {
            Ok(view) => {
                self.result = view;
                Outcome::Redraw
            }
            Err(e) if e.is_user_input() => {
                self.result = ResultView::Empty;
                Outcome::Alert(e.to_string())
            }
            Err(e) => {
                log::warn!("processing failed: {e}");
                self.result = ResultView::Failed;
                Outcome::Redraw
            }
        }
    }

    fn save_result(&mut self) -> Outcome {
        let dir = self.download_dir.clone();
        let Some(link) = self.result.link_mut() else {
            return Outcome::None;
        };
        match link.save_into(&dir) {
            Ok(path) => Outcome::Saved(path),
            Err(e) => Outcome::Alert(e.to_string()),
        }
    }

    fn open_editor(&mut self) -> Outcome {
        // the editor always lists the backend's current templates
        match self.backend.masks() {
            Ok(catalog) => {
                self.editor = Some(MaskEditor::open(&catalog));
                Outcome::Redraw
            }
            Err(e) => {
                log::warn!("could not load mask catalog: {e}");
                Outcome::None
            }
        }
    }

    fn upload_mask(&mut self) -> Outcome {
        let Some(editor) = self.editor.as_ref() else {
            return Outcome::None;
        };
        match editor.upload(&self.backend) {
            Ok(()) => self.reload(),
            Err(e) if e.is_user_input() => Outcome::Alert(e.to_string()),
            Err(e) => {
                log::warn!("mask upload failed: {e}");
                Outcome::Alert(UPLOAD_FAILED.to_string())
            }
        }
    }

    fn upload_painted(&mut self) -> Outcome {
        let Some(editor) = self.editor.as_ref() else {
            return Outcome::None;
        };
        match editor.upload_painted(&self.backend) {
            Ok(true) => self.reload(),
            Ok(false) => Outcome::None,
            Err(e) if e.is_user_input() => Outcome::Alert(e.to_string()),
            Err(e) => {
                log::warn!("painted mask upload failed: {e}");
                Outcome::Alert(UPLOAD_FAILED.to_string())
            }
        }
    }

    /// Close the editor, refetch the catalog, and start over.
    fn reload(&mut self) -> Outcome {
        log::info!("{UPLOAD_OK}, reloading catalog");
        self.editor = None;
        match self.backend.masks() {
            Ok(catalog) => {
                self.selection = MaskSelection::initial(&catalog);
                self.catalog = catalog;
                self.mode = Mode::default();
                self.inputs = Inputs::default();
                self.result = ResultView::Empty;
                Outcome::Reloaded
            }
            Err(e) => Outcome::Alert(format!("{UPLOAD_OK}, but reloading failed: {e}")),
        }
    }

    fn dispatch_editor(&mut self, event: Event) -> Outcome {
        let dir = self.download_dir.clone();
        let Some(editor) = self.editor.as_mut() else {
            return Outcome::None;
        };
        let result: Result<Outcome> = match event {
            Event::SwitchTab(tab) => {
                editor.switch_tab(tab);
                Ok(Outcome::Redraw)
            }
            Event::SelectUploadType(kind) => {
                editor.select_upload_type(kind);
                Ok(Outcome::None)
            }
            Event::ChooseUploadFile(file) => {
                editor.choose_upload_file(file);
                Ok(Outcome::None)
            }
            Event::SelectTargetType(kind) => {
                editor.select_target_type(kind);
                Ok(Outcome::None)
            }
            Event::LoadPaintImage(path) => editor.load_image(&path).map(|()| {
                if let Some(canvas) = editor.painter().canvas_size() {
                    let display = DisplayRect::fit(
                        canvas,
                        self.opts.max_display_width,
                        self.opts.max_display_height,
                    );
                    editor.painter_mut().set_display(display);
                }
                Outcome::Redraw
            }),
            Event::SetDisplay(display) => {
                editor.painter_mut().set_display(display);
                Ok(Outcome::Redraw)
            }
            Event::PointerDown { x, y } => {
                editor.painter_mut().pointer_down(x, y);
                Ok(Outcome::None)
            }
            Event::PointerMove { x, y } => Ok(if editor.painter_mut().pointer_move(x, y) {
                Outcome::Redraw
            } else {
                Outcome::None
            }),
            Event::PointerUp => {
                editor.painter_mut().pointer_up();
                Ok(Outcome::Redraw)
            }
            Event::Undo => {
                editor.painter_mut().undo();
                Ok(Outcome::Redraw)
            }
            Event::Reset => {
                editor.painter_mut().reset();
                Ok(Outcome::Redraw)
            }
            Event::FinishPreview => editor.finish_preview().map(|_| Outcome::Redraw),
            Event::FinishDownload => editor.finish_and_download(&dir).map(Outcome::Saved),
            Event::DownloadMask => editor.download(&dir).map(Outcome::Saved),
            _ => Ok(Outcome::None),
        };
        match result {
            Ok(outcome) => outcome,
            // finishing without an image does nothing
            Err(Error::NoImageLoaded) => Outcome::None,
            Err(e) => Outcome::Alert(e.to_string()),
        }
    }
}
