use std::cell::RefCell;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use image::{DynamicImage, GrayImage};
use watermark_mask_client::{
    Backend, ClientOptions, DisplayRect, EditorTab, Error, Event, MaskCatalog, MaskTemplate, Mode,
    Outcome, Rect, Result, ResultView, Session, SingleResponse, Upload,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Masks,
    Single {
        high: Upload,
        low: Upload,
        mask_type: String,
    },
    Batch {
        high_zip: Upload,
        low_zip: Upload,
        mask_type: String,
    },
    Update {
        mask_type: String,
        file: Upload,
    },
}

/// Backend that records every call and answers from canned data.
#[derive(Clone)]
struct FakeBackend {
    calls: Rc<RefCell<Vec<Call>>>,
    templates: Vec<MaskTemplate>,
    disposition: Option<String>,
    fail: bool,
    catalog_down: bool,
}

impl FakeBackend {
    fn new() -> Self {
        let template = |kind: &str| MaskTemplate {
            kind: kind.to_string(),
            name: kind.to_uppercase(),
            thumb: format!("/static/mask_{kind}.png"),
        };
        Self {
            calls: Rc::default(),
            templates: vec![template("vertical"), template("square"), template("custom1")],
            disposition: Some("attachment; filename=\"high.jpg\"".to_string()),
            fail: false,
            catalog_down: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn requests(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Masks)
            .collect()
    }

    fn status(&self, endpoint: &'static str) -> Result<()> {
        if self.fail {
            Err(Error::Status {
                endpoint,
                status: 500,
            })
        } else {
            Ok(())
        }
    }
}

impl Backend for FakeBackend {
    fn masks(&self) -> Result<MaskCatalog> {
        self.calls.borrow_mut().push(Call::Masks);
        if self.catalog_down {
            return Err(Error::Status {
                endpoint: "/masks",
                status: 503,
            });
        }
        Ok(MaskCatalog::new(self.templates.clone()))
    }

    fn process_single(&self, high: Upload, low: Upload, mask_type: &str) -> Result<SingleResponse> {
        self.calls.borrow_mut().push(Call::Single {
            high,
            low,
            mask_type: mask_type.to_string(),
        });
        self.status("/process_single")?;
        Ok(SingleResponse {
            content_disposition: self.disposition.clone(),
            bytes: b"processed".to_vec(),
        })
    }

    fn process_batch(&self, high_zip: Upload, low_zip: Upload, mask_type: &str) -> Result<Vec<u8>> {
        self.calls.borrow_mut().push(Call::Batch {
            high_zip,
            low_zip,
            mask_type: mask_type.to_string(),
        });
        self.status("/process_batch")?;
        Ok(b"zipped".to_vec())
    }

    fn update_mask(&self, mask_type: &str, file: Upload) -> Result<()> {
        self.calls.borrow_mut().push(Call::Update {
            mask_type: mask_type.to_string(),
            file,
        });
        self.status("/update_mask")
    }
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

fn session(backend: &FakeBackend, dir: &Path) -> Session<FakeBackend> {
    Session::start(backend.clone(), ClientOptions::default(), dir.to_path_buf())
}

fn zip_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[test]
fn start_selects_first_template() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let s = session(&backend, dir.path());
    assert_eq!(s.selection().selected(), Some("vertical"));
    assert_eq!(s.selection().thumbnail(), Some("/static/mask_vertical.png"));
    assert_eq!(backend.calls(), [Call::Masks]);
}

#[test]
fn unreachable_catalog_still_allows_processing() {
    let backend = FakeBackend {
        catalog_down: true,
        ..FakeBackend::new()
    };
    let dir = tempfile::tempdir().unwrap();
    let high = write(dir.path(), "a.png", b"a");
    let low = write(dir.path(), "b.png", b"b");
    let mut s = session(&backend, dir.path());
    assert!(s.catalog().is_empty());
    assert_eq!(s.selection().selected(), None);
    assert_eq!(s.selection().thumbnail(), None);

    s.dispatch(Event::SetHighImage(Some(high)));
    s.dispatch(Event::SetLowImage(Some(low)));
    assert_eq!(s.dispatch(Event::Process), Outcome::Redraw);
    assert!(matches!(s.result(), ResultView::Image(_)));
    let requests = backend.requests();
    let [Call::Single { mask_type, .. }] = requests.as_slice() else {
        panic!("expected one single call, got {requests:?}");
    };
    assert_eq!(mask_type, "");
}

#[test]
fn selecting_mask_shows_its_thumbnail() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::SelectMask("custom1".into()));
    assert_eq!(s.selection().thumbnail(), Some("/static/mask_custom1.png"));
}

#[test]
fn single_mode_with_missing_files_sends_nothing() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let high = write(dir.path(), "high.jpg", b"h");
    let mut s = session(&backend, dir.path());

    let outcome = s.dispatch(Event::Process);
    assert!(matches!(outcome, Outcome::Alert(_)));
    assert!(matches!(s.result(), ResultView::Empty));

    s.dispatch(Event::SetHighImage(Some(high)));
    let outcome = s.dispatch(Event::Process);
    assert!(matches!(outcome, Outcome::Alert(_)));
    assert!(matches!(s.result(), ResultView::Empty));

    assert!(backend.requests().is_empty());
}

#[test]
fn single_mode_submits_pair_and_saves_named_result() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let high = write(dir.path(), "in/high.jpg", b"hi");
    let low = write(dir.path(), "in/low.jpg", b"lo");
    let mut s = session(&backend, dir.path());

    s.dispatch(Event::SelectMask("square".into()));
    s.dispatch(Event::SetHighImage(Some(high)));
    s.dispatch(Event::SetLowImage(Some(low)));
    assert_eq!(s.dispatch(Event::Process), Outcome::Redraw);

    assert_eq!(
        backend.requests(),
        [Call::Single {
            high: Upload::new("high.jpg", b"hi".to_vec()),
            low: Upload::new("low.jpg", b"lo".to_vec()),
            mask_type: "square".into(),
        }]
    );

    let ResultView::Image(link) = s.result() else {
        panic!("expected image result");
    };
    assert_eq!(link.filename(), "high.jpg");

    let saved = s.dispatch(Event::SaveResult);
    assert_eq!(saved, Outcome::Saved(dir.path().join("high.jpg")));
    assert_eq!(std::fs::read(dir.path().join("high.jpg")).unwrap(), b"processed");
}

#[test]
fn single_mode_defaults_filename_without_disposition() {
    let backend = FakeBackend {
        disposition: None,
        ..FakeBackend::new()
    };
    let dir = tempfile::tempdir().unwrap();
    let high = write(dir.path(), "a.png", b"a");
    let low = write(dir.path(), "b.png", b"b");
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::SetHighImage(Some(high)));
    s.dispatch(Event::SetLowImage(Some(low)));
    s.dispatch(Event::Process);

    let ResultView::Image(link) = s.result() else {
        panic!("expected image result");
    };
    assert_eq!(link.filename(), "result.jpg");
}

#[test]
fn saved_result_is_released_after_revoke_delay() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let high = write(dir.path(), "a.png", b"a");
    let low = write(dir.path(), "b.png", b"b");
    let opts = ClientOptions {
        revoke_delay: Duration::from_millis(50),
        ..ClientOptions::default()
    };
    let mut s = Session::start(backend.clone(), opts, dir.path().join("out"));
    s.dispatch(Event::SetHighImage(Some(high)));
    s.dispatch(Event::SetLowImage(Some(low)));
    s.dispatch(Event::Process);
    assert!(matches!(s.dispatch(Event::SaveResult), Outcome::Saved(_)));

    std::thread::sleep(Duration::from_millis(200));
    // any later event releases the payload, not only another save
    s.dispatch(Event::SwitchMode(Mode::Single));
    let ResultView::Image(link) = s.result() else {
        panic!("expected image result");
    };
    assert!(link.bytes().is_none());
    assert!(matches!(s.dispatch(Event::SaveResult), Outcome::Alert(_)));
}

#[test]
fn disposition_filename_cannot_escape_download_dir() {
    let backend = FakeBackend {
        disposition: Some("attachment; filename=\"../escaped.jpg\"".to_string()),
        ..FakeBackend::new()
    };
    let dir = tempfile::tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    let high = write(dir.path(), "a.png", b"a");
    let low = write(dir.path(), "b.png", b"b");
    let mut s = session(&backend, &downloads);
    s.dispatch(Event::SetHighImage(Some(high)));
    s.dispatch(Event::SetLowImage(Some(low)));
    s.dispatch(Event::Process);

    assert_eq!(
        s.dispatch(Event::SaveResult),
        Outcome::Saved(downloads.join("escaped.jpg"))
    );
    assert!(!dir.path().join("escaped.jpg").exists());
}

#[test]
fn backend_failure_shows_failed_state() {
    let backend = FakeBackend::failing();
    let dir = tempfile::tempdir().unwrap();
    let high = write(dir.path(), "a.png", b"a");
    let low = write(dir.path(), "b.png", b"b");
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::SetHighImage(Some(high)));
    s.dispatch(Event::SetLowImage(Some(low)));
    assert_eq!(s.dispatch(Event::Process), Outcome::Redraw);
    assert!(matches!(s.result(), ResultView::Failed));
    assert_eq!(s.dispatch(Event::SaveResult), Outcome::None);
}

#[test]
fn batch_mode_requires_both_folders() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let high = write(dir.path(), "h/1.jpg", b"1");
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::SwitchMode(Mode::Batch));
    s.dispatch(Event::SetHighFolder(vec![high]));

    assert!(matches!(s.dispatch(Event::Process), Outcome::Alert(_)));
    assert!(backend.requests().is_empty());
}

#[test]
fn batch_mode_zips_flattened_folders() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let high = vec![
        write(dir.path(), "h/1.jpg", b"1"),
        write(dir.path(), "h/sub/2.jpg", b"2"),
    ];
    let low = vec![write(dir.path(), "l/1.jpg", b"x")];
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::SwitchMode(Mode::Batch));
    s.dispatch(Event::SetHighFolder(high));
    s.dispatch(Event::SetLowFolder(low));
    s.dispatch(Event::Process);

    let requests = backend.requests();
    let [Call::Batch {
        high_zip,
        low_zip,
        mask_type,
    }] = requests.as_slice()
    else {
        panic!("expected one batch call, got {requests:?}");
    };
    assert_eq!(high_zip.filename, "high.zip");
    assert_eq!(low_zip.filename, "low.zip");
    assert_eq!(mask_type, "vertical");
    assert_eq!(zip_names(&high_zip.bytes), ["1.jpg", "2.jpg"]);
    assert_eq!(zip_names(&low_zip.bytes), ["1.jpg"]);

    let mut archive = zip::ZipArchive::new(Cursor::new(&low_zip.bytes)).unwrap();
    let mut body = String::new();
    archive.by_name("1.jpg").unwrap().read_to_string(&mut body).unwrap();
    assert_eq!(body, "x");

    let ResultView::Archive(link) = s.result() else {
        panic!("expected archive result");
    };
    assert_eq!(link.filename(), "result.zip");
}

#[test]
fn batch_failure_is_reported() {
    let backend = FakeBackend::failing();
    let dir = tempfile::tempdir().unwrap();
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::SwitchMode(Mode::Batch));
    s.dispatch(Event::SetHighFolder(vec![write(dir.path(), "h/1.jpg", b"1")]));
    s.dispatch(Event::SetLowFolder(vec![write(dir.path(), "l/1.jpg", b"1")]));
    s.dispatch(Event::Process);
    assert!(matches!(s.result(), ResultView::Failed));
}

#[test]
fn editor_events_are_ignored_while_closed() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let mut s = session(&backend, dir.path());
    assert_eq!(s.dispatch(Event::Undo), Outcome::None);
    assert_eq!(s.dispatch(Event::UploadMask), Outcome::None);
}

#[test]
fn upload_tab_replaces_template_and_reloads() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "mine.png", b"mask");
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::SelectMask("square".into()));
    s.dispatch(Event::OpenEditor);
    assert_eq!(s.editor().unwrap().tab(), EditorTab::Upload);

    assert!(matches!(s.dispatch(Event::UploadMask), Outcome::Alert(_)));
    assert!(backend.requests().is_empty());

    s.dispatch(Event::SelectUploadType("custom1".into()));
    s.dispatch(Event::ChooseUploadFile(Some(file)));
    assert_eq!(s.dispatch(Event::UploadMask), Outcome::Reloaded);

    assert_eq!(
        backend.requests(),
        [Call::Update {
            mask_type: "custom1".into(),
            file: Upload::new("mine.png", b"mask".to_vec()),
        }]
    );
    assert!(s.editor().is_none());
    // reload starts over from the first template
    assert_eq!(s.selection().selected(), Some("vertical"));
    assert_eq!(
        backend.calls().iter().filter(|c| **c == Call::Masks).count(),
        3
    );
}

#[test]
fn upload_failure_alerts_and_keeps_editor() {
    let backend = FakeBackend::failing();
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "mine.png", b"mask");
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::OpenEditor);
    s.dispatch(Event::ChooseUploadFile(Some(file)));
    assert_eq!(
        s.dispatch(Event::UploadMask),
        Outcome::Alert("upload failed".into())
    );
    assert!(s.editor().is_some());
}

#[test]
fn paint_tab_draws_undoes_and_uploads_mask() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("ref.png");
    DynamicImage::new_rgb8(100, 100).save(&reference).unwrap();

    let mut s = session(&backend, dir.path());
    s.dispatch(Event::OpenEditor);
    s.dispatch(Event::SwitchTab(EditorTab::Create));
    s.dispatch(Event::SelectTargetType("custom1".into()));
    s.dispatch(Event::LoadPaintImage(reference));
    s.dispatch(Event::SetDisplay(DisplayRect::identity(
        watermark_mask_client::CanvasSize::new(100, 100),
    )));

    let drag = |s: &mut Session<FakeBackend>, a: (f64, f64), b: (f64, f64)| {
        s.dispatch(Event::PointerDown { x: a.0, y: a.1 });
        s.dispatch(Event::PointerMove { x: b.0, y: b.1 });
        s.dispatch(Event::PointerUp);
    };
    drag(&mut s, (10.0, 10.0), (30.0, 30.0));
    drag(&mut s, (50.0, 50.0), (53.0, 90.0));
    drag(&mut s, (60.0, 60.0), (90.0, 90.0));
    assert_eq!(
        s.editor().unwrap().painter().rects(),
        &[Rect::new(10, 10, 20, 20), Rect::new(60, 60, 30, 30)]
    );
    s.dispatch(Event::Undo);

    assert!(matches!(s.dispatch(Event::DownloadMask), Outcome::Alert(_)));
    assert_eq!(s.dispatch(Event::FinishPreview), Outcome::Redraw);
    let saved = s.dispatch(Event::DownloadMask);
    assert_eq!(saved, Outcome::Saved(dir.path().join("mask_custom1.png")));

    let mask: GrayImage = image::open(dir.path().join("mask_custom1.png"))
        .unwrap()
        .to_luma8();
    let white = mask.pixels().filter(|p| p[0] == 255).count();
    assert_eq!(white, 400);
    assert_eq!(mask.get_pixel(10, 10)[0], 255);
    assert_eq!(mask.get_pixel(30, 30)[0], 0);

    assert_eq!(s.dispatch(Event::UploadPaintedMask), Outcome::Reloaded);
    let requests = backend.requests();
    let [Call::Update { mask_type, file }] = requests.as_slice() else {
        panic!("expected one update call, got {requests:?}");
    };
    assert_eq!(mask_type, "custom1");
    assert_eq!(file.filename, "mask.png");
}

#[test]
fn large_paint_image_maps_display_pointer_to_pixels() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("wide.png");
    // twice the default display bounds, so the view is shown at half scale
    DynamicImage::new_rgb8(2560, 1440).save(&reference).unwrap();

    let mut s = session(&backend, dir.path());
    s.dispatch(Event::OpenEditor);
    s.dispatch(Event::SwitchTab(EditorTab::Create));
    s.dispatch(Event::LoadPaintImage(reference));

    s.dispatch(Event::PointerDown { x: 10.0, y: 10.0 });
    s.dispatch(Event::PointerMove { x: 60.0, y: 40.0 });
    s.dispatch(Event::PointerUp);
    assert_eq!(
        s.editor().unwrap().painter().rects(),
        &[Rect::new(20, 20, 100, 60)]
    );
}

#[test]
fn finish_without_image_does_nothing() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let mut s = session(&backend, dir.path());
    s.dispatch(Event::OpenEditor);
    assert_eq!(s.dispatch(Event::FinishPreview), Outcome::None);
    assert_eq!(s.dispatch(Event::FinishDownload), Outcome::None);
}

#[test]
fn close_editor_discards_painter() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("ref.png");
    DynamicImage::new_rgb8(20, 20).save(&reference).unwrap();

    let mut s = session(&backend, dir.path());
    s.dispatch(Event::OpenEditor);
    s.dispatch(Event::LoadPaintImage(reference));
    s.dispatch(Event::CloseEditor);
    assert!(s.editor().is_none());

    s.dispatch(Event::OpenEditor);
    assert!(s.editor().unwrap().painter().canvas_size().is_none());
}
