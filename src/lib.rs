//! Client for a paired-image watermark removal service, with a rectangle mask painter.
//!
//! The service removes watermarks by combining a high-quality and a low-quality
//! copy of the same image under a black/white mask template. This crate covers
//! the client side: loading the template catalog, submitting single pairs or
//! zipped folder batches, and painting new masks from rectangles.
//!
//! # Quick Start
//!
//! ```no_run
//! use watermark_mask_client::{ClientOptions, Event, HttpBackend, Outcome, Session};
//!
//! let opts = ClientOptions::default();
//! let backend = HttpBackend::new(&opts).expect("bad server url");
//! let mut session = Session::start(backend, opts, ".".into());
//! session.dispatch(Event::SetHighImage(Some("high.jpg".into())));
//! session.dispatch(Event::SetLowImage(Some("low.jpg".into())));
//! session.dispatch(Event::Process);
//! if let Outcome::Saved(path) = session.dispatch(Event::SaveResult) {
//!     println!("saved {}", path.display());
//! }
//! ```
//!
//! # Painting a mask
//!
//! ```no_run
//! use watermark_mask_client::{MaskPainter, Rect};
//!
//! let mut painter = MaskPainter::new();
//! painter.load_image(&image::open("reference.jpg").unwrap());
//! painter.drag_rect(Rect::new(10, 10, 200, 40));
//! let png = painter.rasterize().unwrap().to_png().unwrap();
//! std::fs::write("mask_custom1.png", png).unwrap();
//! ```

#![deny(missing_docs)]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod painter;
pub mod raster;
pub mod session;
pub mod submit;

pub use backend::{Backend, HttpBackend, SingleResponse, Upload};
pub use catalog::{MaskCatalog, MaskSelection, MaskTemplate};
pub use config::ClientOptions;
pub use editor::{EditorTab, MaskEditor};
pub use error::{Error, Result};
pub use geometry::{CanvasSize, DisplayRect, Point, Rect};
pub use painter::{MaskPainter, PainterState};
pub use raster::{mask_filename, MaskRaster};
pub use session::{Event, Inputs, Mode, Outcome, ResultView, Session};
pub use submit::DownloadLink;
