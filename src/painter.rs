//! Interactive rectangle mask painter.
//!
//! The painter owns one editing session: a source image, the ordered list of
//! committed rectangles, the rectangle currently being dragged, and the last
//! finished mask. Pointer positions arrive in display space and are mapped to
//! image pixels through the current [`DisplayRect`], so committed geometry is
//! always in true pixel coordinates no matter how the canvas is scaled on screen.
//!
//! States: `Empty -> ImageLoaded -> Drawing <-> ImageLoaded -> Finished`.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::geometry::{CanvasSize, DisplayRect, Point, Rect};
use crate::raster::MaskRaster;

/// Fill color of committed regions in the editor view.
pub const HIGHLIGHT: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// Opacity of the committed-region fill.
pub const HIGHLIGHT_ALPHA: f32 = 0.35;
/// Outline color of the rectangle being dragged.
pub const CANDIDATE: Rgba<u8> = Rgba([255, 255, 0, 255]);
/// Outline width in pixels.
pub const OUTLINE_WIDTH: i64 = 2;

/// Where the painter is in its editing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PainterState {
    /// No image loaded.
    Empty,
    /// Image loaded, not dragging, no finished mask.
    ImageLoaded,
    /// A rectangle drag is in progress.
    Drawing,
    /// A finished mask is pending download or upload.
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: Point,
    end: Point,
}

/// Rectangle mask painter session.
#[derive(Debug, Default)]
pub struct MaskPainter {
    image: Option<RgbaImage>,
    display: Option<DisplayRect>,
    rects: Vec<Rect>,
    drag: Option<Drag>,
    pending: Option<String>,
}

impl MaskPainter {
    /// Create an empty painter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a source image, discarding all rectangles and any finished mask.
    ///
    /// The canvas takes the image's exact pixel size and is displayed 1:1 until
    /// [`set_display`](Self::set_display) says otherwise.
    pub fn load_image(&mut self, image: &DynamicImage) {
        let rgba = image.to_rgba8();
        log::debug!("painter loaded {}x{} image", rgba.width(), rgba.height());
        self.image = Some(rgba);
        self.display = None;
        self.rects.clear();
        self.drag = None;
        self.pending = None;
    }

    /// Decode and load an encoded image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if the bytes are not a decodable image. The
    /// current session is left untouched in that case.
    pub fn load_image_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let img = image::load_from_memory(bytes)?;
        self.load_image(&img);
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PainterState {
        if self.image.is_none() {
            PainterState::Empty
        } else if self.drag.is_some() {
            PainterState::Drawing
        } else if self.pending.is_some() {
            PainterState::Finished
        } else {
            PainterState::ImageLoaded
        }
    }

    /// Canvas size, equal to the loaded image.
    #[must_use]
    pub fn canvas_size(&self) -> Option<CanvasSize> {
        self.image
            .as_ref()
            .map(|img| CanvasSize::new(img.width(), img.height()))
    }

    /// Set where the canvas is shown on screen.
    pub fn set_display(&mut self, display: DisplayRect) {
        self.display = Some(display);
    }

    fn map(&self, client_x: f64, client_y: f64) -> Option<Point> {
        let canvas = self.canvas_size()?;
        let display = self.display.unwrap_or_else(|| DisplayRect::identity(canvas));
        Some(display.to_canvas(canvas, client_x, client_y))
    }

    /// Start a candidate rectangle. Ignored without an image.
    ///
    /// Returns whether a drag started.
    pub fn pointer_down(&mut self, client_x: f64, client_y: f64) -> bool {
        let Some(p) = self.map(client_x, client_y) else {
            return false;
        };
        self.drag = Some(Drag { start: p, end: p });
        true
    }

    /// Move the candidate's end corner. Returns whether a redraw is needed.
    pub fn pointer_move(&mut self, client_x: f64, client_y: f64) -> bool {
        if self.drag.is_none() {
            return false;
        }
        let Some(p) = self.map(client_x, client_y) else {
            return false;
        };
        if let Some(drag) = self.drag.as_mut() {
            drag.end = p;
        }
        true
    }

    /// Finish the drag, committing the rectangle if it exceeds the size threshold.
    ///
    /// The release position is not applied; the end corner is the last
    /// [`pointer_move`](Self::pointer_move). Returns the committed rectangle.
    pub fn pointer_up(&mut self) -> Option<Rect> {
        let drag = self.drag.take()?;
        let canvas = self.canvas_size()?;
        let rect = Rect::from_corners(drag.start, drag.end, canvas);
        if rect.exceeds_threshold() {
            log::debug!("committed rect {rect}");
            self.rects.push(rect);
            Some(rect)
        } else {
            log::debug!("discarded {}x{} region below threshold", rect.w, rect.h);
            None
        }
    }

    /// Commit a rectangle directly, as if it had been dragged in pixel space.
    pub fn drag_rect(&mut self, rect: Rect) -> Option<Rect> {
        self.image.as_ref()?;
        let start = Point::new(to_i32(rect.x), to_i32(rect.y));
        let end = Point::new(
            to_i32(rect.x.saturating_add(rect.w)),
            to_i32(rect.y.saturating_add(rect.h)),
        );
        self.drag = Some(Drag { start, end });
        self.pointer_up()
    }

    /// Remove the most recently committed rectangle.
    pub fn undo(&mut self) -> Option<Rect> {
        self.rects.pop()
    }

    /// Remove all committed rectangles.
    pub fn reset(&mut self) {
        self.rects.clear();
    }

    /// Committed rectangles in commit order.
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Rasterize the committed rectangles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImageLoaded`] when there is no image.
    pub fn rasterize(&self) -> Result<MaskRaster> {
        let canvas = self.canvas_size().ok_or(Error::NoImageLoaded)?;
        Ok(MaskRaster::rasterize(canvas, &self.rects))
    }

    /// Rasterize, keep the PNG data URL as the pending mask, and return it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImageLoaded`] when there is no image, or an image
    /// error if PNG encoding fails.
    pub fn finish(&mut self) -> Result<&str> {
        let url = self.rasterize()?.to_data_url()?;
        log::info!("mask finished with {} regions", self.rects.len());
        Ok(self.pending.insert(url).as_str())
    }

    /// The finished mask awaiting download or upload.
    #[must_use]
    pub fn pending_mask(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Render the editor view: image, translucent fills, outlines, then the
    /// candidate outline while dragging.
    #[must_use]
    pub fn render(&self) -> Option<RgbaImage> {
        let mut out = self.image.clone()?;
        for r in &self.rects {
            fill_blend(&mut out, r, HIGHLIGHT, HIGHLIGHT_ALPHA);
        }
        for r in &self.rects {
            stroke(
                &mut out,
                i64::from(r.x),
                i64::from(r.y),
                i64::from(r.x) + i64::from(r.w),
                i64::from(r.y) + i64::from(r.h),
                HIGHLIGHT,
            );
        }
        if let Some(d) = self.drag {
            let (x0, x1) = min_max(d.start.x, d.end.x);
            let (y0, y1) = min_max(d.start.y, d.end.y);
            stroke(&mut out, x0, y0, x1, y1, CANDIDATE);
        }
        Some(out)
    }
}

fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn min_max(a: i32, b: i32) -> (i64, i64) {
    (i64::from(a.min(b)), i64::from(a.max(b)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fill_blend(img: &mut RgbaImage, r: &Rect, color: Rgba<u8>, alpha: f32) {
    let canvas = CanvasSize::new(img.width(), img.height());
    let Some((x0, y0, x1, y1)) = r.clip(canvas) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            let px = img.get_pixel_mut(x, y);
            for c in 0..3 {
                let src = f32::from(px[c]);
                let dst = f32::from(color[c]);
                px[c] = (src * (1.0 - alpha) + dst * alpha).round() as u8;
            }
        }
    }
}

/// Outline centered on the rectangle edges, clipped to the image.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn stroke(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    let half = OUTLINE_WIDTH / 2;
    let (ox0, oy0, ox1, oy1) = (x0 - half, y0 - half, x1 + half, y1 + half);
    let (ix0, iy0, ix1, iy1) = (x0 + half, y0 + half, x1 - half, y1 - half);
    let w = i64::from(img.width());
    let h = i64::from(img.height());
    for y in oy0.max(0)..oy1.min(h) {
        for x in ox0.max(0)..ox1.min(w) {
            let interior = x >= ix0 && x < ix1 && y >= iy0 && y < iy1;
            if !interior {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
