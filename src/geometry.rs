//! Pixel-space geometry shared by the painter and the rasterizer.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Regions this small (or smaller) on either axis are treated as accidental clicks.
pub const MIN_RECT_EXTENT: u32 = 5;

/// A point in canvas pixel space. May lie outside the canvas while dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    /// Horizontal pixel coordinate.
    pub x: i32,
    /// Vertical pixel coordinate.
    pub y: i32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of the canvas, equal to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CanvasSize {
    /// Create a canvas size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// On-screen placement of the canvas, in the same units as pointer events.
///
/// The displayed size is independent of the canvas size; pointer positions are
/// scaled back by `canvas / displayed` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    /// Left edge of the displayed canvas.
    pub left: f64,
    /// Top edge of the displayed canvas.
    pub top: f64,
    /// Displayed width.
    pub width: f64,
    /// Displayed height.
    pub height: f64,
}

impl DisplayRect {
    /// Canvas shown 1:1 at the origin.
    #[must_use]
    pub fn identity(canvas: CanvasSize) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: f64::from(canvas.width),
            height: f64::from(canvas.height),
        }
    }

    /// Canvas scaled to fit inside `max_width x max_height`, aspect preserved, never enlarged.
    #[must_use]
    pub fn fit(canvas: CanvasSize, max_width: f64, max_height: f64) -> Self {
        let w = f64::from(canvas.width);
        let h = f64::from(canvas.height);
        let scale = (max_width / w).min(max_height / h).min(1.0);
        Self {
            left: 0.0,
            top: 0.0,
            width: w * scale,
            height: h * scale,
        }
    }

    /// Map a pointer position to canvas pixel space, rounding to the nearest pixel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_canvas(&self, canvas: CanvasSize, client_x: f64, client_y: f64) -> Point {
        let sx = if self.width > 0.0 {
            f64::from(canvas.width) / self.width
        } else {
            1.0
        };
        let sy = if self.height > 0.0 {
            f64::from(canvas.height) / self.height
        } else {
            1.0
        };
        Point::new(
            ((client_x - self.left) * sx).round() as i32,
            ((client_y - self.top) * sy).round() as i32,
        )
    }
}

/// An axis-aligned rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Normalize two drag corners into a rectangle clamped to the canvas.
    #[must_use]
    pub fn from_corners(a: Point, b: Point, canvas: CanvasSize) -> Self {
        let (x1, x2) = clamp_span(a.x, b.x, canvas.width);
        let (y1, y2) = clamp_span(a.y, b.y, canvas.height);
        Self {
            x: x1,
            y: y1,
            w: x2.saturating_sub(x1),
            h: y2.saturating_sub(y1),
        }
    }

    /// Whether the rectangle is large enough to commit.
    #[must_use]
    pub fn exceeds_threshold(&self) -> bool {
        self.w > MIN_RECT_EXTENT && self.h > MIN_RECT_EXTENT
    }

    /// Whether the pixel at `(px, py)` lies inside this rectangle.
    #[must_use]
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && u64::from(px) < u64::from(self.x) + u64::from(self.w)
            && u64::from(py) < u64::from(self.y) + u64::from(self.h)
    }

    /// Intersection with the canvas as `(x0, y0, x1, y1)`, end exclusive.
    #[must_use]
    pub fn clip(&self, canvas: CanvasSize) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x.saturating_add(self.w).min(canvas.width);
        let y1 = self.y.saturating_add(self.h).min(canvas.height);
        (self.x < x1 && self.y < y1).then_some((self.x, self.y, x1, y1))
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn clamp_span(a: i32, b: i32, limit: u32) -> (u32, u32) {
    let lo = a.min(b).max(0) as u32;
    let hi = i64::from(a.max(b)).min(i64::from(limit)).max(0) as u32;
    (lo, hi)
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.w, self.h)
    }
}

impl FromStr for Rect {
    type Err = Error;

    /// Parse `x,y,w,h`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| Error::InvalidRect(s.to_string()))?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(Error::InvalidRect(s.to_string())),
        }
    }
}
