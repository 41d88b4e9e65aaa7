//! Black/white mask rasterization and PNG data URL handling.
//!
//! A mask is black everywhere except pixels covered by at least one rectangle,
//! which are white. The raster is derived from the rectangle list alone, so
//! rasterizing the same list twice yields identical pixels.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{GrayImage, ImageFormat, Luma};

use crate::error::{Error, Result};
use crate::geometry::{CanvasSize, Rect};

const BLACK: Luma<u8> = Luma([0]);
const WHITE: Luma<u8> = Luma([255]);

/// A rasterized mask with the same dimensions as its source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskRaster {
    image: GrayImage,
}

impl MaskRaster {
    /// Rasterize `rects` onto a black canvas of the given size.
    #[must_use]
    pub fn rasterize(canvas: CanvasSize, rects: &[Rect]) -> Self {
        let mut image = GrayImage::from_pixel(canvas.width, canvas.height, BLACK);
        for (x0, y0, x1, y1) in rects.iter().filter_map(|r| r.clip(canvas)) {
            for y in y0..y1 {
                for x in x0..x1 {
                    image.put_pixel(x, y, WHITE);
                }
            }
        }
        Self { image }
    }

    /// Canvas dimensions.
    #[must_use]
    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.image.width(), self.image.height())
    }

    /// Whether the pixel at `(x, y)` is white.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the raster.
    #[must_use]
    pub fn is_white(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] == WHITE[0]
    }

    /// Number of white pixels.
    #[must_use]
    pub fn white_count(&self) -> usize {
        self.image.pixels().filter(|p| p[0] == WHITE[0]).count()
    }

    /// Borrow the grayscale image.
    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Encode as PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if PNG encoding fails.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    /// Encode as a `data:image/png;base64,...` URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if PNG encoding fails.
    pub fn to_data_url(&self) -> Result<String> {
        Ok(encode_data_url("image/png", &self.to_png()?))
    }
}

/// Download name for a mask targeting template `kind`.
#[must_use]
pub fn mask_filename(kind: &str) -> String {
    format!("mask_{kind}.png")
}

/// Build a base64 data URL.
#[must_use]
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Split a base64 data URL into its MIME type and decoded payload.
///
/// # Errors
///
/// Returns [`Error::DataUrl`] if the URL has no `data:` scheme, is not base64,
/// or the payload fails to decode.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::DataUrl("missing data: scheme".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::DataUrl("missing ',' separator".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::DataUrl("payload is not base64".to_string()))?;
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::DataUrl(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}
