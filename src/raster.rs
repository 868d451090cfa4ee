//! Raster image codec: decode, fit-to-terminal, crop, and Kitty Graphics
//! Protocol chunking.
//!
//! All sizes here are in pixels; conversion to terminal cells goes through
//! [`cell_size`] using the pixels-per-cell ratios from `TerminalContext`.
//! Crops always re-encode, because the protocol transmits a complete PNG and
//! the cell-space size keys (`r=`, `c=`) must match the cropped dimensions.

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat, imageops::FilterType};

use crate::term::TerminalContext;

/// Kitty transmits payloads in chunks of at most 4096 bytes.
pub const KITTY_CHUNK: usize = 4096;

/// A decoded raster plus the base64 PNG encoding that will go over the wire.
#[derive(Clone)]
pub struct Raster {
    image: DynamicImage,
    b64: String,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .field("b64_len", &self.b64.len())
            .finish()
    }
}

impl Raster {
    /// Decode a base64 image payload as it appears in notebook JSON
    /// (possibly split across lines, possibly with a trailing newline).
    pub fn decode(b64_data: &str) -> Result<Self> {
        let b64: String = b64_data.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(b64.as_bytes())
            .context("invalid base64 image payload")?;
        let image = image::load_from_memory(&bytes).context("undecodable image payload")?;
        Ok(Self { image, b64 })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Base64 PNG payload for protocol transmission.
    pub fn b64(&self) -> &str {
        &self.b64
    }

    /// Encode the current pixels as a fresh base64 PNG.
    pub fn to_png_b64(&self) -> Result<String> {
        Ok(Self::reencode(self.image.clone())?.b64)
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        Self::reencode(self.image.resize_exact(width, height, FilterType::Triangle))
    }

    /// Crop to the pixel rectangle, clamped to the raster's extent.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        let x = x.min(self.width().saturating_sub(1));
        let y = y.min(self.height().saturating_sub(1));
        let width = width.min(self.width() - x).max(1);
        let height = height.min(self.height() - y).max(1);
        Self::reencode(self.image.crop_imm(x, y, width, height))
    }

    /// Drop everything above the given pixel row.
    pub fn crop_from_row(&self, y: u32) -> Result<Self> {
        self.crop(0, y, self.width(), self.height().saturating_sub(y))
    }

    /// Keep only the topmost `height` pixel rows.
    pub fn crop_to_row(&self, height: u32) -> Result<Self> {
        self.crop(0, 0, self.width(), height)
    }

    fn reencode(image: DynamicImage) -> Result<Self> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .context("PNG re-encoding failed")?;
        Ok(Self { b64: BASE64.encode(&buf), image })
    }
}

/// Convert pixel dimensions to cell-space `(rows, cols)` by ceiling division.
pub fn cell_size(width_px: u32, height_px: u32, ctx: &TerminalContext) -> (u32, u32) {
    let rows = (f64::from(height_px) / ctx.pix_per_row()).ceil() as u32;
    let cols = (f64::from(width_px) / ctx.pix_per_col()).ceil() as u32;
    (rows.max(1), cols.max(1))
}

/// Downscale a raster that exceeds 1.5x the terminal's pixel area.
///
/// Width and height are clamped independently against their own limits, so
/// an oversized image can come out with a different aspect ratio. This
/// matches the upstream sizing behavior and is kept for compatibility.
pub fn fit_to_terminal(raster: Raster, ctx: &TerminalContext) -> Result<Raster> {
    let max_w = ((f64::from(ctx.cols) / 1.5) * ctx.pix_per_col()).floor() as u32;
    let max_h = ((f64::from(ctx.rows) / 1.5) * ctx.pix_per_row()).floor() as u32;
    if raster.width() >= max_w || raster.height() >= max_h {
        let w = raster.width().min(max_w).max(1);
        let h = raster.height().min(max_h).max(1);
        return raster.resize(w, h);
    }
    Ok(raster)
}

/// Build the Kitty Graphics Protocol escape sequences for one image.
///
/// The first chunk carries the full header (`a=T,f=100,r=,c=`); continuation
/// chunks carry only the more-data flag. `m=1` on every chunk but the last.
pub fn kitty_chunks(b64: &str, rows: u32, cols: u32) -> Vec<String> {
    let bytes = b64.as_bytes();
    if bytes.is_empty() {
        return vec![format!("\x1b_Ga=T,f=100,r={rows},c={cols},m=0;\x1b\\")];
    }
    let total = bytes.chunks(KITTY_CHUNK).count();
    let mut out = Vec::with_capacity(total);
    for (i, chunk) in bytes.chunks(KITTY_CHUNK).enumerate() {
        let m = if i + 1 == total { 0 } else { 1 };
        let data = std::str::from_utf8(chunk).unwrap_or_default();
        if i == 0 {
            out.push(format!("\x1b_Ga=T,f=100,r={rows},c={cols},m={m};{data}\x1b\\"));
        } else {
            out.push(format!("\x1b_Gm={m};{data}\x1b\\"));
        }
    }
    out
}
