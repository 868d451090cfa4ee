//! Terminal geometry, threaded explicitly into every component that needs it.
//!
//! Image sizing depends on the pixels-per-cell ratios reported by the
//! terminal. Keeping the probed values in a plain struct (instead of an
//! ambient lookup) lets tests run against synthetic terminal sizes.

use anyhow::{Context, Result};
use crossterm::terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalContext {
    pub rows: u16,
    pub cols: u16,
    /// Full terminal width in pixels; 0 when the terminal does not report it.
    pub pixel_width: u16,
    /// Full terminal height in pixels; 0 when the terminal does not report it.
    pub pixel_height: u16,
}

impl TerminalContext {
    /// Probe the controlling terminal for cell and pixel dimensions.
    pub fn probe() -> Result<Self> {
        let ws = terminal::window_size().context("failed to get terminal size")?;
        Ok(Self {
            rows: ws.rows,
            cols: ws.columns,
            pixel_width: ws.width,
            pixel_height: ws.height,
        })
    }

    /// Fixed geometry for tests.
    pub fn synthetic(rows: u16, cols: u16, pixel_width: u16, pixel_height: u16) -> Self {
        Self { rows, cols, pixel_width, pixel_height }
    }

    /// Kitty graphics need non-zero pixel geometry; without it image outputs
    /// degrade to blank placeholders.
    pub fn images_enabled(&self) -> bool {
        self.pixel_width != 0 && self.pixel_height != 0
    }

    pub fn pix_per_row(&self) -> f64 {
        if self.rows == 0 {
            return 1.0;
        }
        f64::from(self.pixel_height) / f64::from(self.rows)
    }

    pub fn pix_per_col(&self) -> f64 {
        if self.cols == 0 {
            return 1.0;
        }
        f64::from(self.pixel_width) / f64::from(self.cols)
    }

    pub fn view_rows(&self) -> u32 {
        u32::from(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_ratios() {
        let ctx = TerminalContext::synthetic(50, 100, 800, 1000);
        assert_eq!(ctx.pix_per_row(), 20.0);
        assert_eq!(ctx.pix_per_col(), 8.0);
        assert!(ctx.images_enabled());
    }

    #[test]
    fn zero_pixel_geometry_disables_images() {
        let ctx = TerminalContext::synthetic(50, 100, 0, 0);
        assert!(!ctx.images_enabled());
        // Ratios stay usable so truncation math never divides by zero.
        assert_eq!(ctx.pix_per_row(), 0.0);
    }

    #[test]
    fn zero_rows_does_not_divide_by_zero() {
        let ctx = TerminalContext::synthetic(0, 0, 100, 100);
        assert_eq!(ctx.pix_per_row(), 1.0);
        assert_eq!(ctx.pix_per_col(), 1.0);
    }
}
