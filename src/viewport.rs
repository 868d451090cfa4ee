//! Viewport engine: compose the visible slice of the layout into terminal
//! rows plus deferred image draws.
//!
//! The engine only reads the layout index. Text overflow below the viewport
//! is cropped here (the frame is truncated to the exact row count), but
//! image draws bypass the text grid entirely — Kitty placements are not
//! clipped by the terminal — so the engine must crop image pixels to the
//! viewport itself before emitting a draw command.

use std::collections::HashMap;

use crossterm::style::Stylize;
use log::debug;

use crate::block::{Block, ImageBlock};
use crate::layout::LayoutIndex;
use crate::render::TextRenderer;
use crate::term::TerminalContext;

/// Cached full-height renders keyed by layout offset.
#[derive(Debug, Default)]
pub struct RenderCache {
    map: HashMap<u32, Vec<String>>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, offset: u32) -> Option<&Vec<String>> {
        self.map.get(&offset)
    }

    pub fn entry_cloned(&self, offset: u32) -> Option<Vec<String>> {
        self.map.get(&offset).cloned()
    }

    pub fn insert(&mut self, offset: u32, lines: Vec<String>) {
        self.map.insert(offset, lines);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.map.contains_key(&offset)
    }
}

/// A deferred Kitty draw: where to anchor the cursor and what to transmit.
#[derive(Debug, Clone)]
pub struct ImageDraw {
    pub b64: String,
    /// 0-based screen row/column for the cursor move preceding transmission.
    pub screen_row: u16,
    pub screen_col: u16,
    /// Cell-space size keys, recomputed after any crop.
    pub rows: u32,
    pub cols: u32,
}

pub struct Frame {
    pub rows: Vec<String>,
    pub images: Vec<ImageDraw>,
}

/// Compose the viewport `[row, row + ctx.rows)`.
///
/// The returned rows, concatenated, occupy exactly
/// `min(row + ctx.rows, document_size) - row` terminal rows.
pub fn compose(
    layout: &LayoutIndex,
    cache: &mut RenderCache,
    renderer: &TextRenderer,
    row: u32,
    ctx: &TerminalContext,
) -> Frame {
    let start = row;
    let end = row + ctx.view_rows();
    let needed = layout.document_size().min(end).saturating_sub(start) as usize;

    let mut rows_out: Vec<String> = Vec::with_capacity(needed);
    let mut images: Vec<ImageDraw> = Vec::new();

    for (offset, block) in layout.blocks_intersecting(start, end) {
        if offset < start {
            // Top edge cuts into this block.
            let cut = start - offset;
            let truncated = block.truncate_top(cut, ctx);
            let body = renderer.lines(&truncated);
            if truncated.is_padded() {
                rows_out.extend(pad_lines(body, cut, ctx.cols));
            } else {
                rows_out.extend(body);
            }
            if let Block::Image(img) = &truncated {
                let anchor = 5u32.saturating_sub(cut).max(3);
                push_clamped_draw(&mut images, img, anchor, ctx);
            }
        } else {
            let lines = if let Some(cached) = cache.get(offset) {
                cached.clone()
            } else {
                let body = renderer.lines(block);
                let full = if block.is_padded() {
                    pad_lines(body, 0, ctx.cols)
                } else {
                    body
                };
                cache.insert(offset, full.clone());
                full
            };
            rows_out.extend(lines);

            if let Block::Image(img) = block {
                if offset + block.height() <= end {
                    // Fully visible: anchor below the decorative rows.
                    images.push(draw_at(img, offset - start + 5, ctx));
                } else {
                    // Bottom edge cuts into this block; the text grid crops
                    // itself but the pixels must be cropped here.
                    let visible = end - offset;
                    if let Block::Image(cropped) = img.truncate_bottom(visible, ctx) {
                        let anchor = ctx.view_rows().saturating_sub(visible.saturating_sub(5));
                        images.push(draw_at(&cropped, anchor, ctx));
                    }
                }
            }
        }
        if rows_out.len() >= needed {
            break;
        }
    }

    debug!(
        "compose: [{start}, {end}) -> {} rows ({} needed), {} image draws, cache={}",
        rows_out.len(),
        needed,
        images.len(),
        cache.len()
    );

    // The accumulation above covers at least `needed` rows because offsets
    // are contiguous; trim the bottom overhang.
    rows_out.truncate(needed);
    rows_out.resize_with(needed, String::new);

    Frame { rows: rows_out, images }
}

/// Build a draw command at a 1-based anchor row, centered horizontally.
fn draw_at(img: &ImageBlock, anchor_row: u32, ctx: &TerminalContext) -> ImageDraw {
    let col = ((i64::from(ctx.cols) - i64::from(img.cols)) / 2).max(0) as u16;
    ImageDraw {
        b64: img.raster.b64().to_string(),
        screen_row: anchor_row.saturating_sub(1).min(u32::from(ctx.rows.saturating_sub(1))) as u16,
        screen_col: col,
        rows: img.rows,
        cols: img.cols,
    }
}

/// Emit a draw for a top-truncated image, cropping the bottom as well if the
/// remainder would spill past the viewport.
fn push_clamped_draw(
    images: &mut Vec<ImageDraw>,
    img: &ImageBlock,
    anchor_row: u32,
    ctx: &TerminalContext,
) {
    let avail_rows = ctx.view_rows().saturating_sub(anchor_row - 1);
    let avail_px = (f64::from(avail_rows) * ctx.pix_per_row()).floor() as u32;
    if avail_px == 0 {
        return;
    }
    if img.raster.height() > avail_px {
        match img.raster.crop_to_row(avail_px) {
            Ok(raster) => {
                let (rows, cols) = crate::raster::cell_size(raster.width(), raster.height(), ctx);
                let clamped = ImageBlock {
                    raster,
                    rows,
                    cols,
                    fingerprint: img.fingerprint,
                };
                images.push(draw_at(&clamped, anchor_row, ctx));
            }
            Err(e) => log::warn!("viewport image clamp failed, skipping draw: {e:#}"),
        }
    } else {
        images.push(draw_at(img, anchor_row, ctx));
    }
}

/// Decorate a block body for its position relative to the viewport top.
///
/// A block starting exactly at the top (`cut == 0`) gets its rule and both
/// margins; a block cut at row 1 has already lost the rule; anything deeper
/// keeps only the bottom margin.
fn pad_lines(body: Vec<String>, cut: u32, cols: u16) -> Vec<String> {
    let indented = body.into_iter().map(|l| format!(" {l}"));
    let mut out = Vec::new();
    match cut {
        0 => {
            out.push(rule(cols));
            out.push(String::new());
            out.extend(indented);
            out.push(String::new());
        }
        1 => {
            out.push(String::new());
            out.extend(indented);
            out.push(String::new());
        }
        _ => {
            out.extend(indented);
            out.push(String::new());
        }
    }
    out
}

fn rule(cols: u16) -> String {
    format!("{}", "─".repeat(cols as usize).white())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::{CellKind, SourceBlock};

    fn ctx(rows: u16) -> TerminalContext {
        TerminalContext::synthetic(rows, 100, 800, u16::try_from(rows as u32 * 20).unwrap())
    }

    fn code(n: usize) -> Block {
        let src = SourceBlock::Cell {
            kind: CellKind::Code,
            source: (0..n).map(|i| format!("x{i} = {i}\n")).collect(),
        };
        Block::from_source(&src, &ctx(40))
    }

    fn renderer() -> TextRenderer {
        TextRenderer::new("python")
    }

    #[test]
    fn frame_occupies_exact_viewport_rows() {
        let ctx = ctx(20);
        let blocks = vec![code(5), code(12), code(3), code(30)];
        let layout = LayoutIndex::build(blocks, ctx.view_rows());
        let mut cache = RenderCache::new();
        for row in 0..=layout.max_scroll(ctx.view_rows()) {
            let frame = compose(&layout, &mut cache, &renderer(), row, &ctx);
            let needed = layout.document_size().min(row + ctx.view_rows()) - row;
            assert_eq!(frame.rows.len() as u32, needed, "row={row}");
        }
    }

    #[test]
    fn short_document_fills_viewport_via_filler() {
        let ctx = ctx(40);
        let layout = LayoutIndex::build(vec![code(2)], ctx.view_rows());
        let mut cache = RenderCache::new();
        let frame = compose(&layout, &mut cache, &renderer(), 0, &ctx);
        assert_eq!(frame.rows.len() as u32, ctx.view_rows());
    }

    #[test]
    fn fully_visible_block_starts_with_rule() {
        let ctx = ctx(20);
        let layout = LayoutIndex::build(vec![code(5), code(30)], ctx.view_rows());
        let mut cache = RenderCache::new();
        let frame = compose(&layout, &mut cache, &renderer(), 0, &ctx);
        assert!(frame.rows[0].contains('─'));
        assert_eq!(frame.rows[1], "");
    }

    #[test]
    fn truncated_block_omits_rule() {
        let ctx = ctx(20);
        let layout = LayoutIndex::build(vec![code(30)], ctx.view_rows());
        let mut cache = RenderCache::new();
        let frame = compose(&layout, &mut cache, &renderer(), 5, &ctx);
        assert!(!frame.rows[0].contains('─'));
    }

    #[test]
    fn compose_is_idempotent_and_cache_stable() {
        let ctx = ctx(20);
        let layout = LayoutIndex::build(vec![code(5), code(30)], ctx.view_rows());
        let mut cache = RenderCache::new();
        let first = compose(&layout, &mut cache, &renderer(), 0, &ctx);
        let cached_len = cache.len();
        let entry = cache.entry_cloned(0).unwrap();
        let second = compose(&layout, &mut cache, &renderer(), 0, &ctx);
        assert_eq!(first.rows, second.rows);
        assert_eq!(cache.len(), cached_len);
        assert_eq!(cache.entry_cloned(0).unwrap(), entry);
    }

    #[test]
    fn truncated_blocks_are_not_cached_at_their_offset() {
        let ctx = ctx(20);
        let layout = LayoutIndex::build(vec![code(30)], ctx.view_rows());
        let mut cache = RenderCache::new();
        let _ = compose(&layout, &mut cache, &renderer(), 7, &ctx);
        assert!(!cache.contains(0));
    }

    fn png_b64(width: u32, height: u32) -> String {
        use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
        use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 40, 10, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        BASE64.encode(&buf)
    }

    /// An image block taller than any viewport used here, built directly so
    /// the fit pass doesn't shrink it first.
    fn tall_image(ctx: &TerminalContext) -> Block {
        let raster = crate::raster::Raster::decode(&png_b64(80, 800)).unwrap();
        let (rows, cols) = crate::raster::cell_size(raster.width(), raster.height(), ctx);
        Block::Image(ImageBlock { raster, rows, cols, fingerprint: 1 })
    }

    #[test]
    fn image_draws_never_extend_past_the_viewport() {
        let ctx = ctx(20);
        // 800px at 20px per row: 40 display rows, block height 45.
        let layout = LayoutIndex::build(vec![tall_image(&ctx)], ctx.view_rows());
        let mut cache = RenderCache::new();
        for row in 0..=layout.max_scroll(ctx.view_rows()) {
            let frame = compose(&layout, &mut cache, &renderer(), row, &ctx);
            for draw in &frame.images {
                assert!(
                    u32::from(draw.screen_row) + draw.rows <= ctx.view_rows(),
                    "row={row}: draw anchored at {} spans {} cell rows",
                    draw.screen_row,
                    draw.rows
                );
            }
        }
    }

    #[test]
    fn top_truncated_overflowing_image_is_clamped_not_dropped() {
        let ctx = ctx(20);
        let layout = LayoutIndex::build(vec![tall_image(&ctx)], ctx.view_rows());
        let mut cache = RenderCache::new();
        // Cut 3 rows off the top; the 780px remainder still overflows the
        // 18 rows below the anchor and must be bottom-cropped to fit.
        let frame = compose(&layout, &mut cache, &renderer(), 3, &ctx);
        assert_eq!(frame.images.len(), 1);
        let draw = &frame.images[0];
        assert_eq!(draw.screen_row, 2);
        assert_eq!(draw.rows, 18);
    }

    #[test]
    fn image_sliver_at_the_bottom_edge_emits_no_draw() {
        let ctx = ctx(20);
        // Text height 16 puts only 4 rows of the image inside the viewport,
        // all of them decorative.
        let layout = LayoutIndex::build(vec![code(13), tall_image(&ctx)], ctx.view_rows());
        let mut cache = RenderCache::new();
        let frame = compose(&layout, &mut cache, &renderer(), 0, &ctx);
        assert!(frame.images.is_empty());
        assert_eq!(frame.rows.len() as u32, ctx.view_rows());
    }

    #[test]
    fn blocks_outside_viewport_are_skipped() {
        let ctx = ctx(20);
        // heights 8, 33, 8
        let layout = LayoutIndex::build(vec![code(5), code(30), code(5)], ctx.view_rows());
        let mut cache = RenderCache::new();
        let _ = compose(&layout, &mut cache, &renderer(), 10, &ctx);
        // First block [0, 8) is entirely above [10, 30); third starts at 41.
        assert!(!cache.contains(0));
        assert!(!cache.contains(41));
    }
}
