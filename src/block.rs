//! Content blocks: the displayable units of a notebook.
//!
//! Every block knows its height in terminal rows when fully rendered:
//! text-like blocks occupy `lines + 3` rows (rule + margins), image blocks
//! `display_rows + 5` (blank canvas rows plus protocol overhead), blanks
//! exactly their row count. Truncation produces a partial-height variant for
//! the portion overlapping the viewport's top edge; the arithmetic mirrors
//! the decorative rows that padding drops first.

use log::warn;

use crate::notebook::{CellKind, SourceBlock};
use crate::raster::{self, Raster};
use crate::term::TerminalContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Markdown,
    Code,
    Output,
    Error,
}

#[derive(Debug, Clone)]
pub enum Block {
    /// Filler rows; never padded, compares equal to anything.
    Blank(u32),
    Text {
        kind: TextKind,
        lines: Vec<String>,
        fingerprint: u64,
    },
    Image(ImageBlock),
}

#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub raster: Raster,
    /// Cell-space size at the current terminal geometry.
    pub rows: u32,
    pub cols: u32,
    pub fingerprint: u64,
}

impl Block {
    pub fn from_source(src: &SourceBlock, ctx: &TerminalContext) -> Block {
        let fingerprint = src.fingerprint();
        match src {
            SourceBlock::Cell { kind: CellKind::Markdown, source } => {
                text(TextKind::Markdown, source, fingerprint)
            }
            SourceBlock::Cell { kind: CellKind::Code, source } => {
                text(TextKind::Code, source, fingerprint)
            }
            // Stream output is shown like code, matching the notebook's own
            // monospaced stdout panes.
            SourceBlock::Stream { text: t } => text(TextKind::Code, t, fingerprint),
            SourceBlock::ErrorOutput { traceback } => Block::Text {
                kind: TextKind::Error,
                lines: error_lines(traceback),
                fingerprint,
            },
            SourceBlock::DisplayData { png: Some(b64) } => image_or_blank(b64, fingerprint, ctx),
            SourceBlock::DisplayData { png: None } => Block::Blank(1),
            SourceBlock::ExecuteResult { png: Some(b64), .. } => {
                image_or_blank(b64, fingerprint, ctx)
            }
            SourceBlock::ExecuteResult { json: Some(j), .. } => {
                text(TextKind::Code, &[j.clone()], fingerprint)
            }
            SourceBlock::ExecuteResult { text: Some(t), .. } => {
                text(TextKind::Output, t, fingerprint)
            }
            SourceBlock::ExecuteResult { .. } => Block::Blank(1),
        }
    }

    /// Rows this block occupies when fully rendered.
    pub fn height(&self) -> u32 {
        match self {
            Block::Blank(n) => *n,
            Block::Text { lines, .. } => lines.len() as u32 + 3,
            Block::Image(img) => img.rows + 5,
        }
    }

    /// Padded blocks get a decorative rule and a one-row margin when fully
    /// visible; blanks never do.
    pub fn is_padded(&self) -> bool {
        !matches!(self, Block::Blank(_))
    }

    pub fn fingerprint(&self) -> u64 {
        match self {
            Block::Blank(_) => 0,
            Block::Text { fingerprint, .. } => *fingerprint,
            Block::Image(img) => img.fingerprint,
        }
    }

    /// Whether this block still represents the given source content.
    /// Blanks always match: they stand in for content we chose not to show.
    pub fn matches(&self, src: &SourceBlock) -> bool {
        match self {
            Block::Blank(_) => true,
            _ => self.fingerprint() == src.fingerprint(),
        }
    }

    pub fn text_lines(&self) -> Option<&[String]> {
        match self {
            Block::Text { lines, .. } => Some(lines),
            _ => None,
        }
    }

    /// Produce the variant shown when the viewport's top edge cuts `offset`
    /// rows off this block. Out-of-range offsets clamp; truncation runs on
    /// every scroll step and must never fail.
    pub fn truncate_top(&self, offset: u32, ctx: &TerminalContext) -> Block {
        if offset == 0 {
            return self.clone();
        }
        match self {
            Block::Blank(n) => Block::Blank(n.saturating_sub(offset).max(1)),
            Block::Text { kind, lines, fingerprint } => {
                let height = lines.len() as u32 + 3;
                if offset >= height - 1 {
                    return Block::Blank(1);
                }
                // The first two truncated rows are the rule and top margin;
                // only rows beyond those remove source lines.
                let drop = offset.saturating_sub(2) as usize;
                Block::Text {
                    kind: *kind,
                    lines: lines[drop..].to_vec(),
                    fingerprint: *fingerprint,
                }
            }
            Block::Image(img) => img.truncate_top(offset, ctx),
        }
    }
}

fn text(kind: TextKind, raw_lines: &[String], fingerprint: u64) -> Block {
    let lines = raw_lines
        .iter()
        .map(|l| l.trim_end_matches('\n').to_string())
        .collect();
    Block::Text { kind, lines, fingerprint }
}

/// Split traceback entries into rows, normalizing the ASCII arrows Jupyter
/// draws into box-drawing characters. ANSI color escapes pass through: the
/// terminal renders them directly.
fn error_lines(traceback: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for entry in traceback {
        let entry = entry.replace('-', "─").replace("─>", "─→");
        for row in entry.split('\n') {
            out.push(row.to_string());
        }
    }
    out
}

fn image_or_blank(b64: &str, fingerprint: u64, ctx: &TerminalContext) -> Block {
    if !ctx.images_enabled() {
        return Block::Blank(1);
    }
    match ImageBlock::new(b64, fingerprint, ctx) {
        Ok(img) => Block::Image(img),
        Err(e) => {
            // A malformed payload degrades to a placeholder; it must not
            // abort the whole document.
            warn!("image output degraded to blank: {e:#}");
            Block::Blank(1)
        }
    }
}

impl ImageBlock {
    pub fn new(b64: &str, fingerprint: u64, ctx: &TerminalContext) -> anyhow::Result<Self> {
        let raster = raster::fit_to_terminal(Raster::decode(b64)?, ctx)?;
        Ok(Self::from_raster(raster, fingerprint, ctx))
    }

    fn from_raster(raster: Raster, fingerprint: u64, ctx: &TerminalContext) -> Self {
        let (rows, cols) = raster::cell_size(raster.width(), raster.height(), ctx);
        Self { raster, rows, cols, fingerprint }
    }

    /// Top truncation in pixel space. The first two rows cut are decorative;
    /// within 4 rows of the bottom the remnant collapses to a blank (the
    /// tail rows are protocol canvas, not pixels).
    pub fn truncate_top(&self, offset: u32, ctx: &TerminalContext) -> Block {
        if offset <= 2 {
            return Block::Image(self.clone());
        }
        let height = self.rows + 5;
        if offset >= height.saturating_sub(4) {
            return Block::Blank(height.saturating_sub(offset).max(1));
        }
        let px_off = (f64::from(offset - 2) * ctx.pix_per_row()).ceil() as u32;
        match self.raster.crop_from_row(px_off) {
            Ok(raster) => Block::Image(Self::from_raster(raster, self.fingerprint, ctx)),
            Err(e) => {
                warn!("image top-crop failed, degrading to blank: {e:#}");
                Block::Blank(height.saturating_sub(offset).max(1))
            }
        }
    }

    /// Bottom truncation for deferred draws: keep only the pixel rows that
    /// fall inside the viewport. `visible` is the number of the block's rows
    /// still on screen, counted from its top.
    pub fn truncate_bottom(&self, visible: u32, ctx: &TerminalContext) -> Block {
        if visible <= 4 {
            return Block::Blank(1);
        }
        let px = (f64::from(visible - 4) * ctx.pix_per_row()).ceil() as u32;
        match self.raster.crop_to_row(px) {
            Ok(raster) => Block::Image(Self::from_raster(raster, self.fingerprint, ctx)),
            Err(e) => {
                warn!("image bottom-crop failed, degrading to blank: {e:#}");
                Block::Blank(1)
            }
        }
    }
}
