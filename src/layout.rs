//! Layout index: the ordered mapping from absolute row offsets to blocks.
//!
//! Offsets are assigned by height accumulation over document order, so for
//! every consecutive pair `offset_{i+1} = offset_i + height_i`. The index is
//! immutable once built; the reconciler replaces it wholesale rather than
//! mutating something the render path might be iterating.

use crate::block::Block;

#[derive(Debug, Clone)]
pub struct LayoutIndex {
    entries: Vec<(u32, Block)>,
    document_size: u32,
    has_filler: bool,
}

impl LayoutIndex {
    /// Assign offsets by height accumulation. If the document is shorter
    /// than the viewport, append a synthetic blank so the total always
    /// exceeds the viewport height; otherwise the terminal's own prompt
    /// handling leaks through below the last block and throws off every
    /// cursor calculation.
    pub fn build(blocks: Vec<Block>, viewport_rows: u32) -> Self {
        let mut entries = Vec::with_capacity(blocks.len() + 1);
        let mut offset = 0u32;
        for block in blocks {
            let height = block.height();
            entries.push((offset, block));
            offset += height;
        }
        let mut has_filler = false;
        let document_size = if offset < viewport_rows {
            entries.push((offset, Block::Blank(viewport_rows - offset + 1)));
            has_filler = true;
            viewport_rows
        } else {
            offset
        };
        Self { entries, document_size, has_filler }
    }

    /// Exclusive upper bound of addressable rows.
    pub fn document_size(&self) -> u32 {
        self.document_size
    }

    pub fn max_scroll(&self, viewport_rows: u32) -> u32 {
        self.document_size.saturating_sub(viewport_rows)
    }

    pub fn entries(&self) -> &[(u32, Block)] {
        &self.entries
    }

    /// Blocks whose `[offset, offset + height)` interval overlaps
    /// `[start, end)`, in ascending offset order.
    pub fn blocks_intersecting(
        &self,
        start: u32,
        end: u32,
    ) -> impl Iterator<Item = (u32, &Block)> {
        self.entries
            .iter()
            .filter(move |(offset, block)| *offset < end && offset + block.height() > start)
            .map(|(offset, block)| (*offset, block))
    }

    /// Entries excluding the synthetic filler, in document order.
    pub fn real_entries(&self) -> &[(u32, Block)] {
        &self.entries[..self.real_len()]
    }

    pub fn real_len(&self) -> usize {
        self.entries.len() - usize::from(self.has_filler)
    }

    /// Re-run the build for a new viewport height (terminal resize). The
    /// filler is recomputed; everything else keeps its height.
    pub fn rebuild(&self, viewport_rows: u32) -> Self {
        let blocks = self.real_entries().iter().map(|(_, b)| b.clone()).collect();
        Self::build(blocks, viewport_rows)
    }
}
