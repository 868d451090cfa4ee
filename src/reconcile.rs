//! Reconciliation: fold a re-parsed notebook into the live layout without
//! rebuilding what did not change.
//!
//! The cheap path requires the block count to be unchanged; then blocks are
//! compared pairwise by source fingerprint and only edited ones are rebuilt,
//! with every later offset shifted by the accumulated height delta. Any
//! insertion or deletion falls back to a full rebuild, which is still just a
//! height accumulation plus an empty cache.

use log::debug;

use crate::block::Block;
use crate::layout::LayoutIndex;
use crate::notebook::SourceBlock;
use crate::term::TerminalContext;
use crate::viewport::RenderCache;

/// Merge `new_blocks` into `layout`. Returns the replacement layout and
/// cache, or `None` when nothing changed and the caller can keep both.
pub fn reconcile(
    new_blocks: &[SourceBlock],
    layout: &LayoutIndex,
    cache: &RenderCache,
    ctx: &TerminalContext,
) -> Option<(LayoutIndex, RenderCache)> {
    if new_blocks.len() != layout.real_len() {
        debug!(
            "reconcile: block count {} -> {}, full rebuild",
            layout.real_len(),
            new_blocks.len()
        );
        let blocks = new_blocks.iter().map(|s| Block::from_source(s, ctx)).collect();
        return Some((
            LayoutIndex::build(blocks, ctx.view_rows()),
            RenderCache::new(),
        ));
    }

    let mut blocks: Vec<Block> = Vec::with_capacity(new_blocks.len());
    let mut carried = RenderCache::new();
    let mut changed = 0usize;
    let mut offset = 0u32;

    for ((old_offset, old_block), src) in layout.real_entries().iter().zip(new_blocks) {
        if old_block.matches(src) {
            // Unchanged content keeps its rendered rows, re-keyed to wherever
            // earlier edits shifted it.
            if let Some(lines) = cache.entry_cloned(*old_offset) {
                carried.insert(offset, lines);
            }
            offset += old_block.height();
            blocks.push(old_block.clone());
        } else {
            let replacement = Block::from_source(src, ctx);
            offset += replacement.height();
            changed += 1;
            blocks.push(replacement);
        }
    }

    if changed == 0 {
        return None;
    }
    debug!("reconcile: {changed} block(s) rebuilt, cache carries {} entries", carried.len());
    Some((LayoutIndex::build(blocks, ctx.view_rows()), carried))
}
