//! Terminal notebook viewer with Kitty Graphics Protocol.
//!
//! Thread layout:
//!   input worker  — raw-mode single-byte reads from stdin, one key in
//!                   flight at a time (ack handshake with the render loop)
//!   reload worker — notify-based file watch, re-parses on change, ships
//!                   blocks over a bounded channel (see `crate::watch`)
//!   render loop   — this thread: drains both channels, owns the layout,
//!                   cache and view state, and does all drawing
//!
//! The ack handshake keeps raw mode scoped to a single read: while the
//! render loop processes a key the worker is parked on the ack channel with
//! the terminal cooked, so the search prompt (and a quit that never acks)
//! always find a sane terminal.

mod input;
mod terminal;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::thread;

use log::{debug, info, warn};
use regex::Regex;

use crate::block::Block;
use crate::config::{Config, ViewerConfig};
use crate::layout::LayoutIndex;
use crate::notebook::{self, SourceBlock};
use crate::reconcile::reconcile;
use crate::render::TextRenderer;
use crate::search::ViewState;
use crate::term::TerminalContext;
use crate::viewport::{self, RenderCache};
use crate::watch;

use input::{Action, map_key};

/// Run the viewer on `path` until the user quits.
pub fn run(path: &Path, config: &Config, watch_file: bool) -> anyhow::Result<()> {
    terminal::check_tty()?;
    terminal::install_sigint_handler()?;

    let mut ctx = TerminalContext::probe()?;
    if !ctx.images_enabled() {
        warn!(
            "terminal reports no pixel size; image outputs will be shown as blanks"
        );
    }

    let nb = notebook::load(path)?;
    info!(
        "loaded {}: {} blocks, language {}",
        path.display(),
        nb.blocks.len(),
        nb.language
    );
    let renderer = TextRenderer::new(nb.language);
    let mut sources = nb.blocks;
    let mut layout = build_layout(&sources, &ctx);
    let mut cache = RenderCache::new();
    let mut state = ViewState::new();

    let (key_tx, key_rx) = mpsc::channel::<char>();
    let (ack_tx, ack_rx) = mpsc::channel::<()>();
    let (doc_tx, doc_rx) = mpsc::sync_channel::<Vec<SourceBlock>>(1);

    // Input worker: one key in flight at a time. Detached; it is parked on
    // the ack channel at shutdown and unwinds when the channel drops.
    let _input_worker = thread::Builder::new().name("nbview-input".into()).spawn(move || {
        loop {
            match terminal::read_one_char() {
                Ok(Some(key)) => {
                    if key_tx.send(key).is_err() || ack_rx.recv().is_err() {
                        break;
                    }
                }
                Ok(None) => break, // stdin EOF
                Err(e) => {
                    warn!("input worker: read failed: {e}");
                    break;
                }
            }
        }
        debug!("input worker: exiting");
    })?;

    let stop = Arc::new(AtomicBool::new(false));
    let reload_handle = if watch_file {
        match watch::spawn_reload_worker(
            path,
            doc_tx,
            Arc::clone(&stop),
            config.viewer.watch_interval,
        ) {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Viewing still works without live reload.
                warn!("file watching unavailable: {e:#}");
                None
            }
        }
    } else {
        None
    };

    terminal::hide_cursor()?;
    let reload_active = reload_handle.is_some();
    let mut input_dead = false;
    let mut reload_dead = false;

    loop {
        if state.needs_redraw {
            let frame = viewport::compose(&layout, &mut cache, &renderer, state.row, &ctx);
            terminal::draw_frame(&frame)?;
            state.needs_redraw = false;
        }

        // Resize: image blocks are sized against the cell geometry, so the
        // whole document is rebuilt from its sources.
        if let Ok(probed) = TerminalContext::probe() {
            if probed != ctx {
                debug!("resize: {}x{} -> {}x{}", ctx.cols, ctx.rows, probed.cols, probed.rows);
                ctx = probed;
                layout = build_layout(&sources, &ctx);
                cache.clear();
                state.goto(&layout, ctx.view_rows(), state.row);
                state.needs_redraw = true;
                continue;
            }
        }

        match doc_rx.try_recv() {
            Ok(new_blocks) => {
                if let Some((new_layout, new_cache)) =
                    reconcile(&new_blocks, &layout, &cache, &ctx)
                {
                    layout = new_layout;
                    cache = new_cache;
                    state.goto(&layout, ctx.view_rows(), state.row);
                    state.needs_redraw = true;
                }
                sources = new_blocks;
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // Disconnected is also the steady state with --no-watch or a
                // failed watcher setup; only a worker that was running gets
                // the warning.
                if reload_active {
                    warn_worker_gone(&mut reload_dead, "reload", "live reload disabled");
                }
            }
        }

        match key_rx.try_recv() {
            Ok(key) => {
                if handle_key(key, &mut state, &layout, &ctx, &config.viewer)? {
                    // Quit: no ack, so the worker stays parked with the
                    // terminal cooked until the channel drops.
                    break;
                }
                let _ = ack_tx.send(());
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                warn_worker_gone(&mut input_dead, "input", "scrolling disabled");
            }
        }

        thread::sleep(config.viewer.tick);
    }

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = reload_handle {
        let _ = handle.join();
    }
    terminal::show_cursor()?;
    terminal::clear_screen()?;
    Ok(())
}

/// One warning per dead worker; the loop keeps serving the live ones.
/// Returns whether this call was the one that warned.
fn warn_worker_gone(already: &mut bool, what: &str, consequence: &str) -> bool {
    if *already {
        return false;
    }
    *already = true;
    warn!("{what} worker gone; {consequence}");
    true
}

fn build_layout(sources: &[SourceBlock], ctx: &TerminalContext) -> LayoutIndex {
    let blocks: Vec<Block> = sources.iter().map(|s| Block::from_source(s, ctx)).collect();
    LayoutIndex::build(blocks, ctx.view_rows())
}

/// Apply one key. Returns true on quit.
fn handle_key(
    key: char,
    state: &mut ViewState,
    layout: &LayoutIndex,
    ctx: &TerminalContext,
    cfg: &ViewerConfig,
) -> anyhow::Result<bool> {
    let view_rows = ctx.view_rows();
    match map_key(key) {
        Some(Action::Quit) => return Ok(true),
        Some(Action::ScrollDown) => state.scroll(layout, view_rows, cfg.scroll_step as i32),
        Some(Action::ScrollUp) => state.scroll(layout, view_rows, -(cfg.scroll_step as i32)),
        Some(Action::HalfPageDown) => state.scroll(layout, view_rows, cfg.page_step as i32),
        Some(Action::HalfPageUp) => state.scroll(layout, view_rows, -(cfg.page_step as i32)),
        Some(Action::JumpToTop) => state.goto_top(layout, view_rows),
        Some(Action::JumpToBottom) => state.goto_bottom(layout, view_rows),
        Some(Action::Search { forward }) => {
            let pattern = terminal::prompt_pattern(ctx.rows, forward)?;
            if !pattern.is_empty() {
                match Regex::new(&pattern) {
                    Ok(re) => {
                        state.set_pattern(re);
                        if forward {
                            state.search_next(layout, view_rows);
                        } else {
                            state.search_prev(layout, view_rows);
                        }
                    }
                    Err(e) => warn!("invalid search pattern: {e}"),
                }
            }
            // The prompt overwrote the bottom row either way.
            state.needs_redraw = true;
        }
        Some(Action::SearchNext) => {
            state.search_next(layout, view_rows);
        }
        Some(Action::SearchPrev) => {
            state.search_prev(layout, view_rows);
        }
        None => {}
    }
    Ok(false)
}
