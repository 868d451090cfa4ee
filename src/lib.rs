//! nbview — a terminal pager for Jupyter notebooks.
//!
//! The pipeline: `notebook` parses `.ipynb` JSON into source blocks,
//! `block` turns them into displayable units with known heights, `layout`
//! assigns absolute row offsets, and `viewport` composes the visible slice
//! into text rows plus Kitty graphics draws. `reconcile` folds re-parsed
//! documents into the live layout, and `viewer` runs the whole thing against
//! a real terminal.

pub mod block;
pub mod config;
pub mod layout;
pub mod notebook;
pub mod raster;
pub mod reconcile;
pub mod render;
pub mod search;
pub mod term;
pub mod viewer;
pub mod viewport;
pub mod watch;
