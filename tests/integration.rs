use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat};

use nbview::block::Block;
use nbview::layout::LayoutIndex;
use nbview::notebook::{self, SourceBlock};
use nbview::reconcile::reconcile;
use nbview::render::TextRenderer;
use nbview::term::TerminalContext;
use nbview::viewport::{self, RenderCache};

fn ctx() -> TerminalContext {
    // 40x100 cells, 20px rows, 8px cols
    TerminalContext::synthetic(40, 100, 800, 800)
}

fn png_b64(width: u32, height: u32) -> String {
    let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([10, 200, 80, 255]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    BASE64.encode(&buf)
}

fn notebook_json(extra_cells: &str) -> String {
    format!(
        r##"{{"cells": [
            {{"cell_type": "markdown", "source": ["# Analysis\n", "Some prose.\n"]}},
            {{"cell_type": "code", "source": ["print(1)\n"],
             "outputs": [{{"output_type": "stream", "name": "stdout", "text": ["1\n"]}}]}}
            {extra_cells}
        ],
        "metadata": {{"kernelspec": {{"language": "python", "name": "python3"}}}},
        "nbformat": 4, "nbformat_minor": 5}}"##
    )
}

fn build(sources: &[SourceBlock], ctx: &TerminalContext) -> LayoutIndex {
    let blocks: Vec<Block> = sources.iter().map(|s| Block::from_source(s, ctx)).collect();
    LayoutIndex::build(blocks, ctx.view_rows())
}

#[test]
fn parse_layout_compose_pipeline() {
    let ctx = ctx();
    let nb = notebook::parse(&notebook_json("")).unwrap();
    assert_eq!(nb.language, "python");
    // markdown cell, code cell, stream output
    assert_eq!(nb.blocks.len(), 3);

    let layout = build(&nb.blocks, &ctx);
    // Heights: 2+3, 1+3, 1+3 = 13 rows; shorter than the viewport, so the
    // document is padded out to it.
    assert_eq!(layout.document_size(), ctx.view_rows());
    assert_eq!(layout.max_scroll(ctx.view_rows()), 0);

    let renderer = TextRenderer::new(nb.language.clone());
    let mut cache = RenderCache::new();
    let frame = viewport::compose(&layout, &mut cache, &renderer, 0, &ctx);
    assert_eq!(frame.rows.len() as u32, ctx.view_rows());
    assert!(frame.images.is_empty());
    // The heading made it through with styling around it.
    assert!(frame.rows.iter().any(|r| r.contains("# Analysis")));
}

#[test]
fn every_scroll_position_fills_the_viewport() {
    let ctx = ctx();
    let many_cells: String = (0..20)
        .map(|i| {
            format!(
                r#", {{"cell_type": "code", "source": ["cell_{i} = {i}\n", "y = cell_{i}\n"]}}"#
            )
        })
        .collect();
    let nb = notebook::parse(&notebook_json(&many_cells)).unwrap();
    let layout = build(&nb.blocks, &ctx);
    assert!(layout.document_size() > ctx.view_rows());

    let renderer = TextRenderer::new("python");
    let mut cache = RenderCache::new();
    for row in 0..=layout.max_scroll(ctx.view_rows()) {
        let frame = viewport::compose(&layout, &mut cache, &renderer, row, &ctx);
        assert_eq!(frame.rows.len() as u32, ctx.view_rows(), "row={row}");
    }
}

#[test]
fn image_output_flows_into_a_draw_command() {
    let ctx = ctx();
    let image_cell = format!(
        r#", {{"cell_type": "code", "source": ["plot()\n"],
            "outputs": [{{"output_type": "display_data",
                          "data": {{"image/png": "{}"}}}}]}}"#,
        png_b64(160, 100)
    );
    let nb = notebook::parse(&notebook_json(&image_cell)).unwrap();
    let layout = build(&nb.blocks, &ctx);

    let image_entry = layout
        .real_entries()
        .iter()
        .find(|(_, b)| matches!(b, Block::Image(_)))
        .expect("image block expected");
    // 100px tall at 20px per row = 5 rows, +5 overhead.
    assert_eq!(image_entry.1.height(), 10);

    let renderer = TextRenderer::new("python");
    let mut cache = RenderCache::new();
    let frame = viewport::compose(&layout, &mut cache, &renderer, 0, &ctx);
    assert_eq!(frame.images.len(), 1);
    let draw = &frame.images[0];
    assert_eq!((draw.rows, draw.cols), (5, 20));
    // Centered: (100 - 20) / 2.
    assert_eq!(draw.screen_col, 40);
    assert!(!draw.b64.is_empty());
}

#[test]
fn reload_reconciles_without_touching_unchanged_blocks() {
    let ctx = ctx();
    let nb = notebook::parse(&notebook_json("")).unwrap();
    let layout = build(&nb.blocks, &ctx);
    let mut cache = RenderCache::new();
    let renderer = TextRenderer::new("python");
    let _ = viewport::compose(&layout, &mut cache, &renderer, 0, &ctx);

    // Identical re-parse: nothing to do.
    let same = notebook::parse(&notebook_json("")).unwrap();
    assert!(reconcile(&same.blocks, &layout, &cache, &ctx).is_none());

    // Edit the code cell in place; block count is unchanged.
    let edited_json = notebook_json("").replace("print(1)", "print(2)");
    let edited = notebook::parse(&edited_json).unwrap();
    let (new_layout, new_cache) =
        reconcile(&edited.blocks, &layout, &cache, &ctx).expect("change expected");
    assert_eq!(new_layout.real_len(), layout.real_len());
    // The untouched markdown cell kept its cached render at offset 0.
    assert!(new_cache.contains(0));

    // Adding a cell changes the count and forces a rebuild.
    let grown =
        notebook::parse(&notebook_json(r#", {"cell_type": "code", "source": ["z = 3\n"]}"#))
            .unwrap();
    let (rebuilt, empty_cache) =
        reconcile(&grown.blocks, &layout, &cache, &ctx).expect("rebuild expected");
    assert_eq!(rebuilt.real_len(), 4);
    assert!(empty_cache.is_empty());
}

#[test]
fn error_output_renders_with_normalized_arrows() {
    let ctx = ctx();
    let error_cell = r#", {"cell_type": "code", "source": ["boom()\n"],
        "outputs": [{"output_type": "error", "ename": "TypeError", "evalue": "bad",
                     "traceback": ["----> 1 boom()\nTypeError: bad"]}]}"#;
    let nb = notebook::parse(&notebook_json(error_cell)).unwrap();
    let layout = build(&nb.blocks, &ctx);
    let renderer = TextRenderer::new("python");
    let mut cache = RenderCache::new();
    let frame = viewport::compose(&layout, &mut cache, &renderer, 0, &ctx);
    assert!(frame.rows.iter().any(|r| r.contains("────→ 1 boom()")));
    assert!(frame.rows.iter().any(|r| r.contains("TypeError: bad")));
}

#[test]
fn pixelless_terminal_shows_image_as_blank() {
    let ctx = TerminalContext::synthetic(40, 100, 0, 0);
    let image_cell = format!(
        r#", {{"cell_type": "code", "source": ["plot()\n"],
            "outputs": [{{"output_type": "display_data",
                          "data": {{"image/png": "{}"}}}}]}}"#,
        png_b64(160, 100)
    );
    let nb = notebook::parse(&notebook_json(&image_cell)).unwrap();
    let layout = build(&nb.blocks, &ctx);
    assert!(
        layout
            .real_entries()
            .iter()
            .all(|(_, b)| !matches!(b, Block::Image(_)))
    );
    let renderer = TextRenderer::new("python");
    let mut cache = RenderCache::new();
    let frame = viewport::compose(&layout, &mut cache, &renderer, 0, &ctx);
    assert!(frame.images.is_empty());
}
