//! DOM-driven walker: parses the fragment with html5ever and recurses over the tree.
//!
//! html5ever repairs the markup first, so `<p>x<table>..</table>z</p>` arrives as a closed `<p>`,
//! the table, loose `z` and an empty `<p>` from the stray end tag, which is kept.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use log::debug;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{heading_level, is_block_boundary, Attrs, BlockWalker, ParagraphBuilder, WalkContext};
use crate::frame;
use crate::image::{ImagePlacement, ImageRequest};
use crate::model::{Block, DraftBlock};
use crate::table::{self, RawCell, RawTable};
use crate::text::{collapse_ws, preview};

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeWalker;

impl BlockWalker for TreeWalker {
    fn walk(&self, html: &str, ctx: &WalkContext) -> Vec<DraftBlock> {
        let dom = html5_parse(html);
        let body = find_body_children(&dom);
        walk_nodes(&body, ctx)
    }
}

fn html5_parse(input: &str) -> RcDom {
    let wrapped = if input.to_ascii_lowercase().contains("<html") {
        input.to_string()
    } else {
        format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"></head><body>{}</body></html>",
            input
        )
    };
    parse_document(RcDom::default(), Default::default()).one(wrapped)
}

fn find_body_children(dom: &RcDom) -> Vec<Handle> {
    fn walk_find_body(node: &Handle, out: &mut Vec<Handle>) -> bool {
        if let NodeData::Element { name, .. } = &node.data {
            if name.local.to_string().eq_ignore_ascii_case("body") {
                out.extend(node.children.borrow().iter().cloned());
                return true;
            }
        }
        for c in node.children.borrow().iter() {
            if walk_find_body(c, out) {
                return true;
            }
        }
        false
    }

    let mut out = Vec::new();
    if !walk_find_body(&dom.document, &mut out) {
        out = dom.document.children.borrow().iter().cloned().collect();
    }
    out
}

fn tag_lower(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

fn attrs_of(node: &Handle) -> Attrs {
    match &node.data {
        NodeData::Element { attrs, .. } => Attrs::new(
            attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect(),
        ),
        _ => Attrs::default(),
    }
}

fn children_of(node: &Handle) -> Vec<Handle> {
    node.children.borrow().iter().cloned().collect()
}

/// Walks a list of sibling nodes as one flow of blocks.
fn walk_nodes(nodes: &[Handle], ctx: &WalkContext) -> Vec<DraftBlock> {
    let mut blocks = Vec::new();
    let mut current = ParagraphBuilder::for_context(ctx);
    for n in nodes {
        walk(n, ctx, &mut blocks, &mut current);
    }
    current.flush(&mut blocks);
    blocks
}

fn walk(node: &Handle, ctx: &WalkContext, blocks: &mut Vec<DraftBlock>, current: &mut ParagraphBuilder) {
    match &node.data {
        NodeData::Text { contents } => {
            let s = contents.borrow().to_string();
            current.push_text(&s, ctx);
        }
        NodeData::Element { .. } => {
            let Some(tag) = tag_lower(node) else { return };
            let attrs = attrs_of(node);
            walk_element(node, &tag, &attrs, ctx, blocks, current);
        }
        _ => {}
    }
}

fn walk_element(
    node: &Handle,
    tag: &str,
    attrs: &Attrs,
    ctx: &WalkContext,
    blocks: &mut Vec<DraftBlock>,
    current: &mut ParagraphBuilder,
) {
    match tag {
        "script" | "style" | "head" | "title" | "meta" | "link" | "noscript" | "template" => {}
        "table" => {
            current.flush(blocks);
            let raw = raw_table(node, attrs, ctx);
            blocks.extend(table::build_table(raw, ctx));
        }
        "img" => {
            if ctx.drops_images() {
                debug!(
                    "header image outside a table skipped: {}",
                    preview(attrs.get("src").unwrap_or(""))
                );
                return;
            }
            current.break_for_image(blocks);
            blocks.push(Block::Image(image_request(attrs, ctx)));
        }
        "br" => current.line_break(ctx),
        "hr" => current.flush(blocks),
        "div" if frame::is_frame(attrs.style()) => {
            current.flush(blocks);
            let inner_ctx = frame::frame_context(ctx, attrs.style());
            let content = walk_nodes(&children_of(node), &inner_ctx);
            blocks.push(frame::build_frame(attrs.style(), content));
        }
        "p" => {
            let inner = ctx.inherit(attrs.style(), tag);
            current.begin(blocks, &inner, None, true);
            walk_children(node, &inner, blocks, current);
            current.flush(blocks);
        }
        _ if heading_level(tag).is_some() => {
            let inner = ctx.inherit(attrs.style(), tag);
            current.begin(blocks, &inner, heading_level(tag), false);
            walk_children(node, &inner, blocks, current);
            current.flush(blocks);
        }
        _ if is_block_boundary(tag) => {
            let inner = ctx.inherit(attrs.style(), tag);
            current.flush(blocks);
            walk_children(node, &inner, blocks, current);
            current.flush(blocks);
        }
        _ => {
            let inner = ctx.inherit(attrs.style(), tag);
            walk_children(node, &inner, blocks, current);
        }
    }
}

fn walk_children(node: &Handle, ctx: &WalkContext, blocks: &mut Vec<DraftBlock>, current: &mut ParagraphBuilder) {
    for c in node.children.borrow().iter() {
        walk(c, ctx, blocks, current);
    }
}

fn image_request(attrs: &Attrs, ctx: &WalkContext) -> ImageRequest {
    let placement = if ctx.in_table {
        ImagePlacement::TableCell
    } else {
        ImagePlacement::Standalone
    };
    ImageRequest::new(
        attrs.get("src").unwrap_or(""),
        attrs.style(),
        attrs.get("width"),
        attrs.get("height"),
        placement,
        ctx.alignment,
    )
}

/// Collects `tr` elements of this table, not descending into nested tables.
fn find_rows(node: &Handle, out: &mut Vec<Handle>) {
    for c in node.children.borrow().iter() {
        match tag_lower(c).as_deref() {
            Some("tr") => out.push(c.clone()),
            Some("table") => {}
            Some(_) => find_rows(c, out),
            None => {}
        }
    }
}

fn text_content(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => {
            out.push_str(&contents.borrow());
            out.push(' ');
        }
        NodeData::Element { .. } => {
            if matches!(tag_lower(node).as_deref(), Some("script" | "style")) {
                return;
            }
            for c in node.children.borrow().iter() {
                text_content(c, out);
            }
        }
        _ => {}
    }
}

fn raw_table(node: &Handle, attrs: &Attrs, ctx: &WalkContext) -> RawTable {
    let mut trs = Vec::new();
    find_rows(node, &mut trs);

    let rows = trs
        .iter()
        .map(|tr| {
            children_of(tr)
                .iter()
                .filter_map(|c| {
                    let tag = tag_lower(c)?;
                    if tag != "td" && tag != "th" {
                        return None;
                    }
                    let cell_attrs = attrs_of(c);
                    let cell_ctx = table::cell_context(ctx, &tag, &cell_attrs);
                    let content = walk_nodes(&children_of(c), &cell_ctx);
                    Some(RawCell {
                        attrs: cell_attrs,
                        content,
                    })
                })
                .collect()
        })
        .collect();

    let mut text = String::new();
    text_content(node, &mut text);

    RawTable {
        attrs: attrs.clone(),
        rows,
        text: collapse_ws(&text).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SectionKind, VerticalAlign};

    fn walk_body(html: &str) -> Vec<DraftBlock> {
        TreeWalker.walk(html, &WalkContext::new(SectionKind::Body, Some(10.0)))
    }

    fn texts(blocks: &[DraftBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.text()).collect()
    }

    #[test]
    fn test_paragraphs_and_runs() {
        let blocks = walk_body("<p>Hello <strong>bold</strong> and <em>it</em></p><p style=\"text-align: right\">Two</p>");
        assert_eq!(texts(&blocks), vec!["Hello bold and it", "Two"]);
        let p = blocks[0].as_paragraph().unwrap();
        assert_eq!(p.runs.len(), 4);
        assert!(p.runs[1].style.bold);
        assert!(p.runs[3].style.italic);
        assert_eq!(
            blocks[1].as_paragraph().unwrap().alignment,
            crate::model::Alignment::Right
        );
    }

    #[test]
    fn test_headings_keep_level() {
        let blocks = walk_body("<h1>Title</h1><h2>Sub</h2><h3></h3><p>x</p>");
        assert_eq!(texts(&blocks), vec!["Title", "Sub", "x"]);
        assert_eq!(blocks[0].as_paragraph().unwrap().heading_level, Some(1));
        assert_eq!(blocks[1].as_paragraph().unwrap().heading_level, Some(2));
    }

    #[test]
    fn test_caps_lines_promoted_only_when_loose() {
        let blocks = walk_body("<p>ARTICLE 2</p><div>ARTICLE 3</div><table><tr><td>TOTAL</td></tr></table>");
        assert_eq!(blocks[0].as_paragraph().unwrap().heading_level, None);
        assert!(!blocks[0].as_paragraph().unwrap().runs[0].style.bold);
        assert_eq!(blocks[1].as_paragraph().unwrap().heading_level, Some(1));
        let cell = &blocks[2].as_table().unwrap().rows[0].cells[0];
        assert_eq!(cell.content[0].as_paragraph().unwrap().heading_level, None);
    }

    #[test]
    fn test_loose_text_and_divs() {
        let blocks = walk_body("Intro<div>First</div><div style=\"padding:15px\">X</div>tail");
        assert_eq!(texts(&blocks), vec!["Intro", "First", "X", "tail"]);
        assert!(blocks.iter().all(|b| b.as_paragraph().is_some()));
    }

    #[test]
    fn test_frame_becomes_single_cell_table() {
        let blocks = walk_body("<div style=\"border:1px solid #E5E7EB; padding:15px\">X</div>");
        assert_eq!(blocks.len(), 1);
        let Block::Frame(t) = &blocks[0] else { panic!("expected frame") };
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].cells.len(), 1);
        let cell = &t.rows[0].cells[0];
        assert_eq!(cell.border.as_ref().unwrap().color_hex, "E5E7EB");
        assert_eq!(cell.vertical_align, VerticalAlign::Top);
        assert_eq!(cell.content[0].as_paragraph().unwrap().text(), "X");
    }

    #[test]
    fn test_image_order_is_preserved() {
        let blocks = walk_body("<p>before</p><img src=\"data:image/png;base64,AAAA\"><p>after</p>");
        assert_eq!(blocks.len(), 3);
        assert!(blocks[1].is_image());
        assert_eq!(blocks[2].text(), "after");
    }

    #[test]
    fn test_header_images_only_in_tables() {
        let ctx = WalkContext::new(SectionKind::Header, Some(8.0));
        let blocks = TreeWalker.walk(
            "<img src=\"https://x.test/a.png\"><table><tr><td>Info</td><td><img src=\"https://x.test/logo.png\" style=\"max-height: 55px\"></td></tr></table>",
            &ctx,
        );
        assert_eq!(blocks.len(), 1);
        let t = blocks[0].as_table().unwrap();
        let Block::Image(req) = &t.rows[0].cells[0].content[0] else { panic!("expected logo first") };
        assert_eq!(req.placement, ImagePlacement::TableCell);
        assert_eq!((req.width, req.height), (138, 55));
    }

    #[test]
    fn test_nested_table_rows_stay_nested() {
        let blocks = walk_body(
            "<table><tr><td><table><tr><td>a</td></tr><tr><td>b</td></tr></table></td></tr></table>",
        );
        let outer = blocks[0].as_table().unwrap();
        assert_eq!(outer.rows.len(), 1);
        let inner = outer.rows[0].cells[0].content[0].as_table().unwrap();
        assert_eq!(inner.rows.len(), 2);
    }

    #[test]
    fn test_table_closes_open_paragraph() {
        let blocks = walk_body("<p>x<table><tr><td>t</td></tr></table>z</p>");
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].text(), "x");
        assert!(blocks[1].as_table().is_some());
        assert_eq!(blocks[2].text(), "z");
        assert_eq!(blocks[3].as_paragraph().unwrap().text(), "");
    }

    #[test]
    fn test_scripts_are_ignored() {
        let blocks = walk_body("<script>var a = 1;</script><p>ok</p><style>p{}</style>");
        assert_eq!(texts(&blocks), vec!["ok"]);
    }
}
