//! Table builder shared by both walkers.
//!
//! Walkers hand over a [`RawTable`]: attributes plus cells whose content has already been
//! walked. Everything that turns markup attributes into cell properties happens here.

use log::debug;

use crate::border::{parse_border, parse_fill, parse_padding_twips, parse_width};
use crate::image::ImageRequest;
use crate::model::{Alignment, Block, Cell, Dimension, DraftBlock, Paragraph, Row, Table};
use crate::style::{parse_alignment, parse_vertical_align};
use crate::walk::{Attrs, WalkContext};

/// Cell padding when none is declared, in px.
pub const DEFAULT_CELL_PADDING_PX: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct RawCell {
    pub attrs: Attrs,
    pub content: Vec<DraftBlock>,
}

#[derive(Debug, Clone)]
pub struct RawTable {
    pub attrs: Attrs,
    pub rows: Vec<Vec<RawCell>>,
    /// Whitespace-collapsed text of the whole table, used when no row survives.
    pub text: String,
}

/// Context used to walk the content of a `td`/`th`.
pub fn cell_context(ctx: &WalkContext, tag: &str, attrs: &Attrs) -> WalkContext {
    let mut inner = ctx.nested(true).inherit(attrs.style(), tag);
    if tag == "th" {
        inner.style.bold = true;
    }
    inner
}

fn horizontal_align(style: &str) -> Alignment {
    match parse_alignment(style) {
        Some(Alignment::Justified) | None => Alignment::Left,
        Some(a) => a,
    }
}

fn build_cell(raw: RawCell, table_style: &str) -> Cell<ImageRequest> {
    let style = raw.attrs.style();
    let horizontal = horizontal_align(style);
    let mut content = raw.content;
    if content.is_empty() {
        content.push(Block::Paragraph(Paragraph::filler(horizontal)));
    }
    Cell {
        content,
        border: parse_border(style).or_else(|| parse_border(table_style)),
        fill: parse_fill(style),
        width: parse_width(style, raw.attrs.get("width")),
        vertical_align: parse_vertical_align(style).unwrap_or_default(),
        horizontal_align: horizontal,
        padding_twips: parse_padding_twips(style, DEFAULT_CELL_PADDING_PX),
    }
}

/// The logo cell of a reversed header row hugs the left margin.
fn align_logo_left(cell: &mut Cell<ImageRequest>) {
    cell.horizontal_align = Alignment::Left;
    for block in cell.content.iter_mut() {
        if let Block::Image(req) = block {
            req.alignment = Alignment::Left;
        }
    }
}

/// Builds the table, or flattens its text into a paragraph when no row has a cell.
pub fn build_table(raw: RawTable, ctx: &WalkContext) -> Vec<DraftBlock> {
    let table_style = raw.attrs.style().to_string();
    let mut raw_rows: Vec<Vec<RawCell>> = raw.rows.into_iter().filter(|r| !r.is_empty()).collect();

    if raw_rows.is_empty() {
        debug!("table without usable rows flattened to text");
        if raw.text.is_empty() {
            return Vec::new();
        }
        let mut p = Paragraph::plain(&raw.text, ctx.style.clone());
        p.alignment = ctx.alignment.unwrap_or_default();
        return vec![Block::Paragraph(p)];
    }

    let border = raw_rows[0]
        .first()
        .and_then(|c| parse_border(c.attrs.style()))
        .or_else(|| parse_border(&table_style));

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw_cells in raw_rows.drain(..) {
        let mut cells: Vec<Cell<_>> = raw_cells
            .into_iter()
            .map(|c| build_cell(c, &table_style))
            .collect();
        if ctx.is_header() && cells.len() == 2 {
            cells.reverse();
            align_logo_left(&mut cells[0]);
            debug!("header row reversed");
        }
        rows.push(Row { cells });
    }

    let table = Table {
        rows,
        width: parse_width(&table_style, raw.attrs.get("width")).unwrap_or_else(Dimension::full_width),
        border,
    };
    debug!(
        "table built: {} rows, {} columns",
        table.rows.len(),
        table.column_count()
    );
    vec![Block::Table(table)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DimensionUnit, SectionKind, VerticalAlign};

    fn attrs(style: &str) -> Attrs {
        Attrs::new(vec![("style".into(), style.into())])
    }

    fn text_cell(text: &str, style: &str) -> RawCell {
        RawCell {
            attrs: attrs(style),
            content: vec![Block::Paragraph(Paragraph::plain(text, Default::default()))],
        }
    }

    fn body_ctx() -> WalkContext {
        WalkContext::new(SectionKind::Body, Some(10.0))
    }

    #[test]
    fn test_cell_defaults() {
        let raw = RawTable {
            attrs: Attrs::default(),
            rows: vec![vec![text_cell("a", ""), RawCell { attrs: Attrs::default(), content: vec![] }]],
            text: "a".into(),
        };
        let blocks = build_table(raw, &body_ctx());
        let t = blocks[0].as_table().unwrap();
        assert_eq!(t.width.unit, DimensionUnit::Percentage);
        assert_eq!(t.width.value, 100.0);
        assert!(t.border.is_none());
        let c = &t.rows[0].cells[0];
        assert_eq!(c.vertical_align, VerticalAlign::Top);
        assert_eq!(c.horizontal_align, Alignment::Left);
        assert_eq!(c.padding_twips, crate::model::px_to_twips(3.0));
        assert!(c.border.is_none());
        assert_eq!(t.rows[0].cells[1].content[0].text(), " ");
    }

    #[test]
    fn test_cell_styles() {
        let raw = RawTable {
            attrs: attrs("border: 1px solid #ccc; width: 80%"),
            rows: vec![vec![text_cell(
                "a",
                "background-color: #eee; vertical-align: middle; text-align: center; padding: 8px; width: 120px",
            )]],
            text: "a".into(),
        };
        let blocks = build_table(raw, &body_ctx());
        let t = blocks[0].as_table().unwrap();
        assert_eq!(t.width.value, 80.0);
        assert_eq!(t.border.as_ref().unwrap().color_hex, "CCCCCC");
        let c = &t.rows[0].cells[0];
        assert_eq!(c.border.as_ref().unwrap().color_hex, "CCCCCC");
        assert_eq!(c.fill.as_ref().unwrap().color_hex, "EEEEEE");
        assert_eq!(c.vertical_align, VerticalAlign::Center);
        assert_eq!(c.horizontal_align, Alignment::Center);
        assert_eq!(c.padding_twips, crate::model::px_to_twips(8.0));
        assert_eq!(c.width.unwrap().unit, DimensionUnit::AbsoluteTwips);
    }

    #[test]
    fn test_header_two_cell_rows_are_reversed() {
        let ctx = WalkContext::new(SectionKind::Header, None);
        let raw = RawTable {
            attrs: Attrs::default(),
            rows: vec![vec![text_cell("Info", "text-align: right"), text_cell("Logo", "text-align: center")]],
            text: "Info Logo".into(),
        };
        let blocks = build_table(raw, &ctx);
        let t = blocks[0].as_table().unwrap();
        assert_eq!(t.rows[0].cells[0].text(), "Logo");
        assert_eq!(t.rows[0].cells[0].horizontal_align, Alignment::Left);
        assert_eq!(t.rows[0].cells[1].text(), "Info");

        let raw = RawTable {
            attrs: Attrs::default(),
            rows: vec![vec![text_cell("Info", ""), text_cell("Logo", "")]],
            text: String::new(),
        };
        let blocks = build_table(raw, &body_ctx());
        assert_eq!(blocks[0].as_table().unwrap().rows[0].cells[0].text(), "Info");
    }

    #[test]
    fn test_rows_without_cells_dropped() {
        let raw = RawTable {
            attrs: Attrs::default(),
            rows: vec![vec![], vec![text_cell("a", "")]],
            text: "a".into(),
        };
        let blocks = build_table(raw, &body_ctx());
        assert_eq!(blocks[0].as_table().unwrap().rows.len(), 1);
    }

    #[test]
    fn test_no_rows_falls_back_to_text() {
        let raw = RawTable {
            attrs: Attrs::default(),
            rows: vec![vec![]],
            text: "stray text".into(),
        };
        let blocks = build_table(raw, &body_ctx());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].as_paragraph().unwrap().text(), "stray text");

        let raw = RawTable {
            attrs: Attrs::default(),
            rows: vec![],
            text: String::new(),
        };
        assert!(build_table(raw, &body_ctx()).is_empty());
    }

    #[test]
    fn test_th_context_is_bold() {
        let ctx = cell_context(&body_ctx(), "th", &Attrs::default());
        assert!(ctx.style.bold);
        assert!(ctx.in_table);
        assert!(!ctx.top_level);
    }
}
