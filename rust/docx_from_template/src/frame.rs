//! Framed `<div>` detection.
//!
//! Templates use plain divs for spacing. A div counts as a frame when it declares a border,
//! or a background together with enough padding or vertical margin. The thresholds below
//! were calibrated on the contract/invoice templates and are policy, not derived values.

use log::debug;

use crate::border::{has_background, margin_px, parse_border, parse_fill, parse_padding_twips, padding_px};
use crate::model::{Block, Cell, Dimension, DraftBlock, Paragraph, Row, Table, VerticalAlign};
use crate::style::parse_alignment;
use crate::walk::WalkContext;

// px
pub const FRAME_MIN_PADDING_PX: f64 = 5.0;
pub const FRAME_MIN_MARGIN_PX: f64 = 10.0;
pub const FRAME_DEFAULT_PADDING_PX: f64 = 5.0;

pub fn is_frame(style: &str) -> bool {
    if parse_border(style).is_some() {
        return true;
    }
    if !has_background(style) {
        return false;
    }
    let padded = padding_px(style).map(|p| p >= FRAME_MIN_PADDING_PX).unwrap_or(false);
    let spaced = margin_px(style).map(|m| m >= FRAME_MIN_MARGIN_PX).unwrap_or(false);
    padded || spaced
}

pub fn frame_context(ctx: &WalkContext, style: &str) -> WalkContext {
    ctx.nested(false).inherit(style, "div")
}

/// Wraps walked content into a one-row, one-cell table carrying the div's decoration.
pub fn build_frame(style: &str, content: Vec<DraftBlock>) -> DraftBlock {
    let alignment = parse_alignment(style).unwrap_or_default();
    let mut content = content;
    if content.is_empty() {
        content.push(Block::Paragraph(Paragraph::filler(alignment)));
    }
    let border = parse_border(style);
    debug!(
        "frame detected: border={} fill={} blocks={}",
        border.is_some(),
        has_background(style),
        content.len()
    );

    let cell = Cell {
        content,
        border: border.clone(),
        fill: parse_fill(style),
        width: None,
        vertical_align: VerticalAlign::Top,
        horizontal_align: alignment,
        padding_twips: parse_padding_twips(style, FRAME_DEFAULT_PADDING_PX),
    };
    Block::Frame(Table {
        rows: vec![Row { cells: vec![cell] }],
        width: Dimension::full_width(),
        border,
    })
}
