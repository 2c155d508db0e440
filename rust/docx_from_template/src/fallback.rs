//! Degradation chain keeping a section from vanishing:
//! structured blocks, then plain-text paragraphs, then a fixed placeholder (body only).

use log::warn;

use crate::model::{Block, Paragraph, SectionKind, StyleRecord};
use crate::text::strip_tags;

pub const PLACEHOLDER_TEXT: &str = "Generated document";
/// Longest plain-text paragraph, in characters.
pub const PLAIN_TEXT_CHUNK_CHARS: usize = 500;

/// Which tier produced a section's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    Structured,
    PlainText,
    Placeholder,
    /// Nothing usable; the section is left out.
    Omitted,
}

pub fn try_structured_blocks(blocks: Vec<Block>) -> Option<Vec<Block>> {
    if blocks.is_empty() {
        None
    } else {
        Some(blocks)
    }
}

/// The fragment's visible text as paragraphs of at most [`PLAIN_TEXT_CHUNK_CHARS`] characters.
pub fn try_plain_text_paragraphs(html: &str, style: &StyleRecord) -> Option<Vec<Block>> {
    let text = strip_tags(html);
    if text.is_empty() {
        return None;
    }
    let chars: Vec<char> = text.chars().collect();
    let blocks = chars
        .chunks(PLAIN_TEXT_CHUNK_CHARS)
        .map(|chunk| {
            let s: String = chunk.iter().collect();
            Block::Paragraph(Paragraph::plain(s.trim(), style.clone()))
        })
        .collect();
    Some(blocks)
}

pub fn fixed_placeholder(style: &StyleRecord) -> Vec<Block> {
    vec![Block::Paragraph(Paragraph::plain(PLACEHOLDER_TEXT, style.clone()))]
}

/// Runs the chain for one section. Header and footer stop before the placeholder tier.
pub fn ensure_content(
    kind: SectionKind,
    blocks: Vec<Block>,
    html: &str,
    style: &StyleRecord,
) -> (Vec<Block>, FallbackTier) {
    if let Some(blocks) = try_structured_blocks(blocks) {
        return (blocks, FallbackTier::Structured);
    }
    if let Some(blocks) = try_plain_text_paragraphs(html, style) {
        warn!("{} produced no blocks, using its plain text", kind.name());
        return (blocks, FallbackTier::PlainText);
    }
    match kind {
        SectionKind::Body => {
            warn!("content is empty, using the placeholder paragraph");
            (fixed_placeholder(style), FallbackTier::Placeholder)
        }
        SectionKind::Header | SectionKind::Footer => (Vec::new(), FallbackTier::Omitted),
    }
}
