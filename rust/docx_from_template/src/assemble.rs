//! Composes the three processed sections and the page geometry into a [`Document`].

use crate::model::{Block, Document, Section, SectionKind};
use crate::options::PageGeometry;

/// The header, when present, goes on the first page only.
pub fn assemble(
    header: Vec<Block>,
    body: Vec<Block>,
    footer: Vec<Block>,
    geometry: &PageGeometry,
) -> Document {
    let (page_width_twips, page_height_twips) = geometry.page_size.twips();
    let first_page_header_only = !header.is_empty();
    Document {
        header: Section {
            kind: SectionKind::Header,
            blocks: header,
        },
        body: Section {
            kind: SectionKind::Body,
            blocks: body,
        },
        footer: Section {
            kind: SectionKind::Footer,
            blocks: footer,
        },
        page_width_twips,
        page_height_twips,
        margins: geometry.margins_twips(),
        first_page_header_only,
    }
}
