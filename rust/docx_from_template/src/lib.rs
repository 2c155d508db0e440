//! Renders header, body and footer HTML fragments into a `.docx` document.
//!
//! Each fragment is walked into draft blocks, its images are fetched, then the three
//! sections are assembled with the page geometry and packaged as WordprocessingML.

pub mod assemble;
pub mod border;
pub mod docx;
pub mod fallback;
pub mod frame;
pub mod image;
pub mod model;
pub mod options;
pub mod resolve;
pub mod style;
pub mod table;
pub mod text;
pub mod walk;

use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};

pub use crate::assemble::assemble;
pub use crate::docx::write_docx;
pub use crate::image::{HttpFetcher, ImageFetcher, OfflineFetcher};
pub use crate::model::{Block, Document, SectionKind};
pub use crate::options::{PageGeometry, RenderOptions};
pub use crate::walk::{Strategy, WalkContext};

/// The three template fragments. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateInput {
    pub header: String,
    #[serde(alias = "content")]
    pub body: String,
    pub footer: String,
}

/// Walks, resolves and, when nothing survives, degrades one section.
pub async fn render_section<F: ImageFetcher>(
    kind: SectionKind,
    html: &str,
    options: &RenderOptions,
    fetcher: &F,
) -> Vec<Block> {
    let ctx = WalkContext::new(kind, Some(options.section_font_pt(kind)));
    let blocks = if html.trim().is_empty() {
        Vec::new()
    } else {
        let drafts = options.strategy.walk(html, &ctx);
        resolve::resolve_blocks(drafts, fetcher).await
    };
    let (blocks, _tier) = fallback::ensure_content(kind, blocks, html, &ctx.style);
    blocks
}

/// Builds the document model without serializing it.
pub async fn build_document<F: ImageFetcher>(
    input: &TemplateInput,
    options: &RenderOptions,
    fetcher: &F,
) -> Document {
    let header = render_section(SectionKind::Header, &input.header, options, fetcher).await;
    let body = render_section(SectionKind::Body, &input.body, options, fetcher).await;
    let footer = render_section(SectionKind::Footer, &input.footer, options, fetcher).await;
    info!(
        "rendered sections: header={} body={} footer={} blocks ({:?} strategy)",
        header.len(),
        body.len(),
        footer.len(),
        options.strategy
    );
    assemble(header, body, footer, &options.geometry)
}

/// Renders the fragments straight to `.docx` bytes.
pub async fn render_docx<F: ImageFetcher>(
    input: &TemplateInput,
    options: &RenderOptions,
    fetcher: &F,
) -> Result<Vec<u8>> {
    let document = build_document(input, options, fetcher).await;
    write_docx(&document)
}
