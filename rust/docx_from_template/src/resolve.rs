//! Turns walked drafts into final blocks by fetching their images.
//!
//! Images are fetched one at a time in document order, depth-first through tables and
//! frames, so the output order never depends on network timing.

use std::future::Future;
use std::pin::Pin;

use crate::image::{load_image, ImageFetcher, ImageRequest};
use crate::model::{Block, Cell, DraftBlock, Paragraph, Row, Table};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Resolves every image in `drafts`. Failed images disappear; a cell left empty by
/// that gets a single-space paragraph again.
pub fn resolve_blocks<'a, F: ImageFetcher + 'a>(
    drafts: Vec<DraftBlock>,
    fetcher: &'a F,
) -> BoxFuture<'a, Vec<Block>> {
    Box::pin(async move {
        let mut out = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match draft {
                Block::Paragraph(p) => out.push(Block::Paragraph(p)),
                Block::Image(request) => {
                    if let Some(image) = load_image(&request, fetcher).await {
                        out.push(Block::Image(image));
                    }
                }
                Block::Table(t) => out.push(Block::Table(resolve_table(t, fetcher).await)),
                Block::Frame(t) => out.push(Block::Frame(resolve_table(t, fetcher).await)),
            }
        }
        out
    })
}

async fn resolve_table<F: ImageFetcher>(table: Table<ImageRequest>, fetcher: &F) -> Table {
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in table.rows {
        let mut cells = Vec::with_capacity(row.cells.len());
        for cell in row.cells {
            let mut content = resolve_blocks(cell.content, fetcher).await;
            if content.is_empty() {
                content.push(Block::Paragraph(Paragraph::filler(cell.horizontal_align)));
            }
            cells.push(Cell {
                content,
                border: cell.border,
                fill: cell.fill,
                width: cell.width,
                vertical_align: cell.vertical_align,
                horizontal_align: cell.horizontal_align,
                padding_twips: cell.padding_twips,
            });
        }
        rows.push(Row { cells });
    }
    Table {
        rows,
        width: table.width,
        border: table.border,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::image::{ImageError, ImagePlacement};
    use crate::model::{Alignment, Dimension, VerticalAlign};

    /// Records requested URLs and serves a PNG signature for `ok` URLs.
    struct RecordingFetcher {
        seen: RefCell<Vec<String>>,
    }

    impl ImageFetcher for RecordingFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
            self.seen.borrow_mut().push(url.to_string());
            if url.contains("ok") {
                Ok(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
            } else {
                Err(ImageError::Status(500))
            }
        }
    }

    fn request(url: &str) -> DraftBlock {
        Block::Image(ImageRequest::new(url, "", None, None, ImagePlacement::Standalone, None))
    }

    fn cell(content: Vec<DraftBlock>) -> Cell<ImageRequest> {
        Cell {
            content,
            border: None,
            fill: None,
            width: None,
            vertical_align: VerticalAlign::Top,
            horizontal_align: Alignment::Center,
            padding_twips: 0,
        }
    }

    #[tokio::test]
    async fn test_sequential_document_order() {
        let fetcher = RecordingFetcher { seen: RefCell::new(Vec::new()) };
        let drafts = vec![
            request("https://x.test/ok-1"),
            Block::Table(Table {
                rows: vec![Row { cells: vec![cell(vec![request("https://x.test/ok-2")]), cell(vec![request("https://x.test/bad-3")])] }],
                width: Dimension::full_width(),
                border: None,
            }),
            Block::Paragraph(Paragraph::plain("text", Default::default())),
            request("https://x.test/bad-4"),
        ];
        let blocks = resolve_blocks(drafts, &fetcher).await;

        assert_eq!(
            *fetcher.seen.borrow(),
            vec![
                "https://x.test/ok-1",
                "https://x.test/ok-2",
                "https://x.test/bad-3",
                "https://x.test/bad-4"
            ]
        );
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].is_image());
        let t = blocks[1].as_table().unwrap();
        assert!(t.rows[0].cells[0].content[0].is_image());
        let filler = t.rows[0].cells[1].content[0].as_paragraph().unwrap();
        assert_eq!(filler.text(), " ");
        assert_eq!(filler.alignment, Alignment::Center);
        assert_eq!(blocks[2].text(), "text");
    }
}
