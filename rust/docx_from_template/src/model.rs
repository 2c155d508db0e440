//! Document model shared by the walkers, the assembler and the serializer.
//!
//! Blocks are generic over their image payload: walkers emit [`DraftBlock`]s whose
//! images are still unresolved [`ImageRequest`]s, and image resolution turns them
//! into final [`Block`]s carrying decoded bytes.

use serde::{Deserialize, Serialize};

use crate::image::ImageRequest;

/// 1 mm = 0.0393701 in = 56.6929 twips.
pub const TWIPS_PER_MM: f64 = 56.6929;
/// CSS pixel at 96 dpi.
pub const MM_PER_PX: f64 = 0.264583;
/// Output percentage widths are fiftieths of a percent.
pub const PCT_UNITS_PER_PERCENT: f64 = 50.0;

pub const A4_WIDTH_TWIPS: u32 = 11906;
pub const A4_HEIGHT_TWIPS: u32 = 16838;

pub fn mm_to_twips(mm: f64) -> u32 {
    (mm * TWIPS_PER_MM).round().max(0.0) as u32
}

pub fn px_to_twips(px: f64) -> u32 {
    mm_to_twips(px * MM_PER_PX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Header,
    #[serde(rename = "content")]
    Body,
    Footer,
}

impl SectionKind {
    pub fn default_font_family(self) -> &'static str {
        match self {
            SectionKind::Header | SectionKind::Footer => "Times New Roman",
            SectionKind::Body => "Arial",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Header => "header",
            SectionKind::Body => "content",
            SectionKind::Footer => "footer",
        }
    }
}

/// Run-level formatting. `None` fields are simply not written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleRecord {
    pub bold: bool,
    pub italic: bool,
    pub font_size_half_points: Option<u32>,
    pub color_hex: Option<String>,
    pub font_family: Option<String>,
}

impl StyleRecord {
    /// Merges a descendant's declared style over `self`; the descendant wins where it declares.
    pub fn overlay(&self, child: &StyleRecord) -> StyleRecord {
        StyleRecord {
            bold: self.bold || child.bold,
            italic: self.italic || child.italic,
            font_size_half_points: child.font_size_half_points.or(self.font_size_half_points),
            color_hex: child.color_hex.clone().or_else(|| self.color_hex.clone()),
            font_family: child.font_family.clone().or_else(|| self.font_family.clone()),
        }
    }

    pub fn with_bold(mut self) -> StyleRecord {
        self.bold = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderStyle {
    #[default]
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorderSpec {
    pub color_hex: String,
    /// Thickness as written to `w:sz`: `round(px * 8)`.
    pub size: u32,
    pub style: BorderStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub color_hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionUnit {
    Percentage,
    AbsoluteTwips,
}

/// Percentages are kept in `(0, 100]`, absolute values are positive twips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension {
    pub value: f64,
    pub unit: DimensionUnit,
}

impl Dimension {
    pub fn percent(value: f64) -> Option<Dimension> {
        if !(value > 0.0) {
            return None;
        }
        Some(Dimension {
            value: value.min(100.0),
            unit: DimensionUnit::Percentage,
        })
    }

    pub fn twips(value: u32) -> Option<Dimension> {
        if value == 0 {
            return None;
        }
        Some(Dimension {
            value: f64::from(value),
            unit: DimensionUnit::AbsoluteTwips,
        })
    }

    pub fn full_width() -> Dimension {
        Dimension {
            value: 100.0,
            unit: DimensionUnit::Percentage,
        }
    }

    /// `(w:w, w:type)` for table and cell widths.
    pub fn to_ooxml(self) -> (u32, &'static str) {
        match self.unit {
            DimensionUnit::Percentage => ((self.value * PCT_UNITS_PER_PERCENT).round() as u32, "pct"),
            DimensionUnit::AbsoluteTwips => (self.value.round() as u32, "dxa"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// `\n` marks a line break inside the paragraph.
    pub text: String,
    pub style: StyleRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub alignment: Alignment,
    pub heading_level: Option<u8>,
    /// Spacing after the paragraph in twips.
    pub spacing_after: Option<u32>,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>, alignment: Alignment) -> Self {
        Self {
            runs,
            alignment,
            heading_level: None,
            spacing_after: None,
        }
    }

    /// Single space run; keeps cells and frames from being literally empty.
    pub fn filler(alignment: Alignment) -> Self {
        Self::new(
            vec![Run {
                text: " ".to_string(),
                style: StyleRecord::default(),
            }],
            alignment,
        )
    }

    pub fn plain(text: &str, style: StyleRecord) -> Self {
        Self::new(
            vec![Run {
                text: text.to_string(),
                style,
            }],
            Alignment::Left,
        )
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Image formats the package can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Webp,
    Svg,
}

impl MediaKind {
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Png => "png",
            MediaKind::Jpeg => "jpeg",
            MediaKind::Gif => "gif",
            MediaKind::Bmp => "bmp",
            MediaKind::Tiff => "tiff",
            MediaKind::Webp => "webp",
            MediaKind::Svg => "svg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            MediaKind::Png => "image/png",
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Gif => "image/gif",
            MediaKind::Bmp => "image/bmp",
            MediaKind::Tiff => "image/tiff",
            MediaKind::Webp => "image/webp",
            MediaKind::Svg => "image/svg+xml",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    /// Never empty.
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
    pub width: u32,
    pub height: u32,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell<I = ImageBlock> {
    /// Never empty.
    pub content: Vec<Block<I>>,
    pub border: Option<BorderSpec>,
    pub fill: Option<Fill>,
    pub width: Option<Dimension>,
    pub vertical_align: VerticalAlign,
    pub horizontal_align: Alignment,
    pub padding_twips: u32,
}

impl<I> Cell<I> {
    pub fn text(&self) -> String {
        self.content.iter().map(Block::text).collect::<Vec<_>>().join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row<I = ImageBlock> {
    pub cells: Vec<Cell<I>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table<I = ImageBlock> {
    pub rows: Vec<Row<I>>,
    pub width: Dimension,
    pub border: Option<BorderSpec>,
}

impl<I> Table<I> {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block<I = ImageBlock> {
    Paragraph(Paragraph),
    Image(I),
    Table(Table<I>),
    /// A bordered or filled `<div>`, re-expressed as a one-cell table.
    Frame(Table<I>),
}

/// Walker output: images not fetched yet.
pub type DraftBlock = Block<ImageRequest>;

impl<I> Block<I> {
    /// Concatenated run text, cells separated by newlines. Images contribute nothing.
    pub fn text(&self) -> String {
        match self {
            Block::Paragraph(p) => p.text(),
            Block::Image(_) => String::new(),
            Block::Table(t) | Block::Frame(t) => t
                .rows
                .iter()
                .flat_map(|r| r.cells.iter())
                .map(Cell::text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table<I>> {
        match self {
            Block::Table(t) | Block::Frame(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Block::Image(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginsTwips {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub header: Section,
    pub body: Section,
    pub footer: Section,
    pub page_width_twips: u32,
    pub page_height_twips: u32,
    pub margins: MarginsTwips,
    pub first_page_header_only: bool,
}

impl Document {
    pub fn content_width_twips(&self) -> u32 {
        self.page_width_twips
            .saturating_sub(self.margins.left + self.margins.right)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_prefers_child() {
        let parent = StyleRecord {
            bold: true,
            font_size_half_points: Some(20),
            font_family: Some("Arial".into()),
            ..Default::default()
        };
        let child = StyleRecord {
            italic: true,
            font_size_half_points: Some(28),
            ..Default::default()
        };
        let merged = parent.overlay(&child);
        assert!(merged.bold);
        assert!(merged.italic);
        assert_eq!(merged.font_size_half_points, Some(28));
        assert_eq!(merged.font_family.as_deref(), Some("Arial"));
    }

    #[test]
    fn test_dimension_bounds() {
        assert!(Dimension::percent(0.0).is_none());
        assert_eq!(Dimension::percent(150.0).map(|d| d.value), Some(100.0));
        assert!(Dimension::twips(0).is_none());
        assert_eq!(Dimension::full_width().to_ooxml(), (5000, "pct"));
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(mm_to_twips(20.0), 1134);
        assert_eq!(mm_to_twips(210.0), 11905);
        assert_eq!(px_to_twips(200.0), (200.0_f64 * MM_PER_PX * TWIPS_PER_MM).round() as u32);
    }
}
