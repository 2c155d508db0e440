//! Block walking: turning one HTML fragment into an ordered stream of draft blocks.
//!
//! Two interchangeable strategies implement [`BlockWalker`]: [`tree::TreeWalker`] walks an
//! html5ever DOM, [`scan::ScanWalker`] scans the raw markup. Both feed the same
//! [`ParagraphBuilder`], so paragraph boundaries and whitespace handling agree.

pub mod scan;
pub mod tree;

use serde::{Deserialize, Serialize};

use crate::model::{Alignment, Block, DraftBlock, Paragraph, Run, SectionKind, StyleRecord};
use crate::style::{base_style, declared_style, parse_alignment};
use crate::text::collapse_ws;

/// Spacing after headings and standalone images, in twips.
pub const HEADING_SPACING_AFTER: u32 = 200;
/// Spacing after body paragraphs, in twips.
pub const PARAGRAPH_SPACING_AFTER: u32 = 100;

pub const DEFAULT_FONT_SIZE_PT: f32 = 10.0;

/// Which walker to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Tree,
    Scan,
}

impl Strategy {
    pub fn walk(self, html: &str, ctx: &WalkContext) -> Vec<DraftBlock> {
        match self {
            Strategy::Tree => tree::TreeWalker.walk(html, ctx),
            Strategy::Scan => scan::ScanWalker.walk(html, ctx),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" => Ok(Strategy::Tree),
            "scan" => Ok(Strategy::Scan),
            other => Err(anyhow::anyhow!("unknown strategy: {other}")),
        }
    }
}

pub trait BlockWalker {
    fn walk(&self, html: &str, ctx: &WalkContext) -> Vec<DraftBlock>;
}

/// Inherited state while descending through elements.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkContext {
    pub section: SectionKind,
    /// Run style accumulated from the section root down to the current element.
    pub style: StyleRecord,
    /// Nearest declared `text-align`.
    pub alignment: Option<Alignment>,
    pub in_table: bool,
    /// False inside cells and frames.
    pub top_level: bool,
    pub default_font_pt: Option<f32>,
}

impl WalkContext {
    pub fn new(section: SectionKind, default_font_pt: Option<f32>) -> Self {
        Self {
            section,
            style: base_style(section, default_font_pt),
            alignment: None,
            in_table: false,
            top_level: true,
            default_font_pt,
        }
    }

    /// Context for the children of an element with the given `style` and tag.
    pub fn inherit(&self, style: &str, tag: &str) -> Self {
        let mut next = self.clone();
        next.style = self.style.overlay(&declared_style(style, tag));
        if let Some(a) = parse_alignment(style) {
            next.alignment = Some(a);
        }
        next
    }

    pub fn nested(&self, in_table: bool) -> Self {
        let mut next = self.clone();
        next.in_table = self.in_table || in_table;
        next.top_level = false;
        next
    }

    pub fn is_header(&self) -> bool {
        self.section == SectionKind::Header
    }

    /// Header images only survive inside tables.
    pub fn drops_images(&self) -> bool {
        self.is_header() && !self.in_table
    }

    fn paragraph_spacing(&self, heading: bool) -> Option<u32> {
        if self.in_table {
            None
        } else if heading {
            Some(HEADING_SPACING_AFTER)
        } else {
            Some(PARAGRAPH_SPACING_AFTER)
        }
    }
}

/// Element attributes, names lowercased, first occurrence kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrs(Vec<(String, String)>);

impl Attrs {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        let mut out: Vec<(String, String)> = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            let k = k.to_ascii_lowercase();
            if !out.iter().any(|(seen, _)| *seen == k) {
                out.push((k, v));
            }
        }
        Attrs(out)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn style(&self) -> &str {
        self.get("style").unwrap_or("")
    }
}

/// Tags that end the current paragraph without starting an explicit one.
pub fn is_block_boundary(tag: &str) -> bool {
    matches!(
        tag,
        "div" | "li" | "ul" | "ol" | "blockquote" | "pre" | "h4" | "h5" | "h6" | "table" | "thead"
            | "tbody" | "tfoot" | "tr" | "td" | "th" | "section" | "article" | "header" | "footer"
    )
}

pub fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        _ => None,
    }
}

/// Accumulates runs of the paragraph being built and decides when one is emitted.
///
/// An explicit paragraph (`<p>`) is emitted even when empty. Implicit ones (loose text,
/// headings) are emitted only with content.
#[derive(Debug, Default)]
pub struct ParagraphBuilder {
    runs: Vec<Run>,
    alignment: Alignment,
    heading: Option<u8>,
    explicit: bool,
    /// Opened by `<p>` or `<h1-3>`; stays set across image breaks until the next flush.
    tagged: bool,
    spacing_after: Option<u32>,
    heuristic: Option<HeadingHeuristic>,
}

/// Promotion of loose caps/numbered lines to headings.
#[derive(Debug, Clone, Copy)]
struct HeadingHeuristic {
    size_half_points: u32,
    /// Runs still at the section's default size get `size_half_points`; declared sizes stay.
    default_size: Option<u32>,
}

impl ParagraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for a flow walked in `ctx`. Only top-level body text gets the heading heuristic.
    pub fn for_context(ctx: &WalkContext) -> Self {
        if !ctx.top_level || ctx.section != SectionKind::Body {
            return Self::new();
        }
        Self {
            heuristic: Some(HeadingHeuristic {
                size_half_points: heuristic_heading_size(ctx.default_font_pt),
                default_size: ctx.style.font_size_half_points,
            }),
            ..Self::default()
        }
    }

    fn has_content(&self) -> bool {
        self.runs
            .iter()
            .any(|r| r.text.contains('\n') || !r.text.trim().is_empty())
    }

    fn is_blank(&self) -> bool {
        self.runs.is_empty() && !self.explicit && self.heading.is_none()
    }

    /// Ends the current paragraph and opens a new one.
    pub fn begin(
        &mut self,
        blocks: &mut Vec<DraftBlock>,
        ctx: &WalkContext,
        heading: Option<u8>,
        explicit: bool,
    ) {
        self.flush(blocks);
        self.alignment = ctx.alignment.unwrap_or_default();
        self.heading = heading;
        self.explicit = explicit;
        self.tagged = explicit || heading.is_some();
        self.spacing_after = ctx.paragraph_spacing(heading.is_some());
    }

    pub fn push_text(&mut self, raw: &str, ctx: &WalkContext) {
        if raw.is_empty() {
            return;
        }
        if self.is_blank() {
            self.alignment = ctx.alignment.unwrap_or_default();
            self.spacing_after = ctx.paragraph_spacing(false);
        }

        let mut text = collapse_ws(raw);
        let at_line_start = self
            .runs
            .last()
            .map(|r| r.text.ends_with(' ') || r.text.ends_with('\n'))
            .unwrap_or(true);
        if at_line_start {
            text = text.trim_start().to_string();
        }
        if text.is_empty() {
            return;
        }

        match self.runs.last_mut() {
            Some(last) if last.style == ctx.style && !last.text.ends_with('\n') => {
                last.text.push_str(&text)
            }
            _ => self.runs.push(Run {
                text,
                style: ctx.style.clone(),
            }),
        }
    }

    pub fn line_break(&mut self, ctx: &WalkContext) {
        if self.is_blank() {
            self.alignment = ctx.alignment.unwrap_or_default();
            self.spacing_after = ctx.paragraph_spacing(false);
        }
        if let Some(last) = self.runs.last_mut() {
            let trimmed = last.text.trim_end_matches(' ').len();
            last.text.truncate(trimmed);
        }
        self.runs.push(Run {
            text: "\n".to_string(),
            style: ctx.style.clone(),
        });
    }

    /// Flushes before a block-level image. A `<p>` holding only the image
    /// does not leave an empty paragraph behind.
    pub fn break_for_image(&mut self, blocks: &mut Vec<DraftBlock>) {
        let tagged = self.tagged;
        if self.has_content() {
            self.flush(blocks);
        } else {
            self.runs.clear();
            self.heading = None;
        }
        self.explicit = false;
        self.tagged = tagged;
    }

    pub fn flush(&mut self, blocks: &mut Vec<DraftBlock>) {
        while let Some(last) = self.runs.last_mut() {
            let trimmed = last.text.trim_end_matches(' ').len();
            last.text.truncate(trimmed);
            if last.text.is_empty() {
                self.runs.pop();
            } else {
                break;
            }
        }

        if self.has_content() || self.explicit {
            let mut runs = std::mem::take(&mut self.runs);
            let mut heading = self.heading;
            let mut spacing_after = self.spacing_after;

            if let (None, false, Some(h)) = (heading, self.tagged, self.heuristic) {
                let text: String = runs.iter().map(|r| r.text.as_str()).collect();
                if looks_like_heading(&text) {
                    heading = Some(1);
                    spacing_after = spacing_after.map(|_| HEADING_SPACING_AFTER);
                    for run in runs.iter_mut() {
                        run.style.bold = true;
                        if run.style.font_size_half_points == h.default_size {
                            run.style.font_size_half_points = Some(h.size_half_points);
                        }
                    }
                }
            }

            blocks.push(Block::Paragraph(Paragraph {
                runs,
                alignment: self.alignment,
                heading_level: heading,
                spacing_after,
            }));
        }

        self.runs.clear();
        self.alignment = Alignment::Left;
        self.heading = None;
        self.explicit = false;
        self.tagged = false;
        self.spacing_after = None;
    }
}

/// Short lines that are all caps, or numbered like `2. TERMS`.
pub fn looks_like_heading(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.chars().count() >= 80 || text.contains('\n') {
        return false;
    }
    let has_upper = text.chars().any(char::is_uppercase);
    let has_lower = text.chars().any(char::is_lowercase);
    if has_upper && !has_lower {
        return true;
    }

    let mut chars = text.chars().peekable();
    let mut saw_digit = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            saw_digit = true;
        } else if c != '.' && !c.is_whitespace() {
            break;
        }
        chars.next();
    }
    saw_digit && chars.next().map(char::is_uppercase).unwrap_or(false)
}

/// Heading size in half-points for lines promoted by the heuristic.
pub fn heuristic_heading_size(default_font_pt: Option<f32>) -> u32 {
    let pt = default_font_pt.unwrap_or(DEFAULT_FONT_SIZE_PT);
    (f64::from(pt) * 1.6 * 2.0).round() as u32
}
