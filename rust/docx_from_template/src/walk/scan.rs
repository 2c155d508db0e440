//! Markup-scanning walker for when no DOM is available.
//!
//! Works in three passes over one fragment:
//! 1. tables and framed divs are located by balanced-tag scanning, walked recursively and
//!    replaced by block tokens;
//! 2. remaining `<img>` tags are replaced by image tokens, skipping any offset
//!    already consumed by a nested walk;
//! 3. a small tag state machine turns what is left into paragraphs, expanding tokens in place.
//!
//! Omitted `</td>`, `</th>` and `</tr>` are implied by the next sibling or the enclosing end tag,
//! and an unterminated table or framed div runs to the end of the fragment. Unlike the tree
//! walker, a table inside `<p>` does not split the paragraph's closing tag into a new empty
//! paragraph.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};

use super::{heading_level, is_block_boundary, Attrs, BlockWalker, ParagraphBuilder, WalkContext};
use crate::frame;
use crate::image::{ImagePlacement, ImageRequest};
use crate::model::{Block, DraftBlock};
use crate::table::{self, RawCell, RawTable};
use crate::text::{blank_skipped, decode_entities, preview, strip_tags};

lazy_static! {
    static ref TAG_RE: Regex =
        Regex::new(r#"(?s)<(/?)([a-zA-Z][a-zA-Z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap();
    static ref TAG_AT_RE: Regex =
        Regex::new(r#"(?s)^<(/?)([a-zA-Z][a-zA-Z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap();
    static ref ATTR_RE: Regex = Regex::new(
        r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#
    )
    .unwrap();
    static ref REGION_START_RE: Regex = Regex::new(r"(?i)<(table|div)\b").unwrap();
    static ref IMG_RE: Regex = Regex::new(r#"(?is)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).unwrap();
    static ref TOKEN_RE: Regex = Regex::new(r"\x{E000}(BLOCK|IMAGE)_(\d+)\x{E001}").unwrap();
}

const VOID_TAGS: [&str; 12] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanWalker;

impl BlockWalker for ScanWalker {
    fn walk(&self, html: &str, ctx: &WalkContext) -> Vec<DraftBlock> {
        let blanked = blank_skipped(html);
        let mut consumed = BTreeSet::new();
        walk_fragment(&blanked, 0, ctx, &mut consumed)
    }
}

#[derive(Debug, Clone)]
struct TagToken {
    closing: bool,
    self_closing: bool,
    name: String,
    attrs: Attrs,
    start: usize,
    end: usize,
}

fn parse_attrs(src: &str) -> Attrs {
    let pairs = ATTR_RE
        .captures_iter(src)
        .map(|c| {
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (c[1].to_string(), value)
        })
        .collect();
    Attrs::new(pairs)
}

fn token_from(caps: &Captures, offset: usize) -> TagToken {
    let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
    let raw_attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    TagToken {
        closing: !caps[1].is_empty(),
        self_closing: raw_attrs.trim_end().ends_with('/'),
        name: caps[2].to_ascii_lowercase(),
        attrs: parse_attrs(raw_attrs.trim_end().trim_end_matches('/')),
        start: offset + whole.0,
        end: offset + whole.1,
    }
}

/// The tag starting exactly at `pos`, if any.
fn tag_at(html: &str, pos: usize) -> Option<TagToken> {
    let caps = TAG_AT_RE.captures(&html[pos..])?;
    Some(token_from(&caps, pos))
}

fn tags_from(html: &str, from: usize) -> impl Iterator<Item = TagToken> + '_ {
    TAG_RE
        .captures_iter(&html[from..])
        .map(move |c| token_from(&c, from))
}

/// Finds the tag closing an element whose opening tag ends at `from`.
/// `group` lists names that nest with each other (`td`/`th`). Returns `(close_start, close_end)`.
fn find_balanced(html: &str, from: usize, group: &[&str]) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    for tag in tags_from(html, from) {
        if !group.contains(&tag.name.as_str()) {
            continue;
        }
        if tag.closing {
            depth -= 1;
            if depth == 0 {
                return Some((tag.start, tag.end));
            }
        } else if !tag.self_closing {
            depth += 1;
        }
    }
    None
}

#[derive(Debug, Clone)]
struct Element {
    attrs: Attrs,
    start: usize,
    inner_start: usize,
    inner_end: usize,
    end: usize,
}

/// End of an element whose closing tag may be omitted, as `(inner_end, end)`.
/// A sibling opening from `names` or a closing tag from `stops` ends it implicitly.
fn find_implied_end(html: &str, from: usize, names: &[&str], stops: &[&str]) -> (usize, usize) {
    let mut pos = from;
    while let Some(tag) = tags_from(html, pos).next() {
        let name = tag.name.as_str();
        if name == "table" && !tag.closing {
            pos = find_balanced(html, tag.end, &["table"]).map(|(_, end)| end).unwrap_or(html.len());
        } else if names.contains(&name) {
            return if tag.closing { (tag.start, tag.end) } else { (tag.start, tag.start) };
        } else if tag.closing && stops.contains(&name) {
            return (tag.start, tag.start);
        } else {
            pos = tag.end;
        }
    }
    (html.len(), html.len())
}

/// Direct `names` elements of `html`, skipping over nested tables.
fn find_children(html: &str, names: &[&str], stops: &[&str]) -> Vec<(String, Element)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < html.len() {
        let Some(tag) = tags_from(html, pos).find(|t| !t.closing) else { break };
        if names.contains(&tag.name.as_str()) {
            let (inner_end, end) = find_implied_end(html, tag.end, names, stops);
            out.push((
                tag.name.clone(),
                Element {
                    attrs: tag.attrs,
                    start: tag.start,
                    inner_start: tag.end,
                    inner_end,
                    end,
                },
            ));
            pos = end;
        } else if tag.name == "table" {
            pos = find_balanced(html, tag.end, &["table"]).map(|(_, end)| end).unwrap_or(tag.end);
        } else {
            pos = tag.end;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    Table,
    Frame,
}

#[derive(Debug, Clone)]
struct Region {
    kind: RegionKind,
    element: Element,
}

/// Tables and framed divs at this level, left to right.
/// A missing end tag closes the region at the end of `html`; plain divs stay in the text.
fn find_regions(html: &str) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut pos = 0;
    while let Some(m) = REGION_START_RE.find_at(html, pos) {
        let Some(tag) = tag_at(html, m.start()) else {
            pos = m.end();
            continue;
        };
        let kind = if tag.name == "table" {
            Some(RegionKind::Table)
        } else if tag.name == "div" && frame::is_frame(tag.attrs.style()) {
            Some(RegionKind::Frame)
        } else {
            None
        };

        let balanced = match kind {
            Some(_) if !tag.self_closing => Some(
                find_balanced(html, tag.end, &[tag.name.as_str()]).unwrap_or_else(|| {
                    debug!("unterminated <{}> closed at end of fragment", tag.name);
                    (html.len(), html.len())
                }),
            ),
            _ => None,
        };
        match (kind, balanced) {
            (Some(kind), Some((inner_end, end))) => {
                regions.push(Region {
                    kind,
                    element: Element {
                        attrs: tag.attrs,
                        start: tag.start,
                        inner_start: tag.end,
                        inner_end,
                        end,
                    },
                });
                pos = end;
            }
            _ => pos = tag.end,
        }
    }
    regions
}

fn walk_table(
    html: &str,
    el: &Element,
    base: usize,
    ctx: &WalkContext,
    consumed: &mut BTreeSet<usize>,
) -> Vec<DraftBlock> {
    let inner = &html[el.inner_start..el.inner_end];
    let inner_base = base + el.inner_start;

    let mut rows = Vec::new();
    for (_, tr) in find_children(inner, &["tr"], &["thead", "tbody", "tfoot"]) {
        let row_html = &inner[tr.inner_start..tr.inner_end];
        let row_base = inner_base + tr.inner_start;
        let mut cells = Vec::new();
        for (tag, td) in find_children(row_html, &["td", "th"], &["tr"]) {
            let cell_ctx = table::cell_context(ctx, &tag, &td.attrs);
            let content = walk_fragment(
                &row_html[td.inner_start..td.inner_end],
                row_base + td.inner_start,
                &cell_ctx,
                consumed,
            );
            cells.push(RawCell {
                attrs: td.attrs,
                content,
            });
        }
        rows.push(cells);
    }

    table::build_table(
        RawTable {
            attrs: el.attrs.clone(),
            rows,
            text: strip_tags(inner),
        },
        ctx,
    )
}

fn walk_region(
    html: &str,
    region: &Region,
    base: usize,
    ctx: &WalkContext,
    consumed: &mut BTreeSet<usize>,
) -> Vec<DraftBlock> {
    let el = &region.element;
    match region.kind {
        RegionKind::Table => walk_table(html, el, base, ctx, consumed),
        RegionKind::Frame => {
            let style = el.attrs.style();
            let inner_ctx = frame::frame_context(ctx, style);
            let content = walk_fragment(
                &html[el.inner_start..el.inner_end],
                base + el.inner_start,
                &inner_ctx,
                consumed,
            );
            vec![frame::build_frame(style, content)]
        }
    }
}

// Private-use delimiters: markup text, decoded or not, never forms a token.
fn token(kind: &str, idx: usize) -> String {
    format!("\u{E000}{kind}_{idx}\u{E001}")
}

/// Splices `(start, end, replacement)` edits, sorted and non-overlapping, into `html`.
fn apply_edits(html: &str, edits: &[(usize, usize, String)]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    for (start, end, replacement) in edits {
        out.push_str(&html[pos..*start]);
        out.push_str(replacement);
        pos = *end;
    }
    out.push_str(&html[pos..]);
    out
}

fn walk_fragment(
    html: &str,
    base: usize,
    ctx: &WalkContext,
    consumed: &mut BTreeSet<usize>,
) -> Vec<DraftBlock> {
    let regions = find_regions(html);
    let mut region_blocks: Vec<Vec<DraftBlock>> = Vec::with_capacity(regions.len());
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    for (i, region) in regions.iter().enumerate() {
        region_blocks.push(walk_region(html, region, base, ctx, consumed));
        edits.push((region.element.start, region.element.end, token("BLOCK", i)));
    }

    let mut images: Vec<(usize, Attrs)> = Vec::new();
    for m in IMG_RE.find_iter(html) {
        let abs = base + m.start();
        let in_region = regions
            .iter()
            .any(|r| m.start() >= r.element.start && m.start() < r.element.end);
        if in_region || consumed.contains(&abs) {
            continue;
        }
        let attrs = tag_at(html, m.start()).map(|t| t.attrs).unwrap_or_default();
        if ctx.drops_images() {
            debug!(
                "header image outside a table skipped: {}",
                preview(attrs.get("src").unwrap_or(""))
            );
            edits.push((m.start(), m.end(), String::new()));
            continue;
        }
        edits.push((m.start(), m.end(), token("IMAGE", images.len())));
        images.push((abs, attrs));
    }
    edits.sort_by_key(|e| e.0);

    let text_html = apply_edits(html, &edits);
    let mut scan = TextScan::new(ctx);
    scan.run(&text_html, &mut region_blocks, &images, consumed);
    scan.finish()
}

/// Tag state machine over markup whose tables, frames and images are tokens.
struct TextScan<'a> {
    root: &'a WalkContext,
    stack: Vec<(String, WalkContext)>,
    blocks: Vec<DraftBlock>,
    current: ParagraphBuilder,
}

fn top<'b>(stack: &'b [(String, WalkContext)], root: &'b WalkContext) -> &'b WalkContext {
    stack.last().map(|(_, c)| c).unwrap_or(root)
}

impl<'a> TextScan<'a> {
    fn new(root: &'a WalkContext) -> Self {
        let current = ParagraphBuilder::for_context(root);
        Self {
            root,
            stack: Vec::new(),
            blocks: Vec::new(),
            current,
        }
    }

    fn run(
        &mut self,
        html: &str,
        region_blocks: &mut [Vec<DraftBlock>],
        images: &[(usize, Attrs)],
        consumed: &mut BTreeSet<usize>,
    ) {
        let mut pos = 0;
        while pos < html.len() {
            let Some(rel) = html[pos..].find('<') else {
                self.text(&html[pos..], region_blocks, images, consumed);
                break;
            };
            let lt = pos + rel;
            if lt > pos {
                self.text(&html[pos..lt], region_blocks, images, consumed);
            }
            match tag_at(html, lt) {
                Some(tag) => {
                    pos = tag.end;
                    self.tag(tag);
                }
                None => {
                    self.text("<", region_blocks, images, consumed);
                    pos = lt + 1;
                }
            }
        }
    }

    fn text(
        &mut self,
        chunk: &str,
        region_blocks: &mut [Vec<DraftBlock>],
        images: &[(usize, Attrs)],
        consumed: &mut BTreeSet<usize>,
    ) {
        let mut last = 0;
        for caps in TOKEN_RE.captures_iter(chunk) {
            let Some(m) = caps.get(0) else { continue };
            let idx: usize = caps[2].parse().unwrap_or(usize::MAX);
            let known = match &caps[1] {
                "BLOCK" => idx < region_blocks.len(),
                _ => idx < images.len(),
            };
            if !known {
                continue;
            }

            let ctx = top(&self.stack, self.root);
            self.current.push_text(&decode_entities(&chunk[last..m.start()]), ctx);
            last = m.end();

            if &caps[1] == "BLOCK" {
                self.current.flush(&mut self.blocks);
                self.blocks.append(&mut region_blocks[idx]);
            } else {
                let (abs, attrs) = &images[idx];
                if !consumed.insert(*abs) {
                    continue;
                }
                self.current.break_for_image(&mut self.blocks);
                self.blocks.push(Block::Image(image_request(attrs, ctx)));
            }
        }
        let ctx = top(&self.stack, self.root);
        self.current.push_text(&decode_entities(&chunk[last..]), ctx);
    }

    /// Pops the innermost open `name` and everything above it.
    fn close(&mut self, name: &str) -> bool {
        match self.stack.iter().rposition(|(n, _)| n == name) {
            Some(idx) => {
                self.stack.truncate(idx);
                true
            }
            None => false,
        }
    }

    /// Block-level openings implicitly end an open `<p>`.
    fn close_open_paragraph(&mut self) {
        if self.stack.iter().any(|(n, _)| n == "p") {
            self.current.flush(&mut self.blocks);
            self.close("p");
        }
    }

    fn tag(&mut self, tag: TagToken) {
        let name = tag.name.as_str();
        let is_block = name == "p" || heading_level(name).is_some() || is_block_boundary(name);

        if tag.closing {
            if is_block {
                if self.stack.iter().any(|(n, _)| n == name) {
                    self.current.flush(&mut self.blocks);
                    self.close(name);
                }
            } else {
                self.close(name);
            }
            return;
        }

        match name {
            "head" | "title" | "meta" | "link" => {}
            "br" => {
                let ctx = top(&self.stack, self.root);
                self.current.line_break(ctx);
            }
            "hr" => {
                self.close_open_paragraph();
                self.current.flush(&mut self.blocks);
            }
            _ if VOID_TAGS.contains(&name) => {}
            _ if is_block => {
                self.close_open_paragraph();
                let inner = top(&self.stack, self.root).inherit(tag.attrs.style(), name);
                if name == "p" {
                    self.current.begin(&mut self.blocks, &inner, None, true);
                } else if let Some(level) = heading_level(name) {
                    self.current.begin(&mut self.blocks, &inner, Some(level), false);
                } else {
                    self.current.flush(&mut self.blocks);
                }
                if tag.self_closing {
                    self.current.flush(&mut self.blocks);
                } else {
                    self.stack.push((name.to_string(), inner));
                }
            }
            _ => {
                if !tag.self_closing {
                    let inner = top(&self.stack, self.root).inherit(tag.attrs.style(), name);
                    self.stack.push((name.to_string(), inner));
                }
            }
        }
    }

    fn finish(mut self) -> Vec<DraftBlock> {
        self.current.flush(&mut self.blocks);
        self.blocks
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
