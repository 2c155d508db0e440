//! WordprocessingML serialization and zip packaging.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::model::{
    Alignment, Block, BorderSpec, Cell, Document, ImageBlock, MediaKind, Paragraph, Run, StyleRecord,
    Table, VerticalAlign,
};
use crate::text::xml_escape_text;

/// EMU per CSS pixel at 96 dpi.
const EMU_PER_PX: u64 = 9525;
/// Header/footer distance from the page edge, in twips.
const HEADER_FOOTER_DISTANCE: u32 = 708;

const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_HEADER: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const REL_FOOTER: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const CT_HEADER: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml";
const CT_FOOTER: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml";

const NAMESPACES: &str = r#"xmlns:wpc="http://schemas.microsoft.com/office/word/2010/wordprocessingCanvas"
 xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"
 xmlns:o="urn:schemas-microsoft-com:office:office"
 xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
 xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math"
 xmlns:v="urn:schemas-microsoft-com:vml"
 xmlns:wp14="http://schemas.microsoft.com/office/word/2010/wordprocessingDrawing"
 xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"
 xmlns:w10="urn:schemas-microsoft-com:office:word"
 xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
 xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordprocessingml"
 xmlns:w15="http://schemas.microsoft.com/office/word/2012/wordprocessingml"
 xmlns:wpg="http://schemas.microsoft.com/office/word/2010/wordprocessingGroup"
 xmlns:wpi="http://schemas.microsoft.com/office/word/2010/wordprocessingInk"
 xmlns:wne="http://schemas.microsoft.com/office/word/2006/wordml"
 xmlns:wps="http://schemas.microsoft.com/office/word/2010/wordprocessingShape"
 xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
 xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"
 mc:Ignorable="w14 w15 wp14""#;

/// Relationships of one package part (`document.xml`, a header, a footer).
#[derive(Debug, Default)]
struct PartRels {
    rels: Vec<(String, &'static str, String)>,
}

impl PartRels {
    fn add(&mut self, rel_type: &'static str, target: &str) -> String {
        let id = format!("rId{}", self.rels.len() + 1);
        self.rels.push((id.clone(), rel_type, target.to_string()));
        id
    }

    fn xml(&self) -> String {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
        out.push('\n');
        for (id, rel_type, target) in &self.rels {
            out.push_str(&format!(
                r#"  <Relationship Id="{id}" Type="{rel_type}" Target="{target}"/>"#,
                target = xml_escape_text(target),
            ));
            out.push('\n');
        }
        out.push_str("</Relationships>");
        out
    }
}

struct MediaPart {
    name: String,
    kind: MediaKind,
    bytes: Vec<u8>,
}

/// A serialized part plus the relationships it needs.
struct Part {
    path: String,
    content_type: &'static str,
    xml: String,
    rels: PartRels,
}

/// Package-wide state: embedded media and drawing ids.
#[derive(Default)]
struct PackageWriter {
    media: Vec<MediaPart>,
    next_doc_pr: u32,
}

fn alignment_val(a: Alignment) -> &'static str {
    match a {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justified => "both",
    }
}

fn vertical_val(v: VerticalAlign) -> &'static str {
    match v {
        VerticalAlign::Top => "top",
        VerticalAlign::Center => "center",
        VerticalAlign::Bottom => "bottom",
    }
}

fn run_properties_xml(style: &StyleRecord) -> String {
    let mut out = String::new();
    if let Some(font) = &style.font_family {
        let font = xml_escape_text(font);
        out.push_str(&format!(
            "<w:rFonts w:ascii=\"{font}\" w:hAnsi=\"{font}\" w:cs=\"{font}\"/>"
        ));
    }
    if style.bold {
        out.push_str("<w:b/>");
    }
    if style.italic {
        out.push_str("<w:i/>");
    }
    if let Some(color) = &style.color_hex {
        out.push_str(&format!("<w:color w:val=\"{}\"/>", xml_escape_text(color)));
    }
    if let Some(sz) = style.font_size_half_points {
        out.push_str(&format!("<w:sz w:val=\"{sz}\"/><w:szCs w:val=\"{sz}\"/>"));
    }
    if out.is_empty() {
        out
    } else {
        format!("<w:rPr>{out}</w:rPr>")
    }
}

fn run_xml(run: &Run) -> String {
    if run.text.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    out.push_str("<w:r>");
    out.push_str(&run_properties_xml(&run.style));
    for (i, line) in run.text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        if !line.is_empty() {
            out.push_str("<w:t xml:space=\"preserve\">");
            out.push_str(&xml_escape_text(line));
            out.push_str("</w:t>");
        }
    }
    out.push_str("</w:r>");
    out
}

fn paragraph_properties_xml(heading: Option<u8>, spacing_after: Option<u32>, alignment: Alignment) -> String {
    let mut out = String::new();
    if let Some(level) = heading {
        out.push_str(&format!("<w:pStyle w:val=\"Heading{level}\"/>"));
    }
    if let Some(after) = spacing_after {
        out.push_str(&format!("<w:spacing w:after=\"{after}\"/>"));
    }
    if alignment != Alignment::Left {
        out.push_str(&format!("<w:jc w:val=\"{}\"/>", alignment_val(alignment)));
    }
    if out.is_empty() {
        out
    } else {
        format!("<w:pPr>{out}</w:pPr>")
    }
}

fn paragraph_xml(p: &Paragraph) -> String {
    let mut out = String::new();
    out.push_str("<w:p>");
    out.push_str(&paragraph_properties_xml(p.heading_level, p.spacing_after, p.alignment));
    for run in &p.runs {
        out.push_str(&run_xml(run));
    }
    out.push_str("</w:p>");
    out
}

fn border_xml(side: &str, b: &BorderSpec) -> String {
    format!(
        "<w:{side} w:val=\"single\" w:sz=\"{}\" w:space=\"0\" w:color=\"{}\"/>",
        b.size,
        xml_escape_text(&b.color_hex)
    )
}

impl PackageWriter {
    fn media_target(&mut self, image: &ImageBlock) -> String {
        if let Some(existing) = self.media.iter().find(|m| m.bytes == image.bytes) {
            return format!("media/{}", existing.name);
        }
        let name = format!("image{}.{}", self.media.len() + 1, image.kind.extension());
        self.media.push(MediaPart {
            name: name.clone(),
            kind: image.kind,
            bytes: image.bytes.clone(),
        });
        format!("media/{name}")
    }

    fn image_xml(&mut self, image: &ImageBlock, rels: &mut PartRels) -> String {
        let target = self.media_target(image);
        let rid = rels.add(REL_IMAGE, &target);
        self.next_doc_pr += 1;
        let id = self.next_doc_pr;
        let cx = u64::from(image.width) * EMU_PER_PX;
        let cy = u64::from(image.height) * EMU_PER_PX;

        let mut out = String::new();
        out.push_str("<w:p>");
        out.push_str(&paragraph_properties_xml(None, Some(200), image.alignment));
        out.push_str(&format!(
            concat!(
                "<w:r><w:drawing>",
                "<wp:inline distT=\"0\" distB=\"0\" distL=\"0\" distR=\"0\">",
                "<wp:extent cx=\"{cx}\" cy=\"{cy}\"/>",
                "<wp:effectExtent l=\"0\" t=\"0\" r=\"0\" b=\"0\"/>",
                "<wp:docPr id=\"{id}\" name=\"Picture {id}\"/>",
                "<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect=\"1\"/></wp:cNvGraphicFramePr>",
                "<a:graphic><a:graphicData uri=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">",
                "<pic:pic><pic:nvPicPr><pic:cNvPr id=\"{id}\" name=\"Picture {id}\"/><pic:cNvPicPr/></pic:nvPicPr>",
                "<pic:blipFill><a:blip r:embed=\"{rid}\"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>",
                "<pic:spPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
                "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></pic:spPr>",
                "</pic:pic></a:graphicData></a:graphic></wp:inline>",
                "</w:drawing></w:r>"
            ),
            cx = cx,
            cy = cy,
            id = id,
            rid = rid,
        ));
        out.push_str("</w:p>");
        out
    }

    fn cell_xml(&mut self, cell: &Cell, column_width: u32, rels: &mut PartRels) -> String {
        let mut out = String::new();
        out.push_str("<w:tc><w:tcPr>");
        match cell.width {
            Some(w) => {
                let (v, t) = w.to_ooxml();
                out.push_str(&format!("<w:tcW w:w=\"{v}\" w:type=\"{t}\"/>"));
            }
            None => out.push_str(&format!("<w:tcW w:w=\"{column_width}\" w:type=\"dxa\"/>")),
        }
        if let Some(b) = &cell.border {
            out.push_str("<w:tcBorders>");
            for side in ["top", "left", "bottom", "right"] {
                out.push_str(&border_xml(side, b));
            }
            out.push_str("</w:tcBorders>");
        }
        if let Some(fill) = &cell.fill {
            out.push_str(&format!(
                "<w:shd w:val=\"clear\" w:color=\"auto\" w:fill=\"{}\"/>",
                xml_escape_text(&fill.color_hex)
            ));
        }
        let pad = cell.padding_twips;
        out.push_str(&format!(
            "<w:tcMar><w:top w:w=\"{pad}\" w:type=\"dxa\"/><w:left w:w=\"{pad}\" w:type=\"dxa\"/><w:bottom w:w=\"{pad}\" w:type=\"dxa\"/><w:right w:w=\"{pad}\" w:type=\"dxa\"/></w:tcMar>"
        ));
        out.push_str(&format!("<w:vAlign w:val=\"{}\"/>", vertical_val(cell.vertical_align)));
        out.push_str("</w:tcPr>");

        let inner_width = column_width.saturating_sub(2 * pad).max(1);
        out.push_str(&self.blocks_xml(&cell.content, inner_width, rels));
        out.push_str("</w:tc>");
        out
    }

    fn table_xml(&mut self, t: &Table, available_width: u32, rels: &mut PartRels) -> String {
        let columns = t.column_count().max(1) as u32;
        let column_width = (available_width / columns).max(1);
        let (w, wtype) = t.width.to_ooxml();

        let mut out = String::new();
        out.push_str("<w:tbl><w:tblPr>");
        out.push_str(&format!("<w:tblW w:w=\"{w}\" w:type=\"{wtype}\"/>"));
        if let Some(b) = &t.border {
            out.push_str("<w:tblBorders>");
            for side in ["top", "left", "bottom", "right", "insideH", "insideV"] {
                out.push_str(&border_xml(side, b));
            }
            out.push_str("</w:tblBorders>");
        }
        out.push_str("<w:tblLook w:val=\"04A0\"/>");
        out.push_str("</w:tblPr><w:tblGrid>");
        for _ in 0..columns {
            out.push_str(&format!("<w:gridCol w:w=\"{column_width}\"/>"));
        }
        out.push_str("</w:tblGrid>");

        for row in &t.rows {
            out.push_str("<w:tr>");
            for cell in &row.cells {
                out.push_str(&self.cell_xml(cell, column_width, rels));
            }
            out.push_str("</w:tr>");
        }
        out.push_str("</w:tbl>");
        out
    }

    /// Serializes a block list. Containers must end with a paragraph, so one is added
    /// after a trailing table and into an empty list.
    fn blocks_xml(&mut self, blocks: &[Block], available_width: u32, rels: &mut PartRels) -> String {
        let mut out = String::new();
        for b in blocks {
            match b {
                Block::Paragraph(p) => out.push_str(&paragraph_xml(p)),
                Block::Image(img) => out.push_str(&self.image_xml(img, rels)),
                Block::Table(t) | Block::Frame(t) => out.push_str(&self.table_xml(t, available_width, rels)),
            }
        }
        if matches!(blocks.last(), None | Some(Block::Table(_)) | Some(Block::Frame(_))) {
            out.push_str("<w:p/>");
        }
        out
    }

    fn header_footer_part(
        &mut self,
        root: &str,
        path: &str,
        content_type: &'static str,
        blocks: &[Block],
        width: u32,
    ) -> Part {
        let mut rels = PartRels::default();
        let body = self.blocks_xml(blocks, width, &mut rels);
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:{root} {NAMESPACES}>{body}</w:{root}>"
        );
        Part {
            path: path.to_string(),
            content_type,
            xml,
            rels,
        }
    }
}

fn section_properties_xml(doc: &Document, references: &str) -> String {
    let m = &doc.margins;
    let mut out = String::new();
    out.push_str("<w:sectPr>");
    out.push_str(references);
    out.push_str(&format!(
        "<w:pgSz w:w=\"{}\" w:h=\"{}\"/>",
        doc.page_width_twips, doc.page_height_twips
    ));
    out.push_str(&format!(
        "<w:pgMar w:top=\"{}\" w:right=\"{}\" w:bottom=\"{}\" w:left=\"{}\" w:header=\"{d}\" w:footer=\"{d}\" w:gutter=\"0\"/>",
        m.top,
        m.right,
        m.bottom,
        m.left,
        d = HEADER_FOOTER_DISTANCE
    ));
    out.push_str("<w:cols w:space=\"708\"/>");
    if doc.first_page_header_only {
        out.push_str("<w:titlePg/>");
    }
    out.push_str("<w:docGrid w:linePitch=\"360\"/>");
    out.push_str("</w:sectPr>");
    out
}

fn content_types_xml(parts: &[Part], media_extensions: &BTreeSet<MediaKind>) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    out.push('\n');
    out.push_str(
        r#"  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    );
    out.push('\n');
    out.push_str(r#"  <Default Extension="xml" ContentType="application/xml"/>"#);
    out.push('\n');
    for kind in media_extensions {
        out.push_str(&format!(
            r#"  <Default Extension="{}" ContentType="{}"/>"#,
            kind.extension(),
            kind.content_type()
        ));
        out.push('\n');
    }
    out.push_str(r#"  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#);
    out.push('\n');
    out.push_str(r#"  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#);
    out.push('\n');
    for part in parts {
        out.push_str(&format!(
            r#"  <Override PartName="/{}" ContentType="{}"/>"#,
            part.path, part.content_type
        ));
        out.push('\n');
    }
    out.push_str("</Types>");
    out
}

fn rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#
}

fn styles_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault>
      <w:rPr>
        <w:rFonts w:ascii="Arial" w:hAnsi="Arial" w:cs="Arial"/>
        <w:sz w:val="20"/>
        <w:szCs w:val="20"/>
      </w:rPr>
    </w:rPrDefault>
    <w:pPrDefault>
      <w:pPr>
        <w:spacing w:after="0" w:line="240" w:lineRule="auto"/>
      </w:pPr>
    </w:pPrDefault>
  </w:docDefaults>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:qFormat/>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading1">
    <w:name w:val="heading 1"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:spacing w:before="240" w:after="200"/>
      <w:outlineLvl w:val="0"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="32"/>
    </w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading2">
    <w:name w:val="heading 2"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:spacing w:before="200" w:after="200"/>
      <w:outlineLvl w:val="1"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="28"/>
    </w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading3">
    <w:name w:val="heading 3"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:spacing w:before="160" w:after="200"/>
      <w:outlineLvl w:val="2"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="24"/>
    </w:rPr>
  </w:style>
</w:styles>"#
}

/// Serializes the document into `.docx` bytes.
pub fn write_docx(doc: &Document) -> Result<Vec<u8>> {
    let mut writer = PackageWriter::default();
    let mut doc_rels = PartRels::default();
    doc_rels.add(REL_STYLES, "styles.xml");
    let width = doc.content_width_twips();

    let mut parts: Vec<Part> = Vec::new();
    let mut references = String::new();

    if doc.first_page_header_only {
        let first = writer.header_footer_part("hdr", "word/header1.xml", CT_HEADER, &doc.header.blocks, width);
        let empty = writer.header_footer_part("hdr", "word/header2.xml", CT_HEADER, &[], width);
        let first_id = doc_rels.add(REL_HEADER, "header1.xml");
        let default_id = doc_rels.add(REL_HEADER, "header2.xml");
        references.push_str(&format!(
            "<w:headerReference w:type=\"default\" r:id=\"{default_id}\"/><w:headerReference w:type=\"first\" r:id=\"{first_id}\"/>"
        ));
        parts.push(first);
        parts.push(empty);
    }

    if !doc.footer.is_empty() {
        let footer = writer.header_footer_part("ftr", "word/footer1.xml", CT_FOOTER, &doc.footer.blocks, width);
        let id = doc_rels.add(REL_FOOTER, "footer1.xml");
        references.push_str(&format!("<w:footerReference w:type=\"default\" r:id=\"{id}\"/>"));
        parts.push(footer);

        // With titlePg the first page reads its own footer slot.
        if doc.first_page_header_only {
            let first = writer.header_footer_part("ftr", "word/footer2.xml", CT_FOOTER, &doc.footer.blocks, width);
            let id = doc_rels.add(REL_FOOTER, "footer2.xml");
            references.push_str(&format!("<w:footerReference w:type=\"first\" r:id=\"{id}\"/>"));
            parts.push(first);
        }
    }

    let body = writer.blocks_xml(&doc.body.blocks, width, &mut doc_rels);
    let document_xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document {NAMESPACES}>\n  <w:body>\n    {body}\n    {sect}\n  </w:body>\n</w:document>",
        sect = section_properties_xml(doc, &references),
    );

    let media_kinds: BTreeSet<MediaKind> = writer.media.iter().map(|m| m.kind).collect();

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", opts)?;
    zip.write_all(content_types_xml(&parts, &media_kinds).as_bytes())?;

    zip.start_file("_rels/.rels", opts)?;
    zip.write_all(rels_xml().as_bytes())?;

    zip.start_file("word/document.xml", opts)?;
    zip.write_all(document_xml.as_bytes())?;

    zip.start_file("word/styles.xml", opts)?;
    zip.write_all(styles_xml().as_bytes())?;

    zip.start_file("word/_rels/document.xml.rels", opts)?;
    zip.write_all(doc_rels.xml().as_bytes())?;

    for part in &parts {
        zip.start_file(part.path.as_str(), opts)
            .with_context(|| format!("start {}", part.path))?;
        zip.write_all(part.xml.as_bytes())?;
        if !part.rels.rels.is_empty() {
            let file_name = part.path.trim_start_matches("word/");
            zip.start_file(format!("word/_rels/{file_name}.rels"), opts)?;
            zip.write_all(part.rels.xml().as_bytes())?;
        }
    }

    for media in &writer.media {
        zip.start_file(format!("word/media/{}", media.name), opts)
            .with_context(|| format!("start media {}", media.name))?;
        zip.write_all(&media.bytes)?;
    }

    let cursor = zip.finish().context("finish docx archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::model::{Dimension, Fill, MarginsTwips, Row, Section, SectionKind};

    fn doc(header: Vec<Block>, body: Vec<Block>, footer: Vec<Block>) -> Document {
        Document {
            header: Section { kind: SectionKind::Header, blocks: header },
            body: Section { kind: SectionKind::Body, blocks: body },
            footer: Section { kind: SectionKind::Footer, blocks: footer },
            page_width_twips: 11906,
            page_height_twips: 16838,
            margins: MarginsTwips { top: 1134, right: 1134, bottom: 1134, left: 1134 },
            first_page_header_only: false,
        }
    }

    fn read_entry(bytes: &[u8], name: &str) -> Option<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).ok()?;
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        Some(s)
    }

    fn para(text: &str) -> Block {
        Block::Paragraph(Paragraph::plain(text, StyleRecord::default()))
    }

    #[test]
    fn test_run_xml_styles_and_breaks() {
        let run = Run {
            text: "a & b\nc".into(),
            style: StyleRecord {
                bold: true,
                italic: true,
                font_size_half_points: Some(24),
                color_hex: Some("FF0000".into()),
                font_family: Some("Arial".into()),
            },
        };
        let xml = run_xml(&run);
        assert!(xml.starts_with("<w:r><w:rPr><w:rFonts w:ascii=\"Arial\""));
        assert!(xml.contains("<w:b/><w:i/><w:color w:val=\"FF0000\"/><w:sz w:val=\"24\"/><w:szCs w:val=\"24\"/>"));
        assert!(xml.contains("a &amp; b</w:t><w:br/><w:t xml:space=\"preserve\">c"));
    }

    #[test]
    fn test_paragraph_properties_order() {
        let xml = paragraph_properties_xml(Some(2), Some(200), Alignment::Justified);
        assert_eq!(
            xml,
            "<w:pPr><w:pStyle w:val=\"Heading2\"/><w:spacing w:after=\"200\"/><w:jc w:val=\"both\"/></w:pPr>"
        );
        assert_eq!(paragraph_properties_xml(None, None, Alignment::Left), "");
    }

    #[test]
    fn test_cell_properties_order() {
        let t = Table {
            rows: vec![Row {
                cells: vec![Cell {
                    content: vec![para("x")],
                    border: Some(BorderSpec { color_hex: "E5E7EB".into(), size: 8, style: Default::default() }),
                    fill: Some(Fill { color_hex: "EEEEEE".into() }),
                    width: Dimension::percent(50.0),
                    vertical_align: VerticalAlign::Center,
                    horizontal_align: Alignment::Left,
                    padding_twips: 57,
                }],
            }],
            width: Dimension::full_width(),
            border: None,
        };
        let mut w = PackageWriter::default();
        let mut rels = PartRels::default();
        let xml = w.table_xml(&t, 9000, &mut rels);
        let tcw = xml.find("<w:tcW w:w=\"2500\" w:type=\"pct\"/>").unwrap();
        let borders = xml.find("<w:tcBorders>").unwrap();
        let shd = xml.find("<w:shd").unwrap();
        let mar = xml.find("<w:tcMar>").unwrap();
        let valign = xml.find("<w:vAlign w:val=\"center\"/>").unwrap();
        assert!(tcw < borders && borders < shd && shd < mar && mar < valign);
        assert!(xml.contains("<w:tblW w:w=\"5000\" w:type=\"pct\"/>"));
        assert!(xml.contains("<w:gridCol w:w=\"9000\"/>"));
        assert!(!xml.contains("<w:tblBorders>"));
    }

    #[test]
    fn test_package_without_header() {
        let bytes = write_docx(&doc(Vec::new(), vec![para("Hello")], Vec::new())).unwrap();
        let document = read_entry(&bytes, "word/document.xml").unwrap();
        assert!(document.contains("Hello"));
        assert!(!document.contains("headerReference"));
        assert!(!document.contains("<w:titlePg/>"));
        assert!(document.contains("<w:pgSz w:w=\"11906\" w:h=\"16838\"/>"));
        assert!(read_entry(&bytes, "word/header1.xml").is_none());
        assert!(read_entry(&bytes, "word/styles.xml").is_some());
    }

    #[test]
    fn test_first_page_header_and_footer_slots() {
        let mut d = doc(vec![para("Org")], vec![para("Body")], vec![para("Page footer")]);
        d.first_page_header_only = true;
        let bytes = write_docx(&d).unwrap();

        let document = read_entry(&bytes, "word/document.xml").unwrap();
        let rels = read_entry(&bytes, "word/_rels/document.xml.rels").unwrap();
        assert!(document.contains("<w:titlePg/>"));
        assert!(document.contains("w:headerReference w:type=\"first\""));
        assert!(document.contains("w:headerReference w:type=\"default\""));
        assert!(document.contains("w:footerReference w:type=\"default\""));
        assert!(document.contains("w:footerReference w:type=\"first\""));
        assert!(rels.contains("header1.xml") && rels.contains("footer2.xml"));

        assert!(read_entry(&bytes, "word/header1.xml").unwrap().contains("Org"));
        let empty = read_entry(&bytes, "word/header2.xml").unwrap();
        assert!(!empty.contains("<w:t"));
        assert!(read_entry(&bytes, "word/footer1.xml").unwrap().contains("Page footer"));
        assert!(read_entry(&bytes, "word/footer2.xml").unwrap().contains("Page footer"));
        let types = read_entry(&bytes, "[Content_Types].xml").unwrap();
        assert!(types.contains("/word/header1.xml"));
        assert!(types.contains("/word/footer2.xml"));
    }

    #[test]
    fn test_images_are_embedded() {
        let img = ImageBlock {
            bytes: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
            kind: MediaKind::Png,
            width: 100,
            height: 50,
            alignment: Alignment::Center,
        };
        let bytes = write_docx(&doc(
            Vec::new(),
            vec![Block::Image(img.clone()), para("t"), Block::Image(img)],
            Vec::new(),
        ))
        .unwrap();
        let document = read_entry(&bytes, "word/document.xml").unwrap();
        assert!(document.contains("<wp:extent cx=\"952500\" cy=\"476250\"/>"));
        assert!(document.contains("<wp:docPr id=\"1\""));
        assert!(document.contains("<wp:docPr id=\"2\""));
        let rels = read_entry(&bytes, "word/_rels/document.xml.rels").unwrap();
        assert!(rels.contains("media/image1.png"));
        assert!(!rels.contains("media/image2.png"));
        let types = read_entry(&bytes, "[Content_Types].xml").unwrap();
        assert!(types.contains("Extension=\"png\""));

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut media = Vec::new();
        archive.by_name("word/media/image1.png").unwrap().read_to_end(&mut media).unwrap();
        assert_eq!(media.len(), 8);
    }

    #[test]
    fn test_trailing_table_gets_paragraph() {
        let t = Table {
            rows: vec![Row { cells: vec![Cell {
                content: vec![para("x")],
                border: None,
                fill: None,
                width: None,
                vertical_align: VerticalAlign::Top,
                horizontal_align: Alignment::Left,
                padding_twips: 0,
            }] }],
            width: Dimension::full_width(),
            border: None,
        };
        let mut w = PackageWriter::default();
        let mut rels = PartRels::default();
        let xml = w.blocks_xml(&[Block::Table(t)], 9000, &mut rels);
        assert!(xml.ends_with("</w:tbl><w:p/>"));
        assert_eq!(w.blocks_xml(&[], 9000, &mut rels), "<w:p/>");
    }
}
