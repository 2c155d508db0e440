//! Inline `style=""` parsing: run formatting and alignment.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{Alignment, SectionKind, StyleRecord, VerticalAlign};

lazy_static! {
    static ref FONT_SIZE_RE: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(pt|px)").unwrap();
    static ref HEX6_RE: Regex = Regex::new(r"^#?([0-9a-fA-F]{6})$").unwrap();
}

/// Points per CSS pixel used for font sizes.
const PT_PER_PX: f64 = 1.33;

/// Splits a style attribute into `(property, value)` pairs, properties lowercased.
/// Declarations without a property or a value are dropped.
pub fn declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key, value.to_string()))
        })
        .collect()
}

/// First value declared for `key`.
pub fn style_value(style: &str, key: &str) -> Option<String> {
    declarations(style)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

/// Half-points from `NNpt` or `NNpx`.
pub fn parse_font_size(value: &str) -> Option<u32> {
    let caps = FONT_SIZE_RE.captures(value)?;
    let n: f64 = caps[1].parse().ok()?;
    let half_points = if caps[2].eq_ignore_ascii_case("pt") {
        n * 2.0
    } else {
        n * PT_PER_PX * 2.0
    };
    Some(half_points.round() as u32)
}

fn is_bold_weight(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    v == "bold" || v == "bolder" || v.parse::<u32>().map(|w| w >= 700).unwrap_or(false)
}

/// What a single element declares about run formatting, with no defaults applied.
pub fn declared_style(style: &str, tag: &str) -> StyleRecord {
    let mut rec = StyleRecord {
        bold: matches!(tag, "strong" | "b"),
        italic: matches!(tag, "em" | "i"),
        ..Default::default()
    };

    for (key, value) in declarations(style) {
        match key.as_str() {
            "font-size" => {
                if rec.font_size_half_points.is_none() {
                    rec.font_size_half_points = parse_font_size(&value);
                }
            }
            "font-weight" => rec.bold |= is_bold_weight(&value),
            "font-style" => rec.italic |= value.eq_ignore_ascii_case("italic"),
            "color" => {
                if rec.color_hex.is_none() {
                    rec.color_hex = HEX6_RE
                        .captures(&value)
                        .map(|c| c[1].to_ascii_uppercase());
                }
            }
            "font-family" => {
                if rec.font_family.is_none() {
                    let first = value
                        .split(',')
                        .next()
                        .unwrap_or("")
                        .replace(['"', '\''], "");
                    let first = first.trim();
                    if !first.is_empty() {
                        rec.font_family = Some(first.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    rec
}

/// Root record of a section: default family for the context and the template font size.
pub fn base_style(context: SectionKind, default_size_pt: Option<f32>) -> StyleRecord {
    StyleRecord {
        font_size_half_points: default_size_pt
            .filter(|pt| *pt > 0.0)
            .map(|pt| (f64::from(pt) * 2.0).round() as u32),
        font_family: Some(context.default_font_family().to_string()),
        ..Default::default()
    }
}

/// Full record for one element seen in isolation.
pub fn parse_style(
    style: &str,
    tag: &str,
    default_size_pt: Option<f32>,
    context: SectionKind,
) -> StyleRecord {
    base_style(context, default_size_pt).overlay(&declared_style(style, tag))
}

pub fn parse_alignment(style: &str) -> Option<Alignment> {
    let value = style_value(style, "text-align")?.to_ascii_lowercase();
    match value.as_str() {
        "left" | "start" => Some(Alignment::Left),
        "center" => Some(Alignment::Center),
        "right" | "end" => Some(Alignment::Right),
        "justify" => Some(Alignment::Justified),
        _ => None,
    }
}

pub fn parse_vertical_align(style: &str) -> Option<VerticalAlign> {
    let value = style_value(style, "vertical-align")?.to_ascii_lowercase();
    match value.as_str() {
        "top" => Some(VerticalAlign::Top),
        "middle" | "center" => Some(VerticalAlign::Center),
        "bottom" => Some(VerticalAlign::Bottom),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_from_style_or_tag() {
        assert!(declared_style("font-weight: bold", "span").bold);
        assert!(declared_style("font-weight:700", "p").bold);
        assert!(declared_style("", "strong").bold);
        assert!(declared_style("", "b").bold);
        assert!(!declared_style("font-weight: 400", "span").bold);
    }

    #[test]
    fn test_italic() {
        assert!(declared_style("font-style: italic", "span").italic);
        assert!(declared_style("", "em").italic);
        assert!(!declared_style("", "span").italic);
    }

    #[test]
    fn test_font_size_units() {
        assert_eq!(parse_font_size("12pt"), Some(24));
        assert_eq!(parse_font_size("10.5pt"), Some(21));
        assert_eq!(parse_font_size("16px"), Some(43));
        assert_eq!(parse_font_size("large"), None);
    }

    #[test]
    fn test_default_font_size_only_when_absent() {
        let rec = parse_style("", "p", Some(10.0), SectionKind::Body);
        assert_eq!(rec.font_size_half_points, Some(20));
        let rec = parse_style("font-size: 14pt", "p", Some(10.0), SectionKind::Body);
        assert_eq!(rec.font_size_half_points, Some(28));
    }

    #[test]
    fn test_color_only_six_hex() {
        assert_eq!(declared_style("color: #1a2b3c", "span").color_hex.as_deref(), Some("1A2B3C"));
        assert_eq!(declared_style("color: red", "span").color_hex, None);
        assert_eq!(declared_style("color: #abc", "span").color_hex, None);
        assert_eq!(declared_style("background-color: #112233", "span").color_hex, None);
    }

    #[test]
    fn test_font_family_defaults_per_context() {
        let rec = parse_style("font-family: 'Helvetica Neue', sans-serif", "p", None, SectionKind::Body);
        assert_eq!(rec.font_family.as_deref(), Some("Helvetica Neue"));
        let rec = parse_style("", "p", None, SectionKind::Header);
        assert_eq!(rec.font_family.as_deref(), Some("Times New Roman"));
        let rec = parse_style("", "p", None, SectionKind::Body);
        assert_eq!(rec.font_family.as_deref(), Some("Arial"));
    }

    #[test]
    fn test_garbage_is_ignored() {
        let rec = declared_style(";;: ;font-size:;color", "span");
        assert_eq!(rec, StyleRecord::default());
    }

    #[test]
    fn test_alignment() {
        assert_eq!(parse_alignment("text-align: center"), Some(Alignment::Center));
        assert_eq!(parse_alignment("TEXT-ALIGN:right"), Some(Alignment::Right));
        assert_eq!(parse_alignment("text-align: justify"), Some(Alignment::Justified));
        assert_eq!(parse_alignment("color: red"), None);
        assert_eq!(parse_vertical_align("vertical-align: middle"), Some(VerticalAlign::Center));
    }
}
