//! Border, fill, width and spacing declarations.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{px_to_twips, BorderSpec, BorderStyle, Dimension, Fill};
use crate::style::declarations;

lazy_static! {
    static ref PX_RE: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*px").unwrap();
    static ref HEX_RE: Regex = Regex::new(r"#([0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").unwrap();
    static ref RGB_RE: Regex =
        Regex::new(r"(?i)rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)").unwrap();
    static ref PERCENT_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap();
    static ref BARE_INT_RE: Regex = Regex::new(r"^(\d+)$").unwrap();
    static ref LEADING_NUM_RE: Regex = Regex::new(r"^(\d+(?:\.\d+)?)").unwrap();
}

const BORDER_KEYS: [&str; 5] = [
    "border",
    "border-top",
    "border-bottom",
    "border-left",
    "border-right",
];
const FILL_KEYS: [&str; 2] = ["background", "background-color"];
const PADDING_KEYS: [&str; 5] = [
    "padding",
    "padding-top",
    "padding-bottom",
    "padding-left",
    "padding-right",
];
const MARGIN_KEYS: [&str; 3] = ["margin", "margin-top", "margin-bottom"];

// w:sz is in eighths of a point
const BORDER_SIZE_PER_PX: f64 = 8.0;

pub const DEFAULT_BORDER_COLOR: &str = "000000";

fn named_color(name: &str, allow_yellow: bool) -> Option<&'static str> {
    match name {
        "black" => Some("000000"),
        "white" => Some("FFFFFF"),
        "red" => Some("FF0000"),
        "green" => Some("00FF00"),
        "blue" => Some("0000FF"),
        "yellow" if allow_yellow => Some("FFFF00"),
        "gray" | "grey" => Some("808080"),
        "lightgray" | "lightgrey" => Some("D3D3D3"),
        _ => None,
    }
}

fn hex_color(value: &str) -> Option<String> {
    let caps = HEX_RE.captures(value)?;
    let hex = caps[1].to_ascii_uppercase();
    if hex.len() == 3 {
        Some(hex.chars().flat_map(|c| [c, c]).collect())
    } else {
        Some(hex)
    }
}

fn rgb_color(value: &str) -> Option<String> {
    let caps = RGB_RE.captures(value)?;
    let mut out = String::with_capacity(6);
    for i in 1..=3 {
        let channel: u32 = caps[i].parse().ok()?;
        out.push_str(&format!("{:02X}", channel.min(255)));
    }
    Some(out)
}

fn first_declared(style: &str, keys: &[&str]) -> Option<String> {
    declarations(style)
        .into_iter()
        .find(|(k, _)| keys.contains(&k.as_str()))
        .map(|(_, v)| v)
}

/// First border declaration among `border` and its four sides.
/// `none`, `0` and `0px…` values produce no border.
pub fn parse_border(style: &str) -> Option<BorderSpec> {
    let value = first_declared(style, &BORDER_KEYS)?;
    let lower = value.to_ascii_lowercase();
    if lower.contains("none") || lower == "0" || lower.starts_with("0px") {
        return None;
    }

    let px = PX_RE
        .captures(&lower)
        .and_then(|c| c[1].parse::<f64>().ok())
        .unwrap_or(1.0);

    let color_hex = hex_color(&value)
        .or_else(|| {
            lower
                .split_whitespace()
                .find_map(|token| named_color(token, false))
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_BORDER_COLOR.to_string());

    Some(BorderSpec {
        color_hex,
        size: (px * BORDER_SIZE_PER_PX).round() as u32,
        style: BorderStyle::Single,
    })
}

pub fn parse_fill(style: &str) -> Option<Fill> {
    let value = first_declared(style, &FILL_KEYS)?;
    let lower = value.trim().to_ascii_lowercase();
    if lower == "transparent" || lower == "none" {
        return None;
    }
    let color_hex = hex_color(&value)
        .or_else(|| named_color(&lower, true).map(str::to_string))
        .or_else(|| rgb_color(&lower))?;
    Some(Fill { color_hex })
}

pub fn has_background(style: &str) -> bool {
    match first_declared(style, &FILL_KEYS) {
        Some(v) => {
            let lower = v.trim().to_ascii_lowercase();
            !lower.starts_with("transparent") && !lower.starts_with("none")
        }
        None => false,
    }
}

pub fn parse_width(style: &str, width_attr: Option<&str>) -> Option<Dimension> {
    let value = first_declared(style, &["width"]).or_else(|| width_attr.map(str::to_string))?;
    let value = value.trim();

    if let Some(caps) = PERCENT_RE.captures(value) {
        return Dimension::percent(caps[1].parse().ok()?);
    }
    if let Some(caps) = PX_RE.captures(value) {
        return Dimension::twips(px_to_twips(caps[1].parse().ok()?));
    }
    if let Some(caps) = BARE_INT_RE.captures(value) {
        return Dimension::twips(px_to_twips(caps[1].parse().ok()?));
    }
    None
}

fn leading_number(value: &str) -> Option<f64> {
    LEADING_NUM_RE
        .captures(value.trim())
        .and_then(|c| c[1].parse().ok())
}

pub fn padding_px(style: &str) -> Option<f64> {
    first_declared(style, &PADDING_KEYS).and_then(|v| leading_number(&v))
}

pub fn margin_px(style: &str) -> Option<f64> {
    first_declared(style, &MARGIN_KEYS).and_then(|v| leading_number(&v))
}

pub fn parse_padding_twips(style: &str, default_px: f64) -> u32 {
    px_to_twips(padding_px(style).unwrap_or(default_px))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DimensionUnit;

    #[test]
    fn test_border_rejections() {
        assert_eq!(parse_border("border: 0"), None);
        assert_eq!(parse_border("border: none"), None);
        assert_eq!(parse_border("border:0px solid #000"), None);
        assert_eq!(parse_border("padding: 4px"), None);
    }

    #[test]
    fn test_border_size_and_color() {
        let b = parse_border("border: 2px solid #E5E7EB").unwrap();
        assert_eq!(b.size, 16);
        assert_eq!(b.color_hex, "E5E7EB");

        let b = parse_border("border-top: 1px solid #abc").unwrap();
        assert_eq!(b.color_hex, "AABBCC");
        assert_eq!(b.size, 8);

        let b = parse_border("border-bottom: 1px solid lightgray").unwrap();
        assert_eq!(b.color_hex, "D3D3D3");

        let b = parse_border("border: solid").unwrap();
        assert_eq!(b.size, 8);
        assert_eq!(b.color_hex, DEFAULT_BORDER_COLOR);
    }

    #[test]
    fn test_first_border_declaration_wins() {
        assert_eq!(parse_border("border: none; border-top: 1px solid red"), None);
        let b = parse_border("border-left: 3px solid blue; border: none").unwrap();
        assert_eq!(b.color_hex, "0000FF");
    }

    #[test]
    fn test_fill() {
        assert_eq!(parse_fill("background-color: #f3f4f6").unwrap().color_hex, "F3F4F6");
        assert_eq!(parse_fill("background: yellow").unwrap().color_hex, "FFFF00");
        assert_eq!(parse_fill("background: rgb(255, 0, 16)").unwrap().color_hex, "FF0010");
        assert_eq!(parse_fill("background: transparent"), None);
        assert_eq!(parse_fill("background: url(x.png)"), None);
        assert!(has_background("background: url(x.png)"));
        assert!(!has_background("background: transparent"));
        assert!(!has_background("color: red"));
    }

    #[test]
    fn test_width() {
        let w = parse_width("width: 50%", None).unwrap();
        assert_eq!(w.unit, DimensionUnit::Percentage);
        assert_eq!(w.value, 50.0);
        assert_eq!(w.to_ooxml(), (2500, "pct"));

        let w = parse_width("width: 200px", None).unwrap();
        assert_eq!(w.unit, DimensionUnit::AbsoluteTwips);
        assert_eq!(w.value, (200.0_f64 * 0.264583 * 56.6929).round());

        let w = parse_width("", Some("120")).unwrap();
        assert_eq!(w.unit, DimensionUnit::AbsoluteTwips);

        assert!(parse_width("max-width: 40%", None).is_none());
        assert!(parse_width("width: auto", None).is_none());
    }

    #[test]
    fn test_padding_and_margin() {
        assert_eq!(padding_px("padding: 15px 8px"), Some(15.0));
        assert_eq!(padding_px("padding-left: 4px"), Some(4.0));
        assert_eq!(margin_px("margin-bottom: 12px"), Some(12.0));
        assert_eq!(margin_px("margin-left: 12px"), None);
        assert_eq!(parse_padding_twips("", 3.0), px_to_twips(3.0));
    }
}
