use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref SKIPPED_RE: Regex =
        Regex::new(r"(?is)<!--.*?-->|<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>").unwrap();
}

pub fn xml_escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Collapses every whitespace run (including non-breaking spaces) into one ASCII space.
pub fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_ws {
                out.push(' ');
                in_ws = true;
            }
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut it = s.chars().peekable();

    while let Some(ch) = it.next() {
        if ch != '&' {
            out.push(ch);
            continue;
        }

        // Collect up to ';', bounded so malformed input stays linear.
        let mut ent = String::new();
        let mut ended = false;
        while let Some(&c) = it.peek() {
            if c == '&' || c == '<' || c.is_whitespace() {
                break;
            }
            it.next();
            if c == ';' {
                ended = true;
                break;
            }
            ent.push(c);
            if ent.len() > 32 {
                break;
            }
        }

        let decoded: Option<char> = if ended {
            match ent.as_str() {
                "nbsp" => Some('\u{a0}'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "euro" => Some('€'),
                "laquo" => Some('«'),
                "raquo" => Some('»'),
                "eacute" => Some('é'),
                "egrave" => Some('è'),
                "ecirc" => Some('ê'),
                "agrave" => Some('à'),
                "acirc" => Some('â'),
                "ccedil" => Some('ç'),
                "ocirc" => Some('ô'),
                "ugrave" => Some('ù'),
                "ucirc" => Some('û'),
                "icirc" => Some('î'),
                "Eacute" => Some('É'),
                "copy" => Some('©'),
                "reg" => Some('®'),
                "deg" => Some('°'),
                "hellip" => Some('…'),
                "ndash" => Some('–'),
                "mdash" => Some('—'),
                _ => None,
            }
        } else {
            None
        };

        if let Some(c) = decoded {
            out.push(c);
            continue;
        }

        if ended {
            let numeric = if let Some(hex) = ent.strip_prefix("#x").or_else(|| ent.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = ent.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            if let Some(c) = numeric.and_then(char::from_u32) {
                out.push(c);
                continue;
            }
        }

        // Unknown or malformed: keep literal.
        out.push('&');
        out.push_str(&ent);
        if ended {
            out.push(';');
        }
    }

    out
}

/// Plain text of a markup fragment: comments/scripts dropped, tags replaced by spaces,
/// entities decoded, whitespace collapsed and trimmed.
pub fn strip_tags(html: &str) -> String {
    let without_skipped = SKIPPED_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_skipped, " ");
    collapse_ws(&decode_entities(&without_tags)).trim().to_string()
}

/// Replaces comments, scripts and style sheets with spaces, keeping byte offsets intact.
pub fn blank_skipped(html: &str) -> String {
    SKIPPED_RE
        .replace_all(html, |caps: &regex::Captures| " ".repeat(caps[0].len()))
        .into_owned()
}

/// Shortens long sources (data URIs mostly) for log lines.
pub fn preview(s: &str) -> &str {
    match s.char_indices().nth(100) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_ws() {
        assert_eq!(collapse_ws("a \n\t b"), "a b");
        assert_eq!(collapse_ws("a\u{a0}\u{a0}b"), "a b");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;p&gt;"), "<p>");
        assert_eq!(decode_entities("&#233;t&#xE9;"), "été");
        assert_eq!(decode_entities("Fish & Chips"), "Fish & Chips");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<p>Hello <b>world</b></p><!-- note --><p>again</p>"),
            "Hello world again"
        );
        assert_eq!(strip_tags("<style>p { color: red }</style>x"), "x");
    }

    #[test]
    fn test_blank_skipped_keeps_offsets() {
        let html = "a<!-- x --><script>1<2</script>b";
        let blanked = blank_skipped(html);
        assert_eq!(blanked.len(), html.len());
        assert!(blanked.starts_with('a'));
        assert!(blanked.ends_with('b'));
        assert_eq!(blanked.trim_matches(|c| c == 'a' || c == 'b').trim(), "");
    }

    #[test]
    fn test_xml_escape_text() {
        assert_eq!(xml_escape_text("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_preview_is_char_safe() {
        let long = "é".repeat(150);
        assert_eq!(preview(&long).chars().count(), 100);
        assert_eq!(preview("short"), "short");
    }
}
