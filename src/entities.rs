//! HTML entity decoding and encoding for extracted strings.
//!
//! The HTML parser already decodes entities in node text, so these helpers
//! exist for values that arrive still-encoded: attribute payloads produced by
//! templating systems, double-encoded forum content, and the explicit
//! `decode-entities` / `encode-entities` transformations.

/// Named entities worth knowing about in scraped prose.
const NAMED: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{a0}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("lsquo", "\u{2018}"),
    ("rsquo", "\u{2019}"),
    ("ldquo", "\u{201c}"),
    ("rdquo", "\u{201d}"),
    ("hellip", "\u{2026}"),
    ("copy", "\u{a9}"),
    ("reg", "\u{ae}"),
    ("trade", "\u{2122}"),
];

/// Decode named and numeric HTML entities, leaving unknown sequences as-is.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        match rest[1..].find(';') {
            // Entity names are short; anything longer is treated as literal text.
            Some(end) if end <= 32 => {
                let body = &rest[1..=end];
                if let Some(decoded) = decode_one(body) {
                    out.push(decoded);
                } else if let Some((_, replacement)) =
                    NAMED.iter().find(|(name, _)| *name == body)
                {
                    out.push_str(replacement);
                } else {
                    out.push('&');
                    rest = &rest[1..];
                    continue;
                }
                rest = &rest[end + 2..];
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decode a numeric entity body (`#NNN` or `#xHH`) to its character.
fn decode_one(body: &str) -> Option<char> {
    let digits = body.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

/// Encode the five standard HTML escapes.
pub fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_entities() {
        assert_eq!(decode_entities("a &amp; b &ndash; c"), "a & b \u{2013} c");
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
    }

    #[test]
    fn leaves_unknown_sequences_alone() {
        assert_eq!(decode_entities("AT&T; R&D"), "AT&T; R&D");
        assert_eq!(decode_entities("tail &"), "tail &");
    }

    #[test]
    fn encode_round_trip() {
        let raw = r#"<a href="x">Q&A</a>"#;
        assert_eq!(decode_entities(&encode_entities(raw)), raw);
    }
}
