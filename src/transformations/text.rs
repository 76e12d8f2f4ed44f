//! String-shaping transformations.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::config::Params;
use crate::entities::{decode_entities, encode_entities};
use crate::error::Error;

use super::{FromNode, FromValue, Source};

static MULTI_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("whitespace pattern"));

/// Apply a string operation to the running value; non-strings become null.
fn map_string(input: Value, op: impl Fn(&str) -> Value) -> Value {
    match input {
        Value::String(text) => op(&text),
        _ => Value::Null,
    }
}

/// `trim`: the match's string value with surrounding whitespace removed.
pub struct Trim;

impl FromNode for Trim {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(Value::String(source.text().trim().to_string()))
    }
}

/// `extract-text`: all descendant text nodes, space-joined; falls back to the
/// match's string value when the subtree holds no text nodes.
pub struct ExtractText;

impl FromNode for ExtractText {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        let joined = source.doc.descendant_texts(source.anchor()).join(" ");
        if joined.is_empty() {
            let fallback = source.text();
            if !fallback.is_empty() {
                return Ok(Value::String(fallback));
            }
        }
        Ok(Value::String(joined))
    }
}

/// `collapse-whitespace`: trim, then squeeze whitespace runs to one space.
/// Entities are already decoded by the parser, so no second decode happens.
pub struct CollapseWhitespace;

impl CollapseWhitespace {
    fn collapse(text: &str) -> Value {
        Value::String(MULTI_WHITESPACE.replace_all(text.trim(), " ").into_owned())
    }
}

impl FromNode for CollapseWhitespace {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(Self::collapse(&source.text()))
    }
}

impl FromValue for CollapseWhitespace {
    fn transform_value(&self, input: Value) -> Result<Value, Error> {
        Ok(map_string(input, Self::collapse))
    }
}

/// `decode-entities`: decode HTML entities left in the text.
pub struct DecodeEntities;

impl FromNode for DecodeEntities {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(Value::String(decode_entities(&source.text())))
    }
}

impl FromValue for DecodeEntities {
    fn transform_value(&self, input: Value) -> Result<Value, Error> {
        Ok(map_string(input, |text| Value::String(decode_entities(text))))
    }
}

/// `encode-entities`: encode the standard HTML escapes.
pub struct EncodeEntities;

impl FromNode for EncodeEntities {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(Value::String(encode_entities(&source.text())))
    }
}

impl FromValue for EncodeEntities {
    fn transform_value(&self, input: Value) -> Result<Value, Error> {
        Ok(map_string(input, |text| Value::String(encode_entities(text))))
    }
}

/// `url-decode`: percent-decode; malformed input degrades to null.
pub struct UrlDecode;

impl UrlDecode {
    fn decode(text: &str) -> Value {
        match urlencoding::decode(text) {
            Ok(decoded) => Value::String(decoded.into_owned()),
            Err(_) => Value::Null,
        }
    }
}

impl FromNode for UrlDecode {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(Self::decode(&source.text()))
    }
}

impl FromValue for UrlDecode {
    fn transform_value(&self, input: Value) -> Result<Value, Error> {
        Ok(map_string(input, Self::decode))
    }
}

/// `url-encode`: percent-encode.
pub struct UrlEncode;

impl FromNode for UrlEncode {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(Value::String(urlencoding::encode(&source.text()).into_owned()))
    }
}

impl FromValue for UrlEncode {
    fn transform_value(&self, input: Value) -> Result<Value, Error> {
        Ok(map_string(input, |text| {
            Value::String(urlencoding::encode(text).into_owned())
        }))
    }
}

/// `split`: split the match's text on a separator into an array of strings.
pub struct Split {
    separator: String,
    trim: bool,
}

impl Split {
    pub fn from_params(params: &Params) -> Result<Split, Error> {
        let separator = params.get_str("_separator")?.unwrap_or(",").to_string();
        if separator.is_empty() {
            return Err(Error::bad_parameter("_separator", "must not be empty"));
        }
        Ok(Split {
            separator,
            trim: params.get_bool("_trim")?.unwrap_or(false),
        })
    }
}

impl FromNode for Split {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        let text = source.text();
        let parts = text
            .split(self.separator.as_str())
            .map(|part| {
                let part = if self.trim { part.trim() } else { part };
                Value::String(part.to_string())
            })
            .collect();
        Ok(Value::Array(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DocNode, Document, PathQuery};

    fn run_source(html: &str, query: &str, unit: &dyn FromNode) -> Value {
        let doc = Document::parse(html);
        let matched = PathQuery::parse(query)
            .unwrap()
            .select(&doc, doc.root())
            .into_iter()
            .next()
            .unwrap();
        run_on(&doc, &matched, unit)
    }

    fn run_on(doc: &Document, node: &DocNode, unit: &dyn FromNode) -> Value {
        unit.transform_node(&Source {
            doc,
            node,
            logical_parents: &[],
        })
        .unwrap()
    }

    #[test]
    fn trim_strips_surrounding_whitespace() {
        let value = run_source("<p>  padded  </p>", "//p", &Trim);
        assert_eq!(value, Value::String("padded".to_string()));
    }

    #[test]
    fn extract_text_joins_descendant_text_nodes() {
        let value = run_source("<div><p>one</p><p>two</p></div>", "//div", &ExtractText);
        assert_eq!(value, Value::String("one two".to_string()));
    }

    #[test]
    fn collapse_whitespace_squeezes_runs() {
        let value = run_source("<p>  a \n\n  b   c </p>", "//p", &CollapseWhitespace);
        assert_eq!(value, Value::String("a b c".to_string()));
    }

    #[test]
    fn collapse_whitespace_rejects_non_strings() {
        let value = CollapseWhitespace
            .transform_value(Value::Number(3.into()))
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn split_with_trim() {
        let split = Split {
            separator: ",".to_string(),
            trim: true,
        };
        let value = run_source("<p>a, b, c</p>", "//p", &split);
        assert_eq!(
            value,
            Value::Array(vec![
                Value::String("a".to_string()),
                Value::String("b".to_string()),
                Value::String("c".to_string()),
            ])
        );
    }

    #[test]
    fn url_round_trip() {
        let encoded = UrlEncode
            .transform_value(Value::String("a b/c".to_string()))
            .unwrap();
        assert_eq!(encoded, Value::String("a%20b%2Fc".to_string()));
        let decoded = UrlDecode.transform_value(encoded).unwrap();
        assert_eq!(decoded, Value::String("a b/c".to_string()));
    }

    #[test]
    fn entity_transformations_on_values() {
        let decoded = DecodeEntities
            .transform_value(Value::String("a &amp; b".to_string()))
            .unwrap();
        assert_eq!(decoded, Value::String("a & b".to_string()));
        let encoded = EncodeEntities.transform_value(decoded).unwrap();
        assert_eq!(encoded, Value::String("a &amp; b".to_string()));
    }
}
