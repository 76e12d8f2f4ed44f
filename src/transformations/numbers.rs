//! Integer-producing transformations. Parse failures yield null, never errors.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::Error;

use super::{FromNode, Source};

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+").expect("integer pattern"));

/// `cast-integer`: the whole trimmed text as an integer.
pub struct CastInteger;

impl FromNode for CastInteger {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        Ok(match source.text().trim().parse::<i64>() {
            Ok(number) => Value::from(number),
            Err(_) => Value::Null,
        })
    }
}

/// `extract-integer`: the first integer substring anywhere in the text.
pub struct ExtractInteger;

impl FromNode for ExtractInteger {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        let text = source.text();
        Ok(FIRST_INTEGER
            .find(&text)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or(Value::Null))
    }
}

/// `abbreviated-number`: parse counts like "6.8k views". The first
/// whitespace-separated token with a numeric mantissa wins; a scale suffix
/// multiplies it (k = 1e3, m = 1e6, b = 1e12) and the result truncates to an
/// integer.
pub struct AbbreviatedNumber;

impl AbbreviatedNumber {
    fn convert(token: &str) -> Option<i64> {
        let split = token
            .char_indices()
            .find(|(_, ch)| !ch.is_ascii_digit() && *ch != '.')
            .map(|(index, _)| index)
            .unwrap_or(token.len());
        if split == 0 {
            return None;
        }

        let mantissa: f64 = token[..split].parse().ok()?;
        let scale = match token[split..].to_ascii_lowercase().as_str() {
            "" => 1.0,
            "k" => 1e3,
            "m" => 1e6,
            "b" => 1e12,
            _ => return None,
        };

        let scaled = mantissa * scale;
        if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
            return None;
        }
        Some(scaled as i64)
    }
}

impl FromNode for AbbreviatedNumber {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        let text = source.text();
        for token in text.split_whitespace() {
            if let Some(number) = Self::convert(token) {
                return Ok(Value::from(number));
            }
        }
        Ok(Value::Null)
    }
}
