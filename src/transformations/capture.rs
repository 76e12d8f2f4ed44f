//! The `regex` transformation: pattern matching with capture groups.

use regex::RegexBuilder;
use serde_json::{Map, Value};

use crate::config::Params;
use crate::error::Error;

use super::{FromNode, Source};

/// Match a configured pattern against the node text.
///
/// A single match of a pattern with at most one unnamed capture group
/// collapses to a bare string. Otherwise each match becomes an object keyed
/// by group name or number; a single object stays unwrapped unless
/// `_forceArray` is set.
pub struct RegexCapture {
    regex: regex::Regex,
    force_array: bool,
}

impl RegexCapture {
    pub fn from_params(params: &Params) -> Result<RegexCapture, Error> {
        let pattern = params
            .get_str("_regex")?
            .ok_or_else(|| Error::bad_parameter("_regex", "required"))?;

        let mut options = Vec::new();
        if let Some(option) = params.get_str("_regexOption")? {
            options.push(option.to_string());
        }
        if let Some(more) = params.get_str_array("_regexOptions")? {
            options.extend(more);
        }

        let mut builder = RegexBuilder::new(pattern);
        for option in &options {
            match option.as_str() {
                "IgnoreCase" => builder.case_insensitive(true),
                "Multiline" => builder.multi_line(true),
                "Singleline" => builder.dot_matches_new_line(true),
                "IgnorePatternWhitespace" => builder.ignore_whitespace(true),
                other => {
                    return Err(Error::bad_parameter(
                        "_regexOptions",
                        format!("unknown regex option {other}"),
                    ))
                }
            };
        }

        let regex = builder
            .build()
            .map_err(|err| Error::bad_parameter("_regex", err.to_string()))?;

        Ok(RegexCapture {
            regex,
            force_array: params.get_bool("_forceArray")?.unwrap_or(false),
        })
    }
}

impl FromNode for RegexCapture {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        let text = source.text();
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let captures: Vec<regex::Captures> = self.regex.captures_iter(&text).collect();
        if captures.is_empty() {
            return Ok(if self.force_array {
                Value::Array(Vec::new())
            } else {
                Value::Null
            });
        }

        let group_count = self.regex.captures_len() - 1;
        let names: Vec<Option<&str>> = self.regex.capture_names().collect();
        let has_named = names.iter().skip(1).any(Option::is_some);

        if !self.force_array && captures.len() == 1 && group_count <= 1 && !has_named {
            let capture = &captures[0];
            let matched = if group_count == 1 {
                capture.get(1)
            } else {
                capture.get(0)
            };
            return Ok(matched
                .map(|m| Value::String(m.as_str().to_string()))
                .unwrap_or(Value::Null));
        }

        let mut matches = Vec::with_capacity(captures.len());
        for capture in &captures {
            let mut object = Map::new();
            for group in 1..=group_count {
                if let Some(matched) = capture.get(group) {
                    let key = names
                        .get(group)
                        .and_then(|name| *name)
                        .map(str::to_string)
                        .unwrap_or_else(|| group.to_string());
                    object.insert(key, Value::String(matched.as_str().to_string()));
                }
            }
            matches.push(Value::Object(object));
        }

        if !self.force_array && matches.len() == 1 {
            return Ok(matches.remove(0));
        }
        Ok(Value::Array(matches))
    }
}
