//! Ruleset model and JSON parsing.
//!
//! A ruleset is a JSON object whose `_`-prefixed keys configure the current
//! rule and whose remaining keys are named child rules. Singular and plural
//! spellings of the reserved keys are equivalent.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::Error;

/// One node of the parsed ruleset tree.
#[derive(Debug, Clone, Default)]
pub struct ConfigSection {
    /// Friendly name for this ruleset (root only, informational).
    pub config_name: String,
    /// URL regular expressions, consulted only at the root by the dispatcher.
    pub url_patterns: Vec<String>,
    /// Descendant tag names to delete before any selection runs.
    pub remove_tags: HashSet<String>,
    /// Path queries deleting nodes within each individually selected node.
    pub remove_xpath_rules: Vec<String>,
    /// Path queries locating this rule's nodes, evaluated in order.
    pub xpath_rules: Vec<String>,
    /// Transformation chain applied to each selected node.
    pub transformations: Vec<TransformationConfig>,
    /// Named child rules, in declaration order (drives output key order).
    pub children: Vec<(String, ConfigSection)>,
    /// Always materialize this rule's result as an array.
    pub force_array: bool,
}

/// One step of a transformation chain: registry key plus raw parameters.
#[derive(Debug, Clone)]
pub struct TransformationConfig {
    pub type_name: String,
    pub attributes: Params,
}

impl ConfigSection {
    /// Parse a ruleset from JSON text.
    pub fn parse_str(json: &str) -> Result<ConfigSection, Error> {
        let value: Value = serde_json::from_str(json)?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::Config("ruleset root must be a JSON object".to_string()))?;
        Ok(Self::from_object(object))
    }

    /// Parse a ruleset file.
    pub fn parse_file(path: &Path) -> Result<ConfigSection, Error> {
        let json = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&json)
    }

    fn from_object(object: &Map<String, Value>) -> ConfigSection {
        let mut section = ConfigSection::default();

        for (key, value) in object {
            match key.as_str() {
                "_configName" => {
                    if let Some(name) = value.as_str() {
                        section.config_name = name.to_string();
                    }
                }
                "_urlPattern" | "_urlPatterns" => {
                    collect_strings(value, &mut section.url_patterns);
                }
                "_removeTag" | "_removeTags" => {
                    let mut tags = Vec::new();
                    collect_strings(value, &mut tags);
                    section
                        .remove_tags
                        .extend(tags.into_iter().map(|tag| tag.to_ascii_lowercase()));
                }
                "_removeXPath" | "_removeXPaths" => {
                    collect_strings(value, &mut section.remove_xpath_rules);
                }
                "_xpath" | "_xpaths" => {
                    collect_strings(value, &mut section.xpath_rules);
                }
                "_transformation" | "_transformations" => {
                    collect_transformations(value, &mut section.transformations);
                }
                "_forceArray" => {
                    if let Some(flag) = value.as_bool() {
                        section.force_array = flag;
                    }
                }
                _ => match value {
                    // A nested object is a full child rule; a bare string is
                    // shorthand for a single-selector rule.
                    Value::Object(child) => {
                        section
                            .children
                            .push((key.clone(), ConfigSection::from_object(child)));
                    }
                    Value::String(selector) => {
                        let child = ConfigSection {
                            xpath_rules: vec![selector.clone()],
                            ..ConfigSection::default()
                        };
                        section.children.push((key.clone(), child));
                    }
                    _ => {}
                },
            }
        }

        section
    }
}

/// Accept a bare string or an array of strings.
fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => out.push(text.clone()),
        Value::Array(items) => {
            for item in items {
                if let Some(text) = item.as_str() {
                    out.push(text.to_string());
                }
            }
        }
        _ => {}
    }
}

/// Accept a name string, a `{_type, ...}` object, or an array of either.
fn collect_transformations(value: &Value, out: &mut Vec<TransformationConfig>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_transformations(item, out);
            }
        }
        Value::String(name) => {
            if !name.trim().is_empty() {
                out.push(TransformationConfig {
                    type_name: name.clone(),
                    attributes: Params::default(),
                });
            }
        }
        Value::Object(object) => {
            let type_name = object
                .get("_type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if type_name.trim().is_empty() {
                return;
            }
            let mut attributes = Map::new();
            for (key, attr) in object {
                if key != "_type" {
                    attributes.insert(key.clone(), attr.clone());
                }
            }
            out.push(TransformationConfig {
                type_name,
                attributes: Params(attributes),
            });
        }
        _ => {}
    }
}

/// Transformation parameters: a string-keyed bag with typed accessors that
/// fail fast on type mismatches.
#[derive(Debug, Clone, Default)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, Error> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(other) => Err(Error::bad_parameter(key, expected("a string", other))),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, Error> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(other) => Err(Error::bad_parameter(key, expected("a boolean", other))),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>, Error> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_i64()
                .map(Some)
                .ok_or_else(|| Error::bad_parameter(key, "expected an integer")),
            Some(other) => Err(Error::bad_parameter(key, expected("an integer", other))),
        }
    }

    pub fn get_str_array(&self, key: &str) -> Result<Option<Vec<String>>, Error> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(text) => out.push(text.to_string()),
                        None => {
                            return Err(Error::bad_parameter(key, expected("an array of strings", item)))
                        }
                    }
                }
                Ok(Some(out))
            }
            Some(other) => Err(Error::bad_parameter(key, expected("an array of strings", other))),
        }
    }
}

fn expected(wanted: &str, got: &Value) -> String {
    let kind = match got {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    format!("expected {wanted}, found {kind}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reserved_keys_and_children() {
        let config = ConfigSection::parse_str(
            r#"{
                "_configName": "example",
                "_urlPatterns": ["^https://example\\.com/"],
                "_removeTags": ["Script", "style"],
                "title": "//h1",
                "question": {
                    "_xpath": "//div[@id='question']",
                    "_removeXPath": ".//div[@class='ad']",
                    "votes": {
                        "_xpaths": ["//span[@class='votes']"],
                        "_forceArray": true
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.config_name, "example");
        assert_eq!(config.url_patterns.len(), 1);
        assert!(config.remove_tags.contains("script"));
        assert!(config.remove_tags.contains("style"));
        assert_eq!(config.children.len(), 2);

        let (name, title) = &config.children[0];
        assert_eq!(name, "title");
        assert_eq!(title.xpath_rules, vec!["//h1"]);

        let (_, question) = &config.children[1];
        assert_eq!(question.remove_xpath_rules.len(), 1);
        let (_, votes) = &question.children[0];
        assert!(votes.force_array);
    }

    #[test]
    fn transformation_forms_are_equivalent() {
        let config = ConfigSection::parse_str(
            r#"{
                "a": { "_xpath": "//a", "_transformation": "trim" },
                "b": { "_xpath": "//b", "_transformations": ["trim", {"_type": "split", "_separator": ";"}] },
                "c": { "_xpath": "//c", "_transformations": [{"_type": "   "}] }
            }"#,
        )
        .unwrap();

        let (_, a) = &config.children[0];
        assert_eq!(a.transformations.len(), 1);
        assert_eq!(a.transformations[0].type_name, "trim");

        let (_, b) = &config.children[1];
        assert_eq!(b.transformations.len(), 2);
        assert_eq!(
            b.transformations[1].attributes.get_str("_separator").unwrap(),
            Some(";")
        );

        // Blank type names are dropped, matching the lenient parse of the rest.
        let (_, c) = &config.children[2];
        assert!(c.transformations.is_empty());
    }

    #[test]
    fn typed_accessors_fail_fast() {
        let config = ConfigSection::parse_str(
            r#"{ "x": { "_xpath": "//x", "_transformation": {"_type": "split", "_trim": "yes"} } }"#,
        )
        .unwrap();
        let (_, x) = &config.children[0];
        let err = x.transformations[0].attributes.get_bool("_trim").unwrap_err();
        assert!(err.to_string().contains("_trim"));
    }

    #[test]
    fn child_order_is_preserved() {
        let config = ConfigSection::parse_str(
            r#"{ "z": "//z", "a": "//a", "m": "//m" }"#,
        )
        .unwrap();
        let names: Vec<&str> = config.children.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }
}
