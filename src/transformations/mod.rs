//! Value transformations and their registry.
//!
//! A transformation is a stateless unit built once from its configuration
//! parameters. Capabilities are explicit: source-capable units read the
//! matched document node, value-capable units refine a previously produced
//! value, and some do both. The chain runner dispatches on the [`Step`]
//! tag — there is no runtime type discovery.

mod capture;
mod context;
mod dates;
mod numbers;
mod text;

use std::collections::HashMap;
use std::sync::LazyLock;

use ego_tree::NodeId;
use serde_json::Value;

use crate::config::Params;
use crate::dom::{DocNode, Document};
use crate::error::Error;

/// The matched node a source-capable transformation reads from, together with
/// the chain of selection-context nodes accumulated during recursion.
pub struct Source<'a> {
    pub doc: &'a Document,
    pub node: &'a DocNode,
    pub logical_parents: &'a [NodeId],
}

impl Source<'_> {
    /// The match's string value, as the query engine defines it.
    pub fn text(&self) -> String {
        self.node.string_value(self.doc)
    }

    /// Tree node the match anchors on (attributes anchor on their owner).
    pub fn anchor(&self) -> NodeId {
        self.node.anchor()
    }
}

/// Source-capable: derives a value from the matched document node.
pub trait FromNode: Send + Sync {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error>;
}

/// Value-capable: refines a previously produced value.
pub trait FromValue: Send + Sync {
    fn transform_value(&self, input: Value) -> Result<Value, Error>;
}

/// Both capabilities on one unit.
pub trait Transformation: FromNode + FromValue {}

impl<T: FromNode + FromValue> Transformation for T {}

/// A compiled chain step, tagged by capability.
pub enum Step {
    Source(Box<dyn FromNode>),
    Value(Box<dyn FromValue>),
    Both(Box<dyn Transformation>),
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Source(_) => f.write_str("Step::Source(..)"),
            Step::Value(_) => f.write_str("Step::Value(..)"),
            Step::Both(_) => f.write_str("Step::Both(..)"),
        }
    }
}

type Factory = fn(&Params) -> Result<Step, Error>;

/// Explicit name → factory table for every shipped transformation.
static REGISTRY: LazyLock<HashMap<&'static str, Factory>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, Factory> = HashMap::new();
    table.insert("trim", |_| Ok(Step::Source(Box::new(text::Trim))));
    table.insert("extract-text", |_| Ok(Step::Source(Box::new(text::ExtractText))));
    table.insert("collapse-whitespace", |_| {
        Ok(Step::Both(Box::new(text::CollapseWhitespace)))
    });
    table.insert("decode-entities", |_| Ok(Step::Both(Box::new(text::DecodeEntities))));
    table.insert("encode-entities", |_| Ok(Step::Both(Box::new(text::EncodeEntities))));
    table.insert("url-decode", |_| Ok(Step::Both(Box::new(text::UrlDecode))));
    table.insert("url-encode", |_| Ok(Step::Both(Box::new(text::UrlEncode))));
    table.insert("split", |params| {
        Ok(Step::Source(Box::new(text::Split::from_params(params)?)))
    });
    table.insert("cast-integer", |_| Ok(Step::Source(Box::new(numbers::CastInteger))));
    table.insert("extract-integer", |_| {
        Ok(Step::Source(Box::new(numbers::ExtractInteger)))
    });
    table.insert("abbreviated-number", |_| {
        Ok(Step::Source(Box::new(numbers::AbbreviatedNumber)))
    });
    table.insert("parse-date", |params| {
        Ok(Step::Both(Box::new(dates::ParseDate::from_params(params)?)))
    });
    table.insert("regex", |params| {
        Ok(Step::Source(Box::new(capture::RegexCapture::from_params(params)?)))
    });
    table.insert("list-title", |params| {
        Ok(Step::Source(Box::new(context::ListTitle::from_params(params)?)))
    });
    table.insert("text-length-above-list", |params| {
        Ok(Step::Source(Box::new(context::TextLengthAboveList::from_params(
            params,
        )?)))
    });
    table
});

/// Build a chain step from its registry key and parameters. Parameters are
/// validated here, so authoring mistakes surface before any page is parsed.
pub fn build_step(type_name: &str, params: &Params) -> Result<Step, Error> {
    let factory = REGISTRY
        .get(type_name)
        .ok_or_else(|| Error::UnknownTransformation(type_name.to_string()))?;
    factory(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_build() {
        for name in [
            "trim",
            "extract-text",
            "collapse-whitespace",
            "decode-entities",
            "encode-entities",
            "url-decode",
            "url-encode",
            "split",
            "cast-integer",
            "extract-integer",
            "abbreviated-number",
            "parse-date",
            "list-title",
            "text-length-above-list",
        ] {
            assert!(build_step(name, &Params::default()).is_ok(), "{name}");
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = build_step("frobnicate", &Params::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownTransformation(_)));
    }

    #[test]
    fn regex_requires_its_pattern() {
        let err = build_step("regex", &Params::default()).unwrap_err();
        assert!(err.to_string().contains("_regex"));
    }
}
