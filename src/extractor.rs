//! The extraction engine: walks a compiled ruleset in lockstep with a parsed
//! document and produces a JSON value tree.

use std::collections::HashSet;

use ego_tree::NodeId;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ConfigSection;
use crate::dom::{DocNode, Document, PathQuery};
use crate::error::Error;
use crate::transformations::{self, Source, Step};

/// A ruleset compiled for repeated extraction. Immutable once built and
/// shareable across threads; each `extract` call owns its private parsed
/// document, so in-place pruning needs no synchronization.
pub struct StructuredDataExtractor {
    root: CompiledRule,
}

impl StructuredDataExtractor {
    /// Compile a parsed ruleset. Transformation parameters are validated
    /// here; a malformed selector is downgraded to a never-matching one.
    pub fn new(config: &ConfigSection) -> Result<StructuredDataExtractor, Error> {
        Ok(StructuredDataExtractor {
            root: CompiledRule::compile(config)?,
        })
    }

    /// Run the ruleset against a page.
    pub fn extract(&self, html: &str) -> Result<Value, Error> {
        let mut doc = Document::parse(html);
        let root = doc.root();
        self.root.extract(&mut doc, root, &[])
    }
}

/// A selector kept in compiled form, or remembered as broken so it can
/// contribute zero results instead of failing the extraction.
enum RuleQuery {
    Parsed(PathQuery),
    Broken(String),
}

impl RuleQuery {
    fn compile(raw: &str) -> RuleQuery {
        match PathQuery::parse(raw) {
            Ok(query) => RuleQuery::Parsed(query),
            Err(err) => {
                warn!(selector = raw, %err, "ignoring malformed path query");
                RuleQuery::Broken(raw.to_string())
            }
        }
    }

    fn select(&self, doc: &Document, from: NodeId) -> Vec<DocNode> {
        match self {
            RuleQuery::Parsed(query) => query.select(doc, from),
            RuleQuery::Broken(_) => Vec::new(),
        }
    }
}

struct NamedStep {
    type_name: String,
    step: Step,
}

struct CompiledRule {
    remove_tags: HashSet<String>,
    selectors: Vec<RuleQuery>,
    remove_queries: Vec<RuleQuery>,
    steps: Vec<NamedStep>,
    children: Vec<(String, CompiledRule)>,
    force_array: bool,
}

impl CompiledRule {
    fn compile(config: &ConfigSection) -> Result<CompiledRule, Error> {
        let steps = config
            .transformations
            .iter()
            .map(|step| {
                Ok(NamedStep {
                    type_name: step.type_name.clone(),
                    step: transformations::build_step(&step.type_name, &step.attributes)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let children = config
            .children
            .iter()
            .map(|(name, child)| Ok((name.clone(), CompiledRule::compile(child)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(CompiledRule {
            remove_tags: config.remove_tags.clone(),
            selectors: config.xpath_rules.iter().map(|raw| RuleQuery::compile(raw)).collect(),
            remove_queries: config
                .remove_xpath_rules
                .iter()
                .map(|raw| RuleQuery::compile(raw))
                .collect(),
            steps,
            children,
            force_array: config.force_array,
        })
    }

    fn extract(
        &self,
        doc: &mut Document,
        node: NodeId,
        logical_parents: &[NodeId],
    ) -> Result<Value, Error> {
        doc.prune_tags(node, &self.remove_tags);

        let mut results: Vec<Value> = Vec::new();

        if !self.selectors.is_empty() {
            for selector in &self.selectors {
                let matches = selector.select(doc, node);
                if matches.is_empty() {
                    continue;
                }
                debug!(matches = matches.len(), "selector matched");

                // The context node, not the match, extends the chain: that is
                // what lets context-aware transformations step past the
                // immediate selection.
                let mut extended = logical_parents.to_vec();
                extended.push(node);

                for matched in matches {
                    for query in &self.remove_queries {
                        for doomed in query.select(doc, matched.anchor()) {
                            doc.remove(&doomed);
                        }
                    }

                    if !self.children.is_empty() {
                        let object = self.extract_children(doc, matched.anchor(), &extended)?;
                        results.push(Value::Object(object));
                    } else if !self.steps.is_empty() {
                        let value = self.run_chain(doc, &matched, &extended)?;
                        if !value.is_null() {
                            results.push(value);
                        }
                    } else {
                        results.push(Value::String(
                            matched.string_value(doc).trim().to_string(),
                        ));
                    }
                }
            }
        } else {
            // A grouping node: no selection step is consumed, so the current
            // position and context carry through unchanged.
            let object = self.extract_children(doc, node, logical_parents)?;
            results.push(Value::Object(object));
        }

        Ok(if !self.force_array && results.is_empty() {
            Value::Object(Map::new())
        } else if !self.force_array && results.len() == 1 {
            results.remove(0)
        } else {
            Value::Array(results)
        })
    }

    /// Build the object for this rule's children. Empty objects and arrays
    /// are omitted; every scalar, false and empty-string included, is kept.
    fn extract_children(
        &self,
        doc: &mut Document,
        node: NodeId,
        logical_parents: &[NodeId],
    ) -> Result<Map<String, Value>, Error> {
        let mut object = Map::new();
        for (name, child) in &self.children {
            let value = child.extract(doc, node, logical_parents)?;
            match &value {
                Value::Object(map) if map.is_empty() => {}
                Value::Array(items) if items.is_empty() => {}
                _ => {
                    object.insert(name.clone(), value);
                }
            }
        }
        Ok(object)
    }

    /// Run the transformation chain for one matched node. The first step must
    /// be source-capable; every later step must be value-capable. A null
    /// produced mid-chain is passed along as null.
    fn run_chain(
        &self,
        doc: &Document,
        matched: &DocNode,
        logical_parents: &[NodeId],
    ) -> Result<Value, Error> {
        let source = Source {
            doc,
            node: matched,
            logical_parents,
        };

        let mut current: Option<Value> = None;
        for named in &self.steps {
            current = Some(match (current, &named.step) {
                (None, Step::Source(unit)) => unit.transform_node(&source)?,
                (None, Step::Both(unit)) => unit.transform_node(&source)?,
                (Some(value), Step::Value(unit)) => unit.transform_value(value)?,
                (Some(value), Step::Both(unit)) => unit.transform_value(value)?,
                _ => return Err(Error::ChainBroken(named.type_name.clone())),
            });
        }

        Ok(current.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(config: &str, html: &str) -> Value {
        let config = ConfigSection::parse_str(config).unwrap();
        StructuredDataExtractor::new(&config).unwrap().extract(html).unwrap()
    }

    #[test]
    fn single_match_is_unwrapped() {
        let value = extract(r#"{"title": "//h1"}"#, "<h1>Hello</h1>");
        assert_eq!(value, json!({"title": "Hello"}));
    }

    #[test]
    fn zero_matches_yield_an_empty_object_and_the_key_is_omitted() {
        let value = extract(r#"{"title": "//h1"}"#, "<p>no heading</p>");
        assert_eq!(value, json!({}));
    }

    #[test]
    fn multiple_matches_become_an_array() {
        let value = extract(r#"{"items": "//li"}"#, "<ul><li>a</li><li>b</li></ul>");
        assert_eq!(value, json!({"items": ["a", "b"]}));
    }

    #[test]
    fn force_array_wraps_even_single_matches() {
        let config = r#"{"items": {"_xpath": "//li", "_forceArray": true}}"#;
        assert_eq!(
            extract(config, "<ul><li>only</li></ul>"),
            json!({"items": ["only"]})
        );
        assert_eq!(extract(config, "<p>none</p>"), json!({"items": []}));
    }

    #[test]
    fn selectors_accumulate_without_dedup() {
        let config = r#"{"both": {"_xpaths": ["//em", "//em"]}}"#;
        assert_eq!(
            extract(config, "<p><em>once</em></p>"),
            json!({"both": ["once", "once"]})
        );
    }

    #[test]
    fn falsy_scalars_are_kept_by_child_aggregation() {
        let config = r#"{
            "zero": {"_xpath": "//span[@id='z']", "_transformation": "cast-integer"},
            "blank": "//span[@id='b']"
        }"#;
        let value = extract(
            config,
            r#"<span id="z">0</span><span id="b"> </span>"#,
        );
        assert_eq!(value, json!({"zero": 0, "blank": ""}));
    }

    #[test]
    fn remove_tags_prune_before_selection() {
        let config = r#"{"_removeTags": ["script"], "content": "//div"}"#;
        let value = extract(config, "<div>keep<script>drop()</script></div>");
        assert_eq!(value, json!({"content": "keep"}));
    }

    #[test]
    fn remove_xpath_is_scoped_per_matched_node() {
        // Each matched block only loses its own .ad child.
        let config = r#"{"posts": {
            "_xpath": "//div[@class='post']",
            "_removeXPath": ".//span[@class='ad']"
        }}"#;
        let html = r#"
            <div class="post">first<span class="ad">AD1</span></div>
            <div class="post">second<span class="ad">AD2</span></div>
        "#;
        assert_eq!(extract(config, html), json!({"posts": ["first", "second"]}));
    }

    #[test]
    fn grouping_node_shares_position_and_context() {
        let config = r#"{
            "question": {
                "header": {
                    "title": "//h1",
                    "votes": {"_xpath": "//span[@class='v']", "_transformation": "cast-integer"}
                }
            }
        }"#;
        let html = r#"<h1>Q</h1><span class="v">12</span>"#;
        assert_eq!(
            extract(config, html),
            json!({"question": {"header": {"title": "Q", "votes": 12}}})
        );
    }

    #[test]
    fn chain_of_source_then_value_steps() {
        let config = r#"{"title": {
            "_xpath": "//h1",
            "_transformations": ["trim", "collapse-whitespace"]
        }}"#;
        let value = extract(config, "<h1>  Hello   world </h1>");
        assert_eq!(value, json!({"title": "Hello world"}));
    }

    #[test]
    fn source_only_step_in_value_position_breaks_the_chain() {
        let config = ConfigSection::parse_str(
            r#"{"title": {
                "_xpath": "//h1",
                "_transformations": ["collapse-whitespace", "trim"]
            }}"#,
        )
        .unwrap();
        let extractor = StructuredDataExtractor::new(&config).unwrap();
        let err = extractor.extract("<h1>x</h1>").unwrap_err();
        match err {
            Error::ChainBroken(step) => assert_eq!(step, "trim"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn null_chain_results_contribute_nothing() {
        let config = r#"{"views": {"_xpath": "//span", "_transformation": "cast-integer"}}"#;
        assert_eq!(extract(config, "<span>not a number</span>"), json!({}));
    }

    #[test]
    fn unknown_transformation_fails_compilation() {
        let config = ConfigSection::parse_str(
            r#"{"x": {"_xpath": "//x", "_transformation": "frobnicate"}}"#,
        )
        .unwrap();
        assert!(StructuredDataExtractor::new(&config).is_err());
    }

    #[test]
    fn malformed_selector_contributes_zero_results() {
        let config = r#"{"bad": "//div[last()]", "good": "//p"}"#;
        assert_eq!(extract(config, "<p>ok</p>"), json!({"good": "ok"}));
    }

    #[test]
    fn attribute_selection() {
        let config = r#"{"link": "//a/@href"}"#;
        assert_eq!(
            extract(config, r#"<a href="/thread/42">go</a>"#),
            json!({"link": "/thread/42"})
        );
    }

    #[test]
    fn nested_rules_select_relative_to_their_parent_match() {
        let config = r#"{
            "answers": {
                "_xpath": "//div[@class='answer']",
                "_forceArray": true,
                "author": ".//span[@class='author']",
                "body": ".//p"
            }
        }"#;
        let html = r#"
            <div class="answer"><span class="author">ann</span><p>first</p></div>
            <div class="answer"><span class="author">bob</span><p>second</p></div>
        "#;
        assert_eq!(
            extract(config, html),
            json!({"answers": [
                {"author": "ann", "body": "first"},
                {"author": "bob", "body": "second"}
            ]})
        );
    }
}
