//! Context-aware transformations that look outside the matched node, using
//! the chain of selection-context nodes threaded through the extraction.

use ego_tree::NodeId;
use serde_json::Value;

use crate::config::Params;
use crate::dom::{Document, NodeKind, PathQuery};
use crate::error::Error;

use super::{FromNode, Source};

/// Tags a list heading may be made of, applied recursively to the candidate
/// subtree.
const TITLE_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "h7", "h8", "h9", "h10", "span", "div", "b", "em",
    "strong", "i", "p", "a",
];

/// `list-title`: walk preceding siblings of the matched node outward and
/// return the first heading-like candidate's trimmed text.
///
/// Empty text nodes and comments are skipped without consuming a step. A
/// first candidate longer than `_maxTitleLength` ends the search empty.
pub struct ListTitle {
    max_steps: usize,
    max_title_length: usize,
}

impl ListTitle {
    pub fn from_params(params: &Params) -> Result<ListTitle, Error> {
        Ok(ListTitle {
            max_steps: read_limit(params, "_maxStepsUpward", 3)?,
            max_title_length: read_limit(params, "_maxTitleLength", 200)?,
        })
    }

    fn allowed_recursive(doc: &Document, id: NodeId) -> bool {
        match doc.kind(id) {
            NodeKind::Text => true,
            NodeKind::Element => {
                let allowed = doc
                    .tag_name(id)
                    .is_some_and(|tag| TITLE_TAGS.contains(&tag.to_ascii_lowercase().as_str()));
                allowed && doc.children(id).iter().all(|child| Self::allowed_recursive(doc, *child))
            }
            _ => false,
        }
    }
}

impl FromNode for ListTitle {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        let doc = source.doc;
        let mut sibling: Option<NodeId> = None;
        let mut steps = 0usize;

        loop {
            steps += 1;
            sibling = match sibling {
                Some(current) => doc.prev_sibling(current),
                None => doc.prev_sibling(source.anchor()),
            };

            if let Some(candidate) = sibling {
                if Self::allowed_recursive(doc, candidate) {
                    let text = doc.text_content(candidate);
                    if !text.trim().is_empty() {
                        let title = text.trim().to_string();
                        if title.chars().count() <= self.max_title_length {
                            return Ok(Value::String(title));
                        }
                        // The first real candidate was oversized; stop here.
                        return Ok(Value::Null);
                    }
                }
                // Blank text and comments are free: they do not use up a step.
                if matches!(doc.kind(candidate), NodeKind::Text | NodeKind::Comment) {
                    steps = steps.saturating_sub(1);
                }
            }

            if sibling.is_none() || steps >= self.max_steps {
                return Ok(Value::Null);
            }
        }
    }
}

/// `text-length-above-list`: total length of all preceding-sibling text
/// between the matched node and the parent of its immediate selection
/// context, walking upward. Used as a "how much lead-in prose preceded this
/// list" signal.
pub struct TextLengthAboveList {
    starting_query: Option<PathQuery>,
}

impl TextLengthAboveList {
    pub fn from_params(params: &Params) -> Result<TextLengthAboveList, Error> {
        let starting_query = match params.get_str("_startingXPath")? {
            Some(raw) => Some(
                PathQuery::parse(raw)
                    .map_err(|err| Error::bad_parameter("_startingXPath", err.to_string()))?,
            ),
            None => None,
        };
        Ok(TextLengthAboveList { starting_query })
    }

    /// Text of the preceding siblings of `node`, stopping note: if the anchor
    /// itself is among them, the walk above this level is over.
    fn preceding_sibling_text(
        doc: &Document,
        node: NodeId,
        anchor: NodeId,
        found_anchor: &mut bool,
    ) -> String {
        let mut collected = String::new();
        let mut sibling = doc.prev_sibling(node);

        while let Some(current) = sibling {
            if current == anchor {
                *found_anchor = true;
            } else {
                let text = doc.text_content(current);
                if !text.trim().is_empty() {
                    collected.push_str(text.trim());
                    collected.push(' ');
                }
            }
            sibling = doc.prev_sibling(current);
        }

        collected.trim().to_string()
    }
}

impl FromNode for TextLengthAboveList {
    fn transform_node(&self, source: &Source<'_>) -> Result<Value, Error> {
        let doc = source.doc;
        let parents = source.logical_parents;

        if parents.len() < 2 {
            return Ok(Value::from(0));
        }

        // The immediate context is the list itself; the anchor for the walk
        // is the context that selected the list.
        let mut anchor = parents[parents.len() - 2];
        if let Some(query) = &self.starting_query {
            match query
                .select(doc, anchor)
                .into_iter()
                .find_map(|node| node.element_id())
            {
                Some(reanchored) => anchor = reanchored,
                None => return Ok(Value::from(0)),
            }
        }

        let mut collected = String::new();
        let mut found_anchor = false;
        let mut current = Some(source.anchor());

        while let Some(node) = current {
            if node == anchor || found_anchor {
                break;
            }
            let text = Self::preceding_sibling_text(doc, node, anchor, &mut found_anchor);
            if !text.is_empty() {
                collected.push_str(&text);
                collected.push(' ');
            }
            current = doc.parent(node);
        }

        Ok(Value::from(collected.trim().chars().count() as i64))
    }
}

/// Read a non-negative integer limit parameter.
fn read_limit(params: &Params, key: &str, default: usize) -> Result<usize, Error> {
    match params.get_i64(key)? {
        None => Ok(default),
        Some(value) if value >= 0 => Ok(value as usize),
        Some(_) => Err(Error::bad_parameter(key, "must not be negative")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DocNode;

    fn first_match(doc: &Document, query: &str) -> DocNode {
        PathQuery::parse(query)
            .unwrap()
            .select(doc, doc.root())
            .into_iter()
            .next()
            .unwrap()
    }

    fn run(doc: &Document, node: &DocNode, parents: &[NodeId], unit: &dyn FromNode) -> Value {
        unit.transform_node(&Source {
            doc,
            node,
            logical_parents: parents,
        })
        .unwrap()
    }

    #[test]
    fn list_title_takes_the_nearest_heading() {
        let doc = Document::parse(
            "<div><p>Intro prose.</p><h3>Steps</h3><ul><li>a</li></ul></div>",
        );
        let list = first_match(&doc, "//ul");
        let unit = ListTitle::from_params(&Params::default()).unwrap();
        assert_eq!(run(&doc, &list, &[], &unit), Value::String("Steps".to_string()));
    }

    #[test]
    fn list_title_skips_blank_text_without_spending_steps() {
        let doc = Document::parse(
            "<div><h3>Title</h3>\n\n<table><tr><td>x</td></tr></table>\n<ul><li>a</li></ul></div>",
        );
        let list = first_match(&doc, "//ul");
        // One step is burned on the table; the blank text nodes are free.
        let unit = ListTitle::from_params(&Params::default()).unwrap();
        assert_eq!(run(&doc, &list, &[], &unit), Value::String("Title".to_string()));
    }

    #[test]
    fn list_title_rejects_disallowed_candidates() {
        let doc = Document::parse("<div><table><tr><td>not a title</td></tr></table><ul><li>a</li></ul></div>");
        let list = first_match(&doc, "//ul");
        let unit = ListTitle::from_params(&Params::default()).unwrap();
        assert_eq!(run(&doc, &list, &[], &unit), Value::Null);
    }

    #[test]
    fn list_title_null_when_first_candidate_is_oversized() {
        let long = "x".repeat(300);
        let doc = Document::parse(&format!("<div><h3>{long}</h3><ul><li>a</li></ul></div>"));
        let list = first_match(&doc, "//ul");
        let unit = ListTitle::from_params(&Params::default()).unwrap();
        assert_eq!(run(&doc, &list, &[], &unit), Value::Null);
    }

    #[test]
    fn text_length_counts_lead_in_prose() {
        let doc = Document::parse(
            "<div id='answer'><p>Some lead-in text.</p><ul><li>step</li></ul></div>",
        );
        let answer = first_match(&doc, "//div[@id='answer']");
        let list = first_match(&doc, "//ul");
        // Logical parents as the engine would build them: the context that
        // selected the answer, then the answer as the list's context.
        let parents = vec![doc.root(), answer.anchor()];
        let unit = TextLengthAboveList::from_params(&Params::default()).unwrap();
        let value = run(&doc, &list, &parents, &unit);
        assert_eq!(value, Value::from("Some lead-in text.".chars().count() as i64));
    }

    #[test]
    fn text_length_is_zero_without_enough_context() {
        let doc = Document::parse("<ul><li>step</li></ul>");
        let list = first_match(&doc, "//ul");
        let unit = TextLengthAboveList::from_params(&Params::default()).unwrap();
        assert_eq!(run(&doc, &list, &[], &unit), Value::from(0));
    }

    #[test]
    fn text_length_reanchors_with_starting_query() {
        let doc = Document::parse(
            "<div id='outer'><div id='inner'><p>before the list</p><div id='holder'><ul><li>x</li></ul></div></div></div>",
        );
        let list = first_match(&doc, "//ul");
        let holder = first_match(&doc, "//div[@id='holder']");
        let parents = vec![doc.root(), doc.root(), holder.anchor()];
        let config = crate::config::ConfigSection::parse_str(
            r#"{ "x": { "_xpath": "//x", "_transformation": {"_type": "text-length-above-list", "_startingXPath": ".//div[@id='inner']"} } }"#,
        )
        .unwrap();
        let (_, x) = &config.children[0];
        let unit = TextLengthAboveList::from_params(&x.transformations[0].attributes).unwrap();
        let value = run(&doc, &list, &parents, &unit);
        assert_eq!(value, Value::from("before the list".chars().count() as i64));
    }
}
