//! Path-query compiler and evaluator.
//!
//! Rulesets locate nodes with XPath-flavored path strings. This module
//! evaluates the subset those rulesets actually use, directly against the
//! document tree: `//` and `/` axes, `.`-relative prefixes, `..`, name tests,
//! `*`, terminal `text()` and `@attr`, and the predicates `[n]`, `[@a]`,
//! `[@a='v']` and `[contains(@a,'v')]`.
//!
//! Results are in document order and deduplicated within one query, like an
//! XPath node-set. Positional predicates select within the step's full result
//! for each context node, i.e. `//div[1]` behaves like `(//div)[1]` per
//! context.

use std::collections::HashSet;

use ego_tree::NodeId;

use crate::dom::{DocNode, Document, NodeKind};
use crate::error::Error;

/// A compiled path query.
#[derive(Debug, Clone)]
pub struct PathQuery {
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone)]
enum NodeTest {
    /// Element with a given (lowercase) tag name.
    Name(String),
    /// Any element.
    AnyElement,
    /// Text nodes.
    Text,
    /// An attribute of the context node(s).
    Attribute(String),
    /// Step up to the parent node (`..`).
    Parent,
}

#[derive(Debug, Clone)]
enum Predicate {
    /// 1-based position within the step result for one context.
    Index(usize),
    HasAttr(String),
    AttrEq(String, String),
    AttrContains(String, String),
}

impl PathQuery {
    /// Compile a path-query string. Unsupported syntax is an error; the
    /// extraction engine downgrades that to a never-matching selector.
    pub fn parse(raw: &str) -> Result<PathQuery, Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("empty path query".to_string()));
        }

        // "." and "./…" anchor at the current node, which is already the
        // evaluation context; ".." must survive as a step of its own.
        let mut rest = if trimmed == "." {
            ""
        } else if trimmed.starts_with("./") && !trimmed.starts_with("..") {
            &trimmed[1..]
        } else {
            trimmed
        };

        let mut steps = Vec::new();
        let mut first = true;

        while !rest.is_empty() {
            let axis = if let Some(after) = rest.strip_prefix("//") {
                rest = after;
                Axis::Descendant
            } else if let Some(after) = rest.strip_prefix('/') {
                rest = after;
                Axis::Child
            } else if first {
                Axis::Child
            } else {
                return Err(Error::Config(format!("unexpected token in path query {raw}")));
            };
            first = false;

            if rest.is_empty() {
                return Err(Error::Config(format!("path query {raw} ends with a separator")));
            }

            let (segment, remainder) = split_segment(rest);
            rest = remainder;
            steps.push(parse_segment(segment, axis, raw)?);
        }

        Ok(PathQuery { steps })
    }

    /// Evaluate against `from`, returning matches in document order.
    pub fn select(&self, doc: &Document, from: NodeId) -> Vec<DocNode> {
        let mut contexts = vec![DocNode::Element(from)];

        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen: HashSet<DocNode> = HashSet::new();
            for context in &contexts {
                let Some(base) = context.element_id() else {
                    continue;
                };
                for found in step.apply(doc, base) {
                    if seen.insert(found.clone()) {
                        next.push(found);
                    }
                }
            }
            contexts = next;
        }

        contexts
    }
}

impl Step {
    fn apply(&self, doc: &Document, base: NodeId) -> Vec<DocNode> {
        let mut found = Vec::new();

        match &self.test {
            NodeTest::Parent => {
                if let Some(parent) = doc.parent(base) {
                    found.push(DocNode::Element(parent));
                }
            }
            NodeTest::Attribute(name) => {
                let candidates = match self.axis {
                    Axis::Child => vec![base],
                    Axis::Descendant => doc.descendants(base, true),
                };
                for id in candidates {
                    if doc.attr(id, name).is_some() {
                        found.push(DocNode::Attr {
                            owner: id,
                            name: name.clone(),
                        });
                    }
                }
            }
            NodeTest::Text => {
                for id in self.candidates(doc, base) {
                    if doc.kind(id) == NodeKind::Text {
                        found.push(DocNode::Text(id));
                    }
                }
            }
            NodeTest::Name(_) | NodeTest::AnyElement => {
                for id in self.candidates(doc, base) {
                    let Some(tag) = doc.tag_name(id) else {
                        continue;
                    };
                    let hit = match &self.test {
                        NodeTest::Name(name) => tag.eq_ignore_ascii_case(name),
                        _ => true,
                    };
                    if hit {
                        found.push(DocNode::Element(id));
                    }
                }
            }
        }

        for predicate in &self.predicates {
            found = predicate.filter(doc, found);
        }

        found
    }

    fn candidates(&self, doc: &Document, base: NodeId) -> Vec<NodeId> {
        match self.axis {
            Axis::Child => doc.children(base),
            Axis::Descendant => doc.descendants(base, false),
        }
    }
}

impl Predicate {
    fn filter(&self, doc: &Document, found: Vec<DocNode>) -> Vec<DocNode> {
        match self {
            Predicate::Index(position) => {
                if *position >= 1 && *position <= found.len() {
                    vec![found[*position - 1].clone()]
                } else {
                    Vec::new()
                }
            }
            Predicate::HasAttr(name) => found
                .into_iter()
                .filter(|node| self.attr_of(doc, node, name).is_some())
                .collect(),
            Predicate::AttrEq(name, value) => found
                .into_iter()
                .filter(|node| self.attr_of(doc, node, name) == Some(value.as_str()))
                .collect(),
            Predicate::AttrContains(name, value) => found
                .into_iter()
                .filter(|node| {
                    self.attr_of(doc, node, name).is_some_and(|attr| attr.contains(value.as_str()))
                })
                .collect(),
        }
    }

    fn attr_of<'a>(&self, doc: &'a Document, node: &DocNode, name: &str) -> Option<&'a str> {
        doc.attr(node.element_id()?, name)
    }
}

/// Split off the next step segment at the first `/` outside brackets/quotes.
fn split_segment(input: &str) -> (&str, &str) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (index, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => return (&input[..index], &input[index..]),
            _ => {}
        }
    }

    (input, "")
}

fn parse_segment(segment: &str, axis: Axis, raw: &str) -> Result<Step, Error> {
    let segment = segment.trim();
    let (name_part, mut predicate_part) = match segment.find('[') {
        Some(index) => (&segment[..index], &segment[index..]),
        None => (segment, ""),
    };

    let test = parse_node_test(name_part.trim(), raw)?;

    let mut predicates = Vec::new();
    while !predicate_part.is_empty() {
        let Some(stripped) = predicate_part.strip_prefix('[') else {
            return Err(Error::Config(format!("malformed predicate in path query {raw}")));
        };
        let Some(end) = find_predicate_end(stripped) else {
            return Err(Error::Config(format!("unterminated predicate in path query {raw}")));
        };
        predicates.push(parse_predicate(&stripped[..end], raw)?);
        predicate_part = &stripped[end + 1..];
    }

    if matches!(test, NodeTest::Parent) && !predicates.is_empty() {
        return Err(Error::Config(format!("predicates on .. are unsupported in {raw}")));
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

fn parse_node_test(name: &str, raw: &str) -> Result<NodeTest, Error> {
    if name == ".." {
        return Ok(NodeTest::Parent);
    }
    if name == "*" {
        return Ok(NodeTest::AnyElement);
    }
    if name == "text()" {
        return Ok(NodeTest::Text);
    }
    if let Some(attr) = name.strip_prefix('@') {
        if attr.is_empty() {
            return Err(Error::Config(format!("empty attribute name in path query {raw}")));
        }
        return Ok(NodeTest::Attribute(attr.to_string()));
    }
    if !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ':'))
    {
        return Ok(NodeTest::Name(name.to_ascii_lowercase()));
    }
    Err(Error::Config(format!("unsupported node test {name:?} in path query {raw}")))
}

/// Find the `]` that closes the current predicate, honoring quotes.
fn find_predicate_end(input: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (index, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, ']') => return Some(index),
            _ => {}
        }
    }
    None
}

fn parse_predicate(inner: &str, raw: &str) -> Result<Predicate, Error> {
    let inner = inner.trim();

    if !inner.is_empty() && inner.chars().all(|ch| ch.is_ascii_digit()) {
        let position: usize = inner
            .parse()
            .map_err(|_| Error::Config(format!("bad position predicate in path query {raw}")))?;
        if position == 0 {
            return Err(Error::Config(format!("positions are 1-based in path query {raw}")));
        }
        return Ok(Predicate::Index(position));
    }

    if let Some(call) = inner.strip_prefix("contains(").and_then(|s| s.strip_suffix(')')) {
        let (left, right) = call
            .split_once(',')
            .ok_or_else(|| Error::Config(format!("malformed contains() in path query {raw}")))?;
        let attr = left
            .trim()
            .strip_prefix('@')
            .ok_or_else(|| Error::Config(format!("contains() needs an @attribute in {raw}")))?;
        let value = unquote(right.trim())
            .ok_or_else(|| Error::Config(format!("contains() needs a quoted value in {raw}")))?;
        return Ok(Predicate::AttrContains(attr.to_string(), value.to_string()));
    }

    if let Some(body) = inner.strip_prefix('@') {
        return match body.split_once('=') {
            Some((name, value)) => {
                let value = unquote(value.trim())
                    .ok_or_else(|| Error::Config(format!("attribute value must be quoted in {raw}")))?;
                Ok(Predicate::AttrEq(name.trim().to_string(), value.to_string()))
            }
            None => Ok(Predicate::HasAttr(body.trim().to_string())),
        };
    }

    Err(Error::Config(format!("unsupported predicate [{inner}] in path query {raw}")))
}

fn unquote(text: &str) -> Option<&str> {
    let mut chars = text.chars();
    let open = chars.next()?;
    if (open == '\'' || open == '"') && text.len() >= 2 && text.ends_with(open) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}
