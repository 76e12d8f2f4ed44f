//! Mutable HTML document handle and match-node model.
//!
//! Wraps `scraper::Html` behind node-id navigation so the extraction engine
//! can prune subtrees in place while it walks. A parsed document is owned by
//! exactly one extraction call; compiled rules never hold node ids across
//! documents.

mod query;

pub use query::PathQuery;

use std::collections::HashSet;

use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node};

/// Coarse node classification used by sibling walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Other,
}

/// A node produced by a path query: an element, a text node, or an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocNode {
    Element(NodeId),
    Text(NodeId),
    Attr { owner: NodeId, name: String },
}

impl DocNode {
    /// The tree node this match lives on; attributes anchor on their owner.
    pub fn anchor(&self) -> NodeId {
        match self {
            DocNode::Element(id) | DocNode::Text(id) => *id,
            DocNode::Attr { owner, .. } => *owner,
        }
    }

    /// The element id, if this match can be navigated further.
    pub fn element_id(&self) -> Option<NodeId> {
        match self {
            DocNode::Element(id) => Some(*id),
            _ => None,
        }
    }

    /// XPath-style string value: concatenated text for elements and text
    /// nodes, the attribute value for attributes.
    pub fn string_value(&self, doc: &Document) -> String {
        match self {
            DocNode::Element(id) | DocNode::Text(id) => doc.text_content(*id),
            DocNode::Attr { owner, name } => doc.attr(*owner, name).unwrap_or_default().to_string(),
        }
    }
}

/// An owned, in-place mutable HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse an HTML page. The html5ever front end is error-tolerant, so even
    /// malformed input yields a (possibly empty) document tree.
    pub fn parse(html: &str) -> Document {
        Document {
            html: Html::parse_document(html),
        }
    }

    /// Id of the document root node.
    pub fn root(&self) -> NodeId {
        self.html.tree.root().id()
    }

    fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.html.tree.get(id)
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        match self.node(id).map(|n| n.value()) {
            Some(Node::Element(_)) => NodeKind::Element,
            Some(Node::Text(_)) => NodeKind::Text,
            Some(Node::Comment(_)) => NodeKind::Comment,
            _ => NodeKind::Other,
        }
    }

    /// Tag name of an element node.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.node(id)?.value().as_element().map(|el| el.name())
    }

    /// Attribute value of an element node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)?.value().as_element()?.attr(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        Some(self.node(id)?.parent()?.id())
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        Some(self.node(id)?.prev_sibling()?.id())
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            Some(node) => node.children().map(|child| child.id()).collect(),
            None => Vec::new(),
        }
    }

    /// Descendants in document order, optionally including `id` itself.
    pub fn descendants(&self, id: NodeId, include_self: bool) -> Vec<NodeId> {
        match self.node(id) {
            Some(node) => node
                .descendants()
                .skip(if include_self { 0 } else { 1 })
                .map(|n| n.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Concatenated text of all text nodes at or below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.node(id) {
            for descendant in node.descendants() {
                if let Some(text) = descendant.value().as_text() {
                    out.push_str(text);
                }
            }
        }
        out
    }

    /// Every text node at or below `id`, in document order.
    pub fn descendant_texts(&self, id: NodeId) -> Vec<String> {
        match self.node(id) {
            Some(node) => node
                .descendants()
                .filter_map(|n| n.value().as_text().map(|t| t.to_string()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Detach every descendant element whose tag name is in `tags`
    /// (lowercase). Detached subtrees are invisible to later selection.
    pub fn prune_tags(&mut self, root: NodeId, tags: &HashSet<String>) {
        if tags.is_empty() {
            return;
        }
        let doomed: Vec<NodeId> = match self.node(root) {
            Some(node) => node
                .descendants()
                .skip(1)
                .filter(|n| {
                    n.value()
                        .as_element()
                        .is_some_and(|el| tags.contains(&el.name().to_ascii_lowercase()))
                })
                .map(|n| n.id())
                .collect(),
            None => return,
        };
        for id in doomed {
            if let Some(mut node) = self.html.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    /// Remove a matched node: elements and text detach their subtree,
    /// attribute matches drop the attribute from the owning element.
    pub fn remove(&mut self, node: &DocNode) {
        match node {
            DocNode::Element(id) | DocNode::Text(id) => {
                if let Some(mut target) = self.html.tree.get_mut(*id) {
                    target.detach();
                }
            }
            DocNode::Attr { owner, name } => {
                if let Some(mut target) = self.html.tree.get_mut(*owner) {
                    if let Node::Element(element) = target.value() {
                        element.attrs.retain(|key, _| &key.local[..] != name.as_str());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_by_tag(doc: &Document, tag: &str) -> NodeId {
        doc.descendants(doc.root(), false)
            .into_iter()
            .find(|id| doc.tag_name(*id) == Some(tag))
            .unwrap()
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let doc = Document::parse("<div>keep <b>bold</b> tail</div>");
        let div = first_by_tag(&doc, "div");
        assert_eq!(doc.text_content(div), "keep bold tail");
    }

    #[test]
    fn prune_tags_removes_subtrees() {
        let mut doc = Document::parse("<div>keep<script>drop()</script></div>");
        let root = doc.root();
        let tags: HashSet<String> = ["script".to_string()].into_iter().collect();
        doc.prune_tags(root, &tags);
        let div = first_by_tag(&doc, "div");
        assert_eq!(doc.text_content(div), "keep");
    }

    #[test]
    fn remove_attr_match_drops_attribute() {
        let mut doc = Document::parse(r#"<a href="/x" rel="nofollow">link</a>"#);
        let a = first_by_tag(&doc, "a");
        doc.remove(&DocNode::Attr {
            owner: a,
            name: "rel".to_string(),
        });
        assert_eq!(doc.attr(a, "rel"), None);
        assert_eq!(doc.attr(a, "href"), Some("/x"));
    }
}
