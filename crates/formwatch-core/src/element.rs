//! # Element and Document Model
//!
//! A minimal, owned element tree standing in for the host page. It is
//! enough to resolve regions, match selectors against event targets,
//! and read declarative `data-*` configuration from a region element.
//!
//! Elements placed in a [`Document`] receive a [`NodeId`] in pre-order.
//! Clones keep it, so an event target cloned out of the document still
//! says which node it came from. Elements built outside a document have
//! no identity and compare by content.
//!
//! Documents load from YAML or JSON. The top-level value is the root
//! element:
//!
//! ```yaml
//! tag: form
//! attributes: { id: profile, data-status-message: "Unsaved!" }
//! children:
//!   - tag: input
//!     attributes: { id: name, type: text }
//!   - tag: button
//!     attributes: { type: submit }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FormwatchError;
use crate::selector::Selector;

/// Tags whose elements emit field-mutation events (`:input` in jQuery terms).
pub const INPUT_CAPABLE_TAGS: [&str; 4] = ["input", "select", "textarea", "button"];

/// Position of an element in its document, numbered in pre-order from
/// the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// A single element: tag, attributes, optional text, and children.
///
/// Equality compares content only; node identity is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Element {
    /// Tag name, matched case-insensitively.
    pub tag: String,
    /// Attributes by name. `id` and `class` are ordinary attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    /// Text content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Child elements in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
    #[serde(skip)]
    pub(crate) node: Option<NodeId>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.attributes == other.attributes
            && self.text == other.text
            && self.children == other.children
    }
}

impl Eq for Element {}

impl Element {
    /// Create an element with the given tag (lowercased) and nothing else.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Builder: set an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder: set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Whether the attribute is present (with any value).
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// The `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    /// Whether the `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Whether this element can emit keyup/change/input events.
    pub fn is_input_capable(&self) -> bool {
        INPUT_CAPABLE_TAGS
            .iter()
            .any(|t| self.tag.eq_ignore_ascii_case(t))
    }

    /// This element's position in its document, if it belongs to one.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    /// `data-*` attributes in name order.
    pub fn data_attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter(|(k, _)| k.starts_with("data-"))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All descendants in pre-order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        for child in &self.children {
            collect_preorder(child, &mut out);
        }
        out
    }

    /// Whether `target` is this element or one of its descendants.
    ///
    /// When both sides come from a document the check is by node
    /// identity, so identical fields in sibling regions stay apart.
    /// Otherwise it falls back to content equality.
    pub fn contains(&self, target: &Element) -> bool {
        match (self.node, target.node) {
            (Some(_), Some(id)) => self.contains_node(id),
            _ => self.contains_equal(target),
        }
    }

    fn contains_node(&self, id: NodeId) -> bool {
        self.node == Some(id) || self.children.iter().any(|c| c.contains_node(id))
    }

    fn contains_equal(&self, target: &Element) -> bool {
        self == target || self.children.iter().any(|c| c.contains_equal(target))
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag)?;
        if let Some(id) = self.id() {
            write!(f, "#{id}")?;
        }
        for class in self.classes() {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

fn collect_preorder<'a>(el: &'a Element, out: &mut Vec<&'a Element>) {
    out.push(el);
    for child in &el.children {
        collect_preorder(child, out);
    }
}

fn number_nodes(el: &mut Element, next: &mut usize) {
    el.node = Some(NodeId(*next));
    *next += 1;
    for child in &mut el.children {
        number_nodes(child, next);
    }
}

/// A page: a single root element tree with numbered nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Element", into = "Element")]
pub struct Document {
    /// The document root.
    pub root: Element,
}

impl From<Element> for Document {
    fn from(root: Element) -> Self {
        Self::new(root)
    }
}

impl From<Document> for Element {
    fn from(document: Document) -> Self {
        document.root
    }
}

impl Document {
    /// Wrap a root element, assigning node ids in pre-order.
    pub fn new(mut root: Element) -> Self {
        let mut next = 0;
        number_nodes(&mut root, &mut next);
        Self { root }
    }

    /// Load a document from YAML.
    pub fn from_yaml(input: &str) -> Result<Self, FormwatchError> {
        let root: Element = serde_yaml::from_str(input)?;
        Ok(Self::new(root))
    }

    /// Load a document from JSON.
    pub fn from_json(input: &str) -> Result<Self, FormwatchError> {
        let root: Element = serde_json::from_str(input)?;
        Ok(Self::new(root))
    }

    /// Every element matching `selector`, root included, in pre-order.
    pub fn select_all(&self, selector: &Selector) -> Vec<&Element> {
        let mut all = Vec::new();
        collect_preorder(&self.root, &mut all);
        all.into_iter().filter(|e| selector.matches(e)).collect()
    }

    /// Parse `selector` and return every match, root included.
    pub fn query(&self, selector: &str) -> Result<Vec<&Element>, FormwatchError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(&selector))
    }

    /// First element matching `selector` in pre-order.
    pub fn select_first(&self, selector: &Selector) -> Option<&Element> {
        self.select_all(selector).into_iter().next()
    }
}
