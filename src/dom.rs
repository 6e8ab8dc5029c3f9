//! Typed DOM boundary shared by every page behavior.
//!
//! Behaviors never query the host document ad hoc. They talk to a [`Dom`]
//! implementation and resolve the elements they need exactly once, at bind
//! time, into a [`Binding`]. An element that is absent from the page yields
//! [`Binding::Unbound`] and the behavior simply stays inactive.
//!
//! Two implementations exist: [`Document`], an in-memory element tree used by
//! the simulator and the tests, and the `web-sys` backed `WebDom` compiled for
//! `wasm32` targets.

use std::collections::BTreeMap;
use std::fmt;

/// Operations the page behaviors need from a document.
///
/// Mutating methods take `&mut self` even though browser DOM handles are
/// internally mutable; this keeps the in-memory document honest and makes the
/// ownership of page state explicit.
pub trait Dom {
    /// Handle to a single element.
    type Node: Clone + PartialEq + fmt::Debug;

    /// The document element (`<html>`).
    fn root(&self) -> Option<Self::Node>;
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;
    /// All elements carrying `class`, in document order.
    fn elements_with_class(&self, class: &str) -> Vec<Self::Node>;
    /// All elements whose tag name is one of `tags`, in document order.
    fn elements_with_tags(&self, tags: &[&str]) -> Vec<Self::Node>;
    /// Descendants of `scope` with the given tag name, in document order.
    fn descendants_with_tag(&self, scope: &Self::Node, tag: &str) -> Vec<Self::Node>;
    /// Direct element children of `node`.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    /// True when `node` is `ancestor` or lies inside it.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;
    /// Add `class` when `on` is true, remove it otherwise.
    fn set_class(&mut self, node: &Self::Node, class: &str, on: bool);

    /// Text content of `node` and all of its descendants.
    fn text(&self, node: &Self::Node) -> String;
    /// Replace the content of `node` with a single text run.
    fn set_text(&mut self, node: &Self::Node, text: &str);
    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str);

    fn focus(&mut self, node: &Self::Node);
    /// Select the contents of `node` so the user can copy them by hand.
    fn select_contents(&mut self, node: &Self::Node);

    /// Host (`example.com:8080`) the page was served from, if known.
    fn page_host(&self) -> Option<String>;

    /// The `id` attribute, treating an empty id as absent.
    fn id(&self, node: &Self::Node) -> Option<String> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }
}

/// An element lookup resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<T> {
    Bound(T),
    /// The page lacks something the behavior needs; the reason is kept for
    /// logging only.
    Unbound(&'static str),
}

impl<T> Binding<T> {
    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Binding::Bound(value) => Some(value),
            Binding::Unbound(_) => None,
        }
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        match self {
            Binding::Bound(value) => Some(value),
            Binding::Unbound(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory document
// ---------------------------------------------------------------------------

/// Index of an element inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    style: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A minimal element tree with just enough behavior for the page scripts.
///
/// Elements are never freed; replacing the text of an element detaches its
/// children, which then stop showing up in document-order queries.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<ElementData>,
    host: Option<String>,
    focused: Option<NodeId>,
    selection: Option<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only an `<html>` root element.
    pub fn new() -> Self {
        Self {
            nodes: vec![ElementData {
                tag: "html".to_owned(),
                ..ElementData::default()
            }],
            host: None,
            focused: None,
            selection: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a new `tag` element under `parent`.
    ///
    /// A `class` entry in `attrs` is split on whitespace into the class list;
    /// every other pair becomes an attribute.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut data = ElementData {
            tag: tag.to_ascii_lowercase(),
            parent: Some(parent),
            ..ElementData::default()
        };
        for (name, value) in attrs {
            if *name == "class" {
                data.classes = value.split_whitespace().map(str::to_owned).collect();
            } else {
                data.attributes.insert((*name).to_owned(), (*value).to_owned());
            }
        }
        self.nodes.push(data);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append an element and give it a text run in one step.
    pub fn append_text_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> NodeId {
        let id = self.append_element(parent, tag, attrs);
        self.nodes[id.0].text = text.to_owned();
        id
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.nodes[node.0].style.get(property).map(String::as_str)
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn selection(&self) -> Option<NodeId> {
        self.selection
    }

    /// Attached elements below (and including) `from`, in document order.
    fn walk(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        order
    }
}

impl Dom for Document {
    type Node = NodeId;

    fn root(&self) -> Option<NodeId> {
        Some(self.root_id())
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.walk(self.root_id())
            .into_iter()
            .find(|node| self.nodes[node.0].attributes.get("id").map(String::as_str) == Some(id))
    }

    fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        self.walk(self.root_id())
            .into_iter()
            .filter(|node| self.has_class(node, class))
            .collect()
    }

    fn elements_with_tags(&self, tags: &[&str]) -> Vec<NodeId> {
        self.walk(self.root_id())
            .into_iter()
            .filter(|node| tags.contains(&self.nodes[node.0].tag.as_str()))
            .collect()
    }

    fn descendants_with_tag(&self, scope: &NodeId, tag: &str) -> Vec<NodeId> {
        self.walk(*scope)
            .into_iter()
            .skip(1)
            .filter(|node| self.nodes[node.0].tag == tag)
            .collect()
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(id) = current {
            if id == *ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        if name == "class" {
            let classes = &self.nodes[node.0].classes;
            return (!classes.is_empty()).then(|| classes.join(" "));
        }
        self.nodes[node.0].attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        if name == "class" {
            self.nodes[node.0].classes = value.split_whitespace().map(str::to_owned).collect();
            return;
        }
        self.nodes[node.0]
            .attributes
            .insert(name.to_owned(), value.to_owned());
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        if name == "class" {
            self.nodes[node.0].classes.clear();
            return;
        }
        self.nodes[node.0].attributes.remove(name);
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.nodes[node.0].classes.iter().any(|c| c == class)
    }

    fn set_class(&mut self, node: &NodeId, class: &str, on: bool) {
        let classes = &mut self.nodes[node.0].classes;
        let present = classes.iter().position(|c| c == class);
        match (present, on) {
            (None, true) => classes.push(class.to_owned()),
            (Some(idx), false) => {
                classes.remove(idx);
            }
            _ => {}
        }
    }

    fn text(&self, node: &NodeId) -> String {
        self.walk(*node)
            .into_iter()
            .map(|id| self.nodes[id.0].text.as_str())
            .collect()
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
        self.nodes[node.0].text = text.to_owned();
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) {
        self.nodes[node.0]
            .style
            .insert(property.to_owned(), value.to_owned());
    }

    fn focus(&mut self, node: &NodeId) {
        self.focused = Some(*node);
    }

    fn select_contents(&mut self, node: &NodeId) {
        self.selection = Some(*node);
    }

    fn page_host(&self) -> Option<String> {
        self.host.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root_id();
        let main = doc.append_element(root, "main", &[("id", "content")]);
        let h2 = doc.append_text_element(main, "h2", &[("id", "intro")], "Intro");
        let p = doc.append_element(main, "p", &[("class", "reveal lead")]);
        doc.append_text_element(p, "a", &[("href", "#intro")], "back");
        (doc, main, h2, p)
    }

    #[test]
    fn element_by_id_finds_attached_nodes() {
        let (doc, main, h2, _) = sample();
        assert_eq!(doc.element_by_id("content"), Some(main));
        assert_eq!(doc.element_by_id("intro"), Some(h2));
        assert_eq!(doc.element_by_id("missing"), None);
    }

    #[test]
    fn tag_queries_follow_document_order() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let a = doc.append_element(root, "h3", &[("id", "a")]);
        let section = doc.append_element(root, "section", &[]);
        let b = doc.append_element(section, "h2", &[("id", "b")]);
        let c = doc.append_element(root, "h2", &[("id", "c")]);
        assert_eq!(doc.elements_with_tags(&["h2", "h3"]), vec![a, b, c]);
    }

    #[test]
    fn class_attribute_is_split_into_class_list() {
        let (mut doc, _, _, p) = sample();
        assert!(doc.has_class(&p, "reveal"));
        assert!(doc.has_class(&p, "lead"));
        doc.set_class(&p, "visible", true);
        doc.set_class(&p, "visible", true);
        assert_eq!(doc.attribute(&p, "class").as_deref(), Some("reveal lead visible"));
        doc.set_class(&p, "lead", false);
        assert_eq!(doc.attribute(&p, "class").as_deref(), Some("reveal visible"));
    }

    #[test]
    fn text_concatenates_descendants_and_set_text_detaches_children() {
        let (mut doc, main, _, p) = sample();
        assert_eq!(doc.text(&main), "Introback");
        doc.set_text(&p, "replaced");
        assert_eq!(doc.text(&p), "replaced");
        assert!(doc.descendants_with_tag(&main, "a").is_empty());
    }

    #[test]
    fn contains_walks_parent_chain() {
        let (doc, main, h2, p) = sample();
        assert!(doc.contains(&main, &h2));
        assert!(doc.contains(&p, &p));
        assert!(!doc.contains(&h2, &main));
    }

    #[test]
    fn empty_id_is_treated_as_absent() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let h = doc.append_element(root, "h2", &[("id", "")]);
        assert_eq!(doc.id(&h), None);
    }

    #[test]
    fn binding_accessors() {
        let mut bound = Binding::Bound(3u8);
        assert!(bound.is_bound());
        if let Some(v) = bound.as_mut() {
            *v *= 2;
        }
        assert_eq!(bound.as_ref(), Some(&6));
        let unbound: Binding<u8> = Binding::Unbound("no toggle");
        assert!(!unbound.is_bound());
        assert_eq!(unbound.as_ref(), None);
    }
}
