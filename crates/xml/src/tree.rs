//! Arena-backed element tree and its serializer.
//!
//! Elements live in an [`indextree::Arena`] owned by [`XmlTree`]. A parent
//! owns its children through the arena; the child-to-parent link is a plain
//! [`NodeId`] used for navigation only, so dropping the tree releases every
//! node at once.

use indextree::{Arena, NodeEdge, NodeId};

use crate::{
    error::{Error, Result},
    escape::escape,
};

/// Attribute map that keeps insertion order and unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What an element holds between its tags.
///
/// Text and child elements are mutually exclusive, and a self-closing element
/// holds neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Rendered as `<name />`.
    SelfClosing,
    /// Leaf text, escaped at render time.
    Text(String),
    /// Child elements stored in the arena; none renders as `<name></name>`.
    Elements,
}

/// One XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    name: String,
    attributes: Attributes,
    content: Content,
}

impl ElementNode {
    pub fn new(name: impl Into<String>, content: Content) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
            content,
        }
    }

    /// Set an attribute before the element is placed in a tree.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name, value);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Text content, if this is a text leaf.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::SelfClosing | Content::Elements => None,
        }
    }

    /// Whether the element renders self-closing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content == Content::SelfClosing
    }
}

/// A single-rooted element tree.
#[derive(Debug, Clone)]
pub struct XmlTree {
    arena: Arena<ElementNode>,
    root: NodeId,
}

impl XmlTree {
    /// Create a tree holding only the root element.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self::with_root(ElementNode::new(root_name, Content::Elements))
    }

    /// Create a tree whose root is `root`, attributes included.
    pub fn with_root(root: ElementNode) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self { arena, root }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a live element.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&ElementNode> {
        self.arena
            .get(node)
            .filter(|n| !n.is_removed())
            .map(|n| n.get())
    }

    fn get_mut(&mut self, node: NodeId) -> Result<&mut ElementNode> {
        self.arena
            .get_mut(node)
            .filter(|n| !n.is_removed())
            .map(|n| n.get_mut())
            .ok_or_else(|| Error::Message(format!("node {node:?} is not part of this tree")))
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node).and_then(|n| n.parent())
    }

    pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.children(&self.arena)
    }

    /// Number of live elements, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.iter().filter(|n| !n.is_removed()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `element` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, element: ElementNode) -> Result<NodeId> {
        let target = self.get_mut(parent)?;
        match target.content {
            Content::Elements => {},
            Content::SelfClosing | Content::Text(_) => {
                return Err(Error::MixedContent {
                    element: target.name.clone(),
                });
            },
        }
        let child = self.arena.new_node(element);
        parent
            .checked_append(child, &mut self.arena)
            .map_err(|e| Error::Message(format!("cannot append element: {e}")))?;
        Ok(child)
    }

    /// Replace whatever `node` holds with `text`, dropping its children.
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<()> {
        let children: Vec<NodeId> = node.children(&self.arena).collect();
        for child in children {
            child.remove_subtree(&mut self.arena);
        }
        self.get_mut(node)?.content = Content::Text(text.into());
        Ok(())
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.get_mut(node)?.attributes.insert(name, value);
        Ok(())
    }

    /// Serialize the whole tree.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    /// Serialize `node` and its descendants into `out`, in document order.
    pub fn write_node(&self, node: NodeId, out: &mut String) {
        for edge in node.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(id) => {
                    if let Some(element) = self.get(id) {
                        write_start(element, out);
                    }
                },
                NodeEdge::End(id) => {
                    if let Some(element) = self.get(id)
                        && element.content == Content::Elements
                    {
                        write_end_tag(&element.name, out);
                    }
                },
            }
        }
    }
}

fn write_start(element: &ElementNode, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in element.attributes.iter() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    match &element.content {
        Content::SelfClosing => out.push_str(" />"),
        Content::Text(text) => {
            out.push('>');
            out.push_str(&escape(text));
            write_end_tag(&element.name, out);
        },
        Content::Elements => out.push('>'),
    }
}

fn write_end_tag(name: &str, out: &mut String) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}
