//! Cursor-based fluent builder over [`XmlTree`].

use indextree::NodeId;

use crate::{
    error::{Error, Result},
    tree::{Content, ElementNode, XmlTree},
};

/// The `<?xml ...?>` prolog written by [`XmlDocumentBuilder::render_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: String,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".into(),
            encoding: "UTF-8".into(),
        }
    }
}

impl XmlDeclaration {
    fn write(&self, out: &mut String) {
        out.push_str("<?xml version=\"");
        out.push_str(&self.version);
        out.push_str("\" encoding=\"");
        out.push_str(&self.encoding);
        out.push_str("\"?>\n");
    }
}

#[derive(Debug)]
struct Cursor {
    tree: XmlTree,
    current: NodeId,
}

/// Builds one XML document.
///
/// Mutators act on the element under the cursor and return `&mut Self` so
/// calls chain with `?`. After [`dispose`](Self::dispose) every method fails
/// with [`Error::Disposed`].
///
/// ```
/// use calmcp_xml::XmlDocumentBuilder;
///
/// let mut doc = XmlDocumentBuilder::new("d:propfind", &[("d", "DAV:")]);
/// doc.start_element("d:prop")?
///     .add_empty_element("d:displayname")?
///     .end_element()?;
/// assert_eq!(
///     doc.render()?,
///     r#"<d:propfind xmlns:d="DAV:"><d:prop><d:displayname /></d:prop></d:propfind>"#
/// );
/// # Ok::<(), calmcp_xml::Error>(())
/// ```
#[derive(Debug)]
pub struct XmlDocumentBuilder {
    cursor: Option<Cursor>,
}

impl XmlDocumentBuilder {
    /// Create a document with `root` as its root element.
    ///
    /// Each `(prefix, uri)` pair becomes a namespace declaration on the root,
    /// in the given order. The prefix `xmlns` declares the default namespace.
    pub fn new(root: &str, namespaces: &[(&str, &str)]) -> Self {
        let element = namespaces.iter().fold(
            ElementNode::new(root, Content::Elements),
            |element, (prefix, uri)| match *prefix {
                "xmlns" => element.with_attribute("xmlns", *uri),
                _ => element.with_attribute(format!("xmlns:{prefix}"), *uri),
            },
        );
        let tree = XmlTree::with_root(element);
        let current = tree.root();
        Self {
            cursor: Some(Cursor { tree, current }),
        }
    }

    fn cursor(&self) -> Result<&Cursor> {
        self.cursor.as_ref().ok_or(Error::Disposed)
    }

    fn cursor_mut(&mut self) -> Result<&mut Cursor> {
        self.cursor.as_mut().ok_or(Error::Disposed)
    }

    /// Append a child to the current element without moving the cursor.
    ///
    /// With `content` the child is a text leaf; without it an empty
    /// `<name></name>` pair.
    pub fn add_element(&mut self, name: &str, content: Option<&str>) -> Result<&mut Self> {
        let body = match content {
            Some(text) => Content::Text(text.to_string()),
            None => Content::Elements,
        };
        let cursor = self.cursor_mut()?;
        cursor
            .tree
            .append(cursor.current, ElementNode::new(name, body))?;
        Ok(self)
    }

    /// Append a self-closing child without moving the cursor.
    pub fn add_empty_element(&mut self, name: &str) -> Result<&mut Self> {
        let cursor = self.cursor_mut()?;
        cursor
            .tree
            .append(cursor.current, ElementNode::new(name, Content::SelfClosing))?;
        Ok(self)
    }

    /// Set or overwrite an attribute on the current element.
    pub fn add_attribute(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        let cursor = self.cursor_mut()?;
        cursor.tree.set_attribute(cursor.current, name, value)?;
        Ok(self)
    }

    /// Append a child and move the cursor into it.
    pub fn start_element(&mut self, name: &str) -> Result<&mut Self> {
        let cursor = self.cursor_mut()?;
        cursor.current = cursor
            .tree
            .append(cursor.current, ElementNode::new(name, Content::Elements))?;
        Ok(self)
    }

    /// Move the cursor to the parent element. At the root this does nothing.
    pub fn end_element(&mut self) -> Result<&mut Self> {
        let cursor = self.cursor_mut()?;
        if let Some(parent) = cursor.tree.parent(cursor.current) {
            cursor.current = parent;
        }
        Ok(self)
    }

    /// Set the text of the current element, replacing any children.
    pub fn set_content(&mut self, content: &str) -> Result<&mut Self> {
        let cursor = self.cursor_mut()?;
        cursor.tree.set_text(cursor.current, content)?;
        Ok(self)
    }

    /// Serialize without an XML declaration.
    pub fn render(&self) -> Result<String> {
        Ok(self.cursor()?.tree.render())
    }

    /// Serialize with the default `version="1.0" encoding="UTF-8"` declaration.
    pub fn render_document(&self) -> Result<String> {
        self.render_with_declaration(&XmlDeclaration::default())
    }

    pub fn render_with_declaration(&self, declaration: &XmlDeclaration) -> Result<String> {
        let cursor = self.cursor()?;
        let mut out = String::new();
        declaration.write(&mut out);
        cursor.tree.write_node(cursor.tree.root(), &mut out);
        Ok(out)
    }

    /// Borrow the underlying tree.
    pub fn tree(&self) -> Result<&XmlTree> {
        Ok(&self.cursor()?.tree)
    }

    /// The element under the cursor.
    pub fn current(&self) -> Result<NodeId> {
        Ok(self.cursor()?.current)
    }

    /// Drop the tree. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.cursor = None;
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.cursor.is_none()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_document_renders_empty_root() {
        let doc = XmlDocumentBuilder::new("root", &[]);
        assert_eq!(doc.render().unwrap(), "<root></root>");
    }

    #[test]
    fn namespaces_render_in_declaration_order() {
        let doc = XmlDocumentBuilder::new(
            "root",
            &[("d", "DAV:"), ("cal", "urn:ietf:params:xml:ns:caldav")],
        );
        assert_eq!(
            doc.render().unwrap(),
            r#"<root xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav"></root>"#
        );
    }

    #[test]
    fn xmlns_key_declares_default_namespace() {
        let doc = XmlDocumentBuilder::new("multistatus", &[("xmlns", "DAV:")]);
        assert_eq!(
            doc.render().unwrap(),
            r#"<multistatus xmlns="DAV:"></multistatus>"#
        );
    }

    #[test]
    fn nested_elements_with_attributes() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        doc.start_element("parent")
            .unwrap()
            .add_attribute("attr1", "value1")
            .unwrap()
            .start_element("child")
            .unwrap()
            .add_attribute("attr2", "value2")
            .unwrap()
            .end_element()
            .unwrap()
            .end_element()
            .unwrap();
        assert_eq!(
            doc.render().unwrap(),
            r#"<root><parent attr1="value1"><child attr2="value2"></child></parent></root>"#
        );
    }

    #[test]
    fn end_element_at_root_is_a_no_op() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        let root = doc.current().unwrap();
        doc.end_element().unwrap().end_element().unwrap();
        assert_eq!(doc.current().unwrap(), root);
        doc.add_element("child", Some("x")).unwrap();
        assert_eq!(doc.render().unwrap(), "<root><child>x</child></root>");
    }

    #[test]
    fn empty_element_has_space_before_slash() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        doc.add_empty_element("empty").unwrap();
        let rendered = doc.render().unwrap();
        assert!(rendered.contains("<empty />"));
        assert!(!rendered.contains("<empty/>"));
    }

    #[test]
    fn content_is_escaped_at_render_time() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        doc.add_element("d:displayname", Some("R&D <team>"))
            .unwrap()
            .add_attribute("note", "\"quoted\"")
            .unwrap();
        assert_eq!(
            doc.render().unwrap(),
            r#"<root note="&quot;quoted&quot;"><d:displayname>R&amp;D &lt;team&gt;</d:displayname></root>"#
        );
    }

    #[test]
    fn set_content_on_current_element() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        doc.start_element("c:text-match")
            .unwrap()
            .add_attribute("collation", "i;octet")
            .unwrap()
            .set_content("abc@example.com")
            .unwrap();
        assert_eq!(
            doc.render().unwrap(),
            r#"<root><c:text-match collation="i;octet">abc@example.com</c:text-match></root>"#
        );
    }

    #[test]
    fn children_under_text_are_rejected() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        doc.start_element("leaf").unwrap().set_content("x").unwrap();
        let err = doc.add_empty_element("child").unwrap_err();
        assert!(matches!(err, Error::MixedContent { .. }));
    }

    #[test]
    fn render_is_repeatable() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        doc.add_element("a", Some("1")).unwrap();
        let first = doc.render().unwrap();
        assert_eq!(doc.render().unwrap(), first);
        assert_eq!(doc.render_document().unwrap(), doc.render_document().unwrap());
    }

    #[test]
    fn declaration_prefixes_document() {
        let doc = XmlDocumentBuilder::new("root", &[]);
        assert_eq!(
            doc.render_document().unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root></root>"
        );
        let custom = XmlDeclaration {
            version: "1.1".into(),
            encoding: "ISO-8859-1".into(),
        };
        assert!(
            doc.render_with_declaration(&custom)
                .unwrap()
                .starts_with(r#"<?xml version="1.1" encoding="ISO-8859-1"?>"#)
        );
    }

    #[test]
    fn disposed_builder_rejects_every_call() {
        let mut doc = XmlDocumentBuilder::new("root", &[]);
        doc.add_element("a", None).unwrap();
        doc.dispose();
        doc.dispose();
        assert!(doc.is_disposed());
        assert!(matches!(doc.render(), Err(Error::Disposed)));
        assert!(matches!(doc.render_document(), Err(Error::Disposed)));
        assert!(matches!(doc.add_element("b", None), Err(Error::Disposed)));
        assert!(matches!(doc.add_empty_element("b"), Err(Error::Disposed)));
        assert!(matches!(doc.add_attribute("k", "v"), Err(Error::Disposed)));
        assert!(matches!(doc.start_element("b"), Err(Error::Disposed)));
        assert!(matches!(doc.end_element(), Err(Error::Disposed)));
        assert!(matches!(doc.set_content("x"), Err(Error::Disposed)));
    }
}
