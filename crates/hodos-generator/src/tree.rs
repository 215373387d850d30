//! Mutable route-definition tree.
//!
//! Route definitions are parsed into an arena-backed [`Document`]. Nodes are
//! addressed by [`NodeId`] and never move; detaching a node only unlinks it
//! from its parent, so ids held by a caller stay valid across rewrites. All
//! traversal starts from the root, which is why detached nodes never appear
//! in scans or in serialized output.
//!
//! Output formatting is fixed: no XML declaration, two-space indentation,
//! text-only elements inline, empty elements self-closed, attributes in
//! document order. Serializing a re-parsed serialization is byte-identical.

use std::fmt::Write as _;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{GeneratorError, Result};

const INDENT: &str = "  ";

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Content of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with ordered attributes.
    Element {
        /// Tag name.
        name: String,
        /// Attributes in document order.
        attributes: Vec<(String, String)>,
    },
    /// Character data (unescaped).
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An XML document held as an arena of nodes.
///
/// # Examples
///
/// ```rust
/// use hodos_generator::tree::Document;
///
/// let mut doc = Document::parse(r#"<route><to uri="direct:a"/></route>"#, "example").unwrap();
/// let to = doc.find_descendant(doc.root(), "to").unwrap();
/// doc.set_attribute(to, "uri", "direct:b");
/// assert_eq!(doc.serialize(), "<route>\n  <to uri=\"direct:b\"/>\n</route>\n");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

fn parse_error(name: &str, message: impl std::fmt::Display) -> GeneratorError {
    GeneratorError::Parse {
        policy: name.to_string(),
        message: message.to_string(),
    }
}

impl Document {
    /// Creates a document with a single empty root element.
    #[must_use]
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element {
                    name: root_name.into(),
                    attributes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    /// Parses XML text.
    ///
    /// `name` identifies the source in error messages. Comments, processing
    /// instructions and the XML declaration are discarded; whitespace-only
    /// text is dropped and remaining text is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Parse`] if the text is not a single
    /// well-formed element tree.
    pub fn parse(text: &str, name: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let mut has_root = false;
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                parse_error(name, format!("{e} at byte {}", reader.buffer_position()))
            })?;

            match event {
                Event::Start(start) => {
                    let id = doc.open_element(&start, name, stack.last().copied(), &mut has_root)?;
                    stack.push(id);
                }
                Event::Empty(start) => {
                    doc.open_element(&start, name, stack.last().copied(), &mut has_root)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(t) => {
                    let content = t.unescape().map_err(|e| parse_error(name, e))?;
                    doc.push_text(name, stack.last().copied(), &content)?;
                }
                Event::CData(c) => {
                    let content = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    doc.push_text(name, stack.last().copied(), &content)?;
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        if !stack.is_empty() {
            return Err(parse_error(name, "unexpected end of input: unclosed element"));
        }
        if !has_root {
            return Err(parse_error(name, "no root element"));
        }

        Ok(doc)
    }

    fn open_element(
        &mut self,
        start: &BytesStart<'_>,
        source: &str,
        parent: Option<NodeId>,
        has_root: &mut bool,
    ) -> Result<NodeId> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| parse_error(source, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| parse_error(source, e))?
                .into_owned();
            attributes.push((key, value));
        }

        let id = self.push(NodeKind::Element { name, attributes });
        match parent {
            Some(parent) => self.link(parent, id),
            None if *has_root => {
                return Err(parse_error(source, "more than one root element"));
            }
            None => {
                *has_root = true;
                self.root = id;
            }
        }
        Ok(id)
    }

    fn push_text(&mut self, source: &str, parent: Option<NodeId>, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }
        let Some(parent) = parent else {
            return Err(parse_error(source, "text outside the root element"));
        };

        // Adjacent character data (split by a comment or CDATA) is one text node.
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeKind::Text(existing) = &mut self.nodes[last.0].kind {
                existing.push_str(content);
                return Ok(());
            }
        }
        let id = self.push(NodeKind::Text(content.to_string()));
        self.link(parent, id);
        Ok(())
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Returns the root element.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Returns a node's content.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Returns the tag name, or `None` for text nodes.
    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text(_) => None,
        }
    }

    /// Returns true if the node is an element with the given tag name.
    #[must_use]
    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Sets an attribute, keeping its position if it already exists.
    ///
    /// Has no effect on text nodes.
    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[id.0].kind {
            let value = value.into();
            match attributes.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = value,
                None => attributes.push((key.to_string(), value)),
            }
        }
    }

    /// Returns the parent of a node, or `None` for the root and detached nodes.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Returns a node's children in order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Returns a node's element children in order.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.name(c).is_some())
    }

    /// Returns every element below `id` (exclusive) in document order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            if self.name(next).is_some() {
                out.push(next);
                pending.extend(self.children(next).iter().rev().copied());
            }
        }
        out
    }

    /// Returns the first element below `id` with the given tag name.
    #[must_use]
    pub fn find_descendant(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|&n| self.is_element(n, name))
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element {
            name: name.into(),
            attributes: Vec::new(),
        })
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Unlinks a node from its parent. The node and its subtree remain usable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Appends `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.link(parent, child);
    }

    /// Puts `replacement` where `target` is, detaching `target`.
    ///
    /// Has no effect if `target` has no parent.
    pub fn replace(&mut self, target: NodeId, replacement: NodeId) {
        let Some(parent) = self.nodes[target.0].parent else {
            return;
        };
        self.detach(replacement);
        if let Some(slot) = self.nodes[parent.0]
            .children
            .iter_mut()
            .find(|c| **c == target)
        {
            *slot = replacement;
        }
        self.nodes[target.0].parent = None;
        self.nodes[replacement.0].parent = Some(parent);
    }

    /// Replaces `target` with `replacements`, in order, detaching `target`.
    ///
    /// An empty `replacements` simply removes `target`.
    pub fn replace_with_many(&mut self, target: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.nodes[target.0].parent else {
            return;
        };
        for &r in replacements {
            self.detach(r);
        }
        let Some(position) = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == target)
        else {
            return;
        };
        self.nodes[parent.0]
            .children
            .splice(position..=position, replacements.iter().copied());
        self.nodes[target.0].parent = None;
        for &r in replacements {
            self.nodes[r.0].parent = Some(parent);
        }
    }

    /// Deep-copies `node` from `other` into this document, returning the
    /// detached copy.
    pub fn import(&mut self, other: &Self, node: NodeId) -> NodeId {
        let copy = self.push(other.kind(node).clone());
        for &child in other.children(node) {
            let child_copy = self.import(other, child);
            self.link(copy, child_copy);
        }
        copy
    }

    /// Serializes the document reachable from the root.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, 0, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let indent = INDENT.repeat(depth);
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => {
                let _ = writeln!(out, "{indent}{}", escape(text.as_str()));
            }
            NodeKind::Element { name, attributes } => {
                let _ = write!(out, "{indent}<{name}");
                for (key, value) in attributes {
                    let _ = write!(out, " {key}=\"{}\"", escape(value.as_str()));
                }

                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>\n");
                } else if children.iter().all(|&c| self.name(c).is_none()) {
                    out.push('>');
                    for &c in children {
                        if let NodeKind::Text(text) = self.kind(c) {
                            out.push_str(&escape(text.as_str()));
                        }
                    }
                    let _ = writeln!(out, "</{name}>");
                } else {
                    out.push_str(">\n");
                    for &c in children {
                        self.write_node(c, depth + 1, out);
                    }
                    let _ = writeln!(out, "{indent}</{name}>");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROUTE: &str = r#"<?xml version="1.0"?>
<camelContext xmlns="http://camel.apache.org/schema/spring">
    <!-- comment -->
    <route id="r1">
        <from uri="logical:in"/>
        <log message="got &lt;it&gt;"/>
        <setBody><simple>${body}</simple></setBody>
        <to uri="logical:out"/>
    </route>
</camelContext>"#;

    #[test]
    fn test_parse_and_serialize() {
        let doc = Document::parse(ROUTE, "route").unwrap();
        let expected = r#"<camelContext xmlns="http://camel.apache.org/schema/spring">
  <route id="r1">
    <from uri="logical:in"/>
    <log message="got &lt;it&gt;"/>
    <setBody>
      <simple>${body}</simple>
    </setBody>
    <to uri="logical:out"/>
  </route>
</camelContext>
"#;
        assert_eq!(doc.serialize(), expected);
    }

    #[test]
    fn test_serialize_is_fixed_point() {
        let once = Document::parse(ROUTE, "route").unwrap().serialize();
        let twice = Document::parse(&once, "route").unwrap().serialize();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Document::parse("<a><b></a>", "bad"),
            Err(GeneratorError::Parse { .. })
        ));
        assert!(Document::parse("<a/><b/>", "two roots").is_err());
        assert!(Document::parse("", "empty").is_err());
        assert!(Document::parse("<a>", "unclosed").is_err());
    }

    #[test]
    fn test_descendants_document_order() {
        let doc = Document::parse("<a><b><c/></b><d/></a>", "t").unwrap();
        let names: Vec<_> = doc
            .descendants(doc.root())
            .into_iter()
            .filter_map(|n| doc.name(n))
            .collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut doc = Document::parse("<a><b/><c/><d/></a>", "t").unwrap();
        let c = doc.find_descendant(doc.root(), "c").unwrap();
        let wrapper = doc.create_element("w");
        doc.replace(c, wrapper);
        doc.append_child(wrapper, c);

        assert_eq!(doc.serialize(), "<a>\n  <b/>\n  <w>\n    <c/>\n  </w>\n  <d/>\n</a>\n");
        assert_eq!(doc.parent(c), Some(wrapper));
    }

    #[test]
    fn test_replace_with_many() {
        let mut doc = Document::parse("<a><slot/><z/></a><!-- end -->", "t").unwrap();
        let slot = doc.find_descendant(doc.root(), "slot").unwrap();
        let x = doc.create_element("x");
        let y = doc.create_element("y");
        doc.replace_with_many(slot, &[x, y]);
        assert_eq!(doc.serialize(), "<a>\n  <x/>\n  <y/>\n  <z/>\n</a>\n");

        let z = doc.find_descendant(doc.root(), "z").unwrap();
        doc.replace_with_many(z, &[]);
        assert_eq!(doc.serialize(), "<a>\n  <x/>\n  <y/>\n</a>\n");
    }

    #[test]
    fn test_import_deep_copies() {
        let template = Document::parse(r#"<t><p k="v">text</p></t>"#, "template").unwrap();
        let mut doc = Document::new("root");
        let p = template.find_descendant(template.root(), "p").unwrap();
        let copy = doc.import(&template, p);
        doc.append_child(doc.root(), copy);
        assert_eq!(doc.serialize(), "<root>\n  <p k=\"v\">text</p>\n</root>\n");
    }

    #[test]
    fn test_set_attribute_keeps_order() {
        let mut doc = Document::parse(r#"<a x="1" uri="logical:q" y="2"/>"#, "t").unwrap();
        let root = doc.root();
        doc.set_attribute(root, "uri", "direct:q");
        doc.set_attribute(root, "z", "3");
        assert_eq!(
            doc.serialize(),
            "<a x=\"1\" uri=\"direct:q\" y=\"2\" z=\"3\"/>\n"
        );
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9]{0,6}"
    }

    fn element_strategy() -> impl Strategy<Value = String> {
        let leaf = (
            name_strategy(),
            proptest::collection::vec(("[a-z]{1,4}", "[ -~]{0,8}"), 0..3),
            proptest::option::of("[a-zA-Z0-9<>&\"' ]{0,10}"),
        )
            .prop_map(|(name, attrs, text)| {
                let mut seen = std::collections::HashSet::new();
                let attrs: String = attrs
                    .into_iter()
                    .filter(|(k, _)| seen.insert(k.clone()))
                    .map(|(k, v)| format!(" {k}=\"{}\"", escape(v.as_str())))
                    .collect();
                match text {
                    Some(t) => format!("<{name}{attrs}>{}</{name}>", escape(t.as_str())),
                    None => format!("<{name}{attrs}/>"),
                }
            });

        leaf.prop_recursive(3, 24, 4, |inner| {
            (name_strategy(), proptest::collection::vec(inner, 1..4))
                .prop_map(|(name, children)| format!("<{name}>{}</{name}>", children.concat()))
        })
    }

    proptest! {
        #[test]
        fn serialize_reaches_fixed_point(xml in element_strategy()) {
            let first = Document::parse(&xml, "generated").unwrap().serialize();
            let second = Document::parse(&first, "generated").unwrap().serialize();
            prop_assert_eq!(first, second);
        }
    }
}
