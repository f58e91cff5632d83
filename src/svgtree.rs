//! A minimal retained DOM and serializer.
//!
//! The emitter speaks only three verbs against this tree: create an element
//! in a namespace, set an attribute (optionally namespaced), append a child.
//! This keeps the interpreter's core independent of any particular XML
//! writer; [`Document::to_string`] is the only place that touches
//! `xmlwriter`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

#[derive(Debug)]
struct NodeData {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    text: Option<String>,
    parent: Option<Weak<RefCell<NodeData>>>,
}

/// A handle to a node in the tree. Cheap to clone (reference-counted).
#[derive(Debug, Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    fn new(tag: &str) -> Node {
        Node(Rc::new(RefCell::new(NodeData {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
            text: None,
            parent: None,
        })))
    }

    /// Sets an attribute. A namespace prefix, when given, is prepended as
    /// `prefix:name`; callers pass already-prefixed names for `xml:space`
    /// and `xlink:href` since those are the only two namespaced attributes
    /// this crate emits.
    pub fn set_attr(&self, name: &str, value: impl Into<String>) {
        let mut data = self.0.borrow_mut();
        let value = value.into();
        if let Some(existing) = data.attrs.iter_mut().find(|(k, _)| k == name) {
            existing.1 = value;
        } else {
            data.attrs.push((name.to_string(), value));
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.0.borrow().attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.0.borrow_mut().text = Some(text.into());
    }

    pub fn get_text(&self) -> Option<String> {
        self.0.borrow().text.clone()
    }

    /// Whether this node has already been appended somewhere in the tree.
    pub fn has_parent(&self) -> bool {
        self.0.borrow().parent.is_some()
    }

    pub fn append_child(&self, child: &Node) {
        child.0.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Removes `child` from this node's children, if present. Used by the
    /// current-transform-group lifecycle to drop empty decorative groups.
    pub fn remove_child(&self, child: &Node) {
        self.0.borrow_mut().children.retain(|c| !Rc::ptr_eq(&c.0, &child.0));
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.borrow().children.first().cloned()
    }

    /// Returns the `i`-th child, if present.
    pub fn nth_child(&self, i: usize) -> Option<Node> {
        self.0.borrow().children.get(i).cloned()
    }

    /// Whether two handles refer to the same underlying node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A document under construction: a single root `<svg>` element plus a
/// factory for creating further elements.
pub struct Document {
    pub root: Node,
}

impl Document {
    /// Creates the root `<svg>` element per spec.md §6: version, pixel
    /// width/height, `preserveAspectRatio="none"`, and a `viewBox`.
    pub fn new(width: f64, height: f64) -> Document {
        let root = Node::new("svg");
        root.set_attr("xmlns", SVG_NS);
        root.set_attr("xmlns:xlink", XLINK_NS);
        root.set_attr("version", "1.1");
        root.set_attr("width", format!("{}px", crate::format::pf(width)));
        root.set_attr("height", format!("{}px", crate::format::pf(height)));
        root.set_attr("preserveAspectRatio", "none");
        root.set_attr(
            "viewBox",
            format!("0 0 {} {}", crate::format::pf(width), crate::format::pf(height)),
        );
        Document { root }
    }

    pub fn create_element(&self, tag: &str) -> Node {
        Node::new(tag)
    }

    /// Serializes the tree with `xmlwriter`, in document order.
    pub fn to_string(&self) -> String {
        let opts = xmlwriter::Options {
            use_single_quote: false,
            indent: xmlwriter::Indent::None,
            attributes_indent: xmlwriter::Indent::None,
        };
        let mut w = xmlwriter::XmlWriter::new(opts);
        write_node(&mut w, &self.root);
        w.end_document()
    }
}

fn write_node(w: &mut xmlwriter::XmlWriter, node: &Node) {
    let data = node.0.borrow();
    w.start_element(&data.tag);
    for (name, value) in &data.attrs {
        w.write_attribute(name, value);
    }
    if let Some(text) = &data.text {
        w.write_text(text);
    }
    for child in &data.children {
        write_node(w, child);
    }
    w.end_element();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn root_has_expected_viewbox() {
        let doc = Document::new(100.0, 200.0);
        assert_eq!(doc.root.get_attr("viewBox").unwrap(), "0 0 100 200");
    }

    #[test]
    fn ptr_eq_distinguishes_distinct_nodes() {
        let doc = Document::new(10.0, 10.0);
        let a = doc.create_element("g");
        let b = doc.create_element("g");
        let a2 = a.clone();
        assert!(a.ptr_eq(&a2));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn append_and_remove_child() {
        let doc = Document::new(10.0, 10.0);
        let g = doc.create_element("g");
        doc.root.append_child(&g);
        assert_eq!(doc.root.child_count(), 1);
        doc.root.remove_child(&g);
        assert_eq!(doc.root.child_count(), 0);
    }

    #[test]
    fn serializes_nested_elements() {
        let doc = Document::new(10.0, 10.0);
        let g = doc.create_element("g");
        g.set_attr("transform", "translate(1 2)");
        let rect = doc.create_element("rect");
        rect.set_attr("fill", "#ff0000");
        g.append_child(&rect);
        doc.root.append_child(&g);
        let s = doc.to_string();
        assert!(s.contains("<g transform=\"translate(1 2)\">"));
        assert!(s.contains("<rect fill=\"#ff0000\"/>"));
    }
}
