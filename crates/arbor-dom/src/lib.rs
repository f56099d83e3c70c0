//! In-memory host document tree for the Arbor renderer.
//!
//! The renderer treats this crate as "the platform": a live, mutable tree of
//! elements, text nodes and document fragments with attribute, property,
//! style and listener storage, focus tracking, and an ordered mutation log
//! that tests use to assert how much work a render pass actually performed.

pub mod html;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Elements that cannot have children.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Property names reflected as direct object fields on elements rather than
/// attributes. Mirrors the IDL-attribute surface the renderer writes to.
const ELEMENT_PROPERTIES: &[&str] = &[
    "value",
    "checked",
    "selected",
    "selectedIndex",
    "type",
    "disabled",
    "readonly",
    "multiple",
    "id",
    "title",
    "placeholder",
];

/// A property value slot on an element.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    Num(f64),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

/// One entry in the document's mutation log.
#[derive(Clone, Debug)]
pub enum Mutation {
    Insert { parent: NodeRef, node: NodeRef },
    Remove { node: NodeRef },
    SetText { node: NodeRef, text: String },
    SetAttr { node: NodeRef, name: String },
    RemoveAttr { node: NodeRef, name: String },
    SetProp { node: NodeRef, name: String },
    SetStyleProp { node: NodeRef, name: String, value: String },
    SetCssText { node: NodeRef, text: String },
    AddListener { node: NodeRef, event_type: String },
    RemoveListener { node: NodeRef, event_type: String },
}

/// Receiver for platform events; the renderer installs one per event type.
pub trait EventListener {
    fn handle_event(&self, event: &Event);
}

/// A platform event delivered to a single node.
pub struct Event {
    event_type: String,
    target: NodeRef,
    redraw: Cell<bool>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, target: NodeRef) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            redraw: Cell::new(true),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> &NodeRef {
        &self.target
    }

    /// Opts this particular event out of the global event-occurred callback.
    pub fn skip_redraw(&self) {
        self.redraw.set(false);
    }

    pub fn wants_redraw(&self) -> bool {
        self.redraw.get()
    }
}

pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) namespace: Option<String>,
    pub(crate) is: Option<String>,
    pub(crate) attributes: RefCell<IndexMap<String, String>>,
    pub(crate) properties: RefCell<IndexMap<String, PropValue>>,
    pub(crate) style_props: RefCell<IndexMap<String, String>>,
    pub(crate) css_text: RefCell<String>,
    pub(crate) listeners: RefCell<IndexMap<String, Rc<dyn EventListener>>>,
    /// Raw markup last written wholesale, kept for contenteditable diffing.
    pub(crate) raw_html: RefCell<Option<String>>,
}

pub(crate) enum NodeKind {
    Element(ElementData),
    Text(RefCell<String>),
    Fragment,
}

pub(crate) struct DomNode {
    pub(crate) doc: Weak<DocumentInner>,
    pub(crate) kind: NodeKind,
    pub(crate) parent: RefCell<Weak<DomNode>>,
    pub(crate) children: RefCell<Vec<NodeRef>>,
    /// Opaque embedder slot; the renderer parks its per-root bookkeeping
    /// here the way `dom.vnodes` rides on a live root.
    pub(crate) expando: RefCell<Option<Rc<dyn std::any::Any>>>,
}

pub(crate) struct DocumentInner {
    active: RefCell<Weak<DomNode>>,
    log: RefCell<Vec<Mutation>>,
}

/// The host document: a node factory plus document-wide state (focus and the
/// mutation log).
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DocumentInner {
                active: RefCell::new(Weak::new()),
                log: RefCell::new(Vec::new()),
            }),
        }
    }

    fn node(&self, kind: NodeKind) -> NodeRef {
        NodeRef {
            node: Rc::new(DomNode {
                doc: Rc::downgrade(&self.inner),
                kind,
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                expando: RefCell::new(None),
            }),
        }
    }

    pub fn create_element(&self, tag: &str) -> NodeRef {
        self.create_element_full(tag, None, None)
    }

    pub fn create_element_ns(&self, ns: &str, tag: &str) -> NodeRef {
        self.create_element_full(tag, Some(ns), None)
    }

    pub fn create_element_full(
        &self,
        tag: &str,
        ns: Option<&str>,
        is: Option<&str>,
    ) -> NodeRef {
        self.node(NodeKind::Element(ElementData {
            tag: tag.to_owned(),
            namespace: ns.map(str::to_owned),
            is: is.map(str::to_owned),
            attributes: RefCell::new(IndexMap::new()),
            properties: RefCell::new(IndexMap::new()),
            style_props: RefCell::new(IndexMap::new()),
            css_text: RefCell::new(String::new()),
            listeners: RefCell::new(IndexMap::new()),
            raw_html: RefCell::new(None),
        }))
    }

    pub fn create_text(&self, text: &str) -> NodeRef {
        self.node(NodeKind::Text(RefCell::new(text.to_owned())))
    }

    pub fn create_fragment(&self) -> NodeRef {
        self.node(NodeKind::Fragment)
    }

    /// Parses trusted markup in the context of `context_tag`, returning a
    /// document fragment holding the parsed nodes. See [`html::parse_into`].
    pub fn parse_fragment(&self, context_tag: &str, ns: Option<&str>, markup: &str) -> NodeRef {
        let fragment = self.create_fragment();
        html::parse_into(self, &fragment, context_tag, ns, markup);
        fragment
    }

    /// Moves focus to `node` if it is an element; no-op otherwise.
    pub fn focus(&self, node: &NodeRef) {
        if node.is_element() {
            *self.inner.active.borrow_mut() = Rc::downgrade(&node.node);
        }
    }

    pub fn blur(&self) {
        *self.inner.active.borrow_mut() = Weak::new();
    }

    pub fn active_element(&self) -> Option<NodeRef> {
        self.inner
            .active
            .borrow()
            .upgrade()
            .map(|node| NodeRef { node })
    }

    /// Drains the mutation log accumulated so far.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        self.inner.log.borrow_mut().drain(..).collect()
    }

    pub fn clear_mutations(&self) {
        self.inner.log.borrow_mut().clear();
    }
}

impl DocumentInner {
    fn record(&self, mutation: Mutation) {
        self.log.borrow_mut().push(mutation);
    }

    /// Called when `detached` leaves the tree: focus does not survive
    /// detachment, even if the node is immediately reinserted.
    fn note_detached(&self, detached: &NodeRef) {
        let active = self.active.borrow().upgrade();
        if let Some(active) = active {
            let active = NodeRef { node: active };
            if detached.contains(&active) {
                *self.active.borrow_mut() = Weak::new();
            }
        }
    }
}

/// Cheap-to-clone handle to a live node. Identity is pointer identity.
#[derive(Clone)]
pub struct NodeRef {
    pub(crate) node: Rc<DomNode>,
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node.kind {
            NodeKind::Element(data) => write!(f, "<{}>", data.tag),
            NodeKind::Text(text) => write!(f, "#text({:?})", text.borrow()),
            NodeKind::Fragment => write!(f, "#fragment"),
        }
    }
}

impl NodeRef {
    fn document(&self) -> Option<Rc<DocumentInner>> {
        self.node.doc.upgrade()
    }

    fn element(&self) -> Option<&ElementData> {
        match &self.node.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.node.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.node.kind, NodeKind::Text(_))
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.node.kind, NodeKind::Fragment)
    }

    pub fn tag(&self) -> Option<&str> {
        self.element().map(|data| data.tag.as_str())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.element().and_then(|data| data.namespace.as_deref())
    }

    pub fn node_value(&self) -> Option<String> {
        match &self.node.kind {
            NodeKind::Text(text) => Some(text.borrow().clone()),
            _ => None,
        }
    }

    pub fn set_node_value(&self, value: &str) {
        if let NodeKind::Text(text) = &self.node.kind {
            *text.borrow_mut() = value.to_owned();
            if let Some(doc) = self.document() {
                doc.record(Mutation::SetText {
                    node: self.clone(),
                    text: value.to_owned(),
                });
            }
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.node.parent.borrow().upgrade().map(|node| NodeRef { node })
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.node.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.node.children.borrow().len()
    }

    pub fn first_child(&self) -> Option<NodeRef> {
        self.node.children.borrow().first().cloned()
    }

    pub fn next_sibling(&self) -> Option<NodeRef> {
        let parent = self.parent()?;
        let children = parent.node.children.borrow();
        let index = children.iter().position(|child| child == self)?;
        children.get(index + 1).cloned()
    }

    /// True when `other` is `self` or a descendant of `self`.
    pub fn contains(&self, other: &NodeRef) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node == *self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Inserts `node` into `self` before `before` (append when `None`).
    ///
    /// Inserting a node that already has a parent moves it; inserting a
    /// fragment splices its children in and leaves the fragment empty, like
    /// DocumentFragment insertion.
    pub fn insert_before(&self, node: &NodeRef, before: Option<&NodeRef>) {
        if node.is_fragment() {
            let moved: Vec<NodeRef> = node.node.children.borrow_mut().drain(..).collect();
            for child in moved {
                self.insert_before(&child, before);
            }
            return;
        }
        node.detach();
        let mut children = self.node.children.borrow_mut();
        let index = match before {
            Some(marker) => children
                .iter()
                .position(|child| child == marker)
                .unwrap_or(children.len()),
            None => children.len(),
        };
        children.insert(index, node.clone());
        drop(children);
        *node.node.parent.borrow_mut() = Rc::downgrade(&self.node);
        if let Some(doc) = self.document() {
            doc.record(Mutation::Insert {
                parent: self.clone(),
                node: node.clone(),
            });
        }
    }

    pub fn append_child(&self, node: &NodeRef) {
        self.insert_before(node, None);
    }

    /// Removes this node from its parent, if any.
    pub fn remove_from_parent(&self) {
        let had_parent = self.parent().is_some();
        self.detach();
        if had_parent {
            if let Some(doc) = self.document() {
                doc.record(Mutation::Remove { node: self.clone() });
            }
        }
    }

    fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent
                .node
                .children
                .borrow_mut()
                .retain(|child| child != self);
            *self.node.parent.borrow_mut() = Weak::new();
            if let Some(doc) = self.document() {
                // Focus never survives leaving the tree.
                doc.note_detached(self);
            }
        }
    }

    /// Drops all children (first-render clearing of a root).
    pub fn clear_children(&self) {
        let children: Vec<NodeRef> = self.node.children.borrow().clone();
        for child in children {
            child.remove_from_parent();
        }
    }

    // attributes

    pub fn set_attribute(&self, name: &str, value: &str) {
        if let Some(data) = self.element() {
            data.attributes
                .borrow_mut()
                .insert(name.to_owned(), value.to_owned());
            if let Some(doc) = self.document() {
                doc.record(Mutation::SetAttr {
                    node: self.clone(),
                    name: name.to_owned(),
                });
            }
        }
    }

    pub fn set_attribute_ns(&self, _ns: &str, name: &str, value: &str) {
        self.set_attribute(name, value);
    }

    pub fn remove_attribute(&self, name: &str) {
        if let Some(data) = self.element() {
            data.attributes.borrow_mut().shift_remove(name);
            if let Some(doc) = self.document() {
                doc.record(Mutation::RemoveAttr {
                    node: self.clone(),
                    name: name.to_owned(),
                });
            }
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.element()
            .and_then(|data| data.attributes.borrow().get(name).cloned())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.element()
            .is_some_and(|data| data.attributes.borrow().contains_key(name))
    }

    // properties

    /// Whether `name` is reflected as a direct property on this element.
    pub fn has_property(&self, name: &str) -> bool {
        self.is_element() && ELEMENT_PROPERTIES.contains(&name)
    }

    pub fn set_property(&self, name: &str, value: PropValue) {
        if let Some(data) = self.element() {
            data.properties.borrow_mut().insert(name.to_owned(), value);
            if let Some(doc) = self.document() {
                doc.record(Mutation::SetProp {
                    node: self.clone(),
                    name: name.to_owned(),
                });
            }
        }
    }

    pub fn property(&self, name: &str) -> Option<PropValue> {
        self.element()
            .and_then(|data| data.properties.borrow().get(name).cloned())
    }

    /// String form of a property, with the platform's `""` default for value.
    pub fn property_str(&self, name: &str) -> String {
        match self.property(name) {
            Some(PropValue::Str(value)) => value,
            Some(PropValue::Bool(flag)) => flag.to_string(),
            Some(PropValue::Num(value)) => value.to_string(),
            None => String::new(),
        }
    }

    // style

    pub fn set_style_property(&self, name: &str, value: &str) {
        if let Some(data) = self.element() {
            if value.is_empty() {
                data.style_props.borrow_mut().shift_remove(name);
            } else {
                data.style_props
                    .borrow_mut()
                    .insert(name.to_owned(), value.to_owned());
            }
            if let Some(doc) = self.document() {
                doc.record(Mutation::SetStyleProp {
                    node: self.clone(),
                    name: name.to_owned(),
                    value: value.to_owned(),
                });
            }
        }
    }

    pub fn style_property(&self, name: &str) -> Option<String> {
        self.element()
            .and_then(|data| data.style_props.borrow().get(name).cloned())
    }

    /// Overwrites the whole inline style. An empty string clears it.
    pub fn set_css_text(&self, text: &str) {
        if let Some(data) = self.element() {
            data.style_props.borrow_mut().clear();
            *data.css_text.borrow_mut() = text.to_owned();
            if let Some(doc) = self.document() {
                doc.record(Mutation::SetCssText {
                    node: self.clone(),
                    text: text.to_owned(),
                });
            }
        }
    }

    pub fn css_text(&self) -> String {
        self.element()
            .map(|data| data.css_text.borrow().clone())
            .unwrap_or_default()
    }

    // listeners

    pub fn add_listener(&self, event_type: &str, listener: Rc<dyn EventListener>) {
        if let Some(data) = self.element() {
            data.listeners
                .borrow_mut()
                .insert(event_type.to_owned(), listener);
            if let Some(doc) = self.document() {
                doc.record(Mutation::AddListener {
                    node: self.clone(),
                    event_type: event_type.to_owned(),
                });
            }
        }
    }

    pub fn remove_listener(&self, event_type: &str) {
        if let Some(data) = self.element() {
            data.listeners.borrow_mut().shift_remove(event_type);
            if let Some(doc) = self.document() {
                doc.record(Mutation::RemoveListener {
                    node: self.clone(),
                    event_type: event_type.to_owned(),
                });
            }
        }
    }

    pub fn has_listener(&self, event_type: &str) -> bool {
        self.element()
            .is_some_and(|data| data.listeners.borrow().contains_key(event_type))
    }

    /// Delivers an event of `event_type` to this node's listener, if any.
    /// Returns the event so callers can inspect the redraw flag.
    pub fn dispatch(&self, event_type: &str) -> Option<Event> {
        let listener = self
            .element()
            .and_then(|data| data.listeners.borrow().get(event_type).cloned())?;
        let event = Event::new(event_type, self.clone());
        listener.handle_event(&event);
        Some(event)
    }

    // embedder slot

    pub fn expando(&self) -> Option<Rc<dyn std::any::Any>> {
        self.node.expando.borrow().clone()
    }

    pub fn set_expando(&self, value: Option<Rc<dyn std::any::Any>>) {
        *self.node.expando.borrow_mut() = value;
    }

    // markup

    /// Remembered raw markup from the last wholesale `inner_html` write.
    pub fn raw_html(&self) -> Option<String> {
        self.element().and_then(|data| data.raw_html.borrow().clone())
    }

    /// Replaces this element's content by parsing `markup` in its own
    /// context, remembering the raw string for later comparison.
    pub fn set_inner_html(&self, doc: &Document, markup: &str) {
        let Some(data) = self.element() else { return };
        self.clear_children();
        let ns = data.namespace.clone();
        html::parse_into(doc, self, &data.tag.clone(), ns.as_deref(), markup);
        *data.raw_html.borrow_mut() = Some(markup.to_owned());
    }

    pub fn inner_html(&self) -> String {
        html::serialize_children(self)
    }

    pub fn outer_html(&self) -> String {
        html::serialize(self)
    }
}

#[cfg(test)]
mod tests;
