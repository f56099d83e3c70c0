//! Node descriptor model for the Arbor renderer.
//!
//! A [`Vnode`] describes one tree position for one render pass. Descriptors
//! are produced fresh every pass by the tree-construction layer (or by
//! normalizing raw strings, numbers, bools and lists) and are matched
//! against the previous pass's descriptors by tag + key identity; on a match
//! the new descriptor inherits the live node and per-instance state from its
//! predecessor. The fields the reconciler owns (`dom`, `dom_size`, `state`,
//! `events`, `instance`, `skip`) use interior mutability and must never be
//! touched by consumer code between passes.

pub mod attrs;
pub mod collections;
pub mod component;
pub mod deferred;

pub use attrs::{AttrValue, Attrs, EventHandler, Hooks, Style, StyleMap};
pub use component::{Component, ComponentSpec, ComponentState};
pub use deferred::{Deferred, DeferredHandle};

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use arbor_dom::NodeRef;

pub type VnodeRef = Rc<Vnode>;

/// Stable identity of a vnode within its sibling list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(Rc::from(value.as_str()))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value as i64)
    }
}

/// The kind of a tree position, decided once at construction time.
#[derive(Clone)]
pub enum Tag {
    /// A text node; the text lives in `children`.
    Text,
    /// Trusted markup; the raw markup lives in `children`.
    Trust,
    /// A keyless grouping of children spanning several live nodes.
    Fragment,
    /// A plain platform element.
    Element(Rc<str>),
    /// A component; the spec pointer is the tag identity.
    Component(Rc<dyn ComponentSpec>),
}

impl Tag {
    /// Tag identity: element names compare by name, components by spec
    /// pointer, the sentinels by variant.
    pub fn same(&self, other: &Tag) -> bool {
        match (self, other) {
            (Tag::Text, Tag::Text) => true,
            (Tag::Trust, Tag::Trust) => true,
            (Tag::Fragment, Tag::Fragment) => true,
            (Tag::Element(a), Tag::Element(b)) => a == b,
            (Tag::Component(a), Tag::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn element_name(&self) -> Option<&str> {
        match self {
            Tag::Element(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, Tag::Component(_))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Text => f.write_str("#text"),
            Tag::Trust => f.write_str("#trust"),
            Tag::Fragment => f.write_str("#fragment"),
            Tag::Element(name) => write!(f, "<{name}>"),
            Tag::Component(_) => f.write_str("#component"),
        }
    }
}

/// Shared recycling-pool storage. The cell is shared (not owned by the list)
/// because an asynchronous removal may offer a node to it after the pass
/// that created it has already finished.
pub type PoolCell = Rc<RefCell<Vec<VnodeRef>>>;

/// An ordered child list. Slots may be empty (a normalized "render nothing"
/// position that still occupies an index for diffing).
pub struct NodeList {
    items: Vec<Option<VnodeRef>>,
    pool: RefCell<Option<PoolCell>>,
}

impl NodeList {
    pub fn new(items: Vec<Option<VnodeRef>>) -> Self {
        Self {
            items,
            pool: RefCell::new(None),
        }
    }

    pub fn items(&self) -> &[Option<VnodeRef>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pool(&self) -> Option<PoolCell> {
        self.pool.borrow().clone()
    }

    pub fn ensure_pool(&self) -> PoolCell {
        let mut pool = self.pool.borrow_mut();
        pool.get_or_insert_with(|| Rc::new(RefCell::new(Vec::new())))
            .clone()
    }
}

impl From<Vec<Option<VnodeRef>>> for NodeList {
    fn from(items: Vec<Option<VnodeRef>>) -> Self {
        NodeList::new(items)
    }
}

/// A vnode's content. Exactly one of the three shapes holds at a time.
pub enum Children {
    None,
    Text(String),
    Nodes(NodeList),
}

impl Children {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&NodeList> {
        match self {
            Children::Nodes(list) => Some(list),
            _ => None,
        }
    }
}

/// One node descriptor. See the crate docs for the ownership rules.
pub struct Vnode {
    tag: Tag,
    key: Option<Key>,
    attrs: RefCell<Option<Attrs>>,
    children: RefCell<Children>,
    state: RefCell<Option<Rc<ComponentState>>>,
    events: RefCell<Option<Rc<dyn Any>>>,
    dom: RefCell<Option<NodeRef>>,
    dom_size: Cell<Option<usize>>,
    instance: RefCell<Option<VnodeRef>>,
    skip: Cell<bool>,
}

impl Vnode {
    pub fn new(tag: Tag, key: Option<Key>, attrs: Option<Attrs>, children: Children) -> VnodeRef {
        Rc::new(Self {
            tag,
            key,
            attrs: RefCell::new(attrs),
            children: RefCell::new(children),
            state: RefCell::new(None),
            events: RefCell::new(None),
            dom: RefCell::new(None),
            dom_size: Cell::new(None),
            instance: RefCell::new(None),
            skip: Cell::new(false),
        })
    }

    pub fn text(text: impl Into<String>) -> VnodeRef {
        Vnode::new(Tag::Text, None, None, Children::Text(text.into()))
    }

    /// Trusted markup, rendered verbatim without escaping.
    pub fn trust(markup: impl Into<String>) -> VnodeRef {
        Vnode::new(Tag::Trust, None, None, Children::Text(markup.into()))
    }

    pub fn fragment(children: Vec<Child>) -> VnodeRef {
        Vnode::fragment_with(None, None, children)
    }

    pub fn fragment_with(key: Option<Key>, attrs: Option<Attrs>, children: Vec<Child>) -> VnodeRef {
        Vnode::new(
            Tag::Fragment,
            key,
            attrs,
            Children::Nodes(NodeList::new(normalize_children(children))),
        )
    }

    pub fn component(spec: Rc<dyn ComponentSpec>) -> VnodeRef {
        Vnode::component_with(spec, None, None)
    }

    pub fn component_with(
        spec: Rc<dyn ComponentSpec>,
        key: Option<Key>,
        attrs: Option<Attrs>,
    ) -> VnodeRef {
        Vnode::new(Tag::Component(spec), key, attrs, Children::None)
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn attrs(&self) -> Ref<'_, Option<Attrs>> {
        self.attrs.borrow()
    }

    pub fn attrs_mut(&self) -> RefMut<'_, Option<Attrs>> {
        self.attrs.borrow_mut()
    }

    pub fn children(&self) -> Ref<'_, Children> {
        self.children.borrow()
    }

    pub fn children_mut(&self) -> RefMut<'_, Children> {
        self.children.borrow_mut()
    }

    // reconciler-owned fields

    pub fn state(&self) -> Option<Rc<ComponentState>> {
        self.state.borrow().clone()
    }

    pub fn set_state(&self, state: Option<Rc<ComponentState>>) {
        *self.state.borrow_mut() = state;
    }

    pub fn events(&self) -> Option<Rc<dyn Any>> {
        self.events.borrow().clone()
    }

    pub fn set_events(&self, events: Option<Rc<dyn Any>>) {
        *self.events.borrow_mut() = events;
    }

    pub fn dom(&self) -> Option<NodeRef> {
        self.dom.borrow().clone()
    }

    pub fn set_dom(&self, dom: Option<NodeRef>) {
        *self.dom.borrow_mut() = dom;
    }

    /// Count of consecutive live nodes this vnode owns. Populated only when
    /// that count is not exactly one.
    pub fn dom_size(&self) -> Option<usize> {
        self.dom_size.get()
    }

    pub fn set_dom_size(&self, size: Option<usize>) {
        self.dom_size.set(size);
    }

    pub fn instance(&self) -> Option<VnodeRef> {
        self.instance.borrow().clone()
    }

    pub fn set_instance(&self, instance: Option<VnodeRef>) {
        *self.instance.borrow_mut() = instance;
    }

    pub fn skip(&self) -> bool {
        self.skip.get()
    }

    pub fn set_skip(&self, skip: bool) {
        self.skip.set(skip);
    }
}

impl fmt::Debug for Vnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vnode({:?}", self.tag)?;
        if let Some(key) = &self.key {
            write!(f, ", key={key:?}")?;
        }
        f.write_str(")")
    }
}

/// Raw input accepted wherever children go; normalization turns it into
/// descriptor slots.
pub enum Child {
    Node(VnodeRef),
    List(Vec<Child>),
    Text(String),
    Bool(bool),
    Empty,
}

impl From<VnodeRef> for Child {
    fn from(node: VnodeRef) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_owned())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Text(value.to_string())
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Text(value.to_string())
    }
}

impl From<bool> for Child {
    fn from(value: bool) -> Self {
        Child::Bool(value)
    }
}

impl From<Vec<Child>> for Child {
    fn from(list: Vec<Child>) -> Self {
        Child::List(list)
    }
}

impl From<ElementBuilder> for Child {
    fn from(builder: ElementBuilder) -> Self {
        Child::Node(builder.build())
    }
}

/// Normalizes one raw child: lists become fragment vnodes, text and numbers
/// become text vnodes, `false` becomes empty text, `Empty` stays an empty
/// slot.
pub fn normalize(child: Child) -> Option<VnodeRef> {
    match child {
        Child::Node(node) => Some(node),
        Child::List(list) => Some(Vnode::fragment(list)),
        Child::Text(text) => Some(Vnode::text(text)),
        Child::Bool(false) => Some(Vnode::text("")),
        Child::Bool(true) => Some(Vnode::text("true")),
        Child::Empty => None,
    }
}

pub fn normalize_children(children: Vec<Child>) -> Vec<Option<VnodeRef>> {
    children.into_iter().map(normalize).collect()
}

/// Builder for element vnodes; the tree-construction layer's shorthand.
pub struct ElementBuilder {
    tag: Rc<str>,
    key: Option<Key>,
    attrs: Attrs,
    children: Vec<Child>,
    text: Option<String>,
}

pub fn el(tag: &str) -> ElementBuilder {
    ElementBuilder {
        tag: Rc::from(tag),
        key: None,
        attrs: Attrs::new(),
        children: Vec::new(),
        text: None,
    }
}

impl ElementBuilder {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.set(name, value);
        self
    }

    pub fn style(self, style: Style) -> Self {
        self.attr("style", style)
    }

    pub fn is(mut self, name: impl Into<String>) -> Self {
        self.attrs.is = Some(name.into());
        self
    }

    /// Installs a handler for `on<event_type>`.
    pub fn on(self, event_type: &str, handler: impl Fn(&arbor_dom::Event) + 'static) -> Self {
        self.attr(format!("on{event_type}"), EventHandler::new(handler))
    }

    pub fn oninit(mut self, hook: impl Fn(&VnodeRef) + 'static) -> Self {
        self.attrs.hooks.oninit = Some(Rc::new(hook));
        self
    }

    pub fn oncreate(mut self, hook: impl Fn(&VnodeRef) + 'static) -> Self {
        self.attrs.hooks.oncreate = Some(Rc::new(hook));
        self
    }

    pub fn onbeforeupdate(
        mut self,
        hook: impl Fn(&VnodeRef, &VnodeRef) -> Option<bool> + 'static,
    ) -> Self {
        self.attrs.hooks.onbeforeupdate = Some(Rc::new(hook));
        self
    }

    pub fn onupdate(mut self, hook: impl Fn(&VnodeRef) + 'static) -> Self {
        self.attrs.hooks.onupdate = Some(Rc::new(hook));
        self
    }

    pub fn onbeforeremove(
        mut self,
        hook: impl Fn(&VnodeRef) -> Option<Deferred> + 'static,
    ) -> Self {
        self.attrs.hooks.onbeforeremove = Some(Rc::new(hook));
        self
    }

    pub fn onremove(mut self, hook: impl Fn(&VnodeRef) + 'static) -> Self {
        self.attrs.hooks.onremove = Some(Rc::new(hook));
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: Vec<Child>) -> Self {
        self.children.extend(children);
        self
    }

    /// Literal text content; mutually exclusive with structured children.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn build(self) -> VnodeRef {
        let children = if let Some(text) = self.text {
            Children::Text(text)
        } else if self.children.is_empty() {
            Children::None
        } else {
            Children::Nodes(NodeList::new(normalize_children(self.children)))
        };
        let attrs = if self.attrs.entries.is_empty()
            && self.attrs.is.is_none()
            && !has_any_hook(&self.attrs.hooks)
        {
            None
        } else {
            Some(self.attrs)
        };
        Vnode::new(Tag::Element(self.tag), self.key, attrs, children)
    }
}

fn has_any_hook(hooks: &Hooks) -> bool {
    hooks.oninit.is_some()
        || hooks.oncreate.is_some()
        || hooks.onbeforeupdate.is_some()
        || hooks.onupdate.is_some()
        || hooks.onbeforeremove.is_some()
        || hooks.onremove.is_some()
}
