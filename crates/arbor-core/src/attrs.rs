//! Attribute, style and lifecycle-hook records carried on a vnode.
//!
//! Attribute values are a closed variant rather than duck-typed: event
//! handlers and style maps are their own cases, so the patcher dispatches on
//! shape instead of sniffing names and `typeof`s. Lifecycle hooks live in a
//! dedicated [`Hooks`] record and never appear in the attribute map at all.

use std::fmt;
use std::rc::Rc;

use arbor_dom::Event;
use indexmap::IndexMap;

use crate::deferred::Deferred;
use crate::VnodeRef;

/// A user event handler, compared by identity like any other retained value.
#[derive(Clone)]
pub struct EventHandler {
    callback: Rc<dyn Fn(&Event)>,
}

impl EventHandler {
    pub fn new(callback: impl Fn(&Event) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn call(&self, event: &Event) {
        (self.callback)(event);
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

pub type StyleMap = IndexMap<String, String>;

/// Inline style, either a raw css string or a property map. Both forms keep
/// reference identity so the patcher can tell "same object" from "equal
/// content".
#[derive(Clone, Debug)]
pub enum Style {
    Text(Rc<str>),
    Map(Rc<StyleMap>),
}

impl Style {
    pub fn text(text: impl AsRef<str>) -> Self {
        Style::Text(Rc::from(text.as_ref()))
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Style::Map(Rc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn same_ref(&self, other: &Style) -> bool {
        match (self, other) {
            (Style::Text(a), Style::Text(b)) => Rc::ptr_eq(a, b),
            (Style::Map(a), Style::Map(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// One attribute value.
#[derive(Clone, Debug)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    Num(f64),
    Style(Style),
    Handler(EventHandler),
}

impl AttrValue {
    /// Scalar equality; styles and handlers always report `false` here and
    /// are diffed by their own patchers.
    pub fn scalar_eq(&self, other: &AttrValue) -> bool {
        match (self, other) {
            (AttrValue::Str(a), AttrValue::Str(b)) => a == b,
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Num(a), AttrValue::Num(b)) => a == b,
            _ => false,
        }
    }

    /// The string written through the generic attribute path.
    pub fn to_attr_string(&self) -> String {
        match self {
            AttrValue::Str(value) => value.clone(),
            AttrValue::Bool(flag) => flag.to_string(),
            AttrValue::Num(value) => value.to_string(),
            AttrValue::Style(Style::Text(text)) => text.to_string(),
            AttrValue::Style(Style::Map(map)) => map
                .iter()
                .map(|(k, v)| format!("{k}: {v};"))
                .collect::<Vec<_>>()
                .join(" "),
            AttrValue::Handler(_) => String::new(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Num(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Num(value as f64)
    }
}

impl From<Style> for AttrValue {
    fn from(value: Style) -> Self {
        AttrValue::Style(value)
    }
}

impl From<EventHandler> for AttrValue {
    fn from(value: EventHandler) -> Self {
        AttrValue::Handler(value)
    }
}

pub type InitHook = Rc<dyn Fn(&VnodeRef)>;
pub type CreateHook = Rc<dyn Fn(&VnodeRef)>;
pub type UpdateHook = Rc<dyn Fn(&VnodeRef)>;
pub type BeforeUpdateHook = Rc<dyn Fn(&VnodeRef, &VnodeRef) -> Option<bool>>;
pub type BeforeRemoveHook = Rc<dyn Fn(&VnodeRef) -> Option<Deferred>>;
pub type RemoveHook = Rc<dyn Fn(&VnodeRef)>;

/// Attribute-level lifecycle callbacks.
#[derive(Clone, Default)]
pub struct Hooks {
    pub oninit: Option<InitHook>,
    pub oncreate: Option<CreateHook>,
    pub onbeforeupdate: Option<BeforeUpdateHook>,
    pub onupdate: Option<UpdateHook>,
    pub onbeforeremove: Option<BeforeRemoveHook>,
    pub onremove: Option<RemoveHook>,
}

impl Hooks {
    /// Hooks that make a node ineligible for the recycling pool.
    pub fn has_integration_hooks(&self) -> bool {
        self.oncreate.is_some()
            || self.onupdate.is_some()
            || self.onbeforeremove.is_some()
            || self.onremove.is_some()
    }
}

/// The attribute record of one vnode.
#[derive(Clone, Default)]
pub struct Attrs {
    pub entries: IndexMap<String, AttrValue>,
    /// Customized built-in marker (`is`); forces the attribute write path.
    pub is: Option<String>,
    pub hooks: Hooks,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Explicit `xmlns` attribute, consulted for namespace resolution.
    pub fn xmlns(&self) -> Option<&str> {
        match self.entries.get("xmlns") {
            Some(AttrValue::Str(value)) => Some(value.as_str()),
            _ => None,
        }
    }
}
