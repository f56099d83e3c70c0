//! Attribute, property, style and event-listener patching.
//!
//! One value at a time: scalar values that did not change are skipped
//! entirely (except form-state attributes, which the user may have moved
//! out from under us), styles diff keywise when both sides are maps, and
//! event handlers live in a per-node dictionary with one platform listener
//! per event type.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use arbor_core::collections::map::HashMap;
use arbor_core::{AttrValue, Attrs, EventHandler, Style, VnodeRef};
use arbor_dom::{Event, EventListener, NodeRef, PropValue, XLINK_NS};

use crate::{EventCallbackCell, Renderer};

impl Renderer {
    pub(crate) fn set_attrs(&self, vnode: &VnodeRef, ns: Option<&str>) {
        let attrs = vnode.attrs();
        if let Some(attrs) = attrs.as_ref() {
            for (name, value) in attrs.entries.iter() {
                self.set_attr(vnode, name, None, value, ns);
            }
        }
    }

    pub(crate) fn update_attrs(
        &self,
        vnode: &VnodeRef,
        old: Option<&Attrs>,
        attrs: Option<&Attrs>,
        ns: Option<&str>,
    ) {
        if let Some(attrs) = attrs {
            for (name, value) in attrs.entries.iter() {
                let old_value = old.and_then(|old| old.get(name));
                self.set_attr(vnode, name, old_value, value, ns);
            }
        }
        if let Some(old) = old {
            for name in old.entries.keys() {
                if attrs.is_some_and(|attrs| attrs.has(name)) {
                    continue;
                }
                if name.starts_with("on") {
                    self.update_event(vnode, name, None);
                    continue;
                }
                let Some(element) = vnode.dom() else { continue };
                if name == "style" {
                    element.set_css_text("");
                } else if name == "value" {
                    // Dropping a managed value resets the control.
                    element.set_property("value", PropValue::Str(String::new()));
                    element.remove_attribute("value");
                } else {
                    element.remove_attribute(name);
                }
            }
        }
    }

    fn set_attr(
        &self,
        vnode: &VnodeRef,
        name: &str,
        old: Option<&AttrValue>,
        value: &AttrValue,
        ns: Option<&str>,
    ) {
        // Event-shaped names always route to the listener dictionary.
        if name.starts_with("on") {
            let handler = match value {
                AttrValue::Handler(handler) => Some(handler.clone()),
                _ => None,
            };
            return self.update_event(vnode, name, handler.as_ref());
        }
        if let Some(old) = old {
            if old.scalar_eq(value) && !self.is_form_attribute(vnode, name) {
                return;
            }
        }
        let Some(element) = vnode.dom() else { return };
        if name.starts_with("xlink:") {
            element.set_attribute_ns(XLINK_NS, name, &value.to_attr_string());
        } else if name == "style" {
            self.update_style(&element, old.and_then(as_style), as_style(value));
        } else if element.has_property(name)
            && !is_attribute_only(name)
            && ns.is_none()
            && !is_custom_element(vnode)
        {
            if name == "value" && self.skip_value_write(vnode, &element, old, value) {
                return;
            }
            // input[type] is written as an attribute: assigning an
            // unsupported type as a property throws on some engines.
            if name == "type" && vnode.tag().element_name() == Some("input") {
                element.set_attribute(name, &value.to_attr_string());
                return;
            }
            element.set_property(name, prop_value(value));
        } else {
            match value {
                AttrValue::Bool(true) => element.set_attribute(name, ""),
                AttrValue::Bool(false) => element.remove_attribute(name),
                _ => element.set_attribute(name, &value.to_attr_string()),
            }
        }
    }

    /// Focus and flicker carve-outs for redundant `value` writes.
    fn skip_value_write(
        &self,
        vnode: &VnodeRef,
        element: &NodeRef,
        old: Option<&AttrValue>,
        value: &AttrValue,
    ) -> bool {
        let normalized = value.to_attr_string();
        let tag = vnode.tag().element_name();
        let focused = self.document().active_element().as_ref() == Some(element);
        // rewriting the value of a focused text control moves the caret
        if matches!(tag, Some("input") | Some("textarea"))
            && focused
            && element.property_str("value") == normalized
        {
            return true;
        }
        // rewriting a focused select's value closes its dropdown
        if tag == Some("select")
            && old.is_some()
            && focused
            && element.property_str("value") == normalized
        {
            return true;
        }
        if tag == Some("option") && old.is_some() && element.property_str("value") == normalized {
            return true;
        }
        false
    }

    /// `select` resolves `value`/`selectedIndex` against its options, so
    /// those two are re-applied after the children exist.
    pub(crate) fn set_late_attrs(&self, vnode: &VnodeRef) {
        if vnode.tag().element_name() != Some("select") {
            return;
        }
        let late: Vec<(String, AttrValue)> = {
            let attrs = vnode.attrs();
            let Some(attrs) = attrs.as_ref() else { return };
            ["value", "selectedIndex"]
                .iter()
                .filter_map(|name| attrs.get(name).map(|value| (name.to_string(), value.clone())))
                .collect()
        };
        for (name, value) in late {
            self.set_attr(vnode, &name, None, &value, None);
        }
    }

    fn update_style(&self, element: &NodeRef, old: Option<Style>, style: Option<Style>) {
        if let (Some(Style::Map(old_map)), Some(Style::Map(new_map))) = (&old, &style) {
            if !Rc::ptr_eq(old_map, new_map) {
                for (name, value) in new_map.iter() {
                    if old_map.get(name) != Some(value) {
                        element.set_style_property(name, value);
                    }
                }
                for name in old_map.keys() {
                    if !new_map.contains_key(name) {
                        element.set_style_property(name, "");
                    }
                }
                return;
            }
        }
        if let (Some(Style::Text(old_text)), Some(Style::Text(new_text))) = (&old, &style) {
            if old_text == new_text {
                return;
            }
        }
        // Same map object on both sides: its content may have been mutated
        // in place, so clear and rewrite wholesale.
        let mut old = old;
        if let (Some(a), Some(b)) = (&old, &style) {
            if a.same_ref(b) {
                element.set_css_text("");
                old = None;
            }
        }
        match &style {
            None => element.set_css_text(""),
            Some(Style::Text(text)) => element.set_css_text(text),
            Some(Style::Map(map)) => {
                if matches!(&old, Some(Style::Text(_))) {
                    element.set_css_text("");
                }
                for (name, value) in map.iter() {
                    element.set_style_property(name, value);
                }
            }
        }
    }

    pub(crate) fn update_event(
        &self,
        vnode: &VnodeRef,
        name: &str,
        handler: Option<&EventHandler>,
    ) {
        let event_type = &name[2..];
        let existing: Option<Rc<EventDict>> = vnode
            .events()
            .and_then(|any| any.downcast::<EventDict>().ok());
        if let Some(dict) = existing {
            match (dict.get(name), handler) {
                (Some(current), Some(handler)) if current.ptr_eq(handler) => return,
                (None, None) => return,
                _ => {}
            }
            match handler {
                Some(handler) => {
                    if dict.get(name).is_none() {
                        if let Some(dom) = vnode.dom() {
                            dom.add_listener(event_type, dict.clone());
                        }
                    }
                    dict.set(name, handler.clone());
                }
                None => {
                    if dict.get(name).is_some() {
                        if let Some(dom) = vnode.dom() {
                            dom.remove_listener(event_type);
                        }
                    }
                    dict.unset(name);
                }
            }
        } else if let Some(handler) = handler {
            let dict = Rc::new(EventDict::new(self.on_event.clone()));
            vnode.set_events(Some(dict.clone() as Rc<dyn Any>));
            if let Some(dom) = vnode.dom() {
                dom.add_listener(event_type, dict.clone());
            }
            dict.set(name, handler.clone());
        }
    }

    fn is_form_attribute(&self, vnode: &VnodeRef, name: &str) -> bool {
        if matches!(name, "value" | "checked" | "selectedIndex") {
            return true;
        }
        let active = self.document().active_element();
        if name == "selected" {
            return active.is_some() && vnode.dom() == active;
        }
        vnode.tag().element_name() == Some("option")
            && match (vnode.dom().and_then(|dom| dom.parent()), active) {
                (Some(parent), Some(active)) => parent == active,
                _ => false,
            }
    }
}

/// One dictionary per node: the platform listener is the dictionary itself,
/// registered once per event type; the handler is looked up at dispatch
/// time, so swapping handlers never touches the platform.
pub struct EventDict {
    handlers: RefCell<HashMap<String, EventHandler>>,
    on_event: Rc<EventCallbackCell>,
}

impl EventDict {
    fn new(on_event: Rc<EventCallbackCell>) -> Self {
        Self {
            handlers: RefCell::new(HashMap::default()),
            on_event,
        }
    }

    fn get(&self, name: &str) -> Option<EventHandler> {
        self.handlers.borrow().get(name).cloned()
    }

    fn set(&self, name: &str, handler: EventHandler) {
        self.handlers.borrow_mut().insert(name.to_owned(), handler);
    }

    fn unset(&self, name: &str) {
        self.handlers.borrow_mut().remove(name);
    }
}

impl EventListener for EventDict {
    fn handle_event(&self, event: &Event) {
        let name = format!("on{}", event.event_type());
        let handler = self.handlers.borrow().get(&name).cloned();
        if let Some(handler) = handler {
            handler.call(event);
        }
        // The event-occurred callback fires after the handler unless this
        // particular event opted out.
        if event.wants_redraw() {
            if let Some(callback) = self.on_event.get() {
                callback(event);
            }
        }
    }
}

fn as_style(value: &AttrValue) -> Option<Style> {
    match value {
        AttrValue::Style(style) => Some(style.clone()),
        AttrValue::Str(text) => Some(Style::Text(Rc::from(text.as_str()))),
        _ => None,
    }
}

fn prop_value(value: &AttrValue) -> PropValue {
    match value {
        AttrValue::Str(text) => PropValue::Str(text.clone()),
        AttrValue::Bool(flag) => PropValue::Bool(*flag),
        AttrValue::Num(number) => PropValue::Num(*number),
        other => PropValue::Str(other.to_attr_string()),
    }
}

/// Names that stay attributes even when a same-named property exists.
fn is_attribute_only(name: &str) -> bool {
    matches!(name, "href" | "list" | "form" | "width" | "height")
}

fn is_custom_element(vnode: &VnodeRef) -> bool {
    vnode.attrs().as_ref().is_some_and(|attrs| attrs.is.is_some())
        || vnode
            .tag()
            .element_name()
            .is_some_and(|tag| tag.contains('-'))
}
