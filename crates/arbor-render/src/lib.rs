//! The reconciliation engine: diffs node descriptors against the previous
//! pass and applies the narrowest set of host-tree mutations.
//!
//! [`Renderer::render`] is the only entry point. It owns no descriptor
//! memory of its own; the previous pass's top-level list rides on the root
//! node's embedder slot, so several roots can be driven by one renderer
//! independently.

mod attrs;
mod reconcile;

pub use attrs::EventDict;

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use arbor_core::{normalize_children, Child, ComponentState, NodeList, VnodeRef};
use arbor_dom::{Document, Event, NodeRef};

/// Contract violations a render pass can detect and refuse.
#[derive(Debug)]
pub enum RenderError {
    /// The render target is not an element.
    InvalidRoot,
    /// `render` was invoked while a pass over the same renderer was still
    /// mutating the tree.
    ReentrantRender,
    /// A component view returned its own vnode.
    ViewAlias,
    /// A `contenteditable` element was given managed children other than a
    /// single trusted-markup node.
    ContentEditableChildren,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidRoot => f.write_str("render target must be an element"),
            RenderError::ReentrantRender => {
                f.write_str("render invoked while a render pass is already running")
            }
            RenderError::ViewAlias => {
                f.write_str("a view must not return the vnode it is defined on")
            }
            RenderError::ContentEditableChildren => f.write_str(
                "a contenteditable element may only hold a single trusted-markup child",
            ),
        }
    }
}

impl std::error::Error for RenderError {}

/// Deferred lifecycle work queued during a pass and flushed at the end.
pub(crate) type HookQueue = Vec<Box<dyn FnOnce()>>;

/// Single-assignment slot for the event-occurred callback. Configured once
/// by the embedder (typically to schedule a redraw); later assignments are
/// refused.
pub(crate) struct EventCallbackCell {
    cell: OnceCell<Rc<dyn Fn(&Event)>>,
}

impl EventCallbackCell {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    fn set(&self, callback: Rc<dyn Fn(&Event)>) -> bool {
        self.cell.set(callback).is_ok()
    }

    pub(crate) fn get(&self) -> Option<&Rc<dyn Fn(&Event)>> {
        self.cell.get()
    }
}

/// The previous pass's top-level descriptor list, parked on the root node.
type RootSlot = RefCell<Option<NodeList>>;

pub struct Renderer {
    document: Document,
    on_event: Rc<EventCallbackCell>,
    in_pass: Cell<bool>,
}

impl Renderer {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            on_event: Rc::new(EventCallbackCell::new()),
            in_pass: Cell::new(false),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Configures the callback fired after every user event handler (unless
    /// the handler opted the event out). One-shot: the first configuration
    /// wins and later calls are ignored.
    pub fn set_event_callback(&self, callback: impl Fn(&Event) + 'static) {
        if !self.on_event.set(Rc::new(callback)) {
            log::warn!("event callback already configured; ignoring reassignment");
        }
    }

    /// Renders `children` into `root`, diffing against whatever the previous
    /// pass left there. The first pass over a root clears its existing
    /// content wholesale.
    pub fn render(&self, root: &NodeRef, children: Vec<Child>) -> Result<(), RenderError> {
        if !root.is_element() {
            return Err(RenderError::InvalidRoot);
        }
        if self.in_pass.get() {
            return Err(RenderError::ReentrantRender);
        }
        self.in_pass.set(true);
        let mut hooks: HookQueue = Vec::new();
        let result = self.render_pass(root, children, &mut hooks);
        self.in_pass.set(false);
        result?;
        // Lifecycle hooks run strictly after the whole tree mutation, in
        // queue order, outside the re-entrancy guard.
        for hook in hooks {
            hook();
        }
        Ok(())
    }

    /// Convenience wrapper for a single top-level child.
    pub fn render_one(&self, root: &NodeRef, child: impl Into<Child>) -> Result<(), RenderError> {
        self.render(root, vec![child.into()])
    }

    fn render_pass(
        &self,
        root: &NodeRef,
        children: Vec<Child>,
        hooks: &mut HookQueue,
    ) -> Result<(), RenderError> {
        let slot = self.root_slot(root);
        let old = slot.borrow_mut().take();
        let new_list = NodeList::new(normalize_children(children));
        log::trace!(
            "render pass: {} -> {} top-level descriptors",
            old.as_ref().map_or(0, NodeList::len),
            new_list.len()
        );

        let active = self.document.active_element();
        let ns = root.namespace().map(str::to_owned);
        self.update_nodes(
            root,
            old.as_ref(),
            Some(&new_list),
            false,
            hooks,
            None,
            ns.as_deref(),
        )?;
        *slot.borrow_mut() = Some(new_list);

        // The node that was focused going in gets focus back if the pass
        // moved it around (detachment clears focus even on reinsertion).
        if let Some(active) = active {
            if self.document.active_element().as_ref() != Some(&active)
                && active.parent().is_some()
            {
                self.document.focus(&active);
            }
        }
        Ok(())
    }

    /// Fetches the root's descriptor slot, installing it (and clearing any
    /// pre-existing content) on first use.
    fn root_slot(&self, root: &NodeRef) -> Rc<RootSlot> {
        if let Some(slot) = root
            .expando()
            .and_then(|any| any.downcast::<RootSlot>().ok())
        {
            return slot;
        }
        root.clear_children();
        let slot: Rc<RootSlot> = Rc::new(RefCell::new(None));
        root.set_expando(Some(slot.clone()));
        slot
    }
}

/// Panics when a hook replaced the per-instance state handle behind the
/// reconciler's back. The asynchronous removal path has no error channel, so
/// this contract breach is fatal rather than reported.
pub(crate) fn check_state(vnode: &VnodeRef, original: &Option<Rc<ComponentState>>) {
    let current = vnode.state();
    let same = match (original, &current) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if !same {
        panic!("component state must not be replaced from a lifecycle hook");
    }
}
