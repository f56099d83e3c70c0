//! Component traits and per-instance state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::deferred::Deferred;
use crate::{Child, VnodeRef};

/// A component definition. The `Rc<dyn ComponentSpec>` value is the tag: two
/// vnodes match as "the same component" when they hold the same spec pointer.
pub trait ComponentSpec: 'static {
    fn create(&self) -> Box<dyn Component>;
}

impl<F> ComponentSpec for F
where
    F: Fn() -> Box<dyn Component> + 'static,
{
    fn create(&self) -> Box<dyn Component> {
        self()
    }
}

/// A live component instance. `view` is required; lifecycle methods default
/// to no-ops. `onbeforeupdate` returning `None` means "no opinion".
pub trait Component: 'static {
    fn view(&mut self, vnode: &VnodeRef) -> Child;

    fn oninit(&mut self, _vnode: &VnodeRef) {}
    fn oncreate(&mut self, _vnode: &VnodeRef) {}
    fn onbeforeupdate(&mut self, _vnode: &VnodeRef, _old: &VnodeRef) -> Option<bool> {
        None
    }
    fn onupdate(&mut self, _vnode: &VnodeRef) {}
    fn onbeforeremove(&mut self, _vnode: &VnodeRef) -> Option<Deferred> {
        None
    }
    fn onremove(&mut self, _vnode: &VnodeRef) {}
}

/// The reconciler-owned state of a mounted component: the instance itself
/// plus the "currently rendering" re-entrancy flag.
pub struct ComponentState {
    component: RefCell<Box<dyn Component>>,
    rendering: Cell<bool>,
}

impl ComponentState {
    pub fn new(component: Box<dyn Component>) -> Rc<Self> {
        Rc::new(Self {
            component: RefCell::new(component),
            rendering: Cell::new(false),
        })
    }

    /// Marks the view as running. Returns `false` when a render of this
    /// instance is already in flight, in which case the caller must produce
    /// an inert placeholder instead of invoking the view again.
    pub fn begin_render(&self) -> bool {
        if self.rendering.get() {
            return false;
        }
        self.rendering.set(true);
        true
    }

    pub fn end_render(&self) {
        self.rendering.set(false);
    }

    pub fn with_component<R>(&self, f: impl FnOnce(&mut dyn Component) -> R) -> R {
        let mut component = self.component.borrow_mut();
        f(component.as_mut())
    }
}
