//! A narrow completion primitive for asynchronous removal waits.
//!
//! Removal hooks may hand the renderer a [`Deferred`]; teardown is postponed
//! until every outstanding deferred settles. Settlement carries no payload
//! and has no failure channel of its own: resolving and rejecting both count,
//! so the handle exposes a single `settle`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct DeferredInner {
    settled: Cell<bool>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl DeferredInner {
    fn settle(&self) {
        if self.settled.replace(true) {
            return;
        }
        let callbacks: Vec<_> = self.callbacks.borrow_mut().drain(..).collect();
        for callback in callbacks {
            callback();
        }
    }
}

/// The waitable side: registered callbacks run exactly once, when settled.
#[derive(Clone)]
pub struct Deferred {
    inner: Rc<DeferredInner>,
}

/// The completion side, handed to whoever finishes the asynchronous work.
#[derive(Clone)]
pub struct DeferredHandle {
    inner: Rc<DeferredInner>,
}

impl Deferred {
    pub fn new() -> (Deferred, DeferredHandle) {
        let inner = Rc::new(DeferredInner {
            settled: Cell::new(false),
            callbacks: RefCell::new(Vec::new()),
        });
        (
            Deferred {
                inner: Rc::clone(&inner),
            },
            DeferredHandle { inner },
        )
    }

    /// An already-settled deferred; callbacks run immediately.
    pub fn settled() -> Deferred {
        let (deferred, handle) = Deferred::new();
        handle.settle();
        deferred
    }

    pub fn is_settled(&self) -> bool {
        self.inner.settled.get()
    }

    pub fn on_settled(&self, callback: impl FnOnce() + 'static) {
        if self.inner.settled.get() {
            callback();
        } else {
            self.inner.callbacks.borrow_mut().push(Box::new(callback));
        }
    }
}

/// Settles the deferred. Any outcome of the underlying work maps to this
/// one call; settling twice is a no-op.
impl DeferredHandle {
    pub fn settle(&self) {
        self.inner.settle();
    }
}
