use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbor_core::{
    el, Attrs, Child, Component, ComponentSpec, ComponentState, Deferred, Vnode, VnodeRef,
};
use arbor_testing::{removes, RenderError, TestDom};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[test]
fn attr_hooks_run_in_creation_then_update_order() {
    let dom = TestDom::new();
    let events = log();

    let item = |events: &Log| {
        let oninit_log = events.clone();
        let oncreate_log = events.clone();
        el("div")
            .oninit(move |vnode| {
                // the node does not exist yet while oninit runs
                assert!(vnode.dom().is_none());
                oninit_log.borrow_mut().push("init");
            })
            .oncreate(move |vnode| {
                // oncreate sees the node attached
                assert!(vnode.dom().unwrap().parent().is_some());
                oncreate_log.borrow_mut().push("create");
            })
    };

    dom.render_one(item(&events)).unwrap();
    assert_eq!(*events.borrow(), vec!["init", "create"]);

    let onupdate_log = events.clone();
    dom.render_one(
        el("div").onupdate(move |_| onupdate_log.borrow_mut().push("update")),
    )
    .unwrap();
    assert_eq!(*events.borrow(), vec!["init", "create", "update"]);
}

#[test]
fn onbeforeupdate_false_freezes_the_subtree() {
    let dom = TestDom::new();
    let frozen = |text: &str, verdict: Option<bool>| {
        el("div")
            .onbeforeupdate(move |_, _| verdict)
            .child(el("span").text(text))
    };
    dom.render_one(frozen("old", None)).unwrap();
    assert_eq!(dom.html(), "<div><span>old</span></div>");

    dom.render_one(frozen("new", Some(false))).unwrap();
    assert_eq!(dom.html(), "<div><span>old</span></div>");

    dom.render_one(frozen("new", Some(true))).unwrap();
    assert_eq!(dom.html(), "<div><span>new</span></div>");

    // no opinion means update
    dom.render_one(frozen("newest", None)).unwrap();
    assert_eq!(dom.html(), "<div><span>newest</span></div>");
}

struct Gated {
    label: Rc<RefCell<String>>,
    verdict: Rc<Cell<Option<bool>>>,
    views: Rc<Cell<u32>>,
}

impl Component for Gated {
    fn view(&mut self, _vnode: &VnodeRef) -> Child {
        self.views.set(self.views.get() + 1);
        el("p").text(self.label.borrow().clone()).into()
    }

    fn onbeforeupdate(&mut self, _vnode: &VnodeRef, _old: &VnodeRef) -> Option<bool> {
        self.verdict.get()
    }
}

#[test]
fn a_component_refusing_an_update_keeps_its_subtree() {
    let dom = TestDom::new();
    let label = Rc::new(RefCell::new(String::from("one")));
    let verdict = Rc::new(Cell::new(None));
    let views = Rc::new(Cell::new(0u32));
    let spec: Rc<dyn ComponentSpec> = {
        let (label, verdict, views) = (label.clone(), verdict.clone(), views.clone());
        Rc::new(move || {
            Box::new(Gated {
                label: label.clone(),
                verdict: verdict.clone(),
                views: views.clone(),
            }) as Box<dyn Component>
        })
    };

    dom.render_one(Vnode::component(spec.clone())).unwrap();
    assert_eq!(dom.html(), "<p>one</p>");
    assert_eq!(views.get(), 1);

    *label.borrow_mut() = String::from("two");
    verdict.set(Some(false));
    dom.render_one(Vnode::component(spec.clone())).unwrap();
    assert_eq!(dom.html(), "<p>one</p>");
    assert_eq!(views.get(), 1);

    verdict.set(Some(true));
    dom.render_one(Vnode::component(spec)).unwrap();
    assert_eq!(dom.html(), "<p>two</p>");
    assert_eq!(views.get(), 2);
}

struct Recorder {
    events: Log,
    label: &'static str,
}

impl Component for Recorder {
    fn view(&mut self, _vnode: &VnodeRef) -> Child {
        self.events.borrow_mut().push("view");
        el("p").text(self.label).into()
    }

    fn oninit(&mut self, _vnode: &VnodeRef) {
        self.events.borrow_mut().push("oninit");
    }

    fn oncreate(&mut self, _vnode: &VnodeRef) {
        self.events.borrow_mut().push("oncreate");
    }

    fn onupdate(&mut self, _vnode: &VnodeRef) {
        self.events.borrow_mut().push("onupdate");
    }

    fn onremove(&mut self, _vnode: &VnodeRef) {
        self.events.borrow_mut().push("onremove");
    }
}

fn recorder_spec(events: Log) -> Rc<dyn ComponentSpec> {
    Rc::new(move || {
        Box::new(Recorder {
            events: events.clone(),
            label: "hi",
        }) as Box<dyn Component>
    })
}

#[test]
fn component_lifecycle_across_three_passes() {
    let dom = TestDom::new();
    let events = log();
    let spec = recorder_spec(events.clone());

    dom.render_one(Vnode::component(spec.clone())).unwrap();
    assert_eq!(dom.html(), "<p>hi</p>");
    assert_eq!(*events.borrow(), vec!["oninit", "view", "oncreate"]);

    events.borrow_mut().clear();
    dom.render_one(Vnode::component(spec.clone())).unwrap();
    assert_eq!(*events.borrow(), vec!["view", "onupdate"]);

    events.borrow_mut().clear();
    dom.render(vec![]).unwrap();
    assert_eq!(*events.borrow(), vec!["onremove"]);
    assert_eq!(dom.html(), "");
}

#[test]
fn swapping_component_specs_tears_down_and_rebuilds() {
    let dom = TestDom::new();
    let events_a = log();
    let events_b = log();
    let spec_a = recorder_spec(events_a.clone());
    let spec_b = recorder_spec(events_b.clone());

    dom.render_one(Vnode::component(spec_a)).unwrap();
    events_a.borrow_mut().clear();

    // different spec pointer: not the same component
    dom.render_one(Vnode::component(spec_b)).unwrap();
    assert_eq!(*events_a.borrow(), vec!["onremove"]);
    assert_eq!(*events_b.borrow(), vec!["oninit", "view", "oncreate"]);
}

#[test]
fn deferred_removal_detaches_only_after_settlement() {
    let dom = TestDom::new();
    let (deferred, handle) = Deferred::new();
    let events = log();

    let removal_log = events.clone();
    dom.render_one(
        el("div")
            .text("stay")
            .onbeforeremove(move |_| Some(deferred.clone()))
            .onremove(move |_| removal_log.borrow_mut().push("onremove")),
    )
    .unwrap();
    dom.document().clear_mutations();

    dom.render(vec![]).unwrap();
    // still attached while the deferred is pending
    assert_eq!(dom.html(), "<div>stay</div>");
    assert!(events.borrow().is_empty());
    assert_eq!(removes(&dom.take_mutations()), 0);

    handle.settle();
    assert_eq!(dom.html(), "");
    assert_eq!(*events.borrow(), vec!["onremove"]);
    assert_eq!(removes(&dom.take_mutations()), 1);

    // settling again must not detach twice
    handle.settle();
    assert_eq!(removes(&dom.take_mutations()), 0);
}

struct DeferredRemoval {
    deferred: Deferred,
    events: Log,
}

impl Component for DeferredRemoval {
    fn view(&mut self, _vnode: &VnodeRef) -> Child {
        el("p").text("x").into()
    }

    fn onbeforeremove(&mut self, _vnode: &VnodeRef) -> Option<Deferred> {
        Some(self.deferred.clone())
    }

    fn onremove(&mut self, _vnode: &VnodeRef) {
        self.events.borrow_mut().push("component onremove");
    }
}

#[test]
fn removal_waits_for_attr_and_component_deferreds() {
    let dom = TestDom::new();
    let (component_deferred, component_handle) = Deferred::new();
    let (attr_deferred, attr_handle) = Deferred::new();
    let events = log();

    let spec: Rc<dyn ComponentSpec> = {
        let deferred = component_deferred.clone();
        let events = events.clone();
        Rc::new(move || {
            Box::new(DeferredRemoval {
                deferred: deferred.clone(),
                events: events.clone(),
            }) as Box<dyn Component>
        })
    };
    let mut attrs = Attrs::new();
    attrs.hooks.onbeforeremove = Some(Rc::new(move |_: &VnodeRef| Some(attr_deferred.clone())));
    dom.render_one(Vnode::component_with(spec, None, Some(attrs)))
        .unwrap();

    dom.render(vec![]).unwrap();
    assert_eq!(dom.html(), "<p>x</p>");

    attr_handle.settle();
    assert_eq!(dom.html(), "<p>x</p>");

    component_handle.settle();
    assert_eq!(dom.html(), "");
    assert_eq!(*events.borrow(), vec!["component onremove"]);
}

#[test]
fn onremove_runs_depth_first() {
    let dom = TestDom::new();
    let events = log();
    let outer_log = events.clone();
    let inner_log = events.clone();

    dom.render_one(
        el("div")
            .onremove(move |_| outer_log.borrow_mut().push("outer"))
            .child(el("span").onremove(move |_| inner_log.borrow_mut().push("inner"))),
    )
    .unwrap();
    dom.render(vec![]).unwrap();
    assert_eq!(*events.borrow(), vec!["outer", "inner"]);
}

struct Alias;

impl Component for Alias {
    fn view(&mut self, vnode: &VnodeRef) -> Child {
        Child::Node(vnode.clone())
    }
}

#[test]
fn view_returning_its_own_vnode_is_rejected() {
    let dom = TestDom::new();
    let spec: Rc<dyn ComponentSpec> = Rc::new(|| Box::new(Alias) as Box<dyn Component>);
    let result = dom.render_one(Vnode::component(spec));
    assert!(matches!(result, Err(RenderError::ViewAlias)));
}

struct Noop;

impl Component for Noop {
    fn view(&mut self, _vnode: &VnodeRef) -> Child {
        Child::Empty
    }
}

#[test]
#[should_panic(expected = "state must not be replaced")]
fn replacing_state_from_a_hook_panics() {
    let dom = TestDom::new();
    dom.render_one(el("div").oninit(|vnode| {
        vnode.set_state(Some(ComponentState::new(Box::new(Noop))));
    }))
    .unwrap();
}

struct Reentrant {
    dom: Rc<TestDom>,
    seen: Rc<Cell<bool>>,
}

impl Component for Reentrant {
    fn view(&mut self, _vnode: &VnodeRef) -> Child {
        let result = self.dom.render(vec![]);
        assert!(matches!(result, Err(RenderError::ReentrantRender)));
        self.seen.set(true);
        el("p").text("x").into()
    }
}

#[test]
fn render_is_rejected_while_a_pass_is_running() {
    let dom = Rc::new(TestDom::new());
    let seen = Rc::new(Cell::new(false));
    let spec: Rc<dyn ComponentSpec> = {
        let dom = dom.clone();
        let seen = seen.clone();
        Rc::new(move || {
            Box::new(Reentrant {
                dom: dom.clone(),
                seen: seen.clone(),
            }) as Box<dyn Component>
        })
    };
    dom.render_one(Vnode::component(spec)).unwrap();
    assert!(seen.get());
    assert_eq!(dom.html(), "<p>x</p>");
}
