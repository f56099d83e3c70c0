use std::cell::Cell;
use std::rc::Rc;

use arbor_core::el;
use arbor_testing::TestDom;

#[test]
fn removed_nodes_come_back_from_the_pool() {
    let dom = TestDom::new();
    dom.render_one(el("div").text("x")).unwrap();
    let first = dom.root().first_child().unwrap();

    dom.render(vec![]).unwrap();
    assert_eq!(dom.html(), "");

    dom.render_one(el("div").text("x")).unwrap();
    assert_eq!(dom.html(), "<div>x</div>");
    assert_eq!(dom.root().first_child(), Some(first));
}

#[test]
fn revived_nodes_run_the_creation_lifecycle_again() {
    let dom = TestDom::new();
    let inits = Rc::new(Cell::new(0u32));
    let item = |inits: &Rc<Cell<u32>>| {
        let counter = inits.clone();
        el("div")
            .text("x")
            .oninit(move |_| counter.set(counter.get() + 1))
    };

    dom.render_one(item(&inits)).unwrap();
    let first = dom.root().first_child().unwrap();
    assert_eq!(inits.get(), 1);

    dom.render(vec![]).unwrap();
    dom.render_one(item(&inits)).unwrap();
    // the descriptor is initialized afresh even though the node is reused
    assert_eq!(inits.get(), 2);
    assert_eq!(dom.root().first_child(), Some(first));
}

#[test]
fn nodes_with_integration_hooks_are_never_pooled() {
    let dom = TestDom::new();
    let item = || el("div").text("x").oncreate(|_| {});

    dom.render_one(item()).unwrap();
    let first = dom.root().first_child().unwrap();

    dom.render(vec![]).unwrap();
    dom.render_one(item()).unwrap();
    assert_eq!(dom.html(), "<div>x</div>");
    assert_ne!(dom.root().first_child(), Some(first));
}

#[test]
fn keyed_revival_reorders_correctly() {
    let dom = TestDom::new();
    let keyed = |keys: &[&str]| {
        keys.iter()
            .map(|key| el("li").key(*key).text(*key).into())
            .collect::<Vec<_>>()
    };

    dom.render(keyed(&["a", "b"])).unwrap();
    let a = dom.root().children()[0].clone();
    let b = dom.root().children()[1].clone();

    dom.render(vec![]).unwrap();

    // revival must still honor the requested order
    dom.render(keyed(&["b", "a"])).unwrap();
    assert_eq!(dom.html(), "<li>b</li><li>a</li>");
    assert_eq!(dom.root().children(), vec![b, a]);
}

#[test]
fn a_shape_mismatch_falls_back_to_fresh_nodes() {
    let dom = TestDom::new();
    dom.render_one(el("div").text("x")).unwrap();
    dom.render(vec![]).unwrap();

    dom.render_one(el("span").text("y")).unwrap();
    assert_eq!(dom.html(), "<span>y</span>");
}
