use arbor_core::{el, Child, Vnode};
use arbor_dom::Document;
use arbor_testing::{count_mutations, RenderError, Renderer, TestDom};

#[test]
fn the_render_target_must_be_an_element() {
    let document = Document::new();
    let text = document.create_text("x");
    let renderer = Renderer::new(document);
    let result = renderer.render(&text, vec![]);
    assert!(matches!(result, Err(RenderError::InvalidRoot)));
}

#[test]
fn the_first_pass_clears_existing_root_content() {
    let dom = TestDom::new();
    let stray = dom.document().create_element("p");
    dom.root().append_child(&stray);

    dom.render_one(el("span").text("managed")).unwrap();
    assert_eq!(dom.html(), "<span>managed</span>");
    assert!(stray.parent().is_none());
}

#[test]
fn nested_trees_serialize_in_document_order() {
    let dom = TestDom::new();
    dom.render_one(
        el("ul")
            .attr("class", "menu")
            .child(el("li").text("one"))
            .child(el("li").child(el("a").attr("href", "/x").text("two"))),
    )
    .unwrap();
    assert_eq!(
        dom.html(),
        "<ul class=\"menu\"><li>one</li><li><a href=\"/x\">two</a></li></ul>"
    );
}

#[test]
fn text_changes_touch_only_the_text_node() {
    let dom = TestDom::new();
    dom.render_and_reset(vec![el("p").text("before").into()]).unwrap();

    dom.render_one(el("p").text("after")).unwrap();
    let counts = count_mutations(&dom.take_mutations());
    assert_eq!(counts.set_texts, 1);
    assert_eq!(counts.inserts, 0);
    assert_eq!(counts.removes, 0);
    assert_eq!(dom.html(), "<p>after</p>");
}

#[test]
fn trusted_markup_renders_verbatim() {
    let dom = TestDom::new();
    dom.render_one(Vnode::trust("<b>bold</b> and plain")).unwrap();
    assert_eq!(dom.html(), "<b>bold</b> and plain");
}

#[test]
fn unchanged_trusted_markup_is_left_alone() {
    let dom = TestDom::new();
    dom.render_and_reset(vec![Child::Node(Vnode::trust("<b>x</b>"))])
        .unwrap();
    let bold = dom.root().first_child().unwrap();

    dom.render_one(Vnode::trust("<b>x</b>")).unwrap();
    assert!(dom.take_mutations().is_empty());
    assert_eq!(dom.root().first_child(), Some(bold));
}

#[test]
fn changed_trusted_markup_is_reparsed() {
    let dom = TestDom::new();
    dom.render_one(Vnode::trust("<b>x</b>")).unwrap();
    dom.render_one(Vnode::trust("<i>y</i><i>z</i>")).unwrap();
    assert_eq!(dom.html(), "<i>y</i><i>z</i>");
}

#[test]
fn trusted_table_cells_keep_their_element_shape() {
    // td only parses inside a row, so the parser gets a matching context
    let dom = TestDom::new();
    dom.render_one(el("tr").child(Vnode::trust("<td>x</td>"))).unwrap();
    assert_eq!(dom.html(), "<tr><td>x</td></tr>");
}

#[test]
fn fragments_splice_flat_into_their_parent() {
    let dom = TestDom::new();
    let list = |texts: &[&str]| -> Child {
        Child::List(texts.iter().map(|t| el("li").text(*t).into()).collect())
    };
    dom.render(vec![list(&["a", "b"]), el("p").text("tail").into()])
        .unwrap();
    assert_eq!(dom.html(), "<li>a</li><li>b</li><p>tail</p>");
    let tail = dom.root().children().last().cloned().unwrap();

    // growing the fragment keeps the following sibling in place
    dom.render(vec![list(&["a", "b", "c"]), el("p").text("tail").into()])
        .unwrap();
    assert_eq!(dom.html(), "<li>a</li><li>b</li><li>c</li><p>tail</p>");
    assert_eq!(dom.root().children().last(), Some(&tail));

    dom.render(vec![list(&[]), el("p").text("tail").into()]).unwrap();
    assert_eq!(dom.html(), "<p>tail</p>");
}

#[test]
fn contenteditable_accepts_a_single_trusted_child() {
    let dom = TestDom::new();
    dom.render_one(
        el("div")
            .attr("contenteditable", "true")
            .child(Child::Node(Vnode::trust("<b>draft</b>"))),
    )
    .unwrap();
    assert_eq!(
        dom.html(),
        "<div contenteditable=\"true\"><b>draft</b></div>"
    );

    // identical markup on the next pass leaves the user's edits alone
    dom.document().clear_mutations();
    dom.render_one(
        el("div")
            .attr("contenteditable", "true")
            .child(Child::Node(Vnode::trust("<b>draft</b>"))),
    )
    .unwrap();
    assert!(dom.take_mutations().is_empty());
}

#[test]
fn contenteditable_rejects_managed_children() {
    let dom = TestDom::new();
    let result = dom.render_one(
        el("div")
            .attr("contenteditable", "true")
            .child(el("span").text("managed")),
    );
    assert!(matches!(result, Err(RenderError::ContentEditableChildren)));
}

#[test]
fn focus_follows_a_moved_node() {
    let dom = TestDom::new();
    let fields = |order: &[&str]| -> Vec<Child> {
        order
            .iter()
            .map(|key| el("input").key(*key).attr("name", *key).into())
            .collect()
    };
    dom.render(fields(&["first", "second"])).unwrap();
    let second = dom.root().children()[1].clone();
    dom.document().focus(&second);

    // moving the focused node detaches and reinserts it
    dom.render(fields(&["second", "first"])).unwrap();
    assert_eq!(dom.root().children()[0], second);
    assert_eq!(dom.document().active_element(), Some(second));
}

#[test]
fn empty_renders_are_stable() {
    let dom = TestDom::new();
    dom.render(vec![]).unwrap();
    assert_eq!(dom.html(), "");
    dom.render(vec![]).unwrap();
    assert_eq!(dom.html(), "");
}
