use super::*;

fn doc() -> Document {
    Document::new()
}

#[test]
fn insert_before_orders_children() {
    let doc = doc();
    let parent = doc.create_element("ul");
    let a = doc.create_element("li");
    let b = doc.create_element("li");
    let c = doc.create_element("li");
    parent.append_child(&a);
    parent.append_child(&c);
    parent.insert_before(&b, Some(&c));
    assert_eq!(parent.children(), vec![a.clone(), b.clone(), c.clone()]);
    assert_eq!(a.next_sibling(), Some(b.clone()));
    assert_eq!(c.next_sibling(), None);
    assert_eq!(b.parent(), Some(parent));
}

#[test]
fn inserting_an_attached_node_moves_it() {
    let doc = doc();
    let parent = doc.create_element("div");
    let a = doc.create_text("a");
    let b = doc.create_text("b");
    parent.append_child(&a);
    parent.append_child(&b);
    parent.insert_before(&b, Some(&a));
    assert_eq!(parent.children(), vec![b, a]);
    assert_eq!(parent.child_count(), 2);
}

#[test]
fn fragment_insertion_splices_and_empties() {
    let doc = doc();
    let parent = doc.create_element("div");
    let marker = doc.create_text("end");
    parent.append_child(&marker);

    let fragment = doc.create_fragment();
    let a = doc.create_text("a");
    let b = doc.create_text("b");
    fragment.append_child(&a);
    fragment.append_child(&b);
    parent.insert_before(&fragment, Some(&marker));

    assert_eq!(parent.children(), vec![a.clone(), b.clone(), marker]);
    assert_eq!(fragment.child_count(), 0);
    assert_eq!(a.parent().unwrap(), parent);
    assert_eq!(b.parent().unwrap(), parent);
}

#[test]
fn contains_walks_ancestors() {
    let doc = doc();
    let outer = doc.create_element("div");
    let inner = doc.create_element("span");
    let text = doc.create_text("x");
    outer.append_child(&inner);
    inner.append_child(&text);
    assert!(outer.contains(&text));
    assert!(outer.contains(&outer));
    assert!(!inner.contains(&outer));
}

#[test]
fn focus_is_cleared_by_detachment() {
    let doc = doc();
    let parent = doc.create_element("div");
    let input = doc.create_element("input");
    parent.append_child(&input);
    doc.focus(&input);
    assert_eq!(doc.active_element(), Some(input.clone()));

    input.remove_from_parent();
    assert_eq!(doc.active_element(), None);
}

#[test]
fn focus_is_cleared_even_when_the_node_is_reinserted() {
    let doc = doc();
    let parent = doc.create_element("div");
    let input = doc.create_element("input");
    let sibling = doc.create_element("span");
    parent.append_child(&input);
    parent.append_child(&sibling);
    doc.focus(&input);

    // moving the node detaches it first
    parent.insert_before(&input, None);
    assert_eq!(parent.children(), vec![sibling, input]);
    assert_eq!(doc.active_element(), None);
}

#[test]
fn focus_ignores_non_elements() {
    let doc = doc();
    let text = doc.create_text("x");
    doc.focus(&text);
    assert_eq!(doc.active_element(), None);
}

#[test]
fn focus_survives_detaching_an_ancestor_sibling() {
    let doc = doc();
    let parent = doc.create_element("div");
    let input = doc.create_element("input");
    let other = doc.create_element("span");
    parent.append_child(&input);
    parent.append_child(&other);
    doc.focus(&input);
    other.remove_from_parent();
    assert_eq!(doc.active_element(), Some(input));
}

#[test]
fn property_str_defaults_to_empty() {
    let doc = doc();
    let input = doc.create_element("input");
    assert_eq!(input.property_str("value"), "");
    input.set_property("value", PropValue::Str("abc".into()));
    assert_eq!(input.property_str("value"), "abc");
    assert!(input.has_property("value"));
    assert!(!input.has_property("data-x"));
}

#[test]
fn mutation_log_records_and_drains() {
    let doc = doc();
    let parent = doc.create_element("div");
    let child = doc.create_element("span");
    parent.append_child(&child);
    child.set_attribute("id", "a");
    child.remove_from_parent();

    let log = doc.take_mutations();
    assert_eq!(log.len(), 3);
    assert!(matches!(&log[0], Mutation::Insert { .. }));
    assert!(matches!(&log[1], Mutation::SetAttr { name, .. } if name == "id"));
    assert!(matches!(&log[2], Mutation::Remove { .. }));
    assert!(doc.take_mutations().is_empty());
}

#[test]
fn dispatch_reaches_the_registered_listener() {
    use std::cell::Cell;

    struct Recorder {
        seen: Cell<u32>,
    }
    impl EventListener for Recorder {
        fn handle_event(&self, event: &Event) {
            self.seen.set(self.seen.get() + 1);
            assert_eq!(event.event_type(), "click");
            event.skip_redraw();
        }
    }

    let doc = doc();
    let button = doc.create_element("button");
    let recorder = Rc::new(Recorder { seen: Cell::new(0) });
    button.add_listener("click", recorder.clone());

    let event = button.dispatch("click").expect("listener installed");
    assert_eq!(recorder.seen.get(), 1);
    assert!(!event.wants_redraw());
    assert!(button.dispatch("keydown").is_none());

    button.remove_listener("click");
    assert!(button.dispatch("click").is_none());
}

mod parsing {
    use super::*;

    #[test]
    fn parses_nested_markup_with_attributes() {
        let doc = doc();
        let fragment = doc.parse_fragment("div", None, "<p class=\"x\">hi <b>there</b></p>!");
        assert_eq!(fragment.child_count(), 2);
        let p = fragment.first_child().unwrap();
        assert_eq!(p.tag(), Some("p"));
        assert_eq!(p.attribute("class").as_deref(), Some("x"));
        assert_eq!(p.child_count(), 2);
        assert_eq!(fragment.children()[1].node_value().as_deref(), Some("!"));
    }

    #[test]
    fn parsing_skips_the_mutation_log() {
        let doc = doc();
        doc.parse_fragment("div", None, "<p>hi</p>");
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        let doc = doc();
        let fragment = doc.parse_fragment("div", None, "<br>after<img src=\"i.png\"/>");
        let children = fragment.children();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].tag(), Some("br"));
        assert_eq!(children[0].child_count(), 0);
        assert_eq!(children[1].node_value().as_deref(), Some("after"));
        assert_eq!(children[2].tag(), Some("img"));
    }

    #[test]
    fn table_scoped_elements_need_a_matching_context() {
        let doc = doc();
        // under a div the cell disappears, its text survives
        let fragment = doc.parse_fragment("div", None, "<td>x</td>");
        assert_eq!(fragment.child_count(), 1);
        assert_eq!(fragment.first_child().unwrap().node_value().as_deref(), Some("x"));

        // under a tr it parses as an element
        let fragment = doc.parse_fragment("tr", None, "<td>x</td>");
        assert_eq!(fragment.first_child().unwrap().tag(), Some("td"));
    }

    #[test]
    fn comments_and_entities() {
        let doc = doc();
        let fragment = doc.parse_fragment("div", None, "a<!-- note -->&amp;b");
        let children = fragment.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].node_value().as_deref(), Some("a"));
        assert_eq!(children[1].node_value().as_deref(), Some("&b"));
    }

    #[test]
    fn namespace_flows_into_parsed_elements() {
        let doc = doc();
        let fragment = doc.parse_fragment("div", Some(SVG_NS), "<circle r=\"4\"/>");
        let circle = fragment.first_child().unwrap();
        assert_eq!(circle.tag(), Some("circle"));
        assert_eq!(circle.namespace(), Some(SVG_NS));
    }
}

mod serializing {
    use super::*;

    #[test]
    fn round_trips_simple_markup() {
        let doc = doc();
        let div = doc.create_element("div");
        div.set_inner_html(&doc, "<p class=\"x\">hi <b>there</b></p>");
        assert_eq!(div.inner_html(), "<p class=\"x\">hi <b>there</b></p>");
        assert_eq!(div.raw_html().as_deref(), Some("<p class=\"x\">hi <b>there</b></p>"));
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = doc();
        let div = doc.create_element("div");
        let text = doc.create_text("a < b & c");
        div.append_child(&text);
        div.set_attribute("title", "say \"hi\"");
        assert_eq!(
            div.outer_html(),
            "<div title=\"say &quot;hi&quot;\">a &lt; b &amp; c</div>"
        );
    }

    #[test]
    fn styles_serialize_from_either_representation() {
        let doc = doc();
        let div = doc.create_element("div");
        div.set_style_property("color", "red");
        assert_eq!(div.outer_html(), "<div style=\"color: red;\"></div>");

        let other = doc.create_element("div");
        other.set_css_text("color: blue");
        assert_eq!(other.outer_html(), "<div style=\"color: blue\"></div>");
    }
}
