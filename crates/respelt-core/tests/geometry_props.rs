#![forbid(unsafe_code)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use respelt_core::memory::{MemoryDom, NodeId};
use respelt_core::{Dom, DomError, clone_attrs, em_height, em_width, font_size, height, width};

fn attached(dom: &mut MemoryDom, tag: &str) -> NodeId {
    let node = dom.create_element(tag);
    let body = dom.body();
    dom.append_child(body, node);
    node
}

#[test]
fn measurements_of_a_sized_element() {
    let mut dom = MemoryDom::new();
    let div = attached(&mut dom, "div");
    dom.set_box(div, 320.0, 48.0);
    dom.set_font_size(div, "16px");

    assert_eq!(width(&dom, &div), Ok(320.0));
    assert_eq!(height(&dom, &div), Ok(48.0));
    assert_eq!(font_size(&dom, &div), Ok(16.0));
    assert_eq!(em_width(&dom, &div), Ok(20.0));
    assert_eq!(em_height(&dom, &div), Ok(3.0));
}

#[test]
fn zero_font_size_divides_to_infinity() {
    let mut dom = MemoryDom::new();
    let div = attached(&mut dom, "div");
    dom.set_box(div, 10.0, 0.0);
    dom.set_font_size(div, "0px");

    assert_eq!(em_width(&dom, &div), Ok(f64::INFINITY));
    assert!(em_height(&dom, &div).is_ok_and(f64::is_nan));
}

#[test]
fn unparsable_font_size_is_nan() {
    let mut dom = MemoryDom::new();
    let div = attached(&mut dom, "div");
    dom.set_font_size(div, "medium");
    assert!(font_size(&dom, &div).is_ok_and(f64::is_nan));
}

#[test]
fn text_nodes_cannot_be_measured() {
    let mut dom = MemoryDom::new();
    let text = dom.create_text("abc");
    assert_eq!(width(&dom, &text), Err(DomError::NotAnElement));
    assert_eq!(font_size(&dom, &text), Err(DomError::NotAnElement));
}

#[test]
fn clone_attrs_overwrites_and_keeps_extras() {
    let mut dom = MemoryDom::new();
    let source = dom.create_element("div");
    let destination = dom.create_element("span");
    dom.set_attribute(&source, "id", "x").expect("element");
    dom.set_attribute(&source, "class", "a b").expect("element");
    dom.set_attribute(&destination, "class", "old").expect("element");
    dom.set_attribute(&destination, "title", "kept").expect("element");

    clone_attrs(&mut dom, &source, &destination).expect("both are elements");

    assert_eq!(dom.attr(destination, "id"), Some("x"));
    assert_eq!(dom.attr(destination, "class"), Some("a b"));
    assert_eq!(dom.attr(destination, "title"), Some("kept"));
    assert_eq!(dom.attr(source, "title"), None);
}

#[test]
fn clone_attrs_from_bare_element_is_a_no_op() {
    let mut dom = MemoryDom::new();
    let source = dom.create_element("div");
    let destination = dom.create_element("span");
    dom.set_attribute(&destination, "id", "y").expect("element");
    let before = dom.mutation_count();

    clone_attrs(&mut dom, &source, &destination).expect("both are elements");
    assert_eq!(dom.mutation_count(), before);
    assert_eq!(dom.attr(destination, "id"), Some("y"));
}

fn attr_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}"
}

proptest! {
    #[test]
    fn em_measurements_are_ratios(
        w in 0.0f64..4096.0,
        h in 0.0f64..4096.0,
        font in 1u32..96,
    ) {
        let mut dom = MemoryDom::new();
        let div = attached(&mut dom, "div");
        dom.set_box(div, w, h);
        dom.set_font_size(div, &format!("{font}px"));

        let f = f64::from(font);
        prop_assert_eq!(em_width(&dom, &div), Ok(w / f));
        prop_assert_eq!(em_height(&dom, &div), Ok(h / f));
    }

    #[test]
    fn clone_attrs_is_idempotent(
        attrs in prop::collection::btree_map(attr_name(), "[ -~]{0,12}", 0..8),
        extra_value in "[a-z]{1,6}",
    ) {
        let mut dom = MemoryDom::new();
        let source = dom.create_element("div");
        let destination = dom.create_element("span");
        for (name, value) in &attrs {
            dom.set_attribute(&source, name, value).expect("element");
        }
        // `_extra` never matches the generated names.
        dom.set_attribute(&destination, "_extra", &extra_value).expect("element");

        clone_attrs(&mut dom, &source, &destination).expect("elements");
        let once = dom.attributes(&destination).expect("element");
        clone_attrs(&mut dom, &source, &destination).expect("elements");
        let twice = dom.attributes(&destination).expect("element");

        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(dom.attr(destination, "_extra"), Some(extra_value.as_str()));
        for (name, value) in &attrs {
            prop_assert_eq!(dom.attr(destination, name), Some(value.as_str()));
        }
    }
}
