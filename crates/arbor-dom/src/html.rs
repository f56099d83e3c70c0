//! Tag-soup parsing and serialization for trusted markup.
//!
//! The parser is deliberately lenient (unclosed tags, bare attributes,
//! unknown elements) but reproduces the one browser behavior the renderer's
//! scratch-container table exists for: table-scoped elements parsed under an
//! unsuitable container are dropped, keeping only their text content.

use std::rc::Rc;

use crate::{Document, NodeKind, NodeRef, VOID_ELEMENTS};

/// Tags that require a specific parent context to be created at all.
fn allowed_parents(tag: &str) -> Option<&'static [&'static str]> {
    match tag {
        "caption" | "thead" | "tbody" | "tfoot" | "colgroup" => Some(&["table"]),
        "tr" => Some(&["table", "thead", "tbody", "tfoot"]),
        "td" | "th" => Some(&["tr"]),
        "col" => Some(&["colgroup"]),
        _ => None,
    }
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Parses `markup` and appends the result to `parent`, treating `parent` as
/// an already-open `context_tag` element. Construction does not touch the
/// document's mutation log; the renderer inserts the result afterwards.
pub(crate) fn parse_into(
    doc: &Document,
    parent: &NodeRef,
    context_tag: &str,
    ns: Option<&str>,
    markup: &str,
) {
    let mut parser = Parser {
        doc,
        ns,
        context_tag,
        stack: vec![parent.clone()],
        dropped: Vec::new(),
    };
    parser.run(markup);
}

struct Parser<'a> {
    doc: &'a Document,
    ns: Option<&'a str>,
    context_tag: &'a str,
    stack: Vec<NodeRef>,
    /// Open tags that were dropped for lack of a suitable parent; their
    /// close tags must be swallowed too.
    dropped: Vec<String>,
}

impl Parser<'_> {
    fn current(&self) -> &NodeRef {
        self.stack.last().expect("parser stack never empties")
    }

    fn current_tag(&self) -> &str {
        if self.stack.len() == 1 {
            self.context_tag
        } else {
            self.current().tag().unwrap_or(self.context_tag)
        }
    }

    fn append(&self, node: &NodeRef) {
        append_silent(self.current(), node);
    }

    fn run(&mut self, markup: &str) {
        let bytes = markup.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if markup[i..].starts_with("<!--") {
                i = match markup[i..].find("-->") {
                    Some(end) => i + end + 3,
                    None => bytes.len(),
                };
            } else if markup[i..].starts_with("</") {
                let end = markup[i..].find('>').map(|p| i + p).unwrap_or(bytes.len());
                let name = markup[i + 2..end].trim().to_ascii_lowercase();
                self.close_tag(&name);
                i = end.min(bytes.len() - 1) + 1;
            } else if bytes[i] == b'<'
                && i + 1 < bytes.len()
                && bytes[i + 1].is_ascii_alphabetic()
            {
                i = self.open_tag(markup, i + 1);
            } else {
                let end = markup[i + 1..]
                    .find('<')
                    .map(|p| i + 1 + p)
                    .unwrap_or(bytes.len());
                let text = decode_entities(&markup[i..end]);
                if !text.is_empty() {
                    let node = self.doc.create_text(&text);
                    self.append(&node);
                }
                i = end;
            }
        }
    }

    fn open_tag(&mut self, markup: &str, start: usize) -> usize {
        let bytes = markup.as_bytes();
        let mut i = start;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
            i += 1;
        }
        let name = markup[start..i].to_ascii_lowercase();
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;
        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                break;
            }
            if bytes[i] == b'>' {
                i += 1;
                break;
            }
            if bytes[i] == b'/' {
                self_closing = true;
                i += 1;
                continue;
            }
            let attr_start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !b"=/>".contains(&bytes[i]) {
                i += 1;
            }
            let attr_name = markup[attr_start..i].to_ascii_lowercase();
            let mut value = String::new();
            if i < bytes.len() && bytes[i] == b'=' {
                i += 1;
                if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                    let quote = bytes[i];
                    i += 1;
                    let value_start = i;
                    while i < bytes.len() && bytes[i] != quote {
                        i += 1;
                    }
                    value = decode_entities(&markup[value_start..i]);
                    i = (i + 1).min(bytes.len());
                } else {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&markup[value_start..i]);
                }
            }
            if !attr_name.is_empty() {
                attrs.push((attr_name, value));
            }
        }

        if let Some(required) = allowed_parents(&name) {
            if !required.contains(&self.current_tag()) {
                // The element vanishes; its text content still lands in the
                // current container, so remember it to swallow the close tag.
                log::debug!("dropping <{name}> parsed under <{}>", self.current_tag());
                if !is_void(&name) && !self_closing {
                    self.dropped.push(name);
                }
                return i;
            }
        }

        let element = match self.ns {
            Some(ns) => self.doc.create_element_ns(ns, &name),
            None => self.doc.create_element(&name),
        };
        for (attr_name, value) in attrs {
            set_attribute_silent(&element, &attr_name, &value);
        }
        self.append(&element);
        if !is_void(&name) && !self_closing {
            self.stack.push(element);
        }
        i
    }

    fn close_tag(&mut self, name: &str) {
        if self.dropped.last().is_some_and(|dropped| dropped == name) {
            self.dropped.pop();
            return;
        }
        if let Some(position) = self
            .stack
            .iter()
            .skip(1)
            .rposition(|node| node.tag() == Some(name))
        {
            self.stack.truncate(position + 1);
        }
    }
}

fn append_silent(parent: &NodeRef, child: &NodeRef) {
    parent.node.children.borrow_mut().push(child.clone());
    *child.node.parent.borrow_mut() = Rc::downgrade(&parent.node);
}

fn set_attribute_silent(element: &NodeRef, name: &str, value: &str) {
    if let NodeKind::Element(data) = &element.node.kind {
        data.attributes
            .borrow_mut()
            .insert(name.to_owned(), value.to_owned());
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Serializes a node to markup; fragments serialize as their children.
pub(crate) fn serialize(node: &NodeRef) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

pub(crate) fn serialize_children(node: &NodeRef) -> String {
    let mut out = String::new();
    for child in node.children() {
        write_node(&child, &mut out);
    }
    out
}

fn write_node(node: &NodeRef, out: &mut String) {
    match &node.node.kind {
        NodeKind::Text(text) => out.push_str(&escape_text(&text.borrow())),
        NodeKind::Fragment => {
            for child in node.children() {
                write_node(&child, out);
            }
        }
        NodeKind::Element(data) => {
            out.push('<');
            out.push_str(&data.tag);
            for (name, value) in data.attributes.borrow().iter() {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
            }
            let style_props = data.style_props.borrow();
            let css_text = data.css_text.borrow();
            if !style_props.is_empty() {
                out.push_str(" style=\"");
                for (index, (name, value)) in style_props.iter().enumerate() {
                    if index > 0 {
                        out.push(' ');
                    }
                    out.push_str(name);
                    out.push_str(": ");
                    out.push_str(&escape_attr(value));
                    out.push(';');
                }
                out.push('"');
            } else if !css_text.is_empty() {
                out.push_str(" style=\"");
                out.push_str(&escape_attr(&css_text));
                out.push('"');
            }
            out.push('>');
            if is_void(&data.tag) && node.child_count() == 0 {
                return;
            }
            for child in node.children() {
                write_node(&child, out);
            }
            out.push_str("</");
            out.push_str(&data.tag);
            out.push('>');
        }
    }
}
