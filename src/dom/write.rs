//! Compact XML serialization.

use super::{Document, NodeId, NodeKind};

pub(super) fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    write_node(doc, doc.root(), &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Text(text) => escape_text(text, out),
        NodeKind::Element { tag, attrs } => {
            out.push('<');
            out.push_str(tag);
            if id == doc.root() {
                for (prefix, uri) in &doc.namespaces {
                    match prefix {
                        Some(prefix) => {
                            out.push_str(" xmlns:");
                            out.push_str(prefix);
                        }
                        None => out.push_str(" xmlns"),
                    }
                    out.push_str("=\"");
                    escape_attr(uri, out);
                    out.push('"');
                }
            }
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            let children = &doc.node(id).children;
            if children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for &child in children {
                    write_node(doc, child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}
