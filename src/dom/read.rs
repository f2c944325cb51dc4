//! XML ingestion: roxmltree events into the arena.

use indexmap::IndexMap;
use miette::NamedSource;

use crate::errors::DocumentError;

use super::{Document, NodeId, NodeKind};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub(super) fn parse_document(source: &str) -> Result<Document, DocumentError> {
    let xml = roxmltree::Document::parse(source).map_err(|err| DocumentError {
        message: err.to_string(),
        src: NamedSource::new("<input>", source.to_string()),
        span: offset_of(source, err.pos().row, err.pos().col)
            .map(|offset| miette::SourceSpan::from(offset..(offset + 1).min(source.len()).max(offset))),
    })?;

    let root_element = xml.root_element();

    // Prefixes declared on the document element; needed to reconstruct
    // qualified attribute names like `xlink:href`.
    let namespaces: Vec<(Option<String>, String)> = root_element
        .namespaces()
        .filter(|ns| ns.uri() != XML_NS)
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect();

    let mut doc = Document {
        nodes: Vec::new(),
        root: NodeId(0),
        namespaces,
    };
    let root = build_element(&mut doc, root_element, None);
    doc.root = root;
    Ok(doc)
}

fn build_element(doc: &mut Document, element: roxmltree::Node<'_, '_>, parent: Option<NodeId>) -> NodeId {
    let mut attrs = IndexMap::new();
    for attr in element.attributes() {
        attrs.insert(
            qualified_name(doc, &attr),
            attr.value().to_string(),
        );
    }
    let node = doc.push_node(
        NodeKind::Element {
            tag: element.tag_name().name().to_string(),
            attrs,
        },
        parent,
    );

    for child in element.children() {
        if child.is_element() {
            let built = build_element(doc, child, Some(node));
            doc.node_mut(node).children.push(built);
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            // Whitespace-only text is indentation; dropping it is part of
            // normalizing the document.
            if !text.trim().is_empty() {
                let built = doc.push_node(NodeKind::Text(text.to_string()), Some(node));
                doc.node_mut(node).children.push(built);
            }
        }
        // comments and processing instructions do not survive normalization
    }
    node
}

fn qualified_name(doc: &Document, attr: &roxmltree::Attribute<'_, '_>) -> String {
    match attr.namespace() {
        Some(XML_NS) => format!("xml:{}", attr.name()),
        Some(uri) => {
            let prefix = doc
                .namespaces
                .iter()
                .find(|(prefix, ns_uri)| prefix.is_some() && ns_uri == uri)
                .and_then(|(prefix, _)| prefix.as_deref());
            match prefix {
                Some(prefix) => format!("{}:{}", prefix, attr.name()),
                None => attr.name().to_string(),
            }
        }
        None => attr.name().to_string(),
    }
}

/// Byte offset of a 1-based row/column position.
fn offset_of(source: &str, row: u32, col: u32) -> Option<usize> {
    let mut offset = 0usize;
    for (index, line) in source.split_inclusive('\n').enumerate() {
        if index + 1 == row as usize {
            let col_offset: usize = line
                .chars()
                .take(col.saturating_sub(1) as usize)
                .map(char::len_utf8)
                .sum();
            return Some(offset + col_offset.min(line.len()));
        }
        offset += line.len();
    }
    None
}
