//! Removes definitions unreachable from rendered content.

use std::collections::HashSet;

use crate::dom::{Document, NodeId};
use crate::errors::Diagnostics;

use super::Pass;

/// Mark-and-sweep over id references.
///
/// The mark phase seeds from every reference found in rendered
/// (non-definition) content, then transitively follows references found
/// on reached elements: a kept definition may itself lean on another one.
/// The sweep removes definition-section elements whose id never got
/// marked. Running the pass twice is a fixed point.
pub struct PurgeDefs;

impl Pass for PurgeDefs {
    fn name(&self) -> &'static str {
        "purge-defs"
    }

    fn run(&self, doc: &mut Document, _diagnostics: &mut Diagnostics) {
        let ids = doc.id_index();

        // Mark.
        let mut queue = Vec::new();
        seed(doc, doc.root(), false, &mut queue);
        let mut reachable: HashSet<String> = HashSet::new();
        while let Some(id) = queue.pop() {
            if !reachable.insert(id.clone()) {
                continue;
            }
            let Some(&node) = ids.get(&id) else {
                continue;
            };
            for reached in doc.descendants(node) {
                if doc.is_element(reached) {
                    collect_refs(doc, reached, &mut queue);
                }
            }
        }

        // Sweep.
        let defs: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|&n| doc.tag(n) == Some("defs"))
            .collect();
        let mut removed = 0usize;
        for container in defs {
            sweep_children(doc, container, &reachable, &mut removed);
        }
        crate::log::debug!(removed, kept = reachable.len(), "purged definitions");
    }
}

/// Collect references from rendered content only; definitions count once
/// something rendered reaches them.
fn seed(doc: &Document, node: NodeId, in_defs: bool, queue: &mut Vec<String>) {
    if !doc.is_element(node) {
        return;
    }
    let in_defs = in_defs || doc.tag(node) == Some("defs");
    if !in_defs {
        collect_refs(doc, node, queue);
    }
    for child in doc.children(node) {
        seed(doc, child, in_defs, queue);
    }
}

/// Id references on one element: by-id `href`s, plus `url(#…)` anywhere in
/// an attribute value (presentation attributes and inline `style` alike),
/// plus `url(#…)` in stylesheet text under `<style>`.
fn collect_refs(doc: &Document, node: NodeId, queue: &mut Vec<String>) {
    for (name, value) in doc.attrs(node) {
        if matches!(name.as_str(), "href" | "xlink:href") {
            if let Some(target) = value.strip_prefix('#') {
                queue.push(target.to_string());
            }
            continue;
        }
        url_refs(&value, queue);
    }
    if doc.tag(node) == Some("style") {
        for child in doc.children(node) {
            if let Some(text) = doc.text(child) {
                url_refs(text, queue);
            }
        }
    }
}

fn url_refs(value: &str, queue: &mut Vec<String>) {
    let mut rest = value;
    while let Some(pos) = rest.find("url(#") {
        rest = &rest[pos + "url(#".len()..];
        let end = rest.find(')').unwrap_or(rest.len());
        let id = rest[..end].trim_matches(|c| c == '"' || c == '\'');
        if !id.is_empty() {
            queue.push(id.to_string());
        }
        rest = &rest[end..];
    }
}

/// Judge a definition container's children top-down. An unreachable id
/// takes its whole subtree with it; an element without an id is
/// unaddressable and stays, though its own id-bearing children are still
/// judged; a reachable element keeps everything below it.
fn sweep_children(
    doc: &mut Document,
    node: NodeId,
    reachable: &HashSet<String>,
    removed: &mut usize,
) {
    for child in doc.children(node) {
        if !doc.is_element(child) {
            continue;
        }
        match doc.element_id(child) {
            Some(id) if !reachable.contains(id) => {
                doc.detach(child);
                *removed += 1;
            }
            Some(_) => {}
            None => sweep_children(doc, child, reachable, removed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn run(source: &str) -> Document {
        let mut doc = Document::parse(source).unwrap();
        let mut diagnostics = Diagnostics::new();
        PurgeDefs.run(&mut doc, &mut diagnostics);
        doc
    }

    #[test]
    fn unreferenced_definition_is_removed() {
        let doc = run(
            r##"<svg><defs><linearGradient id="used"/><linearGradient id="unused"/></defs><rect fill="url(#used)" width="1" height="1"/></svg>"##,
        );
        assert_eq!(
            doc.serialize(),
            r##"<svg><defs><linearGradient id="used"/></defs><rect fill="url(#used)" width="1" height="1"/></svg>"##
        );
    }

    #[test]
    fn transitively_referenced_definitions_survive() {
        let doc = run(
            r##"<svg><defs><linearGradient id="inner"/><pattern id="outer" fill="url(#inner)"/></defs><rect fill="url(#outer)" width="1" height="1"/></svg>"##,
        );
        let out = doc.serialize();
        assert!(out.contains(r#"id="inner""#), "got {out}");
        assert!(out.contains(r#"id="outer""#), "got {out}");
    }

    #[test]
    fn style_attribute_references_keep_targets_alive() {
        let doc = run(
            r##"<svg><defs><clipPath id="c"/></defs><g style="clip-path:url(#c)"/></svg>"##,
        );
        assert!(doc.serialize().contains(r#"<clipPath id="c"/>"#));
    }

    #[test]
    fn stylesheet_references_keep_targets_alive() {
        let doc = run(
            r##"<svg><defs><linearGradient id="g1"/></defs><style>.a { fill: url(#g1); }</style><rect class="a" width="1" height="1"/></svg>"##,
        );
        assert!(doc.serialize().contains(r#"id="g1""#));
    }

    #[test]
    fn href_references_keep_targets_alive() {
        let doc = run(
            r##"<svg><defs><rect id="template" width="1" height="1"/></defs><use href="#template"/></svg>"##,
        );
        assert!(doc.serialize().contains(r#"id="template""#));
    }

    #[test]
    fn idless_wrapper_stays_but_its_children_are_judged() {
        let doc = run(
            r##"<svg><defs><g><linearGradient id="dead"/><linearGradient id="live"/></g></defs><rect fill="url(#live)" width="1" height="1"/></svg>"##,
        );
        let out = doc.serialize();
        assert!(out.contains("<g>"), "got {out}");
        assert!(out.contains(r#"id="live""#), "got {out}");
        assert!(!out.contains(r#"id="dead""#), "got {out}");
    }

    #[test]
    fn reachable_definition_keeps_nested_children() {
        let doc = run(
            r##"<svg><defs><g id="kept"><rect id="nested" width="1" height="1"/></g></defs><use href="#kept"/></svg>"##,
        );
        // nested rides along with its reachable ancestor
        assert!(doc.serialize().contains(r#"id="nested""#));
    }

    #[test]
    fn references_from_dead_definitions_do_not_seed() {
        let doc = run(
            r##"<svg><defs><pattern id="dead" fill="url(#alsodead)"/><linearGradient id="alsodead"/></defs><rect width="1" height="1"/></svg>"##,
        );
        assert_eq!(
            doc.serialize(),
            r##"<svg><defs/><rect width="1" height="1"/></svg>"##
        );
    }

    #[test]
    fn purge_twice_is_a_fixed_point() {
        let source = r##"<svg><defs><linearGradient id="used"/><linearGradient id="unused"/><g><pattern id="alone"/></g></defs><rect fill="url(#used)" width="1" height="1"/></svg>"##;
        let once = run(source);
        let twice = run(&once.serialize());
        assert_eq!(once.serialize(), twice.serialize());
    }
}
