//! Materializes by-id references into uniquely-identified copies.

use std::collections::HashMap;

use crate::dom::{Document, NodeId};
use crate::errors::{Diagnostics, Issue};

use super::Pass;

/// Reference attributes that point at a definition by id. Both spellings
/// occur in the wild; `xlink:href` is the legacy one.
const HREF_ATTRS: [&str; 2] = ["href", "xlink:href"];

/// Replaces each by-id reference in rendered content with a deep copy of
/// its target.
///
/// Definitions themselves stay symbolic: a reference inside `defs` is
/// resolved in the clone each time its definition is materialized, never
/// in the definition itself. Cloned descendants get fresh, deterministic,
/// collision-free ids; the referencing element's own attributes win over
/// the clone root's; a visited-id chain threaded through the recursion
/// turns cycles into diagnostics instead of loops.
pub struct Dereference;

impl Pass for Dereference {
    fn name(&self) -> &'static str {
        "dereference"
    }

    fn run(&self, doc: &mut Document, diagnostics: &mut Diagnostics) {
        // Built once; kept current as clones introduce ids.
        let mut ids = doc.id_index();
        let mut chain = Vec::new();
        resolve_below(doc, doc.root(), &mut ids, &mut chain, diagnostics);
    }
}

fn resolve_below(
    doc: &mut Document,
    node: NodeId,
    ids: &mut HashMap<String, NodeId>,
    chain: &mut Vec<String>,
    diagnostics: &mut Diagnostics,
) {
    for child in doc.children(node) {
        resolve_node(doc, child, ids, chain, diagnostics);
    }
}

fn resolve_node(
    doc: &mut Document,
    node: NodeId,
    ids: &mut HashMap<String, NodeId>,
    chain: &mut Vec<String>,
    diagnostics: &mut Diagnostics,
) {
    if !doc.is_element(node) || doc.tag(node) == Some("defs") {
        return;
    }
    if let Some((_, target_id)) = reference_of(doc, node) {
        if chain.contains(&target_id) {
            diagnostics.push(Issue::ReferenceCycle {
                target: target_id.clone(),
                chain: chain.join(" -> "),
            });
        } else {
            match ids.get(&target_id).copied() {
                None => diagnostics.push(Issue::MissingReference { target: target_id }),
                Some(target) => {
                    materialize(doc, node, target, target_id, ids, chain, diagnostics);
                    // `node` was replaced by the clone; nothing left to
                    // visit under the detached original.
                    return;
                }
            }
        }
    }
    resolve_below(doc, node, ids, chain, diagnostics);
}

/// The first by-id reference attribute on `node`, if any. External
/// references (`href="other.svg#x"`) are not ours to resolve.
fn reference_of(doc: &Document, node: NodeId) -> Option<(String, String)> {
    for name in HREF_ATTRS {
        if let Some(value) = doc.attr(node, name) {
            if let Some(target) = value.strip_prefix('#') {
                return Some((name.to_string(), target.to_string()));
            }
        }
    }
    None
}

fn materialize(
    doc: &mut Document,
    reference: NodeId,
    target: NodeId,
    target_id: String,
    ids: &mut HashMap<String, NodeId>,
    chain: &mut Vec<String>,
    diagnostics: &mut Diagnostics,
) {
    let clone = doc.clone_subtree(target);

    // Fresh ids for every cloned node that had one.
    let mut renames: HashMap<String, String> = HashMap::new();
    for node in doc.descendants(clone) {
        if let Some(old) = doc.element_id(node).map(str::to_string) {
            let fresh = unique_id(&old, ids);
            doc.set_attr(node, "id", &fresh);
            ids.insert(fresh.clone(), node);
            renames.insert(old, fresh);
        }
    }
    let clone_root_old_id = doc.element_id(target).map(str::to_string);

    // The referencing element's own explicit attributes win on conflict.
    for (name, value) in doc.attrs(reference) {
        if HREF_ATTRS.contains(&name.as_str()) {
            continue;
        }
        doc.set_attr(clone, &name, &value);
    }

    // Track the clone root's final id so intra-clone references follow it
    // even when the referencer overrode it.
    if let (Some(old), Some(final_id)) = (clone_root_old_id, doc.element_id(clone)) {
        let final_id = final_id.to_string();
        ids.insert(final_id.clone(), clone);
        renames.insert(old, final_id);
    }

    // Keep `url(#…)` references between cloned nodes pointing into the
    // clone. By-id `href`s are left alone: they materialize below against
    // the original ids, which is what the cycle chain tracks.
    if !renames.is_empty() {
        rewrite_internal_refs(doc, clone, &renames);
    }

    doc.replace(reference, clone);
    crate::log::debug!(id = %target_id, "materialized reference");

    // Resolve references inside the materialized copy, guarding against
    // cycles with the chain of ids currently being expanded.
    chain.push(target_id);
    resolve_below(doc, clone, ids, chain, diagnostics);
    chain.pop();
}

/// First free id of the form `{base}-{n}`, n counting up from 2. The map
/// doubles as the set of every id ever seen, so fresh ids are
/// deterministic and collision-free.
fn unique_id(base: &str, ids: &HashMap<String, NodeId>) -> String {
    let mut n = 2usize;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !ids.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn rewrite_internal_refs(doc: &mut Document, clone: NodeId, renames: &HashMap<String, String>) {
    for node in doc.descendants(clone) {
        if !doc.is_element(node) {
            continue;
        }
        for name in doc.attr_names(node) {
            if HREF_ATTRS.contains(&name.as_str()) {
                continue;
            }
            let Some(value) = doc.attr(node, &name) else {
                continue;
            };
            let rewritten = rewrite_url_refs(value, renames);
            if rewritten != value {
                doc.set_attr(node, &name, &rewritten);
            }
        }
    }
}

/// Replace `url(#old)` with `url(#new)` for every renamed id.
fn rewrite_url_refs(value: &str, renames: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find("url(#") {
        let (before, after) = rest.split_at(pos + "url(#".len());
        out.push_str(before);
        let end = after.find(')').unwrap_or(after.len());
        let id = &after[..end];
        match renames.get(id) {
            Some(fresh) => out.push_str(fresh),
            None => out.push_str(id),
        }
        rest = &after[end..];
    }
    out.push_str(rest);
    out
}
