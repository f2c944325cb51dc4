//! Folds accumulated transforms into raw geometry.

use crate::dom::{Document, NodeId};
use crate::errors::{Diagnostics, GrammarError, Issue};
use crate::path;
use crate::transform::{Matrix, TransformList};

use super::Pass;

/// Rewrites each element's geometry into the fully composed coordinate
/// space and strips consumed `transform` attributes.
///
/// The composed ancestor matrix travels down the traversal as an explicit
/// accumulator; an element's own transform composes after its ancestors'.
/// Non-uniform scale is applied per axis independently, with no corrective
/// squaring.
pub struct ApplyTransforms;

impl Pass for ApplyTransforms {
    fn name(&self) -> &'static str {
        "apply-transforms"
    }

    fn run(&self, doc: &mut Document, diagnostics: &mut Diagnostics) {
        visit(doc, doc.root(), Matrix::IDENTITY, diagnostics);
    }
}

/// Elements whose geometry is a whole coordinate system rather than point
/// data. They keep a single `matrix(…)` transform instead of rewritten
/// attributes, and their subtrees stay in that local space.
fn is_fallback(tag: &str) -> bool {
    matches!(tag, "image" | "foreignObject" | "use")
}

fn visit(doc: &mut Document, node: NodeId, ctm: Matrix, diagnostics: &mut Diagnostics) {
    if !doc.is_element(node) {
        return;
    }
    let tag = doc.tag(node).unwrap_or_default().to_string();

    // Compose this element's own transform after the ancestors'.
    let mut own_parsed = true;
    let mut full = ctm;
    if let Some(text) = doc.attr(node, "transform") {
        match TransformList::parse(text) {
            Ok(list) => {
                if list.has_skew() {
                    diagnostics.push(Issue::SkewDropped {
                        element: tag.clone(),
                    });
                }
                full = Matrix::compose(ctm, list.to_matrix());
            }
            Err(cause) => {
                // A renderer ignores an invalid transform, so folding only
                // the ancestor part into the subtree keeps it consistent.
                diagnostics.push(grammar(&tag, "transform", cause));
                own_parsed = false;
            }
        }
    }

    if is_fallback(&tag) {
        if own_parsed {
            if full.is_identity() {
                doc.remove_attr(node, "transform");
            } else {
                doc.set_attr(node, "transform", &full.to_string());
            }
        }
        return;
    }

    if !rewrite_geometry(doc, node, &tag, &full, diagnostics) {
        // Malformed geometry: the element is skipped whole, keeping its
        // transform over the untouched attributes.
        return;
    }

    for child in doc.children(node) {
        visit(doc, child, full, diagnostics);
    }

    // The subtree has absorbed the transform's effect.
    if own_parsed {
        doc.remove_attr(node, "transform");
    }
}

fn grammar(element: &str, attribute: &str, cause: GrammarError) -> Issue {
    Issue::Grammar {
        element: element.to_string(),
        attribute: attribute.to_string(),
        cause,
    }
}

/// Rewrite the element's own geometry with `matrix`. Returns false when a
/// geometry attribute could not be parsed (the attribute is left
/// unmodified and a diagnostic recorded).
fn rewrite_geometry(
    doc: &mut Document,
    node: NodeId,
    tag: &str,
    matrix: &Matrix,
    diagnostics: &mut Diagnostics,
) -> bool {
    if matrix.is_identity() {
        return true;
    }
    match tag {
        "path" => rewrite_path_data(doc, node, matrix, diagnostics),
        "polygon" | "polyline" => rewrite_points(doc, node, tag, matrix, diagnostics),
        "line" => {
            rewrite_point_pair(doc, node, tag, ("x1", "y1"), matrix, diagnostics)
                && rewrite_point_pair(doc, node, tag, ("x2", "y2"), matrix, diagnostics)
        }
        "rect" => {
            rewrite_point_pair(doc, node, tag, ("x", "y"), matrix, diagnostics)
                && scale_attr(doc, node, tag, "width", matrix.a().abs(), diagnostics)
                && scale_attr(doc, node, tag, "height", matrix.d().abs(), diagnostics)
                && scale_attr(doc, node, tag, "rx", matrix.a().abs(), diagnostics)
                && scale_attr(doc, node, tag, "ry", matrix.d().abs(), diagnostics)
        }
        "circle" => {
            rewrite_point_pair(doc, node, tag, ("cx", "cy"), matrix, diagnostics)
                && scale_attr(doc, node, tag, "r", matrix.a().abs(), diagnostics)
        }
        "ellipse" => {
            rewrite_point_pair(doc, node, tag, ("cx", "cy"), matrix, diagnostics)
                && scale_attr(doc, node, tag, "rx", matrix.a().abs(), diagnostics)
                && scale_attr(doc, node, tag, "ry", matrix.d().abs(), diagnostics)
        }
        "text" => rewrite_text_anchor(doc, node, tag, matrix, diagnostics, true),
        "tspan" => rewrite_text_anchor(doc, node, tag, matrix, diagnostics, false),
        // containers and non-geometric elements absorb vacuously
        _ => true,
    }
}

fn rewrite_path_data(
    doc: &mut Document,
    node: NodeId,
    matrix: &Matrix,
    diagnostics: &mut Diagnostics,
) -> bool {
    let Some(text) = doc.attr(node, "d").map(str::to_string) else {
        return true;
    };
    match path::parse(&text) {
        Ok(commands) => {
            let absolute = path::to_absolute(&commands);
            let transformed = path::apply_matrix(&absolute, matrix);
            doc.set_attr(node, "d", &path::serialize(&transformed));
            true
        }
        Err(cause) => {
            diagnostics.push(grammar("path", "d", cause));
            false
        }
    }
}

fn rewrite_points(
    doc: &mut Document,
    node: NodeId,
    tag: &str,
    matrix: &Matrix,
    diagnostics: &mut Diagnostics,
) -> bool {
    let Some(text) = doc.attr(node, "points").map(str::to_string) else {
        return true;
    };
    match parse_number_list(&text) {
        Ok(numbers) if numbers.len() % 2 == 0 => {
            let mut out = String::new();
            for pair in numbers.chunks(2) {
                let (x, y) = matrix.transform_point(pair[0], pair[1]);
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&format!("{},{}", x, y));
            }
            doc.set_attr(node, "points", &out);
            true
        }
        Ok(numbers) => {
            diagnostics.push(grammar(
                tag,
                "points",
                GrammarError::OddPointList {
                    found: numbers.len(),
                    src: miette::NamedSource::new("points", text.clone()),
                    span: (0..text.len()).into(),
                },
            ));
            false
        }
        Err(cause) => {
            diagnostics.push(grammar(tag, "points", cause));
            false
        }
    }
}

/// Transform a coordinate pair held in two scalar attributes. Missing
/// attributes default to zero and are written back, since a translation
/// gives them a value.
fn rewrite_point_pair(
    doc: &mut Document,
    node: NodeId,
    tag: &str,
    (x_name, y_name): (&str, &str),
    matrix: &Matrix,
    diagnostics: &mut Diagnostics,
) -> bool {
    let x = match read_number(doc, node, tag, x_name, diagnostics) {
        Ok(value) => value.unwrap_or(0.0),
        Err(()) => return false,
    };
    let y = match read_number(doc, node, tag, y_name, diagnostics) {
        Ok(value) => value.unwrap_or(0.0),
        Err(()) => return false,
    };
    let (x, y) = matrix.transform_point(x, y);
    doc.set_attr(node, x_name, &format!("{}", x));
    doc.set_attr(node, y_name, &format!("{}", y));
    true
}

fn scale_attr(
    doc: &mut Document,
    node: NodeId,
    tag: &str,
    name: &str,
    factor: f64,
    diagnostics: &mut Diagnostics,
) -> bool {
    match read_number(doc, node, tag, name, diagnostics) {
        Ok(Some(value)) => {
            doc.set_attr(node, name, &format!("{}", value * factor));
            true
        }
        Ok(None) => true,
        Err(()) => false,
    }
}

/// Text anchors move per present axis: an absent coordinate is inherited
/// at render time, so fabricating one would change meaning. A `text`
/// element with neither coordinate still anchors at the origin and gets
/// the transformed origin written out.
fn rewrite_text_anchor(
    doc: &mut Document,
    node: NodeId,
    tag: &str,
    matrix: &Matrix,
    diagnostics: &mut Diagnostics,
    anchors_at_origin: bool,
) -> bool {
    let has_x = doc.attr(node, "x").is_some();
    let has_y = doc.attr(node, "y").is_some();
    match (has_x, has_y) {
        (true, true) => rewrite_point_pair(doc, node, tag, ("x", "y"), matrix, diagnostics),
        (true, false) => scale_shift_attr(doc, node, tag, "x", matrix.a(), matrix.e(), diagnostics),
        (false, true) => scale_shift_attr(doc, node, tag, "y", matrix.d(), matrix.f(), diagnostics),
        (false, false) if anchors_at_origin => {
            rewrite_point_pair(doc, node, tag, ("x", "y"), matrix, diagnostics)
        }
        (false, false) => true,
    }
}

/// Single-axis rewrite, the `H`/`V` rule for scalar attributes.
fn scale_shift_attr(
    doc: &mut Document,
    node: NodeId,
    tag: &str,
    name: &str,
    factor: f64,
    offset: f64,
    diagnostics: &mut Diagnostics,
) -> bool {
    match read_number(doc, node, tag, name, diagnostics) {
        Ok(Some(value)) => {
            doc.set_attr(node, name, &format!("{}", value * factor + offset));
            true
        }
        Ok(None) => true,
        Err(()) => false,
    }
}

fn read_number(
    doc: &mut Document,
    node: NodeId,
    tag: &str,
    name: &str,
    diagnostics: &mut Diagnostics,
) -> Result<Option<f64>, ()> {
    let Some(text) = doc.attr(node, name) else {
        return Ok(None);
    };
    match text.trim().parse::<f64>() {
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            let text = text.to_string();
            diagnostics.push(grammar(
                tag,
                name,
                GrammarError::InvalidNumber {
                    src: miette::NamedSource::new(name, text.clone()),
                    span: (0..text.len()).into(),
                },
            ));
            Err(())
        }
    }
}

fn parse_number_list(text: &str) -> Result<Vec<f64>, GrammarError> {
    use pest::Parser;

    let pairs = crate::SvgDataParser::parse(crate::Rule::number_list, text)
        .map_err(|e| GrammarError::syntax("points", text, e))?;
    Ok(pairs
        .flatten()
        .filter(|p| p.as_rule() == crate::Rule::number)
        .filter_map(|p| p.as_str().parse().ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn run(source: &str) -> (Document, Diagnostics) {
        let mut doc = Document::parse(source).unwrap();
        let mut diagnostics = Diagnostics::new();
        ApplyTransforms.run(&mut doc, &mut diagnostics);
        (doc, diagnostics)
    }

    #[test]
    fn group_transform_folds_into_path() {
        let (doc, diagnostics) = run(
            r#"<svg><g transform="translate(5,5)"><path d="M 0 0 L 1 1"/></g></svg>"#,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(
            doc.serialize(),
            r#"<svg><g><path d="M 5 5 L 6 6"/></g></svg>"#
        );
    }

    #[test]
    fn nested_transforms_compose_outer_first() {
        let (doc, _) = run(
            r#"<svg><g transform="translate(10,0)"><path transform="scale(2)" d="M 1 1 L 2 2"/></g></svg>"#,
        );
        // scale applies to the path's points first, then the translation
        assert_eq!(
            doc.serialize(),
            r#"<svg><g><path d="M 12 2 L 14 4"/></g></svg>"#
        );
    }

    #[test]
    fn relative_path_data_is_made_absolute_before_transform() {
        let (doc, _) = run(r#"<svg><path transform="translate(1,1)" d="m 1 1 l 2 0"/></svg>"#);
        assert_eq!(doc.serialize(), r#"<svg><path d="M 2 2 L 4 2"/></svg>"#);
    }

    #[test]
    fn rect_scales_per_axis_without_squaring() {
        let (doc, _) = run(
            r#"<svg><rect transform="scale(2 3)" x="1" y="1" width="10" height="10"/></svg>"#,
        );
        assert_eq!(
            doc.serialize(),
            r#"<svg><rect x="2" y="3" width="20" height="30"/></svg>"#
        );
    }

    #[test]
    fn rect_without_position_gains_translated_origin() {
        let (doc, _) = run(r#"<svg><rect transform="translate(4,7)" width="2" height="2"/></svg>"#);
        assert_eq!(
            doc.serialize(),
            r#"<svg><rect width="2" height="2" x="4" y="7"/></svg>"#
        );
    }

    #[test]
    fn polygon_points_transform_pairwise() {
        let (doc, _) = run(
            r#"<svg><polygon transform="translate(1,2)" points="0,0 4,0 4,4"/></svg>"#,
        );
        assert_eq!(
            doc.serialize(),
            r#"<svg><polygon points="1,2 5,2 5,6"/></svg>"#
        );
    }

    #[test]
    fn image_keeps_a_single_composed_matrix() {
        let (doc, _) = run(
            r#"<svg><g transform="translate(3,0)"><image transform="scale(2)" width="4" height="4"/></g></svg>"#,
        );
        assert_eq!(
            doc.serialize(),
            r#"<svg><g><image transform="matrix(2 0 0 2 3 0)" width="4" height="4"/></g></svg>"#
        );
    }

    #[test]
    fn malformed_transform_is_kept_and_reported() {
        let (doc, diagnostics) = run(
            r#"<svg><g transform="translate(nope)"><path d="M 0 0"/></g></svg>"#,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            doc.serialize(),
            r#"<svg><g transform="translate(nope)"><path d="M 0 0"/></g></svg>"#
        );
    }

    #[test]
    fn malformed_path_is_skipped_and_reported() {
        let (doc, diagnostics) = run(
            r#"<svg><path transform="translate(1,0)" d="M 0 0 R 9"/></svg>"#,
        );
        assert_eq!(diagnostics.len(), 1);
        // both the data and the transform stay as they were
        assert_eq!(
            doc.serialize(),
            r#"<svg><path transform="translate(1,0)" d="M 0 0 R 9"/></svg>"#
        );
    }

    #[test]
    fn skew_is_dropped_with_a_diagnostic() {
        let (doc, diagnostics) = run(
            r#"<svg><path transform="skewX(30) translate(1,0)" d="M 0 0"/></svg>"#,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(doc.serialize(), r#"<svg><path d="M 1 0"/></svg>"#);
    }

    #[test]
    fn text_anchor_moves_per_present_axis() {
        let (doc, _) = run(r#"<svg><g transform="translate(3,4)"><text x="10">hi</text></g></svg>"#);
        // y is inherited at render time and stays absent
        assert_eq!(doc.serialize(), r#"<svg><g><text x="13">hi</text></g></svg>"#);
    }

    #[test]
    fn unpositioned_text_gains_its_transformed_origin() {
        let (doc, _) = run(r#"<svg><text transform="translate(2,6)">hi</text></svg>"#);
        assert_eq!(doc.serialize(), r#"<svg><text x="2" y="6">hi</text></svg>"#);
    }

    #[test]
    fn transform_free_document_is_untouched() {
        let source = r#"<svg><path d="m 1 1 l 2 0"/><rect width="2" height="2"/></svg>"#;
        let (doc, diagnostics) = run(source);
        assert!(diagnostics.is_empty());
        assert_eq!(doc.serialize(), source);
    }
}
