//! End-to-end pipeline tests: text in, normalized text out.

use smolt::{Options, Precision, normalize};

fn options(precision: i32) -> Options {
    Options {
        precision: Precision::try_new(precision).unwrap(),
    }
}

#[test]
fn normalizes_a_small_document_end_to_end() {
    let source = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
  <defs>
    <rect id="card" width="20" height="10" rx="2"/>
    <linearGradient id="never-used"/>
  </defs>
  <g transform="translate(10, 10)">
    <path d="m 0 0 l 30.00007 0 l 0 19.99995 z"/>
    <use href="#card" y="40.0004"/>
  </g>
</svg>"##;

    let normalized = normalize(source, &options(3)).unwrap();
    assert!(normalized.diagnostics.is_empty());
    insta::assert_snapshot!(
        normalized.svg,
        @r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><defs/><g><path d="M 10 10 L 40 10 L 40 30 Z"/><rect id="card-2" width="20" height="10" rx="2" y="40" transform="matrix(1 0 0 1 10 10)"/></g></svg>"##
    );
}

#[test]
fn passes_compose_transform_then_dereference_then_purge() {
    let source = r##"<svg><defs><circle id="dot" r="2.5"/></defs><g transform="scale(2)"><circle cx="5" cy="5" r="1"/></g><use href="#dot"/></svg>"##;
    let normalized = normalize(source, &options(3)).unwrap();
    insta::assert_snapshot!(
        normalized.svg,
        @r##"<svg><defs/><g><circle cx="10" cy="10" r="2"/></g><circle id="dot-2" r="2.5"/></svg>"##
    );
}

#[test]
fn gradient_reference_via_style_survives_purging() {
    let source = r##"<svg><defs><linearGradient id="sky"/><linearGradient id="sea"/></defs><rect style="fill:url(#sky)" width="4" height="4"/></svg>"##;
    let normalized = normalize(source, &options(3)).unwrap();
    insta::assert_snapshot!(
        normalized.svg,
        @r##"<svg><defs><linearGradient id="sky"/></defs><rect style="fill:url(#sky)" width="4" height="4"/></svg>"##
    );
}

#[test]
fn materialized_reference_no_longer_pins_its_definition() {
    // once the use is resolved, nothing references #tpl and it is purged
    let source =
        r##"<svg><defs><rect id="tpl" width="1.23456" height="1"/></defs><use href="#tpl"/></svg>"##;
    let normalized = normalize(source, &options(2)).unwrap();
    insta::assert_snapshot!(
        normalized.svg,
        @r##"<svg><defs/><rect id="tpl-2" width="1.23" height="1"/></svg>"##
    );
}

#[test]
fn broken_pieces_surface_as_diagnostics_not_failures() {
    let source = r##"<svg><path transform="spin(90)" d="M 0 0"/><use href="#ghost"/><path transform="translate(1,0)" d="M 1 1 Q 2"/></svg>"##;
    let normalized = normalize(source, &options(3)).unwrap();
    assert_eq!(normalized.diagnostics.len(), 3);
    // every defective element is still present, untouched
    assert!(normalized.svg.contains(r#"transform="spin(90)""#));
    assert!(normalized.svg.contains(r##"href="#ghost""##));
    assert!(normalized.svg.contains(r#"transform="translate(1,0)" d="M 1 1 Q 2""#));
}

#[test]
fn negative_precision_coarsens_whole_documents() {
    let source = r#"<svg><rect x="93451.65932" y="107.65932" width="1088" height="912"/></svg>"#;
    let normalized = normalize(source, &options(-2)).unwrap();
    insta::assert_snapshot!(
        normalized.svg,
        @r#"<svg><rect x="93500" y="100" width="1100" height="900"/></svg>"#
    );
}

#[test]
fn normalization_is_idempotent_on_its_own_output() {
    let source = r##"<svg><defs><rect id="u" width="3" height="3"/></defs><g transform="translate(2,2) scale(2)"><path d="m 1 1 h 2 v 2 z"/></g><use href="#u" x="1.5555"/></svg>"##;
    let first = normalize(source, &options(3)).unwrap();
    let second = normalize(&first.svg, &options(3)).unwrap();
    assert_eq!(first.svg, second.svg);
    assert!(second.diagnostics.is_empty());
}
