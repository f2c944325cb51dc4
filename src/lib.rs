//! smolt normalizes SVG documents so that downstream consumers never see
//! an unresolved matrix or a dangling symbol reference: coordinate
//! transforms are folded into raw geometry, `use`-style references become
//! materialized copies, definitions nothing points at are purged, and
//! every numeric token is rounded to a configured precision.
//!
//! The pipeline is four independent passes over one mutable tree, always
//! run in the same order:
//!
//! ```text
//! text → tree → apply-transforms → dereference → purge-defs → round-numbers → text
//! ```
//!
//! # Example
//!
//! ```
//! let source = r##"<svg xmlns="http://www.w3.org/2000/svg">
//!   <defs><rect id="unit" width="1" height="1"/></defs>
//!   <g transform="translate(5,5)"><path d="m 0 0 l 1.00004 0"/></g>
//!   <use href="#unit"/>
//! </svg>"##;
//! let normalized = smolt::normalize(source, &smolt::Options::default()).unwrap();
//! assert!(normalized.svg.contains(r#"d="M 5 5 L 6 5""#));
//! assert!(!normalized.svg.contains("transform"));
//! ```

use pest_derive::Parser;

/// Tokenizer for the geometry mini-languages (path data, transform lists,
/// coordinate lists).
#[derive(Parser)]
#[grammar = "svgdata.pest"]
pub struct SvgDataParser;

pub mod dom;
pub mod errors;
pub mod log;
pub mod passes;
pub mod path;
pub mod transform;
pub mod types;

pub use errors::{Diagnostics, DocumentError, GrammarError, Issue};
pub use passes::{ApplyTransforms, Dereference, Pass, PassKind, PurgeDefs, RoundNumbers, cleanup};
pub use types::Precision;

/// Options for a normalization run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Precision for the number-rounding pass.
    pub precision: Precision,
}

/// A normalized document plus everything recoverable that went wrong
/// along the way.
#[derive(Debug)]
pub struct Normalized {
    pub svg: String,
    pub diagnostics: Diagnostics,
}

/// Normalize an SVG document.
///
/// Returns the serialized result on success, or an error if the input
/// cannot be parsed into a tree at all. Per-element conditions (a
/// malformed path, a missing reference target, a reference cycle) never
/// fail the run; they are collected in [`Normalized::diagnostics`].
pub fn normalize(source: &str, options: &Options) -> Result<Normalized, miette::Report> {
    let mut doc = dom::Document::parse(source)?;
    let diagnostics = passes::cleanup(&mut doc, options);
    Ok(Normalized {
        svg: doc.serialize(),
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_runs_the_full_pipeline() {
        let source = r##"<svg><defs><rect id="u" width="1" height="1"/><rect id="dead" width="2" height="2"/></defs><g transform="translate(1.00049,0)"><use href="#u"/></g></svg>"##;
        let normalized = normalize(source, &Options::default()).unwrap();
        assert!(normalized.diagnostics.is_empty());
        // the use materialized, the unused definition is gone, the
        // translation was pushed onto the use before dereferencing
        assert!(normalized.svg.contains(r#"id="u-2""#), "got {}", normalized.svg);
        assert!(!normalized.svg.contains(r#"id="dead""#));
        assert!(normalized.svg.contains("matrix(1 0 0 1 1 0)"), "got {}", normalized.svg);
    }

    #[test]
    fn unreadable_input_is_fatal() {
        assert!(normalize("<svg>", &Options::default()).is_err());
        assert!(normalize("", &Options::default()).is_err());
    }

    #[test]
    fn diagnostics_do_not_abort_the_run() {
        let source = r##"<svg><use href="#nope"/><path d="M 0 0 L 1 1"/></svg>"##;
        let normalized = normalize(source, &Options::default()).unwrap();
        assert_eq!(normalized.diagnostics.len(), 1);
        assert!(normalized.svg.contains(r#"d="M 0 0 L 1 1""#));
    }
}
