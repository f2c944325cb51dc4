//! Error types with rich diagnostics using miette
//!
//! Recoverable conditions are collected as [`Diagnostics`] while a pass
//! keeps running; only an unreadable input document aborts a run, and it
//! does so before any pass has touched the tree.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

// ============================================================================
// Fatal errors
// ============================================================================

/// The input text could not be parsed into a document tree.
#[derive(Error, Diagnostic, Debug)]
#[error("unreadable input document: {message}")]
#[diagnostic(code(smolt::document::unreadable))]
pub struct DocumentError {
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("parsing stopped here")]
    pub span: Option<SourceSpan>,
}

// ============================================================================
// Grammar errors
// ============================================================================

/// Malformed geometry or transform text, confined to a single attribute.
///
/// The attribute that produced one of these is left unmodified; sibling
/// elements keep being processed.
#[derive(Error, Diagnostic, Debug)]
pub enum GrammarError {
    #[error("malformed value")]
    #[diagnostic(code(smolt::grammar::syntax))]
    Syntax {
        #[source_code]
        src: NamedSource<String>,
        #[label("could not be tokenized")]
        span: SourceSpan,
    },

    #[error("unrecognized path opcode `{letter}`")]
    #[diagnostic(code(smolt::grammar::unknown_opcode))]
    UnknownOpcode {
        letter: char,
        #[source_code]
        src: NamedSource<String>,
        #[label("not a path command")]
        span: SourceSpan,
    },

    #[error("`{opcode}` takes {expected} operands, found {found}")]
    #[diagnostic(code(smolt::grammar::operand_count))]
    OperandCount {
        opcode: char,
        expected: usize,
        found: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("command starts here")]
        span: SourceSpan,
    },

    #[error("number after a close command")]
    #[diagnostic(
        code(smolt::grammar::operand_after_close),
        help("close takes no operands; start a new command instead")
    )]
    OperandAfterClose {
        #[source_code]
        src: NamedSource<String>,
        #[label("no command to repeat")]
        span: SourceSpan,
    },

    #[error("`{kind}` takes {expected} parameters, found {found}")]
    #[diagnostic(code(smolt::grammar::transform_arity))]
    TransformArity {
        kind: String,
        expected: &'static str,
        found: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("in this operation")]
        span: SourceSpan,
    },

    #[error("invalid number")]
    #[diagnostic(code(smolt::grammar::invalid_number))]
    InvalidNumber {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected a plain number")]
        span: SourceSpan,
    },

    #[error("points list must hold coordinate pairs")]
    #[diagnostic(code(smolt::grammar::odd_point_list))]
    OddPointList {
        found: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("odd number of coordinates")]
        span: SourceSpan,
    },
}

impl GrammarError {
    /// Wrap a pest error for `text`, pointing at the failure offset.
    pub(crate) fn syntax(name: &str, text: &str, err: pest::error::Error<crate::Rule>) -> Self {
        let offset = match err.location {
            pest::error::InputLocation::Pos(p) => p,
            pest::error::InputLocation::Span((start, _)) => start,
        };
        let offset = offset.min(text.len());
        let end = (offset + 1).min(text.len()).max(offset);
        GrammarError::Syntax {
            src: NamedSource::new(name, text.to_string()),
            span: SourceSpan::from(offset..end),
        }
    }
}

// ============================================================================
// Collected pass diagnostics
// ============================================================================

/// A recoverable condition recorded during a pass.
#[derive(Error, Diagnostic, Debug)]
pub enum Issue {
    #[error("invalid `{attribute}` on <{element}>")]
    #[diagnostic(code(smolt::pass::grammar))]
    Grammar {
        element: String,
        attribute: String,
        #[source]
        #[diagnostic_source]
        cause: GrammarError,
    },

    #[error("reference target `#{target}` not found")]
    #[diagnostic(
        code(smolt::pass::missing_reference),
        severity(Warning),
        help("the reference was left in place")
    )]
    MissingReference { target: String },

    #[error("reference cycle through `#{target}`")]
    #[diagnostic(
        code(smolt::pass::reference_cycle),
        help("the offending branch was left unresolved")
    )]
    ReferenceCycle {
        target: String,
        /// The chain of ids being materialized when the cycle closed.
        chain: String,
    },

    #[error("skew transform on <{element}> dropped")]
    #[diagnostic(code(smolt::pass::skew_dropped), severity(Warning))]
    SkewDropped { element: String },
}

/// Recoverable conditions collected across a run.
///
/// One defective element never blocks normalization of the rest of a
/// document; it lands here instead.
#[derive(Debug, Default)]
pub struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        crate::log::warn!(issue = %issue, "diagnostic");
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

impl IntoIterator for Diagnostics {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}
