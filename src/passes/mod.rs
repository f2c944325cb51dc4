//! The normalization passes and their fixed-order composition.
//!
//! Each pass owns one full traversal and mutates the document in place.
//! They are independently invocable, but `cleanup` runs them in the one
//! order that works: references must already be materialized when
//! reachability is computed, and rounding must see final geometry.

pub mod apply;
pub mod deref;
pub mod purge;
pub mod round;

pub use apply::ApplyTransforms;
pub use deref::Dereference;
pub use purge::PurgeDefs;
pub use round::RoundNumbers;

use enum_dispatch::enum_dispatch;

use crate::Options;
use crate::dom::Document;
use crate::errors::Diagnostics;

/// A tree-rewriting pass. Recoverable conditions go into `diagnostics`;
/// a pass never aborts mid-traversal.
#[enum_dispatch]
pub trait Pass {
    /// Stable name for logging.
    fn name(&self) -> &'static str;

    fn run(&self, doc: &mut Document, diagnostics: &mut Diagnostics);
}

/// The closed set of passes.
#[enum_dispatch(Pass)]
pub enum PassKind {
    ApplyTransforms,
    Dereference,
    PurgeDefs,
    RoundNumbers,
}

/// Run the full cleanup pipeline in its fixed order and collect every
/// diagnostic raised along the way.
pub fn cleanup(doc: &mut Document, options: &Options) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let pipeline: [PassKind; 4] = [
        ApplyTransforms.into(),
        Dereference.into(),
        PurgeDefs.into(),
        RoundNumbers::new(options.precision).into(),
    ];
    for pass in &pipeline {
        crate::log::debug!(pass = pass.name(), "running pass");
        pass.run(doc, &mut diagnostics);
    }
    diagnostics
}
