//! Inlining of MDX partials.
//!
//! A partial is an MDX file in the partials directory, imported by default
//! binding and invoked as a block-level component:
//!
//! ```mdx
//! import Setup from '@partials/setup.mdx'
//!
//! <Setup tool="nib" version={2} />
//! ```
//!
//! Expansion replaces `<Setup … />` with the partial's content after
//! substituting `props.tool` and `props.version` in its expressions, recurses
//! into partials the partial itself invokes, drops imports of partials and
//! hoists the partials' other imports to the top of the document.

mod cache;
mod expand;
mod hoist;
mod props;
mod resolve;
mod substitute;

pub use cache::{CachedPartial, Lookup, PartialCache};
pub use expand::Inliner;
pub use hoist::{extract, Hoister};
pub use props::Props;
pub use resolve::{Disposition, Sandbox};
pub use substitute::Substitution;

use std::path::Path;

use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::mdx::{Document, Plugin};

/// Runs an [`Inliner`] as a stage of an [`Mdx`](crate::mdx::Mdx) pipeline.
pub struct Expand<'a> {
    inliner: &'a Inliner,
    path: &'a Path,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Expand<'a> {
    pub fn new(inliner: &'a Inliner, path: &'a Path, sink: &'a dyn DiagnosticSink) -> Self {
        Expand { inliner, path, sink }
    }
}

impl Plugin for Expand<'_> {
    fn transform(&mut self, doc: &mut Document) -> Result<()> {
        self.inliner.inline(doc, self.path, self.sink)
    }
}
