#![doc = svgbobdoc::transform!(
//! A library for inlining MDX partials into documentation pages.
//!
//! # Overview
//!
//! Documentation sites repeat themselves: the same install steps, the same
//! warning, the same table of options on five pages. Quill lets those live
//! once, as _partials_, and be invoked from any page like a component:
//!
//! ```mdx
//! import Install from '@partials/install.mdx'
//!
//! <Install tool="nib" />
//! ```
//!
//! Expansion replaces the invocation with the partial's content, with its
//! `props.*` references substituted, so that the page reads as if the partial
//! had been written into it. Data flows as follows:
//!
//! ```svgbob
//!  +----------+     +--------+     +----------+     +-----------+
//!  | page.mdx |---->| parse  |---->| Document |---->|  Inliner  |
//!  +----------+     +--------+     +----------+     +-----+-----+
//!                                                         |
//!        +-------------------+-------------------+--------+---------+
//!        |                   |                   |                  |
//!  +-----+-----+      +------+-------+    +------+-------+   +------+-----+
//!  |  Sandbox  |      | PartialCache |    | Substitution |   |  Hoister   |
//!  +-----------+      +--------------+    +--------------+   +------------+
//!        |                   |                   |                  |
//!        +-------------------+---------+---------+------------------+
//!                                      |
//!                        +-------------+------------+
//!                        | expanded Document + sink |
//!                        +--------------------------+
//! ```
//!
//!   * The [`Sandbox`] maps the default imports of a document to partial
//!     paths. Only files beneath the partials directory are ever inlined.
//!
//!   * The [`PartialCache`] parses each partial once per modification time and
//!     is shared by every document of a build.
//!
//!   * [`Substitution`](partials::Substitution) splices the caller's
//!     properties into a copy of the partial. Expressions that become constant
//!     strings turn into plain text.
//!
//!   * The [`Inliner`] drives the recursion, guards against cycles and hands
//!     partials' external imports to the [`Hoister`](partials::Hoister), which
//!     places them once at the top of the page.
//!
//! Nothing that goes wrong inside a document aborts it. Missing partials,
//! cycles, missing properties and unparseable substitutions are
//! [`Diagnostic`]s sent to a [`DiagnosticSink`]; only I/O failures are
//! [`Error`](error::Error)s.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quill::{Diagnostics, Inliner, Sandbox};
//! use quill::mdx::Mdx;
//! use quill::partials::Expand;
//! use quill::toc::Headings;
//!
//! # fn main() -> quill::error::Result<()> {
//! let inliner = Inliner::new(Sandbox::new("docs/partials")?);
//! let diagnostics = Diagnostics::new();
//! let path = std::path::Path::new("docs/guide.mdx");
//! let source = std::fs::read_to_string(path)?;
//!
//! let mut expand = Expand::new(&inliner, path, &diagnostics);
//! let mut headings = Headings::default();
//! let doc = Mdx::from(&source)
//!     .plugin(&mut expand)
//!     .plugin(&mut headings)
//!     .run()?;
//!
//! println!("{doc}");
//! # Ok(())
//! # }
//! ```
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod script;
pub mod mdx;
pub mod diagnostics;
pub mod partials;
pub mod toc;
pub mod config;
pub mod discover;

pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics};
pub use partials::{Inliner, PartialCache, Sandbox};
pub use config::Settings;

pub use rayon;
