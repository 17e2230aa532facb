//! The MDX document tree, its parser and its printer.
//!
//! Only the subset of MDX that documentation pages use is supported: front
//! matter, ESM blocks, headings, paragraphs, fenced code, thematic breaks,
//! JSX elements (block and inline) and embedded expressions. Everything else
//! is kept as text.

mod node;
mod parse;
mod plugin;
mod stringify;

pub use node::*;
pub use parse::{parse, ParseError};
pub use plugin::{Mdx, Plugin};
