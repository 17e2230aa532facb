//! A small grammar for the script embedded in MDX documents.
//!
//! This is not a JavaScript parser. It covers what documentation pages put
//! in `{…}` expressions, JSX attribute values and `import`/`export` blocks:
//! literals (regular expressions included), identifiers, member and call
//! chains, operators, template literals, object and array literals, arrow
//! functions and JSX. Variable declarations are parsed; `function` and
//! `class` bodies are kept as source text. An expression outside of that
//! subset fails to parse, which callers treat as "leave the source alone".
//! ESM blocks go through [`parse_module`], which keeps unsupported statements
//! as raw text and still sees every import.

mod ast;
mod lexer;
mod parser;
pub mod jsx;

pub use ast::*;
pub use lexer::{cook, matching_brace};
pub use parser::Parser;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the parsed source.
    pub offset: usize,
    /// 1-based.
    pub line: usize,
    /// 0-based, in characters.
    pub column: usize,
}

impl ParseError {
    pub fn at(src: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(src.len());
        let before = &src[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count());
        ParseError { message: message.into(), offset, line, column }
    }

    /// Rebases an error from a parse of `src[base..]` onto `src`.
    pub(crate) fn rebase(self, src: &str, base: usize) -> Self {
        ParseError::at(src, base + self.offset, self.message)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError { }

/// Parses `src` as a module body.
pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    Parser::new(src)?.parse_program()
}

/// Parses `src` as a module body, recovering from statements outside the
/// grammar. Every `import` on a line of its own is seen even when its
/// neighbours don't parse.
///
/// ```
/// use quill::script::{parse_module, Statement};
///
/// let program = parse_module(concat!(
///     "import Base from './Base.mdx'\n",
///     "export function year() { return 2024 }\n",
///     "label: for (;;) {}\n",
///     "import Icon, { Other } from '@components/Icon.astro'",
/// ));
///
/// let imports: Vec<_> = program.imports()
///     .filter_map(|decl| Some((decl.default_binding()?, decl.source.as_str())))
///     .collect();
///
/// assert_eq!(imports, [("Base", "./Base.mdx"), ("Icon", "@components/Icon.astro")]);
/// assert!(matches!(program.body[2], Statement::Unparsed(_)));
/// ```
pub fn parse_module(src: &str) -> Program {
    Parser::parse_module(src)
}

/// The `(binding, source)` pairs of every default import in `src`.
///
/// ```
/// let imports = quill::script::default_imports(r#"
/// import Base from "./Base.mdx";
/// import { Tabs } from "@components/tabs";
/// export function year() { return 2024 }
/// import Icon, { Other } from '@components/Icon.astro';
/// "#);
///
/// assert_eq!(imports, [
///     ("Base".to_string(), "./Base.mdx".to_string()),
///     ("Icon".to_string(), "@components/Icon.astro".to_string()),
/// ]);
/// ```
pub fn default_imports(src: &str) -> Vec<(String, String)> {
    parse_module(src).imports()
        .filter_map(|decl| Some((decl.default_binding()?.to_string(), decl.source.clone())))
        .collect()
}

/// The module source of every import declaration in `src`, in order.
pub fn import_sources(src: &str) -> Vec<String> {
    parse_module(src).imports().map(|decl| decl.source.clone()).collect()
}
