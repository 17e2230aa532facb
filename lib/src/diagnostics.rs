use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ErrorDetail;
use crate::script;

/// A problem that left part of a document unexpanded.
///
/// Diagnostics never abort an expansion. Hosts decide whether they are
/// warnings or failures, typically by sending them to a [`Diagnostics`]
/// collector and inspecting it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// A reference resolved to a partial path that doesn't exist.
    PartialNotFound { path: PathBuf },
    /// A partial includes itself. `chain` starts and ends with the same path.
    CyclicInclusion { chain: Vec<PathBuf> },
    /// `props.<name>` was referenced but not passed.
    MissingProperty { name: String, partial: PathBuf },
    /// An expression no longer parsed after substitution.
    ExpressionParse {
        partial: PathBuf,
        #[serde(serialize_with = "display")]
        error: script::ParseError,
    },
    /// A partial exists but isn't valid MDX.
    MalformedPartial {
        path: PathBuf,
        #[serde(serialize_with = "display")]
        error: crate::mdx::ParseError,
    },
}

fn display<T: fmt::Display, S: serde::Serializer>(value: &T, ser: S) -> Result<S::Ok, S::Error> {
    ser.collect_str(value)
}

impl Diagnostic {
    /// A stable, machine-readable identifier for the kind of diagnostic.
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::PartialNotFound { .. } => "partial-not-found",
            Diagnostic::CyclicInclusion { .. } => "cyclic-inclusion",
            Diagnostic::MissingProperty { .. } => "missing-property",
            Diagnostic::ExpressionParse { .. } => "expression-parse",
            Diagnostic::MalformedPartial { .. } => "malformed-partial",
        }
    }

    /// The partial the diagnostic is about.
    pub fn path(&self) -> &Path {
        match self {
            Diagnostic::PartialNotFound { path } | Diagnostic::MalformedPartial { path, .. } => path,
            Diagnostic::MissingProperty { partial, .. } | Diagnostic::ExpressionParse { partial, .. } => partial,
            Diagnostic::CyclicInclusion { chain } => chain.last().map_or(Path::new(""), |p| p),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PartialNotFound { path } => write!(f, "Partial not found: {}", path.display()),
            Diagnostic::CyclicInclusion { chain } => {
                f.write_str("Cyclic partial import detected: ")?;
                for (i, path) in chain.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" -> ")?;
                    }

                    write!(f, "{}", path.display())?;
                }

                Ok(())
            }
            Diagnostic::MissingProperty { name, partial } => {
                write!(f, "Missing prop \"{name}\" for partial {}.", partial.display())
            }
            Diagnostic::ExpressionParse { partial, error } => {
                write!(f, "Failed to parse expression in {}: {}", partial.display(), error.message)
            }
            Diagnostic::MalformedPartial { path, error } => {
                write!(f, "Failed to parse partial {}: {error}", path.display())
            }
        }
    }
}

impl ErrorDetail for Diagnostic {
    fn context(&self) -> Vec<(Option<String>, String)> {
        vec![(Some("code".into()), self.code().into())]
    }
}

/// Somewhere to send diagnostics.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

impl<F: Fn(Diagnostic)> DiagnosticSink for F {
    fn report(&self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

/// A thread-safe, append-only collection of diagnostics.
#[derive(derive_more::Debug, Default)]
#[debug("{items:?}")]
pub struct Diagnostics {
    items: boxcar::Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        (0..self.items.count()).filter_map(|i| self.items.get(i))
    }

    /// The diagnostics with the given [`code`](Diagnostic::code).
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.iter().filter(move |d| d.code() == code)
    }

    pub fn to_vec(&self) -> Vec<Diagnostic> {
        self.iter().cloned().collect()
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }
}

/// Emits every diagnostic as a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct Log;

impl DiagnosticSink for Log {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(code = diagnostic.code(), "{diagnostic}");
    }
}

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for (A, B) {
    fn report(&self, diagnostic: Diagnostic) {
        self.0.report(diagnostic.clone());
        self.1.report(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::Error;

    #[test]
    fn messages() {
        let cycle = Diagnostic::CyclicInclusion { chain: vec!["/p/a.mdx".into(), "/p/b.mdx".into(), "/p/a.mdx".into()] };
        assert_eq!(cycle.to_string(), "Cyclic partial import detected: /p/a.mdx -> /p/b.mdx -> /p/a.mdx");
        assert_eq!(cycle.path(), Path::new("/p/a.mdx"));

        let missing = Diagnostic::MissingProperty { name: "X".into(), partial: "/p/P.mdx".into() };
        assert_eq!(missing.to_string(), "Missing prop \"X\" for partial /p/P.mdx.");
        assert_eq!(missing.code(), "missing-property");
    }

    #[test]
    fn serializes_with_code() {
        let error = script::parse_program("a +").unwrap_err();
        let diagnostic = Diagnostic::ExpressionParse { partial: "/p/P.mdx".into(), error };
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["code"], "expression-parse");
        assert_eq!(json["partial"], "/p/P.mdx");
        assert!(json["error"].as_str().unwrap().starts_with("Unexpected end of input"));
    }

    #[test]
    fn sinks() {
        let seen = RefCell::new(vec![]);
        let closure = |d: Diagnostic| seen.borrow_mut().push(d.code());
        let collected = Diagnostics::new();

        let both = (&closure, |d: Diagnostic| collected.report(d));
        both.report(Diagnostic::PartialNotFound { path: "/p/x.mdx".into() });
        both.report(Diagnostic::PartialNotFound { path: "/p/y.mdx".into() });

        assert_eq!(*seen.borrow(), ["partial-not-found", "partial-not-found"]);
        assert_eq!(collected.len(), 2);
        assert_eq!(collected.with_code("partial-not-found").count(), 2);
        assert_eq!(collected.with_code("cyclic-inclusion").count(), 0);
    }

    #[test]
    fn escalates_to_error() {
        let error = Error::from(Diagnostic::PartialNotFound { path: "/p/x.mdx".into() });
        let rendered = error.to_string();
        assert!(rendered.starts_with("Partial not found: /p/x.mdx\ncode: partial-not-found"));
    }
}
