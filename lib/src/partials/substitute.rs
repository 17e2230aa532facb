use std::path::Path;

use rustc_hash::FxHashSet;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::mdx::{self, Attribute, AttributeValue, Embedded, Node};
use crate::partials::Props;
use crate::script;

const PREFIX: &[u8] = b"props.";

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Rewrites `props.<name>` references in one instantiated partial.
///
/// Each missing name is reported once per `Substitution`, so one is made per
/// invocation site.
pub struct Substitution<'a> {
    props: &'a Props,
    partial: &'a Path,
    sink: &'a dyn DiagnosticSink,
    missing: FxHashSet<String>,
}

enum Rewrite {
    Unchanged,
    Text(String),
    Parsed(String, script::Program),
}

impl<'a> Substitution<'a> {
    pub fn new(props: &'a Props, partial: &'a Path, sink: &'a dyn DiagnosticSink) -> Self {
        Substitution { props, partial, sink, missing: FxHashSet::default() }
    }

    /// Replaces every bound reference in `src`. Returns `None` if nothing was
    /// replaced. Unbound references are reported and left as they are.
    ///
    /// ```
    /// use std::path::Path;
    /// use quill::partials::{Props, Substitution};
    /// use quill::Diagnostics;
    ///
    /// let props: Props = [("X", "\"a\""), ("Y", "1+1")].into_iter().collect();
    /// let sink = Diagnostics::new();
    /// let mut subst = Substitution::new(&props, Path::new("/p/P.mdx"), &sink);
    ///
    /// assert_eq!(subst.replace("props.X + props.Y").as_deref(), Some("\"a\" + 1+1"));
    /// assert_eq!(subst.replace("myprops.X + props.Z"), None);
    /// assert_eq!(sink.len(), 1);
    /// ```
    pub fn replace(&mut self, src: &str) -> Option<String> {
        let bytes = src.as_bytes();
        let mut out = String::with_capacity(src.len());
        let (mut copied, mut scanned, mut updated) = (0, 0, false);
        for start in memchr::memmem::find_iter(bytes, PREFIX) {
            if start < scanned || (start > 0 && is_word(bytes[start - 1])) {
                continue;
            }

            let name_start = start + PREFIX.len();
            let name_len = bytes[name_start..].iter().take_while(|&&b| is_word(b)).count();
            if name_len == 0 {
                continue;
            }

            let end = name_start + name_len;
            let name = &src[name_start..end];
            scanned = end;
            match self.props.get(name) {
                Some(replacement) => {
                    out.push_str(&src[copied..start]);
                    out.push_str(replacement);
                    copied = end;
                    updated = true;
                }
                None => self.report_missing(name),
            }
        }

        if !updated {
            return None;
        }

        out.push_str(&src[copied..]);
        Some(out)
    }

    fn report_missing(&mut self, name: &str) {
        if self.missing.insert(name.to_string()) {
            self.sink.report(Diagnostic::MissingProperty {
                name: name.to_string(),
                partial: self.partial.to_path_buf(),
            });
        }
    }

    fn rewrite(&mut self, embedded: &Embedded, fold: bool) -> Rewrite {
        let Some(value) = self.replace(&embedded.value) else {
            return Rewrite::Unchanged;
        };

        match script::parse_program(&value) {
            Ok(program) => match program.static_text() {
                Some(text) if fold => Rewrite::Text(text.to_string()),
                _ => Rewrite::Parsed(value, program),
            },
            Err(error) => {
                self.sink.report(Diagnostic::ExpressionParse {
                    partial: self.partial.to_path_buf(),
                    error,
                });

                Rewrite::Unchanged
            }
        }
    }

    /// Substitutes into expressions, ESM and expression attributes of `nodes`
    /// and everything beneath them. Expressions that become a constant string
    /// are folded into text.
    pub fn apply(&mut self, nodes: &mut [Node]) {
        mdx::walk_mut(nodes, &mut |node| self.substitute(node));
    }

    fn substitute(&mut self, node: &mut Node) {
        match node {
            Node::TextExpression(e) => match self.rewrite(e, true) {
                Rewrite::Text(value) => *node = Node::text(value),
                Rewrite::Parsed(value, program) => e.set(value, program),
                Rewrite::Unchanged => {}
            },
            Node::FlowExpression(e) => match self.rewrite(e, true) {
                Rewrite::Text(value) => *node = Node::Paragraph { children: vec![Node::text(value)] },
                Rewrite::Parsed(value, program) => e.set(value, program),
                Rewrite::Unchanged => {}
            },
            Node::Esm(e) if !e.program().map_or(false, script::Program::is_complete) => {
                if let Some(value) = self.replace(&e.value) {
                    *e = Embedded::module(value);
                }
            }
            Node::Esm(e) => {
                if let Rewrite::Parsed(value, program) = self.rewrite(e, false) {
                    e.set(value, program);
                }
            }
            Node::FlowElement(element) | Node::TextElement(element) => {
                for attribute in &mut element.attributes {
                    let Attribute::Property { value: Some(AttributeValue::Expression(e)), .. } = attribute else {
                        continue;
                    };

                    if let Rewrite::Parsed(value, program) = self.rewrite(e, false) {
                        e.set(value, program);
                    }
                }
            }
            _ => {}
        }
    }
}
