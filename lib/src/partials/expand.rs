use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{Chainable, Result};
use crate::mdx::{Document, Element, Embedded, Node};
use crate::partials::{hoist, Hoister, Lookup, PartialCache, Props, Sandbox, Substitution};
use crate::util;

/// Inlines partials into documents.
///
/// An `Inliner` is shared by every document of a build: its cache holds each
/// partial parsed once. Per-document state lives only for the duration of a
/// call to [`Inliner::inline()`].
#[derive(Debug, Clone)]
pub struct Inliner {
    sandbox: Sandbox,
    cache: Arc<PartialCache>,
}

/// The state of one top-level expansion.
struct Run<'a> {
    sandbox: &'a Sandbox,
    cache: &'a PartialCache,
    sink: &'a dyn DiagnosticSink,
    /// The partials being expanded, outermost first.
    stack: Vec<PathBuf>,
    hoisted: Vec<Embedded>,
}

type Bindings = FxHashMap<String, PathBuf>;

impl Inliner {
    pub fn new(sandbox: Sandbox) -> Self {
        Inliner::with_cache(sandbox, Arc::default())
    }

    pub fn with_cache(sandbox: Sandbox, cache: Arc<PartialCache>) -> Self {
        Inliner { sandbox, cache }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn cache(&self) -> &Arc<PartialCache> {
        &self.cache
    }

    /// Replaces every invocation of a partial in `doc`, which was read from
    /// `path`, with the partial's expanded content, and hoists the external
    /// imports the partials need to the top of `doc`.
    ///
    /// Anything that can't be expanded is left in place and reported to
    /// `sink`. Only I/O failures other than a missing file are errors.
    pub fn inline(&self, doc: &mut Document, path: &Path, sink: &dyn DiagnosticSink) -> Result<()> {
        let path = util::normalize(&std::path::absolute(path)?);
        let span = tracing::debug_span!("inline", path = %path.display());
        let _enter = span.enter();

        let mut hoister = Hoister::new(doc);
        let mut run = Run {
            sandbox: &self.sandbox,
            cache: &self.cache,
            sink,
            stack: vec![],
            hoisted: vec![],
        };

        let bindings = self.sandbox.bindings(&doc.children, &path);
        run.expand(&mut doc.children, &bindings)
            .chain_with(|| error!("failed to inline partials", "document" => path.display()))?;

        for esm in run.hoisted {
            hoister.offer(esm);
        }

        tracing::debug!(imports = hoister.len(), "hoisting imports");
        hoister.finish(doc);
        Ok(())
    }
}

impl Run<'_> {
    fn expand(&mut self, nodes: &mut Vec<Node>, bindings: &Bindings) -> Result<()> {
        let mut i = 0;
        while i < nodes.len() {
            let target = match &nodes[i] {
                Node::FlowElement(Element { name: Some(name), .. }) => bindings.get(name),
                _ => None,
            };

            if let (Some(target), Node::FlowElement(element)) = (target, &nodes[i]) {
                if let Some(content) = self.include(element, target)? {
                    let len = content.len();
                    nodes.splice(i..=i, content);
                    i += len;
                    continue;
                }
            }

            if let Some(children) = nodes[i].children_mut() {
                self.expand(children, bindings)?;
            }

            i += 1;
        }

        Ok(())
    }

    /// The expanded content of the partial at `path` invoked by `element`, or
    /// `None` if it can't be expanded.
    fn include(&mut self, element: &Element, path: &Path) -> Result<Option<Vec<Node>>> {
        if !self.sandbox.contains(path) {
            return Ok(None);
        }

        if self.stack.iter().any(|p| p == path) {
            let mut chain = self.stack.clone();
            chain.push(path.to_path_buf());
            self.sink.report(Diagnostic::CyclicInclusion { chain });
            return Ok(None);
        }

        let partial = match self.cache.load(path)? {
            Lookup::Found(partial) => partial,
            Lookup::Missing => {
                self.sink.report(Diagnostic::PartialNotFound { path: path.to_path_buf() });
                return Ok(None);
            }
            Lookup::Invalid(error) => {
                self.sink.report(Diagnostic::MalformedPartial { path: path.to_path_buf(), error });
                return Ok(None);
            }
        };

        let mut tree = partial.instantiate();
        let props = Props::bind(element);
        Substitution::new(&props, path, self.sink).apply(&mut tree.children);

        tracing::debug!(partial = %path.display(), depth = self.stack.len(), "expanding partial");
        self.stack.push(path.to_path_buf());
        let content = self.expand_partial(tree, path);
        self.stack.pop();
        content.map(Some)
    }

    fn expand_partial(&mut self, mut tree: Document, path: &Path) -> Result<Vec<Node>> {
        let bindings = self.sandbox.bindings(&tree.children, path);
        self.expand(&mut tree.children, &bindings)?;

        let (content, hoisted) = hoist::extract(tree.children, path, self.sandbox);
        self.hoisted.extend(hoisted);
        Ok(content)
    }
}
