use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::config::Settings;
use crate::mdx::{self, Node};
use crate::script::Program;
use crate::util;

/// What becomes of an import found at the top of an expanded partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not an import of anything; stays with the content.
    Keep,
    /// Every source is a partial, already satisfied by inlining.
    Drop,
    /// Some source lies outside the sandbox. Moves to the document's top.
    Hoist,
}

/// The directory partials live in, and how import sources map into it.
///
/// A source beginning with the alias (`@partials/` by default) resolves
/// under the root. A source beginning with `.` resolves against the
/// importing file's directory. Nothing else resolves. Only paths that end up
/// inside the root are ever inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
    alias: String,
    extensions: Vec<String>,
}

impl Sandbox {
    /// A sandbox rooted at `root`, made absolute against the working
    /// directory.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let settings = Settings::default();
        Ok(Sandbox {
            root: util::normalize(&std::path::absolute(root)?),
            alias: settings.alias,
            extensions: settings.extensions,
        })
    }

    pub fn from_settings(settings: &Settings, base: &Path) -> io::Result<Self> {
        let root = base.join(&settings.partials);
        Ok(Sandbox::new(root)?
            .with_alias(&settings.alias)
            .with_extensions(&settings.extensions))
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    /// Extensions to probe, in order, for sources without one.
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions.iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .collect();

        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, path: &Path) -> bool {
        util::is_within(path, &self.root)
    }

    /// Resolves an import `source` appearing in the file at `from`, probing
    /// for an extension if the source has none and doesn't exist as is.
    pub fn resolve_import(&self, source: &str, from: &Path) -> Option<PathBuf> {
        let path = if let Some(rest) = source.strip_prefix(self.alias.as_str()) {
            self.root.join(rest)
        } else if source.starts_with('.') {
            from.parent()?.join(source)
        } else {
            return None;
        };

        Some(self.probe(util::normalize(&path)))
    }

    fn probe(&self, path: PathBuf) -> PathBuf {
        if path.exists() {
            return path;
        }

        let has_extension = path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| !e.is_empty() && e.bytes().all(|b| b.is_ascii_alphabetic()));

        if !has_extension {
            for ext in &self.extensions {
                let mut candidate = path.clone().into_os_string();
                candidate.push(".");
                candidate.push(ext);
                let candidate = PathBuf::from(candidate);
                if candidate.exists() {
                    return candidate;
                }
            }
        }

        path
    }

    /// Decides the fate of an import-only `program` written in `file`.
    pub fn disposition(&self, program: &Program, file: &Path) -> Disposition {
        let mut sources = program.imports().map(|decl| decl.source.as_str()).peekable();
        if sources.peek().is_none() {
            return Disposition::Keep;
        }

        let external = sources.any(|source| match self.resolve_import(source, file) {
            Some(path) => !self.contains(&path),
            None => true,
        });

        if external {
            Disposition::Hoist
        } else {
            Disposition::Drop
        }
    }

    /// Maps each default import binding in `nodes` that names a partial to
    /// the partial's path.
    pub fn bindings(&self, nodes: &[Node], file: &Path) -> FxHashMap<String, PathBuf> {
        let mut bindings = FxHashMap::default();
        mdx::walk(nodes, &mut |node| {
            let Node::Esm(esm) = node else { return };
            let Some(program) = esm.program() else { return };
            for decl in program.imports() {
                let Some(name) = decl.default_binding() else { continue };
                match self.resolve_import(&decl.source, file) {
                    Some(path) if self.contains(&path) => {
                        bindings.insert(name.to_string(), path);
                    }
                    _ => tracing::trace!(name, source = %decl.source, "not a partial"),
                }
            }
        });

        bindings
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("partials/nested")).unwrap();
        fs::write(dir.path().join("partials/A.mdx"), "a").unwrap();
        fs::write(dir.path().join("partials/B.md"), "b").unwrap();
        fs::write(dir.path().join("partials/nested/C.mdx"), "c").unwrap();
        let sandbox = Sandbox::new(dir.path().join("partials")).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn alias_and_relative_sources() {
        let (dir, sandbox) = sandbox();
        let root = sandbox.root().to_path_buf();
        let doc = dir.path().join("docs/page.mdx");
        let nested = root.join("nested/C.mdx");

        assert_eq!(sandbox.resolve_import("@partials/A.mdx", &doc), Some(root.join("A.mdx")));
        assert_eq!(sandbox.resolve_import("@partials/A", &doc), Some(root.join("A.mdx")));
        assert_eq!(sandbox.resolve_import("@partials/B", &doc), Some(root.join("B.md")));
        assert_eq!(sandbox.resolve_import("../A", &nested), Some(root.join("A.mdx")));
        assert_eq!(sandbox.resolve_import("./C", &nested), Some(nested.clone()));
        assert_eq!(sandbox.resolve_import("@components/X.astro", &doc), None);
        assert_eq!(sandbox.resolve_import("react", &doc), None);
    }

    #[test]
    fn missing_files_fall_back_to_the_literal_path() {
        let (_dir, sandbox) = sandbox();
        let root = sandbox.root().to_path_buf();
        let from = root.join("A.mdx");
        assert_eq!(sandbox.resolve_import("./Gone", &from), Some(root.join("Gone")));
        assert_eq!(sandbox.resolve_import("./Gone.v2", &from), Some(root.join("Gone.v2")));
    }

    #[test]
    fn escaping_the_root_is_not_contained() {
        let (dir, sandbox) = sandbox();
        fs::write(dir.path().join("Outside.mdx"), "x").unwrap();
        let from = sandbox.root().join("A.mdx");
        let outside = sandbox.resolve_import("../Outside", &from).unwrap();
        assert!(!sandbox.contains(&outside));
        assert!(!sandbox.contains(&sandbox.root().join("../partials-2/A.mdx")));
        assert!(sandbox.contains(&sandbox.root().join("nested/../A.mdx")));
    }

    #[test]
    fn dispositions() {
        let (_dir, sandbox) = sandbox();
        let from = sandbox.root().join("nested/C.mdx");
        let disposition = |src: &str| {
            let program = crate::script::parse_program(src).unwrap();
            sandbox.disposition(&program, &from)
        };

        assert_eq!(disposition("import A from '@partials/A'"), Disposition::Drop);
        assert_eq!(disposition("import A from '../A';\nimport B from '@partials/B.md'"), Disposition::Drop);
        assert_eq!(disposition("import Icon from '@components/Icon.astro'"), Disposition::Hoist);
        assert_eq!(disposition("import A from '@partials/A';\nimport 'styles.css'"), Disposition::Hoist);
        assert_eq!(disposition("import X from '../../../X.mdx'"), Disposition::Hoist);
        assert_eq!(disposition("export const a = 1"), Disposition::Keep);
    }

    #[test]
    fn bindings_only_name_partials() {
        let (dir, sandbox) = sandbox();
        fs::write(dir.path().join("Outside.mdx"), "x").unwrap();
        let doc = mdx::parse(concat!(
            "import A from '@partials/A';\n",
            "import Icon from '@components/Icon.astro';\n",
            "import Outside from '../../Outside.mdx';\n",
            "import { Named } from '@partials/B';",
        )).unwrap();

        let bindings = sandbox.bindings(&doc.children, &sandbox.root().join("nested/C.mdx"));
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings["A"], sandbox.root().join("A.mdx"));

        let doc = mdx::parse(concat!(
            "import A from '@partials/A'\n",
            "export function year() { return 2024 }\n",
            "label: for (;;) {}",
        )).unwrap();
        let bindings = sandbox.bindings(&doc.children, &dir.path().join("page.mdx"));
        assert_eq!(bindings["A"], sandbox.root().join("A.mdx"));

        let custom = sandbox.clone().with_alias("~/");
        let doc = mdx::parse("import A from '~/A'").unwrap();
        let bindings = custom.bindings(&doc.children, &dir.path().join("page.mdx"));
        assert_eq!(bindings["A"], sandbox.root().join("A.mdx"));
    }
}
