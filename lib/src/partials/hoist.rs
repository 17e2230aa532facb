use std::path::Path;

use rustc_hash::FxHashSet;

use crate::mdx::{Document, Embedded, Node};
use crate::partials::{Disposition, Sandbox};

/// Splits the top-level nodes of an expanded partial into the content to
/// splice and the imports to hoist. Imports of partials are dropped.
pub fn extract(nodes: Vec<Node>, file: &Path, sandbox: &Sandbox) -> (Vec<Node>, Vec<Embedded>) {
    let mut content = Vec::with_capacity(nodes.len());
    let mut hoisted = vec![];
    for node in nodes {
        let Node::Esm(esm) = node else {
            content.push(node);
            continue;
        };

        let disposition = match esm.program() {
            Some(program) if program.is_import_only() => sandbox.disposition(program, file),
            _ => Disposition::Keep,
        };

        match disposition {
            Disposition::Keep => content.push(Node::Esm(esm)),
            Disposition::Hoist => hoisted.push(esm),
            Disposition::Drop => tracing::trace!(import = %esm.value, "dropping partial import"),
        }
    }

    (content, hoisted)
}

/// Collects hoisted imports for one document, skipping any the document
/// already has.
///
/// An import is skipped if one of its default bindings, as a `(name,
/// source)` pair, was already seen, or if its exact text was.
#[derive(Debug, Default)]
pub struct Hoister {
    values: FxHashSet<String>,
    bindings: FxHashSet<(String, String)>,
    accepted: Vec<Embedded>,
}

fn default_bindings(esm: &Embedded) -> Vec<(String, String)> {
    esm.program().into_iter()
        .flat_map(|program| program.imports())
        .filter_map(|decl| Some((decl.default_binding()?.to_string(), decl.source.clone())))
        .collect()
}

impl Hoister {
    /// Seeds the hoister with the ESM already at the top level of `doc`.
    pub fn new(doc: &Document) -> Self {
        let mut hoister = Hoister::default();
        for node in &doc.children {
            if let Node::Esm(esm) = node {
                hoister.values.insert(esm.value.clone());
                hoister.bindings.extend(default_bindings(esm));
            }
        }

        hoister
    }

    /// Accepts `esm` unless it duplicates an earlier import.
    pub fn offer(&mut self, esm: Embedded) -> bool {
        let bindings = default_bindings(&esm);
        if bindings.iter().any(|b| self.bindings.contains(b)) {
            return false;
        }

        self.bindings.extend(bindings);
        if !self.values.insert(esm.value.clone()) {
            return false;
        }

        self.accepted.push(esm);
        true
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Inserts the accepted imports after the front matter and imports that
    /// lead `doc`.
    pub fn finish(self, doc: &mut Document) {
        let at = doc.preamble_len();
        doc.children.splice(at..at, self.accepted.into_iter().map(Node::Esm));
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::mdx::parse;

    #[test]
    fn extracts_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("partials/B.mdx"), "b").unwrap();
        let sandbox = Sandbox::new(dir.path().join("partials")).unwrap();

        let doc = parse(concat!(
            "import B from './B.mdx'\n\n",
            "import Icon from '@components/Icon.astro'\n\n",
            "export const x = 1\n\n",
            "import broken from\n\n",
            "Text",
        )).unwrap();

        let (content, hoisted) = extract(doc.children, &sandbox.root().join("A.mdx"), &sandbox);
        assert_eq!(hoisted.len(), 1);
        assert_eq!(hoisted[0].value, "import Icon from '@components/Icon.astro'");
        assert_eq!(content.len(), 3);
        assert!(matches!(&content[0], Node::Esm(e) if e.value == "export const x = 1"));
        assert!(matches!(&content[1], Node::Esm(e) if !e.program().unwrap().is_complete()));
    }

    #[test]
    fn seeds_from_blocks_with_unsupported_statements() {
        let doc = parse(concat!(
            "import Icon from '@components/Icon.astro'\n",
            "export function year() { return 2024 }\n",
            "label: for (;;) {}\n\n",
            "# Title",
        )).unwrap();

        let mut hoister = Hoister::new(&doc);
        assert!(!hoister.offer(Embedded::new("import Icon from '@components/Icon.astro'")));
        assert!(hoister.is_empty());
    }

    #[test]
    fn dedupes_against_document_and_itself() {
        let mut doc = parse(concat!(
            "---\ntitle: t\n---\n\n",
            "import Icon from '@components/Icon.astro'\n\n",
            "# Title",
        )).unwrap();

        let mut hoister = Hoister::new(&doc);
        assert!(!hoister.offer(Embedded::new("import Icon from '@components/Icon.astro';")));
        assert!(hoister.offer(Embedded::new("import Card from '@components/Card.astro'")));
        assert!(!hoister.offer(Embedded::new("import Card from '@components/Card.astro'")));
        assert!(!hoister.offer(Embedded::new("import Card, { Badge } from '@components/Card.astro'")));
        assert!(hoister.offer(Embedded::new("import { Tabs } from '@astrojs/starlight/components'")));
        assert!(!hoister.offer(Embedded::new("import { Tabs } from '@astrojs/starlight/components'")));
        assert_eq!(hoister.len(), 2);

        hoister.finish(&mut doc);
        let kinds: Vec<_> = doc.children.iter().map(|n| match n {
            Node::Esm(e) => e.value.as_str(),
            Node::Frontmatter { .. } => "---",
            _ => "content",
        }).collect();

        assert_eq!(kinds, [
            "---",
            "import Icon from '@components/Icon.astro'",
            "import Card from '@components/Card.astro'",
            "import { Tabs } from '@astrojs/starlight/components'",
            "content",
        ]);
    }

    #[test]
    fn inserts_at_top_without_preamble() {
        let mut doc = parse("# Only").unwrap();
        let mut hoister = Hoister::new(&doc);
        hoister.offer(Embedded::new("import A from 'a'"));
        hoister.finish(&mut doc);
        assert_eq!(doc.to_string(), "import A from 'a'\n\n# Only\n");
    }
}
