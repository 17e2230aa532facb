use std::path::{Component, Path};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::Result;
use crate::mdx::{self, Document, Node, Plugin};
use crate::util::slugify;

/// A heading as it appears in a page's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub depth: u8,
    pub slug: String,
    pub text: String,
}

/// A heading and the deeper headings that follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub title: String,
    pub level: u8,
    pub id: String,
    pub children: Vec<Entry>,
}

/// Hands out slugs, suffixing `-1`, `-2`, … to repeats.
#[derive(Debug, Default)]
struct Slugger {
    occurrences: FxHashMap<String, usize>,
}

impl Slugger {
    fn slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut slug = base.clone();
        while self.occurrences.contains_key(&slug) {
            let count = self.occurrences.entry(base.clone()).or_default();
            *count += 1;
            slug = format!("{base}-{count}");
        }

        self.occurrences.insert(slug.clone(), 0);
        slug
    }
}

/// Every heading in `doc`, in document order, including those inside
/// elements.
pub fn headings(doc: &Document) -> Vec<Heading> {
    let mut slugger = Slugger::default();
    let mut headings = vec![];
    doc.walk(|node| {
        if let Node::Heading { depth, .. } = node {
            let text = mdx::text_content(node).trim().to_string();
            let slug = slugger.slug(&text);
            headings.push(Heading { depth: *depth, slug, text });
        }
    });

    headings
}

/// Nests each heading under the closest preceding shallower one.
pub fn nest(headings: &[Heading]) -> Vec<Entry> {
    fn insert(entries: &mut Vec<Entry>, entry: Entry) {
        match entries.last_mut() {
            Some(last) if last.level < entry.level => insert(&mut last.children, entry),
            _ => entries.push(entry),
        }
    }

    let mut entries = vec![];
    for heading in headings {
        insert(&mut entries, Entry {
            title: heading.text.clone(),
            level: heading.depth,
            id: heading.slug.clone(),
            children: vec![],
        });
    }

    entries
}

/// Collects the headings of a document once it has been transformed by the
/// plugins before it.
#[derive(Debug, Default, Clone)]
pub struct Headings {
    pub entries: Vec<Heading>,
}

impl Headings {
    pub fn toc(&self) -> Vec<Entry> {
        nest(&self.entries)
    }
}

impl Plugin for Headings {
    fn transform(&mut self, doc: &mut Document) -> Result<()> {
        self.entries = headings(doc);
        Ok(())
    }
}

/// The route of the page at `path`, relative to the content root: without
/// its `.md` or `.mdx` extension, without a trailing `index`, and with `/`
/// separators.
///
/// ```
/// use quill::toc::page_slug;
///
/// assert_eq!(page_slug("guides/setup.mdx".as_ref()), "guides/setup");
/// assert_eq!(page_slug("guides/index.md".as_ref()), "guides");
/// assert_eq!(page_slug("index.mdx".as_ref()), "index");
/// assert_eq!(page_slug("notes.txt".as_ref()), "notes.txt");
/// ```
pub fn page_slug(path: &Path) -> String {
    let parts: Vec<_> = path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();

    let mut slug = parts.join("/");
    for ext in [".mdx", ".md"] {
        if let Some(stripped) = slug.strip_suffix(ext) {
            slug.truncate(stripped.len());
            break;
        }
    }

    if let Some(stripped) = slug.strip_suffix("/index") {
        slug.truncate(stripped.len());
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdx::{parse, Mdx};

    #[test]
    fn collects_nested_and_inline_text() {
        let doc = parse("# `base` = string\n\n<Aside>\n## With {`svg`} -> icon\n</Aside>").unwrap();
        let headings = headings(&doc);
        assert_eq!(headings, [
            Heading { depth: 1, slug: "base--string".into(), text: "base = string".into() },
            Heading { depth: 2, slug: "with-svg--icon".into(), text: "With `svg` -> icon".into() },
        ]);
    }

    #[test]
    fn repeated_slugs_are_suffixed() {
        let doc = parse("## Usage\n\n## Usage\n\n## Usage-1\n\n## Usage").unwrap();
        let slugs: Vec<_> = headings(&doc).into_iter().map(|h| h.slug).collect();
        assert_eq!(slugs, ["usage", "usage-1", "usage-1-1", "usage-2"]);
    }

    #[test]
    fn nests_under_shallower_headings() {
        let mut plugin = Headings::default();
        Mdx::from("# A\n\n### B\n\n## C\n\n# D\n\n## E")
            .plugin(&mut plugin)
            .run()
            .unwrap();

        let toc = plugin.toc();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].children.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["b", "c"]);
        assert_eq!(toc[1].children[0].title, "E");
        assert!(toc[0].children[1].children.is_empty());
    }

    #[test]
    fn page_slugs() {
        assert_eq!(page_slug(Path::new("a/b/index.mdx")), "a/b");
        assert_eq!(page_slug(Path::new("./a/b.md")), "a/b");
    }
}
