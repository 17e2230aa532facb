use std::path::{Path, PathBuf};

use crate::error::{Chainable, Result};
use crate::util;

/// A document found under a content root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Source {
    pub path: PathBuf,
    /// `path` relative to the content root.
    pub relative: PathBuf,
}

fn is_document(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("md" | "mdx"))
}

/// Walks `root` in parallel for `.md` and `.mdx` files, skipping hidden
/// entries and anything inside one of `exclude`. Results are sorted by path.
pub fn discover<P: AsRef<Path>>(root: P, exclude: &[PathBuf]) -> Result<Vec<Source>> {
    use jwalk::WalkDir;

    let root = util::normalize(&std::path::absolute(root.as_ref())?);
    if !root.is_dir() {
        return err! {
            "content root is not a directory",
            "root" => root.display(),
        };
    }

    let exclude: Vec<PathBuf> = exclude.iter()
        .map(|p| std::path::absolute(p).map(|p| util::normalize(&p)))
        .collect::<Result<_, _>>()?;

    let walker = WalkDir::new(&root)
        .follow_links(true)
        .skip_hidden(true)
        .process_read_dir(move |_, _, _, entries| {
            entries.retain(|entry| match entry {
                Ok(e) => !exclude.iter().any(|x| util::is_within(e.path(), x)),
                Err(_) => true,
            })
        });

    let mut sources = vec![];
    for entry in walker {
        let entry = entry.chain_with(|| error!("failed to walk content", "root" => root.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_document(&path) {
            continue;
        }

        let relative = util::diff_paths(&path, &root).unwrap_or_else(|| path.clone());
        sources.push(Source { path, relative });
    }

    sources.sort();
    tracing::debug!(root = %root.display(), documents = sources.len(), "discovered documents");
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn finds_documents_outside_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for file in ["a.mdx", "b/c.md", "b/d.txt", ".hidden/e.mdx", "partials/p.mdx", "b/.f.mdx"] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }

        let sources = discover(root, &[root.join("partials")]).unwrap();
        let relative: Vec<_> = sources.iter().map(|s| s.relative.to_str().unwrap()).collect();
        assert_eq!(relative, ["a.mdx", "b/c.md"]);
        assert!(sources.iter().all(|s| s.path.is_absolute()));
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.mdx");
        fs::write(&file, "x").unwrap();
        let error = discover(&file, &[]).unwrap_err();
        assert!(error.to_string().starts_with("content root is not a directory"));
    }
}
