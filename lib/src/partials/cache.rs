use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::error::{Chainable, Result};
use crate::mdx::{self, Document};

type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// A parsed partial as of its last modification time.
#[derive(Debug)]
pub struct CachedPartial {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub tree: Document,
}

impl CachedPartial {
    /// A fresh copy of the tree to expand into a document. The cached tree
    /// itself is never modified.
    pub fn instantiate(&self) -> Document {
        self.tree.clone()
    }
}

#[derive(Debug)]
pub enum Lookup {
    Found(Arc<CachedPartial>),
    Missing,
    Invalid(mdx::ParseError),
}

/// Parsed partials keyed by absolute path, revalidated against the file's
/// modification time on every lookup.
///
/// The cache is safe to share across threads. Two threads missing on the same
/// path at once may both parse it; the last insert wins.
#[derive(derive_more::Debug, Default)]
pub struct PartialCache {
    entries: dashmap::DashMap<PathBuf, Arc<CachedPartial>, Hasher>,
    #[debug(ignore)]
    loads: AtomicUsize,
}

impl PartialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: &Path) -> Result<Lookup> {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Lookup::Missing),
            Err(e) => return Err(e).chain_with(|| error!("failed to stat partial", "path" => path.display())),
        };

        let cached = self.entries.get(path).map(|entry| entry.value().clone());
        if let Some(entry) = cached.filter(|e| e.modified == modified) {
            tracing::debug!(path = %path.display(), "partial cache hit");
            return Ok(Lookup::Found(entry));
        }

        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Lookup::Missing),
            Err(e) => return Err(e).chain_with(|| error!("failed to load partial", "path" => path.display())),
        };

        tracing::debug!(path = %path.display(), "partial cache miss");
        self.loads.fetch_add(1, Ordering::Relaxed);
        match mdx::parse(&source) {
            Ok(tree) => {
                let entry = Arc::new(CachedPartial { path: path.to_path_buf(), modified, tree });
                self.entries.insert(path.to_path_buf(), entry.clone());
                Ok(Lookup::Found(entry))
            }
            Err(e) => {
                self.entries.remove(path);
                Ok(Lookup::Invalid(e))
            }
        }
    }

    /// How many times a partial was read and parsed from disk.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::Duration;

    use super::*;

    static_assertions::assert_impl_all!(PartialCache: Send, Sync);

    #[test]
    fn reparses_only_when_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.mdx");
        fs::write(&path, "# One").unwrap();

        let cache = PartialCache::new();
        let Lookup::Found(first) = cache.load(&path).unwrap() else { panic!("not found") };
        let Lookup::Found(second) = cache.load(&path).unwrap() else { panic!("not found") };
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.loads(), 1);

        fs::write(&path, "# Two").unwrap();
        let later = first.modified + Duration::from_secs(5);
        File::options().write(true).open(&path).unwrap().set_modified(later).unwrap();

        let Lookup::Found(third) = cache.load(&path).unwrap() else { panic!("not found") };
        assert_eq!(cache.loads(), 2);
        assert_eq!(third.instantiate().to_string(), "# Two\n");
        assert_eq!(first.tree.to_string(), "# One\n");
    }

    #[test]
    fn missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PartialCache::new();
        assert!(matches!(cache.load(&dir.path().join("nope.mdx")).unwrap(), Lookup::Missing));

        let path = dir.path().join("Bad.mdx");
        fs::write(&path, "```js\nnever closed").unwrap();
        assert!(matches!(cache.load(&path).unwrap(), Lookup::Invalid(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.mdx");
        fs::write(&path, "a").unwrap();

        let cache = PartialCache::new();
        cache.load(&path).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate(&path));
        assert!(!cache.invalidate(&path));
        cache.load(&path).unwrap();
        assert_eq!(cache.loads(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
