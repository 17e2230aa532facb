use std::path::{Component, Path, PathBuf};

/// Lowercases `string`, drops `` ` ``, braces, parentheses and brackets,
/// turns `=` and `->` (with any surrounding whitespace) into `--` and every
/// other run of whitespace into `-`, then strips one `-` from each end.
///
/// ```
/// use quill::util::slugify;
///
/// assert_eq!(slugify("`base` = string"), "base--string");
/// assert_eq!(slugify("Input -> Output"), "input--output");
/// assert_eq!(slugify("  Call `run()` Now "), "call-run-now");
/// ```
pub fn slugify(string: &str) -> String {
    let lower = string.to_lowercase();
    let mut chars = lower.chars()
        .filter(|c| !matches!(c, '`' | '{' | '}' | '(' | ')' | '[' | ']'))
        .peekable();

    let mut output = String::with_capacity(lower.len());
    let mut pending_ws = false;
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            pending_ws = true;
            continue;
        }

        let arrow = c == '-' && chars.peek() == Some(&'>');
        if c == '=' || arrow {
            if arrow {
                chars.next();
            }

            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            output.push_str("--");
            pending_ws = false;
            continue;
        }

        if std::mem::take(&mut pending_ws) {
            output.push('-');
        }

        output.push(c);
    }

    if pending_ws {
        output.push('-');
    }

    let output = output.strip_prefix('-').unwrap_or(&output);
    output.strip_suffix('-').unwrap_or(output).to_string()
}

/// Lexically resolves `.` and `..` components in `path` without touching the
/// file system. `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => { out.pop(); }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            c => out.push(c),
        }
    }

    out
}

/// Whether `path` is `root` or lies beneath it, compared lexically.
///
/// ```
/// use quill::util::is_within;
///
/// assert!(is_within("/site/partials/a.mdx", "/site/partials"));
/// assert!(is_within("/site/partials", "/site/partials"));
/// assert!(!is_within("/site/partials/../secret.mdx", "/site/partials"));
/// assert!(!is_within("/site/partials-extra/a.mdx", "/site/partials"));
/// assert!(!is_within("relative/a.mdx", "/site/partials"));
/// ```
pub fn is_within<P: AsRef<Path>, R: AsRef<Path>>(path: P, root: R) -> bool {
    let (path, root) = (normalize(path.as_ref()), normalize(root.as_ref()));
    match diff_paths(&path, &root) {
        Some(rel) => rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)),
        None => false,
    }
}

/// A helper function to determine the relative path to `path` from `base`.
///
/// Returns `None` if there is no relative path from `base` to `path`, that is,
/// `base` and `path` do not share a common ancestor. `path` and `base` must be
/// either both absolute or both relative; returns `None` if one is relative and
/// the other absolute.
///
/// ```
/// use quill::util::diff_paths;
///
/// assert_eq!(diff_paths("/a/b/c", "b/c"), None);
/// assert_eq!(diff_paths("/a/b/c", "/b/c"), Some("../../a/b/c".into()));
/// assert_eq!(diff_paths("/foo/bar/baz", "/foo/bar"), Some("baz".into()));
/// assert_eq!(diff_paths("/foo/bar/quux", "/foo/bar/baz"), Some("../quux".into()));
/// ```
// Adapted from `figment`, which adapted from `pathdiff`, which itself adapted
// from rustc's path_relative_from.
pub fn diff_paths<P, B>(path: P, base: B) -> Option<PathBuf>
     where P: AsRef<Path>, B: AsRef<Path>
{
    let (path, base) = (path.as_ref(), base.as_ref());
    if path.has_root() != base.has_root() {
        return None;
    }

    let mut ita = path.components();
    let mut itb = base.components();
    let mut comps: Vec<Component> = vec![];
    loop {
        match (ita.next(), itb.next()) {
            (None, None) => break,
            (Some(a), None) => {
                comps.push(a);
                comps.extend(ita.by_ref());
                break;
            }
            (None, _) => comps.push(Component::ParentDir),
            (Some(a), Some(b)) if comps.is_empty() && a == b => (),
            (Some(a), Some(b)) if b == Component::CurDir => comps.push(a),
            (Some(_), Some(b)) if b == Component::ParentDir => return None,
            (Some(a), Some(_)) => {
                comps.push(Component::ParentDir);
                comps.extend(itb.map(|_| Component::ParentDir));
                comps.push(a);
                comps.extend(ita.by_ref());
                break;
            }
        }
    }

    Some(comps.iter().map(|c| c.as_os_str()).collect())
}
