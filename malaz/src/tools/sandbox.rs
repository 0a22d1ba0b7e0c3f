//! PathSandbox - confines every tool path to the project root

use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::SecurityError;

/// A path that was inside the project root when it was validated
///
/// Resolve again before every use; the filesystem may change in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedPath {
    path: PathBuf,
}

impl SandboxedPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for SandboxedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for SandboxedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolves user-supplied paths against a project root
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root`
    ///
    /// A relative root is made absolute against the current directory.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref();
        debug!(?root, "PathSandbox::new: called");
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            debug!("PathSandbox::new: relative root, joining with current dir");
            std::env::current_dir()?.join(root)
        };
        Ok(Self {
            root: normalize_lexically(&absolute),
        })
    }

    /// The absolute, normalized project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` inside the root
    ///
    /// An absolute argument replaces the root before the containment check.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<SandboxedPath, SecurityError> {
        let relative = relative.as_ref();
        debug!(?relative, root = ?self.root, "PathSandbox::resolve: called");

        let normalized = normalize_lexically(&self.root.join(relative));
        if !normalized.starts_with(&self.root) {
            debug!(?normalized, "PathSandbox::resolve: lexical escape");
            return Err(self.escape(relative));
        }

        if !self.nearest_ancestor_inside(&normalized) {
            debug!(?normalized, "PathSandbox::resolve: symlink escape");
            return Err(self.escape(relative));
        }

        debug!(?normalized, "PathSandbox::resolve: path is within root");
        Ok(SandboxedPath { path: normalized })
    }

    /// Every entry below the root, in name order
    ///
    /// Hidden directories are not descended into. Each entry is resolved
    /// again by its root-relative path, and entries that fail are dropped.
    pub fn walk(&self) -> impl Iterator<Item = (DirEntry, SandboxedPath)> + '_ {
        debug!(root = ?self.root, "PathSandbox::walk: called");
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden_dir(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.depth() > 0)
            .filter_map(move |entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?.to_path_buf();
                match self.resolve(&relative) {
                    Ok(path) => Some((entry, path)),
                    Err(e) => {
                        debug!(?relative, %e, "PathSandbox::walk: dropping entry");
                        None
                    }
                }
            })
    }

    /// Express a path under the root relative to it, for display
    pub fn relative_display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn escape(&self, relative: &Path) -> SecurityError {
        SecurityError::PathEscape {
            path: relative.display().to_string(),
            root: self.root.clone(),
        }
    }

    /// Canonicalize the nearest existing ancestor and compare with the canonical root
    fn nearest_ancestor_inside(&self, normalized: &Path) -> bool {
        let canonical_root = match self.root.canonicalize() {
            Ok(root) => root,
            Err(_) => {
                debug!("PathSandbox::nearest_ancestor_inside: root does not exist yet");
                return true;
            }
        };

        for ancestor in normalized.ancestors() {
            match ancestor.canonicalize() {
                Ok(canonical) => {
                    debug!(?ancestor, ?canonical, "PathSandbox::nearest_ancestor_inside: existing ancestor");
                    return canonical.starts_with(&canonical_root);
                }
                Err(_) if ancestor.symlink_metadata().is_ok() => {
                    debug!(?ancestor, "PathSandbox::nearest_ancestor_inside: dangling symlink");
                    return false;
                }
                Err(_) => continue,
            }
        }
        true
    }
}

/// Hidden directories such as `.git` below the root
fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

/// Normalize a path without touching the filesystem
///
/// `.` is dropped and `..` pops the previous component; popping past the
/// filesystem root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_lexically(Path::new("/a/../../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize_lexically(Path::new("a/b/..")), PathBuf::from("a"));
    }

    #[test]
    fn test_resolve_within_root() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let resolved = sandbox.resolve("src/main.py").unwrap();
        assert!(resolved.as_path().starts_with(sandbox.root()));
        assert!(resolved.as_path().ends_with("src/main.py"));
    }

    #[test]
    fn test_resolve_dot_segments_that_stay_inside() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let resolved = sandbox.resolve("src/../lib/./util.py").unwrap();
        assert_eq!(resolved.as_path(), sandbox.root().join("lib/util.py"));
    }

    #[test]
    fn test_resolve_parent_escape() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let result = sandbox.resolve("../../etc/passwd");
        assert!(matches!(result, Err(SecurityError::PathEscape { .. })));
    }

    #[test]
    fn test_resolve_absolute_escape() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let result = sandbox.resolve("/etc/passwd");
        assert!(matches!(result, Err(SecurityError::PathEscape { .. })));
    }

    #[test]
    fn test_resolve_absolute_inside_root() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();
        let inside = sandbox.root().join("notes.txt");

        assert!(sandbox.resolve(&inside).is_ok());
    }

    #[test]
    fn test_sibling_with_common_prefix_is_rejected() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("proj");
        fs::create_dir(&root).unwrap();
        fs::create_dir(temp.path().join("proj-evil")).unwrap();
        let sandbox = PathSandbox::new(&root).unwrap();

        assert!(sandbox.resolve("../proj-evil/x").is_err());
    }

    #[test]
    fn test_root_itself_resolves() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let resolved = sandbox.resolve(".").unwrap();
        assert_eq!(resolved.as_path(), sandbox.root());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_rejected() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("proj");
        let outside = temp.path().join("outside");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let sandbox = PathSandbox::new(&root).unwrap();
        let result = sandbox.resolve("link/secret.txt");
        assert!(matches!(result, Err(SecurityError::PathEscape { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_allowed() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("alias")).unwrap();

        let sandbox = PathSandbox::new(temp.path()).unwrap();
        assert!(sandbox.resolve("alias/file.txt").is_ok());
    }

    #[test]
    fn test_walk_is_sorted_and_skips_hidden_dirs() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/config"), "x").unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/b.py"), "").unwrap();
        fs::write(temp.path().join("src/a.py"), "").unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let seen: Vec<String> = sandbox
            .walk()
            .map(|(_, path)| sandbox.relative_display(path.as_path()))
            .collect();
        assert_eq!(seen, vec!["src", "src/a.py", "src/b.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_drops_links_leaving_root() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.py"), "token = 1\n").unwrap();
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("main.py"), "").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.py"), temp.path().join("leak.py")).unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("leakdir")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("missing"), temp.path().join("dangling.py")).unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let seen: Vec<String> = sandbox
            .walk()
            .map(|(_, path)| sandbox.relative_display(path.as_path()))
            .collect();
        assert_eq!(seen, vec!["main.py"]);
    }

    #[test]
    fn test_relative_display() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();
        let resolved = sandbox.resolve("pkg/mod.py").unwrap();

        assert_eq!(sandbox.relative_display(resolved.as_path()), "pkg/mod.py");
    }
}
