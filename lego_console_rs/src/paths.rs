//! Remote (hub side) path handling.
//!
//! The hub filesystem is always POSIX-like and rooted at `/`, independent of
//! the host platform, so remote paths are plain strings wrapped in
//! [`RemotePath`] rather than `std::path::Path`.

use std::fmt;

/// Well-known remote locations.
pub const PATH_LOCAL_NAME: &str = "/local_name.txt";
pub const PATH_PROJECTS: &str = "/projects";
pub const PATH_SLOTS: &str = "/projects/.slots";

/// A normalized absolute path on the hub.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalizes `path` (relative paths are taken from `/`).
    pub fn new(path: &str) -> Self {
        normalize_path(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Joins `other` onto this path. An absolute `other` replaces the base.
    pub fn join(&self, other: &str) -> Self {
        if other.starts_with('/') {
            normalize_path(other)
        } else {
            normalize_path(&format!("{}/{}", self.0, other))
        }
    }

    pub fn parent(&self) -> Self {
        match self.0.rfind('/') {
            Some(0) | None => Self::root(),
            Some(idx) => Self(self.0[..idx].to_string()),
        }
    }

    /// Last segment; empty for the root.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Path of `self` relative to `base`, or `None` when `self` is not below it.
    pub fn relative_to(&self, base: &RemotePath) -> Option<String> {
        if self == base {
            return Some(".".to_string());
        }
        if base.is_root() {
            return Some(self.0.trim_start_matches('/').to_string());
        }
        self.0
            .strip_prefix(&base.0)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    pub fn starts_with(&self, base: &RemotePath) -> bool {
        base.is_root() || self == base || self.0.starts_with(&format!("{}/", base.0))
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves `.`, `..` and empty segments against `/`.
///
/// `..` at the root stays at the root.
pub fn normalize_path(path: &str) -> RemotePath {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    RemotePath(format!("/{}", segments.join("/")))
}

/// Remote files and directories that must not be overwritten or removed.
#[derive(Clone, Debug, Default)]
pub struct ProtectedPaths {
    files: Vec<RemotePath>,
    dirs: Vec<RemotePath>,
}

impl ProtectedPaths {
    pub fn new(files: &[String], dirs: &[String]) -> Self {
        Self {
            files: files.iter().map(|f| normalize_path(f)).collect(),
            dirs: dirs.iter().map(|d| normalize_path(d)).collect(),
        }
    }

    pub fn is_protected(&self, path: &RemotePath) -> bool {
        self.files.contains(path) || self.dirs.iter().any(|dir| path.starts_with(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_parent_and_current_segments() {
        assert_eq!(normalize_path("/a/b/../c").as_str(), "/a/c");
        assert_eq!(normalize_path("/a/./b").as_str(), "/a/b");
        assert_eq!(normalize_path("/..").as_str(), "/");
        assert_eq!(normalize_path("").as_str(), "/");
        assert_eq!(normalize_path("a//b/").as_str(), "/a/b");
        assert_eq!(normalize_path("/a/../../b").as_str(), "/b");
    }

    #[test]
    fn join_handles_relative_and_absolute() {
        let cwd = RemotePath::new("/projects");
        assert_eq!(cwd.join("10000").as_str(), "/projects/10000");
        assert_eq!(cwd.join("/flash").as_str(), "/flash");
        assert_eq!(cwd.join("..").as_str(), "/");
        assert_eq!(cwd.join("").as_str(), "/projects");
    }

    #[test]
    fn parent_and_file_name() {
        let path = RemotePath::new("/projects/10000/__init__.py");
        assert_eq!(path.parent().as_str(), "/projects/10000");
        assert_eq!(path.file_name(), "__init__.py");
        assert_eq!(RemotePath::new("/main.py").parent().as_str(), "/");
        assert_eq!(RemotePath::root().file_name(), "");
    }

    #[test]
    fn relative_to_cwd() {
        let root = RemotePath::root();
        let projects = RemotePath::new("/projects");
        let file = RemotePath::new("/projects/a.py");
        assert_eq!(file.relative_to(&root).as_deref(), Some("projects/a.py"));
        assert_eq!(file.relative_to(&projects).as_deref(), Some("a.py"));
        assert_eq!(projects.relative_to(&projects).as_deref(), Some("."));
        assert_eq!(
            RemotePath::new("/projectsx/a").relative_to(&projects),
            None
        );
    }

    #[test]
    fn protected_paths_match_files_and_directory_contents() {
        let protected = ProtectedPaths::new(
            &["/main.py".to_string()],
            &["/runtime".to_string()],
        );
        assert!(protected.is_protected(&RemotePath::new("/main.py")));
        assert!(protected.is_protected(&RemotePath::new("/runtime/x.mpy")));
        assert!(protected.is_protected(&RemotePath::new("/a/../main.py")));
        assert!(!protected.is_protected(&RemotePath::new("/runtimes/x.mpy")));
        assert!(!protected.is_protected(&RemotePath::new("/flash/main.py")));
    }
}
