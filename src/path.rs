// CLASSIFICATION: COMMUNITY
// Filename: path.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-01-18

//! Canonical paths for the HiveFS logical filesystem.
//!
//! A [`Path`] is an immutable component sequence. The string form is the
//! forward-slash-joined components with a leading slash; the root alone is
//! `/`. Colons are reserved for application use and never appear inside a
//! component. All filesystem interfaces exchange paths in this form.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use hivefs_wire::{ErrorKind, RemoteError};

/// Failures produced while building or resolving paths.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// The input string was empty.
    #[error("path is empty")]
    Empty,
    /// The input string did not begin with a forward slash.
    #[error("path must begin with '/'")]
    NotAbsolute,
    /// A colon appeared in the input; it is reserved as a delimiter.
    #[error("colon is reserved and cannot appear in a path")]
    ReservedColon,
    /// A component was empty or contained a delimiter.
    #[error("invalid path component {0:?}")]
    BadComponent(String),
    /// `parent` or `last` was asked of the root path.
    #[error("the root path has no parent or last component")]
    Root,
    /// A local root handed to [`Path::enumerate`] does not exist.
    #[error("local root {0} does not exist")]
    MissingLocalRoot(PathBuf),
    /// A local root handed to [`Path::enumerate`] is not a directory.
    #[error("local root {0} is not a directory")]
    NotADirectory(PathBuf),
    /// The local filesystem failed underneath an enumeration.
    #[error("local enumeration failed")]
    Io(#[from] std::io::Error),
}

impl From<PathError> for RemoteError {
    fn from(err: PathError) -> Self {
        let kind = match &err {
            PathError::MissingLocalRoot(_) => ErrorKind::NotFound,
            PathError::Io(_) => ErrorKind::IoError,
            _ => ErrorKind::InvalidArgument,
        };
        RemoteError::new(kind, err.to_string())
    }
}

/// Immutable canonical path in the logical filesystem.
///
/// Equality, ordering and hashing follow the component sequence, and the
/// `Display` form round-trips through [`Path::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root directory.
    #[must_use]
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Whether this path is the root directory.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Append one component, yielding the child path.
    ///
    /// Fails if `component` is empty or contains a slash or colon.
    pub fn child(&self, component: &str) -> Result<Self, PathError> {
        if component.contains(':') {
            return Err(PathError::ReservedColon);
        }
        if component.is_empty() || component.contains('/') {
            return Err(PathError::BadComponent(component.to_string()));
        }
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Self { components })
    }

    /// The path one level up. Fails on root.
    pub fn parent(&self) -> Result<Self, PathError> {
        if self.is_root() {
            return Err(PathError::Root);
        }
        Ok(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// The final component. Fails on root.
    pub fn last(&self) -> Result<&str, PathError> {
        self.components
            .last()
            .map(String::as_str)
            .ok_or(PathError::Root)
    }

    /// Iterate over the components in order, root first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// Number of components; zero for root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Whether `other` is a component-wise prefix of this path.
    ///
    /// Every path is a subpath of itself, and every path is a subpath of
    /// root. `/abc` is not a subpath of `/a`.
    #[must_use]
    pub fn is_subpath(&self, other: &Self) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }

    /// Resolve this logical path under a local root directory.
    #[must_use]
    pub fn relative_to(&self, root: &std::path::Path) -> PathBuf {
        let mut resolved = root.to_path_buf();
        for component in &self.components {
            resolved.push(component);
        }
        resolved
    }

    /// Enumerate every regular file below `root` as a path relative to it.
    ///
    /// Fails with [`PathError::MissingLocalRoot`] when `root` does not
    /// exist and [`PathError::NotADirectory`] when it is not a directory.
    /// Traversal order is unspecified.
    pub fn enumerate(root: &std::path::Path) -> Result<Vec<Self>, PathError> {
        if !root.exists() {
            return Err(PathError::MissingLocalRoot(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(PathError::NotADirectory(root.to_path_buf()));
        }
        let mut found = Vec::new();
        collect_files(root, &Self::root(), &mut found)?;
        Ok(found)
    }
}

fn collect_files(
    dir: &std::path::Path,
    logical: &Path,
    found: &mut Vec<Path>,
) -> Result<(), PathError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(name) => name,
            // Names outside UTF-8 cannot be expressed as logical paths.
            None => continue,
        };
        let child = match logical.child(name) {
            Ok(child) => child,
            Err(_) => continue,
        };
        let kind = entry.file_type()?;
        if kind.is_dir() {
            collect_files(&entry.path(), &child, found)?;
        } else if kind.is_file() {
            found.push(child);
        }
    }
    Ok(())
}

impl FromStr for Path {
    type Err = PathError;

    /// Parse a slash-delimited path string.
    ///
    /// Empty components collapse, surrounding whitespace is trimmed per
    /// component, and an all-slash string yields the root.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(PathError::NotAbsolute);
        }
        if raw.contains(':') {
            return Err(PathError::ReservedColon);
        }
        let components = raw
            .split('/')
            .map(str::trim)
            .filter(|component| !component.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self { components })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> Path {
        raw.parse().expect("valid path")
    }

    #[test]
    fn parsing_collapses_and_trims() {
        let parsed = path("/a//b/ /c");
        let components: Vec<_> = parsed.components().collect();
        assert_eq!(components, ["a", "b", "c"]);
        assert_eq!(parsed.to_string(), "/a/b/c");
    }

    #[test]
    fn all_slash_input_is_root() {
        assert!(path("///").is_root());
        assert_eq!(path("/").to_string(), "/");
    }

    #[test]
    fn relative_and_colon_inputs_are_rejected() {
        assert!(matches!(Path::from_str("a/b"), Err(PathError::NotAbsolute)));
        assert!(matches!(
            Path::from_str("/a:b"),
            Err(PathError::ReservedColon)
        ));
        assert!(matches!(Path::from_str(""), Err(PathError::Empty)));
    }

    #[test]
    fn child_validates_its_component() {
        let base = path("/srv");
        assert!(base.child("").is_err());
        assert!(base.child("a/b").is_err());
        assert!(base.child("a:b").is_err());
        assert_eq!(base.child("data").unwrap().to_string(), "/srv/data");
    }

    #[test]
    fn parent_and_last_fail_on_root() {
        assert!(Path::root().parent().is_err());
        assert!(Path::root().last().is_err());
        let nested = path("/a/b/c");
        assert_eq!(nested.parent().unwrap(), path("/a/b"));
        assert_eq!(nested.last().unwrap(), "c");
    }

    #[test]
    fn subpath_is_component_prefix_not_substring() {
        assert!(path("/a/b/c").is_subpath(&path("/a/b")));
        assert!(path("/a/b").is_subpath(&path("/a/b")));
        assert!(path("/a/b").is_subpath(&Path::root()));
        assert!(!path("/abc").is_subpath(&path("/a")));
        assert!(!path("/a").is_subpath(&path("/a/b")));
    }

    #[test]
    fn display_round_trips() {
        for raw in ["/", "/x", "/deep/er/still"] {
            let parsed = path(raw);
            assert_eq!(Path::from_str(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn resolves_under_a_local_root() {
        let resolved = path("/a/b").relative_to(std::path::Path::new("/tmp/root"));
        assert_eq!(resolved, PathBuf::from("/tmp/root/a/b"));
    }

    #[test]
    fn enumerate_walks_nested_files() {
        let scratch = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(scratch.path().join("sub/deeper")).unwrap();
        fs::write(scratch.path().join("top"), b"1").unwrap();
        fs::write(scratch.path().join("sub/deeper/leaf"), b"2").unwrap();

        let mut files = Path::enumerate(scratch.path()).expect("enumerate");
        files.sort();
        assert_eq!(files, vec![path("/sub/deeper/leaf"), path("/top")]);
    }

    #[test]
    fn enumerate_rejects_missing_and_non_directory_roots() {
        let scratch = tempfile::tempdir().expect("tempdir");
        let missing = scratch.path().join("absent");
        assert!(matches!(
            Path::enumerate(&missing),
            Err(PathError::MissingLocalRoot(_))
        ));

        let file = scratch.path().join("plain");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            Path::enumerate(&file),
            Err(PathError::NotADirectory(_))
        ));
    }
}
