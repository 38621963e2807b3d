//! Path-identified file/directory handles and the ancestor-chain view.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::spec::FlagTraversalMarker;

/// One traversal occurrence: the entry and its directory marker.
pub type TypeMarkedEntry = (EnumEntry, FlagTraversalMarker);

/// A file or directory handle under traversal/manipulation.
///
/// The handle only remembers its path and kind. Existence is always queried
/// live; [`EnumEntry::refresh`] re-tags the kind when the path now holds the
/// other one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnumEntry {
    File(PathBuf),
    Directory(PathBuf),
}

impl EnumEntry {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self::File(path.into())
    }

    pub fn directory<P: Into<PathBuf>>(path: P) -> Self {
        Self::Directory(path.into())
    }

    /// Build a handle from a raw path, tagged by a live stat.
    ///
    /// Missing paths and symlinks are tagged as files.
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => Self::Directory(path),
            _ => Self::File(path),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Directory(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Self::File(path) | Self::Directory(path) => path,
        }
    }

    /// Basename, lossily converted.
    pub fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Same kind, different path.
    pub fn with_path<P: Into<PathBuf>>(&self, path: P) -> Self {
        match self {
            Self::File(_) => Self::File(path.into()),
            Self::Directory(_) => Self::Directory(path.into()),
        }
    }

    /// Whether something of this handle's kind exists at the path.
    pub fn exists(&self) -> bool {
        match self {
            Self::File(path) => fs::symlink_metadata(path).is_ok_and(|meta| !meta.is_dir()),
            Self::Directory(path) => fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir()),
        }
    }

    /// Re-stat the path; re-tag the handle if its kind changed.
    ///
    /// Returns whether the path exists at all.
    pub fn refresh(&mut self) -> bool {
        let Ok(meta) = fs::symlink_metadata(self.path()) else {
            return false;
        };
        if meta.is_dir() != self.is_directory() {
            let path = std::mem::take(match self {
                Self::File(path) | Self::Directory(path) => path,
            });
            *self = if meta.is_dir() {
                Self::Directory(path)
            } else {
                Self::File(path)
            };
        }
        true
    }

    /// Whether this is a directory with at least one child.
    ///
    /// Files and missing directories have no children.
    pub fn has_children(&self) -> io::Result<bool> {
        let Self::Directory(path) = self else {
            return Ok(false);
        };
        match fs::read_dir(path) {
            Ok(mut iter_entries) => Ok(iter_entries.next().is_some()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn is_read_only(&self) -> io::Result<bool> {
        Ok(fs::symlink_metadata(self.path())?.permissions().readonly())
    }
}

/// Read-only view over the ancestor chain of the entry being visited.
///
/// Index 0 is the traversal root; the last element is the direct parent. The
/// view borrows the engine's stack, so it cannot outlive the callback it was
/// handed to. Use [`ParentalDirectories::to_vec`] to keep a copy.
#[derive(Debug, Clone, Copy)]
pub struct ParentalDirectories<'a> {
    l_dirs: &'a [EnumEntry],
}

impl<'a> ParentalDirectories<'a> {
    pub(crate) fn new(l_dirs: &'a [EnumEntry]) -> Self {
        Self { l_dirs }
    }

    /// Empty chain.
    pub fn none() -> Self {
        Self { l_dirs: &[] }
    }

    pub fn len(&self) -> usize {
        self.l_dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_dirs.is_empty()
    }

    pub fn get(&self, n_level: usize) -> Option<&'a EnumEntry> {
        self.l_dirs.get(n_level)
    }

    /// Traversal root, when the chain is not empty.
    pub fn root(&self) -> Option<&'a EnumEntry> {
        self.l_dirs.first()
    }

    /// Direct parent of the visited entry.
    pub fn parent(&self) -> Option<&'a EnumEntry> {
        self.l_dirs.last()
    }

    /// Only the first `n_level` ancestors.
    pub fn at_level(&self, n_level: usize) -> Self {
        Self {
            l_dirs: &self.l_dirs[..n_level.min(self.l_dirs.len())],
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'a, EnumEntry> {
        self.l_dirs.iter()
    }

    pub fn as_slice(&self) -> &'a [EnumEntry] {
        self.l_dirs
    }

    pub fn to_vec(&self) -> Vec<EnumEntry> {
        self.l_dirs.to_vec()
    }
}

impl<'a> IntoIterator for ParentalDirectories<'a> {
    type Item = &'a EnumEntry;
    type IntoIter = std::slice::Iter<'a, EnumEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.l_dirs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_refresh_retags_kind() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("x");
        std::fs::create_dir(&path).expect("mkdir");

        let mut entry = EnumEntry::file(&path);
        assert!(!entry.exists());
        assert!(entry.refresh());
        assert!(entry.is_directory());
        assert!(entry.exists());

        std::fs::remove_dir(&path).expect("rmdir");
        assert!(!entry.refresh());
        assert!(!entry.exists());
    }

    #[test]
    fn entry_has_children() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = EnumEntry::directory(tmp.path());
        assert!(!dir.has_children().expect("probe"));

        std::fs::write(tmp.path().join("a.txt"), "a").expect("write");
        assert!(dir.has_children().expect("probe"));
        assert!(!EnumEntry::file(tmp.path().join("a.txt")).has_children().expect("probe"));
        assert!(
            !EnumEntry::directory(tmp.path().join("missing"))
                .has_children()
                .expect("probe")
        );
    }

    #[test]
    fn parental_directories_at_level() {
        let l_dirs = vec![
            EnumEntry::directory("/r"),
            EnumEntry::directory("/r/a"),
            EnumEntry::directory("/r/a/b"),
        ];
        let view = ParentalDirectories::new(&l_dirs);
        assert_eq!(view.len(), 3);
        assert_eq!(view.root(), Some(&l_dirs[0]));
        assert_eq!(view.parent(), Some(&l_dirs[2]));

        let view_top = view.at_level(1);
        assert_eq!(view_top.len(), 1);
        assert_eq!(view_top.parent(), Some(&l_dirs[0]));
        assert_eq!(view.at_level(10).len(), 3);
        assert!(ParentalDirectories::none().is_empty());
    }
}
