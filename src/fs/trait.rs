//! FileSystem trait definition

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Dot-prefixed entries such as `.git` or `.cache`
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Read-only view of the repository checkout
pub trait FileSystem: Send + Sync {
    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// List the immediate children of a directory
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        (**self).read_to_string(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        (**self).read_dir(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_entry_hidden() {
        let entry = DirEntry {
            path: PathBuf::from("/repo/base-images/.cache"),
            name: ".cache".to_string(),
            kind: EntryKind::Directory,
        };
        assert!(entry.is_hidden());
        assert!(entry.is_dir());
        assert_eq!(entry.file_name(), ".cache");
    }

    #[test]
    fn test_dir_entry_visible_file() {
        let entry = DirEntry {
            path: PathBuf::from("/repo/base-images/README.md"),
            name: "README.md".to_string(),
            kind: EntryKind::File,
        };
        assert!(!entry.is_hidden());
        assert!(!entry.is_dir());
        assert_eq!(entry.path(), Path::new("/repo/base-images/README.md"));
    }
}
