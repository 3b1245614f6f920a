//! File access capability used by the evaluator
//!
//! Architecture: Ports and Adapters - evaluation reads files through a trait
//! - FsReader reads from disk and folds every read error into "absent"
//! - MemoryReader serves fixed contents for tests and dry runs

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read access to checked files
pub trait FileReader {
    /// Full UTF-8 contents, or `None` when the file is absent or unreadable
    fn read(&self, path: &Path) -> Option<String>;

    /// Whether the file is present
    fn exists(&self, path: &Path) -> bool;
}

/// Reads from the real file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl FileReader for FsReader {
    fn read(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Treating unreadable file {} as missing: {}", path.display(), e);
                None
            }
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory file set
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<PathBuf, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileReader for MemoryReader {
    fn read(&self, path: &Path) -> Option<String> {
        self.files.get(path).cloned()
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_reader_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("main.tf");

        assert!(!FsReader.exists(&path));
        assert_eq!(FsReader.read(&path), None);

        fs::write(&path, "terraform {}\n").unwrap();
        assert!(FsReader.exists(&path));
        assert_eq!(FsReader.read(&path).as_deref(), Some("terraform {}\n"));
    }

    #[test]
    fn test_fs_reader_invalid_utf8_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("s3.tf");
        fs::write(&path, [0xff, 0xfe, b'a', b'w', b's']).unwrap();

        // Present for the existence check, unreadable for presence checks
        assert!(FsReader.exists(&path));
        assert_eq!(FsReader.read(&path), None);
    }

    #[test]
    fn test_memory_reader() {
        let mut reader = MemoryReader::new().with_file("iam/users.tf", "aws_iam_user");
        reader.insert("iam/outputs.tf", "");

        assert!(reader.exists(Path::new("iam/outputs.tf")));
        assert_eq!(reader.read(Path::new("iam/users.tf")).as_deref(), Some("aws_iam_user"));
        assert!(!reader.exists(Path::new("iam/main.tf")));
    }
}
