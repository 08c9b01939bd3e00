use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Marker file recording a resource's split key, written once at creation.
pub const SPLIT_KEY_FILE: &str = ".splitby";

/// Suffix of the zero-byte marker signaling a shard file has been indexed.
pub const MARKER_SUFFIX: &str = ".indexed";

/// The storage port: a hierarchical backend holding resource folders, shard
/// files and index markers. Paths are relative, `/`-separated strings.
///
/// `write_file` must provide atomic replace-on-write: a failed write leaves
/// any prior contents of the target untouched.
pub trait StorageBackend: Send + Sync {
    fn create_folder(&self, path: &str) -> Result<()>;

    /// List the entry names directly under `path` (names, not joined paths).
    fn list_folder(&self, path: &str) -> Result<Vec<String>>;

    fn path_exists(&self, path: &str) -> Result<bool>;

    fn remove_path(&self, path: &str, recursive: bool) -> Result<()>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Atomically overwrite `path` with `bytes`.
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Create a zero-byte marker object at `path`.
    fn touch_marker(&self, path: &str) -> Result<()>;

    fn remove_file(&self, path: &str) -> Result<()>;
}

/// `std::fs`-backed storage rooted at a data directory.
///
/// Atomicity comes from writing to a temp file in the target's directory and
/// renaming over the destination, since plain filesystem writes offer no
/// atomic overwrite.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut abs = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            abs.push(segment);
        }
        abs
    }
}

impl StorageBackend for LocalStorage {
    fn create_folder(&self, path: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(path))?;
        Ok(())
    }

    fn list_folder(&self, path: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    fn path_exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn remove_path(&self, path: &str, recursive: bool) -> Result<()> {
        let abs = self.resolve(path);
        if abs.is_dir() {
            if recursive {
                fs::remove_dir_all(abs)?;
            } else {
                fs::remove_dir(abs)?;
            }
        } else {
            fs::remove_file(abs)?;
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path))?)
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<()> {
        use std::io::Write;

        let abs = self.resolve(path);
        let dir = abs.parent().unwrap_or(&self.root);

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&abs).map_err(|e| e.error)?;
        Ok(())
    }

    fn touch_marker(&self, path: &str) -> Result<()> {
        fs::write(self.resolve(path), b"")?;
        Ok(())
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        fs::remove_file(self.resolve(path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalStorage) {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        (tmp, storage)
    }

    #[test]
    fn test_create_and_list_folder() {
        let (_tmp, storage) = setup();
        storage.create_folder("sales").unwrap();
        storage.write_file("sales/sales-east", b"x\n").unwrap();
        storage.write_file("sales/sales-west", b"y\n").unwrap();

        let names = storage.list_folder("sales").unwrap();
        assert_eq!(names, vec!["sales-east".to_string(), "sales-west".to_string()]);
    }

    #[test]
    fn test_write_overwrites() {
        let (_tmp, storage) = setup();
        storage.create_folder("sales").unwrap();
        storage.write_file("sales/sales-east", b"first\n").unwrap();
        storage.write_file("sales/sales-east", b"second\n").unwrap();

        let body = storage.read_file("sales/sales-east").unwrap();
        assert_eq!(body, b"second\n");
    }

    #[test]
    fn test_marker_lifecycle() {
        let (_tmp, storage) = setup();
        storage.create_folder("sales").unwrap();

        let marker = "sales/sales-east.indexed";
        assert!(!storage.path_exists(marker).unwrap());

        storage.touch_marker(marker).unwrap();
        assert!(storage.path_exists(marker).unwrap());
        assert_eq!(storage.read_file(marker).unwrap(), b"");

        storage.remove_file(marker).unwrap();
        assert!(!storage.path_exists(marker).unwrap());
    }

    #[test]
    fn test_remove_path_recursive() {
        let (_tmp, storage) = setup();
        storage.create_folder("sales").unwrap();
        storage.write_file("sales/sales-east", b"x\n").unwrap();

        storage.remove_path("sales", true).unwrap();
        assert!(!storage.path_exists("sales").unwrap());
    }

    #[test]
    fn test_read_missing_file_errors() {
        let (_tmp, storage) = setup();
        assert!(storage.read_file("nope/missing").is_err());
    }
}
