use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{DatasetError, Result};

/// Opaque reference to a stored file.
///
/// Stored files are never modified: replacing a dataset's contents means
/// putting a new file and swapping the handle the dataset points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle(String);

impl FileHandle {
    /// Wraps a handle previously returned by a store (e.g. read back from the
    /// database).
    pub fn from_stored(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage capability for uploaded dataset files.
///
/// Methods are blocking; async callers run them on the blocking pool together
/// with their database work.
pub trait FileStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<FileHandle>;

    fn open(&self, handle: &FileHandle) -> Result<Box<dyn Read + Send>>;

    fn delete(&self, handle: &FileHandle) -> Result<()>;

    fn read(&self, handle: &FileHandle) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(handle)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Flat directory of files named `{uuid}.csv`.
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!("Dataset storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path for a handle. Only handles of the form `{uuid}.csv` are accepted,
    /// so a handle can never point outside the storage directory.
    fn file_path(&self, handle: &FileHandle) -> Result<PathBuf> {
        let stem = handle
            .as_str()
            .strip_suffix(".csv")
            .ok_or_else(|| DatasetError::InvalidHandle(handle.to_string()))?;
        stem.parse::<Uuid>()
            .map_err(|_| DatasetError::InvalidHandle(handle.to_string()))?;
        Ok(self.dir.join(handle.as_str()))
    }
}

impl FileStore for DiskStore {
    fn put(&self, bytes: &[u8]) -> Result<FileHandle> {
        let handle = FileHandle(format!("{}.csv", Uuid::new_v4()));
        let path = self.file_path(&handle)?;

        // Write beside the final path, then rename into place.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| DatasetError::Io(e.error))?;

        debug!("Stored {} bytes as {}", bytes.len(), handle);
        Ok(handle)
    }

    fn open(&self, handle: &FileHandle) -> Result<Box<dyn Read + Send>> {
        let path = self.file_path(handle)?;
        let file = fs::File::open(&path)?;
        Ok(Box::new(file))
    }

    fn delete(&self, handle: &FileHandle) -> Result<()> {
        let path = self.file_path(handle)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted stored file {}", handle);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} already gone", handle);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path()).unwrap();

        let handle = store.put(b"a,b\n1,2\n").unwrap();
        assert!(handle.as_str().ends_with(".csv"));
        assert_eq!(store.read(&handle).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn every_put_gets_a_fresh_handle() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path()).unwrap();

        let first = store.put(b"x\n").unwrap();
        let second = store.put(b"y\n").unwrap();
        assert_ne!(first, second);
        assert_eq!(store.read(&first).unwrap(), b"x\n");
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path()).unwrap();

        let handle = store.put(b"x\n").unwrap();
        store.delete(&handle).unwrap();
        store.delete(&handle).unwrap();
        assert!(matches!(store.read(&handle), Err(DatasetError::Io(_))));
    }

    #[test]
    fn rejects_handles_outside_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path()).unwrap();

        for bad in ["../etc/passwd", "notes.txt", "../x.csv"] {
            let handle = FileHandle::from_stored(bad);
            assert!(matches!(store.open(&handle), Err(DatasetError::InvalidHandle(_))), "{bad}");
        }
    }
}
