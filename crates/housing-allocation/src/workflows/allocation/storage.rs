use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Backing location for one entity kind, addressed as whole lines.
pub trait RecordStorage: Send + Sync {
    /// `Ok(None)` when nothing has ever been written to the location.
    fn read_lines(&self) -> Result<Option<Vec<String>>, StorageError>;
    /// Replace the full contents of the location.
    fn write_lines(&self, lines: &[String]) -> Result<(), StorageError>;
    fn describe(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: io::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// One text file per entity kind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<kind>.txt`
    pub fn in_dir(dir: impl AsRef<Path>, kind: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{kind}.txt")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            location: self.path.display().to_string(),
            source,
        }
    }
}

impl RecordStorage for FileStorage {
    fn read_lines(&self) -> Result<Option<Vec<String>>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents.lines().map(str::to_string).collect())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }

        // Staged beside the target; the rename swaps contents in one step.
        let staging = self.path.with_extension("txt.tmp");
        let mut file = fs::File::create(&staging).map_err(|err| self.io_error(err))?;
        for line in lines {
            writeln!(file, "{line}").map_err(|err| self.io_error(err))?;
        }
        file.sync_all().map_err(|err| self.io_error(err))?;
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process storage for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    lines: Mutex<Option<Vec<String>>>,
}

impl MemoryStorage {
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Mutex::new(Some(lines.into_iter().map(Into::into).collect())),
        }
    }

    pub fn lines(&self) -> Option<Vec<String>> {
        self.lines.lock().ok().and_then(|guard| guard.clone())
    }
}

impl RecordStorage for MemoryStorage {
    fn read_lines(&self) -> Result<Option<Vec<String>>, StorageError> {
        let guard = self
            .lines
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), StorageError> {
        let mut guard = self
            .lines
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))?;
        *guard = Some(lines.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_reports_missing_location_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::in_dir(dir.path(), "project");
        assert!(storage.read_lines().expect("read succeeds").is_none());
    }

    #[test]
    fn file_storage_overwrites_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::in_dir(dir.path().join("nested"), "project");

        storage
            .write_lines(&["a=1".to_string(), "a=2".to_string()])
            .expect("first write");
        storage
            .write_lines(&["a=3".to_string()])
            .expect("second write");

        let lines = storage.read_lines().expect("read").expect("present");
        assert_eq!(lines, vec!["a=3".to_string()]);
        assert!(!storage.path().with_extension("txt.tmp").exists());
    }

    #[test]
    fn memory_storage_starts_empty() {
        let storage = MemoryStorage::default();
        assert!(storage.read_lines().expect("read").is_none());
        storage.write_lines(&[]).expect("write");
        assert_eq!(storage.read_lines().expect("read"), Some(Vec::new()));
    }
}
