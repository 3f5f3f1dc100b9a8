//! Durable append-only JSONL storage.
//!
//! Implements: REQ-STORE-001
//!
//! One directory, many append-only files. Backs the audit ledger, the permit
//! log, notarization receipts, and notifications. The store itself makes no
//! atomicity promise beyond a single appended line; callers that need a
//! read-compute-append critical section (the ledger) serialize around it.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Errors from the JSONL store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O failed at '{path}': {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Record could not be serialized to JSON.
    #[error("record serialization failed: {source}")]
    Serialize {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Append-only JSONL file store rooted at a data directory.
///
/// Implements: REQ-STORE-001
#[derive(Debug)]
pub struct JsonlStore {
    base_dir: PathBuf,
}

impl JsonlStore {
    /// Opens (creating if necessary) a store rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|source| StorageError::Io {
            path: base_dir.clone(),
            source,
        })?;
        Ok(Self { base_dir })
    }

    /// Returns the store's base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the full path of a named file in the store.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Appends one record as a single JSON line.
    pub fn append_line<T: Serialize>(&self, name: &str, record: &T) -> Result<(), StorageError> {
        let line = serde_json::to_string(record)
            .map_err(|source| StorageError::Serialize { source })?;
        let path = self.path(name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| StorageError::Io { path, source })
    }

    /// Reads all lines of a named file. A missing file reads as empty.
    pub fn read_all_lines(&self, name: &str) -> Result<Vec<String>, StorageError> {
        let path = self.path(name);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        let reader = BufReader::new(file);
        reader
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StorageError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_and_read_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonlStore::open(dir.path()).expect("open");

        store.append_line("events.jsonl", &json!({"n": 1})).unwrap();
        store.append_line("events.jsonl", &json!({"n": 2})).unwrap();

        let lines = store.read_all_lines("events.jsonl").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"n":1}"#);
        assert_eq!(lines[1], r#"{"n":2}"#);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonlStore::open(dir.path()).expect("open");
        assert!(store.read_all_lines("absent.jsonl").unwrap().is_empty());
    }

    #[test]
    fn open_creates_nested_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a/b");
        let store = JsonlStore::open(&nested).expect("open");
        assert_eq!(store.base_dir(), nested.as_path());
        assert!(nested.is_dir());
    }
}
