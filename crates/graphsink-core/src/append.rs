//! # Concurrent Append-File Writer
//!
//! Format-agnostic durable append, serialized per file path.
//!
//! A [`LockRegistry`] holds one mutex per canonical file path, created on
//! first use and kept for the registry's lifetime (the set of paths is
//! bounded by the labels and edge types of one job). Unrelated files append
//! in parallel; appends to the same file never interleave.
//!
//! Under the lock the file is opened (created if absent), checked for
//! emptiness, handed to the caller's render closure, and the complete
//! payload is appended with one write followed by `sync_all`. The payload is
//! rendered in memory before anything touches the file, so a failure leaves
//! the file as it was.
//!
//! The opened file is also held under an exclusive OS advisory lock
//! (`File::lock`) until the write is synced, so a second graphsink process
//! appending to the same directory waits its turn. The in-process mutex is
//! always taken first.

use crate::GraphSinkError;
use dashmap::DashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// View of the locked file offered to a render closure.
pub struct AppendTarget<'a> {
    /// Whether the file had no bytes before this append.
    pub was_empty: bool,
    file: &'a mut File,
}

impl AppendTarget<'_> {
    /// Read the first line of the existing file, without its line ending.
    ///
    /// Returns `None` for an empty file.
    pub fn leading_line(&mut self) -> std::io::Result<Option<String>> {
        if self.was_empty {
            return Ok(None);
        }
        self.file.seek(SeekFrom::Start(0))?;
        let mut line = String::new();
        BufReader::new(&mut *self.file).read_line(&mut line)?;
        let trimmed = line.trim_end_matches(['\n', '\r']);
        Ok(Some(trimmed.to_string()))
    }
}

/// Outcome of one locked append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Canonical path that was written.
    pub path: PathBuf,
    /// Bytes appended (zero when the render closure produced nothing).
    pub bytes: usize,
    /// Whether the file was empty before the append.
    pub was_empty: bool,
}

/// Process-wide table of per-path locks.
///
/// Writers share one registry through `Arc` so that two writers targeting
/// the same directory also serialize on the same files.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct paths seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Get or create the lock for a canonical path.
    ///
    /// `entry` holds the shard lock, so two threads racing on a new path get
    /// the same mutex.
    fn lock_for(&self, key: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Append the bytes produced by `render` to `path` under the path's lock.
    ///
    /// An empty payload is not written. Any I/O failure surfaces as
    /// [`GraphSinkError::Append`] for this call; the lock is released when
    /// the guard drops, whatever the outcome.
    pub fn append_locked<F>(&self, path: &Path, render: F) -> Result<AppendOutcome, GraphSinkError>
    where
        F: FnOnce(&mut AppendTarget<'_>) -> Result<Vec<u8>, GraphSinkError>,
    {
        let key = canonical_key(path)?;
        let lock = self.lock_for(&key);
        // The mutex guards no data, so a poisoned lock is still usable.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let append_err = |source| GraphSinkError::Append {
            path: key.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&key)
            .map_err(append_err)?;
        file.lock().map_err(append_err)?;
        let was_empty = file.metadata().map_err(append_err)?.len() == 0;

        let payload = {
            let mut target = AppendTarget {
                was_empty,
                file: &mut file,
            };
            render(&mut target)?
        };

        if !payload.is_empty() {
            file.seek(SeekFrom::End(0)).map_err(append_err)?;
            file.write_all(&payload).map_err(append_err)?;
            file.sync_all().map_err(append_err)?;
        }

        tracing::debug!(path = %key.display(), bytes = payload.len(), was_empty, "appended");

        Ok(AppendOutcome {
            path: key,
            bytes: payload.len(),
            was_empty,
        })
    }

    /// Replace the whole content of `path` under the path's lock.
    ///
    /// Used for generated scripts, which are regenerated on every write call.
    pub fn replace_locked(&self, path: &Path, content: &[u8]) -> Result<PathBuf, GraphSinkError> {
        let key = canonical_key(path)?;
        let lock = self.lock_for(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let append_err = |source| GraphSinkError::Append {
            path: key.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&key)
            .map_err(append_err)?;
        file.lock().map_err(append_err)?;
        file.set_len(0).map_err(append_err)?;
        file.write_all(content).map_err(append_err)?;
        file.sync_all().map_err(append_err)?;

        Ok(key)
    }
}

/// Canonical lock key for a file that may not exist yet.
///
/// The parent directory is canonicalized (resolving `..` and symlinks) and
/// the file name re-attached, so every spelling of one file shares a lock.
pub fn canonical_key(path: &Path) -> Result<PathBuf, GraphSinkError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| GraphSinkError::Append {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let canonical_parent = parent.canonicalize().map_err(|source| GraphSinkError::Append {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(canonical_parent.join(file_name))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn first_append_sees_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        let registry = LockRegistry::new();

        let first = registry
            .append_locked(&path, |t| Ok(format!("empty={}\n", t.was_empty).into_bytes()))
            .expect("append");
        let second = registry
            .append_locked(&path, |t| Ok(format!("empty={}\n", t.was_empty).into_bytes()))
            .expect("append");

        assert!(first.was_empty);
        assert!(!second.was_empty);
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content, "empty=true\nempty=false\n");
    }

    #[test]
    fn spellings_of_one_path_share_a_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        let registry = LockRegistry::new();

        registry
            .append_locked(&dir.path().join("x.csv"), |_| Ok(b"1\n".to_vec()))
            .expect("append");
        registry
            .append_locked(&dir.path().join("sub/../x.csv"), |_| Ok(b"2\n".to_vec()))
            .expect("append");

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn leading_line_reads_existing_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("h.csv");
        std::fs::write(&path, "id|name\r\n1|a\n").expect("seed");
        let registry = LockRegistry::new();

        let mut header = None;
        registry
            .append_locked(&path, |t| {
                header = t.leading_line().expect("read");
                Ok(b"2|b\n".to_vec())
            })
            .expect("append");

        assert_eq!(header.as_deref(), Some("id|name"));
        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.ends_with("1|a\n2|b\n"));
    }

    #[test]
    fn render_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "keep\n").expect("seed");
        let registry = LockRegistry::new();

        let result = registry.append_locked(&path, |_| {
            Err(GraphSinkError::InvalidRecord("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "keep\n");

        // The lock was released: a later append proceeds.
        registry
            .append_locked(&path, |_| Ok(b"next\n".to_vec()))
            .expect("append");
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("c.txt");
        let registry = LockRegistry::new();
        let line = "x".repeat(4096);

        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    registry
                        .append_locked(&path, |_| Ok(format!("{line}\n").into_bytes()))
                        .expect("append");
                });
            }
        });

        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content.lines().count(), 16);
        assert!(content.lines().all(|l| l == line));
    }

    #[test]
    fn file_is_os_locked_while_rendering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("l.txt");
        let registry = LockRegistry::new();

        registry
            .append_locked(&path, |_| {
                let other = File::open(&path).expect("open");
                assert!(matches!(other.try_lock(), Err(std::fs::TryLockError::WouldBlock)));
                Ok(b"x\n".to_vec())
            })
            .expect("append");

        // Released once the append returns.
        let other = File::open(&path).expect("open");
        assert!(other.try_lock().is_ok());
    }

    #[test]
    fn missing_parent_is_an_append_error() {
        let registry = LockRegistry::new();
        let result = registry.append_locked(Path::new("/nonexistent-dir-xyz/f.txt"), |_| Ok(vec![]));
        assert!(matches!(result, Err(GraphSinkError::Append { .. })));
    }

    #[test]
    fn replace_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("s.cypher");
        let registry = LockRegistry::new();

        registry.replace_locked(&path, b"old old old").expect("replace");
        registry.replace_locked(&path, b"new").expect("replace");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");
    }
}
