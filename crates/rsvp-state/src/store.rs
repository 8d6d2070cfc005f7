//! RecordStore — a JSON-array file guarded by one lock.
//!
//! Every operation is a whole-file read-modify-write performed while
//! holding the store's mutex, so operations on one store are serialized
//! against each other. Operations on different stores are independent.
//! The file is rewritten in full on every mutation; a crash in the middle
//! of a write can leave it truncated, which the next load reports as
//! [`StateError::Corrupt`].

use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};

/// Convert any `Display` error into a `StateError` variant, prefixed with
/// the store path.
macro_rules! map_err {
    ($variant:ident, $path:expr) => {
        |e| StateError::$variant(format!("{}: {e}", $path.display()))
    };
}

/// Outcome of [`RecordStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Replaced,
}

struct Inner {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Concurrency-safe store of `T` records backed by a single JSON file.
///
/// Cloning is cheap and clones share the same file and lock.
pub struct RecordStore<T> {
    inner: Arc<Inner>,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _records: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for RecordStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("path", &self.inner.path)
            .finish()
    }
}

impl<T> RecordStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Bind a store to `path`. Nothing is read or created until the first
    /// operation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Read every record. A missing file is an empty store.
    pub fn load(&self) -> StateResult<Vec<T>> {
        let _guard = self.lock();
        self.read_records()
    }

    /// Load once and discard the result; used at startup to surface a
    /// corrupt file before serving traffic.
    pub fn verify(&self) -> StateResult<usize> {
        self.load().map(|records| records.len())
    }

    /// Append one record.
    pub fn append(&self, record: T) -> StateResult<()> {
        self.mutate(|records| {
            records.push(record);
            (true, ())
        })
    }

    /// Append each record whose key is not already present, with a single
    /// write. Returns how many were added.
    pub fn extend_distinct<K, F>(&self, batch: Vec<T>, key_of: F) -> StateResult<usize>
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        self.mutate(|records| {
            let mut seen: HashSet<K> = records.iter().map(&key_of).collect();
            let before = records.len();
            for record in batch {
                if seen.insert(key_of(&record)) {
                    records.push(record);
                }
            }
            let added = records.len() - before;
            (added > 0, added)
        })
    }

    /// Replace the first record whose key equals `record`'s key, or append.
    ///
    /// A `None` key never matches anything, including another `None`.
    pub fn upsert<K, F>(&self, record: T, key_of: F) -> StateResult<Upserted>
    where
        K: PartialEq,
        F: Fn(&T) -> Option<K>,
    {
        let key = key_of(&record);
        self.mutate(|records| {
            let existing = key.as_ref().and_then(|key| {
                records
                    .iter()
                    .position(|r| key_of(r).as_ref() == Some(key))
            });
            match existing {
                Some(index) => {
                    records[index] = record;
                    (true, Upserted::Replaced)
                }
                None => {
                    records.push(record);
                    (true, Upserted::Inserted)
                }
            }
        })
    }

    /// First record matching `pred`.
    pub fn find<P>(&self, pred: P) -> StateResult<Option<T>>
    where
        P: Fn(&T) -> bool,
    {
        Ok(self.load()?.into_iter().find(|r| pred(r)))
    }

    /// Keep only records matching `keep`. Returns the number removed; the
    /// file is rewritten only when something was removed.
    pub fn retain<P>(&self, keep: P) -> StateResult<usize>
    where
        P: Fn(&T) -> bool,
    {
        self.mutate(|records| {
            let before = records.len();
            records.retain(|r| keep(r));
            let removed = before - records.len();
            (removed > 0, removed)
        })
    }

    // ── internals ──────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is the file, not the unit value, so a panic in
        // another holder leaves nothing inconsistent in memory.
        self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load, apply `f`, and persist when `f` reports a change.
    fn mutate<R, F>(&self, f: F) -> StateResult<R>
    where
        F: FnOnce(&mut Vec<T>) -> (bool, R),
    {
        let _guard = self.lock();
        let mut records = self.read_records()?;
        let (changed, out) = f(&mut records);
        if changed {
            self.write_records(&records)?;
        }
        Ok(out)
    }

    fn read_records(&self) -> StateResult<Vec<T>> {
        let path = &self.inner.path;
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StateError::Read(format!("{}: {e}", path.display()))),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        // `null` is what an empty list marshals to in older files.
        let records: Option<Vec<T>> =
            serde_json::from_slice(&data).map_err(map_err!(Corrupt, path))?;
        Ok(records.unwrap_or_default())
    }

    fn write_records(&self, records: &[T]) -> StateResult<()> {
        let path = &self.inner.path;
        let data = serde_json::to_vec_pretty(records).map_err(map_err!(Serialize, path))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(map_err!(Write, dir))?;
        }
        fs::write(path, data).map_err(map_err!(Write, path))?;
        debug!(path = %path.display(), records = records.len(), "store persisted");
        Ok(())
    }
}
