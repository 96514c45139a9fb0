use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
    #[error("record {0} not found")]
    NotFound(u64),
    #[error("no ids left after {0}")]
    IdExhausted(u64),
}

/// A record addressable by a numeric id.
pub trait Keyed {
    fn id(&self) -> u64;
}

/// Append-style store of JSON records, one per line.
///
/// Reads tolerate damaged lines (they are skipped with a warning). Writes
/// are serialized through an in-process lock and always replace the whole
/// file atomically.
pub struct JsonLineStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonLineStore<T>
where
    T: Keyed + Serialize + DeserializeOwned,
{
    /// Open (creating parent directories if needed) the store at `path`.
    /// The file itself is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        tracing::debug!(path = %path.display(), "opened item store");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<Vec<T>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io { path: self.path.clone(), source });
            }
        };

        let mut records = Vec::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = n + 1,
                    error = %e,
                    "skipping unparsable record"
                ),
            }
        }
        Ok(records)
    }

    pub fn get(&self, id: u64) -> Result<Option<T>, StoreError> {
        Ok(self.read_all()?.into_iter().find(|r| r.id() == id))
    }

    pub fn exists(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.get(id)?.is_some())
    }

    /// One past the largest id in the store (1 for an empty store).
    pub fn next_id(&self) -> Result<u64, StoreError> {
        next_id_of(&self.read_all()?)
    }

    /// Allocate the next id and insert the record built for it, atomically
    /// with respect to other writers on this store.
    pub fn insert_with(&self, build: impl FnOnce(u64) -> T) -> Result<T, StoreError>
    where
        T: Clone,
    {
        let _guard = self.lock();
        let mut records = self.read_all()?;
        let id = next_id_of(&records)?;
        let record = build(id);
        records.push(record.clone());
        self.write_all(&records)?;
        tracing::info!(id, "inserted record");
        Ok(record)
    }

    /// Replace the record with the same id, or append it.
    pub fn upsert(&self, record: T) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut records = self.read_all()?;
        let id = record.id();
        match records.iter().position(|r| r.id() == id) {
            Some(pos) => records[pos] = record,
            None => records.push(record),
        }
        self.write_all(&records)?;
        tracing::info!(id, "upserted record");
        Ok(())
    }

    /// Read-modify-write one record under the writer lock.
    pub fn update(&self, id: u64, change: impl FnOnce(&mut T)) -> Result<(), StoreError> {
        let _guard = self.lock();
        let mut records = self.read_all()?;
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(StoreError::NotFound(id))?;
        change(record);
        self.write_all(&records)?;
        tracing::info!(id, "updated record");
        Ok(())
    }

    /// Remove a record. Returns whether it existed.
    pub fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let _guard = self.lock();
        let mut records = self.read_all()?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records)?;
        tracing::info!(id, "deleted record");
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (); a panic mid-write cannot leave it inconsistent.
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_all(&self, records: &[T]) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |source: std::io::Error| StoreError::Io { path: self.path.clone(), source };

        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut out = BufWriter::new(tmp.as_file());
            for record in records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n").map_err(io_err)?;
            }
            out.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "store rewritten");
        Ok(())
    }
}

fn next_id_of<T: Keyed>(records: &[T]) -> Result<u64, StoreError> {
    match records.iter().map(Keyed::id).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or(StoreError::IdExhausted(max)),
    }
}
