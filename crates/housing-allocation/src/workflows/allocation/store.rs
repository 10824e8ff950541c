//! Generic per-kind entity store with whole-collection persistence.
//!
//! Every mutating operation runs under the store's single mutex. Multi-store transactions
//! take [`StoreGuard`]s in the fixed order Project, Applicant, Officer, Manager, Request.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, warn};

use super::codec::{parse_line, render_line, CodecError, LineFormat, Record, RecordCodec};
use super::domain::{Applicant, Manager, Officer, Project};
use super::requests::Request;
use super::storage::{MemoryStorage, RecordStorage, StorageError};

/// An entity kind the store can hold.
pub trait Entity: RecordCodec + Clone + Send + Sync + 'static {
    /// Name used in logs, errors, and storage file names.
    const KIND: &'static str;
    /// Prefix for generated identifiers.
    const ID_PREFIX: &'static str;

    fn id(&self) -> &str;
}

impl Entity for Project {
    const KIND: &'static str = "project";
    const ID_PREFIX: &'static str = "P";

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for Applicant {
    const KIND: &'static str = "applicant";
    const ID_PREFIX: &'static str = "A";

    fn id(&self) -> &str {
        self.profile.id.as_str()
    }
}

impl Entity for Officer {
    const KIND: &'static str = "officer";
    const ID_PREFIX: &'static str = "O";

    fn id(&self) -> &str {
        self.profile.id.as_str()
    }
}

impl Entity for Manager {
    const KIND: &'static str = "manager";
    const ID_PREFIX: &'static str = "M";

    fn id(&self) -> &str {
        self.profile.id.as_str()
    }
}

impl Entity for Request {
    const KIND: &'static str = "request";
    const ID_PREFIX: &'static str = "R";

    fn id(&self) -> &str {
        self.header().id.as_str()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: &'static str, id: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{kind} store unavailable: {reason}")]
    Unavailable { kind: &'static str, reason: String },
}

/// Where the records of the last load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Persisted,
    Seed,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub kind: &'static str,
    pub source: LoadSource,
    pub loaded: usize,
    pub skipped: usize,
}

/// In-memory collection of one entity kind, keyed by unique id.
pub struct EntityStore<T> {
    storage: Arc<dyn RecordStorage>,
    format: LineFormat,
    items: Mutex<Vec<T>>,
}

impl<T: Entity> EntityStore<T> {
    pub fn new(storage: Arc<dyn RecordStorage>, format: LineFormat) -> Self {
        Self {
            storage,
            format,
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()), LineFormat::default())
    }

    pub fn storage(&self) -> &Arc<dyn RecordStorage> {
        &self.storage
    }

    /// Take the store's lock for a sequence of operations.
    pub fn lock(&self) -> Result<StoreGuard<'_, T>, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Unavailable {
            kind: T::KIND,
            reason: "lock poisoned".to_string(),
        })?;
        Ok(StoreGuard { store: self, items })
    }

    /// All entities in insertion order.
    pub fn get_all(&self) -> Result<Vec<T>, StoreError> {
        Ok(self.lock()?.items().to_vec())
    }

    pub fn get_by_id(&self, id: &str) -> Result<T, StoreError> {
        self.lock()?.get_by_id(id).cloned()
    }

    pub fn find<F>(&self, predicate: F) -> Result<Vec<T>, StoreError>
    where
        F: Fn(&T) -> bool,
    {
        Ok(self.lock()?.find(predicate))
    }

    pub fn contains(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.contains(id))
    }

    pub fn add(&self, entity: T) -> Result<(), StoreError> {
        self.lock()?.add(entity)
    }

    pub fn update(&self, entity: T) -> Result<(), StoreError> {
        self.lock()?.update(entity)
    }

    pub fn remove(&self, id: &str) -> Result<T, StoreError> {
        self.lock()?.remove(id)
    }

    pub fn next_id(&self) -> Result<String, StoreError> {
        Ok(self.lock()?.next_id())
    }

    /// Allocate the next id and insert the entity built from it under one lock.
    pub fn insert_with_next_id<F>(&self, build: F) -> Result<T, StoreError>
    where
        F: FnOnce(String) -> T,
    {
        let mut guard = self.lock()?;
        let entity = build(guard.next_id());
        guard.add(entity.clone())?;
        Ok(entity)
    }

    /// Replace the collection with whatever the backing location holds.
    pub fn load(&self) -> Result<LoadReport, StoreError> {
        let mut guard = self.lock()?;
        let Some(lines) = self.storage.read_lines()? else {
            guard.items.clear();
            debug!(kind = T::KIND, location = %self.storage.describe(), "no persisted records");
            return Ok(LoadReport {
                kind: T::KIND,
                source: LoadSource::Missing,
                loaded: 0,
                skipped: 0,
            });
        };

        let mut records = Vec::with_capacity(lines.len());
        let mut skipped = 0;
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(record) => records.push(record),
                Err(error) => {
                    skipped += 1;
                    warn!(kind = T::KIND, line = index + 1, %error, "skipping unreadable record line");
                }
            }
        }

        let mut report = guard.replace_from_records(records, LoadSource::Persisted);
        report.skipped += skipped;
        debug!(
            kind = T::KIND,
            loaded = report.loaded,
            skipped = report.skipped,
            "records loaded"
        );
        Ok(report)
    }

    /// Replace the collection from already-split records, e.g. a CSV seed.
    pub fn load_records(&self, records: Vec<Record>) -> Result<LoadReport, StoreError> {
        let mut guard = self.lock()?;
        Ok(guard.replace_from_records(records, LoadSource::Seed))
    }

    /// Re-encode the whole collection and overwrite the backing location.
    pub fn save(&self) -> Result<(), StoreError> {
        self.lock()?.persist()
    }
}

/// Held lock over one store's collection.
pub struct StoreGuard<'a, T> {
    store: &'a EntityStore<T>,
    items: MutexGuard<'a, Vec<T>>,
}

impl<T: Entity> StoreGuard<'_, T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn not_found(id: &str) -> StoreError {
        StoreError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get_by_id(&self, id: &str) -> Result<&T, StoreError> {
        self.position(id)
            .map(|index| &self.items[index])
            .ok_or_else(|| Self::not_found(id))
    }

    pub fn find<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.items
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    pub fn add(&mut self, entity: T) -> Result<(), StoreError> {
        if self.contains(entity.id()) {
            return Err(StoreError::AlreadyExists {
                kind: T::KIND,
                id: entity.id().to_string(),
            });
        }
        self.items.push(entity);
        Ok(())
    }

    pub fn update(&mut self, entity: T) -> Result<(), StoreError> {
        let index = self
            .position(entity.id())
            .ok_or_else(|| Self::not_found(entity.id()))?;
        self.items[index] = entity;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<T, StoreError> {
        let index = self.position(id).ok_or_else(|| Self::not_found(id))?;
        Ok(self.items.remove(index))
    }

    /// `prefix + (max numeric suffix + 1)`, zero padded to three digits.
    ///
    /// Suffixes with no successor in `u64` are ignored.
    pub fn next_id(&self) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|item| item.id().strip_prefix(T::ID_PREFIX))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .filter_map(|suffix| suffix.checked_add(1))
            .max()
            .unwrap_or(1);
        format!("{}{:03}", T::ID_PREFIX, next)
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn restore(&mut self, snapshot: Vec<T>) {
        *self.items = snapshot;
    }

    pub fn persist(&self) -> Result<(), StoreError> {
        let lines: Vec<String> = self
            .items
            .iter()
            .map(|item| render_line(&item.encode(), self.store.format))
            .collect();
        self.store.storage.write_lines(&lines)?;
        debug!(kind = T::KIND, count = lines.len(), "records saved");
        Ok(())
    }

    fn replace_from_records(&mut self, records: Vec<Record>, source: LoadSource) -> LoadReport {
        let mut items: Vec<T> = Vec::with_capacity(records.len());
        let mut skipped = 0;
        for (index, record) in records.iter().enumerate() {
            match decode_unique(record, &items) {
                Ok(entity) => items.push(entity),
                Err(reason) => {
                    skipped += 1;
                    warn!(kind = T::KIND, record = index + 1, %reason, "skipping record");
                }
            }
        }

        let loaded = items.len();
        *self.items = items;
        LoadReport {
            kind: T::KIND,
            source,
            loaded,
            skipped,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RecordRejection {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("duplicate id '{0}'")]
    Duplicate(String),
}

fn decode_unique<T: Entity>(record: &Record, existing: &[T]) -> Result<T, RecordRejection> {
    let entity = T::decode(record)?;
    if existing.iter().any(|item| item.id() == entity.id()) {
        return Err(RecordRejection::Duplicate(entity.id().to_string()));
    }
    Ok(entity)
}
