use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::codec::{LineFormat, Symbol, NULL_SENTINEL};
use super::credentials::{CredentialHasher, DEFAULT_PASSWORD};
use super::domain::{Applicant, ApplicantStatus, Manager, Officer, Project};
use super::requests::Request;
use super::seed::{CsvSeedImporter, SeedImportError};
use super::storage::{FileStorage, RecordStorage};
use super::store::{Entity, EntityStore, LoadReport, LoadSource, StoreError};
use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum StoresOpenError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{kind} seed: {source}")]
    Seed {
        kind: &'static str,
        #[source]
        source: SeedImportError,
    },
}

/// One store per entity kind, shared by the façade and its callers.
#[derive(Clone)]
pub struct AllocationStores {
    pub projects: Arc<EntityStore<Project>>,
    pub applicants: Arc<EntityStore<Applicant>>,
    pub officers: Arc<EntityStore<Officer>>,
    pub managers: Arc<EntityStore<Manager>>,
    pub requests: Arc<EntityStore<Request>>,
}

impl AllocationStores {
    /// Empty stores backed by process memory.
    pub fn in_memory() -> Self {
        Self {
            projects: Arc::new(EntityStore::in_memory()),
            applicants: Arc::new(EntityStore::in_memory()),
            officers: Arc::new(EntityStore::in_memory()),
            managers: Arc::new(EntityStore::in_memory()),
            requests: Arc::new(EntityStore::in_memory()),
        }
    }

    /// Stores over arbitrary backends, e.g. a failing one in tests.
    pub fn with_storage<F>(format: LineFormat, mut storage_for: F) -> Self
    where
        F: FnMut(&'static str) -> Arc<dyn RecordStorage>,
    {
        Self {
            projects: Arc::new(EntityStore::new(storage_for(Project::KIND), format)),
            applicants: Arc::new(EntityStore::new(storage_for(Applicant::KIND), format)),
            officers: Arc::new(EntityStore::new(storage_for(Officer::KIND), format)),
            managers: Arc::new(EntityStore::new(storage_for(Manager::KIND), format)),
            requests: Arc::new(EntityStore::new(storage_for(Request::KIND), format)),
        }
    }

    /// File-backed stores under `config.data_dir`, loaded and seeded.
    ///
    /// A kind with no persisted file is seeded from `<seed_dir>/<kind>.csv` when present,
    /// then written out so later runs read the persisted copy.
    pub fn open(
        config: &StorageConfig,
        hasher: &dyn CredentialHasher,
    ) -> Result<(Self, Vec<LoadReport>), StoresOpenError> {
        let stores = Self::with_storage(config.record_format, |kind| {
            Arc::new(FileStorage::in_dir(&config.data_dir, kind)) as Arc<dyn RecordStorage>
        });

        let seed_dir = config.seed_dir.as_deref();
        let reports = vec![
            load_or_seed(&stores.projects, seed_dir, CsvSeedImporter::new())?,
            load_or_seed(&stores.applicants, seed_dir, applicant_seed(hasher))?,
            load_or_seed(&stores.officers, seed_dir, account_seed(hasher, "projects_in_charge"))?,
            load_or_seed(&stores.managers, seed_dir, account_seed(hasher, "managed_projects"))?,
            load_or_seed(&stores.requests, seed_dir, CsvSeedImporter::new())?,
        ];

        for report in &reports {
            info!(
                kind = report.kind,
                source = ?report.source,
                loaded = report.loaded,
                skipped = report.skipped,
                "store ready"
            );
        }
        Ok((stores, reports))
    }

    /// Re-read every kind from its backing location.
    pub fn reload(&self) -> Result<Vec<LoadReport>, StoreError> {
        Ok(vec![
            self.projects.load()?,
            self.applicants.load()?,
            self.officers.load()?,
            self.managers.load()?,
            self.requests.load()?,
        ])
    }
}

fn load_or_seed<T: Entity>(
    store: &EntityStore<T>,
    seed_dir: Option<&Path>,
    importer: CsvSeedImporter,
) -> Result<LoadReport, StoresOpenError> {
    let report = store.load()?;
    if report.source != LoadSource::Missing {
        return Ok(report);
    }

    let Some(seed_path) = seed_dir
        .map(|dir| dir.join(format!("{}.csv", T::KIND)))
        .filter(|path| path.is_file())
    else {
        return Ok(report);
    };

    let seed = importer
        .from_path(&seed_path)
        .map_err(|source| StoresOpenError::Seed {
            kind: T::KIND,
            source,
        })?;
    let mut report = store.load_records(seed.records)?;
    report.skipped += seed.skipped;
    store.save()?;
    Ok(report)
}

fn account_seed(hasher: &dyn CredentialHasher, list_key: &str) -> CsvSeedImporter {
    CsvSeedImporter::new()
        .with_default("password_hash", hasher.hash(DEFAULT_PASSWORD))
        .with_default(list_key, "")
}

fn applicant_seed(hasher: &dyn CredentialHasher) -> CsvSeedImporter {
    CsvSeedImporter::new()
        .with_default("password_hash", hasher.hash(DEFAULT_PASSWORD))
        .with_default("status", ApplicantStatus::NoRegistration.symbol())
        .with_default("project_id", NULL_SENTINEL)
        .with_default("room_type", NULL_SENTINEL)
        .nullable("project_id")
        .nullable("room_type")
}
