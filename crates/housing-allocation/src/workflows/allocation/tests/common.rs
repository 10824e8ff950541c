use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::allocation::credentials::{CredentialHasher, Sha256Hasher};
use crate::workflows::allocation::domain::{
    Applicant, FlatInventory, Manager, MaritalStatus, Officer, Project, ProjectId, UserId,
    UserProfile,
};
use crate::workflows::allocation::storage::{MemoryStorage, RecordStorage, StorageError};
use crate::workflows::allocation::{AllocationService, AllocationStores, LineFormat};

pub(super) const PASSWORD: &str = "password";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Inside the P001 application window.
pub(super) fn today() -> NaiveDate {
    date(2025, 3, 1)
}

pub(super) fn profile(id: &str, age: u8, marital_status: MaritalStatus) -> UserProfile {
    UserProfile {
        id: UserId::from(id),
        name: format!("User {id}"),
        age,
        marital_status,
        password_hash: Sha256Hasher.hash(PASSWORD),
    }
}

/// Two 2-room flats, one 3-room flat, open through the first half of 2025.
pub(super) fn project_p001() -> Project {
    Project {
        id: ProjectId::from("P001"),
        name: "Acacia Breeze".to_string(),
        neighborhood: "Yishun".to_string(),
        visible: true,
        open_date: date(2025, 1, 1),
        close_date: date(2025, 6, 30),
        two_room: FlatInventory::new(350_000, 2),
        three_room: FlatInventory::new(450_000, 1),
        manager_id: UserId::from("M001"),
        officer_slots: 3,
        officers: Vec::new(),
    }
}

pub(super) fn applicant(id: &str, age: u8, marital_status: MaritalStatus) -> Applicant {
    Applicant::new(profile(id, age, marital_status))
}

/// In-memory service holding P001, applicants A1 (40, single), A2 (30, single),
/// A3 (29, married), officer O1, and manager M001.
pub(super) fn seeded_service() -> AllocationService {
    let stores = AllocationStores::in_memory();
    seed(&stores);
    AllocationService::new(stores)
}

pub(super) fn seed(stores: &AllocationStores) {
    let mut manager = Manager::new(profile("M001", 45, MaritalStatus::Married));
    manager.managed_projects.push(ProjectId::from("P001"));

    stores.projects.add(project_p001()).expect("seed project");
    for applicant in [
        applicant("A1", 40, MaritalStatus::Single),
        applicant("A2", 30, MaritalStatus::Single),
        applicant("A3", 29, MaritalStatus::Married),
    ] {
        stores.applicants.add(applicant).expect("seed applicant");
    }
    stores
        .officers
        .add(Officer::new(profile("O1", 33, MaritalStatus::Single)))
        .expect("seed officer");
    stores.managers.add(manager).expect("seed manager");
}

/// Memory-backed storage whose writes can be switched to fail.
#[derive(Default)]
pub(super) struct FlakyStorage {
    inner: MemoryStorage,
    failing: AtomicBool,
}

impl FlakyStorage {
    pub(super) fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(super) fn lines(&self) -> Option<Vec<String>> {
        self.inner.lines()
    }
}

impl RecordStorage for FlakyStorage {
    fn read_lines(&self) -> Result<Option<Vec<String>>, StorageError> {
        self.inner.read_lines()
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        self.inner.write_lines(lines)
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

/// Seeded service whose `kind` store writes through a [`FlakyStorage`].
pub(super) fn service_with_flaky(
    kind: &'static str,
) -> (AllocationService, Arc<FlakyStorage>, Arc<MemoryStorage>) {
    let flaky = Arc::new(FlakyStorage::default());
    let projects = Arc::new(MemoryStorage::default());
    let stores = AllocationStores::with_storage(LineFormat::Modern, |candidate| {
        if candidate == kind {
            flaky.clone() as Arc<dyn RecordStorage>
        } else if candidate == "project" {
            projects.clone() as Arc<dyn RecordStorage>
        } else {
            Arc::new(MemoryStorage::default()) as Arc<dyn RecordStorage>
        }
    });
    seed(&stores);
    (AllocationService::new(stores), flaky, projects)
}

pub(super) async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn assert_error_kind(response: Response, status: StatusCode, kind: &str) {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(body["kind"], kind);
    assert!(body["message"].as_str().is_some_and(|message| !message.is_empty()));
}
