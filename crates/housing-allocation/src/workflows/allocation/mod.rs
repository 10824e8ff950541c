//! Housing-project allocation: projects with per-room-type flat inventory, applicants moving
//! through application, booking, and withdrawal, and officers registering to run projects.
//!
//! Each unit of work is a persisted [`Request`] decided by the state machine in
//! [`transitions`]; [`AllocationService`] is the entry point callers use.

pub mod codec;
pub mod credentials;
pub mod domain;
pub mod eligibility;
pub mod inventory;
pub mod requests;
pub mod router;
pub mod seed;
pub mod service;
pub mod storage;
pub mod store;
pub mod stores;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use codec::{CodecError, LineFormat, Record, RecordCodec};
pub use credentials::{CredentialHasher, Sha256Hasher};
pub use domain::{
    Applicant, ApplicantStatus, BookingReceipt, FlatInventory, Manager, MaritalStatus, Officer,
    Project, ProjectId, RequestId, Role, RoomType, User, UserId, UserProfile, MAX_OFFICER_SLOTS,
};
pub use eligibility::{EligibilityError, EligibilityPolicy};
pub use inventory::InventoryError;
pub use requests::{
    OfficerApplicationRequest, ProjectApplicationRequest, ProjectBookingRequest,
    ProjectWithdrawalRequest, Request, RequestHeader, RequestKind, RequestStatus,
};
pub use router::allocation_router;
pub use seed::{CsvSeedImporter, SeedImportError, SeedRows};
pub use service::{
    Account, AllocationService, AllocationServiceError, DecisionReport, ErrorKind, ErrorView,
    NewAccount, NewProject,
};
pub use storage::{FileStorage, MemoryStorage, RecordStorage, StorageError};
pub use store::{Entity, EntityStore, LoadReport, LoadSource, StoreError, StoreGuard};
pub use stores::{AllocationStores, StoresOpenError};
pub use transitions::{Decision, TransitionError};
