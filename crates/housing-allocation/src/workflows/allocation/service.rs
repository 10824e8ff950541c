//! Workflow façade over the five entity stores.
//!
//! Every mutating operation runs as a transaction: all store locks are taken in the order
//! Project, Applicant, Officer, Manager, Request; changed kinds are persisted before the
//! locks drop, and any failure restores every kind to its state at the start.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::credentials::{CredentialHasher, Sha256Hasher};
use super::domain::{
    Applicant, ApplicantStatus, BookingReceipt, FlatInventory, MaritalStatus, Manager, Officer,
    Project, ProjectId, RequestId, Role, RoomType, User, UserId, UserProfile, MAX_OFFICER_SLOTS,
};
use super::eligibility::{EligibilityError, EligibilityPolicy};
use super::inventory::InventoryError;
use super::requests::{
    OfficerApplicationRequest, ProjectApplicationRequest, ProjectBookingRequest,
    ProjectWithdrawalRequest, Request, RequestHeader, RequestKind, RequestStatus,
};
use super::store::{Entity, LoadReport, StoreError, StoreGuard};
use super::stores::{AllocationStores, StoresOpenError};
use super::transitions::{self, Decision, TransitionError, TransitionInput};
use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum AllocationServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Open(#[from] StoresOpenError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(
        "request {request} is a {} request, not a {} request",
        .actual.label(),
        .expected.label()
    )]
    WrongRequestKind {
        request: RequestId,
        expected: RequestKind,
        actual: RequestKind,
    },
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("invalid user id or password")]
    InvalidCredentials,
}

/// Stable classification of façade failures for callers and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Codec,
    InsufficientInventory,
    CapacityExceeded,
    InvalidStateTransition,
    Ineligible,
    PreconditionFailed,
    InvalidCredentials,
    Storage,
}

/// Structured `{ kind, message }` result for a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
}

impl AllocationServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(error) | Self::Open(StoresOpenError::Store(error)) => store_kind(error),
            Self::Open(StoresOpenError::Seed { .. }) => ErrorKind::Codec,
            Self::Transition(TransitionError::InvalidStateTransition { .. }) => {
                ErrorKind::InvalidStateTransition
            }
            Self::Transition(TransitionError::Inventory(error)) | Self::Inventory(error) => {
                inventory_kind(error)
            }
            Self::Transition(TransitionError::PreconditionFailed { .. })
            | Self::WrongRequestKind { .. }
            | Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::Eligibility(_) => ErrorKind::Ineligible,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
        }
    }

    pub fn view(&self) -> ErrorView {
        ErrorView {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

fn store_kind(error: &StoreError) -> ErrorKind {
    match error {
        StoreError::NotFound { .. } => ErrorKind::NotFound,
        StoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
        StoreError::Storage(_) | StoreError::Unavailable { .. } => ErrorKind::Storage,
    }
}

fn inventory_kind(error: &InventoryError) -> ErrorKind {
    match error {
        InventoryError::InsufficientInventory { .. } => ErrorKind::InsufficientInventory,
        InventoryError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
        InventoryError::OfficerSlotsFull { .. } => ErrorKind::PreconditionFailed,
    }
}

fn precondition(reason: impl Into<String>) -> AllocationServiceError {
    AllocationServiceError::PreconditionFailed(reason.into())
}

/// Authenticated user of any role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Account {
    Applicant(Applicant),
    Officer(Officer),
    Manager(Manager),
}

impl Account {
    pub fn role(&self) -> Role {
        match self {
            Self::Applicant(_) => Applicant::ROLE,
            Self::Officer(_) => Officer::ROLE,
            Self::Manager(_) => Manager::ROLE,
        }
    }

    pub fn profile(&self) -> &UserProfile {
        match self {
            Self::Applicant(applicant) => applicant.profile(),
            Self::Officer(officer) => officer.profile(),
            Self::Manager(manager) => manager.profile(),
        }
    }
}

/// Account details before the password is hashed.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub role: Role,
    pub id: UserId,
    pub name: String,
    pub age: u8,
    pub marital_status: MaritalStatus,
    pub password: String,
}

/// Manager-supplied fields for a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub neighborhood: String,
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub two_room_units: u32,
    pub two_room_price: u32,
    pub three_room_units: u32,
    pub three_room_price: u32,
    pub officer_slots: u8,
    #[serde(default)]
    pub visible: bool,
}

/// Result of approving or rejecting a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionReport {
    pub request: Request,
    /// Other requests rejected as a side effect.
    pub cascaded: Vec<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<BookingReceipt>,
}

/// Use-case operations composing the stores, eligibility rules, and request state machine.
pub struct AllocationService {
    stores: AllocationStores,
    policy: EligibilityPolicy,
    hasher: Arc<dyn CredentialHasher>,
}

impl AllocationService {
    pub fn new(stores: AllocationStores) -> Self {
        Self::with_policy(stores, EligibilityPolicy::default(), Arc::new(Sha256Hasher))
    }

    pub fn with_policy(
        stores: AllocationStores,
        policy: EligibilityPolicy,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            stores,
            policy,
            hasher,
        }
    }

    /// File-backed service per the storage settings.
    pub fn open(config: &StorageConfig) -> Result<(Self, Vec<LoadReport>), AllocationServiceError> {
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Sha256Hasher);
        let (stores, reports) = AllocationStores::open(config, hasher.as_ref())?;
        Ok((
            Self::with_policy(stores, EligibilityPolicy::default(), hasher),
            reports,
        ))
    }

    pub fn stores(&self) -> &AllocationStores {
        &self.stores
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    // Accounts

    /// Create an account of any role with a freshly hashed password.
    pub fn register_account(&self, account: NewAccount) -> Result<Account, AllocationServiceError> {
        let NewAccount {
            role,
            id,
            name,
            age,
            marital_status,
            password,
        } = account;
        let profile = UserProfile {
            id,
            name,
            age,
            marital_status,
            password_hash: self.hasher.hash(&password),
        };

        let created = self.transaction(|tx| {
            let id = profile.id.as_str();
            if tx.applicants.contains(id) || tx.officers.contains(id) || tx.managers.contains(id) {
                return Err(StoreError::AlreadyExists {
                    kind: "account",
                    id: id.to_string(),
                }
                .into());
            }
            let account = match role {
                Role::Applicant => {
                    let applicant = Applicant::new(profile);
                    tx.applicants.add(applicant.clone())?;
                    Account::Applicant(applicant)
                }
                Role::Officer => {
                    let officer = Officer::new(profile);
                    tx.officers.add(officer.clone())?;
                    Account::Officer(officer)
                }
                Role::Manager => {
                    let manager = Manager::new(profile);
                    tx.managers.add(manager.clone())?;
                    Account::Manager(manager)
                }
            };
            Ok(account)
        })?;

        info!(user = %created.profile().id, role = ?created.role(), "account registered");
        Ok(created)
    }

    /// Unknown ids and wrong passwords fail identically.
    pub fn authenticate(
        &self,
        user_id: &UserId,
        password: &str,
    ) -> Result<Account, AllocationServiceError> {
        let account = self.account(user_id)?;
        if self.hasher.verify(password, &account.profile().password_hash) {
            Ok(account)
        } else {
            Err(AllocationServiceError::InvalidCredentials)
        }
    }

    pub fn change_password(
        &self,
        user_id: &UserId,
        current: &str,
        replacement: &str,
    ) -> Result<(), AllocationServiceError> {
        if replacement.is_empty() {
            return Err(precondition("new password must not be empty"));
        }
        let password_hash = self.hasher.hash(replacement);

        self.transaction(|tx| {
            let id = user_id.as_str();
            if let Ok(mut applicant) = tx.applicants.get_by_id(id).cloned() {
                self.check_password(current, &applicant.profile)?;
                applicant.profile.password_hash = password_hash;
                tx.applicants.update(applicant)?;
            } else if let Ok(mut officer) = tx.officers.get_by_id(id).cloned() {
                self.check_password(current, &officer.profile)?;
                officer.profile.password_hash = password_hash;
                tx.officers.update(officer)?;
            } else if let Ok(mut manager) = tx.managers.get_by_id(id).cloned() {
                self.check_password(current, &manager.profile)?;
                manager.profile.password_hash = password_hash;
                tx.managers.update(manager)?;
            } else {
                return Err(AllocationServiceError::InvalidCredentials);
            }
            Ok(())
        })?;

        info!(user = %user_id, "password changed");
        Ok(())
    }

    fn check_password(
        &self,
        password: &str,
        profile: &UserProfile,
    ) -> Result<(), AllocationServiceError> {
        if self.hasher.verify(password, &profile.password_hash) {
            Ok(())
        } else {
            Err(AllocationServiceError::InvalidCredentials)
        }
    }

    fn account(&self, user_id: &UserId) -> Result<Account, AllocationServiceError> {
        let id = user_id.as_str();
        if let Ok(applicant) = self.stores.applicants.get_by_id(id) {
            return Ok(Account::Applicant(applicant));
        }
        if let Ok(officer) = self.stores.officers.get_by_id(id) {
            return Ok(Account::Officer(officer));
        }
        if let Ok(manager) = self.stores.managers.get_by_id(id) {
            return Ok(Account::Manager(manager));
        }
        Err(AllocationServiceError::InvalidCredentials)
    }

    // Applicant use cases

    /// Submit an application after the eligibility and inventory checks pass.
    pub fn apply(
        &self,
        applicant_id: &UserId,
        project_id: &ProjectId,
        room_type: RoomType,
        today: NaiveDate,
    ) -> Result<ProjectApplicationRequest, AllocationServiceError> {
        let request = self.transaction(|tx| {
            let mut applicant = tx.applicants.get_by_id(applicant_id.as_str())?.clone();
            if applicant.status.has_active_application() {
                return Err(precondition(format!(
                    "applicant {applicant_id} already has a {} application",
                    applicant.status.label()
                )));
            }

            let project = tx.projects.get_by_id(project_id.as_str())?;
            self.policy.check_project_open(project, today)?;
            self.policy.check_room_type(&applicant.profile, room_type)?;
            if project.available_flats(room_type) == 0 {
                return Err(InventoryError::InsufficientInventory {
                    project: project_id.clone(),
                    room_type,
                }
                .into());
            }

            let request = ProjectApplicationRequest {
                header: RequestHeader::pending(
                    RequestId::new(tx.requests.next_id()),
                    project_id.clone(),
                    today,
                ),
                applicant_id: applicant_id.clone(),
                room_type,
            };
            tx.requests
                .add(Request::ProjectApplication(request.clone()))?;

            applicant.status = ApplicantStatus::Pending;
            applicant.project = Some(project_id.clone());
            applicant.room_type = Some(room_type);
            tx.applicants.update(applicant)?;
            Ok(request)
        })?;

        info!(
            request = %request.header.id,
            applicant = %applicant_id,
            project = %project_id,
            room_type = room_type.label(),
            "application submitted"
        );
        Ok(request)
    }

    /// Ask to book the flat reserved by an approved application.
    pub fn book(
        &self,
        applicant_id: &UserId,
        today: NaiveDate,
    ) -> Result<ProjectBookingRequest, AllocationServiceError> {
        let request = self.transaction(|tx| {
            let applicant = tx.applicants.get_by_id(applicant_id.as_str())?;
            let (Some(project_id), Some(room_type), ApplicantStatus::Successful) =
                (applicant.project.clone(), applicant.room_type, applicant.status)
            else {
                return Err(precondition(format!(
                    "applicant {applicant_id} is {}, only successful applicants can book",
                    applicant.status.label()
                )));
            };

            let requests = tx.requests.items();
            let application_id = latest_application(requests, &project_id, applicant_id, |status| {
                status == RequestStatus::Approved
            })
            .map(|application| application.header.id.clone())
            .ok_or_else(|| {
                precondition(format!(
                    "applicant {applicant_id} has no approved application for project {project_id}"
                ))
            })?;
            if has_pending(requests, RequestKind::ProjectBooking, &project_id, applicant_id) {
                return Err(precondition(format!(
                    "applicant {applicant_id} already has a pending booking for project {project_id}"
                )));
            }

            let request = ProjectBookingRequest {
                header: RequestHeader::pending(
                    RequestId::new(tx.requests.next_id()),
                    project_id,
                    today,
                ),
                applicant_id: applicant_id.clone(),
                room_type,
                application_id,
            };
            tx.requests.add(Request::ProjectBooking(request.clone()))?;
            Ok(request)
        })?;

        info!(
            request = %request.header.id,
            applicant = %applicant_id,
            project = %request.header.project_id,
            "booking requested"
        );
        Ok(request)
    }

    /// Ask to withdraw the applicant's active application.
    pub fn withdraw(
        &self,
        applicant_id: &UserId,
        reason: impl Into<String>,
        today: NaiveDate,
    ) -> Result<ProjectWithdrawalRequest, AllocationServiceError> {
        let reason = reason.into();
        let request = self.transaction(|tx| {
            let applicant = tx.applicants.get_by_id(applicant_id.as_str())?;
            let Some(project_id) = applicant
                .project
                .clone()
                .filter(|_| applicant.status.has_active_application())
            else {
                return Err(precondition(format!(
                    "applicant {applicant_id} has no active application to withdraw"
                )));
            };

            let requests = tx.requests.items();
            if has_pending(requests, RequestKind::ProjectWithdrawal, &project_id, applicant_id) {
                return Err(precondition(format!(
                    "applicant {applicant_id} already has a pending withdrawal for project {project_id}"
                )));
            }
            let application = latest_application(requests, &project_id, applicant_id, |status| {
                status != RequestStatus::Rejected
            })
            .ok_or_else(|| {
                precondition(format!(
                    "applicant {applicant_id} has no application on record for project {project_id}"
                ))
            })?;
            let application_id = application.header.id.clone();
            let room_type = applicant.room_type.unwrap_or(application.room_type);

            let request = ProjectWithdrawalRequest {
                header: RequestHeader::pending(
                    RequestId::new(tx.requests.next_id()),
                    project_id,
                    today,
                ),
                applicant_id: applicant_id.clone(),
                room_type,
                application_id,
                reason,
            };
            tx.requests
                .add(Request::ProjectWithdrawal(request.clone()))?;
            Ok(request)
        })?;

        info!(
            request = %request.header.id,
            applicant = %applicant_id,
            project = %request.header.project_id,
            "withdrawal requested"
        );
        Ok(request)
    }

    // Officer use cases

    /// Ask to join a project's officer team.
    pub fn register_officer(
        &self,
        officer_id: &UserId,
        project_id: &ProjectId,
        today: NaiveDate,
    ) -> Result<OfficerApplicationRequest, AllocationServiceError> {
        let request = self.transaction(|tx| {
            let officer = tx.officers.get_by_id(officer_id.as_str())?;
            let project = tx.projects.get_by_id(project_id.as_str())?;

            if today > project.close_date {
                return Err(precondition(format!(
                    "project {project_id} closed on {}",
                    project.close_date
                )));
            }
            if project.has_officer(officer_id) || officer.is_in_charge_of(project_id) {
                return Err(precondition(format!(
                    "officer {officer_id} already handles project {project_id}"
                )));
            }

            let requests = tx.requests.items();
            let pending_elsewhere: Vec<&ProjectId> = requests
                .iter()
                .filter_map(|candidate| match candidate {
                    Request::OfficerApplication(registration)
                        if registration.header.status == RequestStatus::Pending
                            && &registration.officer_id == officer_id =>
                    {
                        Some(&registration.header.project_id)
                    }
                    _ => None,
                })
                .collect();
            if pending_elsewhere.contains(&project_id) {
                return Err(precondition(format!(
                    "officer {officer_id} already has a pending registration for project {project_id}"
                )));
            }

            let clash = officer
                .projects_in_charge
                .iter()
                .chain(pending_elsewhere.iter().copied())
                .filter_map(|other| tx.projects.get_by_id(other.as_str()).ok())
                .find(|other| other.window_overlaps(project));
            if let Some(other) = clash {
                return Err(precondition(format!(
                    "project {project_id} overlaps project {} already taken on by officer {officer_id}",
                    other.id
                )));
            }

            if project.remaining_officer_slots() == 0 {
                return Err(InventoryError::OfficerSlotsFull {
                    project: project_id.clone(),
                    limit: project.officer_slots,
                }
                .into());
            }

            let request = OfficerApplicationRequest {
                header: RequestHeader::pending(
                    RequestId::new(tx.requests.next_id()),
                    project_id.clone(),
                    today,
                ),
                officer_id: officer_id.clone(),
            };
            tx.requests
                .add(Request::OfficerApplication(request.clone()))?;
            Ok(request)
        })?;

        info!(
            request = %request.header.id,
            officer = %officer_id,
            project = %project_id,
            "officer registration submitted"
        );
        Ok(request)
    }

    // Decisions

    /// Approve any pending request, dispatching on its kind.
    pub fn approve(&self, request_id: &RequestId) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(request_id, Decision::Approve, None)
    }

    /// Reject any pending request, dispatching on its kind.
    pub fn reject(&self, request_id: &RequestId) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(request_id, Decision::Reject, None)
    }

    pub fn approve_application(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(
            request_id,
            Decision::Approve,
            Some(RequestKind::ProjectApplication),
        )
    }

    pub fn reject_application(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(
            request_id,
            Decision::Reject,
            Some(RequestKind::ProjectApplication),
        )
    }

    pub fn approve_booking(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(request_id, Decision::Approve, Some(RequestKind::ProjectBooking))
    }

    pub fn reject_booking(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(request_id, Decision::Reject, Some(RequestKind::ProjectBooking))
    }

    pub fn approve_officer_application(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(
            request_id,
            Decision::Approve,
            Some(RequestKind::OfficerApplication),
        )
    }

    pub fn reject_officer_application(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(
            request_id,
            Decision::Reject,
            Some(RequestKind::OfficerApplication),
        )
    }

    pub fn approve_withdrawal(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(
            request_id,
            Decision::Approve,
            Some(RequestKind::ProjectWithdrawal),
        )
    }

    pub fn reject_withdrawal(
        &self,
        request_id: &RequestId,
    ) -> Result<DecisionReport, AllocationServiceError> {
        self.decide(
            request_id,
            Decision::Reject,
            Some(RequestKind::ProjectWithdrawal),
        )
    }

    fn decide(
        &self,
        request_id: &RequestId,
        decision: Decision,
        expected: Option<RequestKind>,
    ) -> Result<DecisionReport, AllocationServiceError> {
        let report = self.transaction(|tx| {
            let request = tx.requests.get_by_id(request_id.as_str())?.clone();
            if let Some(expected) = expected {
                if request.kind() != expected {
                    return Err(AllocationServiceError::WrongRequestKind {
                        request: request_id.clone(),
                        expected,
                        actual: request.kind(),
                    });
                }
            }

            let project = tx.projects.get_by_id(request.project_id().as_str())?.clone();
            let applicant = request
                .applicant_id()
                .map(|id| tx.applicants.get_by_id(id.as_str()).cloned())
                .transpose()?;
            let officer = match &request {
                Request::OfficerApplication(registration) => Some(
                    tx.officers
                        .get_by_id(registration.officer_id.as_str())?
                        .clone(),
                ),
                _ => None,
            };
            let related = tx
                .requests
                .find(|candidate| candidate.project_id() == request.project_id());

            let outcome = transitions::apply(
                decision,
                TransitionInput {
                    request: &request,
                    project: &project,
                    applicant: applicant.as_ref(),
                    officer: officer.as_ref(),
                    related: &related,
                },
            )?;

            if let Some(project) = outcome.project {
                tx.projects.update(project)?;
            }
            if let Some(applicant) = outcome.applicant {
                tx.applicants.update(applicant)?;
            }
            if let Some(officer) = outcome.officer {
                tx.officers.update(officer)?;
            }
            tx.requests.update(outcome.request.clone())?;
            let cascaded = outcome
                .cascaded
                .iter()
                .map(|rejected| rejected.id().clone())
                .collect();
            for rejected in outcome.cascaded {
                tx.requests.update(rejected)?;
            }

            Ok(DecisionReport {
                request: outcome.request,
                cascaded,
                receipt: outcome.receipt,
            })
        })?;

        info!(
            request = %request_id,
            kind = report.request.kind().label(),
            status = report.request.status().label(),
            cascaded = report.cascaded.len(),
            "request decided"
        );
        Ok(report)
    }

    // Project administration

    pub fn create_project(
        &self,
        manager_id: &UserId,
        new_project: NewProject,
    ) -> Result<Project, AllocationServiceError> {
        if new_project.name.trim().is_empty() {
            return Err(precondition("project name must not be empty"));
        }
        if new_project.open_date > new_project.close_date {
            return Err(precondition(format!(
                "opening date {} is after closing date {}",
                new_project.open_date, new_project.close_date
            )));
        }
        if new_project.officer_slots == 0 || new_project.officer_slots > MAX_OFFICER_SLOTS {
            return Err(precondition(format!(
                "officer slots must be between 1 and {MAX_OFFICER_SLOTS}"
            )));
        }

        let project = self.transaction(|tx| {
            let mut manager = tx.managers.get_by_id(manager_id.as_str())?.clone();
            let project = Project {
                id: ProjectId::new(tx.projects.next_id()),
                name: new_project.name.trim().to_string(),
                neighborhood: new_project.neighborhood.trim().to_string(),
                visible: new_project.visible,
                open_date: new_project.open_date,
                close_date: new_project.close_date,
                two_room: FlatInventory::new(new_project.two_room_price, new_project.two_room_units),
                three_room: FlatInventory::new(
                    new_project.three_room_price,
                    new_project.three_room_units,
                ),
                manager_id: manager_id.clone(),
                officer_slots: new_project.officer_slots,
                officers: Vec::new(),
            };

            let existing = tx.projects.items();
            if existing
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&project.name))
            {
                return Err(precondition(format!(
                    "a project named '{}' already exists",
                    project.name
                )));
            }
            if let Some(other) = existing
                .iter()
                .find(|other| &other.manager_id == manager_id && other.window_overlaps(&project))
            {
                return Err(precondition(format!(
                    "manager {manager_id} already oversees project {} in an overlapping window",
                    other.id
                )));
            }

            tx.projects.add(project.clone())?;
            manager.managed_projects.push(project.id.clone());
            tx.managers.update(manager)?;
            Ok(project)
        })?;

        info!(project = %project.id, manager = %manager_id, "project created");
        Ok(project)
    }

    pub fn set_project_visibility(
        &self,
        manager_id: &UserId,
        project_id: &ProjectId,
        visible: bool,
    ) -> Result<Project, AllocationServiceError> {
        let project = self.transaction(|tx| {
            let mut project = tx.projects.get_by_id(project_id.as_str())?.clone();
            ensure_manages(&project, manager_id)?;
            project.visible = visible;
            tx.projects.update(project.clone())?;
            Ok(project)
        })?;

        info!(project = %project_id, visible, "project visibility changed");
        Ok(project)
    }

    /// Remove a project nobody depends on any more.
    pub fn delete_project(
        &self,
        manager_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Project, AllocationServiceError> {
        let project = self.transaction(|tx| {
            let project = tx.projects.get_by_id(project_id.as_str())?.clone();
            ensure_manages(&project, manager_id)?;

            if let Some(applicant) = tx.applicants.items().iter().find(|applicant| {
                applicant.status.has_active_application()
                    && applicant.project.as_ref() == Some(project_id)
            }) {
                return Err(precondition(format!(
                    "applicant {} still has a {} application for project {project_id}",
                    applicant.profile.id,
                    applicant.status.label()
                )));
            }
            if let Some(pending) = tx
                .requests
                .items()
                .iter()
                .find(|request| request.is_pending() && request.project_id() == project_id)
            {
                return Err(precondition(format!(
                    "request {} for project {project_id} is still pending",
                    pending.id()
                )));
            }

            tx.projects.remove(project_id.as_str())?;
            let officers = tx.officers.find(|officer| officer.is_in_charge_of(project_id));
            for mut officer in officers {
                officer.projects_in_charge.retain(|id| id != project_id);
                tx.officers.update(officer)?;
            }
            if let Ok(mut manager) = tx.managers.get_by_id(manager_id.as_str()).cloned() {
                manager.managed_projects.retain(|id| id != project_id);
                tx.managers.update(manager)?;
            }
            Ok(project)
        })?;

        info!(project = %project_id, manager = %manager_id, "project deleted");
        Ok(project)
    }

    // Queries

    pub fn project(&self, project_id: &ProjectId) -> Result<Project, AllocationServiceError> {
        Ok(self.stores.projects.get_by_id(project_id.as_str())?)
    }

    pub fn projects(&self) -> Result<Vec<Project>, AllocationServiceError> {
        Ok(self.stores.projects.get_all()?)
    }

    pub fn applicant(&self, applicant_id: &UserId) -> Result<Applicant, AllocationServiceError> {
        Ok(self.stores.applicants.get_by_id(applicant_id.as_str())?)
    }

    pub fn officer(&self, officer_id: &UserId) -> Result<Officer, AllocationServiceError> {
        Ok(self.stores.officers.get_by_id(officer_id.as_str())?)
    }

    /// Visible, open projects offering a room type this applicant may take.
    pub fn applicable_projects(
        &self,
        applicant_id: &UserId,
        today: NaiveDate,
    ) -> Result<Vec<Project>, AllocationServiceError> {
        let applicant = self.stores.applicants.get_by_id(applicant_id.as_str())?;
        Ok(self
            .stores
            .projects
            .find(|project| self.policy.is_applicable(&applicant.profile, project, today))?)
    }

    pub fn request(&self, request_id: &RequestId) -> Result<Request, AllocationServiceError> {
        Ok(self.stores.requests.get_by_id(request_id.as_str())?)
    }

    pub fn requests_for_project(
        &self,
        project_id: &ProjectId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>, AllocationServiceError> {
        Ok(self.stores.requests.find(|request| {
            request.project_id() == project_id
                && status.map_or(true, |status| request.status() == status)
        })?)
    }

    pub fn requests_for_applicant(
        &self,
        applicant_id: &UserId,
    ) -> Result<Vec<Request>, AllocationServiceError> {
        Ok(self
            .stores
            .requests
            .find(|request| request.applicant_id() == Some(applicant_id))?)
    }

    pub fn pending_requests(&self) -> Result<Vec<Request>, AllocationServiceError> {
        Ok(self.stores.requests.find(Request::is_pending)?)
    }

    /// Receipt for a booked flat, rebuilt from current records.
    pub fn booking_receipt(
        &self,
        applicant_id: &UserId,
    ) -> Result<BookingReceipt, AllocationServiceError> {
        let applicant = self.stores.applicants.get_by_id(applicant_id.as_str())?;
        let (ApplicantStatus::Booked, Some(project_id), Some(room_type)) =
            (applicant.status, applicant.project.as_ref(), applicant.room_type)
        else {
            return Err(precondition(format!(
                "applicant {applicant_id} has not booked a flat"
            )));
        };
        let project = self.stores.projects.get_by_id(project_id.as_str())?;
        Ok(BookingReceipt::new(&applicant, &project, room_type))
    }

    fn transaction<R, F>(&self, work: F) -> Result<R, AllocationServiceError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R, AllocationServiceError>,
    {
        let mut tx = Transaction::begin(&self.stores)?;
        let snapshot = tx.snapshot();

        let result = work(&mut tx).and_then(|value| {
            tx.persist_changes(&snapshot)?;
            Ok(value)
        });
        if let Err(error) = &result {
            if tx.rollback(snapshot) {
                warn!(%error, "transaction rolled back");
            }
        }
        result
    }
}

fn ensure_manages(project: &Project, manager_id: &UserId) -> Result<(), AllocationServiceError> {
    if &project.manager_id == manager_id {
        Ok(())
    } else {
        Err(precondition(format!(
            "project {} is managed by {}, not {manager_id}",
            project.id, project.manager_id
        )))
    }
}

/// Most recent application by `applicant_id` on `project_id` whose status passes `accept`.
fn latest_application<'r>(
    requests: &'r [Request],
    project_id: &ProjectId,
    applicant_id: &UserId,
    accept: impl Fn(RequestStatus) -> bool,
) -> Option<&'r ProjectApplicationRequest> {
    requests.iter().rev().find_map(|request| match request {
        Request::ProjectApplication(application)
            if accept(application.header.status)
                && &application.header.project_id == project_id
                && &application.applicant_id == applicant_id =>
        {
            Some(application)
        }
        _ => None,
    })
}

fn has_pending(
    requests: &[Request],
    kind: RequestKind,
    project_id: &ProjectId,
    applicant_id: &UserId,
) -> bool {
    requests.iter().any(|request| {
        request.is_pending() && request.kind() == kind && request.concerns(project_id, applicant_id)
    })
}

/// Every store lock, held for one façade operation.
struct Transaction<'a> {
    projects: StoreGuard<'a, Project>,
    applicants: StoreGuard<'a, Applicant>,
    officers: StoreGuard<'a, Officer>,
    managers: StoreGuard<'a, Manager>,
    requests: StoreGuard<'a, Request>,
}

struct Snapshot {
    projects: Vec<Project>,
    applicants: Vec<Applicant>,
    officers: Vec<Officer>,
    managers: Vec<Manager>,
    requests: Vec<Request>,
}

impl<'a> Transaction<'a> {
    fn begin(stores: &'a AllocationStores) -> Result<Self, StoreError> {
        let projects = stores.projects.lock()?;
        let applicants = stores.applicants.lock()?;
        let officers = stores.officers.lock()?;
        let managers = stores.managers.lock()?;
        let requests = stores.requests.lock()?;
        Ok(Self {
            projects,
            applicants,
            officers,
            managers,
            requests,
        })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            projects: self.projects.snapshot(),
            applicants: self.applicants.snapshot(),
            officers: self.officers.snapshot(),
            managers: self.managers.snapshot(),
            requests: self.requests.snapshot(),
        }
    }

    fn persist_changes(&self, before: &Snapshot) -> Result<(), StoreError> {
        persist_if_changed(&self.projects, &before.projects)?;
        persist_if_changed(&self.applicants, &before.applicants)?;
        persist_if_changed(&self.officers, &before.officers)?;
        persist_if_changed(&self.managers, &before.managers)?;
        persist_if_changed(&self.requests, &before.requests)
    }

    /// Returns whether anything had changed.
    fn rollback(&mut self, snapshot: Snapshot) -> bool {
        let restored = [
            restore_if_changed(&mut self.projects, snapshot.projects),
            restore_if_changed(&mut self.applicants, snapshot.applicants),
            restore_if_changed(&mut self.officers, snapshot.officers),
            restore_if_changed(&mut self.managers, snapshot.managers),
            restore_if_changed(&mut self.requests, snapshot.requests),
        ];
        restored.contains(&true)
    }
}

fn persist_if_changed<T: Entity + PartialEq>(
    guard: &StoreGuard<'_, T>,
    before: &[T],
) -> Result<(), StoreError> {
    if guard.items() != before {
        guard.persist()?;
    }
    Ok(())
}

fn restore_if_changed<T: Entity + PartialEq>(guard: &mut StoreGuard<'_, T>, before: Vec<T>) -> bool {
    if guard.items() == before.as_slice() {
        return false;
    }
    guard.restore(before);
    if let Err(error) = guard.persist() {
        warn!(kind = T::KIND, %error, "could not re-persist store after rollback");
    }
    true
}
