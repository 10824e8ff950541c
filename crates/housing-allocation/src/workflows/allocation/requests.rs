use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::codec::Symbol;
use super::domain::{ProjectId, RequestId, RoomType, UserId};

/// Lifecycle of a single request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl Symbol for RequestStatus {
    const VARIANTS: &'static [Self] = &[Self::Pending, Self::Approved, Self::Rejected];

    fn symbol(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Persisted discriminator for the request variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    ProjectApplication,
    OfficerApplication,
    ProjectBooking,
    ProjectWithdrawal,
}

impl RequestKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProjectApplication => "project application",
            Self::OfficerApplication => "officer application",
            Self::ProjectBooking => "project booking",
            Self::ProjectWithdrawal => "project withdrawal",
        }
    }
}

impl Symbol for RequestKind {
    const VARIANTS: &'static [Self] = &[
        Self::ProjectApplication,
        Self::OfficerApplication,
        Self::ProjectBooking,
        Self::ProjectWithdrawal,
    ];

    fn symbol(self) -> &'static str {
        match self {
            Self::ProjectApplication => "PROJECT_APPLICATION",
            Self::OfficerApplication => "OFFICER_APPLICATION",
            Self::ProjectBooking => "PROJECT_BOOKING",
            Self::ProjectWithdrawal => "PROJECT_WITHDRAWAL",
        }
    }
}

/// Fields every request variant carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub id: RequestId,
    pub project_id: ProjectId,
    pub status: RequestStatus,
    pub submitted_on: NaiveDate,
}

impl RequestHeader {
    pub fn pending(id: RequestId, project_id: ProjectId, submitted_on: NaiveDate) -> Self {
        Self {
            id,
            project_id,
            status: RequestStatus::Pending,
            submitted_on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectApplicationRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
    pub applicant_id: UserId,
    pub room_type: RoomType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerApplicationRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
    pub officer_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectBookingRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
    pub applicant_id: UserId,
    pub room_type: RoomType,
    /// The approved application this booking follows from. Referenced by id only.
    pub application_id: RequestId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectWithdrawalRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
    pub applicant_id: UserId,
    pub room_type: RoomType,
    pub application_id: RequestId,
    pub reason: String,
}

/// Every unit of work awaiting a decision, as one tagged union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    ProjectApplication(ProjectApplicationRequest),
    OfficerApplication(OfficerApplicationRequest),
    ProjectBooking(ProjectBookingRequest),
    ProjectWithdrawal(ProjectWithdrawalRequest),
}

impl Request {
    pub fn header(&self) -> &RequestHeader {
        match self {
            Request::ProjectApplication(request) => &request.header,
            Request::OfficerApplication(request) => &request.header,
            Request::ProjectBooking(request) => &request.header,
            Request::ProjectWithdrawal(request) => &request.header,
        }
    }

    pub(crate) fn header_mut(&mut self) -> &mut RequestHeader {
        match self {
            Request::ProjectApplication(request) => &mut request.header,
            Request::OfficerApplication(request) => &mut request.header,
            Request::ProjectBooking(request) => &mut request.header,
            Request::ProjectWithdrawal(request) => &mut request.header,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Request::ProjectApplication(_) => RequestKind::ProjectApplication,
            Request::OfficerApplication(_) => RequestKind::OfficerApplication,
            Request::ProjectBooking(_) => RequestKind::ProjectBooking,
            Request::ProjectWithdrawal(_) => RequestKind::ProjectWithdrawal,
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.header().id
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.header().project_id
    }

    pub fn status(&self) -> RequestStatus {
        self.header().status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == RequestStatus::Pending
    }

    /// The applicant a request belongs to; officer registrations have none.
    pub fn applicant_id(&self) -> Option<&UserId> {
        match self {
            Request::ProjectApplication(request) => Some(&request.applicant_id),
            Request::ProjectBooking(request) => Some(&request.applicant_id),
            Request::ProjectWithdrawal(request) => Some(&request.applicant_id),
            Request::OfficerApplication(_) => None,
        }
    }

    pub fn concerns(&self, project_id: &ProjectId, applicant_id: &UserId) -> bool {
        self.project_id() == project_id && self.applicant_id() == Some(applicant_id)
    }
}
