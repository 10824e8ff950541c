//! Request state machine.
//!
//! [`apply`] is pure: it reads the entities a request touches and returns their next versions.
//! The caller commits the returned entities; an `Err` leaves every store untouched.

use serde::{Deserialize, Serialize};

use super::domain::{
    Applicant, ApplicantStatus, BookingReceipt, Officer, Project, RequestId, RoomType, UserId,
};
use super::inventory::InventoryError;
use super::requests::{ProjectWithdrawalRequest, Request, RequestKind, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn target(self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error(
        "request {request} is already {} and cannot become {}",
        .from.label(),
        .to.label()
    )]
    InvalidStateTransition {
        request: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("request {request}: {reason}")]
    PreconditionFailed { request: RequestId, reason: String },
}

impl TransitionError {
    fn precondition(request: &Request, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            request: request.id().clone(),
            reason: reason.into(),
        }
    }
}

/// Everything a transition may read.
#[derive(Debug, Clone, Copy)]
pub struct TransitionInput<'a> {
    pub request: &'a Request,
    pub project: &'a Project,
    pub applicant: Option<&'a Applicant>,
    pub officer: Option<&'a Officer>,
    /// Other requests on the same project, for origin lookups and cascades.
    pub related: &'a [Request],
}

/// Next versions of every entity the transition changed. `None` means untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub request: Request,
    pub project: Option<Project>,
    pub applicant: Option<Applicant>,
    pub officer: Option<Officer>,
    pub cascaded: Vec<Request>,
    pub receipt: Option<BookingReceipt>,
}

impl TransitionOutcome {
    fn status_only(request: Request) -> Self {
        Self {
            request,
            project: None,
            applicant: None,
            officer: None,
            cascaded: Vec::new(),
            receipt: None,
        }
    }
}

pub fn apply(
    decision: Decision,
    input: TransitionInput<'_>,
) -> Result<TransitionOutcome, TransitionError> {
    let source = input.request;
    if !source.is_pending() {
        return Err(TransitionError::InvalidStateTransition {
            request: source.id().clone(),
            from: source.status(),
            to: decision.target(),
        });
    }
    if source.project_id() != &input.project.id {
        return Err(TransitionError::precondition(
            source,
            format!("project {} does not match request", input.project.id),
        ));
    }

    let mut request = source.clone();
    request.header_mut().status = decision.target();

    match (source, decision) {
        (Request::ProjectApplication(application), Decision::Approve) => {
            let mut applicant = applicant_for(&input, &application.applicant_id)?;
            if applicant.status != ApplicantStatus::Pending {
                return Err(TransitionError::precondition(
                    source,
                    format!("applicant is {}, expected pending", applicant.status.label()),
                ));
            }

            let mut project = input.project.clone();
            project.decrement_flat(application.room_type)?;
            applicant.status = ApplicantStatus::Successful;
            applicant.project = Some(project.id.clone());
            applicant.room_type = Some(application.room_type);

            Ok(TransitionOutcome {
                project: Some(project),
                applicant: Some(applicant),
                ..TransitionOutcome::status_only(request)
            })
        }
        (Request::ProjectApplication(application), Decision::Reject) => {
            let mut applicant = applicant_for(&input, &application.applicant_id)?;
            let project = release_reservation(&input, &applicant, application.room_type)?;
            applicant.status = ApplicantStatus::Rejected;

            Ok(TransitionOutcome {
                project,
                applicant: Some(applicant),
                cascaded: orphaned_withdrawals(&input, &application.header.id),
                ..TransitionOutcome::status_only(request)
            })
        }
        (Request::OfficerApplication(registration), Decision::Approve) => {
            let mut officer = input
                .officer
                .filter(|officer| officer.profile.id == registration.officer_id)
                .cloned()
                .ok_or_else(|| TransitionError::precondition(source, "officer record missing"))?;

            let mut project = input.project.clone();
            project.assign_officer(&registration.officer_id)?;
            if !officer.is_in_charge_of(&project.id) {
                officer.projects_in_charge.push(project.id.clone());
            }

            Ok(TransitionOutcome {
                project: Some(project),
                officer: Some(officer),
                ..TransitionOutcome::status_only(request)
            })
        }
        (Request::OfficerApplication(_), Decision::Reject) => {
            Ok(TransitionOutcome::status_only(request))
        }
        (Request::ProjectBooking(booking), Decision::Approve) => {
            let mut applicant = applicant_for(&input, &booking.applicant_id)?;
            if applicant.status != ApplicantStatus::Successful {
                return Err(TransitionError::precondition(
                    source,
                    format!(
                        "applicant is {}, expected successful",
                        applicant.status.label()
                    ),
                ));
            }
            let origin_approved = input.related.iter().any(|candidate| {
                candidate.id() == &booking.application_id
                    && candidate.kind() == RequestKind::ProjectApplication
                    && candidate.status() == RequestStatus::Approved
                    && candidate.concerns(&booking.header.project_id, &booking.applicant_id)
            });
            if !origin_approved {
                return Err(TransitionError::precondition(
                    source,
                    format!("application {} was not approved", booking.application_id),
                ));
            }

            applicant.status = ApplicantStatus::Booked;
            applicant.project = Some(input.project.id.clone());
            applicant.room_type = Some(booking.room_type);
            let receipt = BookingReceipt::new(&applicant, input.project, booking.room_type);

            Ok(TransitionOutcome {
                applicant: Some(applicant),
                receipt: Some(receipt),
                ..TransitionOutcome::status_only(request)
            })
        }
        (Request::ProjectBooking(booking), Decision::Reject) => {
            let mut applicant = applicant_for(&input, &booking.applicant_id)?;
            let project = release_reservation(&input, &applicant, booking.room_type)?;
            applicant.status = ApplicantStatus::Rejected;

            Ok(TransitionOutcome {
                project,
                applicant: Some(applicant),
                cascaded: orphaned_withdrawals(&input, &booking.application_id),
                ..TransitionOutcome::status_only(request)
            })
        }
        (Request::ProjectWithdrawal(withdrawal), Decision::Approve) => {
            let mut applicant = applicant_for(&input, &withdrawal.applicant_id)?;
            if !applicant.status.has_active_application()
                || applicant.project.as_ref() != Some(&input.project.id)
            {
                return Err(TransitionError::precondition(
                    source,
                    "applicant has no active application for this project",
                ));
            }
            if !withdraws_current_application(&input, withdrawal) {
                return Err(TransitionError::precondition(
                    source,
                    format!(
                        "application {} is not the applicant's current application",
                        withdrawal.application_id
                    ),
                ));
            }

            let project = release_reservation(&input, &applicant, withdrawal.room_type)?;
            applicant.status = ApplicantStatus::NoRegistration;
            applicant.project = None;
            applicant.room_type = None;

            let cascaded = input
                .related
                .iter()
                .filter(|candidate| {
                    candidate.id() != source.id()
                        && candidate.is_pending()
                        && matches!(
                            candidate.kind(),
                            RequestKind::ProjectApplication | RequestKind::ProjectBooking
                        )
                        && candidate.concerns(&input.project.id, &withdrawal.applicant_id)
                })
                .map(|candidate| {
                    let mut rejected = candidate.clone();
                    rejected.header_mut().status = RequestStatus::Rejected;
                    rejected
                })
                .collect();

            Ok(TransitionOutcome {
                project,
                applicant: Some(applicant),
                cascaded,
                ..TransitionOutcome::status_only(request)
            })
        }
        (Request::ProjectWithdrawal(_), Decision::Reject) => {
            Ok(TransitionOutcome::status_only(request))
        }
    }
}

/// The origin must be the pair's most recent application and must not be rejected.
fn withdraws_current_application(
    input: &TransitionInput<'_>,
    withdrawal: &ProjectWithdrawalRequest,
) -> bool {
    input
        .related
        .iter()
        .rev()
        .find(|candidate| {
            candidate.kind() == RequestKind::ProjectApplication
                && candidate.concerns(&input.project.id, &withdrawal.applicant_id)
        })
        .is_some_and(|origin| {
            origin.id() == &withdrawal.application_id
                && origin.status() != RequestStatus::Rejected
        })
}

/// Pending withdrawals of `application_id`, rejected alongside it.
fn orphaned_withdrawals(input: &TransitionInput<'_>, application_id: &RequestId) -> Vec<Request> {
    input
        .related
        .iter()
        .filter(|candidate| {
            candidate.is_pending()
                && matches!(
                    candidate,
                    Request::ProjectWithdrawal(withdrawal)
                        if &withdrawal.application_id == application_id
                )
        })
        .map(|candidate| {
            let mut rejected = candidate.clone();
            rejected.header_mut().status = RequestStatus::Rejected;
            rejected
        })
        .collect()
}

fn applicant_for(input: &TransitionInput<'_>, id: &UserId) -> Result<Applicant, TransitionError> {
    input
        .applicant
        .filter(|applicant| &applicant.profile.id == id)
        .cloned()
        .ok_or_else(|| TransitionError::precondition(input.request, "applicant record missing"))
}

/// Put back the flat taken at application approval, if this applicant holds one.
fn release_reservation(
    input: &TransitionInput<'_>,
    applicant: &Applicant,
    room_type: RoomType,
) -> Result<Option<Project>, TransitionError> {
    if !applicant.holds_reservation_in(&input.project.id, room_type) {
        return Ok(None);
    }
    let mut project = input.project.clone();
    project.increment_flat(room_type)?;
    Ok(Some(project))
}
