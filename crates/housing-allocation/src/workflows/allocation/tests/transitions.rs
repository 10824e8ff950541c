use super::common::*;
use crate::workflows::allocation::domain::{
    Applicant, ApplicantStatus, MaritalStatus, Officer, ProjectId, RequestId, RoomType, UserId,
};
use crate::workflows::allocation::inventory::InventoryError;
use crate::workflows::allocation::requests::{
    OfficerApplicationRequest, ProjectApplicationRequest, ProjectBookingRequest,
    ProjectWithdrawalRequest, Request, RequestHeader, RequestStatus,
};
use crate::workflows::allocation::transitions::{apply, Decision, TransitionError, TransitionInput};

fn header(id: &str) -> RequestHeader {
    RequestHeader::pending(RequestId::from(id), ProjectId::from("P001"), today())
}

fn application(id: &str, applicant: &str, room_type: RoomType) -> Request {
    Request::ProjectApplication(ProjectApplicationRequest {
        header: header(id),
        applicant_id: UserId::from(applicant),
        room_type,
    })
}

fn booking(id: &str, applicant: &str, origin: &str) -> Request {
    Request::ProjectBooking(ProjectBookingRequest {
        header: header(id),
        applicant_id: UserId::from(applicant),
        room_type: RoomType::TwoRoom,
        application_id: RequestId::from(origin),
    })
}

fn withdrawal(id: &str, applicant: &str, origin: &str) -> Request {
    Request::ProjectWithdrawal(ProjectWithdrawalRequest {
        header: header(id),
        applicant_id: UserId::from(applicant),
        room_type: RoomType::TwoRoom,
        application_id: RequestId::from(origin),
        reason: "moving abroad".to_string(),
    })
}

fn with_status(mut request: Request, status: RequestStatus) -> Request {
    request.header_mut().status = status;
    request
}

fn holding(mut applicant: Applicant, status: ApplicantStatus) -> Applicant {
    applicant.status = status;
    applicant.project = Some(ProjectId::from("P001"));
    applicant.room_type = Some(RoomType::TwoRoom);
    applicant
}

fn input<'a>(
    request: &'a Request,
    project: &'a crate::workflows::allocation::domain::Project,
    applicant: Option<&'a Applicant>,
    related: &'a [Request],
) -> TransitionInput<'a> {
    TransitionInput {
        request,
        project,
        applicant,
        officer: None,
        related,
    }
}

#[test]
fn approving_application_takes_a_flat_and_marks_successful() {
    let project = project_p001();
    let request = application("R001", "A1", RoomType::TwoRoom);
    let applicant = holding(applicant("A1", 40, MaritalStatus::Single), ApplicantStatus::Pending);

    let outcome = apply(
        Decision::Approve,
        input(&request, &project, Some(&applicant), &[]),
    )
    .expect("approval succeeds");

    assert_eq!(outcome.request.status(), RequestStatus::Approved);
    let project = outcome.project.expect("project changed");
    assert_eq!(project.available_flats(RoomType::TwoRoom), 1);
    let applicant = outcome.applicant.expect("applicant changed");
    assert_eq!(applicant.status, ApplicantStatus::Successful);
    assert_eq!(applicant.room_type, Some(RoomType::TwoRoom));
}

#[test]
fn approving_without_stock_changes_nothing() {
    let mut project = project_p001();
    project.two_room.available = 0;
    let request = application("R001", "A1", RoomType::TwoRoom);
    let applicant = holding(applicant("A1", 40, MaritalStatus::Single), ApplicantStatus::Pending);

    let error = apply(
        Decision::Approve,
        input(&request, &project, Some(&applicant), &[]),
    )
    .expect_err("no stock");

    assert!(matches!(
        error,
        TransitionError::Inventory(InventoryError::InsufficientInventory { .. })
    ));
    assert_eq!(request.status(), RequestStatus::Pending);
    assert_eq!(project.available_flats(RoomType::TwoRoom), 0);
}

#[test]
fn rejecting_pending_application_leaves_inventory_alone() {
    let project = project_p001();
    let request = application("R001", "A1", RoomType::TwoRoom);
    let applicant = holding(applicant("A1", 40, MaritalStatus::Single), ApplicantStatus::Pending);

    let outcome = apply(
        Decision::Reject,
        input(&request, &project, Some(&applicant), &[]),
    )
    .expect("rejection succeeds");

    assert!(outcome.project.is_none());
    assert_eq!(
        outcome.applicant.expect("applicant changed").status,
        ApplicantStatus::Rejected
    );
}

#[test]
fn decided_requests_cannot_be_decided_again() {
    let project = project_p001();
    let request = with_status(
        application("R001", "A1", RoomType::TwoRoom),
        RequestStatus::Approved,
    );

    for decision in [Decision::Approve, Decision::Reject] {
        let error = apply(decision, input(&request, &project, None, &[])).expect_err("terminal");
        assert_eq!(
            error,
            TransitionError::InvalidStateTransition {
                request: RequestId::from("R001"),
                from: RequestStatus::Approved,
                to: decision.target(),
            }
        );
    }
}

#[test]
fn booking_needs_an_approved_origin() {
    let project = project_p001();
    let request = booking("R002", "A1", "R001");
    let applicant = holding(
        applicant("A1", 40, MaritalStatus::Single),
        ApplicantStatus::Successful,
    );
    let pending_origin = [application("R001", "A1", RoomType::TwoRoom)];

    let error = apply(
        Decision::Approve,
        input(&request, &project, Some(&applicant), &pending_origin),
    )
    .expect_err("origin still pending");
    assert!(matches!(error, TransitionError::PreconditionFailed { .. }));

    let approved_origin = [with_status(
        application("R001", "A1", RoomType::TwoRoom),
        RequestStatus::Approved,
    )];
    let outcome = apply(
        Decision::Approve,
        input(&request, &project, Some(&applicant), &approved_origin),
    )
    .expect("booking approved");

    assert_eq!(
        outcome.applicant.expect("applicant changed").status,
        ApplicantStatus::Booked
    );
    assert!(outcome.project.is_none());
    let receipt = outcome.receipt.expect("receipt issued");
    assert_eq!(receipt.price, 350_000);
    assert_eq!(receipt.project_name, "Acacia Breeze");
}

#[test]
fn rejecting_booking_returns_the_reserved_flat() {
    let mut project = project_p001();
    project.two_room.available = 1;
    let request = booking("R002", "A1", "R001");
    let applicant = holding(
        applicant("A1", 40, MaritalStatus::Single),
        ApplicantStatus::Successful,
    );

    let outcome = apply(
        Decision::Reject,
        input(&request, &project, Some(&applicant), &[]),
    )
    .expect("rejection succeeds");

    assert_eq!(
        outcome
            .project
            .expect("project changed")
            .available_flats(RoomType::TwoRoom),
        2
    );
    assert_eq!(
        outcome.applicant.expect("applicant changed").status,
        ApplicantStatus::Rejected
    );
}

#[test]
fn withdrawal_cascades_only_to_the_same_applicant() {
    let mut project = project_p001();
    project.two_room.available = 1;
    let request = withdrawal("R003", "A1", "R001");
    let applicant = holding(
        applicant("A1", 40, MaritalStatus::Single),
        ApplicantStatus::Successful,
    );
    let related = [
        with_status(
            application("R001", "A1", RoomType::TwoRoom),
            RequestStatus::Approved,
        ),
        booking("R002", "A1", "R001"),
        request.clone(),
        application("R004", "A3", RoomType::ThreeRoom),
    ];

    let outcome = apply(
        Decision::Approve,
        input(&request, &project, Some(&applicant), &related),
    )
    .expect("withdrawal approved");

    let cascaded: Vec<_> = outcome
        .cascaded
        .iter()
        .map(|request| (request.id().clone(), request.status()))
        .collect();
    assert_eq!(
        cascaded,
        vec![(RequestId::from("R002"), RequestStatus::Rejected)]
    );
    let applicant = outcome.applicant.expect("applicant changed");
    assert_eq!(applicant.status, ApplicantStatus::NoRegistration);
    assert!(applicant.project.is_none());
    assert_eq!(
        outcome
            .project
            .expect("flat released")
            .available_flats(RoomType::TwoRoom),
        2
    );
}

#[test]
fn withdrawal_of_pending_application_releases_nothing() {
    let project = project_p001();
    let request = withdrawal("R002", "A1", "R001");
    let applicant = holding(applicant("A1", 40, MaritalStatus::Single), ApplicantStatus::Pending);
    let related = [application("R001", "A1", RoomType::TwoRoom)];

    let outcome = apply(
        Decision::Approve,
        input(&request, &project, Some(&applicant), &related),
    )
    .expect("withdrawal approved");

    assert!(outcome.project.is_none());
    assert_eq!(outcome.cascaded.len(), 1);
    assert_eq!(outcome.cascaded[0].id(), &RequestId::from("R001"));
}

#[test]
fn withdrawal_must_target_the_current_application() {
    let mut project = project_p001();
    project.two_room.available = 1;
    let request = withdrawal("R002", "A1", "R001");
    let applicant = holding(
        applicant("A1", 40, MaritalStatus::Single),
        ApplicantStatus::Successful,
    );
    let related = [
        with_status(
            application("R001", "A1", RoomType::TwoRoom),
            RequestStatus::Rejected,
        ),
        request.clone(),
        with_status(
            application("R003", "A1", RoomType::TwoRoom),
            RequestStatus::Approved,
        ),
    ];

    let error = apply(
        Decision::Approve,
        input(&request, &project, Some(&applicant), &related),
    )
    .expect_err("origin was superseded");

    assert!(matches!(error, TransitionError::PreconditionFailed { .. }));
}

#[test]
fn rejecting_application_rejects_its_pending_withdrawal() {
    let project = project_p001();
    let request = application("R001", "A1", RoomType::TwoRoom);
    let applicant = holding(applicant("A1", 40, MaritalStatus::Single), ApplicantStatus::Pending);
    let related = [
        request.clone(),
        withdrawal("R002", "A1", "R001"),
        withdrawal("R003", "A3", "R009"),
    ];

    let outcome = apply(
        Decision::Reject,
        input(&request, &project, Some(&applicant), &related),
    )
    .expect("rejection succeeds");

    let cascaded: Vec<_> = outcome
        .cascaded
        .iter()
        .map(|request| (request.id().clone(), request.status()))
        .collect();
    assert_eq!(
        cascaded,
        vec![(RequestId::from("R002"), RequestStatus::Rejected)]
    );
}

#[test]
fn releasing_at_capacity_is_refused() {
    let project = project_p001();
    let request = booking("R002", "A1", "R001");
    let applicant = holding(
        applicant("A1", 40, MaritalStatus::Single),
        ApplicantStatus::Successful,
    );

    let error = apply(
        Decision::Reject,
        input(&request, &project, Some(&applicant), &[]),
    )
    .expect_err("inventory already full");

    assert!(matches!(
        error,
        TransitionError::Inventory(InventoryError::CapacityExceeded { capacity: 2, .. })
    ));
}

#[test]
fn officer_approval_links_both_sides() {
    let project = project_p001();
    let request = Request::OfficerApplication(OfficerApplicationRequest {
        header: header("R001"),
        officer_id: UserId::from("O1"),
    });
    let officer = Officer::new(profile("O1", 33, MaritalStatus::Single));

    let outcome = apply(
        Decision::Approve,
        TransitionInput {
            request: &request,
            project: &project,
            applicant: None,
            officer: Some(&officer),
            related: &[],
        },
    )
    .expect("registration approved");

    assert!(outcome
        .project
        .expect("project changed")
        .has_officer(&UserId::from("O1")));
    assert!(outcome
        .officer
        .expect("officer changed")
        .is_in_charge_of(&ProjectId::from("P001")));
}

#[test]
fn mismatched_project_is_refused() {
    let mut project = project_p001();
    project.id = ProjectId::from("P002");
    let request = application("R001", "A1", RoomType::TwoRoom);

    let error = apply(Decision::Reject, input(&request, &project, None, &[]))
        .expect_err("wrong project");

    assert!(matches!(error, TransitionError::PreconditionFailed { .. }));
}
