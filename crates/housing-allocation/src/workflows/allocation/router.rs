use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use tracing::error;

use super::domain::{ProjectId, RequestId, RoomType, UserId};
use super::requests::{Request, RequestStatus};
use super::service::{AllocationService, AllocationServiceError, ErrorKind, NewProject};

/// Router builder exposing the allocation workflows over HTTP.
pub fn allocation_router(service: Arc<AllocationService>) -> Router {
    Router::new()
        .route("/api/v1/sessions", post(login_handler))
        .route("/api/v1/applications", post(apply_handler))
        .route("/api/v1/bookings", post(booking_handler))
        .route("/api/v1/withdrawals", post(withdrawal_handler))
        .route(
            "/api/v1/officer-registrations",
            post(officer_registration_handler),
        )
        .route("/api/v1/requests", get(pending_requests_handler))
        .route("/api/v1/requests/:request_id", get(request_handler))
        .route("/api/v1/requests/:request_id/approve", post(approve_handler))
        .route("/api/v1/requests/:request_id/reject", post(reject_handler))
        .route(
            "/api/v1/applicants/:applicant_id/projects",
            get(applicable_projects_handler),
        )
        .route(
            "/api/v1/applicants/:applicant_id/receipt",
            get(receipt_handler),
        )
        .route("/api/v1/projects", post(create_project_handler))
        .route(
            "/api/v1/projects/:project_id/requests",
            get(project_requests_handler),
        )
        .route(
            "/api/v1/projects/:project_id/visibility",
            post(visibility_handler),
        )
        .with_state(service)
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists
        | ErrorKind::InvalidStateTransition
        | ErrorKind::CapacityExceeded => StatusCode::CONFLICT,
        ErrorKind::InsufficientInventory
        | ErrorKind::Ineligible
        | ErrorKind::PreconditionFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ErrorKind::Codec | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: AllocationServiceError) -> Response {
    let status = status_for(error.kind());
    if status.is_server_error() {
        error!(%error, "allocation request failed");
    }
    (status, axum::Json(error.view())).into_response()
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, AllocationServiceError>,
) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn today_or_now(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub user_id: UserId,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplyPayload {
    pub applicant_id: UserId,
    pub project_id: ProjectId,
    pub room_type: RoomType,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct BookingPayload {
    pub applicant_id: UserId,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalPayload {
    pub applicant_id: UserId,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct OfficerRegistrationPayload {
    pub officer_id: UserId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectPayload {
    pub manager_id: UserId,
    #[serde(flatten)]
    pub project: NewProject,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityPayload {
    pub manager_id: UserId,
    pub visible: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TodayQuery {
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<RequestStatus>,
}

pub(crate) async fn login_handler(
    State(service): State<Arc<AllocationService>>,
    axum::Json(payload): axum::Json<LoginPayload>,
) -> Response {
    respond(
        StatusCode::OK,
        service.authenticate(&payload.user_id, &payload.password),
    )
}

pub(crate) async fn apply_handler(
    State(service): State<Arc<AllocationService>>,
    axum::Json(payload): axum::Json<ApplyPayload>,
) -> Response {
    let result = service
        .apply(
            &payload.applicant_id,
            &payload.project_id,
            payload.room_type,
            today_or_now(payload.today),
        )
        .map(Request::ProjectApplication);
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn booking_handler(
    State(service): State<Arc<AllocationService>>,
    axum::Json(payload): axum::Json<BookingPayload>,
) -> Response {
    let result = service
        .book(&payload.applicant_id, today_or_now(payload.today))
        .map(Request::ProjectBooking);
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn withdrawal_handler(
    State(service): State<Arc<AllocationService>>,
    axum::Json(payload): axum::Json<WithdrawalPayload>,
) -> Response {
    let result = service
        .withdraw(
            &payload.applicant_id,
            payload.reason,
            today_or_now(payload.today),
        )
        .map(Request::ProjectWithdrawal);
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn officer_registration_handler(
    State(service): State<Arc<AllocationService>>,
    axum::Json(payload): axum::Json<OfficerRegistrationPayload>,
) -> Response {
    let result = service
        .register_officer(
            &payload.officer_id,
            &payload.project_id,
            today_or_now(payload.today),
        )
        .map(Request::OfficerApplication);
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn pending_requests_handler(
    State(service): State<Arc<AllocationService>>,
) -> Response {
    respond(StatusCode::OK, service.pending_requests())
}

pub(crate) async fn request_handler(
    State(service): State<Arc<AllocationService>>,
    Path(request_id): Path<String>,
) -> Response {
    respond(StatusCode::OK, service.request(&RequestId(request_id)))
}

pub(crate) async fn approve_handler(
    State(service): State<Arc<AllocationService>>,
    Path(request_id): Path<String>,
) -> Response {
    respond(StatusCode::OK, service.approve(&RequestId(request_id)))
}

pub(crate) async fn reject_handler(
    State(service): State<Arc<AllocationService>>,
    Path(request_id): Path<String>,
) -> Response {
    respond(StatusCode::OK, service.reject(&RequestId(request_id)))
}

pub(crate) async fn applicable_projects_handler(
    State(service): State<Arc<AllocationService>>,
    Path(applicant_id): Path<String>,
    Query(query): Query<TodayQuery>,
) -> Response {
    respond(
        StatusCode::OK,
        service.applicable_projects(&UserId(applicant_id), today_or_now(query.today)),
    )
}

pub(crate) async fn receipt_handler(
    State(service): State<Arc<AllocationService>>,
    Path(applicant_id): Path<String>,
) -> Response {
    respond(
        StatusCode::OK,
        service.booking_receipt(&UserId(applicant_id)),
    )
}

pub(crate) async fn create_project_handler(
    State(service): State<Arc<AllocationService>>,
    axum::Json(payload): axum::Json<CreateProjectPayload>,
) -> Response {
    respond(
        StatusCode::CREATED,
        service.create_project(&payload.manager_id, payload.project),
    )
}

pub(crate) async fn project_requests_handler(
    State(service): State<Arc<AllocationService>>,
    Path(project_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Response {
    respond(
        StatusCode::OK,
        service.requests_for_project(&ProjectId(project_id), query.status),
    )
}

pub(crate) async fn visibility_handler(
    State(service): State<Arc<AllocationService>>,
    Path(project_id): Path<String>,
    axum::Json(payload): axum::Json<VisibilityPayload>,
) -> Response {
    respond(
        StatusCode::OK,
        service.set_project_visibility(
            &payload.manager_id,
            &ProjectId(project_id),
            payload.visible,
        ),
    )
}
