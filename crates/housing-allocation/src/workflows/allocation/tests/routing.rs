use super::common::*;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::allocation::domain::{ProjectId, RequestId, RoomType, UserId};
use crate::workflows::allocation::router::{self, allocation_router, status_for, TodayQuery};
use crate::workflows::allocation::service::ErrorKind;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

fn application_payload(applicant: &str, room_type: &str) -> Value {
    json!({
        "applicant_id": applicant,
        "project_id": "P001",
        "room_type": room_type,
        "today": "2025-03-01",
    })
}

#[tokio::test]
async fn apply_route_creates_pending_application() {
    let router = allocation_router(Arc::new(seeded_service()));

    let response = router
        .oneshot(post_json(
            "/api/v1/applications",
            application_payload("A1", "two_room"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = body_json(response).await;
    assert_eq!(payload["kind"], "project_application");
    assert_eq!(payload["id"], "R001");
    assert_eq!(payload["status"], "pending");
    assert_eq!(payload["room_type"], "two_room");
}

#[tokio::test]
async fn apply_route_reports_ineligibility() {
    let router = allocation_router(Arc::new(seeded_service()));

    let response = router
        .oneshot(post_json(
            "/api/v1/applications",
            application_payload("A2", "two_room"),
        ))
        .await
        .expect("route executes");

    assert_error_kind(response, StatusCode::UNPROCESSABLE_ENTITY, "ineligible").await;
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let router = allocation_router(Arc::new(seeded_service()));

    let response = router
        .oneshot(get("/api/v1/requests/R999"))
        .await
        .expect("route executes");

    assert_error_kind(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn second_approval_conflicts() {
    let service = Arc::new(seeded_service());
    let application = service
        .apply(
            &UserId::from("A1"),
            &ProjectId::from("P001"),
            RoomType::TwoRoom,
            today(),
        )
        .expect("application");
    let uri = format!("/api/v1/requests/{}/approve", application.header.id);
    let router = allocation_router(service.clone());

    let first = router
        .clone()
        .oneshot(post_json(&uri, json!({})))
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::OK);
    let payload = body_json(first).await;
    assert_eq!(payload["request"]["status"], "approved");
    assert_eq!(payload["cascaded"], json!([]));

    let second = router
        .oneshot(post_json(&uri, json!({})))
        .await
        .expect("route executes");
    assert_error_kind(second, StatusCode::CONFLICT, "invalid_state_transition").await;
}

#[tokio::test]
async fn receipt_route_follows_booking() {
    let service = Arc::new(seeded_service());
    let applicant = UserId::from("A1");
    let application = service
        .apply(
            &applicant,
            &ProjectId::from("P001"),
            RoomType::TwoRoom,
            today(),
        )
        .expect("application");
    service.approve(&application.header.id).expect("approved");
    let router = allocation_router(service.clone());

    let not_yet = router
        .clone()
        .oneshot(get("/api/v1/applicants/A1/receipt"))
        .await
        .expect("route executes");
    assert_error_kind(not_yet, StatusCode::UNPROCESSABLE_ENTITY, "precondition_failed").await;

    let booking = router
        .clone()
        .oneshot(post_json(
            "/api/v1/bookings",
            json!({ "applicant_id": "A1", "today": "2025-03-02" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(booking.status(), StatusCode::CREATED);
    let booking = body_json(booking).await;
    let booking_id = booking["id"].as_str().expect("booking id").to_string();
    assert_eq!(booking["application_id"], "R001");

    service
        .approve(&RequestId::from(booking_id.as_str()))
        .expect("booking approved");

    let receipt = router
        .oneshot(get("/api/v1/applicants/A1/receipt"))
        .await
        .expect("route executes");
    assert_eq!(receipt.status(), StatusCode::OK);
    let receipt = body_json(receipt).await;
    assert_eq!(receipt["project_name"], "Acacia Breeze");
    assert_eq!(receipt["price"], 350_000);
}

#[tokio::test]
async fn session_route_hides_password_hash() {
    let router = allocation_router(Arc::new(seeded_service()));

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/sessions",
            json!({ "user_id": "M001", "password": PASSWORD }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["role"], "manager");
    assert!(payload["profile"].get("password_hash").is_none());

    let denied = router
        .oneshot(post_json(
            "/api/v1/sessions",
            json!({ "user_id": "M001", "password": "guess" }),
        ))
        .await
        .expect("route executes");
    assert_error_kind(denied, StatusCode::UNAUTHORIZED, "invalid_credentials").await;
}

#[tokio::test]
async fn project_requests_route_filters_by_status() {
    let service = Arc::new(seeded_service());
    service
        .register_officer(&UserId::from("O1"), &ProjectId::from("P001"), today())
        .expect("registration");
    let router = allocation_router(service);

    let response = router
        .clone()
        .oneshot(get("/api/v1/projects/P001/requests?status=pending"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
    assert_eq!(payload[0]["kind"], "officer_application");

    let response = router
        .oneshot(get("/api/v1/projects/P001/requests?status=approved"))
        .await
        .expect("route executes");
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn create_project_route_returns_created_project() {
    let router = allocation_router(Arc::new(seeded_service()));

    let response = router
        .oneshot(post_json(
            "/api/v1/projects",
            json!({
                "manager_id": "M001",
                "name": "Cedar Point",
                "neighborhood": "Bedok",
                "open_date": "2025-08-01",
                "close_date": "2025-10-31",
                "two_room_units": 4,
                "two_room_price": 310000,
                "three_room_units": 2,
                "three_room_price": 430000,
                "officer_slots": 5,
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = body_json(response).await;
    assert_eq!(payload["id"], "P002");
    assert_eq!(payload["visible"], false);
    assert_eq!(payload["two_room"]["available"], 4);
}

#[tokio::test]
async fn applicable_projects_handler_uses_given_day() {
    let service = Arc::new(seeded_service());

    let open = router::applicable_projects_handler(
        State(service.clone()),
        Path("A1".to_string()),
        Query(TodayQuery {
            today: Some(today()),
        }),
    )
    .await;
    assert_eq!(open.status(), StatusCode::OK);
    assert_eq!(body_json(open).await.as_array().map(Vec::len), Some(1));

    let closed = router::applicable_projects_handler(
        State(service),
        Path("A1".to_string()),
        Query(TodayQuery {
            today: Some(date(2026, 1, 1)),
        }),
    )
    .await;
    assert_eq!(body_json(closed).await, json!([]));
}

#[tokio::test]
async fn visibility_handler_refuses_other_managers() {
    let service = Arc::new(seeded_service());

    let response = router::visibility_handler(
        State(service),
        Path("P001".to_string()),
        axum::Json(router::VisibilityPayload {
            manager_id: UserId::from("M002"),
            visible: false,
        }),
    )
    .await;

    assert_error_kind(response, StatusCode::UNPROCESSABLE_ENTITY, "precondition_failed").await;
}

#[test]
fn storage_failures_map_to_server_errors() {
    assert_eq!(
        status_for(ErrorKind::Storage),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(status_for(ErrorKind::Codec), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(status_for(ErrorKind::CapacityExceeded), StatusCode::CONFLICT);
    assert_eq!(
        status_for(ErrorKind::InsufficientInventory),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}
