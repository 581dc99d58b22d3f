//! In-process scenario tests for the reservation CRUD surface.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` against the in-memory state and
//! drives it via `tower::ServiceExt::oneshot` — no network I/O required.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use bkd_daemon::{routes, state::AppState};
use bkd_db::MemStore;
use bkd_schemas::{Cents, PaymentStatus, Reservation, ReservationStatus};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> (Arc<AppState>, Arc<MemStore>) {
    let (state, store, _mailer) = AppState::in_memory();
    (state, store)
}

async fn call(
    router: axum::Router,
    req: Request<axum::body::Body>,
) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<axum::body::Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn create_body() -> Value {
    json!({
        "nights": 3,
        "pricePerNight": 100.0,
        "cleaningFee": 50.0,
        "otherExpenses": 0.0,
        "parkingFee": 0.0,
        "taxes": 10.0,
        "checkInDate": "2025-06-10T14:00:00Z",
        "checkOutDate": "2025-06-13T10:00:00Z"
    })
}

async fn create(state: &Arc<AppState>) -> Value {
    let (status, body) = call(
        routes::build_router(Arc::clone(state)),
        json_request("POST", "/v1/reservations", create_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    parse_json(body)
}

// ---------------------------------------------------------------------------
// POST /v1/reservations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_computes_totals() {
    let (state, _) = make_state();
    let created = create(&state).await;

    assert_eq!(created["totalAmount"], 360.0);
    assert_eq!(created["amountDue"], 360.0);
    assert_eq!(created["amountPaid"], 0.0);
    assert_eq!(created["paymentStatus"], "pending");
    assert_eq!(created["status"], "pending");
    assert_eq!(created["version"], 1);
}

#[tokio::test]
async fn create_rejects_zero_nights() {
    let (state, _) = make_state();
    let mut body = create_body();
    body["nights"] = json!(0);
    let (status, resp) = call(
        routes::build_router(state),
        json_request("POST", "/v1/reservations", body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json = parse_json(resp);
    assert!(
        json["error"].as_str().unwrap().contains("nights"),
        "error should name the field: {json}"
    );
}

#[tokio::test]
async fn create_rejects_negative_fee() {
    let (state, _) = make_state();
    let mut body = create_body();
    body["cleaningFee"] = json!(-5.0);
    let (status, resp) = call(
        routes::build_router(state),
        json_request("POST", "/v1/reservations", body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(resp)["error"]
        .as_str()
        .unwrap()
        .contains("cleaningFee"));
}

// ---------------------------------------------------------------------------
// GET /v1/reservations/:id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_unknown_id_is_404() {
    let (state, _) = make_state();
    let (status, _) = call(
        routes::build_router(state),
        get_request(&format!("/v1/reservations/{}", Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// PATCH /v1/reservations/:id — status-only short circuit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_only_update_leaves_charges_untouched() {
    let (state, _) = make_state();
    let created = create(&state).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = call(
        routes::build_router(Arc::clone(&state)),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}"),
            json!({ "status": "checked_in" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let updated = parse_json(body);
    assert_eq!(updated["status"], "checked_in");
    assert_eq!(updated["totalAmount"], 360.0);
    assert_eq!(updated["amountDue"], 360.0);
    assert_eq!(updated["version"], 2);
}

// ---------------------------------------------------------------------------
// PATCH /v1/reservations/:id — charge reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn price_update_recalculates_totals() {
    let (state, _) = make_state();
    let created = create(&state).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = call(
        routes::build_router(Arc::clone(&state)),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}"),
            json!({ "pricePerNight": 120.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let updated = parse_json(body);
    // 3*120 + 50 + 10 = 420
    assert_eq!(updated["totalAmount"], 420.0);
    assert_eq!(updated["amountDue"], 420.0);
    assert_eq!(updated["paymentStatus"], "pending");
}

#[tokio::test]
async fn missing_charge_field_fails_and_leaves_row_untouched() {
    let (state, store) = make_state();

    // A legacy row with no cleaning fee on record.
    let id = Uuid::new_v4();
    store
        .seed_reservation(Reservation {
            id,
            apartment_id: None,
            client_id: None,
            check_in: None,
            check_out: None,
            nights: Some(2),
            price_per_night: Some(Cents::new(9_000)),
            cleaning_fee: None,
            cancellation_fee: None,
            other_expenses: Some(Cents::ZERO),
            parking_fee: Some(Cents::ZERO),
            taxes: Some(Cents::ZERO),
            total_amount: Some(Cents::new(18_000)),
            amount_paid: Cents::ZERO,
            amount_due: Some(Cents::new(18_000)),
            payment_status: PaymentStatus::Pending,
            status: ReservationStatus::Pending,
            notes: None,
            version: 1,
            created_at: Utc.with_ymd_and_hms(2024, 11, 1, 8, 0, 0).unwrap(),
            client_name: None,
            client_lastname: None,
            client_email: None,
            apartment_address: None,
        })
        .await;

    let (status, body) = call(
        routes::build_router(Arc::clone(&state)),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}"),
            json!({ "pricePerNight": 120.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("cleaningFee"));

    // The stored record is left untouched.
    let (status, body) = call(
        routes::build_router(state),
        get_request(&format!("/v1/reservations/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let row = parse_json(body);
    assert_eq!(row["pricePerNight"], 90.0);
    assert_eq!(row["totalAmount"], 180.0);
    assert_eq!(row["version"], 1);
}

// ---------------------------------------------------------------------------
// Workflow transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backward_transition_is_rejected() {
    let (state, _) = make_state();
    let created = create(&state).await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = call(
        routes::build_router(Arc::clone(&state)),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}/status"),
            json!({ "status": "checked_out" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // checked_out is terminal.
    let (status, body) = call(
        routes::build_router(state),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}/status"),
            json!({ "status": "confirmed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("transition"));
}

#[tokio::test]
async fn cancel_is_reachable_from_non_terminal() {
    let (state, _) = make_state();
    let created = create(&state).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = call(
        routes::build_router(state),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}/status"),
            json!({ "status": "cancelled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["status"], "cancelled");
}

// ---------------------------------------------------------------------------
// Optimistic concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_expected_version_is_409() {
    let (state, _) = make_state();
    let created = create(&state).await;
    let id = created["id"].as_str().unwrap();

    // Move the row forward once.
    let (status, _) = call(
        routes::build_router(Arc::clone(&state)),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}"),
            json!({ "notes": "first writer" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Second writer still holds version 1.
    let (status, body) = call(
        routes::build_router(state),
        json_request(
            "PATCH",
            &format!("/v1/reservations/{id}"),
            json!({ "notes": "second writer", "expectedVersion": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("version"));
}

// ---------------------------------------------------------------------------
// DELETE /v1/reservations/:id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_then_get_is_404() {
    let (state, _) = make_state();
    let created = create(&state).await;
    let id = created["id"].as_str().unwrap();

    let del = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/reservations/{id}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = call(routes::build_router(Arc::clone(&state)), del).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        routes::build_router(state),
        get_request(&format!("/v1/reservations/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Empty updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_patch_is_rejected() {
    let (state, _) = make_state();
    let created = create(&state).await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = call(
        routes::build_router(state),
        json_request("PATCH", &format!("/v1/reservations/{id}"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
