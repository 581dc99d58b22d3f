//! In-process scenario tests for the explicit side-effect surface: invoice
//! download, notifications, and the monthly summary report.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use bkd_daemon::{routes, state::AppState};
use bkd_db::ClientRecord;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn call(
    router: axum::Router,
    req: Request<axum::body::Body>,
) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, headers, body)
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

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

async fn create_with_client(state: &Arc<AppState>, client_id: Option<Uuid>) -> String {
    let mut body = json!({
        "nights": 3,
        "pricePerNight": 100.0,
        "cleaningFee": 50.0,
        "taxes": 10.0,
        "checkInDate": "2025-06-10T14:00:00Z",
        "checkOutDate": "2025-06-13T10:00:00Z"
    });
    if let Some(id) = client_id {
        body["clientId"] = json!(id.to_string());
    }
    let (status, _, resp) = call(
        routes::build_router(Arc::clone(state)),
        json_request("POST", "/v1/reservations", body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    parse_json(resp)["id"].as_str().unwrap().to_string()
}

async fn seed_ana(store: &bkd_db::MemStore) -> Uuid {
    let id = Uuid::new_v4();
    store
        .seed_client(ClientRecord {
            id,
            first_name: "Ana".into(),
            last_name: "Petrova".into(),
            email: Some("ana@example.com".into()),
        })
        .await;
    id
}

// ---------------------------------------------------------------------------
// GET /v1/reservations/:id/invoice
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invoice_download_has_document_headers_and_totals() {
    let (state, store, _) = AppState::in_memory();
    let ana = seed_ana(&store).await;
    let id = create_with_client(&state, Some(ana)).await;

    let (status, headers, body) = call(
        routes::build_router(state),
        get(&format!("/v1/reservations/{id}/invoice")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
    assert!(headers
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("invoice-"));

    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("Ana Petrova"));
    assert!(text.contains("$360.00"));
}

#[tokio::test]
async fn invoice_for_unknown_reservation_is_404() {
    let (state, _, _) = AppState::in_memory();
    let (status, _, _) = call(
        routes::build_router(state),
        get(&format!("/v1/reservations/{}/invoice", Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// POST /v1/reservations/:id/notify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notify_delivers_via_console_mailer() {
    let (state, store, mailer) = AppState::in_memory();
    let ana = seed_ana(&store).await;
    let id = create_with_client(&state, Some(ana)).await;

    let (status, _, body) = call(
        routes::build_router(state),
        json_request(
            "POST",
            &format!("/v1/reservations/{id}/notify"),
            json!({ "kind": "confirmation" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let resp = parse_json(body);
    assert_eq!(resp["sideEffects"][0]["ok"], true);
    assert_eq!(resp["sideEffects"][0]["kind"], "email:console");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");
    assert!(sent[0].subject.contains("confirmed"));
}

#[tokio::test]
async fn notify_without_client_email_is_400() {
    let (state, _, mailer) = AppState::in_memory();
    let id = create_with_client(&state, None).await;

    let (status, _, body) = call(
        routes::build_router(state),
        json_request(
            "POST",
            &format!("/v1/reservations/{id}/notify"),
            json!({ "kind": "confirmation" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(parse_json(body)["error"].as_str().unwrap().contains("email"));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn payment_received_notification_attaches_invoice() {
    let (state, store, mailer) = AppState::in_memory();
    let ana = seed_ana(&store).await;
    let id = create_with_client(&state, Some(ana)).await;

    // Register a payment first, then notify.
    let (status, _, _) = call(
        routes::build_router(Arc::clone(&state)),
        json_request(
            "POST",
            &format!("/v1/reservations/{id}/payments"),
            json!({ "amount": 200.0, "paymentMethod": "card" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = call(
        routes::build_router(state),
        json_request(
            "POST",
            &format!("/v1/reservations/{id}/notify"),
            json!({ "kind": "payment_received" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    let attachment = sent[0].attachment.as_ref().expect("invoice attached");
    assert!(attachment.filename.starts_with("invoice-"));
    assert!(sent[0].body.contains("$200.00"));
}

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn monthly_summary_document_covers_the_month() {
    let (state, _, _) = AppState::in_memory();
    create_with_client(&state, None).await; // check-in 2025-06-10

    let (status, headers, body) = call(
        routes::build_router(state),
        get("/v1/reports/monthly-summary?month=2025-06"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("summary-2025-06"));

    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("Reservations: 1"));
    assert!(text.contains("$360.00"));
}

#[tokio::test]
async fn monthly_summary_rejects_bad_month() {
    let (state, _, _) = AppState::in_memory();
    let (status, _, _) = call(
        routes::build_router(state),
        get("/v1/reports/monthly-summary?month=June"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_email_reports_invalid_recipient_as_side_effect() {
    let (state, _, mailer) = AppState::in_memory();
    create_with_client(&state, None).await;

    let (status, _, body) = call(
        routes::build_router(state),
        json_request(
            "POST",
            "/v1/reports/monthly-summary/email",
            json!({ "month": "2025-06", "to": "not-an-address" }),
        ),
    )
    .await;
    // The report generation succeeded; the delivery failure rides the side
    // effect channel instead of failing the request.
    assert_eq!(status, StatusCode::OK);
    let resp = parse_json(body);
    assert_eq!(resp["sideEffects"][0]["ok"], false);
    assert!(resp["sideEffects"][0]["error"]
        .as_str()
        .unwrap()
        .contains("invalid recipient"));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn summary_email_delivers_with_attachment() {
    let (state, _, mailer) = AppState::in_memory();
    create_with_client(&state, None).await;

    let (status, _, body) = call(
        routes::build_router(state),
        json_request(
            "POST",
            "/v1/reports/monthly-summary/email",
            json!({ "month": "2025-06", "to": "ops@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["sideEffects"][0]["ok"], true);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].attachment.as_ref().unwrap().filename,
        "summary-2025-06.txt"
    );
}
