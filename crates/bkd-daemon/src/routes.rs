//! Axum router and all HTTP handlers for bkd-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.
//!
//! The handlers are the reservation lifecycle controller: they read current
//! state, run the pure pricing/reconciliation logic, write once, and only
//! then trigger explicitly requested side effects.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use bkd_db::NewReservationDerived;
use bkd_notify::{notification_content, Document, EmailAttachment, MonthRef, OutboundEmail};
use bkd_pricing::{
    amount_due, compute_total, derive_payment_status, reconcile, QuoteInputs, ReconcileOutcome,
    ResolvedUpdate,
};
use bkd_query::{ReservationFilterParams, ReservationQuery, UpcomingWindow};
use bkd_schemas::{
    Cents, NewPayment, NewReservation, NotificationKind, Reservation, ReservationPayment,
    ReservationStatus,
};
use chrono::{DateTime, TimeZone, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        HealthResponse, NotifyRequest, NotifyResponse, PaymentStatusUpdateRequest, SideEffect,
        StatusUpdateRequest, SummaryEmailRequest, SummaryEmailResponse, SummaryQuery,
        UpdateReservationRequest,
    },
    error::ApiError,
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route(
            "/v1/reservations",
            get(list_reservations).post(create_reservation),
        )
        .route("/v1/reservations/checkin-due", get(checkin_due))
        .route(
            "/v1/reservations/:id",
            get(get_reservation)
                .patch(update_reservation)
                .delete(delete_reservation),
        )
        .route("/v1/reservations/:id/status", patch(update_status))
        .route(
            "/v1/reservations/:id/payment-status",
            patch(update_payment_status),
        )
        .route(
            "/v1/reservations/:id/payments",
            get(list_payments).post(register_payment),
        )
        .route("/v1/reservations/:id/invoice", get(download_invoice))
        .route("/v1/reservations/:id/notify", post(notify))
        .route("/v1/reports/monthly-summary", get(monthly_summary))
        .route(
            "/v1/reports/monthly-summary/email",
            post(email_monthly_summary),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/reservations
// ---------------------------------------------------------------------------

pub(crate) async fn list_reservations(
    State(st): State<Arc<AppState>>,
    Query(params): Query<ReservationFilterParams>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    // Combination errors are reported before any store query executes.
    let query = ReservationQuery::validate(&params, Utc::now())?;
    let rows = st.store.list(&query).await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /v1/reservations/checkin-due
// ---------------------------------------------------------------------------

/// Confirmed reservations whose check-in window has opened. Exposed as a
/// query for an external scheduler; the daemon never transitions status on
/// its own.
pub(crate) async fn checkin_due(
    State(st): State<Arc<AppState>>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let rows = st.store.checkin_due(Utc::now()).await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /v1/reservations/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_reservation(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, ApiError> {
    Ok(Json(st.store.get(id).await?))
}

// ---------------------------------------------------------------------------
// POST /v1/reservations
// ---------------------------------------------------------------------------

pub(crate) async fn create_reservation(
    State(st): State<Arc<AppState>>,
    Json(new): Json<NewReservation>,
) -> Result<impl IntoResponse, ApiError> {
    new.validate()?;

    let total = compute_total(&QuoteInputs {
        nights: new.nights,
        price_per_night: new.price_per_night,
        cleaning_fee: new.cleaning_fee,
        other_expenses: new.other_expenses,
        parking_fee: new.parking_fee,
        taxes: new.taxes,
    })
    .map_err(|e| ApiError::Validation(e.to_string()))?;
    let due = amount_due(total, Cents::ZERO);

    let created = st
        .store
        .insert(
            &new,
            NewReservationDerived {
                total_amount: total,
                amount_due: due,
                payment_status: derive_payment_status(Cents::ZERO, due),
                created_at: Utc::now(),
            },
        )
        .await?;

    info!(reservation_id = %created.id, total = %total, "reservation created");
    Ok((StatusCode::CREATED, Json(created)))
}

// ---------------------------------------------------------------------------
// PATCH /v1/reservations/:id
// ---------------------------------------------------------------------------

pub(crate) async fn update_reservation(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReservationRequest>,
) -> Result<Json<Reservation>, ApiError> {
    let patch = &req.patch;
    if patch.is_empty() {
        return Err(ApiError::Validation("empty update".to_string()));
    }
    patch.validate()?;

    // Read current state before merging; the engine writes once afterwards.
    let current = st.store.get(id).await?;
    if let Some(next) = patch.status {
        ensure_transition(current.status, next)?;
    }

    let updated = match reconcile(&current, patch)? {
        ReconcileOutcome::StatusOnly(status) => {
            // Lightweight path unless the caller asked for the version
            // guard, which only the general update honors.
            match req.expected_version {
                Some(expected) => {
                    let u = ResolvedUpdate {
                        status: Some(status),
                        ..ResolvedUpdate::default()
                    };
                    st.store.update(id, &u, Some(expected)).await?
                }
                None => st.store.update_status(id, status).await?,
            }
        }
        ReconcileOutcome::Update(u) => st.store.update(id, &u, req.expected_version).await?,
    };

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// PATCH /v1/reservations/:id/status
// ---------------------------------------------------------------------------

pub(crate) async fn update_status(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Reservation>, ApiError> {
    let current = st.store.get(id).await?;
    ensure_transition(current.status, req.status)?;
    let updated = st.store.update_status(id, req.status).await?;
    info!(reservation_id = %id, status = req.status.as_str(), "status transition");
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// PATCH /v1/reservations/:id/payment-status
// ---------------------------------------------------------------------------

/// Administrative override; normal flows derive the payment status from the
/// ledger.
pub(crate) async fn update_payment_status(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentStatusUpdateRequest>,
) -> Result<Json<Reservation>, ApiError> {
    let updated = st.store.update_payment_status(id, req.payment_status).await?;
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /v1/reservations/:id
// ---------------------------------------------------------------------------

pub(crate) async fn delete_reservation(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    st.store.delete(id).await?;
    info!(reservation_id = %id, "reservation deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /v1/reservations/:id/payments
// ---------------------------------------------------------------------------

pub(crate) async fn register_payment(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payment): Json<NewPayment>,
) -> Result<impl IntoResponse, ApiError> {
    payment.validate()?;
    let updated = st.store.register_payment(id, &payment, Utc::now()).await?;
    info!(
        reservation_id = %id,
        amount = %payment.amount,
        paid = %updated.amount_paid,
        "payment registered"
    );
    Ok((StatusCode::CREATED, Json(updated)))
}

// ---------------------------------------------------------------------------
// GET /v1/reservations/:id/payments
// ---------------------------------------------------------------------------

pub(crate) async fn list_payments(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReservationPayment>>, ApiError> {
    Ok(Json(st.store.payments(id).await?))
}

// ---------------------------------------------------------------------------
// GET /v1/reservations/:id/invoice
// ---------------------------------------------------------------------------

pub(crate) async fn download_invoice(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let reservation = st.store.get(id).await?;
    let payments = st.store.payments(id).await?;
    let doc = st.renderer.render_invoice(&reservation, &payments);
    Ok(document_response(doc))
}

// ---------------------------------------------------------------------------
// POST /v1/reservations/:id/notify
// ---------------------------------------------------------------------------

pub(crate) async fn notify(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>, ApiError> {
    if req.kind == NotificationKind::MonthlySummary {
        return Err(ApiError::Validation(
            "monthly_summary is sent via /v1/reports/monthly-summary/email".to_string(),
        ));
    }

    let reservation = st.store.get(id).await?;
    let Some(to) = reservation.client_email.clone() else {
        return Err(ApiError::Validation(
            "reservation has no client email on record".to_string(),
        ));
    };

    let (subject, body) = notification_content(req.kind, &reservation);
    let attachment = if req.kind == NotificationKind::PaymentReceived {
        let payments = st.store.payments(id).await?;
        Some(to_attachment(
            st.renderer.render_invoice(&reservation, &payments),
        ))
    } else {
        None
    };

    let effect = send_and_report(
        &st,
        OutboundEmail {
            to,
            subject,
            body,
            attachment,
        },
    )
    .await;

    Ok(Json(NotifyResponse {
        reservation_id: id,
        side_effects: vec![effect],
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/reports/monthly-summary
// ---------------------------------------------------------------------------

pub(crate) async fn monthly_summary(
    State(st): State<Arc<AppState>>,
    Query(params): Query<SummaryQuery>,
) -> Result<Response, ApiError> {
    let month = parse_month(&params.month)?;
    let rows = reservations_in_month(&st, month).await?;
    let doc = st.renderer.render_monthly_summary(month, &rows);
    Ok(document_response(doc))
}

// ---------------------------------------------------------------------------
// POST /v1/reports/monthly-summary/email
// ---------------------------------------------------------------------------

pub(crate) async fn email_monthly_summary(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SummaryEmailRequest>,
) -> Result<Json<SummaryEmailResponse>, ApiError> {
    let month = parse_month(&req.month)?;
    let rows = reservations_in_month(&st, month).await?;
    let doc = st.renderer.render_monthly_summary(month, &rows);

    let effect = send_and_report(
        &st,
        OutboundEmail {
            to: req.to,
            subject: format!("Monthly reservation summary {}", month.label()),
            body: "The monthly summary is attached.".to_string(),
            attachment: Some(to_attachment(doc)),
        },
    )
    .await;

    Ok(Json(SummaryEmailResponse {
        month: month.label(),
        side_effects: vec![effect],
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_transition(from: ReservationStatus, to: ReservationStatus) -> Result<(), ApiError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "invalid status transition: {} -> {}",
            from.as_str(),
            to.as_str()
        )))
    }
}

fn parse_month(s: &str) -> Result<MonthRef, ApiError> {
    let bad = || ApiError::Validation(format!("month must be YYYY-MM, got {s:?}"));
    let (year, month) = s.split_once('-').ok_or_else(bad)?;
    let year: i32 = year.parse().map_err(|_| bad())?;
    let month: u32 = month.parse().map_err(|_| bad())?;
    if !(1..=12).contains(&month) {
        return Err(bad());
    }
    Ok(MonthRef { year, month })
}

fn month_window(m: MonthRef) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let bad = || ApiError::Validation(format!("month out of range: {}", m.label()));
    let from = Utc
        .with_ymd_and_hms(m.year, m.month, 1, 0, 0, 0)
        .single()
        .ok_or_else(bad)?;
    let (next_year, next_month) = if m.month == 12 {
        (m.year + 1, 1)
    } else {
        (m.year, m.month + 1)
    };
    let until = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(bad)?;
    Ok((from, until))
}

/// All reservations whose check-in falls inside the given month.
async fn reservations_in_month(
    st: &AppState,
    month: MonthRef,
) -> Result<Vec<Reservation>, ApiError> {
    let (from, until) = month_window(month)?;
    let query = ReservationQuery {
        upcoming: Some(UpcomingWindow {
            from,
            until: Some(until),
        }),
        ..ReservationQuery::default()
    };
    Ok(st.store.list(&query).await?)
}

fn to_attachment(doc: Document) -> EmailAttachment {
    EmailAttachment {
        filename: doc.filename,
        content_type: doc.content_type.to_string(),
        bytes: doc.bytes,
    }
}

fn document_response(doc: Document) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", doc.filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(doc.content_type)),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            ),
        ],
        doc.bytes,
    )
        .into_response()
}

/// Fire one best-effort email. Failure is logged and reported on the side
/// effect channel; it never fails the surrounding operation.
async fn send_and_report(st: &AppState, mail: OutboundEmail) -> SideEffect {
    let to = mail.to.clone();
    match st.mailer.send(mail).await {
        Ok(receipt) => SideEffect {
            kind: format!("email:{}", receipt.transport),
            ok: true,
            error: None,
        },
        Err(e) => {
            warn!(to = %to, error = %e, "notification side effect failed");
            SideEffect {
                kind: "email".to_string(),
                ok: false,
                error: Some(e.to_string()),
            }
        }
    }
}
