//! Request and response types for the bkd-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded by
//! Axum and decoded by tests. No business logic lives here; reservation and
//! payment records themselves come from `bkd-schemas` and already carry the
//! camelCase wire mapping.

use bkd_schemas::{NotificationKind, PaymentStatus, ReservationPatch, ReservationStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

/// Uniform JSON error body for all non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ---------------------------------------------------------------------------
// PATCH /v1/reservations/:id
// ---------------------------------------------------------------------------

/// General update: a field patch plus the optional optimistic concurrency
/// token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateReservationRequest {
    #[serde(flatten)]
    pub patch: ReservationPatch,
    pub expected_version: Option<i64>,
}

// ---------------------------------------------------------------------------
// Status-only variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdateRequest {
    pub payment_status: PaymentStatus,
}

// ---------------------------------------------------------------------------
// Notifications / reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub kind: NotificationKind,
}

/// One attempted side effect, reported on its own channel. A failed side
/// effect never rolls back committed reservation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffect {
    pub kind: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResponse {
    pub reservation_id: Uuid,
    pub side_effects: Vec<SideEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryQuery {
    /// Month selector, `YYYY-MM`.
    pub month: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryEmailRequest {
    pub month: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEmailResponse {
    pub month: String,
    pub side_effects: Vec<SideEffect>,
}
