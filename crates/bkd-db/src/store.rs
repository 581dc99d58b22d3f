//! The store seam.
//!
//! Components receive the store as an injected `Arc<dyn ReservationStore>`
//! with explicit lifecycle — no module-level singleton. Two implementations
//! exist: [`crate::PgStore`] (Postgres, production) and [`crate::MemStore`]
//! (in-memory twin for tests and dev mode).

use async_trait::async_trait;
use bkd_pricing::ResolvedUpdate;
use bkd_query::ReservationQuery;
use bkd_schemas::{
    Cents, NewPayment, NewReservation, PaymentStatus, Reservation, ReservationPayment,
    ReservationStatus,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

/// Derived values computed by the lifecycle controller at creation time.
///
/// The store never re-derives totals on insert; the calculator already ran.
#[derive(Copy, Clone, Debug)]
pub struct NewReservationDerived {
    pub total_amount: Cents,
    pub amount_due: Cents,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Fetch one reservation with its joined display fields.
    async fn get(&self, id: Uuid) -> Result<Reservation, StoreError>;

    /// Filtered listing, most-recent check-in first (nulls last).
    async fn list(&self, query: &ReservationQuery) -> Result<Vec<Reservation>, StoreError>;

    /// Insert a new reservation; the store assigns the id. Workflow status
    /// starts at `pending`.
    async fn insert(
        &self,
        new: &NewReservation,
        derived: NewReservationDerived,
    ) -> Result<Reservation, StoreError>;

    /// Apply a reconciled field set. `expected_version`, when supplied,
    /// enables the optimistic concurrency check; every successful write
    /// bumps the version.
    async fn update(
        &self,
        id: Uuid,
        update: &ResolvedUpdate,
        expected_version: Option<i64>,
    ) -> Result<Reservation, StoreError>;

    /// Lightweight status-only write (the reconciliation short-circuit).
    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError>;

    /// Administrative payment-status override.
    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Reservation, StoreError>;

    /// Explicit admin delete; reservations otherwise remain for
    /// record-keeping.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Append one immutable ledger entry and re-derive the parent's
    /// balance atomically. Returns the reservation in its post-payment
    /// state.
    async fn register_payment(
        &self,
        reservation_id: Uuid,
        payment: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Reservation, StoreError>;

    /// The audit trail for one reservation, most recent first.
    async fn payments(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationPayment>, StoreError>;

    /// Confirmed reservations whose check-in window has opened — the
    /// scheduled-status-update helper, exposed as a query.
    async fn checkin_due(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError>;
}

/// Post-payment balance for a reservation, shared by both store
/// implementations so Postgres and memory cannot disagree.
pub(crate) fn rebalance_after_payment(
    total: Option<Cents>,
    new_paid: Cents,
) -> (Option<Cents>, PaymentStatus) {
    match total {
        Some(total) => {
            let due = bkd_pricing::amount_due(total, new_paid);
            (Some(due), bkd_pricing::derive_payment_status(new_paid, due))
        }
        // Legacy row without a stored total: the balance stays unknown and
        // the status is derived from the paid amount alone.
        None => (
            None,
            if new_paid.is_positive() {
                PaymentStatus::Partial
            } else {
                PaymentStatus::Pending
            },
        ),
    }
}
