//! In-memory reservation store.
//!
//! The memory twin of [`crate::PgStore`]: same trait, same filter semantics
//! (both defer to `bkd_query::ReservationQuery::matches`), no database.
//! Used by scenario tests and by dev mode (`store: memory`). Payment
//! registration happens under a single write lock, mirroring the Postgres
//! transaction boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use bkd_pricing::ResolvedUpdate;
use bkd_query::ReservationQuery;
use bkd_schemas::{
    Cents, NewPayment, NewReservation, PaymentStatus, Reservation, ReservationPayment,
    ReservationStatus,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{rebalance_after_payment, NewReservationDerived, ReservationStore};

/// Read-only client reference data (owned by the catalog collaborator).
#[derive(Clone, Debug)]
pub struct ClientRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

/// Read-only apartment reference data.
#[derive(Clone, Debug)]
pub struct ApartmentRecord {
    pub id: Uuid,
    pub address: String,
}

#[derive(Default)]
struct Inner {
    reservations: HashMap<Uuid, Reservation>,
    payments: Vec<ReservationPayment>,
    clients: HashMap<Uuid, ClientRecord>,
    apartments: HashMap<Uuid, ApartmentRecord>,
}

#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed client reference data (tests / dev fixtures). The engine itself
    /// never writes clients.
    pub async fn seed_client(&self, client: ClientRecord) {
        self.inner.write().await.clients.insert(client.id, client);
    }

    /// Seed apartment reference data.
    pub async fn seed_apartment(&self, apartment: ApartmentRecord) {
        self.inner
            .write()
            .await
            .apartments
            .insert(apartment.id, apartment);
    }

    /// Seed a raw reservation row, bypassing creation validation. Lets test
    /// fixtures reproduce legacy rows with missing charge fields.
    pub async fn seed_reservation(&self, reservation: Reservation) {
        self.inner
            .write()
            .await
            .reservations
            .insert(reservation.id, reservation);
    }

    /// Fill in the joined display fields for one stored row.
    fn resolve(inner: &Inner, r: &Reservation) -> Reservation {
        let mut out = r.clone();
        if let Some(client) = r.client_id.and_then(|id| inner.clients.get(&id)) {
            out.client_name = Some(client.first_name.clone());
            out.client_lastname = Some(client.last_name.clone());
            out.client_email = client.email.clone();
        }
        if let Some(apartment) = r.apartment_id.and_then(|id| inner.apartments.get(&id)) {
            out.apartment_address = Some(apartment.address.clone());
        }
        out
    }
}

/// check_in DESC nulls last, then created_at DESC — the listing order both
/// stores promise.
fn sort_most_recent_first(rows: &mut [Reservation]) {
    rows.sort_by(|a, b| {
        match (a.check_in, b.check_in) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn apply_update(r: &mut Reservation, u: &ResolvedUpdate) {
    if let Some(v) = u.apartment_id {
        r.apartment_id = Some(v);
    }
    if let Some(v) = u.client_id {
        r.client_id = Some(v);
    }
    if let Some(v) = u.check_in {
        r.check_in = Some(v);
    }
    if let Some(v) = u.check_out {
        r.check_out = Some(v);
    }
    if let Some(v) = u.nights {
        r.nights = Some(v);
    }
    if let Some(v) = u.price_per_night {
        r.price_per_night = Some(v);
    }
    if let Some(v) = u.cleaning_fee {
        r.cleaning_fee = Some(v);
    }
    if let Some(v) = u.cancellation_fee {
        r.cancellation_fee = Some(v);
    }
    if let Some(v) = u.other_expenses {
        r.other_expenses = Some(v);
    }
    if let Some(v) = u.parking_fee {
        r.parking_fee = Some(v);
    }
    if let Some(v) = u.taxes {
        r.taxes = Some(v);
    }
    if let Some(v) = u.amount_paid {
        r.amount_paid = v;
    }
    if let Some(v) = u.total_amount {
        r.total_amount = Some(v);
    }
    if let Some(v) = u.amount_due {
        r.amount_due = Some(v);
    }
    if let Some(v) = u.payment_status {
        r.payment_status = v;
    }
    if let Some(v) = u.status {
        r.status = v;
    }
    if let Some(v) = &u.notes {
        r.notes = Some(v.clone());
    }
}

#[async_trait]
impl ReservationStore for MemStore {
    async fn get(&self, id: Uuid) -> Result<Reservation, StoreError> {
        let inner = self.inner.read().await;
        inner
            .reservations
            .get(&id)
            .map(|r| MemStore::resolve(&inner, r))
            .ok_or(StoreError::NotFound { id })
    }

    async fn list(&self, query: &ReservationQuery) -> Result<Vec<Reservation>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Reservation> = inner
            .reservations
            .values()
            .map(|r| MemStore::resolve(&inner, r))
            .filter(|r| query.matches(r))
            .collect();
        sort_most_recent_first(&mut rows);
        Ok(rows)
    }

    async fn insert(
        &self,
        new: &NewReservation,
        derived: NewReservationDerived,
    ) -> Result<Reservation, StoreError> {
        let mut inner = self.inner.write().await;
        let id = Uuid::new_v4();
        let row = Reservation {
            id,
            apartment_id: new.apartment_id,
            client_id: new.client_id,
            check_in: new.check_in,
            check_out: new.check_out,
            nights: Some(new.nights),
            price_per_night: Some(new.price_per_night),
            cleaning_fee: Some(new.cleaning_fee),
            cancellation_fee: Some(new.cancellation_fee),
            other_expenses: Some(new.other_expenses),
            parking_fee: Some(new.parking_fee),
            taxes: Some(new.taxes),
            total_amount: Some(derived.total_amount),
            amount_paid: Cents::ZERO,
            amount_due: Some(derived.amount_due),
            payment_status: derived.payment_status,
            status: ReservationStatus::Pending,
            notes: new.notes.clone(),
            version: 1,
            created_at: derived.created_at,
            client_name: None,
            client_lastname: None,
            client_email: None,
            apartment_address: None,
        };
        inner.reservations.insert(id, row.clone());
        Ok(MemStore::resolve(&inner, &row))
    }

    async fn update(
        &self,
        id: Uuid,
        update: &ResolvedUpdate,
        expected_version: Option<i64>,
    ) -> Result<Reservation, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(row) = inner.reservations.get_mut(&id) else {
            return Err(StoreError::NotFound { id });
        };
        if let Some(expected) = expected_version {
            if row.version != expected {
                return Err(StoreError::VersionConflict {
                    id,
                    expected,
                    found: row.version,
                });
            }
        }
        apply_update(row, update);
        row.version += 1;
        let row = row.clone();
        Ok(MemStore::resolve(&inner, &row))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(row) = inner.reservations.get_mut(&id) else {
            return Err(StoreError::NotFound { id });
        };
        row.status = status;
        row.version += 1;
        let row = row.clone();
        Ok(MemStore::resolve(&inner, &row))
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Reservation, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(row) = inner.reservations.get_mut(&id) else {
            return Err(StoreError::NotFound { id });
        };
        row.payment_status = status;
        row.version += 1;
        let row = row.clone();
        Ok(MemStore::resolve(&inner, &row))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.reservations.remove(&id).is_none() {
            return Err(StoreError::NotFound { id });
        }
        inner.payments.retain(|p| p.reservation_id != id);
        Ok(())
    }

    async fn register_payment(
        &self,
        reservation_id: Uuid,
        payment: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Reservation, StoreError> {
        // One lock acquisition covers both the ledger append and the parent
        // balance update.
        let mut inner = self.inner.write().await;
        if !inner.reservations.contains_key(&reservation_id) {
            return Err(StoreError::NotFound { id: reservation_id });
        }

        inner.payments.push(ReservationPayment {
            id: Uuid::new_v4(),
            reservation_id,
            amount: payment.amount,
            payment_date: payment.payment_date.unwrap_or(now),
            payment_method: payment.payment_method.clone(),
            payment_reference: payment.payment_reference.clone(),
            notes: payment.notes.clone(),
            created_at: now,
        });

        let row = inner
            .reservations
            .get_mut(&reservation_id)
            .expect("checked above");
        let new_paid = row.amount_paid.saturating_add(payment.amount);
        let (due, payment_status) = rebalance_after_payment(row.total_amount, new_paid);
        row.amount_paid = new_paid;
        row.amount_due = due;
        row.payment_status = payment_status;
        row.version += 1;

        let row = row.clone();
        Ok(MemStore::resolve(&inner, &row))
    }

    async fn payments(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationPayment>, StoreError> {
        let inner = self.inner.read().await;
        if !inner.reservations.contains_key(&reservation_id) {
            return Err(StoreError::NotFound { id: reservation_id });
        }
        let mut rows: Vec<ReservationPayment> = inner
            .payments
            .iter()
            .filter(|p| p.reservation_id == reservation_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn checkin_due(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Reservation> = inner
            .reservations
            .values()
            .filter(|r| {
                r.status == ReservationStatus::Confirmed
                    && r.check_in.is_some_and(|ci| ci <= now)
            })
            .map(|r| MemStore::resolve(&inner, r))
            .collect();
        rows.sort_by_key(|r| r.check_in);
        Ok(rows)
    }
}
