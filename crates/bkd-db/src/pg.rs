//! Postgres implementation of the reservation store.
//!
//! All queries are runtime-bound (`sqlx::query` + `bind` + `try_get`);
//! client/apartment display fields come from read-time left joins. Payment
//! registration is one transaction: the ledger row and the parent balance
//! update commit or roll back together.

use async_trait::async_trait;
use bkd_pricing::ResolvedUpdate;
use bkd_query::ReservationQuery;
use bkd_schemas::{
    Cents, NewPayment, NewReservation, PaymentStatus, Reservation, ReservationPayment,
    ReservationStatus,
};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{rebalance_after_payment, NewReservationDerived, ReservationStore};

/// Shared SELECT head: one reservation row plus joined display fields.
const SELECT_RESERVATION: &str = r#"
select
  r.id,
  r.apartment_id,
  r.client_id,
  r.check_in,
  r.check_out,
  r.nights,
  r.price_per_night,
  r.cleaning_fee,
  r.cancellation_fee,
  r.other_expenses,
  r.parking_fee,
  r.taxes,
  r.total_amount,
  r.amount_paid,
  r.amount_due,
  r.payment_status,
  r.status,
  r.notes,
  r.version,
  r.created_at,
  c.first_name as client_name,
  c.last_name as client_lastname,
  c.email as client_email,
  a.address as apartment_address
from reservations r
left join clients c on c.id = r.client_id
left join apartments a on a.id = r.apartment_id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn opt_cents(v: Option<i64>) -> Option<Cents> {
    v.map(Cents::new)
}

/// Escape LIKE metacharacters before wrapping a user value in wildcards.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn row_to_reservation(row: &PgRow) -> Result<Reservation, StoreError> {
    let id: Uuid = row.try_get("id")?;

    let status_raw: String = row.try_get("status")?;
    let status = ReservationStatus::parse(&status_raw).map_err(|e| StoreError::Corrupt {
        id,
        message: e.to_string(),
    })?;
    let payment_status_raw: String = row.try_get("payment_status")?;
    let payment_status =
        PaymentStatus::parse(&payment_status_raw).map_err(|e| StoreError::Corrupt {
            id,
            message: e.to_string(),
        })?;

    Ok(Reservation {
        id,
        apartment_id: row.try_get("apartment_id")?,
        client_id: row.try_get("client_id")?,
        check_in: row.try_get("check_in")?,
        check_out: row.try_get("check_out")?,
        nights: row.try_get("nights")?,
        price_per_night: opt_cents(row.try_get("price_per_night")?),
        cleaning_fee: opt_cents(row.try_get("cleaning_fee")?),
        cancellation_fee: opt_cents(row.try_get("cancellation_fee")?),
        other_expenses: opt_cents(row.try_get("other_expenses")?),
        parking_fee: opt_cents(row.try_get("parking_fee")?),
        taxes: opt_cents(row.try_get("taxes")?),
        total_amount: opt_cents(row.try_get("total_amount")?),
        amount_paid: Cents::new(row.try_get("amount_paid")?),
        amount_due: opt_cents(row.try_get("amount_due")?),
        payment_status,
        status,
        notes: row.try_get("notes")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        client_name: row.try_get("client_name")?,
        client_lastname: row.try_get("client_lastname")?,
        client_email: row.try_get("client_email")?,
        apartment_address: row.try_get("apartment_address")?,
    })
}

fn row_to_payment(row: &PgRow) -> Result<ReservationPayment, StoreError> {
    Ok(ReservationPayment {
        id: row.try_get("id")?,
        reservation_id: row.try_get("reservation_id")?,
        amount: Cents::new(row.try_get("amount")?),
        payment_date: row.try_get("payment_date")?,
        payment_method: row.try_get("payment_method")?,
        payment_reference: row.try_get("payment_reference")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ReservationStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Reservation, StoreError> {
        let sql = format!("{SELECT_RESERVATION} where r.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_reservation(&row),
            None => Err(StoreError::NotFound { id }),
        }
    }

    async fn list(&self, query: &ReservationQuery) -> Result<Vec<Reservation>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_RESERVATION);
        qb.push(" where true");

        if let Some(start) = query.start {
            qb.push(" and r.check_in >= ").push_bind(start);
        }
        if let Some(end) = query.end {
            qb.push(" and r.check_out <= ").push_bind(end);
        }
        if let Some(status) = query.status {
            qb.push(" and r.status = ").push_bind(status.as_str());
        }
        if let Some(name) = &query.client_name {
            qb.push(" and c.first_name ilike ")
                .push_bind(like_pattern(name));
        }
        if let Some(lastname) = &query.client_lastname {
            qb.push(" and c.last_name ilike ")
                .push_bind(like_pattern(lastname));
        }
        if let Some(email) = &query.client_email {
            qb.push(" and c.email = ").push_bind(email.clone());
        }
        if let Some(q) = &query.q {
            let pattern = like_pattern(q);
            qb.push(" and (c.first_name ilike ")
                .push_bind(pattern.clone())
                .push(" or c.last_name ilike ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(window) = query.upcoming {
            qb.push(" and r.check_in is not null and r.check_in >= ")
                .push_bind(window.from);
            if let Some(until) = window.until {
                qb.push(" and r.check_in < ").push_bind(until);
            }
        }

        qb.push(" order by r.check_in desc nulls last, r.created_at desc");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_reservation).collect()
    }

    async fn insert(
        &self,
        new: &NewReservation,
        derived: NewReservationDerived,
    ) -> Result<Reservation, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            insert into reservations (
              id, apartment_id, client_id, check_in, check_out,
              nights, price_per_night, cleaning_fee, cancellation_fee,
              other_expenses, parking_fee, taxes,
              total_amount, amount_paid, amount_due, payment_status,
              status, notes, version, created_at
            ) values (
              $1, $2, $3, $4, $5,
              $6, $7, $8, $9,
              $10, $11, $12,
              $13, 0, $14, $15,
              $16, $17, 1, $18
            )
            "#,
        )
        .bind(id)
        .bind(new.apartment_id)
        .bind(new.client_id)
        .bind(new.check_in)
        .bind(new.check_out)
        .bind(new.nights)
        .bind(new.price_per_night.raw())
        .bind(new.cleaning_fee.raw())
        .bind(new.cancellation_fee.raw())
        .bind(new.other_expenses.raw())
        .bind(new.parking_fee.raw())
        .bind(new.taxes.raw())
        .bind(derived.total_amount.raw())
        .bind(derived.amount_due.raw())
        .bind(derived.payment_status.as_str())
        .bind(ReservationStatus::Pending.as_str())
        .bind(new.notes.clone())
        .bind(derived.created_at)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    async fn update(
        &self,
        id: Uuid,
        update: &ResolvedUpdate,
        expected_version: Option<i64>,
    ) -> Result<Reservation, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("update reservations set version = version + 1");

        if let Some(v) = update.apartment_id {
            qb.push(", apartment_id = ").push_bind(v);
        }
        if let Some(v) = update.client_id {
            qb.push(", client_id = ").push_bind(v);
        }
        if let Some(v) = update.check_in {
            qb.push(", check_in = ").push_bind(v);
        }
        if let Some(v) = update.check_out {
            qb.push(", check_out = ").push_bind(v);
        }
        if let Some(v) = update.nights {
            qb.push(", nights = ").push_bind(v);
        }
        if let Some(v) = update.price_per_night {
            qb.push(", price_per_night = ").push_bind(v.raw());
        }
        if let Some(v) = update.cleaning_fee {
            qb.push(", cleaning_fee = ").push_bind(v.raw());
        }
        if let Some(v) = update.cancellation_fee {
            qb.push(", cancellation_fee = ").push_bind(v.raw());
        }
        if let Some(v) = update.other_expenses {
            qb.push(", other_expenses = ").push_bind(v.raw());
        }
        if let Some(v) = update.parking_fee {
            qb.push(", parking_fee = ").push_bind(v.raw());
        }
        if let Some(v) = update.taxes {
            qb.push(", taxes = ").push_bind(v.raw());
        }
        if let Some(v) = update.amount_paid {
            qb.push(", amount_paid = ").push_bind(v.raw());
        }
        if let Some(v) = update.total_amount {
            qb.push(", total_amount = ").push_bind(v.raw());
        }
        if let Some(v) = update.amount_due {
            qb.push(", amount_due = ").push_bind(v.raw());
        }
        if let Some(v) = update.payment_status {
            qb.push(", payment_status = ").push_bind(v.as_str());
        }
        if let Some(v) = update.status {
            qb.push(", status = ").push_bind(v.as_str());
        }
        if let Some(v) = &update.notes {
            qb.push(", notes = ").push_bind(v.clone());
        }

        qb.push(" where id = ").push_bind(id);
        if let Some(ev) = expected_version {
            qb.push(" and version = ").push_bind(ev);
        }

        let res = qb.build().execute(&self.pool).await?;
        if res.rows_affected() == 0 {
            return Err(self.explain_missed_update(id, expected_version).await);
        }

        self.get(id).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let res = sqlx::query(
            "update reservations set status = $1, version = version + 1 where id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        self.get(id).await
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Reservation, StoreError> {
        let res = sqlx::query(
            "update reservations set payment_status = $1, version = version + 1 where id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = sqlx::query("delete from reservations where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    async fn register_payment(
        &self,
        reservation_id: Uuid,
        payment: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Reservation, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the parent row for the duration of the ledger append so the
        // balance update cannot race a concurrent payment.
        let row = sqlx::query(
            "select total_amount, amount_paid from reservations where id = $1 for update",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(StoreError::NotFound { id: reservation_id });
        };
        let total = opt_cents(row.try_get("total_amount")?);
        let paid = Cents::new(row.try_get("amount_paid")?);

        let payment_date = payment.payment_date.unwrap_or(now);
        sqlx::query(
            r#"
            insert into reservation_payments (
              id, reservation_id, amount, payment_date, payment_method,
              payment_reference, notes, created_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reservation_id)
        .bind(payment.amount.raw())
        .bind(payment_date)
        .bind(payment.payment_method.clone())
        .bind(payment.payment_reference.clone())
        .bind(payment.notes.clone())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let new_paid = paid.saturating_add(payment.amount);
        let (due, payment_status) = rebalance_after_payment(total, new_paid);

        sqlx::query(
            r#"
            update reservations
            set amount_paid = $1,
                amount_due = $2,
                payment_status = $3,
                version = version + 1
            where id = $4
            "#,
        )
        .bind(new_paid.raw())
        .bind(due.map(|c| c.raw()))
        .bind(payment_status.as_str())
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(reservation_id).await
    }

    async fn payments(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationPayment>, StoreError> {
        let exists: Option<(i64,)> =
            sqlx::query_as("select 1::bigint from reservations where id = $1")
                .bind(reservation_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound { id: reservation_id });
        }

        let rows = sqlx::query(
            r#"
            select id, reservation_id, amount, payment_date, payment_method,
                   payment_reference, notes, created_at
            from reservation_payments
            where reservation_id = $1
            order by payment_date desc, created_at desc
            "#,
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_payment).collect()
    }

    async fn checkin_due(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        let sql = format!(
            "{SELECT_RESERVATION} where r.status = 'confirmed' \
             and r.check_in is not null and r.check_in <= $1 \
             order by r.check_in asc"
        );
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_reservation).collect()
    }
}

impl PgStore {
    /// An UPDATE matched zero rows: either the row is gone or the version
    /// guard rejected it. Re-read to tell the caller which.
    async fn explain_missed_update(&self, id: Uuid, expected_version: Option<i64>) -> StoreError {
        let found = sqlx::query("select version from reservations where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        match found {
            Ok(Some(row)) => {
                let found: i64 = row.try_get("version").unwrap_or(-1);
                StoreError::VersionConflict {
                    id,
                    expected: expected_version.unwrap_or(found),
                    found,
                }
            }
            Ok(None) => StoreError::NotFound { id },
            Err(e) => StoreError::Database(e),
        }
    }
}
