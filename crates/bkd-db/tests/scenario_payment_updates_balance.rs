//! Ledger scenario: a $360 stay settled in two payments.
//!
//! Registering a payment must append exactly one immutable ledger row and
//! re-derive the parent balance in the same atomic step.

use bkd_db::{MemStore, NewReservationDerived, ReservationStore, StoreError};
use bkd_pricing::{amount_due, compute_total, derive_payment_status, QuoteInputs};
use bkd_schemas::{Cents, NewPayment, NewReservation, PaymentStatus};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

fn now() -> chrono::DateTime<chrono::Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn new_reservation() -> NewReservation {
    NewReservation {
        apartment_id: None,
        client_id: None,
        check_in: Some(Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap()),
        check_out: Some(Utc.with_ymd_and_hms(2025, 6, 13, 10, 0, 0).unwrap()),
        nights: 3,
        price_per_night: Cents::new(10_000),
        cleaning_fee: Cents::new(5_000),
        cancellation_fee: Cents::ZERO,
        other_expenses: Cents::ZERO,
        parking_fee: Cents::ZERO,
        taxes: Cents::new(1_000),
        notes: None,
    }
}

fn derived_for(new: &NewReservation) -> NewReservationDerived {
    let total = compute_total(&QuoteInputs {
        nights: new.nights,
        price_per_night: new.price_per_night,
        cleaning_fee: new.cleaning_fee,
        other_expenses: new.other_expenses,
        parking_fee: new.parking_fee,
        taxes: new.taxes,
    })
    .expect("computable");
    let due = amount_due(total, Cents::ZERO);
    NewReservationDerived {
        total_amount: total,
        amount_due: due,
        payment_status: derive_payment_status(Cents::ZERO, due),
        created_at: now(),
    }
}

fn payment(amount: i64) -> NewPayment {
    NewPayment {
        amount: Cents::new(amount),
        payment_date: None,
        payment_method: "card".into(),
        payment_reference: None,
        notes: None,
    }
}

#[tokio::test]
async fn two_payments_settle_the_balance() {
    let store = MemStore::new();
    let new = new_reservation();
    let created = store.insert(&new, derived_for(&new)).await.unwrap();

    assert_eq!(created.total_amount, Some(Cents::new(36_000)));
    assert_eq!(created.amount_due, Some(Cents::new(36_000)));
    assert_eq!(created.payment_status, PaymentStatus::Pending);

    // First payment: $200.
    let after_first = store
        .register_payment(created.id, &payment(20_000), now())
        .await
        .unwrap();
    assert_eq!(after_first.amount_paid, Cents::new(20_000));
    assert_eq!(after_first.amount_due, Some(Cents::new(16_000)));
    assert_eq!(after_first.payment_status, PaymentStatus::Partial);

    // Second payment: $160 — settles exactly.
    let after_second = store
        .register_payment(created.id, &payment(16_000), now())
        .await
        .unwrap();
    assert_eq!(after_second.amount_paid, Cents::new(36_000));
    assert_eq!(after_second.amount_due, Some(Cents::ZERO));
    assert_eq!(after_second.payment_status, PaymentStatus::Complete);
}

#[tokio::test]
async fn ledger_is_ordered_most_recent_first() {
    let store = MemStore::new();
    let new = new_reservation();
    let created = store.insert(&new, derived_for(&new)).await.unwrap();

    let mut early = payment(5_000);
    early.payment_date = Some(Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap());
    let mut late = payment(7_000);
    late.payment_date = Some(Utc.with_ymd_and_hms(2025, 6, 5, 9, 0, 0).unwrap());

    store
        .register_payment(created.id, &early, now())
        .await
        .unwrap();
    store
        .register_payment(created.id, &late, now())
        .await
        .unwrap();

    let ledger = store.payments(created.id).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].amount, Cents::new(7_000));
    assert_eq!(ledger[1].amount, Cents::new(5_000));
}

#[tokio::test]
async fn payment_against_unknown_reservation_is_not_found() {
    let store = MemStore::new();
    let missing = Uuid::new_v4();
    let err = store
        .register_payment(missing, &payment(1_000), now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { id } if id == missing));

    // And the ledger append must not have happened.
    let err = store.payments(missing).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn overpayment_clamps_due_to_zero() {
    let store = MemStore::new();
    let new = new_reservation();
    let created = store.insert(&new, derived_for(&new)).await.unwrap();

    let after = store
        .register_payment(created.id, &payment(50_000), now())
        .await
        .unwrap();
    assert_eq!(after.amount_due, Some(Cents::ZERO));
    assert_eq!(after.payment_status, PaymentStatus::Complete);
}
