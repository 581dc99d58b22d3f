//! Reconciliation engine.
//!
//! Merges a partial update against the stored reservation and decides
//! whether the pricing invariants must be re-evaluated. The output is a
//! complete, internally consistent field set — never a payload where
//! `totalAmount` is new but `amountDue` is stale, or vice versa.

use bkd_schemas::{
    Cents, ChargeField, PaymentStatus, Reservation, ReservationPatch, ReservationStatus,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::quote::{amount_due, compute_total, derive_payment_status, QuoteInputs};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Recalculation was triggered but a required charge field is resolvable
    /// from neither the update nor the stored row. Never guessed at.
    MissingFields(Vec<ChargeField>),
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::MissingFields(fields) => {
                let names: Vec<&str> = fields.iter().map(|c| c.as_str()).collect();
                write!(f, "missing field(s) for calculation: {}", names.join(", "))
            }
        }
    }
}

impl std::error::Error for ReconcileError {}

// ---------------------------------------------------------------------------
// Output payload
// ---------------------------------------------------------------------------

/// The reconciled field set to persist. `None` means "leave untouched".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedUpdate {
    pub apartment_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,

    pub nights: Option<i64>,
    pub price_per_night: Option<Cents>,
    pub cleaning_fee: Option<Cents>,
    pub cancellation_fee: Option<Cents>,
    pub other_expenses: Option<Cents>,
    pub parking_fee: Option<Cents>,
    pub taxes: Option<Cents>,

    pub amount_paid: Option<Cents>,
    pub total_amount: Option<Cents>,
    pub amount_due: Option<Cents>,
    pub payment_status: Option<PaymentStatus>,

    pub status: Option<ReservationStatus>,
    pub notes: Option<String>,

    /// Whether the invariant calculator ran for this update.
    pub recalculated: bool,
}

/// What the engine decided to do with the request.
#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    /// The caller's intent was purely a workflow transition; skip the merge.
    StatusOnly(ReservationStatus),
    /// A full merged update payload.
    Update(Box<ResolvedUpdate>),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Merge `patch` against `current`, recalculating derived fields when any
/// charge field changed.
///
/// # Errors
/// [`ReconcileError::MissingFields`] when recalculation is triggered and a
/// required charge field is absent from both the patch and the stored row.
pub fn reconcile(
    current: &Reservation,
    patch: &ReservationPatch,
) -> Result<ReconcileOutcome, ReconcileError> {
    // Cheap, common path: pure workflow transition.
    if let Some(status) = patch.status {
        if patch.is_status_only() {
            return Ok(ReconcileOutcome::StatusOnly(status));
        }
    }

    let mut out = ResolvedUpdate {
        apartment_id: patch.apartment_id,
        client_id: patch.client_id,
        check_in: patch.check_in,
        check_out: patch.check_out,
        nights: patch.nights,
        price_per_night: patch.price_per_night,
        cleaning_fee: patch.cleaning_fee,
        cancellation_fee: patch.cancellation_fee,
        other_expenses: patch.other_expenses,
        parking_fee: patch.parking_fee,
        taxes: patch.taxes,
        amount_paid: patch.amount_paid,
        status: patch.status,
        notes: patch.notes.clone(),
        ..ResolvedUpdate::default()
    };

    let touched = patch.touched_charge_fields();
    if touched.is_empty() {
        reconcile_without_recalc(current, patch, &mut out);
        return Ok(ReconcileOutcome::Update(Box::new(out)));
    }

    // Recalculation triggered: every formula input must be resolvable from
    // the patch or the stored row.
    let mut missing: Vec<ChargeField> = Vec::new();
    let nights = resolve(patch.nights, current.nights, ChargeField::Nights, &mut missing);
    let price = resolve(
        patch.price_per_night,
        current.price_per_night,
        ChargeField::PricePerNight,
        &mut missing,
    );
    let cleaning = resolve(
        patch.cleaning_fee,
        current.cleaning_fee,
        ChargeField::CleaningFee,
        &mut missing,
    );
    let other = resolve(
        patch.other_expenses,
        current.other_expenses,
        ChargeField::OtherExpenses,
        &mut missing,
    );
    let parking = resolve(
        patch.parking_fee,
        current.parking_fee,
        ChargeField::ParkingFee,
        &mut missing,
    );
    let taxes = resolve(patch.taxes, current.taxes, ChargeField::Taxes, &mut missing);

    if !missing.is_empty() {
        return Err(ReconcileError::MissingFields(missing));
    }

    let inputs = QuoteInputs {
        // resolve() returned Some for all six once `missing` is empty
        nights: nights.unwrap_or_default(),
        price_per_night: price.unwrap_or_default(),
        cleaning_fee: cleaning.unwrap_or_default(),
        other_expenses: other.unwrap_or_default(),
        parking_fee: parking.unwrap_or_default(),
        taxes: taxes.unwrap_or_default(),
    };

    let effective_paid = patch.amount_paid.unwrap_or(current.amount_paid);
    match compute_total(&inputs) {
        Ok(total) => {
            let due = amount_due(total, effective_paid);
            out.total_amount = Some(total);
            out.amount_due = Some(due);
            out.payment_status = Some(derive_payment_status(effective_paid, due));
            out.recalculated = true;
        }
        Err(_) => {
            // Uncomputable: retain the stored totals rather than propagating
            // an invalid number. The payload stays internally consistent.
            out.total_amount = current.total_amount;
            out.amount_due = current.amount_due;
            if patch.amount_paid.is_some() {
                rederive_against_total(current.total_amount, effective_paid, &mut out);
            }
        }
    }

    Ok(ReconcileOutcome::Update(Box::new(out)))
}

/// Resolve one formula input from the patch, falling back to the stored row;
/// record the field as missing when neither side has it.
fn resolve<T: Copy>(
    patched: Option<T>,
    stored: Option<T>,
    field: ChargeField,
    missing: &mut Vec<ChargeField>,
) -> Option<T> {
    let v = patched.or(stored);
    if v.is_none() {
        missing.push(field);
    }
    v
}

/// No charge field changed: pass the update through, honoring the explicit
/// override path for the derived fields and re-deriving the balance when
/// `amountPaid` moved.
fn reconcile_without_recalc(
    current: &Reservation,
    patch: &ReservationPatch,
    out: &mut ResolvedUpdate,
) {
    out.total_amount = patch.total_amount;
    out.amount_due = patch.amount_due;

    let paid_moved = patch.amount_paid.is_some();
    let total_basis = patch.total_amount.or(current.total_amount);

    if paid_moved || (patch.total_amount.is_some() && patch.amount_due.is_none()) {
        let effective_paid = patch.amount_paid.unwrap_or(current.amount_paid);
        rederive_against_total(total_basis, effective_paid, out);
    } else if let Some(due) = patch.amount_due {
        // Explicit due override: keep the status consistent with it.
        out.payment_status = Some(derive_payment_status(current.amount_paid, due));
    }
}

/// Recompute `amountDue`/`paymentStatus` against a (possibly absent) total.
///
/// With no total on record the balance stays unknown and the status is
/// derived from the paid amount alone.
fn rederive_against_total(total: Option<Cents>, paid: Cents, out: &mut ResolvedUpdate) {
    match total {
        Some(total) => {
            let due = amount_due(total, paid);
            out.amount_due = Some(due);
            out.payment_status = Some(derive_payment_status(paid, due));
        }
        None => {
            out.payment_status = Some(if paid.is_positive() {
                PaymentStatus::Partial
            } else {
                PaymentStatus::Pending
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
