//! Invariant calculator.
//!
//! `totalAmount = nights·pricePerNight + cleaningFee + otherExpenses
//!              + parkingFee + taxes`
//! `amountDue   = max(0, totalAmount - amountPaid)`
//!
//! `taxes` is a caller-supplied absolute amount, never a derived percentage.
//! `cancellationFee` is independently settable and never enters the total.

use bkd_schemas::{Cents, PaymentStatus};

/// The fully-resolved inputs to the total-amount formula.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QuoteInputs {
    pub nights: i64,
    pub price_per_night: Cents,
    pub cleaning_fee: Cents,
    pub other_expenses: Cents,
    pub parking_fee: Cents,
    pub taxes: Cents,
}

/// The formula could not be evaluated to a sound number.
///
/// Callers must retain the previously stored totals instead of writing a
/// corrupted value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Uncomputable;

impl std::fmt::Display for Uncomputable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("charge fields do not evaluate to a representable total")
    }
}

impl std::error::Error for Uncomputable {}

/// Evaluate the total-amount formula with checked arithmetic.
///
/// # Errors
/// Returns [`Uncomputable`] if any intermediate overflows `i64` cents.
pub fn compute_total(inputs: &QuoteInputs) -> Result<Cents, Uncomputable> {
    inputs
        .price_per_night
        .checked_mul_nights(inputs.nights)
        .and_then(|t| t.checked_add(inputs.cleaning_fee))
        .and_then(|t| t.checked_add(inputs.other_expenses))
        .and_then(|t| t.checked_add(inputs.parking_fee))
        .and_then(|t| t.checked_add(inputs.taxes))
        .ok_or(Uncomputable)
}

/// `max(0, total - paid)`.
#[inline]
pub fn amount_due(total: Cents, paid: Cents) -> Cents {
    total.saturating_sub_floor_zero(paid)
}

/// Derive the payment status from a paid/due pair.
///
/// `complete` iff nothing is due; `partial` iff something was paid and
/// something is still due; `pending` otherwise.
pub fn derive_payment_status(paid: Cents, due: Cents) -> PaymentStatus {
    if !due.is_positive() {
        PaymentStatus::Complete
    } else if paid.is_positive() {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(nights: i64, price: i64, cleaning: i64, other: i64, parking: i64, taxes: i64) -> QuoteInputs {
        QuoteInputs {
            nights,
            price_per_night: Cents::new(price),
            cleaning_fee: Cents::new(cleaning),
            other_expenses: Cents::new(other),
            parking_fee: Cents::new(parking),
            taxes: Cents::new(taxes),
        }
    }

    #[test]
    fn formula_matches_reference_scenario() {
        // 3 nights @ $100 + $50 cleaning + $10 taxes = $360
        let total = compute_total(&inputs(3, 10_000, 5_000, 0, 0, 1_000)).unwrap();
        assert_eq!(total, Cents::new(36_000));
    }

    #[test]
    fn cancellation_fee_never_enters_total() {
        // QuoteInputs has no cancellation slot at all; the formula is closed
        // over exactly six inputs. This test pins the shape.
        let total = compute_total(&inputs(2, 10_000, 0, 0, 0, 0)).unwrap();
        assert_eq!(total, Cents::new(20_000));
    }

    #[test]
    fn overflow_is_uncomputable() {
        let q = QuoteInputs {
            nights: 2,
            price_per_night: Cents::MAX,
            cleaning_fee: Cents::ZERO,
            other_expenses: Cents::ZERO,
            parking_fee: Cents::ZERO,
            taxes: Cents::ZERO,
        };
        assert_eq!(compute_total(&q), Err(Uncomputable));
    }

    #[test]
    fn due_clamps_to_zero_on_overpayment() {
        assert_eq!(
            amount_due(Cents::new(36_000), Cents::new(40_000)),
            Cents::ZERO
        );
    }

    #[test]
    fn status_derivation_table() {
        use PaymentStatus::*;
        // nothing paid, something due
        assert_eq!(derive_payment_status(Cents::ZERO, Cents::new(100)), Pending);
        // partial payment
        assert_eq!(
            derive_payment_status(Cents::new(50), Cents::new(50)),
            Partial
        );
        // settled
        assert_eq!(derive_payment_status(Cents::new(100), Cents::ZERO), Complete);
        // zero-value reservation is complete even with nothing paid
        assert_eq!(derive_payment_status(Cents::ZERO, Cents::ZERO), Complete);
    }
}
