//! bkd-pricing
//!
//! Pricing invariants for reservations.
//!
//! Architectural decisions:
//! - One pure calculator owns the total/due formula; every write path calls
//!   it instead of re-deriving inline
//! - Overflow or missing inputs signal "uncomputable" — never a corrupted
//!   number, never a silent zero default
//! - Reconciling a partial update against a stored row is a pure merge;
//!   status-only updates short-circuit past it entirely
//! - Output payloads are always internally consistent: a recalculated total
//!   is never emitted without its matching balance due and payment status
//!
//! Deterministic, pure logic. No IO. No clock.

mod quote;
mod reconcile;

pub use quote::{amount_due, compute_total, derive_payment_status, QuoteInputs, Uncomputable};
pub use reconcile::{reconcile, ReconcileError, ReconcileOutcome, ResolvedUpdate};
