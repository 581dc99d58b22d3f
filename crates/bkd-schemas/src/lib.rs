//! bkd-schemas
//!
//! Shared domain types for the bookdesk reservation engine:
//! - `Cents` fixed-point money (1e-2 scale, `i64` backed)
//! - Workflow and payment status enums
//! - Reservation / payment records and partial-update payloads
//!
//! Wire mapping is centralized here: every record that crosses the HTTP
//! boundary derives serde with `rename_all = "camelCase"`, and
//! [`ChargeField::as_str`] is the single source for camelCase field names
//! used in error messages. No business logic lives in this crate.

mod money;
mod reservation;
mod status;

pub use money::Cents;
pub use reservation::{
    ChargeField, InvalidField, NewPayment, NewReservation, Reservation, ReservationPatch,
    ReservationPayment,
};
pub use status::{NotificationKind, PaymentStatus, ReservationStatus};
