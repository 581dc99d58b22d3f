//! Workflow and payment status enums.
//!
//! Serde uses snake_case on the wire ("checked_in"); `as_str`/`parse` give
//! the same strings for DB columns and log lines.

use serde::{Deserialize, Serialize};

use crate::reservation::InvalidField;

/// Reservation workflow state, owned by the lifecycle controller.
///
/// Forward path: pending → confirmed → checked_in → checked_out.
/// `cancelled` is reachable from any non-terminal state. Terminal states:
/// checked_out, cancelled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked_in",
            ReservationStatus::CheckedOut => "checked_out",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidField> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "checked_in" => Ok(ReservationStatus::CheckedIn),
            "checked_out" => Ok(ReservationStatus::CheckedOut),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(InvalidField::new(
                "status",
                format!("unknown reservation status: {other}"),
            )),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::CheckedOut | ReservationStatus::Cancelled
        )
    }

    /// Position on the forward path. `cancelled` has no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            ReservationStatus::Pending => Some(0),
            ReservationStatus::Confirmed => Some(1),
            ReservationStatus::CheckedIn => Some(2),
            ReservationStatus::CheckedOut => Some(3),
            ReservationStatus::Cancelled => None,
        }
    }

    /// Whether a transition `self -> next` is allowed.
    ///
    /// Same-status updates are no-ops and always allowed. Forward jumps are
    /// allowed (an operator may check in a reservation that was never
    /// explicitly confirmed). Nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if next == ReservationStatus::Cancelled {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

/// Derived payment state of a reservation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Complete,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidField> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "partial" => Ok(PaymentStatus::Partial),
            "complete" => Ok(PaymentStatus::Complete),
            other => Err(InvalidField::new(
                "paymentStatus",
                format!("unknown payment status: {other}"),
            )),
        }
    }
}

/// Outbound email template selector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    StatusChange,
    PaymentReceived,
    MonthlySummary,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Confirmation => "confirmation",
            NotificationKind::StatusChange => "status_change",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::MonthlySummary => "monthly_summary",
        }
    }
}
