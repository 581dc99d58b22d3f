//! Reservation and payment records, plus the partial-update payload.
//!
//! Stored charge fields are `Option<Cents>`: rows migrated from the legacy
//! system can be incomplete, and the reconciliation engine must be able to
//! tell "absent" from "zero". Creation fills fee fields with explicit zero
//! defaults; updates never default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Cents;
use crate::status::{PaymentStatus, ReservationStatus};

// ---------------------------------------------------------------------------
// InvalidField
// ---------------------------------------------------------------------------

/// A field-level validation failure, carrying the camelCase wire name of the
/// offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidField {
    pub field: &'static str,
    pub message: String,
}

impl InvalidField {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for InvalidField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.message)
    }
}

impl std::error::Error for InvalidField {}

// ---------------------------------------------------------------------------
// ChargeField
// ---------------------------------------------------------------------------

/// The six charge fields that feed the total-amount formula.
///
/// `as_str` returns the camelCase wire name; this enum is the single
/// translation point between internal snake_case fields and the public API
/// surface. `cancellationFee` is deliberately absent — it is an
/// independently settable charge that never enters the total.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChargeField {
    Nights,
    PricePerNight,
    CleaningFee,
    OtherExpenses,
    ParkingFee,
    Taxes,
}

impl ChargeField {
    pub const ALL: [ChargeField; 6] = [
        ChargeField::Nights,
        ChargeField::PricePerNight,
        ChargeField::CleaningFee,
        ChargeField::OtherExpenses,
        ChargeField::ParkingFee,
        ChargeField::Taxes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeField::Nights => "nights",
            ChargeField::PricePerNight => "pricePerNight",
            ChargeField::CleaningFee => "cleaningFee",
            ChargeField::OtherExpenses => "otherExpenses",
            ChargeField::ParkingFee => "parkingFee",
            ChargeField::Taxes => "taxes",
        }
    }
}

impl std::fmt::Display for ChargeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// One stay booking, as read from the store (join fields included).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub apartment_id: Option<Uuid>,
    pub client_id: Option<Uuid>,

    #[serde(rename = "checkInDate")]
    pub check_in: Option<DateTime<Utc>>,
    #[serde(rename = "checkOutDate")]
    pub check_out: Option<DateTime<Utc>>,

    pub nights: Option<i64>,
    pub price_per_night: Option<Cents>,
    pub cleaning_fee: Option<Cents>,
    pub cancellation_fee: Option<Cents>,
    pub other_expenses: Option<Cents>,
    pub parking_fee: Option<Cents>,
    pub taxes: Option<Cents>,

    pub total_amount: Option<Cents>,
    pub amount_paid: Cents,
    pub amount_due: Option<Cents>,
    pub payment_status: PaymentStatus,

    pub status: ReservationStatus,
    pub notes: Option<String>,

    /// Optimistic concurrency token; bumped on every successful write.
    pub version: i64,
    pub created_at: DateTime<Utc>,

    // Denormalized display fields from read-time joins. The engine never
    // writes these.
    pub client_name: Option<String>,
    pub client_lastname: Option<String>,
    pub client_email: Option<String>,
    pub apartment_address: Option<String>,
}

// ---------------------------------------------------------------------------
// NewReservation
// ---------------------------------------------------------------------------

/// Creation payload. `nights` and `pricePerNight` are required; fee fields
/// default to explicit zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub apartment_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    #[serde(rename = "checkInDate")]
    pub check_in: Option<DateTime<Utc>>,
    #[serde(rename = "checkOutDate")]
    pub check_out: Option<DateTime<Utc>>,
    pub nights: i64,
    pub price_per_night: Cents,
    #[serde(default)]
    pub cleaning_fee: Cents,
    #[serde(default)]
    pub cancellation_fee: Cents,
    #[serde(default)]
    pub other_expenses: Cents,
    #[serde(default)]
    pub parking_fee: Cents,
    #[serde(default)]
    pub taxes: Cents,
    pub notes: Option<String>,
}

impl NewReservation {
    pub fn validate(&self) -> Result<(), InvalidField> {
        if self.nights < 1 {
            return Err(InvalidField::new(
                "nights",
                format!("must be >= 1, got {}", self.nights),
            ));
        }
        for (field, amount) in [
            ("pricePerNight", self.price_per_night),
            ("cleaningFee", self.cleaning_fee),
            ("cancellationFee", self.cancellation_fee),
            ("otherExpenses", self.other_expenses),
            ("parkingFee", self.parking_fee),
            ("taxes", self.taxes),
        ] {
            if amount.is_negative() {
                return Err(InvalidField::new(field, format!("must be >= 0, got {amount}")));
            }
        }
        if let (Some(ci), Some(co)) = (self.check_in, self.check_out) {
            if co < ci {
                return Err(InvalidField::new(
                    "checkOutDate",
                    "check-out precedes check-in",
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ReservationPatch
// ---------------------------------------------------------------------------

/// Partial update payload: every field optional, absent fields untouched.
///
/// `total_amount` / `amount_due` are the explicit override path for the
/// derived fields; the reconciliation engine ignores them whenever a charge
/// field triggers recalculation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservationPatch {
    pub apartment_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    #[serde(rename = "checkInDate")]
    pub check_in: Option<DateTime<Utc>>,
    #[serde(rename = "checkOutDate")]
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
    pub status: Option<ReservationStatus>,
    pub notes: Option<String>,
}

impl ReservationPatch {
    /// Charge fields present in this patch, in canonical order.
    pub fn touched_charge_fields(&self) -> Vec<ChargeField> {
        let mut out = Vec::new();
        if self.nights.is_some() {
            out.push(ChargeField::Nights);
        }
        if self.price_per_night.is_some() {
            out.push(ChargeField::PricePerNight);
        }
        if self.cleaning_fee.is_some() {
            out.push(ChargeField::CleaningFee);
        }
        if self.other_expenses.is_some() {
            out.push(ChargeField::OtherExpenses);
        }
        if self.parking_fee.is_some() {
            out.push(ChargeField::ParkingFee);
        }
        if self.taxes.is_some() {
            out.push(ChargeField::Taxes);
        }
        out
    }

    /// True when the caller's intent is purely a status transition.
    pub fn is_status_only(&self) -> bool {
        self.status.is_some() && self.only_status_present()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.only_status_present()
    }

    fn only_status_present(&self) -> bool {
        self.apartment_id.is_none()
            && self.client_id.is_none()
            && self.check_in.is_none()
            && self.check_out.is_none()
            && self.nights.is_none()
            && self.price_per_night.is_none()
            && self.cleaning_fee.is_none()
            && self.cancellation_fee.is_none()
            && self.other_expenses.is_none()
            && self.parking_fee.is_none()
            && self.taxes.is_none()
            && self.amount_paid.is_none()
            && self.total_amount.is_none()
            && self.amount_due.is_none()
            && self.notes.is_none()
    }

    pub fn validate(&self) -> Result<(), InvalidField> {
        if let Some(n) = self.nights {
            if n < 1 {
                return Err(InvalidField::new("nights", format!("must be >= 1, got {n}")));
            }
        }
        for (field, amount) in [
            ("pricePerNight", self.price_per_night),
            ("cleaningFee", self.cleaning_fee),
            ("cancellationFee", self.cancellation_fee),
            ("otherExpenses", self.other_expenses),
            ("parkingFee", self.parking_fee),
            ("taxes", self.taxes),
            ("amountPaid", self.amount_paid),
            ("totalAmount", self.total_amount),
            ("amountDue", self.amount_due),
        ] {
            if let Some(a) = amount {
                if a.is_negative() {
                    return Err(InvalidField::new(field, format!("must be >= 0, got {a}")));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// One immutable ledger entry: money received against a reservation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPayment {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub amount: Cents,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payment registration payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub amount: Cents,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), InvalidField> {
        if !self.amount.is_positive() {
            return Err(InvalidField::new(
                "amount",
                format!("must be > 0, got {}", self.amount),
            ));
        }
        if self.payment_method.trim().is_empty() {
            return Err(InvalidField::new("paymentMethod", "must not be empty"));
        }
        Ok(())
    }
}
