//! Fixed-point money type.
//!
//! All monetary amounts in this system use a 1e-2 (cents) fixed-point
//! representation stored as `i64`. Using raw `i64` for money is error-prone:
//! it allows accidental arithmetic with unrelated integers (night counts,
//! version tokens) without any compile-time signal.
//!
//! `Cents` wraps the raw `i64` so the type system prevents:
//! - Implicit construction from raw `i64` (no `From<i64>` impl).
//! - Mixing `Cents` with unrelated `i64` values in arithmetic.
//!
//! # Wire format
//!
//! On the JSON boundary amounts are numbers in major units (`123.45` means
//! $123.45). Deserialization rejects non-finite and unrepresentable values —
//! this is where the upstream NaN guards live now. Internally everything is
//! exact integer cents.
//!
//! # Arithmetic
//!
//! - `Add`/`Sub`/`Neg` are closed over `Cents` and follow standard integer
//!   overflow semantics.
//! - `checked_add` / `checked_mul_nights` return `None` on overflow; callers
//!   must handle `None` explicitly. Overflow in a price calculation is a
//!   critical error, not a routine saturation.
//! - `saturating_sub_floor_zero` implements the `max(0, a - b)` clamp used
//!   for balances due.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A fixed-point monetary amount at 1e-2 scale (cents).
///
/// 1 USD = `Cents(100)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cents(i64);

impl Cents {
    /// Zero monetary amount.
    pub const ZERO: Cents = Cents(0);

    /// Maximum representable value.
    pub const MAX: Cents = Cents(i64::MAX);

    /// Construct from a raw cent count.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Cents(raw)
    }

    /// Extract the underlying raw cent count (for DB binds).
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Convert a major-unit float (dollars) into exact cents.
    ///
    /// Returns `None` for non-finite input or values whose cent count does
    /// not fit in `i64`. Rounds half away from zero to the nearest cent.
    pub fn from_major(v: f64) -> Option<Cents> {
        if !v.is_finite() {
            return None;
        }
        let c = (v * 100.0).round();
        // i64::MAX as f64 rounds up past i64::MAX, so the comparison must be
        // strict on the high side.
        if !(c >= i64::MIN as f64 && c < i64::MAX as f64) {
            return None;
        }
        Some(Cents(c as i64))
    }

    /// Major-unit float view (dollars). Presentation only — never feed the
    /// result back into arithmetic.
    #[inline]
    pub fn to_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `true` if this amount is strictly negative.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `true` if this amount is strictly positive.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition; `None` on overflow.
    #[inline]
    pub fn checked_add(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_add(rhs.0).map(Cents)
    }

    /// Saturating addition — clamps at [`Cents::MAX`] on overflow.
    #[inline]
    pub fn saturating_add(self, rhs: Cents) -> Cents {
        Cents(self.0.saturating_add(rhs.0))
    }

    /// Multiply a per-night price by an integer night count.
    ///
    /// Returns `None` if the multiplication overflows `i64`. `nights` is a
    /// plain count, not a monetary value.
    #[inline]
    pub fn checked_mul_nights(self, nights: i64) -> Option<Cents> {
        self.0.checked_mul(nights).map(Cents)
    }

    /// `max(0, self - rhs)` — the balance-due clamp.
    #[inline]
    pub fn saturating_sub_floor_zero(self, rhs: Cents) -> Cents {
        Cents(self.0.saturating_sub(rhs.0).max(0))
    }
}

impl Add for Cents {
    type Output = Cents;
    #[inline]
    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Cents;
    #[inline]
    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}

impl Neg for Cents {
    type Output = Cents;
    #[inline]
    fn neg(self) -> Cents {
        Cents(-self.0)
    }
}

impl AddAssign for Cents {
    #[inline]
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Cents {
    #[inline]
    fn sub_assign(&mut self, rhs: Cents) {
        self.0 -= rhs.0;
    }
}

impl std::fmt::Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let major = self.0 / 100;
        let frac = (self.0 % 100).abs();
        // When |value| < $1 and negative, `major` truncates to 0 and loses
        // the sign. Emit "-0" explicitly in that case.
        if self.0 < 0 && major == 0 {
            write!(f, "-{major}.{frac:02}")
        } else {
            write!(f, "{major}.{frac:02}")
        }
    }
}

impl Serialize for Cents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_major())
    }
}

impl<'de> Deserialize<'de> for Cents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        Cents::from_major(v).ok_or_else(|| {
            serde::de::Error::custom(format!("not a representable monetary amount: {v}"))
        })
    }
}
