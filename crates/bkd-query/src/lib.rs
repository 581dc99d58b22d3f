//! bkd-query
//!
//! Query filter engine for reservation listings.
//!
//! Architectural decisions:
//! - Validation is a pure pre-step: parameter-combination errors are
//!   detected and reported before any store query executes
//! - One validated query type drives both the SQL builder (Postgres store)
//!   and the in-memory predicate (memory store), so the two cannot drift
//! - Dates are parsed at this boundary into `DateTime<Utc>`; bare end dates
//!   extend to end-of-day; the legacy MM-DD-YYYY format is still accepted
//!   as input
//!
//! Deterministic, pure logic. No IO. The reference clock is an argument.

mod filter;
mod params;

pub use filter::{FilterError, ReservationQuery, UpcomingWindow};
pub use params::ReservationFilterParams;
