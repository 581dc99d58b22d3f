//! Raw, unvalidated filter parameters as they arrive on the query string.

use serde::Deserialize;

/// Open set of independently-optional predicates, combined with AND.
///
/// `fromDate` and `withinDays` are only meaningful together with
/// `upcoming=true`; [`crate::ReservationQuery::validate`] rejects the
/// combination otherwise instead of silently ignoring it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservationFilterParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub client_name: Option<String>,
    pub client_lastname: Option<String>,
    pub client_email: Option<String>,
    /// Free-text search over client name OR lastname.
    pub q: Option<String>,
    pub upcoming: Option<bool>,
    pub from_date: Option<String>,
    pub within_days: Option<i64>,
}
