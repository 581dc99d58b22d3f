//! Filter validation and the in-memory predicate.

use bkd_schemas::{Reservation, ReservationStatus};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::params::ReservationFilterParams;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// `fromDate` / `withinDays` supplied without `upcoming=true`.
    RequiresUpcoming { param: &'static str },
    /// A date parameter did not parse in any accepted format.
    BadDate { param: &'static str, value: String },
    /// Unknown workflow status value.
    BadStatus { value: String },
    /// `withinDays` must be a positive day count.
    NonPositiveWithinDays { value: i64 },
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::RequiresUpcoming { param } => {
                write!(f, "{param} is only valid together with upcoming=true")
            }
            FilterError::BadDate { param, value } => {
                write!(f, "unparseable date for {param}: {value:?}")
            }
            FilterError::BadStatus { value } => write!(f, "unknown status filter: {value:?}"),
            FilterError::NonPositiveWithinDays { value } => {
                write!(f, "withinDays must be >= 1, got {value}")
            }
        }
    }
}

impl std::error::Error for FilterError {}

// ---------------------------------------------------------------------------
// Validated query
// ---------------------------------------------------------------------------

/// The upcoming-window filter mode: check-in on/after `from`, and strictly
/// before `until` when bounded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UpcomingWindow {
    pub from: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
}

/// A fully validated reservation listing query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReservationQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<ReservationStatus>,
    pub client_name: Option<String>,
    pub client_lastname: Option<String>,
    pub client_email: Option<String>,
    pub q: Option<String>,
    pub upcoming: Option<UpcomingWindow>,
}

impl ReservationQuery {
    /// Validate raw parameters against the reference clock `now`.
    ///
    /// Combination errors are checked first so they are reported even when
    /// an individual value would also fail to parse.
    pub fn validate(
        params: &ReservationFilterParams,
        now: DateTime<Utc>,
    ) -> Result<Self, FilterError> {
        let upcoming_on = params.upcoming == Some(true);

        if !upcoming_on {
            if params.from_date.is_some() {
                return Err(FilterError::RequiresUpcoming { param: "fromDate" });
            }
            if params.within_days.is_some() {
                return Err(FilterError::RequiresUpcoming {
                    param: "withinDays",
                });
            }
        }
        if let Some(d) = params.within_days {
            if d < 1 {
                return Err(FilterError::NonPositiveWithinDays { value: d });
            }
        }

        let start = parse_opt(&params.start_date, "startDate", DayEdge::Start)?;
        let end = parse_opt(&params.end_date, "endDate", DayEdge::End)?;

        let status = match &params.status {
            Some(s) => Some(
                ReservationStatus::parse(s)
                    .map_err(|_| FilterError::BadStatus { value: s.clone() })?,
            ),
            None => None,
        };

        let upcoming = if upcoming_on {
            let from = parse_opt(&params.from_date, "fromDate", DayEdge::Start)?.unwrap_or(now);
            let until = params.within_days.map(|d| from + Duration::days(d));
            Some(UpcomingWindow { from, until })
        } else {
            None
        };

        Ok(ReservationQuery {
            start,
            end,
            status,
            client_name: params.client_name.clone(),
            client_lastname: params.client_lastname.clone(),
            client_email: params.client_email.clone(),
            q: params.q.clone(),
            upcoming,
        })
    }

    /// Evaluate this query against one joined reservation row.
    ///
    /// This is the semantics of record for filtering; the Postgres store's
    /// SQL builder must agree with it.
    pub fn matches(&self, r: &Reservation) -> bool {
        if let Some(start) = self.start {
            match r.check_in {
                Some(ci) if ci >= start => {}
                _ => return false,
            }
        }
        if let Some(end) = self.end {
            match r.check_out {
                Some(co) if co <= end => {}
                _ => return false,
            }
        }
        if let Some(status) = self.status {
            if r.status != status {
                return false;
            }
        }
        if let Some(name) = &self.client_name {
            if !contains_ci(r.client_name.as_deref(), name) {
                return false;
            }
        }
        if let Some(lastname) = &self.client_lastname {
            if !contains_ci(r.client_lastname.as_deref(), lastname) {
                return false;
            }
        }
        if let Some(email) = &self.client_email {
            if r.client_email.as_deref() != Some(email.as_str()) {
                return false;
            }
        }
        if let Some(q) = &self.q {
            // OR nested inside the outer AND.
            if !contains_ci(r.client_name.as_deref(), q)
                && !contains_ci(r.client_lastname.as_deref(), q)
            {
                return false;
            }
        }
        if let Some(window) = self.upcoming {
            // A reservation without a check-in date is never "upcoming".
            let Some(ci) = r.check_in else {
                return false;
            };
            if ci < window.from {
                return false;
            }
            if let Some(until) = window.until {
                if ci >= until {
                    return false;
                }
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, PartialEq, Eq)]
enum DayEdge {
    Start,
    End,
}

fn parse_opt(
    value: &Option<String>,
    param: &'static str,
    edge: DayEdge,
) -> Result<Option<DateTime<Utc>>, FilterError> {
    match value {
        Some(s) => parse_date_time(s, edge)
            .map(Some)
            .ok_or_else(|| FilterError::BadDate {
                param,
                value: s.clone(),
            }),
        None => Ok(None),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD[ HH:MM]`, and the legacy
/// `MM-DD-YYYY[ HH:MM]` display format. Bare dates snap to the start or end
/// of the day depending on which side of a range they bound.
fn parse_date_time(s: &str, edge: DayEdge) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M", "%m-%d-%Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Utc.from_local_datetime(&naive).single();
        }
    }
    for fmt in ["%Y-%m-%d", "%m-%d-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            let time = match edge {
                DayEdge::Start => NaiveTime::from_hms_opt(0, 0, 0)?,
                DayEdge::End => NaiveTime::from_hms_opt(23, 59, 59)?,
            };
            return Utc.from_local_datetime(&date.and_time(time)).single();
        }
    }
    None
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    match haystack {
        Some(h) => h.to_lowercase().contains(&needle.to_lowercase()),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
