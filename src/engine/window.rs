use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{Booking, BookingStatus, Ms, Span};

use super::EngineError;

/// Where a booking window sits relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `end < now`
    Past,
    /// `start <= now < end`
    Current,
    /// `start > now`
    Future,
}

/// Classify `[start, end)` against `now`.
///
/// Returns `None` only at the instant `now == end`: the window is no longer
/// current, but `end < now` does not hold yet either.
pub fn phase(span: &Span, now: Ms) -> Option<Phase> {
    if span.start > now {
        Some(Phase::Future)
    } else if span.contains_instant(now) {
        Some(Phase::Current)
    } else if span.end < now {
        Some(Phase::Past)
    } else {
        None
    }
}

/// Read-time booking filter. Exactly one is active per query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingFilter {
    #[default]
    All,
    Current,
    Past,
    Future,
    Waiting,
    Rejected,
}

impl BookingFilter {
    pub fn matches(self, booking: &Booking, now: Ms) -> bool {
        match self {
            BookingFilter::All => true,
            BookingFilter::Current => phase(&booking.span, now) == Some(Phase::Current),
            BookingFilter::Past => phase(&booking.span, now) == Some(Phase::Past),
            BookingFilter::Future => phase(&booking.span, now) == Some(Phase::Future),
            BookingFilter::Waiting => booking.status == BookingStatus::Waiting,
            BookingFilter::Rejected => booking.status == BookingStatus::Rejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingFilter::All => "ALL",
            BookingFilter::Current => "CURRENT",
            BookingFilter::Past => "PAST",
            BookingFilter::Future => "FUTURE",
            BookingFilter::Waiting => "WAITING",
            BookingFilter::Rejected => "REJECTED",
        }
    }
}

impl FromStr for BookingFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(BookingFilter::All),
            "CURRENT" => Ok(BookingFilter::Current),
            "PAST" => Ok(BookingFilter::Past),
            "FUTURE" => Ok(BookingFilter::Future),
            "WAITING" => Ok(BookingFilter::Waiting),
            "REJECTED" => Ok(BookingFilter::Rejected),
            _ => Err(EngineError::Validation(format!("unknown state: {s}"))),
        }
    }
}

impl std::fmt::Display for BookingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
