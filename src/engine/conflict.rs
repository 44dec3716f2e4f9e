use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Turn raw input into a booking window, or say why not.
pub(crate) fn validate_span(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    let span = Span::checked(start, end).ok_or_else(|| {
        EngineError::Validation(format!("booking end ({end}) must be after start ({start})"))
    })?;
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("booking window too wide"));
    }
    Ok(span)
}

pub(crate) fn validate_text(
    field: &'static str,
    value: &str,
    max_len: usize,
    required: bool,
) -> Result<(), EngineError> {
    if required && value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{field} must not be blank")));
    }
    if value.len() > max_len {
        return Err(EngineError::LimitExceeded(match field {
            "name" => "name too long",
            "description" => "description too long",
            _ => "text too long",
        }));
    }
    Ok(())
}

/// Fails with the first APPROVED booking (other than `candidate` itself)
/// whose window overlaps `span`.
pub(crate) fn check_no_overlap(
    candidate: BookingId,
    span: &Span,
    bookings: &[Booking],
) -> Result<(), EngineError> {
    for b in bookings {
        if b.id != candidate && b.status == BookingStatus::Approved && b.span.overlaps(span) {
            return Err(EngineError::Conflict(b.id));
        }
    }
    Ok(())
}
