use crate::model::{Booking, BookingStatus};

use super::EngineError;

/// WAITING → APPROVED | REJECTED. Nothing leaves a terminal status.
///
/// Pure: the store re-checks the status under the row lock when applying.
pub fn decide(booking: &Booking, approved: bool) -> Result<BookingStatus, EngineError> {
    if booking.status.is_terminal() {
        return Err(EngineError::InvalidState(booking.id, booking.status));
    }
    Ok(if approved {
        BookingStatus::Approved
    } else {
        BookingStatus::Rejected
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;
    use ulid::Ulid;

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            item_id: Ulid::new(),
            booker: 2,
            span: Span::new(0, 100),
            status,
        }
    }

    #[test]
    fn waiting_moves_either_way() {
        let b = booking(BookingStatus::Waiting);
        assert_eq!(decide(&b, true).unwrap(), BookingStatus::Approved);
        assert_eq!(decide(&b, false).unwrap(), BookingStatus::Rejected);
    }

    #[test]
    fn terminal_states_refuse_every_decision() {
        for status in [BookingStatus::Approved, BookingStatus::Rejected] {
            let b = booking(status);
            for approved in [true, false] {
                let err = decide(&b, approved).unwrap_err();
                assert!(matches!(err, EngineError::InvalidState(id, s) if id == b.id && s == status));
            }
        }
    }
}
