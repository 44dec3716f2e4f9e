//! Who may do what. Every check here is pure and runs before any state
//! change or data return.

use crate::model::{Booking, BookingStatus, Item, ItemId, Ms, UserId};

use super::EngineError;

pub fn can_create_booking(user: UserId, item: &Item) -> Result<(), EngineError> {
    if user == item.owner {
        return Err(EngineError::AccessDenied("owner cannot book own item"));
    }
    if !item.available {
        return Err(EngineError::Validation(format!(
            "item {} is not available for booking",
            item.id
        )));
    }
    Ok(())
}

pub fn can_approve(user: UserId, item: &Item) -> Result<(), EngineError> {
    if user != item.owner {
        return Err(EngineError::AccessDenied("only the item owner can decide on a booking"));
    }
    Ok(())
}

/// Booker or item owner. Everyone else is denied even though the booking exists.
pub fn can_view_booking(user: UserId, booking: &Booking, item: &Item) -> Result<(), EngineError> {
    if user != booking.booker && user != item.owner {
        return Err(EngineError::AccessDenied("only the booker or the item owner can view a booking"));
    }
    Ok(())
}

pub fn can_edit_item(user: UserId, item: &Item) -> Result<(), EngineError> {
    if user != item.owner {
        return Err(EngineError::AccessDenied("only the owner can edit an item"));
    }
    Ok(())
}

/// True iff `user` has an approved booking of `item_id` that ended before `now`.
pub fn has_completed_booking(user: UserId, item_id: ItemId, bookings: &[Booking], now: Ms) -> bool {
    bookings.iter().any(|b| {
        b.booker == user
            && b.item_id == item_id
            && b.status == BookingStatus::Approved
            && b.span.end < now
    })
}

pub fn can_comment(
    user: UserId,
    item_id: ItemId,
    bookings: &[Booking],
    now: Ms,
) -> Result<(), EngineError> {
    if !has_completed_booking(user, item_id, bookings, now) {
        return Err(EngineError::Validation(
            "cannot comment without a completed booking".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;
    use ulid::Ulid;

    fn item(owner: UserId, available: bool) -> Item {
        Item {
            id: Ulid::new(),
            owner,
            name: "Tent".into(),
            description: "two person".into(),
            available,
        }
    }

    fn booking(item: &Item, booker: UserId, span: Span, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            item_id: item.id,
            booker,
            span,
            status,
        }
    }

    #[test]
    fn create_rejects_owner_and_unavailable() {
        let open = item(1, true);
        let closed = item(1, false);
        assert!(can_create_booking(2, &open).is_ok());
        assert!(matches!(can_create_booking(1, &open), Err(EngineError::AccessDenied(_))));
        assert!(matches!(can_create_booking(2, &closed), Err(EngineError::Validation(_))));
    }

    #[test]
    fn approve_is_owner_only() {
        let it = item(1, true);
        assert!(can_approve(1, &it).is_ok());
        assert!(matches!(can_approve(2, &it), Err(EngineError::AccessDenied(_))));
    }

    #[test]
    fn view_is_booker_or_owner() {
        let it = item(1, true);
        let b = booking(&it, 2, Span::new(0, 10), BookingStatus::Waiting);
        assert!(can_view_booking(1, &b, &it).is_ok());
        assert!(can_view_booking(2, &b, &it).is_ok());
        assert!(matches!(can_view_booking(3, &b, &it), Err(EngineError::AccessDenied(_))));
    }

    #[test]
    fn edit_is_owner_only() {
        let it = item(7, true);
        assert!(can_edit_item(7, &it).is_ok());
        assert!(can_edit_item(8, &it).is_err());
    }

    #[test]
    fn comment_needs_approved_and_ended_booking() {
        let it = item(1, true);
        let now = 1_000;
        let ended_approved = booking(&it, 5, Span::new(100, 200), BookingStatus::Approved);
        let ended_rejected = booking(&it, 5, Span::new(100, 200), BookingStatus::Rejected);
        let ongoing = booking(&it, 5, Span::new(900, 2_000), BookingStatus::Approved);
        let ends_now = booking(&it, 5, Span::new(100, now), BookingStatus::Approved);
        let someone_else = booking(&it, 6, Span::new(100, 200), BookingStatus::Approved);

        assert!(can_comment(5, it.id, std::slice::from_ref(&ended_approved), now).is_ok());
        for b in [ended_rejected, ongoing, ends_now, someone_else] {
            let err = can_comment(5, it.id, &[b], now).unwrap_err();
            assert!(matches!(err, EngineError::Validation(ref m) if m.contains("cannot comment")));
        }
    }

    #[test]
    fn comment_checks_the_right_item() {
        let it = item(1, true);
        let other = item(1, true);
        let b = booking(&other, 5, Span::new(100, 200), BookingStatus::Approved);
        assert!(!has_completed_booking(5, it.id, &[b], 1_000));
    }
}
