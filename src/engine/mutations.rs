use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{self, rejected};
use crate::store::Store;

use super::conflict::{check_no_overlap, validate_span, validate_text};
use super::{lifecycle, policy, Engine, EngineError};

// Every failure passes through `rejected` exactly once, at the end of each operation.

impl<S: Store> Engine<S> {
    pub async fn create_item(
        &self,
        owner: UserId,
        name: String,
        description: String,
        available: bool,
    ) -> Result<Item, EngineError> {
        async {
            validate_text("name", &name, MAX_NAME_LEN, true)?;
            validate_text("description", &description, MAX_DESCRIPTION_LEN, false)?;

            let item = Item {
                id: Ulid::new(),
                owner,
                name,
                description,
                available,
            };
            self.store.insert_item(item.clone()).await?;
            info!("item {} listed by user {owner}", item.id);
            Ok::<_, EngineError>(item)
        }
        .await
        .map_err(|e| rejected("create_item", e))
    }

    /// Owner-only edit of name, description or availability.
    pub async fn update_item(
        &self,
        item_id: ItemId,
        user: UserId,
        patch: ItemPatch,
    ) -> Result<Item, EngineError> {
        async {
            if let Some(name) = &patch.name {
                validate_text("name", name, MAX_NAME_LEN, true)?;
            }
            if let Some(description) = &patch.description {
                validate_text("description", description, MAX_DESCRIPTION_LEN, false)?;
            }
            let item = self.require_item(item_id).await?;
            policy::can_edit_item(user, &item)?;

            let updated = self.store.update_item(item_id, &patch).await?;
            info!("item {item_id} updated by owner {user}");
            Ok::<_, EngineError>(updated)
        }
        .await
        .map_err(|e| rejected("update_item", e))
    }

    /// Request a booking. It starts out WAITING for the owner's decision.
    pub async fn create_booking(
        &self,
        booker: UserId,
        item_id: ItemId,
        start: Ms,
        end: Ms,
    ) -> Result<BookingView, EngineError> {
        async {
            let span = validate_span(start, end)?;
            let item = self.require_item(item_id).await?;
            policy::can_create_booking(booker, &item)?;

            let id = Ulid::new();
            if self.config.reject_overlaps {
                let existing = self.store.bookings_for_items(&[item_id]).await?;
                check_no_overlap(id, &span, &existing)?;
            }

            let booking = Booking {
                id,
                item_id,
                booker,
                span,
                status: BookingStatus::Waiting,
            };
            self.store.insert_booking(booking.clone()).await?;
            metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
            info!("booking {id} requested by user {booker} for item {item_id}");
            Ok::<_, EngineError>(BookingView::new(&booking, &item))
        }
        .await
        .map_err(|e| rejected("create_booking", e))
    }

    /// The owner's one-time decision on a WAITING booking.
    pub async fn approve_booking(
        &self,
        booking_id: BookingId,
        user: UserId,
        approved: bool,
    ) -> Result<BookingView, EngineError> {
        async {
            let booking = self.require_booking(booking_id).await?;
            let item = self.require_item(booking.item_id).await?;
            // Ownership before status: strangers learn nothing about the booking.
            policy::can_approve(user, &item)?;
            let to = lifecycle::decide(&booking, approved)?;

            if approved && self.config.reject_overlaps {
                let existing = self.store.bookings_for_items(&[item.id]).await?;
                check_no_overlap(booking.id, &booking.span, &existing)?;
            }

            let decided = self
                .store
                .transition(booking_id, BookingStatus::Waiting, to)
                .await?;
            metrics::counter!(observability::BOOKING_DECISIONS_TOTAL, "decision" => to.as_str())
                .increment(1);
            info!("booking {booking_id} {to} by owner {user}");
            Ok::<_, EngineError>(BookingView::new(&decided, &item))
        }
        .await
        .map_err(|e| rejected("approve_booking", e))
    }

    /// Comment on an item the author has finished borrowing.
    pub async fn add_comment(
        &self,
        author: UserId,
        item_id: ItemId,
        text: String,
    ) -> Result<Comment, EngineError> {
        async {
            validate_text("text", &text, MAX_COMMENT_LEN, true)?;
            let item = self.require_item(item_id).await?;
            let now = self.now();
            let bookings = self.store.bookings_by_booker(author).await?;
            policy::can_comment(author, item.id, &bookings, now)?;

            let comment = Comment {
                id: Ulid::new(),
                item_id,
                author,
                text,
                created_at: now,
            };
            self.store.insert_comment(comment.clone()).await?;
            metrics::counter!(observability::COMMENTS_TOTAL).increment(1);
            info!("comment {} on item {item_id} by user {author}", comment.id);
            Ok::<_, EngineError>(comment)
        }
        .await
        .map_err(|e| rejected("add_comment", e))
    }
}
