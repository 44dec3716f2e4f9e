//! Persistence capabilities the engine consumes. Implementations must make
//! `BookingStore::transition` an atomic read-modify-write of one booking.

mod compactor;
mod memory;

pub use compactor::compact_if_due;
pub use memory::InMemoryStore;

use async_trait::async_trait;

use crate::engine::EngineError;
use crate::model::*;

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert_item(&self, item: Item) -> Result<(), EngineError>;
    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, EngineError>;
    /// Apply `patch` under the item's row lock and return the result.
    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<Item, EngineError>;
    /// Ordered by id.
    async fn items_by_owner(&self, owner: UserId) -> Result<Vec<Item>, EngineError>;
    /// Ordered by id.
    async fn available_items(&self) -> Result<Vec<Item>, EngineError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: Booking) -> Result<(), EngineError>;
    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, EngineError>;
    /// Set the status to `to` iff it is currently `from`; otherwise
    /// `InvalidState` carrying the status actually found.
    async fn transition(
        &self,
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Booking, EngineError>;
    async fn bookings_by_booker(&self, booker: UserId) -> Result<Vec<Booking>, EngineError>;
    /// Bookings of every item owned by `owner`.
    async fn bookings_by_owner(&self, owner: UserId) -> Result<Vec<Booking>, EngineError>;
    async fn bookings_for_items(&self, item_ids: &[ItemId]) -> Result<Vec<Booking>, EngineError>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, comment: Comment) -> Result<(), EngineError>;
    /// Ordered by creation time.
    async fn comments_for_items(&self, item_ids: &[ItemId]) -> Result<Vec<Comment>, EngineError>;
}

/// Everything the engine needs from storage.
pub trait Store: ItemStore + BookingStore + CommentStore {}

impl<T: ItemStore + BookingStore + CommentStore> Store for T {}
