mod conflict;
mod error;
pub mod lifecycle;
mod mutations;
pub mod policy;
mod queries;
pub mod window;

pub use error::{EngineError, ErrorKind};
pub use queries::{next_and_last, sort_newest_first};
pub use window::{phase, BookingFilter, Phase};

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::model::*;
use crate::store::{InMemoryStore, Store};

/// The booking service: every externally visible operation goes through here.
///
/// Holds no mutable state of its own; consistency comes from the store's
/// per-row atomicity.
pub struct Engine<S = InMemoryStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sampled once per operation.
    pub(super) fn now(&self) -> Ms {
        self.clock.now_ms()
    }

    pub(super) async fn require_item(&self, id: ItemId) -> Result<Item, EngineError> {
        self.store.find_item(id).await?.ok_or(EngineError::NotFound(id))
    }

    pub(super) async fn require_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.store.find_booking(id).await?.ok_or(EngineError::NotFound(id))
    }
}
