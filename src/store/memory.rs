use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{info, warn};

use crate::engine::EngineError;
use crate::model::*;
use crate::wal::Wal;

use super::{BookingStore, CommentStore, ItemStore};

pub type SharedItem = Arc<RwLock<Item>>;
pub type SharedBooking = Arc<RwLock<Booking>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit:
/// block for the first append, drain whatever else is queued, fsync once,
/// then answer every sender with the shared result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let append_result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so stale bytes never leak into the next batch.
    let flush_result = wal.flush_sync();
    append_result.and(flush_result)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(wal.compact(&events));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => {}
    }
}

// ── Replay ───────────────────────────────────────────────

/// Plain owned state rebuilt from the log before any locks exist.
#[derive(Default)]
struct Replayed {
    items: HashMap<ItemId, Item>,
    bookings: HashMap<BookingId, Booking>,
    comments: Vec<Comment>,
}

impl Replayed {
    fn apply(&mut self, event: Event) {
        match event {
            Event::ItemCreated { id, owner, name, description, available } => {
                self.items.insert(id, Item { id, owner, name, description, available });
            }
            Event::ItemUpdated { id, name, description, available } => {
                if let Some(item) = self.items.get_mut(&id) {
                    item.name = name;
                    item.description = description;
                    item.available = available;
                }
            }
            Event::BookingRequested { id, item_id, booker, span } => {
                self.bookings.insert(
                    id,
                    Booking { id, item_id, booker, span, status: BookingStatus::Waiting },
                );
            }
            Event::BookingDecided { id, item_id, status } => {
                if let Some(b) = self.bookings.get_mut(&id).filter(|b| b.item_id == item_id) {
                    b.status = status;
                } else {
                    warn!("skipping decision for unknown booking {id} on item {item_id}");
                }
            }
            Event::CommentAdded { id, item_id, author, text, created_at } => {
                self.comments.push(Comment { id, item_id, author, text, created_at });
            }
        }
    }

    /// Length of the log a compaction would write for this state.
    fn snapshot_len(&self) -> usize {
        let decided = self.bookings.values().filter(|b| b.status.is_terminal()).count();
        self.items.len() + self.bookings.len() + decided + self.comments.len()
    }
}

// ── Store ────────────────────────────────────────────────

/// Row-locked in-memory tables with an optional WAL behind them.
///
/// Every mutation holds `commit_gate` for reading while it persists and
/// applies; compaction holds it for writing so the snapshot it writes
/// cannot miss a committed event.
pub struct InMemoryStore {
    items: DashMap<ItemId, SharedItem>,
    bookings: DashMap<BookingId, SharedBooking>,
    comments: DashMap<CommentId, Comment>,
    items_by_owner: DashMap<UserId, Vec<ItemId>>,
    bookings_by_booker: DashMap<UserId, Vec<BookingId>>,
    bookings_by_item: DashMap<ItemId, Vec<BookingId>>,
    comments_by_item: DashMap<ItemId, Vec<CommentId>>,
    commit_gate: RwLock<()>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Volatile store: nothing survives the process.
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            bookings: DashMap::new(),
            comments: DashMap::new(),
            items_by_owner: DashMap::new(),
            bookings_by_booker: DashMap::new(),
            bookings_by_item: DashMap::new(),
            comments_by_item: DashMap::new(),
            commit_gate: RwLock::new(()),
            wal_tx: None,
        }
    }

    /// Durable store: replays `wal_path`, then appends every mutation to it.
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: &Path) -> io::Result<Self> {
        let replay = Wal::replay(wal_path)?;
        if replay.torn_tail {
            warn!(
                "discarding unreadable tail of {} after byte {}",
                wal_path.display(),
                replay.valid_len
            );
            Wal::discard_tail(wal_path, replay.valid_len)?;
        }
        let replayed_count = replay.events.len();
        let mut replayed = Replayed::default();
        for event in replay.events {
            replayed.apply(event);
        }

        let mut wal = Wal::open(wal_path)?;
        wal.carry_backlog(replayed_count.saturating_sub(replayed.snapshot_len()) as u64);
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut store = Self::new();
        store.wal_tx = Some(wal_tx);
        for (_, item) in replayed.items {
            store.index_item(item);
        }
        for (_, booking) in replayed.bookings {
            store.index_booking(booking);
        }
        for comment in replayed.comments {
            store.index_comment(comment);
        }
        info!(
            "replayed {replayed_count} events from {}: {} items, {} bookings, {} comments",
            wal_path.display(),
            store.items.len(),
            store.bookings.len(),
            store.comments.len()
        );
        Ok(store)
    }

    pub fn is_durable(&self) -> bool {
        self.wal_tx.is_some()
    }

    fn index_item(&self, item: Item) {
        self.items_by_owner.entry(item.owner).or_default().push(item.id);
        self.items.insert(item.id, Arc::new(RwLock::new(item)));
    }

    fn index_booking(&self, booking: Booking) {
        self.bookings_by_booker.entry(booking.booker).or_default().push(booking.id);
        self.bookings_by_item.entry(booking.item_id).or_default().push(booking.id);
        self.bookings.insert(booking.id, Arc::new(RwLock::new(booking)));
    }

    fn index_comment(&self, comment: Comment) {
        self.comments_by_item.entry(comment.item_id).or_default().push(comment.id);
        self.comments.insert(comment.id, comment);
    }

    fn item_row(&self, id: &ItemId) -> Option<SharedItem> {
        self.items.get(id).map(|e| e.value().clone())
    }

    fn booking_row(&self, id: &BookingId) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    /// Row handles for `ids`, cloned out so no map shard stays locked across an await.
    fn booking_rows(&self, ids: &[BookingId]) -> Vec<SharedBooking> {
        ids.iter().filter_map(|id| self.booking_row(id)).collect()
    }

    fn booking_ids_for_items(&self, item_ids: &[ItemId]) -> Vec<BookingId> {
        item_ids
            .iter()
            .filter_map(|id| self.bookings_by_item.get(id).map(|e| e.value().clone()))
            .flatten()
            .collect()
    }

    async fn read_all<T: Clone>(rows: Vec<Arc<RwLock<T>>>) -> Vec<T> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.read().await.clone());
        }
        out
    }

    /// Write event to WAL via the background group-commit writer.
    async fn persist(&self, event: &Event) -> Result<(), EngineError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// Events that recreate the current state, parents before children.
    async fn snapshot_events(&self) -> Vec<Event> {
        let item_rows: Vec<SharedItem> = self.items.iter().map(|e| e.value().clone()).collect();
        let booking_rows: Vec<SharedBooking> =
            self.bookings.iter().map(|e| e.value().clone()).collect();
        let mut comments: Vec<Comment> = self.comments.iter().map(|e| e.value().clone()).collect();
        comments.sort_by_key(|c| (c.created_at, c.id));

        let mut events = Vec::new();
        for item in Self::read_all(item_rows).await {
            events.push(Event::ItemCreated {
                id: item.id,
                owner: item.owner,
                name: item.name,
                description: item.description,
                available: item.available,
            });
        }
        for b in Self::read_all(booking_rows).await {
            events.push(Event::BookingRequested {
                id: b.id,
                item_id: b.item_id,
                booker: b.booker,
                span: b.span,
            });
            if b.status.is_terminal() {
                events.push(Event::BookingDecided {
                    id: b.id,
                    item_id: b.item_id,
                    status: b.status,
                });
            }
        }
        for c in comments {
            events.push(Event::CommentAdded {
                id: c.id,
                item_id: c.item_id,
                author: c.author,
                text: c.text,
                created_at: c.created_at,
            });
        }
        events
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    /// No-op for a volatile store.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let _gate = self.commit_gate.write().await;
        let events = self.snapshot_events().await;
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))?;

        metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let Some(wal_tx) = &self.wal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn insert_item(&self, item: Item) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        if self.items.contains_key(&item.id) {
            return Err(EngineError::Storage(format!("duplicate item id {}", item.id)));
        }
        let event = Event::ItemCreated {
            id: item.id,
            owner: item.owner,
            name: item.name.clone(),
            description: item.description.clone(),
            available: item.available,
        };
        self.persist(&event).await?;
        self.index_item(item);
        Ok(())
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, EngineError> {
        let Some(row) = self.item_row(&id) else {
            return Ok(None);
        };
        let item = row.read().await.clone();
        Ok(Some(item))
    }

    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<Item, EngineError> {
        let _gate = self.commit_gate.read().await;
        let row = self.item_row(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = row.write().await;
        let mut updated = guard.clone();
        patch.apply(&mut updated);

        let event = Event::ItemUpdated {
            id,
            name: updated.name.clone(),
            description: updated.description.clone(),
            available: updated.available,
        };
        self.persist(&event).await?;
        *guard = updated.clone();
        Ok(updated)
    }

    async fn items_by_owner(&self, owner: UserId) -> Result<Vec<Item>, EngineError> {
        let rows: Vec<SharedItem> = self
            .items_by_owner
            .get(&owner)
            .map(|e| e.value().clone())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.item_row(id))
            .collect();
        let mut items = Self::read_all(rows).await;
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    async fn available_items(&self) -> Result<Vec<Item>, EngineError> {
        let rows: Vec<SharedItem> = self.items.iter().map(|e| e.value().clone()).collect();
        let mut items: Vec<Item> = Self::read_all(rows)
            .await
            .into_iter()
            .filter(|i| i.available)
            .collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_booking(&self, booking: Booking) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        if self.bookings.contains_key(&booking.id) {
            return Err(EngineError::Storage(format!("duplicate booking id {}", booking.id)));
        }
        let event = Event::BookingRequested {
            id: booking.id,
            item_id: booking.item_id,
            booker: booking.booker,
            span: booking.span,
        };
        self.persist(&event).await?;
        self.index_booking(booking);
        Ok(())
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>, EngineError> {
        let Some(row) = self.booking_row(&id) else {
            return Ok(None);
        };
        let booking = row.read().await.clone();
        Ok(Some(booking))
    }

    async fn transition(
        &self,
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let _gate = self.commit_gate.read().await;
        let row = self.booking_row(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = row.write().await;
        if guard.status != from {
            return Err(EngineError::InvalidState(id, guard.status));
        }

        let event = Event::BookingDecided {
            id,
            item_id: guard.item_id,
            status: to,
        };
        self.persist(&event).await?;
        guard.status = to;
        Ok(guard.clone())
    }

    async fn bookings_by_booker(&self, booker: UserId) -> Result<Vec<Booking>, EngineError> {
        let ids = self
            .bookings_by_booker
            .get(&booker)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(Self::read_all(self.booking_rows(&ids)).await)
    }

    async fn bookings_by_owner(&self, owner: UserId) -> Result<Vec<Booking>, EngineError> {
        let item_ids = self
            .items_by_owner
            .get(&owner)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let ids = self.booking_ids_for_items(&item_ids);
        Ok(Self::read_all(self.booking_rows(&ids)).await)
    }

    async fn bookings_for_items(&self, item_ids: &[ItemId]) -> Result<Vec<Booking>, EngineError> {
        let ids = self.booking_ids_for_items(item_ids);
        Ok(Self::read_all(self.booking_rows(&ids)).await)
    }
}

#[async_trait]
impl CommentStore for InMemoryStore {
    async fn insert_comment(&self, comment: Comment) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        if self.comments.contains_key(&comment.id) {
            return Err(EngineError::Storage(format!("duplicate comment id {}", comment.id)));
        }
        let event = Event::CommentAdded {
            id: comment.id,
            item_id: comment.item_id,
            author: comment.author,
            text: comment.text.clone(),
            created_at: comment.created_at,
        };
        self.persist(&event).await?;
        self.index_comment(comment);
        Ok(())
    }

    async fn comments_for_items(&self, item_ids: &[ItemId]) -> Result<Vec<Comment>, EngineError> {
        let mut comments: Vec<Comment> = item_ids
            .iter()
            .filter_map(|id| self.comments_by_item.get(id).map(|e| e.value().clone()))
            .flatten()
            .filter_map(|cid| self.comments.get(&cid).map(|e| e.value().clone()))
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("lendit_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn item(owner: UserId) -> Item {
        Item {
            id: Ulid::new(),
            owner,
            name: "Kayak".into(),
            description: "single seat".into(),
            available: true,
        }
    }

    fn booking(item: &Item, booker: UserId, start: Ms, end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            item_id: item.id,
            booker,
            span: Span::new(start, end),
            status: BookingStatus::Waiting,
        }
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = InMemoryStore::new();
        let it = item(1);
        store.insert_item(it.clone()).await.unwrap();
        let b = booking(&it, 2, 100, 200);
        store.insert_booking(b.clone()).await.unwrap();

        let decided = store
            .transition(b.id, BookingStatus::Waiting, BookingStatus::Approved)
            .await
            .unwrap();
        assert_eq!(decided.status, BookingStatus::Approved);

        let err = store
            .transition(b.id, BookingStatus::Waiting, BookingStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(id, BookingStatus::Approved) if id == b.id));
        let stored = store.find_booking(b.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Approved);
    }

    #[tokio::test]
    async fn transition_unknown_booking_is_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .transition(Ulid::new(), BookingStatus::Waiting, BookingStatus::Approved)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_transitions_have_one_winner() {
        let store = Arc::new(InMemoryStore::new());
        let it = item(1);
        store.insert_item(it.clone()).await.unwrap();
        let b = booking(&it, 2, 100, 200);
        store.insert_booking(b.clone()).await.unwrap();

        let id = b.id;
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let to = if i % 2 == 0 { BookingStatus::Approved } else { BookingStatus::Rejected };
            handles.push(tokio::spawn(async move {
                store.transition(id, BookingStatus::Waiting, to).await
            }));
        }
        let mut wins = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert!(matches!(e, EngineError::InvalidState(..))),
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn owner_scope_follows_item_ownership() {
        let store = InMemoryStore::new();
        let mine = item(1);
        let theirs = item(9);
        store.insert_item(mine.clone()).await.unwrap();
        store.insert_item(theirs.clone()).await.unwrap();
        store.insert_booking(booking(&mine, 2, 0, 10)).await.unwrap();
        store.insert_booking(booking(&mine, 3, 0, 10)).await.unwrap();
        store.insert_booking(booking(&theirs, 2, 0, 10)).await.unwrap();

        assert_eq!(store.bookings_by_owner(1).await.unwrap().len(), 2);
        assert_eq!(store.bookings_by_owner(9).await.unwrap().len(), 1);
        assert_eq!(store.bookings_by_booker(2).await.unwrap().len(), 2);
        assert!(store.bookings_by_owner(42).await.unwrap().is_empty());
        assert_eq!(store.bookings_for_items(&[mine.id, theirs.id]).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_item_applies_patch() {
        let store = InMemoryStore::new();
        let it = item(1);
        store.insert_item(it.clone()).await.unwrap();
        let patch = ItemPatch {
            available: Some(false),
            ..Default::default()
        };
        let updated = store.update_item(it.id, &patch).await.unwrap();
        assert!(!updated.available);
        assert!(store.available_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn durable_store_survives_reopen() {
        let path = test_wal_path("reopen.wal");
        let it = item(1);
        let b = booking(&it, 2, 100, 200);
        let comment = Comment {
            id: Ulid::new(),
            item_id: it.id,
            author: 2,
            text: "fun".into(),
            created_at: 300,
        };
        {
            let store = InMemoryStore::open(&path).unwrap();
            assert!(store.is_durable());
            store.insert_item(it.clone()).await.unwrap();
            store.insert_booking(b.clone()).await.unwrap();
            store
                .transition(b.id, BookingStatus::Waiting, BookingStatus::Approved)
                .await
                .unwrap();
            store.insert_comment(comment.clone()).await.unwrap();
        }

        let store = InMemoryStore::open(&path).unwrap();
        assert_eq!(store.find_item(it.id).await.unwrap(), Some(it.clone()));
        let replayed = store.find_booking(b.id).await.unwrap().unwrap();
        assert_eq!(replayed.status, BookingStatus::Approved);
        assert_eq!(store.comments_for_items(&[it.id]).await.unwrap(), vec![comment]);
        assert_eq!(store.items_by_owner(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn torn_tail_is_cut_before_new_appends() {
        let path = test_wal_path("torn.wal");
        let first = item(1);
        {
            let store = InMemoryStore::open(&path).unwrap();
            store.insert_item(first.clone()).await.unwrap();
        }
        {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[42, 0, 0, 0, 7]).unwrap();
        }

        let second = item(1);
        {
            let store = InMemoryStore::open(&path).unwrap();
            store.insert_item(second.clone()).await.unwrap();
        }

        let store = InMemoryStore::open(&path).unwrap();
        assert_eq!(store.find_item(first.id).await.unwrap(), Some(first));
        assert_eq!(store.find_item(second.id).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn compact_preserves_state_and_resets_counter() {
        let path = test_wal_path("compact.wal");
        let it = item(1);
        {
            let store = InMemoryStore::open(&path).unwrap();
            store.insert_item(it.clone()).await.unwrap();
            for flag in [false, true, false, true] {
                let patch = ItemPatch {
                    available: Some(flag),
                    ..Default::default()
                };
                store.update_item(it.id, &patch).await.unwrap();
            }
            assert_eq!(store.wal_appends_since_compact().await, 5);
            let before = std::fs::metadata(&path).unwrap().len();

            store.compact_wal().await.unwrap();
            assert_eq!(store.wal_appends_since_compact().await, 0);
            assert!(std::fs::metadata(&path).unwrap().len() < before);
        }

        let store = InMemoryStore::open(&path).unwrap();
        assert_eq!(store.find_item(it.id).await.unwrap(), Some(it));
    }

    #[tokio::test]
    async fn reopen_counts_superseded_entries() {
        let path = test_wal_path("backlog.wal");
        let it = item(1);
        let b = booking(&it, 2, 100, 200);
        {
            let store = InMemoryStore::open(&path).unwrap();
            store.insert_item(it.clone()).await.unwrap();
            for flag in [false, true] {
                let patch = ItemPatch {
                    available: Some(flag),
                    ..Default::default()
                };
                store.update_item(it.id, &patch).await.unwrap();
            }
            store.insert_booking(b.clone()).await.unwrap();
            store
                .transition(b.id, BookingStatus::Waiting, BookingStatus::Rejected)
                .await
                .unwrap();
        }

        // Five entries on disk, three of them needed to rebuild the state.
        let store = InMemoryStore::open(&path).unwrap();
        assert_eq!(store.wal_appends_since_compact().await, 2);
        assert!(crate::store::compact_if_due(&store, 2).await);
        drop(store);

        let store = InMemoryStore::open(&path).unwrap();
        assert_eq!(store.wal_appends_since_compact().await, 0);
        assert_eq!(
            store.find_booking(b.id).await.unwrap().map(|b| b.status),
            Some(BookingStatus::Rejected)
        );
    }

    #[tokio::test]
    async fn replay_skips_decision_naming_another_item() {
        let path = test_wal_path("mismatched_decision.wal");
        let it = item(1);
        let b = booking(&it, 2, 100, 200);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&Event::ItemCreated {
                id: it.id,
                owner: it.owner,
                name: it.name.clone(),
                description: it.description.clone(),
                available: it.available,
            })
            .unwrap();
            wal.append(&Event::BookingRequested {
                id: b.id,
                item_id: it.id,
                booker: b.booker,
                span: b.span,
            })
            .unwrap();
            wal.append(&Event::BookingDecided {
                id: b.id,
                item_id: Ulid::new(),
                status: BookingStatus::Approved,
            })
            .unwrap();
        }

        let store = InMemoryStore::open(&path).unwrap();
        let replayed = store.find_booking(b.id).await.unwrap().unwrap();
        assert_eq!(replayed.status, BookingStatus::Waiting);
    }

    #[tokio::test]
    async fn volatile_store_compaction_is_noop() {
        let store = InMemoryStore::new();
        assert!(!store.is_durable());
        store.compact_wal().await.unwrap();
        assert_eq!(store.wal_appends_since_compact().await, 0);
    }
}
