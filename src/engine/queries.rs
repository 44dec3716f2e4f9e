use std::collections::HashMap;

use crate::model::*;
use crate::observability::rejected;
use crate::store::Store;

use super::{policy, BookingFilter, Engine, EngineError};

/// Newest first by `start`; equal starts by id ascending.
pub fn sort_newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(a.id.cmp(&b.id)));
}

/// Per item, the latest APPROVED booking that has started by `now` and the
/// earliest APPROVED booking that starts after it. Items with neither get
/// no entry.
pub fn next_and_last(bookings: &[Booking], now: Ms) -> HashMap<ItemId, NextAndLast> {
    let mut out: HashMap<ItemId, NextAndLast> = HashMap::new();
    for b in bookings {
        if b.status != BookingStatus::Approved {
            continue;
        }
        let entry = out.entry(b.item_id).or_default();
        if b.span.start <= now {
            let better = match entry.last {
                None => true,
                Some(cur) => b.span.start > cur.start || (b.span.start == cur.start && b.id < cur.id),
            };
            if better {
                entry.last = Some(ShortBooking::from(b));
            }
        } else {
            let better = match entry.next {
                None => true,
                Some(cur) => b.span.start < cur.start || (b.span.start == cur.start && b.id < cur.id),
            };
            if better {
                entry.next = Some(ShortBooking::from(b));
            }
        }
    }
    out
}

fn validate_page(page: Option<Page>, max_size: usize) -> Result<(), EngineError> {
    match page {
        Some(p) if p.size == 0 => Err(EngineError::Validation("page size must be positive".into())),
        Some(p) if p.size > max_size => Err(EngineError::LimitExceeded("page size too large")),
        _ => Ok(()),
    }
}

fn paginate<T>(rows: Vec<T>, page: Option<Page>) -> Vec<T> {
    match page {
        None => rows,
        Some(p) => rows.into_iter().skip(p.from).take(p.size).collect(),
    }
}

impl<S: Store> Engine<S> {
    pub async fn get_booking(
        &self,
        booking_id: BookingId,
        requester: UserId,
    ) -> Result<BookingView, EngineError> {
        async {
            let booking = self.require_booking(booking_id).await?;
            let item = self.require_item(booking.item_id).await?;
            policy::can_view_booking(requester, &booking, &item)?;
            Ok::<_, EngineError>(BookingView::new(&booking, &item))
        }
        .await
        .map_err(|e| rejected("get_booking", e))
    }

    pub async fn list_booker_bookings(
        &self,
        booker: UserId,
        filter: BookingFilter,
        page: Option<Page>,
    ) -> Result<Vec<BookingView>, EngineError> {
        async {
            validate_page(page, self.config.max_page_size)?;
            let now = self.now();
            let rows = self.store.bookings_by_booker(booker).await?;
            self.filtered_page(rows, filter, page, now).await
        }
        .await
        .map_err(|e| rejected("list_booker_bookings", e))
    }

    /// Bookings on every item `owner` lists. Someone who owns nothing is
    /// not an owner and gets `AccessDenied`.
    pub async fn list_owner_bookings(
        &self,
        owner: UserId,
        filter: BookingFilter,
        page: Option<Page>,
    ) -> Result<Vec<BookingView>, EngineError> {
        async {
            validate_page(page, self.config.max_page_size)?;
            if self.store.items_by_owner(owner).await?.is_empty() {
                return Err(EngineError::AccessDenied("user owns no items"));
            }
            let now = self.now();
            let rows = self.store.bookings_by_owner(owner).await?;
            self.filtered_page(rows, filter, page, now).await
        }
        .await
        .map_err(|e| rejected("list_owner_bookings", e))
    }

    pub async fn find_next_and_last_for_items(
        &self,
        item_ids: &[ItemId],
        now: Ms,
    ) -> Result<HashMap<ItemId, NextAndLast>, EngineError> {
        self.context_for(item_ids, now)
            .await
            .map_err(|e| rejected("find_next_and_last_for_items", e))
    }

    pub async fn is_eligible_to_comment(
        &self,
        user: UserId,
        item_id: ItemId,
    ) -> Result<bool, EngineError> {
        async {
            let item = self.require_item(item_id).await?;
            let now = self.now();
            let bookings = self.store.bookings_by_booker(user).await?;
            Ok::<_, EngineError>(policy::has_completed_booking(user, item.id, &bookings, now))
        }
        .await
        .map_err(|e| rejected("is_eligible_to_comment", e))
    }

    /// Booking context (last/next) is only shown to the owner.
    pub async fn get_item(&self, item_id: ItemId, requester: UserId) -> Result<ItemView, EngineError> {
        async {
            let item = self.require_item(item_id).await?;
            let comments = self
                .store
                .comments_for_items(&[item_id])
                .await?
                .iter()
                .map(CommentView::from)
                .collect();
            let context = if requester == item.owner {
                self.context_for(&[item_id], self.now())
                    .await?
                    .remove(&item_id)
                    .unwrap_or_default()
            } else {
                NextAndLast::default()
            };
            Ok::<_, EngineError>(ItemView::new(&item, context, comments))
        }
        .await
        .map_err(|e| rejected("get_item", e))
    }

    pub async fn list_owner_items(
        &self,
        owner: UserId,
        page: Option<Page>,
    ) -> Result<Vec<ItemView>, EngineError> {
        async {
            validate_page(page, self.config.max_page_size)?;
            let items = paginate(self.store.items_by_owner(owner).await?, page);
            if items.is_empty() {
                return Ok::<_, EngineError>(Vec::new());
            }
            let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
            let context = self.context_for(&ids, self.now()).await?;

            let mut comments: HashMap<ItemId, Vec<CommentView>> = HashMap::new();
            for c in self.store.comments_for_items(&ids).await? {
                comments.entry(c.item_id).or_default().push(CommentView::from(&c));
            }

            Ok(items
                .iter()
                .map(|item| {
                    let ctx = context.get(&item.id).copied().unwrap_or_default();
                    ItemView::new(item, ctx, comments.remove(&item.id).unwrap_or_default())
                })
                .collect())
        }
        .await
        .map_err(|e| rejected("list_owner_items", e))
    }

    /// Available items whose name or description contains `text`, ignoring
    /// case. Results carry no booking context or comments.
    pub async fn search_items(
        &self,
        text: &str,
        page: Option<Page>,
    ) -> Result<Vec<ItemView>, EngineError> {
        async {
            validate_page(page, self.config.max_page_size)?;
            let needle = text.trim().to_lowercase();
            if needle.is_empty() {
                return Ok::<_, EngineError>(Vec::new());
            }
            let hits: Vec<Item> = self
                .store
                .available_items()
                .await?
                .into_iter()
                .filter(|i| {
                    i.name.to_lowercase().contains(&needle)
                        || i.description.to_lowercase().contains(&needle)
                })
                .collect();
            Ok(paginate(hits, page)
                .iter()
                .map(|i| ItemView::new(i, NextAndLast::default(), Vec::new()))
                .collect())
        }
        .await
        .map_err(|e| rejected("search_items", e))
    }

    async fn context_for(
        &self,
        item_ids: &[ItemId],
        now: Ms,
    ) -> Result<HashMap<ItemId, NextAndLast>, EngineError> {
        let bookings = self.store.bookings_for_items(item_ids).await?;
        Ok(next_and_last(&bookings, now))
    }

    async fn filtered_page(
        &self,
        rows: Vec<Booking>,
        filter: BookingFilter,
        page: Option<Page>,
        now: Ms,
    ) -> Result<Vec<BookingView>, EngineError> {
        let mut rows: Vec<Booking> = rows.into_iter().filter(|b| filter.matches(b, now)).collect();
        sort_newest_first(&mut rows);
        let rows = paginate(rows, page);

        let mut items: HashMap<ItemId, Item> = HashMap::new();
        let mut out = Vec::with_capacity(rows.len());
        for b in &rows {
            if !items.contains_key(&b.item_id) {
                let item = self.require_item(b.item_id).await?;
                items.insert(item.id, item);
            }
            if let Some(item) = items.get(&b.item_id) {
                out.push(BookingView::new(b, item));
            }
        }
        Ok(out)
    }
}
