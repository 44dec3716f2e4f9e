use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds.
pub type Ms = i64;

/// Users are opaque to the engine; existence is checked upstream.
pub type UserId = u64;

pub type ItemId = Ulid;
pub type BookingId = Ulid;
pub type CommentId = Ulid;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Fallible constructor for untrusted input.
    pub fn checked(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Waiting,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Waiting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Waiting => "WAITING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub owner: UserId,
    pub name: String,
    pub description: String,
    /// Bookable at all, independent of time.
    pub available: bool,
}

/// Fields an owner may change on an item. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub available: Option<bool>,
}

impl ItemPatch {
    pub fn apply(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(available) = self.available {
            item.available = available;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub item_id: ItemId,
    pub booker: UserId,
    pub span: Span,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub item_id: ItemId,
    pub author: UserId,
    pub text: String,
    pub created_at: Ms,
}

/// Element offset + page size. Absent paging means "everything".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub from: usize,
    pub size: usize,
}

impl Page {
    pub fn new(from: usize, size: usize) -> Self {
        Self { from, size }
    }
}

/// WAL record. One variant per state change, replayed in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ItemCreated {
        id: ItemId,
        owner: UserId,
        name: String,
        description: String,
        available: bool,
    },
    ItemUpdated {
        id: ItemId,
        name: String,
        description: String,
        available: bool,
    },
    BookingRequested {
        id: BookingId,
        item_id: ItemId,
        booker: UserId,
        span: Span,
    },
    BookingDecided {
        id: BookingId,
        item_id: ItemId,
        status: BookingStatus,
    },
    CommentAdded {
        id: CommentId,
        item_id: ItemId,
        author: UserId,
        text: String,
        created_at: Ms,
    },
}

// ── Views ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingView {
    pub id: BookingId,
    pub item: ItemSummary,
    pub booker: UserId,
    pub start: Ms,
    pub end: Ms,
    pub status: BookingStatus,
}

impl BookingView {
    pub fn new(booking: &Booking, item: &Item) -> Self {
        Self {
            id: booking.id,
            item: ItemSummary::from(item),
            booker: booking.booker,
            start: booking.span.start,
            end: booking.span.end,
            status: booking.status,
        }
    }
}

/// Booking context attached to an item view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShortBooking {
    pub id: BookingId,
    pub booker: UserId,
    pub start: Ms,
    pub end: Ms,
}

impl From<&Booking> for ShortBooking {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            booker: b.booker,
            start: b.span.start,
            end: b.span.end,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NextAndLast {
    pub last: Option<ShortBooking>,
    pub next: Option<ShortBooking>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub author: UserId,
    pub text: String,
    pub created_at: Ms,
}

impl From<&Comment> for CommentView {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id,
            author: c.author,
            text: c.text.clone(),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub owner: UserId,
    pub name: String,
    pub description: String,
    pub available: bool,
    /// Null-filled for anyone but the owner.
    pub last_booking: Option<ShortBooking>,
    pub next_booking: Option<ShortBooking>,
    pub comments: Vec<CommentView>,
}

impl ItemView {
    pub fn new(item: &Item, context: NextAndLast, comments: Vec<CommentView>) -> Self {
        Self {
            id: item.id,
            owner: item.owner,
            name: item.name.clone(),
            description: item.description.clone(),
            available: item.available,
            last_booking: context.last,
            next_booking: context.next,
            comments,
        }
    }
}
