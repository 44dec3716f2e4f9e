use crate::engine::{EngineError, ErrorKind};

// ── Lifecycle counters ──────────────────────────────────────────

/// Counter: bookings accepted into WAITING.
pub const BOOKINGS_CREATED_TOTAL: &str = "lendit_bookings_created_total";

/// Counter: approval decisions. Labels: decision.
pub const BOOKING_DECISIONS_TOTAL: &str = "lendit_booking_decisions_total";

/// Counter: comments stored.
pub const COMMENTS_TOTAL: &str = "lendit_comments_total";

/// Counter: failed engine operations, whatever the cause. Labels: op, kind.
pub const REJECTIONS_TOTAL: &str = "lendit_rejections_total";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "lendit_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "lendit_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "lendit_wal_compactions_total";

/// Short label for an error kind.
pub fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not_found",
        ErrorKind::AccessDenied => "access_denied",
        ErrorKind::InvalidState => "invalid_state",
        ErrorKind::Validation => "validation",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Storage => "storage",
    }
}

/// Count a failed operation and hand the error back.
pub fn rejected(op: &'static str, err: EngineError) -> EngineError {
    metrics::counter!(REJECTIONS_TOTAL, "op" => op, "kind" => kind_label(err.kind())).increment(1);
    tracing::debug!("{op} rejected: {err}");
    err
}
