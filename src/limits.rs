use crate::model::Ms;

const DAY_MS: Ms = 86_400_000;

/// Earliest accepted booking timestamp (unix epoch).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// Latest accepted booking timestamp (9999-12-31T23:59:59.999Z).
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_799_999;
/// Longest single lending period.
pub const MAX_SPAN_DURATION_MS: Ms = 366 * DAY_MS;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 2_000;
pub const MAX_COMMENT_LEN: usize = 2_000;

/// Upper bound for `Page::size` unless configured otherwise.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1_000;
