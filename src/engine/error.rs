use ulid::Ulid;

use crate::model::{BookingId, BookingStatus};

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AccessDenied(&'static str),
    InvalidState(BookingId, BookingStatus),
    Validation(String),
    Conflict(BookingId),
    LimitExceeded(&'static str),
    Storage(String),
}

/// Coarse classification for callers mapping errors onto a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    InvalidState,
    Validation,
    Conflict,
    Storage,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::AccessDenied(_) => ErrorKind::AccessDenied,
            EngineError::InvalidState(..) => ErrorKind::InvalidState,
            EngineError::Validation(_) | EngineError::LimitExceeded(_) => ErrorKind::Validation,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AccessDenied(why) => write!(f, "access denied: {why}"),
            EngineError::InvalidState(id, status) => {
                write!(f, "booking {id} is already {status}")
            }
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::Conflict(id) => write!(f, "conflict with approved booking: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(crate::observability::kind_label(*self))
    }
}
