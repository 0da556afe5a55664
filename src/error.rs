use std::{error::Error, fmt};

use backtrace::Backtrace;

/// What went wrong, at the granularity callers dispatch on.
///
/// `Aborted` is special: it is the only error a transaction is expected
/// to recover from (by rolling itself back and retrying).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorKind {
    /// Logical storage failure (page out of range, invalid slot,
    /// schema mismatch, no evictable page).
    Storage,
    /// The transaction lost a deadlock and must roll back.
    Aborted,
    /// Underlying file I/O fault.
    Io,
    /// The operation is not defined for the given types.
    Unsupported,
}

pub struct DbError {
    kind: ErrorKind,
    details: String,
    backtrace: Backtrace,
}

impl DbError {
    pub fn new(msg: &str) -> Self {
        Self {
            kind: ErrorKind::Storage,
            details: msg.to_string(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn aborted(msg: &str) -> Self {
        Self {
            kind: ErrorKind::Aborted,
            details: msg.to_string(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn io(msg: &str) -> Self {
        Self {
            kind: ErrorKind::Io,
            details: msg.to_string(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn unsupported(msg: &str) -> Self {
        Self {
            kind: ErrorKind::Unsupported,
            details: msg.to_string(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    pub fn get_kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == ErrorKind::Aborted
    }

    pub fn show_backtrace(&self) {
        let mut backtrace = self.backtrace.clone();
        backtrace.resolve();
        log::error!("{}\nbacktrace:\n{:?}", self, backtrace);
    }
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::io(&e.to_string())
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.details)
    }
}

impl fmt::Debug for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Error for DbError {}
