use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use log::error;

use crate::{database::Database, types::DbResult};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum TransactionStatus {
    Active,
    Aborted,
    Committed,
}

pub type TransactionID = u32;

static TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

/// A unit of work. One transaction is driven by one thread; the handle
/// is cheap to copy into lock tables and dirty-page bookkeeping.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Transaction {
    // increase monotonically by 1
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        let id = TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        let instance = Self { id };

        if let Err(e) = Database::mut_log_manager().log_start(&instance) {
            error!("failed to log start of {}: {}", instance, e);
        }

        Database::concurrent_status().set_transaction_status(id, TransactionStatus::Active);

        instance
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }

    /// Flush this transaction's pages to disk (with UPDATE log
    /// records), write the COMMIT record, then release all locks.
    pub fn commit(&self) -> DbResult {
        Database::page_cache().tx_complete(self, true)
    }

    /// Discard this transaction's cached pages and release all locks.
    /// The next reader re-reads the committed bytes from disk.
    pub fn abort(&self) -> DbResult {
        Database::page_cache().tx_complete(self, false)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
