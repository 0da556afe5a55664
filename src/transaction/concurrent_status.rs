use core::fmt;
use std::{
    collections::{HashMap, HashSet},
    sync::{Condvar, Mutex},
};

use log::debug;

use crate::{
    error::DbError,
    storage::page_id::HeapPageID,
    transaction::{Transaction, TransactionID, TransactionStatus},
    transaction::wait_for_graph::WaitForGraph,
    types::DbResult,
};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Lock {
    XLock,
    SLock,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

enum Grant {
    Granted,
    // the owners the requester has to wait for
    Wait(Vec<TransactionID>),
}

/// The lock table and the wait-for graph. Both live behind one mutex so
/// a release can never race a cycle check.
struct LockTables {
    s_lock_map: HashMap<HeapPageID, HashSet<TransactionID>>,
    x_lock_map: HashMap<HeapPageID, TransactionID>,

    hold_pages: HashMap<TransactionID, HashSet<HeapPageID>>,

    wait_for_graph: WaitForGraph,

    // Transaction status, used for transaction isolation, the idea is from PostgreSQL.
    //
    // PostgreSQL maintains a data structure for transaction status, such that given a transaction
    // ID, it gives the transaction state (running, aborted, committed).
    transaction_status: HashMap<TransactionID, TransactionStatus>,
}

impl LockTables {
    fn new() -> Self {
        Self {
            s_lock_map: HashMap::new(),
            x_lock_map: HashMap::new(),
            hold_pages: HashMap::new(),
            wait_for_graph: WaitForGraph::new(),
            transaction_status: HashMap::new(),
        }
    }

    /// Try to grant `lock` on `page_id` to `tid` right now. Reentrant
    /// requests and the sole-owner upgrade are grants; everything else
    /// incompatible reports the owners to wait for.
    fn try_grant(&mut self, tid: TransactionID, lock: Lock, page_id: &HeapPageID) -> Grant {
        if let Some(owner) = self.x_lock_map.get(page_id).copied() {
            if owner == tid {
                // an exclusive owner is covered for both modes
                return self.granted(tid, page_id);
            }
            return Grant::Wait(vec![owner]);
        }

        match lock {
            Lock::SLock => {
                self.s_lock_map
                    .entry(*page_id)
                    .or_insert_with(HashSet::new)
                    .insert(tid);
                self.granted(tid, page_id)
            }
            Lock::XLock => {
                let others: Vec<TransactionID> = match self.s_lock_map.get(page_id) {
                    Some(owners) => owners.iter().filter(|o| **o != tid).copied().collect(),
                    None => Vec::new(),
                };

                if !others.is_empty() {
                    return Grant::Wait(others);
                }

                // either the page is unlocked, or `tid` is the sole
                // shared owner and upgrades in place
                self.s_lock_map.remove(page_id);
                self.x_lock_map.insert(*page_id, tid);
                self.granted(tid, page_id)
            }
        }
    }

    fn granted(&mut self, tid: TransactionID, page_id: &HeapPageID) -> Grant {
        self.hold_pages
            .entry(tid)
            .or_insert_with(HashSet::new)
            .insert(*page_id);
        Grant::Granted
    }

    fn release(&mut self, tid: TransactionID, page_id: &HeapPageID) {
        if let Some(owners) = self.s_lock_map.get_mut(page_id) {
            owners.remove(&tid);
            if owners.is_empty() {
                self.s_lock_map.remove(page_id);
            }
        }

        if self.x_lock_map.get(page_id) == Some(&tid) {
            self.x_lock_map.remove(page_id);
        }

        if let Some(pages) = self.hold_pages.get_mut(&tid) {
            pages.remove(page_id);
        }
    }
}

/// Per-page shared/exclusive locks under strict two-phase locking:
/// locks accumulate during the transaction and are only released at
/// completion.
///
/// Waiting is a condition-variable sleep, woken whenever any lock is
/// released; woken requesters simply re-run the grant check. A request
/// that would close a cycle in the wait-for graph is refused with an
/// `Aborted` error instead of parking.
pub struct ConcurrentStatus {
    tables: Mutex<LockTables>,
    lock_released: Condvar,
}

impl ConcurrentStatus {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(LockTables::new()),
            lock_released: Condvar::new(),
        }
    }

    /// Request a lock on the given page. Blocks until the lock is
    /// granted, or fails with `Aborted` when waiting would deadlock.
    pub fn acquire_lock(&self, tx: &Transaction, lock: Lock, page_id: &HeapPageID) -> DbResult {
        let tid = tx.get_id();
        debug!("request {:?} on {:?} for {}", lock, page_id, tx);

        let mut tables = self.tables.lock().unwrap();
        loop {
            let owners = match tables.try_grant(tid, lock, page_id) {
                Grant::Granted => {
                    tables.wait_for_graph.remove_waiter(tid);
                    debug!("granted {:?} on {:?} to {}", lock, page_id, tx);
                    return Ok(());
                }
                Grant::Wait(owners) => owners,
            };

            for owner in &owners {
                tables.wait_for_graph.add_edge(tid, *owner);
            }

            if tables.wait_for_graph.has_cycle_from(tid) {
                tables.wait_for_graph.remove_waiter(tid);
                let err = DbError::aborted(&format!(
                    "deadlock detected: {} waiting for {:?} on {:?} held by {:?}",
                    tx, lock, page_id, owners
                ));
                debug!("{}", err);
                return Err(err);
            }

            // wait() gives the mutex back, so no thread ever sleeps
            // while holding the lock-table monitor
            tables = self.lock_released.wait(tables).unwrap();
        }
    }

    /// Release one lock. Wakes every waiter; they re-race for the
    /// grant.
    pub fn release_lock(&self, tx: &Transaction, page_id: &HeapPageID) {
        let mut tables = self.tables.lock().unwrap();
        tables.release(tx.get_id(), page_id);
        drop(tables);
        self.lock_released.notify_all();
    }

    /// Release everything `tx` holds, exclusive locks first, then
    /// shared ones, and drop it from the wait-for graph.
    pub fn release_all(&self, tx: &Transaction) {
        let tid = tx.get_id();
        let mut tables = self.tables.lock().unwrap();

        let x_pages: Vec<HeapPageID> = tables
            .x_lock_map
            .iter()
            .filter(|(_, owner)| **owner == tid)
            .map(|(pid, _)| *pid)
            .collect();
        for pid in x_pages {
            tables.release(tid, &pid);
        }

        let s_pages: Vec<HeapPageID> = tables
            .s_lock_map
            .iter()
            .filter(|(_, owners)| owners.contains(&tid))
            .map(|(pid, _)| *pid)
            .collect();
        for pid in s_pages {
            tables.release(tid, &pid);
        }

        tables.hold_pages.remove(&tid);
        tables.wait_for_graph.remove_transaction(tid);

        drop(tables);
        self.lock_released.notify_all();
    }

    pub fn holds_lock(&self, tx: &Transaction, page_id: &HeapPageID) -> bool {
        let tables = self.tables.lock().unwrap();
        tables
            .hold_pages
            .get(&tx.get_id())
            .map_or(false, |pages| pages.contains(page_id))
    }

    /// Pages `tx` holds exclusively. The commit path flushes exactly
    /// these.
    pub fn locked_write_pages(&self, tx: &Transaction) -> Vec<HeapPageID> {
        let tables = self.tables.lock().unwrap();
        tables
            .x_lock_map
            .iter()
            .filter(|(_, owner)| **owner == tx.get_id())
            .map(|(pid, _)| *pid)
            .collect()
    }

    pub fn locked_read_pages(&self, tx: &Transaction) -> Vec<HeapPageID> {
        let tables = self.tables.lock().unwrap();
        tables
            .s_lock_map
            .iter()
            .filter(|(_, owners)| owners.contains(&tx.get_id()))
            .map(|(pid, _)| *pid)
            .collect()
    }

    pub fn set_transaction_status(&self, tid: TransactionID, status: TransactionStatus) {
        let mut tables = self.tables.lock().unwrap();
        tables.transaction_status.insert(tid, status);
    }

    pub fn get_transaction_status(&self, tid: &TransactionID) -> Option<TransactionStatus> {
        let tables = self.tables.lock().unwrap();
        tables.transaction_status.get(tid).cloned()
    }

    pub fn clear(&self) {
        let mut tables = self.tables.lock().unwrap();
        tables.s_lock_map.clear();
        tables.x_lock_map.clear();
        tables.hold_pages.clear();
        tables.transaction_status.clear();
        tables.wait_for_graph = WaitForGraph::new();
        drop(tables);
        self.lock_released.notify_all();
    }
}

impl fmt::Display for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tables = self.tables.lock().unwrap();
        let mut depiction = "\n".to_string();

        depiction.push_str("s_lock_map: {");
        for (pid, owners) in tables.s_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?},", pid.get_short_repr(), owners));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("x_lock_map: {");
        for (pid, owner) in tables.x_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> tx_{},", pid.get_short_repr(), owner));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("hold_pages: {");
        for (tid, pages) in tables.hold_pages.iter() {
            let pages: Vec<String> = pages.iter().map(|p| p.get_short_repr()).collect();
            depiction.push_str(&format!("\n\ttx_{} -> {:?},", tid, pages));
        }
        depiction.push_str("\n}\n");

        write!(f, "{}", depiction)
    }
}

impl fmt::Debug for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
