use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use log::{debug, error};
use rand::Rng;

use crate::{
    database::Database,
    error::DbError,
    storage::{page::HeapPage, page_id::HeapPageID},
    transaction::{LogManager, Permission, Transaction},
    types::{ConcurrentHashMap, DbResult, Pod, ResultPod},
    utils::HandyRwLock,
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

pub const DEFAULT_PAGES: usize = 50;
static CAPACITY: AtomicUsize = AtomicUsize::new(DEFAULT_PAGES);

/// The page cache: every page the engine touches flows through here.
///
/// `get_page` first takes the page lock on the caller's behalf, then
/// serves the page from the cache, loading it from the owning table on
/// a miss. The cache runs NO-STEAL/FORCE: dirty pages are pinned until
/// their transaction completes (eviction only ever considers clean
/// pages) and a committing transaction writes its pages out before its
/// locks are released.
pub struct PageCache {
    buffer: ConcurrentHashMap<HeapPageID, Pod<HeapPage>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self {
            buffer: ConcurrentHashMap::new(),
        }
    }

    /// Page size in bytes. Mutable only through the test hook below.
    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    /// Number of pages the cache may hold.
    pub fn get_capacity() -> usize {
        CAPACITY.load(Ordering::Relaxed)
    }

    pub fn set_capacity(capacity: usize) {
        CAPACITY.store(capacity, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }

    pub fn cached_pages_count(&self) -> usize {
        self.buffer.len()
    }

    /// Retrieve the specified page with the associated permissions.
    /// Acquires the matching page lock first and may block until that
    /// lock is granted; fails with `Aborted` if waiting would deadlock.
    pub fn get_page(
        &self,
        tx: &Transaction,
        perm: Permission,
        pid: &HeapPageID,
    ) -> ResultPod<HeapPage> {
        Database::concurrent_status().acquire_lock(tx, perm.to_lock(), pid)?;

        if let Some(page) = self.buffer.get(pid) {
            return Ok(page);
        }

        // Miss. Re-check under the map's write lock: a concurrent
        // installer's entry wins and the loser's fetch is discarded.
        let mut buffer = self.buffer.get_inner_wl();
        if let Some(page) = buffer.get(pid) {
            return Ok(page.clone());
        }

        if buffer.len() >= Self::get_capacity() {
            Self::evict(&mut buffer)?;
        }

        let page = self.load_page(pid)?;
        let pod = Arc::new(RwLock::new(page));
        buffer.insert(*pid, pod.clone());
        Ok(pod)
    }

    fn load_page(&self, pid: &HeapPageID) -> Result<HeapPage, DbError> {
        let table_rc = Database::catalog()
            .get_table(&pid.get_table_id())
            .ok_or_else(|| DbError::new(&format!("table {} not found", pid.get_table_id())))?;

        let table = table_rc.rl();
        debug!("loading page {} from {}", pid, table.get_name());
        table.read_page(pid)
    }

    /// Remove one clean page, chosen at random among the clean ones.
    /// With every cached page dirty there is nothing NO-STEAL may
    /// evict, so the request fails and the caller's transaction is
    /// expected to abort.
    fn evict(buffer: &mut HashMap<HeapPageID, Pod<HeapPage>>) -> DbResult {
        let clean: Vec<HeapPageID> = buffer
            .iter()
            .filter(|(_, page)| page.rl().is_dirty().is_none())
            .map(|(pid, _)| *pid)
            .collect();

        if clean.is_empty() {
            return Err(DbError::new(
                "cannot evict: all cached pages hold uncommitted writes",
            ));
        }

        let victim = clean[rand::thread_rng().gen_range(0, clean.len())];
        debug!("evicting clean page {}", victim);
        buffer.remove(&victim);
        Ok(())
    }

    /// Add a tuple to the specified table on behalf of `tx`. The page
    /// the tuple lands on is marked dirty and re-installed in the
    /// cache so later requests see the update.
    pub fn insert_tuple(
        &self,
        tx: &Transaction,
        table_id: u32,
        tuple: &crate::storage::tuple::Tuple,
    ) -> DbResult {
        let table_rc = Database::catalog()
            .get_table(&table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))?;

        let page_rc = table_rc.rl().insert_tuple(tx, tuple)?;
        self.mark_dirty_and_install(tx, page_rc);
        Ok(())
    }

    /// Remove the tuple (by its record id) from the table that owns
    /// it.
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &crate::storage::tuple::Tuple) -> DbResult {
        let rid = tuple
            .get_rid()
            .ok_or_else(|| DbError::new("cannot delete a tuple that has no record id"))?;

        let table_rc = Database::catalog()
            .get_table(&rid.pid.get_table_id())
            .ok_or_else(|| DbError::new(&format!("table {} not found", rid.pid.get_table_id())))?;

        let page_rc = table_rc.rl().delete_tuple(tx, tuple)?;
        self.mark_dirty_and_install(tx, page_rc);
        Ok(())
    }

    fn mark_dirty_and_install(&self, tx: &Transaction, page_rc: Pod<HeapPage>) {
        let pid = {
            let mut page = page_rc.wl();
            page.mark_dirty(true, tx.get_id());
            page.get_pid()
        };
        self.buffer.insert(pid, page_rc);
    }

    /// Remove the specific page id from the cache. Used on abort so a
    /// rolled back page cannot be served again; the next reader gets
    /// the committed bytes from disk.
    pub fn discard_page(&self, pid: &HeapPageID) {
        self.buffer.remove(pid);
    }

    /// Write one page's bytes out. No-op when the page is not cached
    /// or not dirty. The UPDATE log record is appended and forced
    /// before the page bytes are written.
    pub fn flush_page(&self, pid: &HeapPageID, log_manager: &mut LogManager) -> DbResult {
        let page_rc = match self.buffer.get(pid) {
            Some(page) => page,
            None => return Ok(()),
        };

        let (tid, before_image, after_image) = {
            let page = page_rc.rl();
            match page.is_dirty() {
                Some(tid) => (tid, page.get_before_image(), page.get_page_data()),
                None => return Ok(()),
            }
        };

        debug!(
            "flushing page {}, head {}",
            pid,
            page_rc.rl().short_hex_repr()
        );
        log_manager.log_update(tid, &before_image, &after_image)?;
        log_manager.force()?;

        let table_rc = Database::catalog()
            .get_table(&pid.get_table_id())
            .ok_or_else(|| DbError::new(&format!("table {} not found", pid.get_table_id())))?;
        table_rc.rl().write_page_to_disk(pid, &after_image)?;

        page_rc.wl().mark_dirty(false, tid);
        Ok(())
    }

    /// Flush every dirty page in the cache.
    ///
    /// NB: Be careful using this routine -- it writes dirty data to
    /// disk, which breaks NO-STEAL when the owning transactions are
    /// still running.
    pub fn flush_all_pages(&self, log_manager: &mut LogManager) -> DbResult {
        for pid in self.buffer.keys() {
            self.flush_page(&pid, log_manager)?;
        }
        Ok(())
    }

    /// Finish `tx`. On commit its exclusively locked pages are flushed
    /// (FORCE) and their current bytes become the new before images;
    /// on abort those pages are discarded from the cache. Either way
    /// every lock the transaction holds is released, exclusive locks
    /// first.
    pub fn tx_complete(&self, tx: &Transaction, commit: bool) -> DbResult {
        use crate::transaction::TransactionStatus;

        let mut log_manager = Database::mut_log_manager();
        let write_pages = Database::concurrent_status().locked_write_pages(tx);

        if commit {
            for pid in &write_pages {
                // A flush that fails here must not keep the locks
                // alive; the log holds what recovery needs.
                if let Err(e) = self.flush_page(pid, &mut log_manager) {
                    error!("flush of {} during commit of {} failed: {}", pid, tx, e);
                    continue;
                }

                if let Some(page_rc) = self.buffer.get(pid) {
                    page_rc.wl().set_before_image();
                }
            }

            log_manager.log_commit(tx)?;
        } else {
            for pid in &write_pages {
                self.discard_page(pid);
            }

            log_manager.log_abort(tx)?;
        }
        drop(log_manager);

        Database::concurrent_status().release_all(tx);
        Database::concurrent_status().set_transaction_status(
            tx.get_id(),
            if commit {
                TransactionStatus::Committed
            } else {
                TransactionStatus::Aborted
            },
        );

        Ok(())
    }
}
