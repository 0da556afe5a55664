use std::{
    mem,
    path::PathBuf,
    sync::{Arc, Once, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    storage::{catalog::Catalog, heap_table::HeapTable, page_cache::PageCache},
    transaction::{ConcurrentStatus, LogManager},
    types::Pod,
    utils::HandyRwLock,
};

/// We collect all global variables here.
///
/// These variables cannot be initialized as static variables, because
/// their initialization functions all rely on non-const fns (e.g.
/// `HashMap::new()`).
pub struct Database {
    path: PathBuf,

    page_cache: Pod<PageCache>,
    catalog: Pod<Catalog>,
    concurrent_status: ConcurrentStatus,
    log_manager: Pod<LogManager>,
}

static mut SINGLETON: *mut Database = 0 as *mut Database;

impl Database {
    fn new() -> Self {
        let db_path = PathBuf::from("data");
        if !db_path.exists() {
            std::fs::create_dir_all(&db_path).expect("cannot create the data directory");
        }

        let log_path = db_path.join("wal.log");
        let log_manager = LogManager::new(&log_path).expect("cannot open the write-ahead log");

        Self {
            path: db_path,

            page_cache: Arc::new(RwLock::new(PageCache::new())),
            catalog: Arc::new(RwLock::new(Catalog::new())),
            concurrent_status: ConcurrentStatus::new(),
            log_manager: Arc::new(RwLock::new(log_manager)),
        }
    }

    /// Reset the in-memory state of the database, used by tests.
    ///
    /// Actions:
    /// - Page cache is dropped.
    /// - Catalog is dropped.
    /// - Lock table and wait-for graph are dropped.
    /// - The log manager is reopened on a truncated file.
    pub fn reset() {
        // make sure the Once in global() has fired, otherwise a later
        // global() call would install a second instance over this one
        let _ = Self::global();

        let singleton = Self::new();

        unsafe {
            if !SINGLETON.is_null() {
                // Drop the previous db instance if it's already
                // initialized.
                mem::drop(Box::from_raw(SINGLETON));
            }

            // Put it in the heap so it can outlive this call.
            SINGLETON = mem::transmute(Box::new(singleton));
        }

        Database::mut_log_manager()
            .reset()
            .expect("cannot reset the write-ahead log");
    }

    pub fn global() -> &'static Self {
        static ONCE: Once = Once::new();

        ONCE.call_once(|| {
            let singleton = Self::new();

            unsafe {
                // Put it in the heap so it can outlive this call
                SINGLETON = mem::transmute(Box::new(singleton));
            }
        });

        unsafe { SINGLETON.as_ref().unwrap() }
    }

    pub fn page_cache() -> RwLockReadGuard<'static, PageCache> {
        Self::global().page_cache.rl()
    }

    pub fn catalog() -> RwLockReadGuard<'static, Catalog> {
        Self::global().catalog.rl()
    }

    pub fn mut_catalog() -> RwLockWriteGuard<'static, Catalog> {
        Self::global().catalog.wl()
    }

    pub fn concurrent_status() -> &'static ConcurrentStatus {
        &Self::global().concurrent_status
    }

    pub fn log_manager() -> RwLockReadGuard<'static, LogManager> {
        Self::global().log_manager.rl()
    }

    pub fn mut_log_manager() -> RwLockWriteGuard<'static, LogManager> {
        Self::global().log_manager.wl()
    }

    /// Register a table with the catalog.
    pub fn add_table(table_rc: Pod<HeapTable>) {
        Self::mut_catalog().add_table(table_rc);
    }

    pub fn get_path(&self) -> PathBuf {
        self.path.clone()
    }
}
