mod common;

use heap_db::{
    error::ErrorKind,
    storage::page_cache::PageCache,
    storage::page_id::HeapPageID,
    transaction::{Permission, Transaction, TransactionStatus},
    utils::HandyRwLock,
    Cell, Database, Tuple,
};

// Committed rows survive a full engine reset: they are on disk.
#[test]
fn test_commit_is_durable() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("tx_commit_test.db", 2);
    let table_id = table_rc.rl().get_id();

    let tx = Transaction::new();
    for i in 0..50 {
        let tuple = Tuple::new(vec![Cell::Int32(i), Cell::Int32(-i)]);
        table_rc.rl().insert_tuple(&tx, &tuple).unwrap();
    }
    tx.commit().unwrap();

    // drop every in-memory structure, then re-register the table
    Database::reset();
    Database::add_table(table_rc.clone());
    assert_eq!(
        Database::catalog().get_table_name(&table_id).unwrap(),
        "tx_commit_test.db"
    );

    let rows = common::read_all_rows(&table_rc);
    assert_eq!(rows.len(), 50);
    assert!(rows.contains(&vec![49, -49]));
}

// Aborted writes are never observed again: the cache entry is dropped
// and the disk was never touched.
#[test]
fn test_abort_discards_writes() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("tx_abort_test.db", 1);

    let tx = Transaction::new();
    for i in 0..10 {
        let tuple = Tuple::new(vec![Cell::Int32(i)]);
        table_rc.rl().insert_tuple(&tx, &tuple).unwrap();
    }

    // uncommitted writes are visible to the writer itself
    assert_eq!(table_rc.rl().tuples_count(&tx), 10);

    tx.abort().unwrap();
    assert_eq!(
        Database::concurrent_status().get_transaction_status(&tx.get_id()),
        Some(TransactionStatus::Aborted)
    );

    let rows = common::read_all_rows(&table_rc);
    assert!(rows.is_empty());
}

// NO-STEAL: while a transaction is open, the bytes on disk stay the
// committed pre-transaction image; FORCE: commit writes them out.
#[test]
fn test_no_steal_force() {
    let _db = common::setup();

    let table_rc = common::new_random_heap_table("tx_nosteal_test.db", 2, 20, 100, None);
    let path = table_rc.rl().get_path().to_path_buf();

    let before = std::fs::read(&path).unwrap();

    let tx = Transaction::new();
    let victim = table_rc.rl().iter(&tx).next().unwrap();
    Database::page_cache().delete_tuple(&tx, &victim).unwrap();

    // dirty page is cached, not written
    assert_eq!(std::fs::read(&path).unwrap(), before);

    tx.commit().unwrap();

    assert_ne!(std::fs::read(&path).unwrap(), before);
}

// Commit writes UPDATE and COMMIT records for the transaction.
#[test]
fn test_commit_emits_log_records() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("tx_log_test.db", 1);

    let records_before = Database::log_manager().records_count();

    let tx = Transaction::new();
    table_rc
        .rl()
        .insert_tuple(&tx, &Tuple::new(vec![Cell::Int32(7)]))
        .unwrap();
    tx.commit().unwrap();

    // at least START + UPDATE + COMMIT
    let records_after = Database::log_manager().records_count();
    assert!(records_after >= records_before + 3);
}

// With every cached page dirty, NO-STEAL has nothing to evict and the
// page request fails instead of flushing uncommitted data.
#[test]
fn test_eviction_refuses_dirty_pages() {
    let _db = common::setup();

    // four committed pages of two-int rows
    let rows = 3 * 504 + 10;
    let table_rc = common::new_random_heap_table("tx_evict_test.db", 2, rows, 100, None);
    let table = table_rc.rl();
    assert_eq!(table.pages_count(), 4);

    PageCache::set_capacity(3);
    Database::page_cache().clear();

    let tx = Transaction::new();

    // dirty three pages, filling the cache
    for page_index in 0..3 {
        let pid = HeapPageID::new(table.get_id(), page_index);
        let page_rc = Database::page_cache()
            .get_page(&tx, Permission::ReadWrite, &pid)
            .unwrap();
        let victim = page_rc.rl().iterator().next().unwrap();
        Database::page_cache().delete_tuple(&tx, &victim).unwrap();
    }

    let pid = HeapPageID::new(table.get_id(), 3);
    let err = Database::page_cache()
        .get_page(&tx, Permission::ReadWrite, &pid)
        .unwrap_err();
    assert_eq!(err.get_kind(), ErrorKind::Storage);

    tx.abort().unwrap();
    PageCache::set_capacity(heap_db::storage::page_cache::DEFAULT_PAGES);
}

// A transaction sees its own writes through the cache before commit.
#[test]
fn test_reads_own_writes() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("tx_row_test.db", 1);
    let table = table_rc.rl();

    let tx = Transaction::new();
    table
        .insert_tuple(&tx, &Tuple::new(vec![Cell::Int32(5)]))
        .unwrap();

    let seen: Vec<i32> = table
        .iter(&tx)
        .map(|t| t.get_cell(0).get_int32().unwrap())
        .collect();
    assert_eq!(seen, vec![5]);

    tx.commit().unwrap();
}
