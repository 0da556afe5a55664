#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use heap_db::{
    storage::page_cache::{PageCache, DEFAULT_PAGES, DEFAULT_PAGE_SIZE},
    transaction::Transaction,
    types::Pod,
    utils::{self, HandyRwLock},
    Cell, Database, HeapTable, Schema, Tuple,
};
use log::debug;
use rand::Rng;

static TEST_DB: Mutex<()> = Mutex::new(());

/// # Conduct the initialization
///
/// - Setting up log configurations.
/// - Reset page size and cache capacity.
/// - Reset the database (cache, catalog, lock table, log).
///
/// The returned guard serializes tests within one binary; the engine
/// state is process-global.
pub fn setup() -> MutexGuard<'static, ()> {
    let guard = TEST_DB.lock().unwrap_or_else(|e| e.into_inner());

    utils::init_log();
    PageCache::set_page_size(DEFAULT_PAGE_SIZE);
    PageCache::set_capacity(DEFAULT_PAGES);
    Database::reset();

    guard
}

/// Create an empty table backed by a fresh file at `path` and register
/// it with the catalog.
pub fn new_empty_heap_table(path: &str, columns: usize) -> Pod<HeapTable> {
    let _ = std::fs::remove_file(path);

    // a rebuilt table reuses its path, and with it its table id; drop
    // anything the cache still holds for that id
    Database::page_cache().clear();

    let schema = heap_db::small_int_schema(columns, "c");
    let table = HeapTable::new(path, &schema).unwrap();
    let table_rc = Arc::new(RwLock::new(table));
    Database::add_table(Arc::clone(&table_rc));
    table_rc
}

pub fn new_heap_table_with_schema(path: &str, schema: &Schema) -> Pod<HeapTable> {
    let _ = std::fs::remove_file(path);
    Database::page_cache().clear();

    let table = HeapTable::new(path, schema).unwrap();
    let table_rc = Arc::new(RwLock::new(table));
    Database::add_table(Arc::clone(&table_rc));
    table_rc
}

/// Create a table with a given number of rows and columns, filled with
/// random data, inserted through the engine and committed.
///
/// # Arguments:
///
/// - cells: This is a reference used to return all inserted data. Only
///   works when it's not None.
pub fn new_random_heap_table(
    path: &str,
    columns: usize,
    rows: usize,
    max_value: i32,
    cells: Option<&mut Vec<Vec<i32>>>,
) -> Pod<HeapTable> {
    let table_rc = new_empty_heap_table(path, columns);

    let mut rng = rand::thread_rng();
    let mut generated: Vec<Vec<i32>> = Vec::new();
    for _ in 0..rows {
        let row: Vec<i32> = (0..columns).map(|_| rng.gen_range(1, max_value)).collect();
        generated.push(row);
    }

    let write_tx = Transaction::new();
    {
        let table = table_rc.rl();
        for row in &generated {
            let tuple = Tuple::new(row.iter().map(|v| Cell::Int32(*v)).collect());
            table.insert_tuple(&write_tx, &tuple).unwrap();
        }
    }
    write_tx.commit().unwrap();

    debug!("table construction finished, insert {} rows in total", rows);

    if let Some(cells) = cells {
        *cells = generated;
    }

    table_rc
}

/// All rows of the table under a fresh committed transaction, as plain
/// ints.
pub fn read_all_rows(table_rc: &Pod<HeapTable>) -> Vec<Vec<i32>> {
    let tx = Transaction::new();
    let table = table_rc.rl();
    let rows = table
        .iter(&tx)
        .map(|t| {
            t.get_cells()
                .iter()
                .map(|c| c.get_int32().unwrap())
                .collect()
        })
        .collect();
    tx.commit().unwrap();
    rows
}
