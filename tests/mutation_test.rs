mod common;

use heap_db::{
    operator::{Delete, Filter, Insert, OpIterator, SeqScan, TupleIterator},
    storage::page_cache::PageCache,
    transaction::{Permission, Transaction},
    utils::HandyRwLock,
    Cell, Database, Op, Predicate, Tuple,
};

// Insert reads its whole child, returns the count once, then is
// exhausted.
#[test]
fn test_insert_operator() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("insert_op_test.db", 2);
    let table_id = table_rc.rl().get_id();

    let rows: Vec<Tuple> = (0..37)
        .map(|i| Tuple::new(vec![Cell::Int32(i), Cell::Int32(i * 10)]))
        .collect();
    let source = TupleIterator::new(heap_db::small_int_schema(2, "c"), rows);

    let tx = Transaction::new();
    let mut insert = Insert::new(&tx, table_id, source);

    let result = insert.next().unwrap();
    assert!(result.equal_cells(&[37]));
    assert!(insert.next().is_none(), "second pull must be empty");
    assert!(insert.take_error().is_none());

    tx.commit().unwrap();

    let rows = common::read_all_rows(&table_rc);
    assert_eq!(rows.len(), 37);
    assert!(rows.iter().any(|r| r == &vec![36, 360]));
}

// Delete drains a filtered scan and reports how many rows it removed.
#[test]
fn test_delete_operator() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("delete_op_test.db", 1);
    let table_id = table_rc.rl().get_id();

    let rows: Vec<Tuple> = (0..100).map(|i| Tuple::new(vec![Cell::Int32(i)])).collect();
    let source = TupleIterator::new(heap_db::small_int_schema(1, "c"), rows);

    let tx = Transaction::new();
    let mut insert = Insert::new(&tx, table_id, source);
    assert!(insert.next().unwrap().equal_cells(&[100]));
    tx.commit().unwrap();

    // delete everything below 40
    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, table_id, "t").unwrap();
    let filter = Filter::new(
        Predicate::new(0, Op::LessThan, &Cell::Int32(40)),
        scan,
    );
    let mut delete = Delete::new(&tx, filter);

    let result = delete.next().unwrap();
    assert!(result.equal_cells(&[40]));
    assert!(delete.next().is_none());
    assert!(delete.take_error().is_none());

    tx.commit().unwrap();

    let remaining = common::read_all_rows(&table_rc);
    assert_eq!(remaining.len(), 60);
    assert!(remaining.iter().all(|r| r[0] >= 40));
}

// Inserting then deleting the same tuple leaves the page's occupied
// slots exactly as they were.
#[test]
fn test_insert_then_delete_is_identity() {
    let _db = common::setup();

    let table_rc = common::new_random_heap_table("roundtrip_test.db", 2, 10, 100, None);
    let table = table_rc.rl();

    let tx = Transaction::new();
    let pid = heap_db::storage::page_id::HeapPageID::new(table.get_id(), 0);

    let occupied_before = {
        let page_rc = Database::page_cache()
            .get_page(&tx, Permission::ReadOnly, &pid)
            .unwrap();
        let page = page_rc.rl();
        (0..page.get_slots_count())
            .map(|i| page.is_slot_used(i))
            .collect::<Vec<bool>>()
    };

    let tuple = Tuple::new(vec![Cell::Int32(123), Cell::Int32(456)]);
    let page_rc = table.insert_tuple(&tx, &tuple).unwrap();
    let placed = page_rc
        .rl()
        .iterator()
        .find(|t| t.equal_cells(&[123, 456]))
        .unwrap();

    Database::page_cache().delete_tuple(&tx, &placed).unwrap();

    let occupied_after = {
        let page_rc = Database::page_cache()
            .get_page(&tx, Permission::ReadOnly, &pid)
            .unwrap();
        let page = page_rc.rl();
        (0..page.get_slots_count())
            .map(|i| page.is_slot_used(i))
            .collect::<Vec<bool>>()
    };

    assert_eq!(occupied_before, occupied_after);
    tx.commit().unwrap();
}

// Inserting past one page's capacity grows the table.
#[test]
fn test_insert_spills_to_new_pages() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("spill_test.db", 2);
    let table = table_rc.rl();

    let per_page = PageCache::get_page_size() * 8 / (8 * 8 + 1);
    let rows = per_page + 3;

    let tx = Transaction::new();
    for i in 0..rows {
        let tuple = Tuple::new(vec![Cell::Int32(i as i32), Cell::Int32(0)]);
        table.insert_tuple(&tx, &tuple).unwrap();
    }
    tx.commit().unwrap();

    assert_eq!(table.pages_count(), 2);

    let tx = Transaction::new();
    assert_eq!(table.tuples_count(&tx), rows);
    tx.commit().unwrap();
}
