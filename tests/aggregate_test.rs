mod common;

use heap_db::{
    operator::{Aggregate, AggregateOp, Insert, OpIterator, SeqScan, TupleIterator},
    transaction::Transaction,
    utils::HandyRwLock,
    Cell, Tuple,
};

fn build_table(path: &str, rows: &[(i32, i32)]) -> (heap_db::types::Pod<heap_db::HeapTable>, u32) {
    let table_rc = common::new_empty_heap_table(path, 2);
    let table_id = table_rc.rl().get_id();

    let tuples: Vec<Tuple> = rows
        .iter()
        .map(|(g, x)| Tuple::new(vec![Cell::Int32(*g), Cell::Int32(*x)]))
        .collect();
    let source = TupleIterator::new(heap_db::small_int_schema(2, "c"), tuples);

    let tx = Transaction::new();
    let mut insert = Insert::new(&tx, table_id, source);
    insert.next().unwrap();
    tx.commit().unwrap();

    (table_rc, table_id)
}

// SUM over a scan with no grouping produces a single tuple.
#[test]
fn test_sum_over_scan() {
    let _db = common::setup();

    let (_table, table_id) = build_table("agg_sum_test.db", &[(0, 1), (0, 2), (0, 3)]);

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, table_id, "t").unwrap();
    let mut agg = Aggregate::new(scan, 1, None, AggregateOp::Sum).unwrap();

    let result = agg.next().unwrap();
    assert!(result.equal_cells(&[6]));
    assert!(agg.next().is_none());
    assert!(agg.take_error().is_none());

    tx.commit().unwrap();
}

// Grouped AVG computes the integer average per group.
#[test]
fn test_grouped_avg_over_scan() {
    let _db = common::setup();

    let (_table, table_id) =
        build_table("agg_avg_test.db", &[(1, 2), (1, 4), (2, 7)]);

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, table_id, "t").unwrap();
    let mut agg = Aggregate::new(scan, 1, Some(0), AggregateOp::Avg).unwrap();

    let mut results: Vec<(i32, i32)> = Vec::new();
    while let Some(t) = agg.next() {
        results.push((
            t.get_cell(0).get_int32().unwrap(),
            t.get_cell(1).get_int32().unwrap(),
        ));
    }
    results.sort();
    assert_eq!(results, vec![(1, 3), (2, 7)]);

    tx.commit().unwrap();
}

// COUNT counts tuples per group, and the output column carries the
// OP(field) name.
#[test]
fn test_grouped_count_naming() {
    let _db = common::setup();

    let (_table, table_id) =
        build_table("agg_count_test.db", &[(1, 10), (1, 20), (1, 30), (5, 40)]);

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, table_id, "t").unwrap();
    let mut agg = Aggregate::new(scan, 1, Some(0), AggregateOp::Count).unwrap();

    let schema = agg.get_schema();
    assert_eq!(schema.get_field_name(0), "t.c0");
    assert_eq!(schema.get_field_name(1), "COUNT(t.c1)");

    let mut results: Vec<(i32, i32)> = Vec::new();
    while let Some(t) = agg.next() {
        results.push((
            t.get_cell(0).get_int32().unwrap(),
            t.get_cell(1).get_int32().unwrap(),
        ));
    }
    results.sort();
    assert_eq!(results, vec![(1, 3), (5, 1)]);

    tx.commit().unwrap();
}
