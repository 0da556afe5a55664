mod common;

use std::{sync::Barrier, thread, time::Duration};

use heap_db::{
    storage::page_id::HeapPageID,
    transaction::{Lock, Transaction},
    types::Pod,
    utils::HandyRwLock,
    Cell, Database, HeapTable, Tuple,
};
use log::debug;
use rand::Rng;

// Insert a handful of tuples in an own transaction and report them
// back through the channel.
fn inserter(table_rc: &Pod<HeapTable>, s: &crossbeam::channel::Sender<i32>) {
    let mut rng = rand::thread_rng();

    let tx = Transaction::new();
    for _ in 0..5 {
        let value = rng.gen_range(i32::MIN, i32::MAX);
        let tuple = Tuple::new(vec![Cell::Int32(value), Cell::Int32(0)]);
        table_rc.rl().insert_tuple(&tx, &tuple).unwrap();
        s.send(value).unwrap();
    }
    tx.commit().unwrap();
}

// Many writers at once: every insert must land exactly once.
#[test]
fn test_concurrent_inserts() {
    let _db = common::setup();

    let table_rc = common::new_empty_heap_table("concurrent_insert_test.db", 2);

    let (sender, receiver) = crossbeam::channel::unbounded();

    let mut threads = vec![];
    for _ in 0..30 {
        // thread local copies
        let local_table = table_rc.clone();
        let local_sender = sender.clone();

        let handle = thread::spawn(move || inserter(&local_table, &local_sender));
        threads.push(handle);
    }
    for handle in threads {
        handle.join().unwrap();
    }
    drop(sender);

    let mut sent: Vec<i32> = receiver.iter().collect();
    assert_eq!(sent.len(), 150);

    let mut stored: Vec<i32> = common::read_all_rows(&table_rc)
        .iter()
        .map(|row| row[0])
        .collect();

    sent.sort();
    stored.sort();
    assert_eq!(sent, stored);

    // deleting a few of them afterwards keeps the rest intact
    let tx = Transaction::new();
    {
        let table = table_rc.rl();
        for value in sent.iter().take(20) {
            let victim = table
                .iter(&tx)
                .find(|t| t.get_cell(0).get_int32().unwrap() == *value)
                .unwrap();
            Database::page_cache().delete_tuple(&tx, &victim).unwrap();
        }
    }
    tx.commit().unwrap();

    assert_eq!(common::read_all_rows(&table_rc).len(), 130);
}

// A sole shared owner upgrades in place without blocking; everyone
// else then has to wait for the exclusive holder.
#[test]
fn test_lock_upgrade() {
    let _db = common::setup();

    let table_rc = common::new_random_heap_table("lock_upgrade_test.db", 2, 10, 100, None);
    let pid = HeapPageID::new(table_rc.rl().get_id(), 0);

    let t1 = Transaction::new();
    let status = Database::concurrent_status();

    status.acquire_lock(&t1, Lock::SLock, &pid).unwrap();
    assert_eq!(status.locked_read_pages(&t1), vec![pid]);

    // sole owner: the upgrade is granted immediately
    status.acquire_lock(&t1, Lock::XLock, &pid).unwrap();
    assert!(status.holds_lock(&t1, &pid));
    assert_eq!(status.locked_write_pages(&t1), vec![pid]);
    assert!(status.locked_read_pages(&t1).is_empty());

    // a second transaction's shared request now blocks
    let (done_sender, done_receiver) = crossbeam::channel::bounded(1);
    let blocked = thread::spawn(move || {
        let t2 = Transaction::new();
        Database::concurrent_status()
            .acquire_lock(&t2, Lock::SLock, &pid)
            .unwrap();
        done_sender.send(()).unwrap();
        t2.commit().unwrap();
    });

    assert!(
        done_receiver.recv_timeout(Duration::from_millis(200)).is_err(),
        "S request must wait while the page is exclusively held"
    );

    t1.commit().unwrap();

    done_receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("waiter must be granted after the holder commits");
    blocked.join().unwrap();
}

// Two transactions requesting each other's page: exactly one is chosen
// as the deadlock victim, the other finishes once the victim rolls
// back.
#[test]
fn test_deadlock_detection() {
    let _db = common::setup();

    // two committed pages
    let rows = 504 + 10;
    let table_rc = common::new_random_heap_table("deadlock_test.db", 2, rows, 100, None);
    let table_id = table_rc.rl().get_id();
    assert_eq!(table_rc.rl().pages_count(), 2);

    let p1 = HeapPageID::new(table_id, 0);
    let p2 = HeapPageID::new(table_id, 1);

    let barrier = std::sync::Arc::new(Barrier::new(2));
    let (result_sender, result_receiver) = crossbeam::channel::unbounded();

    let mut threads = vec![];
    for (first, second) in [(p1, p2), (p2, p1)].iter() {
        let first = *first;
        let second = *second;
        let barrier = barrier.clone();
        let result_sender = result_sender.clone();

        threads.push(thread::spawn(move || {
            let tx = Transaction::new();
            let status = Database::concurrent_status();

            status.acquire_lock(&tx, Lock::XLock, &first).unwrap();
            barrier.wait();

            match status.acquire_lock(&tx, Lock::XLock, &second) {
                Ok(()) => {
                    debug!("{} acquired both pages", tx);
                    tx.commit().unwrap();
                    result_sender.send(Ok(())).unwrap();
                }
                Err(e) => {
                    assert!(e.is_aborted(), "expected a deadlock abort, got {}", e);
                    tx.abort().unwrap();
                    result_sender.send(Err(e)).unwrap();
                }
            }
        }));
    }

    for handle in threads {
        handle.join().unwrap();
    }
    drop(result_sender);

    let results: Vec<Result<(), heap_db::DbError>> = result_receiver.iter().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results.iter().filter(|r| r.is_err()).count(),
        1,
        "exactly one of the two transactions must be the victim"
    );
}

// Reentrant requests are no-ops: a transaction can take the same page
// in the same or a weaker mode again.
#[test]
fn test_reentrant_locking() {
    let _db = common::setup();

    let table_rc = common::new_random_heap_table("reentrant_test.db", 2, 10, 100, None);
    let pid = HeapPageID::new(table_rc.rl().get_id(), 0);

    let tx = Transaction::new();
    let status = Database::concurrent_status();

    status.acquire_lock(&tx, Lock::XLock, &pid).unwrap();
    status.acquire_lock(&tx, Lock::XLock, &pid).unwrap();
    // weaker request while holding exclusive: still a grant
    status.acquire_lock(&tx, Lock::SLock, &pid).unwrap();

    assert!(status.holds_lock(&tx, &pid));
    tx.commit().unwrap();
    assert!(!status.holds_lock(&tx, &pid));
}

// Single locks can be handed back explicitly.
#[test]
fn test_release_single_lock() {
    let _db = common::setup();

    let table_rc = common::new_random_heap_table("release_test.db", 2, 10, 100, None);
    let pid = HeapPageID::new(table_rc.rl().get_id(), 0);

    let tx = Transaction::new();
    let status = Database::concurrent_status();

    status.acquire_lock(&tx, Lock::SLock, &pid).unwrap();
    assert!(status.holds_lock(&tx, &pid));

    status.release_lock(&tx, &pid);
    assert!(!status.holds_lock(&tx, &pid));

    tx.commit().unwrap();
}
