//! Crate-level integration tests exercising `IndexTree` end to end: primary
//! and non-unique inserts, reopen-and-scan durability, MVCC visibility, and
//! a few cross-cutting invariants (global sortedness, linked-list-backed
//! range scans).

use crate::head_page::IndexType;
use crate::record::LeafRecord;
use crate::tree::IndexTree;
use buffer::{DivisiblePage, Engine};
use common::EngineConfig;
use std::sync::Arc;
use tempfile::tempdir;
use types::{DataType, Value};

fn make_tree(index_type: IndexType, key_type: DataType, non_unique: bool, path: &std::path::Path) -> (Arc<IndexTree>, Arc<Engine>) {
    let engine = Engine::new(&EngineConfig::default());
    let tree = IndexTree::create_index(path, index_type, key_type, non_unique, EngineConfig::default(), engine.clone()).unwrap();
    (tree, engine)
}

#[test]
fn primary_insert_reopen_and_scan_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("primary.idx");
    let (tree, engine) = make_tree(IndexType::Primary, DataType::Int64, false, &path);

    for i in 0..1000i64 {
        tree.insert(Value::Int64(i), None, Value::Int64(i * 10)).unwrap();
    }
    assert_eq!(tree.record_count(), 1000);
    tree.close().unwrap();
    drop(tree);

    let reopened = IndexTree::open_index(&path, DataType::Int64, false, EngineConfig::default(), engine).unwrap();
    assert_eq!(reopened.record_count(), 1000);
    let rs = reopened.current_stamp();
    let scanned = reopened.scan(None, None, rs);
    assert_eq!(scanned.len(), 1000);
    for (i, (k, v)) in scanned.iter().enumerate() {
        assert_eq!(k, &Value::Int64(i as i64));
        assert_eq!(v, &Value::Int64(i as i64 * 10));
    }
}

#[test]
fn non_unique_insert_keeps_runs_ordered_by_pk_suffix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("non_unique.idx");
    let (tree, _engine) = make_tree(IndexType::NonUnique, DataType::Int64, true, &path);

    for key in [1i64, 2, 3] {
        // Inserted out of suffix order; the page must keep them sorted.
        for suffix in [30i64, 10, 20] {
            tree.insert(Value::Int64(key), Some(Value::Int64(suffix)), Value::Int64(key * 1000 + suffix)).unwrap();
        }
    }

    let values = tree.search(&Value::Int64(2));
    assert_eq!(values, vec![Value::Int64(2010), Value::Int64(2020), Value::Int64(2030)]);
}

#[test]
fn duplicate_primary_insert_fails_with_repeated_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dup.idx");
    let (tree, _engine) = make_tree(IndexType::Primary, DataType::Int64, false, &path);

    tree.insert(Value::Int64(5), None, Value::Int64(50)).unwrap();
    let err = tree.insert(Value::Int64(5), None, Value::Int64(99)).unwrap_err();
    assert!(matches!(err, common::DbError::RepeatedRecord));
}

#[test]
fn varchar_key_search_finds_value_regardless_of_insert_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("strings.idx");
    let (tree, _engine) = make_tree(IndexType::Unique, DataType::VarChar(32), false, &path);

    let words = ["banana", "apple", "cherry", "date"];
    for (i, w) in words.iter().enumerate() {
        tree.insert(Value::VarChar((*w).to_string()), None, Value::Int64(i as i64)).unwrap();
    }

    assert_eq!(tree.search(&Value::VarChar("apple".to_string())), vec![Value::Int64(1)]);
    assert_eq!(tree.search(&Value::VarChar("date".to_string())), vec![Value::Int64(3)]);
    assert!(tree.search(&Value::VarChar("fig".to_string())).is_empty());

    let rs = tree.current_stamp();
    let scanned = tree.scan(None, None, rs);
    let keys: Vec<String> = scanned
        .iter()
        .map(|(k, _)| match k {
            Value::VarChar(s) => s.clone(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(keys, vec!["apple", "banana", "cherry", "date"]);
}

#[test]
fn delete_odd_keys_then_scan_returns_only_evens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("delete.idx");
    let (tree, _engine) = make_tree(IndexType::Primary, DataType::Int64, false, &path);

    for i in 0..50i64 {
        tree.insert(Value::Int64(i), None, Value::Int64(i)).unwrap();
    }
    for i in (1..50i64).step_by(2) {
        assert!(tree.delete(&Value::Int64(i), None));
    }

    let rs = tree.current_stamp();
    let scanned = tree.scan(None, None, rs);
    let keys: Vec<i64> = scanned
        .iter()
        .map(|(k, _)| match k {
            Value::Int64(v) => *v,
            _ => unreachable!(),
        })
        .collect();
    let expected: Vec<i64> = (0..50).step_by(2).collect();
    assert_eq!(keys, expected);
}

#[test]
fn mvcc_update_four_times_then_read_at_an_earlier_stamp() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mvcc.idx");
    let (tree, _engine) = make_tree(IndexType::Primary, DataType::Int64, false, &path);

    tree.insert(Value::Int64(1), None, Value::Int64(100)).unwrap(); // stamp 1
    let active = tree.active_stamps();
    for s in 1..=5u64 {
        active.insert(s);
    }

    assert!(tree.update(&Value::Int64(1), None, Value::Int64(200))); // stamp 2
    assert!(tree.update(&Value::Int64(1), None, Value::Int64(300))); // stamp 3
    assert!(tree.update(&Value::Int64(1), None, Value::Int64(400))); // stamp 4
    assert!(tree.update(&Value::Int64(1), None, Value::Int64(500))); // stamp 5

    // Every version is still reachable because the active-stamp floor is 1.
    assert_eq!(tree.search_at(&Value::Int64(1), 1), vec![Value::Int64(100)]);
    assert_eq!(tree.search_at(&Value::Int64(1), 3), vec![Value::Int64(300)]);
    assert_eq!(tree.search(&Value::Int64(1)), vec![Value::Int64(500)]);

    // Raising the floor past stamp 3 lets the next update GC everything
    // below it.
    active.remove(1);
    active.remove(2);
    active.remove(3);
    assert!(tree.update(&Value::Int64(1), None, Value::Int64(600))); // stamp 6
    assert!(tree.search_at(&Value::Int64(1), 2).is_empty());
}

#[test]
fn scan_is_globally_sorted_after_shuffled_inserts() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shuffled.idx");
    let (tree, _engine) = make_tree(IndexType::Primary, DataType::Int64, false, &path);

    // `131` is coprime with `300`, so `(i * 131) % 300` visits every key
    // in 0..300 exactly once, in a shuffled order.
    for i in 0..300i64 {
        let key = (i * 131) % 300;
        tree.insert(Value::Int64(key), None, Value::Int64(key)).unwrap();
    }

    let rs = tree.current_stamp();
    let scanned = tree.scan(None, None, rs);
    let keys: Vec<i64> = scanned
        .iter()
        .map(|(k, _)| match k {
            Value::Int64(v) => *v,
            _ => unreachable!(),
        })
        .collect();
    let mut expected = keys.clone();
    expected.sort_unstable();
    assert_eq!(keys, expected);
    assert_eq!(keys.len(), 300);
}

#[test]
fn bounded_scan_respects_inclusive_range() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bounded.idx");
    let (tree, _engine) = make_tree(IndexType::Primary, DataType::Int64, false, &path);

    for i in 0..40i64 {
        tree.insert(Value::Int64(i), None, Value::Int64(i)).unwrap();
    }

    let rs = tree.current_stamp();
    let scanned = tree.scan(Some(&Value::Int64(10)), Some(&Value::Int64(15)), rs);
    let keys: Vec<i64> = scanned
        .iter()
        .map(|(k, _)| match k {
            Value::Int64(v) => *v,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(keys, vec![10, 11, 12, 13, 14, 15]);
}

#[test]
fn create_index_fails_if_file_already_exists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exists.idx");
    let engine = Engine::new(&EngineConfig::default());
    let _tree = IndexTree::create_index(&path, IndexType::Primary, DataType::Int64, false, EngineConfig::default(), engine.clone()).unwrap();
    let err = IndexTree::create_index(&path, IndexType::Primary, DataType::Int64, false, EngineConfig::default(), engine).unwrap_err();
    assert!(matches!(err, common::DbError::FileOpenFailed));
}

/// `PageDividePool` calling `LeafPage::page_divide` must perform a real
/// split through `IndexTree`, not the no-op it used to be. This bypasses
/// `insert`'s own synchronous split check by writing records straight onto
/// the root leaf, so the only thing that can split the page is the divide
/// pool driving `page_divide` itself.
#[test]
fn divide_pool_drives_a_real_split_via_page_divide() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("divide.idx");
    let config = EngineConfig::default();
    let engine = Engine::new(&config);
    let tree = IndexTree::create_index(&path, IndexType::Primary, DataType::Int64, false, config, engine.clone()).unwrap();

    let root_id = tree.root_page_id();
    let leaf = tree.get_leaf(root_id).unwrap();
    let mut next_key = 0i64;
    while leaf.total_data_length() <= leaf.max_data_length() {
        leaf.insert_record(LeafRecord::new(Value::Int64(next_key), None, 1, Value::Int64(next_key))).unwrap();
        next_key += 1;
    }
    let before = leaf.record_count();
    assert!(leaf.next_page_id().is_null(), "page must not already be split");

    let divisible: Arc<dyn DivisiblePage> = leaf.clone();
    engine.divide_pool.process_one(divisible);

    assert!(leaf.record_count() < before, "page_divide must move roughly half the records to a new sibling");
    assert!(!leaf.next_page_id().is_null(), "split must link the new right sibling");
    assert_eq!(engine.divide_pool.max_stuck_count(), 0, "a successful divide must not count as a stuck requeue");
}

/// A value over `max_inline_value` must round-trip through an overflow page
/// run (spec.md §4.3 step 3), both within the live tree and after a
/// close/reopen cycle that reloads pages from disk.
#[test]
fn oversized_value_spills_to_overflow_and_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overflow.idx");
    let config = EngineConfig::builder().max_inline_value(64).build();
    let engine = Engine::new(&config);
    let tree = IndexTree::create_index(&path, IndexType::Primary, DataType::Int64, false, config.clone(), engine.clone()).unwrap();

    let big_value = Value::VarChar("x".repeat(5_000));
    tree.insert(Value::Int64(1), None, big_value.clone()).unwrap();
    tree.insert(Value::Int64(2), None, Value::VarChar("small".to_string())).unwrap();

    assert_eq!(tree.search(&Value::Int64(1)), vec![big_value.clone()]);
    assert_eq!(tree.search(&Value::Int64(2)), vec![Value::VarChar("small".to_string())]);

    tree.close().unwrap();
    drop(tree);

    let reopened = IndexTree::open_index(&path, DataType::Int64, false, config, engine).unwrap();
    assert_eq!(reopened.search(&Value::Int64(1)), vec![big_value]);
    assert_eq!(reopened.search(&Value::Int64(2)), vec![Value::VarChar("small".to_string())]);

    let rs = reopened.current_stamp();
    let scanned = reopened.scan(None, None, rs);
    assert_eq!(scanned.len(), 2);
}
