//! End-to-end scenarios through the index manager.

use rowdex_core::{
    BitOp, BitmapIndex, ColumnType, IndexConfig, IndexDescriptor, IndexError, IndexKind,
    IndexManager, Key, MemoryHeap, Predicate, RowLocator, TokenizerConfig, Value,
};
use std::ops::Bound;
use std::sync::Arc;

#[test]
fn gaming_laptop_intersection() {
    let manager = IndexManager::new(IndexConfig::default());
    let handle = manager
        .create_index(
            IndexDescriptor::new("descriptions", "products", IndexKind::Inverted)
                .column("description", ColumnType::Text),
        )
        .unwrap();

    let docs = [
        (1, "Gaming laptop with RGB keyboard"),
        (2, "Office laptop, lightweight"),
        (3, "Gaming mouse and pad"),
    ];
    for (loc, text) in docs {
        manager
            .insert(handle, &Key::single(text), RowLocator::new(loc))
            .unwrap();
    }

    assert_eq!(
        manager.lookup_all(handle, &["gaming", "laptop"]).unwrap(),
        vec![RowLocator::new(1)]
    );
    assert_eq!(
        manager.lookup_any(handle, &["mouse", "office"]).unwrap(),
        vec![RowLocator::new(2), RowLocator::new(3)]
    );
    assert_eq!(
        manager.lookup_term(handle, "LAPTOP").unwrap(),
        vec![RowLocator::new(1), RowLocator::new(2)]
    );
    assert_eq!(
        manager.lookup_prefix(handle, "light").unwrap(),
        vec![RowLocator::new(2)]
    );

    manager
        .delete(handle, &Key::single(docs[0].1), RowLocator::new(1))
        .unwrap();
    assert!(manager
        .lookup_all(handle, &["gaming", "laptop"])
        .unwrap()
        .is_empty());
}

#[test]
fn unique_violation_leaves_index_unchanged() {
    let manager = IndexManager::new(IndexConfig::default().ordered_fanout(4));
    let handle = manager
        .create_index(
            IndexDescriptor::new("pk", "users", IndexKind::Ordered)
                .column("id", ColumnType::Int)
                .unique(),
        )
        .unwrap();
    for id in 0..40i64 {
        manager
            .insert(handle, &Key::single(id), RowLocator::new(id as u64))
            .unwrap();
    }
    let everything = |m: &IndexManager| m.range(handle, Bound::Unbounded, Bound::Unbounded).unwrap();
    let before = everything(&manager);
    let height = manager.index_stats(handle).unwrap().height;

    let err = manager
        .insert(handle, &Key::single(17i64), RowLocator::new(999))
        .unwrap_err();
    assert!(matches!(err, IndexError::DuplicateKey { .. }));

    assert_eq!(everything(&manager), before);
    assert_eq!(manager.index_stats(handle).unwrap().height, height);
    assert_eq!(
        manager.lookup_equal(handle, &Key::single(17i64)).unwrap(),
        vec![RowLocator::new(17)]
    );
    assert_eq!(manager.stats().rejected_writes(), 1);
    manager.check_integrity(handle).unwrap();
}

#[test]
fn composite_keys_order_lexicographically() {
    let manager = IndexManager::new(IndexConfig::default());
    let handle = manager
        .create_index(
            IndexDescriptor::new("name_age", "people", IndexKind::Ordered)
                .column("last", ColumnType::Text)
                .column("age", ColumnType::Int),
        )
        .unwrap();
    let people = [("lee", 40), ("kim", 31), ("lee", 22), ("park", 19)];
    for (loc, (last, age)) in people.iter().enumerate() {
        let key = Key::new(vec![Value::from(*last), Value::Int(*age)]);
        manager.insert(handle, &key, RowLocator::new(loc as u64)).unwrap();
    }

    let low = Key::new(vec![Value::from("lee"), Value::Int(0)]);
    let high = Key::new(vec![Value::from("lee"), Value::Int(i64::MAX)]);
    assert_eq!(
        manager
            .range(handle, Bound::Included(&low), Bound::Included(&high))
            .unwrap(),
        vec![RowLocator::new(2), RowLocator::new(0)]
    );
}

#[test]
fn clustered_index_keeps_rows_in_key_order() {
    let heap = Arc::new(MemoryHeap::new());
    heap.create_table("orders", ["id", "total"]);
    for (id, total) in [(30, 5), (10, 7), (20, 9)] {
        heap.insert("orders", vec![Value::Int(id), Value::Int(total)])
            .unwrap();
    }
    let manager = IndexManager::with_heap(IndexConfig::default(), heap);
    let handle = manager
        .create_index(
            IndexDescriptor::new("orders_pk", "orders", IndexKind::Ordered)
                .column("id", ColumnType::Int)
                .unique()
                .clustered(),
        )
        .unwrap();

    assert_eq!(
        manager
            .range(handle, Bound::Unbounded, Bound::Unbounded)
            .unwrap(),
        vec![RowLocator::new(1), RowLocator::new(2), RowLocator::new(0)]
    );
    assert!(manager.index_stats(handle).unwrap().clustered);

    manager
        .insert_row(
            handle,
            &Key::single(40i64),
            RowLocator::new(3),
            vec![Value::Int(40), Value::Int(1)],
        )
        .unwrap();
    assert_eq!(
        manager.lookup_equal(handle, &Key::single(40i64)).unwrap(),
        vec![RowLocator::new(3)]
    );
}

#[test]
fn bitmap_queries_through_manager() {
    let manager = IndexManager::new(IndexConfig::default());
    let handle = manager
        .create_index(
            IndexDescriptor::new("by_status", "tickets", IndexKind::Bitmap)
                .column("status", ColumnType::Text),
        )
        .unwrap();
    for (pos, status) in ["open", "closed", "open", "pending", "closed"].iter().enumerate() {
        manager
            .insert(handle, &Key::single(*status), RowLocator::new(pos as u64))
            .unwrap();
    }
    manager
        .delete(handle, &Key::single("open"), RowLocator::new(2))
        .unwrap();

    let open = manager.lookup_bitmap(handle, &Value::from("open")).unwrap();
    let pending = manager.lookup_bitmap(handle, &Value::from("pending")).unwrap();
    let either = manager.lookup_combine(handle, &[open, pending], BitOp::Or).unwrap();
    assert_eq!(
        BitmapIndex::locators(&either),
        vec![RowLocator::new(0), RowLocator::new(3)]
    );

    let not_closed = manager
        .evaluate(
            handle,
            &Predicate::Not(Box::new(Predicate::Eq(Value::from("closed")))),
        )
        .unwrap();
    assert_eq!(
        BitmapIndex::locators(&not_closed),
        vec![RowLocator::new(0), RowLocator::new(3)]
    );

    let err = manager
        .range(handle, Bound::Unbounded, Bound::Unbounded)
        .unwrap_err();
    assert!(matches!(err, IndexError::UnsupportedOperation { .. }));
}

#[test]
fn custom_tokenizer_applies_to_new_indexes() {
    let tokenizer = TokenizerConfig::default()
        .stopwords(["laptop"])
        .min_length(3);
    let manager = IndexManager::new(IndexConfig::default().tokenizer(tokenizer));
    let handle = manager
        .create_index(
            IndexDescriptor::new("t", "docs", IndexKind::Inverted).column("body", ColumnType::Text),
        )
        .unwrap();
    manager
        .insert(handle, &Key::single("a big laptop"), RowLocator::new(0))
        .unwrap();

    assert!(manager.lookup_term(handle, "laptop").unwrap().is_empty());
    assert!(manager.lookup_term(handle, "a").unwrap().is_empty());
    assert_eq!(
        manager.lookup_term(handle, "big").unwrap(),
        vec![RowLocator::new(0)]
    );
}
