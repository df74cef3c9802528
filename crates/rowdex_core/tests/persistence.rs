//! Catalog and snapshot persistence across manager restarts.

use rowdex_core::{
    BitmapIndex, ColumnType, IndexConfig, IndexDescriptor, IndexError, IndexKind, IndexManager,
    Key, MemoryHeap, RowLocator, RowSource, Value,
};
use std::fs;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn products() -> Arc<MemoryHeap> {
    let heap = Arc::new(MemoryHeap::new());
    heap.create_table("products", ["sku", "price", "color", "title"]);
    let rows = [
        ("p-1", 1200, "black", "gaming laptop 15 inch"),
        ("p-2", 300, "white", "office laptop"),
        ("p-3", 80, "black", "gaming mouse"),
        ("p-4", 45, "red", "mouse pad"),
    ];
    for (sku, price, color, title) in rows {
        heap.insert(
            "products",
            vec![
                Value::from(sku),
                Value::Int(price),
                Value::from(color),
                Value::from(title),
            ],
        )
        .unwrap();
    }
    heap
}

fn create_all(manager: &IndexManager) {
    manager
        .create_index(
            IndexDescriptor::new("by_sku", "products", IndexKind::Hash)
                .column("sku", ColumnType::Text)
                .unique(),
        )
        .unwrap();
    manager
        .create_index(
            IndexDescriptor::new("by_price", "products", IndexKind::Ordered)
                .column("price", ColumnType::Int),
        )
        .unwrap();
    manager
        .create_index(
            IndexDescriptor::new("by_color", "products", IndexKind::Bitmap)
                .column("color", ColumnType::Text),
        )
        .unwrap();
    manager
        .create_index(
            IndexDescriptor::new("title_text", "products", IndexKind::Inverted)
                .column("title", ColumnType::Text),
        )
        .unwrap();
}

fn assert_answers(manager: &IndexManager) {
    let sku = manager.handle("by_sku").unwrap();
    assert_eq!(
        manager.lookup_equal(sku, &Key::single("p-3")).unwrap(),
        vec![RowLocator::new(2)]
    );

    let price = manager.handle("by_price").unwrap();
    let low = Key::single(50i64);
    let high = Key::single(500i64);
    assert_eq!(
        manager
            .range(price, Bound::Included(&low), Bound::Excluded(&high))
            .unwrap(),
        vec![RowLocator::new(2), RowLocator::new(1)]
    );

    let color = manager.handle("by_color").unwrap();
    let black = manager.lookup_bitmap(color, &Value::from("black")).unwrap();
    assert_eq!(BitmapIndex::locators(&black), vec![RowLocator::new(0), RowLocator::new(2)]);

    let title = manager.handle("title_text").unwrap();
    assert_eq!(
        manager.lookup_all(title, &["gaming", "laptop"]).unwrap(),
        vec![RowLocator::new(0)]
    );
}

fn open(path: &Path, heap: &Arc<MemoryHeap>) -> IndexManager {
    let heap: Arc<dyn RowSource> = heap.clone();
    IndexManager::open(path, IndexConfig::default(), Some(heap)).unwrap()
}

#[test]
fn indexes_survive_restart() {
    let temp = TempDir::new().unwrap();
    let heap = products();
    {
        let manager = open(temp.path(), &heap);
        create_all(&manager);
        assert_answers(&manager);
        manager.close().unwrap();
    }

    let manager = open(temp.path(), &heap);
    assert_eq!(manager.descriptors().len(), 4);
    assert_answers(&manager);
    assert_eq!(manager.stats().corruptions(), 0);
}

#[test]
fn missing_snapshots_are_rebuilt_from_heap() {
    let temp = TempDir::new().unwrap();
    let heap = products();
    {
        let manager = open(temp.path(), &heap);
        create_all(&manager);
    }
    for entry in fs::read_dir(temp.path().join("snapshots")).unwrap() {
        fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let manager = open(temp.path(), &heap);
    assert_answers(&manager);
}

#[test]
fn damaged_snapshot_is_rebuilt() {
    let temp = TempDir::new().unwrap();
    let heap = products();
    let id = {
        let manager = open(temp.path(), &heap);
        create_all(&manager);
        let id = manager.handle("by_price").unwrap().id();
        manager.close().unwrap();
        id
    };

    let snapshot = temp.path().join("snapshots").join(format!("{}.idx", id.as_u64()));
    let mut bytes = fs::read(&snapshot).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x5a;
    fs::write(&snapshot, bytes).unwrap();

    let manager = open(temp.path(), &heap);
    assert_answers(&manager);
}

#[test]
fn stale_snapshot_is_rebuilt_against_heap() {
    let temp = TempDir::new().unwrap();
    let heap = products();
    {
        let manager = open(temp.path(), &heap);
        create_all(&manager);
        manager.close().unwrap();
    }

    // The heap moves on while the indexes are closed.
    let loc = heap
        .insert(
            "products",
            vec![
                Value::from("p-5"),
                Value::Int(99),
                Value::from("black"),
                Value::from("gaming headset"),
            ],
        )
        .unwrap();
    heap.delete("products", RowLocator::new(3)).unwrap();

    let manager = open(temp.path(), &heap);
    let color = manager.handle("by_color").unwrap();
    let black = manager.lookup_bitmap(color, &Value::from("black")).unwrap();
    assert_eq!(
        BitmapIndex::locators(&black),
        vec![RowLocator::new(0), RowLocator::new(2), loc]
    );
    let title = manager.handle("title_text").unwrap();
    assert!(manager.lookup_term(title, "pad").unwrap().is_empty());
    for handle in ["by_sku", "by_price", "by_color", "title_text"] {
        manager.check_integrity(manager.handle(handle).unwrap()).unwrap();
    }
}

#[test]
fn dropped_index_stays_dropped() {
    let temp = TempDir::new().unwrap();
    let heap = products();
    {
        let manager = open(temp.path(), &heap);
        create_all(&manager);
        manager.drop_index("by_color").unwrap();
    }

    let manager = open(temp.path(), &heap);
    assert!(matches!(
        manager.handle("by_color"),
        Err(IndexError::NotFound { .. })
    ));
    assert_eq!(manager.descriptors().len(), 3);

    // IDs are not reused after a drop.
    let handle = manager
        .create_index(
            IndexDescriptor::new("by_color", "products", IndexKind::Bitmap)
                .column("color", ColumnType::Text),
        )
        .unwrap();
    assert_eq!(handle.id().as_u64(), 5);
}

#[test]
fn open_without_create_fails_on_missing_directory() {
    let temp = TempDir::new().unwrap();
    let config = IndexConfig::default().create_if_missing(false);
    let result = IndexManager::open(&temp.path().join("missing"), config, None);
    assert!(matches!(result, Err(IndexError::InvalidFormat { .. })));
}
