//! Benchmark utilities.

use rand::Rng;
use rowdex_core::{Key, MemoryHeap, RowLocator, Value};

/// Generate `count` random integer keys in `0..max`.
pub fn random_int_keys(count: usize, max: i64) -> Vec<Key> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| Key::single(rng.gen_range(0..max)))
        .collect()
}

/// Pair each key with a dense locator.
pub fn with_locators(keys: Vec<Key>) -> Vec<(Key, RowLocator)> {
    keys.into_iter()
        .enumerate()
        .map(|(i, key)| (key, RowLocator::new(i as u64)))
        .collect()
}

/// Generate a document of `words` words drawn from a small vocabulary.
pub fn random_document(words: usize) -> String {
    const VOCABULARY: &[&str] = &[
        "gaming", "laptop", "wireless", "mouse", "keyboard", "monitor", "ultra", "slim", "pro",
        "battery", "charger", "cable", "stand", "desk", "chair", "light", "speaker", "headset",
        "camera", "tablet",
    ];
    let mut rng = rand::thread_rng();
    (0..words)
        .map(|_| VOCABULARY[rng.gen_range(0..VOCABULARY.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a `products(sku, color, title)` heap with `rows` rows.
pub fn products_heap(rows: usize) -> MemoryHeap {
    const COLORS: &[&str] = &["red", "green", "blue", "black", "white"];
    let heap = MemoryHeap::new();
    heap.create_table("products", ["sku", "color", "title"]);
    let mut rng = rand::thread_rng();
    for i in 0..rows {
        let color = COLORS[rng.gen_range(0..COLORS.len())];
        heap.insert(
            "products",
            vec![
                Value::from(i as i64),
                Value::from(color),
                Value::from(random_document(6)),
            ],
        )
        .unwrap_or_else(|_| unreachable!("products table was just created"));
    }
    heap
}
