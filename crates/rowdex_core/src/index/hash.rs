//! Hash index implementation.
//!
//! Explicit chained buckets, each behind its own lock, under a shared lock
//! on the bucket array. Rehashing takes the array lock exclusively.

use crate::descriptor::IndexKind;
use crate::error::{IndexError, IndexResult};
use crate::index::traits::Index;
use crate::key::Key;
use crate::types::RowLocator;
use ahash::RandomState;
use parking_lot::{Mutex, RwLock};
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

type Chain = Vec<(Key, RowLocator)>;

/// Load factor used when the configured one is unusable.
const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Equality-only index over chained buckets.
///
/// The bucket count is a step function of the entry count: whenever an
/// insert would push `entries / buckets` above the load factor, the whole
/// array is rehashed to `buckets * growth_factor` first.
///
/// # Example
///
/// ```
/// use rowdex_core::{HashIndex, Index, Key, RowLocator};
///
/// let index = HashIndex::new("by_email", true, 16, 0.75, 2);
/// index.insert(&Key::single("a@example.com"), RowLocator::new(7)).unwrap();
///
/// let hits = index.lookup_equal(&Key::single("a@example.com")).unwrap();
/// assert_eq!(hits, vec![RowLocator::new(7)]);
/// ```
pub struct HashIndex {
    name: String,
    unique: bool,
    load_factor: f64,
    growth_factor: usize,
    hasher: RandomState,
    buckets: RwLock<Vec<Mutex<Chain>>>,
    /// Stored entries plus in-flight insert reservations.
    len: AtomicUsize,
    rehashes: AtomicU64,
}

impl HashIndex {
    /// Creates an empty hash index.
    pub fn new(
        name: impl Into<String>,
        unique: bool,
        initial_buckets: usize,
        load_factor: f64,
        growth_factor: usize,
    ) -> Self {
        let load_factor = if load_factor.is_finite() && load_factor > 0.0 {
            load_factor
        } else {
            DEFAULT_LOAD_FACTOR
        };
        let buckets = (0..initial_buckets.max(1)).map(|_| Mutex::new(Vec::new())).collect();
        Self {
            name: name.into(),
            unique,
            load_factor,
            growth_factor: growth_factor.max(2),
            // Fixed seeds keep bucket placement stable across runs.
            hasher: RandomState::with_seeds(
                0x243f_6a88_85a3_08d3,
                0x1319_8a2e_0370_7344,
                0xa409_3822_299f_31d0,
                0x082e_fa98_ec4e_6c89,
            ),
            buckets: RwLock::new(buckets),
            len: AtomicUsize::new(0),
            rehashes: AtomicU64::new(0),
        }
    }

    /// Returns true if the index enforces uniqueness.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Current number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Current `entries / buckets` ratio.
    pub fn load_factor(&self) -> f64 {
        let buckets = self.buckets.read();
        self.len.load(Ordering::Acquire) as f64 / buckets.len() as f64
    }

    /// Configured load-factor threshold.
    pub fn max_load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Number of rehashes performed since creation.
    pub fn rehash_count(&self) -> u64 {
        self.rehashes.load(Ordering::Relaxed)
    }

    fn bucket_of(&self, key: &Key, bucket_count: usize) -> usize {
        (self.hasher.hash_one(key) % bucket_count as u64) as usize
    }

    /// Grows the array if it still has `observed` buckets.
    fn grow(&self, observed: usize) -> IndexResult<()> {
        let mut table = self.buckets.write();
        if table.len() != observed {
            // Another writer already rehashed.
            return Ok(());
        }

        let target = observed.saturating_mul(self.growth_factor);
        let mut fresh: Vec<Mutex<Chain>> = Vec::new();
        let new_count = if fresh.try_reserve_exact(target).is_ok() {
            target
        } else {
            let smaller = observed + (observed / 2).max(1);
            warn!(index = %self.name, target, smaller, "rehash allocation failed, retrying smaller");
            fresh.try_reserve_exact(smaller).map_err(|e| {
                IndexError::resource_exhausted(format!(
                    "hash index '{}' cannot grow from {observed} buckets: {e}",
                    self.name
                ))
            })?;
            smaller
        };
        fresh.extend((0..new_count).map(|_| Mutex::new(Vec::new())));

        for chain in table.drain(..) {
            for (key, locator) in chain.into_inner() {
                let slot = self.bucket_of(&key, new_count);
                fresh[slot].get_mut().push((key, locator));
            }
        }
        *table = fresh;
        self.rehashes.fetch_add(1, Ordering::Relaxed);
        debug!(index = %self.name, from = observed, to = new_count, "rehashed");
        Ok(())
    }

    /// Every stored `(key, locator)` pair, in no particular order.
    pub fn entries(&self) -> Vec<(Key, RowLocator)> {
        let table = self.buckets.read();
        let mut out = Vec::new();
        for chain in table.iter() {
            out.extend(chain.lock().iter().cloned());
        }
        out
    }

    /// Replaces the contents with `entries`.
    pub fn rebuild<I>(&self, entries: I) -> IndexResult<()>
    where
        I: IntoIterator<Item = (Key, RowLocator)>,
    {
        self.clear();
        for (key, locator) in entries {
            self.insert(&key, locator)?;
        }
        Ok(())
    }
}

impl Index for HashIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hash
    }

    fn insert(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        loop {
            let observed = {
                let table = self.buckets.read();
                let bucket_count = table.len();
                let reserved = self.len.fetch_add(1, Ordering::AcqRel) + 1;
                if reserved as f64 / bucket_count as f64 <= self.load_factor {
                    let mut chain = table[self.bucket_of(key, bucket_count)].lock();
                    if chain.iter().any(|(k, l)| k == key && *l == locator) {
                        self.len.fetch_sub(1, Ordering::AcqRel);
                        return Ok(());
                    }
                    if self.unique && chain.iter().any(|(k, _)| k == key) {
                        self.len.fetch_sub(1, Ordering::AcqRel);
                        return Err(IndexError::duplicate_key(&self.name, key.to_string()));
                    }
                    chain.push((key.clone(), locator));
                    return Ok(());
                }
                self.len.fetch_sub(1, Ordering::AcqRel);
                bucket_count
            };
            self.grow(observed)?;
        }
    }

    fn delete(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        let table = self.buckets.read();
        let mut chain = table[self.bucket_of(key, table.len())].lock();
        match chain.iter().position(|(k, l)| k == key && *l == locator) {
            Some(pos) => {
                chain.swap_remove(pos);
                self.len.fetch_sub(1, Ordering::AcqRel);
                Ok(())
            }
            None => Err(IndexError::not_found(format!(
                "{key} -> {locator} in index '{}'",
                self.name
            ))),
        }
    }

    fn lookup_equal(&self, key: &Key) -> IndexResult<Vec<RowLocator>> {
        let table = self.buckets.read();
        let chain = table[self.bucket_of(key, table.len())].lock();
        let mut hits: Vec<RowLocator> = chain
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, l)| *l)
            .collect();
        hits.sort_unstable();
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    fn clear(&self) {
        let mut table = self.buckets.write();
        for chain in table.iter_mut() {
            chain.get_mut().clear();
        }
        self.len.store(0, Ordering::Release);
    }

    fn check_integrity(&self) -> IndexResult<()> {
        let table = self.buckets.write();
        let bucket_count = table.len();
        let mut total = 0;
        for (slot, chain) in table.iter().enumerate() {
            let chain = chain.lock();
            for (i, (key, locator)) in chain.iter().enumerate() {
                let expected = self.bucket_of(key, bucket_count);
                if expected != slot {
                    return Err(IndexError::corrupt(
                        &self.name,
                        format!("{key} sits in bucket {slot}, hashes to {expected}"),
                    ));
                }
                let rest = &chain[i + 1..];
                if rest.iter().any(|(k, l)| k == key && l == locator) {
                    return Err(IndexError::corrupt(
                        &self.name,
                        format!("{key} -> {locator} stored twice"),
                    ));
                }
                if self.unique && rest.iter().any(|(k, _)| k == key) {
                    return Err(IndexError::corrupt(
                        &self.name,
                        format!("unique key {key} maps to several rows"),
                    ));
                }
            }
            total += chain.len();
        }
        let recorded = self.len.load(Ordering::Acquire);
        if total != recorded {
            return Err(IndexError::corrupt(
                &self.name,
                format!("buckets hold {total} entries, counter says {recorded}"),
            ));
        }
        if total as f64 / bucket_count as f64 > self.load_factor {
            return Err(IndexError::corrupt(
                &self.name,
                format!("load factor exceeds {} with {bucket_count} buckets", self.load_factor),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Bound;

    fn key(n: i64) -> Key {
        Key::single(n)
    }

    #[test]
    fn lookup_finds_all_locators() {
        let index = HashIndex::new("h", false, 4, 0.75, 2);
        index.insert(&key(1), RowLocator::new(3)).unwrap();
        index.insert(&key(1), RowLocator::new(1)).unwrap();
        index.insert(&key(2), RowLocator::new(2)).unwrap();

        assert_eq!(
            index.lookup_equal(&key(1)).unwrap(),
            vec![RowLocator::new(1), RowLocator::new(3)]
        );
        assert!(index.lookup_equal(&key(9)).unwrap().is_empty());
    }

    #[test]
    fn rehash_keeps_load_factor_bounded() {
        let index = HashIndex::new("h", false, 2, 0.75, 2);
        for n in 0..1000 {
            index.insert(&key(n), RowLocator::new(n as u64)).unwrap();
            assert!(index.load_factor() <= 0.75);
        }
        assert!(index.bucket_count() >= 1334);
        assert!(index.bucket_count().is_power_of_two());
        assert!(index.rehash_count() > 0);
        index.check_integrity().unwrap();
        for n in 0..1000 {
            assert_eq!(
                index.lookup_equal(&key(n)).unwrap(),
                vec![RowLocator::new(n as u64)]
            );
        }
    }

    #[test]
    fn unique_violation_is_rejected() {
        let index = HashIndex::new("h", true, 4, 0.75, 2);
        index.insert(&key(1), RowLocator::new(1)).unwrap();
        let err = index.insert(&key(1), RowLocator::new(2)).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey { .. }));
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup_equal(&key(1)).unwrap(), vec![RowLocator::new(1)]);
    }

    #[test]
    fn reinserting_pair_is_a_no_op() {
        let index = HashIndex::new("h", true, 4, 0.75, 2);
        index.insert(&key(1), RowLocator::new(1)).unwrap();
        index.insert(&key(1), RowLocator::new(1)).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn delete_removes_exact_pair() {
        let index = HashIndex::new("h", false, 4, 0.75, 2);
        index.insert(&key(1), RowLocator::new(1)).unwrap();
        index.insert(&key(1), RowLocator::new(2)).unwrap();
        index.delete(&key(1), RowLocator::new(1)).unwrap();
        assert_eq!(index.lookup_equal(&key(1)).unwrap(), vec![RowLocator::new(2)]);

        let err = index.delete(&key(1), RowLocator::new(1)).unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
    }

    #[test]
    fn range_is_unsupported() {
        let index = HashIndex::new("h", false, 4, 0.75, 2);
        let err = index.range(Bound::Unbounded, Bound::Unbounded).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedOperation { .. }));
    }

    #[test]
    fn unusable_load_factor_falls_back_to_default() {
        let index = HashIndex::new("h", false, 4, f64::NAN, 2);
        assert_eq!(index.max_load_factor(), DEFAULT_LOAD_FACTOR);
    }

    #[test]
    fn clear_keeps_buckets() {
        let index = HashIndex::new("h", false, 2, 0.75, 2);
        for n in 0..10 {
            index.insert(&key(n), RowLocator::new(0)).unwrap();
        }
        let buckets = index.bucket_count();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.bucket_count(), buckets);
        index.check_integrity().unwrap();
    }
}
