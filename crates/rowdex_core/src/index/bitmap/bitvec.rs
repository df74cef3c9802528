//! Growable bit-vector with word-at-a-time boolean operations.

use crate::error::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};
use std::iter;

const WORD_BITS: u64 = 64;

fn words_for(len: u64) -> usize {
    len.div_ceil(WORD_BITS) as usize
}

fn too_large(len: u64) -> IndexError {
    IndexError::resource_exhausted(format!("row position space {len} is not addressable"))
}

fn word_count(len: u64) -> IndexResult<usize> {
    usize::try_from(len.div_ceil(WORD_BITS)).map_err(|_| too_large(len))
}

/// A set of row positions stored as packed 64-bit words.
///
/// `len` is the number of addressable positions; bits at or beyond it are
/// always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitVector {
    words: Vec<u64>,
    len: u64,
}

impl BitVector {
    /// Creates an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a vector of `len` unset positions.
    #[must_use]
    pub fn zeros(len: u64) -> Self {
        Self {
            words: vec![0; words_for(len)],
            len,
        }
    }

    /// Creates a vector of `len` set positions.
    #[must_use]
    pub fn ones(len: u64) -> Self {
        let mut v = Self {
            words: vec![u64::MAX; words_for(len)],
            len,
        };
        v.mask_tail();
        v
    }

    /// Creates a vector with exactly the given positions set.
    pub fn from_positions<I>(positions: I) -> IndexResult<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut v = Self::new();
        for pos in positions {
            v.set(pos)?;
        }
        Ok(v)
    }

    /// Number of addressable positions.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if no position is addressable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw words, least significant bit first.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Reserves words for `len` positions without changing the length.
    ///
    /// Fails with `ResourceExhausted` instead of aborting when the words
    /// cannot be allocated. A later `grow` or `set` within the reserved
    /// range does not allocate.
    pub fn reserve(&mut self, len: u64) -> IndexResult<()> {
        if len <= self.len {
            return Ok(());
        }
        let additional = word_count(len)?.saturating_sub(self.words.len());
        self.words.try_reserve_exact(additional).map_err(|e| {
            IndexError::resource_exhausted(format!("cannot address {len} row positions: {e}"))
        })
    }

    /// Extends the addressable range to at least `len` positions.
    pub fn grow(&mut self, len: u64) -> IndexResult<()> {
        if len <= self.len {
            return Ok(());
        }
        self.reserve(len)?;
        self.words.resize(word_count(len)?, 0);
        self.len = len;
        Ok(())
    }

    /// Returns whether `pos` is set.
    #[must_use]
    pub fn get(&self, pos: u64) -> bool {
        if pos >= self.len {
            return false;
        }
        let word = self.words[(pos / WORD_BITS) as usize];
        word & (1 << (pos % WORD_BITS)) != 0
    }

    /// Sets `pos`, growing the vector if needed.
    pub fn set(&mut self, pos: u64) -> IndexResult<()> {
        self.grow(pos.checked_add(1).ok_or_else(|| too_large(pos))?)?;
        self.words[(pos / WORD_BITS) as usize] |= 1 << (pos % WORD_BITS);
        Ok(())
    }

    /// Sets every position in `start..end` a word at a time, growing the
    /// vector if needed.
    pub fn set_range(&mut self, start: u64, end: u64) -> IndexResult<()> {
        if start >= end {
            return Ok(());
        }
        self.grow(end)?;
        let (first, last) = (start / WORD_BITS, (end - 1) / WORD_BITS);
        for word in first..=last {
            let low = if word == first { start % WORD_BITS } else { 0 };
            let high = if word == last { (end - 1) % WORD_BITS } else { WORD_BITS - 1 };
            let mask = (u64::MAX >> (WORD_BITS - 1 - high)) & (u64::MAX << low);
            self.words[word as usize] |= mask;
        }
        Ok(())
    }

    /// Unsets `pos`. Positions past the end are already unset.
    pub fn unset(&mut self, pos: u64) {
        if pos < self.len {
            self.words[(pos / WORD_BITS) as usize] &= !(1 << (pos % WORD_BITS));
        }
    }

    /// Number of set positions.
    #[must_use]
    pub fn count_ones(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Set positions in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = u64> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let base = i as u64 * WORD_BITS;
            let mut rest = word;
            iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = u64::from(rest.trailing_zeros());
                rest &= rest - 1;
                Some(base + bit)
            })
        })
    }

    /// Positions set in both vectors.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & b)
    }

    /// Positions set in either vector.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a | b)
    }

    /// Positions set in `self` but not in `other`.
    #[must_use]
    pub fn and_not(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & !b)
    }

    /// Complement within the addressable range.
    #[must_use]
    pub fn not(&self) -> Self {
        let mut v = Self {
            words: self.words.iter().map(|w| !w).collect(),
            len: self.len,
        };
        v.mask_tail();
        v
    }

    fn zip_with(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self {
        let len = self.len.max(other.len);
        let words = (0..words_for(len))
            .map(|i| {
                let a = self.words.get(i).copied().unwrap_or(0);
                let b = other.words.get(i).copied().unwrap_or(0);
                op(a, b)
            })
            .collect();
        let mut v = Self { words, len };
        v.mask_tail();
        v
    }

    /// Returns true if the word count matches `len` and no bit is set past it.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let expected = usize::try_from(self.len.div_ceil(WORD_BITS)).ok();
        if expected != Some(self.words.len()) {
            return false;
        }
        let used = self.len % WORD_BITS;
        match self.words.last() {
            Some(&last) if used != 0 => last >> used == 0,
            _ => true,
        }
    }

    fn mask_tail(&mut self) {
        let used = self.len % WORD_BITS;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1 << used) - 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_unset() {
        let mut v = BitVector::new();
        v.set(3).unwrap();
        v.set(70).unwrap();
        assert_eq!(v.len(), 71);
        assert!(v.get(3));
        assert!(v.get(70));
        assert!(!v.get(4));
        assert!(!v.get(1000));

        v.unset(3);
        assert!(!v.get(3));
        assert_eq!(v.count_ones(), 1);
    }

    #[test]
    fn iter_ones_is_ascending() {
        let v = BitVector::from_positions([130, 0, 64, 5]).unwrap();
        assert_eq!(v.iter_ones().collect::<Vec<_>>(), vec![0, 5, 64, 130]);
    }

    #[test]
    fn boolean_ops_align_different_lengths() {
        let a = BitVector::from_positions([1, 2, 100]).unwrap();
        let b = BitVector::from_positions([2, 3]).unwrap();

        assert_eq!(a.and(&b).iter_ones().collect::<Vec<_>>(), vec![2]);
        assert_eq!(a.or(&b).iter_ones().collect::<Vec<_>>(), vec![1, 2, 3, 100]);
        assert_eq!(a.and_not(&b).iter_ones().collect::<Vec<_>>(), vec![1, 100]);
        assert_eq!(a.and(&b).len(), 101);
    }

    #[test]
    fn not_stays_within_length() {
        let v = BitVector::from_positions([0, 2]).unwrap();
        let inverted = v.not();
        assert_eq!(inverted.iter_ones().collect::<Vec<_>>(), vec![1]);
        assert_eq!(BitVector::ones(70).count_ones(), 70);
        assert_eq!(BitVector::zeros(70).not().count_ones(), 70);
    }

    #[test]
    fn set_range_fills_across_words() {
        let mut v = BitVector::new();
        v.set_range(60, 130).unwrap();
        assert_eq!(v.len(), 130);
        assert_eq!(v.count_ones(), 70);
        assert!(!v.get(59));
        assert!(v.get(60));
        assert!(v.get(129));
        assert!(v.is_well_formed());

        v.set_range(5, 5).unwrap();
        assert_eq!(v.count_ones(), 70);
    }

    #[test]
    fn last_position_is_rejected_without_panicking() {
        let err = BitVector::from_positions([u64::MAX]).unwrap_err();
        assert!(matches!(err, IndexError::ResourceExhausted { .. }));

        let mut v = BitVector::new();
        assert!(v.set(u64::MAX).is_err());
        assert!(v.is_empty());
    }

    #[test]
    fn malformed_vectors_are_detected() {
        assert!(BitVector::zeros(70).is_well_formed());
        let short = BitVector {
            words: vec![0],
            len: 70,
        };
        assert!(!short.is_well_formed());
        let stray = BitVector {
            words: vec![1 << 10],
            len: 4,
        };
        assert!(!stray.is_well_formed());
    }
}
