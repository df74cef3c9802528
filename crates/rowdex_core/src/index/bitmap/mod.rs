//! Bitmap index for low-cardinality columns.
//!
//! Each distinct value owns a bit-vector over the row-position space, and a
//! shared tombstone vector marks deleted positions. Every position that is
//! not tombstoned has exactly one value bit set.
//!
//! Writers are serialized by the state lock. Readers clone an `Arc` of the
//! current state and evaluate against that snapshot; writers copy a vector
//! before modifying it whenever a snapshot still shares it.

mod bitvec;

pub use bitvec::BitVector;

use crate::descriptor::IndexKind;
use crate::error::{IndexError, IndexResult};
use crate::index::traits::Index;
use crate::key::{Key, Value};
use crate::types::RowLocator;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Boolean operator for [`BitmapIndex::lookup_combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    /// Positions set in every operand.
    And,
    /// Positions set in any operand.
    Or,
    /// Live positions not set in the single operand.
    Not,
}

/// A boolean predicate over a bitmap column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column equals the value.
    Eq(Value),
    /// All sub-predicates hold.
    And(Vec<Predicate>),
    /// Any sub-predicate holds.
    Or(Vec<Predicate>),
    /// The sub-predicate does not hold.
    Not(Box<Predicate>),
}

#[derive(Debug, Clone, Default)]
struct BitmapState {
    vectors: HashMap<Value, Arc<BitVector>>,
    tombstones: Arc<BitVector>,
    row_space: u64,
}

impl BitmapState {
    fn is_live(&self, pos: u64) -> bool {
        pos < self.row_space && !self.tombstones.get(pos)
    }

    fn live(&self) -> BitVector {
        BitVector::ones(self.row_space).and_not(&self.tombstones)
    }

    fn equal(&self, value: &Value) -> BitVector {
        match self.vectors.get(value) {
            Some(bits) => bits.and_not(&self.tombstones),
            None => BitVector::zeros(self.row_space),
        }
    }

    fn evaluate(&self, predicate: &Predicate) -> BitVector {
        match predicate {
            Predicate::Eq(value) => self.equal(value),
            Predicate::And(parts) => parts
                .iter()
                .fold(self.live(), |acc, p| acc.and(&self.evaluate(p))),
            Predicate::Or(parts) => parts
                .iter()
                .fold(BitVector::zeros(self.row_space), |acc, p| acc.or(&self.evaluate(p)))
                .and(&self.live()),
            Predicate::Not(inner) => self.live().and_not(&self.evaluate(inner)),
        }
    }
}

/// Serializable image of a bitmap index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitmapImage {
    /// Number of positions ever addressed.
    pub row_space: u64,
    /// Deleted positions.
    pub tombstones: BitVector,
    /// Value vectors.
    pub vectors: Vec<(Value, BitVector)>,
}

/// Bitmap index over a single column.
///
/// Row positions are the raw values of dense row locators.
///
/// # Example
///
/// ```
/// use rowdex_core::{BitOp, BitmapIndex, Value};
///
/// let index = BitmapIndex::new("by_color", 16);
/// index.insert_value(Value::from("red"), 0).unwrap();
/// index.insert_value(Value::from("blue"), 1).unwrap();
/// index.insert_value(Value::from("red"), 2).unwrap();
///
/// let red = index.lookup_bitmap(&Value::from("red"));
/// let not_red = index.lookup_combine(&[red], BitOp::Not).unwrap();
/// assert_eq!(not_red.iter_ones().collect::<Vec<_>>(), vec![1]);
/// ```
pub struct BitmapIndex {
    name: String,
    ceiling: usize,
    state: RwLock<Arc<BitmapState>>,
}

impl BitmapIndex {
    /// Creates an empty bitmap index accepting at most `ceiling` distinct values.
    pub fn new(name: impl Into<String>, ceiling: usize) -> Self {
        Self {
            name: name.into(),
            ceiling,
            state: RwLock::new(Arc::new(BitmapState::default())),
        }
    }

    fn snapshot(&self) -> Arc<BitmapState> {
        Arc::clone(&self.state.read())
    }

    /// Records `value` at `position`.
    ///
    /// Positions past the current row space extend it; skipped positions are
    /// tombstoned. A tombstoned position is revived with the new value. A
    /// live position is rejected with `DuplicateKey`.
    pub fn insert_value(&self, value: Value, position: u64) -> IndexResult<()> {
        let mut guard = self.state.write();

        if guard.is_live(position) {
            return Err(IndexError::duplicate_key(
                &self.name,
                format!("row position {position}"),
            ));
        }
        if !guard.vectors.contains_key(&value) && guard.vectors.len() >= self.ceiling {
            return Err(IndexError::unsupported_column(format!(
                "bitmap index '{}' exceeds its ceiling of {} distinct values",
                self.name, self.ceiling
            )));
        }

        let end = position.checked_add(1).ok_or_else(|| {
            IndexError::resource_exhausted(format!("row position {position} is not addressable"))
        })?;

        // Reserve everything up front so a failed allocation leaves the
        // index unchanged.
        let state = Arc::make_mut(&mut guard);
        let mut fresh = BitVector::new();
        match state.vectors.get_mut(&value) {
            Some(bits) => Arc::make_mut(bits).reserve(end)?,
            None => fresh.reserve(end)?,
        }
        Arc::make_mut(&mut state.tombstones).reserve(end)?;

        if position >= state.row_space {
            let tombstones = Arc::make_mut(&mut state.tombstones);
            tombstones.set_range(state.row_space, position)?;
            tombstones.grow(end)?;
            state.row_space = end;
        } else {
            // Reviving a deleted position: drop whatever value it held.
            for bits in state.vectors.values_mut() {
                if bits.get(position) {
                    Arc::make_mut(bits).unset(position);
                }
            }
            Arc::make_mut(&mut state.tombstones).unset(position);
        }

        match state.vectors.get_mut(&value) {
            Some(bits) => Arc::make_mut(bits).set(position)?,
            None => {
                fresh.set(position)?;
                state.vectors.insert(value, Arc::new(fresh));
            }
        }
        Ok(())
    }

    /// Tombstones `position`. Value vectors are left untouched.
    pub fn delete_position(&self, position: u64) -> IndexResult<()> {
        let mut guard = self.state.write();
        if !guard.is_live(position) {
            return Err(IndexError::not_found(format!(
                "live row position {position} in bitmap index '{}'",
                self.name
            )));
        }
        let state = Arc::make_mut(&mut guard);
        Arc::make_mut(&mut state.tombstones).set(position)
    }

    /// Extends the row space to `row_space`, tombstoning the new positions.
    ///
    /// Lets a rebuilt index cover heap addresses whose rows were deleted
    /// before the rebuild. Never shrinks the row space.
    pub fn extend_row_space(&self, row_space: u64) -> IndexResult<()> {
        let mut guard = self.state.write();
        if row_space <= guard.row_space {
            return Ok(());
        }
        let state = Arc::make_mut(&mut guard);
        Arc::make_mut(&mut state.tombstones).set_range(state.row_space, row_space)?;
        state.row_space = row_space;
        Ok(())
    }

    /// Live positions holding `value`.
    pub fn lookup_bitmap(&self, value: &Value) -> BitVector {
        self.snapshot().equal(value)
    }

    /// Combines vectors word-at-a-time.
    ///
    /// Every result is masked by the current tombstones, so a vector taken
    /// before a delete never resurrects the deleted row. `And` over no
    /// operands yields every live position, `Or` yields none. `Not` takes
    /// exactly one operand and complements it within the live positions.
    pub fn lookup_combine(&self, vectors: &[BitVector], op: BitOp) -> IndexResult<BitVector> {
        let state = self.snapshot();
        let combined = match op {
            BitOp::And => vectors.iter().fold(state.live(), |acc, v| acc.and(v)),
            BitOp::Or => vectors
                .iter()
                .fold(BitVector::zeros(state.row_space), |acc, v| acc.or(v))
                .and(&state.live()),
            BitOp::Not => match vectors {
                [single] => state.live().and_not(single),
                _ => {
                    return Err(IndexError::unsupported(
                        IndexKind::Bitmap.as_str(),
                        format!("NOT takes exactly one operand, got {}", vectors.len()),
                    ))
                }
            },
        };
        Ok(combined)
    }

    /// Evaluates a nested predicate against one consistent snapshot.
    pub fn evaluate(&self, predicate: &Predicate) -> BitVector {
        self.snapshot().evaluate(predicate)
    }

    /// Converts positions to row locators.
    pub fn locators(bits: &BitVector) -> Vec<RowLocator> {
        bits.iter_ones().map(RowLocator::new).collect()
    }

    /// Number of distinct values seen.
    pub fn distinct_values(&self) -> usize {
        self.state.read().vectors.len()
    }

    /// Number of positions ever addressed, live or tombstoned.
    pub fn row_space(&self) -> u64 {
        self.state.read().row_space
    }

    /// Number of live positions.
    pub fn live_rows(&self) -> u64 {
        let state = self.snapshot();
        state.row_space - state.tombstones.count_ones()
    }

    /// Captures the current state for persistence.
    pub fn image(&self) -> BitmapImage {
        let state = self.snapshot();
        let mut vectors: Vec<_> = state
            .vectors
            .iter()
            .map(|(value, bits)| (value.clone(), BitVector::clone(bits)))
            .collect();
        vectors.sort_by(|a, b| a.0.cmp(&b.0));
        BitmapImage {
            row_space: state.row_space,
            tombstones: BitVector::clone(&state.tombstones),
            vectors,
        }
    }

    /// Replaces the state with a persisted image.
    pub fn restore(&self, image: BitmapImage) -> IndexResult<()> {
        if image.vectors.len() > self.ceiling {
            return Err(IndexError::unsupported_column(format!(
                "bitmap index '{}' image holds {} values, ceiling is {}",
                self.name,
                image.vectors.len(),
                self.ceiling
            )));
        }
        let malformed = |what: String| {
            IndexError::invalid_format(format!("bitmap index '{}' image: {what}", self.name))
        };
        let mut tombstones = image.tombstones;
        if !tombstones.is_well_formed() || tombstones.len() > image.row_space {
            return Err(malformed(format!(
                "tombstones address {} positions, row space is {}",
                tombstones.len(),
                image.row_space
            )));
        }
        for (value, bits) in &image.vectors {
            if !bits.is_well_formed() || bits.len() > image.row_space {
                return Err(malformed(format!(
                    "vector for {value} addresses {} positions, row space is {}",
                    bits.len(),
                    image.row_space
                )));
            }
        }
        tombstones.grow(image.row_space)?;

        let state = BitmapState {
            vectors: image
                .vectors
                .into_iter()
                .map(|(value, bits)| (value, Arc::new(bits)))
                .collect(),
            tombstones: Arc::new(tombstones),
            row_space: image.row_space,
        };
        *self.state.write() = Arc::new(state);
        Ok(())
    }

    fn value_of(&self, key: &Key) -> IndexResult<Value> {
        match key.values() {
            [value] => Ok(value.clone()),
            values => Err(IndexError::invalid_key(format!(
                "bitmap index '{}' takes one value, got {}",
                self.name,
                values.len()
            ))),
        }
    }
}

impl Index for BitmapIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Bitmap
    }

    fn insert(&self, key: &Key, locator: RowLocator) -> IndexResult<()> {
        let value = self.value_of(key)?;
        self.insert_value(value, locator.as_u64())
    }

    /// Deletion is by position alone; the key is not consulted.
    fn delete(&self, _key: &Key, locator: RowLocator) -> IndexResult<()> {
        self.delete_position(locator.as_u64())
    }

    fn lookup_equal(&self, key: &Key) -> IndexResult<Vec<RowLocator>> {
        let value = self.value_of(key)?;
        Ok(Self::locators(&self.lookup_bitmap(&value)))
    }

    fn len(&self) -> usize {
        self.live_rows() as usize
    }

    fn clear(&self) {
        *self.state.write() = Arc::new(BitmapState::default());
    }

    fn check_integrity(&self) -> IndexResult<()> {
        let state = self.snapshot();
        let corrupt = |message: String| IndexError::corrupt(&self.name, message);

        if state.tombstones.len() > state.row_space {
            return Err(corrupt(format!(
                "tombstones address {} positions, row space is {}",
                state.tombstones.len(),
                state.row_space
            )));
        }
        if state.vectors.len() > self.ceiling {
            return Err(corrupt(format!(
                "{} distinct values exceed the ceiling of {}",
                state.vectors.len(),
                self.ceiling
            )));
        }
        for (value, bits) in &state.vectors {
            if bits.len() > state.row_space {
                return Err(corrupt(format!(
                    "vector for {value} addresses {} positions, row space is {}",
                    bits.len(),
                    state.row_space
                )));
            }
        }

        let mut seen = BitVector::zeros(state.row_space);
        for bits in state.vectors.values() {
            let live = bits.and_not(&state.tombstones);
            if let Some(pos) = live.and(&seen).iter_ones().next() {
                return Err(corrupt(format!("live position {pos} holds several values")));
            }
            seen = seen.or(&live);
        }
        if let Some(pos) = state.live().and_not(&seen).iter_ones().next() {
            return Err(corrupt(format!("live position {pos} holds no value")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(s: &str) -> Value {
        Value::from(s)
    }

    fn ones(bits: &BitVector) -> Vec<u64> {
        bits.iter_ones().collect()
    }

    #[test]
    fn lookup_and_combine() {
        let index = BitmapIndex::new("c", 8);
        for (pos, c) in ["red", "blue", "red", "green", "blue"].iter().enumerate() {
            index.insert_value(color(c), pos as u64).unwrap();
        }

        let red = index.lookup_bitmap(&color("red"));
        let blue = index.lookup_bitmap(&color("blue"));
        assert_eq!(ones(&red), vec![0, 2]);

        let either = index.lookup_combine(&[red.clone(), blue.clone()], BitOp::Or).unwrap();
        assert_eq!(ones(&either), vec![0, 1, 2, 4]);
        let both = index.lookup_combine(&[red.clone(), blue], BitOp::And).unwrap();
        assert!(ones(&both).is_empty());
        let not_red = index.lookup_combine(&[red], BitOp::Not).unwrap();
        assert_eq!(ones(&not_red), vec![1, 3, 4]);
    }

    #[test]
    fn not_requires_one_operand() {
        let index = BitmapIndex::new("c", 8);
        let err = index.lookup_combine(&[], BitOp::Not).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedOperation { .. }));
    }

    #[test]
    fn delete_tombstones_position() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();
        index.insert_value(color("red"), 1).unwrap();
        index.delete_position(0).unwrap();

        assert_eq!(ones(&index.lookup_bitmap(&color("red"))), vec![1]);
        assert_eq!(index.live_rows(), 1);
        assert_eq!(index.row_space(), 2);
        let err = index.delete_position(0).unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
        index.check_integrity().unwrap();
    }

    #[test]
    fn gaps_are_tombstoned() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 5).unwrap();
        assert_eq!(index.row_space(), 6);
        assert_eq!(index.live_rows(), 1);
        index.check_integrity().unwrap();

        let not_red = index
            .lookup_combine(&[index.lookup_bitmap(&color("red"))], BitOp::Not)
            .unwrap();
        assert!(ones(&not_red).is_empty());
    }

    #[test]
    fn extend_row_space_tombstones_tail() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();
        index.extend_row_space(4).unwrap();
        assert_eq!(index.row_space(), 4);
        assert_eq!(index.live_rows(), 1);
        index.extend_row_space(2).unwrap();
        assert_eq!(index.row_space(), 4);
        index.check_integrity().unwrap();

        index.insert_value(color("blue"), 3).unwrap();
        assert_eq!(ones(&index.lookup_bitmap(&color("blue"))), vec![3]);
    }

    #[test]
    fn revive_replaces_old_value() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();
        index.delete_position(0).unwrap();
        index.insert_value(color("blue"), 0).unwrap();

        assert!(ones(&index.lookup_bitmap(&color("red"))).is_empty());
        assert_eq!(ones(&index.lookup_bitmap(&color("blue"))), vec![0]);
        index.check_integrity().unwrap();
    }

    #[test]
    fn live_position_is_rejected() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();
        let err = index.insert_value(color("blue"), 0).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey { .. }));
        assert!(ones(&index.lookup_bitmap(&color("blue"))).is_empty());
        assert_eq!(index.distinct_values(), 1);
    }

    #[test]
    fn ceiling_rejects_new_values() {
        let index = BitmapIndex::new("c", 2);
        index.insert_value(color("a"), 0).unwrap();
        index.insert_value(color("b"), 1).unwrap();
        index.insert_value(color("a"), 2).unwrap();
        let err = index.insert_value(color("c"), 3).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedColumnType { .. }));
        assert_eq!(index.row_space(), 3);
    }

    #[test]
    fn snapshots_are_isolated_from_writes() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();
        let before = index.lookup_bitmap(&color("red"));
        let snapshot = index.snapshot();

        index.insert_value(color("red"), 1).unwrap();
        assert_eq!(ones(&before), vec![0]);
        assert_eq!(ones(&snapshot.equal(&color("red"))), vec![0]);
        assert_eq!(ones(&index.lookup_bitmap(&color("red"))), vec![0, 1]);
    }

    #[test]
    fn evaluate_nested_predicate() {
        let index = BitmapIndex::new("c", 8);
        for (pos, c) in ["red", "blue", "green", "red"].iter().enumerate() {
            index.insert_value(color(c), pos as u64).unwrap();
        }
        let predicate = Predicate::And(vec![
            Predicate::Not(Box::new(Predicate::Eq(color("blue")))),
            Predicate::Or(vec![Predicate::Eq(color("red")), Predicate::Eq(color("green"))]),
        ]);
        assert_eq!(ones(&index.evaluate(&predicate)), vec![0, 2, 3]);
    }

    #[test]
    fn image_round_trip() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("x"), 0).unwrap();
        index.insert_value(color("y"), 2).unwrap();
        index.delete_position(0).unwrap();

        let copy = BitmapIndex::new("c", 8);
        copy.restore(index.image()).unwrap();
        assert_eq!(copy.row_space(), 3);
        assert_eq!(copy.live_rows(), 1);
        assert_eq!(ones(&copy.lookup_bitmap(&color("y"))), vec![2]);
        copy.check_integrity().unwrap();
    }

    #[test]
    fn combined_vectors_drop_rows_deleted_since_lookup() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();
        index.insert_value(color("red"), 1).unwrap();
        let red = index.lookup_bitmap(&color("red"));
        index.delete_position(0).unwrap();

        let either = index.lookup_combine(&[red.clone()], BitOp::Or).unwrap();
        assert_eq!(ones(&either), vec![1]);
        let both = index.lookup_combine(&[red], BitOp::And).unwrap();
        assert_eq!(ones(&both), vec![1]);

        let predicate = Predicate::Or(vec![
            Predicate::Eq(color("red")),
            Predicate::Eq(color("blue")),
        ]);
        assert_eq!(ones(&index.evaluate(&predicate)), vec![1]);
    }

    #[test]
    fn unaddressable_position_leaves_index_unchanged() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();

        let err = index.insert_value(color("red"), u64::MAX).unwrap_err();
        assert!(matches!(err, IndexError::ResourceExhausted { .. }));
        let err = index.insert_value(color("blue"), u64::MAX).unwrap_err();
        assert!(matches!(err, IndexError::ResourceExhausted { .. }));

        assert_eq!(index.row_space(), 1);
        assert_eq!(index.distinct_values(), 1);
        assert_eq!(ones(&index.lookup_bitmap(&color("red"))), vec![0]);
        index.check_integrity().unwrap();
    }

    #[test]
    fn restore_rejects_vectors_longer_than_row_space() {
        let index = BitmapIndex::new("c", 8);
        index.insert_value(color("red"), 0).unwrap();

        let image = BitmapImage {
            row_space: 2,
            tombstones: BitVector::zeros(2),
            vectors: vec![(color("red"), BitVector::from_positions([10]).unwrap())],
        };
        let err = index.restore(image).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat { .. }));

        let image = BitmapImage {
            row_space: 2,
            tombstones: BitVector::zeros(64),
            vectors: Vec::new(),
        };
        let err = index.restore(image).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat { .. }));

        assert_eq!(index.row_space(), 1);
        assert_eq!(ones(&index.lookup_bitmap(&color("red"))), vec![0]);
    }

    #[test]
    fn index_trait_uses_locators_as_positions() {
        let index = BitmapIndex::new("c", 8);
        index.insert(&Key::single("red"), RowLocator::new(1)).unwrap();
        assert_eq!(
            index.lookup_equal(&Key::single("red")).unwrap(),
            vec![RowLocator::new(1)]
        );
        let err = index
            .insert(&Key::new(vec![color("a"), color("b")]), RowLocator::new(2))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidKey { .. }));
    }
}
