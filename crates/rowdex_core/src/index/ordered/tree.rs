//! Concurrent B+ tree.
//!
//! Readers descend with latch coupling: a child's latch is taken before the
//! parent's is released. Writers take exclusive latches top-down and drop
//! every held ancestor once the current node is safe, meaning the pending
//! insert or delete cannot split or merge it. Sibling latches are taken left
//! to right and leaf-chain scans move left to right, so latch waits never
//! form a cycle.

use super::node::{Arena, InternalNode, LeafNode, Node, NodeId, NodeLatch};
use crate::error::{IndexError, IndexResult};
use crate::key::Key;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

type ReadLatch<V> = ArcRwLockReadGuard<RawRwLock, Node<V>>;
type WriteLatch<V> = ArcRwLockWriteGuard<RawRwLock, Node<V>>;

/// An exclusively latched node on a writer's descent path.
struct Frame<V> {
    id: NodeId,
    latch: WriteLatch<V>,
    /// Position of this node in its parent's child list.
    slot: usize,
}

#[derive(Clone, Copy)]
enum Descent<'a> {
    Key(&'a Key),
    Leftmost,
    Rightmost,
}

/// Shape summary produced by a full integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    /// Number of levels, counting the leaf level.
    pub height: usize,
    /// Total number of nodes.
    pub nodes: usize,
    /// Number of leaf nodes.
    pub leaves: usize,
    /// Number of `(key, payload)` pairs.
    pub entries: usize,
}

#[derive(Default)]
struct CheckState {
    leaf_depth: Option<usize>,
    leaves: Vec<(NodeId, Option<NodeId>)>,
    nodes: usize,
    entries: usize,
}

/// B+ tree mapping keys to sets of payloads.
pub(crate) struct BTree<V> {
    name: String,
    unique: bool,
    max_keys: usize,
    min_keys: usize,
    arena: Arena<V>,
    /// Root pointer latch. Writers hold it exclusively until the root is safe.
    root: RwLock<NodeId>,
    /// Shared by every operation, exclusive for whole-tree maintenance.
    tree: RwLock<()>,
    len: AtomicUsize,
}

impl<V> BTree<V>
where
    V: Clone + Ord + Send + Sync,
{
    /// Creates an empty tree whose nodes hold at most `fanout` keys.
    pub fn new(name: impl Into<String>, unique: bool, fanout: usize) -> Self {
        let max_keys = fanout.max(3);
        let (arena, root) = Arena::with_root(Node::Leaf(LeafNode::empty()));
        Self {
            name: name.into(),
            unique,
            max_keys,
            min_keys: max_keys / 2,
            arena,
            root: RwLock::new(root),
            tree: RwLock::new(()),
            len: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Number of `(key, payload)` pairs.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    fn corrupt(&self, message: impl Into<String>) -> IndexError {
        IndexError::corrupt(&self.name, message)
    }

    fn node(&self, id: NodeId) -> IndexResult<NodeLatch<V>> {
        self.arena
            .get(id)
            .ok_or_else(|| self.corrupt(format!("dangling reference to node {id:?}")))
    }

    // ------------------------------------------------------------------
    // Writers
    // ------------------------------------------------------------------

    /// Inserts `value` under `key`.
    ///
    /// Returns `false` if the exact pair was already present. A unique tree
    /// rejects a second payload for an existing key with `DuplicateKey` and
    /// is left unchanged.
    pub fn insert(&self, key: Key, value: V) -> IndexResult<bool> {
        let _shared = self.tree.read();
        let root_guard = self.root.write();
        let mut id = *root_guard;
        let mut root_guard = Some(root_guard);
        let mut path: Vec<Frame<V>> = Vec::new();
        let mut slot = 0;

        loop {
            let latch = self.node(id)?.write_arc();
            if latch.key_count() < self.max_keys {
                path.clear();
                root_guard = None;
            }
            let child = match &*latch {
                Node::Leaf(_) => None,
                Node::Internal(node) => {
                    let s = node.child_slot(&key);
                    let child = node
                        .child_at(s)
                        .ok_or_else(|| self.corrupt("internal node is missing a child"))?;
                    Some((child, s))
                }
            };
            path.push(Frame { id, latch, slot });
            match child {
                Some((child, s)) => {
                    id = child;
                    slot = s;
                }
                None => break,
            }
        }

        let leaf_level = path.len() - 1;
        let splits_needed = path.len() + 1;
        let mut pending = {
            let leaf = path[leaf_level]
                .latch
                .as_leaf_mut()
                .ok_or_else(|| self.corrupt("descent ended on an internal node"))?;
            match leaf.keys.binary_search(&key) {
                Ok(pos) => {
                    let payloads = &mut leaf.values[pos];
                    if payloads.contains(&value) {
                        return Ok(false);
                    }
                    if self.unique && !payloads.is_empty() {
                        return Err(IndexError::duplicate_key(&self.name, key.to_string()));
                    }
                    payloads.insert(value);
                    self.len.fetch_add(1, Ordering::AcqRel);
                    return Ok(true);
                }
                Err(pos) => {
                    if leaf.keys.len() >= self.max_keys {
                        // Every node on the path may split, plus a new root.
                        self.arena.reserve(splits_needed)?;
                    }
                    leaf.keys.insert(pos, key);
                    leaf.values.insert(pos, BTreeSet::from([value]));
                }
            }
            if leaf.keys.len() > self.max_keys {
                let (separator, right) = leaf.split();
                let right_id = self.arena.alloc(Node::Leaf(right))?;
                leaf.next = Some(right_id);
                Some((separator, right_id))
            } else {
                None
            }
        };
        self.len.fetch_add(1, Ordering::AcqRel);

        let mut level = leaf_level;
        while let Some((separator, right_id)) = pending.take() {
            if level == 0 {
                let root = root_guard
                    .as_mut()
                    .ok_or_else(|| self.corrupt("split reached a node above the latched path"))?;
                let old_root = **root;
                **root = self.arena.alloc(Node::Internal(InternalNode {
                    keys: vec![separator],
                    children: vec![old_root, right_id],
                }))?;
                break;
            }

            let child_slot = path[level].slot;
            level -= 1;
            let parent = path[level]
                .latch
                .as_internal_mut()
                .ok_or_else(|| self.corrupt("leaf node found above another node"))?;
            parent.keys.insert(child_slot, separator);
            parent.children.insert(child_slot + 1, right_id);
            if parent.keys.len() > self.max_keys {
                let (promoted, right) = parent.split();
                let right_id = self.arena.alloc(Node::Internal(right))?;
                pending = Some((promoted, right_id));
            }
        }
        Ok(true)
    }

    /// Removes `value` from under `key`.
    ///
    /// Returns `false` if the pair was not present.
    pub fn delete(&self, key: &Key, value: &V) -> IndexResult<bool> {
        let _shared = self.tree.read();
        let root_guard = self.root.write();
        let root_id = *root_guard;
        let mut root_guard = Some(root_guard);
        let mut path: Vec<Frame<V>> = Vec::new();
        let (mut id, mut slot) = (root_id, 0);

        loop {
            let latch = self.node(id)?.write_arc();
            let safe = match &*latch {
                Node::Leaf(leaf) => id == root_id || leaf.keys.len() > self.min_keys,
                Node::Internal(node) if id == root_id => node.keys.len() > 1,
                Node::Internal(node) => node.keys.len() > self.min_keys,
            };
            if safe {
                path.clear();
                root_guard = None;
            }
            let child = match &*latch {
                Node::Leaf(_) => None,
                Node::Internal(node) => {
                    let s = node.child_slot(key);
                    let child = node
                        .child_at(s)
                        .ok_or_else(|| self.corrupt("internal node is missing a child"))?;
                    Some((child, s))
                }
            };
            path.push(Frame { id, latch, slot });
            match child {
                Some((child, s)) => {
                    id = child;
                    slot = s;
                }
                None => break,
            }
        }

        {
            let leaf = path
                .last_mut()
                .and_then(|frame| frame.latch.as_leaf_mut())
                .ok_or_else(|| self.corrupt("descent ended on an internal node"))?;
            let Ok(pos) = leaf.keys.binary_search(key) else {
                return Ok(false);
            };
            if !leaf.values[pos].remove(value) {
                return Ok(false);
            }
            if leaf.values[pos].is_empty() {
                leaf.keys.remove(pos);
                leaf.values.remove(pos);
            }
        }
        self.len.fetch_sub(1, Ordering::AcqRel);

        loop {
            if path.len() == 1 {
                self.collapse_root(&mut path, root_guard.as_mut())?;
                return Ok(true);
            }
            let underflow = path
                .last()
                .map_or(false, |frame| frame.latch.key_count() < self.min_keys);
            if !underflow {
                return Ok(true);
            }
            self.fix_underflow(&mut path)?;
        }
    }

    /// Replaces an internal root left with no keys by its only child.
    fn collapse_root(
        &self,
        path: &mut Vec<Frame<V>>,
        root_guard: Option<&mut parking_lot::RwLockWriteGuard<'_, NodeId>>,
    ) -> IndexResult<()> {
        let Some(root) = root_guard else {
            return Ok(());
        };
        let Some(frame) = path.first() else {
            return Ok(());
        };
        if frame.id != **root {
            return Ok(());
        }
        if let Node::Internal(node) = &*frame.latch {
            if node.keys.is_empty() {
                let only_child = node
                    .child_at(0)
                    .ok_or_else(|| self.corrupt("empty root has no child"))?;
                let old_root = frame.id;
                **root = only_child;
                path.clear();
                self.arena.release(old_root);
            }
        }
        Ok(())
    }

    /// Repairs the underflowing node at the end of `path` by borrowing from
    /// or merging with a sibling, then pops it. The parent may underflow in
    /// turn.
    fn fix_underflow(&self, path: &mut Vec<Frame<V>>) -> IndexResult<()> {
        let Some(Frame {
            id: child_id,
            latch: child_latch,
            slot,
        }) = path.pop()
        else {
            return Err(self.corrupt("underflow repair on an empty path"));
        };
        let parent = path
            .last_mut()
            .and_then(|frame| frame.latch.as_internal_mut())
            .ok_or_else(|| self.corrupt("underflowing node has no internal parent"))?;

        if slot > 0 {
            let left_id = parent
                .child_at(slot - 1)
                .ok_or_else(|| self.corrupt("left sibling missing"))?;
            // Re-latch left to right.
            drop(child_latch);
            let mut left = self.node(left_id)?.write_arc();
            let mut child = self.node(child_id)?.write_arc();
            if left.key_count() > self.min_keys {
                self.borrow_from_left(parent, slot, &mut left, &mut child)?;
            } else {
                self.merge(parent, slot - 1, &mut left, &mut child)?;
                drop(child);
                self.arena.release(child_id);
            }
        } else {
            let right_id = parent
                .child_at(1)
                .ok_or_else(|| self.corrupt("internal node has a single child"))?;
            let mut child = child_latch;
            let mut right = self.node(right_id)?.write_arc();
            if right.key_count() > self.min_keys {
                self.borrow_from_right(parent, 0, &mut child, &mut right)?;
            } else {
                self.merge(parent, 0, &mut child, &mut right)?;
                drop(right);
                self.arena.release(right_id);
            }
        }
        Ok(())
    }

    fn borrow_from_left(
        &self,
        parent: &mut InternalNode,
        slot: usize,
        left: &mut Node<V>,
        child: &mut Node<V>,
    ) -> IndexResult<()> {
        match (left, child) {
            (Node::Leaf(left), Node::Leaf(child)) => {
                let (Some(key), Some(values)) = (left.keys.pop(), left.values.pop()) else {
                    return Err(self.corrupt("borrowing from an empty leaf"));
                };
                parent.keys[slot - 1] = key.clone();
                child.keys.insert(0, key);
                child.values.insert(0, values);
            }
            (Node::Internal(left), Node::Internal(child)) => {
                let (Some(key), Some(grandchild)) = (left.keys.pop(), left.children.pop()) else {
                    return Err(self.corrupt("borrowing from an empty internal node"));
                };
                let separator = std::mem::replace(&mut parent.keys[slot - 1], key);
                child.keys.insert(0, separator);
                child.children.insert(0, grandchild);
            }
            _ => return Err(self.corrupt("siblings on different levels")),
        }
        Ok(())
    }

    fn borrow_from_right(
        &self,
        parent: &mut InternalNode,
        slot: usize,
        child: &mut Node<V>,
        right: &mut Node<V>,
    ) -> IndexResult<()> {
        match (child, right) {
            (Node::Leaf(child), Node::Leaf(right)) => {
                if right.keys.len() < 2 {
                    return Err(self.corrupt("borrowing would empty the right leaf"));
                }
                child.keys.push(right.keys.remove(0));
                child.values.push(right.values.remove(0));
                parent.keys[slot] = right.keys[0].clone();
            }
            (Node::Internal(child), Node::Internal(right)) => {
                if right.keys.is_empty() {
                    return Err(self.corrupt("borrowing from an empty internal node"));
                }
                let key = right.keys.remove(0);
                let grandchild = right.children.remove(0);
                let separator = std::mem::replace(&mut parent.keys[slot], key);
                child.keys.push(separator);
                child.children.push(grandchild);
            }
            _ => return Err(self.corrupt("siblings on different levels")),
        }
        Ok(())
    }

    /// Folds `right` into `left` and removes the separator at `separator`.
    fn merge(
        &self,
        parent: &mut InternalNode,
        separator: usize,
        left: &mut Node<V>,
        right: &mut Node<V>,
    ) -> IndexResult<()> {
        match (left, right) {
            (Node::Leaf(left), Node::Leaf(right)) => {
                left.keys.append(&mut right.keys);
                left.values.append(&mut right.values);
                left.next = right.next;
                parent.keys.remove(separator);
            }
            (Node::Internal(left), Node::Internal(right)) => {
                left.keys.push(parent.keys.remove(separator));
                left.keys.append(&mut right.keys);
                left.children.append(&mut right.children);
            }
            _ => return Err(self.corrupt("siblings on different levels")),
        }
        parent.children.remove(separator + 1);
        Ok(())
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let _exclusive = self.tree.write();
        let root = self.arena.reset(Node::Leaf(LeafNode::empty()));
        *self.root.write() = root;
        self.len.store(0, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------

    fn descend(&self, target: Descent<'_>) -> IndexResult<ReadLatch<V>> {
        let root = self.root.read();
        let mut latch = self.node(*root)?.read_arc();
        drop(root);
        loop {
            let child = match &*latch {
                Node::Leaf(_) => None,
                Node::Internal(node) => {
                    let slot = match target {
                        Descent::Key(key) => node.child_slot(key),
                        Descent::Leftmost => 0,
                        Descent::Rightmost => node.keys.len(),
                    };
                    Some(
                        node.child_at(slot)
                            .ok_or_else(|| self.corrupt("internal node is missing a child"))?,
                    )
                }
            };
            match child {
                None => return Ok(latch),
                // The child is latched before the parent guard is replaced.
                Some(child) => latch = self.node(child)?.read_arc(),
            }
        }
    }

    /// Payloads stored under `key`, in payload order.
    pub fn get(&self, key: &Key) -> IndexResult<Vec<V>> {
        let _shared = self.tree.read();
        let latch = self.descend(Descent::Key(key))?;
        let leaf = latch
            .as_leaf()
            .ok_or_else(|| self.corrupt("descent ended on an internal node"))?;
        Ok(match leaf.keys.binary_search(key) {
            Ok(pos) => leaf.values[pos].iter().cloned().collect(),
            Err(_) => Vec::new(),
        })
    }

    /// Visits entries with keys inside the bounds, in key order.
    ///
    /// The visitor returns `false` to stop early.
    pub fn scan<F>(&self, low: Bound<&Key>, high: Bound<&Key>, mut visit: F) -> IndexResult<()>
    where
        F: FnMut(&Key, &BTreeSet<V>) -> bool,
    {
        let _shared = self.tree.read();
        let target = match low {
            Bound::Included(key) | Bound::Excluded(key) => Descent::Key(key),
            Bound::Unbounded => Descent::Leftmost,
        };
        let mut latch = self.descend(target)?;
        let mut first = true;
        loop {
            let next = {
                let leaf = latch
                    .as_leaf()
                    .ok_or_else(|| self.corrupt("leaf chain reached an internal node"))?;
                let start = if first {
                    match low {
                        Bound::Included(k) => leaf.keys.partition_point(|key| key < k),
                        Bound::Excluded(k) => leaf.keys.partition_point(|key| key <= k),
                        Bound::Unbounded => 0,
                    }
                } else {
                    0
                };
                first = false;
                for (key, values) in leaf.keys[start..].iter().zip(&leaf.values[start..]) {
                    let below_high = match high {
                        Bound::Included(h) => key <= h,
                        Bound::Excluded(h) => key < h,
                        Bound::Unbounded => true,
                    };
                    if !below_high || !visit(key, values) {
                        return Ok(());
                    }
                }
                leaf.next
            };
            match next {
                Some(id) => latch = self.node(id)?.read_arc(),
                None => return Ok(()),
            }
        }
    }

    /// Smallest key, if any.
    pub fn min_key(&self) -> IndexResult<Option<Key>> {
        let _shared = self.tree.read();
        let latch = self.descend(Descent::Leftmost)?;
        Ok(latch.as_leaf().and_then(|leaf| leaf.keys.first().cloned()))
    }

    /// Largest key, if any.
    pub fn max_key(&self) -> IndexResult<Option<Key>> {
        let _shared = self.tree.read();
        let latch = self.descend(Descent::Rightmost)?;
        Ok(latch.as_leaf().and_then(|leaf| leaf.keys.last().cloned()))
    }

    /// Number of levels from the root to the leaves.
    pub fn height(&self) -> IndexResult<usize> {
        let _shared = self.tree.read();
        let root = self.root.read();
        let mut latch = self.node(*root)?.read_arc();
        drop(root);
        let mut height = 1;
        loop {
            let child = match &*latch {
                Node::Leaf(_) => return Ok(height),
                Node::Internal(node) => node
                    .child_at(0)
                    .ok_or_else(|| self.corrupt("internal node is missing a child"))?,
            };
            latch = self.node(child)?.read_arc();
            height += 1;
        }
    }

    /// Number of allocated nodes.
    pub fn node_count(&self) -> usize {
        self.arena.live()
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Walks the whole tree and checks every structural invariant.
    ///
    /// Blocks all other operations for the duration of the walk.
    pub fn check_integrity(&self) -> IndexResult<TreeShape> {
        let _exclusive = self.tree.write();
        let root = *self.root.read();
        let mut state = CheckState::default();
        self.check_node(root, 0, None, None, true, &mut state)?;

        for pair in state.leaves.windows(2) {
            let ((id, next), (following, _)) = (pair[0], pair[1]);
            if next != Some(following) {
                return Err(self.corrupt(format!(
                    "leaf {id:?} links to {next:?}, expected {following:?}"
                )));
            }
        }
        if let Some((id, Some(next))) = state.leaves.last() {
            return Err(self.corrupt(format!("last leaf {id:?} links to {next:?}")));
        }

        let recorded = self.len.load(Ordering::Acquire);
        if state.entries != recorded {
            return Err(self.corrupt(format!(
                "tree holds {} entries, counter says {recorded}",
                state.entries
            )));
        }

        Ok(TreeShape {
            height: state.leaf_depth.map_or(1, |depth| depth + 1),
            nodes: state.nodes,
            leaves: state.leaves.len(),
            entries: state.entries,
        })
    }

    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        lower: Option<&Key>,
        upper: Option<&Key>,
        is_root: bool,
        state: &mut CheckState,
    ) -> IndexResult<()> {
        let latch = self.node(id)?;
        let node = latch.read();
        state.nodes += 1;

        let keys = match &*node {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Internal(internal) => &internal.keys,
        };
        if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(self.corrupt(format!("keys of node {id:?} are not strictly ascending")));
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if first < lower {
                return Err(self.corrupt(format!("node {id:?} holds {first} below separator {lower}")));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if last >= upper {
                return Err(self.corrupt(format!("node {id:?} holds {last} at or above separator {upper}")));
            }
        }
        if keys.len() > self.max_keys {
            return Err(self.corrupt(format!("node {id:?} overflows with {} keys", keys.len())));
        }
        if !is_root && keys.len() < self.min_keys {
            return Err(self.corrupt(format!("node {id:?} underflows with {} keys", keys.len())));
        }

        match &*node {
            Node::Leaf(leaf) => {
                if leaf.values.len() != leaf.keys.len() {
                    return Err(self.corrupt(format!("leaf {id:?} has mismatched keys and payloads")));
                }
                for (key, values) in leaf.keys.iter().zip(&leaf.values) {
                    if values.is_empty() {
                        return Err(self.corrupt(format!("key {key} has no payloads")));
                    }
                    if self.unique && values.len() > 1 {
                        return Err(self.corrupt(format!("unique key {key} has {} payloads", values.len())));
                    }
                    state.entries += values.len();
                }
                match state.leaf_depth {
                    None => state.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(self.corrupt(format!(
                            "unbalanced tree: leaf {id:?} at depth {depth}, expected {expected}"
                        )));
                    }
                    Some(_) => {}
                }
                state.leaves.push((id, leaf.next));
            }
            Node::Internal(internal) => {
                if internal.children.len() != internal.keys.len() + 1 {
                    return Err(self.corrupt(format!(
                        "node {id:?} has {} keys but {} children",
                        internal.keys.len(),
                        internal.children.len()
                    )));
                }
                if is_root && internal.keys.is_empty() {
                    return Err(self.corrupt("internal root has no keys"));
                }
                for (i, &child) in internal.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { internal.keys.get(i - 1) };
                    let hi = internal.keys.get(i).or(upper);
                    self.check_node(child, depth + 1, lo, hi, false, state)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: i64) -> Key {
        Key::single(n)
    }

    fn keys_of(tree: &BTree<u64>) -> Vec<(Key, u64)> {
        let mut out = Vec::new();
        tree.scan(Bound::Unbounded, Bound::Unbounded, |k, values| {
            out.extend(values.iter().map(|v| (k.clone(), *v)));
            true
        })
        .unwrap();
        out
    }

    #[test]
    fn grows_and_shrinks_with_small_fanout() {
        let tree = BTree::new("t", false, 3);
        for n in 0..200 {
            assert!(tree.insert(key(n), n as u64).unwrap());
        }
        let shape = tree.check_integrity().unwrap();
        assert_eq!(shape.entries, 200);
        assert!(shape.height > 3);
        assert_eq!(tree.height().unwrap(), shape.height);

        for n in (0..200).step_by(2) {
            assert!(tree.delete(&key(n), &(n as u64)).unwrap());
            tree.check_integrity().unwrap();
        }
        let remaining: Vec<_> = keys_of(&tree).into_iter().map(|(k, _)| k).collect();
        assert_eq!(remaining, (1..200).step_by(2).map(key).collect::<Vec<_>>());

        for n in (1..200).step_by(2) {
            assert!(tree.delete(&key(n), &(n as u64)).unwrap());
        }
        let shape = tree.check_integrity().unwrap();
        assert_eq!(shape.height, 1);
        assert_eq!(shape.nodes, 1);
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn reverse_deletion_exercises_left_borrowing() {
        let tree = BTree::new("t", false, 4);
        for n in 0..100 {
            tree.insert(key(n), 0u64).unwrap();
        }
        for n in (0..100).rev() {
            assert!(tree.delete(&key(n), &0).unwrap());
            tree.check_integrity().unwrap();
        }
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn duplicate_pair_is_a_no_op() {
        let tree = BTree::new("t", false, 4);
        assert!(tree.insert(key(1), 7u64).unwrap());
        assert!(!tree.insert(key(1), 7u64).unwrap());
        assert!(tree.insert(key(1), 8u64).unwrap());
        assert_eq!(tree.get(&key(1)).unwrap(), vec![7, 8]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn unique_tree_rejects_second_payload() {
        let tree = BTree::new("u", true, 4);
        tree.insert(key(1), 1u64).unwrap();
        let err = tree.insert(key(1), 2u64).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey { .. }));
        assert_eq!(tree.get(&key(1)).unwrap(), vec![1]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn delete_missing_pair_reports_false() {
        let tree = BTree::new("t", false, 4);
        tree.insert(key(1), 1u64).unwrap();
        assert!(!tree.delete(&key(2), &1).unwrap());
        assert!(!tree.delete(&key(1), &2).unwrap());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn scan_respects_bounds() {
        let tree = BTree::new("t", false, 3);
        for n in 0..50 {
            tree.insert(key(n), n as u64).unwrap();
        }
        let collect = |low: Bound<&Key>, high: Bound<&Key>| {
            let mut out = Vec::new();
            tree.scan(low, high, |_, values| {
                out.extend(values.iter().copied());
                true
            })
            .unwrap();
            out
        };
        assert_eq!(
            collect(Bound::Included(&key(10)), Bound::Excluded(&key(15))),
            vec![10, 11, 12, 13, 14]
        );
        assert_eq!(
            collect(Bound::Excluded(&key(10)), Bound::Included(&key(12))),
            vec![11, 12]
        );
        assert_eq!(collect(Bound::Excluded(&key(47)), Bound::Unbounded), vec![48, 49]);
        assert!(collect(Bound::Included(&key(30)), Bound::Excluded(&key(30))).is_empty());
    }

    #[test]
    fn min_and_max_keys() {
        let tree = BTree::new("t", false, 3);
        assert_eq!(tree.min_key().unwrap(), None);
        for n in [5, 3, 9, 1, 7] {
            tree.insert(key(n), 0u64).unwrap();
        }
        assert_eq!(tree.min_key().unwrap(), Some(key(1)));
        assert_eq!(tree.max_key().unwrap(), Some(key(9)));
    }

    #[test]
    fn clear_resets_to_single_leaf() {
        let tree = BTree::new("t", false, 3);
        for n in 0..30 {
            tree.insert(key(n), 0u64).unwrap();
        }
        tree.clear();
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.check_integrity().unwrap().height, 1);
    }
}
