//! Tree nodes and the arena that owns them.
//!
//! Nodes never own each other. Parents refer to children, and leaves to
//! their right neighbour, by [`NodeId`], an index into the arena. Splits and
//! merges only rewrite ids.

use crate::error::{IndexError, IndexResult};
use crate::key::Key;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Stable address of a node inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Leaf node: ascending keys, each with the set of payloads stored under it.
#[derive(Debug)]
pub(crate) struct LeafNode<V> {
    pub keys: Vec<Key>,
    pub values: Vec<BTreeSet<V>>,
    /// Right neighbour in key order.
    pub next: Option<NodeId>,
}

impl<V> LeafNode<V> {
    pub fn empty() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
        }
    }

    /// Moves the upper half into a new right sibling.
    ///
    /// Returns the separator (the right sibling's first key) and the sibling.
    /// The sibling inherits `next`; the caller links `self.next` to it once it
    /// has an id.
    pub fn split(&mut self) -> (Key, LeafNode<V>) {
        let mid = self.keys.len() / 2;
        let keys = self.keys.split_off(mid);
        let values = self.values.split_off(mid);
        let separator = keys[0].clone();
        (
            separator,
            LeafNode {
                keys,
                values,
                next: self.next,
            },
        )
    }
}

/// Internal node: `k` separator keys and `k + 1` children.
///
/// Child `i` holds keys in `[keys[i - 1], keys[i])`.
#[derive(Debug)]
pub(crate) struct InternalNode {
    pub keys: Vec<Key>,
    pub children: Vec<NodeId>,
}

impl InternalNode {
    /// Position of the child whose range contains `key`.
    pub fn child_slot(&self, key: &Key) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    pub fn child_at(&self, slot: usize) -> Option<NodeId> {
        self.children.get(slot).copied()
    }

    /// Moves the upper half into a new right sibling, promoting the median.
    pub fn split(&mut self) -> (Key, InternalNode) {
        let mid = self.keys.len() / 2;
        let mut keys = self.keys.split_off(mid);
        let promoted = keys.remove(0);
        let children = self.children.split_off(mid + 1);
        (promoted, InternalNode { keys, children })
    }
}

#[derive(Debug)]
pub(crate) enum Node<V> {
    Leaf(LeafNode<V>),
    Internal(InternalNode),
}

impl<V> Node<V> {
    pub fn key_count(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.keys.len(),
            Node::Internal(node) => node.keys.len(),
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode<V>> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Internal(_) => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafNode<V>> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Internal(_) => None,
        }
    }

    pub fn as_internal_mut(&mut self) -> Option<&mut InternalNode> {
        match self {
            Node::Leaf(_) => None,
            Node::Internal(node) => Some(node),
        }
    }
}

/// A node together with its latch.
pub(crate) type NodeLatch<V> = Arc<RwLock<Node<V>>>;

/// Slot table of nodes addressed by [`NodeId`].
///
/// The slot table lock is only held long enough to clone or replace a
/// node's `Arc`; it is never held while waiting on a node latch.
pub(crate) struct Arena<V> {
    slots: RwLock<Vec<Option<NodeLatch<V>>>>,
    free: Mutex<Vec<NodeId>>,
}

impl<V> Arena<V> {
    /// Creates an arena holding a single root node.
    pub fn with_root(root: Node<V>) -> (Self, NodeId) {
        let arena = Self {
            slots: RwLock::new(vec![Some(Arc::new(RwLock::new(root)))]),
            free: Mutex::new(Vec::new()),
        };
        (arena, NodeId(0))
    }

    pub fn get(&self, id: NodeId) -> Option<NodeLatch<V>> {
        self.slots.read().get(id.index()).and_then(|slot| slot.clone())
    }

    /// Ensures `additional` nodes can be allocated without reallocating.
    ///
    /// Tries to reserve headroom first and falls back to the exact amount.
    pub fn reserve(&self, additional: usize) -> IndexResult<()> {
        grow(&mut self.slots.write(), additional)
    }

    pub fn alloc(&self, node: Node<V>) -> IndexResult<NodeId> {
        let latch = Arc::new(RwLock::new(node));

        let reused = self.free.lock().pop();
        let mut slots = self.slots.write();
        if let Some(id) = reused {
            slots[id.index()] = Some(latch);
            return Ok(id);
        }

        if slots.len() == slots.capacity() {
            grow(&mut slots, 1)?;
        }
        let index = u32::try_from(slots.len())
            .map_err(|_| IndexError::resource_exhausted("node arena address space exhausted"))?;
        slots.push(Some(latch));
        Ok(NodeId(index))
    }

    /// Returns a node's slot to the free list.
    ///
    /// The caller must hold the latches of every node that could still
    /// reference `id`.
    pub fn release(&self, id: NodeId) {
        if let Some(slot) = self.slots.write().get_mut(id.index()) {
            *slot = None;
        }
        self.free.lock().push(id);
    }

    /// Drops every node and installs a fresh root.
    pub fn reset(&self, root: Node<V>) -> NodeId {
        {
            let mut slots = self.slots.write();
            slots.clear();
            slots.push(Some(Arc::new(RwLock::new(root))));
        }
        self.free.lock().clear();
        NodeId(0)
    }

    /// Number of allocated nodes.
    pub fn live(&self) -> usize {
        self.slots.read().iter().filter(|slot| slot.is_some()).count()
    }
}

fn grow<T>(slots: &mut Vec<T>, additional: usize) -> IndexResult<()> {
    if slots.try_reserve(additional.saturating_mul(2).max(16)).is_ok() {
        return Ok(());
    }
    slots.try_reserve_exact(additional).map_err(|e| {
        IndexError::resource_exhausted(format!(
            "cannot grow node arena by {additional} slot(s): {e}"
        ))
    })
}
