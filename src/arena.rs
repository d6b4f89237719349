//! Arena allocation for clause-index trie nodes.
//!
//! Provides `NodeId` (a dense, total-orderable identifier) and `NodeArena`
//! (contiguous, append-only storage). Trie nodes are created when clauses are
//! stored or lifted and live as long as the database, so slots are never
//! reclaimed.
//!
//! # Determinism
//! - `NodeId` ordering is by its inner `u32`.
//! - Ids are handed out in allocation order.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Dense identifier of a trie node.
///
/// The inner value is an index into the arena's slot array. Index `0` is
/// reserved for the trie root (see [`ROOT`]).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The trie root. Every arena is created with it in place.
pub const ROOT: NodeId = NodeId(0);

/// Append-only storage for node data.
#[derive(Debug, Clone)]
pub struct NodeArena<T> {
    slots: Vec<T>,
}

impl<T> NodeArena<T> {
    /// Creates an arena holding `root` at [`ROOT`].
    pub fn with_root(root: T) -> Self {
        Self { slots: vec![root] }
    }

    /// Appends `data` and returns its id.
    pub fn allocate(&mut self, data: T) -> NodeId {
        let idx = self.slots.len() as u32;
        self.slots.push(data);
        NodeId(idx)
    }

    /// Number of nodes, including the root.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Index<NodeId> for NodeArena<T> {
    type Output = T;

    /// # Panics
    /// Panics if `id` was not allocated by this arena.
    fn index(&self, id: NodeId) -> &T {
        &self.slots[id.as_u32() as usize]
    }
}

impl<T> IndexMut<NodeId> for NodeArena<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.slots[id.as_u32() as usize]
    }
}

impl<T: Default> Default for NodeArena<T> {
    fn default() -> Self {
        Self::with_root(T::default())
    }
}
