//! Trie-indexed clause database.
//!
//! Statements are indexed by the `functor/arity` chain along the left spine
//! of the term: the statement's own functor, then its first argument's, then
//! that argument's first argument's, and so on until a non-compound (or a
//! dynamic marker) is reached. Each trie node carries two buckets:
//!
//! - **exact**: statements whose spine ends at this node,
//! - **below**: statements whose spine continues past this node.
//!
//! Lookups follow the same spine through a dereferenced pattern. Because the
//! program is expected to be deterministic by construction, the most-specific
//! lookup yields at most one statement; anything else is reported to the
//! caller as [`Selection::Many`].
//!
//! # Determinism
//! - Buckets keep insertion order.
//! - Node ids are allocated in insertion order (see [`crate::arena`]).

use std::collections::HashMap;

use tracing::trace;

use crate::arena::{NodeArena, NodeId, ROOT};
use crate::engine::BuiltinFn;
use crate::error::EngineError;
use crate::heap::Heap;
use crate::term::{FunctorKey, Term};

/// Index of a stored statement.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClauseId(u32);

impl ClauseId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which bucket of a node a match was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Exact,
    Below,
}

/// A single selected statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub node: NodeId,
    pub clause: ClauseId,
    pub bucket: Bucket,
}

/// Result of a most-specific lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    None,
    One(Match),
    /// Competing statements; the program is ambiguous for this pattern.
    Many(Vec<ClauseId>),
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: HashMap<FunctorKey, NodeId>,
    exact: Vec<ClauseId>,
    below: Vec<ClauseId>,
    builtins: Option<HashMap<u32, BuiltinFn>>,
    /// Set once a builtin is attached; such nodes are never lifted.
    fixed: bool,
}

/// Where a spine descent ended.
#[derive(Debug, Clone, Default)]
pub struct Descent {
    /// Node reached after consuming the whole spine, if every edge existed.
    pub terminal: Option<NodeId>,
    /// Deepest node passed on the way with a non-empty exact bucket.
    pub fallback: Option<NodeId>,
    /// Node and key at which a missing edge stopped the descent.
    pub stalled: Option<(NodeId, FunctorKey)>,
    /// Whether the descent stopped on a dynamic marker.
    pub dynamic_stop: bool,
    /// Nodes whose outgoing edge was followed, root first.
    pub path: Vec<NodeId>,
}

/// The clause trie and the statements it indexes.
#[derive(Debug, Clone, Default)]
pub struct Database {
    nodes: NodeArena<TrieNode>,
    statements: Vec<Term>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of trie nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn statement(&self, id: ClauseId) -> &Term {
        &self.statements[id.index()]
    }

    fn node(&self, id: NodeId) -> &TrieNode {
        &self.nodes[id]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TrieNode {
        &mut self.nodes[id]
    }

    pub fn exact(&self, node: NodeId) -> &[ClauseId] {
        &self.node(node).exact
    }

    pub fn below(&self, node: NodeId) -> &[ClauseId] {
        &self.node(node).below
    }

    pub fn child(&self, node: NodeId, key: &FunctorKey) -> Option<NodeId> {
        self.node(node).children.get(key).copied()
    }

    pub fn is_fixed(&self, node: NodeId) -> bool {
        self.node(node).fixed
    }

    /// Handler attached to `node` for `mode`, if any.
    pub fn builtin(&self, node: NodeId, mode: u32) -> Option<BuiltinFn> {
        self.node(node)
            .builtins
            .as_ref()
            .and_then(|table| table.get(&mode).copied())
    }

    /// Whether any handler is attached to `node`.
    pub fn has_builtins(&self, node: NodeId) -> bool {
        self.node(node).builtins.is_some()
    }

    /// Inserts a statement (in prototype form).
    ///
    /// Returns its id and the node whose exact bucket received it.
    pub fn store(&mut self, statement: Term) -> (ClauseId, NodeId) {
        let id = ClauseId(self.statements.len() as u32);
        let mut node = ROOT;
        let mut term = statement.clone();
        while let Term::Compound(c) = &term {
            if c.is_dynamic_marker() {
                break;
            }
            self.node_mut(node).below.push(id);
            let key = c.key();
            node = match self.child(node, &key) {
                Some(next) => next,
                None => {
                    let next = self.nodes.allocate(TrieNode::default());
                    self.node_mut(node).children.insert(key, next);
                    next
                }
            };
            match c.args.first() {
                Some(first) => term = first.clone(),
                None => break,
            }
        }
        self.node_mut(node).exact.push(id);
        trace!(clause = %statement, node = %node, "stored statement");
        self.statements.push(statement);
        (id, node)
    }

    /// Follows the spine of `pattern` through the trie.
    pub fn descend(&self, heap: &mut Heap, pattern: &Term) -> Result<Descent, EngineError> {
        let mut descent = Descent::default();
        let mut node = ROOT;
        let mut term = heap.deref(pattern)?;
        loop {
            let Term::Compound(c) = &term else { break };
            if c.is_dynamic_marker() {
                descent.dynamic_stop = true;
                break;
            }
            descent.path.push(node);
            if !self.exact(node).is_empty() {
                descent.fallback = Some(node);
            }
            let key = c.key();
            match self.child(node, &key) {
                Some(next) => node = next,
                None => {
                    descent.stalled = Some((node, key));
                    return Ok(descent);
                }
            }
            match c.args.first() {
                Some(first) => {
                    let first = first.clone();
                    term = heap.deref(&first)?;
                }
                None => break,
            }
        }
        descent.terminal = Some(node);
        Ok(descent)
    }

    /// Picks the most specific statements for a finished descent.
    ///
    /// Prefers the terminal node's exact bucket, then its below bucket, then
    /// the exact bucket of the deepest ancestor that has one.
    pub fn select(&self, descent: &Descent) -> Selection {
        if let Some(terminal) = descent.terminal {
            let node = self.node(terminal);
            if !node.exact.is_empty() {
                return pick(terminal, &node.exact, Bucket::Exact);
            }
            if !node.below.is_empty() {
                return pick(terminal, &node.below, Bucket::Below);
            }
        }
        match descent.fallback {
            Some(fallback) => pick(fallback, &self.node(fallback).exact, Bucket::Exact),
            None => Selection::None,
        }
    }

    /// Most specific statement for `pattern`, without lifting.
    pub fn find_most_specific(
        &self,
        heap: &mut Heap,
        pattern: &Term,
    ) -> Result<Selection, EngineError> {
        let descent = self.descend(heap, pattern)?;
        Ok(self.select(&descent))
    }

    /// Every statement compatible with `pattern`, most general first.
    pub fn find_all_matches(
        &self,
        heap: &mut Heap,
        pattern: &Term,
    ) -> Result<Vec<ClauseId>, EngineError> {
        let descent = self.descend(heap, pattern)?;
        let mut matches: Vec<ClauseId> = descent
            .path
            .iter()
            .flat_map(|&node| self.exact(node).iter().copied())
            .collect();
        if let Some(terminal) = descent.terminal {
            matches.extend_from_slice(self.exact(terminal));
            matches.extend_from_slice(self.below(terminal));
        }
        Ok(matches)
    }

    /// Attaches `handler` to the node holding the unique generic statement
    /// for `pattern`, and marks that node fixed.
    pub fn store_builtin(
        &mut self,
        heap: &mut Heap,
        pattern: &Term,
        mode: u32,
        handler: BuiltinFn,
    ) -> Result<NodeId, EngineError> {
        let selected = self.find_most_specific(heap, pattern)?;
        let node = match selected {
            Selection::One(Match {
                node,
                bucket: Bucket::Exact,
                ..
            }) => node,
            Selection::One(_) => {
                return Err(EngineError::BuiltinTarget {
                    pattern: pattern.to_string(),
                    matches: 1,
                })
            }
            Selection::None => {
                return Err(EngineError::BuiltinTarget {
                    pattern: pattern.to_string(),
                    matches: 0,
                })
            }
            Selection::Many(ids) => {
                return Err(EngineError::BuiltinTarget {
                    pattern: pattern.to_string(),
                    matches: ids.len(),
                })
            }
        };
        let entry = self.node_mut(node);
        entry.builtins.get_or_insert_with(HashMap::new).insert(mode, handler);
        entry.fixed = true;
        Ok(node)
    }
}

fn pick(node: NodeId, bucket: &[ClauseId], kind: Bucket) -> Selection {
    match bucket {
        [] => Selection::None,
        [clause] => Selection::One(Match {
            node,
            clause: *clause,
            bucket: kind,
        }),
        many => Selection::Many(many.to_vec()),
    }
}
