//! Just-in-time clause specialization.
//!
//! When a lookup stalls at a trie node because no child exists for the next
//! `functor/arity` on the goal's spine, the node's generic clause is a
//! candidate for *lifting*. After `threshold` stalls on the same node and key
//! the clause is instantiated with that functor at its spine tail and handed
//! to a partial-evaluation predicate written in the program itself:
//!
//! ```text
//! lift(Clause, Specialized, Auxiliaries)
//! ```
//!
//! On success `Specialized` is stored under a new trie node, each auxiliary
//! clause is stored once, and the specialized clause answers the stalled
//! lookup. On failure a clause with body `fail` is stored in its place, so the
//! lookup and every later identical one fail without lifting again.
//!
//! Partial evaluation runs through the ordinary resolution loop on a
//! suspended goal stack; the specializer is locked meanwhile and stalls seen
//! during that run fall back to the generic clauses.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;

use tracing::{debug, info, warn};

use crate::arena::NodeId;
use crate::config::SpecializationConfig;
use crate::database::{Bucket, Match};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::fingerprint::{Canonicalizable, HashValue, DOMAIN_CLAUSE_HEAD_V0};
use crate::names;
use crate::prototype::{max_reg, Registers};
use crate::term::{rebuild, Clause, FunctorKey, RegId, Term, Visit};

/// Lifting state: stall counters, declined slots and installed auxiliaries.
#[derive(Debug, Clone)]
pub struct Specializer {
    threshold: u32,
    predicate: String,
    counters: HashMap<(NodeId, FunctorKey), u32>,
    declined: HashSet<(NodeId, FunctorKey)>,
    installed: HashSet<HashValue>,
    locked: bool,
    lifted: usize,
}

impl Specializer {
    pub fn new(config: &SpecializationConfig) -> Self {
        Self {
            threshold: config.threshold.max(1),
            predicate: config.predicate.clone(),
            counters: HashMap::new(),
            declined: HashSet::new(),
            installed: HashSet::new(),
            locked: false,
            lifted: 0,
        }
    }

    /// Whether a partial evaluation is in progress.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of clauses installed by lifting, failing ones included.
    pub fn lifted(&self) -> usize {
        self.lifted
    }

    pub(crate) fn unlock(&mut self) {
        self.locked = false;
    }
}

/// Outcome of a partial evaluation.
enum Evaluation {
    Specialized { clause: Term, auxiliaries: Vec<Term> },
    Failed,
}

impl Engine {
    /// Offers a stalled lookup to the specializer.
    ///
    /// Returns the match that should answer the lookup when a clause was
    /// installed, or `None` to fall back to the generic clause.
    pub(crate) fn try_lift(
        &mut self,
        node: NodeId,
        key: &FunctorKey,
    ) -> Result<Option<Match>, EngineError> {
        let Some(spec) = self.specializer.as_mut() else {
            return Ok(None);
        };
        if spec.locked || self.db.is_fixed(node) {
            return Ok(None);
        }
        let slot = (node, key.clone());
        if spec.declined.contains(&slot) {
            return Ok(None);
        }
        let count = spec.counters.entry(slot.clone()).or_insert(0);
        *count += 1;
        if *count < spec.threshold {
            return Ok(None);
        }
        debug!(node = %node, key = %key, "attempting to lift");

        let Some(lifted) = self.lifted_statement(node, key) else {
            self.decline(slot);
            return Ok(None);
        };
        if !self.has_partial_evaluator() {
            debug!(key = %key, "no partial-evaluation clauses; declining");
            self.decline(slot);
            return Ok(None);
        }

        self.set_lock(true);
        let outcome = self.partially_evaluate(&lifted);
        self.set_lock(false);

        let matched = match outcome? {
            Evaluation::Specialized { clause, auxiliaries } => {
                for aux in auxiliaries {
                    self.install_auxiliary(aux);
                }
                let (id, node) = self.db.store(clause);
                info!(clause = %self.db.statement(id), "installed specialized clause");
                Match { node, clause: id, bucket: Bucket::Exact }
            }
            Evaluation::Failed => {
                let head = match Clause::from_statement(&lifted) {
                    Some(clause) => clause.head,
                    None => return Err(EngineError::MalformedStatement(lifted.to_string())),
                };
                let failing = Clause::new(head, Term::constant(names::FAIL)).to_statement();
                let (id, node) = self.db.store(failing);
                info!(clause = %self.db.statement(id), "installed failing clause");
                Match { node, clause: id, bucket: Bucket::Exact }
            }
        };
        if let Some(spec) = self.specializer.as_mut() {
            spec.lifted += 1;
        }
        Ok(Some(matched))
    }

    fn set_lock(&mut self, locked: bool) {
        if let Some(spec) = self.specializer.as_mut() {
            spec.locked = locked;
        }
    }

    fn decline(&mut self, slot: (NodeId, FunctorKey)) {
        if let Some(spec) = self.specializer.as_mut() {
            spec.declined.insert(slot);
        }
    }

    /// The node's generic statement with its spine tail replaced by
    /// `key.name(fresh registers...)`, or `None` when it cannot be lifted.
    fn lifted_statement(&self, node: NodeId, key: &FunctorKey) -> Option<Term> {
        let statement = match self.db.exact(node) {
            [id] => self.db.statement(*id).clone(),
            [] => return None,
            many => {
                warn!(node = %node, clauses = many.len(), "cannot lift an ambiguous node");
                return None;
            }
        };
        let clause = Clause::from_statement(&statement)?;
        if clause.body.is_true() {
            return None;
        }
        let Term::Reg(tail) = spine_tail(&statement) else {
            return None;
        };
        let first = max_reg(&statement).map_or(0, |m| m + 1);
        let replacement = Term::compound_sym(
            key.name.clone(),
            (first..first + key.arity as u32).map(Term::reg).collect(),
        );
        Some(substitute(&statement, *tail, &replacement))
    }

    fn has_partial_evaluator(&self) -> bool {
        let Some(spec) = self.specializer.as_ref() else {
            return false;
        };
        let head = Term::compound(&spec.predicate, (0..3).map(Term::reg).collect());
        let pattern = Term::compound(names::CLAUSE, vec![head, Term::reg(3)]);
        // Prototype patterns never touch the heap: registers are not variables.
        let mut scratch = crate::heap::Heap::new(0, 0);
        match self.db.descend(&mut scratch, &pattern) {
            Ok(descent) => descent.terminal.is_some_and(|t| {
                !self.db.exact(t).is_empty() || !self.db.below(t).is_empty()
            }),
            Err(_) => false,
        }
    }

    /// Runs the partial-evaluation predicate on `lifted` with the caller's
    /// resolution state suspended.
    fn partially_evaluate(&mut self, lifted: &Term) -> Result<Evaluation, EngineError> {
        let goals = self.goals.take();
        let fail_continuation = std::mem::replace(&mut self.fail_continuation, 0);
        let failure = std::mem::take(&mut self.failure);
        let regs = std::mem::take(&mut self.regs);
        let cp = self.heap.create_choice_point(0);

        let outcome = self.run_partial_evaluation(lifted);
        match &outcome {
            Ok(Evaluation::Specialized { .. }) => self.heap.commit(&cp),
            Ok(Evaluation::Failed) => self.heap.rollback(&cp)?,
            Err(_) => {}
        }

        self.goals.restore(goals);
        self.fail_continuation = fail_continuation;
        self.failure = failure;
        self.regs = regs;
        outcome
    }

    fn run_partial_evaluation(&mut self, lifted: &Term) -> Result<Evaluation, EngineError> {
        let predicate = match self.specializer.as_ref() {
            Some(spec) => spec.predicate.clone(),
            None => return Ok(Evaluation::Failed),
        };
        let mut regs = Registers::new();
        let clause = self.heap.unify_read(&mut regs, lifted)?;
        let specialized = self.var()?;
        let auxiliaries = self.var()?;
        let goal = Term::compound(
            &predicate,
            vec![clause, specialized.clone(), auxiliaries.clone()],
        );
        if !self.solve(&goal)? {
            debug!("partial evaluation failed");
            return Ok(Evaluation::Failed);
        }
        let (clause, _) = self.heap.to_prototype(&specialized)?;
        let items = self
            .heap
            .list_items(&auxiliaries)?
            .ok_or_else(|| EngineError::type_error("lift", "list", &auxiliaries))?;
        let mut protos = Vec::with_capacity(items.len());
        for item in &items {
            protos.push(self.heap.to_prototype(item)?.0);
        }
        Ok(Evaluation::Specialized {
            clause,
            auxiliaries: protos,
        })
    }

    /// Stores an auxiliary clause unless one with the same head was stored
    /// before.
    fn install_auxiliary(&mut self, aux: Term) {
        let aux = Clause::statement_of(aux);
        let head = Clause::from_statement(&aux).map_or_else(|| aux.clone(), |c| c.head);
        let key = head.fingerprint(DOMAIN_CLAUSE_HEAD_V0);
        let fresh = self
            .specializer
            .as_mut()
            .is_some_and(|spec| spec.installed.insert(key));
        if fresh {
            debug!(clause = %aux, "installed auxiliary clause");
            self.db.store(aux);
        }
    }
}

/// First non-compound term on the left spine, or the marker that stops it.
fn spine_tail(term: &Term) -> &Term {
    let mut cur = term;
    while let Term::Compound(c) = cur {
        match c.args.first() {
            Some(first) if !c.is_dynamic_marker() => cur = first,
            _ => break,
        }
    }
    cur
}

fn substitute(term: &Term, reg: RegId, replacement: &Term) -> Term {
    let image = rebuild(&mut (), term, |_, t| {
        Ok::<_, Infallible>(match t {
            Term::Reg(id) if *id == reg => Visit::Leaf(replacement.clone()),
            Term::Compound(c) => Visit::Descend(c.clone()),
            other => Visit::Leaf(other.clone()),
        })
    });
    match image {
        Ok(image) => image,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spine_tail_follows_first_arguments() {
        let t = Term::compound(
            names::CLAUSE,
            vec![Term::compound("p", vec![Term::reg(2), Term::reg(0)]), Term::reg(1)],
        );
        assert_eq!(spine_tail(&t), &Term::reg(2));
        let marked = Term::compound(names::DYNAMIC, vec![Term::reg(0)]);
        assert!(spine_tail(&marked).is_compound());
    }

    #[test]
    fn substitute_replaces_every_occurrence() {
        let t = Term::compound("f", vec![Term::reg(0), Term::compound("g", vec![Term::reg(0)])]);
        let r = Term::compound(".", vec![Term::reg(5), Term::reg(6)]);
        let out = substitute(&t, RegId::new(0), &r);
        assert_eq!(out, Term::compound("f", vec![r.clone(), Term::compound("g", vec![r])]));
    }
}
