//! Committed-choice resolution.
//!
//! The engine pops goals from an explicit stack until it is empty. Each goal
//! is looked up as `clause(Goal, _)` in the [`Database`]; the unique most
//! specific statement is matched against the goal and either dispatched to a
//! builtin handler or replaced by its body.
//!
//! # Failure
//! Logical failure truncates the goal stack to the current *fail
//! continuation* and raises the failure flag. The goal left on top is the
//! continuation installed by whichever control builtin opened the innermost
//! choice point; it inspects the flag with [`Engine::take_failure`]. With no
//! choice point outstanding the stack empties and [`Engine::call`] returns
//! `Ok(false)`.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::builtins;
use crate::config::EngineConfig;
use crate::database::{Bucket, ClauseId, Database, Match, Selection};
use crate::error::{Arena, EngineError};
use crate::heap::{ChoicePoint, Heap};
use crate::names;
use crate::prototype::{mode_from_str, Registers};
use crate::specialize::Specializer;
use crate::term::{Addr, Clause, Term};

/// Native implementation of one builtin mode.
///
/// Receives the dereferenced argument values of the call.
pub type BuiltinFn = fn(&mut Engine, &[Term]) -> Result<(), EngineError>;

/// Fixed-capacity stack of pending goals.
#[derive(Debug, Clone)]
pub struct GoalStack {
    goals: Vec<Term>,
    capacity: usize,
}

impl GoalStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            goals: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, goal: Term) -> Result<(), EngineError> {
        if self.goals.len() >= self.capacity {
            return Err(EngineError::CapacityExceeded {
                arena: Arena::GoalStack,
                capacity: self.capacity,
            });
        }
        self.goals.push(goal);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Term> {
        self.goals.pop()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.goals.truncate(len);
    }

    pub fn clear(&mut self) {
        self.goals.clear();
    }

    /// Pending goals, next to run first.
    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.goals.iter().rev()
    }

    pub(crate) fn take(&mut self) -> Vec<Term> {
        std::mem::take(&mut self.goals)
    }

    pub(crate) fn restore(&mut self, goals: Vec<Term>) {
        self.goals = goals;
    }
}

/// A resolution engine with its heap, goal stack and clause database.
#[derive(Debug)]
pub struct Engine {
    pub(crate) heap: Heap,
    pub(crate) regs: Registers,
    pub(crate) goals: GoalStack,
    /// Number of goals kept when a failure collapses the stack.
    pub(crate) fail_continuation: usize,
    pub(crate) failure: bool,
    pub(crate) db: Database,
    pub(crate) specializer: Option<Specializer>,
}

impl Engine {
    /// Creates an engine with the builtin predicates installed.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let mut engine = Self {
            heap: Heap::new(config.heap_capacity, config.trail_capacity),
            regs: Registers::new(),
            goals: GoalStack::new(config.goal_stack_capacity),
            fail_continuation: 0,
            failure: false,
            db: Database::new(),
            specializer: config.specialization.as_ref().map(Specializer::new),
        };
        builtins::install(&mut engine)?;
        Ok(engine)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn specializer(&self) -> Option<&Specializer> {
        self.specializer.as_ref()
    }

    /// Allocates a fresh query variable.
    pub fn var(&mut self) -> Result<Term, EngineError> {
        self.heap.allocate()
    }

    /// Stores a statement given in prototype form.
    ///
    /// A term other than `clause(Head, Body)` is stored as a fact.
    pub fn store(&mut self, statement: Term) -> ClauseId {
        self.db.store(Clause::statement_of(statement)).0
    }

    /// Stores `clause(Head, Body)`.
    pub fn store_clause(&mut self, clause: &Clause) -> ClauseId {
        self.store(clause.to_statement())
    }

    /// Stores every statement of a program.
    pub fn load<I>(&mut self, statements: I)
    where
        I: IntoIterator<Item = Term>,
    {
        for statement in statements {
            self.store(statement);
        }
    }

    /// Substitutes all bindings into `term`.
    pub fn resolve(&mut self, term: &Term) -> Result<Term, EngineError> {
        self.heap.resolve(term)
    }

    /// Runs `goal` to completion.
    ///
    /// Returns `Ok(false)` on logical failure. On a fatal error the goal
    /// stack and control state are cleared so the engine can be reused.
    pub fn call(&mut self, goal: &Term) -> Result<bool, EngineError> {
        match self.solve(goal) {
            Ok(success) => Ok(success),
            Err(err) => {
                debug!(error = %err, "resolution aborted");
                self.goals.clear();
                self.regs.reset();
                self.failure = false;
                self.fail_continuation = 0;
                self.heap.discard_choice_points();
                if let Some(specializer) = self.specializer.as_mut() {
                    specializer.unlock();
                }
                Err(err)
            }
        }
    }

    /// The resolution loop, run on whatever is currently on the goal stack
    /// plus `goal`.
    pub(crate) fn solve(&mut self, goal: &Term) -> Result<bool, EngineError> {
        self.goals.push(goal.clone())?;
        while let Some(goal) = self.goals.pop() {
            self.step(goal)?;
        }
        Ok(!self.take_failure())
    }

    fn step(&mut self, goal: Term) -> Result<(), EngineError> {
        trace!(goal = %goal, depth = self.goals.len(), "resolving");
        let pattern = Term::compound(names::CLAUSE, vec![goal.clone(), Term::atom(names::WILDCARD)]);
        let Some(matched) = self.find_most_specific(&pattern)? else {
            self.fail();
            return Ok(());
        };
        let statement = self.db.statement(matched.clause);
        let clause = Clause::from_statement(statement)
            .ok_or_else(|| EngineError::MalformedStatement(statement.to_string()))?;

        self.regs.reset();
        if !self.heap.unify_write(&mut self.regs, &clause.head, &goal)? {
            self.fail();
            return Ok(());
        }
        if matched.bucket == Bucket::Exact && self.db.has_builtins(matched.node) {
            let mode = self.regs.mode(&mut self.heap)?;
            if let Some(handler) = self.db.builtin(matched.node, mode) {
                let args = self.regs.arguments(&mut self.heap)?;
                return handler(self, &args);
            }
        }
        let body = self.heap.unify_read(&mut self.regs, &clause.body)?;
        self.goals.push(body)
    }

    /// Selects the clause for `pattern`, lifting a specialized one when the
    /// index stalls and specialization is enabled.
    ///
    /// Returns `Ok(None)` when nothing matches and an
    /// [`EngineError::AmbiguousClause`] when several statements tie.
    pub fn find_most_specific(&mut self, pattern: &Term) -> Result<Option<Match>, EngineError> {
        let descent = self.db.descend(&mut self.heap, pattern)?;
        if let Some((node, key)) = &descent.stalled {
            if let Some(lifted) = self.try_lift(*node, key)? {
                return Ok(Some(lifted));
            }
        }
        match self.db.select(&descent) {
            Selection::None => Ok(None),
            Selection::One(matched) => Ok(Some(matched)),
            Selection::Many(ids) => Err(self.ambiguity(pattern, &ids)?),
        }
    }

    fn ambiguity(&mut self, pattern: &Term, ids: &[ClauseId]) -> Result<EngineError, EngineError> {
        let resolved = self.heap.resolve(pattern)?;
        let goal = match resolved.as_compound() {
            Some(c) if c.is(names::CLAUSE, 2) => c.args[0].to_string(),
            _ => resolved.to_string(),
        };
        Ok(EngineError::AmbiguousClause {
            goal,
            clauses: ids
                .iter()
                .map(|&id| self.db.statement(id).to_string())
                .collect(),
        })
    }

    /// Fresh heap instance of a stored statement.
    pub fn instantiate(&mut self, id: ClauseId) -> Result<Term, EngineError> {
        let statement = self.db.statement(id).clone();
        let mut regs = Registers::new();
        self.heap.unify_read(&mut regs, &statement)
    }

    /// Fresh instances of every statement compatible with `pattern`.
    pub fn find_all_matches(&mut self, pattern: &Term) -> Result<Vec<Term>, EngineError> {
        let ids = self.db.find_all_matches(&mut self.heap, pattern)?;
        ids.into_iter().map(|id| self.instantiate(id)).collect()
    }

    pub fn push(&mut self, goal: Term) -> Result<(), EngineError> {
        self.goals.push(goal)
    }

    /// Collapses the goal stack to the fail continuation.
    pub fn fail(&mut self) {
        self.goals.truncate(self.fail_continuation);
        self.failure = true;
    }

    /// Reports and clears the failure flag.
    pub fn take_failure(&mut self) -> bool {
        std::mem::take(&mut self.failure)
    }

    /// Opens a choice point whose continuation is the next goal pushed.
    pub fn create_choice_point(&mut self) -> ChoicePoint {
        let cp = self.heap.create_choice_point(self.fail_continuation);
        self.fail_continuation = self.goals.len() + 1;
        cp
    }

    pub fn rollback_choice_point(&mut self, cp: &ChoicePoint) -> Result<(), EngineError> {
        self.heap.rollback(cp)?;
        self.fail_continuation = cp.fail_continuation;
        debug!(heap_top = cp.heap_top, "rolled back choice point");
        Ok(())
    }

    pub fn commit_choice_point(&mut self, cp: &ChoicePoint) {
        self.heap.commit(cp);
        self.fail_continuation = cp.fail_continuation;
        debug!(heap_top = cp.heap_top, "committed choice point");
    }

    pub fn unify(&mut self, left: &Term, right: &Term) -> Result<bool, EngineError> {
        self.heap.unify(left, right)
    }

    /// Unifies and fails the current goal on mismatch.
    pub fn unify_or_fail(&mut self, left: &Term, right: &Term) -> Result<(), EngineError> {
        if !self.heap.unify(left, right)? {
            self.fail();
        }
        Ok(())
    }

    /// Binds an unbound variable argument.
    pub fn bind(&mut self, var: &Term, value: Term) -> Result<(), EngineError> {
        match var {
            Term::Var(addr) => self.heap.bind(*addr, value),
            other => {
                if !self.heap.unify(other, &value)? {
                    self.fail();
                }
                Ok(())
            }
        }
    }

    /// Registers a builtin predicate `name/arity` in the engine namespace.
    ///
    /// A generic clause with placeholder arguments is stored whose body
    /// reports an undefined mode; each `(mode, handler)` pair then attaches a
    /// native handler to that clause for calls in the given mode.
    pub fn add_builtin(
        &mut self,
        name: &str,
        arity: usize,
        modes: &[(&str, BuiltinFn)],
    ) -> Result<(), EngineError> {
        let qualified = names::qualified(name);
        let head = Term::compound(&qualified, (0..arity as u32).map(Term::reg).collect());
        let body = Term::compound(
            names::UNDEFINED_MODE,
            vec![Term::atom(name), Term::int(arity as i64)],
        );
        let statement = Clause::new(head, body).to_statement();
        self.db.store(statement.clone());
        for (mode, handler) in modes {
            debug_assert_eq!(mode.len(), arity, "mode {mode} for {name}/{arity}");
            self.db
                .store_builtin(&mut self.heap, &statement, mode_from_str(mode), *handler)?;
        }
        Ok(())
    }

    /// Rendered pending goals, next to run first.
    pub(crate) fn pending_goals(&mut self) -> Result<Vec<String>, EngineError> {
        let goals: Vec<Term> = self.goals.iter().cloned().collect();
        goals
            .iter()
            .map(|g| self.heap.resolve(g).map(|t| t.to_string()))
            .collect()
    }

    /// Variables above `boundary` replaced by fresh cells.
    pub(crate) fn reattach(&mut self, term: &Term, boundary: usize) -> Result<Term, EngineError> {
        let mut map: HashMap<Addr, Term> = HashMap::new();
        self.heap.reattach(term, boundary, &mut map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    fn q(name: &str) -> String {
        names::qualified(name)
    }

    #[test]
    fn eq_fact_succeeds_only_on_equal_arguments() {
        let mut e = engine();
        e.store_clause(&Clause::fact(Term::compound(
            "eq",
            vec![Term::reg(0), Term::reg(0)],
        )));
        assert!(e.call(&Term::compound("eq", vec![Term::int(5), Term::int(5)])).unwrap());
        assert!(!e.call(&Term::compound("eq", vec![Term::int(5), Term::int(6)])).unwrap());
    }

    #[test]
    fn unknown_predicate_fails() {
        let mut e = engine();
        assert!(!e.call(&Term::compound("nope", vec![Term::int(1)])).unwrap());
    }

    #[test]
    fn bare_statements_are_stored_as_facts() {
        let mut e = engine();
        e.load(vec![
            Term::compound("colour", vec![Term::atom("red")]),
            Clause::new(
                Term::compound("warm", vec![Term::reg(0)]),
                Term::compound("colour", vec![Term::reg(0)]),
            )
            .to_statement(),
        ]);
        assert!(e.call(&Term::compound("warm", vec![Term::atom("red")])).unwrap());
        assert!(!e.call(&Term::compound("warm", vec![Term::atom("blue")])).unwrap());
        let id = e.store(Term::compound("colour", vec![Term::atom("amber")]));
        assert_eq!(
            e.db.statement(id).to_string(),
            "/detalion#clause(colour(\"amber\"), /detalion#true)"
        );
    }

    #[test]
    fn body_goals_are_resolved_in_turn() {
        let mut e = engine();
        // p(X) :- conj(true, =(X, 7))
        e.store_clause(&Clause::new(
            Term::compound("p", vec![Term::reg(0)]),
            Term::compound(
                &q("conj"),
                vec![
                    Term::constant(&q("true")),
                    Term::compound(names::EQUALS_FACT, vec![Term::reg(0), Term::int(7)]),
                ],
            ),
        ));
        let x = e.var().unwrap();
        assert!(e.call(&Term::compound("p", vec![x.clone()])).unwrap());
        assert_eq!(e.resolve(&x).unwrap(), Term::int(7));
    }

    #[test]
    fn ambiguous_clauses_are_fatal_and_engine_recovers() {
        let mut e = engine();
        e.store_clause(&Clause::fact(Term::compound("q", vec![Term::reg(0)])));
        e.store_clause(&Clause::fact(Term::compound("q", vec![Term::reg(0)])));
        let err = e.call(&Term::compound("q", vec![Term::int(1)])).unwrap_err();
        match err {
            EngineError::AmbiguousClause { goal, clauses } => {
                assert_eq!(goal, "q(1)");
                assert_eq!(clauses.len(), 2);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(e.goals.is_empty());
        assert!(e.call(&Term::constant(&q("true"))).unwrap());
    }

    #[test]
    fn goal_stack_exhaustion_is_typed() {
        let mut e = Engine::new(EngineConfig {
            goal_stack_capacity: 1,
            ..EngineConfig::default()
        })
        .unwrap();
        let goal = Term::compound(
            &q("conj"),
            vec![Term::constant(&q("true")), Term::constant(&q("true"))],
        );
        assert_eq!(
            e.call(&goal),
            Err(EngineError::CapacityExceeded {
                arena: Arena::GoalStack,
                capacity: 1
            })
        );
    }

    #[test]
    fn add_builtin_rejects_unknown_mode_calls() {
        let mut e = engine();
        let x = e.var().unwrap();
        let y = e.var().unwrap();
        // plus/3 has no handler for OOO.
        let err = e
            .call(&Term::compound(&q("plus"), vec![x, y, Term::int(1)]))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::UndefinedMode {
                predicate: "plus/3".to_string()
            }
        );
    }
}
