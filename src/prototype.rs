//! Clause prototypes and per-call registers.
//!
//! A stored clause refers to its variables through [`Term::Reg`] placeholders.
//! Calling it pairs the head prototype with the goal ([`Heap::unify_write`]),
//! recording goal subterms in registers instead of copying the head, and then
//! builds the body from those registers ([`Heap::unify_read`]).

use std::collections::HashMap;

use crate::error::EngineError;
use crate::heap::Heap;
use crate::term::{rebuild, Addr, RegId, Term, Visit};

/// Register file for one clause activation.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    slots: Vec<Option<Term>>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RegId) -> Option<&Term> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn set(&mut self, id: RegId, value: Term) {
        let idx = id.index();
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx] = Some(value);
    }

    /// Clears all slots.
    pub fn reset(&mut self) {
        self.slots.clear();
    }

    /// Number of slots up to the highest one written.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Instantiation mode of the current activation.
    ///
    /// One bit per slot, the first slot being the most significant. A bit is
    /// set when the slot holds something other than an unbound variable.
    pub fn mode(&self, heap: &mut Heap) -> Result<u32, EngineError> {
        let mut mode = 0u32;
        for slot in &self.slots {
            mode <<= 1;
            if let Some(value) = slot {
                if !heap.deref(value)?.is_var() {
                    mode |= 1;
                }
            }
        }
        Ok(mode)
    }

    /// Dereferenced slot values; empty slots become fresh variables.
    pub fn arguments(&mut self, heap: &mut Heap) -> Result<Vec<Term>, EngineError> {
        let mut args = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter_mut() {
            let value = match slot {
                Some(value) => heap.deref(value)?,
                None => {
                    let fresh = heap.allocate()?;
                    *slot = Some(fresh.clone());
                    fresh
                }
            };
            args.push(value);
        }
        Ok(args)
    }
}

/// Converts a `"IIO"`-style mode string into a mode number.
pub fn mode_from_str(mode: &str) -> u32 {
    mode.chars()
        .fold(0, |acc, c| (acc << 1) | u32::from(c == 'I'))
}

impl Heap {
    /// Matches a prototype against a goal term.
    ///
    /// The first occurrence of a register records the goal subterm; later
    /// occurrences unify with it. An unbound goal variable facing prototype
    /// structure is bound to a fresh instance of that structure.
    pub fn unify_write(
        &mut self,
        regs: &mut Registers,
        proto: &Term,
        term: &Term,
    ) -> Result<bool, EngineError> {
        let mut pending = vec![(proto.clone(), term.clone())];
        while let Some((proto, term)) = pending.pop() {
            let term = self.deref(&term)?;
            match (&proto, term) {
                (Term::Reg(id), term) => match regs.get(*id).cloned() {
                    Some(recorded) => {
                        if !self.unify(&recorded, &term)? {
                            return Ok(false);
                        }
                    }
                    None => regs.set(*id, term),
                },
                (_, Term::Var(addr)) => {
                    let value = self.unify_read(regs, &proto)?;
                    self.bind(addr, value)?;
                }
                (Term::Compound(p), Term::Compound(t)) => {
                    if p.functor != t.functor || p.args.len() != t.args.len() {
                        return Ok(false);
                    }
                    pending.extend(p.args.iter().cloned().zip(t.args.iter().cloned()).rev());
                }
                (proto, term) => {
                    if !proto.atomic_eq(&term) {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Instantiates a prototype from the current registers.
    ///
    /// Registers never written by the head receive fresh variables. Subterms
    /// that contain no registers are shared with the prototype.
    pub fn unify_read(&mut self, regs: &mut Registers, proto: &Term) -> Result<Term, EngineError> {
        rebuild(self, proto, |heap, p| {
            Ok(match p {
                Term::Reg(id) => Visit::Leaf(match regs.get(*id) {
                    Some(value) => value.clone(),
                    None => {
                        let fresh = heap.allocate()?;
                        regs.set(*id, fresh.clone());
                        fresh
                    }
                }),
                Term::Compound(c) => Visit::Descend(c.clone()),
                other => Visit::Leaf(other.clone()),
            })
        })
    }

    /// Canonicalizes a heap term into a prototype.
    ///
    /// Distinct unbound variables become registers numbered from `0` in
    /// order of first occurrence. Also returns those variables, so that
    /// `vars[i]` is the variable replaced by register `i`.
    pub fn to_prototype(&mut self, term: &Term) -> Result<(Term, Vec<Addr>), EngineError> {
        let mut map = HashMap::new();
        let mut vars = Vec::new();
        let proto = self.prototype_with(term, &mut map, &mut vars)?;
        Ok((proto, vars))
    }

    /// [`Heap::to_prototype`] with a renaming shared across several terms.
    pub(crate) fn prototype_with(
        &mut self,
        term: &Term,
        map: &mut HashMap<Addr, u32>,
        vars: &mut Vec<Addr>,
    ) -> Result<Term, EngineError> {
        rebuild(self, term, |heap, t| {
            Ok(match heap.deref(t)? {
                Term::Var(addr) => {
                    let id = *map.entry(addr).or_insert_with(|| {
                        vars.push(addr);
                        (vars.len() - 1) as u32
                    });
                    Visit::Leaf(Term::reg(id))
                }
                Term::Compound(c) => Visit::Descend(c),
                other => Visit::Leaf(other),
            })
        })
    }
}

/// Highest register id occurring in `proto`, if any.
pub fn max_reg(proto: &Term) -> Option<u32> {
    let mut max = None;
    let mut pending = vec![proto];
    while let Some(term) = pending.pop() {
        match term {
            Term::Reg(id) => max = max.max(Some(id.index() as u32)),
            Term::Compound(c) => pending.extend(&c.args),
            _ => {}
        }
    }
    max
}
