//! Dereference, unification and structure copying over heap terms.
//!
//! Every walk uses an explicit worklist, or [`rebuild`] when it produces a
//! new term, so that long lists do not grow the native stack.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::heap::Heap;
use crate::names;
use crate::term::{rebuild, Addr, Term, Visit};

impl Heap {
    /// Follows variable links to a fixed point.
    ///
    /// Intermediate cells on a chain of two or more links are rewritten to
    /// hold the final value directly. Those writes go through
    /// [`Heap::bind`], so cells below the barrier are trailed.
    pub fn deref(&mut self, term: &Term) -> Result<Term, EngineError> {
        let Term::Var(start) = term else {
            return Ok(term.clone());
        };
        let mut path: Vec<Addr> = Vec::new();
        let mut cur = *start;
        let value = loop {
            match self.cell(cur)? {
                Term::Var(next) if *next == cur => break Term::Var(cur),
                Term::Var(next) => {
                    path.push(cur);
                    cur = *next;
                }
                other => break other.clone(),
            }
        };
        for addr in path {
            let current = self.cell(addr)?;
            let shortened = matches!((current, &value), (Term::Var(a), Term::Var(b)) if a == b);
            if !shortened {
                self.bind(addr, value.clone())?;
            }
        }
        Ok(value)
    }

    /// Unifies two terms, binding whichever side is an unbound variable.
    ///
    /// Returns `Ok(false)` on the first mismatch. Bindings made before the
    /// mismatch are left in place; callers undo them by rolling back a
    /// choice point.
    pub fn unify(&mut self, left: &Term, right: &Term) -> Result<bool, EngineError> {
        let mut pending = vec![(left.clone(), right.clone())];
        while let Some((l, r)) = pending.pop() {
            let l = self.deref(&l)?;
            let r = self.deref(&r)?;
            match (&l, &r) {
                (Term::Var(a), Term::Var(b)) if a == b => {}
                (Term::Var(a), _) => self.bind(*a, r.clone())?,
                (_, Term::Var(b)) => self.bind(*b, l.clone())?,
                (Term::Compound(a), Term::Compound(b)) => {
                    if a.functor != b.functor || a.args.len() != b.args.len() {
                        return Ok(false);
                    }
                    // Reverse push keeps left-to-right evaluation order.
                    for (x, y) in a.args.iter().zip(b.args.iter()).rev() {
                        pending.push((x.clone(), y.clone()));
                    }
                }
                _ => {
                    if !l.atomic_eq(&r) {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Substitutes every bound variable in `term` by its value.
    ///
    /// Unbound variables remain as `Term::Var`.
    pub fn resolve(&mut self, term: &Term) -> Result<Term, EngineError> {
        rebuild(self, term, |heap, t| {
            Ok(match heap.deref(t)? {
                Term::Compound(c) => Visit::Descend(c),
                other => Visit::Leaf(other),
            })
        })
    }

    /// Duplicates `term`, replacing each distinct variable by a fresh one.
    ///
    /// `map` records the renaming so that several calls can share it; a
    /// variable occurring twice in the source occurs twice in the copy.
    pub fn copy_term(
        &mut self,
        term: &Term,
        map: &mut HashMap<Addr, Term>,
    ) -> Result<Term, EngineError> {
        rebuild(self, term, |heap, t| {
            Ok(match heap.deref(t)? {
                Term::Var(addr) => Visit::Leaf(heap.renamed(addr, map)?),
                Term::Compound(c) => Visit::Descend(c),
                other => Visit::Leaf(other),
            })
        })
    }

    /// Replaces variables at or above `boundary` by fresh cells.
    ///
    /// Used after a rollback to give a resolved result its own variables when
    /// the cells it referred to have been reclaimed.
    pub(crate) fn reattach(
        &mut self,
        term: &Term,
        boundary: usize,
        map: &mut HashMap<Addr, Term>,
    ) -> Result<Term, EngineError> {
        rebuild(self, term, |heap, t| {
            Ok(match t {
                Term::Var(addr) if addr.index() >= boundary => Visit::Leaf(heap.renamed(*addr, map)?),
                Term::Compound(c) => Visit::Descend(c.clone()),
                other => Visit::Leaf(other.clone()),
            })
        })
    }

    fn renamed(&mut self, addr: Addr, map: &mut HashMap<Addr, Term>) -> Result<Term, EngineError> {
        if let Some(fresh) = map.get(&addr) {
            return Ok(fresh.clone());
        }
        let fresh = self.allocate()?;
        map.insert(addr, fresh.clone());
        Ok(fresh)
    }

    /// Structural equality where variables are equal only to themselves.
    pub fn terms_equal(&mut self, left: &Term, right: &Term) -> Result<bool, EngineError> {
        let mut pending = vec![(left.clone(), right.clone())];
        while let Some((l, r)) = pending.pop() {
            let l = self.deref(&l)?;
            let r = self.deref(&r)?;
            match (&l, &r) {
                (Term::Var(a), Term::Var(b)) => {
                    if a != b {
                        return Ok(false);
                    }
                }
                (Term::Compound(a), Term::Compound(b)) => {
                    if a.functor != b.functor || a.args.len() != b.args.len() {
                        return Ok(false);
                    }
                    for (x, y) in a.args.iter().zip(b.args.iter()) {
                        pending.push((x.clone(), y.clone()));
                    }
                }
                _ => {
                    if !l.atomic_eq(&r) {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Strips annotation wrappers whose functor starts with `family`.
    ///
    /// `family ++ "escape"` of arity 1 is replaced by its argument verbatim.
    /// Any other wrapper with at least one argument is replaced by its
    /// stripped first argument. Zero-arity wrappers are kept.
    pub fn remove_annotations(&mut self, term: &Term, family: &str) -> Result<Term, EngineError> {
        rebuild(self, term, |heap, t| {
            let c = match heap.deref(t)? {
                Term::Compound(c) => c,
                other => return Ok(Visit::Leaf(other)),
            };
            if !c.functor.starts_with(family) || c.args.is_empty() {
                return Ok(Visit::Descend(c));
            }
            if c.args.len() == 1 && &c.functor[family.len()..] == "escape" {
                return Ok(Visit::Leaf(heap.resolve(&c.args[0])?));
            }
            Ok(Visit::Replace(c.args[0].clone()))
        })
    }

    /// Collects the elements of a `'.'/2` list.
    ///
    /// Returns `None` when the list is partial or improper.
    pub fn list_items(&mut self, list: &Term) -> Result<Option<Vec<Term>>, EngineError> {
        let mut items = Vec::new();
        let mut cur = self.deref(list)?;
        loop {
            match &cur {
                Term::Compound(c) if c.is(names::CONS, 2) => {
                    items.push(c.args[0].clone());
                    let tail = c.args[1].clone();
                    cur = self.deref(&tail)?;
                }
                Term::Compound(c) if c.is(names::NIL, 0) => return Ok(Some(items)),
                _ => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::new(64, 64)
    }

    fn f(args: Vec<Term>) -> Term {
        Term::compound("f", args)
    }

    #[test]
    fn unify_binds_variable_side() {
        let mut h = heap();
        let x = h.allocate().unwrap();
        assert!(h.unify(&x, &Term::int(5)).unwrap());
        assert_eq!(h.deref(&x).unwrap(), Term::int(5));

        let y = h.allocate().unwrap();
        assert!(h.unify(&Term::atom("a"), &y).unwrap());
        assert_eq!(h.deref(&y).unwrap(), Term::atom("a"));
    }

    #[test]
    fn unify_compounds_argumentwise() {
        let mut h = heap();
        let x = h.allocate().unwrap();
        let y = h.allocate().unwrap();
        let left = f(vec![x.clone(), Term::int(2)]);
        let right = f(vec![Term::int(1), y.clone()]);
        assert!(h.unify(&left, &right).unwrap());
        assert_eq!(h.resolve(&left).unwrap(), f(vec![Term::int(1), Term::int(2)]));
    }

    #[test]
    fn unify_rejects_functor_and_arity_mismatch() {
        let mut h = heap();
        assert!(!h.unify(&f(vec![Term::int(1)]), &Term::compound("g", vec![Term::int(1)])).unwrap());
        assert!(!h.unify(&f(vec![Term::int(1)]), &f(vec![Term::int(1), Term::int(2)])).unwrap());
        assert!(!h.unify(&f(vec![]), &Term::atom("f")).unwrap());
    }

    #[test]
    fn deref_shortens_chains() {
        let mut h = heap();
        let a = h.allocate().unwrap();
        let b = h.allocate().unwrap();
        let c = h.allocate().unwrap();
        let (Term::Var(aa), Term::Var(bb)) = (&a, &b) else { unreachable!() };
        h.bind(*aa, b.clone()).unwrap();
        h.bind(*bb, c.clone()).unwrap();
        assert_eq!(h.deref(&a).unwrap(), c);
        assert_eq!(h.cell(*aa).unwrap(), &c);
    }

    #[test]
    fn copy_term_preserves_sharing() {
        let mut h = heap();
        let x = h.allocate().unwrap();
        let source = f(vec![x.clone(), x.clone(), Term::int(1)]);
        let copy = h.copy_term(&source, &mut HashMap::new()).unwrap();
        let Term::Compound(c) = &copy else { panic!("expected compound") };
        assert_eq!(c.args[0], c.args[1]);
        assert_ne!(c.args[0], x);
        assert_eq!(c.args[2], Term::int(1));
    }

    #[test]
    fn terms_equal_distinguishes_variables() {
        let mut h = heap();
        let x = h.allocate().unwrap();
        let y = h.allocate().unwrap();
        assert!(h.terms_equal(&f(vec![x.clone()]), &f(vec![x.clone()])).unwrap());
        assert!(!h.terms_equal(&f(vec![x.clone()]), &f(vec![y.clone()])).unwrap());
        // Comparison never binds.
        assert!(h.deref(&y).unwrap().is_var());
    }

    #[test]
    fn remove_annotations_unwraps_and_escapes() {
        let mut h = heap();
        let inner = Term::compound("ann:escape", vec![Term::compound("ann:note", vec![Term::int(1)])]);
        let term = Term::compound(
            "ann:comment",
            vec![f(vec![inner, Term::compound("ann:type", vec![Term::int(2), Term::atom("t")])]), Term::atom("c")],
        );
        let stripped = h.remove_annotations(&term, "ann:").unwrap();
        assert_eq!(
            stripped,
            f(vec![Term::compound("ann:note", vec![Term::int(1)]), Term::int(2)])
        );
    }

    #[test]
    fn long_lists_resolve_copy_and_strip_iteratively() {
        const N: i64 = 100_000;
        let mut h = Heap::new(1_000, 16);
        let x = h.allocate().unwrap();
        let items: Vec<Term> = (0..N)
            .map(|i| if i % 2 == 0 { x.clone() } else { Term::compound("ann:note", vec![Term::int(i)]) })
            .collect();
        let list = Term::list(items);
        let Term::Var(xa) = x else { unreachable!() };
        h.bind(xa, Term::int(-1)).unwrap();

        let resolved = h.resolve(&list).unwrap();
        let items = h.list_items(&resolved).unwrap().unwrap();
        assert_eq!(items.len(), N as usize);
        assert_eq!(items[0], Term::int(-1));

        let y = h.allocate().unwrap();
        let open = Term::list(vec![y.clone(); N as usize]);
        let copy = h.copy_term(&open, &mut HashMap::new()).unwrap();
        let copied = h.list_items(&copy).unwrap().unwrap();
        assert_eq!(copied.len(), N as usize);
        // One fresh cell for the one shared variable.
        assert!(copied.iter().all(|t| *t == copied[0]) && copied[0] != y);

        let stripped = h.remove_annotations(&list, "ann:").unwrap();
        let stripped = h.list_items(&stripped).unwrap().unwrap();
        assert_eq!(stripped[1], Term::int(1));
        assert_eq!(stripped[N as usize - 1], Term::int(N - 1));
    }

    #[test]
    fn list_items_reads_proper_lists_only() {
        let mut h = heap();
        let list = Term::list(vec![Term::int(1), Term::int(2)]);
        assert_eq!(h.list_items(&list).unwrap(), Some(vec![Term::int(1), Term::int(2)]));
        let tail = h.allocate().unwrap();
        let partial = Term::compound(".", vec![Term::int(1), tail]);
        assert_eq!(h.list_items(&partial).unwrap(), None);
    }
}
