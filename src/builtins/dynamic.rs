//! Dynamic markers.
//!
//! `/detalion#dynamic(X)` wraps a subterm that must stay symbolic while a
//! clause is being specialized. Index descent stops at a marker as if it
//! were a variable.

use super::add_any_mode;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::names;
use crate::term::Term;

pub(super) fn install(e: &mut Engine) -> Result<(), EngineError> {
    add_any_mode(e, "markDynamic", 2, mark)?;
    add_any_mode(e, "unmarkDynamic", 3, unmark)?;
    e.add_builtin("isDynamic", 3, &[("III", is_dynamic), ("OII", is_dynamic)])?;
    Ok(())
}

fn marked_inner(term: &Term) -> Option<&Term> {
    match term {
        Term::Compound(c) if c.is_dynamic_marker() => Some(&c.args[0]),
        _ => None,
    }
}

/// `markDynamic(Term, Marked)`; an already marked term is not wrapped again.
fn mark(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let marked = match marked_inner(&args[0]) {
        Some(_) => args[0].clone(),
        None => Term::compound(names::DYNAMIC, vec![args[0].clone()]),
    };
    e.unify_or_fail(&args[1], &marked)
}

/// `unmarkDynamic(Marked, Term, WasMarked)`.
fn unmark(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let (inner, was_marked) = match marked_inner(&args[0]) {
        Some(inner) => (inner.clone(), names::STR_TRUE),
        None => (args[0].clone(), names::STR_FALSE),
    };
    if !e.unify(&args[1], &inner)? {
        e.fail();
        return Ok(());
    }
    e.unify_or_fail(&args[2], &Term::atom(was_marked))
}

/// `isDynamic(Term, Then, Else)`.
fn is_dynamic(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let branch = if marked_inner(&args[0]).is_some() {
        &args[1]
    } else {
        &args[2]
    };
    e.push(branch.clone())
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::names::{self, qualified};
    use crate::term::Term;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    fn g(name: &str, args: Vec<Term>) -> Term {
        Term::compound(&qualified(name), args)
    }

    #[test]
    fn mark_then_unmark_round_trips() {
        let mut e = engine();
        let m = e.var().unwrap();
        assert!(e.call(&g("markDynamic", vec![Term::int(3), m.clone()])).unwrap());
        let marked = e.resolve(&m).unwrap();
        assert_eq!(marked, Term::compound(names::DYNAMIC, vec![Term::int(3)]));

        let again = e.var().unwrap();
        assert!(e.call(&g("markDynamic", vec![marked.clone(), again.clone()])).unwrap());
        assert_eq!(e.resolve(&again).unwrap(), marked);

        let t = e.var().unwrap();
        let w = e.var().unwrap();
        assert!(e.call(&g("unmarkDynamic", vec![marked, t.clone(), w.clone()])).unwrap());
        assert_eq!(e.resolve(&t).unwrap(), Term::int(3));
        assert_eq!(e.resolve(&w).unwrap(), Term::atom("true"));
    }

    #[test]
    fn unmark_of_plain_term_reports_false() {
        let mut e = engine();
        let t = e.var().unwrap();
        let w = e.var().unwrap();
        assert!(e.call(&g("unmarkDynamic", vec!["x".into(), t.clone(), w.clone()])).unwrap());
        assert_eq!(e.resolve(&t).unwrap(), Term::atom("x"));
        assert_eq!(e.resolve(&w).unwrap(), Term::atom("false"));
    }

    #[test]
    fn is_dynamic_selects_branch() {
        let mut e = engine();
        let yes = g("true", vec![]);
        let no = g("fail", vec![]);
        let marked = Term::compound(names::DYNAMIC, vec![Term::int(1)]);
        assert!(e.call(&g("isDynamic", vec![marked, yes.clone(), no.clone()])).unwrap());
        assert!(!e.call(&g("isDynamic", vec![Term::int(1), yes, no])).unwrap());
    }
}
