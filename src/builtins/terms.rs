//! Term inspection and construction builtins.

use std::collections::HashMap;

use super::{add_any_mode, text};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::names;
use crate::term::{Clause, Term};

pub(super) fn install(e: &mut Engine) -> Result<(), EngineError> {
    add_any_mode(e, "compound", 2, is_compound)?;
    add_any_mode(e, "var", 2, is_var)?;
    add_any_mode(e, "string", 2, is_string)?;
    add_any_mode(e, "number", 2, is_number)?;
    e.add_builtin(
        "parseTerm",
        3,
        &[
            ("IOO", decompose),
            ("IOI", decompose),
            ("IIO", decompose),
            ("OII", compose),
            ("III", compose),
        ],
    )?;
    add_any_mode(e, "equals", 3, equals)?;
    e.add_builtin(
        "copyTerm",
        3,
        &[
            ("IOI", copy_term),
            ("III", copy_term),
            ("IOO", copy_term),
            ("IIO", copy_term),
        ],
    )?;
    e.add_builtin(
        "removeAnnotations",
        3,
        &[
            ("IIO", remove_annotations),
            ("III", remove_annotations),
            ("OIO", remove_annotations),
            ("OII", remove_annotations),
        ],
    )?;
    e.store_clause(&Clause::fact(Term::compound(
        names::EQUALS_FACT,
        vec![Term::reg(0), Term::reg(0)],
    )));
    Ok(())
}

fn test(e: &mut Engine, holds: bool) -> Result<(), EngineError> {
    if !holds {
        e.fail();
    }
    Ok(())
}

fn is_compound(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    test(e, args[0].is_compound())
}

fn is_var(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    test(e, args[0].is_var())
}

fn is_string(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    test(e, matches!(args[0], Term::Str(_)))
}

fn is_number(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    test(e, matches!(args[0], Term::Num(_)))
}

/// Splits `'::'(Term, Type)` into a functor name and typed argument list.
fn decompose(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let inner = match args[0].as_compound() {
        Some(typed) if typed.is(names::TYPED, 2) => typed.args[0].clone(),
        _ => return Err(EngineError::type_error("parseTerm", "typed term", &args[0])),
    };
    let inner = e.heap_mut().deref(&inner)?;
    let Term::Compound(c) = &inner else {
        return Err(EngineError::type_error("parseTerm", "compound", &inner));
    };
    let mut typed_args = Vec::with_capacity(c.args.len());
    for arg in &c.args {
        typed_args.push(Term::typed(arg.clone(), e.var()?));
    }
    let name = Term::Str(c.functor.clone());
    if !e.unify(&args[1], &name)? {
        e.fail();
        return Ok(());
    }
    e.unify_or_fail(&args[2], &Term::list(typed_args))
}

/// Builds `'::'(Name(Args...), Type)` from a name and a typed argument list.
fn compose(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let name = text("parseTerm", &args[1])?.to_string();
    let items = e
        .heap_mut()
        .list_items(&args[2])?
        .ok_or_else(|| EngineError::type_error("parseTerm", "list", &args[2]))?;
    let mut plain = Vec::with_capacity(items.len());
    for item in &items {
        let item = e.heap_mut().deref(item)?;
        match item.as_compound() {
            Some(typed) if typed.is(names::TYPED, 2) => plain.push(typed.args[0].clone()),
            _ => return Err(EngineError::type_error("parseTerm", "typed term", &item)),
        }
    }
    let built = Term::typed(Term::compound(&name, plain), e.var()?);
    e.unify_or_fail(&args[0], &built)
}

fn equals(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let same = e.heap_mut().terms_equal(&args[0], &args[1])?;
    test(e, same)
}

fn copy_term(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let copy = e.heap_mut().copy_term(&args[0], &mut HashMap::new())?;
    e.unify_or_fail(&args[1], &copy)
}

fn remove_annotations(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let family = text("removeAnnotations", &args[1])?.to_string();
    let stripped = e.heap_mut().remove_annotations(&args[0], &family)?;
    e.unify_or_fail(&args[2], &stripped)
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
    fn type_tests_classify_terms() {
        let mut e = engine();
        let ty = Term::atom("ty");
        let f = Term::compound("f", vec![Term::int(1)]);
        assert!(e.call(&g("compound", vec![f.clone(), ty.clone()])).unwrap());
        assert!(!e.call(&g("compound", vec![Term::int(1), ty.clone()])).unwrap());
        assert!(e.call(&g("string", vec!["s".into(), ty.clone()])).unwrap());
        assert!(!e.call(&g("string", vec![f, ty.clone()])).unwrap());
        let t = e.var().unwrap();
        assert!(e.call(&g("number", vec![Term::float(1.5), t])).unwrap());
        let x = e.var().unwrap();
        assert!(!e.call(&g("number", vec![x, ty])).unwrap());
    }

    #[test]
    fn parse_term_decomposes_typed_compounds() {
        let mut e = engine();
        let ty = e.var().unwrap();
        let typed = Term::typed(Term::compound("f", vec![Term::int(1), Term::atom("a")]), ty);
        let name = e.var().unwrap();
        let args = e.var().unwrap();
        assert!(e.call(&g("parseTerm", vec![typed, name.clone(), args.clone()])).unwrap());
        assert_eq!(e.resolve(&name).unwrap(), Term::atom("f"));
        let items = e.heap_mut().list_items(&args).unwrap().unwrap();
        assert_eq!(items.len(), 2);
        let first = e.resolve(&items[0]).unwrap();
        let Term::Compound(c) = &first else { panic!("expected typed arg") };
        assert!(c.is(names::TYPED, 2));
        assert_eq!(c.args[0], Term::int(1));
    }

    #[test]
    fn parse_term_composes_from_name_and_arguments() {
        let mut e = engine();
        let t1 = e.var().unwrap();
        let args = Term::list(vec![Term::typed(Term::int(7), t1)]);
        let out = e.var().unwrap();
        assert!(e.call(&g("parseTerm", vec![out.clone(), "g".into(), args])).unwrap());
        let built = e.resolve(&out).unwrap();
        let Term::Compound(c) = &built else { panic!("expected typed term") };
        assert_eq!(c.args[0], Term::compound("g", vec![Term::int(7)]));
    }

    #[test]
    fn equals_compares_without_binding() {
        let mut e = engine();
        let x = e.var().unwrap();
        let y = e.var().unwrap();
        let ty = Term::atom("ty");
        assert!(e.call(&g("equals", vec![x.clone(), x.clone(), ty.clone()])).unwrap());
        assert!(!e.call(&g("equals", vec![x.clone(), y.clone(), ty])).unwrap());
        assert!(e.resolve(&x).unwrap().is_var());
    }

    #[test]
    fn copy_term_renames_variables() {
        let mut e = engine();
        let x = e.var().unwrap();
        let src = Term::compound("f", vec![x.clone(), x.clone()]);
        let out = e.var().unwrap();
        assert!(e.call(&g("copyTerm", vec![src, out.clone(), Term::atom("ty")])).unwrap());
        let copy = e.resolve(&out).unwrap();
        let Term::Compound(c) = &copy else { panic!("expected f/2") };
        assert_eq!(c.args[0], c.args[1]);
        assert_ne!(c.args[0], x);
    }

    #[test]
    fn remove_annotations_strips_family() {
        let mut e = engine();
        let term = Term::compound(
            "f",
            vec![Term::compound("@comment", vec![Term::int(1), "note".into()])],
        );
        let out = e.var().unwrap();
        assert!(e
            .call(&g("removeAnnotations", vec![term, "@".into(), out.clone()]))
            .unwrap());
        assert_eq!(e.resolve(&out).unwrap(), Term::compound("f", vec![Term::int(1)]));
    }

    #[test]
    fn unification_fact_binds_both_ways() {
        let mut e = engine();
        let x = e.var().unwrap();
        assert!(e.call(&Term::compound(names::EQUALS_FACT, vec![Term::int(4), x.clone()])).unwrap());
        assert_eq!(e.resolve(&x).unwrap(), Term::int(4));
    }
}
