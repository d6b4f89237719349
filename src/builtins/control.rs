//! Control builtins: sequencing, the committed conditional, sandboxed
//! evaluation and error signalling.

use tracing::debug;

use super::{choice, text};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::names;
use crate::term::Term;

pub(super) fn install(e: &mut Engine) -> Result<(), EngineError> {
    e.add_builtin("true", 0, &[("", succeed)])?;
    e.add_builtin("fail", 0, &[("", fail)])?;
    e.add_builtin("conj", 2, &[("II", conj)])?;
    e.add_builtin("if", 3, &[("III", if_then_else)])?;
    e.add_builtin("__thenElse", 3, &[("III", then_else)])?;
    e.add_builtin(
        "eval",
        4,
        &[("IIIO", eval), ("IOIO", eval), ("IIOO", eval), ("IOOO", eval)],
    )?;
    e.add_builtin(
        "__evalTerm",
        4,
        &[
            ("IIOI", eval_term),
            ("OIOI", eval_term),
            ("IOOI", eval_term),
            ("OOOI", eval_term),
        ],
    )?;
    e.add_builtin("error", 1, &[("I", raise)])?;
    e.add_builtin("undefinedMode", 2, &[("II", undefined_mode)])?;
    e.add_builtin("debug", 2, &[("II", debug_value), ("IO", debug_value)])?;
    Ok(())
}

fn succeed(_: &mut Engine, _: &[Term]) -> Result<(), EngineError> {
    Ok(())
}

fn fail(e: &mut Engine, _: &[Term]) -> Result<(), EngineError> {
    e.fail();
    Ok(())
}

fn conj(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    e.push(args[1].clone())?;
    e.push(args[0].clone())
}

/// `if(Cond, Then, Else)`: runs `Cond` under a choice point, leaving the
/// decision to the `__thenElse` continuation.
fn if_then_else(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let cp = e.create_choice_point();
    e.push(Term::compound(
        names::THEN_ELSE,
        vec![args[1].clone(), args[2].clone(), Term::Choice(cp)],
    ))?;
    e.push(args[0].clone())
}

fn then_else(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let cp = choice("__thenElse", &args[2])?;
    if e.take_failure() {
        e.rollback_choice_point(&cp)?;
        e.push(args[1].clone())
    } else {
        e.commit_choice_point(&cp);
        e.push(args[0].clone())
    }
}

/// `eval(Goal, Term, Type, Result)`: runs `Goal`, then binds `Result` to the
/// value of `Term` with every heap effect of `Goal` undone.
fn eval(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let cp = e.create_choice_point();
    e.push(Term::compound(
        names::EVAL_TERM,
        vec![
            args[1].clone(),
            args[2].clone(),
            args[3].clone(),
            Term::Choice(cp),
        ],
    ))?;
    e.push(args[0].clone())
}

fn eval_term(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let cp = choice("__evalTerm", &args[3])?;
    let value = e.resolve(&args[0])?;
    let failed = e.take_failure();
    e.rollback_choice_point(&cp)?;
    let value = e.reattach(&value, cp.heap_top)?;
    e.bind(&args[2], value)?;
    if failed {
        e.fail();
    }
    Ok(())
}

fn raise(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let message = match &args[0] {
        Term::Str(s) => s.to_string(),
        other => e.resolve(other)?.to_string(),
    };
    Err(EngineError::User {
        message,
        pending: e.pending_goals()?,
    })
}

fn undefined_mode(_: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let name = text("undefinedMode", &args[0])?;
    Err(EngineError::UndefinedMode {
        predicate: format!("{name}/{}", args[1]),
    })
}

fn debug_value(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let title = e.resolve(&args[0])?;
    let value = e.resolve(&args[1])?;
    debug!(title = %title, value = %value, "debug/2");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::error::EngineError;
    use crate::names::{self, qualified};
    use crate::term::Term;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    fn g(name: &str, args: Vec<Term>) -> Term {
        Term::compound(&qualified(name), args)
    }

    fn t() -> Term {
        g("true", vec![])
    }

    fn f() -> Term {
        g("fail", vec![])
    }

    fn eq(a: Term, b: Term) -> Term {
        Term::compound(names::EQUALS_FACT, vec![a, b])
    }

    #[test]
    fn conj_sequences_goals() {
        let mut e = engine();
        assert!(!e.call(&g("conj", vec![t(), f()])).unwrap());
        assert!(e.call(&g("conj", vec![t(), t()])).unwrap());
    }

    #[test]
    fn failed_guard_leaves_no_bindings() {
        let mut e = engine();
        let x = e.var().unwrap();
        let y = e.var().unwrap();
        let guard = g("conj", vec![eq(x.clone(), Term::int(1)), f()]);
        let goal = g("if", vec![guard, t(), eq(y.clone(), Term::atom("else"))]);
        assert!(e.call(&goal).unwrap());
        assert!(e.resolve(&x).unwrap().is_var());
        assert_eq!(e.resolve(&y).unwrap(), Term::atom("else"));
    }

    #[test]
    fn successful_guard_keeps_bindings() {
        let mut e = engine();
        let x = e.var().unwrap();
        let y = e.var().unwrap();
        let goal = g(
            "if",
            vec![eq(x.clone(), Term::int(1)), eq(y.clone(), Term::int(2)), f()],
        );
        assert!(e.call(&goal).unwrap());
        assert_eq!(e.resolve(&x).unwrap(), Term::int(1));
        assert_eq!(e.resolve(&y).unwrap(), Term::int(2));
    }

    #[test]
    fn nested_conditionals_roll_back_inner_guards() {
        let mut e = engine();
        let x = e.var().unwrap();
        let y = e.var().unwrap();
        let inner = g(
            "if",
            vec![g("conj", vec![eq(y.clone(), Term::int(9)), f()]), t(), f()],
        );
        let outer = g(
            "if",
            vec![
                g("conj", vec![eq(x.clone(), Term::int(1)), inner]),
                t(),
                t(),
            ],
        );
        assert!(e.call(&outer).unwrap());
        assert!(e.resolve(&x).unwrap().is_var());
        assert!(e.resolve(&y).unwrap().is_var());
    }

    #[test]
    fn failing_else_branch_fails_the_call() {
        let mut e = engine();
        assert!(!e.call(&g("if", vec![f(), t(), f()])).unwrap());
        assert!(e.call(&g("if", vec![f(), f(), t()])).unwrap());
    }

    #[test]
    fn eval_returns_value_without_side_effects() {
        let mut e = engine();
        let x = e.var().unwrap();
        let y = e.var().unwrap();
        let r = e.var().unwrap();
        let term = Term::compound("pair", vec![x.clone(), y.clone()]);
        let goal = eq(x.clone(), Term::int(3));
        assert!(e
            .call(&g("eval", vec![goal, term, Term::atom("ty"), r.clone()]))
            .unwrap());
        assert!(e.resolve(&x).unwrap().is_var());
        let value = e.resolve(&r).unwrap();
        let Term::Compound(c) = &value else { panic!("expected pair/2") };
        assert_eq!(c.args[0], Term::int(3));
        assert_eq!(c.args[1], y);
    }

    #[test]
    fn eval_of_failing_goal_fails() {
        let mut e = engine();
        let r = e.var().unwrap();
        assert!(!e
            .call(&g("eval", vec![f(), Term::int(1), Term::atom("ty"), r]))
            .unwrap());
    }

    #[test]
    fn error_carries_message_and_pending_goals() {
        let mut e = engine();
        let goal = g("conj", vec![g("error", vec![Term::atom("boom")]), t()]);
        match e.call(&goal).unwrap_err() {
            EngineError::User { message, pending } => {
                assert_eq!(message, "boom");
                assert_eq!(pending, vec![qualified("true")]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn debug_succeeds() {
        let mut e = engine();
        let v = e.var().unwrap();
        assert!(e.call(&g("debug", vec![Term::atom("title"), v])).unwrap());
    }
}
