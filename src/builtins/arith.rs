//! Arithmetic builtins.
//!
//! With all three arguments bound the operation is checked; with only the
//! result unbound it is computed. Integer arithmetic is overflow-checked and
//! an inexact integer division yields a float.

use super::number;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::term::{Number, Term};

type Op = fn(&'static str, Number, Number) -> Result<Number, EngineError>;

pub(super) fn install(e: &mut Engine) -> Result<(), EngineError> {
    e.add_builtin("plus", 3, &[("IIO", plus_solve), ("III", plus_check)])?;
    e.add_builtin("minus", 3, &[("IIO", minus_solve), ("III", minus_check)])?;
    e.add_builtin("mult", 3, &[("IIO", mult_solve), ("III", mult_check)])?;
    e.add_builtin("div", 3, &[("IIO", div_solve), ("III", div_check)])?;
    e.add_builtin("lt", 2, &[("II", lt)])?;
    Ok(())
}

fn overflow(predicate: &'static str) -> EngineError {
    EngineError::Arithmetic {
        predicate,
        message: "integer overflow".to_string(),
    }
}

fn add(predicate: &'static str, a: Number, b: Number) -> Result<Number, EngineError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            x.checked_add(y).map(Number::Int).ok_or_else(|| overflow(predicate))
        }
        (a, b) => Ok(Number::Float(a.as_f64() + b.as_f64())),
    }
}

fn sub(predicate: &'static str, a: Number, b: Number) -> Result<Number, EngineError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            x.checked_sub(y).map(Number::Int).ok_or_else(|| overflow(predicate))
        }
        (a, b) => Ok(Number::Float(a.as_f64() - b.as_f64())),
    }
}

fn mul(predicate: &'static str, a: Number, b: Number) -> Result<Number, EngineError> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            x.checked_mul(y).map(Number::Int).ok_or_else(|| overflow(predicate))
        }
        (a, b) => Ok(Number::Float(a.as_f64() * b.as_f64())),
    }
}

fn quot(predicate: &'static str, a: Number, b: Number) -> Result<Number, EngineError> {
    if b.as_f64() == 0.0 {
        return Err(EngineError::Arithmetic {
            predicate,
            message: "division by zero".to_string(),
        });
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) if x.checked_rem(y) == Some(0) => {
            x.checked_div(y).map(Number::Int).ok_or_else(|| overflow(predicate))
        }
        (a, b) => Ok(Number::Float(a.as_f64() / b.as_f64())),
    }
}

fn solve(e: &mut Engine, args: &[Term], predicate: &'static str, op: Op) -> Result<(), EngineError> {
    let a = number(predicate, &args[0])?;
    let b = number(predicate, &args[1])?;
    let result = op(predicate, a, b)?;
    e.bind(&args[2], Term::Num(result))
}

fn check(e: &mut Engine, args: &[Term], predicate: &'static str, op: Op) -> Result<(), EngineError> {
    let a = number(predicate, &args[0])?;
    let b = number(predicate, &args[1])?;
    let expected = number(predicate, &args[2])?;
    if op(predicate, a, b)? != expected {
        e.fail();
    }
    Ok(())
}

fn plus_solve(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    solve(e, args, "plus", add)
}

fn plus_check(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    check(e, args, "plus", add)
}

fn minus_solve(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    solve(e, args, "minus", sub)
}

fn minus_check(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    check(e, args, "minus", sub)
}

fn mult_solve(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    solve(e, args, "mult", mul)
}

fn mult_check(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    check(e, args, "mult", mul)
}

fn div_solve(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    solve(e, args, "div", quot)
}

fn div_check(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    check(e, args, "div", quot)
}

fn lt(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let a = number("lt", &args[0])?;
    let b = number("lt", &args[1])?;
    if a >= b || a.as_f64().is_nan() || b.as_f64().is_nan() {
        e.fail();
    }
    Ok(())
}
