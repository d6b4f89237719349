//! The builtin predicate surface.
//!
//! Every builtin lives in the `/detalion#` namespace and is registered through
//! [`Engine::add_builtin`] with one native handler per supported mode. A mode
//! string lists the arguments in order, `I` for bound and `O` for an unbound
//! variable at call time.

mod arith;
mod control;
mod database;
mod dynamic;
mod terms;
mod text;

use crate::engine::{BuiltinFn, Engine};
use crate::error::EngineError;
use crate::heap::ChoicePoint;
use crate::term::{Number, Term};

/// Installs the full builtin surface into a fresh engine.
pub(crate) fn install(engine: &mut Engine) -> Result<(), EngineError> {
    control::install(engine)?;
    arith::install(engine)?;
    text::install(engine)?;
    terms::install(engine)?;
    database::install(engine)?;
    dynamic::install(engine)?;
    Ok(())
}

/// Registers `handler` for every mode of `name/arity`.
pub(crate) fn add_any_mode(
    engine: &mut Engine,
    name: &str,
    arity: usize,
    handler: BuiltinFn,
) -> Result<(), EngineError> {
    let modes: Vec<String> = (0..1u32 << arity)
        .map(|bits| {
            (0..arity)
                .rev()
                .map(|pos| if bits & (1 << pos) != 0 { 'I' } else { 'O' })
                .collect()
        })
        .collect();
    let table: Vec<(&str, BuiltinFn)> = modes.iter().map(|m| (m.as_str(), handler)).collect();
    engine.add_builtin(name, arity, &table)
}

pub(crate) fn text<'a>(predicate: &'static str, term: &'a Term) -> Result<&'a str, EngineError> {
    term.as_str()
        .ok_or_else(|| EngineError::type_error(predicate, "string", term))
}

pub(crate) fn number(predicate: &'static str, term: &Term) -> Result<Number, EngineError> {
    term.as_number()
        .ok_or_else(|| EngineError::type_error(predicate, "number", term))
}

pub(crate) fn choice(predicate: &'static str, term: &Term) -> Result<ChoicePoint, EngineError> {
    match term {
        Term::Choice(cp) => Ok(*cp),
        other => Err(EngineError::type_error(predicate, "choice point", other)),
    }
}
