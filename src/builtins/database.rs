//! Reflective access to the clause database.

use crate::database::Selection;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::term::Term;

pub(super) fn install(e: &mut Engine) -> Result<(), EngineError> {
    e.add_builtin(
        "findAllMatches",
        2,
        &[("IO", find_all_matches), ("II", find_all_matches)],
    )?;
    e.add_builtin(
        "findMostSpecific",
        3,
        &[
            ("IOO", find_most_specific),
            ("IIO", find_most_specific),
            ("IOI", find_most_specific),
            ("III", find_most_specific),
        ],
    )?;
    Ok(())
}

/// `findAllMatches(Pattern, Matches)`: fresh instances of every stored
/// statement compatible with `Pattern`, most general first.
fn find_all_matches(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let matches = e.find_all_matches(&args[0])?;
    e.unify_or_fail(&args[1], &Term::list(matches))
}

/// `findMostSpecific(Pattern, Match, Alternatives)`.
///
/// `Alternatives` counts the statements stored below the point where a
/// dynamic marker stopped the descent, and is `0` otherwise. Fails unless
/// exactly one statement is most specific.
fn find_most_specific(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let descent = e.db.descend(&mut e.heap, &args[0])?;
    let Selection::One(matched) = e.db.select(&descent) else {
        e.fail();
        return Ok(());
    };
    let alternatives = match (descent.dynamic_stop, descent.terminal) {
        (true, Some(terminal)) => e.db.below(terminal).len(),
        _ => 0,
    };
    let instance = e.instantiate(matched.clause)?;
    if !e.unify(&args[1], &instance)? {
        e.fail();
        return Ok(());
    }
    e.unify_or_fail(&args[2], &Term::int(alternatives as i64))
}
