//! Reserved symbols.
//!
//! Engine-level predicates live in the `/detalion#` namespace so they cannot
//! collide with user predicates. List and typed-term functors are unprefixed.

/// Namespace prefix for engine predicates.
pub const PREFIX: &str = "/detalion#";

/// Tag of stored clauses: `clause(Head, Body)`.
pub const CLAUSE: &str = "/detalion#clause";
pub const TRUE: &str = "/detalion#true";
pub const FAIL: &str = "/detalion#fail";
pub const CONJ: &str = "/detalion#conj";
pub const IF: &str = "/detalion#if";
pub const THEN_ELSE: &str = "/detalion#__thenElse";
pub const EVAL: &str = "/detalion#eval";
pub const EVAL_TERM: &str = "/detalion#__evalTerm";
pub const ERROR: &str = "/detalion#error";
pub const UNDEFINED_MODE: &str = "/detalion#undefinedMode";
pub const EQUALS_FACT: &str = "/detalion#=";

/// Wrapper marking a subterm that must stay symbolic during specialization.
pub const DYNAMIC: &str = "/detalion#dynamic";

/// Default partial-evaluation predicate: `lift(Clause, Specialized, Auxiliaries)`.
pub const LIFT: &str = "/detalion#lift";

/// List cell `'.'(Head, Tail)`.
pub const CONS: &str = ".";
/// Empty list `'[]'` (a zero-arity compound).
pub const NIL: &str = "[]";
/// Typed term `'::'(Term, Type)`.
pub const TYPED: &str = "::";

/// Placeholder for "any" in index patterns.
pub const WILDCARD: &str = "_";

pub const STR_TRUE: &str = "true";
pub const STR_FALSE: &str = "false";

/// Qualifies a local predicate name with [`PREFIX`].
pub fn qualified(local: &str) -> String {
    format!("{PREFIX}{local}")
}
