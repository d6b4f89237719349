//! Detalion: a committed-choice logic-programming engine.
//!
//! Programs are sets of `clause(Head, Body)` statements over first-order
//! terms. The engine resolves goals against the unique most specific clause
//! found through a trie index on the left spine of each term, so a
//! well-formed program is deterministic by construction: there is no
//! backtracking over alternative clauses, only the explicit choice points
//! opened by control builtins such as `if/3` and `eval/4`.
//!
//! The crate provides:
//! - a WAM-style heap with a trail and LIFO choice points ([`heap`]),
//! - unification and prototype instantiation ([`unify`], [`prototype`]),
//! - the trie-indexed clause database ([`database`]),
//! - the resolution loop and builtin registry ([`engine`], [`builtins`]),
//! - optional just-in-time clause specialization ([`specialize`]).
//!
//! # Names
//! Engine-reserved symbols live in the `/detalion#` namespace; see [`names`].
//!
//! # Example
//!
//! ```
//! use detalion::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! // double(X, Y) :- plus(X, X, Y)
//! engine.store_clause(&Clause::new(
//!     Term::compound("double", vec![Term::reg(0), Term::reg(1)]),
//!     Term::compound(&names::qualified("plus"), vec![Term::reg(0), Term::reg(0), Term::reg(1)]),
//! ));
//! let y = engine.var().unwrap();
//! assert!(engine.call(&Term::compound("double", vec![Term::int(21), y.clone()])).unwrap());
//! assert_eq!(engine.resolve(&y).unwrap(), Term::int(42));
//! ```

pub mod arena;
pub mod builtins;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod heap;
pub mod names;
pub mod program;
pub mod prototype;
pub mod specialize;
pub mod term;
pub mod unify;

pub use config::{EngineConfig, SpecializationConfig};
pub use database::{ClauseId, Database};
pub use engine::{BuiltinFn, Engine};
pub use error::{ConfigError, EngineError, ProgramError};
pub use heap::{ChoicePoint, Heap};
pub use program::Program;
pub use term::{Clause, Term};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::config::{EngineConfig, SpecializationConfig};
    pub use crate::database::{Bucket, ClauseId, Database, Match, Selection};
    pub use crate::engine::{BuiltinFn, Engine};
    pub use crate::error::{ConfigError, EngineError, ProgramError};
    pub use crate::fingerprint::{term_hash, Canonicalizable, HashValue};
    pub use crate::heap::{ChoicePoint, Heap};
    pub use crate::names;
    pub use crate::program::Program;
    pub use crate::prototype::{mode_from_str, Registers};
    pub use crate::specialize::Specializer;
    pub use crate::term::{Addr, Clause, FunctorKey, Number, RegId, Term};
}
