//! Error taxonomy for the engine.
//!
//! Logical failure is not an error: it is carried by the engine's failure flag
//! and surfaces as `Ok(false)` from [`crate::Engine::call`]. Everything in this
//! module halts resolution.

use std::fmt;
use thiserror::Error;

use crate::term::Addr;

/// Fixed-capacity arenas owned by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arena {
    /// Term cells.
    Heap,
    /// Undo log entries.
    Trail,
    /// Pending goals.
    GoalStack,
}

impl fmt::Display for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arena::Heap => write!(f, "heap"),
            Arena::Trail => write!(f, "trail"),
            Arena::GoalStack => write!(f, "goal stack"),
        }
    }
}

/// Fatal conditions raised while loading or resolving.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// More than one equally specific clause matches a goal.
    #[error("ambiguous goal {goal}: {} equally specific clauses", clauses.len())]
    AmbiguousClause {
        /// The goal being resolved.
        goal: String,
        /// The competing stored statements.
        clauses: Vec<String>,
    },

    /// A builtin was called with an instantiation pattern it does not implement.
    #[error("undefined mode for predicate {predicate}")]
    UndefinedMode { predicate: String },

    /// Raised by the `error/1` predicate.
    #[error("{message}")]
    User {
        message: String,
        /// Goals that were still pending, top of stack first.
        pending: Vec<String>,
    },

    #[error("{arena} capacity of {capacity} exceeded")]
    CapacityExceeded { arena: Arena, capacity: usize },

    #[error("type error in {predicate}: expected {expected}, found {found}")]
    Type {
        predicate: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("arithmetic error in {predicate}: {message}")]
    Arithmetic {
        predicate: &'static str,
        message: String,
    },

    /// A stored statement selected for resolution is not `clause(Head, Body)`.
    #[error("malformed statement: {0}")]
    MalformedStatement(String),

    /// A variable refers past the heap top (e.g. it outlived a rollback).
    #[error("invalid heap address {0}")]
    InvalidAddress(Addr),

    /// A choice point was resolved after a later one had already reclaimed its state.
    #[error("choice point resolved out of order")]
    ChoicePointOrder,

    /// `storeBuiltin` did not find exactly one generic clause for its pattern.
    #[error("builtin pattern {pattern} matches {matches} clauses, expected exactly one")]
    BuiltinTarget { pattern: String, matches: usize },
}

impl EngineError {
    pub(crate) fn type_error(
        predicate: &'static str,
        expected: &'static str,
        found: &impl fmt::Display,
    ) -> Self {
        EngineError::Type {
            predicate,
            expected,
            found: found.to_string(),
        }
    }
}

/// Errors raised while decoding or persisting program source.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("invalid JSON program: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid program image: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON value has no term encoding.
    #[error("cannot decode term from {0}")]
    Encoding(String),
}

/// Errors raised while reading an [`crate::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("specialization threshold must be at least 1")]
    ZeroThreshold,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_names_the_arena() {
        let err = EngineError::CapacityExceeded {
            arena: Arena::Trail,
            capacity: 8,
        };
        assert_eq!(err.to_string(), "trail capacity of 8 exceeded");
    }

    #[test]
    fn ambiguity_message_counts_clauses() {
        let err = EngineError::AmbiguousClause {
            goal: "p(_G0)".to_string(),
            clauses: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "ambiguous goal p(_G0): 2 equally specific clauses");
    }
}
