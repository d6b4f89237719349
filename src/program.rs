//! Program source.
//!
//! A program is a list of statements already in prototype form. Two
//! encodings are supported:
//!
//! - **JSON source**: an array of statements where a compound is an array
//!   whose first element is the functor name (`["f", 1, "a"]`), strings and
//!   numbers are atomic, and `{"id": n}` is placeholder register `n`. A
//!   statement that is not a `clause/2` term is stored as a fact.
//! - **Program image**: the decoded statements serialized with CBOR, for
//!   loading without re-parsing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::engine::Engine;
use crate::error::ProgramError;
use crate::fingerprint::{Canonicalizable, HashValue};
use crate::term::{Clause, Term};

/// Domain tag for whole-program digests.
pub const DOMAIN_PROGRAM_V0: &[u8] = b"PROGRAM_V0";

/// An ordered list of statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    statements: Vec<Term>,
}

impl Program {
    pub fn new(statements: Vec<Term>) -> Self {
        Self { statements }
    }

    /// Parses JSON program source.
    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Array(items) = value else {
            return Err(ProgramError::Encoding(
                "program must be an array of statements".to_string(),
            ));
        };
        let statements = items
            .iter()
            .map(|item| term_from_json(item).map(Clause::statement_of))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(statements = statements.len(), "parsed program source");
        Ok(Self { statements })
    }

    pub fn statements(&self) -> &[Term] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn push(&mut self, statement: Term) {
        self.statements.push(Clause::statement_of(statement));
    }

    /// Digest of the statements in order.
    pub fn digest(&self) -> HashValue {
        let mut bytes = Vec::new();
        for statement in &self.statements {
            bytes.extend_from_slice(&statement.to_canonical_bytes());
        }
        HashValue::hash_with_domain(DOMAIN_PROGRAM_V0, &bytes)
    }

    /// Serialize to a CBOR program image.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ProgramError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Deserialize from a CBOR program image.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ProgramError> {
        let program: Self = serde_cbor::from_slice(bytes)?;
        if let Some(bad) = program.statements.iter().find(|t| contains_runtime_term(t)) {
            return Err(ProgramError::Encoding(format!(
                "program image holds a runtime term in {bad}"
            )));
        }
        Ok(program)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ProgramError> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ProgramError> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }
}

impl IntoIterator for Program {
    type Item = Term;
    type IntoIter = std::vec::IntoIter<Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

impl Engine {
    /// Stores every statement of `program`.
    pub fn load_program(&mut self, program: &Program) {
        self.load(program.statements.iter().cloned());
    }
}

/// Decodes a single JSON term.
pub fn term_from_json(value: &Value) -> Result<Term, ProgramError> {
    match value {
        Value::String(s) => Ok(Term::atom(s)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Term::int(i))
            } else if let Some(x) = n.as_f64() {
                Ok(Term::float(x))
            } else {
                Err(ProgramError::Encoding(n.to_string()))
            }
        }
        Value::Array(items) => {
            let Some((Value::String(functor), args)) = items.split_first() else {
                return Err(ProgramError::Encoding(value.to_string()));
            };
            let args = args
                .iter()
                .map(term_from_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Term::compound(functor, args))
        }
        Value::Object(fields) => match fields.get("id").and_then(Value::as_u64) {
            Some(id) if fields.len() == 1 => u32::try_from(id)
                .map(Term::reg)
                .map_err(|_| ProgramError::Encoding(value.to_string())),
            _ => Err(ProgramError::Encoding(value.to_string())),
        },
        Value::Null | Value::Bool(_) => Err(ProgramError::Encoding(value.to_string())),
    }
}

/// Heap variables and choice points have no meaning outside a running
/// engine.
fn contains_runtime_term(term: &Term) -> bool {
    let mut pending = vec![term];
    while let Some(term) = pending.pop() {
        match term {
            Term::Var(_) | Term::Choice(_) => return true,
            Term::Compound(c) => pending.extend(&c.args),
            _ => {}
        }
    }
    false
}
