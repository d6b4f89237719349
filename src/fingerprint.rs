//! Deterministic structural hashing of terms.
//!
//! Terms are serialized to a canonical, length-prefixed byte form and hashed
//! with SHA-256 under a domain tag. Two prototypes that differ only in their
//! register numbering hash differently, so callers canonicalize with
//! [`crate::Heap::to_prototype`] first.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::term::{Number, Term};

/// Domain tag for clause-head cache keys.
pub const DOMAIN_CLAUSE_HEAD_V0: &[u8] = b"CLAUSE_HEAD_V0";
/// Domain tag for general term hashes.
pub const DOMAIN_TERM_V0: &[u8] = b"TERM_V0";

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// The digest input is `b"DTL:<domain>:v1" || length_prefix(data) || data`,
    /// where the length prefix is a 64-bit little-endian byte count.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"DTL:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Values with a canonical byte serialization suitable for stable hashing.
pub trait Canonicalizable {
    fn to_canonical_bytes(&self) -> Vec<u8>;

    /// Domain-separated hash of the canonical bytes.
    fn fingerprint(&self, domain: &[u8]) -> HashValue {
        HashValue::hash_with_domain(domain, &self.to_canonical_bytes())
    }
}

const TAG_VAR: u8 = 0;
const TAG_REG: u8 = 1;
const TAG_STR: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_COMPOUND: u8 = 5;
const TAG_CHOICE: u8 = 6;

fn push_text(buf: &mut Vec<u8>, text: &str) {
    buf.extend_from_slice(&(text.len() as u64).to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
}

fn push_number(buf: &mut Vec<u8>, n: Number) {
    // Integral floats encode as integers so that value-equal numbers hash alike.
    let as_int = match n {
        Number::Int(i) => Some(i),
        Number::Float(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Some(x as i64),
        Number::Float(_) => None,
    };
    match (as_int, n) {
        (Some(i), _) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        (None, n) => {
            buf.push(TAG_FLOAT);
            buf.extend_from_slice(&n.as_f64().to_bits().to_le_bytes());
        }
    }
}

/// Pre-order encoding; arguments follow their compound's header.
fn write_term(buf: &mut Vec<u8>, term: &Term) {
    let mut pending = vec![term];
    while let Some(term) = pending.pop() {
        match term {
            Term::Var(addr) => {
                buf.push(TAG_VAR);
                buf.extend_from_slice(&(addr.index() as u64).to_le_bytes());
            }
            Term::Reg(id) => {
                buf.push(TAG_REG);
                buf.extend_from_slice(&(id.index() as u64).to_le_bytes());
            }
            Term::Str(s) => {
                buf.push(TAG_STR);
                push_text(buf, s);
            }
            Term::Num(n) => push_number(buf, *n),
            Term::Compound(c) => {
                buf.push(TAG_COMPOUND);
                push_text(buf, &c.functor);
                buf.extend_from_slice(&(c.args.len() as u64).to_le_bytes());
                pending.extend(c.args.iter().rev());
            }
            Term::Choice(cp) => {
                buf.push(TAG_CHOICE);
                buf.extend_from_slice(&(cp.heap_top as u64).to_le_bytes());
            }
        }
    }
}

impl Canonicalizable for Term {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_term(&mut buf, self);
        buf
    }
}

/// Hash of a term under [`DOMAIN_TERM_V0`].
pub fn term_hash(term: &Term) -> HashValue {
    term.fingerprint(DOMAIN_TERM_V0)
}
