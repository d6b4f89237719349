//! Term representation.
//!
//! Terms are first-order: variables living on the [`crate::heap::Heap`],
//! compounds (functor plus ordered arguments), and atomic strings or numbers.
//! Stored clauses use [`Term::Reg`] placeholders instead of heap variables so
//! that a single prototype can be instantiated into any number of call frames.
//!
//! Compounds are reference counted; cloning a term never copies structure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::heap::ChoicePoint;
use crate::names;

/// Interned-by-sharing symbol text.
pub type Symbol = Rc<str>;

/// Address of a heap cell.
///
/// # Invariant
/// Addresses are handed out in increasing order and only become invalid when a
/// choice point rollback lowers the heap top below them.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Addr(u32);

impl Addr {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_G{}", self.0)
    }
}

/// Numbered call-time register slot referenced by clause prototypes.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegId(u32);

impl RegId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_R{}", self.0)
    }
}

/// Numeric constant.
///
/// Integers and floats compare by value, so `2` unifies with `2.0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(x) => x,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.partial_cmp(b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Key of a trie edge: `functor/arity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctorKey {
    pub name: Symbol,
    pub arity: usize,
}

impl fmt::Display for FunctorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A functor applied to an ordered argument list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compound {
    pub functor: Symbol,
    pub args: Vec<Term>,
}

impl Compound {
    #[inline]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn key(&self) -> FunctorKey {
        FunctorKey {
            name: self.functor.clone(),
            arity: self.args.len(),
        }
    }

    #[inline]
    pub fn is(&self, functor: &str, arity: usize) -> bool {
        self.args.len() == arity && &*self.functor == functor
    }

    /// `dynamic(X)` markers are opaque to index descent.
    #[inline]
    pub fn is_dynamic_marker(&self) -> bool {
        self.is(names::DYNAMIC, 1)
    }
}

// Equality and drop walk nested arguments with an explicit stack; the derived
// versions recurse once per list cell.
impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        if self.functor != other.functor || self.args.len() != other.args.len() {
            return false;
        }
        let mut pending: Vec<(&Term, &Term)> = self.args.iter().zip(&other.args).collect();
        while let Some((a, b)) = pending.pop() {
            match (a, b) {
                (Term::Compound(x), Term::Compound(y)) => {
                    if Rc::ptr_eq(x, y) {
                        continue;
                    }
                    if x.functor != y.functor || x.args.len() != y.args.len() {
                        return false;
                    }
                    pending.extend(x.args.iter().zip(&y.args));
                }
                (Term::Compound(_), _) | (_, Term::Compound(_)) => return false,
                _ => {
                    if a != b {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Drop for Compound {
    fn drop(&mut self) {
        fn unlink(args: &mut Vec<Term>, owned: &mut Vec<Rc<Compound>>) {
            for arg in args.drain(..) {
                if let Term::Compound(c) = arg {
                    owned.push(c);
                }
            }
        }
        let mut owned: Vec<Rc<Compound>> = Vec::new();
        unlink(&mut self.args, &mut owned);
        while let Some(child) = owned.pop() {
            // Shared children are only released here; their owner unlinks them.
            if let Ok(mut inner) = Rc::try_unwrap(child) {
                unlink(&mut inner.args, &mut owned);
            }
        }
    }
}

/// A first-order term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// Heap variable; unbound iff its cell refers to itself.
    Var(Addr),
    /// Prototype placeholder; only appears inside stored statements.
    Reg(RegId),
    Str(Symbol),
    Num(Number),
    Compound(Rc<Compound>),
    /// Opaque choice point carried by continuation goals.
    #[serde(skip)]
    Choice(ChoicePoint),
}

impl Term {
    pub fn atom(text: &str) -> Self {
        Term::Str(Rc::from(text))
    }

    pub fn int(value: i64) -> Self {
        Term::Num(Number::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Term::Num(Number::Float(value))
    }

    pub fn reg(id: u32) -> Self {
        Term::Reg(RegId::new(id))
    }

    pub fn compound(functor: &str, args: Vec<Term>) -> Self {
        Term::Compound(Rc::new(Compound {
            functor: Rc::from(functor),
            args,
        }))
    }

    pub(crate) fn compound_sym(functor: Symbol, args: Vec<Term>) -> Self {
        Term::Compound(Rc::new(Compound { functor, args }))
    }

    /// Builds `functor` with no arguments, e.g. the goal `true`.
    pub fn constant(functor: &str) -> Self {
        Term::compound(functor, Vec::new())
    }

    /// The empty list.
    pub fn nil() -> Self {
        Term::constant(names::NIL)
    }

    /// Builds a proper list from `items`.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Term>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Term::nil(), |tail, head| {
                Term::compound(names::CONS, vec![head, tail])
            })
    }

    /// Wraps `term` into `'::'(term, ty)`.
    pub fn typed(term: Term, ty: Term) -> Self {
        Term::compound(names::TYPED, vec![term, ty])
    }

    pub fn as_compound(&self) -> Option<&Rc<Compound>> {
        match self {
            Term::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Term::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Term::Num(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    #[inline]
    pub fn is_compound(&self) -> bool {
        matches!(self, Term::Compound(_))
    }

    /// True for the zero-arity goal `/detalion#true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Term::Compound(c) if c.is(names::TRUE, 0))
    }

    /// Equality of non-compound, non-variable terms.
    pub(crate) fn atomic_eq(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Str(a), Term::Str(b)) => a == b,
            (Term::Num(a), Term::Num(b)) => a == b,
            (Term::Reg(a), Term::Reg(b)) => a == b,
            (Term::Choice(a), Term::Choice(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Term {
    fn from(text: &str) -> Self {
        Term::atom(text)
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::int(value)
    }
}

/// A stored clause split into head and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub head: Term,
    pub body: Term,
}

impl Clause {
    pub fn new(head: Term, body: Term) -> Self {
        Self { head, body }
    }

    /// A clause whose body is `true`.
    pub fn fact(head: Term) -> Self {
        Self::new(head, Term::constant(names::TRUE))
    }

    /// Reads `clause(Head, Body)`.
    pub fn from_statement(statement: &Term) -> Option<Self> {
        match statement {
            Term::Compound(c) if c.is(names::CLAUSE, 2) => {
                Some(Self::new(c.args[0].clone(), c.args[1].clone()))
            }
            _ => None,
        }
    }

    /// Normalizes a stored statement; anything other than `clause(Head, Body)`
    /// becomes the fact `clause(term, true)`.
    pub fn statement_of(term: Term) -> Term {
        if matches!(&term, Term::Compound(c) if c.is(names::CLAUSE, 2)) {
            term
        } else {
            Clause::fact(term).to_statement()
        }
    }

    /// Encodes the clause as the statement `clause(Head, Body)`.
    pub fn to_statement(&self) -> Term {
        Term::compound(names::CLAUSE, vec![self.head.clone(), self.body.clone()])
    }
}

/// Outcome of visiting one node in [`rebuild`].
pub(crate) enum Visit {
    /// The node's image is this term.
    Leaf(Term),
    /// Rebuild the compound from the images of its arguments.
    Descend(Rc<Compound>),
    /// Continue the walk at this term in place of the node.
    Replace(Term),
}

/// Maps `root` bottom-up with an explicit stack.
///
/// `visit` sees every node before its arguments, arguments left to right, so
/// numbering schemes keyed on first occurrence stay stable. A compound whose
/// arguments all map to themselves is shared rather than rebuilt.
pub(crate) fn rebuild<C, E>(
    ctx: &mut C,
    root: &Term,
    mut visit: impl FnMut(&mut C, &Term) -> Result<Visit, E>,
) -> Result<Term, E> {
    enum Task {
        Visit(Term),
        Build(Rc<Compound>),
    }
    let mut tasks = vec![Task::Visit(root.clone())];
    let mut images: Vec<Term> = Vec::new();
    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(term) => match visit(ctx, &term)? {
                Visit::Leaf(image) => images.push(image),
                Visit::Replace(next) => tasks.push(Task::Visit(next)),
                Visit::Descend(c) => {
                    let args: Vec<Task> = c.args.iter().rev().map(|a| Task::Visit(a.clone())).collect();
                    // Runs once every argument has been imaged.
                    tasks.push(Task::Build(c));
                    tasks.extend(args);
                }
            },
            Task::Build(c) => {
                let args = images.split_off(images.len() - c.args.len());
                let unchanged = c.args.iter().zip(&args).all(|(old, new)| same_node(old, new));
                images.push(if unchanged {
                    Term::Compound(c)
                } else {
                    Term::compound_sym(c.functor.clone(), args)
                });
            }
        }
    }
    Ok(images.pop().unwrap_or_else(|| root.clone()))
}

/// Pointer identity for compounds, value identity otherwise.
fn same_node(old: &Term, new: &Term) -> bool {
    match (old, new) {
        (Term::Compound(x), Term::Compound(y)) => Rc::ptr_eq(x, y),
        (Term::Compound(_), _) | (_, Term::Compound(_)) => false,
        _ => old == new,
    }
}

enum Piece<'a> {
    Term(&'a Term),
    Text(&'static str),
    /// Remainder of a list after its first element.
    Tail(&'a Term),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pieces = vec![Piece::Term(self)];
        while let Some(piece) = pieces.pop() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Tail(Term::Compound(t)) if t.is(names::CONS, 2) => {
                    f.write_str(", ")?;
                    pieces.push(Piece::Tail(&t.args[1]));
                    pieces.push(Piece::Term(&t.args[0]));
                }
                Piece::Tail(Term::Compound(t)) if t.is(names::NIL, 0) => f.write_str("]")?,
                Piece::Tail(other) => {
                    f.write_str(" | ")?;
                    pieces.push(Piece::Text("]"));
                    pieces.push(Piece::Term(other));
                }
                Piece::Term(term) => match term {
                    Term::Var(addr) => write!(f, "{addr}")?,
                    Term::Reg(id) => write!(f, "{id}")?,
                    Term::Str(s) => write!(f, "{s:?}")?,
                    Term::Num(n) => write!(f, "{n}")?,
                    Term::Choice(cp) => write!(f, "<choice@{}>", cp.heap_top)?,
                    Term::Compound(c) if c.is(names::CONS, 2) => {
                        f.write_str("[")?;
                        pieces.push(Piece::Tail(&c.args[1]));
                        pieces.push(Piece::Term(&c.args[0]));
                    }
                    Term::Compound(c) if c.args.is_empty() => f.write_str(&c.functor)?,
                    Term::Compound(c) => {
                        write!(f, "{}(", c.functor)?;
                        pieces.push(Piece::Text(")"));
                        for (i, arg) in c.args.iter().enumerate().rev() {
                            pieces.push(Piece::Term(arg));
                            if i > 0 {
                                pieces.push(Piece::Text(", "));
                            }
                        }
                    }
                },
            }
        }
        Ok(())
    }
}
