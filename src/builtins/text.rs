//! String builtins.

use super::{number, text};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::term::{Number, Term};

pub(super) fn install(e: &mut Engine) -> Result<(), EngineError> {
    e.add_builtin(
        "strcat",
        3,
        &[
            ("IIO", strcat_join),
            ("IOI", strcat_suffix),
            ("OII", strcat_prefix),
            ("III", strcat_check),
        ],
    )?;
    e.add_builtin("strrep", 4, &[("IIIO", strrep), ("IIII", strrep)])?;
    e.add_builtin(
        "charCodes",
        2,
        &[("IO", char_codes_of), ("II", char_codes_of), ("OI", string_of_codes)],
    )?;
    Ok(())
}

fn strcat_join(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let joined = format!("{}{}", text("strcat", &args[0])?, text("strcat", &args[1])?);
    e.bind(&args[2], Term::atom(&joined))
}

fn strcat_suffix(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let whole = text("strcat", &args[2])?;
    match whole.strip_prefix(text("strcat", &args[0])?) {
        Some(rest) => {
            let rest = Term::atom(rest);
            e.bind(&args[1], rest)
        }
        None => {
            e.fail();
            Ok(())
        }
    }
}

fn strcat_prefix(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let whole = text("strcat", &args[2])?;
    match whole.strip_suffix(text("strcat", &args[1])?) {
        Some(rest) => {
            let rest = Term::atom(rest);
            e.bind(&args[0], rest)
        }
        None => {
            e.fail();
            Ok(())
        }
    }
}

fn strcat_check(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let (a, b, c) = (
        text("strcat", &args[0])?,
        text("strcat", &args[1])?,
        text("strcat", &args[2])?,
    );
    if c.len() != a.len() + b.len() || !c.starts_with(a) || !c.ends_with(b) {
        e.fail();
    }
    Ok(())
}

/// `strrep(Source, Pattern, Replacement, Result)`: replaces the first
/// occurrence of `Pattern`.
fn strrep(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let source = text("strrep", &args[0])?;
    let pattern = text("strrep", &args[1])?;
    let replacement = text("strrep", &args[2])?;
    let replaced = Term::atom(&source.replacen(pattern, replacement, 1));
    e.bind(&args[3], replaced)
}

fn codes(s: &str) -> Term {
    Term::list(
        s.chars()
            .map(|c| Term::int(i64::from(u32::from(c))))
            .collect::<Vec<_>>(),
    )
}

fn char_codes_of(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let list = codes(text("charCodes", &args[0])?);
    e.unify_or_fail(&args[1], &list)
}

fn string_of_codes(e: &mut Engine, args: &[Term]) -> Result<(), EngineError> {
    let items = e
        .heap_mut()
        .list_items(&args[1])?
        .ok_or_else(|| EngineError::type_error("charCodes", "list", &args[1]))?;
    let mut s = String::with_capacity(items.len());
    for item in &items {
        let item = e.heap_mut().deref(item)?;
        let code = match number("charCodes", &item)? {
            Number::Int(i) => u32::try_from(i).ok().and_then(char::from_u32),
            Number::Float(_) => None,
        };
        match code {
            Some(c) => s.push(c),
            None => return Err(EngineError::type_error("charCodes", "character code", &item)),
        }
    }
    e.bind(&args[0], Term::atom(&s))
}
