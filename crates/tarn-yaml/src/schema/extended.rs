//! The non-safe extension layer: `!!js/regexp`, `!!js/undefined` and
//! `!!js/function`.
//!
//! These tags exist for interchange with documents produced by hosts that
//! serialize native objects. Regexps are validated by compiling; function
//! bodies are carried as verbatim source text and never evaluated.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Kind, Type, tags};
use crate::value::Scalar;

static FUNCTION_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*(function\b.*\{.*\}|\(.*\)\s*=>.*|[A-Za-z_$][A-Za-z0-9_$]*\s*=>.*)\s*$")
        .unwrap()
});

/// Split `/pattern/flags` form; a bare pattern has no flags.
fn split_regexp(s: &str) -> Option<(&str, &str)> {
    if s.is_empty() {
        return None;
    }
    if let Some(rest) = s.strip_prefix('/') {
        let slash = rest.rfind('/')?;
        let (pattern, flags) = (&rest[..slash], &rest[slash + 1..]);
        if flags.len() > 3 {
            return None;
        }
        return Some((pattern, flags));
    }
    Some((s, ""))
}

fn regexp_flags_valid(flags: &str) -> bool {
    flags.chars().all(|c| matches!(c, 'g' | 'i' | 'm'))
        && flags.chars().collect::<std::collections::HashSet<_>>().len() == flags.len()
}

fn compile_check(pattern: &str, flags: &str) -> Result<(), String> {
    // `g` has no compile-time meaning; `i`/`m` become inline flags.
    let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm')).collect();
    let candidate = if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{inline}){pattern}")
    };
    Regex::new(&candidate)
        .map(|_| ())
        .map_err(|e| format!("malformed regular expression: {e}"))
}

pub(super) fn types() -> (Vec<Type>, Vec<Type>) {
    let regexp_type = Type::new(tags::REGEXP, Kind::Scalar)
        .with_resolve(|raw| {
            raw.is_some_and(|s| match split_regexp(s) {
                Some((_, flags)) => regexp_flags_valid(flags),
                None => false,
            })
        })
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not a regular expression".to_string())?;
            let (pattern, flags) =
                split_regexp(s).ok_or_else(|| "malformed regular expression".to_string())?;
            if !regexp_flags_valid(flags) {
                return Err(format!("malformed regular expression flags: {flags:?}"));
            }
            compile_check(pattern, flags)?;
            Ok(Scalar::Regexp {
                pattern: pattern.to_string(),
                flags: flags.to_string(),
            })
        })
        .with_predicate(|s| matches!(s, Scalar::Regexp { .. }))
        .with_represent(|s, _| match s {
            Scalar::Regexp { pattern, flags } => format!("/{pattern}/{flags}"),
            _ => String::new(),
        });

    let undefined_type = Type::new(tags::UNDEFINED, Kind::Scalar)
        .with_resolve(|_| true)
        .with_construct(|_| Ok(Scalar::Undefined))
        .with_predicate(|s| matches!(s, Scalar::Undefined))
        .with_represent(|_, _| String::new());

    let function_type = Type::new(tags::FUNCTION, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(|s| FUNCTION_SHAPE_RE.is_match(s)))
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not a function".to_string())?;
            if !FUNCTION_SHAPE_RE.is_match(s) {
                return Err("code fragment is not a function".to_string());
            }
            Ok(Scalar::Function(s.to_string()))
        })
        .with_predicate(|s| matches!(s, Scalar::Function(_)))
        .with_represent(|s, _| match s {
            Scalar::Function(source) => source.clone(),
            _ => String::new(),
        });

    (Vec::new(), vec![regexp_type, undefined_type, function_type])
}
