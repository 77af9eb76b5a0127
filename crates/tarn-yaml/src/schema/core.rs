//! The core layer: the JSON kinds widened to YAML-flavored lexical forms.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::json::float_to_text;
use super::{Kind, RepresentFn, Type, tags};
use crate::value::Scalar;

static CORE_FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$").unwrap()
});

fn resolve_core_null(s: &str) -> bool {
    matches!(s, "~" | "null" | "Null" | "NULL" | "")
}

fn resolve_core_bool(s: &str) -> bool {
    matches!(s, "true" | "True" | "TRUE" | "false" | "False" | "FALSE")
}

/// `[-+]?` followed by `0b`/`0o`/`0x` digits or plain decimal digits.
/// Returns `None` when the lexeme does not fit an `i64`.
fn parse_core_int(s: &str) -> Option<i64> {
    let (sign, body) = match s.as_bytes().first()? {
        b'-' => ("-", &s[1..]),
        b'+' => ("", &s[1..]),
        _ => ("", s),
    };

    let (radix, digits) = if let Some(d) = body.strip_prefix("0b") {
        (2, d)
    } else if let Some(d) = body.strip_prefix("0o") {
        (8, d)
    } else if let Some(d) = body.strip_prefix("0x") {
        (16, d)
    } else {
        (10, body)
    };

    if digits.is_empty() {
        return None;
    }
    let valid = match radix {
        2 => digits.bytes().all(|b| matches!(b, b'0' | b'1')),
        8 => digits.bytes().all(|b| matches!(b, b'0'..=b'7')),
        16 => digits.bytes().all(|b| b.is_ascii_hexdigit()),
        _ => digits.bytes().all(|b| b.is_ascii_digit()),
    };
    if !valid {
        return None;
    }

    i64::from_str_radix(&format!("{sign}{digits}"), radix).ok()
}

fn parse_core_float(s: &str) -> Option<f64> {
    match s {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Some(f64::NAN),
        _ => {}
    }
    if !CORE_FLOAT_RE.is_match(s) {
        return None;
    }
    // The trailing-dot form ("1.") is accepted by the grammar and by the
    // standard float parser alike.
    s.parse().ok()
}

fn represent_float(s: &Scalar, style: Option<&str>) -> String {
    let Scalar::Float(f) = s else {
        return String::new();
    };
    let text = float_to_text(*f);
    match style {
        Some("uppercase") => text.to_uppercase(),
        Some("camelcase") => text
            .replace(".inf", ".Inf")
            .replace(".nan", ".NaN"),
        _ => text,
    }
}

fn styled<'a>(entries: Vec<(&'a str, &'static str)>) -> Vec<(&'a str, RepresentFn)> {
    entries
        .into_iter()
        .map(|(style, text)| {
            let f: RepresentFn = Arc::new(move |_: &Scalar, _: Option<&str>| text.to_string());
            (style, f)
        })
        .collect()
}

pub(super) fn types() -> (Vec<Type>, Vec<Type>) {
    let null_type = Type::new(tags::NULL, Kind::Scalar)
        .with_resolve(|raw| raw.is_none_or(resolve_core_null))
        .with_construct(|_| Ok(Scalar::Null))
        .with_predicate(|s| matches!(s, Scalar::Null))
        .with_styled_represent(styled(vec![
            ("canonical", "~"),
            ("lowercase", "null"),
            ("uppercase", "NULL"),
            ("camelcase", "Null"),
        ]))
        .with_default_style("lowercase");

    let bool_type = Type::new(tags::BOOL, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(resolve_core_bool))
        .with_construct(|raw| Ok(Scalar::Bool(raw.is_some_and(|s| s.starts_with(['t', 'T'])))))
        .with_predicate(|s| matches!(s, Scalar::Bool(_)))
        .with_styled_represent(vec![
            (
                "lowercase",
                Arc::new(|s: &Scalar, _: Option<&str>| {
                    if matches!(s, Scalar::Bool(true)) { "true" } else { "false" }.to_string()
                }) as RepresentFn,
            ),
            (
                "uppercase",
                Arc::new(|s: &Scalar, _: Option<&str>| {
                    if matches!(s, Scalar::Bool(true)) { "TRUE" } else { "FALSE" }.to_string()
                }),
            ),
            (
                "camelcase",
                Arc::new(|s: &Scalar, _: Option<&str>| {
                    if matches!(s, Scalar::Bool(true)) { "True" } else { "False" }.to_string()
                }),
            ),
        ])
        .with_default_style("lowercase");

    let int_type = Type::new(tags::INT, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(|s| parse_core_int(s).is_some()))
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not an integer".to_string())?;
            parse_core_int(s)
                .map(Scalar::Int)
                .ok_or_else(|| format!("cannot construct an integer from {s:?}"))
        })
        .with_predicate(|s| matches!(s, Scalar::Int(_)))
        .with_styled_represent(vec![
            (
                "binary",
                Arc::new(|s: &Scalar, _: Option<&str>| match s {
                    Scalar::Int(i) if *i < 0 => format!("-0b{:b}", i.unsigned_abs()),
                    Scalar::Int(i) => format!("0b{i:b}"),
                    _ => String::new(),
                }) as RepresentFn,
            ),
            (
                "octal",
                Arc::new(|s: &Scalar, _: Option<&str>| match s {
                    Scalar::Int(i) if *i < 0 => format!("-0o{:o}", i.unsigned_abs()),
                    Scalar::Int(i) => format!("0o{i:o}"),
                    _ => String::new(),
                }),
            ),
            (
                "decimal",
                Arc::new(|s: &Scalar, _: Option<&str>| match s {
                    Scalar::Int(i) => i.to_string(),
                    _ => String::new(),
                }),
            ),
            (
                "hexadecimal",
                Arc::new(|s: &Scalar, _: Option<&str>| match s {
                    Scalar::Int(i) if *i < 0 => format!("-0x{:x}", i.unsigned_abs()),
                    Scalar::Int(i) => format!("0x{i:x}"),
                    _ => String::new(),
                }),
            ),
        ])
        .with_default_style("decimal")
        .with_style_aliases(vec![
            ("2", "binary"),
            ("8", "octal"),
            ("10", "decimal"),
            ("16", "hexadecimal"),
        ]);

    let float_type = Type::new(tags::FLOAT, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(|s| parse_core_float(s).is_some()))
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not a float".to_string())?;
            parse_core_float(s)
                .map(Scalar::Float)
                .ok_or_else(|| format!("cannot construct a float from {s:?}"))
        })
        .with_predicate(|s| matches!(s, Scalar::Float(_)))
        .with_represent(represent_float)
        .with_default_style("lowercase");

    (vec![null_type, bool_type, int_type, float_type], Vec::new())
}
