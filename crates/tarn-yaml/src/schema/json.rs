//! The JSON layer: null, bool, int and float with JSON-only lexical forms.

use super::{Kind, Type, tags};
use crate::value::Scalar;

/// `-?(0|[1-9][0-9]*)`, and the result must fit an i64.
fn parse_json_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`.
fn parse_json_float(s: &str) -> Option<f64> {
    let rest = s.strip_prefix('-').unwrap_or(s);

    let (int_part, rest) = {
        let end = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        (&rest[..end], &rest[end..])
    };
    if int_part.is_empty() || (int_part.len() > 1 && int_part.starts_with('0')) {
        return None;
    }

    let rest = match rest.strip_prefix('.') {
        Some(frac) => {
            let end = frac.bytes().take_while(|b| b.is_ascii_digit()).count();
            if end == 0 {
                return None;
            }
            &frac[end..]
        }
        None => rest,
    };

    let rest = match rest.strip_prefix(['e', 'E']) {
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            let end = exp.bytes().take_while(|b| b.is_ascii_digit()).count();
            if end == 0 || end != exp.len() {
                return None;
            }
            ""
        }
        None => rest,
    };

    if !rest.is_empty() {
        return None;
    }
    s.parse().ok()
}

/// Decimal text for a float that always re-reads as a float: a `.` or an
/// exponent is guaranteed, and non-finite values use the YAML special forms.
pub(super) fn float_to_text(value: f64) -> String {
    if value.is_nan() {
        return ".nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { ".inf" } else { "-.inf" }.to_string();
    }
    let mut text = value.to_string();
    if !text.contains('.') && !text.contains('e') && !text.contains('E') {
        text.push_str(".0");
    }
    text
}

pub(super) fn int_to_decimal(value: i64) -> String {
    value.to_string()
}

pub(super) fn types() -> (Vec<Type>, Vec<Type>) {
    let null_type = Type::new(tags::NULL, Kind::Scalar)
        .with_resolve(|raw| raw == Some("null"))
        .with_construct(|_| Ok(Scalar::Null))
        .with_predicate(|s| matches!(s, Scalar::Null))
        .with_represent(|_, _| "null".to_string());

    let bool_type = Type::new(tags::BOOL, Kind::Scalar)
        .with_resolve(|raw| matches!(raw, Some("true") | Some("false")))
        .with_construct(|raw| Ok(Scalar::Bool(raw == Some("true"))))
        .with_predicate(|s| matches!(s, Scalar::Bool(_)))
        .with_represent(|s, _| match s {
            Scalar::Bool(true) => "true".to_string(),
            _ => "false".to_string(),
        });

    let int_type = Type::new(tags::INT, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(|s| parse_json_int(s).is_some()))
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not an integer".to_string())?;
            parse_json_int(s)
                .map(Scalar::Int)
                .ok_or_else(|| format!("cannot construct an integer from {s:?}"))
        })
        .with_predicate(|s| matches!(s, Scalar::Int(_)))
        .with_represent(|s, _| match s {
            Scalar::Int(i) => int_to_decimal(*i),
            _ => String::new(),
        });

    let float_type = Type::new(tags::FLOAT, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(|s| parse_json_float(s).is_some()))
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not a float".to_string())?;
            parse_json_float(s)
                .map(Scalar::Float)
                .ok_or_else(|| format!("cannot construct a float from {s:?}"))
        })
        .with_predicate(|s| matches!(s, Scalar::Float(_)))
        .with_represent(|s, _| match s {
            Scalar::Float(f) => float_to_text(*f),
            _ => String::new(),
        });

    (vec![null_type, bool_type, int_type, float_type], Vec::new())
}
