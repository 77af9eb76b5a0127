//! The default-safe layer: timestamp, merge, binary, omap, pairs and set.

use std::collections::HashSet;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Kind, Type, tags};
use crate::value::{Scalar, Value};

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").unwrap());

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^
        ([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})        # date
        (?:[Tt]|[\ \t]+)
        ([0-9]{1,2}):([0-9]{2}):([0-9]{2})          # time
        (?:\.([0-9]*))?                             # fraction
        (?:[\ \t]*(?:(Z)|([-+])([0-9]{1,2})(?::([0-9]{2}))?))?  # timezone
        $",
    )
    .unwrap()
});

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Some(c) = DATE_RE.captures(s) {
        let date = NaiveDate::from_ymd_opt(
            c[1].parse().ok()?,
            c[2].parse().ok()?,
            c[3].parse().ok()?,
        )?;
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    let c = TIMESTAMP_RE.captures(s)?;
    let date = NaiveDate::from_ymd_opt(
        c[1].parse().ok()?,
        c[2].parse().ok()?,
        c[3].parse().ok()?,
    )?;
    let time = date.and_hms_opt(
        c[4].parse().ok()?,
        c[5].parse().ok()?,
        c[6].parse().ok()?,
    )?;

    // Fraction is truncated to millisecond precision.
    let millis = match c.get(7) {
        Some(frac) => {
            let mut digits: String = frac.as_str().chars().take(3).collect();
            while digits.len() < 3 {
                digits.push('0');
            }
            digits.parse::<i64>().ok()?
        }
        None => 0,
    };

    // An explicit offset shifts the wall-clock reading back to UTC; a bare
    // or `Z` timestamp already is UTC.
    let offset_minutes = match c.get(9) {
        Some(sign) => {
            let hours: i64 = c[10].parse().ok()?;
            let minutes: i64 = c.get(11).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
            let total = hours * 60 + minutes;
            if sign.as_str() == "-" { -total } else { total }
        }
        None => 0,
    };

    let utc = time + Duration::milliseconds(millis) - Duration::minutes(offset_minutes);
    Some(Utc.from_utc_datetime(&utc))
}

fn is_base64_text(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '+' | '/' | '=' | ' ' | '\t' | '\n' | '\r')
        })
}

fn decode_base64(s: &str) -> Result<Vec<u8>, String> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let unpadded = compact.trim_end_matches('=');
    STANDARD_NO_PAD
        .decode(unpadded)
        .map_err(|e| format!("malformed base64 data: {e}"))
}

fn single_pair_of(value: &Value) -> Option<(&String, crate::value::NodeId)> {
    match value {
        Value::Map(entries) if entries.len() == 1 => {
            entries.iter().next().map(|(k, &v)| (k, v))
        }
        _ => None,
    }
}

pub(super) fn types() -> (Vec<Type>, Vec<Type>) {
    let timestamp_type = Type::new(tags::TIMESTAMP, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(|s| parse_timestamp(s).is_some()))
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not a timestamp".to_string())?;
            parse_timestamp(s)
                .map(Scalar::Timestamp)
                .ok_or_else(|| format!("cannot construct a timestamp from {s:?}"))
        })
        .with_predicate(|s| matches!(s, Scalar::Timestamp(_)))
        .with_represent(|s, _| match s {
            Scalar::Timestamp(t) => t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            _ => String::new(),
        });

    let merge_type = Type::new(tags::MERGE, Kind::Scalar)
        .with_resolve(|raw| raw == Some("<<"))
        .with_construct(|_| Ok(Scalar::Merge));

    let binary_type = Type::new(tags::BINARY, Kind::Scalar)
        .with_resolve(|raw| raw.is_some_and(is_base64_text))
        .with_construct(|raw| {
            let s = raw.ok_or_else(|| "empty node is not base64 data".to_string())?;
            decode_base64(s).map(Scalar::Binary)
        })
        .with_predicate(|s| matches!(s, Scalar::Binary(_)))
        .with_represent(|s, _| match s {
            Scalar::Binary(bytes) => STANDARD.encode(bytes),
            _ => String::new(),
        });

    let omap_type = Type::new(tags::OMAP, Kind::Sequence).with_resolve_node(|graph, id| {
        let Value::Seq(items) = graph.get(id) else {
            return false;
        };
        let mut seen = HashSet::new();
        items.iter().all(|&item| match single_pair_of(graph.get(item)) {
            Some((key, _)) => seen.insert(key.clone()),
            None => false,
        })
    });

    let pairs_type = Type::new(tags::PAIRS, Kind::Sequence)
        .with_resolve_node(|graph, id| {
            let Value::Seq(items) = graph.get(id) else {
                return false;
            };
            items
                .iter()
                .all(|&item| single_pair_of(graph.get(item)).is_some())
        })
        .with_construct_node(|graph, id| {
            let Value::Seq(items) = graph.get(id).clone() else {
                return Err("expected a sequence of single-pair mappings".to_string());
            };
            let mut pairs = Vec::with_capacity(items.len());
            for item in items {
                let Some((key, value)) = single_pair_of(graph.get(item)) else {
                    return Err("expected a sequence of single-pair mappings".to_string());
                };
                let key = key.clone();
                let key_id = graph.new_str(key);
                pairs.push(graph.new_seq(vec![key_id, value]));
            }
            *graph.get_mut(id) = Value::Seq(pairs);
            Ok(())
        });

    let set_type = Type::new(tags::SET, Kind::Mapping).with_resolve_node(|graph, id| {
        let Value::Map(entries) = graph.get(id) else {
            return false;
        };
        entries
            .values()
            .all(|&v| matches!(graph.get(v), Value::Scalar(Scalar::Null)))
    });

    (
        vec![timestamp_type, merge_type],
        vec![binary_type, omap_type, pairs_type, set_type],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_only() {
        let t = parse_timestamp("2002-12-14").unwrap();
        assert_eq!(t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(), "2002-12-14T00:00:00.000Z");
    }

    #[test]
    fn test_timestamp_with_offset_normalizes_to_utc() {
        let t = parse_timestamp("2001-12-14 21:59:43.10 -5").unwrap();
        assert_eq!(t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(), "2001-12-15T02:59:43.100Z");
    }

    #[test]
    fn test_timestamp_canonical_and_t_separator() {
        assert!(parse_timestamp("2001-12-15T02:59:43.1Z").is_some());
        assert!(parse_timestamp("2001-12-14t21:59:43.10-05:00").is_some());
        assert!(parse_timestamp("2001-12-14 21:59:43").is_some());
        assert!(parse_timestamp("2001-13-14 21:59:43").is_none());
        assert!(parse_timestamp("14-12-2001").is_none());
    }

    #[test]
    fn test_fraction_truncates_to_millis() {
        let a = parse_timestamp("2001-12-15T02:59:43.1234Z").unwrap();
        let b = parse_timestamp("2001-12-15T02:59:43.123Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_base64_round_trip() {
        assert!(is_base64_text("R0lG\nODlh DAAM\tAKEA"));
        assert!(!is_base64_text("not base64!"));
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
        // Missing padding is tolerated.
        assert_eq!(decode_base64("aGVsbG8").unwrap(), b"hello");
        assert!(decode_base64("a=b=").is_err());
    }
}
