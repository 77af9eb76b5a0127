//! The failsafe layer: str, seq, map.

use super::{Kind, Type, tags};
use crate::value::Scalar;

pub(super) fn types() -> (Vec<Type>, Vec<Type>) {
    let str_type = Type::new(tags::STR, Kind::Scalar).with_construct(|raw| {
        // An explicitly tagged empty node is the empty string, not null.
        Ok(Scalar::Str(raw.unwrap_or("").to_string()))
    });

    let seq_type = Type::new(tags::SEQ, Kind::Sequence);
    let map_type = Type::new(tags::MAP, Kind::Mapping);

    (Vec::new(), vec![str_type, seq_type, map_type])
}
