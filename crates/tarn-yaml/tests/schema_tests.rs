//! Schema layering and application-defined tags.

use tarn_yaml::{ErrorKind, Kind, LoadOptions, Scalar, Schema, Type, load, schema};

fn hex_type() -> Type {
    Type::new("!hex", Kind::Scalar)
        .with_resolve(|raw| raw.is_none_or(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())))
        .with_construct(|raw| match raw {
            None => Ok(Scalar::Int(0)),
            Some(s) => i64::from_str_radix(s, 16)
                .map(Scalar::Int)
                .map_err(|e| e.to_string()),
        })
}

#[test]
fn custom_tag_resolves_and_constructs() {
    let extended = Schema::create(vec![hex_type()], &schema::DEFAULT_SAFE);
    let options = LoadOptions {
        schema: &extended,
        ..Default::default()
    };
    let doc = load("v: !hex ff", options).unwrap();
    assert_eq!(doc.root().unwrap().get("v").unwrap().as_i64(), Some(255));
}

#[test]
fn custom_resolver_runs_for_empty_nodes() {
    let extended = Schema::create(vec![hex_type()], &schema::DEFAULT_SAFE);
    let options = LoadOptions {
        schema: &extended,
        ..Default::default()
    };
    let doc = load("v: !hex", options).unwrap();
    assert_eq!(doc.root().unwrap().get("v").unwrap().as_i64(), Some(0));
}

#[test]
fn custom_resolver_can_reject() {
    let extended = Schema::create(vec![hex_type()], &schema::DEFAULT_SAFE);
    let options = LoadOptions {
        schema: &extended,
        ..Default::default()
    };
    let err = load("v: !hex zz", options).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagResolution);
    assert!(err.reason.contains("cannot resolve"));
}

#[test]
fn base_schema_is_not_mutated_by_create() {
    let _extended = Schema::create(vec![hex_type()], &schema::DEFAULT_SAFE);
    let err = load("v: !hex ff", LoadOptions {
        schema: &schema::DEFAULT_SAFE,
        ..Default::default()
    })
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagResolution);
    assert!(err.reason.contains("unknown tag"));
}

#[test]
fn custom_collection_tag() {
    // A sequence tag that requires at least one element.
    let nonempty = Type::new("!nonempty", Kind::Sequence)
        .with_resolve_node(|graph, id| match graph.get(id) {
            tarn_yaml::Value::Seq(items) => !items.is_empty(),
            _ => false,
        });
    let extended = Schema::create(vec![nonempty], &schema::DEFAULT_SAFE);

    let doc = load("!nonempty [1]", LoadOptions {
        schema: &extended,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(doc.root().unwrap().len(), 1);

    let err = load("!nonempty []", LoadOptions {
        schema: &extended,
        ..Default::default()
    })
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagResolution);
}

#[test]
fn unknown_explicit_tag_fails() {
    let err = load("v: !nope x", LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagResolution);
    assert!(err.reason.contains("unknown tag"));
}

#[test]
fn layers_are_strictly_additive() {
    use tarn_yaml::schema::{CORE, DEFAULT_FULL, DEFAULT_SAFE, FAILSAFE, JSON, tags};

    assert!(FAILSAFE.lookup_any(tags::STR).is_some());
    assert!(FAILSAFE.lookup_any(tags::NULL).is_none());

    assert!(JSON.lookup_any(tags::NULL).is_some());
    assert!(JSON.lookup_any(tags::TIMESTAMP).is_none());

    assert!(CORE.lookup_any(tags::FLOAT).is_some());
    assert!(CORE.lookup_any(tags::BINARY).is_none());

    assert!(DEFAULT_SAFE.lookup_any(tags::BINARY).is_some());
    assert!(DEFAULT_SAFE.lookup_any(tags::FUNCTION).is_none());

    assert!(DEFAULT_FULL.lookup_any(tags::FUNCTION).is_some());
}

#[test]
fn explicit_kind_mismatch_is_rejected() {
    // A scalar tagged with a sequence-kind tag cannot resolve.
    let err = load("v: !!omap 1", LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagResolution);
}
