//! Loading: scalars, collections, block scalars, anchors, keys, documents.

use tarn_yaml::{
    Document, ErrorKind, EventReceiver, LoadOptions, Mark, NodeEvent, Scalar, load, load_all,
    safe_load, schema,
};

fn load_str(input: &str) -> Document {
    load(input, LoadOptions::default()).unwrap()
}

fn load_err(input: &str) -> tarn_yaml::YamlError {
    load(input, LoadOptions::default()).unwrap_err()
}

#[test]
fn empty_literal_clips_to_empty_string() {
    let doc = load_str("a: |\n\nb: .");
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().as_str(), Some(""));
    assert_eq!(root.get("b").unwrap().as_str(), Some("."));
}

#[test]
fn empty_literal_with_keep_retains_newline() {
    let doc = load_str("a: |+\n\nb: .");
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().as_str(), Some("\n"));
    assert_eq!(root.get("b").unwrap().as_str(), Some("."));
}

#[test]
fn chomping_modes() {
    let strip = load_str("a: |-\n  text\n\nb: 1");
    assert_eq!(strip.root().unwrap().get("a").unwrap().as_str(), Some("text"));

    let clip = load_str("a: |\n  text\n\nb: 1");
    assert_eq!(clip.root().unwrap().get("a").unwrap().as_str(), Some("text\n"));

    let keep = load_str("a: |+\n  text\n\nb: 1");
    assert_eq!(keep.root().unwrap().get("a").unwrap().as_str(), Some("text\n\n"));
}

#[test]
fn literal_preserves_inner_breaks() {
    let doc = load_str("a: |\n  one\n  two\n");
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("one\ntwo\n"));
}

#[test]
fn folded_scalar_folds_lines() {
    let doc = load_str("a: >\n  one\n  two\n\n  three\nb: 1");
    assert_eq!(
        doc.root().unwrap().get("a").unwrap().as_str(),
        Some("one two\nthree\n")
    );
}

#[test]
fn folded_keeps_more_indented_lines() {
    let doc = load_str("a: >\n  one\n   more\n  two\n");
    assert_eq!(
        doc.root().unwrap().get("a").unwrap().as_str(),
        Some("one\n more\ntwo\n")
    );
}

#[test]
fn block_scalar_explicit_indentation_indicator() {
    let doc = load_str("a: |2\n    text\nb: 1");
    // Two of the four spaces are indentation; the rest is content.
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("  text\n"));
}

#[test]
fn block_scalar_header_errors() {
    assert!(load_err("a: |0\n  x\n").reason.contains("explicit indentation width"));
    assert!(load_err("a: |--\n  x\n").reason.contains("chomping mode"));
    assert!(load_err("a: |11\n  x\n").reason.contains("indentation width identifier"));
}

#[test]
fn plain_scalar_folds_line_breaks() {
    let doc = load_str("a: one\n   two\n\n   three");
    assert_eq!(
        doc.root().unwrap().get("a").unwrap().as_str(),
        Some("one two\nthree")
    );
}

#[test]
fn block_sequence_at_parent_indentation() {
    let doc = load_str("a:\n- 1\n- 2\nb: 3\n");
    let root = doc.root().unwrap();
    let a = root.get("a").unwrap();
    assert_eq!(a.item(0).unwrap().as_i64(), Some(1));
    assert_eq!(a.item(1).unwrap().as_i64(), Some(2));
    assert_eq!(root.get("b").unwrap().as_i64(), Some(3));
}

#[test]
fn deeply_nested_mappings() {
    let doc = load_str("a:\n  b:\n    c: 1\n  d: 2\n");
    let root = doc.root().unwrap();
    let a = root.get("a").unwrap();
    assert_eq!(a.get("b").unwrap().get("c").unwrap().as_i64(), Some(1));
    assert_eq!(a.get("d").unwrap().as_i64(), Some(2));
}

#[test]
fn single_quoted_escapes() {
    let doc = load_str("a: 'it''s'");
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("it's"));
}

#[test]
fn double_quoted_escapes() {
    let doc = load_str("a: \"x\\ty\\n\\u0041\\x42\"");
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("x\ty\nAB"));
}

#[test]
fn double_quoted_astral_escape() {
    let doc = load_str("\"\\U0001F600\"");
    assert_eq!(doc.root().unwrap().as_str(), Some("\u{1F600}"));
}

#[test]
fn quoted_scalars_fold_line_breaks() {
    let doc = load_str("a: \"one\n  two\"");
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("one two"));
}

#[test]
fn unknown_escape_fails() {
    let err = load_err("a: \"\\q\"");
    assert_eq!(err.kind, ErrorKind::Structural);
    assert!(err.reason.contains("unknown escape sequence"));
}

#[test]
fn duplicate_key_is_fatal_and_points_at_second_occurrence() {
    let err = load_err("a: 1\na: 2");
    assert_eq!(err.kind, ErrorKind::DuplicateKey);
    assert_eq!(err.reason, "duplicated mapping key");
    assert_eq!(err.mark.unwrap().line, 1);
}

#[test]
fn json_mode_tolerates_duplicates_last_wins() {
    let options = LoadOptions {
        json: true,
        ..Default::default()
    };
    let doc = load("a: 1\na: 2", options).unwrap();
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_i64(), Some(2));
}

#[test]
fn merge_key_merges_mappings() {
    let doc = load_str("base: &b\n  x: 1\n  y: 2\nderived:\n  <<: *b\n  y: 3\n");
    let derived = doc.root().unwrap().get("derived").unwrap();
    assert_eq!(derived.get("x").unwrap().as_i64(), Some(1));
    assert_eq!(derived.get("y").unwrap().as_i64(), Some(3));
}

#[test]
fn merge_key_accepts_sequence_of_mappings() {
    let doc = load_str("a: &a {x: 1}\nb: &b {x: 9, y: 2}\nc:\n  <<: [*a, *b]\n  z: 3\n");
    let c = doc.root().unwrap().get("c").unwrap();
    // Earlier sources win.
    assert_eq!(c.get("x").unwrap().as_i64(), Some(1));
    assert_eq!(c.get("y").unwrap().as_i64(), Some(2));
    assert_eq!(c.get("z").unwrap().as_i64(), Some(3));
}

#[test]
fn merge_of_non_mapping_fails() {
    let err = load_err("a:\n  <<: 1\n");
    assert!(err.reason.contains("cannot merge mappings"));
}

#[test]
fn aliases_share_identity() {
    let doc = load_str("a: &x [1, 2]\nb: *x\n");
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().id(), root.get("b").unwrap().id());
}

#[test]
fn alias_can_close_a_cycle() {
    let doc = load_str("a: &x\n  - 1\n  - *x\n");
    let a = doc.root().unwrap().get("a").unwrap();
    assert_eq!(a.item(1).unwrap().id(), a.id());
}

#[test]
fn alias_with_properties_is_rejected() {
    let err = load_err("a: &x 1\nb: !!str *x\n");
    assert!(err.reason.contains("alias node should not have any properties"));
}

#[test]
fn explicit_keys_without_values() {
    let doc = load_str("? a\n? b\n");
    let root = doc.root().unwrap();
    assert_eq!(root.len(), 2);
    assert!(root.get("a").unwrap().is_null());
    assert!(root.get("b").unwrap().is_null());
}

#[test]
fn sequence_key_canonicalizes_with_commas() {
    let doc = load_str("[a, b]: c\n");
    assert_eq!(doc.root().unwrap().get("a,b").unwrap().as_str(), Some("c"));
}

#[test]
fn mapping_key_canonicalizes_to_fixed_literal() {
    let doc = load_str("{x: 1}: v\n");
    assert_eq!(
        doc.root().unwrap().get("[object Object]").unwrap().as_str(),
        Some("v")
    );
}

#[test]
fn nested_sequence_key_is_rejected() {
    let err = load_err("[[a]]: b\n");
    assert_eq!(err.kind, ErrorKind::InvalidKey);
    assert!(err.reason.contains("nested arrays are not supported inside keys"));

    let err = load_err("? [[a, b]]\n: c\n");
    assert_eq!(err.kind, ErrorKind::InvalidKey);
}

#[test]
fn flow_collections() {
    let doc = load_str("{a: 1, list: [1, 2], nested: {b: [x]}}");
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().as_i64(), Some(1));
    assert_eq!(root.get("list").unwrap().item(1).unwrap().as_i64(), Some(2));
    assert_eq!(
        root.get("nested").unwrap().get("b").unwrap().item(0).unwrap().as_str(),
        Some("x")
    );
}

#[test]
fn single_pair_inside_flow_sequence_becomes_mapping() {
    let doc = load_str("[a: 1, b]");
    let root = doc.root().unwrap();
    assert_eq!(root.item(0).unwrap().get("a").unwrap().as_i64(), Some(1));
    assert_eq!(root.item(1).unwrap().as_str(), Some("b"));
}

#[test]
fn flow_errors() {
    let err = load_err("[1, 2");
    assert_eq!(err.kind, ErrorKind::Structural);
    assert!(err.reason.contains("unexpected end of the stream within a flow collection"));

    let err = load_err("['a' 'b']");
    assert!(err.reason.contains("missed comma"));
}

#[test]
fn stray_content_after_document() {
    let err = load_err("a: 1\n- b\n");
    assert!(err
        .reason
        .contains("end of the stream or a document separator is expected"));
}

#[test]
fn load_all_splits_documents() {
    let docs = load_all("---\na: 1\n---\nb: 2\n...\n", LoadOptions::default()).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].root().unwrap().get("a").unwrap().as_i64(), Some(1));
    assert_eq!(docs[1].root().unwrap().get("b").unwrap().as_i64(), Some(2));
}

#[test]
fn anchors_do_not_leak_across_documents() {
    let err = load_all("a: &x 1\n---\nb: *x\n", LoadOptions::default()).unwrap_err();
    assert!(err.reason.contains("unidentified alias"));
}

#[test]
fn bare_document_then_marker() {
    let docs = load_all("a: 1\n---\nb: 2\n", LoadOptions::default()).unwrap();
    assert_eq!(docs.len(), 2);
}

#[test]
fn empty_document_has_no_root() {
    assert!(load_str("---\n").root.is_none());
    assert!(load_str("").root.is_none());
}

#[test]
fn yaml_directive_requires_document_start() {
    let err = load_err("%YAML 1.2\nx\n");
    assert!(err.reason.contains("directives end mark is expected"));

    let doc = load_str("%YAML 1.2\n---\nx\n");
    assert_eq!(doc.root().unwrap().as_str(), Some("x"));
}

#[test]
fn yaml_directive_validation() {
    assert!(load_err("%YAML 1.2\n%YAML 1.2\n---\nx\n")
        .reason
        .contains("duplication of %YAML directive"));
    assert!(load_err("%YAML 2.0\n---\nx\n")
        .reason
        .contains("unacceptable YAML version"));
    assert!(load_err("%YAML one\n---\nx\n")
        .reason
        .contains("ill-formed argument"));
}

#[test]
fn tag_directive_declares_handles() {
    let err = load_err("%TAG !e! tag:example.com,2000:app/\n---\n!e!thing val\n");
    assert_eq!(err.kind, ErrorKind::TagResolution);
    assert!(err.reason.contains("tag:example.com,2000:app/thing"));
}

#[test]
fn undeclared_tag_handle_fails() {
    let err = load_err("!e!thing val\n");
    assert!(err.reason.contains("undeclared tag handle"));
}

#[test]
fn non_specific_tag_pins_string() {
    let doc = load_str("a: ! 123\nb: !!str 456\n");
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().as_str(), Some("123"));
    assert_eq!(root.get("b").unwrap().as_str(), Some("456"));
}

#[test]
fn verbatim_tags_resolve() {
    let doc = load_str("a: !<tag:yaml.org,2002:str> 99\n");
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("99"));
}

#[test]
fn core_schema_lexical_forms() {
    let doc = load_str("a: 0x1A\nb: 0o17\nc: 0b101\nd: .inf\ne: .nan\nf: ~\ng: +42\n");
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().as_i64(), Some(26));
    assert_eq!(root.get("b").unwrap().as_i64(), Some(15));
    assert_eq!(root.get("c").unwrap().as_i64(), Some(5));
    assert_eq!(root.get("d").unwrap().as_f64(), Some(f64::INFINITY));
    assert!(root.get("e").unwrap().as_f64().unwrap().is_nan());
    assert!(root.get("f").unwrap().is_null());
    assert_eq!(root.get("g").unwrap().as_i64(), Some(42));
}

#[test]
fn json_schema_is_stricter() {
    let options = || LoadOptions {
        schema: &schema::JSON,
        ..Default::default()
    };
    let doc = load("a: 0x1A\nb: Null\nc: true\n", options()).unwrap();
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().as_str(), Some("0x1A"));
    assert_eq!(root.get("b").unwrap().as_str(), Some("Null"));
    assert_eq!(root.get("c").unwrap().as_bool(), Some(true));
}

#[test]
fn failsafe_schema_keeps_everything_stringly() {
    let options = LoadOptions {
        schema: &schema::FAILSAFE,
        ..Default::default()
    };
    let doc = load("a: 123\n", options).unwrap();
    assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("123"));
}

#[test]
fn legacy_boolean_words_are_strings() {
    let doc = load_str("a: yes\nb: off\nc: n\n");
    let root = doc.root().unwrap();
    assert_eq!(root.get("a").unwrap().as_str(), Some("yes"));
    assert_eq!(root.get("b").unwrap().as_str(), Some("off"));
    assert_eq!(root.get("c").unwrap().as_str(), Some("n"));
}

#[test]
fn timestamps_resolve_and_normalize_to_utc() {
    let doc = load_str("t: 2001-12-14 21:59:43.10 -5\nd: 2002-12-14\n");
    let root = doc.root().unwrap();
    let t = root.get("t").unwrap();
    assert!(matches!(t.as_scalar(), Some(Scalar::Timestamp(_))));
    assert_eq!(
        t.as_scalar().unwrap().canonical_string(),
        "2001-12-15T02:59:43.100Z"
    );
    assert_eq!(
        root.get("d").unwrap().as_scalar().unwrap().canonical_string(),
        "2002-12-14T00:00:00.000Z"
    );
}

#[test]
fn binary_decodes_base64() {
    let doc = load_str("b: !!binary 'aGVsbG8='\n");
    assert_eq!(
        doc.root().unwrap().get("b").unwrap().as_scalar(),
        Some(&Scalar::Binary(b"hello".to_vec()))
    );

    // Whitespace inside the payload is tolerated.
    let doc = load_str("b: !!binary |\n  aGVs\n  bG8=\n");
    assert_eq!(
        doc.root().unwrap().get("b").unwrap().as_scalar(),
        Some(&Scalar::Binary(b"hello".to_vec()))
    );
}

#[test]
fn omap_requires_unique_single_pairs() {
    let doc = load_str("!!omap\n- a: 1\n- b: 2\n");
    assert_eq!(doc.root().unwrap().len(), 2);

    let err = load_err("!!omap\n- a: 1\n- a: 2\n");
    assert_eq!(err.kind, ErrorKind::TagResolution);
}

#[test]
fn pairs_become_key_value_sequences() {
    let doc = load_str("!!pairs\n- a: 1\n- b: 2\n- a: 3\n");
    let root = doc.root().unwrap();
    assert_eq!(root.item(0).unwrap().item(0).unwrap().as_str(), Some("a"));
    assert_eq!(root.item(0).unwrap().item(1).unwrap().as_i64(), Some(1));
    assert_eq!(root.item(2).unwrap().item(0).unwrap().as_str(), Some("a"));
    assert_eq!(root.item(2).unwrap().item(1).unwrap().as_i64(), Some(3));
}

#[test]
fn set_requires_null_values() {
    let doc = load_str("!!set\n? a\n? b\n");
    assert_eq!(doc.root().unwrap().len(), 2);

    let err = load_err("!!set\na: 1\n");
    assert_eq!(err.kind, ErrorKind::TagResolution);
}

#[test]
fn js_types_only_in_full_schema() {
    let doc = load_str("r: !!js/regexp /ab+/i\nu: !!js/undefined\n");
    let root = doc.root().unwrap();
    assert_eq!(
        root.get("r").unwrap().as_scalar(),
        Some(&Scalar::Regexp {
            pattern: "ab+".into(),
            flags: "i".into()
        })
    );
    assert_eq!(root.get("u").unwrap().as_scalar(), Some(&Scalar::Undefined));

    let err = safe_load("r: !!js/regexp /ab+/i\n", LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::TagResolution);
    assert!(err.reason.contains("unknown tag"));
}

#[test]
fn malformed_regexp_flags_fail_resolution() {
    let err = load_err("r: !!js/regexp '/a/zz'\n");
    assert_eq!(err.kind, ErrorKind::TagResolution);
}

#[test]
fn js_function_carries_source() {
    let doc = load_str("f: !!js/function 'function () { return 42; }'\n");
    assert_eq!(
        doc.root().unwrap().get("f").unwrap().as_scalar(),
        Some(&Scalar::Function("function () { return 42; }".into()))
    );
}

#[test]
fn non_printable_input_is_rejected() {
    let err = load_err("a: \u{0007}x\n");
    assert!(err.reason.contains("non-printable"));
}

#[test]
fn tab_indentation_is_fatal() {
    let err = load_err("a:\n\t- b\n");
    assert!(err.reason.contains("tab character"));
}

struct Recorder(Vec<NodeEvent>);

impl EventReceiver for Recorder {
    fn on_event(&mut self, event: NodeEvent, _mark: &Mark) {
        self.0.push(event);
    }
}

#[test]
fn listener_sees_document_and_scalar_pairs() {
    let mut recorder = Recorder(Vec::new());
    {
        let options = LoadOptions {
            listener: Some(&mut recorder),
            ..Default::default()
        };
        load("hello", options).unwrap();
    }
    assert_eq!(
        recorder.0,
        vec![NodeEvent::Open, NodeEvent::Open, NodeEvent::Close, NodeEvent::Close]
    );
}

#[test]
fn warnings_are_reported_not_thrown() {
    let mut warnings: Vec<String> = Vec::new();
    {
        let mut on_warning = |w: &tarn_yaml::YamlError| warnings.push(w.reason.clone());
        let options = LoadOptions {
            on_warning: Some(&mut on_warning),
            ..Default::default()
        };
        let doc = load("a: 'x\ny'", options).unwrap();
        assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("x y"));
    }
    assert!(warnings.iter().any(|w| w.contains("deficient indentation")));
}

#[test]
fn tab_separation_warns() {
    let mut warnings: Vec<String> = Vec::new();
    {
        let mut on_warning = |w: &tarn_yaml::YamlError| warnings.push(w.reason.clone());
        let options = LoadOptions {
            on_warning: Some(&mut on_warning),
            ..Default::default()
        };
        let doc = load("a:\tb\n", options).unwrap();
        assert_eq!(doc.root().unwrap().get("a").unwrap().as_str(), Some("b"));
    }
    assert!(warnings.iter().any(|w| w.contains("tab characters")));
}

#[test]
fn unknown_directive_warns_and_parsing_continues() {
    let mut warnings: Vec<String> = Vec::new();
    {
        let mut on_warning = |w: &tarn_yaml::YamlError| warnings.push(w.reason.clone());
        let options = LoadOptions {
            on_warning: Some(&mut on_warning),
            ..Default::default()
        };
        let doc = load("%FOO bar\n---\nx\n", options).unwrap();
        assert_eq!(doc.root().unwrap().as_str(), Some("x"));
    }
    assert!(warnings.iter().any(|w| w.contains("unknown document directive")));
}

#[test]
fn error_display_includes_position_and_snippet() {
    let options = LoadOptions {
        filename: Some("conf.yaml".into()),
        ..Default::default()
    };
    let err = load("a: 1\na: 2\n", options).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("duplicated mapping key"));
    assert!(text.contains("conf.yaml:2:"));
    assert!(text.contains('^'));
}
