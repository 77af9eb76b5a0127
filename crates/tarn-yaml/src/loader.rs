//! The composer: turns text into value graphs.
//!
//! The scalar readers live in [`crate::scanner`]; this module owns the
//! shared [`Loader`] state and everything above raw scalars: block and flow
//! collections, tag/anchor/alias properties, implicit and explicit tag
//! resolution, mapping-key handling, `%YAML`/`%TAG` directives and document
//! framing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use tarn_source_map::Mark;

use crate::error::{ErrorKind, Result, YamlError};
use crate::schema::{DEFAULT_FULL, DEFAULT_SAFE, Kind, Schema, tags};
use crate::value::{Document, Graph, NodeId, Value};

static TAG_HANDLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)(?:!|!!|![a-z\-]+!)$").unwrap());

static TAG_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(?:!|[^,\[\]{}])(?:%[0-9a-f]{2}|[0-9a-z\-#;/?:@&=+$,_.!~*'()\[\]])*$")
        .unwrap()
});

fn has_flow_indicator(s: &str) -> bool {
    s.contains([',', '[', ']', '{', '}'])
}

/// Structural event fed to a listener during composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    /// Composition of a node is starting.
    Open,
    /// Composition of a node finished (successfully or as a non-match).
    Close,
}

/// Observer receiving [`NodeEvent`]s with their source positions.
pub trait EventReceiver {
    fn on_event(&mut self, event: NodeEvent, mark: &Mark);
}

/// Options for [`load`] and [`load_all`].
pub struct LoadOptions<'a> {
    /// Schema governing tag resolution. Defaults to the full schema.
    pub schema: &'a Schema,
    /// Source name used in error marks.
    pub filename: Option<String>,
    /// Tolerate duplicate mapping keys; the last occurrence wins.
    pub json: bool,
    /// Receives warnings; when absent they are dropped silently.
    pub on_warning: Option<&'a mut dyn FnMut(&YamlError)>,
    /// Receives open/close events for every composed node.
    pub listener: Option<&'a mut dyn EventReceiver>,
}

impl Default for LoadOptions<'_> {
    fn default() -> Self {
        LoadOptions {
            schema: &DEFAULT_FULL,
            filename: None,
            json: false,
            on_warning: None,
            listener: None,
        }
    }
}

/// Block/flow context of the node being composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    FlowIn,
    FlowOut,
    BlockIn,
    BlockOut,
}

/// What composition has produced so far for the current node.
pub(crate) enum Produced {
    /// Nothing (an empty node).
    None,
    /// Raw scalar text, not yet resolved against the schema.
    Raw(String),
    /// A finished graph node.
    Node(NodeId),
}

pub(crate) struct Loader<'a> {
    pub(crate) input: Vec<char>,
    pub(crate) src: Arc<str>,
    pub(crate) filename: Option<String>,
    pub(crate) schema: &'a Schema,
    pub(crate) json_mode: bool,
    pub(crate) on_warning: Option<&'a mut dyn FnMut(&YamlError)>,
    pub(crate) listener: Option<&'a mut dyn EventReceiver>,

    pub(crate) length: usize,
    pub(crate) position: usize,
    pub(crate) line: usize,
    pub(crate) line_start: usize,
    pub(crate) line_indent: i64,

    pub(crate) version: Option<String>,
    pub(crate) check_line_breaks: bool,
    pub(crate) tag_map: HashMap<String, String>,
    pub(crate) anchor_map: HashMap<String, NodeId>,

    // Scratch for the node currently being composed.
    pub(crate) tag: Option<String>,
    pub(crate) anchor: Option<String>,
    pub(crate) kind: Option<Kind>,
    pub(crate) result: Produced,

    pub(crate) graph: Graph,
    pub(crate) documents: Vec<Document>,
}

impl<'a> Loader<'a> {
    fn new(input: &str, options: LoadOptions<'a>) -> Self {
        let mut normalized = input.to_string();
        if !normalized.is_empty() && !normalized.ends_with(['\n', '\r']) {
            normalized.push('\n');
        }
        if let Some(stripped) = normalized.strip_prefix('\u{FEFF}') {
            normalized = stripped.to_string();
        }

        let mut chars: Vec<char> = normalized.chars().collect();
        let length = chars.len();
        // Sentinel: simplifies every bounds check.
        chars.push('\0');

        Loader {
            input: chars,
            src: Arc::from(normalized.as_str()),
            filename: options.filename,
            schema: options.schema,
            json_mode: options.json,
            on_warning: options.on_warning,
            listener: options.listener,
            length,
            position: 0,
            line: 0,
            line_start: 0,
            line_indent: 0,
            version: None,
            check_line_breaks: false,
            tag_map: HashMap::new(),
            anchor_map: HashMap::new(),
            tag: None,
            anchor: None,
            kind: None,
            result: Produced::None,
            graph: Graph::new(),
            documents: Vec::new(),
        }
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            name: self.filename.clone(),
            buffer: Some(Arc::clone(&self.src)),
            position: self.position,
            line: self.line,
            column: self.position.saturating_sub(self.line_start),
        }
    }

    pub(crate) fn err(&self, kind: ErrorKind, reason: impl Into<String>) -> YamlError {
        YamlError::new(kind, reason).with_mark(self.mark())
    }

    pub(crate) fn fail<T>(&self, kind: ErrorKind, reason: impl Into<String>) -> Result<T> {
        Err(self.err(kind, reason))
    }

    pub(crate) fn warn(&mut self, reason: &str) {
        let warning = self.err(ErrorKind::Warning, reason);
        if let Some(callback) = self.on_warning.as_mut() {
            callback(&warning);
        }
    }

    fn emit_event(&mut self, event: NodeEvent) {
        if self.listener.is_none() {
            return;
        }
        let mark = self.mark();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_event(event, &mark);
        }
    }

    fn take_result(&mut self) -> Option<NodeId> {
        match std::mem::replace(&mut self.result, Produced::None) {
            Produced::Node(id) => Some(id),
            _ => None,
        }
    }

    //
    // Mapping keys
    //

    /// Canonicalize a key node to its string form.
    ///
    /// This is one fixed, side-effect-free routine over the node kind; a
    /// value never gets a say in its own key form. Sequences canonicalize
    /// element-wise joined with commas; mappings collapse to a fixed
    /// literal; a sequence nested inside a key sequence is rejected.
    fn canonical_key(&self, key: Option<NodeId>) -> Result<String> {
        let Some(id) = key else {
            return Ok("null".to_string());
        };
        match self.graph.get(id) {
            Value::Scalar(s) => Ok(s.canonical_string()),
            Value::Map(_) => Ok("[object Object]".to_string()),
            Value::Seq(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for &item in items {
                    match self.graph.get(item) {
                        Value::Seq(_) => {
                            return self.fail(
                                ErrorKind::InvalidKey,
                                "nested arrays are not supported inside keys",
                            );
                        }
                        Value::Map(_) => parts.push("[object Object]".to_string()),
                        Value::Scalar(s) => parts.push(s.canonical_string()),
                    }
                }
                Ok(parts.join(","))
            }
        }
    }

    fn merge_into(
        &mut self,
        dest: NodeId,
        source: &indexmap::IndexMap<String, NodeId>,
        overridable: &mut HashSet<String>,
    ) {
        for (key, &value) in source {
            let Value::Map(entries) = self.graph.get_mut(dest) else {
                return;
            };
            if entries.contains_key(key) {
                continue;
            }
            entries.insert(key.clone(), value);
            overridable.insert(key.clone());
        }
    }

    /// Store one key/value pair into the mapping node `dest`.
    ///
    /// Handles merge keys, duplicate detection (pointed at the second
    /// occurrence) and the `json` last-wins mode.
    fn store_mapping_pair(
        &mut self,
        dest: NodeId,
        overridable: &mut HashSet<String>,
        key_tag: Option<String>,
        key_node: Option<NodeId>,
        value_node: Option<NodeId>,
        start: Option<(usize, usize)>,
    ) -> Result<()> {
        if key_tag.as_deref() == Some(tags::MERGE) {
            let Some(value_id) = value_node else {
                return self.fail(
                    ErrorKind::Structural,
                    "cannot merge mappings; the provided source object is unacceptable",
                );
            };
            match self.graph.get(value_id).clone() {
                Value::Map(entries) => self.merge_into(dest, &entries, overridable),
                Value::Seq(items) => {
                    for item in items {
                        match self.graph.get(item).clone() {
                            Value::Map(entries) => self.merge_into(dest, &entries, overridable),
                            _ => {
                                return self.fail(
                                    ErrorKind::Structural,
                                    "cannot merge mappings; the provided source object is unacceptable",
                                );
                            }
                        }
                    }
                }
                _ => {
                    return self.fail(
                        ErrorKind::Structural,
                        "cannot merge mappings; the provided source object is unacceptable",
                    );
                }
            }
            return Ok(());
        }

        let key = self.canonical_key(key_node)?;
        let value = value_node.unwrap_or_else(|| self.graph.new_null());

        let already_present = matches!(self.graph.get(dest), Value::Map(m) if m.contains_key(&key));
        if !self.json_mode && !overridable.contains(&key) && already_present {
            let mark = match start {
                Some((pos, _)) => {
                    Mark::in_buffer(&self.src, pos, self.filename.clone())
                }
                None => self.mark(),
            };
            return Err(YamlError::new(ErrorKind::DuplicateKey, "duplicated mapping key")
                .with_mark(mark));
        }

        if let Value::Map(entries) = self.graph.get_mut(dest) {
            entries.insert(key.clone(), value);
        }
        overridable.remove(&key);
        Ok(())
    }

    //
    // Node properties
    //

    fn read_tag_property(&mut self) -> Result<bool> {
        if self.ch() != '!' {
            return Ok(false);
        }

        if self.tag.is_some() {
            return self.fail(ErrorKind::Structural, "duplication of a tag property");
        }

        self.position += 1;
        let mut c = self.ch();

        let mut is_verbatim = false;
        let mut is_named = false;
        let mut tag_handle = String::new();

        if c == '<' {
            is_verbatim = true;
            self.position += 1;
        } else if c == '!' {
            is_named = true;
            tag_handle.push_str("!!");
            self.position += 1;
        } else {
            tag_handle.push('!');
        }

        let mut name_start = self.position;
        let tag_name: String;

        if is_verbatim {
            loop {
                c = self.ch();
                if c == '\0' || c == '>' {
                    break;
                }
                self.position += 1;
            }
            if self.position < self.length {
                tag_name = self.input[name_start..self.position].iter().collect();
                self.position += 1;
            } else {
                return self.fail(
                    ErrorKind::Structural,
                    "unexpected end of the stream within a verbatim tag",
                );
            }
        } else {
            c = self.ch();
            while c != '\0' && !crate::scanner::is_ws_or_eol(c) {
                if c == '!' {
                    if !is_named {
                        tag_handle = self.input[name_start - 1..self.position + 1].iter().collect();
                        if !TAG_HANDLE_RE.is_match(&tag_handle) {
                            return self.fail(
                                ErrorKind::Structural,
                                "named tag handle cannot contain such characters",
                            );
                        }
                        is_named = true;
                        name_start = self.position + 1;
                    } else {
                        return self.fail(
                            ErrorKind::Structural,
                            "tag suffix cannot contain exclamation marks",
                        );
                    }
                }
                self.position += 1;
                c = self.ch();
            }

            tag_name = self.input[name_start..self.position].iter().collect();

            if has_flow_indicator(&tag_name) {
                return self.fail(
                    ErrorKind::Structural,
                    "tag suffix cannot contain flow indicator characters",
                );
            }
        }

        if !tag_name.is_empty() && !TAG_URI_RE.is_match(&tag_name) {
            return self.fail(
                ErrorKind::Structural,
                format!("tag name cannot contain such characters: {tag_name}"),
            );
        }

        if is_verbatim {
            self.tag = Some(tag_name);
        } else if let Some(prefix) = self.tag_map.get(&tag_handle) {
            self.tag = Some(format!("{prefix}{tag_name}"));
        } else if tag_handle == "!" {
            self.tag = Some(format!("!{tag_name}"));
        } else if tag_handle == "!!" {
            self.tag = Some(format!("tag:yaml.org,2002:{tag_name}"));
        } else {
            return self.fail(
                ErrorKind::Structural,
                format!("undeclared tag handle \"{tag_handle}\""),
            );
        }

        Ok(true)
    }

    fn read_anchor_property(&mut self) -> Result<bool> {
        if self.ch() != '&' {
            return Ok(false);
        }

        if self.anchor.is_some() {
            return self.fail(ErrorKind::Structural, "duplication of an anchor property");
        }

        self.position += 1;
        let name_start = self.position;
        let mut c = self.ch();
        while c != '\0' && !crate::scanner::is_ws_or_eol(c) && !crate::scanner::is_flow_indicator(c)
        {
            self.position += 1;
            c = self.ch();
        }

        if self.position == name_start {
            return self.fail(
                ErrorKind::Structural,
                "name of an anchor node must contain at least one character",
            );
        }

        self.anchor = Some(self.input[name_start..self.position].iter().collect());
        Ok(true)
    }

    fn read_alias(&mut self) -> Result<bool> {
        if self.ch() != '*' {
            return Ok(false);
        }

        self.position += 1;
        let name_start = self.position;
        let mut c = self.ch();
        while c != '\0' && !crate::scanner::is_ws_or_eol(c) && !crate::scanner::is_flow_indicator(c)
        {
            self.position += 1;
            c = self.ch();
        }

        if self.position == name_start {
            return self.fail(
                ErrorKind::Structural,
                "name of an alias node must contain at least one character",
            );
        }

        let alias: String = self.input[name_start..self.position].iter().collect();
        let Some(&id) = self.anchor_map.get(&alias) else {
            return self.fail(ErrorKind::Structural, format!("unidentified alias \"{alias}\""));
        };

        // An alias is the already-bound node, never a re-construction.
        self.result = Produced::Node(id);
        self.skip_separation_space(true, -1)?;
        Ok(true)
    }

    //
    // Collections
    //

    fn read_flow_collection(&mut self, node_indent: i64) -> Result<bool> {
        let (terminator, is_mapping) = match self.ch() {
            '[' => (']', false),
            '{' => ('}', true),
            _ => return Ok(false),
        };

        let saved_tag = self.tag.clone();
        let saved_anchor = self.anchor.clone();

        // The node exists before its children so that aliases can refer
        // back into it.
        let id = if is_mapping {
            self.graph.new_map(Vec::new())
        } else {
            self.graph.new_seq(Vec::new())
        };
        if let Some(anchor) = &self.anchor {
            self.anchor_map.insert(anchor.clone(), id);
        }

        self.position += 1;
        let mut read_next = true;
        let mut overridable = HashSet::new();

        while self.ch() != '\0' {
            self.skip_separation_space(true, node_indent)?;

            if self.ch() == terminator {
                self.position += 1;
                self.tag = saved_tag;
                self.anchor = saved_anchor;
                self.kind = Some(if is_mapping { Kind::Mapping } else { Kind::Sequence });
                self.result = Produced::Node(id);
                return Ok(true);
            }
            if !read_next {
                return self.fail(
                    ErrorKind::Structural,
                    "missed comma between flow collection entries",
                );
            }

            let mut is_pair = false;
            let mut is_explicit_pair = false;

            if self.ch() == '?' && crate::scanner::is_ws_or_eol(self.peek_at(1)) {
                is_pair = true;
                is_explicit_pair = true;
                self.position += 1;
                self.skip_separation_space(true, node_indent)?;
            }

            let entry_line = self.line;
            self.compose_node(node_indent, Context::FlowIn, false, true)?;
            let key_tag = self.tag.clone();
            let key_node = self.take_result();
            self.skip_separation_space(true, node_indent)?;

            let mut value_node = None;
            if (is_explicit_pair || self.line == entry_line) && self.ch() == ':' {
                is_pair = true;
                self.position += 1;
                self.skip_separation_space(true, node_indent)?;
                self.compose_node(node_indent, Context::FlowIn, false, true)?;
                value_node = self.take_result();
            }

            if is_mapping {
                self.store_mapping_pair(id, &mut overridable, key_tag, key_node, value_node, None)?;
            } else if is_pair {
                // A single-pair entry in a flow sequence becomes a one-entry
                // mapping.
                let pair = self.graph.new_map(Vec::new());
                self.store_mapping_pair(pair, &mut overridable, key_tag, key_node, value_node, None)?;
                if let Value::Seq(items) = self.graph.get_mut(id) {
                    items.push(pair);
                }
            } else {
                let element = key_node.unwrap_or_else(|| self.graph.new_null());
                if let Value::Seq(items) = self.graph.get_mut(id) {
                    items.push(element);
                }
            }

            self.skip_separation_space(true, node_indent)?;

            if self.ch() == ',' {
                read_next = true;
                self.position += 1;
            } else {
                read_next = false;
            }
        }

        self.fail(
            ErrorKind::Structural,
            "unexpected end of the stream within a flow collection",
        )
    }

    fn read_block_sequence(&mut self, node_indent: i64) -> Result<bool> {
        let saved_tag = self.tag.clone();
        let saved_anchor = self.anchor.clone();

        let id = self.graph.new_seq(Vec::new());
        if let Some(anchor) = &self.anchor {
            self.anchor_map.insert(anchor.clone(), id);
        }

        let mut detected = false;

        while self.ch() != '\0' {
            if self.ch() != '-' || !crate::scanner::is_ws_or_eol(self.peek_at(1)) {
                break;
            }

            detected = true;
            self.position += 1;

            if self.skip_separation_space(true, -1)? > 0 && self.line_indent <= node_indent {
                let element = self.graph.new_null();
                if let Value::Seq(items) = self.graph.get_mut(id) {
                    items.push(element);
                }
                continue;
            }

            let entry_line = self.line;
            self.compose_node(node_indent, Context::BlockIn, false, true)?;
            let element = self.take_result().unwrap_or_else(|| self.graph.new_null());
            if let Value::Seq(items) = self.graph.get_mut(id) {
                items.push(element);
            }
            self.skip_separation_space(true, -1)?;

            if (self.line == entry_line || self.line_indent > node_indent) && self.ch() != '\0' {
                return self.fail(ErrorKind::Structural, "bad indentation of a sequence entry");
            } else if self.line_indent < node_indent {
                break;
            }
        }

        if detected {
            self.tag = saved_tag;
            self.anchor = saved_anchor;
            self.kind = Some(Kind::Sequence);
            self.result = Produced::Node(id);
            return Ok(true);
        }
        Ok(false)
    }

    fn read_block_mapping(&mut self, node_indent: i64, flow_indent: i64) -> Result<bool> {
        let saved_tag = self.tag.clone();
        let saved_anchor = self.anchor.clone();

        let id = self.graph.new_map(Vec::new());
        if let Some(anchor) = &self.anchor {
            self.anchor_map.insert(anchor.clone(), id);
        }

        let mut overridable = HashSet::new();
        let mut detected = false;
        let mut at_explicit_key = false;
        let mut allow_compact = false;
        let mut key_tag: Option<String> = None;
        let mut key_node: Option<NodeId> = None;

        while self.ch() != '\0' {
            let c = self.ch();
            let following = self.peek_at(1);
            let entry_line = self.line;
            let entry_pos = self.position;

            if (c == '?' || c == ':') && crate::scanner::is_ws_or_eol(following) {
                // Explicit notation: a "?" block for the key, a ":" block
                // for the value.
                if c == '?' {
                    if at_explicit_key {
                        let kt = key_tag.take();
                        let kn = key_node.take();
                        self.store_mapping_pair(id, &mut overridable, kt, kn, None, None)?;
                    }
                    detected = true;
                    at_explicit_key = true;
                    allow_compact = true;
                } else if at_explicit_key {
                    at_explicit_key = false;
                    allow_compact = true;
                } else {
                    return self.fail(
                        ErrorKind::Structural,
                        "incomplete explicit mapping pair; a key node is missed; or followed by a non-tabulated empty line",
                    );
                }

                self.position += 1;
            } else if self.compose_node(flow_indent, Context::FlowOut, false, true)? {
                // Implicit notation: a flow-style node as the key, then ":"
                // and the value.
                if self.line == entry_line {
                    while crate::scanner::is_white_space(self.ch()) {
                        self.position += 1;
                    }

                    if self.ch() == ':' {
                        self.position += 1;
                        if !crate::scanner::is_ws_or_eol(self.ch()) {
                            return self.fail(
                                ErrorKind::Structural,
                                "a whitespace character is expected after the key-value separator within a block mapping",
                            );
                        }

                        if at_explicit_key {
                            let kt = key_tag.take();
                            let kn = key_node.take();
                            self.store_mapping_pair(id, &mut overridable, kt, kn, None, None)?;
                        }

                        detected = true;
                        at_explicit_key = false;
                        allow_compact = false;
                        key_tag = self.tag.clone();
                        key_node = self.take_result();
                    } else if detected {
                        return self.fail(
                            ErrorKind::Structural,
                            "can not read an implicit mapping pair; a colon is missed",
                        );
                    } else {
                        // A lone node at this indentation: it is the result
                        // of the enclosing compose, not a mapping.
                        self.tag = saved_tag;
                        self.anchor = saved_anchor;
                        return Ok(true);
                    }
                } else if detected {
                    return self.fail(
                        ErrorKind::Structural,
                        "can not read a block mapping entry; a multiline key may not be an implicit key",
                    );
                } else {
                    self.tag = saved_tag;
                    self.anchor = saved_anchor;
                    return Ok(true);
                }
            } else {
                break;
            }

            // Common reading code for both notations.
            if self.line == entry_line || self.line_indent > node_indent {
                if self.compose_node(node_indent, Context::BlockOut, true, allow_compact)? {
                    if at_explicit_key {
                        key_node = self.take_result();
                    } else {
                        let value_node = self.take_result();
                        let kt = key_tag.take();
                        let kn = key_node.take();
                        self.store_mapping_pair(
                            id,
                            &mut overridable,
                            kt,
                            kn,
                            value_node,
                            Some((entry_pos, entry_line)),
                        )?;
                    }
                } else if !at_explicit_key {
                    let kt = key_tag.take();
                    let kn = key_node.take();
                    self.store_mapping_pair(
                        id,
                        &mut overridable,
                        kt,
                        kn,
                        None,
                        Some((entry_pos, entry_line)),
                    )?;
                }

                self.skip_separation_space(true, -1)?;
            }

            if self.line_indent > node_indent && self.ch() != '\0' {
                return self.fail(ErrorKind::Structural, "bad indentation of a mapping entry");
            } else if self.line_indent < node_indent {
                break;
            }
        }

        // A trailing explicit key stores a null value.
        if at_explicit_key {
            let kt = key_tag.take();
            let kn = key_node.take();
            self.store_mapping_pair(id, &mut overridable, kt, kn, None, None)?;
        }

        if detected {
            self.tag = saved_tag;
            self.anchor = saved_anchor;
            self.kind = Some(Kind::Mapping);
            self.result = Produced::Node(id);
        }
        Ok(detected)
    }

    //
    // Node composition
    //

    pub(crate) fn compose_node(
        &mut self,
        parent_indent: i64,
        node_context: Context,
        allow_to_seek: bool,
        allow_compact: bool,
    ) -> Result<bool> {
        self.emit_event(NodeEvent::Open);

        self.tag = None;
        self.anchor = None;
        self.kind = None;
        self.result = Produced::None;

        let allow_block_styles = matches!(node_context, Context::BlockOut | Context::BlockIn);
        let allow_block_scalars = allow_block_styles;
        let mut allow_block_collections = allow_block_styles;
        let mut indent_status: i32 = 1; // 1: this > parent, 0: equal, -1: less
        let mut at_new_line = false;

        if allow_to_seek && self.skip_separation_space(true, -1)? > 0 {
            at_new_line = true;
            indent_status = indent_cmp(self.line_indent, parent_indent);
        }

        if indent_status == 1 {
            loop {
                let read_property =
                    self.read_tag_property()? || self.read_anchor_property()?;
                if !read_property {
                    break;
                }
                if self.skip_separation_space(true, -1)? > 0 {
                    at_new_line = true;
                    allow_block_collections = allow_block_styles;
                    indent_status = indent_cmp(self.line_indent, parent_indent);
                } else {
                    allow_block_collections = false;
                }
            }
        }

        if allow_block_collections {
            allow_block_collections = at_new_line || allow_compact;
        }

        let mut has_content = false;

        if indent_status == 1 || node_context == Context::BlockOut {
            let flow_indent = if matches!(node_context, Context::FlowIn | Context::FlowOut) {
                parent_indent
            } else {
                parent_indent + 1
            };
            let block_indent = (self.position - self.line_start) as i64;

            if indent_status == 1 {
                let read_collection = (allow_block_collections
                    && (self.read_block_sequence(block_indent)?
                        || self.read_block_mapping(block_indent, flow_indent)?))
                    || self.read_flow_collection(flow_indent)?;

                if read_collection {
                    has_content = true;
                } else {
                    if (allow_block_scalars && self.read_block_scalar(flow_indent)?)
                        || self.read_single_quoted_scalar(flow_indent)?
                        || self.read_double_quoted_scalar(flow_indent)?
                    {
                        has_content = true;
                    } else if self.read_alias()? {
                        has_content = true;
                        if self.tag.is_some() || self.anchor.is_some() {
                            return self.fail(
                                ErrorKind::Structural,
                                "alias node should not have any properties",
                            );
                        }
                    } else if self
                        .read_plain_scalar(flow_indent, node_context == Context::FlowIn)?
                    {
                        has_content = true;
                        if self.tag.is_none() {
                            self.tag = Some("?".to_string());
                        }
                    }
                }
            } else if indent_status == 0 {
                // Block sequences may sit at the parent's own indentation.
                has_content =
                    allow_block_collections && self.read_block_sequence(block_indent)?;
            }
        }

        self.resolve_tag()?;

        // Leftover raw content stays a plain string (this is also what a
        // non-specific "!" pins down).
        if let Produced::Raw(raw) = std::mem::replace(&mut self.result, Produced::None) {
            self.result = Produced::Node(self.graph.new_str(raw));
        }

        if let Some(anchor) = self.anchor.clone() {
            let id = match self.result {
                Produced::Node(id) => id,
                _ => {
                    // An anchored empty node binds an explicit null.
                    let id = self.graph.new_null();
                    self.result = Produced::Node(id);
                    id
                }
            };
            self.anchor_map.insert(anchor, id);
        }

        self.emit_event(NodeEvent::Close);
        Ok(self.tag.is_some() || self.anchor.is_some() || has_content)
    }

    fn resolve_tag(&mut self) -> Result<()> {
        let schema = self.schema;

        let Some(tag) = self.tag.clone() else {
            return Ok(());
        };

        if tag == "!" {
            // Non-specific "!": suppress implicit resolution entirely, so a
            // scalar stays a string whatever it looks like.
            return Ok(());
        }

        if tag == "?" {
            if let Produced::Raw(raw) = &self.result {
                let raw = raw.clone();
                for ty in schema.implicit_types() {
                    if !ty.resolves(Some(&raw)) {
                        continue;
                    }
                    let scalar = ty
                        .construct_scalar(Some(&raw))
                        .map_err(|e| self.err(ErrorKind::TagResolution, e))?;
                    self.result = Produced::Node(self.graph.new_scalar(scalar));
                    self.tag = Some(ty.tag.clone());
                    break;
                }
            }
            return Ok(());
        }

        let Some(ty) = schema.lookup(self.kind, &tag) else {
            return self.fail(ErrorKind::TagResolution, format!("unknown tag !<{tag}>"));
        };

        if let (Some(node_kind), true) =
            (self.kind, !matches!(self.result, Produced::None))
        {
            if ty.kind != node_kind {
                return self.fail(
                    ErrorKind::TagResolution,
                    format!(
                        "unacceptable node kind for !<{tag}> tag; it should be \"{}\", not \"{}\"",
                        ty.kind, node_kind
                    ),
                );
            }
        }

        match &self.result {
            Produced::Node(id) => {
                let id = *id;
                if !ty.resolves_node(&self.graph, id) {
                    return self.fail(
                        ErrorKind::TagResolution,
                        format!("cannot resolve a node with !<{tag}> explicit tag"),
                    );
                }
                let ty = Arc::clone(ty);
                ty.construct_collection(&mut self.graph, id)
                    .map_err(|e| self.err(ErrorKind::TagResolution, e))?;
            }
            Produced::Raw(_) | Produced::None => {
                let raw = match &self.result {
                    Produced::Raw(s) => Some(s.clone()),
                    _ => None,
                };
                // Resolution and construction run even for empty nodes, so
                // application types can observe or reject emptiness.
                if !ty.resolves(raw.as_deref()) {
                    return self.fail(
                        ErrorKind::TagResolution,
                        format!("cannot resolve a node with !<{tag}> explicit tag"),
                    );
                }
                let scalar = ty
                    .construct_scalar(raw.as_deref())
                    .map_err(|e| self.err(ErrorKind::TagResolution, e))?;
                self.result = Produced::Node(self.graph.new_scalar(scalar));
            }
        }

        Ok(())
    }

    //
    // Documents
    //

    fn handle_yaml_directive(&mut self, args: &[String]) -> Result<()> {
        if self.version.is_some() {
            return self.fail(ErrorKind::Structural, "duplication of %YAML directive");
        }
        if args.len() != 1 {
            return self.fail(
                ErrorKind::Structural,
                "YAML directive accepts exactly one argument",
            );
        }

        let Some((major_text, minor_text)) = args[0].split_once('.') else {
            return self.fail(
                ErrorKind::Structural,
                "ill-formed argument of the YAML directive",
            );
        };
        let (Ok(major), Ok(minor)) = (major_text.parse::<u32>(), minor_text.parse::<u32>())
        else {
            return self.fail(
                ErrorKind::Structural,
                "ill-formed argument of the YAML directive",
            );
        };

        if major != 1 {
            return self.fail(
                ErrorKind::Structural,
                "unacceptable YAML version of the document",
            );
        }

        self.version = Some(args[0].clone());
        self.check_line_breaks = minor < 2;

        if minor != 1 && minor != 2 {
            self.warn("unsupported YAML version of the document");
        }
        Ok(())
    }

    fn handle_tag_directive(&mut self, args: &[String]) -> Result<()> {
        if args.len() != 2 {
            return self.fail(
                ErrorKind::Structural,
                "TAG directive accepts exactly two arguments",
            );
        }
        let (handle, prefix) = (&args[0], &args[1]);

        if !TAG_HANDLE_RE.is_match(handle) {
            return self.fail(
                ErrorKind::Structural,
                "ill-formed tag handle (first argument) of the TAG directive",
            );
        }
        if self.tag_map.contains_key(handle) {
            return self.fail(
                ErrorKind::Structural,
                format!("there is a previously declared suffix for \"{handle}\" tag handle"),
            );
        }
        if !TAG_URI_RE.is_match(prefix) {
            return self.fail(
                ErrorKind::Structural,
                "ill-formed tag prefix (second argument) of the TAG directive",
            );
        }

        self.tag_map.insert(handle.clone(), prefix.clone());
        Ok(())
    }

    fn read_document(&mut self) -> Result<()> {
        let document_start = self.position;
        self.version = None;
        self.check_line_breaks = false;
        self.tag_map.clear();
        self.anchor_map.clear();

        let mut has_directives = false;

        while self.ch() != '\0' {
            self.skip_separation_space(true, -1)?;

            if self.line_indent > 0 || self.ch() != '%' {
                break;
            }

            has_directives = true;
            self.position += 1;
            let mut word_start = self.position;

            while self.ch() != '\0' && !crate::scanner::is_ws_or_eol(self.ch()) {
                self.position += 1;
            }
            let directive_name: String = self.input[word_start..self.position].iter().collect();
            let mut directive_args = Vec::new();

            if directive_name.is_empty() {
                return self.fail(
                    ErrorKind::Structural,
                    "directive name must not be less than one character in length",
                );
            }

            while self.ch() != '\0' {
                while crate::scanner::is_white_space(self.ch()) {
                    self.position += 1;
                }

                if self.ch() == '#' {
                    while self.ch() != '\0' && !crate::scanner::is_eol(self.ch()) {
                        self.position += 1;
                    }
                    break;
                }

                if crate::scanner::is_eol(self.ch()) {
                    break;
                }

                word_start = self.position;
                while self.ch() != '\0' && !crate::scanner::is_ws_or_eol(self.ch()) {
                    self.position += 1;
                }
                directive_args.push(self.input[word_start..self.position].iter().collect());
            }

            if self.ch() != '\0' {
                self.read_line_break()?;
            }

            match directive_name.as_str() {
                "YAML" => self.handle_yaml_directive(&directive_args)?,
                "TAG" => self.handle_tag_directive(&directive_args)?,
                _ => self.warn(&format!("unknown document directive \"{directive_name}\"")),
            }
        }

        self.skip_separation_space(true, -1)?;

        if self.line_indent == 0
            && self.ch() == '-'
            && self.peek_at(1) == '-'
            && self.peek_at(2) == '-'
        {
            self.position += 3;
            self.skip_separation_space(true, -1)?;
        } else if has_directives {
            return self.fail(ErrorKind::Structural, "directives end mark is expected");
        }

        self.compose_node(self.line_indent - 1, Context::BlockOut, false, true)?;
        self.skip_separation_space(true, -1)?;

        if self.check_line_breaks
            && self.input[document_start..self.position]
                .iter()
                .any(|&c| matches!(c, '\u{85}' | '\u{2028}' | '\u{2029}'))
        {
            self.warn("non-ASCII line breaks are interpreted as content");
        }

        let root = self.take_result();
        let graph = std::mem::take(&mut self.graph);
        self.documents.push(Document::from_parts(graph, root));

        if self.position == self.line_start && self.test_document_separator() {
            if self.ch() == '.' {
                self.position += 3;
                self.skip_separation_space(true, -1)?;
            }
            return Ok(());
        }

        if self.position < self.length.saturating_sub(1) {
            return self.fail(
                ErrorKind::Structural,
                "end of the stream or a document separator is expected",
            );
        }
        Ok(())
    }
}

fn indent_cmp(line_indent: i64, parent_indent: i64) -> i32 {
    if line_indent > parent_indent {
        1
    } else if line_indent == parent_indent {
        0
    } else {
        -1
    }
}

fn load_documents(input: &str, options: LoadOptions<'_>) -> Result<Vec<Document>> {
    let mut loader = Loader::new(input, options);

    while loader.ch() == ' ' {
        loader.line_indent += 1;
        loader.position += 1;
    }

    while loader.length > 0 && loader.position < loader.length - 1 {
        loader.read_document()?;
    }

    Ok(std::mem::take(&mut loader.documents))
}

/// Parse all `---`/`...`-delimited documents in `input`.
pub fn load_all(input: &str, options: LoadOptions<'_>) -> Result<Vec<Document>> {
    load_documents(input, options)
}

/// Parse exactly one document.
///
/// An empty stream yields a [`Document`] with no root.
///
/// # Errors
///
/// Fails on malformed input, and when the stream holds more than one
/// document.
pub fn load(input: &str, options: LoadOptions<'_>) -> Result<Document> {
    let mut documents = load_documents(input, options)?;
    match documents.len() {
        0 => Ok(Document::new()),
        1 => Ok(documents.remove(0)),
        _ => Err(YamlError::new(
            ErrorKind::Structural,
            "expected a single document in the stream, but found more",
        )),
    }
}

/// [`load`] pinned to the safe schema (no `js/*` types).
pub fn safe_load(input: &str, mut options: LoadOptions<'_>) -> Result<Document> {
    options.schema = &DEFAULT_SAFE;
    load(input, options)
}

/// [`load_all`] pinned to the safe schema (no `js/*` types).
pub fn safe_load_all(input: &str, mut options: LoadOptions<'_>) -> Result<Vec<Document>> {
    options.schema = &DEFAULT_SAFE;
    load_all(input, options)
}
