//! The serializer: turns value graphs back into YAML text.
//!
//! Style selection follows a fixed set of heuristics: plain scalars where
//! possible, single/double quoting when content demands it, literal/folded
//! block styles for multiline or overlong strings, and block/flow collection
//! styles governed by `flow_level`. A reference-counting pre-pass assigns
//! anchors to every collection reachable more than once, which is what makes
//! shared and cyclic graphs serializable.

use std::collections::{HashMap, HashSet};

use crate::error::{ErrorKind, Result, YamlError};
use crate::schema::{DEFAULT_FULL, DEFAULT_SAFE, Represent, Schema};
use crate::value::{Document, Graph, NodeId, Scalar, Value};

const DEPRECATED_BOOLEANS: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "on", "On", "ON", "n", "N", "no", "No", "NO", "off", "Off",
    "OFF",
];

/// Mapping key order in dumped output.
#[derive(Default)]
pub enum SortKeys {
    /// Insertion order (the default).
    #[default]
    No,
    /// Lexicographic order.
    Yes,
    /// A custom comparator.
    Compare(Box<dyn Fn(&str, &str) -> std::cmp::Ordering>),
}

/// Preferred quote character for scalars that need quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotingType {
    #[default]
    Single,
    Double,
}

/// Options for [`dump`].
pub struct DumpOptions<'a> {
    /// Schema whose predicates/representers drive typed output.
    pub schema: &'a Schema,
    /// Indentation width; `0` means the default of 2, and 1 is the floor.
    pub indent: usize,
    /// Do not add an extra indentation level to block sequences.
    pub no_array_indent: bool,
    /// Skip unrepresentable values instead of failing.
    pub skip_invalid: bool,
    /// Nesting depth beyond which collections use flow style; `-1` never.
    pub flow_level: i64,
    /// Tag name → style name overrides (e.g. `"!!int" => "hexadecimal"`).
    pub styles: HashMap<String, String>,
    pub sort_keys: SortKeys,
    /// Preferred line width for folding; `-1` disables folding.
    pub line_width: i64,
    /// Skip the reference pre-pass (no anchors are emitted).
    pub no_refs: bool,
    /// Do not quote strings that older YAML 1.1 readers parse as booleans.
    pub no_compat_mode: bool,
    /// Remove separator spaces in flow collections and double-quote flow
    /// mapping keys.
    pub condense_flow: bool,
    pub quoting_type: QuotingType,
    /// Quote every scalar, even where plain style would do.
    pub force_quotes: bool,
}

impl Default for DumpOptions<'_> {
    fn default() -> Self {
        DumpOptions {
            schema: &DEFAULT_FULL,
            indent: 2,
            no_array_indent: false,
            skip_invalid: false,
            flow_level: -1,
            styles: HashMap::new(),
            sort_keys: SortKeys::No,
            line_width: 80,
            no_refs: false,
            no_compat_mode: false,
            condense_flow: false,
            quoting_type: QuotingType::Single,
            force_quotes: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarStyle {
    Plain,
    Single,
    Literal,
    Folded,
    Double,
}

/// Serialize a document.
///
/// # Errors
///
/// Fails when a value is not representable under the active schema and
/// `skip_invalid` is unset.
pub fn dump(document: &Document, options: DumpOptions<'_>) -> Result<String> {
    match document.root {
        Some(root) => dump_node(&document.graph, root, options),
        None => {
            // An empty document serializes the way an explicit null does.
            let mut graph = Graph::new();
            let root = graph.new_null();
            dump_node(&graph, root, options)
        }
    }
}

/// Serialize a single node of a graph.
pub fn dump_node(graph: &Graph, root: NodeId, options: DumpOptions<'_>) -> Result<String> {
    let mut dumper = Dumper::new(graph, options);

    if !dumper.no_refs {
        dumper.collect_duplicate_references(root);
    }

    if dumper.write_node(0, root, true, true, false)? {
        Ok(format!("{}\n", dumper.dump))
    } else {
        Ok(String::new())
    }
}

/// [`dump`] pinned to the safe schema (no `js/*` types).
pub fn safe_dump(document: &Document, mut options: DumpOptions<'_>) -> Result<String> {
    options.schema = &DEFAULT_SAFE;
    dump(document, options)
}

struct Dumper<'a> {
    graph: &'a Graph,
    schema: &'a Schema,
    indent: usize,
    no_array_indent: bool,
    skip_invalid: bool,
    flow_level: i64,
    style_map: HashMap<String, String>,
    sort_keys: SortKeys,
    line_width: i64,
    no_refs: bool,
    no_compat_mode: bool,
    condense_flow: bool,
    quoting_type: QuotingType,
    force_quotes: bool,

    tag: Option<String>,
    dump: String,
    duplicates: Vec<NodeId>,
    used_duplicates: Vec<bool>,
}

impl<'a> Dumper<'a> {
    fn new(graph: &'a Graph, options: DumpOptions<'a>) -> Self {
        let indent = if options.indent == 0 { 2 } else { options.indent.max(1) };
        let style_map = compile_style_map(options.schema, &options.styles);

        Dumper {
            graph,
            schema: options.schema,
            indent,
            no_array_indent: options.no_array_indent,
            skip_invalid: options.skip_invalid,
            flow_level: options.flow_level,
            style_map,
            sort_keys: options.sort_keys,
            line_width: options.line_width,
            no_refs: options.no_refs,
            no_compat_mode: options.no_compat_mode,
            condense_flow: options.condense_flow,
            quoting_type: options.quoting_type,
            force_quotes: options.force_quotes,
            tag: None,
            dump: String::new(),
            duplicates: Vec::new(),
            used_duplicates: Vec::new(),
        }
    }

    //
    // Reference pre-pass
    //

    fn collect_duplicate_references(&mut self, root: NodeId) {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut repeated = HashSet::new();
        self.inspect_node(root, &mut visited, &mut order, &mut repeated);

        // Anchor ids follow first-visit order.
        self.duplicates = order.into_iter().filter(|id| repeated.contains(id)).collect();
        self.used_duplicates = vec![false; self.duplicates.len()];
    }

    fn inspect_node(
        &self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
        repeated: &mut HashSet<NodeId>,
    ) {
        match self.graph.get(id) {
            Value::Scalar(_) => {}
            Value::Seq(items) => {
                if !visited.insert(id) {
                    repeated.insert(id);
                    return;
                }
                order.push(id);
                for &item in items {
                    self.inspect_node(item, visited, order, repeated);
                }
            }
            Value::Map(entries) => {
                if !visited.insert(id) {
                    repeated.insert(id);
                    return;
                }
                order.push(id);
                for &value in entries.values() {
                    self.inspect_node(value, visited, order, repeated);
                }
            }
        }
    }

    fn anchor_name(index: usize) -> String {
        format!("id{:03}", index + 1)
    }

    //
    // Type detection
    //

    fn detect_type(&mut self, scalar: &Scalar, explicit: bool) -> Result<bool> {
        let schema = self.schema;
        let type_list = if explicit {
            schema.explicit_types()
        } else {
            schema.implicit_types()
        };

        for ty in type_list {
            let Some(predicate) = &ty.predicate else {
                continue;
            };
            if !predicate(scalar) {
                continue;
            }

            self.tag = Some(if explicit { ty.tag.clone() } else { "?".to_string() });

            if let Some(represent) = &ty.represent {
                let style = self
                    .style_map
                    .get(&ty.tag)
                    .cloned()
                    .or_else(|| ty.default_style.clone());

                self.dump = match represent {
                    Represent::Single(f) => f(scalar, style.as_deref()),
                    Represent::Styled(by_style) => {
                        let style_name = style.as_deref().unwrap_or("");
                        match by_style.get(style_name) {
                            Some(f) => f(scalar, style.as_deref()),
                            None => {
                                return Err(YamlError::new(
                                    ErrorKind::Representation,
                                    format!(
                                        "!<{}> tag resolver accepts not \"{style_name}\" style",
                                        ty.tag
                                    ),
                                ));
                            }
                        }
                    }
                };
            }

            return Ok(true);
        }

        Ok(false)
    }

    fn test_implicit_resolving(&self, text: &str) -> bool {
        self.schema
            .implicit_types()
            .iter()
            .any(|ty| ty.resolves(Some(text)))
    }

    //
    // Writers
    //

    fn generate_next_line(&self, level: i64) -> String {
        let pad = self.indent * level.max(0) as usize;
        format!("\n{}", " ".repeat(pad))
    }

    /// Serialize the node `id` into `self.dump`. Returns false when the
    /// value is invalid and `skip_invalid` is set.
    fn write_node(
        &mut self,
        level: i64,
        id: NodeId,
        block: bool,
        compact: bool,
        iskey: bool,
    ) -> Result<bool> {
        self.tag = None;
        self.dump = String::new();

        let is_collection = matches!(self.graph.get(id), Value::Seq(_) | Value::Map(_));
        let mut represented = false;

        if let Value::Scalar(scalar) = self.graph.get(id) {
            let scalar = scalar.clone();
            represented = self.detect_type(&scalar, false)?;
            if !represented {
                represented = self.detect_type(&scalar, true)?;
            }
        }

        let block = block && (self.flow_level < 0 || self.flow_level > level);

        let (duplicate_index, duplicate) = if is_collection {
            match self.duplicates.iter().position(|&d| d == id) {
                Some(index) => (index, true),
                None => (0, false),
            }
        } else {
            (0, false)
        };

        let has_tag = matches!(self.tag.as_deref(), Some(t) if t != "?");
        let mut compact = compact;
        if has_tag || duplicate || (self.indent != 2 && level > 0) {
            compact = false;
        }

        if duplicate && self.used_duplicates[duplicate_index] {
            self.dump = format!("*{}", Self::anchor_name(duplicate_index));
            return Ok(true);
        }

        if is_collection && duplicate {
            self.used_duplicates[duplicate_index] = true;
        }

        match self.graph.get(id) {
            Value::Seq(items) => {
                let items = items.clone();
                let array_level = if self.no_array_indent && level > 0 { level - 1 } else { level };
                if block && !items.is_empty() {
                    self.write_block_sequence(array_level, &items, compact)?;
                    if duplicate {
                        self.dump = format!("&{}{}", Self::anchor_name(duplicate_index), self.dump);
                    }
                } else {
                    self.write_flow_sequence(array_level, &items)?;
                    if duplicate {
                        self.dump =
                            format!("&{} {}", Self::anchor_name(duplicate_index), self.dump);
                    }
                }
            }
            Value::Map(entries) => {
                let entries: Vec<(String, NodeId)> =
                    entries.iter().map(|(k, &v)| (k.clone(), v)).collect();
                if block && !entries.is_empty() {
                    self.write_block_mapping(level, &entries, compact)?;
                    if duplicate {
                        self.dump = format!("&{}{}", Self::anchor_name(duplicate_index), self.dump);
                    }
                } else {
                    self.write_flow_mapping(level, &entries)?;
                    if duplicate {
                        self.dump =
                            format!("&{} {}", Self::anchor_name(duplicate_index), self.dump);
                    }
                }
            }
            Value::Scalar(scalar) => {
                let scalar = scalar.clone();
                let text = if represented {
                    Some(self.dump.clone())
                } else if let Scalar::Str(s) = &scalar {
                    Some(s.clone())
                } else {
                    None
                };

                match text {
                    Some(text) => {
                        if self.tag.as_deref() != Some("?") {
                            self.write_scalar(&text, level, iskey);
                        } else {
                            self.dump = text;
                        }
                    }
                    None => {
                        if self.skip_invalid {
                            return Ok(false);
                        }
                        return Err(YamlError::new(
                            ErrorKind::Representation,
                            format!("unacceptable kind of an object to dump {scalar:?}"),
                        ));
                    }
                }
            }
        }

        if let Some(tag) = &self.tag {
            if tag != "?" {
                self.dump = format!("!<{tag}> {}", self.dump);
            }
        }

        Ok(true)
    }

    /// Serialize a mapping key, which in this value model is always a
    /// string.
    fn write_key(&mut self, level: i64, key: &str, iskey: bool) {
        self.tag = None;
        self.write_scalar(key, level, iskey);
    }

    fn write_flow_sequence(&mut self, level: i64, items: &[NodeId]) -> Result<()> {
        let mut result = String::new();
        let saved_tag = self.tag.take();

        for (index, &item) in items.iter().enumerate() {
            if self.write_node(level, item, false, false, false)? {
                if index != 0 {
                    result.push(',');
                    if !self.condense_flow {
                        result.push(' ');
                    }
                }
                result.push_str(&self.dump);
            }
        }

        self.tag = saved_tag;
        self.dump = format!("[{result}]");
        Ok(())
    }

    fn write_block_sequence(&mut self, level: i64, items: &[NodeId], compact: bool) -> Result<()> {
        let mut result = String::new();
        let saved_tag = self.tag.take();

        for (index, &item) in items.iter().enumerate() {
            if self.write_node(level + 1, item, true, true, false)? {
                if !compact || index != 0 {
                    result.push_str(&self.generate_next_line(level));
                }
                if self.dump.starts_with('\n') {
                    result.push('-');
                } else {
                    result.push_str("- ");
                }
                result.push_str(&self.dump);
            }
        }

        self.tag = saved_tag;
        self.dump = if result.is_empty() { "[]".to_string() } else { result };
        Ok(())
    }

    fn write_flow_mapping(&mut self, level: i64, entries: &[(String, NodeId)]) -> Result<()> {
        let mut result = String::new();
        let saved_tag = self.tag.take();

        for (index, (key, value)) in entries.iter().enumerate() {
            let mut pair = if self.condense_flow { "\"".to_string() } else { String::new() };
            if index != 0 {
                pair.push_str(", ");
            }

            self.write_key(level, key, false);

            if self.dump.chars().count() > 1024 {
                pair.push_str("? ");
            }
            pair.push_str(&self.dump);
            if self.condense_flow {
                pair.push('"');
            }
            pair.push(':');
            if !self.condense_flow {
                pair.push(' ');
            }

            if !self.write_node(level, *value, false, false, false)? {
                continue;
            }
            pair.push_str(&self.dump);

            result.push_str(&pair);
        }

        self.tag = saved_tag;
        self.dump = format!("{{{result}}}");
        Ok(())
    }

    fn write_block_mapping(
        &mut self,
        level: i64,
        entries: &[(String, NodeId)],
        compact: bool,
    ) -> Result<()> {
        let mut ordered = entries.to_vec();
        match &self.sort_keys {
            SortKeys::No => {}
            SortKeys::Yes => ordered.sort_by(|a, b| a.0.cmp(&b.0)),
            SortKeys::Compare(comparator) => {
                ordered.sort_by(|a, b| comparator(&a.0, &b.0));
            }
        }

        let mut result = String::new();
        let saved_tag = self.tag.take();

        for (index, (key, value)) in ordered.iter().enumerate() {
            let mut pair = if index != 0 || !compact {
                self.generate_next_line(level)
            } else {
                String::new()
            };

            self.write_key(level + 1, key, true);

            // Over-long keys switch to the explicit "? key" form.
            let explicit_pair = self.dump.chars().count() > 1024;

            if explicit_pair {
                if self.dump.starts_with('\n') {
                    pair.push('?');
                } else {
                    pair.push_str("? ");
                }
            }
            pair.push_str(&self.dump);
            if explicit_pair {
                pair.push_str(&self.generate_next_line(level));
            }

            if !self.write_node(level + 1, *value, true, explicit_pair, false)? {
                continue;
            }

            if self.dump.starts_with('\n') {
                pair.push(':');
            } else {
                pair.push_str(": ");
            }
            pair.push_str(&self.dump);

            result.push_str(&pair);
        }

        self.tag = saved_tag;
        self.dump = if result.is_empty() { "{}".to_string() } else { result };
        Ok(())
    }

    //
    // Scalars
    //

    fn quoted_single_line(&self, text: &str) -> String {
        match self.quoting_type {
            QuotingType::Single => format!("'{}'", text.replace('\'', "''")),
            QuotingType::Double => format!("\"{}\"", escape_string(text)),
        }
    }

    fn write_scalar(&mut self, text: &str, level: i64, iskey: bool) {
        if text.is_empty() {
            self.dump = match self.quoting_type {
                QuotingType::Single => "''".to_string(),
                QuotingType::Double => "\"\"".to_string(),
            };
            return;
        }

        if !self.no_compat_mode && DEPRECATED_BOOLEANS.contains(&text) {
            self.dump = self.quoted_single_line(text);
            return;
        }

        let indent = self.indent * level.max(1) as usize;
        // As indentation gets deeper, let the width decrease monotonically to
        // the lower bound min(line_width, 40).
        let width = if self.line_width == -1 {
            -1
        } else {
            (self.line_width - indent as i64).max(self.line_width.min(40))
        };

        // Keys and flow contexts are restricted to one line.
        let single_line_only = iskey || (self.flow_level > -1 && level >= self.flow_level);

        match self.choose_scalar_style(text, single_line_only, width) {
            ScalarStyle::Plain => {
                self.dump = text.to_string();
            }
            ScalarStyle::Single => {
                self.dump = format!("'{}'", text.replace('\'', "''"));
            }
            ScalarStyle::Double => {
                self.dump = format!("\"{}\"", escape_string(text));
            }
            ScalarStyle::Literal => {
                let body = drop_ending_newline(&indent_string(text, indent));
                self.dump = format!("|{}{}", block_header(text, self.indent), body);
            }
            ScalarStyle::Folded => {
                let folded = fold_string(text, width.max(1) as usize);
                let body = drop_ending_newline(&indent_string(&folded, indent));
                self.dump = format!(">{}{}", block_header(text, self.indent), body);
            }
        }
    }

    /// Determine which scalar styles are possible and pick the preferred
    /// one. With a width of -1 nothing is considered foldable.
    fn choose_scalar_style(
        &self,
        text: &str,
        single_line_only: bool,
        width: i64,
    ) -> ScalarStyle {
        let chars: Vec<char> = text.chars().collect();
        let should_track_width = width != -1;

        let mut has_line_break = false;
        let mut has_foldable_line = false;
        let mut previous_line_break: i64 = -1;
        let mut plain =
            is_plain_safe_first(chars[0]) && !is_dump_whitespace(chars[chars.len() - 1]);

        if single_line_only {
            for &c in &chars {
                if !is_dump_printable(c) {
                    return ScalarStyle::Double;
                }
                plain = plain && is_plain_safe(c);
            }
        } else {
            for (i, &c) in chars.iter().enumerate() {
                if c == '\n' {
                    has_line_break = true;
                    if !has_foldable_line && should_track_width {
                        has_foldable_line = i as i64 - previous_line_break - 1 > width
                            && chars.get((previous_line_break + 1) as usize) != Some(&' ');
                        previous_line_break = i as i64;
                    }
                } else if !is_dump_printable(c) {
                    return ScalarStyle::Double;
                }
                plain = plain && is_plain_safe(c);
            }
            if !has_foldable_line && should_track_width {
                has_foldable_line = chars.len() as i64 - previous_line_break - 1 > width
                    && chars.get((previous_line_break + 1) as usize) != Some(&' ');
            }
        }

        if !has_line_break && !has_foldable_line {
            // Strings interpretable as another type have to be quoted,
            // e.g. the string "true" vs. the boolean true.
            if plain && !self.force_quotes && !self.test_implicit_resolving(text) {
                return ScalarStyle::Plain;
            }
            return match self.quoting_type {
                QuotingType::Single => ScalarStyle::Single,
                QuotingType::Double => ScalarStyle::Double,
            };
        }

        // The block indentation indicator is a single digit.
        if self.indent > 9 && needs_indent_indicator(text) {
            return ScalarStyle::Double;
        }

        if has_foldable_line {
            ScalarStyle::Folded
        } else {
            ScalarStyle::Literal
        }
    }
}

//
// Character classes (output side)
//

/// Printable per the dumper: anything else is escaped. Unlike the input
/// side, astral codepoints are escaped (`\UXXXXXXXX`) rather than emitted
/// raw.
fn is_dump_printable(c: char) -> bool {
    let v = c as u32;
    (0x20..=0x7E).contains(&v)
        || ((0xA1..=0xD7FF).contains(&v) && v != 0x2028 && v != 0x2029)
        || ((0xE000..=0xFFFD).contains(&v) && v != 0xFEFF)
}

fn is_dump_whitespace(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Allowed after the first character of a plain scalar.
fn is_plain_safe(c: char) -> bool {
    is_dump_printable(c) && c != '\u{FEFF}' && !matches!(c, ',' | '[' | ']' | '{' | '}' | ':' | '#')
}

/// Allowed as the first character of a plain scalar.
fn is_plain_safe_first(c: char) -> bool {
    is_dump_printable(c)
        && c != '\u{FEFF}'
        && !is_dump_whitespace(c)
        && !matches!(
            c,
            '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>'
                | '\'' | '"' | '%' | '@' | '`'
        )
}

fn escape_char(c: char) -> Option<&'static str> {
    Some(match c {
        '\0' => "\\0",
        '\u{07}' => "\\a",
        '\u{08}' => "\\b",
        '\t' => "\\t",
        '\n' => "\\n",
        '\u{0B}' => "\\v",
        '\u{0C}' => "\\f",
        '\r' => "\\r",
        '\u{1B}' => "\\e",
        '"' => "\\\"",
        '\\' => "\\\\",
        '\u{85}' => "\\N",
        '\u{A0}' => "\\_",
        '\u{2028}' => "\\L",
        '\u{2029}' => "\\P",
        _ => return None,
    })
}

fn encode_hex(c: char) -> String {
    let v = c as u32;
    if v <= 0xFF {
        format!("\\x{v:02X}")
    } else if v <= 0xFFFF {
        format!("\\u{v:04X}")
    } else {
        format!("\\U{v:08X}")
    }
}

/// Escape the body of a double-quoted scalar.
fn escape_string(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        if let Some(seq) = escape_char(c) {
            result.push_str(seq);
        } else if is_dump_printable(c) {
            result.push(c);
        } else {
            result.push_str(&encode_hex(c));
        }
    }
    result
}

/// A block scalar needs an explicit indentation indicator when its content
/// begins with a space or a newline-then-space.
fn needs_indent_indicator(text: &str) -> bool {
    text.trim_start_matches('\n').starts_with(' ')
}

fn drop_ending_newline(text: &str) -> String {
    text.strip_suffix('\n').unwrap_or(text).to_string()
}

fn indent_string(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the `|`/`>` header: optional indentation indicator, chomping
/// indicator reproducing the body's trailing-newline shape, then a break.
fn block_header(text: &str, indent_per_level: usize) -> String {
    let indicator = if needs_indent_indicator(text) {
        indent_per_level.to_string()
    } else {
        String::new()
    };

    // The string "\n" counts as one trailing empty line.
    let clip = text.ends_with('\n');
    let keep = clip && (text.len() >= 2 && text.as_bytes()[text.len() - 2] == b'\n' || text == "\n");
    let chomp = if keep {
        "+"
    } else if clip {
        ""
    } else {
        "-"
    };

    format!("{indicator}{chomp}\n")
}

/// Greedy line breaking at single spaces; more-indented lines are never
/// broken since an inserted break would change their content.
fn fold_line(line: &str, width: usize) -> String {
    if line.is_empty() || line.starts_with(' ') {
        return line.to_string();
    }

    let chars: Vec<char> = line.chars().collect();
    let mut result = String::new();
    let mut start: usize = 0;
    let mut curr: usize = 0;

    // Break positions: a space followed by a non-space (index <= len - 2).
    for next in 0..chars.len().saturating_sub(1) {
        if chars[next] != ' ' || chars[next + 1] == ' ' {
            continue;
        }
        if next - start > width {
            let end = if curr > start { curr } else { next };
            result.push('\n');
            result.extend(&chars[start..end]);
            start = end + 1;
        }
        curr = next;
    }

    result.push('\n');
    if chars.len() - start > width && curr > start {
        result.extend(&chars[start..curr]);
        result.push('\n');
        result.extend(&chars[curr + 1..]);
    } else {
        result.extend(&chars[start..]);
    }

    // Drop the leading joiner.
    result[1..].to_string()
}

/// Fold a multi-line string: each chunk is newline(s) followed by one
/// content line; k consecutive newlines become k+1 unless adjacent to a
/// more-indented line or at the edges.
fn fold_string(text: &str, width: usize) -> String {
    let first_break = text.find('\n').unwrap_or(text.len());
    let mut result = fold_line(&text[..first_break], width);
    let mut prev_more_indented = text.starts_with('\n') || text.starts_with(' ');
    let mut rest = &text[first_break..];

    while !rest.is_empty() {
        let breaks = rest.bytes().take_while(|&b| b == b'\n').count();
        let prefix = &rest[..breaks];
        rest = &rest[breaks..];

        let line_end = rest.find('\n').unwrap_or(rest.len());
        let line = &rest[..line_end];
        rest = &rest[line_end..];

        let more_indented = line.starts_with(' ');
        result.push_str(prefix);
        if !prev_more_indented && !more_indented && !line.is_empty() {
            result.push('\n');
        }
        result.push_str(&fold_line(line, width));
        prev_more_indented = more_indented;
    }

    result
}

fn compile_style_map(schema: &Schema, styles: &HashMap<String, String>) -> HashMap<String, String> {
    let mut result = HashMap::new();

    for (tag, style) in styles {
        let tag = if let Some(suffix) = tag.strip_prefix("!!") {
            format!("tag:yaml.org,2002:{suffix}")
        } else {
            tag.clone()
        };

        let style = match schema.lookup_any(&tag) {
            Some(ty) => ty
                .style_aliases
                .get(style)
                .cloned()
                .unwrap_or_else(|| style.clone()),
            None => style.clone(),
        };

        result.insert(tag, style);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Graph;

    fn dump_root(build: impl FnOnce(&mut Graph) -> NodeId) -> String {
        let mut graph = Graph::new();
        let root = build(&mut graph);
        dump_node(&graph, root, DumpOptions::default()).unwrap()
    }

    #[test]
    fn test_scalar_output() {
        assert_eq!(dump_root(|g| g.new_int(42)), "42\n");
        assert_eq!(dump_root(|g| g.new_str("hello")), "hello\n");
        assert_eq!(dump_root(|g| g.new_null()), "null\n");
        assert_eq!(dump_root(|g| g.new_bool(true)), "true\n");
    }

    #[test]
    fn test_negative_zero() {
        assert_eq!(dump_root(|g| g.new_float(-0.0)), "-0.0\n");
    }

    #[test]
    fn test_floats_never_look_like_ints() {
        assert_eq!(dump_root(|g| g.new_float(1.0)), "1.0\n");
    }

    #[test]
    fn test_sequence_indentation() {
        let out = dump_root(|g| {
            let foo = g.new_str("foo");
            let bar = g.new_str("bar");
            let baz = g.new_str("baz");
            let seq = g.new_seq(vec![foo, bar, baz]);
            g.new_map(vec![("data".into(), seq)])
        });
        assert_eq!(out, "data:\n  - foo\n  - bar\n  - baz\n");
    }

    #[test]
    fn test_no_array_indent() {
        let mut graph = Graph::new();
        let one = graph.new_int(1);
        let seq = graph.new_seq(vec![one]);
        let root = graph.new_map(vec![("data".into(), seq)]);
        let out = dump_node(
            &graph,
            root,
            DumpOptions {
                no_array_indent: true,
                ..DumpOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, "data:\n- 1\n");
    }

    #[test]
    fn test_condensed_flow() {
        let mut graph = Graph::new();
        let c = graph.new_str("c");
        let inner = graph.new_map(vec![("b".into(), c)]);
        let root = graph.new_map(vec![("a".into(), inner)]);
        let out = dump_node(
            &graph,
            root,
            DumpOptions {
                flow_level: 0,
                indent: 0,
                condense_flow: true,
                ..DumpOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, "{\"a\":{\"b\":c}}\n");
    }

    #[test]
    fn test_astral_is_escaped() {
        assert_eq!(dump_root(|g| g.new_str("\u{1F600}")), "\"\\U0001F600\"\n");
    }

    #[test]
    fn test_ambiguous_strings_are_quoted() {
        assert_eq!(dump_root(|g| g.new_str("true")), "'true'\n");
        assert_eq!(dump_root(|g| g.new_str("123")), "'123'\n");
        assert_eq!(dump_root(|g| g.new_str("yes")), "'yes'\n");
    }

    #[test]
    fn test_no_compat_mode_leaves_legacy_booleans_bare() {
        let mut graph = Graph::new();
        let root = graph.new_str("yes");
        let out = dump_node(
            &graph,
            root,
            DumpOptions {
                no_compat_mode: true,
                ..DumpOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, "yes\n");
    }

    #[test]
    fn test_shared_reference_gets_anchor() {
        let mut graph = Graph::new();
        let x = graph.new_int(1);
        let shared = graph.new_seq(vec![x]);
        let root = graph.new_map(vec![("a".into(), shared), ("b".into(), shared)]);
        let out = dump_node(&graph, root, DumpOptions::default()).unwrap();
        assert!(out.contains("&id001"), "{out:?}");
        assert!(out.contains("*id001"), "{out:?}");
    }

    #[test]
    fn test_unrepresentable_value() {
        let mut graph = Graph::new();
        let root = graph.new_scalar(Scalar::Merge);
        let err = dump_node(&graph, root, DumpOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Representation);

        let out = dump_node(
            &graph,
            root,
            DumpOptions {
                skip_invalid: true,
                ..DumpOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_sort_keys() {
        let mut graph = Graph::new();
        let one = graph.new_int(1);
        let two = graph.new_int(2);
        let root = graph.new_map(vec![("b".into(), one), ("a".into(), two)]);
        let out = dump_node(
            &graph,
            root,
            DumpOptions {
                sort_keys: SortKeys::Yes,
                ..DumpOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, "a: 2\nb: 1\n");
    }

    #[test]
    fn test_int_style_override() {
        let mut graph = Graph::new();
        let root = graph.new_int(255);
        let out = dump_node(
            &graph,
            root,
            DumpOptions {
                styles: HashMap::from([("!!int".to_string(), "hexadecimal".to_string())]),
                ..DumpOptions::default()
            },
        )
        .unwrap();
        assert_eq!(out, "0xff\n");
    }

    #[test]
    fn test_folding_respects_width() {
        let long = "word ".repeat(30).trim_end().to_string();
        let mut graph = Graph::new();
        let value = graph.new_str(long);
        let root = graph.new_map(vec![("text".into(), value)]);
        let out = dump_node(&graph, root, DumpOptions::default()).unwrap();
        assert!(out.starts_with("text: >"), "{out:?}");
        for line in out.lines() {
            assert!(line.chars().count() <= 80, "{line:?}");
        }
    }
}
