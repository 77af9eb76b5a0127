//! The runtime value graph.
//!
//! Loaded YAML lives in an arena: a [`Graph`] owns every node and a
//! [`NodeId`] is an index into it. Anchored nodes that are referenced from
//! several places (or from themselves, for cycles) simply have their id
//! stored in more than one parent slot, which keeps sharing identity-stable
//! without reference counting. [`ValueRef`] pairs an id with its graph for
//! ergonomic traversal.

use std::collections::HashSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Index of a node inside a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The raw arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A constructed leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// `!!timestamp`, normalized to UTC at construction.
    Timestamp(DateTime<Utc>),
    /// `!!binary` payload.
    Binary(Vec<u8>),
    /// The `<<` merge-key marker.
    Merge,
    /// `!!js/regexp` (non-safe schema only).
    Regexp { pattern: String, flags: String },
    /// `!!js/undefined` (non-safe schema only).
    Undefined,
    /// `!!js/function` source text (non-safe schema only, never evaluated).
    Function(String),
}

impl Scalar {
    /// Value equality with float semantics suitable for round-trip checks:
    /// NaN compares equal to NaN.
    pub fn same(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Float(a), Scalar::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Fixed canonical text used when the scalar appears as a mapping key.
    ///
    /// This never consults anything value-supplied; each kind has one
    /// printed form.
    pub fn canonical_string(&self) -> String {
        match self {
            Scalar::Null => "null".to_string(),
            Scalar::Bool(true) => "true".to_string(),
            Scalar::Bool(false) => "false".to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => canonical_number(*f),
            Scalar::Str(s) => s.clone(),
            Scalar::Timestamp(t) => t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            Scalar::Binary(bytes) => STANDARD.encode(bytes),
            Scalar::Merge => "<<".to_string(),
            Scalar::Regexp { pattern, flags } => format!("/{pattern}/{flags}"),
            Scalar::Undefined => "undefined".to_string(),
            Scalar::Function(source) => source.clone(),
        }
    }
}

/// Number-to-text with integral floats printed as integers.
fn canonical_number(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == f.trunc() && f.abs() < 9.0e18 {
        return (f as i64).to_string();
    }
    f.to_string()
}

/// One node of the value graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Seq(Vec<NodeId>),
    Map(IndexMap<String, NodeId>),
}

/// Arena of [`Value`] nodes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Value>,
}

impl Graph {
    pub fn new() -> Self {
        Graph { nodes: Vec::new() }
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node and return its id.
    pub fn alloc(&mut self, value: Value) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(value);
        id
    }

    pub fn get(&self, id: NodeId) -> &Value {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Value {
        &mut self.nodes[id.index()]
    }

    pub fn new_scalar(&mut self, scalar: Scalar) -> NodeId {
        self.alloc(Value::Scalar(scalar))
    }

    pub fn new_null(&mut self) -> NodeId {
        self.new_scalar(Scalar::Null)
    }

    pub fn new_bool(&mut self, value: bool) -> NodeId {
        self.new_scalar(Scalar::Bool(value))
    }

    pub fn new_int(&mut self, value: i64) -> NodeId {
        self.new_scalar(Scalar::Int(value))
    }

    pub fn new_float(&mut self, value: f64) -> NodeId {
        self.new_scalar(Scalar::Float(value))
    }

    pub fn new_str(&mut self, value: impl Into<String>) -> NodeId {
        self.new_scalar(Scalar::Str(value.into()))
    }

    pub fn new_seq(&mut self, items: Vec<NodeId>) -> NodeId {
        self.alloc(Value::Seq(items))
    }

    pub fn new_map(&mut self, entries: Vec<(String, NodeId)>) -> NodeId {
        self.alloc(Value::Map(entries.into_iter().collect()))
    }

    /// Borrow a node as a [`ValueRef`].
    pub fn node(&self, id: NodeId) -> ValueRef<'_> {
        ValueRef { graph: self, id }
    }
}

/// One parsed document: a graph plus its root node.
///
/// `root` is `None` when the stream (or the document) had no content at all.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub graph: Graph,
    pub root: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// Build a single-root document from parts.
    pub fn from_parts(graph: Graph, root: Option<NodeId>) -> Self {
        Document { graph, root }
    }

    /// Borrow the root node, if any.
    pub fn root(&self) -> Option<ValueRef<'_>> {
        self.root.map(|id| self.graph.node(id))
    }

    /// Structural equality between two documents.
    ///
    /// Sharing is not distinguished from copying; cycles terminate because a
    /// pair of nodes is compared at most once.
    pub fn deep_eq(&self, other: &Document) -> bool {
        match (self.root, other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                let mut seen = HashSet::new();
                deep_eq_nodes(&self.graph, a, &other.graph, b, &mut seen)
            }
            _ => false,
        }
    }
}

fn deep_eq_nodes(
    ga: &Graph,
    a: NodeId,
    gb: &Graph,
    b: NodeId,
    seen: &mut HashSet<(NodeId, NodeId)>,
) -> bool {
    if !seen.insert((a, b)) {
        // Already being compared further up the stack: assume equal here and
        // let the outer comparison decide.
        return true;
    }

    match (ga.get(a), gb.get(b)) {
        (Value::Scalar(x), Value::Scalar(y)) => x.same(y),
        (Value::Seq(xs), Value::Seq(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(&x, &y)| deep_eq_nodes(ga, x, gb, y, seen))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys.iter()).all(|((kx, &x), (ky, &y))| {
                    kx == ky && deep_eq_nodes(ga, x, gb, y, seen)
                })
        }
        _ => false,
    }
}

/// A node borrowed together with its graph.
#[derive(Debug, Clone, Copy)]
pub struct ValueRef<'a> {
    graph: &'a Graph,
    id: NodeId,
}

impl<'a> ValueRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn value(&self) -> &'a Value {
        self.graph.get(self.id)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value(), Value::Scalar(_))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self.value(), Value::Seq(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.value(), Value::Map(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value(), Value::Scalar(Scalar::Null))
    }

    pub fn as_scalar(&self) -> Option<&'a Scalar> {
        match self.value() {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self.value() {
            Value::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value() {
            Value::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value() {
            Value::Scalar(Scalar::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value() {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Look up a mapping entry by key.
    pub fn get(&self, key: &str) -> Option<ValueRef<'a>> {
        match self.value() {
            Value::Map(entries) => entries.get(key).map(|&id| self.graph.node(id)),
            _ => None,
        }
    }

    /// Look up a sequence element by index.
    pub fn item(&self, index: usize) -> Option<ValueRef<'a>> {
        match self.value() {
            Value::Seq(items) => items.get(index).map(|&id| self.graph.node(id)),
            _ => None,
        }
    }

    /// Number of children (sequence length or mapping entry count).
    pub fn len(&self) -> usize {
        match self.value() {
            Value::Scalar(_) => 0,
            Value::Seq(items) => items.len(),
            Value::Map(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate sequence elements.
    pub fn items(&self) -> impl Iterator<Item = ValueRef<'a>> + '_ {
        let items: &[NodeId] = match self.value() {
            Value::Seq(items) => items,
            _ => &[],
        };
        items.iter().map(|&id| self.graph.node(id))
    }

    /// Iterate mapping entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&'a str, ValueRef<'a>)> + '_ {
        let entries = match self.value() {
            Value::Map(entries) => Some(entries),
            _ => None,
        };
        entries
            .into_iter()
            .flat_map(|m| m.iter())
            .map(|(k, &id)| (k.as_str(), self.graph.node(id)))
    }
}
