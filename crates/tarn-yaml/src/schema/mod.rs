//! Tag types and schemas.
//!
//! A [`Type`] bundles everything the engine knows about one tag: how to
//! recognize raw scalar content (`resolve`), how to turn it into a
//! [`Scalar`] (`construct`), how to recognize values of the type while
//! dumping (`predicate`) and how to print them (`represent`). Collection
//! tags use the `_node` variants, which see the value graph instead of raw
//! text. A [`Schema`] is an ordered list of implicit types (tried during
//! tag-free resolution) plus per-kind maps of explicit types.
//!
//! Schemas compose in layers: `FAILSAFE ⊂ JSON ⊂ CORE ⊂ DEFAULT_SAFE ⊂
//! DEFAULT_FULL`. [`Schema::create`] layers application-defined types on any
//! base without mutating it; there is no global mutable registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::value::{Graph, NodeId, Scalar};

mod core;
mod default;
mod extended;
mod failsafe;
mod json;

/// `tag:yaml.org,2002:` tag names used by the built-in layers.
pub mod tags {
    pub const STR: &str = "tag:yaml.org,2002:str";
    pub const SEQ: &str = "tag:yaml.org,2002:seq";
    pub const MAP: &str = "tag:yaml.org,2002:map";
    pub const NULL: &str = "tag:yaml.org,2002:null";
    pub const BOOL: &str = "tag:yaml.org,2002:bool";
    pub const INT: &str = "tag:yaml.org,2002:int";
    pub const FLOAT: &str = "tag:yaml.org,2002:float";
    pub const TIMESTAMP: &str = "tag:yaml.org,2002:timestamp";
    pub const MERGE: &str = "tag:yaml.org,2002:merge";
    pub const BINARY: &str = "tag:yaml.org,2002:binary";
    pub const OMAP: &str = "tag:yaml.org,2002:omap";
    pub const PAIRS: &str = "tag:yaml.org,2002:pairs";
    pub const SET: &str = "tag:yaml.org,2002:set";
    pub const REGEXP: &str = "tag:yaml.org,2002:js/regexp";
    pub const UNDEFINED: &str = "tag:yaml.org,2002:js/undefined";
    pub const FUNCTION: &str = "tag:yaml.org,2002:js/function";
}

/// The node kind a type applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Scalar,
    Sequence,
    Mapping,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Scalar => "scalar",
            Kind::Sequence => "sequence",
            Kind::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

/// Accepts raw scalar content (`None` for an empty node).
pub type ResolveFn = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;
/// Builds a [`Scalar`] from raw content; an `Err` aborts resolution.
pub type ConstructFn = Arc<dyn Fn(Option<&str>) -> std::result::Result<Scalar, String> + Send + Sync>;
/// Accepts an already-composed collection node.
pub type NodeResolveFn = Arc<dyn Fn(&Graph, NodeId) -> bool + Send + Sync>;
/// Rewrites an already-composed collection node in place.
pub type NodeConstructFn =
    Arc<dyn Fn(&mut Graph, NodeId) -> std::result::Result<(), String> + Send + Sync>;
/// Recognizes constructed scalars of this type while dumping.
pub type PredicateFn = Arc<dyn Fn(&Scalar) -> bool + Send + Sync>;
/// Prints a scalar of this type; receives the requested style, if any.
pub type RepresentFn = Arc<dyn Fn(&Scalar, Option<&str>) -> String + Send + Sync>;

/// How a type prints its values.
#[derive(Clone)]
pub enum Represent {
    /// One function for every style.
    Single(RepresentFn),
    /// One function per style name.
    Styled(HashMap<String, RepresentFn>),
}

/// A tag definition. Immutable once registered in a schema.
#[derive(Clone)]
pub struct Type {
    pub tag: String,
    pub kind: Kind,
    pub resolve: Option<ResolveFn>,
    pub construct: Option<ConstructFn>,
    pub resolve_node: Option<NodeResolveFn>,
    pub construct_node: Option<NodeConstructFn>,
    pub predicate: Option<PredicateFn>,
    pub represent: Option<Represent>,
    pub default_style: Option<String>,
    pub style_aliases: HashMap<String, String>,
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Type {
    /// A passthrough type: resolves everything, constructs strings (or null
    /// for empty nodes), collections untouched.
    pub fn new(tag: impl Into<String>, kind: Kind) -> Self {
        Type {
            tag: tag.into(),
            kind,
            resolve: None,
            construct: None,
            resolve_node: None,
            construct_node: None,
            predicate: None,
            represent: None,
            default_style: None,
            style_aliases: HashMap::new(),
        }
    }

    pub fn with_resolve(
        mut self,
        f: impl Fn(Option<&str>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.resolve = Some(Arc::new(f));
        self
    }

    pub fn with_construct(
        mut self,
        f: impl Fn(Option<&str>) -> std::result::Result<Scalar, String> + Send + Sync + 'static,
    ) -> Self {
        self.construct = Some(Arc::new(f));
        self
    }

    pub fn with_resolve_node(
        mut self,
        f: impl Fn(&Graph, NodeId) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.resolve_node = Some(Arc::new(f));
        self
    }

    pub fn with_construct_node(
        mut self,
        f: impl Fn(&mut Graph, NodeId) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.construct_node = Some(Arc::new(f));
        self
    }

    pub fn with_predicate(mut self, f: impl Fn(&Scalar) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(f));
        self
    }

    pub fn with_represent(
        mut self,
        f: impl Fn(&Scalar, Option<&str>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.represent = Some(Represent::Single(Arc::new(f)));
        self
    }

    pub fn with_styled_represent(mut self, styles: Vec<(&str, RepresentFn)>) -> Self {
        let map = styles
            .into_iter()
            .map(|(name, f)| (name.to_string(), f))
            .collect();
        self.represent = Some(Represent::Styled(map));
        self
    }

    pub fn with_default_style(mut self, style: impl Into<String>) -> Self {
        self.default_style = Some(style.into());
        self
    }

    pub fn with_style_aliases(mut self, aliases: Vec<(&str, &str)>) -> Self {
        self.style_aliases = aliases
            .into_iter()
            .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
            .collect();
        self
    }

    /// Run `resolve` for raw scalar content; a missing resolver accepts.
    pub(crate) fn resolves(&self, raw: Option<&str>) -> bool {
        match &self.resolve {
            Some(f) => f(raw),
            None => true,
        }
    }

    /// Run `construct` for raw scalar content. The default keeps content as
    /// a string and turns emptiness into null.
    pub(crate) fn construct_scalar(
        &self,
        raw: Option<&str>,
    ) -> std::result::Result<Scalar, String> {
        match &self.construct {
            Some(f) => f(raw),
            None => Ok(match raw {
                Some(s) => Scalar::Str(s.to_string()),
                None => Scalar::Null,
            }),
        }
    }

    /// Run `resolve_node` for a collection; a missing resolver accepts.
    pub(crate) fn resolves_node(&self, graph: &Graph, id: NodeId) -> bool {
        match &self.resolve_node {
            Some(f) => f(graph, id),
            None => true,
        }
    }

    /// Run `construct_node` for a collection; the default leaves it as is.
    pub(crate) fn construct_collection(
        &self,
        graph: &mut Graph,
        id: NodeId,
    ) -> std::result::Result<(), String> {
        match &self.construct_node {
            Some(f) => f(graph, id),
            None => Ok(()),
        }
    }
}

/// Explicit types indexed per node kind, with a kind-agnostic fallback.
#[derive(Debug, Default, Clone)]
pub struct TypeMap {
    pub scalar: IndexMap<String, Arc<Type>>,
    pub sequence: IndexMap<String, Arc<Type>>,
    pub mapping: IndexMap<String, Arc<Type>>,
    pub fallback: IndexMap<String, Arc<Type>>,
}

impl TypeMap {
    fn insert(&mut self, ty: Arc<Type>) {
        let by_kind = match ty.kind {
            Kind::Scalar => &mut self.scalar,
            Kind::Sequence => &mut self.sequence,
            Kind::Mapping => &mut self.mapping,
        };
        by_kind.insert(ty.tag.clone(), Arc::clone(&ty));
        self.fallback.insert(ty.tag.clone(), ty);
    }
}

/// An immutable, layerable catalog of types.
#[derive(Debug, Clone)]
pub struct Schema {
    implicit: Vec<Arc<Type>>,
    explicit: Vec<Arc<Type>>,
    type_map: TypeMap,
}

impl Schema {
    /// Build a schema from scratch. Implicit types must be scalar-kind.
    pub fn compile(implicit: Vec<Type>, explicit: Vec<Type>) -> Schema {
        let base = Schema {
            implicit: Vec::new(),
            explicit: Vec::new(),
            type_map: TypeMap::default(),
        };
        base.layer(implicit, explicit)
    }

    /// Layer additional types over `self`, producing a new schema.
    ///
    /// An implicit type with a tag already present replaces the earlier
    /// registration in place, so derived layers can widen the lexical forms
    /// of a base tag while keeping the resolution order stable.
    pub fn layer(&self, implicit: Vec<Type>, explicit: Vec<Type>) -> Schema {
        let mut compiled_implicit = self.implicit.clone();
        for ty in implicit {
            assert!(
                ty.kind == Kind::Scalar,
                "implicit type must be of scalar kind: {}",
                ty.tag
            );
            let ty = Arc::new(ty);
            match compiled_implicit.iter().position(|t| t.tag == ty.tag) {
                Some(i) => compiled_implicit[i] = Arc::clone(&ty),
                None => compiled_implicit.push(Arc::clone(&ty)),
            }
        }

        let mut compiled_explicit = self.explicit.clone();
        for ty in explicit {
            let ty = Arc::new(ty);
            match compiled_explicit
                .iter()
                .position(|t| t.tag == ty.tag && t.kind == ty.kind)
            {
                Some(i) => compiled_explicit[i] = Arc::clone(&ty),
                None => compiled_explicit.push(Arc::clone(&ty)),
            }
        }

        let mut type_map = TypeMap::default();
        for ty in compiled_implicit.iter().chain(compiled_explicit.iter()) {
            type_map.insert(Arc::clone(ty));
        }

        Schema {
            implicit: compiled_implicit,
            explicit: compiled_explicit,
            type_map,
        }
    }

    /// Layer application-defined types over a base schema.
    ///
    /// This is the extension point for custom tags; the base is untouched.
    pub fn create(types: Vec<Type>, base: &Schema) -> Schema {
        base.layer(Vec::new(), types)
    }

    /// Implicit types in resolution order.
    pub fn implicit_types(&self) -> &[Arc<Type>] {
        &self.implicit
    }

    /// Explicit types in registration order.
    pub fn explicit_types(&self) -> &[Arc<Type>] {
        &self.explicit
    }

    /// Look up an explicit type by kind and tag; `None` kind uses the
    /// kind-agnostic fallback map.
    pub fn lookup(&self, kind: Option<Kind>, tag: &str) -> Option<&Arc<Type>> {
        let map = match kind {
            Some(Kind::Scalar) => &self.type_map.scalar,
            Some(Kind::Sequence) => &self.type_map.sequence,
            Some(Kind::Mapping) => &self.type_map.mapping,
            None => &self.type_map.fallback,
        };
        map.get(tag)
    }

    /// Kind-agnostic lookup (used for style compilation).
    pub fn lookup_any(&self, tag: &str) -> Option<&Arc<Type>> {
        self.type_map.fallback.get(tag)
    }
}

/// str, seq, map only; nothing is resolved implicitly.
pub static FAILSAFE: Lazy<Schema> = Lazy::new(|| {
    let (implicit, explicit) = failsafe::types();
    Schema::compile(implicit, explicit)
});

/// Failsafe plus null/bool/int/float restricted to JSON lexical forms.
pub static JSON: Lazy<Schema> = Lazy::new(|| {
    let (implicit, explicit) = json::types();
    FAILSAFE.layer(implicit, explicit)
});

/// JSON widened to the YAML-flavored lexical forms.
pub static CORE: Lazy<Schema> = Lazy::new(|| {
    let (implicit, explicit) = core::types();
    JSON.layer(implicit, explicit)
});

/// Core plus timestamp, merge, binary, omap, pairs and set.
pub static DEFAULT_SAFE: Lazy<Schema> = Lazy::new(|| {
    let (implicit, explicit) = default::types();
    CORE.layer(implicit, explicit)
});

/// The full default schema, adding the `js/*` extension tags that the
/// `safe_*` entry points refuse.
pub static DEFAULT_FULL: Lazy<Schema> = Lazy::new(|| {
    let (implicit, explicit) = extended::types();
    DEFAULT_SAFE.layer(implicit, explicit)
});
