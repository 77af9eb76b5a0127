//! # tarn-yaml
//!
//! A YAML engine: loading text into a native value graph and dumping value
//! graphs back to text, governed by a pluggable type schema.
//!
//! ## Overview
//!
//! Loading walks text through an indentation-aware scanner and a composer
//! that resolves tags, binds anchors and reconstructs shared or cyclic
//! structure; dumping walks a value graph through a reference-counting
//! pre-pass and a style-heuristic emitter. Values live in an arena
//! ([`Graph`]) indexed by [`NodeId`], so sharing is identity-stable and
//! cycles need no reference counting.
//!
//! Schemas compose in layers — [`schema::FAILSAFE`] ⊂ [`schema::JSON`] ⊂
//! [`schema::CORE`] ⊂ [`schema::DEFAULT_SAFE`] ⊂ [`schema::DEFAULT_FULL`] —
//! and extend with application-defined [`Type`]s through
//! [`Schema::create`]. The `safe_*` entry points pin the safe schema, which
//! excludes the `js/*` interchange tags.
//!
//! ## Example
//!
//! ```rust
//! use tarn_yaml::{LoadOptions, load};
//!
//! let doc = load("title: Tarn\ntags: [yaml, parser]\n", LoadOptions::default()).unwrap();
//! let root = doc.root().unwrap();
//! assert_eq!(root.get("title").unwrap().as_str(), Some("Tarn"));
//! assert_eq!(root.get("tags").unwrap().len(), 2);
//! ```
//!
//! Round-trips are value-exact: for any representable acyclic value `v`,
//! `load(dump(v))` is deeply equal to `v`, and shared/cyclic topology is
//! reproduced through the anchor/alias machinery.

mod dumper;
mod error;
mod loader;
mod scanner;
pub mod schema;
mod value;

pub use dumper::{DumpOptions, QuotingType, SortKeys, dump, dump_node, safe_dump};
pub use error::{ErrorKind, Result, YamlError};
pub use loader::{
    EventReceiver, LoadOptions, NodeEvent, load, load_all, safe_load, safe_load_all,
};
pub use schema::{Kind, Represent, Schema, Type};
pub use tarn_source_map::Mark;
pub use value::{Document, Graph, NodeId, Scalar, Value, ValueRef};
