//! Source position tracking for Tarn
//!
//! This crate provides the [`Mark`] type: a position inside a source buffer
//! (character offset, line, column, optional source name) together with a
//! shared handle on the buffer itself, so that diagnostics can render the
//! offending line with a caret long after parsing has moved on.
//!
//! # Overview
//!
//! The core types are:
//! - [`Mark`]: a position with an optional buffer handle and source name
//! - [`offset_to_line_col`]: maps a character offset to (line, column)
//!
//! # Example
//!
//! ```rust
//! use tarn_source_map::Mark;
//!
//! let mark = Mark::in_buffer("key: [1, 2", 5, Some("config.yaml".into()));
//! assert_eq!(mark.line, 0);
//! assert_eq!(mark.column, 5);
//! let snippet = mark.snippet(2, 40).unwrap();
//! assert!(snippet.contains("key: [1, 2"));
//! ```

mod mark;
mod snippet;

pub use mark::{Mark, offset_to_line_col};
pub use snippet::render_snippet;
