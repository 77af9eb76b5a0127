//! Positions in source text

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::snippet::render_snippet;

/// A position in source text.
///
/// Offsets, lines and columns are 0-indexed and counted in characters, not
/// bytes. The buffer is shared so that many marks over one input stay cheap;
/// it is carried only to render snippets and is skipped by serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mark {
    /// Name of the source (usually a filename), if known.
    pub name: Option<String>,

    /// The full source text this mark points into.
    #[serde(skip)]
    pub buffer: Option<Arc<str>>,

    /// Character offset from the start of the source.
    pub position: usize,

    /// Line number (0-indexed).
    pub line: usize,

    /// Column number (0-indexed, in characters).
    pub column: usize,
}

impl Mark {
    /// Create a mark with an explicit position and no buffer.
    pub fn new(position: usize, line: usize, column: usize) -> Self {
        Mark {
            name: None,
            buffer: None,
            position,
            line,
            column,
        }
    }

    /// Create a mark pointing at `position` inside `buffer`, deriving the
    /// line and column from the buffer contents.
    pub fn in_buffer(buffer: &str, position: usize, name: Option<String>) -> Self {
        let (line, column) = offset_to_line_col(buffer, position);
        Mark {
            name,
            buffer: Some(Arc::from(buffer)),
            position,
            line,
            column,
        }
    }

    /// Attach a source name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Render the line this mark points at, with a caret under the column.
    ///
    /// Returns `None` when no buffer is attached. `indent` is the number of
    /// leading spaces on each rendered line; `max_length` bounds the width
    /// of the excerpt (long lines are trimmed around the column with `...`).
    pub fn snippet(&self, indent: usize, max_length: usize) -> Option<String> {
        let buffer = self.buffer.as_deref()?;
        render_snippet(buffer, self.position, indent, max_length)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("<input>");
        write!(f, "{}:{}:{}", name, self.line + 1, self.column + 1)
    }
}

/// Map a character offset to a 0-indexed (line, column) pair.
///
/// An offset past the end of the text maps to the end of the last line.
pub fn offset_to_line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut column = 0;

    for (i, ch) in text.chars().enumerate() {
        if i == offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }

    (line, column)
}
