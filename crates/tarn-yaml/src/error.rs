//! Error types for YAML loading and dumping.

use std::fmt;

use thiserror::Error;

use tarn_source_map::Mark;

/// Result type alias for tarn-yaml operations.
pub type Result<T> = std::result::Result<T, YamlError>;

/// Broad failure categories.
///
/// Every fatal error belongs to exactly one of these; warnings reuse
/// [`ErrorKind::Warning`] and are only ever delivered through the
/// `on_warning` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed document structure: bad indentation, unterminated flow
    /// collections, stray content, invalid directives or properties.
    Structural,
    /// A tag could not be resolved or its content was rejected by the type.
    TagResolution,
    /// A mapping key occurred twice within one mapping.
    DuplicateKey,
    /// A sequence was used inside a mapping key.
    InvalidKey,
    /// A value could not be represented during dumping.
    Representation,
    /// A recoverable condition; never thrown.
    Warning,
}

/// An error (or warning) with an optional source position.
#[derive(Debug, Clone, Error)]
pub struct YamlError {
    pub kind: ErrorKind,
    pub reason: String,
    pub mark: Option<Mark>,
}

impl YamlError {
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        YamlError {
            kind,
            reason: reason.into(),
            mark: None,
        }
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.mark = Some(mark);
        self
    }

    /// The human-readable reason, without position information.
    pub fn message(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for YamlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if let Some(mark) = &self.mark {
            write!(f, " at {}", mark)?;
            if let Some(snippet) = mark.snippet(4, 75) {
                write!(f, ":\n\n{}", snippet)?;
            }
        }
        Ok(())
    }
}
