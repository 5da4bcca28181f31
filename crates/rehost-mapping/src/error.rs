//! Error types for the mapping crate.

/// Errors raised while reading translation tables or remapping names.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The table header names no known format.
    #[error("unsupported table format: {0}")]
    UnsupportedFormat(String),

    /// A requested namespace is not declared by the table header.
    #[error("namespace `{0}` is not declared by the table")]
    UnknownNamespace(String),

    /// A line of a table could not be parsed.
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    /// A descriptor or generic signature is malformed.
    #[error("malformed {kind} `{text}` at offset {offset}")]
    Malformed {
        kind: &'static str,
        text: String,
        offset: usize,
    },
}

impl MappingError {
    pub(crate) fn syntax(line: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            reason: reason.into(),
        }
    }
}

/// Convenience alias for mapping results.
pub type MappingResult<T> = Result<T, MappingError>;
