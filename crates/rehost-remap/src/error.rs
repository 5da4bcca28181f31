//! Error types for the remap crate.

use std::path::PathBuf;

use rehost_classfile::ClassError;
use rehost_mapping::MappingError;

use crate::engine::InputTag;

/// Errors raised while reading, remapping or writing archives.
#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A compiled unit could not be parsed, rewritten or serialized.
    #[error("{entry}: {source}")]
    Unit {
        entry: String,
        #[source]
        source: ClassError,
    },

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// An archive could not be moved into place.
    #[error("cannot persist {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("no inputs were read for {0}")]
    UnknownTag(InputTag),

    #[error("entry {0} was written twice")]
    DuplicateEntry(String),

    #[error("the engine has already been finished")]
    Finished,
}

impl RemapError {
    pub(crate) fn unit(entry: impl Into<String>, source: ClassError) -> Self {
        Self::Unit {
            entry: entry.into(),
            source,
        }
    }
}

/// Convenience alias for remap results.
pub type RemapResult<T> = Result<T, RemapError>;
