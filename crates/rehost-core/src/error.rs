use std::path::PathBuf;

use thiserror::Error;

use crate::migrator::RunState;

/// Errors raised by the migration pipeline.
///
/// Only setup problems escape [`crate::Migrator::run`]; everything scoped
/// to one archive is routed through the [`crate::Reporter`] instead.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot prepare {path}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input location {0} is not a directory")]
    MissingInput(PathBuf),

    /// Two inputs map to the same output archive.
    #[error("output {output} is already claimed by {claimed_by}")]
    DuplicateOutput { output: PathBuf, claimed_by: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Mapping(#[from] rehost_mapping::MappingError),

    #[error(transparent)]
    Remap(#[from] rehost_remap::RemapError),

    #[error(transparent)]
    Manifest(#[from] rehost_manifest::ManifestError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive has no {0}")]
    MissingEntry(&'static str),

    #[error("{0} is not valid UTF-8")]
    NotUtf8(&'static str),

    /// `run` was called on a migrator that has already started.
    #[error("migration already ran (state: {0:?})")]
    AlreadyRun(RunState),
}

pub type MigrateResult<T> = Result<T, MigrateError>;
