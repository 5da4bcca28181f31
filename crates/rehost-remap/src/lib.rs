//! Remap engine for rehost.
//!
//! Renames every class, field and method reference in a batch of archives
//! according to a translation table.
//!
//! # Architecture
//!
//! - **RemapEngine**: batch interface (shared classpath, tagged inputs,
//!   per-archive transform hook, single `finish`)
//! - **EngineGuard**: scoped handle that releases the engine exactly once
//! - **TableRemapper**: built-in engine driven by a [`TranslationTable`]
//! - **archive**: zip container reading and writing

pub mod archive;
pub mod engine;
pub mod error;
pub mod remapper;

use std::path::{Path, PathBuf};

use rehost_classfile::Passthrough;
use rehost_mapping::TranslationTable;
use tracing::info;

pub use archive::{copy_resources, ArchiveContents, ArchiveWriter};
pub use engine::{EngineGuard, InputTag, OutputSink, RemapEngine};
pub use error::{RemapError, RemapResult};
pub use remapper::TableRemapper;

/// Rename a single archive without any marker rewriting.
pub fn remap(table: TranslationTable, input: &Path, output: &Path, classpath: &[PathBuf]) -> RemapResult<()> {
    let mut engine = TableRemapper::new(table);
    let mut guard = EngineGuard::new(&mut engine);
    guard.read_classpath(classpath)?;
    let tag = guard.create_input_tag();
    guard.read_inputs(tag, input)?;

    let mut writer = ArchiveWriter::create(output)?;
    guard.apply(tag, &mut writer, &mut Passthrough)?;
    let resources = copy_resources(input, &mut writer)?;
    writer.finish()?;
    guard.finish();

    info!(input = %input.display(), output = %output.display(), resources, "remapped archive");
    Ok(())
}
