//! Migration pipeline for rehost.
//!
//! Takes a directory of source-platform archives and writes a migrated
//! copy of each one: symbols renamed by a [`rehost_remap::RemapEngine`],
//! platform markers rewritten on the way through, and the manifest
//! replaced by target descriptors.
//!
//! # Architecture
//!
//! - **Migrator**: one-shot orchestrator (discover, remap, rewrite metadata)
//! - **ArchiveUnit**: per-archive state carried between phases
//! - **MarkerRewriter**: class decorator attached to every remapped class
//! - **MarkerRules**: marker classification table
//! - **MetadataSynthesizer**: descriptor synthesis and nested archive bundling
//! - **AnnotationLedger**: record of every marker seen in an archive
//! - **Reporter**: run-scoped sink for failures and advisories

pub mod config;
pub mod error;
pub mod ledger;
pub mod markers;
pub mod migrator;
pub mod report;
pub mod rewrite;
pub mod synth;
pub mod unit;

pub use config::MigrationConfig;
pub use error::{MigrateError, MigrateResult};
pub use ledger::{AnnotationLedger, LedgerEntry, TargetKind, LEDGER_ENTRY};
pub use markers::{MarkerKind, MarkerRules, Site};
pub use migrator::{Migrator, RunState};
pub use report::{describe, Failure, Notice, Phase, Reporter};
pub use rewrite::MarkerRewriter;
pub use synth::MetadataSynthesizer;
pub use unit::{ArchiveUnit, EntryPoints};
