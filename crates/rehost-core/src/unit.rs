//! The per-archive processing record.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rehost_manifest::{AccessTransformer, AccessWidener, ModsToml};
use tracing::warn;

use crate::ledger::AnnotationLedger;

/// Entry points by kind, each list in registration order.
pub type EntryPoints = IndexMap<String, Vec<String>>;

/// Everything known about one input archive during a run.
///
/// Created when the archive's manifest is parsed, filled in by the marker
/// rewriters while it is remapped and consumed by the metadata step.
#[derive(Debug)]
pub struct ArchiveUnit {
    input: PathBuf,
    output: PathBuf,
    name: String,
    manifest: ModsToml,
    jar_version: Option<String>,
    access_rules: Option<AccessTransformer>,
    access_widener: Option<AccessWidener>,
    ledger: AnnotationLedger,
    entry_points: EntryPoints,
    processed: bool,
}

impl ArchiveUnit {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, manifest: ModsToml) -> Self {
        let input = input.into();
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            input,
            output: output.into(),
            name,
            manifest,
            jar_version: None,
            access_rules: None,
            access_widener: None,
            ledger: AnnotationLedger::new(),
            entry_points: EntryPoints::new(),
            processed: false,
        }
    }

    pub fn with_jar_version(mut self, version: Option<String>) -> Self {
        self.jar_version = version;
        self
    }

    pub fn with_access_rules(mut self, rules: Option<AccessTransformer>) -> Self {
        self.access_rules = rules;
        self
    }

    /// File name of the input archive, used to identify it in reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn manifest(&self) -> &ModsToml {
        &self.manifest
    }

    pub fn jar_version(&self) -> Option<&str> {
        self.jar_version.as_deref()
    }

    pub fn access_rules(&self) -> Option<&AccessTransformer> {
        self.access_rules.as_ref()
    }

    pub fn access_widener(&self) -> Option<&AccessWidener> {
        self.access_widener.as_ref()
    }

    pub fn set_access_widener(&mut self, widener: AccessWidener) {
        self.access_widener = Some(widener);
    }

    pub fn ledger(&self) -> &AnnotationLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut AnnotationLedger {
        &mut self.ledger
    }

    /// Register `raw_name` (an internal, slash separated class name) under
    /// `kind`. Duplicates are kept.
    pub fn add_entry_point(&mut self, kind: &str, raw_name: &str) {
        self.entry_points
            .entry(kind.to_string())
            .or_default()
            .push(raw_name.replace('/', "."));
    }

    /// A copy of the entry points registered so far.
    pub fn entry_points(&self) -> EntryPoints {
        self.entry_points.clone()
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Record that the archive was remapped successfully.
    pub fn mark_processed(&mut self) {
        if self.processed {
            warn!(archive = %self.name, "archive marked as processed twice");
        }
        self.processed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> ArchiveUnit {
        let manifest = ModsToml::parse("[[mods]]\nmodId = \"example\"\n").unwrap();
        ArchiveUnit::new("input/example-1.0.jar", "output/example-1.0.jar", manifest)
    }

    #[test]
    fn entry_points_keep_order_and_duplicates() {
        let mut unit = unit();
        unit.add_entry_point("main", "org/example/B");
        unit.add_entry_point("client", "org/example/C");
        unit.add_entry_point("main", "org/example/A");
        unit.add_entry_point("main", "org/example/B");

        let snapshot = unit.entry_points();
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["main", "client"]);
        assert_eq!(snapshot["main"], vec!["org.example.B", "org.example.A", "org.example.B"]);
    }

    #[test]
    fn snapshots_do_not_follow_later_changes() {
        let mut unit = unit();
        unit.add_entry_point("main", "a/B");
        let snapshot = unit.entry_points();
        unit.add_entry_point("main", "a/C");
        assert_eq!(snapshot["main"].len(), 1);
        assert_eq!(unit.entry_points()["main"].len(), 2);
    }

    #[test]
    fn name_and_processed_flag() {
        let mut unit = unit();
        assert_eq!(unit.name(), "example-1.0.jar");
        assert!(!unit.is_processed());
        unit.mark_processed();
        assert!(unit.is_processed());
    }
}
