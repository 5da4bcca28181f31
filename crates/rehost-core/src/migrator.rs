//! The migration orchestrator.
//!
//! A [`Migrator`] runs once: it discovers archives, remaps all of them in
//! one engine batch with the marker rewriters attached, then synthesizes
//! metadata for every archive that came through the remap cleanly. Any
//! failure scoped to one archive is reported and only removes that
//! archive from the remaining phases.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rehost_manifest::{translate, AccessTransformer, ModsToml, ACCESS_TRANSFORMER_PATH, SOURCE_MANIFEST};
use rehost_remap::archive::{manifest_attribute, MANIFEST_PATH};
use rehost_remap::{copy_resources, ArchiveContents, ArchiveWriter, EngineGuard, InputTag, RemapEngine};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::MigrationConfig;
use crate::error::{MigrateError, MigrateResult};
use crate::markers::MarkerRules;
use crate::report::{Phase, Reporter};
use crate::rewrite::MarkerRewriter;
use crate::synth::MetadataSynthesizer;
use crate::unit::ArchiveUnit;

const ARCHIVE_EXTENSION: &str = "jar";
const VERSION_ATTRIBUTE: &str = "Implementation-Version";

/// Lifecycle of a [`Migrator`]. `Finished` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Discovering,
    Remapping,
    RewritingMetadata,
    Finished,
}

pub struct Migrator<'r> {
    config: MigrationConfig,
    rules: MarkerRules,
    synthesizer: MetadataSynthesizer,
    reporter: &'r Reporter,
    state: RunState,
    discovered: usize,
}

impl<'r> Migrator<'r> {
    pub fn new(config: MigrationConfig, reporter: &'r Reporter) -> Self {
        let rules = MarkerRules::from_config(&config);
        Self {
            config,
            rules,
            synthesizer: MetadataSynthesizer::new(),
            reporter,
            state: RunState::Idle,
            discovered: 0,
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Number of candidate archives found in the input location.
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    /// Migrate every archive in the input location and return how many
    /// were fully migrated.
    ///
    /// Errors are returned only for problems that make the whole run
    /// meaningless; per-archive problems go to the reporter.
    pub fn run(&mut self, engine: &mut dyn RemapEngine) -> MigrateResult<usize> {
        if self.state != RunState::Idle {
            return Err(MigrateError::AlreadyRun(self.state));
        }

        self.state = RunState::Discovering;
        self.prepare_dirs()?;
        let scratch = tempfile::Builder::new()
            .prefix("rehost-")
            .tempdir_in(&self.config.work_dir)
            .map_err(|source| MigrateError::Setup {
                path: self.config.work_dir.clone(),
                source,
            })?;
        let archives = self.find_archives()?;
        self.discovered = archives.len();
        let mut units = self.discover(&archives);
        self.translate_access_rules(&mut units, &*engine);
        info!(discovered = self.discovered, parsed = units.len(), "migrating archives");

        self.state = RunState::Remapping;
        self.remap(&mut units, engine)?;

        self.state = RunState::RewritingMetadata;
        let mut migrated = 0;
        for unit in &units {
            if self.rewrite_metadata(unit, scratch.path()) {
                migrated += 1;
            }
        }

        self.state = RunState::Finished;
        info!(migrated, discovered = self.discovered, "migration finished");
        Ok(migrated)
    }

    // -----------------------------------------------------------------------
    // Discovering
    // -----------------------------------------------------------------------

    fn prepare_dirs(&self) -> MigrateResult<()> {
        for dir in [&self.config.input_dir, &self.config.output_dir, &self.config.work_dir] {
            fs::create_dir_all(dir).map_err(|source| MigrateError::Setup {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn find_archives(&self) -> MigrateResult<Vec<PathBuf>> {
        let input = &self.config.input_dir;
        if !input.is_dir() {
            return Err(MigrateError::MissingInput(input.clone()));
        }
        let mut archives = Vec::new();
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => return Err(io::Error::from(err).into()),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable input entry");
                    continue;
                }
            };
            let is_archive = entry.path().extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION);
            if entry.file_type().is_file() && is_archive {
                archives.push(entry.into_path());
            }
        }
        Ok(archives)
    }

    fn discover(&self, archives: &[PathBuf]) -> Vec<ArchiveUnit> {
        let mut units = Vec::with_capacity(archives.len());
        // output path -> input that claimed it
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        for path in archives {
            let unit = self.load_unit(path).and_then(|unit| match claimed.get(unit.output()) {
                Some(first) => Err(MigrateError::DuplicateOutput {
                    output: unit.output().to_path_buf(),
                    claimed_by: first.clone(),
                }),
                None => Ok(unit),
            });
            match unit {
                Ok(unit) => {
                    claimed.insert(unit.output().to_path_buf(), path.clone());
                    units.push(unit);
                }
                Err(err) => self.reporter.archive_failed(&self.display_name(path), Phase::Discover, &err),
            }
        }
        units
    }

    fn load_unit(&self, path: &Path) -> MigrateResult<ArchiveUnit> {
        debug!(archive = %path.display(), "parsing metadata");
        let contents = ArchiveContents::read(path)?;
        let manifest = ModsToml::parse(entry_text(&contents, SOURCE_MANIFEST)?)?;
        let jar_version = contents
            .get(MANIFEST_PATH)
            .and_then(|data| manifest_attribute(&String::from_utf8_lossy(data), VERSION_ATTRIBUTE));
        let access_rules = match contents.get(ACCESS_TRANSFORMER_PATH) {
            Some(_) => Some(AccessTransformer::parse(entry_text(&contents, ACCESS_TRANSFORMER_PATH)?)?),
            None => None,
        };
        let output = self.config.output_dir.join(path.file_name().unwrap_or_default());
        Ok(ArchiveUnit::new(path, output, manifest)
            .with_jar_version(jar_version)
            .with_access_rules(access_rules))
    }

    fn translate_access_rules(&self, units: &mut [ArchiveUnit], engine: &dyn RemapEngine) {
        for unit in units {
            let Some(rules) = unit.access_rules() else {
                continue;
            };
            let Some(table) = engine.translation_table() else {
                self.reporter
                    .advisory(unit.name(), "engine has no translation table, access rules dropped");
                continue;
            };
            let (widener, failures) = translate(rules, table);
            for failure in &failures {
                self.reporter.record_skipped(unit.name(), failure);
            }
            unit.set_access_widener(widener);
        }
    }

    // -----------------------------------------------------------------------
    // Remapping
    // -----------------------------------------------------------------------

    fn remap(&self, units: &mut [ArchiveUnit], engine: &mut dyn RemapEngine) -> MigrateResult<()> {
        let mut engine = EngineGuard::new(engine);
        engine.read_classpath(&self.config.classpath)?;

        let mut tagged = Vec::with_capacity(units.len());
        for unit in units.iter_mut() {
            let tag = engine.create_input_tag();
            match engine.read_inputs(tag, unit.input()) {
                Ok(()) => tagged.push((tag, unit)),
                Err(err) => self.reporter.archive_failed(unit.name(), Phase::Remap, &err),
            }
        }

        for (tag, unit) in tagged {
            if let Err(err) = self.remap_one(&mut *engine, tag, unit) {
                self.reporter.archive_failed(unit.name(), Phase::Remap, &err);
                if let Err(err) = remove_if_present(unit.output()) {
                    warn!(archive = unit.name(), error = %err, "cannot remove partial output");
                }
            }
        }

        engine.finish();
        Ok(())
    }

    fn remap_one(&self, engine: &mut dyn RemapEngine, tag: InputTag, unit: &mut ArchiveUnit) -> MigrateResult<()> {
        remove_if_present(unit.output())?;
        let input = unit.input().to_path_buf();
        let mut writer = ArchiveWriter::create(unit.output())?;
        {
            let mut rewriter = MarkerRewriter::new(unit, &self.rules, self.reporter);
            engine.apply(tag, &mut writer, &mut rewriter)?;
        }
        let resources = copy_resources(&input, &mut writer)?;
        writer.finish()?;
        unit.mark_processed();
        debug!(archive = unit.name(), %tag, resources, "remapped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rewriting metadata
    // -----------------------------------------------------------------------

    fn rewrite_metadata(&self, unit: &ArchiveUnit, scratch: &Path) -> bool {
        if !unit.is_processed() {
            warn!(archive = unit.name(), "skipping metadata, archive was not remapped");
            return false;
        }
        match self.synthesizer.rewrite(unit, scratch, self.reporter) {
            Ok(()) => true,
            Err(err) => {
                self.reporter.archive_failed(unit.name(), Phase::Metadata, &err);
                if let Err(err) = remove_if_present(unit.output()) {
                    warn!(archive = unit.name(), error = %err, "cannot remove unmigrated output");
                }
                false
            }
        }
    }

    /// Input path relative to the input location, so nested archives
    /// sharing a file name stay distinguishable in reports.
    fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.input_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn entry_text<'c>(contents: &'c ArchiveContents, name: &'static str) -> MigrateResult<&'c str> {
    let data = contents.get(name).ok_or(MigrateError::MissingEntry(name))?;
    std::str::from_utf8(data).map_err(|_| MigrateError::NotUtf8(name))
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
