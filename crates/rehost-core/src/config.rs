//! Run configuration, loaded from TOML with defaults for every key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;

/// Marker prefix of one mod's embedded language runtime.
const EMBEDDED_KOTLIN: &str = "Lcom/greenapple/glacia/embedded/kotlin/";

/// Settings for one migration run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory searched (recursively) for archives to migrate.
    pub input_dir: PathBuf,
    /// Directory migrated archives are written to, flat.
    pub output_dir: PathBuf,
    /// Working directory; scratch space for nested archives lives here.
    pub work_dir: PathBuf,
    /// Reference archives used to resolve inherited members.
    pub classpath: Vec<PathBuf>,
    /// Translation table in tiny format.
    pub mappings: Option<PathBuf>,
    pub source_namespace: String,
    pub target_namespace: String,
    /// Drop table entries for classes the classpath does not contain.
    pub prune_mappings: bool,
    /// Interface added to every class carrying the mod declaration marker.
    pub capability_interface: String,
    /// Marker descriptor prefixes passed through without diagnostics.
    pub noise_marker_prefixes: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            work_dir: PathBuf::from("data"),
            classpath: Vec::new(),
            mappings: None,
            source_namespace: "srg".to_string(),
            target_namespace: "intermediary".to_string(),
            prune_mappings: true,
            capability_interface: "net/patchworkmc/api/ModInstance".to_string(),
            noise_marker_prefixes: vec![EMBEDDED_KOTLIN.to_string()],
        }
    }
}

impl MigrationConfig {
    pub fn from_toml_str(text: &str) -> MigrateResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file. Keys it leaves out keep their defaults.
    pub fn load(path: &Path) -> MigrateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
