//! The source platform's component manifest, `META-INF/mods.toml`.
//!
//! Only the keys the translator reads are modelled; anything else in the
//! file is ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, ManifestResult};

/// Path of the source manifest inside an archive.
pub const SOURCE_MANIFEST: &str = "META-INF/mods.toml";

/// The only loader the translator understands.
pub const JAVA_LOADER: &str = "javafml";

/// A parsed `mods.toml`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModsToml {
    #[serde(default)]
    pub mod_loader: String,
    #[serde(default)]
    pub loader_version: String,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(rename = "issueTrackerURL", default)]
    pub issue_tracker_url: Option<String>,
    #[serde(default)]
    pub mods: Vec<ModEntry>,
    /// Dependencies keyed by the declaring component's id.
    #[serde(default)]
    pub dependencies: IndexMap<String, Vec<DependencyEntry>>,
}

/// One `[[mods]]` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub mod_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_file: Option<String>,
    #[serde(default)]
    pub authors: Option<Authors>,
    #[serde(default)]
    pub credits: Option<String>,
    #[serde(rename = "displayURL", default)]
    pub display_url: Option<String>,
}

/// `authors` is written either as one comma separated string or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Authors {
    One(String),
    Many(Vec<String>),
}

impl Authors {
    pub fn names(&self) -> Vec<String> {
        let split = |text: &str| {
            text.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        match self {
            Self::One(text) => split(text),
            Self::Many(list) => list.iter().flat_map(|text| split(text)).collect(),
        }
    }
}

/// One `[[dependencies.<modId>]]` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEntry {
    pub mod_id: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub version_range: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
}

impl ModsToml {
    /// Parse a manifest. A manifest without any `[[mods]]` is rejected.
    pub fn parse(text: &str) -> ManifestResult<Self> {
        let manifest: Self = toml::from_str(text)?;
        if manifest.mods.is_empty() {
            return Err(ManifestError::NoMods);
        }
        Ok(manifest)
    }

    pub fn is_java_loader(&self) -> bool {
        self.mod_loader == JAVA_LOADER
    }

    pub fn dependencies_of(&self, mod_id: &str) -> &[DependencyEntry] {
        self.dependencies.get(mod_id).map(Vec::as_slice).unwrap_or_default()
    }
}
