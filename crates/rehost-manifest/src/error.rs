//! Error types for the manifest crate.

/// Errors raised while reading or translating manifests and access rules.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid mods.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source manifest declares no components.
    #[error("mods.toml declares no [[mods]] entries")]
    NoMods,

    /// A descriptor field had an unexpected shape.
    #[error("descriptor field `{field}`: {reason}")]
    Field { field: String, reason: String },

    #[error("invalid version range `{0}`")]
    VersionRange(String),

    /// One dependency entry of a component could not be translated.
    #[error("dependency `{dependency}` of `{mod_id}`")]
    Dependency {
        mod_id: String,
        dependency: String,
        #[source]
        source: Box<ManifestError>,
    },

    /// A line of an access transformer could not be parsed.
    #[error("access transformer line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    /// An access rule could not be expressed in target names.
    #[error("cannot translate `{rule}`: {reason}")]
    Untranslatable { rule: String, reason: String },
}

impl ManifestError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for manifest results.
pub type ManifestResult<T> = Result<T, ManifestError>;
