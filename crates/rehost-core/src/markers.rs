//! Marker classification.
//!
//! Every marker met during the rewrite pass is classified by descriptor
//! and by the kind of declaration carrying it. The rewriters in
//! [`crate::rewrite`] dispatch on the resulting [`MarkerKind`].

use crate::config::MigrationConfig;

/// Identifies the component class of a source archive.
pub const MOD_MARKER: &str = "Lnet/minecraftforge/fml/common/Mod;";
/// Source-platform client/server restriction.
pub const ONLY_IN_MARKER: &str = "Lnet/minecraftforge/api/distmarker/OnlyIn;";
/// Enum type of the restriction's value on the source platform.
pub const DIST_ENUM: &str = "Lnet/minecraftforge/api/distmarker/Dist;";
/// Target-platform client/server restriction.
pub const ENVIRONMENT_MARKER: &str = "Lnet/fabricmc/api/Environment;";
pub const ENV_TYPE_ENUM: &str = "Lnet/fabricmc/api/EnvType;";

/// Entry-point kind prefix for component instances.
pub const MOD_INSTANCE_KIND: &str = "mod-instance:";

const SOURCE_PLATFORM_PREFIX: &str = "Lnet/minecraftforge/";
const NONNULL_BY_DEFAULT: &str = "Lmcp/MethodsReturnNonnullByDefault;";
const SCALA_SIGNATURE: &str = "Lscala/reflect/ScalaSignature;";
const NULLABILITY: &[&str] = &["Lorg/jetbrains/annotations/NotNull;", "Lorg/jetbrains/annotations/Nullable;"];
const STANDARD_LIBRARY_PREFIX: &str = "Ljava";

/// Kind of declaration a marker is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Site {
    Class,
    Field,
    Method,
}

/// What the rewriters do with a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// Registers an entry point and a capability interface; dropped.
    ModDeclaration,
    /// Rewritten to the target restriction marker.
    Environment,
    /// Removed with a diagnostic.
    Stripped,
    /// Known marker kept as is.
    Ignored,
    /// Unknown source-platform marker: kept, every value diagnosed.
    Unknown,
    /// Anything else, kept silently.
    Other,
}

/// The classification table plus the run-specific knobs it depends on.
#[derive(Clone, Debug)]
pub struct MarkerRules {
    capability_interface: String,
    noise_prefixes: Vec<String>,
}

impl Default for MarkerRules {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

impl MarkerRules {
    pub fn new(capability_interface: impl Into<String>, noise_prefixes: Vec<String>) -> Self {
        Self {
            capability_interface: capability_interface.into(),
            noise_prefixes,
        }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.capability_interface.clone(), config.noise_marker_prefixes.clone())
    }

    pub fn capability_interface(&self) -> &str {
        &self.capability_interface
    }

    pub fn classify(&self, descriptor: &str, site: Site) -> MarkerKind {
        match (descriptor, site) {
            (MOD_MARKER, Site::Class) => MarkerKind::ModDeclaration,
            (ONLY_IN_MARKER, _) => MarkerKind::Environment,
            (NONNULL_BY_DEFAULT, Site::Class) => MarkerKind::Stripped,
            (SCALA_SIGNATURE, Site::Class) => MarkerKind::Ignored,
            (d, Site::Field | Site::Method) if NULLABILITY.contains(&d) => MarkerKind::Ignored,
            (d, _) if d.starts_with(STANDARD_LIBRARY_PREFIX) => MarkerKind::Ignored,
            (d, _) if self.noise_prefixes.iter().any(|p| d.starts_with(p.as_str())) => MarkerKind::Ignored,
            (d, _) if d.starts_with(SOURCE_PLATFORM_PREFIX) => MarkerKind::Unknown,
            _ => MarkerKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_table() {
        let rules = MarkerRules::default();
        assert_eq!(rules.classify(MOD_MARKER, Site::Class), MarkerKind::ModDeclaration);
        assert_eq!(rules.classify(ONLY_IN_MARKER, Site::Class), MarkerKind::Environment);
        assert_eq!(rules.classify(NONNULL_BY_DEFAULT, Site::Class), MarkerKind::Stripped);
        assert_eq!(rules.classify(SCALA_SIGNATURE, Site::Class), MarkerKind::Ignored);
        assert_eq!(rules.classify("Ljava/lang/Deprecated;", Site::Class), MarkerKind::Ignored);
        assert_eq!(
            rules.classify("Lcom/greenapple/glacia/embedded/kotlin/Metadata;", Site::Class),
            MarkerKind::Ignored
        );
        assert_eq!(
            rules.classify("Lnet/minecraftforge/fml/common/Mod$EventBusSubscriber;", Site::Class),
            MarkerKind::Unknown
        );
        assert_eq!(rules.classify("Lorg/example/Custom;", Site::Class), MarkerKind::Other);
    }

    #[test]
    fn member_table() {
        let rules = MarkerRules::default();
        assert_eq!(rules.classify(ONLY_IN_MARKER, Site::Field), MarkerKind::Environment);
        assert_eq!(rules.classify(ONLY_IN_MARKER, Site::Method), MarkerKind::Environment);
        assert_eq!(
            rules.classify("Lorg/jetbrains/annotations/Nullable;", Site::Method),
            MarkerKind::Ignored
        );
        // class-only rows do not apply to members
        assert_eq!(rules.classify(MOD_MARKER, Site::Method), MarkerKind::Unknown);
        assert_eq!(rules.classify(NONNULL_BY_DEFAULT, Site::Field), MarkerKind::Other);
    }

    #[test]
    fn noise_prefixes_come_from_config() {
        let rules = MarkerRules::new("a/Capability", vec!["Lcom/noisy/".into()]);
        assert_eq!(rules.classify("Lcom/noisy/Thing;", Site::Field), MarkerKind::Ignored);
        assert_eq!(
            rules.classify("Lcom/greenapple/glacia/embedded/kotlin/Metadata;", Site::Class),
            MarkerKind::Other
        );
        assert_eq!(rules.capability_interface(), "a/Capability");
    }
}
