//! Manifest and access-rule translation for rehost.
//!
//! # Architecture
//!
//! - **mods_toml**: serde model of the source manifest
//! - **descriptor**: target descriptors and the manifest translator
//! - **access**: source access-rule parser
//! - **widener**: access-rule translation into the target format

pub mod access;
pub mod descriptor;
pub mod error;
pub mod mods_toml;
pub mod widener;

pub use access::{AccessRule, AccessTransformer, FinalChange, RuleTarget, Visibility, ACCESS_TRANSFORMER_PATH};
pub use descriptor::{
    to_descriptors, version_predicates, ModDescriptor, DESCRIPTOR_FILE, JAR_VERSION, META_KEY, PARENT_KEY,
    PLACEHOLDER_ICON,
};
pub use error::{ManifestError, ManifestResult};
pub use mods_toml::{Authors, DependencyEntry, ModEntry, ModsToml, SOURCE_MANIFEST};
pub use widener::{translate, AccessKind, AccessWidener, WidenerTarget};
