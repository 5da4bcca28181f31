//! Target descriptors (`fabric.mod.json`) and the translator that builds
//! them from a [`ModsToml`].

use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::error::{ManifestError, ManifestResult};
use crate::mods_toml::{DependencyEntry, ModEntry, ModsToml};

/// Descriptor file name at an archive root.
pub const DESCRIPTOR_FILE: &str = "fabric.mod.json";

/// Icon path used when a component declares no logo.
pub const PLACEHOLDER_ICON: &str = "assets/rehost-generated/icon.png";

/// Key of the migration metadata object inside `custom`.
pub const META_KEY: &str = "rehost:meta";

/// Back-reference from a bundled component to its parent.
pub const PARENT_KEY: &str = "modmenu:parent";

/// Version placeholder resolved from the archive's own manifest.
pub const JAR_VERSION: &str = "${file.jarVersion}";

const FALLBACK_VERSION: &str = "0.0.0";

/// Dependencies that only exist on the source platform.
const SOURCE_PLATFORM_IDS: &[&str] = &["forge"];

// ---------------------------------------------------------------------------
// ModDescriptor
// ---------------------------------------------------------------------------

/// One target descriptor, kept as an ordered JSON object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModDescriptor(Map<String, Value>);

impl ModDescriptor {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn id(&self) -> &str {
        self.0.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn icon(&self) -> Option<&str> {
        self.0.get("icon").and_then(Value::as_str)
    }

    /// Whether the descriptor points at the generated placeholder icon.
    pub fn uses_placeholder_icon(&self) -> bool {
        self.icon() == Some(PLACEHOLDER_ICON)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// The `custom` object, created when absent.
    pub fn custom_mut(&mut self) -> ManifestResult<&mut Map<String, Value>> {
        object_entry(&mut self.0, "custom")
    }

    /// The migration metadata object inside `custom`, created when absent.
    pub fn meta_mut(&mut self) -> ManifestResult<&mut Map<String, Value>> {
        object_entry(self.custom_mut()?, META_KEY)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_pretty_json(&self) -> ManifestResult<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }
}

fn object_entry<'m>(map: &'m mut Map<String, Value>, key: &str) -> ManifestResult<&'m mut Map<String, Value>> {
    map.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| ManifestError::field(key, "expected a JSON object"))
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate a source manifest into target descriptors, primary first.
///
/// `jar_version` replaces the `${file.jarVersion}` placeholder. Dependency
/// entries that cannot be translated are left out and returned next to the
/// descriptors; an invalid component fails the whole manifest.
pub fn to_descriptors(
    manifest: &ModsToml,
    jar_version: Option<&str>,
) -> ManifestResult<(Vec<ModDescriptor>, Vec<ManifestError>)> {
    if !manifest.is_java_loader() {
        error!(loader = %manifest.mod_loader, "unsupported mod loader");
    }
    let mut descriptors = Vec::with_capacity(manifest.mods.len());
    let mut skipped = Vec::new();
    for entry in &manifest.mods {
        descriptors.push(translate_entry(manifest, entry, jar_version, &mut skipped)?);
    }
    Ok((descriptors, skipped))
}

fn translate_entry(
    manifest: &ModsToml,
    entry: &ModEntry,
    jar_version: Option<&str>,
    skipped: &mut Vec<ManifestError>,
) -> ManifestResult<ModDescriptor> {
    if !is_valid_id(&entry.mod_id) {
        return Err(ManifestError::field("modId", format!("`{}` is not a valid id", entry.mod_id)));
    }

    let mut descriptor = ModDescriptor::default();
    descriptor.set("schemaVersion", 1);
    descriptor.set("id", entry.mod_id.as_str());
    descriptor.set("version", resolve_version(entry, jar_version));
    descriptor.set("name", entry.display_name.as_deref().unwrap_or(&entry.mod_id));
    descriptor.set("description", entry.description.as_deref().unwrap_or_default().trim());

    let authors = entry.authors.as_ref().map(|a| a.names()).unwrap_or_default();
    descriptor.set("authors", authors);

    let mut contact = Map::new();
    if let Some(url) = &entry.display_url {
        contact.insert("homepage".into(), url.as_str().into());
    }
    if let Some(url) = &manifest.issue_tracker_url {
        contact.insert("issues".into(), url.as_str().into());
    }
    if !contact.is_empty() {
        descriptor.set("contact", contact);
    }
    if let Some(license) = &manifest.license {
        descriptor.set("license", license.as_str());
    }
    descriptor.set("icon", entry.logo_file.as_deref().unwrap_or(PLACEHOLDER_ICON));
    descriptor.set("environment", "*");

    let mut depends = Map::new();
    let mut recommends = Map::new();
    for dependency in manifest.dependencies_of(&entry.mod_id) {
        if SOURCE_PLATFORM_IDS.contains(&dependency.mod_id.as_str()) {
            continue;
        }
        let predicate = match dependency_predicate(dependency) {
            Ok(predicate) => predicate,
            Err(source) => {
                warn!(
                    mod_id = %entry.mod_id,
                    dependency = %dependency.mod_id,
                    error = %source,
                    "skipping dependency"
                );
                skipped.push(ManifestError::Dependency {
                    mod_id: entry.mod_id.clone(),
                    dependency: dependency.mod_id.clone(),
                    source: Box::new(source),
                });
                continue;
            }
        };
        let bucket = if dependency.mandatory { &mut depends } else { &mut recommends };
        bucket.insert(dependency.mod_id.clone(), predicate);
    }
    descriptor.set("depends", depends);
    if !recommends.is_empty() {
        descriptor.set("recommends", recommends);
    }

    let meta = descriptor.meta_mut()?;
    meta.insert("loaderVersion".into(), manifest.loader_version.as_str().into());
    if let Some(credits) = &entry.credits {
        meta.insert("credits".into(), credits.as_str().into());
    }
    Ok(descriptor)
}

fn resolve_version(entry: &ModEntry, jar_version: Option<&str>) -> String {
    let version = entry.version.as_deref().unwrap_or("1");
    if version != JAR_VERSION {
        return version.to_string();
    }
    match jar_version {
        Some(resolved) => resolved.to_string(),
        None => {
            warn!(mod_id = %entry.mod_id, "archive has no Implementation-Version, using {FALLBACK_VERSION}");
            FALLBACK_VERSION.to_string()
        }
    }
}

fn dependency_predicate(dependency: &DependencyEntry) -> ManifestResult<Value> {
    version_predicates(dependency.version_range.as_deref().unwrap_or_default())
}

fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && (2..=64).contains(&id.len())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

// ---------------------------------------------------------------------------
// Version ranges
// ---------------------------------------------------------------------------

/// Convert a maven version range into target version predicates.
///
/// A single restriction becomes one predicate string, a union of several
/// becomes an array of them.
pub fn version_predicates(range: &str) -> ManifestResult<Value> {
    let range = range.trim();
    if range.is_empty() || range == "*" {
        return Ok(json!("*"));
    }
    if !range.starts_with(['[', '(']) {
        return Ok(Value::String(format!(">={range}")));
    }

    let invalid = || ManifestError::VersionRange(range.to_string());
    let mut predicates = Vec::new();
    let mut rest = range;
    while !rest.is_empty() {
        let inclusive_low = match rest.as_bytes()[0] {
            b'[' => true,
            b'(' => false,
            _ => return Err(invalid()),
        };
        let end = rest.find([']', ')']).ok_or_else(invalid)?;
        let inclusive_high = rest.as_bytes()[end] == b']';
        predicates.push(restriction(&rest[1..end], inclusive_low, inclusive_high).ok_or_else(invalid)?);
        rest = rest[end + 1..].trim_start_matches([',', ' ']);
    }

    Ok(match predicates.len() {
        1 => Value::String(predicates.remove(0)),
        _ => Value::Array(predicates.into_iter().map(Value::String).collect()),
    })
}

fn restriction(body: &str, inclusive_low: bool, inclusive_high: bool) -> Option<String> {
    let Some((low, high)) = body.split_once(',') else {
        let exact = body.trim();
        return (inclusive_low && inclusive_high && !exact.is_empty()).then(|| exact.to_string());
    };
    let (low, high) = (low.trim(), high.trim());
    let mut parts = Vec::with_capacity(2);
    if !low.is_empty() {
        parts.push(format!("{}{low}", if inclusive_low { ">=" } else { ">" }));
    }
    if !high.is_empty() {
        parts.push(format!("{}{high}", if inclusive_high { "<=" } else { "<" }));
    }
    Some(if parts.is_empty() { "*".to_string() } else { parts.join(" ") })
}
