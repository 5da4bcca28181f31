//! Metadata synthesis for remapped archives.
//!
//! Replaces the source manifest of a processed archive with target
//! descriptors: the primary descriptor at the archive root, and one nested
//! archive per secondary descriptor under `META-INF/jars/`.

use std::fs;
use std::path::Path;

use rehost_manifest::{
    to_descriptors, ModDescriptor, ACCESS_TRANSFORMER_PATH, DESCRIPTOR_FILE, PARENT_KEY, PLACEHOLDER_ICON,
    SOURCE_MANIFEST,
};
use rehost_remap::ArchiveContents;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::MigrateResult;
use crate::ledger::{LEDGER_ENTRY, LEDGER_REFERENCE};
use crate::report::Reporter;
use crate::unit::ArchiveUnit;

/// Greyscale icon written wherever a descriptor uses the placeholder path.
pub const PLACEHOLDER_ICON_PNG: &[u8] = include_bytes!("../assets/icon.png");

/// Directory nested archives are bundled under.
pub const BUNDLE_DIR: &str = "META-INF/jars";

/// Resource pack metadata the target platform does not use.
const PACK_METADATA: &str = "pack.mcmeta";

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataSynthesizer;

impl MetadataSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite the metadata of `unit`'s output archive in place. Nested
    /// archives are staged in `scratch` and removed afterwards.
    pub fn rewrite(&self, unit: &ArchiveUnit, scratch: &Path, reporter: &Reporter) -> MigrateResult<()> {
        let archive = unit.name();
        info!(archive, "rewriting metadata");

        let mut contents = ArchiveContents::read(unit.output())?;
        let (descriptors, skipped) = to_descriptors(unit.manifest(), unit.jar_version())?;
        for err in &skipped {
            reporter.record_skipped(archive, err);
        }
        let mut descriptors = descriptors.into_iter();
        let Some(mut primary) = descriptors.next() else {
            return Err(rehost_manifest::ManifestError::NoMods.into());
        };
        let mut secondaries: Vec<ModDescriptor> = descriptors.collect();
        let primary_id = primary.id().to_string();

        primary.set("entrypoints", serde_json::to_value(unit.entry_points())?);

        let mut jars = Vec::with_capacity(secondaries.len());
        for secondary in &mut secondaries {
            jars.push(json!({ "file": bundle_path(secondary.id()) }));
            match secondary.custom_mut() {
                Ok(custom) => {
                    custom.insert(PARENT_KEY.to_string(), Value::String(primary_id.clone()));
                }
                Err(err) => reporter.record_skipped(archive, &err),
            }
        }
        primary.set("jars", jars);

        if !unit.ledger().is_empty() {
            for descriptor in std::iter::once(&mut primary).chain(secondaries.iter_mut()) {
                match descriptor.meta_mut() {
                    Ok(meta) => {
                        meta.insert("annotations".to_string(), LEDGER_REFERENCE.into());
                    }
                    Err(err) => reporter.record_skipped(archive, &err),
                }
            }
            contents.insert(LEDGER_ENTRY, unit.ledger().to_json()?.into_bytes());
        }

        if let Some(widener) = unit.access_widener() {
            let file = format!("{primary_id}.accessWidener");
            primary.set("accessWidener", file.as_str());
            contents.remove(ACCESS_TRANSFORMER_PATH);
            contents.insert(file, widener.render().into_bytes());
        }

        contents.insert(DESCRIPTOR_FILE, primary.to_pretty_json()?.into_bytes());
        write_icon(&primary, &mut contents);

        for secondary in &secondaries {
            let nested = self.bundle(secondary, scratch)?;
            contents.insert(bundle_path(secondary.id()), nested);
        }

        contents.remove(SOURCE_MANIFEST);
        contents.remove(PACK_METADATA);
        contents.write(unit.output())?;
        debug!(archive, bundled = secondaries.len(), "metadata rewritten");
        Ok(())
    }

    /// Build the nested archive for one secondary descriptor.
    fn bundle(&self, descriptor: &ModDescriptor, scratch: &Path) -> MigrateResult<Vec<u8>> {
        let staged = scratch.join(format!("{}.jar", descriptor.id()));
        let mut nested = ArchiveContents::new();
        write_icon(descriptor, &mut nested);
        nested.insert(DESCRIPTOR_FILE, descriptor.to_pretty_json()?.into_bytes());
        nested.write(&staged)?;
        let bytes = fs::read(&staged)?;
        fs::remove_file(&staged)?;
        Ok(bytes)
    }
}

fn bundle_path(id: &str) -> String {
    format!("{BUNDLE_DIR}/{id}.jar")
}

fn write_icon(descriptor: &ModDescriptor, contents: &mut ArchiveContents) {
    if descriptor.uses_placeholder_icon() {
        contents.insert(PLACEHOLDER_ICON, PLACEHOLDER_ICON_PNG.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehost_manifest::{AccessKind, AccessWidener, ModsToml, WidenerTarget, META_KEY};

    const MANIFEST: &str = r#"
modLoader = "javafml"
loaderVersion = "[31,)"

[[mods]]
modId = "bundle"
version = "1.0"

[[mods]]
modId = "bundle_api"
version = "1.0"

[[mods]]
modId = "bundle_compat"
version = "1.0"
logoFile = "compat.png"
"#;

    struct Fixture {
        dir: tempfile::TempDir,
        unit: ArchiveUnit,
    }

    fn fixture(manifest: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("bundle.jar");
        let mut contents = ArchiveContents::new();
        contents.insert(SOURCE_MANIFEST, manifest.as_bytes().to_vec());
        contents.insert(PACK_METADATA, b"{}".to_vec());
        contents.insert(ACCESS_TRANSFORMER_PATH, b"public a.B\n".to_vec());
        contents.insert("org/example/Mod.class", vec![0xCA, 0xFE, 0xBA, 0xBE]);
        contents.write(&output).unwrap();
        let mut unit = ArchiveUnit::new(dir.path().join("in/bundle.jar"), output, ModsToml::parse(manifest).unwrap());
        unit.mark_processed();
        Fixture { dir, unit }
    }

    fn descriptor(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn secondaries_become_nested_archives() {
        let mut fx = fixture(MANIFEST);
        fx.unit.add_entry_point("mod-instance:bundle", "org/example/Mod");
        let scratch = fx.dir.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();

        MetadataSynthesizer::new().rewrite(&fx.unit, &scratch, &Reporter::new()).unwrap();

        let out = ArchiveContents::read(fx.unit.output()).unwrap();
        let primary = descriptor(out.get(DESCRIPTOR_FILE).unwrap());
        assert_eq!(
            primary["jars"],
            json!([{"file": "META-INF/jars/bundle_api.jar"}, {"file": "META-INF/jars/bundle_compat.jar"}])
        );
        assert_eq!(primary["entrypoints"], json!({"mod-instance:bundle": ["org.example.Mod"]}));
        assert!(primary.get("accessWidener").is_none());

        let nested: Vec<&str> = out.names().filter(|n| n.starts_with(BUNDLE_DIR)).collect();
        assert_eq!(nested, vec!["META-INF/jars/bundle_api.jar", "META-INF/jars/bundle_compat.jar"]);

        let api = ArchiveContents::from_bytes(out.get("META-INF/jars/bundle_api.jar").unwrap()).unwrap();
        assert_eq!(api.names().collect::<Vec<_>>(), vec![PLACEHOLDER_ICON, DESCRIPTOR_FILE]);
        let api_descriptor = descriptor(api.get(DESCRIPTOR_FILE).unwrap());
        assert_eq!(api_descriptor["custom"][PARENT_KEY], json!("bundle"));
        let compat = ArchiveContents::from_bytes(out.get("META-INF/jars/bundle_compat.jar").unwrap()).unwrap();
        assert_eq!(compat.names().collect::<Vec<_>>(), vec![DESCRIPTOR_FILE]);

        assert!(out.contains(PLACEHOLDER_ICON));
        assert!(!out.contains(SOURCE_MANIFEST));
        assert!(!out.contains(PACK_METADATA));
        assert!(!out.contains(LEDGER_ENTRY));
        assert!(out.contains("org/example/Mod.class"));
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn ledger_is_stamped_on_every_descriptor() {
        let mut fx = fixture(MANIFEST);
        fx.unit
            .ledger_mut()
            .accept_class("Lnet/minecraftforge/fml/common/Mod;", "org/example/Mod");

        MetadataSynthesizer::new().rewrite(&fx.unit, fx.dir.path(), &Reporter::new()).unwrap();

        let out = ArchiveContents::read(fx.unit.output()).unwrap();
        let primary = descriptor(out.get(DESCRIPTOR_FILE).unwrap());
        assert_eq!(primary["custom"][META_KEY]["annotations"], json!(LEDGER_REFERENCE));
        let api = ArchiveContents::from_bytes(out.get("META-INF/jars/bundle_api.jar").unwrap()).unwrap();
        assert_eq!(descriptor(api.get(DESCRIPTOR_FILE).unwrap())["custom"][META_KEY]["annotations"], json!(LEDGER_REFERENCE));

        let ledger = descriptor(out.get(LEDGER_ENTRY).unwrap());
        assert_eq!(ledger["entries"][0]["targetType"], json!("TYPE"));
    }

    #[test]
    fn malformed_dependency_is_skipped_not_fatal() {
        let manifest = format!(
            "{MANIFEST}\n[[dependencies.bundle]]\nmodId = \"jei\"\nmandatory = false\nversionRange = \"[1.0\"\n"
        );
        let fx = fixture(&manifest);
        let reporter = Reporter::new();

        MetadataSynthesizer::new().rewrite(&fx.unit, fx.dir.path(), &reporter).unwrap();

        let skipped = reporter.skipped();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].archive, "bundle.jar");
        assert!(skipped[0].message.contains("`jei`"));
        assert!(skipped[0].message.contains("[1.0"));

        let out = ArchiveContents::read(fx.unit.output()).unwrap();
        let primary = descriptor(out.get(DESCRIPTOR_FILE).unwrap());
        assert!(primary.get("recommends").is_none());
        assert!(!out.contains(SOURCE_MANIFEST));
    }

    #[test]
    fn access_rules_replace_the_source_file() {
        let mut fx = fixture("[[mods]]\nmodId = \"solo\"\nversion = \"1\"\n");
        let mut widener = AccessWidener::new("intermediary");
        widener.push(AccessKind::Accessible, WidenerTarget::Class("a/B".into()));
        fx.unit.set_access_widener(widener);

        MetadataSynthesizer::new().rewrite(&fx.unit, fx.dir.path(), &Reporter::new()).unwrap();

        let out = ArchiveContents::read(fx.unit.output()).unwrap();
        let primary = descriptor(out.get(DESCRIPTOR_FILE).unwrap());
        assert_eq!(primary["accessWidener"], json!("solo.accessWidener"));
        assert_eq!(primary["jars"], json!([]));
        assert!(!out.contains(ACCESS_TRANSFORMER_PATH));
        assert_eq!(
            out.get("solo.accessWidener").unwrap(),
            b"accessWidener\tv1\tintermediary\naccessible\tclass\ta/B\n"
        );
    }
}
