//! The bidirectional translation table.
//!
//! [`TranslationTable`] owns one list of class, field and method entries
//! and derives both lookup directions from it in a single pass, so the
//! forward view (used to rename symbols) and the reverse view (used to
//! translate access rules back into source names) always agree.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::descriptor::{remap_descriptor, remap_signature};
use crate::error::MappingResult;

/// A class rename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMapping {
    pub source: String,
    pub target: String,
}

/// A field or method rename. `owner` and `descriptor` are in the source
/// namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberMapping {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub target_name: String,
}

impl MemberMapping {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        target_name: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            target_name: target_name.into(),
        }
    }
}

/// Lookup key for a member: owner, name and descriptor in one namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberKey {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Index {
    classes: IndexMap<String, String>,
    fields: HashMap<MemberKey, String>,
    methods: HashMap<MemberKey, String>,
    /// (owner, name) → (mapped name, descriptor in this namespace)
    fields_by_name: HashMap<(String, String), (String, String)>,
}

/// A field found by owner and name alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldMatch<'t> {
    /// Name in the other namespace.
    pub mapped_name: &'t str,
    /// Descriptor in this view's source namespace.
    pub descriptor: &'t str,
}

/// Class and member renames between two namespaces.
#[derive(Debug, Default)]
pub struct TranslationTable {
    source_namespace: String,
    target_namespace: String,
    classes: Vec<ClassMapping>,
    fields: Vec<MemberMapping>,
    methods: Vec<MemberMapping>,
    forward: Index,
    reverse: Index,
}

impl TranslationTable {
    /// Build a table and both of its lookup directions.
    pub fn new(
        source_namespace: impl Into<String>,
        target_namespace: impl Into<String>,
        classes: Vec<ClassMapping>,
        fields: Vec<MemberMapping>,
        methods: Vec<MemberMapping>,
    ) -> Self {
        let mut table = Self {
            source_namespace: source_namespace.into(),
            target_namespace: target_namespace.into(),
            classes,
            fields,
            methods,
            forward: Index::default(),
            reverse: Index::default(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        let mut forward = Index::default();
        let mut reverse = Index::default();
        for class in &self.classes {
            forward.classes.insert(class.source.clone(), class.target.clone());
            reverse.classes.insert(class.target.clone(), class.source.clone());
        }
        self.forward = forward;

        // The reverse member keys need target descriptors, which come from
        // the forward class index built above.
        let view = self.forward();
        let map = |name: &str| view.map_class(name);
        let mut forward_by_name = HashMap::with_capacity(self.fields.len());
        let mut reverse_by_name = HashMap::with_capacity(self.fields.len());
        for field in &self.fields {
            forward_by_name.insert(
                (field.owner.clone(), field.name.clone()),
                (field.target_name.clone(), field.descriptor.clone()),
            );
            if let Ok(descriptor) = remap_descriptor(&field.descriptor, &map) {
                reverse_by_name.insert(
                    (map(&field.owner), field.target_name.clone()),
                    (field.name.clone(), descriptor),
                );
            }
        }
        let mut reverse_fields = HashMap::with_capacity(self.fields.len());
        let mut reverse_methods = HashMap::with_capacity(self.methods.len());
        let mut fields = HashMap::with_capacity(self.fields.len());
        let mut methods = HashMap::with_capacity(self.methods.len());
        for (members, forward_index, reverse_index) in [
            (&self.fields, &mut fields, &mut reverse_fields),
            (&self.methods, &mut methods, &mut reverse_methods),
        ] {
            for member in members {
                forward_index.insert(
                    MemberKey::new(&member.owner, &member.name, &member.descriptor),
                    member.target_name.clone(),
                );
                let descriptor = match remap_descriptor(&member.descriptor, &map) {
                    Ok(descriptor) => descriptor,
                    Err(err) => {
                        tracing::warn!(owner = %member.owner, name = %member.name, error = %err, "skipping reverse entry");
                        continue;
                    }
                };
                reverse_index.insert(
                    MemberKey::new(&map(&member.owner), &member.target_name, &descriptor),
                    member.name.clone(),
                );
            }
        }
        reverse.fields = reverse_fields;
        reverse.methods = reverse_methods;
        reverse.fields_by_name = reverse_by_name;
        self.forward.fields = fields;
        self.forward.methods = methods;
        self.forward.fields_by_name = forward_by_name;
        self.reverse = reverse;
    }

    pub fn source_namespace(&self) -> &str {
        &self.source_namespace
    }

    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    pub fn classes(&self) -> &[ClassMapping] {
        &self.classes
    }

    pub fn fields(&self) -> &[MemberMapping] {
        &self.fields
    }

    pub fn methods(&self) -> &[MemberMapping] {
        &self.methods
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    /// Source → target lookups.
    pub fn forward(&self) -> TableView<'_> {
        TableView { index: &self.forward }
    }

    /// Target → source lookups.
    pub fn reverse(&self) -> TableView<'_> {
        TableView { index: &self.reverse }
    }

    /// Drop every class entry (and the members it owns) whose source name
    /// fails `keep`, then rebuild both directions. Returns the number of
    /// class entries dropped.
    pub fn retain_classes(&mut self, keep: impl Fn(&str) -> bool) -> usize {
        let before = self.classes.len();
        self.classes.retain(|c| keep(&c.source));
        self.fields.retain(|m| keep(&m.owner));
        self.methods.retain(|m| keep(&m.owner));
        let dropped = before - self.classes.len();
        if dropped > 0 {
            self.reindex();
        }
        dropped
    }
}

/// One lookup direction of a [`TranslationTable`].
#[derive(Clone, Copy, Debug)]
pub struct TableView<'t> {
    index: &'t Index,
}

impl<'t> TableView<'t> {
    /// Exact class lookup.
    pub fn class(&self, name: &str) -> Option<&'t str> {
        self.index.classes.get(name).map(String::as_str)
    }

    /// Class name in the other namespace. Unlisted inner classes follow
    /// their outer class; anything else is returned unchanged.
    pub fn map_class(&self, name: &str) -> String {
        if let Some(mapped) = self.class(name) {
            return mapped.to_string();
        }
        match name.rsplit_once('$') {
            Some((outer, inner)) if !outer.is_empty() => {
                let mapped_outer = self.map_class(outer);
                if mapped_outer == outer {
                    name.to_string()
                } else {
                    format!("{mapped_outer}${inner}")
                }
            }
            _ => name.to_string(),
        }
    }

    /// Exact field lookup, keyed in this view's source namespace.
    pub fn field(&self, owner: &str, name: &str, descriptor: &str) -> Option<&'t str> {
        self.index
            .fields
            .get(&MemberKey::new(owner, name, descriptor))
            .map(String::as_str)
    }

    /// Field lookup without a descriptor. Access rules name fields this
    /// way; the match carries the descriptor they leave out.
    pub fn field_by_name(&self, owner: &str, name: &str) -> Option<FieldMatch<'t>> {
        self.index
            .fields_by_name
            .get(&(owner.to_string(), name.to_string()))
            .map(|(mapped_name, descriptor)| FieldMatch {
                mapped_name,
                descriptor,
            })
    }

    /// Exact method lookup, keyed in this view's source namespace.
    pub fn method(&self, owner: &str, name: &str, descriptor: &str) -> Option<&'t str> {
        self.index
            .methods
            .get(&MemberKey::new(owner, name, descriptor))
            .map(String::as_str)
    }

    pub fn map_descriptor(&self, descriptor: &str) -> MappingResult<String> {
        remap_descriptor(descriptor, &|name: &str| self.map_class(name))
    }

    pub fn map_signature(&self, signature: &str) -> MappingResult<String> {
        remap_signature(signature, &|name: &str| self.map_class(name))
    }

    pub fn class_count(&self) -> usize {
        self.index.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TranslationTable {
        TranslationTable::new(
            "srg",
            "intermediary",
            vec![
                ClassMapping {
                    source: "net/minecraft/block/Block".into(),
                    target: "net/minecraft/class_2248".into(),
                },
                ClassMapping {
                    source: "net/minecraft/item/Item".into(),
                    target: "net/minecraft/class_1792".into(),
                },
            ],
            vec![MemberMapping::new(
                "net/minecraft/block/Block",
                "field_149770_b",
                "Lnet/minecraft/item/Item;",
                "field_10634",
            )],
            vec![MemberMapping::new(
                "net/minecraft/block/Block",
                "func_149659_a",
                "(Lnet/minecraft/item/Item;)Z",
                "method_9533",
            )],
        )
    }

    #[test]
    fn forward_and_reverse_agree() {
        let table = sample_table();
        let forward = table.forward();
        let reverse = table.reverse();

        assert_eq!(forward.class("net/minecraft/block/Block"), Some("net/minecraft/class_2248"));
        assert_eq!(reverse.class("net/minecraft/class_2248"), Some("net/minecraft/block/Block"));

        assert_eq!(
            forward.field("net/minecraft/block/Block", "field_149770_b", "Lnet/minecraft/item/Item;"),
            Some("field_10634")
        );
        assert_eq!(
            reverse.field("net/minecraft/class_2248", "field_10634", "Lnet/minecraft/class_1792;"),
            Some("field_149770_b")
        );
        assert_eq!(
            reverse.method("net/minecraft/class_2248", "method_9533", "(Lnet/minecraft/class_1792;)Z"),
            Some("func_149659_a")
        );
    }

    #[test]
    fn fields_resolve_without_descriptor() {
        let table = sample_table();
        let forward = table
            .forward()
            .field_by_name("net/minecraft/block/Block", "field_149770_b")
            .unwrap();
        assert_eq!(forward.mapped_name, "field_10634");
        assert_eq!(forward.descriptor, "Lnet/minecraft/item/Item;");

        let reverse = table
            .reverse()
            .field_by_name("net/minecraft/class_2248", "field_10634")
            .unwrap();
        assert_eq!(reverse.mapped_name, "field_149770_b");
        assert_eq!(reverse.descriptor, "Lnet/minecraft/class_1792;");
    }

    #[test]
    fn inner_classes_follow_outer() {
        let table = sample_table();
        assert_eq!(
            table.forward().map_class("net/minecraft/block/Block$Properties"),
            "net/minecraft/class_2248$Properties"
        );
        assert_eq!(table.forward().map_class("org/example/Mod$1"), "org/example/Mod$1");
    }

    #[test]
    fn descriptors_map_through_view() {
        let table = sample_table();
        assert_eq!(
            table
                .forward()
                .map_descriptor("(Lnet/minecraft/block/Block;I)Lnet/minecraft/item/Item;")
                .unwrap(),
            "(Lnet/minecraft/class_2248;I)Lnet/minecraft/class_1792;"
        );
    }

    #[test]
    fn retain_classes_prunes_both_directions() {
        let mut table = sample_table();
        let dropped = table.retain_classes(|name| name != "net/minecraft/block/Block");
        assert_eq!(dropped, 1);
        assert!(table.forward().class("net/minecraft/block/Block").is_none());
        assert!(table.reverse().class("net/minecraft/class_2248").is_none());
        assert!(table.methods().is_empty());
        assert_eq!(table.forward().class_count(), 1);
    }
}
