//! Target-platform access rules (access wideners) and the translator from
//! source-platform rules.

use std::fmt;

use indexmap::IndexSet;
use rehost_mapping::TranslationTable;
use tracing::{debug, warn};

use crate::access::{AccessRule, AccessTransformer, FinalChange, RuleTarget, Visibility};
use crate::error::{ManifestError, ManifestResult};

const CONSTRUCTOR: &str = "<init>";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Accessible,
    Extendable,
    Mutable,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accessible => "accessible",
            Self::Extendable => "extendable",
            Self::Mutable => "mutable",
        })
    }
}

/// A widened class or member, in target names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WidenerTarget {
    Class(String),
    Field { owner: String, name: String, descriptor: String },
    Method { owner: String, name: String, descriptor: String },
}

impl fmt::Display for WidenerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(name) => write!(f, "class\t{name}"),
            Self::Field { owner, name, descriptor } => write!(f, "field\t{owner}\t{name}\t{descriptor}"),
            Self::Method { owner, name, descriptor } => write!(f, "method\t{owner}\t{name}\t{descriptor}"),
        }
    }
}

/// A translated rule set. Entries are unique and keep insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessWidener {
    namespace: String,
    entries: IndexSet<(AccessKind, WidenerTarget)>,
}

impl AccessWidener {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: IndexSet::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Add an entry. Returns `false` when it was already present.
    pub fn push(&mut self, kind: AccessKind, target: WidenerTarget) -> bool {
        self.entries.insert((kind, target))
    }

    pub fn entries(&self) -> impl Iterator<Item = (AccessKind, &WidenerTarget)> {
        self.entries.iter().map(|(kind, target)| (*kind, target))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the `accessWidener v1` text form.
    pub fn render(&self) -> String {
        let mut out = format!("accessWidener\tv1\t{}\n", self.namespace);
        for (kind, target) in &self.entries {
            out.push_str(&format!("{kind}\t{target}\n"));
        }
        out
    }
}

/// Translate source rules into target names.
///
/// Rules that cannot be expressed are returned as errors next to the
/// widener; they never fail the whole set.
pub fn translate(at: &AccessTransformer, table: &TranslationTable) -> (AccessWidener, Vec<ManifestError>) {
    let mut widener = AccessWidener::new(table.target_namespace());
    let mut failures = Vec::new();
    for rule in at.rules() {
        let kinds = access_kinds(rule);
        if kinds.is_empty() {
            debug!(rule = %rule, "rule does not widen anything");
            continue;
        }
        match translate_target(rule, table) {
            Ok(target) => {
                for kind in kinds {
                    widener.push(kind, target.clone());
                }
            }
            Err(err) => {
                warn!(rule = %rule, error = %err, "skipping access rule");
                failures.push(err);
            }
        }
    }
    (widener, failures)
}

fn access_kinds(rule: &AccessRule) -> Vec<AccessKind> {
    let is_field = matches!(rule.target, RuleTarget::Field(_) | RuleTarget::AllFields);
    let mut kinds = Vec::with_capacity(2);
    match rule.visibility {
        Visibility::Public => kinds.push(AccessKind::Accessible),
        Visibility::Protected if is_field => kinds.push(AccessKind::Accessible),
        Visibility::Protected => kinds.push(AccessKind::Extendable),
        Visibility::Default | Visibility::Private => {}
    }
    if rule.finality == FinalChange::Remove {
        let kind = if is_field { AccessKind::Mutable } else { AccessKind::Extendable };
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

fn translate_target(rule: &AccessRule, table: &TranslationTable) -> ManifestResult<WidenerTarget> {
    let untranslatable = |reason: &str| ManifestError::Untranslatable {
        rule: rule.to_string(),
        reason: reason.to_string(),
    };
    let forward = table.forward();
    let owner = forward.map_class(&rule.owner);

    match &rule.target {
        RuleTarget::Class => Ok(WidenerTarget::Class(owner)),
        RuleTarget::Field(name) => {
            let mapped = forward
                .field_by_name(&rule.owner, name)
                .ok_or_else(|| untranslatable("field is not in the translation table"))?;
            // The descriptor comes from the reverse view so it is already in
            // target names.
            let descriptor = table
                .reverse()
                .field_by_name(&owner, mapped.mapped_name)
                .ok_or_else(|| untranslatable("field has no reverse entry"))?
                .descriptor
                .to_string();
            Ok(WidenerTarget::Field {
                owner,
                name: mapped.mapped_name.to_string(),
                descriptor,
            })
        }
        RuleTarget::Method { name, descriptor } => {
            let target_name = if name == CONSTRUCTOR {
                CONSTRUCTOR
            } else {
                forward
                    .method(&rule.owner, name, descriptor)
                    .ok_or_else(|| untranslatable("method is not in the translation table"))?
            };
            let descriptor = forward
                .map_descriptor(descriptor)
                .map_err(|err| untranslatable(&err.to_string()))?;
            Ok(WidenerTarget::Method {
                owner,
                name: target_name.to_string(),
                descriptor,
            })
        }
        RuleTarget::AllFields | RuleTarget::AllMethods => Err(untranslatable("wildcard rules have no target equivalent")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehost_mapping::{ClassMapping, MemberMapping};

    fn table() -> TranslationTable {
        TranslationTable::new(
            "srg",
            "intermediary",
            vec![
                ClassMapping {
                    source: "net/minecraft/block/Block".into(),
                    target: "net/minecraft/class_2248".into(),
                },
                ClassMapping {
                    source: "net/minecraft/util/math/BlockPos".into(),
                    target: "net/minecraft/class_2338".into(),
                },
            ],
            vec![MemberMapping::new(
                "net/minecraft/block/Block",
                "field_149785_s",
                "Lnet/minecraft/util/math/BlockPos;",
                "field_10643",
            )],
            vec![MemberMapping::new(
                "net/minecraft/block/Block",
                "func_149645_b",
                "(Lnet/minecraft/util/math/BlockPos;)V",
                "method_9538",
            )],
        )
    }

    fn widen(text: &str) -> (AccessWidener, Vec<ManifestError>) {
        translate(&AccessTransformer::parse(text).unwrap(), &table())
    }

    #[test]
    fn fields_use_target_descriptors() {
        let (widener, failures) = widen("public-f net.minecraft.block.Block field_149785_s\n");
        assert!(failures.is_empty());
        assert_eq!(
            widener.render(),
            "accessWidener\tv1\tintermediary\n\
             accessible\tfield\tnet/minecraft/class_2248\tfield_10643\tLnet/minecraft/class_2338;\n\
             mutable\tfield\tnet/minecraft/class_2248\tfield_10643\tLnet/minecraft/class_2338;\n"
        );
    }

    #[test]
    fn methods_and_constructors_translate() {
        let (widener, failures) = widen(
            "protected net.minecraft.block.Block func_149645_b(Lnet/minecraft/util/math/BlockPos;)V\n\
             public net.minecraft.block.Block <init>(Lnet/minecraft/util/math/BlockPos;)V\n",
        );
        assert!(failures.is_empty());
        let entries: Vec<_> = widener.entries().map(|(kind, target)| format!("{kind}\t{target}")).collect();
        assert_eq!(
            entries,
            vec![
                "extendable\tmethod\tnet/minecraft/class_2248\tmethod_9538\t(Lnet/minecraft/class_2338;)V",
                "accessible\tmethod\tnet/minecraft/class_2248\t<init>\t(Lnet/minecraft/class_2338;)V",
            ]
        );
    }

    #[test]
    fn class_rules_and_duplicates() {
        let (widener, _) = widen("public net.minecraft.block.Block\npublic net.minecraft.block.Block\n");
        assert_eq!(widener.len(), 1);
    }

    #[test]
    fn failures_are_per_rule() {
        let (widener, failures) = widen(
            "public net.minecraft.block.Block field_unknown\n\
             public net.minecraft.block.Block *\n\
             public net.minecraft.block.Block\n",
        );
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|err| matches!(err, ManifestError::Untranslatable { .. })));
        assert_eq!(widener.len(), 1);
    }

    #[test]
    fn private_rules_widen_nothing() {
        let (widener, failures) = widen("private net.minecraft.block.Block field_149785_s\n");
        assert!(widener.is_empty());
        assert!(failures.is_empty());
    }
}
