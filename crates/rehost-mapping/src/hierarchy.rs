//! Class hierarchy index for inherited member lookups.
//!
//! A reference such as `invokevirtual Mod.tick()V` may name a method that
//! is declared (and mapped) on a superclass. [`ClassHierarchy`] records
//! super types so lookups can walk up until a mapping is found.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::table::TableView;

/// Super types of one class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassNode {
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
}

/// Super types for every class read from the classpath and inputs.
#[derive(Clone, Debug, Default)]
pub struct ClassHierarchy {
    nodes: HashMap<String, ClassNode>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a class. A later insert for the same name replaces the
    /// earlier one.
    pub fn insert(&mut self, name: impl Into<String>, super_name: Option<String>, interfaces: Vec<String>) {
        self.nodes.insert(name.into(), ClassNode { super_name, interfaces });
    }

    pub fn get(&self, name: &str) -> Option<&ClassNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `name` followed by its super types, breadth first, each listed once.
    /// Unknown classes end the walk along their branch.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                queue.extend(node.super_name.iter().cloned());
                queue.extend(node.interfaces.iter().cloned());
            }
            order.push(current);
        }
        order
    }

    /// Target name of a field referenced through `owner`, looking through
    /// super types when `owner` itself has no mapping.
    pub fn resolve_field(&self, view: &TableView<'_>, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        self.ancestors(owner)
            .iter()
            .find_map(|class| view.field(class, name, descriptor))
            .map(str::to_string)
    }

    /// Target name of a method referenced through `owner`. Constructors
    /// and static initializers are never renamed.
    pub fn resolve_method(&self, view: &TableView<'_>, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        if name.starts_with('<') {
            return None;
        }
        self.ancestors(owner)
            .iter()
            .find_map(|class| view.method(class, name, descriptor))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{MemberMapping, TranslationTable};

    fn table() -> TranslationTable {
        TranslationTable::new(
            "srg",
            "intermediary",
            Vec::new(),
            vec![MemberMapping::new("mc/Entity", "field_70170_p", "Lmc/World;", "field_6002")],
            vec![
                MemberMapping::new("mc/Entity", "func_70071_h_", "()V", "method_5773"),
                MemberMapping::new("mc/Tickable", "func_73660_a", "()V", "method_16896"),
            ],
        )
    }

    fn hierarchy() -> ClassHierarchy {
        let mut h = ClassHierarchy::new();
        h.insert("mc/Entity", Some("java/lang/Object".into()), vec!["mc/Tickable".into()]);
        h.insert("mc/Tickable", None, Vec::new());
        h.insert("mod/Pet", Some("mc/Entity".into()), Vec::new());
        h
    }

    #[test]
    fn ancestors_are_breadth_first() {
        assert_eq!(
            hierarchy().ancestors("mod/Pet"),
            vec!["mod/Pet", "mc/Entity", "java/lang/Object", "mc/Tickable"]
        );
    }

    #[test]
    fn cycles_terminate() {
        let mut h = ClassHierarchy::new();
        h.insert("a/A", Some("a/B".into()), Vec::new());
        h.insert("a/B", Some("a/A".into()), Vec::new());
        assert_eq!(h.ancestors("a/A"), vec!["a/A", "a/B"]);
    }

    #[test]
    fn inherited_members_resolve() {
        let table = table();
        let view = table.forward();
        let h = hierarchy();
        assert_eq!(
            h.resolve_method(&view, "mod/Pet", "func_70071_h_", "()V").as_deref(),
            Some("method_5773")
        );
        assert_eq!(
            h.resolve_method(&view, "mod/Pet", "func_73660_a", "()V").as_deref(),
            Some("method_16896")
        );
        assert_eq!(
            h.resolve_field(&view, "mod/Pet", "field_70170_p", "Lmc/World;").as_deref(),
            Some("field_6002")
        );
        assert_eq!(h.resolve_method(&view, "mod/Pet", "<init>", "()V"), None);
        assert_eq!(h.resolve_method(&view, "mod/Pet", "ownMethod", "()V"), None);
    }
}
