//! The annotation ledger: every marker seen during the rewrite pass.
//!
//! The ledger is append-only and records markers whether or not they
//! survive into the rewritten unit, so reflection-based consumers on the
//! target platform still see the full picture.

use serde::{Deserialize, Serialize};

/// Entry name of the serialized ledger inside an output archive.
pub const LEDGER_ENTRY: &str = "annotations.json";

/// Value descriptors use to point at the ledger.
pub const LEDGER_REFERENCE: &str = "/annotations.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetKind {
    Type,
    Field,
    Method,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Marker descriptor.
    pub annotation_type: String,
    pub target_type: TargetKind,
    /// Internal name of the class the declaration lives in.
    pub target_in_class: String,
    /// Class name, field name, or method name followed by its descriptor.
    pub target: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationLedger {
    entries: Vec<LedgerEntry>,
}

impl AnnotationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_class(&mut self, annotation: &str, class: &str) {
        self.push(annotation, TargetKind::Type, class, class);
    }

    pub fn accept_field(&mut self, annotation: &str, class: &str, field: &str) {
        self.push(annotation, TargetKind::Field, class, field);
    }

    /// `method` is the name immediately followed by the descriptor.
    pub fn accept_method(&mut self, annotation: &str, class: &str, method: &str) {
        self.push(annotation, TargetKind::Method, class, method);
    }

    fn push(&mut self, annotation: &str, kind: TargetKind, class: &str, target: &str) {
        self.entries.push(LedgerEntry {
            annotation_type: annotation.to_string(),
            target_type: kind,
            target_in_class: class.to_string(),
            target: target.to_string(),
        });
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_serialize_in_order() {
        let mut ledger = AnnotationLedger::new();
        ledger.accept_class("Lnet/minecraftforge/fml/common/Mod;", "org/example/Mod");
        ledger.accept_field("Lorg/jetbrains/annotations/NotNull;", "org/example/Mod", "items");
        ledger.accept_method("Ljava/lang/Deprecated;", "org/example/Mod", "tick()V");

        let value: serde_json::Value = serde_json::from_str(&ledger.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"entries": [
                {"annotationType": "Lnet/minecraftforge/fml/common/Mod;", "targetType": "TYPE",
                 "targetInClass": "org/example/Mod", "target": "org/example/Mod"},
                {"annotationType": "Lorg/jetbrains/annotations/NotNull;", "targetType": "FIELD",
                 "targetInClass": "org/example/Mod", "target": "items"},
                {"annotationType": "Ljava/lang/Deprecated;", "targetType": "METHOD",
                 "targetInClass": "org/example/Mod", "target": "tick()V"},
            ]})
        );
    }

    #[test]
    fn empty_ledger() {
        let ledger = AnnotationLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.len(), 0);
    }
}
