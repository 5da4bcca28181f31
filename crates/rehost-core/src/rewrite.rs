//! Marker rewriting visitors.
//!
//! [`MarkerRewriter`] is the per-archive [`ClassDecorator`] handed to the
//! remap engine. For every renamed unit it wraps the engine's writer in a
//! [`ClassRewriter`], which:
//!
//! - appends each marker it sees to the archive's ledger
//! - classifies the marker with [`MarkerRules`]
//! - forwards, drops, rewrites or diagnoses it according to the kind
//!
//! Field and method markers go through a [`MemberRewriter`] with the same
//! dispatch minus the class-only rows.

use rehost_classfile::{
    AnnotationVisitor, BoxedAnnotationVisitor, BoxedClassVisitor, BoxedMemberVisitor, ClassDecorator, ClassError,
    ClassHeader, ClassResult, ClassVisitor, ConstValue, MemberHeader, MemberVisitor,
};

use crate::ledger::AnnotationLedger;
use crate::markers::{
    MarkerKind, MarkerRules, Site, DIST_ENUM, ENVIRONMENT_MARKER, ENV_TYPE_ENUM, MOD_INSTANCE_KIND,
};
use crate::report::Reporter;
use crate::unit::ArchiveUnit;

const VALUE: &str = "value";

// ---------------------------------------------------------------------------
// MarkerRewriter
// ---------------------------------------------------------------------------

/// Per-archive decorator that rewrites markers and fills in the unit.
pub struct MarkerRewriter<'u> {
    unit: &'u mut ArchiveUnit,
    rules: &'u MarkerRules,
    reporter: &'u Reporter,
    archive: String,
}

impl<'u> MarkerRewriter<'u> {
    pub fn new(unit: &'u mut ArchiveUnit, rules: &'u MarkerRules, reporter: &'u Reporter) -> Self {
        let archive = unit.name().to_string();
        Self {
            unit,
            rules,
            reporter,
            archive,
        }
    }
}

impl ClassDecorator for MarkerRewriter<'_> {
    fn decorate<'a>(&'a mut self, inner: BoxedClassVisitor<'a>) -> BoxedClassVisitor<'a> {
        Box::new(ClassRewriter {
            inner,
            unit: &mut *self.unit,
            rules: self.rules,
            reporter: self.reporter,
            archive: &self.archive,
            class_name: String::new(),
            pending_interfaces: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Class level
// ---------------------------------------------------------------------------

pub struct ClassRewriter<'a> {
    inner: BoxedClassVisitor<'a>,
    unit: &'a mut ArchiveUnit,
    rules: &'a MarkerRules,
    reporter: &'a Reporter,
    archive: &'a str,
    class_name: String,
    /// Interfaces requested by marker handlers, added at the end.
    pending_interfaces: Vec<String>,
}

impl ClassVisitor for ClassRewriter<'_> {
    fn visit(&mut self, header: &ClassHeader) -> ClassResult<()> {
        self.class_name = header.name.clone();
        self.inner.visit(header)
    }

    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        self.unit.ledger_mut().accept_class(descriptor, &self.class_name);

        match self.rules.classify(descriptor, Site::Class) {
            MarkerKind::ModDeclaration => Ok(Some(Box::new(ModDeclarationHandler {
                unit: &mut *self.unit,
                pending_interfaces: &mut self.pending_interfaces,
                class_name: &self.class_name,
                capability: self.rules.capability_interface(),
                seen: false,
            }))),
            MarkerKind::Environment => {
                let inner = self.inner.visit_annotation(ENVIRONMENT_MARKER, visible)?;
                Ok(Some(Box::new(EnvironmentRewriter {
                    inner,
                    reporter: self.reporter,
                    archive: self.archive,
                })))
            }
            MarkerKind::Stripped => {
                self.reporter.advisory(
                    self.archive,
                    format!("stripping unsupported marker {descriptor} from {}", self.class_name),
                );
                Ok(None)
            }
            MarkerKind::Unknown => {
                self.reporter.advisory(
                    self.archive,
                    format!("unknown source-platform class marker {descriptor} on {}", self.class_name),
                );
                let inner = self.inner.visit_annotation(descriptor, visible)?;
                Ok(Some(Box::new(MarkerPrinter {
                    inner,
                    reporter: self.reporter,
                    archive: self.archive,
                    marker: descriptor.to_string(),
                })))
            }
            MarkerKind::Ignored | MarkerKind::Other => self.inner.visit_annotation(descriptor, visible),
        }
    }

    fn visit_field(&mut self, field: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>> {
        let inner = self.inner.visit_field(field)?;
        Ok(Some(Box::new(MemberRewriter {
            inner,
            site: Site::Field,
            target: field.name.clone(),
            class_name: &self.class_name,
            ledger: self.unit.ledger_mut(),
            rules: self.rules,
            reporter: self.reporter,
            archive: self.archive,
        })))
    }

    fn visit_method(&mut self, method: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>> {
        let inner = self.inner.visit_method(method)?;
        Ok(Some(Box::new(MemberRewriter {
            inner,
            site: Site::Method,
            target: format!("{}{}", method.name, method.descriptor),
            class_name: &self.class_name,
            ledger: self.unit.ledger_mut(),
            rules: self.rules,
            reporter: self.reporter,
            archive: self.archive,
        })))
    }

    fn implement_interface(&mut self, interface: &str) -> ClassResult<()> {
        self.inner.implement_interface(interface)
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        for interface in self.pending_interfaces.drain(..) {
            self.inner.implement_interface(&interface)?;
        }
        self.inner.visit_end()
    }
}

// ---------------------------------------------------------------------------
// Member level
// ---------------------------------------------------------------------------

pub struct MemberRewriter<'m> {
    inner: Option<BoxedMemberVisitor<'m>>,
    site: Site,
    /// Field name, or method name followed by its descriptor.
    target: String,
    class_name: &'m str,
    ledger: &'m mut AnnotationLedger,
    rules: &'m MarkerRules,
    reporter: &'m Reporter,
    archive: &'m str,
}

impl MemberVisitor for MemberRewriter<'_> {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        match self.site {
            Site::Field => self.ledger.accept_field(descriptor, self.class_name, &self.target),
            Site::Method => self.ledger.accept_method(descriptor, self.class_name, &self.target),
            Site::Class => self.ledger.accept_class(descriptor, self.class_name),
        }

        match self.rules.classify(descriptor, self.site) {
            MarkerKind::Environment => {
                let inner = self.inner.visit_annotation(ENVIRONMENT_MARKER, visible)?;
                Ok(Some(Box::new(EnvironmentRewriter {
                    inner,
                    reporter: self.reporter,
                    archive: self.archive,
                })))
            }
            MarkerKind::Stripped => {
                self.reporter.advisory(
                    self.archive,
                    format!("stripping unsupported marker {descriptor} from {}.{}", self.class_name, self.target),
                );
                Ok(None)
            }
            MarkerKind::Unknown => {
                self.reporter.advisory(
                    self.archive,
                    format!(
                        "unknown source-platform member marker {descriptor} on {}.{}",
                        self.class_name, self.target
                    ),
                );
                let inner = self.inner.visit_annotation(descriptor, visible)?;
                Ok(Some(Box::new(MarkerPrinter {
                    inner,
                    reporter: self.reporter,
                    archive: self.archive,
                    marker: descriptor.to_string(),
                })))
            }
            // ModDeclaration is only ever classified on classes.
            MarkerKind::ModDeclaration | MarkerKind::Ignored | MarkerKind::Other => {
                self.inner.visit_annotation(descriptor, visible)
            }
        }
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        self.inner.visit_end()
    }
}

// ---------------------------------------------------------------------------
// Marker handlers
// ---------------------------------------------------------------------------

/// Consumes the mod declaration marker. The marker itself is dropped.
struct ModDeclarationHandler<'h> {
    unit: &'h mut ArchiveUnit,
    pending_interfaces: &'h mut Vec<String>,
    class_name: &'h str,
    capability: &'h str,
    seen: bool,
}

impl ModDeclarationHandler<'_> {
    fn unexpected(&self, name: Option<&str>) -> ClassError {
        ClassError::rejected(format!(
            "mod marker on {} has unexpected element `{}` (expected `{VALUE}`)",
            self.class_name,
            name.unwrap_or_default()
        ))
    }
}

impl AnnotationVisitor for ModDeclarationHandler<'_> {
    fn visit(&mut self, name: Option<&str>, value: &ConstValue) -> ClassResult<()> {
        if name != Some(VALUE) {
            return Err(self.unexpected(name));
        }
        let kind = format!("{MOD_INSTANCE_KIND}{}", value.to_string().replace('/', "."));
        self.unit.add_entry_point(&kind, self.class_name);
        if !self.pending_interfaces.iter().any(|i| i == self.capability) {
            self.pending_interfaces.push(self.capability.to_string());
        }
        self.seen = true;
        Ok(())
    }

    fn visit_enum(&mut self, name: Option<&str>, _descriptor: &str, _value: &str) -> ClassResult<()> {
        Err(self.unexpected(name))
    }

    fn visit_annotation(
        &mut self,
        name: Option<&str>,
        _descriptor: &str,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        Err(self.unexpected(name))
    }

    fn visit_array(&mut self, name: Option<&str>) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        Err(self.unexpected(name))
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        if !self.seen {
            return Err(ClassError::rejected(format!(
                "mod marker on {} is missing its value",
                self.class_name
            )));
        }
        Ok(())
    }
}

/// Re-expresses the source restriction marker as the target one.
struct EnvironmentRewriter<'e> {
    inner: Option<BoxedAnnotationVisitor<'e>>,
    reporter: &'e Reporter,
    archive: &'e str,
}

impl AnnotationVisitor for EnvironmentRewriter<'_> {
    fn visit(&mut self, name: Option<&str>, value: &ConstValue) -> ClassResult<()> {
        self.inner.visit(name, value)
    }

    fn visit_enum(&mut self, name: Option<&str>, descriptor: &str, value: &str) -> ClassResult<()> {
        if name != Some(VALUE) {
            self.reporter.advisory(
                self.archive,
                format!(
                    "dropping unexpected restriction element {}->{descriptor}::{value}",
                    name.unwrap_or_default()
                ),
            );
            return Ok(());
        }
        if descriptor != DIST_ENUM {
            self.reporter.advisory(
                self.archive,
                format!("unexpected restriction enum type {descriptor}, continuing anyway"),
            );
        }
        let value = match value {
            "DEDICATED_SERVER" => "SERVER",
            "CLIENT" => "CLIENT",
            other => {
                self.reporter.advisory(
                    self.archive,
                    format!("unknown restriction value {other}, passing it through"),
                );
                other
            }
        };
        self.inner.visit_enum(name, ENV_TYPE_ENUM, value)
    }

    fn visit_annotation(
        &mut self,
        name: Option<&str>,
        descriptor: &str,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        self.inner.visit_annotation(name, descriptor)
    }

    fn visit_array(&mut self, name: Option<&str>) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        self.inner.visit_array(name)
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        self.inner.visit_end()
    }
}

/// Forwards an unknown marker unchanged and diagnoses every value in it,
/// including values nested in arrays and inner markers.
struct MarkerPrinter<'p> {
    inner: Option<BoxedAnnotationVisitor<'p>>,
    reporter: &'p Reporter,
    archive: &'p str,
    marker: String,
}

impl MarkerPrinter<'_> {
    fn note(&self, name: Option<&str>, value: &dyn std::fmt::Display) {
        self.reporter
            .advisory(self.archive, format!("{}: {} -> {value}", self.marker, name.unwrap_or("[]")));
    }
}

impl AnnotationVisitor for MarkerPrinter<'_> {
    fn visit(&mut self, name: Option<&str>, value: &ConstValue) -> ClassResult<()> {
        self.inner.visit(name, value)?;
        self.note(name, value);
        Ok(())
    }

    fn visit_enum(&mut self, name: Option<&str>, descriptor: &str, value: &str) -> ClassResult<()> {
        self.inner.visit_enum(name, descriptor, value)?;
        self.note(name, &format_args!("{descriptor}::{value}"));
        Ok(())
    }

    fn visit_annotation(
        &mut self,
        name: Option<&str>,
        descriptor: &str,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        let inner = self.inner.visit_annotation(name, descriptor)?;
        Ok(Some(Box::new(MarkerPrinter {
            inner,
            reporter: self.reporter,
            archive: self.archive,
            marker: format!("{} > {descriptor}", self.marker),
        })))
    }

    fn visit_array(&mut self, name: Option<&str>) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        let inner = self.inner.visit_array(name)?;
        Ok(Some(Box::new(MarkerPrinter {
            inner,
            reporter: self.reporter,
            archive: self.archive,
            marker: self.marker.clone(),
        })))
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        self.inner.visit_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TargetKind;
    use crate::markers::{MOD_MARKER, ONLY_IN_MARKER};
    use rehost_classfile::{access, rewrite_class, Annotation, ClassFile, ElementValue, Member};
    use rehost_manifest::ModsToml;

    const CAPABILITY: &str = "net/patchworkmc/api/ModInstance";

    fn unit() -> ArchiveUnit {
        let manifest = ModsToml::parse("[[mods]]\nmodId = \"example\"\n").unwrap();
        ArchiveUnit::new("in/example.jar", "out/example.jar", manifest)
    }

    fn string(value: &str) -> ElementValue {
        ElementValue::Const(ConstValue::String(value.into()))
    }

    fn dist(value: &str) -> Annotation {
        Annotation::new(ONLY_IN_MARKER).with(
            "value",
            ElementValue::Enum {
                descriptor: DIST_ENUM.into(),
                value: value.into(),
            },
        )
    }

    fn run(class: ClassFile, unit: &mut ArchiveUnit, reporter: &Reporter) -> ClassResult<ClassFile> {
        let rules = MarkerRules::default();
        let mut rewriter = MarkerRewriter::new(unit, &rules, reporter);
        rewrite_class(class, &mut rewriter)
    }

    fn env_value(annotation: &Annotation) -> (&str, &str) {
        match annotation.element("value") {
            Some(ElementValue::Enum { descriptor, value }) => (descriptor.as_str(), value.as_str()),
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn mod_declaration_registers_entry_point_and_capability() {
        let mut class = ClassFile::new("org/example/Mod", Some("java/lang/Object"));
        class
            .visible_annotations
            .push(Annotation::new(MOD_MARKER).with("value", string("org/example/Mod")));
        let mut unit = unit();
        let reporter = Reporter::new();

        let out = run(class, &mut unit, &reporter).unwrap();

        let entry_points = unit.entry_points();
        assert_eq!(entry_points.len(), 1);
        assert_eq!(entry_points["mod-instance:org.example.Mod"], vec!["org.example.Mod"]);
        assert_eq!(out.interfaces, vec![CAPABILITY.to_string()]);
        assert!(out.visible_annotations.is_empty());
        assert_eq!(unit.ledger().len(), 1);
    }

    #[test]
    fn mod_declaration_without_value_rejects_the_unit() {
        let mut class = ClassFile::new("org/example/Mod", Some("java/lang/Object"));
        class.visible_annotations.push(Annotation::new(MOD_MARKER));
        let err = run(class, &mut unit(), &Reporter::new()).unwrap_err();
        assert!(matches!(err, ClassError::Rejected(_)));
    }

    #[test]
    fn mod_declaration_with_renamed_value_rejects_the_unit() {
        let mut class = ClassFile::new("org/example/Mod", Some("java/lang/Object"));
        class
            .visible_annotations
            .push(Annotation::new(MOD_MARKER).with("modid", string("example")));
        let err = run(class, &mut unit(), &Reporter::new()).unwrap_err();
        assert!(err.to_string().contains("modid"));
    }

    #[test]
    fn restriction_values_are_translated() {
        let mut class = ClassFile::new("org/example/Renderer", Some("java/lang/Object"));
        class.visible_annotations.push(dist("CLIENT"));
        let mut field = Member::new(access::PRIVATE, "server", "I");
        field.visible_annotations.push(dist("DEDICATED_SERVER"));
        class.fields.push(field);
        let mut method = Member::new(access::PUBLIC, "tick", "()V");
        method.visible_annotations.push(dist("NEITHER"));
        class.methods.push(method);

        let reporter = Reporter::new();
        let out = run(class, &mut unit(), &reporter).unwrap();

        assert_eq!(out.visible_annotations[0].descriptor, ENVIRONMENT_MARKER);
        assert_eq!(env_value(&out.visible_annotations[0]), (ENV_TYPE_ENUM, "CLIENT"));
        assert_eq!(out.fields[0].visible_annotations[0].descriptor, ENVIRONMENT_MARKER);
        assert_eq!(env_value(&out.fields[0].visible_annotations[0]), (ENV_TYPE_ENUM, "SERVER"));
        assert_eq!(env_value(&out.methods[0].visible_annotations[0]), (ENV_TYPE_ENUM, "NEITHER"));

        let advisories = reporter.advisories();
        assert_eq!(advisories.len(), 1);
        assert!(advisories[0].message.contains("NEITHER"));
    }

    #[test]
    fn ledger_records_stripped_markers_in_traversal_order() {
        let mut class = ClassFile::new("org/example/Thing", Some("java/lang/Object"));
        class
            .invisible_annotations
            .push(Annotation::new("Lmcp/MethodsReturnNonnullByDefault;"));
        let mut field = Member::new(access::PRIVATE, "items", "Ljava/util/List;");
        field
            .invisible_annotations
            .push(Annotation::new("Lorg/jetbrains/annotations/NotNull;"));
        class.fields.push(field);
        let mut method = Member::new(access::PUBLIC, "tick", "()V");
        method.visible_annotations.push(dist("CLIENT"));
        class.methods.push(method);

        let mut unit = unit();
        let out = run(class, &mut unit, &Reporter::new()).unwrap();

        assert!(out.invisible_annotations.is_empty());
        assert_eq!(out.fields[0].invisible_annotations.len(), 1);

        let entries = unit.ledger().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].annotation_type, "Lmcp/MethodsReturnNonnullByDefault;");
        assert_eq!(entries[0].target_type, TargetKind::Type);
        assert_eq!(entries[1].target_type, TargetKind::Field);
        assert_eq!(entries[1].target, "items");
        assert_eq!(entries[2].target_type, TargetKind::Method);
        assert_eq!(entries[2].target, "tick()V");
        assert_eq!(entries[2].annotation_type, ONLY_IN_MARKER);
    }

    #[test]
    fn unknown_source_markers_are_kept_and_diagnosed() {
        let marker = Annotation::new("Lnet/minecraftforge/fml/common/Mod$EventBusSubscriber;")
            .with("modid", string("example"))
            .with("bus", ElementValue::Array(vec![string("MOD"), string("FORGE")]));
        let mut class = ClassFile::new("org/example/Events", Some("java/lang/Object"));
        class.visible_annotations.push(marker.clone());

        let reporter = Reporter::new();
        let out = run(class, &mut unit(), &reporter).unwrap();

        assert_eq!(out.visible_annotations, vec![marker]);
        let messages: Vec<String> = reporter.advisories().into_iter().map(|n| n.message).collect();
        assert_eq!(messages.len(), 4);
        assert!(messages[1].ends_with("modid -> example"));
        assert!(messages[3].ends_with("[] -> FORGE"));
    }

    #[test]
    fn other_markers_pass_through_silently() {
        let mut class = ClassFile::new("org/example/Plain", Some("java/lang/Object"));
        class
            .visible_annotations
            .push(Annotation::new("Lorg/example/Custom;").with("n", string("x")));
        let reporter = Reporter::new();
        let out = run(class, &mut unit(), &reporter).unwrap();
        assert_eq!(out.visible_annotations.len(), 1);
        assert!(reporter.advisories().is_empty());
    }
}
