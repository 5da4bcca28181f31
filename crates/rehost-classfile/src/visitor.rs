//! Visitor traversal over compiled units.
//!
//! A unit is split into an [`ClassOutline`] (everything a visitor can see or
//! change: names, interfaces, markers) and a [`ClassTemplate`] (constant
//! pool and raw attributes). [`accept`] replays the outline into a visitor
//! chain in a fixed order:
//!
//! header → class markers → each field (+ its markers) → each method
//! (+ its markers) → end
//!
//! The innermost visitor is normally a [`ClassNodeWriter`], which rebuilds
//! a [`ClassFile`] from the events it receives. Decorators sit in front of
//! it, forward what they keep and return `None` for anything they drop.

use std::mem;

use crate::annotation::{Annotation, ConstValue, ElementValue};
use crate::class::{ClassFile, Member, RawAttribute};
use crate::error::{ClassError, ClassResult};
use crate::pool::ConstantPool;

pub type BoxedAnnotationVisitor<'a> = Box<dyn AnnotationVisitor + 'a>;
pub type BoxedMemberVisitor<'a> = Box<dyn MemberVisitor + 'a>;
pub type BoxedClassVisitor<'a> = Box<dyn ClassVisitor + 'a>;

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

/// Class-level names and flags, as seen by visitors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassHeader {
    pub minor_version: u16,
    pub major_version: u16,
    pub access: u16,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub signature: Option<String>,
}

/// Field or method names and flags, as seen by visitors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberHeader {
    /// Position of the declaration in the original unit.
    pub index: usize,
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MemberOutline {
    pub header: MemberHeader,
    /// Markers with their runtime visibility.
    pub annotations: Vec<(Annotation, bool)>,
}

#[derive(Clone, Debug)]
pub struct ClassOutline {
    pub header: ClassHeader,
    pub annotations: Vec<(Annotation, bool)>,
    pub fields: Vec<MemberOutline>,
    pub methods: Vec<MemberOutline>,
}

/// The parts of a unit that visitors never see.
#[derive(Debug)]
pub struct ClassTemplate {
    pool: ConstantPool,
    fields: Vec<Vec<RawAttribute>>,
    methods: Vec<Vec<RawAttribute>>,
    attributes: Vec<RawAttribute>,
}

fn tag_visibility(visible: Vec<Annotation>, invisible: Vec<Annotation>) -> Vec<(Annotation, bool)> {
    visible
        .into_iter()
        .map(|a| (a, true))
        .chain(invisible.into_iter().map(|a| (a, false)))
        .collect()
}

fn split_members(members: Vec<Member>) -> (Vec<MemberOutline>, Vec<Vec<RawAttribute>>) {
    members
        .into_iter()
        .enumerate()
        .map(|(index, m)| {
            let outline = MemberOutline {
                header: MemberHeader {
                    index,
                    access: m.access,
                    name: m.name,
                    descriptor: m.descriptor,
                    signature: m.signature,
                },
                annotations: tag_visibility(m.visible_annotations, m.invisible_annotations),
            };
            (outline, m.attributes)
        })
        .unzip()
}

impl ClassFile {
    /// Split the unit into its visitable outline and the opaque remainder.
    pub fn split(self) -> (ClassOutline, ClassTemplate) {
        let (fields, field_attrs) = split_members(self.fields);
        let (methods, method_attrs) = split_members(self.methods);
        let outline = ClassOutline {
            header: ClassHeader {
                minor_version: self.minor_version,
                major_version: self.major_version,
                access: self.access,
                name: self.name,
                super_name: self.super_name,
                interfaces: self.interfaces,
                signature: self.signature,
            },
            annotations: tag_visibility(self.visible_annotations, self.invisible_annotations),
            fields,
            methods,
        };
        let template = ClassTemplate {
            pool: self.pool,
            fields: field_attrs,
            methods: method_attrs,
            attributes: self.attributes,
        };
        (outline, template)
    }
}

// ---------------------------------------------------------------------------
// Visitor traits
// ---------------------------------------------------------------------------

/// Receives the contents of one marker. `name` is `None` for array items.
pub trait AnnotationVisitor {
    fn visit(&mut self, name: Option<&str>, value: &ConstValue) -> ClassResult<()>;

    fn visit_enum(&mut self, name: Option<&str>, descriptor: &str, value: &str) -> ClassResult<()>;

    fn visit_annotation(
        &mut self,
        name: Option<&str>,
        descriptor: &str,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>>;

    fn visit_array(&mut self, name: Option<&str>) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>>;

    fn visit_end(&mut self) -> ClassResult<()>;
}

/// Receives the markers of one field or method.
pub trait MemberVisitor {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>>;

    fn visit_end(&mut self) -> ClassResult<()>;
}

/// Receives one compiled unit.
pub trait ClassVisitor {
    fn visit(&mut self, header: &ClassHeader) -> ClassResult<()>;

    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>>;

    fn visit_field(&mut self, field: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>>;

    fn visit_method(&mut self, method: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>>;

    /// Ask the end of the chain to add `interface` to the unit's
    /// implemented interfaces.
    fn implement_interface(&mut self, interface: &str) -> ClassResult<()>;

    fn visit_end(&mut self) -> ClassResult<()>;
}

/// Wraps a visitor chain around an inner visitor.
pub trait ClassDecorator {
    fn decorate<'a>(&'a mut self, inner: BoxedClassVisitor<'a>) -> BoxedClassVisitor<'a>;
}

/// Decorator that adds nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl ClassDecorator for Passthrough {
    fn decorate<'a>(&'a mut self, inner: BoxedClassVisitor<'a>) -> BoxedClassVisitor<'a> {
        inner
    }
}

// An absent annotation visitor swallows everything, which is how a
// decorator drops a marker while still reading its contents.
impl AnnotationVisitor for Option<BoxedAnnotationVisitor<'_>> {
    fn visit(&mut self, name: Option<&str>, value: &ConstValue) -> ClassResult<()> {
        match self {
            Some(inner) => inner.visit(name, value),
            None => Ok(()),
        }
    }

    fn visit_enum(&mut self, name: Option<&str>, descriptor: &str, value: &str) -> ClassResult<()> {
        match self {
            Some(inner) => inner.visit_enum(name, descriptor, value),
            None => Ok(()),
        }
    }

    fn visit_annotation(
        &mut self,
        name: Option<&str>,
        descriptor: &str,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        match self {
            Some(inner) => inner.visit_annotation(name, descriptor),
            None => Ok(None),
        }
    }

    fn visit_array(&mut self, name: Option<&str>) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        match self {
            Some(inner) => inner.visit_array(name),
            None => Ok(None),
        }
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        match self {
            Some(inner) => inner.visit_end(),
            None => Ok(()),
        }
    }
}

impl MemberVisitor for Option<BoxedMemberVisitor<'_>> {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        match self {
            Some(inner) => inner.visit_annotation(descriptor, visible),
            None => Ok(None),
        }
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        match self {
            Some(inner) => inner.visit_end(),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Traversal driver
// ---------------------------------------------------------------------------

/// Replay an outline into a visitor in the fixed traversal order.
pub fn accept(outline: &ClassOutline, visitor: &mut dyn ClassVisitor) -> ClassResult<()> {
    visitor.visit(&outline.header)?;
    for (annotation, visible) in &outline.annotations {
        if let Some(mut av) = visitor.visit_annotation(&annotation.descriptor, *visible)? {
            accept_annotation(annotation, av.as_mut())?;
        }
    }
    for field in &outline.fields {
        if let Some(mut mv) = visitor.visit_field(&field.header)? {
            accept_member(field, mv.as_mut())?;
        }
    }
    for method in &outline.methods {
        if let Some(mut mv) = visitor.visit_method(&method.header)? {
            accept_member(method, mv.as_mut())?;
        }
    }
    visitor.visit_end()
}

fn accept_member(member: &MemberOutline, visitor: &mut dyn MemberVisitor) -> ClassResult<()> {
    for (annotation, visible) in &member.annotations {
        if let Some(mut av) = visitor.visit_annotation(&annotation.descriptor, *visible)? {
            accept_annotation(annotation, av.as_mut())?;
        }
    }
    visitor.visit_end()
}

/// Replay the elements of one marker, then end it.
pub fn accept_annotation(annotation: &Annotation, visitor: &mut dyn AnnotationVisitor) -> ClassResult<()> {
    for (name, value) in &annotation.elements {
        accept_element(Some(name), value, visitor)?;
    }
    visitor.visit_end()
}

fn accept_element(
    name: Option<&str>,
    value: &ElementValue,
    visitor: &mut dyn AnnotationVisitor,
) -> ClassResult<()> {
    match value {
        ElementValue::Const(c) => visitor.visit(name, c),
        ElementValue::Enum { descriptor, value } => visitor.visit_enum(name, descriptor, value),
        ElementValue::Annotation(nested) => {
            if let Some(mut av) = visitor.visit_annotation(name, &nested.descriptor)? {
                accept_annotation(nested, av.as_mut())?;
            }
            Ok(())
        }
        ElementValue::Array(values) => {
            if let Some(mut av) = visitor.visit_array(name)? {
                for item in values {
                    accept_element(None, item, av.as_mut())?;
                }
                av.visit_end()?;
            }
            Ok(())
        }
    }
}

/// Run a unit through `decorator`'s chain and rebuild it.
pub fn rewrite_class(class: ClassFile, decorator: &mut dyn ClassDecorator) -> ClassResult<ClassFile> {
    let (outline, template) = class.split();
    let mut out = None;
    {
        let writer = ClassNodeWriter::new(template, &mut out);
        let mut chain = decorator.decorate(Box::new(writer));
        accept(&outline, chain.as_mut())?;
    }
    out.ok_or(ClassError::NoOutput)
}

// ---------------------------------------------------------------------------
// Terminal writer
// ---------------------------------------------------------------------------

/// Rebuilds a [`ClassFile`] from visitor events. Declarations that never
/// reach the writer are dropped from the result.
pub struct ClassNodeWriter<'o> {
    template: ClassTemplate,
    header: Option<ClassHeader>,
    visible: Vec<Annotation>,
    invisible: Vec<Annotation>,
    fields: Vec<Member>,
    methods: Vec<Member>,
    extra_interfaces: Vec<String>,
    out: &'o mut Option<ClassFile>,
}

impl<'o> ClassNodeWriter<'o> {
    pub fn new(template: ClassTemplate, out: &'o mut Option<ClassFile>) -> Self {
        Self {
            template,
            header: None,
            visible: Vec::new(),
            invisible: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            extra_interfaces: Vec::new(),
            out,
        }
    }
}

fn take_member(
    raw: &mut [Vec<RawAttribute>],
    built: &mut Vec<Member>,
    header: &MemberHeader,
    kind: &'static str,
) -> ClassResult<usize> {
    let attributes = raw
        .get_mut(header.index)
        .map(mem::take)
        .ok_or(ClassError::MemberOutOfRange {
            kind,
            index: header.index,
        })?;
    built.push(Member {
        access: header.access,
        name: header.name.clone(),
        descriptor: header.descriptor.clone(),
        signature: header.signature.clone(),
        visible_annotations: Vec::new(),
        invisible_annotations: Vec::new(),
        attributes,
    });
    Ok(built.len() - 1)
}

impl ClassVisitor for ClassNodeWriter<'_> {
    fn visit(&mut self, header: &ClassHeader) -> ClassResult<()> {
        self.header = Some(header.clone());
        Ok(())
    }

    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        let list = if visible {
            &mut self.visible
        } else {
            &mut self.invisible
        };
        Ok(Some(Box::new(AnnotationNodeBuilder::top_level(descriptor, list))))
    }

    fn visit_field(&mut self, field: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>> {
        let slot = take_member(&mut self.template.fields, &mut self.fields, field, "field")?;
        Ok(Some(Box::new(MemberNodeWriter {
            member: &mut self.fields[slot],
        })))
    }

    fn visit_method(&mut self, method: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>> {
        let slot = take_member(&mut self.template.methods, &mut self.methods, method, "method")?;
        Ok(Some(Box::new(MemberNodeWriter {
            member: &mut self.methods[slot],
        })))
    }

    fn implement_interface(&mut self, interface: &str) -> ClassResult<()> {
        if !self.extra_interfaces.iter().any(|i| i == interface) {
            self.extra_interfaces.push(interface.to_string());
        }
        Ok(())
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        let header = self.header.take().ok_or(ClassError::NoOutput)?;
        let mut interfaces = header.interfaces;
        for extra in self.extra_interfaces.drain(..) {
            if !interfaces.contains(&extra) {
                interfaces.push(extra);
            }
        }
        *self.out = Some(ClassFile {
            minor_version: header.minor_version,
            major_version: header.major_version,
            pool: mem::take(&mut self.template.pool),
            access: header.access,
            name: header.name,
            super_name: header.super_name,
            interfaces,
            signature: header.signature,
            visible_annotations: mem::take(&mut self.visible),
            invisible_annotations: mem::take(&mut self.invisible),
            fields: mem::take(&mut self.fields),
            methods: mem::take(&mut self.methods),
            attributes: mem::take(&mut self.template.attributes),
        });
        Ok(())
    }
}

struct MemberNodeWriter<'m> {
    member: &'m mut Member,
}

impl MemberVisitor for MemberNodeWriter<'_> {
    fn visit_annotation(
        &mut self,
        descriptor: &str,
        visible: bool,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        let list = if visible {
            &mut self.member.visible_annotations
        } else {
            &mut self.member.invisible_annotations
        };
        Ok(Some(Box::new(AnnotationNodeBuilder::top_level(descriptor, list))))
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        Ok(())
    }
}

type PendingElements = Vec<(Option<String>, ElementValue)>;

enum BuildTarget<'a> {
    List(&'a mut Vec<Annotation>),
    Element {
        name: Option<String>,
        parent: &'a mut PendingElements,
    },
}

/// Collects annotation events into an owned [`Annotation`] or array value
/// and hands it to its parent on `visit_end`.
pub struct AnnotationNodeBuilder<'a> {
    /// `None` when building an array.
    descriptor: Option<String>,
    values: PendingElements,
    target: BuildTarget<'a>,
}

impl<'a> AnnotationNodeBuilder<'a> {
    /// A builder that appends the finished marker to `list`.
    pub fn top_level(descriptor: &str, list: &'a mut Vec<Annotation>) -> Self {
        Self {
            descriptor: Some(descriptor.to_string()),
            values: Vec::new(),
            target: BuildTarget::List(list),
        }
    }

    fn child(descriptor: Option<&str>, name: Option<&str>, parent: &'a mut PendingElements) -> Self {
        Self {
            descriptor: descriptor.map(str::to_string),
            values: Vec::new(),
            target: BuildTarget::Element {
                name: name.map(str::to_string),
                parent,
            },
        }
    }
}

impl AnnotationVisitor for AnnotationNodeBuilder<'_> {
    fn visit(&mut self, name: Option<&str>, value: &ConstValue) -> ClassResult<()> {
        self.values
            .push((name.map(str::to_string), ElementValue::Const(value.clone())));
        Ok(())
    }

    fn visit_enum(&mut self, name: Option<&str>, descriptor: &str, value: &str) -> ClassResult<()> {
        self.values.push((
            name.map(str::to_string),
            ElementValue::Enum {
                descriptor: descriptor.to_string(),
                value: value.to_string(),
            },
        ));
        Ok(())
    }

    fn visit_annotation(
        &mut self,
        name: Option<&str>,
        descriptor: &str,
    ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        Ok(Some(Box::new(AnnotationNodeBuilder::child(
            Some(descriptor),
            name,
            &mut self.values,
        ))))
    }

    fn visit_array(&mut self, name: Option<&str>) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
        Ok(Some(Box::new(AnnotationNodeBuilder::child(None, name, &mut self.values))))
    }

    fn visit_end(&mut self) -> ClassResult<()> {
        let values = mem::take(&mut self.values);
        let built = match &self.descriptor {
            Some(descriptor) => ElementValue::Annotation(Annotation {
                descriptor: descriptor.clone(),
                elements: values
                    .into_iter()
                    .map(|(name, value)| (name.unwrap_or_default(), value))
                    .collect(),
            }),
            None => ElementValue::Array(values.into_iter().map(|(_, value)| value).collect()),
        };
        match (&mut self.target, built) {
            (BuildTarget::List(list), ElementValue::Annotation(annotation)) => list.push(annotation),
            (BuildTarget::List(_), _) => {
                return Err(ClassError::rejected("an array cannot be a top-level marker"))
            }
            (BuildTarget::Element { name, parent }, value) => parent.push((name.clone(), value)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::access;

    fn sample_class() -> ClassFile {
        let mut class = ClassFile::new("net/example/Widget", Some("java/lang/Object"));
        class.visible_annotations.push(
            Annotation::new("Lnet/example/Tagged;").with(
                "tags",
                ElementValue::Array(vec![
                    ElementValue::Const(ConstValue::String("a".into())),
                    ElementValue::Annotation(
                        Annotation::new("Lnet/example/Inner;")
                            .with("n", ElementValue::Const(ConstValue::Int(4))),
                    ),
                ]),
            ),
        );
        let mut field = Member::new(access::PRIVATE, "size", "I");
        field.invisible_annotations.push(Annotation::new("Lnet/example/Dropped;"));
        class.fields.push(field);
        let mut method = Member::new(access::PUBLIC, "tick", "()V");
        method.attributes.push(RawAttribute {
            name: "Code".into(),
            info: vec![1, 2, 3],
        });
        class.methods.push(method);
        class
    }

    #[test]
    fn passthrough_rebuilds_identical_unit() {
        let class = sample_class();
        let rebuilt = rewrite_class(class.clone(), &mut Passthrough).unwrap();
        assert_eq!(rebuilt.name, class.name);
        assert_eq!(rebuilt.visible_annotations, class.visible_annotations);
        assert_eq!(rebuilt.fields, class.fields);
        assert_eq!(rebuilt.methods, class.methods);
    }

    /// Records the traversal order and drops one marker type.
    struct Recorder<'a> {
        inner: BoxedClassVisitor<'a>,
        log: &'a mut Vec<String>,
    }

    struct RecordingMember<'a> {
        inner: BoxedMemberVisitor<'a>,
        log: &'a mut Vec<String>,
    }

    impl ClassVisitor for Recorder<'_> {
        fn visit(&mut self, header: &ClassHeader) -> ClassResult<()> {
            self.log.push(format!("class {}", header.name));
            self.inner.visit(header)
        }

        fn visit_annotation(
            &mut self,
            descriptor: &str,
            visible: bool,
        ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
            self.log.push(format!("marker {descriptor}"));
            self.inner.visit_annotation(descriptor, visible)
        }

        fn visit_field(&mut self, field: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>> {
            self.log.push(format!("field {}", field.name));
            let inner = self.inner.visit_field(field)?;
            let log = &mut *self.log;
            Ok(inner.map(move |inner| Box::new(RecordingMember { inner, log }) as BoxedMemberVisitor<'_>))
        }

        fn visit_method(&mut self, method: &MemberHeader) -> ClassResult<Option<BoxedMemberVisitor<'_>>> {
            self.log.push(format!("method {}", method.name));
            self.inner.visit_method(method)
        }

        fn implement_interface(&mut self, interface: &str) -> ClassResult<()> {
            self.inner.implement_interface(interface)
        }

        fn visit_end(&mut self) -> ClassResult<()> {
            self.inner.implement_interface("net/example/Extra")?;
            self.log.push("end".into());
            self.inner.visit_end()
        }
    }

    impl MemberVisitor for RecordingMember<'_> {
        fn visit_annotation(
            &mut self,
            descriptor: &str,
            visible: bool,
        ) -> ClassResult<Option<BoxedAnnotationVisitor<'_>>> {
            self.log.push(format!("member marker {descriptor}"));
            if descriptor == "Lnet/example/Dropped;" {
                return Ok(None);
            }
            self.inner.visit_annotation(descriptor, visible)
        }

        fn visit_end(&mut self) -> ClassResult<()> {
            self.inner.visit_end()
        }
    }

    struct RecordingDecorator {
        log: Vec<String>,
    }

    impl ClassDecorator for RecordingDecorator {
        fn decorate<'a>(&'a mut self, inner: BoxedClassVisitor<'a>) -> BoxedClassVisitor<'a> {
            Box::new(Recorder {
                inner,
                log: &mut self.log,
            })
        }
    }

    #[test]
    fn traversal_order_is_fixed() {
        let mut decorator = RecordingDecorator { log: Vec::new() };
        rewrite_class(sample_class(), &mut decorator).unwrap();
        assert_eq!(
            decorator.log,
            vec![
                "class net/example/Widget",
                "marker Lnet/example/Tagged;",
                "field size",
                "member marker Lnet/example/Dropped;",
                "method tick",
                "end",
            ]
        );
    }

    #[test]
    fn decorators_drop_markers_and_add_interfaces() {
        let mut decorator = RecordingDecorator { log: Vec::new() };
        let rebuilt = rewrite_class(sample_class(), &mut decorator).unwrap();
        assert!(rebuilt.fields[0].invisible_annotations.is_empty());
        assert_eq!(rebuilt.interfaces, vec!["net/example/Extra".to_string()]);
        // nested values still arrive intact
        assert_eq!(rebuilt.visible_annotations, sample_class().visible_annotations);
    }

    #[test]
    fn absent_visitor_swallows_events() {
        let mut sink: Option<BoxedAnnotationVisitor<'_>> = None;
        sink.visit(Some("x"), &ConstValue::Int(1)).unwrap();
        assert!(sink.visit_array(Some("y")).unwrap().is_none());
        sink.visit_end().unwrap();
    }

    #[test]
    fn out_of_range_member_is_an_error() {
        let (mut outline, template) = sample_class().split();
        outline.fields[0].header.index = 9;
        let mut out = None;
        let mut writer = ClassNodeWriter::new(template, &mut out);
        let err = accept(&outline, &mut writer).unwrap_err();
        assert!(matches!(err, ClassError::MemberOutOfRange { kind: "field", index: 9 }));
    }
}
