//! Compiled-unit object model for rehost.
//!
//! Reads and writes JVM class files while keeping everything the migration
//! does not touch byte-for-byte intact.
//!
//! # Architecture
//!
//! - **ConstantPool**: append-only pool, existing indices never move
//! - **ClassFile**: parsed unit with names, members, signatures and markers
//!   lifted out; every other attribute is kept raw
//! - **Annotation**: owned marker tree with its attribute codec
//! - **Visitors**: decorator chains over a unit, replayed by [`accept`] in a
//!   fixed order and terminated by a [`ClassNodeWriter`]

pub mod annotation;
mod bytes;
pub mod class;
pub mod error;
pub mod mutf8;
pub mod pool;
pub mod visitor;

pub use annotation::{Annotation, ConstValue, ElementValue};
pub use class::{access, ClassFile, Member, RawAttribute, MAGIC};
pub use error::{ClassError, ClassResult};
pub use pool::{Constant, ConstantPool};
pub use visitor::{
    accept, accept_annotation, rewrite_class, AnnotationNodeBuilder, AnnotationVisitor, BoxedAnnotationVisitor,
    BoxedClassVisitor, BoxedMemberVisitor, ClassDecorator, ClassHeader, ClassNodeWriter, ClassOutline,
    ClassTemplate, ClassVisitor, MemberHeader, MemberOutline, MemberVisitor, Passthrough,
};

/// Internal name to the `.class` entry path inside an archive.
pub fn class_entry_name(internal_name: &str) -> String {
    format!("{internal_name}.class")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_unit_survives_visitor_rewrite() {
        let mut class = ClassFile::new("net/example/Mod", Some("java/lang/Object"));
        class
            .visible_annotations
            .push(Annotation::new("Lnet/example/Marker;").with("value", ElementValue::Const(ConstValue::Int(7))));
        class.methods.push(Member::new(access::PUBLIC, "<init>", "()V"));

        let bytes = class.to_bytes().unwrap();
        let parsed = ClassFile::parse(&bytes).unwrap();
        let rewritten = rewrite_class(parsed, &mut Passthrough).unwrap();
        let again = ClassFile::parse(&rewritten.to_bytes().unwrap()).unwrap();

        assert_eq!(again.name, "net/example/Mod");
        assert_eq!(again.visible_annotations, class.visible_annotations);
        assert_eq!(again.methods, class.methods);
    }

    #[test]
    fn entry_names_append_suffix() {
        assert_eq!(class_entry_name("a/b/C"), "a/b/C.class");
    }
}
