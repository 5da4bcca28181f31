//! The built-in table-driven engine.
//!
//! [`TableRemapper`] renames compiled units with a [`TranslationTable`]:
//!
//! - constant pool class entries, member references (resolved through the
//!   class hierarchy), method types and invokedynamic descriptors
//! - the unit's own name, super types and signature
//! - declared field and method names, descriptors and signatures
//! - marker descriptors, enum types and class literals
//!
//! The pool stays append-only: renamed references point at freshly
//! interned entries and the original entries are left in place.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rehost_classfile::{
    class_entry_name, rewrite_class, Annotation, ClassDecorator, ClassFile, ConstValue, Constant, ConstantPool,
    ElementValue,
};
use rehost_mapping::{ClassHierarchy, MappingResult, TableView, TranslationTable};
use tracing::{debug, info};

use crate::archive::{is_class_entry, ArchiveContents};
use crate::engine::{InputTag, OutputSink, RemapEngine};
use crate::error::{RemapError, RemapResult};

/// A [`RemapEngine`] backed by a translation table.
pub struct TableRemapper {
    table: TranslationTable,
    prune: bool,
    hierarchy: ClassHierarchy,
    inputs: HashMap<InputTag, Vec<(String, ClassFile)>>,
    next_tag: u32,
    finished: bool,
}

impl TableRemapper {
    pub fn new(table: TranslationTable) -> Self {
        Self {
            table,
            prune: false,
            hierarchy: ClassHierarchy::new(),
            inputs: HashMap::new(),
            next_tag: 0,
            finished: false,
        }
    }

    /// Drop table entries for classes the classpath does not contain once
    /// the classpath has been read.
    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    fn ensure_open(&self) -> RemapResult<()> {
        if self.finished {
            return Err(RemapError::Finished);
        }
        Ok(())
    }

    /// Parse every unit of an archive and record it in the hierarchy.
    fn read_units(&mut self, archive: &Path) -> RemapResult<Vec<(String, ClassFile)>> {
        let contents = ArchiveContents::read(archive)?;
        let mut units = Vec::new();
        for (name, data) in contents.iter() {
            if !is_class_entry(name) {
                continue;
            }
            let class = ClassFile::parse(data).map_err(|e| RemapError::unit(name, e))?;
            self.hierarchy
                .insert(class.name.clone(), class.super_name.clone(), class.interfaces.clone());
            units.push((name.to_string(), class));
        }
        Ok(units)
    }
}

impl RemapEngine for TableRemapper {
    fn read_classpath(&mut self, archives: &[PathBuf]) -> RemapResult<()> {
        self.ensure_open()?;
        let mut present = HashSet::new();
        for archive in archives {
            let units = self.read_units(archive)?;
            debug!(archive = %archive.display(), units = units.len(), "read classpath archive");
            present.extend(units.into_iter().map(|(_, class)| class.name));
        }
        if self.prune {
            let dropped = self.table.retain_classes(|name| present.contains(name));
            info!(dropped, "pruned translation entries absent from the classpath");
        }
        Ok(())
    }

    fn create_input_tag(&mut self) -> InputTag {
        self.next_tag += 1;
        InputTag::new(self.next_tag)
    }

    fn read_inputs(&mut self, tag: InputTag, archive: &Path) -> RemapResult<()> {
        self.ensure_open()?;
        let units = self.read_units(archive)?;
        debug!(archive = %archive.display(), %tag, units = units.len(), "read inputs");
        self.inputs.entry(tag).or_default().extend(units);
        Ok(())
    }

    fn apply(
        &mut self,
        tag: InputTag,
        output: &mut dyn OutputSink,
        transform: &mut dyn ClassDecorator,
    ) -> RemapResult<()> {
        self.ensure_open()?;
        let units = self.inputs.remove(&tag).ok_or(RemapError::UnknownTag(tag))?;
        let remapper = UnitRemapper {
            view: self.table.forward(),
            hierarchy: &self.hierarchy,
        };
        for (entry, class) in units {
            let renamed = remapper.remap(class).map_err(|e| match e {
                UnitError::Class(source) => RemapError::unit(&entry, source),
                UnitError::Mapping(source) => RemapError::Mapping(source),
            })?;
            let rewritten = rewrite_class(renamed, transform).map_err(|e| RemapError::unit(&entry, e))?;
            let bytes = rewritten.to_bytes().map_err(|e| RemapError::unit(&entry, e))?;
            output.accept(&class_entry_name(&rewritten.name), &bytes)?;
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.inputs.clear();
        self.hierarchy = ClassHierarchy::new();
        self.finished = true;
        debug!("remap engine finished");
    }

    fn translation_table(&self) -> Option<&TranslationTable> {
        Some(&self.table)
    }
}

enum UnitError {
    Class(rehost_classfile::ClassError),
    Mapping(rehost_mapping::MappingError),
}

impl From<rehost_classfile::ClassError> for UnitError {
    fn from(e: rehost_classfile::ClassError) -> Self {
        Self::Class(e)
    }
}

impl From<rehost_mapping::MappingError> for UnitError {
    fn from(e: rehost_mapping::MappingError) -> Self {
        Self::Mapping(e)
    }
}

/// Renames one unit.
struct UnitRemapper<'a> {
    view: TableView<'a>,
    hierarchy: &'a ClassHierarchy,
}

impl UnitRemapper<'_> {
    fn remap(&self, mut class: ClassFile) -> Result<ClassFile, UnitError> {
        let owner = class.name.clone();
        self.remap_pool(&mut class.pool)?;

        class.name = self.view.map_class(&class.name);
        class.super_name = class.super_name.map(|s| self.view.map_class(&s));
        class.interfaces = class.interfaces.iter().map(|i| self.view.map_class(i)).collect();
        class.signature = self.signature(class.signature.as_deref())?;
        self.annotations(&mut class.visible_annotations)?;
        self.annotations(&mut class.invisible_annotations)?;

        for field in &mut class.fields {
            if let Some(name) = self
                .hierarchy
                .resolve_field(&self.view, &owner, &field.name, &field.descriptor)
            {
                field.name = name;
            }
            field.descriptor = self.view.map_descriptor(&field.descriptor)?;
            field.signature = self.signature(field.signature.as_deref())?;
            self.annotations(&mut field.visible_annotations)?;
            self.annotations(&mut field.invisible_annotations)?;
        }
        for method in &mut class.methods {
            if let Some(name) = self
                .hierarchy
                .resolve_method(&self.view, &owner, &method.name, &method.descriptor)
            {
                method.name = name;
            }
            method.descriptor = self.view.map_descriptor(&method.descriptor)?;
            method.signature = self.signature(method.signature.as_deref())?;
            self.annotations(&mut method.visible_annotations)?;
            self.annotations(&mut method.invisible_annotations)?;
        }
        Ok(class)
    }

    fn signature(&self, signature: Option<&str>) -> MappingResult<Option<String>> {
        signature.map(|s| self.view.map_signature(s)).transpose()
    }

    /// Class entries may hold an array descriptor instead of a name.
    fn class_reference(&self, name: &str) -> MappingResult<String> {
        if name.starts_with('[') {
            self.view.map_descriptor(name)
        } else {
            Ok(self.view.map_class(name))
        }
    }

    fn remap_pool(&self, pool: &mut ConstantPool) -> Result<(), UnitError> {
        // read from a snapshot so every lookup sees source names
        let original = pool.clone();
        for index in original.indices() {
            let replacement = match original.get(index)? {
                Constant::Class { name } => {
                    let source = original.utf8(*name)?;
                    let target = self.class_reference(source)?;
                    (target != source).then(|| -> Result<Constant, UnitError> {
                        Ok(Constant::Class {
                            name: pool.utf8_index(&target)?,
                        })
                    })
                }
                Constant::FieldRef { class, name_and_type } => {
                    let owner = original.class_name(*class)?;
                    let (name, descriptor) = original.name_and_type(*name_and_type)?;
                    let new_name = self
                        .hierarchy
                        .resolve_field(&self.view, owner, name, descriptor)
                        .unwrap_or_else(|| name.to_string());
                    let new_descriptor = self.view.map_descriptor(descriptor)?;
                    (new_name != name || new_descriptor != descriptor).then(|| -> Result<Constant, UnitError> {
                        Ok(Constant::FieldRef {
                            class: *class,
                            name_and_type: pool.name_and_type_index(&new_name, &new_descriptor)?,
                        })
                    })
                }
                Constant::MethodRef { class, name_and_type }
                | Constant::InterfaceMethodRef { class, name_and_type } => {
                    let owner = original.class_name(*class)?;
                    let (name, descriptor) = original.name_and_type(*name_and_type)?;
                    // array receivers (clone on T[]) have nothing to rename
                    let new_name = if owner.starts_with('[') {
                        None
                    } else {
                        self.hierarchy.resolve_method(&self.view, owner, name, descriptor)
                    }
                    .unwrap_or_else(|| name.to_string());
                    let new_descriptor = self.view.map_descriptor(descriptor)?;
                    let interface = matches!(original.get(index)?, Constant::InterfaceMethodRef { .. });
                    (new_name != name || new_descriptor != descriptor).then(|| -> Result<Constant, UnitError> {
                        let name_and_type = pool.name_and_type_index(&new_name, &new_descriptor)?;
                        Ok(if interface {
                            Constant::InterfaceMethodRef {
                                class: *class,
                                name_and_type,
                            }
                        } else {
                            Constant::MethodRef {
                                class: *class,
                                name_and_type,
                            }
                        })
                    })
                }
                Constant::MethodType { descriptor } => {
                    let source = original.utf8(*descriptor)?;
                    let target = self.view.map_descriptor(source)?;
                    (target != source).then(|| -> Result<Constant, UnitError> {
                        Ok(Constant::MethodType {
                            descriptor: pool.utf8_index(&target)?,
                        })
                    })
                }
                Constant::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                }
                | Constant::Dynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    let (name, descriptor) = original.name_and_type(*name_and_type)?;
                    let target = self.view.map_descriptor(descriptor)?;
                    let dynamic = matches!(original.get(index)?, Constant::Dynamic { .. });
                    (target != descriptor).then(|| -> Result<Constant, UnitError> {
                        let name_and_type = pool.name_and_type_index(name, &target)?;
                        Ok(if dynamic {
                            Constant::Dynamic {
                                bootstrap: *bootstrap,
                                name_and_type,
                            }
                        } else {
                            Constant::InvokeDynamic {
                                bootstrap: *bootstrap,
                                name_and_type,
                            }
                        })
                    })
                }
                _ => None,
            };
            if let Some(constant) = replacement {
                pool.set(index, constant?)?;
            }
        }
        Ok(())
    }

    fn annotations(&self, annotations: &mut [Annotation]) -> MappingResult<()> {
        for annotation in annotations {
            self.annotation(annotation)?;
        }
        Ok(())
    }

    fn annotation(&self, annotation: &mut Annotation) -> MappingResult<()> {
        annotation.descriptor = self.view.map_descriptor(&annotation.descriptor)?;
        for (_, value) in &mut annotation.elements {
            self.element(value)?;
        }
        Ok(())
    }

    fn element(&self, value: &mut ElementValue) -> MappingResult<()> {
        match value {
            ElementValue::Const(ConstValue::Class(descriptor)) => {
                *descriptor = self.view.map_descriptor(descriptor)?;
            }
            ElementValue::Const(_) => {}
            ElementValue::Enum { descriptor, .. } => {
                *descriptor = self.view.map_descriptor(descriptor)?;
            }
            ElementValue::Annotation(nested) => self.annotation(nested)?,
            ElementValue::Array(values) => {
                for v in values {
                    self.element(v)?;
                }
            }
        }
        Ok(())
    }
}
