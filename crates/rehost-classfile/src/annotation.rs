//! Owned annotation trees and their `Runtime*Annotations` codec.

use std::fmt;

use crate::bytes::{count_u16, put_u16, put_u8, ByteReader};
use crate::error::{ClassError, ClassResult};
use crate::pool::{Constant, ConstantPool};

/// A scalar annotation element value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Byte(i8),
    Char(u16),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    String(String),
    /// A class literal, held as a return descriptor (`Lfoo/Bar;`, `V`, `[I`).
    Class(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(v) => write!(f, "{v}"),
            Self::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "{c}"),
                None => write!(f, "\\u{v:04x}"),
            },
            Self::Double(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Class(v) => write!(f, "{v}"),
        }
    }
}

/// The value side of an annotation element.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementValue {
    Const(ConstValue),
    Enum { descriptor: String, value: String },
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

/// One annotation (marker) occurrence.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation type, e.g. `Lnet/example/Marker;`.
    pub descriptor: String,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            elements: Vec::new(),
        }
    }

    /// Builder-style helper to append an element.
    pub fn with(mut self, name: impl Into<String>, value: ElementValue) -> Self {
        self.elements.push((name.into(), value));
        self
    }

    /// First element with the given name.
    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Parse the payload of a `RuntimeVisibleAnnotations` or
/// `RuntimeInvisibleAnnotations` attribute.
pub(crate) fn parse_annotations(info: &[u8], pool: &ConstantPool) -> ClassResult<Vec<Annotation>> {
    let mut r = ByteReader::new(info);
    let count = r.u16()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(parse_annotation(&mut r, pool)?);
    }
    if r.remaining() != 0 {
        return Err(ClassError::MalformedAttribute {
            attribute: "RuntimeAnnotations".into(),
            reason: format!("{} trailing bytes", r.remaining()),
        });
    }
    Ok(annotations)
}

fn parse_annotation(r: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassResult<Annotation> {
    let descriptor = pool.utf8(r.u16()?)?.to_string();
    let count = r.u16()?;
    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(r.u16()?)?.to_string();
        elements.push((name, parse_element(r, pool)?));
    }
    Ok(Annotation { descriptor, elements })
}

fn parse_element(r: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassResult<ElementValue> {
    let offset = r.position();
    let tag = r.u8()?;
    let value = match tag {
        b'B' | b'C' | b'I' | b'S' | b'Z' => {
            let index = r.u16()?;
            let v = match pool.get(index)? {
                Constant::Integer(v) => *v,
                other => return Err(element_mismatch(tag, other)),
            };
            ElementValue::Const(match tag {
                b'B' => ConstValue::Byte(v as i8),
                b'C' => ConstValue::Char(v as u16),
                b'S' => ConstValue::Short(v as i16),
                b'Z' => ConstValue::Boolean(v != 0),
                _ => ConstValue::Int(v),
            })
        }
        b'D' => match pool.get(r.u16()?)? {
            Constant::Double(bits) => ElementValue::Const(ConstValue::Double(f64::from_bits(*bits))),
            other => return Err(element_mismatch(tag, other)),
        },
        b'F' => match pool.get(r.u16()?)? {
            Constant::Float(bits) => ElementValue::Const(ConstValue::Float(f32::from_bits(*bits))),
            other => return Err(element_mismatch(tag, other)),
        },
        b'J' => match pool.get(r.u16()?)? {
            Constant::Long(v) => ElementValue::Const(ConstValue::Long(*v)),
            other => return Err(element_mismatch(tag, other)),
        },
        b's' => ElementValue::Const(ConstValue::String(pool.utf8(r.u16()?)?.to_string())),
        b'c' => ElementValue::Const(ConstValue::Class(pool.utf8(r.u16()?)?.to_string())),
        b'e' => {
            let descriptor = pool.utf8(r.u16()?)?.to_string();
            let value = pool.utf8(r.u16()?)?.to_string();
            ElementValue::Enum { descriptor, value }
        }
        b'@' => ElementValue::Annotation(parse_annotation(r, pool)?),
        b'[' => {
            let count = r.u16()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(parse_element(r, pool)?);
            }
            ElementValue::Array(values)
        }
        other => {
            return Err(ClassError::MalformedAttribute {
                attribute: "RuntimeAnnotations".into(),
                reason: format!("unknown element tag {:?} at offset {offset}", other as char),
            })
        }
    };
    Ok(value)
}

fn element_mismatch(tag: u8, found: &Constant) -> ClassError {
    ClassError::MalformedAttribute {
        attribute: "RuntimeAnnotations".into(),
        reason: format!("element tag {:?} points at {found:?}", tag as char),
    }
}

/// Encode annotations as a `Runtime*Annotations` payload, interning every
/// string and constant they need.
pub(crate) fn write_annotations(annotations: &[Annotation], pool: &mut ConstantPool) -> ClassResult<Vec<u8>> {
    let mut buf = Vec::new();
    put_u16(&mut buf, count_u16(annotations.len(), "RuntimeAnnotations")?);
    for annotation in annotations {
        write_annotation(&mut buf, annotation, pool)?;
    }
    Ok(buf)
}

fn write_annotation(buf: &mut Vec<u8>, annotation: &Annotation, pool: &mut ConstantPool) -> ClassResult<()> {
    put_u16(buf, pool.utf8_index(&annotation.descriptor)?);
    put_u16(buf, count_u16(annotation.elements.len(), "annotation elements")?);
    for (name, value) in &annotation.elements {
        put_u16(buf, pool.utf8_index(name)?);
        write_element(buf, value, pool)?;
    }
    Ok(())
}

fn write_element(buf: &mut Vec<u8>, value: &ElementValue, pool: &mut ConstantPool) -> ClassResult<()> {
    match value {
        ElementValue::Const(c) => {
            let (tag, constant) = match c {
                ConstValue::Byte(v) => (b'B', Constant::Integer(*v as i32)),
                ConstValue::Char(v) => (b'C', Constant::Integer(*v as i32)),
                ConstValue::Double(v) => (b'D', Constant::Double(v.to_bits())),
                ConstValue::Float(v) => (b'F', Constant::Float(v.to_bits())),
                ConstValue::Int(v) => (b'I', Constant::Integer(*v)),
                ConstValue::Long(v) => (b'J', Constant::Long(*v)),
                ConstValue::Short(v) => (b'S', Constant::Integer(*v as i32)),
                ConstValue::Boolean(v) => (b'Z', Constant::Integer(*v as i32)),
                ConstValue::String(v) => (b's', Constant::Utf8(v.clone())),
                ConstValue::Class(v) => (b'c', Constant::Utf8(v.clone())),
            };
            put_u8(buf, tag);
            put_u16(buf, pool.value_index(constant)?);
        }
        ElementValue::Enum { descriptor, value } => {
            put_u8(buf, b'e');
            put_u16(buf, pool.utf8_index(descriptor)?);
            put_u16(buf, pool.utf8_index(value)?);
        }
        ElementValue::Annotation(nested) => {
            put_u8(buf, b'@');
            write_annotation(buf, nested, pool)?;
        }
        ElementValue::Array(values) => {
            put_u8(buf, b'[');
            put_u16(buf, count_u16(values.len(), "annotation array")?);
            for v in values {
                write_element(buf, v, pool)?;
            }
        }
    }
    Ok(())
}
