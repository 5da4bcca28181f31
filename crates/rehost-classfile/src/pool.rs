//! The constant pool.
//!
//! The pool is append-only once parsed: entries keep their original indices
//! so that raw attributes (method bodies, stack maps, bootstrap tables) that
//! reference them stay valid after a unit is rewritten. New strings and
//! references are interned at the end.

use std::collections::HashMap;

use crate::bytes::{put_u16, put_u32, put_u64, put_u8, ByteReader};
use crate::error::{ClassError, ClassResult};
use crate::mutf8;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_INTERFACE_METHOD_REF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// A single constant pool entry. Float and double values are kept as raw
/// bits so that entries compare exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constant {
    Utf8(String),
    /// A well-formed modified UTF-8 payload that is not valid Unicode.
    RawUtf8(Vec<u8>),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
}

impl Constant {
    /// Long and double entries occupy two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }
}

/// The constant pool of one compiled unit.
#[derive(Clone, Debug)]
pub struct ConstantPool {
    /// Slot 0 and the upper half of wide entries are `None`.
    entries: Vec<Option<Constant>>,
    utf8_lookup: HashMap<String, u16>,
    class_lookup: HashMap<u16, u16>,
    name_and_type_lookup: HashMap<(u16, u16), u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            entries: vec![None],
            utf8_lookup: HashMap::new(),
            class_lookup: HashMap::new(),
            name_and_type_lookup: HashMap::new(),
        }
    }

    /// The `constant_pool_count` value: number of slots including slot 0.
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    /// All occupied indices in ascending order.
    pub fn indices(&self) -> Vec<u16> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| i as u16)
            .collect()
    }

    /// Look up an entry.
    pub fn get(&self, index: u16) -> ClassResult<&Constant> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| ClassError::bad_index(index, "no entry at this index"))
    }

    /// Replace an entry in place. The replacement must have the same width.
    pub fn set(&mut self, index: u16, constant: Constant) -> ClassResult<()> {
        let old = self.get(index)?.clone();
        if old.is_wide() != constant.is_wide() {
            return Err(ClassError::bad_index(index, "cannot change entry width"));
        }
        self.forget(index, &old);
        self.remember(index, &constant);
        self.entries[index as usize] = Some(constant);
        Ok(())
    }

    /// Resolve a `CONSTANT_Utf8` entry.
    pub fn utf8(&self, index: u16) -> ClassResult<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            Constant::RawUtf8(_) => Err(ClassError::bad_index(index, "utf8 entry is not valid unicode")),
            other => Err(ClassError::bad_index(index, format!("expected utf8, found {other:?}"))),
        }
    }

    /// Resolve the internal name behind a `CONSTANT_Class` entry.
    pub fn class_name(&self, index: u16) -> ClassResult<&str> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            other => Err(ClassError::bad_index(index, format!("expected class, found {other:?}"))),
        }
    }

    /// Resolve a `CONSTANT_NameAndType` entry to `(name, descriptor)`.
    pub fn name_and_type(&self, index: u16) -> ClassResult<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => Ok((self.utf8(*name)?, self.utf8(*descriptor)?)),
            other => Err(ClassError::bad_index(
                index,
                format!("expected name-and-type, found {other:?}"),
            )),
        }
    }

    /// Append an entry without deduplication.
    pub fn push(&mut self, constant: Constant) -> ClassResult<u16> {
        let width = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + width > u16::MAX as usize {
            return Err(ClassError::PoolOverflow);
        }
        let index = self.entries.len() as u16;
        self.remember(index, &constant);
        self.entries.push(Some(constant));
        if width == 2 {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Index of a utf8 entry with this text, appending one if needed.
    pub fn utf8_index(&mut self, text: &str) -> ClassResult<u16> {
        if let Some(&index) = self.utf8_lookup.get(text) {
            return Ok(index);
        }
        self.push(Constant::Utf8(text.to_string()))
    }

    /// Index of a class entry naming `name`, appending one if needed.
    pub fn class_index(&mut self, name: &str) -> ClassResult<u16> {
        let name = self.utf8_index(name)?;
        if let Some(&index) = self.class_lookup.get(&name) {
            return Ok(index);
        }
        self.push(Constant::Class { name })
    }

    /// Index of a name-and-type entry, appending one if needed.
    pub fn name_and_type_index(&mut self, name: &str, descriptor: &str) -> ClassResult<u16> {
        let name = self.utf8_index(name)?;
        let descriptor = self.utf8_index(descriptor)?;
        if let Some(&index) = self.name_and_type_lookup.get(&(name, descriptor)) {
            return Ok(index);
        }
        self.push(Constant::NameAndType { name, descriptor })
    }

    /// Index of a constant of the given value, appending one if needed.
    /// Only used for annotation element constants, so a scan is fine.
    pub fn value_index(&mut self, constant: Constant) -> ClassResult<u16> {
        if let Constant::Utf8(text) = &constant {
            return self.utf8_index(text);
        }
        let found = self
            .entries
            .iter()
            .position(|e| e.as_ref() == Some(&constant));
        match found {
            Some(index) => Ok(index as u16),
            None => self.push(constant),
        }
    }

    fn remember(&mut self, index: u16, constant: &Constant) {
        match constant {
            Constant::Utf8(text) => {
                self.utf8_lookup.entry(text.clone()).or_insert(index);
            }
            Constant::Class { name } => {
                self.class_lookup.entry(*name).or_insert(index);
            }
            Constant::NameAndType { name, descriptor } => {
                self.name_and_type_lookup
                    .entry((*name, *descriptor))
                    .or_insert(index);
            }
            _ => {}
        }
    }

    fn forget(&mut self, index: u16, constant: &Constant) {
        match constant {
            Constant::Utf8(text) if self.utf8_lookup.get(text) == Some(&index) => {
                self.utf8_lookup.remove(text);
            }
            Constant::Class { name } if self.class_lookup.get(name) == Some(&index) => {
                self.class_lookup.remove(name);
            }
            Constant::NameAndType { name, descriptor }
                if self.name_and_type_lookup.get(&(*name, *descriptor)) == Some(&index) =>
            {
                self.name_and_type_lookup.remove(&(*name, *descriptor));
            }
            _ => {}
        }
    }

    pub(crate) fn parse(r: &mut ByteReader<'_>) -> ClassResult<Self> {
        let count = r.u16()?;
        let mut pool = Self::new();
        let mut index: u16 = 1;
        while index < count {
            let tag = r.u8()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = r.u16()? as usize;
                    let raw = r.bytes(len)?;
                    match mutf8::decode(raw)? {
                        Some(text) => Constant::Utf8(text),
                        None => Constant::RawUtf8(raw.to_vec()),
                    }
                }
                TAG_INTEGER => Constant::Integer(r.u32()? as i32),
                TAG_FLOAT => Constant::Float(r.u32()?),
                TAG_LONG => Constant::Long(r.u64()? as i64),
                TAG_DOUBLE => Constant::Double(r.u64()?),
                TAG_CLASS => Constant::Class { name: r.u16()? },
                TAG_STRING => Constant::String { value: r.u16()? },
                TAG_FIELD_REF => Constant::FieldRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_METHOD_REF => Constant::MethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    kind: r.u8()?,
                    reference: r.u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType { descriptor: r.u16()? },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                TAG_MODULE => Constant::Module { name: r.u16()? },
                TAG_PACKAGE => Constant::Package { name: r.u16()? },
                tag => return Err(ClassError::UnknownConstantTag { tag, index }),
            };
            let wide = constant.is_wide();
            pool.push(constant)?;
            index += if wide { 2 } else { 1 };
        }
        Ok(pool)
    }

    pub(crate) fn write(&self, buf: &mut Vec<u8>) -> ClassResult<()> {
        put_u16(buf, self.entries.len() as u16);
        for constant in self.entries.iter().flatten() {
            match constant {
                Constant::Utf8(text) => write_utf8(buf, &mutf8::encode(text))?,
                Constant::RawUtf8(raw) => write_utf8(buf, raw)?,
                Constant::Integer(v) => {
                    put_u8(buf, TAG_INTEGER);
                    put_u32(buf, *v as u32);
                }
                Constant::Float(bits) => {
                    put_u8(buf, TAG_FLOAT);
                    put_u32(buf, *bits);
                }
                Constant::Long(v) => {
                    put_u8(buf, TAG_LONG);
                    put_u64(buf, *v as u64);
                }
                Constant::Double(bits) => {
                    put_u8(buf, TAG_DOUBLE);
                    put_u64(buf, *bits);
                }
                Constant::Class { name } => write_ref(buf, TAG_CLASS, &[*name]),
                Constant::String { value } => write_ref(buf, TAG_STRING, &[*value]),
                Constant::FieldRef { class, name_and_type } => {
                    write_ref(buf, TAG_FIELD_REF, &[*class, *name_and_type])
                }
                Constant::MethodRef { class, name_and_type } => {
                    write_ref(buf, TAG_METHOD_REF, &[*class, *name_and_type])
                }
                Constant::InterfaceMethodRef { class, name_and_type } => {
                    write_ref(buf, TAG_INTERFACE_METHOD_REF, &[*class, *name_and_type])
                }
                Constant::NameAndType { name, descriptor } => {
                    write_ref(buf, TAG_NAME_AND_TYPE, &[*name, *descriptor])
                }
                Constant::MethodHandle { kind, reference } => {
                    put_u8(buf, TAG_METHOD_HANDLE);
                    put_u8(buf, *kind);
                    put_u16(buf, *reference);
                }
                Constant::MethodType { descriptor } => write_ref(buf, TAG_METHOD_TYPE, &[*descriptor]),
                Constant::Dynamic { bootstrap, name_and_type } => {
                    write_ref(buf, TAG_DYNAMIC, &[*bootstrap, *name_and_type])
                }
                Constant::InvokeDynamic { bootstrap, name_and_type } => {
                    write_ref(buf, TAG_INVOKE_DYNAMIC, &[*bootstrap, *name_and_type])
                }
                Constant::Module { name } => write_ref(buf, TAG_MODULE, &[*name]),
                Constant::Package { name } => write_ref(buf, TAG_PACKAGE, &[*name]),
            }
        }
        Ok(())
    }
}

fn write_utf8(buf: &mut Vec<u8>, encoded: &[u8]) -> ClassResult<()> {
    let len = u16::try_from(encoded.len()).map_err(|_| ClassError::MalformedAttribute {
        attribute: "CONSTANT_Utf8".into(),
        reason: format!("{} bytes exceed the u16 limit", encoded.len()),
    })?;
    put_u8(buf, TAG_UTF8);
    put_u16(buf, len);
    buf.extend_from_slice(encoded);
    Ok(())
}

fn write_ref(buf: &mut Vec<u8>, tag: u8, indices: &[u16]) {
    put_u8(buf, tag);
    for index in indices {
        put_u16(buf, *index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_reuses_entries() {
        let mut pool = ConstantPool::new();
        let a = pool.class_index("net/minecraft/Block").unwrap();
        let b = pool.class_index("net/minecraft/Block").unwrap();
        assert_eq!(a, b);
        // utf8 at 1, class at 2
        assert_eq!(pool.slot_count(), 3);
        assert_eq!(pool.class_name(a).unwrap(), "net/minecraft/Block");
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.push(Constant::Long(7)).unwrap();
        let next = pool.utf8_index("x").unwrap();
        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert!(pool.get(2).is_err());
        assert_eq!(pool.indices(), vec![1, 3]);
    }

    #[test]
    fn set_updates_lookups() {
        let mut pool = ConstantPool::new();
        let class = pool.class_index("a/Old").unwrap();
        let new_name = pool.utf8_index("b/New").unwrap();
        pool.set(class, Constant::Class { name: new_name }).unwrap();
        assert_eq!(pool.class_name(class).unwrap(), "b/New");
        assert_eq!(pool.class_index("b/New").unwrap(), class);
        // the old name is no longer served by the rewritten entry
        assert_ne!(pool.class_index("a/Old").unwrap(), class);
    }

    #[test]
    fn set_rejects_width_change() {
        let mut pool = ConstantPool::new();
        let index = pool.push(Constant::Integer(1)).unwrap();
        assert!(pool.set(index, Constant::Long(1)).is_err());
    }

    #[test]
    fn parse_write_preserves_layout() {
        let mut pool = ConstantPool::new();
        pool.class_index("java/lang/Object").unwrap();
        pool.push(Constant::Double(1.5f64.to_bits())).unwrap();
        pool.name_and_type_index("<init>", "()V").unwrap();
        pool.push(Constant::RawUtf8(vec![0xED, 0xA0, 0x80])).unwrap();

        let mut buf = Vec::new();
        pool.write(&mut buf).unwrap();
        let parsed = ConstantPool::parse(&mut ByteReader::new(&buf)).unwrap();

        assert_eq!(parsed.slot_count(), pool.slot_count());
        for index in pool.indices() {
            assert_eq!(parsed.get(index).unwrap(), pool.get(index).unwrap());
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let data = [0x00, 0x02, 0x63];
        let err = ConstantPool::parse(&mut ByteReader::new(&data)).unwrap_err();
        assert!(matches!(err, ClassError::UnknownConstantTag { tag: 0x63, index: 1 }));
    }
}
