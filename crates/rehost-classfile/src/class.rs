//! The class file tree: parsing and serialization.

use tracing::{debug, trace};

use crate::annotation::{parse_annotations, write_annotations, Annotation};
use crate::bytes::{count_u16, put_u16, put_u32, ByteReader};
use crate::error::{ClassError, ClassResult};
use crate::pool::ConstantPool;

pub const MAGIC: u32 = 0xCAFE_BABE;

/// Access flag bits used by the rewrite and remap passes.
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
}

const SIGNATURE: &str = "Signature";
const VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

/// An attribute kept as opaque bytes. Its payload may reference constant
/// pool indices, which stay valid because the pool is append-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: String,
    pub info: Vec<u8>,
}

/// A field or method declaration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Member {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub visible_annotations: Vec<Annotation>,
    pub invisible_annotations: Vec<Annotation>,
    pub attributes: Vec<RawAttribute>,
}

impl Member {
    pub fn new(access: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
            ..Default::default()
        }
    }
}

/// One compiled unit.
#[derive(Clone, Debug)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access: u16,
    /// Internal name (`net/example/Foo`).
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub signature: Option<String>,
    pub visible_annotations: Vec<Annotation>,
    pub invisible_annotations: Vec<Annotation>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<RawAttribute>,
}

/// Attributes split into the parts this crate models and the raw rest.
#[derive(Default)]
struct ParsedAttributes {
    signature: Option<String>,
    visible: Vec<Annotation>,
    invisible: Vec<Annotation>,
    raw: Vec<RawAttribute>,
}

impl ClassFile {
    /// A new, empty public class (Java 8 format) with the given names.
    pub fn new(name: impl Into<String>, super_name: Option<&str>) -> Self {
        Self {
            minor_version: 0,
            major_version: 52,
            pool: ConstantPool::new(),
            access: access::PUBLIC | access::SUPER,
            name: name.into(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            signature: None,
            visible_annotations: Vec::new(),
            invisible_annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Parse a class file.
    pub fn parse(data: &[u8]) -> ClassResult<Self> {
        let mut r = ByteReader::new(data);
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassError::InvalidMagic(magic));
        }
        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let pool = ConstantPool::parse(&mut r)?;

        let access = r.u16()?;
        let name = pool.class_name(r.u16()?)?.to_string();
        let super_index = r.u16()?;
        let super_name = if super_index == 0 {
            None
        } else {
            Some(pool.class_name(super_index)?.to_string())
        };

        let interface_count = r.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(r.u16()?)?.to_string());
        }

        let fields = parse_members(&mut r, &pool)?;
        let methods = parse_members(&mut r, &pool)?;
        let attrs = parse_attributes(&mut r, &pool)?;
        trace!(class = %name, pool = pool.slot_count(), raw_attributes = attrs.raw.len(), "parsed class");

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access,
            name,
            super_name,
            interfaces,
            signature: attrs.signature,
            visible_annotations: attrs.visible,
            invisible_annotations: attrs.invisible,
            fields,
            methods,
            attributes: attrs.raw,
        })
    }

    /// Serialize the class. Names, descriptors and annotation contents are
    /// interned into a copy of the pool; existing entries are never moved.
    pub fn to_bytes(&self) -> ClassResult<Vec<u8>> {
        let mut pool = self.pool.clone();
        let mut body = Vec::new();

        put_u16(&mut body, self.access);
        put_u16(&mut body, pool.class_index(&self.name)?);
        match &self.super_name {
            Some(name) => put_u16(&mut body, pool.class_index(name)?),
            None => put_u16(&mut body, 0),
        }
        put_u16(&mut body, count_u16(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            put_u16(&mut body, pool.class_index(interface)?);
        }

        for members in [&self.fields, &self.methods] {
            put_u16(&mut body, count_u16(members.len(), "members")?);
            for member in members {
                put_u16(&mut body, member.access);
                put_u16(&mut body, pool.utf8_index(&member.name)?);
                put_u16(&mut body, pool.utf8_index(&member.descriptor)?);
                write_attributes(
                    &mut body,
                    &mut pool,
                    member.signature.as_deref(),
                    &member.visible_annotations,
                    &member.invisible_annotations,
                    &member.attributes,
                )?;
            }
        }

        write_attributes(
            &mut body,
            &mut pool,
            self.signature.as_deref(),
            &self.visible_annotations,
            &self.invisible_annotations,
            &self.attributes,
        )?;

        let grown = pool.slot_count().saturating_sub(self.pool.slot_count());
        if grown > 0 {
            debug!(class = %self.name, grown, "interned new constants");
        }

        let mut out = Vec::with_capacity(body.len() + 1024);
        put_u32(&mut out, MAGIC);
        put_u16(&mut out, self.minor_version);
        put_u16(&mut out, self.major_version);
        pool.write(&mut out)?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn is_interface(&self) -> bool {
        self.access & access::INTERFACE != 0
    }
}

fn parse_members(r: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassResult<Vec<Member>> {
    let count = r.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access = r.u16()?;
        let name = pool.utf8(r.u16()?)?.to_string();
        let descriptor = pool.utf8(r.u16()?)?.to_string();
        let attrs = parse_attributes(r, pool)?;
        members.push(Member {
            access,
            name,
            descriptor,
            signature: attrs.signature,
            visible_annotations: attrs.visible,
            invisible_annotations: attrs.invisible,
            attributes: attrs.raw,
        });
    }
    Ok(members)
}

fn parse_attributes(r: &mut ByteReader<'_>, pool: &ConstantPool) -> ClassResult<ParsedAttributes> {
    let count = r.u16()?;
    let mut parsed = ParsedAttributes::default();
    for _ in 0..count {
        let name = pool.utf8(r.u16()?)?.to_string();
        let len = r.u32()? as usize;
        let info = r.bytes(len)?;
        match name.as_str() {
            SIGNATURE => {
                let mut sr = ByteReader::new(info);
                parsed.signature = Some(pool.utf8(sr.u16()?)?.to_string());
            }
            VISIBLE_ANNOTATIONS => parsed.visible.extend(parse_annotations(info, pool)?),
            INVISIBLE_ANNOTATIONS => parsed.invisible.extend(parse_annotations(info, pool)?),
            _ => parsed.raw.push(RawAttribute {
                name,
                info: info.to_vec(),
            }),
        }
    }
    Ok(parsed)
}

fn write_attributes(
    buf: &mut Vec<u8>,
    pool: &mut ConstantPool,
    signature: Option<&str>,
    visible: &[Annotation],
    invisible: &[Annotation],
    raw: &[RawAttribute],
) -> ClassResult<()> {
    let mut encoded: Vec<(u16, Vec<u8>)> = Vec::with_capacity(raw.len() + 3);
    if let Some(signature) = signature {
        let mut info = Vec::with_capacity(2);
        put_u16(&mut info, pool.utf8_index(signature)?);
        encoded.push((pool.utf8_index(SIGNATURE)?, info));
    }
    if !visible.is_empty() {
        let info = write_annotations(visible, pool)?;
        encoded.push((pool.utf8_index(VISIBLE_ANNOTATIONS)?, info));
    }
    if !invisible.is_empty() {
        let info = write_annotations(invisible, pool)?;
        encoded.push((pool.utf8_index(INVISIBLE_ANNOTATIONS)?, info));
    }
    for attribute in raw {
        encoded.push((pool.utf8_index(&attribute.name)?, attribute.info.clone()));
    }

    put_u16(buf, count_u16(encoded.len(), "attributes")?);
    for (name, info) in encoded {
        put_u16(buf, name);
        let len = u32::try_from(info.len()).map_err(|_| ClassError::MalformedAttribute {
            attribute: "attribute".into(),
            reason: "payload exceeds u32 length".into(),
        })?;
        put_u32(buf, len);
        buf.extend_from_slice(&info);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{ConstValue, ElementValue};

    fn sample_class() -> ClassFile {
        let mut class = ClassFile::new("net/example/Widget", Some("java/lang/Object"));
        class.interfaces.push("java/lang/Runnable".into());
        class.signature = Some("Ljava/lang/Object;Ljava/lang/Runnable;".into());
        class.visible_annotations.push(
            Annotation::new("Lnet/example/Marker;")
                .with("value", ElementValue::Const(ConstValue::String("widget".into()))),
        );

        let mut field = Member::new(access::PRIVATE, "count", "I");
        field.invisible_annotations.push(Annotation::new("Lorg/jetbrains/annotations/NotNull;"));
        class.fields.push(field);

        let mut method = Member::new(access::PUBLIC, "run", "()V");
        method.attributes.push(RawAttribute {
            name: "Code".into(),
            info: vec![0, 1, 0, 1, 0, 0, 0, 1, 0xB1, 0, 0, 0, 0],
        });
        class.methods.push(method);
        class
    }

    #[test]
    fn serialized_class_parses_back() {
        let class = sample_class();
        let bytes = class.to_bytes().unwrap();
        let parsed = ClassFile::parse(&bytes).unwrap();

        assert_eq!(parsed.name, "net/example/Widget");
        assert_eq!(parsed.super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(parsed.interfaces, vec!["java/lang/Runnable".to_string()]);
        assert_eq!(parsed.signature, class.signature);
        assert_eq!(parsed.visible_annotations, class.visible_annotations);
        assert_eq!(parsed.fields, class.fields);
        assert_eq!(parsed.methods, class.methods);
    }

    #[test]
    fn existing_pool_indices_survive_rewrite() {
        let class = sample_class();
        let parsed = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();
        let before = parsed.pool.indices();

        let mut renamed = parsed.clone();
        renamed.name = "net/example/RenamedWidget".into();
        renamed.methods[0].name = "execute".into();
        let again = ClassFile::parse(&renamed.to_bytes().unwrap()).unwrap();

        for index in before {
            assert_eq!(again.pool.get(index).unwrap(), parsed.pool.get(index).unwrap());
        }
        assert_eq!(again.name, "net/example/RenamedWidget");
        assert_eq!(again.methods[0].name, "execute");
    }

    #[test]
    fn rewrite_only_appends_what_it_needs() {
        let parsed = ClassFile::parse(&sample_class().to_bytes().unwrap()).unwrap();
        let unchanged = ClassFile::parse(&parsed.to_bytes().unwrap()).unwrap();
        assert_eq!(unchanged.pool.slot_count(), parsed.pool.slot_count());

        let mut extended = parsed.clone();
        extended.interfaces.push("net/example/Capability".into());
        let again = ClassFile::parse(&extended.to_bytes().unwrap()).unwrap();
        // one Utf8 plus one Class entry
        assert_eq!(again.pool.slot_count(), parsed.pool.slot_count() + 2);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = ClassFile::parse(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap_err();
        assert!(matches!(err, ClassError::InvalidMagic(0xDEAD_BEEF)));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = sample_class().to_bytes().unwrap();
        let err = ClassFile::parse(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, ClassError::Truncated { .. }));
    }
}
