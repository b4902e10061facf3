use std::fmt;

use crate::error::{Error, Result};
use crate::reader::Reader;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CpInfo {
    /// Slot 0 and the second slot of `Long`/`Double` entries.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

impl CpInfo {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CpInfo::Unusable => "Unusable",
            CpInfo::Utf8(_) => "Utf8",
            CpInfo::Integer(_) => "Integer",
            CpInfo::Float(_) => "Float",
            CpInfo::Long(_) => "Long",
            CpInfo::Double(_) => "Double",
            CpInfo::Class(_) => "Class",
            CpInfo::String(_) => "String",
            CpInfo::FieldRef { .. } => "Fieldref",
            CpInfo::MethodRef { .. } => "Methodref",
            CpInfo::InterfaceMethodRef { .. } => "InterfaceMethodref",
            CpInfo::NameAndType { .. } => "NameAndType",
            CpInfo::MethodHandle { .. } => "MethodHandle",
            CpInfo::MethodType(_) => "MethodType",
            CpInfo::Dynamic { .. } => "Dynamic",
            CpInfo::InvokeDynamic { .. } => "InvokeDynamic",
            CpInfo::Module(_) => "Module",
            CpInfo::Package(_) => "Package",
        }
    }
}

/// A symbolic reference to a field or method (`owner.name:descriptor`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Internal name of the owning class (`java/util/List`).
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    /// `true` when the constant is an `InterfaceMethodref`.
    pub interface: bool,
}

/// A `CONSTANT_MethodHandle` resolved to its target member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandleRef {
    /// JVMS §5.4.3.5 reference kind (`REF_invokeStatic` = 6, ...).
    pub kind: u8,
    pub member: MemberRef,
}

/// A loadable constant, as pushed by `ldc` or passed as a bootstrap argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    /// Internal name (`java/lang/String`) or array descriptor (`[I`).
    Class(String),
    MethodType(String),
    MethodHandle(MethodHandleRef),
    /// A dynamically-computed constant; only its name and field descriptor are kept.
    Dynamic { name: String, descriptor: String },
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v}F"),
            Constant::Long(v) => write!(f, "{v}L"),
            Constant::Double(v) => write!(f, "{v}D"),
            Constant::String(s) => write!(f, "{s:?}"),
            Constant::Class(name) => write!(f, "{name}.class"),
            Constant::MethodType(desc) => write!(f, "MethodType {desc}"),
            Constant::MethodHandle(handle) => write!(
                f,
                "MethodHandle[{}] {}.{}{}",
                handle.kind, handle.member.owner, handle.member.name, handle.member.descriptor
            ),
            Constant::Dynamic { name, descriptor } => write!(f, "Dynamic {name}:{descriptor}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ConstantPool {
    entries: Vec<CpInfo>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(CpInfo::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    CpInfo::Utf8(decode_modified_utf8(reader.read_bytes(len)?)?)
                }
                3 => CpInfo::Integer(reader.read_i4()?),
                4 => CpInfo::Float(f32::from_bits(reader.read_u4()?)),
                5 => CpInfo::Long(reader.read_u8()? as i64),
                6 => CpInfo::Double(f64::from_bits(reader.read_u8()?)),
                7 => CpInfo::Class(reader.read_u2()?),
                8 => CpInfo::String(reader.read_u2()?),
                9 => CpInfo::FieldRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                10 => CpInfo::MethodRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                11 => CpInfo::InterfaceMethodRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                12 => CpInfo::NameAndType {
                    name: reader.read_u2()?,
                    descriptor: reader.read_u2()?,
                },
                15 => CpInfo::MethodHandle {
                    kind: reader.read_u1()?,
                    reference: reader.read_u2()?,
                },
                16 => CpInfo::MethodType(reader.read_u2()?),
                17 => CpInfo::Dynamic {
                    bootstrap: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                18 => CpInfo::InvokeDynamic {
                    bootstrap: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                19 => CpInfo::Module(reader.read_u2()?),
                20 => CpInfo::Package(reader.read_u2()?),
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };

            let wide = matches!(entry, CpInfo::Long(_) | CpInfo::Double(_));
            entries.push(entry);
            if wide {
                entries.push(CpInfo::Unusable);
            }
        }

        if entries.len() != count {
            return Err(Error::Other("constant pool overflows its declared count"));
        }

        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Result<&CpInfo> {
        match self.entries.get(index as usize) {
            Some(CpInfo::Unusable) | None => Err(Error::InvalidConstantPoolIndex(index)),
            Some(entry) => Ok(entry),
        }
    }

    pub(crate) fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpInfo::Utf8(s) => Ok(s),
            other => Err(mismatch(index, "Utf8", other)),
        }
    }

    pub(crate) fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Class(name) => Ok(self.get_utf8(*name)?.to_string()),
            other => Err(mismatch(index, "Class", other)),
        }
    }

    pub(crate) fn get_name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            CpInfo::NameAndType { name, descriptor } => {
                Ok((self.get_utf8(*name)?, self.get_utf8(*descriptor)?))
            }
            other => Err(mismatch(index, "NameAndType", other)),
        }
    }

    pub(crate) fn get_member_ref(&self, index: u16) -> Result<MemberRef> {
        let (class, name_and_type, interface) = match self.get(index)? {
            CpInfo::FieldRef {
                class,
                name_and_type,
            }
            | CpInfo::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            CpInfo::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            other => return Err(mismatch(index, "Fieldref/Methodref", other)),
        };
        let (name, descriptor) = self.get_name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner: self.get_class_name(class)?,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface,
        })
    }

    pub(crate) fn get_method_handle(&self, index: u16) -> Result<MethodHandleRef> {
        match self.get(index)? {
            CpInfo::MethodHandle { kind, reference } => Ok(MethodHandleRef {
                kind: *kind,
                member: self.get_member_ref(*reference)?,
            }),
            other => Err(mismatch(index, "MethodHandle", other)),
        }
    }

    /// Returns `(bootstrap_method_attr_index, name, descriptor)` of an `InvokeDynamic` entry.
    pub(crate) fn get_invoke_dynamic(&self, index: u16) -> Result<(u16, &str, &str)> {
        match self.get(index)? {
            CpInfo::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                Ok((*bootstrap, name, descriptor))
            }
            other => Err(mismatch(index, "InvokeDynamic", other)),
        }
    }

    /// Resolves a loadable constant (`ldc` operand or bootstrap argument).
    pub(crate) fn get_constant(&self, index: u16) -> Result<Constant> {
        Ok(match self.get(index)? {
            CpInfo::Integer(v) => Constant::Int(*v),
            CpInfo::Float(v) => Constant::Float(*v),
            CpInfo::Long(v) => Constant::Long(*v),
            CpInfo::Double(v) => Constant::Double(*v),
            CpInfo::String(utf8) => Constant::String(self.get_utf8(*utf8)?.to_string()),
            CpInfo::Class(utf8) => Constant::Class(self.get_utf8(*utf8)?.to_string()),
            CpInfo::MethodType(utf8) => Constant::MethodType(self.get_utf8(*utf8)?.to_string()),
            CpInfo::MethodHandle { .. } => Constant::MethodHandle(self.get_method_handle(index)?),
            CpInfo::Dynamic { name_and_type, .. } => {
                let (name, descriptor) = self.get_name_and_type(*name_and_type)?;
                Constant::Dynamic {
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                }
            }
            other => return Err(mismatch(index, "loadable constant", other)),
        })
    }
}

fn mismatch(index: u16, expected: &'static str, found: &CpInfo) -> Error {
    Error::ConstantPoolTypeMismatch {
        index,
        expected,
        found: found.kind(),
    }
}

/// Decodes JVMS §4.4.7 "modified UTF-8" (encoded NUL, surrogate pairs as two 3-byte units).
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(s.to_string());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 & 0x80 == 0 {
            units.push(b0);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)? as u16;
            units.push(((b0 & 0x1F) << 6) | (b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(i + 1).ok_or(Error::InvalidModifiedUtf8)? as u16;
            let b2 = *bytes.get(i + 2).ok_or(Error::InvalidModifiedUtf8)? as u16;
            units.push(((b0 & 0x0F) << 12) | ((b1 & 0x3F) << 6) | (b2 & 0x3F));
            i += 3;
        } else {
            return Err(Error::InvalidModifiedUtf8);
        }
    }

    String::from_utf16(&units).map_err(|_| Error::InvalidModifiedUtf8)
}
