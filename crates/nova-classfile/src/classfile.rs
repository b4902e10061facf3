use crate::constant_pool::{Constant, ConstantPool, MethodHandleRef};
use crate::error::{Error, Result};
use crate::method::LocalVariable;
use crate::reader::Reader;

pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_STATIC: u16 = 0x0008;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    pub signature: Option<String>,
    pub bootstrap_methods: Vec<BootstrapMethod>,
    pub(crate) constant_pool: ConstantPool,
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    /// Raw `Code` attribute; `None` for abstract and native methods (and for fields).
    pub code: Option<Code>,
}

/// An undecoded `Code` attribute plus the debug tables the analysis needs.
#[derive(Debug, Clone, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub line_numbers: Vec<LineNumber>,
    /// `LocalVariableTable` entries, merged with their `LocalVariableTypeTable` signatures.
    pub local_variables: Vec<LocalVariable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    pub handle: MethodHandleRef,
    pub arguments: Vec<Constant>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFEBABE {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_member(&mut reader, &cp)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_member(&mut reader, &cp)?);
        }

        let class_attrs = parse_attributes(&mut reader, &cp, AttributeTarget::Class)?;

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            signature: class_attrs.signature,
            bootstrap_methods: class_attrs.bootstrap_methods,
            constant_pool: cp,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    /// `this_class` with `.` separators (`java.util.ArrayList`).
    pub fn binary_name(&self) -> String {
        internal_name_to_binary(&self.this_class)
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&ClassMember> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }
}

pub fn internal_name_to_binary(internal: &str) -> String {
    internal.replace('/', ".")
}

pub fn binary_name_to_internal(binary: &str) -> String {
    binary.replace('.', "/")
}

fn parse_member(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ClassMember> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

    let attrs = parse_attributes(reader, cp, AttributeTarget::Member)?;
    Ok(ClassMember {
        access_flags,
        name,
        descriptor,
        signature: attrs.signature,
        code: attrs.code,
    })
}

#[derive(Default)]
struct ParsedAttributes {
    signature: Option<String>,
    code: Option<Code>,
    bootstrap_methods: Vec<BootstrapMethod>,
}

enum AttributeTarget {
    Class,
    Member,
}

fn parse_attributes(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    target: AttributeTarget,
) -> Result<ParsedAttributes> {
    let attributes_count = reader.read_u2()? as usize;
    let mut parsed = ParsedAttributes::default();
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let name = cp.get_utf8(name_index)?;

        let mut sub = Reader::new(info);
        match name {
            "Signature" => {
                let sig_index = sub.read_u2()?;
                parsed.signature = Some(cp.get_utf8(sig_index)?.to_string());
                sub.ensure_empty()?;
            }
            "Code" if matches!(target, AttributeTarget::Member) => {
                parsed.code = Some(parse_code(&mut sub, cp)?);
                sub.ensure_empty()?;
            }
            "BootstrapMethods" if matches!(target, AttributeTarget::Class) => {
                let num = sub.read_u2()? as usize;
                let mut methods = Vec::with_capacity(num);
                for _ in 0..num {
                    let handle = cp.get_method_handle(sub.read_u2()?)?;
                    let num_args = sub.read_u2()? as usize;
                    let mut arguments = Vec::with_capacity(num_args);
                    for _ in 0..num_args {
                        arguments.push(cp.get_constant(sub.read_u2()?)?);
                    }
                    methods.push(BootstrapMethod { handle, arguments });
                }
                parsed.bootstrap_methods = methods;
                sub.ensure_empty()?;
            }
            _ => {
                // Unknown attribute: intentionally skipped.
            }
        }
    }

    Ok(parsed)
}

fn parse_code(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Code> {
    let max_stack = reader.read_u2()?;
    let max_locals = reader.read_u2()?;
    let code_length = reader.read_u4()? as usize;
    let bytecode = reader.read_bytes(code_length)?.to_vec();

    let exception_count = reader.read_u2()? as usize;
    let mut exception_table = Vec::with_capacity(exception_count);
    for _ in 0..exception_count {
        let start_pc = reader.read_u2()?;
        let end_pc = reader.read_u2()?;
        let handler_pc = reader.read_u2()?;
        let catch_type_idx = reader.read_u2()?;
        let catch_type = if catch_type_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(catch_type_idx)?)
        };
        exception_table.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
    }

    let mut line_numbers = Vec::new();
    let mut local_variables: Vec<LocalVariable> = Vec::new();
    let mut local_variable_types: Vec<LocalVariable> = Vec::new();

    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let name = cp.get_utf8(name_index)?;

        let mut sub = Reader::new(info);
        match name {
            "LineNumberTable" => {
                let num = sub.read_u2()? as usize;
                for _ in 0..num {
                    line_numbers.push(LineNumber {
                        start_pc: sub.read_u2()?,
                        line: sub.read_u2()?,
                    });
                }
                sub.ensure_empty()?;
            }
            "LocalVariableTable" => {
                local_variables.extend(parse_local_variables(&mut sub, cp)?);
                sub.ensure_empty()?;
            }
            "LocalVariableTypeTable" => {
                local_variable_types.extend(parse_local_variables(&mut sub, cp)?);
                sub.ensure_empty()?;
            }
            _ => {}
        }
    }

    // Type-table entries carry the generic signature in the descriptor position.
    for typed in local_variable_types {
        let matching = local_variables.iter_mut().find(|var| {
            var.slot == typed.slot && var.start_pc == typed.start_pc && var.name == typed.name
        });
        if let Some(var) = matching {
            var.signature = Some(typed.descriptor);
        }
    }

    Ok(Code {
        max_stack,
        max_locals,
        bytecode,
        exception_table,
        line_numbers,
        local_variables,
    })
}

fn parse_local_variables(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<LocalVariable>> {
    let num = reader.read_u2()? as usize;
    let mut vars = Vec::with_capacity(num);
    for _ in 0..num {
        let start_pc = reader.read_u2()? as u32;
        let length = reader.read_u2()? as u32;
        let name = cp.get_utf8(reader.read_u2()?)?.to_string();
        let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
        let slot = reader.read_u2()?;
        vars.push(LocalVariable {
            slot,
            name,
            descriptor,
            signature: None,
            start_pc,
            length,
        });
    }
    Ok(vars)
}
