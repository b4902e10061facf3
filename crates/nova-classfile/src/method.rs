use std::fmt::{self, Write as _};

use crate::classfile::{binary_name_to_internal, ClassFile};
use crate::code::{self, InsnList};
use crate::error::Result;

/// Identifies a method by its owner's binary name, its name and its erased descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    /// Binary name of the declaring type (`com.example.App`).
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodHandle {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    pub fn owner_internal_name(&self) -> String {
        binary_name_to_internal(&self.owner)
    }

    /// The same method looked up on a different declaring type.
    pub fn with_owner(&self, owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// A `LocalVariableTable` entry, with its `LocalVariableTypeTable` signature when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub slot: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub start_pc: u32,
    pub length: u32,
}

impl LocalVariable {
    /// Whether the variable is live at bytecode offset `pc` (`[start_pc, start_pc + length)`).
    pub fn covers(&self, pc: u32) -> bool {
        self.start_pc <= pc && pc < self.start_pc + self.length
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    pub handle: MethodHandle,
    pub access_flags: u16,
    pub instructions: InsnList,
    pub local_variables: Vec<LocalVariable>,
}

impl MethodBody {
    pub fn new(
        handle: MethodHandle,
        instructions: InsnList,
        local_variables: Vec<LocalVariable>,
    ) -> Self {
        Self {
            handle,
            access_flags: 0,
            instructions,
            local_variables,
        }
    }

    /// Finds the variable stored in `slot` whose range covers offset `pc`.
    ///
    /// Slots are reused, and synthetic temporaries carry no entry at all, so a load outside
    /// every range has no known variable.
    pub fn local_variable(&self, slot: u16, pc: u32) -> Option<&LocalVariable> {
        self.local_variables
            .iter()
            .find(|v| v.slot == slot && v.covers(pc))
    }

    /// Human-readable listing of the method for diagnostics.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.handle);
        for node in &self.instructions {
            if node.insn.is_marker() {
                let _ = writeln!(out, "       {}", node.insn);
            } else {
                let _ = writeln!(out, "  {:>4}: {}", node.offset, node.insn);
            }
        }
        if !self.local_variables.is_empty() {
            let _ = writeln!(out, "  locals:");
            for var in &self.local_variables {
                let _ = write!(
                    out,
                    "    {} {} {} [{}..{}]",
                    var.slot,
                    var.name,
                    var.descriptor,
                    var.start_pc,
                    var.start_pc + var.length
                );
                if let Some(signature) = &var.signature {
                    let _ = write!(out, " {signature}");
                }
                out.push('\n');
            }
        }
        out
    }
}

impl ClassFile {
    /// Decodes the body of the method matching `handle`'s name and descriptor.
    ///
    /// Returns `Ok(None)` when this class does not declare the method, or declares it without
    /// code (abstract, native). The handle's owner is not compared against `this_class`.
    pub fn method_body(&self, handle: &MethodHandle) -> Result<Option<MethodBody>> {
        let Some(method) = self.find_method(&handle.name, &handle.descriptor) else {
            return Ok(None);
        };
        let Some(code) = &method.code else {
            return Ok(None);
        };

        let instructions = code::decode(code, &self.constant_pool, &self.bootstrap_methods)?;
        Ok(Some(MethodBody {
            handle: handle.clone(),
            access_flags: method.access_flags,
            instructions,
            local_variables: code.local_variables.clone(),
        }))
    }
}

/// Locates `handle` in the class file `bytes`.
pub fn locate(bytes: &[u8], handle: &MethodHandle) -> Result<Option<MethodBody>> {
    ClassFile::parse(bytes)?.method_body(handle)
}
