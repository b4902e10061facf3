#![forbid(unsafe_code)]

mod classfile;
mod code;
mod constant_pool;
mod error;
mod method;
pub mod opcodes;
mod reader;

pub use crate::classfile::{
    binary_name_to_internal, internal_name_to_binary, BootstrapMethod, ClassFile, ClassMember,
    Code, ExceptionHandler, LineNumber, ACC_ABSTRACT, ACC_INTERFACE, ACC_STATIC,
};
pub use crate::code::{Backward, Forward, Insn, InsnId, InsnList, InsnNode, Label};
pub use crate::constant_pool::{Constant, MemberRef, MethodHandleRef};
pub use crate::error::{Error, Result};
pub use crate::method::{locate, LocalVariable, MethodBody, MethodHandle};
