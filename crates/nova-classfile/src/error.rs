use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    UnexpectedEof,
    InvalidMagic(u32),
    InvalidConstantPoolIndex(u16),
    InvalidConstantPoolTag(u8),
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    InvalidModifiedUtf8,
    InvalidOpcode {
        offset: u32,
        opcode: u8,
    },
    InvalidBranchTarget {
        offset: u32,
        target: i64,
    },
    InvalidBootstrapMethodIndex(u16),
    MalformedAttribute(&'static str),
    Other(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedEof => write!(f, "unexpected end of input"),
            Error::InvalidMagic(magic) => write!(f, "invalid classfile magic: 0x{magic:08x}"),
            Error::InvalidConstantPoolIndex(index) => {
                write!(f, "invalid constant pool index: {index}")
            }
            Error::InvalidConstantPoolTag(tag) => write!(f, "invalid constant pool tag: {tag}"),
            Error::ConstantPoolTypeMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "constant pool type mismatch at index {index}: expected {expected}, found {found}"
            ),
            Error::InvalidModifiedUtf8 => write!(f, "invalid modified UTF-8 constant"),
            Error::InvalidOpcode { offset, opcode } => {
                write!(f, "invalid opcode 0x{opcode:02x} at bytecode offset {offset}")
            }
            Error::InvalidBranchTarget { offset, target } => {
                write!(f, "branch at offset {offset} jumps outside the method ({target})")
            }
            Error::InvalidBootstrapMethodIndex(index) => {
                write!(f, "invalid bootstrap method index: {index}")
            }
            Error::MalformedAttribute(name) => write!(f, "malformed {name} attribute"),
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}
