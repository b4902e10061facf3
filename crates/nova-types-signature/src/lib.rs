//! JVM descriptor and generic-signature parsing into [`TypeDescriptor`]s.
//!
//! Accepts field descriptors (`I`, `[J`, `Ljava/lang/String;`) as well as field-type
//! signatures (`Ljava/util/Map<Ljava/lang/String;[I>;`, `Lp/Outer<TT;>.Inner<Lq/R;>;`, `TT;`).
//! Generic information is kept only as far as it names concrete types:
//!
//! - `*` degrades the enclosing type to its raw form (no arguments at all),
//! - `+B` / `-B` contribute their bound `B`,
//! - type variables erase to `java.lang.Object`,
//! - inner class suffixes join with `$` and the inner type's arguments win.

#![forbid(unsafe_code)]

use std::fmt;

pub const OBJECT: &str = "java.lang.Object";
pub const STRING: &str = "java.lang.String";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Only meaningful in return position.
    Void,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 9] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Char,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
        PrimitiveType::Void,
    ];

    pub fn from_descriptor_char(ch: char) -> Option<Self> {
        Some(match ch {
            'Z' => PrimitiveType::Boolean,
            'B' => PrimitiveType::Byte,
            'C' => PrimitiveType::Char,
            'S' => PrimitiveType::Short,
            'I' => PrimitiveType::Int,
            'J' => PrimitiveType::Long,
            'F' => PrimitiveType::Float,
            'D' => PrimitiveType::Double,
            'V' => PrimitiveType::Void,
            _ => return None,
        })
    }

    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
            PrimitiveType::Void => 'V',
        }
    }

    /// Java keyword (`int`, `void`, ...).
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Void => "void",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Element type of a `newarray` instruction (`T_BOOLEAN` = 4 ..= `T_LONG` = 11).
    pub fn from_newarray_code(code: u8) -> Option<Self> {
        Some(match code {
            4 => PrimitiveType::Boolean,
            5 => PrimitiveType::Char,
            6 => PrimitiveType::Float,
            7 => PrimitiveType::Double,
            8 => PrimitiveType::Byte,
            9 => PrimitiveType::Short,
            10 => PrimitiveType::Int,
            11 => PrimitiveType::Long,
            _ => return None,
        })
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved Java type: primitive, (possibly parameterized) class, or array.
///
/// Only `Class` carries type arguments; an `Array` component is never itself an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Primitive(PrimitiveType),
    Class {
        /// Binary name with `.` separators (`java.util.Map$Entry`).
        name: String,
        args: Vec<TypeDescriptor>,
    },
    Array {
        component: Box<TypeDescriptor>,
        dims: u8,
    },
}

impl TypeDescriptor {
    pub fn object() -> Self {
        Self::class(OBJECT)
    }

    pub fn class(name: impl Into<String>) -> Self {
        TypeDescriptor::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn parameterized(name: impl Into<String>, args: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Class {
            name: name.into(),
            args,
        }
    }

    /// Wraps `component` in `dims` array dimensions, flattening nested arrays.
    pub fn array(component: TypeDescriptor, dims: u8) -> Self {
        if dims == 0 {
            return component;
        }
        match component {
            TypeDescriptor::Array {
                component,
                dims: inner,
            } => TypeDescriptor::Array {
                component,
                dims: inner.saturating_add(dims),
            },
            other => TypeDescriptor::Array {
                component: Box::new(other),
                dims,
            },
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, TypeDescriptor::Class { name, .. } if name == OBJECT)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Primitive(PrimitiveType::Void))
    }

    /// Name without type arguments: `java.util.List`, `int`, `java.lang.String[][]`.
    pub fn erased_name(&self) -> String {
        match self {
            TypeDescriptor::Primitive(p) => p.name().to_string(),
            TypeDescriptor::Class { name, .. } => name.clone(),
            TypeDescriptor::Array { component, dims } => {
                let mut out = component.erased_name();
                for _ in 0..*dims {
                    out.push_str("[]");
                }
                out
            }
        }
    }

    /// The same type with every type argument removed.
    pub fn raw(&self) -> TypeDescriptor {
        match self {
            TypeDescriptor::Primitive(_) => self.clone(),
            TypeDescriptor::Class { name, .. } => TypeDescriptor::class(name.clone()),
            TypeDescriptor::Array { component, dims } => TypeDescriptor::Array {
                component: Box::new(component.raw()),
                dims: *dims,
            },
        }
    }

    /// JVM field descriptor of the erased type (`Ljava/util/List;`, `[I`).
    pub fn to_descriptor(&self) -> String {
        match self {
            TypeDescriptor::Primitive(p) => p.descriptor_char().to_string(),
            TypeDescriptor::Class { name, .. } => format!("L{};", name.replace('.', "/")),
            TypeDescriptor::Array { component, dims } => {
                let mut out = "[".repeat(*dims as usize);
                out.push_str(&component.to_descriptor());
                out
            }
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(p) => write!(f, "{p}"),
            TypeDescriptor::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (idx, arg) in args.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeDescriptor::Array { component, dims } => {
                write!(f, "{component}")?;
                for _ in 0..*dims {
                    f.write_str("[]")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed type signature `{text}` at offset {offset}: {reason}")]
    Malformed {
        text: String,
        offset: usize,
        reason: &'static str,
    },
}

/// A class type whose name is still being accumulated, or whose argument list is open.
#[derive(Debug)]
struct Frame {
    name: String,
    dims: u8,
    args: Vec<TypeDescriptor>,
    /// Saw an unbounded wildcard among the arguments.
    raw: bool,
    /// The argument list was closed by `>`; only `.` or `;` may follow.
    closed: bool,
}

impl Frame {
    fn new(dims: u8) -> Self {
        Self {
            name: String::new(),
            dims,
            args: Vec::new(),
            raw: false,
            closed: false,
        }
    }

    fn finish(self) -> TypeDescriptor {
        let args = if self.raw { Vec::new() } else { self.args };
        TypeDescriptor::array(TypeDescriptor::parameterized(self.name, args), self.dims)
    }
}

/// Parses a field descriptor or field-type signature.
pub fn parse_type(text: &str) -> Result<TypeDescriptor, SignatureError> {
    let malformed = |offset: usize, reason: &'static str| SignatureError::Malformed {
        text: text.to_string(),
        offset,
        reason,
    };

    let mut open: Vec<Frame> = Vec::new();
    let mut pending: Option<Frame> = None;
    let mut dims: u8 = 0;
    let mut result: Option<TypeDescriptor> = None;

    let mut chars = text.char_indices();
    while let Some((offset, ch)) = chars.next() {
        if let Some(frame) = pending.as_mut() {
            match ch {
                '<' if !frame.closed => {
                    if frame.name.is_empty() {
                        return Err(malformed(offset, "type arguments without a class name"));
                    }
                    open.extend(pending.take());
                }
                '.' if frame.closed => {
                    frame.name.push('$');
                    frame.args.clear();
                    frame.raw = false;
                    frame.closed = false;
                }
                ';' => {
                    if frame.name.is_empty() || frame.name.ends_with('$') {
                        return Err(malformed(offset, "empty class name"));
                    }
                    if let Some(frame) = pending.take() {
                        emit(&mut open, &mut result, frame.finish())
                            .map_err(|reason| malformed(offset, reason))?;
                    }
                }
                '/' if !frame.closed => frame.name.push('.'),
                '<' | '>' | '.' | '[' | ':' => {
                    return Err(malformed(offset, "unexpected character in class name"));
                }
                other if !frame.closed => frame.name.push(other),
                _ => return Err(malformed(offset, "expected `.` or `;` after type arguments")),
            }
            continue;
        }

        match ch {
            '[' => dims = dims.saturating_add(1),
            'L' => {
                pending = Some(Frame::new(dims));
                dims = 0;
            }
            'T' => {
                let mut terminated = false;
                for (_, c) in chars.by_ref() {
                    if c == ';' {
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    return Err(malformed(offset, "unterminated type variable"));
                }
                let erased = TypeDescriptor::array(TypeDescriptor::object(), dims);
                dims = 0;
                emit(&mut open, &mut result, erased).map_err(|reason| malformed(offset, reason))?;
            }
            '*' => {
                let Some(top) = open.last_mut() else {
                    return Err(malformed(offset, "wildcard outside type arguments"));
                };
                if dims != 0 {
                    return Err(malformed(offset, "array of wildcard"));
                }
                top.raw = true;
            }
            '+' | '-' => {
                if open.is_empty() || dims != 0 {
                    return Err(malformed(offset, "wildcard bound outside type arguments"));
                }
            }
            '>' => {
                if dims != 0 {
                    return Err(malformed(offset, "dangling array dimension"));
                }
                let Some(mut frame) = open.pop() else {
                    return Err(malformed(offset, "unbalanced `>`"));
                };
                if frame.args.is_empty() && !frame.raw {
                    return Err(malformed(offset, "empty type argument list"));
                }
                frame.closed = true;
                pending = Some(frame);
            }
            code => {
                let Some(primitive) = PrimitiveType::from_descriptor_char(code) else {
                    return Err(malformed(offset, "unknown type code"));
                };
                if primitive == PrimitiveType::Void && (dims != 0 || !open.is_empty()) {
                    return Err(malformed(offset, "void is only valid as a return type"));
                }
                let ty = TypeDescriptor::array(TypeDescriptor::Primitive(primitive), dims);
                dims = 0;
                emit(&mut open, &mut result, ty).map_err(|reason| malformed(offset, reason))?;
            }
        }
    }

    if pending.is_some() || !open.is_empty() {
        return Err(malformed(text.len(), "unterminated class type"));
    }
    if dims != 0 {
        return Err(malformed(text.len(), "dangling array dimension"));
    }
    result.ok_or_else(|| malformed(0, "empty signature"))
}

fn emit(
    open: &mut [Frame],
    result: &mut Option<TypeDescriptor>,
    ty: TypeDescriptor,
) -> Result<(), &'static str> {
    if let Some(top) = open.last_mut() {
        top.args.push(ty);
        return Ok(());
    }
    if result.is_some() {
        return Err("trailing input after type");
    }
    *result = Some(ty);
    Ok(())
}

/// Parses the return type out of a method descriptor or method signature.
///
/// Leading type parameters (`<T:...>`) and trailing `throws` clauses (`^...`) are tolerated.
pub fn parse_return_type(method_descriptor: &str) -> Result<TypeDescriptor, SignatureError> {
    let malformed = |offset: usize, reason: &'static str| SignatureError::Malformed {
        text: method_descriptor.to_string(),
        offset,
        reason,
    };

    let open = method_descriptor
        .find('(')
        .ok_or_else(|| malformed(0, "missing parameter list"))?;
    let close = method_descriptor[open..]
        .find(')')
        .map(|idx| open + idx)
        .ok_or_else(|| malformed(open, "unterminated parameter list"))?;
    let rest = &method_descriptor[close + 1..];
    let ret = rest.split('^').next().unwrap_or(rest);

    parse_type(ret).map_err(|err| match err {
        SignatureError::Malformed { offset, reason, .. } => malformed(close + 1 + offset, reason),
    })
}
