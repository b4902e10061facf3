//! Decoded method bodies.
//!
//! Instructions live in an [`InsnList`] arena and link to their neighbours through explicit
//! [`InsnId`] indices, so traversal in either direction is O(1) per step and never needs
//! shared ownership. Branch targets, exception ranges and local-variable ranges are
//! materialised as [`Insn::Label`] markers and `LineNumberTable` entries as [`Insn::Line`]
//! markers; both carry no value semantics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::classfile::{BootstrapMethod, Code};
use crate::constant_pool::{Constant, ConstantPool, MemberRef, MethodHandleRef};
use crate::error::{Error, Result};
use crate::opcodes::{self, mnemonic};
use crate::reader::Reader;

/// Index of an instruction inside its [`InsnList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsnId(u32);

impl InsnId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A branch target, identified by the bytecode offset it marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    Label(Label),
    Line(u16),
    /// Any instruction without operands (`dup`, `areturn`, `iastore`, `iconst_1`, ...).
    Simple(u8),
    /// `bipush`, `sipush`, `newarray` (operand is the `T_*` element code).
    Int { opcode: u8, operand: i32 },
    /// Local-variable loads, stores and `ret`.
    Var { opcode: u8, slot: u16 },
    Iinc { slot: u16, delta: i16 },
    /// `new`, `anewarray`, `checkcast`, `instanceof`.
    ///
    /// `class` is an internal name, or an array descriptor for array classes.
    Type { opcode: u8, class: String },
    Field { opcode: u8, member: MemberRef },
    Method { opcode: u8, member: MemberRef },
    InvokeDynamic {
        name: String,
        descriptor: String,
        bootstrap: MethodHandleRef,
        arguments: Vec<Constant>,
    },
    Ldc(Constant),
    Jump { opcode: u8, target: Label },
    TableSwitch {
        default: Label,
        low: i32,
        targets: Vec<Label>,
    },
    LookupSwitch {
        default: Label,
        pairs: Vec<(i32, Label)>,
    },
    MultiANewArray { class: String, dims: u8 },
}

impl Insn {
    /// The JVM opcode, or `None` for label and line markers.
    pub fn opcode(&self) -> Option<u8> {
        Some(match self {
            Insn::Label(_) | Insn::Line(_) => return None,
            Insn::Simple(op)
            | Insn::Int { opcode: op, .. }
            | Insn::Var { opcode: op, .. }
            | Insn::Type { opcode: op, .. }
            | Insn::Field { opcode: op, .. }
            | Insn::Method { opcode: op, .. }
            | Insn::Jump { opcode: op, .. } => *op,
            Insn::Iinc { .. } => opcodes::IINC,
            Insn::InvokeDynamic { .. } => opcodes::INVOKEDYNAMIC,
            Insn::Ldc(_) => opcodes::LDC,
            Insn::TableSwitch { .. } => opcodes::TABLESWITCH,
            Insn::LookupSwitch { .. } => opcodes::LOOKUPSWITCH,
            Insn::MultiANewArray { .. } => opcodes::MULTIANEWARRAY,
        })
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Insn::Label(_) | Insn::Line(_))
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Label(label) => write!(f, "{label}:"),
            Insn::Line(line) => write!(f, "LINE {line}"),
            Insn::Simple(op) => f.write_str(mnemonic(*op)),
            Insn::Int { opcode, operand } => write!(f, "{} {operand}", mnemonic(*opcode)),
            Insn::Var { opcode, slot } => write!(f, "{} {slot}", mnemonic(*opcode)),
            Insn::Iinc { slot, delta } => write!(f, "iinc {slot} {delta}"),
            Insn::Type { opcode, class } => write!(f, "{} {class}", mnemonic(*opcode)),
            Insn::Field { opcode, member } | Insn::Method { opcode, member } => write!(
                f,
                "{} {}.{} {}",
                mnemonic(*opcode),
                member.owner,
                member.name,
                member.descriptor
            ),
            Insn::InvokeDynamic {
                name,
                descriptor,
                bootstrap,
                arguments,
            } => {
                write!(
                    f,
                    "invokedynamic {name}{descriptor} [{}.{}",
                    bootstrap.member.owner, bootstrap.member.name
                )?;
                for arg in arguments {
                    write!(f, ", {arg}")?;
                }
                f.write_str("]")
            }
            Insn::Ldc(constant) => write!(f, "ldc {constant}"),
            Insn::Jump { opcode, target } => write!(f, "{} {target}", mnemonic(*opcode)),
            Insn::TableSwitch {
                default,
                low,
                targets,
            } => {
                write!(f, "tableswitch")?;
                for (i, target) in targets.iter().enumerate() {
                    write!(f, " {}: {target}", *low as i64 + i as i64)?;
                }
                write!(f, " default: {default}")
            }
            Insn::LookupSwitch { default, pairs } => {
                write!(f, "lookupswitch")?;
                for (key, target) in pairs {
                    write!(f, " {key}: {target}")?;
                }
                write!(f, " default: {default}")
            }
            Insn::MultiANewArray { class, dims } => write!(f, "multianewarray {class} {dims}"),
        }
    }
}

/// One arena slot: the instruction, its bytecode offset and links to its neighbours.
///
/// Markers report the offset of the instruction they precede.
#[derive(Debug, Clone, PartialEq)]
pub struct InsnNode {
    id: InsnId,
    pub insn: Insn,
    pub offset: u32,
    prev: Option<InsnId>,
    next: Option<InsnId>,
}

impl InsnNode {
    pub fn id(&self) -> InsnId {
        self.id
    }

    pub fn prev(&self) -> Option<InsnId> {
        self.prev
    }

    pub fn next(&self) -> Option<InsnId> {
        self.next
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsnList {
    nodes: Vec<InsnNode>,
}

impl InsnList {
    /// Builds a list from `(offset, insn)` pairs in program order.
    pub fn from_insns(insns: impl IntoIterator<Item = (u32, Insn)>) -> Self {
        let mut nodes: Vec<InsnNode> = Vec::new();
        for (offset, insn) in insns {
            let id = InsnId(nodes.len() as u32);
            let prev = nodes.last_mut().map(|last| {
                last.next = Some(id);
                last.id
            });
            nodes.push(InsnNode {
                id,
                insn,
                offset,
                prev,
                next: None,
            });
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<InsnId> {
        self.nodes.first().map(|n| n.id)
    }

    pub fn last(&self) -> Option<InsnId> {
        self.nodes.last().map(|n| n.id)
    }

    pub fn node(&self, id: InsnId) -> &InsnNode {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: InsnId) -> Option<&InsnNode> {
        self.nodes.get(id.index())
    }

    /// Streams nodes from `start` (inclusive) towards the end of the method.
    pub fn forward(&self, start: Option<InsnId>) -> Forward<'_> {
        Forward {
            list: self,
            cursor: start,
        }
    }

    /// Streams nodes from `start` (inclusive) towards the start of the method.
    pub fn backward(&self, start: Option<InsnId>) -> Backward<'_> {
        Backward {
            list: self,
            cursor: start,
        }
    }

    pub fn iter(&self) -> Forward<'_> {
        self.forward(self.first())
    }
}

impl<'a> IntoIterator for &'a InsnList {
    type Item = &'a InsnNode;
    type IntoIter = Forward<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy successor walk; see [`InsnList::forward`].
#[derive(Debug, Clone)]
pub struct Forward<'a> {
    list: &'a InsnList,
    cursor: Option<InsnId>,
}

impl<'a> Iterator for Forward<'a> {
    type Item = &'a InsnNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node)
    }
}

/// Lazy predecessor walk; see [`InsnList::backward`].
#[derive(Debug, Clone)]
pub struct Backward<'a> {
    list: &'a InsnList,
    cursor: Option<InsnId>,
}

impl<'a> Iterator for Backward<'a> {
    type Item = &'a InsnNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.get(self.cursor?)?;
        self.cursor = node.prev;
        Some(node)
    }
}

/// Decodes a `Code` attribute into an instruction arena with label and line markers.
pub(crate) fn decode(
    code: &Code,
    cp: &ConstantPool,
    bootstrap_methods: &[BootstrapMethod],
) -> Result<InsnList> {
    let raw = decode_raw(&code.bytecode, cp, bootstrap_methods)?;

    let mut labels: BTreeSet<u32> = BTreeSet::new();
    for (_, insn) in &raw {
        match insn {
            Insn::Jump { target, .. } => {
                labels.insert(target.0);
            }
            Insn::TableSwitch {
                default, targets, ..
            } => {
                labels.insert(default.0);
                labels.extend(targets.iter().map(|l| l.0));
            }
            Insn::LookupSwitch { default, pairs } => {
                labels.insert(default.0);
                labels.extend(pairs.iter().map(|(_, l)| l.0));
            }
            _ => {}
        }
    }
    for handler in &code.exception_table {
        labels.insert(handler.start_pc as u32);
        labels.insert(handler.end_pc as u32);
        labels.insert(handler.handler_pc as u32);
    }
    for var in &code.local_variables {
        labels.insert(var.start_pc);
        labels.insert(var.start_pc + var.length);
    }

    let mut lines: BTreeMap<u32, Vec<u16>> = BTreeMap::new();
    for entry in &code.line_numbers {
        lines
            .entry(entry.start_pc as u32)
            .or_default()
            .push(entry.line);
    }

    let end = code.bytecode.len() as u32;
    let mut out = Vec::with_capacity(raw.len() + labels.len() + lines.len());
    for (offset, insn) in raw {
        if labels.contains(&offset) {
            out.push((offset, Insn::Label(Label(offset))));
        }
        if let Some(lines) = lines.get(&offset) {
            out.extend(lines.iter().map(|line| (offset, Insn::Line(*line))));
        }
        out.push((offset, insn));
    }
    if labels.contains(&end) {
        out.push((end, Insn::Label(Label(end))));
    }

    Ok(InsnList::from_insns(out))
}

fn decode_raw(
    bytecode: &[u8],
    cp: &ConstantPool,
    bootstrap_methods: &[BootstrapMethod],
) -> Result<Vec<(u32, Insn)>> {
    use crate::opcodes::*;

    let len = bytecode.len() as i64;
    let mut reader = Reader::new(bytecode);
    let mut out = Vec::new();

    while !reader.is_empty() {
        let offset = reader.position() as u32;
        let target = |delta: i64| -> Result<Label> {
            let abs = offset as i64 + delta;
            if abs < 0 || abs >= len {
                return Err(Error::InvalidBranchTarget {
                    offset,
                    target: abs,
                });
            }
            Ok(Label(abs as u32))
        };

        let opcode = reader.read_u1()?;
        let insn = match opcode {
            NOP..=DCONST_1
            | IALOAD..=SALOAD
            | IASTORE..=LXOR
            | I2L..=DCMPG
            | IRETURN..=RETURN
            | ARRAYLENGTH
            | ATHROW
            | MONITORENTER
            | MONITOREXIT => Insn::Simple(opcode),
            BIPUSH => Insn::Int {
                opcode,
                operand: reader.read_i1()? as i32,
            },
            SIPUSH => Insn::Int {
                opcode,
                operand: reader.read_i2()? as i32,
            },
            NEWARRAY => Insn::Int {
                opcode,
                operand: reader.read_u1()? as i32,
            },
            LDC => Insn::Ldc(cp.get_constant(reader.read_u1()? as u16)?),
            LDC_W | LDC2_W => Insn::Ldc(cp.get_constant(reader.read_u2()?)?),
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var {
                opcode,
                slot: reader.read_u1()? as u16,
            },
            ILOAD_0..=ALOAD_3 => {
                let rel = opcode - ILOAD_0;
                Insn::Var {
                    opcode: ILOAD + rel / 4,
                    slot: (rel % 4) as u16,
                }
            }
            ISTORE_0..=ASTORE_3 => {
                let rel = opcode - ISTORE_0;
                Insn::Var {
                    opcode: ISTORE + rel / 4,
                    slot: (rel % 4) as u16,
                }
            }
            IINC => Insn::Iinc {
                slot: reader.read_u1()? as u16,
                delta: reader.read_i1()? as i16,
            },
            IFEQ..=JSR | IFNULL | IFNONNULL => Insn::Jump {
                opcode,
                target: target(reader.read_i2()? as i64)?,
            },
            GOTO_W => Insn::Jump {
                opcode: GOTO,
                target: target(reader.read_i4()? as i64)?,
            },
            JSR_W => Insn::Jump {
                opcode: JSR,
                target: target(reader.read_i4()? as i64)?,
            },
            TABLESWITCH => {
                skip_switch_padding(&mut reader)?;
                let default = target(reader.read_i4()? as i64)?;
                let low = reader.read_i4()?;
                let high = reader.read_i4()?;
                if high < low {
                    return Err(Error::MalformedAttribute("Code"));
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                let mut targets = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    targets.push(target(reader.read_i4()? as i64)?);
                }
                Insn::TableSwitch {
                    default,
                    low,
                    targets,
                }
            }
            LOOKUPSWITCH => {
                skip_switch_padding(&mut reader)?;
                let default = target(reader.read_i4()? as i64)?;
                let npairs = reader.read_i4()?;
                if npairs < 0 {
                    return Err(Error::MalformedAttribute("Code"));
                }
                let mut pairs = Vec::with_capacity((npairs as usize).min(1024));
                for _ in 0..npairs {
                    let key = reader.read_i4()?;
                    pairs.push((key, target(reader.read_i4()? as i64)?));
                }
                Insn::LookupSwitch { default, pairs }
            }
            GETSTATIC..=PUTFIELD => Insn::Field {
                opcode,
                member: cp.get_member_ref(reader.read_u2()?)?,
            },
            INVOKEVIRTUAL..=INVOKESTATIC => Insn::Method {
                opcode,
                member: cp.get_member_ref(reader.read_u2()?)?,
            },
            INVOKEINTERFACE => {
                let member = cp.get_member_ref(reader.read_u2()?)?;
                reader.skip(2)?; // count, 0
                Insn::Method { opcode, member }
            }
            INVOKEDYNAMIC => {
                let (bsm_index, name, descriptor) = cp.get_invoke_dynamic(reader.read_u2()?)?;
                reader.skip(2)?;
                let bsm = bootstrap_methods
                    .get(bsm_index as usize)
                    .ok_or(Error::InvalidBootstrapMethodIndex(bsm_index))?;
                Insn::InvokeDynamic {
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    bootstrap: bsm.handle.clone(),
                    arguments: bsm.arguments.clone(),
                }
            }
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => Insn::Type {
                opcode,
                class: cp.get_class_name(reader.read_u2()?)?,
            },
            WIDE => {
                let widened = reader.read_u1()?;
                match widened {
                    IINC => Insn::Iinc {
                        slot: reader.read_u2()?,
                        delta: reader.read_i2()?,
                    },
                    ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var {
                        opcode: widened,
                        slot: reader.read_u2()?,
                    },
                    _ => {
                        return Err(Error::InvalidOpcode {
                            offset,
                            opcode: widened,
                        })
                    }
                }
            }
            MULTIANEWARRAY => Insn::MultiANewArray {
                class: cp.get_class_name(reader.read_u2()?)?,
                dims: reader.read_u1()?,
            },
            _ => return Err(Error::InvalidOpcode { offset, opcode }),
        };
        out.push((offset, insn));
    }

    Ok(out)
}

/// `tableswitch`/`lookupswitch` operands start at the next 4-byte aligned code offset.
fn skip_switch_padding(reader: &mut Reader<'_>) -> Result<()> {
    let pad = (4 - reader.position() % 4) % 4;
    reader.skip(pad)
}
