//! Producer classification for value-returning instructions.
//!
//! Every `*return` is traced back to the instruction that pushed the returned value (its
//! producer) by a backward walk that skips markers and configured bridging calls. Producers
//! are classified by an ordered list of rules, the first match contributing a type. The
//! contributions of all return sites are then normalized and unified into one result.

use indexmap::IndexSet;
use nova_classfile::{
    internal_name_to_binary, opcodes, Constant, Insn, InsnId, InsnNode, MethodBody,
};
use nova_types::{TypeHandle, TypeLoader, TypeResolver};
use nova_types_signature::{
    parse_return_type, parse_type, PrimitiveType, SignatureError, TypeDescriptor,
};

use crate::skip::{SkipList, WalkState};

/// `REF_newInvokeSpecial`: a constructor reference (`ArrayList::new`).
const REF_NEW_INVOKE_SPECIAL: u8 = 8;

/// The rule that classified a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    /// Constructor or method call.
    Call,
    LocalLoad,
    /// `invokedynamic` materializing a function object.
    Closure,
    Constant,
    Array,
    Cast,
    Field,
}

impl ProducerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProducerKind::Call => "call",
            ProducerKind::LocalLoad => "local-load",
            ProducerKind::Closure => "closure",
            ProducerKind::Constant => "constant",
            ProducerKind::Array => "array",
            ProducerKind::Cast => "cast",
            ProducerKind::Field => "field",
        }
    }
}

/// Outcome of analyzing one value-returning instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSite {
    pub site: InsnId,
    pub producer: Option<InsnId>,
    /// The rule that matched the producer, if any.
    pub kind: Option<ProducerKind>,
    /// The normalized type this site adds to the candidate set.
    pub contribution: Option<TypeDescriptor>,
}

/// Infers the concrete result type of a compiled method.
///
/// Holds no mutable state; one instance can serve parallel `infer` calls.
#[derive(Debug, Clone)]
pub struct ReturnTypeInference<L> {
    resolver: TypeResolver<L>,
    skip: SkipList,
}

impl<L: TypeLoader> ReturnTypeInference<L> {
    pub fn new(loader: L) -> Self {
        Self::with_skip_list(loader, SkipList::default())
    }

    pub fn with_skip_list(loader: L, skip: SkipList) -> Self {
        Self {
            resolver: TypeResolver::new(loader),
            skip,
        }
    }

    pub fn resolver(&self) -> &TypeResolver<L> {
        &self.resolver
    }

    pub fn skip_list(&self) -> &SkipList {
        &self.skip
    }

    /// The unified type of every value returned by `body`.
    ///
    /// Never fails: methods without value-returning instructions, unrecognized producers and
    /// unloadable types all degrade towards `java.lang.Object`.
    pub fn infer(&self, body: &MethodBody) -> TypeDescriptor {
        let sites = self.return_sites(body);
        if sites.is_empty() {
            tracing::debug!(
                target: "nova.infer",
                method = %body.handle,
                "no value-returning instruction"
            );
            return TypeDescriptor::object();
        }

        let candidates: IndexSet<TypeDescriptor> =
            sites.into_iter().filter_map(|site| site.contribution).collect();
        let inferred = self.unify(candidates);
        tracing::debug!(target: "nova.infer", method = %body.handle, ty = %inferred, "inferred return type");
        inferred
    }

    /// Analyzes every value-returning instruction of `body` in program order.
    pub fn return_sites(&self, body: &MethodBody) -> Vec<ReturnSite> {
        body.instructions
            .iter()
            .filter(|node| node.insn.opcode().is_some_and(opcodes::is_value_return))
            .map(|node| self.analyze_site(body, node))
            .collect()
    }

    fn analyze_site(&self, body: &MethodBody, site: &InsnNode) -> ReturnSite {
        let producer = self.producer(body, site.id());
        let (kind, contribution) = match producer.and_then(|node| classify(body, node)) {
            Some((kind, ty)) => (Some(kind), self.normalize(ty)),
            None => (None, None),
        };
        tracing::debug!(
            target: "nova.infer",
            method = %body.handle,
            return_offset = site.offset,
            producer = ?producer.map(|node| node.insn.to_string()),
            kind = ?kind.map(ProducerKind::as_str),
            ty = ?contribution.as_ref().map(ToString::to_string),
            "classified return site"
        );
        ReturnSite {
            site: site.id(),
            producer: producer.map(InsnNode::id),
            kind,
            contribution,
        }
    }

    /// The instruction whose value the return at `site` hands back.
    ///
    /// Walks backward from the predecessor of `site`, skipping whatever the skip list names.
    pub fn producer<'a>(&self, body: &'a MethodBody, site: InsnId) -> Option<&'a InsnNode> {
        let start = body.instructions.get(site)?.prev();
        let mut state = WalkState::Producer;
        for node in body.instructions.backward(start) {
            let (skipped, next) = self.skip.step(state, &node.insn);
            if !skipped {
                return Some(node);
            }
            state = next;
        }
        None
    }

    fn normalize(&self, ty: TypeDescriptor) -> Option<TypeDescriptor> {
        match self.resolver.resolve_descriptor(&ty) {
            Ok(ty) => Some(ty),
            Err(err) => {
                tracing::warn!(
                    target: "nova.infer",
                    ty = %ty,
                    error = %err,
                    "dropping return-type contribution"
                );
                None
            }
        }
    }

    fn unify(&self, candidates: IndexSet<TypeDescriptor>) -> TypeDescriptor {
        if candidates.len() <= 1 {
            return candidates
                .into_iter()
                .next()
                .unwrap_or_else(TypeDescriptor::object);
        }

        let handles: Vec<TypeHandle> = candidates
            .iter()
            .filter_map(|ty| self.resolver.resolve(&ty.erased_name()).ok())
            .collect();
        self.resolver.common_ancestor(&handles).to_descriptor()
    }
}

/// Applies the producer rules in order; `None` when no rule matches.
fn classify(body: &MethodBody, node: &InsnNode) -> Option<(ProducerKind, TypeDescriptor)> {
    let classified = match &node.insn {
        Insn::Method { opcode, member }
            if *opcode == opcodes::INVOKESPECIAL && member.name == "<init>" =>
        {
            (
                ProducerKind::Call,
                TypeDescriptor::class(internal_name_to_binary(&member.owner)),
            )
        }
        Insn::Method { member, .. } => (
            ProducerKind::Call,
            value_type(parse_return_type(&member.descriptor))?,
        ),
        Insn::Var { opcode, slot } if opcodes::is_load(*opcode) => (
            ProducerKind::LocalLoad,
            local_type(body, *opcode, *slot, node.offset)?,
        ),
        Insn::InvokeDynamic {
            descriptor,
            arguments,
            ..
        } => (ProducerKind::Closure, closure_type(descriptor, arguments)?),
        Insn::Ldc(constant) => (ProducerKind::Constant, constant_type(constant)?),
        Insn::Simple(opcodes::ICONST_M1..=opcodes::ICONST_5)
        | Insn::Int {
            opcode: opcodes::BIPUSH | opcodes::SIPUSH,
            ..
        } => (ProducerKind::Constant, primitive(PrimitiveType::Int)),
        Insn::Simple(opcodes::LCONST_0 | opcodes::LCONST_1) => {
            (ProducerKind::Constant, primitive(PrimitiveType::Long))
        }
        Insn::Simple(opcodes::FCONST_0..=opcodes::FCONST_2) => {
            (ProducerKind::Constant, primitive(PrimitiveType::Float))
        }
        Insn::Simple(opcodes::DCONST_0 | opcodes::DCONST_1) => {
            (ProducerKind::Constant, primitive(PrimitiveType::Double))
        }
        Insn::Simple(opcode) if opcodes::is_array_store(*opcode) => {
            (ProducerKind::Array, stored_array_type(body, node)?)
        }
        Insn::Int {
            opcode: opcodes::NEWARRAY,
            operand,
        } => (ProducerKind::Array, primitive_array(*operand)?),
        Insn::Type {
            opcode: opcodes::ANEWARRAY,
            class,
        } => (
            ProducerKind::Array,
            TypeDescriptor::array(reference_type(class)?, 1),
        ),
        Insn::MultiANewArray { class, .. } => (ProducerKind::Array, value_type(parse_type(class))?),
        Insn::Type {
            opcode: opcodes::CHECKCAST,
            class,
        } => (ProducerKind::Cast, reference_type(class)?),
        Insn::Field {
            opcode: opcodes::GETFIELD | opcodes::GETSTATIC,
            member,
        } => (ProducerKind::Field, value_type(parse_type(&member.descriptor))?),
        _ => return None,
    };
    Some(classified)
}

fn primitive(p: PrimitiveType) -> TypeDescriptor {
    TypeDescriptor::Primitive(p)
}

/// A parsed type that can be a value; `void` and malformed text contribute nothing.
fn value_type(parsed: Result<TypeDescriptor, SignatureError>) -> Option<TypeDescriptor> {
    match parsed {
        Ok(ty) if ty.is_void() => None,
        Ok(ty) => Some(ty),
        Err(err) => {
            tracing::debug!(target: "nova.infer", error = %err, "ignoring malformed descriptor");
            None
        }
    }
}

/// `class` operand of `anewarray`/`checkcast`: an internal name or an array descriptor.
fn reference_type(class: &str) -> Option<TypeDescriptor> {
    if class.starts_with('[') {
        value_type(parse_type(class))
    } else {
        Some(TypeDescriptor::class(internal_name_to_binary(class)))
    }
}

fn primitive_array(element_code: i32) -> Option<TypeDescriptor> {
    let element = PrimitiveType::from_newarray_code(u8::try_from(element_code).ok()?)?;
    Some(TypeDescriptor::array(primitive(element), 1))
}

fn local_type(body: &MethodBody, opcode: u8, slot: u16, pc: u32) -> Option<TypeDescriptor> {
    let Some(var) = body.local_variable(slot, pc) else {
        // Without debug info the load opcode still pins primitive types.
        return match opcode {
            opcodes::ILOAD => Some(primitive(PrimitiveType::Int)),
            opcodes::LLOAD => Some(primitive(PrimitiveType::Long)),
            opcodes::FLOAD => Some(primitive(PrimitiveType::Float)),
            opcodes::DLOAD => Some(primitive(PrimitiveType::Double)),
            _ => None,
        };
    };

    if let Some(signature) = &var.signature {
        match parse_type(signature) {
            Ok(ty) => return Some(ty),
            Err(err) => tracing::debug!(
                target: "nova.infer",
                local = %var.name,
                error = %err,
                "falling back to the local's descriptor"
            ),
        }
    }
    value_type(parse_type(&var.descriptor))
}

/// The function-object type built by an `invokedynamic` site.
///
/// The call-site return type is refined with the implementation's produced type as its single
/// type argument when the first method-handle bootstrap argument names a reference type other
/// than `java.lang.Object`.
fn closure_type(descriptor: &str, arguments: &[Constant]) -> Option<TypeDescriptor> {
    let declared = value_type(parse_return_type(descriptor))?;
    let TypeDescriptor::Class { name, .. } = &declared else {
        return Some(declared);
    };

    let produced = arguments
        .iter()
        .find_map(|arg| match arg {
            Constant::MethodHandle(handle) => Some(handle),
            _ => None,
        })
        .and_then(|handle| {
            if handle.kind == REF_NEW_INVOKE_SPECIAL {
                Some(TypeDescriptor::class(internal_name_to_binary(
                    &handle.member.owner,
                )))
            } else {
                parse_return_type(&handle.member.descriptor).ok()
            }
        });

    match produced {
        Some(arg @ (TypeDescriptor::Class { .. } | TypeDescriptor::Array { .. }))
            if !arg.is_object() =>
        {
            Some(TypeDescriptor::parameterized(name.clone(), vec![arg]))
        }
        _ => Some(declared),
    }
}

fn constant_type(constant: &Constant) -> Option<TypeDescriptor> {
    Some(match constant {
        Constant::Int(_) => primitive(PrimitiveType::Int),
        Constant::Float(_) => primitive(PrimitiveType::Float),
        Constant::Long(_) => primitive(PrimitiveType::Long),
        Constant::Double(_) => primitive(PrimitiveType::Double),
        Constant::String(_) => TypeDescriptor::class(nova_types_signature::STRING),
        // A class literal stands for the type it names.
        Constant::Class(class) => return reference_type(class),
        Constant::MethodType(_) => TypeDescriptor::class("java.lang.invoke.MethodType"),
        Constant::MethodHandle(_) => TypeDescriptor::class("java.lang.invoke.MethodHandle"),
        Constant::Dynamic { descriptor, .. } => return value_type(parse_type(descriptor)),
    })
}

/// Element type of the array most recently allocated before the store at `node`.
fn stored_array_type(body: &MethodBody, node: &InsnNode) -> Option<TypeDescriptor> {
    body.instructions
        .backward(node.prev())
        .find_map(|prev| match &prev.insn {
            Insn::Int {
                opcode: opcodes::NEWARRAY,
                operand,
            } => Some(primitive_array(*operand)),
            Insn::Type {
                opcode: opcodes::ANEWARRAY,
                class,
            } => Some(reference_type(class).map(|component| TypeDescriptor::array(component, 1))),
            Insn::MultiANewArray { class, .. } => Some(value_type(parse_type(class))),
            _ => None,
        })
        .flatten()
}

#[cfg(test)]
mod tests {
    use nova_classfile::{InsnList, Label, LocalVariable, MemberRef, MethodHandle, MethodHandleRef};
    use nova_types::{ChainTypeLoader, MinimalJdk, TypeInfo, TypeLoadError};
    use pretty_assertions::assert_eq;

    use super::*;

    struct Fixtures;

    impl TypeLoader for Fixtures {
        fn load_type(&self, name: &str) -> Result<TypeInfo, TypeLoadError> {
            match name {
                "com.example.Foo" => Ok(TypeInfo::class(name, None, &[])),
                "com.example.Names" => Ok(TypeInfo::class(name, Some("java.util.ArrayList"), &[])),
                _ => Err(TypeLoadError::NotFound(name.to_string())),
            }
        }
    }

    fn engine() -> ReturnTypeInference<ChainTypeLoader<'static>> {
        ReturnTypeInference::new(ChainTypeLoader::new(vec![
            Box::new(Fixtures),
            Box::new(MinimalJdk::new()),
        ]))
    }

    fn body(insns: Vec<Insn>) -> MethodBody {
        body_with_locals(insns, Vec::new())
    }

    fn body_with_locals(insns: Vec<Insn>, locals: Vec<LocalVariable>) -> MethodBody {
        MethodBody::new(
            MethodHandle::new("com.example.Routes", "lambda$0", "()Ljava/lang/Object;"),
            InsnList::from_insns(insns.into_iter().enumerate().map(|(i, insn)| (i as u32, insn))),
            locals,
        )
    }

    fn call(opcode: u8, owner: &str, name: &str, descriptor: &str) -> Insn {
        Insn::Method {
            opcode,
            member: MemberRef {
                owner: owner.to_string(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                interface: false,
            },
        }
    }

    fn ctor(owner: &str) -> Vec<Insn> {
        vec![
            Insn::Type {
                opcode: opcodes::NEW,
                class: owner.to_string(),
            },
            Insn::Simple(opcodes::DUP),
            call(opcodes::INVOKESPECIAL, owner, "<init>", "()V"),
        ]
    }

    fn returning(mut insns: Vec<Insn>) -> MethodBody {
        insns.push(Insn::Simple(opcodes::ARETURN));
        body(insns)
    }

    #[test]
    fn no_value_return_is_object() {
        let b = body(vec![Insn::Simple(opcodes::RETURN)]);
        assert_eq!(engine().infer(&b), TypeDescriptor::object());
        assert!(engine().return_sites(&b).is_empty());
    }

    #[test]
    fn constructor_call_yields_owner() {
        let b = returning(ctor("com/example/Foo"));
        assert_eq!(engine().infer(&b), TypeDescriptor::class("com.example.Foo"));

        let sites = engine().return_sites(&b);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].kind, Some(ProducerKind::Call));
    }

    #[test]
    fn method_call_yields_declared_return() {
        let b = returning(vec![call(
            opcodes::INVOKESTATIC,
            "java/util/Optional",
            "empty",
            "()Ljava/util/Optional;",
        )]);
        assert_eq!(engine().infer(&b), TypeDescriptor::class("java.util.Optional"));
    }

    #[test]
    fn list_implementations_collapse() {
        let b = returning(ctor("com/example/Names"));
        assert_eq!(engine().infer(&b), TypeDescriptor::class("java.util.List"));
    }

    #[test]
    fn unrecognized_producer_is_object() {
        let b = body(vec![
            Insn::Simple(opcodes::ICONST_1),
            Insn::Simple(opcodes::ICONST_2),
            Insn::Simple(opcodes::IXOR),
            Insn::Simple(opcodes::IRETURN),
        ]);
        assert_eq!(engine().infer(&b), TypeDescriptor::object());
        let sites = engine().return_sites(&b);
        assert_eq!(sites[0].kind, None);
        assert_eq!(sites[0].contribution, None);
    }

    #[test]
    fn markers_are_skipped() {
        let mut insns = vec![Insn::Ldc(Constant::String("ok".into()))];
        insns.push(Insn::Label(Label(3)));
        insns.push(Insn::Line(12));
        let b = returning(insns);
        assert_eq!(engine().infer(&b), TypeDescriptor::class("java.lang.String"));
    }

    #[test]
    fn kotlin_null_check_idiom_is_skipped() {
        let b = returning(vec![
            call(
                opcodes::INVOKESTATIC,
                "com/example/Repo",
                "find",
                "()Lcom/example/Foo;",
            ),
            Insn::Simple(opcodes::DUP),
            Insn::Ldc(Constant::String("find()".into())),
            call(
                opcodes::INVOKESTATIC,
                "kotlin/jvm/internal/Intrinsics",
                "checkNotNullExpressionValue",
                "(Ljava/lang/Object;Ljava/lang/String;)V",
            ),
        ]);
        assert_eq!(engine().infer(&b), TypeDescriptor::class("com.example.Foo"));

        // Without the idiom the string literal becomes the producer.
        let plain = ReturnTypeInference::with_skip_list(
            ChainTypeLoader::new(vec![Box::new(Fixtures), Box::new(MinimalJdk::new())]),
            SkipList::new(SkipList::default().bridge_calls().to_vec(), false),
        );
        assert_eq!(plain.infer(&b), TypeDescriptor::class("java.lang.String"));
    }

    #[test]
    fn local_signature_wins_over_descriptor() {
        let b = body_with_locals(
            vec![
                Insn::Var {
                    opcode: opcodes::ALOAD,
                    slot: 1,
                },
                Insn::Simple(opcodes::ARETURN),
            ],
            vec![LocalVariable {
                slot: 1,
                name: "foos".into(),
                descriptor: "Ljava/util/List;".into(),
                signature: Some("Ljava/util/List<Lcom/example/Foo;>;".into()),
                start_pc: 0,
                length: 2,
            }],
        );
        assert_eq!(
            engine().infer(&b),
            TypeDescriptor::parameterized(
                "java.util.List",
                vec![TypeDescriptor::class("com.example.Foo")]
            )
        );
    }

    #[test]
    fn reused_slot_outside_its_debug_range_has_no_type() {
        let astore = |slot| Insn::Var {
            opcode: opcodes::ASTORE,
            slot,
        };
        let aload = |slot| Insn::Var {
            opcode: opcodes::ALOAD,
            slot,
        };
        // `s` is live in [3, 5); the later temporary in slot 0 has no entry.
        let b = MethodBody::new(
            MethodHandle::new("com.example.Routes", "m", "()Ljava/lang/Object;"),
            InsnList::from_insns([
                (0, Insn::Ldc(Constant::String("x".into()))),
                (2, astore(0)),
                (3, aload(0)),
                (4, Insn::Simple(opcodes::POP)),
                (5, call(opcodes::INVOKESTATIC, "com/example/Repo", "find", "()Ljava/lang/Object;")),
                (20, astore(0)),
                (30, aload(0)),
                (31, Insn::Simple(opcodes::ARETURN)),
            ]),
            vec![LocalVariable {
                slot: 0,
                name: "s".into(),
                descriptor: "Ljava/lang/String;".into(),
                signature: None,
                start_pc: 3,
                length: 2,
            }],
        );
        assert_eq!(engine().infer(&b), TypeDescriptor::object());

        let sites = engine().return_sites(&b);
        assert_eq!(sites[0].kind, None);
        assert_eq!(sites[0].contribution, None);
    }

    #[test]
    fn primitive_loads_without_debug_info() {
        let b = body(vec![
            Insn::Var {
                opcode: opcodes::LLOAD,
                slot: 0,
            },
            Insn::Simple(opcodes::LRETURN),
        ]);
        assert_eq!(engine().infer(&b), primitive(PrimitiveType::Long));

        let b = returning(vec![Insn::Var {
            opcode: opcodes::ALOAD,
            slot: 0,
        }]);
        assert_eq!(engine().infer(&b), TypeDescriptor::object());
    }

    #[test]
    fn lambda_sites_are_parameterized_by_the_implementation() {
        let lambda = Insn::InvokeDynamic {
            name: "get".into(),
            descriptor: "()Ljava/util/function/Supplier;".into(),
            bootstrap: MethodHandleRef {
                kind: 6,
                member: MemberRef {
                    owner: "java/lang/invoke/LambdaMetafactory".into(),
                    name: "metafactory".into(),
                    descriptor: "()V".into(),
                    interface: false,
                },
            },
            arguments: vec![
                Constant::MethodType("()Ljava/lang/Object;".into()),
                Constant::MethodHandle(MethodHandleRef {
                    kind: 6,
                    member: MemberRef {
                        owner: "com/example/Routes".into(),
                        name: "lambda$1".into(),
                        descriptor: "()Lcom/example/Foo;".into(),
                        interface: false,
                    },
                }),
                Constant::MethodType("()Lcom/example/Foo;".into()),
            ],
        };
        let b = returning(vec![lambda.clone()]);
        assert_eq!(
            engine().infer(&b),
            TypeDescriptor::parameterized(
                "java.util.function.Supplier",
                vec![TypeDescriptor::class("com.example.Foo")]
            )
        );

        // Object-producing implementations keep the raw functional interface.
        let Insn::InvokeDynamic {
            name,
            descriptor,
            bootstrap,
            mut arguments,
        } = lambda
        else {
            unreachable!()
        };
        if let Constant::MethodHandle(handle) = &mut arguments[1] {
            handle.member.descriptor = "()Ljava/lang/Object;".into();
        }
        let b = returning(vec![Insn::InvokeDynamic {
            name,
            descriptor,
            bootstrap,
            arguments,
        }]);
        assert_eq!(
            engine().infer(&b),
            TypeDescriptor::class("java.util.function.Supplier")
        );
    }

    #[test]
    fn constants() {
        let cases = [
            (Insn::Ldc(Constant::Int(7)), opcodes::IRETURN, primitive(PrimitiveType::Int)),
            (Insn::Ldc(Constant::Double(1.5)), opcodes::DRETURN, primitive(PrimitiveType::Double)),
            (Insn::Simple(opcodes::LCONST_1), opcodes::LRETURN, primitive(PrimitiveType::Long)),
            (Insn::Simple(opcodes::FCONST_2), opcodes::FRETURN, primitive(PrimitiveType::Float)),
            (
                Insn::Int {
                    opcode: opcodes::SIPUSH,
                    operand: 300,
                },
                opcodes::IRETURN,
                primitive(PrimitiveType::Int),
            ),
            (
                Insn::Ldc(Constant::Class("com/example/Foo".into())),
                opcodes::ARETURN,
                TypeDescriptor::class("com.example.Foo"),
            ),
            (
                Insn::Ldc(Constant::MethodType("()V".into())),
                opcodes::ARETURN,
                TypeDescriptor::class("java.lang.invoke.MethodType"),
            ),
        ];
        for (producer, ret, expected) in cases {
            let b = body(vec![producer, Insn::Simple(ret)]);
            assert_eq!(engine().infer(&b), expected);
        }
    }

    #[test]
    fn array_producers() {
        let filled = returning(vec![
            Insn::Simple(opcodes::ICONST_1),
            Insn::Type {
                opcode: opcodes::ANEWARRAY,
                class: "java/lang/String".into(),
            },
            Insn::Simple(opcodes::DUP),
            Insn::Simple(opcodes::ICONST_0),
            Insn::Ldc(Constant::String("a".into())),
            Insn::Simple(opcodes::AASTORE),
        ]);
        assert_eq!(
            engine().infer(&filled),
            TypeDescriptor::array(TypeDescriptor::class("java.lang.String"), 1)
        );

        let ints = returning(vec![
            Insn::Simple(opcodes::ICONST_2),
            Insn::Int {
                opcode: opcodes::NEWARRAY,
                operand: i32::from(opcodes::T_INT),
            },
        ]);
        assert_eq!(
            engine().infer(&ints),
            TypeDescriptor::array(primitive(PrimitiveType::Int), 1)
        );

        let grid = returning(vec![Insn::MultiANewArray {
            class: "[[J".into(),
            dims: 2,
        }]);
        assert_eq!(
            engine().infer(&grid),
            TypeDescriptor::array(primitive(PrimitiveType::Long), 2)
        );
    }

    #[test]
    fn casts_and_fields() {
        let cast = returning(vec![
            Insn::Var {
                opcode: opcodes::ALOAD,
                slot: 0,
            },
            Insn::Type {
                opcode: opcodes::CHECKCAST,
                class: "java/lang/Integer".into(),
            },
        ]);
        assert_eq!(engine().infer(&cast), TypeDescriptor::class("java.lang.Integer"));

        let field = returning(vec![Insn::Field {
            opcode: opcodes::GETSTATIC,
            member: MemberRef {
                owner: "com/example/Routes".into(),
                name: "NAMES".into(),
                descriptor: "Ljava/util/HashSet;".into(),
                interface: false,
            },
        }]);
        assert_eq!(engine().infer(&field), TypeDescriptor::class("java.util.Set"));
    }

    #[test]
    fn unloadable_contributions_are_dropped() {
        let b = returning(ctor("com/example/Unknown"));
        assert_eq!(engine().infer(&b), TypeDescriptor::object());
        let sites = engine().return_sites(&b);
        assert_eq!(sites[0].kind, Some(ProducerKind::Call));
        assert_eq!(sites[0].contribution, None);
    }

    #[test]
    fn multiple_sites_unify() {
        let mut insns = ctor("java/util/ArrayList");
        insns.push(Insn::Simple(opcodes::ARETURN));
        insns.extend(ctor("java/util/LinkedList"));
        insns.push(Insn::Simple(opcodes::ARETURN));
        assert_eq!(engine().infer(&body(insns)), TypeDescriptor::class("java.util.List"));

        let mut insns = vec![
            call(
                opcodes::INVOKESTATIC,
                "java/lang/Integer",
                "valueOf",
                "(I)Ljava/lang/Integer;",
            ),
            Insn::Simple(opcodes::ARETURN),
        ];
        insns.push(call(
            opcodes::INVOKESTATIC,
            "java/lang/Long",
            "valueOf",
            "(J)Ljava/lang/Long;",
        ));
        insns.push(Insn::Simple(opcodes::ARETURN));
        // Integer's closure reaches Comparable before its superclass Number.
        assert_eq!(engine().infer(&body(insns)), TypeDescriptor::class("java.lang.Comparable"));
    }

    #[test]
    fn void_calls_contribute_nothing() {
        let b = returning(vec![call(opcodes::INVOKESTATIC, "com/example/Foo", "log", "()V")]);
        assert_eq!(engine().infer(&b), TypeDescriptor::object());
    }
}
