use nova_classfile::opcodes::*;
use nova_classfile::{locate, ClassFile, Constant, Error, Insn, MethodHandle};
use nova_test_utils::ClassWriter;
use pretty_assertions::assert_eq;

fn sample_class() -> Vec<u8> {
    let mut class = ClassWriter::new("com/example/Sample").implements("java/lang/Runnable");
    class.method(ACC_PUBLIC_STATIC, "names", "()Ljava/util/List;", |code| {
        code.line(10)
            .type_insn(NEW, "java/util/ArrayList")
            .insn(DUP)
            .invoke(INVOKESPECIAL, "java/util/ArrayList", "<init>", "()V")
            .var(ASTORE, 0)
            .local(
                0,
                "names",
                "Ljava/util/List;",
                Some("Ljava/util/List<Ljava/lang/String;>;"),
            )
            .line(11)
            .var(ALOAD, 0)
            .insn(ARETURN);
    });
    class.method(ACC_PUBLIC_STATIC, "pick", "(Z)Ljava/lang/Object;", |code| {
        let other = code.new_label();
        code.param(0, "flag", "Z", None)
            .var(ILOAD, 0)
            .jump(IFEQ, other)
            .ldc_string("yes")
            .insn(ARETURN)
            .bind(other)
            .ldc_int(100_000)
            .invoke(
                INVOKESTATIC,
                "java/lang/Integer",
                "valueOf",
                "(I)Ljava/lang/Integer;",
            )
            .insn(ARETURN);
    });
    class.abstract_method("run", "()V");
    class.finish()
}

const ACC_PUBLIC_STATIC: u16 = 0x0009;

fn handle(name: &str, descriptor: &str) -> MethodHandle {
    MethodHandle::new("com.example.Sample", name, descriptor)
}

#[test]
fn parses_header_and_hierarchy() {
    let class = ClassFile::parse(&sample_class()).unwrap();
    assert_eq!(class.this_class, "com/example/Sample");
    assert_eq!(class.binary_name(), "com.example.Sample");
    assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
    assert_eq!(class.interfaces, vec!["java/lang/Runnable".to_string()]);
    assert!(!class.is_interface());
    assert_eq!(class.methods.len(), 3);
}

#[test]
fn locates_method_and_merges_generic_local_signature() {
    let body = locate(&sample_class(), &handle("names", "()Ljava/util/List;"))
        .unwrap()
        .expect("method present");

    let ops: Vec<u8> = body
        .instructions
        .iter()
        .filter_map(|node| node.insn.opcode())
        .collect();
    assert_eq!(ops, vec![NEW, DUP, INVOKESPECIAL, ASTORE, ALOAD, ARETURN]);

    let lines: Vec<u16> = body
        .instructions
        .iter()
        .filter_map(|node| match node.insn {
            Insn::Line(line) => Some(line),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![10, 11]);

    let load_pc = body
        .instructions
        .iter()
        .find(|node| matches!(node.insn, Insn::Var { opcode: ALOAD, .. }))
        .unwrap()
        .offset;
    let local = body.local_variable(0, load_pc).unwrap();
    assert_eq!(local.name, "names");
    assert_eq!(local.descriptor, "Ljava/util/List;");
    assert_eq!(
        local.signature.as_deref(),
        Some("Ljava/util/List<Ljava/lang/String;>;")
    );
}

#[test]
fn decodes_branches_and_constants() {
    let body = locate(&sample_class(), &handle("pick", "(Z)Ljava/lang/Object;"))
        .unwrap()
        .unwrap();

    let returns = body
        .instructions
        .iter()
        .filter(|node| node.insn.opcode() == Some(ARETURN))
        .count();
    assert_eq!(returns, 2);

    let constants: Vec<Constant> = body
        .instructions
        .iter()
        .filter_map(|node| match &node.insn {
            Insn::Ldc(c) => Some(c.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        constants,
        vec![Constant::String("yes".into()), Constant::Int(100_000)]
    );

    let jump_target = body
        .instructions
        .iter()
        .find_map(|node| match node.insn {
            Insn::Jump { target, .. } => Some(target),
            _ => None,
        })
        .unwrap();
    assert!(body
        .instructions
        .iter()
        .any(|node| node.insn == Insn::Label(jump_target)));
}

#[test]
fn backward_walk_mirrors_forward_walk() {
    let body = locate(&sample_class(), &handle("pick", "(Z)Ljava/lang/Object;"))
        .unwrap()
        .unwrap();
    let list = &body.instructions;
    let forward: Vec<_> = list.iter().map(|n| n.id()).collect();
    let mut backward: Vec<_> = list.backward(list.last()).map(|n| n.id()).collect();
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn missing_or_bodiless_methods_are_not_found() {
    let bytes = sample_class();
    assert!(locate(&bytes, &handle("absent", "()V")).unwrap().is_none());
    assert!(locate(&bytes, &handle("run", "()V")).unwrap().is_none());
    // Same name, different descriptor.
    assert!(locate(&bytes, &handle("names", "()Ljava/util/Set;"))
        .unwrap()
        .is_none());
}

#[test]
fn rejects_garbage() {
    let err = ClassFile::parse(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap_err();
    assert!(matches!(err, Error::InvalidMagic(0xDEADBEEF)));

    let bytes = sample_class();
    let err = ClassFile::parse(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEof));
}
