//! A tiny class-file assembler for bytecode fixtures.
//!
//! Produces structurally valid class files (constant pool, methods with `Code`,
//! `LineNumberTable`, `LocalVariableTable`/`LocalVariableTypeTable`, `BootstrapMethods`)
//! without a JDK. It does not compute stack map frames or verify stack heights; fixtures are
//! only ever decoded, never executed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;

const LDC: u8 = 18;
const LDC_W: u8 = 19;
const LDC2_W: u8 = 20;
const WIDE: u8 = 196;
const INVOKEINTERFACE: u8 = 185;
const INVOKEDYNAMIC: u8 = 186;
const GOTO: u8 = 167;
const IFNULL: u8 = 198;
const IFNONNULL: u8 = 199;

/// `REF_invokeStatic`, used for the `LambdaMetafactory` bootstrap handle.
pub const REF_INVOKE_STATIC: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    InvokeDynamic(u16, u16),
}

#[derive(Debug, Default)]
struct Pool {
    entries: Vec<PoolEntry>,
    indices: HashMap<PoolEntry, u16>,
    next: u16,
}

impl Pool {
    fn add(&mut self, entry: PoolEntry) -> u16 {
        if let Some(index) = self.indices.get(&entry) {
            return *index;
        }
        if self.next == 0 {
            self.next = 1;
        }
        let index = self.next;
        self.next += if matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_)) {
            2
        } else {
            1
        };
        self.indices.insert(entry.clone(), index);
        self.entries.push(entry);
        index
    }

    fn utf8(&mut self, s: &str) -> u16 {
        self.add(PoolEntry::Utf8(s.to_string()))
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.add(PoolEntry::Class(name))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.add(PoolEntry::NameAndType(name, descriptor))
    }

    fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str, interface: bool) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        if interface {
            self.add(PoolEntry::InterfaceMethodRef(class, nat))
        } else {
            self.add(PoolEntry::MethodRef(class, nat))
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.next.max(1));
        for entry in &self.entries {
            match entry {
                PoolEntry::Utf8(s) => {
                    out.push(1);
                    put_u2(out, s.len() as u16);
                    out.extend_from_slice(s.as_bytes());
                }
                PoolEntry::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolEntry::Float(bits) => {
                    out.push(4);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                PoolEntry::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolEntry::Double(bits) => {
                    out.push(6);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                PoolEntry::Class(name) => {
                    out.push(7);
                    put_u2(out, *name);
                }
                PoolEntry::String(utf8) => {
                    out.push(8);
                    put_u2(out, *utf8);
                }
                PoolEntry::FieldRef(class, nat) => {
                    out.push(9);
                    put_u2(out, *class);
                    put_u2(out, *nat);
                }
                PoolEntry::MethodRef(class, nat) => {
                    out.push(10);
                    put_u2(out, *class);
                    put_u2(out, *nat);
                }
                PoolEntry::InterfaceMethodRef(class, nat) => {
                    out.push(11);
                    put_u2(out, *class);
                    put_u2(out, *nat);
                }
                PoolEntry::NameAndType(name, descriptor) => {
                    out.push(12);
                    put_u2(out, *name);
                    put_u2(out, *descriptor);
                }
                PoolEntry::MethodHandle(kind, reference) => {
                    out.push(15);
                    out.push(*kind);
                    put_u2(out, *reference);
                }
                PoolEntry::MethodType(descriptor) => {
                    out.push(16);
                    put_u2(out, *descriptor);
                }
                PoolEntry::InvokeDynamic(bootstrap, nat) => {
                    out.push(18);
                    put_u2(out, *bootstrap);
                    put_u2(out, *nat);
                }
            }
        }
    }
}

fn put_u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Assembles one class file.
///
/// ```
/// use nova_test_utils::classwriter::ClassWriter;
///
/// let mut class = ClassWriter::new("com/example/App");
/// class.method(0x0009, "answer", "()Ljava/lang/Object;", |code| {
///     code.ldc_string("42");
///     code.insn(176); // areturn
/// });
/// let bytes = class.finish();
/// assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
/// ```
#[derive(Debug)]
pub struct ClassWriter {
    pool: Pool,
    name: String,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    methods: Vec<Vec<u8>>,
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
}

impl ClassWriter {
    /// A public class extending `java/lang/Object`.
    pub fn new(internal_name: &str) -> Self {
        let mut pool = Pool::default();
        let this_class = pool.class(internal_name);
        let super_class = pool.class("java/lang/Object");
        Self {
            pool,
            name: internal_name.to_string(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
        }
    }

    /// A public interface.
    pub fn interface(internal_name: &str) -> Self {
        let mut writer = Self::new(internal_name);
        writer.access_flags = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
        writer
    }

    pub fn internal_name(&self) -> &str {
        &self.name
    }

    pub fn extends(mut self, internal_name: &str) -> Self {
        self.super_class = self.pool.class(internal_name);
        self
    }

    pub fn implements(mut self, internal_name: &str) -> Self {
        let index = self.pool.class(internal_name);
        self.interfaces.push(index);
        self
    }

    /// Declares a method without a `Code` attribute.
    pub fn abstract_method(&mut self, name: &str, descriptor: &str) {
        let mut out = Vec::new();
        put_u2(&mut out, ACC_PUBLIC | ACC_ABSTRACT);
        put_u2(&mut out, self.pool.utf8(name));
        put_u2(&mut out, self.pool.utf8(descriptor));
        put_u2(&mut out, 0);
        self.methods.push(out);
    }

    /// Declares a method whose body is emitted by `body`.
    pub fn method(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        body: impl FnOnce(&mut CodeBuilder<'_>),
    ) {
        let name_index = self.pool.utf8(name);
        let descriptor_index = self.pool.utf8(descriptor);

        let mut code = CodeBuilder {
            pool: &mut self.pool,
            bootstrap_methods: &mut self.bootstrap_methods,
            bytes: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            lines: Vec::new(),
            locals: Vec::new(),
        };
        body(&mut code);
        let code_attr = code.finish();

        let mut out = Vec::new();
        put_u2(&mut out, access_flags);
        put_u2(&mut out, name_index);
        put_u2(&mut out, descriptor_index);
        put_u2(&mut out, 1);
        put_u2(&mut out, self.pool.utf8("Code"));
        put_u4(&mut out, code_attr.len() as u32);
        out.extend_from_slice(&code_attr);
        self.methods.push(out);
    }

    pub fn finish(mut self) -> Vec<u8> {
        let mut attributes = Vec::new();
        let mut attribute_count = 0u16;
        if !self.bootstrap_methods.is_empty() {
            let mut payload = Vec::new();
            put_u2(&mut payload, self.bootstrap_methods.len() as u16);
            for (handle, args) in &self.bootstrap_methods {
                put_u2(&mut payload, *handle);
                put_u2(&mut payload, args.len() as u16);
                for arg in args {
                    put_u2(&mut payload, *arg);
                }
            }
            put_u2(&mut attributes, self.pool.utf8("BootstrapMethods"));
            put_u4(&mut attributes, payload.len() as u32);
            attributes.extend_from_slice(&payload);
            attribute_count += 1;
        }

        let mut out = Vec::new();
        put_u4(&mut out, 0xCAFEBABE);
        put_u2(&mut out, 0);
        put_u2(&mut out, 52);
        self.pool.write(&mut out);
        put_u2(&mut out, self.access_flags);
        put_u2(&mut out, self.this_class);
        put_u2(&mut out, self.super_class);
        put_u2(&mut out, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u2(&mut out, *interface);
        }
        put_u2(&mut out, 0); // fields
        put_u2(&mut out, self.methods.len() as u16);
        for method in &self.methods {
            out.extend_from_slice(method);
        }
        put_u2(&mut out, attribute_count);
        out.extend_from_slice(&attributes);
        out
    }

    /// Writes the class below `root` following the package directory layout and returns the
    /// file path.
    pub fn write_to_dir(self, root: &Path) -> std::io::Result<PathBuf> {
        let path = root.join(format!("{}.class", self.name));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.finish())?;
        Ok(path)
    }
}

/// Forward-referencable branch target inside a [`CodeBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLabel(usize);

struct LocalEntry {
    slot: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    start: Option<u16>,
}

/// Emits the bytecode of a single method.
pub struct CodeBuilder<'a> {
    pool: &'a mut Pool,
    bootstrap_methods: &'a mut Vec<(u16, Vec<u16>)>,
    bytes: Vec<u8>,
    labels: Vec<Option<u16>>,
    fixups: Vec<(usize, u16, CodeLabel)>,
    lines: Vec<(u16, u16)>,
    locals: Vec<LocalEntry>,
}

impl CodeBuilder<'_> {
    /// Current bytecode offset.
    pub fn offset(&self) -> u16 {
        self.bytes.len() as u16
    }

    /// Any instruction without operands.
    pub fn insn(&mut self, opcode: u8) -> &mut Self {
        self.bytes.push(opcode);
        self
    }

    /// `bipush`, `sipush` (two-byte operand when `opcode` is 17) and `newarray`.
    pub fn int_insn(&mut self, opcode: u8, operand: i32) -> &mut Self {
        self.bytes.push(opcode);
        if opcode == 17 {
            self.bytes.extend_from_slice(&(operand as i16).to_be_bytes());
        } else {
            self.bytes.push(operand as u8);
        }
        self
    }

    /// Generic load/store (`iload` ..= `astore`); widened automatically above slot 255.
    pub fn var(&mut self, opcode: u8, slot: u16) -> &mut Self {
        if slot > 255 {
            self.bytes.push(WIDE);
            self.bytes.push(opcode);
            self.bytes.extend_from_slice(&slot.to_be_bytes());
        } else {
            self.bytes.push(opcode);
            self.bytes.push(slot as u8);
        }
        self
    }

    /// `new`, `anewarray`, `checkcast`, `instanceof`.
    pub fn type_insn(&mut self, opcode: u8, internal_name: &str) -> &mut Self {
        let index = self.pool.class(internal_name);
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self
    }

    pub fn multianewarray(&mut self, descriptor: &str, dims: u8) -> &mut Self {
        let index = self.pool.class(descriptor);
        self.bytes.push(197);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self.bytes.push(dims);
        self
    }

    pub fn field(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        let class = self.pool.class(owner);
        let nat = self.pool.name_and_type(name, descriptor);
        let index = self.pool.add(PoolEntry::FieldRef(class, nat));
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self
    }

    /// `invokevirtual`, `invokespecial`, `invokestatic` or `invokeinterface`.
    pub fn invoke(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        let interface = opcode == INVOKEINTERFACE;
        let index = self.pool.method_ref(owner, name, descriptor, interface);
        self.bytes.push(opcode);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        if interface {
            self.bytes.push(1);
            self.bytes.push(0);
        }
        self
    }

    pub fn ldc_string(&mut self, value: &str) -> &mut Self {
        let utf8 = self.pool.utf8(value);
        let index = self.pool.add(PoolEntry::String(utf8));
        self.ldc_index(index)
    }

    pub fn ldc_int(&mut self, value: i32) -> &mut Self {
        let index = self.pool.add(PoolEntry::Integer(value));
        self.ldc_index(index)
    }

    pub fn ldc_float(&mut self, value: f32) -> &mut Self {
        let index = self.pool.add(PoolEntry::Float(value.to_bits()));
        self.ldc_index(index)
    }

    pub fn ldc_long(&mut self, value: i64) -> &mut Self {
        let index = self.pool.add(PoolEntry::Long(value));
        self.bytes.push(LDC2_W);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self
    }

    pub fn ldc_double(&mut self, value: f64) -> &mut Self {
        let index = self.pool.add(PoolEntry::Double(value.to_bits()));
        self.bytes.push(LDC2_W);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self
    }

    /// Class literal (`Foo.class`); `internal_name` may also be an array descriptor.
    pub fn ldc_class(&mut self, internal_name: &str) -> &mut Self {
        let index = self.pool.class(internal_name);
        self.ldc_index(index)
    }

    pub fn ldc_method_type(&mut self, descriptor: &str) -> &mut Self {
        let utf8 = self.pool.utf8(descriptor);
        let index = self.pool.add(PoolEntry::MethodType(utf8));
        self.ldc_index(index)
    }

    fn ldc_index(&mut self, index: u16) -> &mut Self {
        if index > 255 {
            self.bytes.push(LDC_W);
            self.bytes.extend_from_slice(&index.to_be_bytes());
        } else {
            self.bytes.push(LDC);
            self.bytes.push(index as u8);
        }
        self
    }

    /// `invokedynamic` through `LambdaMetafactory.metafactory`, as javac emits for lambdas.
    ///
    /// `implementation` is `(owner, name, descriptor)` of the synthetic lambda body.
    pub fn invokedynamic_lambda(
        &mut self,
        name: &str,
        descriptor: &str,
        sam_descriptor: &str,
        implementation: (&str, &str, &str),
        instantiated_descriptor: &str,
    ) -> &mut Self {
        let bootstrap = self.pool.method_ref(
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;",
            false,
        );
        let bootstrap = self
            .pool
            .add(PoolEntry::MethodHandle(REF_INVOKE_STATIC, bootstrap));

        let sam_utf8 = self.pool.utf8(sam_descriptor);
        let sam = self.pool.add(PoolEntry::MethodType(sam_utf8));
        let (owner, impl_name, impl_descriptor) = implementation;
        let implementation = self.pool.method_ref(owner, impl_name, impl_descriptor, false);
        let implementation = self
            .pool
            .add(PoolEntry::MethodHandle(REF_INVOKE_STATIC, implementation));
        let instantiated_utf8 = self.pool.utf8(instantiated_descriptor);
        let instantiated = self.pool.add(PoolEntry::MethodType(instantiated_utf8));

        self.invokedynamic_raw(name, descriptor, bootstrap, vec![sam, implementation, instantiated])
    }

    /// `invokedynamic` through `StringConcatFactory.makeConcatWithConstants`.
    pub fn invokedynamic_concat(&mut self, descriptor: &str, recipe: &str) -> &mut Self {
        let bootstrap = self.pool.method_ref(
            "java/lang/invoke/StringConcatFactory",
            "makeConcatWithConstants",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
            false,
        );
        let bootstrap = self
            .pool
            .add(PoolEntry::MethodHandle(REF_INVOKE_STATIC, bootstrap));
        let recipe_utf8 = self.pool.utf8(recipe);
        let recipe = self.pool.add(PoolEntry::String(recipe_utf8));
        self.invokedynamic_raw("makeConcatWithConstants", descriptor, bootstrap, vec![recipe])
    }

    fn invokedynamic_raw(
        &mut self,
        name: &str,
        descriptor: &str,
        bootstrap_handle: u16,
        args: Vec<u16>,
    ) -> &mut Self {
        let bsm_index = self.bootstrap_methods.len() as u16;
        self.bootstrap_methods.push((bootstrap_handle, args));
        let nat = self.pool.name_and_type(name, descriptor);
        let index = self.pool.add(PoolEntry::InvokeDynamic(bsm_index, nat));
        self.bytes.push(INVOKEDYNAMIC);
        self.bytes.extend_from_slice(&index.to_be_bytes());
        self.bytes.extend_from_slice(&[0, 0]);
        self
    }

    pub fn new_label(&mut self) -> CodeLabel {
        self.labels.push(None);
        CodeLabel(self.labels.len() - 1)
    }

    /// Binds `label` to the current offset.
    pub fn bind(&mut self, label: CodeLabel) -> &mut Self {
        self.labels[label.0] = Some(self.offset());
        self
    }

    /// Conditional branch or `goto` to `label` (2-byte offset form).
    pub fn jump(&mut self, opcode: u8, label: CodeLabel) -> &mut Self {
        debug_assert!((153..=GOTO).contains(&opcode) || opcode == IFNULL || opcode == IFNONNULL);
        let at = self.offset();
        self.bytes.push(opcode);
        self.fixups.push((self.bytes.len(), at, label));
        self.bytes.extend_from_slice(&[0, 0]);
        self
    }

    /// Records a `LineNumberTable` entry at the current offset.
    pub fn line(&mut self, line: u16) -> &mut Self {
        self.lines.push((self.offset(), line));
        self
    }

    /// Declares a local variable live from the current offset to the end of the method.
    pub fn local(
        &mut self,
        slot: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
    ) -> &mut Self {
        let start = Some(self.offset());
        self.push_local(slot, name, descriptor, signature, start)
    }

    /// Declares a local variable live for the whole method (parameters, `this`).
    pub fn param(
        &mut self,
        slot: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
    ) -> &mut Self {
        self.push_local(slot, name, descriptor, signature, None)
    }

    fn push_local(
        &mut self,
        slot: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        start: Option<u16>,
    ) -> &mut Self {
        self.locals.push(LocalEntry {
            slot,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: signature.map(str::to_string),
            start,
        });
        self
    }

    fn finish(mut self) -> Vec<u8> {
        for (pos, at, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0].expect("label bound before finish");
            let delta = (target as i32 - at as i32) as i16;
            self.bytes[pos..pos + 2].copy_from_slice(&delta.to_be_bytes());
        }

        let code_len = self.bytes.len() as u16;
        let mut attrs = Vec::new();
        let mut attr_count = 0u16;

        if !self.lines.is_empty() {
            let mut payload = Vec::new();
            put_u2(&mut payload, self.lines.len() as u16);
            for (pc, line) in &self.lines {
                put_u2(&mut payload, *pc);
                put_u2(&mut payload, *line);
            }
            put_u2(&mut attrs, self.pool.utf8("LineNumberTable"));
            put_u4(&mut attrs, payload.len() as u32);
            attrs.extend_from_slice(&payload);
            attr_count += 1;
        }

        if !self.locals.is_empty() {
            let tables = [
                ("LocalVariableTable", false),
                ("LocalVariableTypeTable", true),
            ];
            for (table, typed) in tables {
                let entries: Vec<&LocalEntry> = self
                    .locals
                    .iter()
                    .filter(|l| !typed || l.signature.is_some())
                    .collect();
                if entries.is_empty() {
                    continue;
                }
                let mut payload = Vec::new();
                put_u2(&mut payload, entries.len() as u16);
                for local in entries {
                    let start = local.start.unwrap_or(0);
                    put_u2(&mut payload, start);
                    put_u2(&mut payload, code_len - start);
                    put_u2(&mut payload, self.pool.utf8(&local.name));
                    let text = if typed {
                        local.signature.as_deref().unwrap_or(&local.descriptor)
                    } else {
                        &local.descriptor
                    };
                    put_u2(&mut payload, self.pool.utf8(text));
                    put_u2(&mut payload, local.slot);
                }
                put_u2(&mut attrs, self.pool.utf8(table));
                put_u4(&mut attrs, payload.len() as u32);
                attrs.extend_from_slice(&payload);
                attr_count += 1;
            }
        }

        let max_locals = self
            .locals
            .iter()
            .map(|l| l.slot + 2)
            .max()
            .unwrap_or(0)
            .max(4);

        let mut out = Vec::new();
        put_u2(&mut out, 16); // max_stack
        put_u2(&mut out, max_locals);
        put_u4(&mut out, self.bytes.len() as u32);
        out.extend_from_slice(&self.bytes);
        put_u2(&mut out, 0); // exception_table_length
        put_u2(&mut out, attr_count);
        out.extend_from_slice(&attrs);
        out
    }
}
