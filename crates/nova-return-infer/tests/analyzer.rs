use std::collections::HashMap;
use std::sync::Arc;

use nova_classfile::opcodes::*;
use nova_classfile::{locate, MethodHandle};
use nova_classpath::{ClassBytesCache, ClassBytesProvider, Classpath, ClasspathError};
use nova_return_infer::{Analysis, AnalyzeError, ReturnTypeAnalyzer, SkipList};
use nova_test_utils::ClassWriter;
use nova_types::ChainTypeLoader;
use nova_types_signature::TypeDescriptor;
use pretty_assertions::assert_eq;

const ACC_PUBLIC: u16 = 0x0001;
const HANDLE: &str = "()Ljava/lang/Object;";

#[derive(Default)]
struct Classes(HashMap<String, Vec<u8>>);

impl Classes {
    fn with(mut self, class: ClassWriter) -> Self {
        self.insert(class);
        self
    }

    fn insert(&mut self, class: ClassWriter) {
        let name = class.internal_name().replace('/', ".");
        self.0.insert(name, class.finish());
    }
}

impl ClassBytesProvider for Classes {
    fn load(&self, binary_name: &str) -> Result<Vec<u8>, ClasspathError> {
        self.0
            .get(binary_name)
            .cloned()
            .ok_or_else(|| ClasspathError::ClassNotFound(binary_name.to_string()))
    }
}

/// `Handler` (interface, default `handle`) <- `AbstractRoute` (abstract `handle`) <- `Route`.
fn hierarchy() -> Classes {
    let mut handler = ClassWriter::interface("com/example/Handler");
    handler.method(ACC_PUBLIC, "handle", HANDLE, |code| {
        code.type_insn(NEW, "java/util/ArrayList")
            .insn(DUP)
            .invoke(INVOKESPECIAL, "java/util/ArrayList", "<init>", "()V")
            .insn(ARETURN);
    });

    let mut base = ClassWriter::new("com/example/AbstractRoute").implements("com/example/Handler");
    base.abstract_method("handle", HANDLE);

    let mut greeter = ClassWriter::new("com/example/Greeter");
    greeter.method(ACC_PUBLIC, "greet", HANDLE, |code| {
        code.ldc_string("hello").insn(ARETURN);
    });

    Classes::default()
        .with(handler)
        .with(base)
        .with(ClassWriter::new("com/example/Route").extends("com/example/AbstractRoute"))
        .with(greeter)
        .with(ClassWriter::new("com/example/LoudGreeter").extends("com/example/Greeter"))
}

fn analyzer(classes: Classes) -> ReturnTypeAnalyzer<Classes, ChainTypeLoader<'static>> {
    ReturnTypeAnalyzer::over_classpath(Arc::new(ClassBytesCache::new(classes)), SkipList::default())
}

#[test]
fn interface_method_is_not_found_on_the_implementing_class() {
    let classes = hierarchy();
    let route = classes.load("com.example.Route").unwrap();
    let handle = MethodHandle::new("com.example.Route", "handle", HANDLE);
    assert!(locate(&route, &handle).unwrap().is_none());

    let handler = classes.load("com.example.Handler").unwrap();
    assert!(locate(&handler, &handle.with_owner("com.example.Handler"))
        .unwrap()
        .is_some());
}

#[test]
fn lookup_retries_on_supertypes() {
    let analyzer = analyzer(hierarchy());

    let route = MethodHandle::new("com.example.Route", "handle", HANDLE);
    let body = analyzer.find_method_body(&route).unwrap().unwrap();
    assert_eq!(body.handle.owner, "com.example.Handler");
    assert_eq!(
        analyzer.analyze_method(&route).unwrap(),
        Analysis::Inferred(TypeDescriptor::class("java.util.List"))
    );

    let loud = MethodHandle::new("com.example.LoudGreeter", "greet", HANDLE);
    assert_eq!(
        analyzer.analyze_method(&loud).unwrap(),
        Analysis::Inferred(TypeDescriptor::class("java.lang.String"))
    );
}

#[test]
fn missing_methods_are_not_found() {
    let analyzer = analyzer(hierarchy());
    let handle = MethodHandle::new("com.example.Route", "missing", HANDLE);
    let analysis = analyzer.analyze_method(&handle).unwrap();
    assert_eq!(analysis, Analysis::NotFound);
    assert_eq!(analysis.inferred(), None);

    // Same name, different descriptor.
    let handle = MethodHandle::new("com.example.Greeter", "greet", "()Ljava/lang/String;");
    assert_eq!(analyzer.analyze_method(&handle).unwrap(), Analysis::NotFound);
}

#[test]
fn missing_owner_is_an_error() {
    let analyzer = analyzer(hierarchy());
    let handle = MethodHandle::new("com.example.Gone", "handle", HANDLE);
    match analyzer.analyze_method(&handle) {
        Err(AnalyzeError::ClassBytes { class, source }) => {
            assert_eq!(class, "com.example.Gone");
            assert!(source.is_not_found());
        }
        other => panic!("expected a class-bytes error, got {other:?}"),
    }
}

#[test]
fn corrupt_owner_is_an_error() {
    let mut classes = hierarchy();
    classes
        .0
        .insert("com.example.Broken".to_string(), vec![0xCA, 0xFE]);
    let analyzer = analyzer(classes);
    let handle = MethodHandle::new("com.example.Broken", "handle", HANDLE);
    assert!(matches!(
        analyzer.analyze_method(&handle),
        Err(AnalyzeError::ClassFile { .. })
    ));
}

struct RouteDefinition {
    handler: Option<MethodHandle>,
}

#[test]
fn function_objects_without_metadata_are_unresolved() {
    let analyzer = analyzer(hierarchy());
    let resolver = |route: &RouteDefinition| route.handler.clone();

    let known = RouteDefinition {
        handler: Some(MethodHandle::new("com.example.Greeter", "greet", HANDLE)),
    };
    let opaque = RouteDefinition { handler: None };

    assert_eq!(
        analyzer.analyze_function(&resolver, &known).unwrap(),
        Analysis::Inferred(TypeDescriptor::class("java.lang.String"))
    );
    assert_eq!(
        analyzer.analyze_function(&resolver, &opaque).unwrap(),
        Analysis::Unresolved
    );
}

#[test]
fn analyzer_over_a_class_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut routes = ClassWriter::new("com/example/Routes");
    routes.method(0x0009, "lambda$0", HANDLE, |code| {
        code.type_insn(NEW, "com/example/Payload")
            .insn(DUP)
            .invoke(INVOKESPECIAL, "com/example/Payload", "<init>", "()V")
            .insn(ARETURN);
    });
    routes.write_to_dir(dir.path()).unwrap();
    ClassWriter::new("com/example/Payload")
        .implements("java/io/Serializable")
        .write_to_dir(dir.path())
        .unwrap();

    let cache = Arc::new(ClassBytesCache::new(Classpath::from_paths([dir.path()])));
    let analyzer = ReturnTypeAnalyzer::over_classpath(Arc::clone(&cache), SkipList::default());
    let handle = MethodHandle::new("com.example.Routes", "lambda$0", HANDLE);
    assert_eq!(
        analyzer.analyze_method(&handle).unwrap(),
        Analysis::Inferred(TypeDescriptor::class("com.example.Payload"))
    );
    assert!(cache.contains("com.example.Payload"));

    cache.clear();
    assert!(cache.is_empty());
}
