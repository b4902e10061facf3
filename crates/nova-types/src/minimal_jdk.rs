//! A small built-in model of the JDK type hierarchy.
//!
//! Covers the types that route handlers commonly return so inference works without a JDK on the
//! classpath. Hierarchies follow Java 17.

use std::collections::HashMap;

use crate::loader::{TypeInfo, TypeKind, TypeLoadError, TypeLoader};

const I: TypeKind = TypeKind::Interface;
const C: TypeKind = TypeKind::Class;

const SER: &str = "java.io.Serializable";
const CMP: &str = "java.lang.Comparable";
const CONST: &str = "java.lang.constant.Constable";
const DESC: &str = "java.lang.constant.ConstantDesc";
const CLONE: &str = "java.lang.Cloneable";

/// `(name, kind, superclass, interfaces)`.
type Entry = (
    &'static str,
    TypeKind,
    Option<&'static str>,
    &'static [&'static str],
);

#[rustfmt::skip]
const TYPES: &[Entry] = &[
    ("java.lang.Object", C, None, &[]),
    (SER, I, None, &[]),
    (CLONE, I, None, &[]),
    (CMP, I, None, &[]),
    (CONST, I, None, &[]),
    (DESC, I, None, &[]),
    ("java.lang.CharSequence", I, None, &[]),
    ("java.lang.Appendable", I, None, &[]),
    ("java.lang.Iterable", I, None, &[]),
    ("java.lang.AutoCloseable", I, None, &[]),
    ("java.lang.Runnable", I, None, &[]),
    ("java.lang.reflect.Type", I, None, &[]),

    ("java.lang.String", C, None, &[SER, CMP, "java.lang.CharSequence", CONST, DESC]),
    ("java.lang.AbstractStringBuilder", C, None, &["java.lang.Appendable", "java.lang.CharSequence"]),
    ("java.lang.StringBuilder", C, Some("java.lang.AbstractStringBuilder"), &[SER, CMP, "java.lang.CharSequence"]),
    ("java.lang.Boolean", C, None, &[SER, CMP, CONST]),
    ("java.lang.Character", C, None, &[SER, CMP, CONST]),
    ("java.lang.Number", C, None, &[SER]),
    ("java.lang.Byte", C, Some("java.lang.Number"), &[CMP, CONST]),
    ("java.lang.Short", C, Some("java.lang.Number"), &[CMP, CONST]),
    ("java.lang.Integer", C, Some("java.lang.Number"), &[CMP, CONST, DESC]),
    ("java.lang.Long", C, Some("java.lang.Number"), &[CMP, CONST, DESC]),
    ("java.lang.Float", C, Some("java.lang.Number"), &[CMP, CONST, DESC]),
    ("java.lang.Double", C, Some("java.lang.Number"), &[CMP, CONST, DESC]),
    ("java.lang.Void", C, None, &[]),
    ("java.lang.Class", C, None, &[SER, "java.lang.reflect.Type"]),
    ("java.lang.Enum", C, None, &[CONST, CMP, SER]),
    ("java.lang.Record", C, None, &[]),
    ("java.lang.Throwable", C, None, &[SER]),
    ("java.lang.Exception", C, Some("java.lang.Throwable"), &[]),
    ("java.lang.Error", C, Some("java.lang.Throwable"), &[]),
    ("java.lang.RuntimeException", C, Some("java.lang.Exception"), &[]),
    ("java.lang.IllegalArgumentException", C, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.IllegalStateException", C, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.UnsupportedOperationException", C, Some("java.lang.RuntimeException"), &[]),
    ("java.lang.invoke.MethodType", C, None, &[CONST, "java.lang.invoke.TypeDescriptor$OfMethod", SER]),
    ("java.lang.invoke.TypeDescriptor", I, None, &[]),
    ("java.lang.invoke.TypeDescriptor$OfMethod", I, None, &["java.lang.invoke.TypeDescriptor"]),
    ("java.lang.invoke.MethodHandle", C, None, &[CONST]),
    ("java.math.BigInteger", C, Some("java.lang.Number"), &[CMP]),
    ("java.math.BigDecimal", C, Some("java.lang.Number"), &[CMP]),

    ("java.util.Iterator", I, None, &[]),
    ("java.util.RandomAccess", I, None, &[]),
    ("java.util.Collection", I, None, &["java.lang.Iterable"]),
    ("java.util.List", I, None, &["java.util.Collection"]),
    ("java.util.Set", I, None, &["java.util.Collection"]),
    ("java.util.SortedSet", I, None, &["java.util.Set"]),
    ("java.util.NavigableSet", I, None, &["java.util.SortedSet"]),
    ("java.util.Queue", I, None, &["java.util.Collection"]),
    ("java.util.Deque", I, None, &["java.util.Queue"]),
    ("java.util.Map", I, None, &[]),
    ("java.util.Map$Entry", I, None, &[]),
    ("java.util.SortedMap", I, None, &["java.util.Map"]),
    ("java.util.NavigableMap", I, None, &["java.util.SortedMap"]),
    ("java.util.AbstractCollection", C, None, &["java.util.Collection"]),
    ("java.util.AbstractList", C, Some("java.util.AbstractCollection"), &["java.util.List"]),
    ("java.util.AbstractSequentialList", C, Some("java.util.AbstractList"), &[]),
    ("java.util.ArrayList", C, Some("java.util.AbstractList"), &["java.util.List", "java.util.RandomAccess", CLONE, SER]),
    ("java.util.LinkedList", C, Some("java.util.AbstractSequentialList"), &["java.util.List", "java.util.Deque", CLONE, SER]),
    ("java.util.ArrayDeque", C, Some("java.util.AbstractCollection"), &["java.util.Deque", CLONE, SER]),
    ("java.util.AbstractSet", C, Some("java.util.AbstractCollection"), &["java.util.Set"]),
    ("java.util.HashSet", C, Some("java.util.AbstractSet"), &["java.util.Set", CLONE, SER]),
    ("java.util.LinkedHashSet", C, Some("java.util.HashSet"), &["java.util.Set", CLONE, SER]),
    ("java.util.TreeSet", C, Some("java.util.AbstractSet"), &["java.util.NavigableSet", CLONE, SER]),
    ("java.util.AbstractMap", C, None, &["java.util.Map"]),
    ("java.util.HashMap", C, Some("java.util.AbstractMap"), &["java.util.Map", CLONE, SER]),
    ("java.util.LinkedHashMap", C, Some("java.util.HashMap"), &["java.util.Map"]),
    ("java.util.TreeMap", C, Some("java.util.AbstractMap"), &["java.util.NavigableMap", CLONE, SER]),
    ("java.util.Optional", C, None, &[]),
    ("java.util.UUID", C, None, &[SER, CMP]),
    ("java.util.Date", C, None, &[SER, CLONE, CMP]),
    ("java.util.concurrent.Future", I, None, &[]),
    ("java.util.concurrent.CompletionStage", I, None, &[]),
    ("java.util.concurrent.CompletableFuture", C, None, &["java.util.concurrent.Future", "java.util.concurrent.CompletionStage"]),
    ("java.util.concurrent.ConcurrentMap", I, None, &["java.util.Map"]),
    ("java.util.concurrent.ConcurrentHashMap", C, Some("java.util.AbstractMap"), &["java.util.concurrent.ConcurrentMap", SER]),
    ("java.util.function.Function", I, None, &[]),
    ("java.util.function.BiFunction", I, None, &[]),
    ("java.util.function.Supplier", I, None, &[]),
    ("java.util.function.Consumer", I, None, &[]),
    ("java.util.function.Predicate", I, None, &[]),
    ("java.util.stream.BaseStream", I, None, &["java.lang.AutoCloseable"]),
    ("java.util.stream.Stream", I, None, &["java.util.stream.BaseStream"]),
];

/// [`TypeLoader`] over the built-in JDK table.
#[derive(Debug, Clone)]
pub struct MinimalJdk {
    types: HashMap<&'static str, &'static Entry>,
}

impl Default for MinimalJdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MinimalJdk {
    pub fn new() -> Self {
        Self {
            types: TYPES.iter().map(|entry| (entry.0, entry)).collect(),
        }
    }

    pub fn contains(&self, binary_name: &str) -> bool {
        self.types.contains_key(binary_name)
    }
}

impl TypeLoader for MinimalJdk {
    fn load_type(&self, binary_name: &str) -> Result<TypeInfo, TypeLoadError> {
        let Some((name, kind, super_class, interfaces)) = self.types.get(binary_name).copied()
        else {
            return Err(TypeLoadError::NotFound(binary_name.to_string()));
        };
        Ok(match kind {
            TypeKind::Interface => TypeInfo::interface(*name, interfaces),
            _ => TypeInfo::class(*name, *super_class, interfaces),
        })
    }
}
