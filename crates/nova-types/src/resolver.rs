use std::fmt;

use indexmap::IndexMap;
use nova_types_signature::{PrimitiveType, TypeDescriptor, OBJECT, STRING};

use crate::loader::{TypeKind, TypeLoadError, TypeLoader};

/// Collection interfaces that concrete implementations are collapsed into, in priority order.
pub const CANONICAL_CONTAINERS: [&str; 3] = ["java.util.List", "java.util.Set", "java.util.Map"];

const CLONEABLE: &str = "java.lang.Cloneable";
const SERIALIZABLE: &str = "java.io.Serializable";

/// A resolved, erased type.
///
/// Array handles are named in source form (`java.lang.String[][]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    name: String,
    kind: TypeKind,
}

impl TypeHandle {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn object() -> Self {
        Self::new(OBJECT, TypeKind::Class)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_object(&self) -> bool {
        self.name == OBJECT
    }

    /// Component name and dimension count of an array handle.
    fn array_parts(&self) -> Option<(&str, u8)> {
        if self.kind != TypeKind::Array {
            return None;
        }
        let component = self.name.trim_end_matches("[]");
        let dims = (self.name.len() - component.len()) / 2;
        Some((component, dims as u8))
    }

    /// The erased type as a descriptor.
    pub fn to_descriptor(&self) -> TypeDescriptor {
        if let Some((component, dims)) = self.array_parts() {
            let component = match PrimitiveType::from_name(component) {
                Some(p) => TypeDescriptor::Primitive(p),
                None => TypeDescriptor::class(component),
            };
            return TypeDescriptor::array(component, dims);
        }
        match PrimitiveType::from_name(&self.name) {
            Some(p) if self.kind == TypeKind::Primitive => TypeDescriptor::Primitive(p),
            _ => TypeDescriptor::class(self.name.clone()),
        }
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Answers subtyping questions over a [`TypeLoader`].
///
/// The resolver holds no mutable state; it is `Send + Sync` whenever the loader is.
#[derive(Debug, Clone)]
pub struct TypeResolver<L> {
    loader: L,
}

impl<L: TypeLoader> TypeResolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Resolves a binary or array name (`java.util.ArrayList`, `int[]`).
    ///
    /// Types assignable to one of [`CANONICAL_CONTAINERS`] resolve to that container.
    pub fn resolve(&self, name: &str) -> Result<TypeHandle, TypeLoadError> {
        let handle = self.lookup(name)?;
        if !matches!(handle.kind, TypeKind::Class | TypeKind::Interface)
            || handle.is_object()
            || handle.name == STRING
        {
            return Ok(handle);
        }

        let closure = self.closure(&handle);
        for container in CANONICAL_CONTAINERS {
            if closure.contains_key(container) {
                if handle.name != container {
                    tracing::trace!(
                        target: "nova.types",
                        from = %handle.name,
                        to = container,
                        "collapsed to canonical container"
                    );
                }
                return Ok(TypeHandle::new(container, TypeKind::Interface));
            }
        }
        Ok(handle)
    }

    /// Normalizes the erased type of `ty` like [`TypeResolver::resolve`], keeping type arguments.
    pub fn resolve_descriptor(&self, ty: &TypeDescriptor) -> Result<TypeDescriptor, TypeLoadError> {
        match ty {
            TypeDescriptor::Primitive(_) => Ok(ty.clone()),
            TypeDescriptor::Class { name, args } => {
                let handle = self.resolve(name)?;
                if handle.name == *name {
                    Ok(ty.clone())
                } else {
                    Ok(TypeDescriptor::parameterized(handle.name, args.clone()))
                }
            }
            TypeDescriptor::Array { component, .. } => {
                self.lookup(&component.erased_name())?;
                Ok(ty.clone())
            }
        }
    }

    /// Resolves without collapsing into canonical containers.
    fn lookup(&self, name: &str) -> Result<TypeHandle, TypeLoadError> {
        if PrimitiveType::from_name(name).is_some() {
            return Ok(TypeHandle::new(name, TypeKind::Primitive));
        }
        if name == OBJECT || name == STRING {
            return Ok(TypeHandle::new(name, TypeKind::Class));
        }
        if name.ends_with("[]") {
            let component = name.trim_end_matches("[]");
            if component.is_empty() {
                return Err(TypeLoadError::NotFound(name.to_string()));
            }
            self.lookup(component)?;
            return Ok(TypeHandle::new(name, TypeKind::Array));
        }
        let info = self.loader.load_type(name)?;
        Ok(TypeHandle::new(info.name, info.kind))
    }

    /// Ordered transitive supertypes of `handle`, starting with `handle` itself.
    ///
    /// Walks the superclass chain (stopping before `java.lang.Object`), adding each class and
    /// then its interfaces depth-first. Arrays yield themselves, `Cloneable` and `Serializable`.
    pub fn supertypes(&self, handle: &TypeHandle) -> Vec<TypeHandle> {
        self.closure(handle)
            .into_iter()
            .map(|(name, kind)| TypeHandle::new(name, kind))
            .collect()
    }

    fn closure(&self, handle: &TypeHandle) -> IndexMap<String, TypeKind> {
        let mut out = IndexMap::new();
        match handle.kind {
            TypeKind::Primitive => {
                out.insert(handle.name.clone(), TypeKind::Primitive);
            }
            TypeKind::Array => {
                out.insert(handle.name.clone(), TypeKind::Array);
                out.insert(CLONEABLE.to_string(), TypeKind::Interface);
                out.insert(SERIALIZABLE.to_string(), TypeKind::Interface);
            }
            TypeKind::Class | TypeKind::Interface => {
                let mut current = Some((handle.name.clone(), handle.kind));
                while let Some((name, kind)) = current.take() {
                    if name == OBJECT || out.contains_key(&name) {
                        break;
                    }
                    out.insert(name.clone(), kind);
                    let info = match self.loader.load_type(&name) {
                        Ok(info) => info,
                        Err(err) => {
                            tracing::debug!(
                                target: "nova.types",
                                ty = %name,
                                error = %err,
                                "pruning supertype walk"
                            );
                            break;
                        }
                    };
                    for iface in &info.interfaces {
                        self.collect_interface(iface, &mut out);
                    }
                    current = info.super_class.map(|sup| (sup, TypeKind::Class));
                }
            }
        }
        out
    }

    fn collect_interface(&self, name: &str, out: &mut IndexMap<String, TypeKind>) {
        if name == OBJECT || out.contains_key(name) {
            return;
        }
        out.insert(name.to_string(), TypeKind::Interface);
        match self.loader.load_type(name) {
            Ok(info) => {
                for iface in &info.interfaces {
                    self.collect_interface(iface, out);
                }
            }
            Err(err) => {
                tracing::debug!(
                    target: "nova.types",
                    ty = %name,
                    error = %err,
                    "pruning interface walk"
                );
            }
        }
    }

    /// Whether a value of type `from` can be assigned to `to`.
    pub fn is_assignable(&self, from: &TypeHandle, to: &TypeHandle) -> bool {
        if from.name == to.name {
            return true;
        }
        if from.kind == TypeKind::Primitive || to.kind == TypeKind::Primitive {
            return false;
        }
        if to.is_object() {
            return true;
        }
        if let (Some((from_component, from_dims)), Some((to_component, to_dims))) =
            (from.array_parts(), to.array_parts())
        {
            if from_dims != to_dims {
                return false;
            }
            return match (self.lookup(from_component), self.lookup(to_component)) {
                (Ok(from), Ok(to)) if from.kind != TypeKind::Primitive => {
                    self.is_assignable(&from, &to)
                }
                _ => false,
            };
        }
        self.closure(from).contains_key(&to.name)
    }

    /// Most specific type shared by every candidate.
    ///
    /// The closure of the first candidate is filtered by assignability from every other
    /// candidate; the first survivor in closure order wins, `java.lang.Object` if none do.
    pub fn common_ancestor(&self, candidates: &[TypeHandle]) -> TypeHandle {
        let (first, rest) = match candidates {
            [] => return TypeHandle::object(),
            [single] => return single.clone(),
            [first, rest @ ..] => (first, rest),
        };

        self.supertypes(first)
            .into_iter()
            .find(|candidate| rest.iter().all(|other| self.is_assignable(other, candidate)))
            .unwrap_or_else(TypeHandle::object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalJdk;

    fn resolver() -> TypeResolver<MinimalJdk> {
        TypeResolver::new(MinimalJdk::new())
    }

    #[test]
    fn short_circuits_primitives_object_and_string() {
        struct NoLoader;
        impl TypeLoader for NoLoader {
            fn load_type(&self, name: &str) -> Result<crate::TypeInfo, TypeLoadError> {
                panic!("unexpected load of {name}");
            }
        }

        let resolver = TypeResolver::new(NoLoader);
        assert_eq!(resolver.resolve("int").unwrap().kind(), TypeKind::Primitive);
        assert!(resolver.resolve("java.lang.Object").unwrap().is_object());
        assert_eq!(
            resolver.resolve("java.lang.String").unwrap(),
            TypeHandle::new("java.lang.String", TypeKind::Class)
        );
    }

    #[test]
    fn array_handles_round_trip_to_descriptors() {
        let handle = resolver().resolve("int[][]").unwrap();
        assert_eq!(handle.kind(), TypeKind::Array);
        assert_eq!(
            handle.to_descriptor(),
            TypeDescriptor::array(TypeDescriptor::Primitive(PrimitiveType::Int), 2)
        );
        assert!(resolver().resolve("com.example.Missing[]").is_err());
    }

    #[test]
    fn array_assignability() {
        let r = resolver();
        let strings = r.resolve("java.lang.String[]").unwrap();
        let chars = r.resolve("java.lang.CharSequence[]").unwrap();
        let ints = r.resolve("int[]").unwrap();
        assert!(r.is_assignable(&strings, &chars));
        assert!(!r.is_assignable(&chars, &strings));
        assert!(r.is_assignable(&ints, &TypeHandle::object()));
        assert!(r.is_assignable(&ints, &TypeHandle::new(CLONEABLE, TypeKind::Interface)));
        assert!(!r.is_assignable(&ints, &strings));
    }
}
