use std::fmt;
use std::sync::Arc;

use nova_types_signature::OBJECT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive,
    Class,
    Interface,
    Array,
}

/// Header-level information about a declared class or interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Binary name (`java.util.Map$Entry`).
    pub name: String,
    pub kind: TypeKind,
    /// `None` only for `java.lang.Object`. Interfaces report `java.lang.Object`.
    pub super_class: Option<String>,
    /// Directly implemented (or, for interfaces, extended) interfaces in declaration order.
    pub interfaces: Vec<String>,
}

impl TypeInfo {
    pub fn class(name: impl Into<String>, super_class: Option<&str>, interfaces: &[&str]) -> Self {
        Self::new(name.into(), TypeKind::Class, super_class, interfaces)
    }

    pub fn interface(name: impl Into<String>, interfaces: &[&str]) -> Self {
        Self::new(name.into(), TypeKind::Interface, None, interfaces)
    }

    fn new(name: String, kind: TypeKind, super_class: Option<&str>, interfaces: &[&str]) -> Self {
        let super_class = match super_class {
            Some(sup) => Some(sup.to_string()),
            None if name == OBJECT => None,
            None => Some(OBJECT.to_string()),
        };
        Self {
            name,
            kind,
            super_class,
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeLoadError {
    #[error("type `{0}` not found")]
    NotFound(String),
    #[error("failed to load type `{name}`: {source}")]
    Load {
        name: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl TypeLoadError {
    pub fn load(name: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        TypeLoadError::Load {
            name: name.into(),
            source: Arc::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TypeLoadError::NotFound(_))
    }
}

/// Loads type headers by binary name.
pub trait TypeLoader: Send + Sync {
    fn load_type(&self, binary_name: &str) -> Result<TypeInfo, TypeLoadError>;
}

impl<T: TypeLoader + ?Sized> TypeLoader for &T {
    fn load_type(&self, binary_name: &str) -> Result<TypeInfo, TypeLoadError> {
        (**self).load_type(binary_name)
    }
}

impl<T: TypeLoader + ?Sized> TypeLoader for Box<T> {
    fn load_type(&self, binary_name: &str) -> Result<TypeInfo, TypeLoadError> {
        (**self).load_type(binary_name)
    }
}

impl<T: TypeLoader + ?Sized> TypeLoader for Arc<T> {
    fn load_type(&self, binary_name: &str) -> Result<TypeInfo, TypeLoadError> {
        (**self).load_type(binary_name)
    }
}

/// Tries each loader in order; the first one that knows the type wins.
///
/// Errors other than [`TypeLoadError::NotFound`] stop the search.
pub struct ChainTypeLoader<'a> {
    loaders: Vec<Box<dyn TypeLoader + 'a>>,
}

impl<'a> ChainTypeLoader<'a> {
    pub fn new(loaders: Vec<Box<dyn TypeLoader + 'a>>) -> Self {
        Self { loaders }
    }

    pub fn push(&mut self, loader: impl TypeLoader + 'a) {
        self.loaders.push(Box::new(loader));
    }
}

impl fmt::Debug for ChainTypeLoader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainTypeLoader")
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

impl TypeLoader for ChainTypeLoader<'_> {
    fn load_type(&self, binary_name: &str) -> Result<TypeInfo, TypeLoadError> {
        for loader in &self.loaders {
            match loader.load_type(binary_name) {
                Err(TypeLoadError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(TypeLoadError::NotFound(binary_name.to_string()))
    }
}
