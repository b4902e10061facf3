use std::sync::Arc;

use nova_classfile::{internal_name_to_binary, ClassFile};
use nova_types::{TypeInfo, TypeKind, TypeLoadError, TypeLoader};

use crate::{ClassBytesCache, ClassBytesProvider, ClasspathError};

/// [`TypeLoader`] reading class headers through a shared [`ClassBytesCache`].
#[derive(Debug)]
pub struct ClasspathTypeLoader<P> {
    cache: Arc<ClassBytesCache<P>>,
}

impl<P> Clone for ClasspathTypeLoader<P> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<P: ClassBytesProvider> ClasspathTypeLoader<P> {
    pub fn new(cache: Arc<ClassBytesCache<P>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ClassBytesCache<P>> {
        &self.cache
    }
}

impl<P: ClassBytesProvider> TypeLoader for ClasspathTypeLoader<P> {
    fn load_type(&self, binary_name: &str) -> Result<TypeInfo, TypeLoadError> {
        let bytes = self.cache.get(binary_name).map_err(|err| match err {
            ClasspathError::ClassNotFound(_) => TypeLoadError::NotFound(binary_name.to_string()),
            other => TypeLoadError::load(binary_name, other),
        })?;
        let class = ClassFile::parse(&bytes).map_err(|err| TypeLoadError::load(binary_name, err))?;

        Ok(TypeInfo {
            name: class.binary_name(),
            kind: if class.is_interface() {
                TypeKind::Interface
            } else {
                TypeKind::Class
            },
            super_class: class.super_class.as_deref().map(internal_name_to_binary),
            interfaces: class
                .interfaces
                .iter()
                .map(|i| internal_name_to_binary(i))
                .collect(),
        })
    }
}
