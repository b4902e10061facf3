use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use nova_classfile::{internal_name_to_binary, ClassFile, MethodBody, MethodHandle};
use nova_classpath::{ClassBytesCache, ClassBytesProvider, ClasspathError, ClasspathTypeLoader};
use nova_types::{ChainTypeLoader, MinimalJdk, TypeLoader};
use nova_types_signature::TypeDescriptor;
use thiserror::Error;

use crate::engine::ReturnTypeInference;
use crate::skip::SkipList;

/// Names the compiled method implementing an opaque function object.
///
/// Returns `None` when `function` carries no usable metadata; callers then have no method to
/// analyze.
pub trait FunctionObjectResolver<F: ?Sized> {
    fn resolve(&self, function: &F) -> Option<MethodHandle>;
}

impl<F, T> FunctionObjectResolver<F> for T
where
    F: ?Sized,
    T: Fn(&F) -> Option<MethodHandle>,
{
    fn resolve(&self, function: &F) -> Option<MethodHandle> {
        self(function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    Inferred(TypeDescriptor),
    /// No type on the search path declares the method with a body.
    NotFound,
    /// The function object could not be mapped to a method.
    Unresolved,
}

impl Analysis {
    pub fn inferred(&self) -> Option<&TypeDescriptor> {
        match self {
            Analysis::Inferred(ty) => Some(ty),
            Analysis::NotFound | Analysis::Unresolved => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to load class `{class}`")]
    ClassBytes {
        class: String,
        #[source]
        source: ClasspathError,
    },
    #[error("malformed class file for `{class}`")]
    ClassFile {
        class: String,
        #[source]
        source: nova_classfile::Error,
    },
}

/// Locates compiled methods through a shared class-bytes cache and infers their return types.
pub struct ReturnTypeAnalyzer<P, L> {
    bytes: Arc<ClassBytesCache<P>>,
    inference: ReturnTypeInference<L>,
}

impl<P, L> std::fmt::Debug for ReturnTypeAnalyzer<P, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReturnTypeAnalyzer").finish_non_exhaustive()
    }
}

impl<P: ClassBytesProvider + 'static> ReturnTypeAnalyzer<P, ChainTypeLoader<'static>> {
    /// Loads types from the classes in `bytes`, falling back to [`MinimalJdk`] for JDK types
    /// the provider does not carry.
    pub fn over_classpath(bytes: Arc<ClassBytesCache<P>>, skip: SkipList) -> Self {
        let loader = ChainTypeLoader::new(vec![
            Box::new(ClasspathTypeLoader::new(Arc::clone(&bytes))),
            Box::new(MinimalJdk::new()),
        ]);
        Self::new(bytes, loader, skip)
    }
}

impl<P: ClassBytesProvider, L: TypeLoader> ReturnTypeAnalyzer<P, L> {
    pub fn new(bytes: Arc<ClassBytesCache<P>>, loader: L, skip: SkipList) -> Self {
        Self {
            bytes,
            inference: ReturnTypeInference::with_skip_list(loader, skip),
        }
    }

    pub fn bytes(&self) -> &Arc<ClassBytesCache<P>> {
        &self.bytes
    }

    pub fn inference(&self) -> &ReturnTypeInference<L> {
        &self.inference
    }

    /// Finds the body of `handle`, searching its owner first and then the owner's supertypes
    /// breadth-first (superclass before interfaces).
    ///
    /// Failing to load the owner itself is an error; supertypes missing from the provider are
    /// skipped.
    pub fn find_method_body(&self, handle: &MethodHandle) -> Result<Option<MethodBody>, AnalyzeError> {
        let mut queue = VecDeque::from([handle.owner.clone()]);
        let mut seen = HashSet::new();

        while let Some(owner) = queue.pop_front() {
            if !seen.insert(owner.clone()) {
                continue;
            }

            let bytes = match self.bytes.get(&owner) {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() && owner != handle.owner => {
                    tracing::debug!(
                        target: "nova.infer",
                        class = %owner,
                        "supertype not on the classpath"
                    );
                    continue;
                }
                Err(source) => {
                    return Err(AnalyzeError::ClassBytes {
                        class: owner,
                        source,
                    })
                }
            };
            let class = ClassFile::parse(&bytes).map_err(|source| AnalyzeError::ClassFile {
                class: owner.clone(),
                source,
            })?;

            let candidate = handle.with_owner(owner.clone());
            let body = class
                .method_body(&candidate)
                .map_err(|source| AnalyzeError::ClassFile {
                    class: owner.clone(),
                    source,
                })?;
            if let Some(body) = body {
                if owner != handle.owner {
                    tracing::debug!(
                        target: "nova.infer",
                        method = %handle,
                        declared_in = %owner,
                        "method found on supertype"
                    );
                }
                return Ok(Some(body));
            }

            queue.extend(class.super_class.as_deref().map(internal_name_to_binary));
            queue.extend(class.interfaces.iter().map(|i| internal_name_to_binary(i)));
        }

        Ok(None)
    }

    pub fn analyze_method(&self, handle: &MethodHandle) -> Result<Analysis, AnalyzeError> {
        match self.find_method_body(handle)? {
            Some(body) => Ok(Analysis::Inferred(self.inference.infer(&body))),
            None => {
                tracing::debug!(target: "nova.infer", method = %handle, "method body not found");
                Ok(Analysis::NotFound)
            }
        }
    }

    /// Resolves `function` to its implementing method and analyzes it.
    pub fn analyze_function<F, R>(&self, resolver: &R, function: &F) -> Result<Analysis, AnalyzeError>
    where
        F: ?Sized,
        R: FunctionObjectResolver<F> + ?Sized,
    {
        match resolver.resolve(function) {
            Some(handle) => self.analyze_method(&handle),
            None => {
                tracing::debug!(target: "nova.infer", "function object has no method metadata");
                Ok(Analysis::Unresolved)
            }
        }
    }
}
