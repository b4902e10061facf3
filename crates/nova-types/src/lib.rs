//! Type hierarchy queries used by return-type inference.
//!
//! A [`TypeLoader`] supplies class headers (kind, superclass, interfaces); [`TypeResolver`]
//! builds supertype closures on top of it and answers assignability and common-ancestor
//! questions. [`MinimalJdk`] models the well-known JDK types so analysis works without a JDK on
//! the classpath.

#![forbid(unsafe_code)]

mod loader;
mod minimal_jdk;
mod resolver;

pub use loader::{ChainTypeLoader, TypeInfo, TypeKind, TypeLoadError, TypeLoader};
pub use minimal_jdk::MinimalJdk;
pub use resolver::{TypeHandle, TypeResolver, CANONICAL_CONTAINERS};

pub use nova_types_signature::{PrimitiveType, TypeDescriptor};
