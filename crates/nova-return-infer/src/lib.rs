//! Static return-type inference for compiled JVM methods.
//!
//! [`ReturnTypeInference`] turns a decoded [`nova_classfile::MethodBody`] into the most specific
//! type its value-returning instructions can produce, without looking at the method's own
//! generic signature. [`ReturnTypeAnalyzer`] adds method lookup over a class-bytes cache,
//! including the supertype retry for methods inherited from superclasses or interfaces.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nova_classfile::MethodHandle;
//! use nova_classpath::{ClassBytesCache, Classpath};
//! use nova_return_infer::{ReturnTypeAnalyzer, SkipList};
//!
//! let cache = Arc::new(ClassBytesCache::new(Classpath::from_paths(["build/classes"])));
//! let analyzer = ReturnTypeAnalyzer::over_classpath(cache, SkipList::default());
//! let handle = MethodHandle::new("com.example.Routes", "lambda$0", "()Ljava/lang/Object;");
//! println!("{:?}", analyzer.analyze_method(&handle));
//! ```

#![forbid(unsafe_code)]

mod analyzer;
mod engine;
mod skip;

pub use analyzer::{Analysis, AnalyzeError, FunctionObjectResolver, ReturnTypeAnalyzer};
pub use engine::{ProducerKind, ReturnSite, ReturnTypeInference};
pub use skip::{BridgeCall, SkipList};
