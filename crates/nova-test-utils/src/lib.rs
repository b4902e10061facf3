//! Utilities shared by Nova tests.
//!
//! [`classwriter`] assembles class files in memory so bytecode-level tests do not need a JDK.
//! [`javac`] is a small harness that compiles real Java sources for differential tests.
//!
//! ## Running `javac` differential tests locally
//!
//! ```bash
//! # Run ignored tests (requires `javac` on PATH)
//! cargo test -p nova-return-infer --test javac_differential -- --ignored
//! ```

pub mod classwriter;

#[cfg(feature = "javac")]
pub mod javac;

pub use classwriter::{ClassWriter, CodeBuilder, CodeLabel};
