//! Library target around the `nova` binary.
//!
//! Compiling `main.rs` as a module lets `cargo test -p nova-cli --lib` typecheck the CLI without
//! building the integration test binaries.

#[allow(dead_code)]
#[path = "main.rs"]
mod main_bin;
