//! Typify - comment-driven contract instrumentation for JavaScript
//!
//! This is the root workspace crate that provides integration tests.
//! The implementation lives in the workspace member crates.

pub use typify_codegen as codegen;
pub use typify_instrument as instrument;
pub use typify_parser as parser;
