//! Deterministic, pure logic of the patch pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! text and return deterministic outputs suitable for tests.

pub mod error;
pub mod extract;
pub mod fence;
pub mod headers;
pub mod normalize;
pub mod path;
pub mod types;
pub mod unified;
pub mod validator;
