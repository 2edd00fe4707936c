//! Source implementations.

pub mod file;
