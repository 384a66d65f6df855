// src/errors/mod.rs
//! Structured errors for accessor construction and invocation.

pub mod build;
pub mod invoke;

pub use build::BuildError;
pub use invoke::InvokeError;
