// src/errors/build.rs
//
// Errors raised while resolving a signature and compiling its thunk. All of
// these are fatal to construction; `Codegen` in particular is an internal
// defect and is never retried.

use thiserror::Error;

use crate::value::RetKind;

#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// The ancestor chain was exhausted without an exact name+parameter
    /// match, or the owner type is not in the catalog.
    #[error("no method '{name}' with matching parameters in the hierarchy of '{owner}'")]
    SignatureNotFound { owner: String, name: String },

    /// The caller requested an accessor category that is not the resolved
    /// method's return category. Never coerced, never truncated.
    #[error("method '{name}' returns {actual:?}, requested accessor category is {requested:?}")]
    IncompatibleReturnType {
        name: String,
        requested: RetKind,
        actual: RetKind,
    },

    /// Cranelift rejected the generated unit. A compiler bug, not a user
    /// condition.
    #[error("code generation failed for '{symbol}': {detail}")]
    Codegen { symbol: String, detail: String },
}

impl BuildError {
    pub(crate) fn codegen(symbol: &str, detail: impl std::fmt::Display) -> Self {
        BuildError::Codegen {
            symbol: symbol.to_string(),
            detail: detail.to_string(),
        }
    }
}
