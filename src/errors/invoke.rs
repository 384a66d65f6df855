// src/errors/invoke.rs
//
// Per-invocation failures. None of these are pre-validated at build time;
// they surface on the call that violates the contract.

use thiserror::Error;

use crate::value::{RetKind, ValueKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    /// Argument list length does not match the resolved arity.
    #[error("expected {expected} arguments, got {found}")]
    ArgumentCount { expected: usize, found: usize },

    /// An argument's category disagrees with the declared parameter kind.
    /// On the compiled path this is detected by the thunk's tag check.
    #[error("argument {index} is {found:?}, expected {expected:?}")]
    ArgumentType {
        index: usize,
        expected: ValueKind,
        found: ValueKind,
    },

    /// A category method the accessor does not implement was invoked
    /// through the uniform trait surface. Hard contract violation.
    #[error("accessor is bound to the {bound:?} category, invoked as {requested:?}")]
    WrongCategory { bound: RetKind, requested: RetKind },

    /// Instance method invoked with the static-call marker.
    #[error("instance method invoked without a target")]
    MissingTarget,

    /// The target's runtime type is not the owner type or a descendant.
    #[error("target is an instance of '{found}', which is not '{expected}' or a subtype")]
    TargetType { expected: String, found: String },
}
