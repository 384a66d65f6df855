// src/lib.rs
//! Specializing method accessors: resolve a method against a frozen
//! catalog, compile a dedicated call thunk for it, and invoke it through a
//! per-return-category contract with no boxed round trip.

pub mod accessor;
pub mod catalog;
mod codegen;
pub mod errors;
pub mod registry;
pub mod value;

pub use accessor::{Accessor, AccessorFactory, Invoke, ReflectAccessor, Target};
pub use catalog::{
    CatalogBuilder, Dispatch, MethodId, MethodSig, TypeCatalog, TypeDefId, Visibility, resolve,
};
pub use errors::{BuildError, InvokeError};
pub use registry::{LoadedThunk, ThunkId, ThunkRegistry};
pub use value::{ObjRef, RetKind, Value, ValueKind};
