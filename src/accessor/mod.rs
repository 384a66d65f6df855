// src/accessor/mod.rs
//
// The specialized invocation surface. Every accessor is bound to exactly
// one return category; the typed per-category structs make calling the
// wrong category a type error, while the uniform `Invoke` trait keeps the
// full twenty-method contract available, with every unimplemented category
// method answering `WrongCategory`.

use std::sync::Arc;

use crate::catalog::{Dispatch, MethodSig, TypeCatalog, TypeDefId, resolve};
use crate::codegen::thunk::compile;
use crate::errors::{BuildError, InvokeError};
use crate::registry::{LoadedThunk, ThunkId, ThunkRegistry};
use crate::value::{ObjRef, RetKind, Value, ValueKind};

mod compiled;
mod reflect;

pub use compiled::{
    BoolAccessor, CharAccessor, F32Accessor, F64Accessor, I8Accessor, I16Accessor, I32Accessor,
    I64Accessor, RefAccessor, VoidAccessor,
};
pub use reflect::ReflectAccessor;

pub(crate) use compiled::ThunkHandle;

/// The per-call target: an object reference, or the static-call marker.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// No target. The only valid target for static methods; static
    /// accessors also ignore any supplied object.
    Static,
    Object(&'a ObjRef),
}

/// Check the target against the accessor's dispatch and owner chain, and
/// produce the raw pointer handed to the call. Shared verbatim by the
/// compiled and reflective paths so both fail identically.
pub(crate) fn resolve_target(
    catalog: &TypeCatalog,
    dispatch: Dispatch,
    owner: TypeDefId,
    target: Target<'_>,
) -> Result<*mut u8, InvokeError> {
    match dispatch {
        Dispatch::Static => Ok(std::ptr::null_mut()),
        Dispatch::Instance => match target {
            Target::Static => Err(InvokeError::MissingTarget),
            Target::Object(obj) => {
                if catalog.is_instance_of(obj.type_id(), owner) {
                    Ok(obj.ptr())
                } else {
                    Err(InvokeError::TargetType {
                        expected: catalog.type_name(owner).to_string(),
                        found: catalog.type_name(obj.type_id()).to_string(),
                    })
                }
            }
        },
    }
}

/// The uniform invocation contract: one method pair per return category.
/// Default bodies are the intentionally-absent case; an accessor overrides
/// exactly the pair matching its bound category. The reflective baseline
/// overrides all of them.
pub trait Invoke {
    /// The return category this accessor is bound to.
    fn category(&self) -> RetKind;

    fn invoke_void(&self, target: Target<'_>, args: &[Value]) -> Result<(), InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::Void))
    }

    fn invoke_void_0(&self, target: Target<'_>) -> Result<(), InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::Void))
    }

    fn invoke_bool(&self, target: Target<'_>, args: &[Value]) -> Result<bool, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::Bool))
    }

    fn invoke_bool_0(&self, target: Target<'_>) -> Result<bool, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::Bool))
    }

    fn invoke_i8(&self, target: Target<'_>, args: &[Value]) -> Result<i8, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::I8))
    }

    fn invoke_i8_0(&self, target: Target<'_>) -> Result<i8, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::I8))
    }

    fn invoke_i16(&self, target: Target<'_>, args: &[Value]) -> Result<i16, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::I16))
    }

    fn invoke_i16_0(&self, target: Target<'_>) -> Result<i16, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::I16))
    }

    fn invoke_i32(&self, target: Target<'_>, args: &[Value]) -> Result<i32, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::I32))
    }

    fn invoke_i32_0(&self, target: Target<'_>) -> Result<i32, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::I32))
    }

    fn invoke_i64(&self, target: Target<'_>, args: &[Value]) -> Result<i64, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::I64))
    }

    fn invoke_i64_0(&self, target: Target<'_>) -> Result<i64, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::I64))
    }

    fn invoke_f32(&self, target: Target<'_>, args: &[Value]) -> Result<f32, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::F32))
    }

    fn invoke_f32_0(&self, target: Target<'_>) -> Result<f32, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::F32))
    }

    fn invoke_f64(&self, target: Target<'_>, args: &[Value]) -> Result<f64, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::F64))
    }

    fn invoke_f64_0(&self, target: Target<'_>) -> Result<f64, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::F64))
    }

    fn invoke_char(&self, target: Target<'_>, args: &[Value]) -> Result<char, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::Char))
    }

    fn invoke_char_0(&self, target: Target<'_>) -> Result<char, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::Char))
    }

    fn invoke_ref(&self, target: Target<'_>, args: &[Value]) -> Result<*mut u8, InvokeError> {
        let _ = (target, args);
        Err(wrong(self.category(), RetKind::Ref))
    }

    fn invoke_ref_0(&self, target: Target<'_>) -> Result<*mut u8, InvokeError> {
        let _ = target;
        Err(wrong(self.category(), RetKind::Ref))
    }
}

fn wrong(bound: RetKind, requested: RetKind) -> InvokeError {
    InvokeError::WrongCategory { bound, requested }
}

/// A built accessor: the sum over the category set. Exactly one variant is
/// produced per build, so matching out the wrong category fails at the use
/// site rather than deep inside a call.
pub enum Accessor {
    Void(VoidAccessor),
    Bool(BoolAccessor),
    I8(I8Accessor),
    I16(I16Accessor),
    I32(I32Accessor),
    I64(I64Accessor),
    F32(F32Accessor),
    F64(F64Accessor),
    Char(CharAccessor),
    Ref(RefAccessor),
}

impl Accessor {
    pub fn category(&self) -> RetKind {
        self.as_invoke().category()
    }

    /// The uniform trait view of this accessor.
    pub fn as_invoke(&self) -> &dyn Invoke {
        match self {
            Accessor::Void(a) => a,
            Accessor::Bool(a) => a,
            Accessor::I8(a) => a,
            Accessor::I16(a) => a,
            Accessor::I32(a) => a,
            Accessor::I64(a) => a,
            Accessor::F32(a) => a,
            Accessor::F64(a) => a,
            Accessor::Char(a) => a,
            Accessor::Ref(a) => a,
        }
    }

    pub fn thunk_id(&self) -> ThunkId {
        match self {
            Accessor::Void(a) => a.thunk_id(),
            Accessor::Bool(a) => a.thunk_id(),
            Accessor::I8(a) => a.thunk_id(),
            Accessor::I16(a) => a.thunk_id(),
            Accessor::I32(a) => a.thunk_id(),
            Accessor::I64(a) => a.thunk_id(),
            Accessor::F32(a) => a.thunk_id(),
            Accessor::F64(a) => a.thunk_id(),
            Accessor::Char(a) => a.thunk_id(),
            Accessor::Ref(a) => a.thunk_id(),
        }
    }
}

/// Builds accessors against one frozen catalog, loading every compiled
/// thunk into its own registry.
pub struct AccessorFactory {
    catalog: Arc<TypeCatalog>,
    registry: ThunkRegistry,
}

impl AccessorFactory {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            registry: ThunkRegistry::new(),
        }
    }

    /// Resolve, compile, load. Each call yields a fresh thunk; building the
    /// same signature twice yields two independent instances.
    pub fn build(
        &self,
        owner: TypeDefId,
        name: &str,
        params: &[ValueKind],
    ) -> Result<Accessor, BuildError> {
        let sig = resolve(&self.catalog, owner, name, params)?;
        self.compile_and_load(sig)
    }

    /// As [`build`](Self::build), but fail construction unless the resolved
    /// method's return category is exactly `expected`.
    pub fn build_expecting(
        &self,
        owner: TypeDefId,
        name: &str,
        params: &[ValueKind],
        expected: RetKind,
    ) -> Result<Accessor, BuildError> {
        let sig = resolve(&self.catalog, owner, name, params)?;
        if sig.ret != expected {
            return Err(BuildError::IncompatibleReturnType {
                name: sig.name,
                requested: expected,
                actual: sig.ret,
            });
        }
        self.compile_and_load(sig)
    }

    /// Build the slow reflective accessor for the same signature. Identical
    /// observable behavior, boxed dispatch on every call.
    pub fn reflect(
        &self,
        owner: TypeDefId,
        name: &str,
        params: &[ValueKind],
    ) -> Result<ReflectAccessor, BuildError> {
        let sig = resolve(&self.catalog, owner, name, params)?;
        Ok(ReflectAccessor::new(Arc::clone(&self.catalog), sig))
    }

    fn compile_and_load(&self, sig: MethodSig) -> Result<Accessor, BuildError> {
        let compiled = compile(&sig, self.catalog.type_name(sig.owner))?;
        let loaded = self.registry.load(compiled);
        Ok(wrap(Arc::clone(&self.catalog), loaded))
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &ThunkRegistry {
        &self.registry
    }
}

fn wrap(catalog: Arc<TypeCatalog>, thunk: Arc<LoadedThunk>) -> Accessor {
    let inner = ThunkHandle { catalog, thunk };
    match inner.thunk.ret() {
        RetKind::Void => Accessor::Void(VoidAccessor { inner }),
        RetKind::Bool => Accessor::Bool(BoolAccessor { inner }),
        RetKind::I8 => Accessor::I8(I8Accessor { inner }),
        RetKind::I16 => Accessor::I16(I16Accessor { inner }),
        RetKind::I32 => Accessor::I32(I32Accessor { inner }),
        RetKind::I64 => Accessor::I64(I64Accessor { inner }),
        RetKind::F32 => Accessor::F32(F32Accessor { inner }),
        RetKind::F64 => Accessor::F64(F64Accessor { inner }),
        RetKind::Char => Accessor::Char(CharAccessor { inner }),
        RetKind::Ref => Accessor::Ref(RefAccessor { inner }),
    }
}
