// src/accessor/reflect.rs
//
// The slow baseline: late-bound dispatch through the catalog's boxed
// trampoline, with coercion of every argument and boxing of every result on
// every call. Exists so the compiled thunks have something to be compared
// against; nothing here is ever on the hot path.

use std::sync::Arc;

use crate::catalog::{MethodSig, TypeCatalog};
use crate::errors::InvokeError;
use crate::value::{RetKind, Value};

use super::{Invoke, Target, resolve_target};

pub struct ReflectAccessor {
    catalog: Arc<TypeCatalog>,
    sig: MethodSig,
}

impl ReflectAccessor {
    pub(crate) fn new(catalog: Arc<TypeCatalog>, sig: MethodSig) -> Self {
        Self { catalog, sig }
    }

    pub fn category(&self) -> RetKind {
        self.sig.ret
    }

    /// The generic boxed invocation: target check, per-argument coercion,
    /// boxed result (`None` for void).
    pub fn invoke(
        &self,
        target: Target<'_>,
        args: &[Value],
    ) -> Result<Option<Value>, InvokeError> {
        let ptr = resolve_target(&self.catalog, self.sig.dispatch, self.sig.owner, target)?;
        let decl = self.catalog.method(self.sig.declaring, self.sig.method);
        (decl.boxed)(ptr, args)
    }

    fn wrong(&self, requested: RetKind) -> InvokeError {
        InvokeError::WrongCategory {
            bound: self.sig.ret,
            requested,
        }
    }
}

macro_rules! reflect_category {
    ($invoke:ident, $invoke0:ident, $ty:ty, $cat:ident) => {
        fn $invoke(&self, target: Target<'_>, args: &[Value]) -> Result<$ty, InvokeError> {
            match self.invoke(target, args)? {
                Some(Value::$cat(v)) => Ok(v),
                _ => Err(self.wrong(RetKind::$cat)),
            }
        }

        fn $invoke0(&self, target: Target<'_>) -> Result<$ty, InvokeError> {
            self.$invoke(target, &[])
        }
    };
}

impl Invoke for ReflectAccessor {
    fn category(&self) -> RetKind {
        self.sig.ret
    }

    fn invoke_void(&self, target: Target<'_>, args: &[Value]) -> Result<(), InvokeError> {
        match self.invoke(target, args)? {
            None => Ok(()),
            Some(_) => Err(self.wrong(RetKind::Void)),
        }
    }

    fn invoke_void_0(&self, target: Target<'_>) -> Result<(), InvokeError> {
        self.invoke_void(target, &[])
    }

    reflect_category!(invoke_bool, invoke_bool_0, bool, Bool);
    reflect_category!(invoke_i8, invoke_i8_0, i8, I8);
    reflect_category!(invoke_i16, invoke_i16_0, i16, I16);
    reflect_category!(invoke_i32, invoke_i32_0, i32, I32);
    reflect_category!(invoke_i64, invoke_i64_0, i64, I64);
    reflect_category!(invoke_f32, invoke_f32_0, f32, F32);
    reflect_category!(invoke_f64, invoke_f64_0, f64, F64);
    reflect_category!(invoke_char, invoke_char_0, char, Char);
    reflect_category!(invoke_ref, invoke_ref_0, *mut u8, Ref);
}
