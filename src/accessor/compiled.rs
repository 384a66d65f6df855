// src/accessor/compiled.rs
//
// Per-category accessors over a loaded thunk. The N-argument path packs the
// boxed arguments into raw slots and jumps straight into generated code;
// the zero-argument path skips the slab entirely. Return values come back
// in machine registers, never boxed.

use std::sync::Arc;

use crate::catalog::TypeCatalog;
use crate::errors::InvokeError;
use crate::registry::{LoadedThunk, ThunkId};
use crate::value::{RawSlot, RetKind, Value};

use super::{Invoke, Target, resolve_target};

/// Shared state of every compiled accessor: the catalog (for the target
/// type check) and the loaded thunk.
pub(crate) struct ThunkHandle {
    pub(crate) catalog: Arc<TypeCatalog>,
    pub(crate) thunk: Arc<LoadedThunk>,
}

impl ThunkHandle {
    fn target_ptr(&self, target: Target<'_>) -> Result<*mut u8, InvokeError> {
        resolve_target(
            &self.catalog,
            self.thunk.dispatch(),
            self.thunk.owner(),
            target,
        )
    }
}

macro_rules! specialized_accessor {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $cat:ident, $invoke:ident, $invoke0:ident) => {
        $(#[$doc])*
        pub struct $name {
            pub(crate) inner: ThunkHandle,
        }

        impl $name {
            /// Invoke with an ordered argument list. Argument kinds are
            /// checked by the generated code, not up front.
            pub fn call(&self, target: Target<'_>, args: &[Value]) -> Result<$ty, InvokeError> {
                let target = self.inner.target_ptr(target)?;
                let slots = self.inner.thunk.pack_args(args)?;
                let mut fault: u64 = 0;
                let entry: extern "C" fn(*mut u8, *const RawSlot, *mut u64) -> $ty =
                    unsafe { std::mem::transmute(self.inner.thunk.entry()) };
                let out = entry(target, slots.as_ptr(), &mut fault);
                if fault != 0 {
                    return Err(self.inner.thunk.arg_fault(fault, args));
                }
                Ok(out)
            }

            /// Zero-argument fast path. Only zero-parameter signatures have
            /// one; anything else is an argument-count mismatch.
            pub fn call0(&self, target: Target<'_>) -> Result<$ty, InvokeError> {
                let target = self.inner.target_ptr(target)?;
                let entry = self.inner.thunk.compact_entry()?;
                let f: extern "C" fn(*mut u8) -> $ty = unsafe { std::mem::transmute(entry) };
                Ok(f(target))
            }

            pub fn thunk_id(&self) -> ThunkId {
                self.inner.thunk.id()
            }
        }

        impl Invoke for $name {
            fn category(&self) -> RetKind {
                RetKind::$cat
            }

            fn $invoke(&self, target: Target<'_>, args: &[Value]) -> Result<$ty, InvokeError> {
                self.call(target, args)
            }

            fn $invoke0(&self, target: Target<'_>) -> Result<$ty, InvokeError> {
                self.call0(target)
            }
        }
    };
}

specialized_accessor! {
    /// Void-category accessor: the call's only observable result is its
    /// side effect.
    VoidAccessor, (), Void, invoke_void, invoke_void_0
}
specialized_accessor!(BoolAccessor, bool, Bool, invoke_bool, invoke_bool_0);
specialized_accessor!(I8Accessor, i8, I8, invoke_i8, invoke_i8_0);
specialized_accessor!(I16Accessor, i16, I16, invoke_i16, invoke_i16_0);
specialized_accessor!(I32Accessor, i32, I32, invoke_i32, invoke_i32_0);
specialized_accessor!(I64Accessor, i64, I64, invoke_i64, invoke_i64_0);
specialized_accessor!(F32Accessor, f32, F32, invoke_f32, invoke_f32_0);
specialized_accessor!(F64Accessor, f64, F64, invoke_f64, invoke_f64_0);
specialized_accessor! {
    /// Reference-category accessor: propagates the possibly-null pointer
    /// result as-is.
    RefAccessor, *mut u8, Ref, invoke_ref, invoke_ref_0
}

/// Char-category accessor. The generated code returns the scalar value;
/// the wrapper rebuilds the `char`, panicking only if the target function
/// itself produced an invalid scalar, which is a defect in the registered
/// method, not a caller condition.
pub struct CharAccessor {
    pub(crate) inner: ThunkHandle,
}

impl CharAccessor {
    pub fn call(&self, target: Target<'_>, args: &[Value]) -> Result<char, InvokeError> {
        let target = self.inner.target_ptr(target)?;
        let slots = self.inner.thunk.pack_args(args)?;
        let mut fault: u64 = 0;
        let entry: extern "C" fn(*mut u8, *const RawSlot, *mut u64) -> u32 =
            unsafe { std::mem::transmute(self.inner.thunk.entry()) };
        let out = entry(target, slots.as_ptr(), &mut fault);
        if fault != 0 {
            return Err(self.inner.thunk.arg_fault(fault, args));
        }
        Ok(char::from_u32(out).expect("native call returned an invalid char scalar"))
    }

    pub fn call0(&self, target: Target<'_>) -> Result<char, InvokeError> {
        let target = self.inner.target_ptr(target)?;
        let entry = self.inner.thunk.compact_entry()?;
        let f: extern "C" fn(*mut u8) -> u32 = unsafe { std::mem::transmute(entry) };
        let out = f(target);
        Ok(char::from_u32(out).expect("native call returned an invalid char scalar"))
    }

    pub fn thunk_id(&self) -> ThunkId {
        self.inner.thunk.id()
    }
}

impl Invoke for CharAccessor {
    fn category(&self) -> RetKind {
        RetKind::Char
    }

    fn invoke_char(&self, target: Target<'_>, args: &[Value]) -> Result<char, InvokeError> {
        self.call(target, args)
    }

    fn invoke_char_0(&self, target: Target<'_>) -> Result<char, InvokeError> {
        self.call0(target)
    }
}
