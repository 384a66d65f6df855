// src/catalog/native.rs
//
// Typed registration layer. Methods are registered as plain `extern "C"`
// function pointers; these traits recover the parameter kinds, return
// category, and raw entry point from the pointer's own type, and build the
// late-bound boxed trampoline the reflective accessor dispatches through.

use smallvec::{SmallVec, smallvec};

use crate::errors::InvokeError;
use crate::value::{RetKind, Value, ValueKind};

/// A Rust type usable as a native parameter. One impl per [`ValueKind`].
pub trait AbiValue: Copy + 'static {
    const KIND: ValueKind;

    /// Exact-category coercion from the boxed representation. No widening.
    fn from_value(v: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

macro_rules! impl_abi_value {
    ($($ty:ty => $kind:ident;)+) => {$(
        impl AbiValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(v: &Value) -> Option<Self> {
                match *v {
                    Value::$kind(x) => Some(x),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$kind(self)
            }
        }
    )+};
}

impl_abi_value! {
    bool => Bool;
    i8 => I8;
    i16 => I16;
    i32 => I32;
    i64 => I64;
    f32 => F32;
    f64 => F64;
    char => Char;
    *mut u8 => Ref;
}

/// A Rust type usable as a native return. The [`AbiValue`] types plus `()`.
pub trait AbiRet: 'static {
    const KIND: RetKind;

    fn into_ret(self) -> Option<Value>;
}

impl AbiRet for () {
    const KIND: RetKind = RetKind::Void;

    fn into_ret(self) -> Option<Value> {
        None
    }
}

macro_rules! impl_abi_ret {
    ($($ty:ty),+ $(,)?) => {$(
        impl AbiRet for $ty {
            const KIND: RetKind = RetKind::from_value_kind(<$ty as AbiValue>::KIND);

            fn into_ret(self) -> Option<Value> {
                Some(AbiValue::into_value(self))
            }
        }
    )+};
}

impl_abi_ret!(bool, i8, i16, i32, i64, f32, f64, char, *mut u8);

/// Late-bound call path stored per method: re-checks the argument list and
/// coerces every value on every call, then boxes the result back up.
pub(crate) type BoxedInvoker =
    Box<dyn Fn(*mut u8, &[Value]) -> Result<Option<Value>, InvokeError> + Send + Sync>;

/// An `extern "C"` function registrable as an instance method. The first
/// parameter is the target pointer; the remaining parameters are the
/// declared signature.
pub trait InstanceFn: Copy + Send + Sync + 'static {
    fn param_kinds(&self) -> SmallVec<[ValueKind; 8]>;
    fn ret_kind(&self) -> RetKind;
    fn raw_ptr(&self) -> *const u8;
    fn boxed(&self) -> BoxedInvoker;
}

/// An `extern "C"` function registrable as a static method. No target
/// parameter at all.
pub trait StaticFn: Copy + Send + Sync + 'static {
    fn param_kinds(&self) -> SmallVec<[ValueKind; 8]>;
    fn ret_kind(&self) -> RetKind;
    fn raw_ptr(&self) -> *const u8;
    fn boxed(&self) -> BoxedInvoker;
}

macro_rules! unbox_args {
    ($args:ident, $($p:ident),*) => {
        let kinds: &[ValueKind] = &[$(<$p as AbiValue>::KIND),*];
        if $args.len() != kinds.len() {
            return Err(InvokeError::ArgumentCount {
                expected: kinds.len(),
                found: $args.len(),
            });
        }
        #[allow(unused_mut, unused_variables)]
        let mut index = 0usize;
        $(
            let $p: $p = <$p as AbiValue>::from_value(&$args[index]).ok_or(
                InvokeError::ArgumentType {
                    index,
                    expected: <$p as AbiValue>::KIND,
                    found: $args[index].kind(),
                },
            )?;
            #[allow(unused_assignments)]
            {
                index += 1;
            }
        )*
    };
}

macro_rules! impl_native_fns {
    ($(($($p:ident),*))+) => {$(
        impl<T: 'static, R: AbiRet, $($p: AbiValue),*> InstanceFn
            for extern "C" fn(*mut T, $($p),*) -> R
        {
            fn param_kinds(&self) -> SmallVec<[ValueKind; 8]> {
                smallvec![$(<$p as AbiValue>::KIND),*]
            }

            fn ret_kind(&self) -> RetKind {
                R::KIND
            }

            fn raw_ptr(&self) -> *const u8 {
                *self as *const u8
            }

            fn boxed(&self) -> BoxedInvoker {
                let f = *self;
                Box::new(move |target, args| {
                    unbox_args!(args, $($p),*);
                    let out = f(target.cast::<T>(), $($p),*);
                    Ok(out.into_ret())
                })
            }
        }

        impl<R: AbiRet, $($p: AbiValue),*> StaticFn for extern "C" fn($($p),*) -> R {
            fn param_kinds(&self) -> SmallVec<[ValueKind; 8]> {
                smallvec![$(<$p as AbiValue>::KIND),*]
            }

            fn ret_kind(&self) -> RetKind {
                R::KIND
            }

            fn raw_ptr(&self) -> *const u8 {
                *self as *const u8
            }

            fn boxed(&self) -> BoxedInvoker {
                let f = *self;
                Box::new(move |target, args| {
                    let _ = target;
                    unbox_args!(args, $($p),*);
                    let out = f($($p),*);
                    Ok(out.into_ret())
                })
            }
        }
    )+};
}

impl_native_fns! {
    ()
    (A0)
    (A0, A1)
    (A0, A1, A2)
    (A0, A1, A2, A3)
    (A0, A1, A2, A3, A4)
    (A0, A1, A2, A3, A4, A5)
    (A0, A1, A2, A3, A4, A5, A6)
    (A0, A1, A2, A3, A4, A5, A6, A7)
}
