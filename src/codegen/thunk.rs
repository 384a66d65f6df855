// src/codegen/thunk.rs
//
// Emit the specialized calling convention for one resolved signature.
//
// Every thunk gets an N-argument entry: (target, args, err) -> ret. The
// target parameter is always present in the signature but never loaded for
// static dispatch. Each argument slot is tag-checked against the declared
// kind; a mismatch branches to a shared bail block that records the failing
// slot (index + 1) through the err pointer and returns the category's zero
// value. Payloads are narrowed/bitcast to the exact declared kind and the
// target function is called indirectly through its embedded address.
//
// Zero-parameter signatures additionally get a compact entry, (target) ->
// ret, with no argument slab and no err pointer.

use cranelift::codegen::ir::BlockArg;
use cranelift::prelude::*;
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Module};
use tracing::debug;

use crate::catalog::{Dispatch, MethodSig};
use crate::errors::BuildError;
use crate::registry::ThunkId;
use crate::value::{RetKind, ValueKind};

use super::jit::ThunkJit;

/// A finalized generated unit, ready for the loader. Owns the module whose
/// memory backs the entry pointers.
pub(crate) struct CompiledThunk {
    pub id: ThunkId,
    pub symbol: String,
    pub sig: MethodSig,
    pub entry: *const u8,
    pub entry_zero: Option<*const u8>,
    pub module: JITModule,
}

// Safety: the module is finalized before compile() returns and the entry
// pointers address immutable executable memory.
unsafe impl Send for CompiledThunk {}

/// Machine type for a parameter kind.
fn abi_type(kind: ValueKind, ptr_ty: Type) -> Type {
    match kind {
        ValueKind::Bool | ValueKind::I8 => types::I8,
        ValueKind::I16 => types::I16,
        ValueKind::I32 => types::I32,
        ValueKind::I64 => types::I64,
        ValueKind::F32 => types::F32,
        ValueKind::F64 => types::F64,
        ValueKind::Char => types::I32,
        ValueKind::Ref => ptr_ty,
    }
}

fn abi_ret_type(ret: RetKind, ptr_ty: Type) -> Option<Type> {
    ret.value_kind().map(|kind| abi_type(kind, ptr_ty))
}

/// Compile both calling shapes for `sig` into a fresh module and hand back
/// the finalized unit. `owner_name` only feeds the generated symbol name.
pub(crate) fn compile(sig: &MethodSig, owner_name: &str) -> Result<CompiledThunk, BuildError> {
    let mut jit = ThunkJit::new();
    let ptr_ty = jit.pointer_type();

    let id = ThunkId::next();
    let symbol = format!("accessor__{}__{}__{}", owner_name, sig.name, id.raw());

    // Native signature of the function being wrapped.
    let mut callee_params = Vec::with_capacity(sig.params.len() + 1);
    if sig.dispatch == Dispatch::Instance {
        callee_params.push(ptr_ty);
    }
    callee_params.extend(sig.params.iter().map(|&k| abi_type(k, ptr_ty)));
    let callee_sig = jit.create_signature(&callee_params, abi_ret_type(sig.ret, ptr_ty));

    let entry_name = format!("{symbol}__n");
    let entry_sig = jit.create_signature(&[ptr_ty, ptr_ty, ptr_ty], abi_ret_type(sig.ret, ptr_ty));
    let entry_id = jit.declare_function(&entry_name, &entry_sig)?;
    build_entry(&mut jit, &entry_name, entry_id, &entry_sig, &callee_sig, sig, ptr_ty)?;

    let zero_id = if sig.params.is_empty() {
        let zero_name = format!("{symbol}__0");
        let zero_sig = jit.create_signature(&[ptr_ty], abi_ret_type(sig.ret, ptr_ty));
        let zero_id = jit.declare_function(&zero_name, &zero_sig)?;
        build_compact_entry(&mut jit, &zero_name, zero_id, &zero_sig, &callee_sig, sig, ptr_ty)?;
        Some(zero_id)
    } else {
        None
    };

    jit.finalize(&symbol)?;

    let entry = jit.function_ptr(entry_id);
    let entry_zero = zero_id.map(|fid| jit.function_ptr(fid));

    debug!(
        symbol = symbol.as_str(),
        id = id.raw(),
        arity = sig.params.len(),
        ret = ?sig.ret,
        "compiled thunk"
    );

    Ok(CompiledThunk {
        id,
        symbol,
        sig: sig.clone(),
        entry,
        entry_zero,
        module: jit.module,
    })
}

/// The N-argument entry: unbox each slot, then call.
fn build_entry(
    jit: &mut ThunkJit,
    name: &str,
    func_id: FuncId,
    entry_sig: &Signature,
    callee_sig: &Signature,
    sig: &MethodSig,
    ptr_ty: Type,
) -> Result<(), BuildError> {
    let mut ctx = jit.module.make_context();
    ctx.func.signature = entry_sig.clone();
    {
        let mut fbc = FunctionBuilderContext::new();
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut fbc);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        let params = builder.block_params(entry).to_vec();
        let target = params[0];
        let args_ptr = params[1];
        let err_ptr = params[2];

        // Shared mismatch exit, parameterized by the failing slot index + 1.
        let bail = (!sig.params.is_empty()).then(|| {
            let block = builder.create_block();
            builder.append_block_param(block, types::I64);
            block
        });

        let mut call_args = Vec::with_capacity(sig.params.len() + 1);
        if sig.dispatch == Dispatch::Instance {
            call_args.push(target);
        }

        for (i, &kind) in sig.params.iter().enumerate() {
            let off = (i * 16) as i32;
            let tag = builder.ins().load(types::I64, MemFlags::new(), args_ptr, off);
            let mismatch = builder
                .ins()
                .icmp_imm(IntCC::NotEqual, tag, kind.tag() as i64);
            let payload = builder
                .ins()
                .load(types::I64, MemFlags::new(), args_ptr, off + 8);
            let value = coerce_payload(&mut builder, kind, payload, ptr_ty);

            let next = builder.create_block();
            let slot = builder.ins().iconst(types::I64, (i + 1) as i64);
            builder.ins().brif(
                mismatch,
                bail.expect("bail block exists when params are present"),
                &[BlockArg::from(slot)],
                next,
                &[],
            );
            builder.switch_to_block(next);
            call_args.push(value);
        }

        let sig_ref = builder.import_signature(callee_sig.clone());
        let callee = builder.ins().iconst(ptr_ty, sig.ptr as i64);
        let call = builder.ins().call_indirect(sig_ref, callee, &call_args);
        let results = builder.inst_results(call).to_vec();
        match results.first() {
            Some(&value) => builder.ins().return_(&[value]),
            None => builder.ins().return_(&[]),
        };

        if let Some(bail) = bail {
            builder.switch_to_block(bail);
            let slot = builder.block_params(bail)[0];
            builder.ins().store(MemFlags::new(), slot, err_ptr, 0);
            match zero_return(&mut builder, sig.ret, ptr_ty) {
                Some(zero) => builder.ins().return_(&[zero]),
                None => builder.ins().return_(&[]),
            };
        }

        builder.seal_all_blocks();
        builder.finalize();
    }
    jit.define_function(name, func_id, &mut ctx)
}

/// The zero-parameter compact entry: no slab, no err pointer, just the call.
fn build_compact_entry(
    jit: &mut ThunkJit,
    name: &str,
    func_id: FuncId,
    zero_sig: &Signature,
    callee_sig: &Signature,
    sig: &MethodSig,
    ptr_ty: Type,
) -> Result<(), BuildError> {
    let mut ctx = jit.module.make_context();
    ctx.func.signature = zero_sig.clone();
    {
        let mut fbc = FunctionBuilderContext::new();
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut fbc);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        let target = builder.block_params(entry)[0];

        let mut call_args: Vec<Value> = Vec::new();
        if sig.dispatch == Dispatch::Instance {
            call_args.push(target);
        }
        let sig_ref = builder.import_signature(callee_sig.clone());
        let callee = builder.ins().iconst(ptr_ty, sig.ptr as i64);
        let call = builder.ins().call_indirect(sig_ref, callee, &call_args);
        let results = builder.inst_results(call).to_vec();
        match results.first() {
            Some(&value) => builder.ins().return_(&[value]),
            None => builder.ins().return_(&[]),
        };

        builder.seal_all_blocks();
        builder.finalize();
    }
    jit.define_function(name, func_id, &mut ctx)
}

/// Narrow a 64-bit payload to the declared kind.
fn coerce_payload(
    builder: &mut FunctionBuilder,
    kind: ValueKind,
    payload: Value,
    ptr_ty: Type,
) -> Value {
    match kind {
        ValueKind::Bool | ValueKind::I8 => builder.ins().ireduce(types::I8, payload),
        ValueKind::I16 => builder.ins().ireduce(types::I16, payload),
        ValueKind::I32 | ValueKind::Char => builder.ins().ireduce(types::I32, payload),
        ValueKind::I64 => payload,
        ValueKind::F32 => {
            let bits = builder.ins().ireduce(types::I32, payload);
            builder.ins().bitcast(types::F32, MemFlags::new(), bits)
        }
        ValueKind::F64 => builder.ins().bitcast(types::F64, MemFlags::new(), payload),
        ValueKind::Ref => {
            if ptr_ty == types::I64 {
                payload
            } else {
                builder.ins().ireduce(ptr_ty, payload)
            }
        }
    }
}

fn zero_return(builder: &mut FunctionBuilder, ret: RetKind, ptr_ty: Type) -> Option<Value> {
    match ret {
        RetKind::Void => None,
        RetKind::F32 => Some(builder.ins().f32const(0.0)),
        RetKind::F64 => Some(builder.ins().f64const(0.0)),
        other => {
            let kind = other
                .value_kind()
                .expect("non-void category has a value kind");
            Some(builder.ins().iconst(abi_type(kind, ptr_ty), 0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, Visibility, resolve};
    use crate::value::{RawSlot, Value as Boxed, ValueKind};

    struct Grid;

    extern "C" fn block_id(_this: *mut Grid, x: i32, y: i32, z: i32) -> i32 {
        x + y + z
    }

    extern "C" fn level(_this: *mut Grid) -> i64 {
        9
    }

    fn compiled(name: &str, params: &[ValueKind]) -> CompiledThunk {
        let mut builder = CatalogBuilder::new();
        let grid = builder.declare_type("Grid", None);
        builder.declare_method(
            grid,
            "block_id",
            Visibility::Public,
            block_id as extern "C" fn(*mut Grid, i32, i32, i32) -> i32,
        );
        builder.declare_method(
            grid,
            "level",
            Visibility::Public,
            level as extern "C" fn(*mut Grid) -> i64,
        );
        let catalog = builder.build();
        let sig = resolve(&catalog, grid, name, params).unwrap();
        compile(&sig, "Grid").unwrap()
    }

    #[test]
    fn raw_entry_unboxes_and_calls() {
        let thunk = compiled("block_id", &[ValueKind::I32; 3]);
        let slots: Vec<RawSlot> = [Boxed::I32(5), Boxed::I32(10), Boxed::I32(15)]
            .iter()
            .map(Boxed::raw_slot)
            .collect();
        let mut fault: u64 = 0;
        let entry: extern "C" fn(*mut u8, *const RawSlot, *mut u64) -> i32 =
            unsafe { std::mem::transmute(thunk.entry) };
        let out = entry(std::ptr::null_mut(), slots.as_ptr(), &mut fault);
        assert_eq!(fault, 0);
        assert_eq!(out, 30);
    }

    #[test]
    fn raw_entry_reports_tag_mismatch() {
        let thunk = compiled("block_id", &[ValueKind::I32; 3]);
        let slots: Vec<RawSlot> = [Boxed::I32(5), Boxed::F64(10.0), Boxed::I32(15)]
            .iter()
            .map(Boxed::raw_slot)
            .collect();
        let mut fault: u64 = 0;
        let entry: extern "C" fn(*mut u8, *const RawSlot, *mut u64) -> i32 =
            unsafe { std::mem::transmute(thunk.entry) };
        let out = entry(std::ptr::null_mut(), slots.as_ptr(), &mut fault);
        assert_eq!(fault, 2);
        assert_eq!(out, 0);
    }

    #[test]
    fn compact_entry_exists_only_for_zero_params() {
        let with_params = compiled("block_id", &[ValueKind::I32; 3]);
        assert!(with_params.entry_zero.is_none());

        let niladic = compiled("level", &[]);
        let zero = niladic.entry_zero.expect("compact entry for zero params");
        let f: extern "C" fn(*mut u8) -> i64 = unsafe { std::mem::transmute(zero) };
        assert_eq!(f(std::ptr::null_mut()), 9);
    }

    #[test]
    fn repeated_compiles_get_distinct_identities() {
        let a = compiled("level", &[]);
        let b = compiled("level", &[]);
        assert_ne!(a.id, b.id);
        assert_ne!(a.symbol, b.symbol);
    }
}
