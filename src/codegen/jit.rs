// src/codegen/jit.rs

use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};

use crate::errors::BuildError;

/// One JIT module, owned by a single thunk compilation. Keeping every
/// compiled unit in its own module lets distinct compilations run
/// concurrently and gives each loaded thunk sole ownership of its code
/// memory.
pub(crate) struct ThunkJit {
    pub module: JITModule,
}

impl ThunkJit {
    pub fn new() -> Self {
        let mut flag_builder = settings::builder();
        flag_builder.set("use_colocated_libcalls", "false").unwrap();
        flag_builder.set("is_pic", "false").unwrap();

        let isa_builder = cranelift_native::builder().unwrap_or_else(|msg| {
            panic!("native ISA not available: {}", msg);
        });
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .unwrap();

        let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        Self {
            module: JITModule::new(builder),
        }
    }

    /// Get the pointer type for the target
    pub fn pointer_type(&self) -> Type {
        self.module.target_config().pointer_type()
    }

    /// Create a function signature with given parameters and return type
    pub fn create_signature(&self, params: &[Type], ret: Option<Type>) -> Signature {
        let mut sig = self.module.make_signature();
        for &param in params {
            sig.params.push(AbiParam::new(param));
        }
        if let Some(ret_type) = ret {
            sig.returns.push(AbiParam::new(ret_type));
        }
        sig
    }

    pub fn declare_function(&mut self, name: &str, sig: &Signature) -> Result<FuncId, BuildError> {
        self.module
            .declare_function(name, Linkage::Local, sig)
            .map_err(|e| BuildError::codegen(name, e))
    }

    /// Define a function (after building IR)
    pub fn define_function(
        &mut self,
        name: &str,
        func_id: FuncId,
        ctx: &mut codegen::Context,
    ) -> Result<(), BuildError> {
        self.module
            .define_function(func_id, ctx)
            .map(|_| ())
            .map_err(|e| BuildError::codegen(name, e))
    }

    /// Finalize all functions so their code pointers can be taken
    pub fn finalize(&mut self, name: &str) -> Result<(), BuildError> {
        self.module
            .finalize_definitions()
            .map_err(|e| BuildError::codegen(name, e))
    }

    pub fn function_ptr(&self, func_id: FuncId) -> *const u8 {
        self.module.get_finalized_function(func_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_type_is_native() {
        let jit = ThunkJit::new();
        assert!(jit.pointer_type() == types::I64 || jit.pointer_type() == types::I32);
    }

    #[test]
    fn build_define_and_call() {
        let mut jit = ThunkJit::new();

        let sig = jit.create_signature(&[types::I64], Some(types::I64));
        let func_id = jit.declare_function("succ", &sig).unwrap();

        let mut ctx = jit.module.make_context();
        ctx.func.signature = sig;
        {
            let mut fbc = FunctionBuilderContext::new();
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut fbc);
            let entry = builder.create_block();
            builder.append_block_params_for_function_params(entry);
            builder.switch_to_block(entry);
            builder.seal_block(entry);

            let v = builder.block_params(entry)[0];
            let one = builder.ins().iconst(types::I64, 1);
            let sum = builder.ins().iadd(v, one);
            builder.ins().return_(&[sum]);
            builder.finalize();
        }

        jit.define_function("succ", func_id, &mut ctx).unwrap();
        jit.finalize("succ").unwrap();

        let fn_ptr = jit.function_ptr(func_id);
        let succ: extern "C" fn(i64) -> i64 = unsafe { std::mem::transmute(fn_ptr) };
        assert_eq!(succ(41), 42);
    }
}
