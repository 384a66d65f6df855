// src/registry.rs
//
// Identity allocation and the process-wide thunk registry. The registry is
// an owned object, not ambient global state; only the identity counter is
// shared process-wide so that repeated compilations can never collide on a
// symbol name.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cranelift_jit::JITModule;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use smallvec::SmallVec;
use tracing::debug;

use crate::catalog::{Dispatch, MethodSig, TypeDefId};
use crate::codegen::thunk::CompiledThunk;
use crate::errors::InvokeError;
use crate::value::{RawSlot, RetKind, Value};

static NEXT_THUNK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThunkId(u64);

impl ThunkId {
    pub(crate) fn next() -> Self {
        Self(NEXT_THUNK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A loaded, invocable thunk. Immutable after load; the owned module keeps
/// the code memory alive for the life of the instance.
pub struct LoadedThunk {
    id: ThunkId,
    symbol: String,
    sig: MethodSig,
    entry: *const u8,
    entry_zero: Option<*const u8>,
    _module: JITModule,
}

// Safety: the module is finalized before load and never touched again; the
// entry pointers address immutable executable memory.
unsafe impl Send for LoadedThunk {}
unsafe impl Sync for LoadedThunk {}

impl LoadedThunk {
    fn new(compiled: CompiledThunk) -> Self {
        Self {
            id: compiled.id,
            symbol: compiled.symbol,
            sig: compiled.sig,
            entry: compiled.entry,
            entry_zero: compiled.entry_zero,
            _module: compiled.module,
        }
    }

    pub fn id(&self) -> ThunkId {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn ret(&self) -> RetKind {
        self.sig.ret
    }

    pub fn arity(&self) -> usize {
        self.sig.params.len()
    }

    pub fn dispatch(&self) -> Dispatch {
        self.sig.dispatch
    }

    pub fn owner(&self) -> TypeDefId {
        self.sig.owner
    }

    pub(crate) fn entry(&self) -> *const u8 {
        self.entry
    }

    /// The compact entry, or the count-mismatch error a zero-argument call
    /// on a parameterized signature deserves.
    pub(crate) fn compact_entry(&self) -> Result<*const u8, InvokeError> {
        self.entry_zero.ok_or(InvokeError::ArgumentCount {
            expected: self.arity(),
            found: 0,
        })
    }

    /// Count-check the argument list and flatten it into raw slots.
    /// Kind checks are the generated code's job.
    pub(crate) fn pack_args(&self, args: &[Value]) -> Result<SmallVec<[RawSlot; 8]>, InvokeError> {
        if args.len() != self.arity() {
            return Err(InvokeError::ArgumentCount {
                expected: self.arity(),
                found: args.len(),
            });
        }
        Ok(args.iter().map(Value::raw_slot).collect())
    }

    /// Turn a nonzero fault word written by the thunk's tag check back into
    /// the per-argument error.
    pub(crate) fn arg_fault(&self, fault: u64, args: &[Value]) -> InvokeError {
        let index = (fault - 1) as usize;
        InvokeError::ArgumentType {
            index,
            expected: self.sig.params[index],
            found: args[index].kind(),
        }
    }
}

/// Owned identity → instance map. Lives as long as its factory; entries are
/// never evicted.
#[derive(Default)]
pub struct ThunkRegistry {
    thunks: DashMap<ThunkId, Arc<LoadedThunk>>,
}

impl ThunkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize a compiled unit into an invocable instance and register
    /// it. Each identity loads exactly once; a second load of the same id
    /// can only mean a defect in identity allocation and panics.
    pub(crate) fn load(&self, compiled: CompiledThunk) -> Arc<LoadedThunk> {
        let loaded = Arc::new(LoadedThunk::new(compiled));
        match self.thunks.entry(loaded.id()) {
            Entry::Occupied(_) => {
                panic!("thunk identity {} loaded twice", loaded.id().raw());
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&loaded));
            }
        }
        debug!(id = loaded.id().raw(), symbol = loaded.symbol(), "loaded thunk");
        loaded
    }

    pub fn get(&self, id: ThunkId) -> Option<Arc<LoadedThunk>> {
        self.thunks.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.thunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thunks.is_empty()
    }
}
