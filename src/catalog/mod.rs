// src/catalog/mod.rs
//
// Explicit method-metadata catalog. Owner types, parent links, and method
// declarations are registered up front and frozen; resolution queries the
// catalog instead of walking live type information.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::value::{RetKind, ValueKind};

mod native;
pub mod resolve;

pub use native::{AbiRet, AbiValue, InstanceFn, StaticFn};
pub use resolve::resolve;

pub(crate) use native::BoxedInvoker;

/// Identity of a registered owner type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDefId(u32);

impl TypeDefId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Identity of a method within its declaring type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u32);

impl MethodId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Declared visibility. Recorded for fidelity with the declaration site;
/// resolution deliberately ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Called with a target object; the native function's first parameter
    /// is the target pointer.
    Instance,
    /// No target. The native function takes only its declared parameters.
    Static,
}

/// One declared method: signature metadata, the raw native entry point, and
/// the boxed trampoline the reflective path dispatches through.
pub(crate) struct MethodDecl {
    pub name: String,
    pub visibility: Visibility,
    pub dispatch: Dispatch,
    pub params: SmallVec<[ValueKind; 8]>,
    pub ret: RetKind,
    pub ptr: *const u8,
    pub boxed: BoxedInvoker,
}

// Safety: `ptr` is a stateless `extern "C"` function pointer and the boxed
// trampoline is already Send+Sync.
unsafe impl Send for MethodDecl {}
unsafe impl Sync for MethodDecl {}

struct TypeDecl {
    name: String,
    parent: Option<TypeDefId>,
    methods: Vec<MethodDecl>,
}

/// Frozen catalog. Built once via [`CatalogBuilder`], then shared behind an
/// `Arc` and only ever queried.
pub struct TypeCatalog {
    types: Vec<TypeDecl>,
    by_name: FxHashMap<String, TypeDefId>,
}

impl TypeCatalog {
    pub fn contains(&self, id: TypeDefId) -> bool {
        (id.index() as usize) < self.types.len()
    }

    pub fn type_id(&self, name: &str) -> Option<TypeDefId> {
        self.by_name.get(name).copied()
    }

    pub fn type_name(&self, id: TypeDefId) -> &str {
        self.types
            .get(id.index() as usize)
            .map(|t| t.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn parent(&self, id: TypeDefId) -> Option<TypeDefId> {
        self.types.get(id.index() as usize)?.parent
    }

    /// Is `runtime` the type `owner` itself, or a descendant of it?
    pub fn is_instance_of(&self, runtime: TypeDefId, owner: TypeDefId) -> bool {
        let mut cur = self.contains(runtime).then_some(runtime);
        while let Some(ty) = cur {
            if ty == owner {
                return true;
            }
            cur = self.parent(ty);
        }
        false
    }

    /// Exact-match lookup among the methods declared directly on `ty`.
    /// Name and the full parameter-kind list must match; assignability and
    /// visibility play no part.
    pub(crate) fn find_declared(
        &self,
        ty: TypeDefId,
        name: &str,
        params: &[ValueKind],
    ) -> Option<MethodId> {
        let decl = self.types.get(ty.index() as usize)?;
        decl.methods
            .iter()
            .position(|m| m.name == name && m.params.as_slice() == params)
            .map(|i| MethodId(i as u32))
    }

    pub(crate) fn method(&self, ty: TypeDefId, id: MethodId) -> &MethodDecl {
        &self.types[ty.index() as usize].methods[id.index() as usize]
    }
}

/// Builder for the catalog. Parent types must be declared before children.
#[derive(Default)]
pub struct CatalogBuilder {
    types: Vec<TypeDecl>,
    by_name: FxHashMap<String, TypeDefId>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_type(&mut self, name: &str, parent: Option<TypeDefId>) -> TypeDefId {
        if let Some(parent) = parent {
            assert!(
                (parent.index() as usize) < self.types.len(),
                "parent type {:?} declared after child '{}'",
                parent,
                name
            );
        }
        let id = TypeDefId(self.types.len() as u32);
        self.types.push(TypeDecl {
            name: name.to_string(),
            parent,
            methods: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Register an instance method. The parameter kinds, return category,
    /// raw entry point, and reflective trampoline are all derived from the
    /// function's own type, so they cannot disagree.
    pub fn declare_method<F: InstanceFn>(
        &mut self,
        owner: TypeDefId,
        name: &str,
        visibility: Visibility,
        f: F,
    ) -> MethodId {
        self.push_method(
            owner,
            MethodDecl {
                name: name.to_string(),
                visibility,
                dispatch: Dispatch::Instance,
                params: f.param_kinds(),
                ret: f.ret_kind(),
                ptr: f.raw_ptr(),
                boxed: f.boxed(),
            },
        )
    }

    /// Register a static method: no target, no target parameter.
    pub fn declare_static<F: StaticFn>(
        &mut self,
        owner: TypeDefId,
        name: &str,
        visibility: Visibility,
        f: F,
    ) -> MethodId {
        self.push_method(
            owner,
            MethodDecl {
                name: name.to_string(),
                visibility,
                dispatch: Dispatch::Static,
                params: f.param_kinds(),
                ret: f.ret_kind(),
                ptr: f.raw_ptr(),
                boxed: f.boxed(),
            },
        )
    }

    fn push_method(&mut self, owner: TypeDefId, decl: MethodDecl) -> MethodId {
        let ty = self
            .types
            .get_mut(owner.index() as usize)
            .unwrap_or_else(|| panic!("method '{}' declared on unknown type {:?}", decl.name, owner));
        ty.methods.push(decl);
        MethodId((ty.methods.len() - 1) as u32)
    }

    pub fn build(self) -> TypeCatalog {
        TypeCatalog {
            types: self.types,
            by_name: self.by_name,
        }
    }
}

/// Resolved signature: one declared method, pinned to the type the ancestor
/// walk found it on.
#[derive(Clone)]
pub struct MethodSig {
    /// The type resolution was requested against.
    pub owner: TypeDefId,
    /// The type the method is declared on (owner or an ancestor).
    pub declaring: TypeDefId,
    pub method: MethodId,
    pub name: String,
    pub params: SmallVec<[ValueKind; 8]>,
    pub ret: RetKind,
    pub dispatch: Dispatch,
    pub(crate) ptr: *const u8,
}

impl MethodSig {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

// Safety: same as MethodDecl; `ptr` is a stateless function pointer.
unsafe impl Send for MethodSig {}
unsafe impl Sync for MethodSig {}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn double_it(_this: *mut u8, v: i32) -> i32 {
        v * 2
    }

    extern "C" fn forty_two() -> i64 {
        42
    }

    #[test]
    fn declare_and_find() {
        let mut builder = CatalogBuilder::new();
        let base = builder.declare_type("Base", None);
        builder.declare_method(
            base,
            "double",
            Visibility::Public,
            double_it as extern "C" fn(*mut u8, i32) -> i32,
        );
        let catalog = builder.build();

        let found = catalog.find_declared(base, "double", &[ValueKind::I32]);
        assert!(found.is_some());
        assert!(catalog.find_declared(base, "double", &[ValueKind::I64]).is_none());
        assert!(catalog.find_declared(base, "missing", &[]).is_none());
    }

    #[test]
    fn static_methods_have_no_target_parameter() {
        let mut builder = CatalogBuilder::new();
        let ty = builder.declare_type("Util", None);
        let mid = builder.declare_static(
            ty,
            "forty_two",
            Visibility::Public,
            forty_two as extern "C" fn() -> i64,
        );
        let catalog = builder.build();

        let decl = catalog.method(ty, mid);
        assert_eq!(decl.dispatch, Dispatch::Static);
        assert!(decl.params.is_empty());
        assert_eq!(decl.ret, RetKind::I64);
    }

    #[test]
    fn instance_of_walks_parent_links() {
        let mut builder = CatalogBuilder::new();
        let a = builder.declare_type("A", None);
        let b = builder.declare_type("B", Some(a));
        let c = builder.declare_type("C", Some(b));
        let other = builder.declare_type("Other", None);
        let catalog = builder.build();

        assert!(catalog.is_instance_of(c, a));
        assert!(catalog.is_instance_of(b, b));
        assert!(!catalog.is_instance_of(a, c));
        assert!(!catalog.is_instance_of(other, a));
    }

    #[test]
    fn type_lookup_by_name() {
        let mut builder = CatalogBuilder::new();
        let a = builder.declare_type("A", None);
        let catalog = builder.build();
        assert_eq!(catalog.type_id("A"), Some(a));
        assert_eq!(catalog.type_id("Z"), None);
        assert_eq!(catalog.type_name(a), "A");
    }
}
