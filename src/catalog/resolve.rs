// src/catalog/resolve.rs
//
// Signature resolution: walk the ancestor chain most-derived-first and take
// the first method whose name and exact parameter-kind list match.

use tracing::trace;

use crate::catalog::{MethodSig, TypeCatalog, TypeDefId, Visibility};
use crate::errors::BuildError;
use crate::value::ValueKind;

/// Resolve `name(params)` starting at `owner`. Overloads are disambiguated
/// solely by the exact parameter-kind list; there is no widening or
/// assignability logic. Declared visibility does not restrict the search:
/// a private method resolves exactly like a public one.
pub fn resolve(
    catalog: &TypeCatalog,
    owner: TypeDefId,
    name: &str,
    params: &[ValueKind],
) -> Result<MethodSig, BuildError> {
    let mut cur = catalog.contains(owner).then_some(owner);
    while let Some(ty) = cur {
        if let Some(method) = catalog.find_declared(ty, name, params) {
            let decl = catalog.method(ty, method);
            if decl.visibility == Visibility::Private {
                trace!(
                    ty = catalog.type_name(ty),
                    method = name,
                    "resolved private method, visibility overridden"
                );
            }
            return Ok(MethodSig {
                owner,
                declaring: ty,
                method,
                name: decl.name.clone(),
                params: decl.params.clone(),
                ret: decl.ret,
                dispatch: decl.dispatch,
                ptr: decl.ptr,
            });
        }
        trace!(
            ty = catalog.type_name(ty),
            method = name,
            "not declared here, walking to parent"
        );
        cur = catalog.parent(ty);
    }
    Err(BuildError::SignatureNotFound {
        owner: catalog.type_name(owner).to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;
    use crate::value::RetKind;

    struct Widget;

    extern "C" fn base_area(_this: *mut Widget, w: i32, h: i32) -> i32 {
        w * h
    }

    extern "C" fn area_f64(_this: *mut Widget, w: f64, h: f64) -> f64 {
        w * h
    }

    extern "C" fn secret(_this: *mut Widget) -> i64 {
        7
    }

    fn fixture() -> (crate::catalog::TypeCatalog, TypeDefId, TypeDefId) {
        let mut builder = CatalogBuilder::new();
        let base = builder.declare_type("Widget", None);
        builder.declare_method(
            base,
            "area",
            Visibility::Public,
            base_area as extern "C" fn(*mut Widget, i32, i32) -> i32,
        );
        builder.declare_method(
            base,
            "area",
            Visibility::Public,
            area_f64 as extern "C" fn(*mut Widget, f64, f64) -> f64,
        );
        builder.declare_method(
            base,
            "secret",
            Visibility::Private,
            secret as extern "C" fn(*mut Widget) -> i64,
        );
        let derived = builder.declare_type("Button", Some(base));
        (builder.build(), base, derived)
    }

    #[test]
    fn overloads_select_by_exact_parameter_kinds() {
        let (catalog, base, _) = fixture();
        let sig = resolve(&catalog, base, "area", &[ValueKind::I32, ValueKind::I32]).unwrap();
        assert_eq!(sig.ret, RetKind::I32);
        let sig = resolve(&catalog, base, "area", &[ValueKind::F64, ValueKind::F64]).unwrap();
        assert_eq!(sig.ret, RetKind::F64);
    }

    #[test]
    fn no_widening_between_kinds() {
        let (catalog, base, _) = fixture();
        let err = resolve(&catalog, base, "area", &[ValueKind::I32, ValueKind::I64]);
        assert!(matches!(err, Err(BuildError::SignatureNotFound { .. })));
    }

    #[test]
    fn walks_to_ancestor_declaration() {
        let (catalog, base, derived) = fixture();
        let sig = resolve(&catalog, derived, "area", &[ValueKind::I32, ValueKind::I32]).unwrap();
        assert_eq!(sig.owner, derived);
        assert_eq!(sig.declaring, base);
    }

    #[test]
    fn private_methods_resolve() {
        let (catalog, _, derived) = fixture();
        let sig = resolve(&catalog, derived, "secret", &[]).unwrap();
        assert_eq!(sig.ret, RetKind::I64);
    }

    #[test]
    fn exhausted_chain_is_not_found() {
        let (catalog, base, _) = fixture();
        let err = resolve(&catalog, base, "perimeter", &[]);
        assert!(matches!(err, Err(BuildError::SignatureNotFound { .. })));
    }
}
