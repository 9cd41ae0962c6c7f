use super::*;

fn func(name: u32) -> ValueDecl {
    ValueDecl::new(Name::from_raw(name), ValueKind::Func { is_static: false })
}

#[test]
fn test_type_is_set_once() {
    let decl = func(20);
    assert!(!decl.has_type());
    decl.set_type(Idx::INT64);
    assert_eq!(decl.ty(), Some(Idx::INT64));
}

#[test]
#[should_panic(expected = "assigned twice")]
fn test_type_reassignment_panics() {
    let decl = func(20);
    decl.set_type(Idx::INT64);
    decl.set_type(Idx::INT1);
}

#[test]
fn test_same_kind_ignores_payload() {
    let a = ValueDecl::new(Name::from_raw(1), ValueKind::Func { is_static: true });
    let b = func(2);
    let v = ValueDecl::new(
        Name::from_raw(3),
        ValueKind::Var {
            is_static: false,
            settable: true,
        },
    );
    assert!(a.same_kind(&b));
    assert!(!a.same_kind(&v));
    assert!(a.is_static());
    assert!(!b.is_static());
}

#[test]
fn test_module_scope_is_not_type_context() {
    let scope = ModuleScope::default();
    assert!(!scope.is_type_context());
    assert!(scope.declared_type_of_context().is_none());
    assert!(scope.generic_params().is_none());
}
