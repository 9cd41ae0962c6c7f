use super::*;
use crate::ir::LlType;
use crate::test_helpers::{load, ret_void, store, Fixture};

#[test]
fn runtime_calls_classify_by_symbol() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let cases = [
        (RETAIN, RtKind::Retain),
        (RETAIN_NORESULT, RtKind::RetainNoResult),
        (RELEASE, RtKind::Release),
        (ALLOC_OBJECT, RtKind::AllocObject),
        (RETAIN_AND_RETURN_THREE, RtKind::RetainAndReturnThree),
        (OBJC_RETAIN, RtKind::ObjCRetain),
        (OBJC_RELEASE, RtKind::ObjCRelease),
        ("print", RtKind::Unknown),
    ];
    for (symbol, expected) in cases {
        let call = fx.call(&mut func, entry, symbol, &[p], LlType::Ptr);
        assert_eq!(classify(&fx.module, &func, call), expected, "{symbol}");
        assert_eq!(rc_object(&func, call), Some(p));
    }
}

#[test]
fn declared_attributes_refine_unknown_calls() {
    let mut fx = Fixture::new();
    fx.declare("hash", MemoryEffects::None);
    fx.declare("peek", MemoryEffects::ReadOnly);
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let hash = fx.call(&mut func, entry, "hash", &[p], LlType::I64);
    let peek = fx.call(&mut func, entry, "peek", &[p], LlType::I64);
    let other = fx.call(&mut func, entry, "other", &[p], LlType::I64);

    assert_eq!(classify(&fx.module, &func, hash), RtKind::NoMemoryAccessed);
    assert_eq!(classify(&fx.module, &func, peek), RtKind::Unknown);
    assert!(!may_have_side_effects(&fx.module, &func, peek));
    assert!(may_have_side_effects(&fx.module, &func, other));
}

#[test]
fn memory_instructions_are_unknown_and_the_rest_touch_nothing() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let v = load(&mut func, entry, p);
    let s = store(&mut func, entry, v, p);
    let ret = ret_void(&mut func, entry);

    assert_eq!(classify(&fx.module, &func, v), RtKind::Unknown);
    assert_eq!(classify(&fx.module, &func, s), RtKind::Unknown);
    assert_eq!(classify(&fx.module, &func, ret), RtKind::NoMemoryAccessed);
    assert_eq!(classify(&fx.module, &func, p), RtKind::NoMemoryAccessed);
    assert!(!may_have_side_effects(&fx.module, &func, v));
    assert!(may_have_side_effects(&fx.module, &func, s));
    assert_eq!(rc_object(&func, v), None);
}

#[test]
fn runtime_calls_have_side_effects_even_if_declared_pure() {
    let mut fx = Fixture::new();
    fx.declare(RELEASE, MemoryEffects::None);
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let release = fx.release(&mut func, entry, p);

    assert_eq!(classify(&fx.module, &func, release), RtKind::Release);
    assert!(may_have_side_effects(&fx.module, &func, release));
}

#[test]
fn erased_instructions_touch_nothing() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let release = fx.release(&mut func, entry, p);
    func.erase(release);

    assert_eq!(classify(&fx.module, &func, release), RtKind::NoMemoryAccessed);
    assert_eq!(rc_object(&func, release), None);
}

#[test]
fn symbols_outside_the_runtime_have_no_kind() {
    let fx = Fixture::new();
    assert_eq!(fx.module.runtime.kind_of(fx.name("tern_retain")), Some(RtKind::Retain));
    assert_eq!(fx.module.runtime.kind_of(fx.name("tern_retainx")), None);
}
