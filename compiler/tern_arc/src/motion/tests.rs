use pretty_assertions::assert_eq;

use super::*;
use crate::classify::{OBJC_RELEASE, OBJC_RETAIN};
use crate::ir::ValueKind;
use crate::test_helpers::{gep, load, ret_void, store, Fixture};

fn run(fx: &Fixture, func: &mut Function) -> ArcStats {
    let mut stats = ArcStats::default();
    optimize_blocks(&fx.module, func, &ArcOptions::default(), &mut stats);
    stats
}

// === Release motion ===

#[test]
fn release_meets_retain_over_a_load() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Ptr], LlType::Void);
    let (x, y) = (func.params()[0], func.params()[1]);
    fx.retain_noresult(&mut func, entry, x);
    load(&mut func, entry, y);
    fx.release(&mut func, entry, x);
    ret_void(&mut func, entry);

    let stats = run(&fx, &mut func);

    assert_eq!(fx.render(&func), vec!["load", "ret"]);
    assert_eq!(stats.retain_release_pairs, 1);
}

#[test]
fn release_moves_up_to_an_unknown_call() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let x = func.params()[0];
    fx.call(&mut func, entry, "escape", &[x], LlType::Void);
    gep(&mut func, entry, x, 8);
    let release = fx.release(&mut func, entry, x);
    ret_void(&mut func, entry);

    run(&fx, &mut func);

    assert_eq!(fx.render(&func), vec!["escape", "tern_release", "gep", "ret"]);
    assert_eq!(func.position(release), Some(1));
}

#[test]
fn release_moves_past_other_releases_but_not_its_own() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Ptr], LlType::Void);
    let (x, y) = (func.params()[0], func.params()[1]);
    let first = fx.release(&mut func, entry, x);
    let other = fx.release(&mut func, entry, y);
    let second = fx.release(&mut func, entry, x);
    ret_void(&mut func, entry);

    run(&fx, &mut func);

    // The release of `y` floats to the top; the second release of `x`
    // stops at the first.
    assert_eq!(func.block(entry).insts[..3].to_vec(), vec![other, first, second]);
}

#[test]
fn release_stops_at_retain_of_another_object() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Ptr], LlType::Void);
    let (x, y) = (func.params()[0], func.params()[1]);
    fx.retain_noresult(&mut func, entry, y);
    fx.release(&mut func, entry, x);
    ret_void(&mut func, entry);
    let before = func.clone();

    let stats = run(&fx, &mut func);

    assert_eq!(func, before);
    assert_eq!(stats, ArcStats::default());
}

#[test]
fn release_stops_at_the_definition_of_its_object() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let object = fx.call(&mut func, entry, "make", &[p], LlType::Ptr);
    gep(&mut func, entry, p, 8);
    fx.release(&mut func, entry, object);
    ret_void(&mut func, entry);

    run(&fx, &mut func);

    assert_eq!(fx.render(&func), vec!["make", "tern_release", "gep", "ret"]);
}

#[test]
fn release_right_after_allocation_deletes_both() {
    let mut fx = Fixture::new();
    let metadata = fx.trivial_metadata("Box");
    let (mut func, entry) = fx.function("f", &[], LlType::Void);
    let object = fx.alloc(&mut func, entry, metadata);
    let field = gep(&mut func, entry, object, 8);
    fx.release(&mut func, entry, object);
    ret_void(&mut func, entry);

    let options = ArcOptions {
        store_only_elimination: false,
        ..ArcOptions::default()
    };
    let mut stats = ArcStats::default();
    optimize_blocks(&fx.module, &mut func, &options, &mut stats);

    assert_eq!(stats.alloc_release_pairs, 1);
    assert_eq!(fx.render(&func), vec!["gep", "ret"]);
    assert!(matches!(
        func.op(field),
        Some(Op::Gep { base, .. }) if func.value(*base).kind == ValueKind::Undef
    ));
}

#[test]
fn allocation_and_release_split_by_a_call_stay() {
    let mut fx = Fixture::new();
    let metadata = fx.trivial_metadata("Box");
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let object = fx.alloc(&mut func, entry, metadata);
    fx.call(&mut func, entry, "escape", &[p], LlType::Void);
    gep(&mut func, entry, object, 8);
    fx.release(&mut func, entry, object);
    ret_void(&mut func, entry);

    let options = ArcOptions {
        store_only_elimination: false,
        ..ArcOptions::default()
    };
    let mut stats = ArcStats::default();
    optimize_blocks(&fx.module, &mut func, &options, &mut stats);

    assert_eq!(stats.alloc_release_pairs, 0);
    assert_eq!(
        fx.render(&func),
        vec!["tern_alloc_object", "escape", "tern_release", "gep", "ret"]
    );
}

// === Retain motion ===

#[test]
fn retain_moves_down_to_a_matching_release() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Ptr], LlType::Void);
    let (x, y) = (func.params()[0], func.params()[1]);
    fx.retain_noresult(&mut func, entry, x);
    let v = load(&mut func, entry, y);
    store(&mut func, entry, v, y);
    fx.retain_noresult(&mut func, entry, y);
    fx.release(&mut func, entry, x);
    ret_void(&mut func, entry);

    let stats = run(&fx, &mut func);

    assert_eq!(stats.retain_release_pairs, 1);
    assert_eq!(
        fx.render(&func),
        vec!["load", "store", "tern_retain_noresult", "ret"]
    );
}

#[test]
fn retain_sinks_to_the_first_unknown_call() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let x = func.params()[0];
    let retain = fx.retain_noresult(&mut func, entry, x);
    load(&mut func, entry, x);
    fx.call(&mut func, entry, "consume", &[x], LlType::Void);
    ret_void(&mut func, entry);

    run(&fx, &mut func);

    assert_eq!(
        fx.render(&func),
        vec!["load", "tern_retain_noresult", "consume", "ret"]
    );
    assert_eq!(func.position(retain), Some(1));
}

#[test]
fn passing_only_retains_is_no_progress() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Ptr], LlType::Void);
    let (x, y) = (func.params()[0], func.params()[1]);
    fx.retain_noresult(&mut func, entry, x);
    fx.retain_noresult(&mut func, entry, y);
    fx.call(&mut func, entry, "consume", &[x], LlType::Void);
    ret_void(&mut func, entry);
    let before = func.clone();

    run(&fx, &mut func);

    assert_eq!(func, before);
}

#[test]
fn objc_pairs_only_with_objc() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let x = func.params()[0];
    fx.call(&mut func, entry, OBJC_RETAIN, &[x], LlType::Ptr);
    fx.release(&mut func, entry, x);
    ret_void(&mut func, entry);
    let before = func.clone();

    let stats = run(&fx, &mut func);
    assert_eq!(func, before);
    assert_eq!(stats, ArcStats::default());

    let (mut func, entry) = fx.function("g", &[LlType::Ptr, LlType::Ptr], LlType::Void);
    let (x, y) = (func.params()[0], func.params()[1]);
    fx.call(&mut func, entry, OBJC_RETAIN, &[x], LlType::Ptr);
    load(&mut func, entry, y);
    fx.call(&mut func, entry, OBJC_RELEASE, &[x], LlType::Void);
    ret_void(&mut func, entry);

    let stats = run(&fx, &mut func);
    assert_eq!(stats.objc_retain_release_pairs, 1);
    assert_eq!(fx.render(&func), vec!["load", "ret"]);
}

#[test]
fn disabled_motions_do_nothing() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Ptr], LlType::Void);
    let (x, y) = (func.params()[0], func.params()[1]);
    fx.retain_noresult(&mut func, entry, x);
    load(&mut func, entry, y);
    fx.release(&mut func, entry, x);
    ret_void(&mut func, entry);
    let before = func.clone();

    let options = ArcOptions {
        release_motion: false,
        retain_motion: false,
        ..ArcOptions::default()
    };
    let mut stats = ArcStats::default();
    assert!(!optimize_blocks(&fx.module, &mut func, &options, &mut stats));
    assert_eq!(func, before);
}

// === Untrusted destructors ===

#[test]
fn objects_with_effectful_destructors_are_never_moved() {
    let mut fx = Fixture::new();
    let metadata = fx.calling_metadata("Logger", "log");
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let y = func.params()[0];
    let object = fx.alloc(&mut func, entry, metadata);
    fx.retain_noresult(&mut func, entry, object);
    load(&mut func, entry, y);
    fx.release(&mut func, entry, object);
    fx.release(&mut func, entry, object);
    ret_void(&mut func, entry);
    let before = func.clone();

    let stats = run(&fx, &mut func);

    assert_eq!(func, before);
    assert_eq!(stats, ArcStats::default());
}
