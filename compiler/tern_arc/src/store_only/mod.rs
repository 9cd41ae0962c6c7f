//! Store-only object elimination and destructor analysis.
//!
//! An object that is allocated, written to, retained and released, but
//! never read and never escapes, has no observable effect as long as its
//! destructor has none. Every instruction involved is deleted.

use rustc_hash::FxHashSet;

use crate::classify::{classify, may_have_side_effects, rc_object, RtKind};
use crate::ir::{Function, Init, Linkage, MemoryEffects, Module, Op, ValueId, ValueKind};
use crate::ArcStats;

/// What running a destructor may do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DtorKind {
    /// Nothing observable. At most it writes the dying object.
    NoSideEffects,
    /// Has side effects, but the object's address does not escape.
    NoEscape,
    /// Anything at all.
    Unknown,
}

/// Classify the destructor named by heap metadata value `metadata` of
/// `func`.
///
/// Only a destructor whose body is visible and final can be trusted: the
/// metadata must be a global that cannot be replaced at link time, and
/// field 0 of its initializer must name an internal function definition.
pub fn analyze_destructor(module: &Module, func: &Function, metadata: ValueId) -> DtorKind {
    let metadata = func.strip_pointer_casts(metadata);
    let symbol = match &func.value(metadata).kind {
        // Releasing to zero would crash; only tests allocate like this.
        ValueKind::Null => return DtorKind::NoSideEffects,
        ValueKind::Global(symbol) => *symbol,
        _ => return DtorKind::Unknown,
    };
    let Some(global) = module.global(symbol) else {
        return DtorKind::Unknown;
    };
    if global.linkage == Linkage::Weak {
        return DtorKind::Unknown;
    }
    let Some(Init::Function(dtor_symbol)) = global.initializer.as_ref().and_then(|i| i.first())
    else {
        return DtorKind::Unknown;
    };
    let Some(dtor) = module.function(*dtor_symbol) else {
        return DtorKind::Unknown;
    };
    if dtor.linkage != Linkage::Internal || dtor.is_declaration() {
        return DtorKind::Unknown;
    }
    if matches!(dtor.memory, MemoryEffects::ReadOnly | MemoryEffects::None) {
        return DtorKind::NoSideEffects;
    }
    let kind = scan_destructor(module, dtor);
    tracing::trace!(dtor = dtor_symbol.raw(), ?kind, "analyzed destructor");
    kind
}

fn scan_destructor(module: &Module, dtor: &Function) -> DtorKind {
    let Some(&this) = dtor.params().first() else {
        return DtorKind::Unknown;
    };
    let this = dtor.strip_pointer_casts(this);
    let is_this = |v: ValueId| dtor.strip_pointer_casts(v) == this;

    for inst in dtor.insts() {
        let harmless = match classify(module, dtor, inst) {
            RtKind::NoMemoryAccessed | RtKind::AllocObject => true,
            // The object is already dying; nothing can resurrect it.
            RtKind::Retain
            | RtKind::RetainAndReturnThree
            | RtKind::RetainNoResult
            | RtKind::Release => rc_object(dtor, inst).is_some_and(is_this),
            RtKind::ObjCRetain | RtKind::ObjCRelease => false,
            RtKind::Unknown => match dtor.op(inst) {
                _ if !may_have_side_effects(module, dtor, inst) => true,
                // Writes into the dying object are unobservable.
                Some(Op::Store { ptr, .. }) => dtor.strip_in_bounds_offsets(*ptr) == this,
                Some(Op::MemIntrinsic { dest, .. }) => {
                    dtor.strip_in_bounds_offsets(*dest) == this
                }
                _ => false,
            },
        };
        if !harmless {
            return if dtor.nocapture.first().copied().unwrap_or(false) {
                DtorKind::NoEscape
            } else {
                DtorKind::Unknown
            };
        }
    }
    DtorKind::NoSideEffects
}

/// Whether `object` comes from an allocation whose destructor is not
/// provably free of side effects. Such objects are left alone entirely.
pub(crate) fn has_untrusted_destructor(module: &Module, func: &Function, object: ValueId) -> bool {
    let base = func.strip_pointer_casts(object);
    if classify(module, func, base) != RtKind::AllocObject {
        return false;
    }
    rc_object(func, base)
        .is_none_or(|metadata| analyze_destructor(module, func, metadata) != DtorKind::NoSideEffects)
}

/// Delete allocation `alloc` and everything that touches the object, if
/// the object is only ever written to.
pub(crate) fn eliminate_store_only_object(
    module: &Module,
    func: &mut Function,
    alloc: ValueId,
    stats: &mut ArcStats,
) -> bool {
    let Some(metadata) = rc_object(func, alloc) else {
        return false;
    };
    if analyze_destructor(module, func, metadata) != DtorKind::NoSideEffects {
        return false;
    }
    let Some(involved) = collect_store_only_uses(module, func, alloc) else {
        return false;
    };

    tracing::debug!(
        alloc = alloc.raw(),
        deleted = involved.len(),
        "eliminated store-only object",
    );
    for inst in involved {
        if func.has_uses(inst) {
            let undef = func.undef(func.ty(inst).clone());
            func.replace_all_uses(inst, undef);
        }
        func.erase(inst);
    }
    stats.store_only_objects_eliminated += 1;
    true
}

/// Depth-first walk over every transitive user of the object. Fails on a
/// read, an escape, or anything with an effect of its own. On success the
/// result lists each involved instruction once, in discovery order.
fn collect_store_only_uses(
    module: &Module,
    func: &Function,
    alloc: ValueId,
) -> Option<Vec<ValueId>> {
    let mut seen = FxHashSet::default();
    let mut involved = Vec::new();
    let mut worklist = vec![alloc];

    while let Some(inst) = worklist.pop() {
        if !seen.insert(inst) {
            continue;
        }
        involved.push(inst);

        match classify(module, func, inst) {
            // Another allocation fed by this one goes too, sizes and all.
            RtKind::AllocObject | RtKind::Release | RtKind::RetainNoResult => {}
            RtKind::NoMemoryAccessed => {
                let terminator = func.op(inst).is_some_and(Op::is_terminator);
                if terminator || may_have_side_effects(module, func, inst) {
                    return None;
                }
            }
            RtKind::Retain
            | RtKind::RetainAndReturnThree
            | RtKind::Unknown
            | RtKind::ObjCRetain
            | RtKind::ObjCRelease => return None,
        }

        for u in func.uses(inst) {
            match func.op(u.user) {
                // Storing *to* the object is fine; storing the object is an
                // escape.
                Some(Op::Store { .. }) if u.operand == 1 => {
                    if seen.insert(u.user) {
                        involved.push(u.user);
                    }
                }
                Some(Op::MemIntrinsic { .. }) if u.operand == 0 => {
                    if seen.insert(u.user) {
                        involved.push(u.user);
                    }
                }
                Some(Op::Store { .. } | Op::MemIntrinsic { .. }) => return None,
                _ => worklist.push(u.user),
            }
        }
    }
    Some(involved)
}
