//! Phase A: put runtime calls into canonical form.
//!
//! `retain` returns its argument, which hides pointer equality from the
//! later phases. After this pass no retain result is used:
//!
//! - `y = retain(x)` becomes `retain_noresult(x)` with `y` replaced by `x`.
//! - `(a, b, c) = retain_and_return_three(x, d, e, f)` becomes
//!   `retain_noresult(x)` with the words rewired to `d`, `e`, `f`.
//! - Uses of an `objc_retain` result are replaced by its argument.
//!
//! Retains and releases of null are deleted.

use smallvec::smallvec;

use crate::classify::{classify, rc_object, RtKind};
use crate::ir::{Callee, CastKind, Function, LlType, Module, Op, ValueId};
use crate::ArcStats;

/// Where the block scan continues after one instruction.
enum Cursor {
    Advance,
    /// The slot now holds a different instruction.
    Stay,
}

pub(crate) fn canonicalize(module: &Module, func: &mut Function, stats: &mut ArcStats) -> bool {
    let mut changed = false;
    let blocks: Vec<_> = func.block_ids().collect();
    for block in blocks {
        let mut i = 0;
        while let Some(&inst) = func.block(block).insts.get(i) {
            match canonicalize_inst(module, func, inst, stats, &mut changed) {
                Cursor::Advance => i += 1,
                Cursor::Stay => {}
            }
        }
    }

    if changed {
        tracing::debug!(
            function = func.name.raw(),
            noops = stats.noops_deleted,
            "canonicalized runtime calls",
        );
    }
    changed
}

fn canonicalize_inst(
    module: &Module,
    func: &mut Function,
    inst: ValueId,
    stats: &mut ArcStats,
    changed: &mut bool,
) -> Cursor {
    let kind = classify(module, func, inst);
    let Some(object) = rc_object(func, inst) else {
        return Cursor::Advance;
    };
    match kind {
        RtKind::RetainNoResult | RtKind::Release | RtKind::ObjCRelease => {
            if func.is_null(object) {
                delete_noop(func, inst, stats);
                *changed = true;
                return Cursor::Stay;
            }
            Cursor::Advance
        }
        RtKind::ObjCRetain => {
            *changed |= func.replace_all_uses(inst, object);
            if func.is_null(object) {
                delete_noop(func, inst, stats);
                *changed = true;
                return Cursor::Stay;
            }
            Cursor::Advance
        }
        RtKind::Retain => {
            func.replace_all_uses(inst, object);
            func.insert_before(
                inst,
                retain_noresult(module, object),
                LlType::Void,
            );
            func.erase(inst);
            *changed = true;
            // Revisit the replacement, which may be a no-op.
            Cursor::Stay
        }
        RtKind::RetainAndReturnThree => {
            if fuse_return_three_back(module, func, inst, object) {
                *changed = true;
                Cursor::Stay
            } else {
                Cursor::Advance
            }
        }
        RtKind::NoMemoryAccessed | RtKind::AllocObject | RtKind::Unknown => Cursor::Advance,
    }
}

fn delete_noop(func: &mut Function, inst: ValueId, stats: &mut ArcStats) {
    tracing::trace!(inst = inst.raw(), "deleted runtime call on null");
    func.erase(inst);
    stats.noops_deleted += 1;
}

fn retain_noresult(module: &Module, object: ValueId) -> Op {
    Op::Call {
        callee: Callee::Direct(module.runtime.retain_noresult),
        args: smallvec![object],
        tail: false,
    }
}

/// Replace `retain_and_return_three(obj, d, e, f)` with
/// `retain_noresult(obj)` and hand its consumers `d`, `e`, `f` directly.
/// A call without exactly four arguments is kept as is; returns whether
/// the call was replaced.
fn fuse_return_three_back(
    module: &Module,
    func: &mut Function,
    call: ValueId,
    object: ValueId,
) -> bool {
    let words = match func.op(call) {
        Some(Op::Call { args, .. }) if args.len() == 4 => [args[1], args[2], args[3]],
        _ => return false,
    };
    func.insert_before(call, retain_noresult(module, object), LlType::Void);

    for (index, &word) in (0u32..).zip(&words) {
        redirect_extracts(func, call, index, word);
    }

    // Consumers that are not plain extracts get a rebuilt aggregate.
    if func.has_uses(call) {
        let ty = func.ty(call).clone();
        let mut aggregate = func.undef(ty.clone());
        for (index, &word) in (0u32..).zip(&words) {
            let op = Op::InsertValue {
                aggregate,
                value: word,
                index,
            };
            aggregate = func.insert_before(call, op, ty.clone());
        }
        func.replace_all_uses(call, aggregate);
    }
    func.erase(call);
    true
}

/// Point every `extractvalue call, index` at `word`. When `word` is a
/// `ptrtoint p` and the extract feeds an `inttoptr` back to the type of `p`,
/// that cast is replaced by `p` itself.
fn redirect_extracts(func: &mut Function, call: ValueId, index: u32, word: ValueId) {
    let source = match func.op(word) {
        Some(Op::Cast {
            kind: CastKind::PtrToInt,
            operand,
        }) => Some(*operand),
        _ => None,
    };

    for u in func.uses(call) {
        let extract = u.user;
        if !matches!(func.op(extract), Some(Op::ExtractValue { index: i, .. }) if *i == index) {
            continue;
        }
        if let Some(source) = source {
            for cast_use in func.uses(extract) {
                let round_trip = matches!(
                    func.op(cast_use.user),
                    Some(Op::Cast {
                        kind: CastKind::IntToPtr,
                        ..
                    })
                ) && func.ty(cast_use.user) == func.ty(source);
                if round_trip {
                    func.replace_all_uses(cast_use.user, source);
                    func.erase(cast_use.user);
                }
            }
        }
        func.replace_all_uses(extract, word);
        func.delete_if_trivially_dead(extract);
    }
}
