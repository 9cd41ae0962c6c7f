//! Phase B: local optimizations in one forward scan per block.
//!
//! - An allocation triggers store-only object elimination.
//! - A release is moved backward over instructions that cannot observe the
//!   object. Reaching a retain of the same object deletes both. Reaching
//!   the object's own allocation deletes the allocation and the release.
//! - A retain is moved forward over instructions that cannot release. A
//!   matching release (native with native, ObjC with ObjC) deletes
//!   both.
//!
//! Objects allocated with a destructor that is not provably free of side
//! effects are never moved or paired.
//!
//! The scan holds a slot index into the block's instruction list. Each
//! transformation says where the scan resumes, so no deleted or moved
//! instruction is visited through a stale position.

use crate::classify::{classify, rc_object, RtKind};
use crate::ir::{Function, LlType, Module, Op, ValueId};
use crate::store_only::{eliminate_store_only_object, has_untrusted_destructor};
use crate::{ArcOptions, ArcStats};

pub(crate) fn optimize_blocks(
    module: &Module,
    func: &mut Function,
    options: &ArcOptions,
    stats: &mut ArcStats,
) -> bool {
    let mut changed = false;
    let blocks: Vec<_> = func.block_ids().collect();
    for block in blocks {
        let mut i = 0;
        while let Some(&inst) = func.block(block).insts.get(i) {
            match classify(module, func, inst) {
                RtKind::AllocObject if options.store_only_elimination => {
                    let following = func.block(block).insts[i + 1..].to_vec();
                    if eliminate_store_only_object(module, func, inst, stats) {
                        changed = true;
                        // Resume at the first following instruction that survived.
                        i = following
                            .iter()
                            .filter(|&&v| func.parent(v) == Some(block))
                            .find_map(|&v| func.position(v))
                            .unwrap_or(func.block(block).insts.len());
                    } else {
                        i += 1;
                    }
                }
                RtKind::Release if options.release_motion => {
                    let next = func.block(block).insts.get(i + 1).copied();
                    changed |= release_motion(module, func, inst, stats);
                    // Everything the motion touched lies before `next`.
                    i = next
                        .and_then(|v| func.position(v))
                        .unwrap_or(func.block(block).insts.len());
                }
                RtKind::RetainNoResult | RtKind::ObjCRetain if options.retain_motion => {
                    if retain_motion(module, func, inst, stats) {
                        // The retain left slot `i`; look at whatever took it.
                        changed = true;
                    } else {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
    }
    changed
}

/// How a backward scan from a release ended.
enum ReleaseScan {
    /// A retain of the same object.
    Pair(ValueId),
    /// The allocation of the released object.
    Fuse(ValueId),
    /// The release can move up to slot `index`.
    Stop(usize),
}

/// Move `release` as early as possible within its block.
pub(crate) fn release_motion(
    module: &Module,
    func: &mut Function,
    release: ValueId,
    stats: &mut ArcStats,
) -> bool {
    let Some(object) = rc_object(func, release) else {
        return false;
    };
    if has_untrusted_destructor(module, func, object) {
        return false;
    }
    let (Some(block), Some(pos)) = (func.parent(release), func.position(release)) else {
        return false;
    };
    let insts = func.block(block).insts.clone();

    let mut scan = ReleaseScan::Stop(0);
    for k in (0..pos).rev() {
        let inst = insts[k];
        let kind = classify(module, func, inst);
        if inst == object && kind == RtKind::AllocObject {
            scan = ReleaseScan::Fuse(inst);
            break;
        }
        if inst == object || matches!(func.op(inst), Some(Op::Phi { .. })) {
            scan = ReleaseScan::Stop(k + 1);
            break;
        }
        match kind {
            RtKind::NoMemoryAccessed => {}
            // Releases of other objects are skipped. A second release of
            // the same object is already as early as it gets.
            RtKind::Release if rc_object(func, inst) != Some(object) => {}
            RtKind::RetainNoResult if rc_object(func, inst) == Some(object) => {
                scan = ReleaseScan::Pair(inst);
                break;
            }
            _ => {
                scan = ReleaseScan::Stop(k + 1);
                break;
            }
        }
    }

    match scan {
        ReleaseScan::Pair(retain) => {
            tracing::trace!(retain = retain.raw(), release = release.raw(), "retain/release pair");
            func.erase(retain);
            func.erase(release);
            stats.retain_release_pairs += 1;
            true
        }
        ReleaseScan::Fuse(alloc) => {
            tracing::trace!(alloc = alloc.raw(), release = release.raw(), "alloc/release pair");
            func.erase(release);
            let undef = func.undef(LlType::Ptr);
            func.replace_all_uses(alloc, undef);
            func.erase(alloc);
            stats.alloc_release_pairs += 1;
            true
        }
        ReleaseScan::Stop(index) if index < pos => {
            func.move_before(release, insts[index]);
            true
        }
        ReleaseScan::Stop(_) => false,
    }
}

/// Move `retain` (native or ObjC) as late as possible within its block.
pub(crate) fn retain_motion(
    module: &Module,
    func: &mut Function,
    retain: ValueId,
    stats: &mut ArcStats,
) -> bool {
    let Some(object) = rc_object(func, retain) else {
        return false;
    };
    if has_untrusted_destructor(module, func, object) {
        return false;
    }
    let (Some(block), Some(pos)) = (func.parent(retain), func.position(retain)) else {
        return false;
    };
    let Some(terminator) = func.terminator(block) else {
        return false;
    };
    let is_objc = classify(module, func, retain) == RtKind::ObjCRetain;
    let insts = func.block(block).insts.clone();

    let mut made_progress = false;
    let mut halt = terminator;
    for &inst in &insts[pos + 1..insts.len() - 1] {
        let same_object = rc_object(func, inst) == Some(object);
        match classify(module, func, inst) {
            RtKind::NoMemoryAccessed | RtKind::AllocObject => {}
            // Passing another retain changes nothing.
            RtKind::RetainNoResult => continue,
            RtKind::Release if !is_objc && same_object => {
                tracing::trace!(retain = retain.raw(), release = inst.raw(), "retain/release pair");
                func.erase(retain);
                func.erase(inst);
                stats.retain_release_pairs += 1;
                return true;
            }
            RtKind::ObjCRelease if is_objc && same_object => {
                tracing::trace!(retain = retain.raw(), release = inst.raw(), "objc retain/release pair");
                func.erase(retain);
                func.erase(inst);
                stats.objc_retain_release_pairs += 1;
                return true;
            }
            // Plain memory access cannot release anything.
            RtKind::Unknown | RtKind::ObjCRetain
                if matches!(
                    func.op(inst),
                    Some(Op::Load { .. } | Op::Store { .. } | Op::MemIntrinsic { .. })
                ) => {}
            _ => {
                halt = inst;
                break;
            }
        }
        made_progress = true;
    }

    if made_progress {
        func.move_before(retain, halt);
        return true;
    }
    false
}

#[cfg(test)]
mod tests;
