//! Phase C, part two: fuse a trailing retain into a three-word return.
//!
//! A function returning `{a, b, c}` that retains one of the words just
//! before returning calls `retain_and_return_three(obj, a, b, c)` as a tail
//! call instead, and returns its result.

use rustc_hash::FxHashMap;
use smallvec::smallvec;

use crate::classify::{classify, rc_object, RtKind};
use crate::ir::{Callee, CastKind, Function, LlType, Module, Op, ValueId};
use crate::ArcStats;

/// Try the fusion on return instruction `ret`.
pub(crate) fn form_return_three(
    module: &Module,
    func: &mut Function,
    ret: ValueId,
    stats: &mut ArcStats,
) -> bool {
    let Some(Op::Ret { value: Some(value) }) = func.op(ret) else {
        return false;
    };
    let value = *value;
    let ret_ty = func.ty(value).clone();
    if ret_ty.fields().len() != 3 {
        return false;
    }

    let mut words = [value; 3];
    for (index, word) in (0u32..).zip(words.iter_mut()) {
        let Some(found) = find_inserted_value(func, value, index) else {
            return false;
        };
        if !func.ty(found).is_pointer() && *func.ty(found) != LlType::I64 {
            return false;
        }
        *word = found;
    }

    let retained = trailing_retains(module, func, ret);
    if retained.is_empty() {
        return false;
    }
    let Some(retain) = words.iter().find_map(|&word| {
        retained.get(&word).copied().or_else(|| {
            if classify(module, func, word) != RtKind::Retain {
                return None;
            }
            rc_object(func, word).and_then(|object| retained.get(&object).copied())
        })
    }) else {
        return false;
    };
    let Some(object) = rc_object(func, retain) else {
        return false;
    };

    let mut args = smallvec![object];
    for word in words {
        let arg = if func.ty(word).is_pointer() {
            let cast = Op::Cast {
                kind: CastKind::PtrToInt,
                operand: word,
            };
            func.insert_before(ret, cast, LlType::I64)
        } else {
            word
        };
        args.push(arg);
    }
    let call = Op::Call {
        callee: Callee::Direct(module.runtime.retain_and_return_three),
        args,
        tail: true,
    };
    let call = func.insert_before(ret, call, LlType::three_words());

    let mut repacked = func.undef(ret_ty.clone());
    for (index, field_ty) in (0u32..).zip(ret_ty.fields()) {
        let extract = Op::ExtractValue {
            aggregate: call,
            index,
        };
        let mut word = func.insert_before(ret, extract, LlType::I64);
        if *field_ty != LlType::I64 {
            let cast = Op::Cast {
                kind: CastKind::IntToPtr,
                operand: word,
            };
            word = func.insert_before(ret, cast, field_ty.clone());
        }
        let insert = Op::InsertValue {
            aggregate: repacked,
            value: word,
            index,
        };
        repacked = func.insert_before(ret, insert, ret_ty.clone());
    }

    func.set_operand(ret, 0, repacked);
    func.delete_if_trivially_dead(value);
    func.replace_all_uses(retain, object);
    func.erase(retain);

    tracing::debug!(function = func.name.raw(), ret = ret.raw(), "formed return-three tail call");
    stats.return_three_formed += 1;
    true
}

/// The value inserted at field `index` of an `insertvalue` chain.
fn find_inserted_value(func: &Function, mut aggregate: ValueId, index: u32) -> Option<ValueId> {
    loop {
        match func.op(aggregate)? {
            Op::InsertValue {
                aggregate: inner,
                value,
                index: i,
            } => {
                if *i == index {
                    return Some(*value);
                }
                aggregate = *inner;
            }
            _ => return None,
        }
    }
}

/// Retains between `ret` and the nearest preceding instruction that touches
/// memory, keyed by retained object.
fn trailing_retains(module: &Module, func: &Function, ret: ValueId) -> FxHashMap<ValueId, ValueId> {
    let mut retained = FxHashMap::default();
    let (Some(block), Some(pos)) = (func.parent(ret), func.position(ret)) else {
        return retained;
    };
    for &inst in func.block(block).insts[..pos].iter().rev() {
        match classify(module, func, inst) {
            RtKind::Retain => {
                if let Some(object) = rc_object(func, inst) {
                    retained.insert(object, inst);
                }
            }
            RtKind::NoMemoryAccessed => {}
            _ => break,
        }
    }
    retained
}
