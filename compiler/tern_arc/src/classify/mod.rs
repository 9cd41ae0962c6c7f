//! Runtime entry-point classification.
//!
//! Every instruction is sorted into an [`RtKind`] purely by what it is and,
//! for direct calls, by the callee's symbol. There is no interprocedural
//! analysis beyond the memory attributes a declaration carries.
//!
//! The runtime functions are assumed to touch no memory visible to the
//! caller except the reference count of their argument. `release` may free
//! the object, which no other instruction can observe.

use tern_ir::{Name, StringInterner};

use crate::ir::{Callee, Function, MemoryEffects, Module, Op, ValueId};

pub const RETAIN: &str = "tern_retain";
pub const RETAIN_NORESULT: &str = "tern_retain_noresult";
pub const RELEASE: &str = "tern_release";
pub const ALLOC_OBJECT: &str = "tern_alloc_object";
pub const RETAIN_AND_RETURN_THREE: &str = "tern_retain_and_return_three";
pub const OBJC_RETAIN: &str = "objc_retain";
pub const OBJC_RELEASE: &str = "objc_release";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtKind {
    /// Reads and writes no memory.
    NoMemoryAccessed,
    /// `obj = retain(obj)`
    Retain,
    /// `retain_noresult(obj)`
    RetainNoResult,
    /// `(a, b, c) = retain_and_return_three(obj, a, b, c)`
    RetainAndReturnThree,
    /// `release(obj)`
    Release,
    /// `obj = alloc_object(metadata, size, align)`
    AllocObject,
    ObjCRelease,
    ObjCRetain,
    /// Anything else that may touch memory.
    Unknown,
}

/// Interned symbols of the runtime entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeSymbols {
    pub retain: Name,
    pub retain_noresult: Name,
    pub release: Name,
    pub alloc_object: Name,
    pub retain_and_return_three: Name,
    pub objc_retain: Name,
    pub objc_release: Name,
}

impl RuntimeSymbols {
    pub fn new(interner: &StringInterner) -> Self {
        RuntimeSymbols {
            retain: interner.intern(RETAIN),
            retain_noresult: interner.intern(RETAIN_NORESULT),
            release: interner.intern(RELEASE),
            alloc_object: interner.intern(ALLOC_OBJECT),
            retain_and_return_three: interner.intern(RETAIN_AND_RETURN_THREE),
            objc_retain: interner.intern(OBJC_RETAIN),
            objc_release: interner.intern(OBJC_RELEASE),
        }
    }

    pub fn kind_of(&self, symbol: Name) -> Option<RtKind> {
        let kind = if symbol == self.retain {
            RtKind::Retain
        } else if symbol == self.retain_noresult {
            RtKind::RetainNoResult
        } else if symbol == self.release {
            RtKind::Release
        } else if symbol == self.alloc_object {
            RtKind::AllocObject
        } else if symbol == self.retain_and_return_three {
            RtKind::RetainAndReturnThree
        } else if symbol == self.objc_retain {
            RtKind::ObjCRetain
        } else if symbol == self.objc_release {
            RtKind::ObjCRelease
        } else {
            return None;
        };
        Some(kind)
    }
}

/// Classify instruction `inst` of `func`. Values that are not live
/// instructions touch no memory.
pub fn classify(module: &Module, func: &Function, inst: ValueId) -> RtKind {
    let Some(op) = func.op(inst) else {
        return RtKind::NoMemoryAccessed;
    };
    match op {
        Op::Call {
            callee: Callee::Direct(symbol),
            ..
        } => {
            if let Some(kind) = module.runtime.kind_of(*symbol) {
                return kind;
            }
            match module.memory_effects(*symbol) {
                Some(MemoryEffects::None) => RtKind::NoMemoryAccessed,
                _ => RtKind::Unknown,
            }
        }
        Op::Call { .. } | Op::Load { .. } | Op::Store { .. } | Op::MemIntrinsic { .. } => {
            RtKind::Unknown
        }
        _ => RtKind::NoMemoryAccessed,
    }
}

/// Whether executing `inst` may change state visible to anyone else.
/// Loads and calls to read-only functions have no side effects.
pub fn may_have_side_effects(module: &Module, func: &Function, inst: ValueId) -> bool {
    match func.op(inst) {
        Some(Op::Store { .. } | Op::MemIntrinsic { .. }) => true,
        Some(Op::Call {
            callee: Callee::Direct(symbol),
            ..
        }) => {
            module.runtime.kind_of(*symbol).is_some()
                || !matches!(
                    module.memory_effects(*symbol),
                    Some(MemoryEffects::ReadOnly | MemoryEffects::None)
                )
        }
        Some(Op::Call { .. }) => true,
        _ => false,
    }
}

/// The object operand of a runtime call: argument 0.
pub fn rc_object(func: &Function, inst: ValueId) -> Option<ValueId> {
    match func.op(inst)? {
        Op::Call { args, .. } => args.first().copied(),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
