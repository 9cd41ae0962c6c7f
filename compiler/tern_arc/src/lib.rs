//! Reference-counting optimization for the Tern compiler's low-level IR.
//!
//! Generated code retains and releases heap objects conservatively. This
//! crate removes the redundant traffic in three phases:
//!
//! - **Canonicalization** (Phase A) rewrites every retain whose result is
//!   used into `retain_noresult`, so that an object is always named by one
//!   SSA value, and deletes runtime calls on null.
//!
//! - **Local optimization** (Phase B) moves releases up and retains down
//!   within a block, deleting pairs that protect nothing, and removes
//!   objects that are only ever written to.
//!
//! - **Expansion** (Phase C) runs last, just before code generation. It
//!   turns `retain_noresult` back into `retain` to shorten live ranges and
//!   fuses a retain before a three-word return into a single tail call.
//!
//! [`optimize_module`] runs A then B. [`expand_module`] runs C and expects
//! its input in canonical form.
//!
//! # Soundness
//!
//! Every transformation preserves the program's observable behavior,
//! assuming the runtime entry points touch no memory but the reference
//! count of their argument. Objects whose destructor may have side effects
//! are never touched by Phase B.
//!
//! # Crate Dependencies
//!
//! `tern_arc` depends only on `tern_ir` for `Name` and `StringInterner`.
//! The IR it rewrites is its own; lowering into it is the backend's job.

mod canonicalize;
mod classify;
mod expand;
mod graph;
pub mod ir;
mod motion;
mod return_three;
mod store_only;

use std::ops::AddAssign;

pub use classify::{
    classify, may_have_side_effects, rc_object, RtKind, RuntimeSymbols, ALLOC_OBJECT,
    OBJC_RELEASE, OBJC_RETAIN, RELEASE, RETAIN, RETAIN_AND_RETURN_THREE, RETAIN_NORESULT,
};
pub use graph::DominatorTree;
pub use ir::{
    BinOp, Block, BlockId, Callee, CastKind, Function, Global, Init, Inst, Linkage, LlType,
    MemKind, MemoryEffects, Module, Op, Operands, Use, ValueData, ValueId, ValueKind,
};
pub use store_only::{analyze_destructor, DtorKind};

/// What the passes did, per kind of transformation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArcStats {
    /// Retains and releases of null deleted.
    pub noops_deleted: usize,
    pub retain_release_pairs: usize,
    pub objc_retain_release_pairs: usize,
    /// Allocations released right away, deleted with their release.
    pub alloc_release_pairs: usize,
    pub store_only_objects_eliminated: usize,
    pub retains_expanded: usize,
    pub return_three_formed: usize,
}

impl ArcStats {
    /// Total number of transformations, expansion included.
    pub fn total(&self) -> usize {
        self.noops_deleted
            + self.retain_release_pairs
            + self.objc_retain_release_pairs
            + self.alloc_release_pairs
            + self.store_only_objects_eliminated
            + self.retains_expanded
            + self.return_three_formed
    }
}

impl AddAssign for ArcStats {
    fn add_assign(&mut self, other: Self) {
        self.noops_deleted += other.noops_deleted;
        self.retain_release_pairs += other.retain_release_pairs;
        self.objc_retain_release_pairs += other.objc_retain_release_pairs;
        self.alloc_release_pairs += other.alloc_release_pairs;
        self.store_only_objects_eliminated += other.store_only_objects_eliminated;
        self.retains_expanded += other.retains_expanded;
        self.return_three_formed += other.return_three_formed;
    }
}

/// Switches for individual transformations. Canonicalization always runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ArcOptions {
    pub store_only_elimination: bool,
    pub release_motion: bool,
    pub retain_motion: bool,
    pub retain_expansion: bool,
    pub return_three_fusion: bool,
}

impl Default for ArcOptions {
    fn default() -> Self {
        ArcOptions {
            store_only_elimination: true,
            release_motion: true,
            retain_motion: true,
            retain_expansion: true,
            return_three_fusion: true,
        }
    }
}

/// Run Phases A and B on one function. `func` need not belong to `module`;
/// the module supplies callee attributes and heap metadata.
pub fn optimize_function(module: &Module, func: &mut Function, options: &ArcOptions) -> ArcStats {
    let mut stats = ArcStats::default();
    if func.is_declaration() {
        return stats;
    }
    canonicalize::canonicalize(module, func, &mut stats);
    motion::optimize_blocks(module, func, options, &mut stats);
    stats
}

/// Run Phase C on one function in canonical form.
pub fn expand_function(module: &Module, func: &mut Function, options: &ArcOptions) -> ArcStats {
    let mut stats = ArcStats::default();
    if func.is_declaration() || !options.retain_expansion {
        return stats;
    }
    let (expanded, returns) = expand::expand_retains(module, func);
    stats.retains_expanded = expanded;
    if options.return_three_fusion {
        for ret in returns {
            return_three::form_return_three(module, func, ret, &mut stats);
        }
    }
    stats
}

/// Run Phases A and B on every function definition of `module`.
pub fn optimize_module(module: &mut Module, options: &ArcOptions) -> ArcStats {
    let stats = for_each_definition(module, |module, func| {
        optimize_function(module, func, options)
    });
    tracing::debug!(
        changes = stats.total(),
        pairs = stats.retain_release_pairs + stats.objc_retain_release_pairs,
        store_only = stats.store_only_objects_eliminated,
        "ARC optimization finished",
    );
    stats
}

/// Run Phase C on every function definition of `module`.
pub fn expand_module(module: &mut Module, options: &ArcOptions) -> ArcStats {
    let stats = for_each_definition(module, |module, func| {
        expand_function(module, func, options)
    });
    tracing::debug!(
        expanded = stats.retains_expanded,
        return_three = stats.return_three_formed,
        "ARC expansion finished",
    );
    stats
}

fn for_each_definition(
    module: &mut Module,
    mut pass: impl FnMut(&Module, &mut Function) -> ArcStats,
) -> ArcStats {
    let mut stats = ArcStats::default();
    for index in 0..module.num_functions() {
        if module.functions()[index].is_declaration() {
            continue;
        }
        let mut func = module.take_function(index);
        let _span = tracing::trace_span!("arc", function = func.name.raw()).entered();
        stats += pass(module, &mut func);
        module.restore_function(index, func);
    }
    stats
}

#[cfg(test)]
mod test_helpers;
