//! Phase C, part one: turn `retain_noresult(x)` back into `y = retain(x)`.
//!
//! Uses of `x` downstream of a retain are rewritten to `y`, which
//! shortens the live range of `x` and lets the retain become a tail call.
//! Within a block this is a plain substitution. Across blocks the value
//! reaching a use is found by walking predecessors back to the retains;
//! where edges bringing different values meet, a phi joins them.

use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use tern_stack::ensure_sufficient_stack;

use crate::classify::{classify, rc_object, RtKind};
use crate::graph::DominatorTree;
use crate::ir::{BlockId, Callee, Function, LlType, Module, Op, ValueId, ValueKind};

/// Every retain of one value, at most one per block: the last.
struct RetainedValue {
    home: BlockId,
    defs: FxHashMap<BlockId, ValueId>,
}

/// Expand all retains of `func`. Returns the number expanded and the
/// returns seen, for return-three fusion afterwards.
pub(crate) fn expand_retains(module: &Module, func: &mut Function) -> (usize, Vec<ValueId>) {
    let mut expanded = 0;
    let mut returns = Vec::new();
    let mut order = Vec::new();
    let mut retained: FxHashMap<ValueId, RetainedValue> = FxHashMap::default();

    let blocks: Vec<_> = func.block_ids().collect();
    for &block in &blocks {
        let mut local: FxHashMap<ValueId, ValueId> = FxHashMap::default();
        for inst in func.block(block).insts.clone() {
            if classify(module, func, inst) == RtKind::RetainNoResult {
                let Some(object) = rc_object(func, inst) else {
                    continue;
                };
                let arg = local.get(&object).copied().unwrap_or(object);
                let ty = func.ty(object).clone();
                let call = Op::Call {
                    callee: Callee::Direct(module.runtime.retain),
                    args: smallvec![arg],
                    tail: true,
                };
                let retain = func.insert_before(inst, call, ty);
                func.erase(inst);
                expanded += 1;

                let home = match func.value(object).kind {
                    ValueKind::Param { .. } => func.entry(),
                    ValueKind::Inst(_) => match func.parent(object) {
                        Some(home) => home,
                        None => continue,
                    },
                    _ => continue,
                };
                local.insert(object, retain);
                retained
                    .entry(object)
                    .or_insert_with(|| {
                        order.push(object);
                        RetainedValue {
                            home,
                            defs: FxHashMap::default(),
                        }
                    })
                    .defs
                    .insert(block, retain);
                continue;
            }

            if matches!(func.op(inst), Some(Op::Ret { .. })) {
                returns.push(inst);
            }
            let operands = func.op(inst).map(Op::operands).unwrap_or_default();
            for (operand, value) in operands.into_iter().enumerate() {
                if let Some(&newer) = local.get(&value) {
                    func.set_operand(inst, operand, newer);
                }
            }
        }
    }

    let mut joins = 0;
    if !order.is_empty() {
        let dom = DominatorTree::build(func);
        for object in order {
            let Some(value) = retained.remove(&object) else {
                continue;
            };
            let mut ssa = ReachingRetains {
                object,
                ty: func.ty(object).clone(),
                home: value.home,
                defs: value.defs,
                dom: &dom,
                at_entry: FxHashMap::default(),
                joins: 0,
            };
            ssa.rewrite_uses(func);
            joins += ssa.joins;
        }
    }

    if expanded > 0 {
        tracing::debug!(function = func.name.raw(), expanded, joins, "expanded retains");
    }
    (expanded, returns)
}

/// Reaching-definition state for one retained value: which of its retains,
/// or which join of them, is live at the top of each block.
struct ReachingRetains<'a> {
    object: ValueId,
    ty: LlType,
    home: BlockId,
    defs: FxHashMap<BlockId, ValueId>,
    dom: &'a DominatorTree,
    /// Blocks resolved so far. A join phi is recorded here before its
    /// incoming values are filled in, which is what ends the walk around
    /// a loop.
    at_entry: FxHashMap<BlockId, ValueId>,
    joins: usize,
}

impl ReachingRetains<'_> {
    /// Point every use of the object outside its home block at the value
    /// reaching it. Uses inside the home block were handled block-locally.
    fn rewrite_uses(&mut self, func: &mut Function) {
        for u in func.uses(self.object) {
            let Some(block) = func.parent(u.user) else {
                continue;
            };
            let edge = match func.op(u.user) {
                Some(Op::Phi { incoming }) => Some(incoming.get(u.operand).map(|&(pred, _)| pred)),
                _ => None,
            };
            let reaching = match edge {
                Some(Some(pred)) => self.value_at_end(func, pred),
                Some(None) => continue,
                None if block == self.home => continue,
                None => self.value_at_entry(func, block),
            };
            if reaching != self.object {
                func.set_operand(u.user, u.operand, reaching);
            }
        }
    }

    fn value_at_end(&mut self, func: &mut Function, block: BlockId) -> ValueId {
        if let Some(&retain) = self.defs.get(&block) {
            return retain;
        }
        if block == self.home {
            return self.object;
        }
        self.value_at_entry(func, block)
    }

    fn value_at_entry(&mut self, func: &mut Function, block: BlockId) -> ValueId {
        if let Some(&known) = self.at_entry.get(&block) {
            return known;
        }
        // Outside the region the home block dominates no retain can reach.
        if block == self.home
            || !self.dom.is_reachable(block)
            || !self.dom.dominates(self.home, block)
        {
            return self.object;
        }

        let preds: SmallVec<[BlockId; 4]> = self.dom.predecessors(block).collect();
        if let [pred] = preds[..] {
            let value = ensure_sufficient_stack(|| self.value_at_end(func, pred));
            self.at_entry.insert(block, value);
            return value;
        }
        let Some(&first) = func.block(block).insts.first() else {
            return self.object;
        };

        let placeholder = Op::Phi {
            incoming: preds.iter().map(|&pred| (pred, self.object)).collect(),
        };
        let phi = func.insert_before(first, placeholder, self.ty.clone());
        self.at_entry.insert(block, phi);
        let mut incoming = SmallVec::<[ValueId; 4]>::new();
        for &pred in &preds {
            incoming.push(ensure_sufficient_stack(|| self.value_at_end(func, pred)));
        }

        let mut others = incoming.iter().copied().filter(|&v| v != phi);
        let single = match others.next() {
            Some(v) => others.all(|w| w == v).then_some(v),
            None => Some(self.object),
        };
        if let Some(value) = single {
            func.replace_all_uses(phi, value);
            func.erase(phi);
            for known in self.at_entry.values_mut().filter(|known| **known == phi) {
                *known = value;
            }
            return value;
        }

        for (operand, value) in incoming.into_iter().enumerate() {
            func.set_operand(phi, operand, value);
        }
        tracing::trace!(block = block.raw(), phi = phi.raw(), "joined retains");
        self.joins += 1;
        phi
    }
}

#[cfg(test)]
mod tests;
