//! Control-flow queries: predecessor lists, postorder and dominance.

use smallvec::SmallVec;

use crate::ir::{BlockId, Function};

fn block_id(index: usize) -> BlockId {
    BlockId::new(u32::try_from(index).unwrap_or(u32::MAX))
}

/// The sources of each block's incoming edges, one entry per distinct
/// source, in block order.
pub(crate) fn compute_predecessors(func: &Function) -> Vec<Vec<usize>> {
    let n = func.num_blocks();
    let mut preds = vec![Vec::new(); n];
    for block in func.block_ids() {
        let mut targets: SmallVec<[usize; 2]> = func
            .successors(block)
            .into_iter()
            .map(|succ| succ.index())
            .filter(|&succ| succ < n)
            .collect();
        targets.sort_unstable();
        targets.dedup();
        for target in targets {
            preds[target].push(block.index());
        }
    }
    preds
}

/// Blocks reachable from the entry, each after all of its successors
/// except along back edges.
pub(crate) fn compute_postorder(func: &Function) -> Vec<usize> {
    let n = func.num_blocks();
    let mut order = Vec::with_capacity(n);
    if n == 0 {
        return order;
    }
    let mut seen = vec![false; n];
    let entry = func.entry();
    seen[entry.index()] = true;

    // Each frame is a block, its successors and how many have been tried.
    let mut frames = vec![(entry.index(), func.successors(entry), 0usize)];
    while let Some((block, succs, tried)) = frames.last_mut() {
        match succs.get(*tried).map(|succ| succ.index()) {
            Some(succ) => {
                *tried += 1;
                if succ < n && !seen[succ] {
                    seen[succ] = true;
                    let next = func.successors(block_id(succ));
                    frames.push((succ, next, 0));
                }
            }
            None => {
                order.push(*block);
                frames.pop();
            }
        }
    }
    order
}

/// Immediate dominators of every reachable block, together with the
/// predecessor lists they were computed from.
///
/// Built by the iterative two-finger scheme over reverse postorder
/// (Cooper, Harvey and Kennedy).
pub struct DominatorTree {
    /// Reachable blocks map to their immediate dominator, the entry to
    /// itself. Unreachable blocks map to `None`.
    idom: Vec<Option<usize>>,
    preds: Vec<Vec<usize>>,
}

impl DominatorTree {
    pub fn build(func: &Function) -> Self {
        let n = func.num_blocks();
        let preds = compute_predecessors(func);
        let mut idom = vec![None; n];
        if n == 0 {
            return DominatorTree { idom, preds };
        }

        let mut rpo = compute_postorder(func);
        rpo.reverse();
        let mut rank = vec![usize::MAX; n];
        for (position, &block) in rpo.iter().enumerate() {
            rank[block] = position;
        }

        let entry = func.entry().index();
        idom[entry] = Some(entry);
        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().filter(|&&block| block != entry) {
                let mut known = preds[block].iter().copied().filter(|&p| idom[p].is_some());
                let Some(first) = known.next() else {
                    continue;
                };
                let found = known.fold(first, |a, b| common_dominator(&idom, &rank, a, b));
                if idom[block] != Some(found) {
                    idom[block] = Some(found);
                    changed = true;
                }
            }
        }

        DominatorTree { idom, preds }
    }

    /// Every block dominates itself, unreachable ones included.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut block = b.index();
        while block != a.index() {
            match self.idom.get(block).copied().flatten() {
                Some(up) if up != block => block = up,
                _ => return false,
            }
        }
        true
    }

    /// `None` for the entry and for unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        let up = self.idom.get(block.index()).copied().flatten()?;
        (up != block.index()).then(|| block_id(up))
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        matches!(self.idom.get(block.index()), Some(Some(_)))
    }

    /// Distinct predecessors of `block`, reachable or not.
    pub fn predecessors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.preds
            .get(block.index())
            .into_iter()
            .flatten()
            .map(|&pred| block_id(pred))
    }
}

/// Nearest block dominating both `a` and `b`, both reachable.
fn common_dominator(idom: &[Option<usize>], rank: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        // Whichever sits later in reverse postorder moves up.
        let (lower, other) = if rank[a] > rank[b] {
            (&mut a, b)
        } else {
            (&mut b, a)
        };
        match idom[*lower] {
            Some(up) => *lower = up,
            None => return other,
        }
    }
    a
}
