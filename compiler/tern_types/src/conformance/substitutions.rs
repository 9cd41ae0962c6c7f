//! Validation of generic argument substitutions.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tern_diagnostic::unresolvable_substitution;
use tern_ir::Span;

use super::{ConformanceChecker, ConformsTo};
use crate::{subst_type, ArchetypeId, DeclId, SubstitutionMap};

/// Conformances proving each archetype's replacement satisfies the
/// archetype's protocols, in `conforms_to` order.
pub type ConformanceMap = FxHashMap<ArchetypeId, SmallVec<[ConformsTo; 2]>>;

/// Why a substitution map was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionFailure {
    #[error("no replacement could be computed for archetype {archetype:?}")]
    Unresolvable { archetype: ArchetypeId },
    #[error("replacement for archetype {archetype:?} does not conform to protocol {protocol:?}")]
    DoesNotConform {
        archetype: ArchetypeId,
        protocol: DeclId,
    },
}

impl ConformanceChecker<'_> {
    /// Check that every primary archetype in `subs`, and every archetype
    /// nested in one, is replaced by a type conforming to the archetype's
    /// protocols.
    ///
    /// Conformances found are added to `conformances`; archetypes already
    /// present there are not rechecked. When `record` is given, it receives
    /// the computed replacement of every visited archetype.
    ///
    /// Same-type requirements are not checked here.
    pub fn check_substitutions(
        &mut self,
        subs: &SubstitutionMap,
        conformances: &mut ConformanceMap,
        complain: Option<Span>,
        mut record: Option<&mut SubstitutionMap>,
    ) -> Result<(), SubstitutionFailure> {
        let mut primaries: Vec<ArchetypeId> = subs
            .keys()
            .copied()
            .filter(|&a| self.ctx.archetype(a).is_primary())
            .collect();
        // Visit in declaration order regardless of hash order.
        primaries.sort_unstable_by(|a, b| b.cmp(a));

        let mut known: FxHashSet<ArchetypeId> = primaries.iter().copied().collect();
        let mut stack = primaries;

        while let Some(archetype) = stack.pop() {
            let archetype_ty = self.ctx.archetype(archetype).ty;
            let Some(replacement) = subst_type(self.ctx, self.lookup, archetype_ty, subs) else {
                if let Some(span) = complain {
                    let diag = unresolvable_substitution(
                        span,
                        &self.ctx.type_name(archetype_ty),
                        &self.parent_replacement_name(archetype, subs),
                    );
                    self.sink.report(diag);
                }
                return Err(SubstitutionFailure::Unresolvable { archetype });
            };

            if let Some(record) = record.as_deref_mut() {
                record.insert(archetype, replacement);
            }

            let already_checked = conformances.get(&archetype).is_some_and(|c| !c.is_empty());
            if !already_checked {
                let protocols = self.ctx.archetype(archetype).conforms_to.clone();
                let mut found = SmallVec::new();
                for protocol in protocols {
                    match self.conforms_to_protocol(replacement, protocol, complain) {
                        Some(conformance) => found.push(conformance),
                        None => {
                            return Err(SubstitutionFailure::DoesNotConform {
                                archetype,
                                protocol,
                            })
                        }
                    }
                }
                conformances.insert(archetype, found);
            }

            let nested: Vec<ArchetypeId> = self
                .ctx
                .archetype(archetype)
                .nested
                .iter()
                .rev()
                .map(|&(_, id)| id)
                .collect();
            for id in nested {
                if known.insert(id) {
                    stack.push(id);
                }
            }
        }

        tracing::trace!(archetypes = known.len(), "substitutions checked");
        Ok(())
    }

    /// Rendered replacement of an archetype's parent, for diagnostics.
    fn parent_replacement_name(&mut self, archetype: ArchetypeId, subs: &SubstitutionMap) -> String {
        let parent = self.ctx.archetype(archetype).parent;
        let replacement = parent.and_then(|p| {
            let parent_ty = self.ctx.archetype(p).ty;
            subst_type(self.ctx, self.lookup, parent_ty, subs)
        });
        match replacement {
            Some(ty) => self.ctx.type_name(ty),
            None => self.ctx.type_name(self.ctx.archetype(archetype).ty),
        }
    }
}
