//! The conformance algorithm.

use smallvec::SmallVec;
use tern_diagnostic::{
    ambiguous_witnesses, ambiguous_witnesses_type, inherited_protocol_does_not_conform,
    no_witnesses, no_witnesses_type, type_does_not_conform, DiagnosticSink, WitnessKind,
};
use tern_ir::Span;
use tern_stack::ensure_sufficient_stack;

use super::{CacheLookup, ConformanceCache, ConformsTo, ProtocolConformance};
use crate::{
    subst_member_type_with_base, subst_type, ArchetypeId, ArchetypeOwner, AstContext, DeclId, Idx,
    MemberLookupKind, NameLookup, TypeData, TypeFlags, UnqualifiedLookupKind, ValueKind,
};

/// Checks conformances against one [`AstContext`], memoizing into a shared
/// [`ConformanceCache`] and reporting through a [`DiagnosticSink`].
///
/// Passing a complain location asks for diagnostics on failure. Without
/// one the check is speculative: it fails silently and as early as possible.
pub struct ConformanceChecker<'a> {
    pub(super) ctx: &'a mut AstContext,
    pub(super) lookup: &'a dyn NameLookup,
    pub(super) cache: &'a mut ConformanceCache,
    pub(super) sink: &'a mut dyn DiagnosticSink,
}

/// Tracks whether the `type does not conform` headline was emitted for
/// the conformance being checked.
struct Complaints {
    span: Span,
    ty: Idx,
    proto: DeclId,
    emitted: bool,
}

impl<'a> ConformanceChecker<'a> {
    pub fn new(
        ctx: &'a mut AstContext,
        lookup: &'a dyn NameLookup,
        cache: &'a mut ConformanceCache,
        sink: &'a mut dyn DiagnosticSink,
    ) -> Self {
        ConformanceChecker {
            ctx,
            lookup,
            cache,
            sink,
        }
    }

    pub fn ctx(&self) -> &AstContext {
        self.ctx
    }

    pub fn cache(&self) -> &ConformanceCache {
        self.cache
    }

    /// Does `ty` conform to `proto`?
    ///
    /// Archetypes and existentials are answered structurally and never
    /// touch the cache. Any other type is checked once per canonical type;
    /// later queries return the cached answer, so a failure is diagnosed at
    /// most once. A query reaching a check that is still in progress fails.
    pub fn conforms_to_protocol(
        &mut self,
        ty: Idx,
        proto: DeclId,
        complain: Option<Span>,
    ) -> Option<ConformsTo> {
        if let Some(structural) = self.structural_conformance(ty, proto) {
            if !structural {
                if let Some(span) = complain {
                    self.report_headline(span, ty, proto);
                }
                return None;
            }
            return Some(ConformsTo::Structural);
        }

        let key = (self.ctx.pool().canonical(ty), proto);
        match self.cache.lookup(key) {
            CacheLookup::Computed(result) => return result.map(ConformsTo::Witnessed),
            CacheLookup::InProgress => {
                tracing::trace!(ty = %self.ctx.type_name(ty), "conformance cycle; assuming failure");
                return None;
            }
            CacheLookup::NotComputed => {}
        }

        self.cache.begin(key);
        let conformance = ensure_sufficient_stack(|| self.check_conforms(ty, proto, complain));
        let succeeded = conformance.is_some();
        let id = self.cache.finish(key, conformance);

        tracing::debug!(
            ty = %self.ctx.type_name(ty),
            protocol = self.ctx.decl_name(proto),
            succeeded,
            "checked conformance"
        );
        id.map(ConformsTo::Witnessed)
    }

    /// `Some(answer)` for archetypes and existentials, `None` otherwise.
    fn structural_conformance(&self, ty: Idx, proto: DeclId) -> Option<bool> {
        let pool = self.ctx.pool();
        if let Some(archetype) = pool.as_archetype(ty) {
            let conforms = self
                .ctx
                .archetype(archetype)
                .conforms_to
                .iter()
                .any(|&p| self.ctx.is_or_inherits(p, proto));
            return Some(conforms);
        }
        if pool.is_existential(ty) {
            let conforms = pool
                .existential_protocols(ty)
                .iter()
                .any(|&p| self.ctx.is_or_inherits(p, proto));
            return Some(conforms);
        }
        None
    }

    fn check_conforms(
        &mut self,
        ty: Idx,
        proto: DeclId,
        complain: Option<Span>,
    ) -> Option<ProtocolConformance> {
        let nominal = self.ctx.decl(proto).as_protocol()?;
        let inherited = nominal.inherited.clone();
        let members = nominal.members.clone();

        let mut conformance = ProtocolConformance::default();

        for inherited_ty in inherited {
            let protocols = self.ctx.pool().existential_protocols(inherited_ty);
            if protocols.is_empty() {
                return None;
            }
            for inherited_proto in protocols {
                match self.conforms_to_protocol(ty, inherited_proto, complain) {
                    Some(result) => {
                        conformance.inherited_mapping.insert(inherited_proto, result);
                    }
                    None => {
                        // The nested check diagnosed the failure itself.
                        if complain.is_some() {
                            let diag = inherited_protocol_does_not_conform(
                                self.ctx.decl(proto).span,
                                &self.ctx.type_name(ty),
                                &self.ctx.type_name(inherited_ty),
                            );
                            self.sink.report(diag);
                        }
                        return None;
                    }
                }
            }
        }

        let mut complaints = complain.map(|span| Complaints {
            span,
            ty,
            proto,
            emitted: false,
        });

        for &member in &members {
            let Some(value) = self.ctx.decl(member).as_value() else {
                continue;
            };
            let ValueKind::TypeAlias { underlying, .. } = value.kind else {
                continue;
            };
            let Some(archetype) = self.ctx.pool().as_archetype(underlying) else {
                continue;
            };
            if value.name == self.ctx.this_name() {
                conformance.type_mapping.insert(archetype, ty);
                continue;
            }
            let witness = self.resolve_associated_type(ty, member, &mut complaints)?;
            conformance.type_mapping.insert(archetype, witness);
        }

        if complaints.as_ref().is_some_and(|c| c.emitted) {
            return None;
        }

        for &member in &members {
            match self.ctx.decl(member).as_value() {
                Some(value) if !matches!(value.kind, ValueKind::TypeAlias { .. }) => {}
                _ => continue,
            }
            if let Some(witness) =
                self.resolve_value_requirement(ty, proto, member, &conformance, &mut complaints)?
            {
                conformance.mapping.insert(member, witness);
            }
        }

        if complaints.as_ref().is_some_and(|c| c.emitted) {
            return None;
        }
        Some(conformance)
    }

    /// Find the type bound to associated type `assoc` for `ty`.
    ///
    /// `None` aborts the whole check. Diagnosed failures bind the error type
    /// so the pass can continue collecting problems.
    fn resolve_associated_type(
        &mut self,
        ty: Idx,
        assoc: DeclId,
        complaints: &mut Option<Complaints>,
    ) -> Option<Idx> {
        let name = self.ctx.value(assoc).name;
        let requirements = match &self.ctx.value(assoc).kind {
            ValueKind::TypeAlias { inherited, .. } => inherited.clone(),
            _ => SmallVec::new(),
        };

        let results = self.lookup.lookup_member(self.ctx, ty, name);
        let mut viable: SmallVec<[(DeclId, Idx); 2]> = SmallVec::new();
        let mut non_viable: SmallVec<[(DeclId, Idx, DeclId); 2]> = SmallVec::new();

        for result in &results {
            let candidate_kind = matches!(
                result.kind,
                MemberLookupKind::MetatypeMember | MemberLookupKind::MetaArchetypeMember
            );
            if !candidate_kind || !self.ctx.value(result.decl).is_type_decl() {
                continue;
            }
            let Some(mut candidate_ty) = self.ctx.declared_type(result.decl) else {
                continue;
            };
            if result.kind == MemberLookupKind::MetatypeMember {
                match subst_member_type_with_base(
                    self.ctx,
                    self.lookup,
                    candidate_ty,
                    result.decl,
                    ty,
                ) {
                    Some(substituted) => candidate_ty = substituted,
                    None => continue,
                }
            }

            let mut rejected_by = None;
            'requirements: for &requirement in &requirements {
                let protocols = self.ctx.pool().existential_protocols(requirement);
                if protocols.is_empty() {
                    return None;
                }
                for required in protocols {
                    if self.conforms_to_protocol(candidate_ty, required, None).is_none() {
                        rejected_by = Some(required);
                        break 'requirements;
                    }
                }
            }
            match rejected_by {
                None => viable.push((result.decl, candidate_ty)),
                Some(required) => non_viable.push((result.decl, candidate_ty, required)),
            }
        }

        if let [(_, witness)] = viable.as_slice() {
            return Some(*witness);
        }

        let complaints = complaints.as_mut()?;
        self.headline(complaints);

        let assoc_span = self.ctx.decl(assoc).span;
        let assoc_name = self.ctx.interner().lookup(name);
        let diag = if !viable.is_empty() {
            let candidates: Vec<_> = viable
                .iter()
                .map(|&(decl, witness)| (self.ctx.decl(decl).span, self.ctx.type_name(witness)))
                .collect();
            ambiguous_witnesses_type(assoc_span, assoc_name, &candidates)
        } else {
            let rejected: Vec<_> = non_viable
                .iter()
                .map(|&(decl, witness, required)| {
                    (
                        self.ctx.decl(decl).span,
                        self.ctx.type_name(witness),
                        self.ctx.decl_name(required).to_owned(),
                    )
                })
                .collect();
            no_witnesses_type(assoc_span, assoc_name, &rejected)
        };
        self.sink.report(diag);
        Some(Idx::ERROR)
    }

    /// Find the witness for the value requirement `requirement`.
    ///
    /// The outer `None` aborts the check. An inner `None` means the
    /// requirement was diagnosed and left unbound.
    fn resolve_value_requirement(
        &mut self,
        ty: Idx,
        proto: DeclId,
        requirement: DeclId,
        conformance: &ProtocolConformance,
        complaints: &mut Option<Complaints>,
    ) -> Option<Option<DeclId>> {
        let usage = self.ctx.instance_usage_type(requirement);
        let required = usage
            .and_then(|usage| subst_type(self.ctx, self.lookup, usage, &conformance.type_mapping))
            .map(|substituted| self.ctx.pool_mut().unlabeled(substituted))
            .filter(|&substituted| !self.mentions_protocol_archetype(substituted, proto));

        let name = self.ctx.value(requirement).name;
        let mut viable: SmallVec<[DeclId; 2]> = SmallVec::new();

        if let Some(required) = required {
            if self.ctx.is_operator_name(name) {
                let results = self.lookup.lookup_unqualified(self.ctx, name);
                for result in results {
                    if result.kind == UnqualifiedLookupKind::ModuleMember
                        && self.value_member_matches(result.decl, requirement, required)
                    {
                        viable.push(result.decl);
                    }
                }
            } else {
                let results = self.lookup.lookup_member(self.ctx, ty, name);
                for result in results {
                    let matches = match result.kind {
                        MemberLookupKind::MetatypeMember
                        | MemberLookupKind::MetaArchetypeMember
                        | MemberLookupKind::MemberProperty
                        | MemberLookupKind::MemberFunction
                        | MemberLookupKind::ExistentialMember => {
                            self.value_member_matches(result.decl, requirement, required)
                        }
                        MemberLookupKind::ArchetypeMember => {
                            self.archetype_member_matches(ty, result.decl, requirement, required)
                        }
                    };
                    if matches {
                        viable.push(result.decl);
                    }
                }
            }
        }

        if let [witness] = viable.as_slice() {
            return Some(Some(*witness));
        }

        let complaints = complaints.as_mut()?;
        self.headline(complaints);

        let span = self.ctx.decl(requirement).span;
        let kind = witness_kind(&self.ctx.value(requirement).kind);
        let name = self.ctx.interner().lookup(name);
        let required_ty = self.ctx.type_name(required.or(usage).unwrap_or(Idx::ERROR));
        let diag = if viable.is_empty() {
            no_witnesses(span, kind, name, &required_ty)
        } else {
            let candidates: Vec<Span> = viable.iter().map(|&d| self.ctx.decl(d).span).collect();
            ambiguous_witnesses(span, kind, name, &required_ty, &candidates)
        };
        self.sink.report(diag);
        Some(None)
    }

    /// Same kind, same staticness for functions, and an instance usage
    /// type identical to `required`.
    fn value_member_matches(&mut self, candidate: DeclId, requirement: DeclId, required: Idx) -> bool {
        let cand = self.ctx.value(candidate);
        let req = self.ctx.value(requirement);
        if !cand.same_kind(req) {
            return false;
        }
        if let (ValueKind::Func { is_static: a }, ValueKind::Func { is_static: b }) =
            (&cand.kind, &req.kind)
        {
            if a != b {
                return false;
            }
        }
        self.ctx
            .instance_usage_type(candidate)
            .is_some_and(|usage| self.ctx.pool().is_equal(usage, required))
    }

    /// A requirement of a protocol reached through an archetype: its usage
    /// type is rewritten in terms of `base` before comparing.
    fn archetype_member_matches(
        &mut self,
        base: Idx,
        candidate: DeclId,
        requirement: DeclId,
        required: Idx,
    ) -> bool {
        if !self.ctx.value(candidate).same_kind(self.ctx.value(requirement)) {
            return false;
        }
        let Some(usage) = self.ctx.instance_usage_type(candidate) else {
            return false;
        };
        subst_member_type_with_base(self.ctx, self.lookup, usage, candidate, base)
            .is_some_and(|candidate_ty| self.ctx.pool().is_equal(candidate_ty, required))
    }

    /// Whether `ty` still mentions an archetype introduced by `proto`.
    fn mentions_protocol_archetype(&self, ty: Idx, proto: DeclId) -> bool {
        let pool = self.ctx.pool();
        if !pool.flags(ty).contains(TypeFlags::HAS_ARCHETYPE) {
            return false;
        }
        if let TypeData::Archetype(id) = pool.data(ty) {
            return self.owned_by(*id, proto);
        }
        pool.children(ty)
            .into_iter()
            .any(|child| self.mentions_protocol_archetype(child, proto))
    }

    fn owned_by(&self, archetype: ArchetypeId, proto: DeclId) -> bool {
        self.ctx.archetype(archetype).owner == ArchetypeOwner::Protocol(proto)
    }

    fn headline(&mut self, complaints: &mut Complaints) {
        if !complaints.emitted {
            complaints.emitted = true;
            self.report_headline(complaints.span, complaints.ty, complaints.proto);
        }
    }

    fn report_headline(&mut self, span: Span, ty: Idx, proto: DeclId) {
        let diag = type_does_not_conform(span, &self.ctx.type_name(ty), self.ctx.decl_name(proto));
        self.sink.report(diag);
    }
}

fn witness_kind(kind: &ValueKind) -> WitnessKind {
    match kind {
        ValueKind::Var { .. } => WitnessKind::Property,
        ValueKind::Subscript { .. } => WitnessKind::Subscript,
        _ => WitnessKind::Function,
    }
}
