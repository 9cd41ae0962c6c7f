//! Name lookup.
//!
//! The conformance checker consumes classified lookup results through the
//! [`NameLookup`] trait and never walks scopes itself. [`ModuleLookup`] is the
//! single-module implementation used by the driver and in tests.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tern_ir::Name;

use crate::{AstContext, DeclId, Idx, TypeData, ValueKind};

/// How a member was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberLookupKind {
    /// Instance property or subscript of a concrete type.
    MemberProperty,
    /// Instance method of a concrete type.
    MemberFunction,
    /// Found on the type itself: nested types, static methods, oneof elements.
    MetatypeMember,
    /// Value requirement of a protocol, reached through an existential.
    ExistentialMember,
    /// Value requirement of a protocol, reached through an archetype.
    ArchetypeMember,
    /// Associated type of a protocol, reached through an archetype.
    MetaArchetypeMember,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemberLookupResult {
    pub decl: DeclId,
    pub kind: MemberLookupKind,
}

/// How an unqualified name was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnqualifiedLookupKind {
    ModuleMember,
    LocalDecl,
    MemberProperty,
    MemberFunction,
    MetatypeMember,
    ExistentialMember,
    ArchetypeMember,
    MetaArchetypeMember,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnqualifiedLookupResult {
    pub decl: DeclId,
    /// The declaration whose member this is, for member results.
    pub base: Option<DeclId>,
    pub kind: UnqualifiedLookupKind,
}

pub type MemberResults = SmallVec<[MemberLookupResult; 4]>;
pub type UnqualifiedResults = SmallVec<[UnqualifiedLookupResult; 4]>;

/// Lookup collaborator.
pub trait NameLookup {
    /// `base.name`: members named `name` visible on values of type `base`.
    fn lookup_member(&self, ctx: &AstContext, base: Idx, name: Name) -> MemberResults;

    /// `name` at module scope.
    fn lookup_unqualified(&self, ctx: &AstContext, name: Name) -> UnqualifiedResults;
}

/// Lookup over the single module held by an [`AstContext`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ModuleLookup;

impl NameLookup for ModuleLookup {
    fn lookup_member(&self, ctx: &AstContext, base: Idx, name: Name) -> MemberResults {
        let mut results = MemberResults::new();
        let mut visited = FxHashSet::default();
        lookup_member_in(ctx, base, name, &mut visited, &mut results);
        tracing::trace!(
            base = %ctx.type_name(base),
            name = ctx.interner().lookup(name),
            found = results.len(),
            "member lookup"
        );
        results
    }

    fn lookup_unqualified(&self, ctx: &AstContext, name: Name) -> UnqualifiedResults {
        ctx.module()
            .decls
            .iter()
            .copied()
            .filter(|&decl| ctx.decl(decl).name() == Some(name))
            .map(|decl| UnqualifiedLookupResult {
                decl,
                base: None,
                kind: UnqualifiedLookupKind::ModuleMember,
            })
            .collect()
    }
}

fn lookup_member_in(
    ctx: &AstContext,
    base: Idx,
    name: Name,
    visited: &mut FxHashSet<DeclId>,
    results: &mut MemberResults,
) {
    let pool = ctx.pool();
    // L-valueness doesn't affect lookup.
    let base = pool.desugar(pool.rvalue(base));

    match pool.data(base) {
        TypeData::Metatype(instance) => {
            lookup_member_in(ctx, *instance, name, visited, results);
        }
        TypeData::Protocol(proto) => {
            lookup_protocol_member(ctx, *proto, name, visited, results);
        }
        TypeData::ProtocolComposition(members) => {
            for &member in members.iter() {
                lookup_member_in(ctx, member, name, visited, results);
            }
        }
        TypeData::Archetype(id) => {
            let mut found = MemberResults::new();
            for &proto in &ctx.archetype(*id).conforms_to {
                lookup_protocol_member(ctx, proto, name, visited, &mut found);
            }
            // Requirements reached through an archetype are archetype members.
            for mut result in found {
                result.kind = match result.kind {
                    MemberLookupKind::MetatypeMember => MemberLookupKind::MetaArchetypeMember,
                    _ => MemberLookupKind::ArchetypeMember,
                };
                results.push(result);
            }
        }
        TypeData::Nominal(_) | TypeData::BoundGeneric { .. } => {
            let mut current = ctx.nominal_decl_of(base);
            while let Some(decl) = current {
                if !visited.insert(decl) {
                    break;
                }
                collect_nominal_members(ctx, decl, name, results);
                current = ctx.superclass(decl).and_then(|sup| ctx.nominal_decl_of(sup));
            }
        }
        _ => {}
    }
}

fn lookup_protocol_member(
    ctx: &AstContext,
    proto: DeclId,
    name: Name,
    visited: &mut FxHashSet<DeclId>,
    results: &mut MemberResults,
) {
    if !visited.insert(proto) {
        return;
    }
    for inherited in ctx.inherited_protocols(proto) {
        lookup_protocol_member(ctx, inherited, name, visited, results);
    }
    let Some(nominal) = ctx.decl(proto).as_protocol() else {
        return;
    };
    for &member in &nominal.members {
        let Some(value) = ctx.decl(member).as_value() else {
            continue;
        };
        if value.name != name {
            continue;
        }
        let kind = match value.kind {
            ValueKind::Var { .. } | ValueKind::Subscript { .. } | ValueKind::Func { .. } => {
                MemberLookupKind::ExistentialMember
            }
            _ => MemberLookupKind::MetatypeMember,
        };
        results.push(MemberLookupResult { decl: member, kind });
    }
}

/// Members of a nominal declaration and of every extension of it.
fn collect_nominal_members(ctx: &AstContext, decl: DeclId, name: Name, results: &mut MemberResults) {
    let Some(nominal) = ctx.decl(decl).as_nominal() else {
        return;
    };
    let extension_members = ctx
        .extensions_of(decl)
        .iter()
        .filter_map(|&ext| ctx.decl(ext).as_extension())
        .flat_map(|ext| ext.members.iter().copied());

    for member in nominal.members.iter().copied().chain(extension_members) {
        let Some(value) = ctx.decl(member).as_value() else {
            continue;
        };
        if value.name != name {
            continue;
        }
        let kind = match value.kind {
            ValueKind::TypeAlias { .. } | ValueKind::Nominal(_) | ValueKind::OneOfElement => {
                MemberLookupKind::MetatypeMember
            }
            ValueKind::Func { is_static: true } => MemberLookupKind::MetatypeMember,
            ValueKind::Func { is_static: false } => MemberLookupKind::MemberFunction,
            ValueKind::Var { .. } | ValueKind::Subscript { .. } => MemberLookupKind::MemberProperty,
            ValueKind::Constructor | ValueKind::Destructor => continue,
        };
        results.push(MemberLookupResult { decl: member, kind });
    }
}
