//! Type substitution.
//!
//! Replaces archetypes by concrete types. Substitution fails (`None`) when a
//! nested archetype's parent is replaced by a type that has no member type
//! of the nested archetype's name.

use rustc_hash::FxHashMap;
use tern_stack::ensure_sufficient_stack;

use crate::{
    ArchetypeId, AstContext, DeclContext, DeclId, Idx, NameLookup, TupleElt, TypeData, TypeFlags,
};

/// Archetype → replacement type.
pub type SubstitutionMap = FxHashMap<ArchetypeId, Idx>;

/// Substitute `subs` into `ty`.
///
/// Archetypes with no entry are kept unless their parent archetype is
/// substituted, in which case they resolve to the replacement parent's
/// member of the same name.
pub fn subst_type(
    ctx: &mut AstContext,
    lookup: &dyn NameLookup,
    ty: Idx,
    subs: &SubstitutionMap,
) -> Option<Idx> {
    if !ctx.pool().flags(ty).contains(TypeFlags::HAS_ARCHETYPE) {
        return Some(ty);
    }
    ensure_sufficient_stack(|| subst_inner(ctx, lookup, ty, subs))
}

fn subst_inner(
    ctx: &mut AstContext,
    lookup: &dyn NameLookup,
    ty: Idx,
    subs: &SubstitutionMap,
) -> Option<Idx> {
    let data = ctx.pool().data(ty).clone();
    let result = match data {
        TypeData::Archetype(id) => return subst_archetype(ctx, lookup, ty, id, subs),
        TypeData::Tuple(elts) => {
            let mut changed = false;
            let mut out = Vec::with_capacity(elts.len());
            for elt in elts.iter() {
                let new_ty = subst_type(ctx, lookup, elt.ty, subs)?;
                changed |= new_ty != elt.ty;
                out.push(TupleElt {
                    label: elt.label,
                    ty: new_ty,
                });
            }
            if !changed {
                return Some(ty);
            }
            ctx.pool_mut().tuple(&out)
        }
        TypeData::Function { input, result } => {
            let i = subst_type(ctx, lookup, input, subs)?;
            let r = subst_type(ctx, lookup, result, subs)?;
            if (i, r) == (input, result) {
                return Some(ty);
            }
            ctx.pool_mut().function(i, r)
        }
        TypeData::PolymorphicFunction {
            input,
            result,
            generics,
        } => {
            let i = subst_type(ctx, lookup, input, subs)?;
            let r = subst_type(ctx, lookup, result, subs)?;
            if (i, r) == (input, result) {
                return Some(ty);
            }
            ctx.pool_mut().polymorphic_function(i, r, generics)
        }
        TypeData::Metatype(instance) => {
            let i = subst_type(ctx, lookup, instance, subs)?;
            if i == instance {
                return Some(ty);
            }
            ctx.pool_mut().metatype(i)
        }
        TypeData::LValue(object) => {
            let o = subst_type(ctx, lookup, object, subs)?;
            if o == object {
                return Some(ty);
            }
            ctx.pool_mut().lvalue(o)
        }
        TypeData::BoundGeneric { decl, args } => {
            let mut new_args = Vec::with_capacity(args.len());
            for &arg in args.iter() {
                new_args.push(subst_type(ctx, lookup, arg, subs)?);
            }
            if new_args.as_slice() == &*args {
                return Some(ty);
            }
            ctx.pool_mut().bound_generic(decl, &new_args)
        }
        TypeData::ProtocolComposition(members) => {
            let mut new_members = Vec::with_capacity(members.len());
            for &member in members.iter() {
                new_members.push(subst_type(ctx, lookup, member, subs)?);
            }
            if new_members.as_slice() == &*members {
                return Some(ty);
            }
            ctx.pool_mut().protocol_composition(&new_members)
        }
        // Substitution through an alias drops the sugar.
        TypeData::NameAlias { underlying, .. } => {
            let u = subst_type(ctx, lookup, underlying, subs)?;
            if u == underlying {
                return Some(ty);
            }
            u
        }
        TypeData::Error
        | TypeData::BuiltinInteger { .. }
        | TypeData::BuiltinFloat { .. }
        | TypeData::RawPointer
        | TypeData::ObjectPointer
        | TypeData::Nominal(_)
        | TypeData::Protocol(_) => ty,
    };
    Some(result)
}

fn subst_archetype(
    ctx: &mut AstContext,
    lookup: &dyn NameLookup,
    ty: Idx,
    id: ArchetypeId,
    subs: &SubstitutionMap,
) -> Option<Idx> {
    if let Some(&replacement) = subs.get(&id) {
        return Some(replacement);
    }

    let archetype = ctx.archetype(id);
    let name = archetype.name;
    let Some(parent) = archetype.parent else {
        return Some(ty);
    };
    let parent_ty = ctx.archetype(parent).ty;

    let new_parent = subst_type(ctx, lookup, parent_ty, subs)?;
    if new_parent == parent_ty {
        return Some(ty);
    }

    // Parent replaced by another archetype: take its nested archetype.
    if let Some(parent_archetype) = ctx.pool().as_archetype(new_parent) {
        let nested = ctx.archetype(parent_archetype).nested_type(name)?;
        return Some(ctx.archetype(nested).ty);
    }

    // Parent replaced by a concrete type: find its member type by name.
    let results = lookup.lookup_member(ctx, new_parent, name);
    let member = results
        .iter()
        .rev()
        .map(|r| r.decl)
        .find(|&decl| ctx.value(decl).is_type_decl())?;
    let declared = ctx.declared_type(member)?;
    subst_member_type_with_base(ctx, lookup, declared, member, new_parent)
}

/// Substitute into the type of `member` as seen through a value of type
/// `base`.
///
/// A bound-generic base maps the generic declaration's parameters to the
/// base's arguments. An archetype base maps the `This` of the protocol that
/// declares `member` to the base. Any other base leaves `ty` unchanged.
pub fn subst_member_type_with_base(
    ctx: &mut AstContext,
    lookup: &dyn NameLookup,
    ty: Idx,
    member: DeclId,
    base: Idx,
) -> Option<Idx> {
    let base = ctx.metatype_instance(base);
    let base = ctx.pool().desugar(ctx.pool().rvalue(base));

    let mut subs = SubstitutionMap::default();
    match ctx.pool().data(base).clone() {
        TypeData::BoundGeneric { decl, args } => {
            let Some(list) = ctx.decl(decl).as_nominal().and_then(|n| n.generics) else {
                return Some(ty);
            };
            let params: Vec<ArchetypeId> =
                ctx.generic_param_list(list).primary_archetypes().collect();
            for (param, &arg) in params.into_iter().zip(args.iter()) {
                subs.insert(param, arg);
            }
        }
        TypeData::Archetype(_) => {
            let proto = ctx
                .decl_context(ctx.decl(member).context)
                .and_then(DeclContext::declared_type_of_context)
                .and_then(|t| match ctx.pool().data(t) {
                    TypeData::Protocol(p) => Some(*p),
                    _ => None,
                });
            let Some(this) = proto.and_then(|p| ctx.protocol_this_archetype(p)) else {
                return Some(ty);
            };
            subs.insert(this, base);
        }
        _ => return Some(ty),
    }
    subst_type(ctx, lookup, ty, &subs)
}

#[cfg(test)]
mod tests;
