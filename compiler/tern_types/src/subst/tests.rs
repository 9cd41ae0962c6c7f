use pretty_assertions::assert_eq;
use tern_ir::Span;

use crate::{GenericParamSpec, ModuleLookup, NominalKind};

use super::*;

fn sp(n: u32) -> Span {
    Span::new(n, n + 1)
}

fn param<'a>(name: &'a str, conforms_to: &'a [Idx]) -> GenericParamSpec<'a> {
    GenericParamSpec { name, conforms_to }
}

/// Declare one generic parameter list and return its primary archetypes.
fn primaries<const N: usize>(
    ctx: &mut AstContext,
    specs: &[GenericParamSpec<'_>; N],
) -> [ArchetypeId; N] {
    let list = ctx.add_generic_params(specs, None, sp(0));
    let archetypes: Vec<ArchetypeId> = ctx.generic_param_list(list).primary_archetypes().collect();
    archetypes.try_into().unwrap()
}

fn nested(ctx: &AstContext, parent: ArchetypeId, name: &str) -> ArchetypeId {
    ctx.archetype(parent).nested_type(ctx.name(name)).unwrap()
}

fn subst(ctx: &mut AstContext, ty: Idx, subs: &[(ArchetypeId, Idx)]) -> Option<Idx> {
    let subs: SubstitutionMap = subs.iter().copied().collect();
    subst_type(ctx, &ModuleLookup, ty, &subs)
}

// === Primary archetypes ===

#[test]
fn mapped_archetype_is_replaced_everywhere() {
    let mut ctx = AstContext::default();
    let [t] = primaries(&mut ctx, &[param("T", &[])]);
    let t_ty = ctx.archetype(t).ty;
    let lvalue = ctx.pool_mut().lvalue(t_ty);
    let fn_ty = ctx.pool_mut().function(lvalue, t_ty);

    let result = subst(&mut ctx, fn_ty, &[(t, Idx::INT64)]).unwrap();
    let int_lvalue = ctx.pool_mut().lvalue(Idx::INT64);
    let expected = ctx.pool_mut().function(int_lvalue, Idx::INT64);
    assert_eq!(result, expected);
}

#[test]
fn types_without_archetypes_are_returned_unchanged() {
    let mut ctx = AstContext::default();
    let [t] = primaries(&mut ctx, &[param("T", &[])]);
    let tuple = ctx.pool_mut().tuple_of(&[Idx::INT64, Idx::INT1]);
    assert_eq!(subst(&mut ctx, tuple, &[(t, Idx::UNIT)]), Some(tuple));
}

#[test]
fn unmapped_archetype_is_kept() {
    let mut ctx = AstContext::default();
    let specs = [
        param("T", &[]),
        param("U", &[]),
    ];
    let [t, u] = primaries(&mut ctx, &specs);
    let t_ty = ctx.archetype(t).ty;
    let u_ty = ctx.archetype(u).ty;
    let pair = ctx.pool_mut().tuple_of(&[t_ty, u_ty]);

    let result = subst(&mut ctx, pair, &[(t, Idx::INT64)]).unwrap();
    let expected = ctx.pool_mut().tuple_of(&[Idx::INT64, u_ty]);
    assert_eq!(result, expected);
}

#[test]
fn substitution_through_an_alias_drops_the_sugar() {
    let mut ctx = AstContext::default();
    let [t] = primaries(&mut ctx, &[param("T", &[])]);
    let t_ty = ctx.archetype(t).ty;
    let pair = ctx.pool_mut().tuple_of(&[t_ty, t_ty]);
    let alias = ctx.add_typealias(None, "Pair", pair, sp(1));
    let sugared = ctx.declared_type(alias).unwrap();

    let result = subst(&mut ctx, sugared, &[(t, Idx::INT64)]).unwrap();
    let expected = ctx.pool_mut().tuple_of(&[Idx::INT64, Idx::INT64]);
    assert_eq!(result, expected);
    assert!(!ctx.pool().flags(result).contains(TypeFlags::HAS_SUGAR));
}

// === Nested archetypes ===

#[test]
fn nested_archetype_follows_replacement_archetype() {
    let mut ctx = AstContext::default();
    let seq = ctx.declare_protocol("Sequence", &[], sp(1));
    let seq_ty = ctx.declared_type(seq).unwrap();
    ctx.add_associated_type(seq, "Element", &[], sp(2));
    let seq_bound = [seq_ty];
    let specs = [
        param("T", &seq_bound),
        param("U", &seq_bound),
    ];
    let [t, u] = primaries(&mut ctx, &specs);
    let t_elem = ctx.archetype(nested(&ctx, t, "Element")).ty;
    let u_elem = ctx.archetype(nested(&ctx, u, "Element")).ty;
    let u_ty = ctx.archetype(u).ty;

    assert_eq!(subst(&mut ctx, t_elem, &[(t, u_ty)]), Some(u_elem));
}

#[test]
fn nested_archetype_resolves_to_concrete_member_type() {
    let mut ctx = AstContext::default();
    let seq = ctx.declare_protocol("Sequence", &[], sp(1));
    let seq_ty = ctx.declared_type(seq).unwrap();
    ctx.add_associated_type(seq, "Element", &[], sp(2));
    let list = ctx.declare_nominal(NominalKind::Struct, "IntList", None, &[], sp(3));
    let list_ty = ctx.declared_type(list).unwrap();
    let element = ctx.add_typealias(Some(list), "Element", Idx::INT64, sp(4));
    let [t] = primaries(&mut ctx, &[param("T", &[seq_ty])]);
    let t_elem = ctx.archetype(nested(&ctx, t, "Element")).ty;

    let result = subst(&mut ctx, t_elem, &[(t, list_ty)]).unwrap();
    assert_eq!(Some(result), ctx.declared_type(element));
    assert_eq!(ctx.pool().desugar(result), Idx::INT64);
}

#[test]
fn missing_member_type_fails() {
    let mut ctx = AstContext::default();
    let seq = ctx.declare_protocol("Sequence", &[], sp(1));
    let seq_ty = ctx.declared_type(seq).unwrap();
    ctx.add_associated_type(seq, "Element", &[], sp(2));
    let empty = ctx.declare_nominal(NominalKind::Struct, "Empty", None, &[], sp(3));
    let empty_ty = ctx.declared_type(empty).unwrap();
    // A value member of the right name is not a type.
    ctx.add_var(Some(empty), "Element", Idx::INT64, false, sp(4));
    let [t] = primaries(&mut ctx, &[param("T", &[seq_ty])]);
    let t_elem = ctx.archetype(nested(&ctx, t, "Element")).ty;
    let wrapped = ctx.pool_mut().tuple_of(&[Idx::INT64, t_elem]);

    assert_eq!(subst(&mut ctx, wrapped, &[(t, empty_ty)]), None);
}

// === Member types seen through a base ===

#[test]
fn member_of_bound_generic_base_sees_arguments() {
    let mut ctx = AstContext::default();
    let array = ctx.declare_generic_nominal(
        NominalKind::Struct,
        "Array",
        &[param("T", &[])],
        &[],
        sp(1),
    );
    let generics = ctx.decl(array).as_nominal().unwrap().generics.unwrap();
    let t = ctx.generic_param_list(generics).params[0].archetype;
    let t_ty = ctx.archetype(t).ty;
    let first = ctx.add_var(Some(array), "first", t_ty, false, sp(2));
    let base = ctx.pool_mut().bound_generic(array, &[Idx::FLOAT64]);
    let meta_base = ctx.pool_mut().metatype(base);

    assert_eq!(
        subst_member_type_with_base(&mut ctx, &ModuleLookup, t_ty, first, base),
        Some(Idx::FLOAT64)
    );
    assert_eq!(
        subst_member_type_with_base(&mut ctx, &ModuleLookup, t_ty, first, meta_base),
        Some(Idx::FLOAT64)
    );
}

#[test]
fn member_of_archetype_base_maps_protocol_this() {
    let mut ctx = AstContext::default();
    let proto = ctx.declare_protocol("Copyable", &[], sp(1));
    let proto_ty = ctx.declared_type(proto).unwrap();
    let this = ctx.protocol_this_archetype(proto).unwrap();
    let this_ty = ctx.archetype(this).ty;
    let copy = ctx.add_func(Some(proto), "copy", Idx::UNIT, this_ty, false, sp(2));
    let copy_ty = ctx.value(copy).ty().unwrap();
    let [u] = primaries(&mut ctx, &[param("U", &[proto_ty])]);
    let u_ty = ctx.archetype(u).ty;

    let result = subst_member_type_with_base(&mut ctx, &ModuleLookup, copy_ty, copy, u_ty);
    let inner = ctx.pool_mut().function(Idx::UNIT, u_ty);
    let expected = ctx.pool_mut().function(u_ty, inner);
    assert_eq!(result, Some(expected));
}

#[test]
fn member_of_plain_nominal_base_is_unchanged() {
    let mut ctx = AstContext::default();
    let [t] = primaries(&mut ctx, &[param("T", &[])]);
    let t_ty = ctx.archetype(t).ty;
    let s = ctx.declare_nominal(NominalKind::Struct, "S", None, &[], sp(1));
    let s_ty = ctx.declared_type(s).unwrap();
    let field = ctx.add_var(Some(s), "field", t_ty, false, sp(2));

    assert_eq!(
        subst_member_type_with_base(&mut ctx, &ModuleLookup, t_ty, field, s_ty),
        Some(t_ty)
    );
}
