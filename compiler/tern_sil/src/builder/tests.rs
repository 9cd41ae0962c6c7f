use pretty_assertions::assert_eq;

use crate::test_helpers::Fixture;

use super::*;

// === Result types ===

#[test]
fn memory_instructions_infer_types() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let var = fx.ctx.add_var(None, "x", Idx::INT64, true, Span::new(1, 2));
    let lvalue = fx.ctx.pool_mut().lvalue(Idx::INT64);
    let mut b = fx.builder();
    let entry = b.create_block();
    b.position_at_end(entry);
    let slot = b.alloc_var(var, Idx::INT64);
    let tmp = b.alloc_tmp(Idx::INT64);
    let loaded = b.load(slot, false);
    let moved = b.index_lvalue(tmp, 0);
    let unit = b.tuple(&[]);
    b.ret(unit);
    b.finish().unwrap();

    assert_eq!(fx.func.value_type(slot), lvalue);
    assert_eq!(fx.func.value_type(tmp), lvalue);
    assert_eq!(fx.func.value_type(loaded), Idx::INT64);
    assert_eq!(fx.func.value_type(moved), lvalue);
    assert_eq!(fx.func.value_type(unit), Idx::UNIT);
}

#[test]
fn aggregate_instructions_infer_types() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let pair_ty = fx.ctx.pool_mut().tuple_of(&[Idx::INT64, Idx::INT1]);
    let int_lvalue = fx.ctx.pool_mut().lvalue(Idx::INT64);
    let array_ty = fx.ctx.pool_mut().tuple_of(&[Idx::OBJECT_POINTER, int_lvalue]);
    let meta_ty = fx.ctx.pool_mut().metatype(Idx::INT64);
    let mut b = fx.builder();
    let entry = b.create_block();
    b.position_at_end(entry);
    let n = b.integer_literal(3, Idx::INT64);
    let flag = b.integer_value(1, Idx::INT1);
    let pair = b.tuple(&[n, flag]);
    let second = b.tuple_element(pair, 1);
    let missing = b.tuple_element(pair, 5);
    let array = b.alloc_array(Idx::INT64, n);
    let meta = b.metatype(Idx::INT64);
    b.unreachable();
    b.finish().unwrap();

    assert_eq!(fx.func.value_type(pair), pair_ty);
    assert_eq!(fx.func.value_type(second), Idx::INT1);
    assert_eq!(fx.func.value_type(missing), Idx::ERROR);
    assert_eq!(fx.func.value_type(array), array_ty);
    assert_eq!(fx.func.value_type(meta), meta_ty);
}

#[test]
fn apply_takes_the_callee_result_type() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let callee_ty = fx.ctx.pool_mut().function(Idx::INT64, Idx::INT1);
    let decl = fx.ctx.add_func(None, "g", Idx::INT64, Idx::INT1, false, Span::new(1, 2));
    let mut b = fx.builder();
    let entry = b.create_block();
    b.position_at_end(entry);
    let callee = b.constant_ref(decl, callee_ty);
    let arg = b.integer_literal(0, Idx::INT64);
    let call = b.apply(callee, &[arg]);
    let bogus = b.apply(arg, &[]);
    b.ret(call);
    b.finish().unwrap();

    assert_eq!(fx.func.value_type(call), Idx::INT1);
    assert_eq!(fx.func.value_type(bogus), Idx::ERROR);
    assert_eq!(
        fx.func.inst(call).unwrap().kind,
        InstKind::Apply {
            callee,
            args: Operands::from_slice(&[arg]),
        }
    );
}

// === Insertion point ===

#[test]
fn terminator_clears_insertion_point() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let mut b = fx.builder();
    let entry = b.create_block();
    let exit = b.create_block();
    b.position_at_end(entry);
    assert_eq!(b.current_block(), Some(entry));
    b.br(exit, &[]);
    assert_eq!(b.current_block(), None);
    b.position_at_end(exit);
    b.unreachable();
    assert_eq!(b.finish(), Ok(()));
}

#[test]
#[should_panic(expected = "no insertion point")]
fn emitting_after_terminator_panics() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let mut b = fx.builder();
    let entry = b.create_block();
    b.position_at_end(entry);
    b.unreachable();
    b.integer_value(0, Idx::INT64);
}

#[test]
#[should_panic(expected = "already terminated")]
fn repositioning_into_terminated_block_panics() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let mut b = fx.builder();
    let entry = b.create_block();
    b.position_at_end(entry);
    b.unreachable();
    b.position_at_end(entry);
}

#[test]
fn finish_reports_unterminated_block() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let mut b = fx.builder();
    let entry = b.create_block();
    let dangling = b.create_block();
    b.position_at_end(entry);
    b.br(dangling, &[]);
    let err = b.finish().unwrap_err();
    assert_eq!(err, BuildError { block: dangling });
    assert_eq!(err.to_string(), "bb1 has no terminator");
}

#[test]
fn span_is_attached_to_emitted_instructions() {
    let mut fx = Fixture::new("f", Idx::UNIT, Idx::UNIT);
    let mut b = fx.builder();
    let entry = b.create_block();
    b.position_at_end(entry);
    let before = b.integer_value(0, Idx::INT64);
    b.set_span(Span::new(40, 44));
    let after = b.integer_value(1, Idx::INT64);
    b.unreachable();

    assert_eq!(fx.func.inst(before).unwrap().span, Span::DUMMY);
    assert_eq!(fx.func.inst(after).unwrap().span, Span::new(40, 44));
}
