use pretty_assertions::assert_eq;
use tern_ir::Span;
use tern_types::Idx;

use super::*;

fn v(n: u32) -> ValueId {
    ValueId::new(n)
}

fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

// === IDs ===

#[test]
fn ids_display_as_in_printed_ir() {
    assert_eq!(v(3).to_string(), "%3");
    assert_eq!(b(1).to_string(), "bb1");
    assert_eq!(v(7).index(), 7);
    assert_eq!(b(2).raw(), 2);
}

#[test]
fn id_sizes() {
    assert_eq!(std::mem::size_of::<ValueId>(), 4);
    assert_eq!(std::mem::size_of::<BlockId>(), 4);
}

// === InstKind ===

#[test]
fn terminators_are_classified() {
    let terminators = [
        InstKind::Unreachable,
        InstKind::Return { value: v(0) },
        InstKind::Branch {
            dest: b(1),
            args: Operands::new(),
        },
        InstKind::CondBranch {
            condition: v(0),
            true_dest: b(1),
            false_dest: b(2),
        },
    ];
    for kind in &terminators {
        assert!(kind.is_terminator(), "{kind:?}");
        assert!(!kind.has_result(), "{kind:?}");
    }
    assert!(!InstKind::AllocTmp.is_terminator());
    assert!(InstKind::AllocTmp.has_result());
    assert!(!InstKind::Retain { operand: v(0) }.has_result());
    assert!(!InstKind::Store {
        src: v(0),
        dest: v(1),
        is_initialization: false,
    }
    .has_result());
}

#[test]
fn operands_are_listed_in_order() {
    let apply = InstKind::Apply {
        callee: v(4),
        args: Operands::from_slice(&[v(1), v(2)]),
    };
    assert_eq!(apply.operands().as_slice(), &[v(4), v(1), v(2)]);

    let copy = InstKind::Copy {
        src: v(1),
        dest: v(2),
        is_take_of_src: true,
        is_initialization_of_dest: false,
    };
    assert_eq!(copy.operands().as_slice(), &[v(1), v(2)]);
    assert_eq!(InstKind::IntegerValue { value: 3 }.operands().len(), 0);
    assert_eq!(
        InstKind::Branch {
            dest: b(0),
            args: Operands::from_slice(&[v(5)]),
        }
        .operands()
        .as_slice(),
        &[v(5)]
    );
}

#[test]
fn successors_of_terminators() {
    let cond = InstKind::CondBranch {
        condition: v(0),
        true_dest: b(1),
        false_dest: b(2),
    };
    assert_eq!(cond.successors().as_slice(), &[b(1), b(2)]);
    assert!(InstKind::Return { value: v(0) }.successors().is_empty());
    assert!(InstKind::AllocTmp.successors().is_empty());
}

// === Function ===

#[test]
fn append_records_membership_both_ways() {
    let mut func = Function::new(Name::EMPTY, Idx::UNIT);
    assert_eq!(func.entry(), None);

    let bb0 = func.add_block();
    let arg = func.add_block_arg(bb0, Idx::INT64);
    let inst = func.append(bb0, InstKind::Return { value: arg }, Idx::UNIT, Span::new(1, 2));

    assert_eq!(func.entry(), Some(bb0));
    assert_eq!(func.block(bb0).args, vec![arg]);
    assert_eq!(func.block(bb0).insts, vec![inst]);
    assert_eq!(func.inst(inst).unwrap().parent, bb0);
    assert_eq!(func.inst(inst).unwrap().span, Span::new(1, 2));
    assert_eq!(func.inst(arg), None);
    assert_eq!(func.value(arg).def, ValueDef::BlockArg { block: bb0 });
    assert_eq!(func.value_type(arg), Idx::INT64);
    assert_eq!(func.num_values(), 2);
}

#[test]
fn terminator_is_only_reported_when_last() {
    let mut func = Function::new(Name::EMPTY, Idx::UNIT);
    let bb0 = func.add_block();
    let value = func.append(bb0, InstKind::IntegerValue { value: 1 }, Idx::INT64, Span::DUMMY);
    assert_eq!(func.terminator(bb0), None);

    func.append(bb0, InstKind::Return { value }, Idx::UNIT, Span::DUMMY);
    assert_eq!(func.terminator(bb0), Some(&InstKind::Return { value }));
}

#[test]
fn predecessors_are_deduplicated() {
    let mut func = Function::new(Name::EMPTY, Idx::UNIT);
    let bb0 = func.add_block();
    let bb1 = func.add_block();
    let cond = func.append(bb0, InstKind::IntegerValue { value: 1 }, Idx::INT1, Span::DUMMY);
    let kind = InstKind::CondBranch {
        condition: cond,
        true_dest: bb1,
        false_dest: bb1,
    };
    func.append(bb0, kind, Idx::UNIT, Span::DUMMY);
    func.append(bb1, InstKind::Unreachable, Idx::UNIT, Span::DUMMY);

    assert_eq!(func.predecessors(), vec![vec![], vec![bb0]]);
}
