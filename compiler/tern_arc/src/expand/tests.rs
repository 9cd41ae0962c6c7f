use pretty_assertions::assert_eq;

use super::*;
use crate::ir::LlType;
use crate::test_helpers::{load, ret_void, Fixture};

fn call_args(func: &Function, call: ValueId) -> Vec<ValueId> {
    match func.op(call) {
        Some(Op::Call { args, .. }) => args.to_vec(),
        other => panic!("expected a call, found {other:?}"),
    }
}

#[test]
fn retain_result_replaces_later_uses_in_the_block() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    let before = load(&mut func, entry, p);
    fx.retain_noresult(&mut func, entry, p);
    let after = load(&mut func, entry, p);
    ret_void(&mut func, entry);

    let (expanded, returns) = expand_retains(&fx.module, &mut func);

    assert_eq!(expanded, 1);
    assert_eq!(returns.len(), 1);
    assert_eq!(fx.render(&func), vec!["load", "tern_retain", "load", "ret"]);
    let retain = func.block(entry).insts[1];
    assert!(matches!(func.op(retain), Some(Op::Call { tail: true, .. })));
    assert_eq!(func.op(before), Some(&Op::Load { ptr: p }));
    assert_eq!(func.op(after), Some(&Op::Load { ptr: retain }));
}

#[test]
fn retains_in_one_block_chain() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let p = func.params()[0];
    fx.retain_noresult(&mut func, entry, p);
    fx.retain_noresult(&mut func, entry, p);
    let user = load(&mut func, entry, p);
    ret_void(&mut func, entry);

    expand_retains(&fx.module, &mut func);

    let insts = func.block(entry).insts.clone();
    assert_eq!(call_args(&func, insts[0]), vec![p]);
    assert_eq!(call_args(&func, insts[1]), vec![insts[0]]);
    assert_eq!(func.op(user), Some(&Op::Load { ptr: insts[1] }));
}

#[test]
fn dominating_retain_reaches_later_blocks() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let exit = func.add_block();
    let p = func.params()[0];
    fx.retain_noresult(&mut func, entry, p);
    func.append(entry, Op::Br { dest: exit }, LlType::Void);
    let user = load(&mut func, exit, p);
    ret_void(&mut func, exit);

    expand_retains(&fx.module, &mut func);

    let retain = func.block(entry).insts[0];
    assert_eq!(func.op(user), Some(&Op::Load { ptr: retain }));
}

/// `entry` branches on the second parameter to `left` and `right`, which
/// both jump to `join`.
fn diamond(fx: &Fixture) -> (Function, [BlockId; 4]) {
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Int(1)], LlType::Void);
    let (left, right, join) = (func.add_block(), func.add_block(), func.add_block());
    let cond = func.params()[1];
    func.append(
        entry,
        Op::CondBr {
            cond,
            then_dest: left,
            else_dest: right,
        },
        LlType::Void,
    );
    (func, [entry, left, right, join])
}

/// A retain on one arm only reaches the join through a new phi that
/// brings the original value along the other arm.
#[test]
fn retain_on_one_arm_is_joined_with_the_other_arm() {
    let fx = Fixture::new();
    let (mut func, [_, left, right, join]) = diamond(&fx);
    let p = func.params()[0];
    fx.retain_noresult(&mut func, left, p);
    func.append(left, Op::Br { dest: join }, LlType::Void);
    func.append(right, Op::Br { dest: join }, LlType::Void);
    let phi = func.append(
        join,
        Op::Phi {
            incoming: vec![(left, p), (right, p)],
        },
        LlType::Ptr,
    );
    let user = load(&mut func, join, p);
    ret_void(&mut func, join);

    expand_retains(&fx.module, &mut func);

    let retain = func.block(left).insts[0];
    assert_eq!(call_args(&func, retain), vec![p]);
    assert_eq!(
        func.op(phi),
        Some(&Op::Phi {
            incoming: vec![(left, retain), (right, p)],
        })
    );
    let joined = func.block(join).insts[0];
    assert_eq!(
        func.op(joined),
        Some(&Op::Phi {
            incoming: vec![(left, retain), (right, p)],
        })
    );
    assert_eq!(func.ty(joined), &LlType::Ptr);
    assert_eq!(func.op(user), Some(&Op::Load { ptr: joined }));
}

#[test]
fn retains_on_both_arms_meet_in_a_phi() {
    let fx = Fixture::new();
    let (mut func, [_, left, right, join]) = diamond(&fx);
    let p = func.params()[0];
    fx.retain_noresult(&mut func, left, p);
    func.append(left, Op::Br { dest: join }, LlType::Void);
    fx.retain_noresult(&mut func, right, p);
    func.append(right, Op::Br { dest: join }, LlType::Void);
    let user = load(&mut func, join, p);
    ret_void(&mut func, join);

    expand_retains(&fx.module, &mut func);

    let (from_left, from_right) = (func.block(left).insts[0], func.block(right).insts[0]);
    assert_eq!(fx.render(&func)[1..4], ["tern_retain", "br", "tern_retain"]);
    let joined = func.block(join).insts[0];
    assert_eq!(
        func.op(joined),
        Some(&Op::Phi {
            incoming: vec![(left, from_left), (right, from_right)],
        })
    );
    assert_eq!(func.op(user), Some(&Op::Load { ptr: joined }));
}

/// Both arms carry the entry's retain, so the join needs no phi.
#[test]
fn agreeing_arms_leave_no_phi_behind() {
    let fx = Fixture::new();
    let (mut func, [entry, left, right, join]) = diamond(&fx);
    let p = func.params()[0];
    let branch = func.block(entry).insts[0];
    func.insert_before(
        branch,
        Op::Call {
            callee: Callee::Direct(fx.module.runtime.retain_noresult),
            args: smallvec![p],
            tail: false,
        },
        LlType::Void,
    );
    func.append(left, Op::Br { dest: join }, LlType::Void);
    func.append(right, Op::Br { dest: join }, LlType::Void);
    let user = load(&mut func, join, p);
    ret_void(&mut func, join);

    expand_retains(&fx.module, &mut func);

    let retain = func.block(entry).insts[0];
    assert_eq!(func.op(user), Some(&Op::Load { ptr: retain }));
    assert_eq!(func.block(join).insts.len(), 2);
    assert!(!fx.render(&func).contains(&"phi".to_owned()));
}

/// A retain in the loop body flows back to the header through a phi, and
/// the body's retain in turn starts from that phi.
#[test]
fn retain_in_a_loop_body_reaches_the_header() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr, LlType::Int(1)], LlType::Void);
    let (header, body, exit) = (func.add_block(), func.add_block(), func.add_block());
    let (p, cond) = (func.params()[0], func.params()[1]);
    func.append(entry, Op::Br { dest: header }, LlType::Void);
    let user = load(&mut func, header, p);
    func.append(
        header,
        Op::CondBr {
            cond,
            then_dest: body,
            else_dest: exit,
        },
        LlType::Void,
    );
    fx.retain_noresult(&mut func, body, p);
    func.append(body, Op::Br { dest: header }, LlType::Void);
    ret_void(&mut func, exit);

    expand_retains(&fx.module, &mut func);

    let retain = func.block(body).insts[0];
    let joined = func.block(header).insts[0];
    assert_eq!(
        func.op(joined),
        Some(&Op::Phi {
            incoming: vec![(entry, p), (body, retain)],
        })
    );
    assert_eq!(func.op(user), Some(&Op::Load { ptr: joined }));
    assert_eq!(call_args(&func, retain), vec![joined]);
}

#[test]
fn retains_of_instructions_stay_local_to_the_home_block() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[LlType::Ptr], LlType::Void);
    let next = func.add_block();
    let p = func.params()[0];
    let object = fx.call(&mut func, next, "make", &[p], LlType::Ptr);
    let early = load(&mut func, next, object);
    func.append(entry, Op::Br { dest: next }, LlType::Void);
    fx.retain_noresult(&mut func, next, object);
    let late = load(&mut func, next, object);
    ret_void(&mut func, next);

    expand_retains(&fx.module, &mut func);

    let retain = func.block(next).insts[2];
    assert_eq!(func.op(early), Some(&Op::Load { ptr: object }));
    assert_eq!(func.op(late), Some(&Op::Load { ptr: retain }));
}

#[test]
fn retains_of_constants_are_expanded_but_not_tracked() {
    let fx = Fixture::new();
    let (mut func, entry) = fx.function("f", &[], LlType::Void);
    let global = func.global_ref(fx.name("shared"));
    fx.retain_noresult(&mut func, entry, global);
    let user = load(&mut func, entry, global);
    ret_void(&mut func, entry);

    let (expanded, _) = expand_retains(&fx.module, &mut func);

    assert_eq!(expanded, 1);
    assert_eq!(fx.render(&func), vec!["tern_retain", "load", "ret"]);
    assert_eq!(func.op(user), Some(&Op::Load { ptr: global }));
}
