use pretty_assertions::assert_eq;
use tern_arc::{Callee, LlType, Op, RuntimeSymbols, RELEASE, RETAIN_NORESULT};
use tern_diagnostic::ErrorCode;
use tern_types::{GenericParamSpec, NominalKind};

use super::*;

const USE_SITE: Span = Span::new(100, 110);

fn sp(n: u32) -> Span {
    Span::new(n * 10, n * 10 + 5)
}

fn lenient() -> CompilerOptions {
    CompilerOptions {
        fatal_verify: false,
        ..CompilerOptions::default()
    }
}

/// `protocol Counter { func count() -> Int64 }` and two structs, `Good`
/// with a `count` witness and `Bad` without one.
struct Counters {
    proto: DeclId,
    requirement: DeclId,
    good: Idx,
    witness: DeclId,
    bad: Idx,
}

fn counters(session: &mut Session) -> Counters {
    let ctx = session.ctx_mut();
    let proto = ctx.declare_protocol("Counter", &[], sp(1));
    let requirement = ctx.add_func(Some(proto), "count", Idx::UNIT, Idx::INT64, false, sp(2));
    let good_decl = ctx.declare_nominal(NominalKind::Struct, "Good", None, &[], sp(3));
    let witness = ctx.add_func(Some(good_decl), "count", Idx::UNIT, Idx::INT64, false, sp(4));
    let bad_decl = ctx.declare_nominal(NominalKind::Struct, "Bad", None, &[], sp(5));
    let (Some(good), Some(bad)) = (ctx.declared_type(good_decl), ctx.declared_type(bad_decl)) else {
        panic!("structs declare types");
    };
    Counters {
        proto,
        requirement,
        good,
        witness,
        bad,
    }
}

fn call(
    session: &Session,
    func: &mut tern_arc::Function,
    block: tern_arc::BlockId,
    callee: &str,
    arg: tern_arc::ValueId,
) {
    let op = Op::Call {
        callee: Callee::Direct(session.ctx().name(callee)),
        args: std::iter::once(arg).collect(),
        tail: false,
    };
    func.append(block, op, LlType::Void);
}

// === Conformance ===

#[test]
fn successful_query_exposes_its_witnesses() {
    let mut session = Session::new(AstContext::default(), lenient());
    let c = counters(&mut session);

    let result = session.conforms_to(c.good, c.proto, Some(USE_SITE));
    let Some(ConformsTo::Witnessed(id)) = result else {
        panic!("expected a witnessed conformance, got {result:?}");
    };

    assert_eq!(session.conformance(id).witness(c.requirement), Some(c.witness));
    assert!(!session.has_errors());
    assert_eq!(session.finish().map(|diags| diags.len()).ok(), Some(0));
}

#[test]
fn failed_query_is_diagnosed_once_and_fails_the_session() {
    let mut session = Session::new(AstContext::default(), lenient());
    let c = counters(&mut session);

    assert_eq!(session.conforms_to(c.bad, c.proto, Some(USE_SITE)), None);
    let reported = session.error_count();
    assert!(reported > 0);

    // The cached failure is not diagnosed again.
    assert_eq!(session.conforms_to(c.bad, c.proto, Some(USE_SITE)), None);
    assert_eq!(session.error_count(), reported);

    match session.finish() {
        Err(SessionError::Diagnostics { count }) => assert_eq!(count, reported),
        other => panic!("expected a diagnostics error, got {other:?}"),
    }
}

#[test]
fn speculative_query_reports_nothing() {
    let mut session = Session::new(AstContext::default(), lenient());
    let c = counters(&mut session);

    assert_eq!(session.conforms_to(c.bad, c.proto, None), None);
    assert!(!session.has_errors());
    assert!(session.take_diagnostics().is_empty());
}

#[test]
fn substitutions_yield_conformances_per_archetype() {
    let mut session = Session::new(AstContext::default(), lenient());
    let c = counters(&mut session);
    let ctx = session.ctx_mut();
    let Some(proto_ty) = ctx.declared_type(c.proto) else {
        panic!("protocols declare types");
    };
    let list = ctx.add_generic_params(
        &[GenericParamSpec {
            name: "T",
            conforms_to: &[proto_ty],
        }],
        None,
        sp(6),
    );
    let t = ctx.generic_param_list(list).params[0].archetype;

    let mut subs = SubstitutionMap::default();
    subs.insert(t, c.good);
    let Ok(conformances) = session.check_substitutions(&subs, Some(USE_SITE)) else {
        panic!("Good conforms to Counter");
    };
    assert_eq!(conformances[&t].len(), 1);

    subs.insert(t, c.bad);
    assert_eq!(
        session.check_substitutions(&subs, Some(USE_SITE)),
        Err(SubstitutionFailure::DoesNotConform {
            archetype: t,
            protocol: c.proto,
        })
    );
    let codes: Vec<ErrorCode> = session.take_diagnostics().iter().map(|d| d.code).collect();
    assert!(codes.contains(&ErrorCode::E2001));
}

// === Verification ===

/// `broken : Int64 -> Int64` with a single empty block.
fn broken_function(session: &mut Session) -> tern_sil::Function {
    let ctx = session.ctx_mut();
    let ty = ctx.pool_mut().function(Idx::INT64, Idx::INT64);
    let mut func = tern_sil::Function::new(ctx.name("broken"), ty);
    let mut b = tern_sil::Builder::new(ctx.pool_mut(), &mut func);
    b.create_block();
    func
}

#[test]
fn verification_errors_name_the_function() {
    let mut session = Session::new(AstContext::default(), lenient());
    let func = broken_function(&mut session);

    match session.verify(&func) {
        Err(SessionError::Verify { function, errors }) => {
            assert_eq!(function, "broken");
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected a verification error, got {other:?}"),
    }
}

#[test]
fn verification_can_be_switched_off() {
    let options = CompilerOptions {
        verify_sil: false,
        fatal_verify: true,
        ..CompilerOptions::default()
    };
    let mut session = Session::new(AstContext::default(), options);
    let func = broken_function(&mut session);

    assert!(session.verify(&func).is_ok());
}

#[test]
#[should_panic(expected = "IR verification failed")]
fn fatal_verification_panics() {
    let options = CompilerOptions {
        fatal_verify: true,
        ..CompilerOptions::default()
    };
    let mut session = Session::new(AstContext::default(), options);
    let func = broken_function(&mut session);
    let _ = session.verify(&func);
}

// === ARC ===

/// `retain_noresult(p); release(p); ret`
fn redundant_pair(session: &Session) -> Module {
    let mut module = Module::new(RuntimeSymbols::new(session.ctx().interner()));
    let mut func = tern_arc::Function::new(session.ctx().name("f"), &[LlType::Ptr], LlType::Void);
    let entry = func.add_block();
    let p = func.params()[0];
    call(session, &mut func, entry, RETAIN_NORESULT, p);
    call(session, &mut func, entry, RELEASE, p);
    func.append(entry, Op::Ret { value: None }, LlType::Void);
    module.add_function(func);
    module
}

#[test]
fn arc_pipeline_removes_redundant_pairs() {
    let session = Session::new(AstContext::default(), lenient());
    let mut module = redundant_pair(&session);

    let stats = session.run_arc(&mut module);

    assert_eq!(stats.retain_release_pairs, 1);
    assert_eq!(module.functions()[0].insts().count(), 1);
}

#[test]
fn disabled_optimization_still_expands() {
    let options = CompilerOptions {
        arc_optimize: false,
        ..lenient()
    };
    let session = Session::new(AstContext::default(), options);
    let mut module = redundant_pair(&session);

    let stats = session.run_arc(&mut module);

    assert_eq!(stats.retain_release_pairs, 0);
    assert_eq!(stats.retains_expanded, 1);
    assert_eq!(module.functions()[0].insts().count(), 3);
}
