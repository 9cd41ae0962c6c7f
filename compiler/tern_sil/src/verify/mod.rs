//! IR verifier.
//!
//! Checks the structural and type invariants every later phase relies on.
//! A violation is a compiler bug, never a user error: callers either collect
//! the [`VerifyError`]s for inspection or use [`verify_function_or_panic`].
//! Verification reads the function and the type pool and changes nothing.

use std::fmt::Write as _;

use tern_types::{Idx, Pool, TypeData};

use crate::{BlockId, Function, InstKind, ValueId};

/// One invariant violation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("{block} is empty")]
    EmptyBlock { block: BlockId },

    #[error("{inst} in {block}: terminator must be the last instruction")]
    TerminatorNotLast { inst: ValueId, block: BlockId },

    #[error("{inst} in {block}: non-terminator cannot be the last instruction")]
    MissingTerminator { inst: ValueId, block: BlockId },

    #[error("{inst}: listed in {listed} but its parent is {parent}")]
    WrongParent {
        inst: ValueId,
        listed: BlockId,
        parent: BlockId,
    },

    #[error("{inst}: operand {operand} is not a value of this function")]
    UndefinedOperand { inst: ValueId, operand: ValueId },

    #[error("{inst}: branch to nonexistent block {target}")]
    UnknownBlock { inst: ValueId, target: BlockId },

    #[error("{inst} (`{opcode}`): {reason}")]
    Invalid {
        inst: ValueId,
        opcode: &'static str,
        reason: &'static str,
    },
}

/// Collect every invariant violation in `func`.
pub fn verify_function(pool: &Pool, func: &Function) -> Vec<VerifyError> {
    let mut verifier = Verifier {
        pool,
        func,
        errors: Vec::new(),
    };
    for (id, _) in func.blocks() {
        verifier.check_block(id);
    }
    verifier.errors
}

/// Verify `func`, panicking with every violation on failure.
///
/// # Panics
///
/// Panics if `func` violates any IR invariant.
pub fn verify_function_or_panic(pool: &Pool, func: &Function) {
    let errors = verify_function(pool, func);
    if errors.is_empty() {
        return;
    }
    let mut message = format!(
        "IR verification failed for function #{} ({} violations):",
        func.name.raw(),
        errors.len()
    );
    for error in &errors {
        let _ = write!(message, "\n  {error}");
    }
    panic!("{message}");
}

struct Verifier<'a> {
    pool: &'a Pool,
    func: &'a Function,
    errors: Vec<VerifyError>,
}

impl Verifier<'_> {
    fn check_block(&mut self, block: BlockId) {
        let func = self.func;
        let insts = &func.block(block).insts;
        let Some(&last) = insts.last() else {
            self.errors.push(VerifyError::EmptyBlock { block });
            return;
        };
        for &inst in insts {
            let Some(data) = func.inst(inst) else {
                // A block argument listed as an instruction.
                self.invalid(inst, "block_arg", "block arguments are not instructions");
                continue;
            };
            if data.parent != block {
                self.errors.push(VerifyError::WrongParent {
                    inst,
                    listed: block,
                    parent: data.parent,
                });
            }
            let is_last = inst == last;
            if data.kind.is_terminator() && !is_last {
                self.errors
                    .push(VerifyError::TerminatorNotLast { inst, block });
            } else if !data.kind.is_terminator() && is_last {
                self.errors
                    .push(VerifyError::MissingTerminator { inst, block });
            }
            self.check_inst(inst, &data.kind);
        }
    }

    fn check_inst(&mut self, inst: ValueId, kind: &InstKind) {
        let mut operands_ok = true;
        for operand in kind.operands() {
            if !self.func.has_value(operand) {
                self.errors
                    .push(VerifyError::UndefinedOperand { inst, operand });
                operands_ok = false;
            }
        }
        for target in kind.successors() {
            if !self.func.has_block(target) {
                self.errors.push(VerifyError::UnknownBlock { inst, target });
                operands_ok = false;
            }
        }
        // Type rules need every operand to exist.
        if operands_ok {
            self.check_types(inst, kind);
        }
    }

    fn check_types(&mut self, inst: ValueId, kind: &InstKind) {
        let pool = self.pool;
        let func = self.func;
        let result = func.value_type(inst);
        let ty = |v: ValueId| func.value_type(v);
        let opcode = kind.opcode();
        let mut check = |cond: bool, reason: &'static str| {
            if !cond {
                self.errors.push(VerifyError::Invalid {
                    inst,
                    opcode,
                    reason,
                });
            }
        };

        match kind {
            InstKind::AllocVar { .. } | InstKind::AllocTmp => {
                check(pool.is_lvalue(result), "allocation should return an lvalue");
            }
            InstKind::Apply { callee, args } => {
                let Some((input, fn_result)) = function_type(pool, ty(*callee)) else {
                    check(false, "callee should have function type");
                    return;
                };
                check(pool.is_equal(result, fn_result), "result type mismatch");
                // A single argument may present the whole input at once;
                // otherwise the input is a decomposed tuple.
                let whole = args.len() == 1 && pool.is_equal(ty(args[0]), input);
                if !whole {
                    match tuple_fields(pool, input) {
                        Some(fields) if fields.len() == args.len() => {
                            let all_match = fields
                                .iter()
                                .zip(args.iter())
                                .all(|(&field, &arg)| pool.is_equal(field, ty(arg)));
                            check(all_match, "argument type mismatch");
                        }
                        Some(_) => check(false, "unexpected argument count for function"),
                        None => check(false, "argument type mismatch"),
                    }
                }
            }
            InstKind::ConstantRef { .. } => {
                check(!pool.is_lvalue(result), "constant_ref should not produce an lvalue");
            }
            InstKind::IntegerLiteral { .. } | InstKind::IntegerValue { .. } => {
                check(pool.is_builtin_integer(result), "result should be a builtin integer");
            }
            InstKind::Load { lvalue, .. } => {
                check(!pool.is_lvalue(result), "load should produce an rvalue");
                check(pool.is_lvalue(ty(*lvalue)), "load operand should be an lvalue");
                check(
                    pool.is_equal(pool.rvalue(ty(*lvalue)), result),
                    "load operand type and result type mismatch",
                );
            }
            InstKind::Store { src, dest, .. } => {
                check(!pool.is_lvalue(ty(*src)), "store source should be an rvalue");
                check(pool.is_lvalue(ty(*dest)), "store destination should be an lvalue");
                check(
                    pool.is_equal(pool.rvalue(ty(*dest)), ty(*src)),
                    "store operand type and destination type mismatch",
                );
            }
            InstKind::Copy { src, dest, .. } => {
                check(pool.is_lvalue(ty(*src)), "copy source should be an lvalue");
                check(pool.is_lvalue(ty(*dest)), "copy destination should be an lvalue");
                check(
                    pool.is_equal(pool.rvalue(ty(*dest)), pool.rvalue(ty(*src))),
                    "copy operand type and destination type mismatch",
                );
            }
            InstKind::Specialize { operand } => {
                let polymorphic = matches!(
                    pool.data(pool.desugar(ty(*operand))),
                    TypeData::PolymorphicFunction { .. }
                );
                let monomorphic =
                    matches!(pool.data(pool.desugar(result)), TypeData::Function { .. });
                check(
                    polymorphic && monomorphic,
                    "specialize only works on function types",
                );
            }
            InstKind::Tuple { elements } => match tuple_fields(pool, result) {
                Some(fields) => check(fields.len() == elements.len(), "tuple field count mismatch"),
                None => check(false, "tuple should return a tuple"),
            },
            InstKind::Retain { operand } | InstKind::Release { operand } => {
                check(!pool.is_lvalue(ty(*operand)), "operand must not be an lvalue");
            }
            InstKind::Dealloc { operand } | InstKind::Destroy { operand } => {
                check(pool.is_lvalue(ty(*operand)), "operand must be an lvalue");
            }
            InstKind::IndexLValue { operand, .. } => {
                check(
                    pool.is_lvalue(result) && pool.is_equal(result, ty(*operand)),
                    "index_lvalue should return its operand's lvalue type",
                );
            }
            InstKind::Branch { dest, args } => {
                let params = &func.block(*dest).args;
                let arity_ok = params.len() == args.len();
                let types_ok = params
                    .iter()
                    .zip(args.iter())
                    .all(|(&param, &arg)| pool.is_equal(ty(param), ty(arg)));
                check(arity_ok && types_ok, "branch arguments do not match block arguments");
            }
            InstKind::AllocArray { .. }
            | InstKind::ZeroValue
            | InstKind::FloatLiteral { .. }
            | InstKind::CharacterLiteral { .. }
            | InstKind::StringLiteral { .. }
            | InstKind::TypeConversion { .. }
            | InstKind::TupleElement { .. }
            | InstKind::Metatype
            | InstKind::Unreachable
            // Operand existence is all a return or conditional branch needs.
            | InstKind::Return { .. }
            | InstKind::CondBranch { .. } => {}
        }
    }

    fn invalid(&mut self, inst: ValueId, opcode: &'static str, reason: &'static str) {
        self.errors.push(VerifyError::Invalid {
            inst,
            opcode,
            reason,
        });
    }
}

fn function_type(pool: &Pool, ty: Idx) -> Option<(Idx, Idx)> {
    match pool.data(pool.desugar(ty)) {
        TypeData::Function { input, result } => Some((*input, *result)),
        _ => None,
    }
}

fn tuple_fields(pool: &Pool, ty: Idx) -> Option<Vec<Idx>> {
    match pool.data(pool.desugar(ty)) {
        TypeData::Tuple(elts) => Some(elts.iter().map(|e| e.ty).collect()),
        _ => None,
    }
}
