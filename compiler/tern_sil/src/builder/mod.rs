//! Instruction construction API.
//!
//! [`Builder`] appends instructions at the end of its current block and
//! computes result types from operand types where the instruction implies
//! one. Emitting a terminator clears the insertion point, so a block can
//! never receive an instruction after its terminator; [`Builder::finish`]
//! rejects any block left without one.

use tern_ir::{Name, Span};
use tern_types::{DeclId, Idx, Pool, TypeData};

use crate::{BlockId, Function, InstKind, Operands, ValueId};

/// A block left without a terminator when construction finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{block} has no terminator")]
pub struct BuildError {
    pub block: BlockId,
}

pub struct Builder<'a> {
    pool: &'a mut Pool,
    func: &'a mut Function,
    insertion: Option<BlockId>,
    span: Span,
}

impl<'a> Builder<'a> {
    pub fn new(pool: &'a mut Pool, func: &'a mut Function) -> Self {
        Builder {
            pool,
            func,
            insertion: None,
            span: Span::DUMMY,
        }
    }

    pub fn create_block(&mut self) -> BlockId {
        self.func.add_block()
    }

    pub fn add_block_arg(&mut self, block: BlockId, ty: Idx) -> ValueId {
        self.func.add_block_arg(block, ty)
    }

    /// Continue appending at the end of `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block` already ends in a terminator.
    pub fn position_at_end(&mut self, block: BlockId) {
        assert!(
            self.func.terminator(block).is_none(),
            "{block} is already terminated"
        );
        self.insertion = Some(block);
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.insertion
    }

    /// Source location attached to subsequently emitted instructions.
    pub fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub fn value_type(&self, value: ValueId) -> Idx {
        self.func.value_type(value)
    }

    fn emit(&mut self, kind: InstKind, ty: Idx) -> ValueId {
        let Some(block) = self.insertion else {
            panic!("no insertion point for `{}`", kind.opcode());
        };
        if kind.is_terminator() {
            self.insertion = None;
        }
        self.func.append(block, kind, ty, self.span)
    }

    // ── Allocation ──────────────────────────────────────────────────

    pub fn alloc_var(&mut self, decl: DeclId, object: Idx) -> ValueId {
        let ty = self.pool.lvalue(object);
        self.emit(InstKind::AllocVar { decl }, ty)
    }

    pub fn alloc_tmp(&mut self, object: Idx) -> ValueId {
        let ty = self.pool.lvalue(object);
        self.emit(InstKind::AllocTmp, ty)
    }

    /// Heap array of `count` elements: the owning object plus the address
    /// of the first element.
    pub fn alloc_array(&mut self, element: Idx, count: ValueId) -> ValueId {
        let base = self.pool.lvalue(element);
        let ty = self.pool.tuple_of(&[Idx::OBJECT_POINTER, base]);
        self.emit(InstKind::AllocArray { element, count }, ty)
    }

    // ── Calls and references ────────────────────────────────────────

    /// Call `callee`. The result type is the callee's result type, or the
    /// error type when the callee is not a function.
    pub fn apply(&mut self, callee: ValueId, args: &[ValueId]) -> ValueId {
        let ty = self
            .pool
            .as_function(self.func.value_type(callee))
            .map_or(Idx::ERROR, |(_, result)| result);
        let kind = InstKind::Apply {
            callee,
            args: Operands::from_slice(args),
        };
        self.emit(kind, ty)
    }

    pub fn constant_ref(&mut self, decl: DeclId, ty: Idx) -> ValueId {
        self.emit(InstKind::ConstantRef { decl }, ty)
    }

    // ── Literals ────────────────────────────────────────────────────

    pub fn zero_value(&mut self, ty: Idx) -> ValueId {
        self.emit(InstKind::ZeroValue, ty)
    }

    pub fn integer_literal(&mut self, value: u64, ty: Idx) -> ValueId {
        self.emit(InstKind::IntegerLiteral { value }, ty)
    }

    pub fn float_literal(&mut self, value: f64, ty: Idx) -> ValueId {
        let bits = value.to_bits();
        self.emit(InstKind::FloatLiteral { bits }, ty)
    }

    pub fn character_literal(&mut self, value: char, ty: Idx) -> ValueId {
        self.emit(InstKind::CharacterLiteral { value }, ty)
    }

    pub fn string_literal(&mut self, value: Name, ty: Idx) -> ValueId {
        self.emit(InstKind::StringLiteral { value }, ty)
    }

    pub fn integer_value(&mut self, value: u64, ty: Idx) -> ValueId {
        self.emit(InstKind::IntegerValue { value }, ty)
    }

    // ── Memory ──────────────────────────────────────────────────────

    pub fn load(&mut self, lvalue: ValueId, is_take: bool) -> ValueId {
        let ty = self.pool.rvalue(self.func.value_type(lvalue));
        self.emit(InstKind::Load { lvalue, is_take }, ty)
    }

    pub fn store(&mut self, src: ValueId, dest: ValueId, is_initialization: bool) -> ValueId {
        let kind = InstKind::Store {
            src,
            dest,
            is_initialization,
        };
        self.emit(kind, Idx::UNIT)
    }

    pub fn copy(
        &mut self,
        src: ValueId,
        dest: ValueId,
        is_take_of_src: bool,
        is_initialization_of_dest: bool,
    ) -> ValueId {
        let kind = InstKind::Copy {
            src,
            dest,
            is_take_of_src,
            is_initialization_of_dest,
        };
        self.emit(kind, Idx::UNIT)
    }

    // ── Conversions ─────────────────────────────────────────────────

    pub fn specialize(&mut self, operand: ValueId, ty: Idx) -> ValueId {
        self.emit(InstKind::Specialize { operand }, ty)
    }

    pub fn type_conversion(&mut self, operand: ValueId, ty: Idx) -> ValueId {
        self.emit(InstKind::TypeConversion { operand }, ty)
    }

    // ── Aggregates ──────────────────────────────────────────────────

    /// Unlabeled tuple of `elements`.
    pub fn tuple(&mut self, elements: &[ValueId]) -> ValueId {
        let tys: Vec<Idx> = elements.iter().map(|&e| self.func.value_type(e)).collect();
        let ty = self.pool.tuple_of(&tys);
        self.emit(
            InstKind::Tuple {
                elements: Operands::from_slice(elements),
            },
            ty,
        )
    }

    /// Field `field` of a tuple value; the error type if there is none.
    pub fn tuple_element(&mut self, operand: ValueId, field: u32) -> ValueId {
        let tuple = self.pool.desugar(self.func.value_type(operand));
        let ty = match self.pool.data(tuple) {
            TypeData::Tuple(elts) => elts.get(field as usize).map_or(Idx::ERROR, |e| e.ty),
            _ => Idx::ERROR,
        };
        self.emit(InstKind::TupleElement { operand, field }, ty)
    }

    pub fn metatype(&mut self, instance: Idx) -> ValueId {
        let ty = self.pool.metatype(instance);
        self.emit(InstKind::Metatype, ty)
    }

    pub fn index_lvalue(&mut self, operand: ValueId, index: u32) -> ValueId {
        let ty = self.func.value_type(operand);
        self.emit(InstKind::IndexLValue { operand, index }, ty)
    }

    // ── Reference counting ──────────────────────────────────────────

    pub fn retain(&mut self, operand: ValueId) -> ValueId {
        self.emit(InstKind::Retain { operand }, Idx::UNIT)
    }

    pub fn release(&mut self, operand: ValueId) -> ValueId {
        self.emit(InstKind::Release { operand }, Idx::UNIT)
    }

    pub fn dealloc(&mut self, operand: ValueId) -> ValueId {
        self.emit(InstKind::Dealloc { operand }, Idx::UNIT)
    }

    pub fn destroy(&mut self, operand: ValueId) -> ValueId {
        self.emit(InstKind::Destroy { operand }, Idx::UNIT)
    }

    // ── Terminators ─────────────────────────────────────────────────

    pub fn unreachable(&mut self) -> ValueId {
        self.emit(InstKind::Unreachable, Idx::UNIT)
    }

    pub fn ret(&mut self, value: ValueId) -> ValueId {
        self.emit(InstKind::Return { value }, Idx::UNIT)
    }

    pub fn br(&mut self, dest: BlockId, args: &[ValueId]) -> ValueId {
        let kind = InstKind::Branch {
            dest,
            args: Operands::from_slice(args),
        };
        self.emit(kind, Idx::UNIT)
    }

    pub fn cond_br(&mut self, condition: ValueId, true_dest: BlockId, false_dest: BlockId) -> ValueId {
        let kind = InstKind::CondBranch {
            condition,
            true_dest,
            false_dest,
        };
        self.emit(kind, Idx::UNIT)
    }

    /// Check that every block ended in a terminator.
    pub fn finish(self) -> Result<(), BuildError> {
        let unterminated = self
            .func
            .blocks()
            .map(|(id, _)| id)
            .find(|&id| self.func.terminator(id).is_none());
        match unterminated {
            Some(block) => Err(BuildError { block }),
            None => {
                tracing::trace!(
                    blocks = self.func.num_blocks(),
                    values = self.func.num_values(),
                    "built function"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests;
