//! Functions, basic blocks and instructions.
//!
//! # Architecture
//!
//! A [`Function`] owns two arenas: values and blocks. Every instruction is a
//! value (its result), and so is every block argument, so operands are plain
//! [`ValueId`]s regardless of where they were defined. A [`BasicBlock`] lists
//! the instructions it contains in execution order; the instruction records
//! its parent block, so membership is explicit in both directions.
//!
//! Instructions that produce nothing useful (stores, reference counting,
//! terminators) have the empty tuple type.

use std::fmt;

use smallvec::{smallvec, SmallVec};
use tern_ir::{Name, Span};
use tern_types::{DeclId, Idx};

// ── ID newtypes ─────────────────────────────────────────────────────

/// A value within one [`Function`]: an instruction result or a block argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A basic block within one [`Function`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

pub type Operands = SmallVec<[ValueId; 4]>;

// ── Instructions ────────────────────────────────────────────────────

/// Opcode and operands of an instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstKind {
    // Allocation
    /// Storage for a local variable. Result is an l-value.
    AllocVar { decl: DeclId },
    /// Storage for a materialized temporary. Result is an l-value.
    AllocTmp,
    AllocArray { element: Idx, count: ValueId },

    Apply { callee: ValueId, args: Operands },
    /// Reference to a global declaration by value.
    ConstantRef { decl: DeclId },

    // Literals
    ZeroValue,
    IntegerLiteral { value: u64 },
    /// IEEE double, stored as its bit pattern.
    FloatLiteral { bits: u64 },
    CharacterLiteral { value: char },
    StringLiteral { value: Name },
    IntegerValue { value: u64 },

    // Memory
    Load { lvalue: ValueId, is_take: bool },
    Store {
        src: ValueId,
        dest: ValueId,
        is_initialization: bool,
    },
    Copy {
        src: ValueId,
        dest: ValueId,
        is_take_of_src: bool,
        is_initialization_of_dest: bool,
    },

    // Conversions
    Specialize { operand: ValueId },
    TypeConversion { operand: ValueId },

    // Aggregates
    Tuple { elements: Operands },
    TupleElement { operand: ValueId, field: u32 },
    Metatype,
    IndexLValue { operand: ValueId, index: u32 },

    // Reference counting
    Retain { operand: ValueId },
    Release { operand: ValueId },
    Dealloc { operand: ValueId },
    Destroy { operand: ValueId },

    // Terminators
    Unreachable,
    Return { value: ValueId },
    Branch { dest: BlockId, args: Operands },
    CondBranch {
        condition: ValueId,
        true_dest: BlockId,
        false_dest: BlockId,
    },
}

impl InstKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Unreachable
                | InstKind::Return { .. }
                | InstKind::Branch { .. }
                | InstKind::CondBranch { .. }
        )
    }

    /// Whether the result is a meaningful value. Stores, reference counting
    /// and terminators yield `()` and are never operands.
    pub fn has_result(&self) -> bool {
        !self.is_terminator()
            && !matches!(
                self,
                InstKind::Store { .. }
                    | InstKind::Copy { .. }
                    | InstKind::Retain { .. }
                    | InstKind::Release { .. }
                    | InstKind::Dealloc { .. }
                    | InstKind::Destroy { .. }
            )
    }

    /// Textual opcode, as printed.
    pub fn opcode(&self) -> &'static str {
        match self {
            InstKind::AllocVar { .. } => "alloc_var",
            InstKind::AllocTmp => "alloc_tmp",
            InstKind::AllocArray { .. } => "alloc_array",
            InstKind::Apply { .. } => "apply",
            InstKind::ConstantRef { .. } => "constant_ref",
            InstKind::ZeroValue => "zero_value",
            InstKind::IntegerLiteral { .. } => "integer_literal",
            InstKind::FloatLiteral { .. } => "float_literal",
            InstKind::CharacterLiteral { .. } => "character_literal",
            InstKind::StringLiteral { .. } => "string_literal",
            InstKind::IntegerValue { .. } => "integer_value",
            InstKind::Load { .. } => "load",
            InstKind::Store { .. } => "store",
            InstKind::Copy { .. } => "copy",
            InstKind::Specialize { .. } => "specialize",
            InstKind::TypeConversion { .. } => "type_conversion",
            InstKind::Tuple { .. } => "tuple",
            InstKind::TupleElement { .. } => "tuple_element",
            InstKind::Metatype => "metatype",
            InstKind::IndexLValue { .. } => "index_lvalue",
            InstKind::Retain { .. } => "retain",
            InstKind::Release { .. } => "release",
            InstKind::Dealloc { .. } => "dealloc",
            InstKind::Destroy { .. } => "destroy",
            InstKind::Unreachable => "unreachable",
            InstKind::Return { .. } => "return",
            InstKind::Branch { .. } => "br",
            InstKind::CondBranch { .. } => "cond_br",
        }
    }

    /// Every value this instruction reads, in operand order.
    pub fn operands(&self) -> Operands {
        match self {
            InstKind::AllocVar { .. }
            | InstKind::AllocTmp
            | InstKind::ConstantRef { .. }
            | InstKind::ZeroValue
            | InstKind::IntegerLiteral { .. }
            | InstKind::FloatLiteral { .. }
            | InstKind::CharacterLiteral { .. }
            | InstKind::StringLiteral { .. }
            | InstKind::IntegerValue { .. }
            | InstKind::Metatype
            | InstKind::Unreachable => Operands::new(),

            InstKind::AllocArray { count: v, .. }
            | InstKind::Load { lvalue: v, .. }
            | InstKind::Specialize { operand: v }
            | InstKind::TypeConversion { operand: v }
            | InstKind::TupleElement { operand: v, .. }
            | InstKind::IndexLValue { operand: v, .. }
            | InstKind::Retain { operand: v }
            | InstKind::Release { operand: v }
            | InstKind::Dealloc { operand: v }
            | InstKind::Destroy { operand: v }
            | InstKind::Return { value: v }
            | InstKind::CondBranch { condition: v, .. } => smallvec![*v],

            InstKind::Store { src, dest, .. } | InstKind::Copy { src, dest, .. } => {
                smallvec![*src, *dest]
            }

            InstKind::Apply { callee, args } => {
                let mut ops = Operands::with_capacity(args.len() + 1);
                ops.push(*callee);
                ops.extend_from_slice(args);
                ops
            }

            InstKind::Tuple { elements } => elements.clone(),
            InstKind::Branch { args, .. } => args.clone(),
        }
    }

    /// Blocks control may transfer to. Empty for non-terminators.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            InstKind::Branch { dest, .. } => smallvec![*dest],
            InstKind::CondBranch {
                true_dest,
                false_dest,
                ..
            } => smallvec![*true_dest, *false_dest],
            _ => SmallVec::new(),
        }
    }
}

/// An instruction and the block that contains it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstKind,
    pub span: Span,
    pub parent: BlockId,
}

/// How a value is defined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueDef {
    Inst(Instruction),
    BlockArg { block: BlockId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueData {
    pub ty: Idx,
    pub def: ValueDef,
}

// ── Blocks ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicBlock {
    pub args: Vec<ValueId>,
    /// Instructions in execution order. The last one must be a terminator.
    pub insts: Vec<ValueId>,
}

// ── Functions ───────────────────────────────────────────────────────

/// A function body. `blocks[0]` is the entry; its arguments are the
/// function's parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: Name,
    /// The function's own type.
    pub ty: Idx,
    values: Vec<ValueData>,
    blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn new(name: Name, ty: Idx) -> Self {
        Function {
            name,
            ty,
            values: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn entry(&self) -> Option<BlockId> {
        (!self.blocks.is_empty()).then(|| BlockId::new(0))
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn has_block(&self, id: BlockId) -> bool {
        id.index() < self.blocks.len()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (BlockId::new(index_u32(i)), block))
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub fn has_value(&self, id: ValueId) -> bool {
        id.index() < self.values.len()
    }

    pub fn value_type(&self, id: ValueId) -> Idx {
        self.values[id.index()].ty
    }

    /// The instruction defining `id`, or `None` for a block argument.
    pub fn inst(&self, id: ValueId) -> Option<&Instruction> {
        match &self.values[id.index()].def {
            ValueDef::Inst(inst) => Some(inst),
            ValueDef::BlockArg { .. } => None,
        }
    }

    /// The terminator of `block`, if its last instruction is one.
    pub fn terminator(&self, block: BlockId) -> Option<&InstKind> {
        let last = *self.block(block).insts.last()?;
        self.inst(last)
            .map(|inst| &inst.kind)
            .filter(|kind| kind.is_terminator())
    }

    /// Predecessors of every block, deduplicated, indexed by block.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds: Vec<Vec<BlockId>> = vec![Vec::new(); self.blocks.len()];
        for (id, _) in self.blocks() {
            let Some(term) = self.terminator(id) else {
                continue;
            };
            for succ in term.successors() {
                if let Some(list) = preds.get_mut(succ.index()) {
                    if !list.contains(&id) {
                        list.push(id);
                    }
                }
            }
        }
        preds
    }

    // ── Raw mutation ────────────────────────────────────────────────
    //
    // No checks: the builder enforces well-formedness and the verifier
    // reports anything built around it.

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId::new(index_u32(self.blocks.len()));
        self.blocks.push(BasicBlock::default());
        id
    }

    pub fn add_block_arg(&mut self, block: BlockId, ty: Idx) -> ValueId {
        let id = self.push_value(ValueData {
            ty,
            def: ValueDef::BlockArg { block },
        });
        self.blocks[block.index()].args.push(id);
        id
    }

    /// Append an instruction to the end of `block`.
    pub fn append(&mut self, block: BlockId, kind: InstKind, ty: Idx, span: Span) -> ValueId {
        let id = self.push_value(ValueData {
            ty,
            def: ValueDef::Inst(Instruction {
                kind,
                span,
                parent: block,
            }),
        });
        self.blocks[block.index()].insts.push(id);
        id
    }

    fn push_value(&mut self, data: ValueData) -> ValueId {
        let id = ValueId::new(index_u32(self.values.len()));
        self.values.push(data);
        id
    }
}

fn index_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or_else(|_| panic!("IR arena exceeds u32::MAX entries"))
}

#[cfg(test)]
mod tests;
