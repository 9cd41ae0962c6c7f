//! Low-level IR for reference-counting optimization.
//!
//! An SSA form close to what a backend consumes: untyped pointers, machine
//! integers, first-class aggregates and calls to runtime entry points by
//! symbol name.
//!
//! # Storage
//!
//! - **[`Function`]** owns one arena of values. Parameters, constants and
//!   instructions all get a [`ValueId`] from it.
//! - **[`Block`]** is an ordered list of instruction ids. The last entry is
//!   the terminator.
//! - **[`Module`]** holds every function and global by symbol name, plus
//!   the [`RuntimeSymbols`] used to recognize runtime calls.
//!
//! Erasing an instruction unlinks it from its block and clears its
//! `parent`; the arena slot stays, so ids held by a pass never dangle.
//! Moving an instruction relinks it without changing its id.

use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use tern_ir::Name;

use crate::classify::RuntimeSymbols;

// ── ID newtypes ─────────────────────────────────────────────────────

/// Value within one [`Function`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
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

/// Basic block within one [`Function`]. Block 0 is the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
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

pub type Operands = SmallVec<[ValueId; 4]>;

// ── Types and attributes ────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum LlType {
    #[default]
    Void,
    Int(u16),
    /// Any pointer, heap objects included.
    Ptr,
    Struct(Box<[LlType]>),
}

impl LlType {
    pub const I64: LlType = LlType::Int(64);

    /// `{i64, i64, i64}`, the result of `retain_and_return_three`.
    pub fn three_words() -> Self {
        LlType::Struct(vec![Self::I64, Self::I64, Self::I64].into_boxed_slice())
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, LlType::Ptr)
    }

    /// Field types of a struct; empty for everything else.
    pub fn fields(&self) -> &[LlType] {
        match self {
            LlType::Struct(fields) => fields,
            _ => &[],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Linkage {
    /// Visible only inside the module; the body seen here is the body run.
    Internal,
    #[default]
    External,
    /// May be replaced at link time, so the body seen here proves nothing.
    Weak,
}

/// What a function may do to memory visible to its caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryEffects {
    #[default]
    ReadWrite,
    ReadOnly,
    None,
}

// ── Instructions ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum CastKind {
    BitCast,
    PtrToInt,
    IntToPtr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum MemKind {
    Set,
    Copy,
    Move,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Eq,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Callee {
    /// A call to a symbol of the module or of the runtime.
    Direct(Name),
    Indirect(ValueId),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    Call {
        callee: Callee,
        args: Operands,
        tail: bool,
    },
    Load {
        ptr: ValueId,
    },
    /// Operand 0 is the stored value, operand 1 the address.
    Store {
        value: ValueId,
        ptr: ValueId,
    },
    /// `memset`/`memcpy`/`memmove`. Operand 0 is the destination; for
    /// `Set` the source is the fill byte.
    MemIntrinsic {
        kind: MemKind,
        dest: ValueId,
        src: ValueId,
        len: ValueId,
    },
    Cast {
        kind: CastKind,
        operand: ValueId,
    },
    /// Pointer arithmetic: `base + offset` bytes.
    Gep {
        base: ValueId,
        offset: ValueId,
        inbounds: bool,
    },
    Binary {
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    ExtractValue {
        aggregate: ValueId,
        index: u32,
    },
    InsertValue {
        aggregate: ValueId,
        value: ValueId,
        index: u32,
    },
    Phi {
        incoming: Vec<(BlockId, ValueId)>,
    },
    Ret {
        value: Option<ValueId>,
    },
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: ValueId,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Unreachable,
}

impl Op {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Ret { .. } | Op::Br { .. } | Op::CondBr { .. } | Op::Unreachable
        )
    }

    pub fn opcode(&self) -> &'static str {
        match self {
            Op::Call { .. } => "call",
            Op::Load { .. } => "load",
            Op::Store { .. } => "store",
            Op::MemIntrinsic {
                kind: MemKind::Set, ..
            } => "memset",
            Op::MemIntrinsic {
                kind: MemKind::Copy,
                ..
            } => "memcpy",
            Op::MemIntrinsic {
                kind: MemKind::Move,
                ..
            } => "memmove",
            Op::Cast {
                kind: CastKind::BitCast,
                ..
            } => "bitcast",
            Op::Cast {
                kind: CastKind::PtrToInt,
                ..
            } => "ptrtoint",
            Op::Cast {
                kind: CastKind::IntToPtr,
                ..
            } => "inttoptr",
            Op::Gep { .. } => "gep",
            Op::Binary { .. } => "binary",
            Op::ExtractValue { .. } => "extractvalue",
            Op::InsertValue { .. } => "insertvalue",
            Op::Phi { .. } => "phi",
            Op::Ret { .. } => "ret",
            Op::Br { .. } => "br",
            Op::CondBr { .. } => "cond_br",
            Op::Unreachable => "unreachable",
        }
    }

    /// Value operands in a fixed order. Call arguments precede an indirect
    /// callee.
    pub fn operands(&self) -> Operands {
        match self {
            Op::Call { callee, args, .. } => {
                let mut ops = args.clone();
                if let Callee::Indirect(target) = callee {
                    ops.push(*target);
                }
                ops
            }
            Op::Load { ptr } => smallvec![*ptr],
            Op::Store { value, ptr } => smallvec![*value, *ptr],
            Op::MemIntrinsic { dest, src, len, .. } => smallvec![*dest, *src, *len],
            Op::Cast { operand, .. } => smallvec![*operand],
            Op::Gep { base, offset, .. } => smallvec![*base, *offset],
            Op::Binary { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Op::ExtractValue { aggregate, .. } => smallvec![*aggregate],
            Op::InsertValue {
                aggregate, value, ..
            } => smallvec![*aggregate, *value],
            Op::Phi { incoming } => incoming.iter().map(|&(_, v)| v).collect(),
            Op::Ret { value } => value.iter().copied().collect(),
            Op::CondBr { cond, .. } => smallvec![*cond],
            Op::Br { .. } | Op::Unreachable => SmallVec::new(),
        }
    }

    /// Mutable operand slots, in the order of [`operands`](Self::operands).
    pub fn operands_mut(&mut self) -> SmallVec<[&mut ValueId; 4]> {
        match self {
            Op::Call { callee, args, .. } => {
                let mut ops: SmallVec<[&mut ValueId; 4]> = args.iter_mut().collect();
                if let Callee::Indirect(target) = callee {
                    ops.push(target);
                }
                ops
            }
            Op::Load { ptr } => smallvec![ptr],
            Op::Store { value, ptr } => smallvec![value, ptr],
            Op::MemIntrinsic { dest, src, len, .. } => smallvec![dest, src, len],
            Op::Cast { operand, .. } => smallvec![operand],
            Op::Gep { base, offset, .. } => smallvec![base, offset],
            Op::Binary { lhs, rhs, .. } => smallvec![lhs, rhs],
            Op::ExtractValue { aggregate, .. } => smallvec![aggregate],
            Op::InsertValue {
                aggregate, value, ..
            } => smallvec![aggregate, value],
            Op::Phi { incoming } => incoming.iter_mut().map(|(_, v)| v).collect(),
            Op::Ret { value } => value.iter_mut().collect(),
            Op::CondBr { cond, .. } => smallvec![cond],
            Op::Br { .. } | Op::Unreachable => SmallVec::new(),
        }
    }

    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            Op::Br { dest } => smallvec![*dest],
            Op::CondBr {
                then_dest,
                else_dest,
                ..
            } => smallvec![*then_dest, *else_dest],
            _ => SmallVec::new(),
        }
    }

    /// Pure value computations with no memory access and no effects.
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Op::Cast { .. }
                | Op::Gep { .. }
                | Op::Binary { .. }
                | Op::ExtractValue { .. }
                | Op::InsertValue { .. }
                | Op::Phi { .. }
        )
    }
}

// ── Values ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Inst {
    pub op: Op,
    /// `None` once erased.
    pub parent: Option<BlockId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    Param { index: u32 },
    Null,
    Undef,
    ConstInt(u64),
    /// Address of a module global.
    Global(Name),
    /// Address of a function.
    Function(Name),
    Inst(Inst),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueData {
    pub ty: LlType,
    pub kind: ValueKind,
}

/// A use of a value: operand `operand` of instruction `user`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Use {
    pub user: ValueId,
    pub operand: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub insts: Vec<ValueId>,
}

// ── Functions ───────────────────────────────────────────────────────

/// A function definition, or a declaration when it has no blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    pub name: Name,
    pub ret_ty: LlType,
    pub linkage: Linkage,
    pub memory: MemoryEffects,
    /// Per parameter: the callee never lets the pointer outlive the call.
    pub nocapture: Vec<bool>,
    params: Vec<ValueId>,
    values: Vec<ValueData>,
    blocks: Vec<Block>,
}

impl Function {
    pub fn new(name: Name, params: &[LlType], ret_ty: LlType) -> Self {
        let mut func = Function {
            name,
            ret_ty,
            nocapture: vec![false; params.len()],
            ..Function::default()
        };
        for (index, ty) in params.iter().enumerate() {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            let id = func.push_value(ty.clone(), ValueKind::Param { index });
            func.params.push(id);
        }
        func
    }

    fn push_value(&mut self, ty: LlType, kind: ValueKind) -> ValueId {
        let raw = u32::try_from(self.values.len())
            .unwrap_or_else(|_| panic!("value arena of {:?} overflowed", self.name));
        self.values.push(ValueData { ty, kind });
        ValueId::new(raw)
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub fn ty(&self, id: ValueId) -> &LlType {
        &self.values[id.index()].ty
    }

    pub fn inst(&self, id: ValueId) -> Option<&Inst> {
        match &self.values.get(id.index())?.kind {
            ValueKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// The operation of a live instruction.
    pub fn op(&self, id: ValueId) -> Option<&Op> {
        self.inst(id).filter(|i| i.parent.is_some()).map(|i| &i.op)
    }

    fn inst_mut(&mut self, id: ValueId) -> Option<&mut Inst> {
        match &mut self.values.get_mut(id.index())?.kind {
            ValueKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn parent(&self, id: ValueId) -> Option<BlockId> {
        self.inst(id).and_then(|i| i.parent)
    }

    pub fn is_live(&self, id: ValueId) -> bool {
        self.parent(id).is_some()
    }

    pub fn is_null(&self, id: ValueId) -> bool {
        matches!(self.value(id).kind, ValueKind::Null)
    }

    // ── Constants ───────────────────────────────────────────────────

    pub fn null(&mut self) -> ValueId {
        self.push_value(LlType::Ptr, ValueKind::Null)
    }

    pub fn undef(&mut self, ty: LlType) -> ValueId {
        self.push_value(ty, ValueKind::Undef)
    }

    pub fn const_int(&mut self, value: u64) -> ValueId {
        self.push_value(LlType::I64, ValueKind::ConstInt(value))
    }

    pub fn global_ref(&mut self, name: Name) -> ValueId {
        self.push_value(LlType::Ptr, ValueKind::Global(name))
    }

    pub fn function_ref(&mut self, name: Name) -> ValueId {
        self.push_value(LlType::Ptr, ValueKind::Function(name))
    }

    // ── Blocks ──────────────────────────────────────────────────────

    pub fn add_block(&mut self) -> BlockId {
        let raw = u32::try_from(self.blocks.len())
            .unwrap_or_else(|_| panic!("block list of {:?} overflowed", self.name));
        self.blocks.push(Block::default());
        BlockId::new(raw)
    }

    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(|i| BlockId::new(u32::try_from(i).unwrap_or(u32::MAX)))
    }

    pub fn terminator(&self, block: BlockId) -> Option<ValueId> {
        let last = *self.block(block).insts.last()?;
        self.op(last)
            .filter(|op| op.is_terminator())
            .map(|_| last)
    }

    pub fn successors(&self, block: BlockId) -> SmallVec<[BlockId; 2]> {
        self.terminator(block)
            .and_then(|t| self.op(t))
            .map(Op::successors)
            .unwrap_or_default()
    }

    /// Live instructions of every block, in block order.
    pub fn insts(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.blocks.iter().flat_map(|b| b.insts.iter().copied())
    }

    // ── Mutation ────────────────────────────────────────────────────

    pub fn append(&mut self, block: BlockId, op: Op, ty: LlType) -> ValueId {
        let id = self.push_value(
            ty,
            ValueKind::Inst(Inst {
                op,
                parent: Some(block),
            }),
        );
        self.blocks[block.index()].insts.push(id);
        id
    }

    /// Index of a live instruction within its block.
    pub fn position(&self, id: ValueId) -> Option<usize> {
        let block = self.parent(id)?;
        self.block(block).insts.iter().position(|&i| i == id)
    }

    /// Create an instruction immediately before `anchor`.
    ///
    /// # Panics
    ///
    /// Panics if `anchor` is not a live instruction.
    pub fn insert_before(&mut self, anchor: ValueId, op: Op, ty: LlType) -> ValueId {
        let (block, at) = self.locate(anchor);
        let id = self.push_value(
            ty,
            ValueKind::Inst(Inst {
                op,
                parent: Some(block),
            }),
        );
        self.blocks[block.index()].insts.insert(at, id);
        id
    }

    fn locate(&self, id: ValueId) -> (BlockId, usize) {
        match self.parent(id).zip(self.position(id)) {
            Some(found) => found,
            None => panic!("{id:?} is not a live instruction"),
        }
    }

    /// Unlink an instruction. Its operands stay recorded but it no longer
    /// counts as a user of anything.
    pub fn erase(&mut self, id: ValueId) {
        let (block, at) = self.locate(id);
        self.blocks[block.index()].insts.remove(at);
        if let Some(inst) = self.inst_mut(id) {
            inst.parent = None;
        }
    }

    /// Relink `id` immediately before `anchor`, possibly in another block.
    pub fn move_before(&mut self, id: ValueId, anchor: ValueId) {
        let (from, at) = self.locate(id);
        self.blocks[from.index()].insts.remove(at);
        let (to, at) = self.locate(anchor);
        self.blocks[to.index()].insts.insert(at, id);
        if let Some(inst) = self.inst_mut(id) {
            inst.parent = Some(to);
        }
    }

    /// Every live use of `value`, in block order.
    pub fn uses(&self, value: ValueId) -> Vec<Use> {
        let mut uses = Vec::new();
        for user in self.insts() {
            if let Some(op) = self.op(user) {
                for (operand, v) in op.operands().into_iter().enumerate() {
                    if v == value {
                        uses.push(Use { user, operand });
                    }
                }
            }
        }
        uses
    }

    pub fn has_uses(&self, value: ValueId) -> bool {
        self.insts()
            .filter_map(|user| self.op(user))
            .any(|op| op.operands().contains(&value))
    }

    pub fn set_operand(&mut self, user: ValueId, operand: usize, new: ValueId) {
        if let Some(inst) = self.inst_mut(user) {
            if let Some(slot) = inst.op.operands_mut().into_iter().nth(operand) {
                *slot = new;
            }
        }
    }

    /// Point every live use of `old` at `new`. Returns whether any use
    /// changed.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) -> bool {
        let uses = self.uses(old);
        for u in &uses {
            self.set_operand(u.user, u.operand, new);
        }
        !uses.is_empty()
    }

    // ── Pointer provenance ──────────────────────────────────────────

    /// Look through bitcasts.
    pub fn strip_pointer_casts(&self, mut value: ValueId) -> ValueId {
        while let Some(Op::Cast {
            kind: CastKind::BitCast,
            operand,
        }) = self.op(value)
        {
            value = *operand;
        }
        value
    }

    /// Look through bitcasts and in-bounds pointer arithmetic.
    pub fn strip_in_bounds_offsets(&self, mut value: ValueId) -> ValueId {
        loop {
            match self.op(value) {
                Some(Op::Cast {
                    kind: CastKind::BitCast,
                    operand,
                }) => value = *operand,
                Some(Op::Gep {
                    base,
                    inbounds: true,
                    ..
                }) => value = *base,
                _ => return value,
            }
        }
    }

    /// Unlink `value` if nothing uses it and it is pure, then do the same
    /// for its operands.
    pub fn delete_if_trivially_dead(&mut self, value: ValueId) {
        let mut worklist = vec![value];
        while let Some(v) = worklist.pop() {
            let Some(op) = self.op(v) else { continue };
            if !op.is_pure() || self.has_uses(v) {
                continue;
            }
            let operands = op.operands();
            self.erase(v);
            worklist.extend(operands);
        }
    }
}

// ── Module ──────────────────────────────────────────────────────────

/// Initializer field of a global.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Init {
    Null,
    Int(u64),
    Function(Name),
    Global(Name),
}

/// Heap metadata records are globals whose field 0 is the destructor.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Global {
    pub name: Name,
    pub linkage: Linkage,
    /// `None` for an external declaration.
    pub initializer: Option<Vec<Init>>,
}

pub struct Module {
    pub runtime: RuntimeSymbols,
    functions: Vec<Function>,
    globals: Vec<Global>,
    function_index: FxHashMap<Name, usize>,
    global_index: FxHashMap<Name, usize>,
}

impl Module {
    pub fn new(runtime: RuntimeSymbols) -> Self {
        Module {
            runtime,
            functions: Vec::new(),
            globals: Vec::new(),
            function_index: FxHashMap::default(),
            global_index: FxHashMap::default(),
        }
    }

    /// Add or replace a function by name.
    pub fn add_function(&mut self, func: Function) {
        match self.function_index.get(&func.name) {
            Some(&i) => self.functions[i] = func,
            None => {
                self.function_index.insert(func.name, self.functions.len());
                self.functions.push(func);
            }
        }
    }

    /// Add or replace a global by name.
    pub fn add_global(&mut self, global: Global) {
        match self.global_index.get(&global.name) {
            Some(&i) => self.globals[i] = global,
            None => {
                self.global_index.insert(global.name, self.globals.len());
                self.globals.push(global);
            }
        }
    }

    pub fn function(&self, name: Name) -> Option<&Function> {
        self.function_index.get(&name).map(|&i| &self.functions[i])
    }

    pub fn global(&self, name: Name) -> Option<&Global> {
        self.global_index.get(&name).map(|&i| &self.globals[i])
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    /// Memory effects of a callee, if the module declares it.
    pub fn memory_effects(&self, name: Name) -> Option<MemoryEffects> {
        self.function(name).map(|f| f.memory)
    }

    /// Detach function `index` so it can be rewritten while the rest of the
    /// module is read. A placeholder with external linkage stands in until
    /// [`restore_function`](Self::restore_function).
    pub(crate) fn take_function(&mut self, index: usize) -> Function {
        let name = self.functions[index].name;
        std::mem::replace(
            &mut self.functions[index],
            Function {
                name,
                ..Function::default()
            },
        )
    }

    pub(crate) fn restore_function(&mut self, index: usize, func: Function) {
        self.functions[index] = func;
    }
}
