//! Fixtures shared by the unit tests of this crate.

use tern_ir::{Name, StringInterner};

use crate::classify::{ALLOC_OBJECT, RELEASE, RETAIN_NORESULT};
use crate::ir::{
    BlockId, Callee, Function, Global, Init, Linkage, LlType, MemoryEffects, Module, Op, ValueId,
};
use crate::RuntimeSymbols;

/// A module with the runtime symbols interned, plus the interner.
pub(crate) struct Fixture {
    pub interner: StringInterner,
    pub module: Module,
}

impl Fixture {
    pub fn new() -> Self {
        let interner = StringInterner::new();
        let module = Module::new(RuntimeSymbols::new(&interner));
        Fixture { interner, module }
    }

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Definition `name(params) -> ret` with an empty entry block.
    pub fn function(&self, name: &str, params: &[LlType], ret: LlType) -> (Function, BlockId) {
        let mut func = Function::new(self.name(name), params, ret);
        let entry = func.add_block();
        (func, entry)
    }

    /// External declaration of `name` with the given memory effects.
    pub fn declare(&mut self, name: &str, memory: MemoryEffects) -> Name {
        let mut func = Function::new(self.name(name), &[LlType::Ptr], LlType::Void);
        func.memory = memory;
        let symbol = func.name;
        self.module.add_function(func);
        symbol
    }

    /// Register `dtor` as an internal function and add metadata global
    /// `name` whose destructor slot points at it.
    pub fn metadata(&mut self, name: &str, mut dtor: Function) -> Name {
        dtor.linkage = Linkage::Internal;
        let dtor_symbol = dtor.name;
        self.module.add_function(dtor);
        let symbol = self.name(name);
        self.module.add_global(Global {
            name: symbol,
            linkage: Linkage::Internal,
            initializer: Some(vec![Init::Function(dtor_symbol), Init::Int(16)]),
        });
        symbol
    }

    /// Metadata whose destructor just returns.
    pub fn trivial_metadata(&mut self, name: &str) -> Name {
        let (mut dtor, entry) = self.function(&format!("{name}.dtor"), &[LlType::Ptr], LlType::Void);
        dtor.append(entry, Op::Ret { value: None }, LlType::Void);
        self.metadata(name, dtor)
    }

    /// Metadata whose destructor calls `callee` with the dying object.
    pub fn calling_metadata(&mut self, name: &str, callee: &str) -> Name {
        let (mut dtor, entry) = self.function(&format!("{name}.dtor"), &[LlType::Ptr], LlType::Void);
        let this = dtor.params()[0];
        self.call(&mut dtor, entry, callee, &[this], LlType::Void);
        dtor.append(entry, Op::Ret { value: None }, LlType::Void);
        self.metadata(name, dtor)
    }

    pub fn call(
        &self,
        func: &mut Function,
        block: BlockId,
        callee: &str,
        args: &[ValueId],
        ty: LlType,
    ) -> ValueId {
        let op = Op::Call {
            callee: Callee::Direct(self.name(callee)),
            args: args.iter().copied().collect(),
            tail: false,
        };
        func.append(block, op, ty)
    }

    pub fn retain_noresult(&self, func: &mut Function, block: BlockId, object: ValueId) -> ValueId {
        self.call(func, block, RETAIN_NORESULT, &[object], LlType::Void)
    }

    pub fn release(&self, func: &mut Function, block: BlockId, object: ValueId) -> ValueId {
        self.call(func, block, RELEASE, &[object], LlType::Void)
    }

    /// `alloc_object(@metadata, 16, 8)`
    pub fn alloc(&self, func: &mut Function, block: BlockId, metadata: Name) -> ValueId {
        let metadata = func.global_ref(metadata);
        let size = func.const_int(16);
        let align = func.const_int(8);
        self.call(func, block, ALLOC_OBJECT, &[metadata, size, align], LlType::Ptr)
    }

    /// Live instructions in block order: the callee symbol for direct
    /// calls, the opcode for everything else.
    pub fn render(&self, func: &Function) -> Vec<String> {
        func.insts()
            .filter_map(|inst| func.op(inst))
            .map(|op| match op {
                Op::Call {
                    callee: Callee::Direct(symbol),
                    ..
                } => self.interner.lookup(*symbol).to_owned(),
                op => op.opcode().to_owned(),
            })
            .collect()
    }
}

/// `ret void`
pub(crate) fn ret_void(func: &mut Function, block: BlockId) -> ValueId {
    func.append(block, Op::Ret { value: None }, LlType::Void)
}

pub(crate) fn load(func: &mut Function, block: BlockId, ptr: ValueId) -> ValueId {
    func.append(block, Op::Load { ptr }, LlType::I64)
}

pub(crate) fn store(func: &mut Function, block: BlockId, value: ValueId, ptr: ValueId) -> ValueId {
    func.append(block, Op::Store { value, ptr }, LlType::Void)
}

/// `gep inbounds base, offset`
pub(crate) fn gep(func: &mut Function, block: BlockId, base: ValueId, offset: u64) -> ValueId {
    let offset = func.const_int(offset);
    let op = Op::Gep {
        base,
        offset,
        inbounds: true,
    };
    func.append(block, op, LlType::Ptr)
}
