//! Textual form of functions for tests and debug logging.
//!
//! Values are renumbered densely in print order (block arguments, then the
//! instructions of each block), so the output does not depend on arena
//! layout.

use std::fmt;

use rustc_hash::FxHashMap;
use tern_types::AstContext;

use crate::{BlockId, Function, InstKind, ValueId};

/// `Display` adapter returned by [`Function::display`].
pub struct FunctionDisplay<'a> {
    ctx: &'a AstContext,
    func: &'a Function,
}

impl Function {
    pub fn display<'a>(&'a self, ctx: &'a AstContext) -> FunctionDisplay<'a> {
        FunctionDisplay { ctx, func: self }
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { ctx, func } = *self;
        let numbers = number_values(func);
        let id = |v: ValueId| match numbers.get(&v) {
            Some(n) => format!("%{n}"),
            None => "<undef>".to_owned(),
        };
        let list = |vs: &[ValueId]| vs.iter().map(|&v| id(v)).collect::<Vec<_>>().join(", ");

        writeln!(
            f,
            "sil @{} : {}",
            ctx.interner().lookup(func.name),
            ctx.type_name(func.ty)
        )?;
        let preds = func.predecessors();
        for (block_id, block) in func.blocks() {
            writeln!(f)?;
            write!(f, "{block_id}")?;
            if !block.args.is_empty() {
                let args: Vec<String> = block
                    .args
                    .iter()
                    .map(|&a| format!("{} : {}", id(a), ctx.type_name(func.value_type(a))))
                    .collect();
                write!(f, "({})", args.join(", "))?;
            }
            write!(f, ":")?;
            if let Some(list) = preds.get(block_id.index()).filter(|p| !p.is_empty()) {
                let names: Vec<String> = list.iter().map(BlockId::to_string).collect();
                write!(f, "  // preds: {}", names.join(", "))?;
            }
            writeln!(f)?;

            for &inst in &block.insts {
                let Some(data) = func.inst(inst) else {
                    writeln!(f, "  <block argument {inst} listed as instruction>")?;
                    continue;
                };
                let kind = &data.kind;
                write!(f, "  ")?;
                if kind.has_result() {
                    write!(f, "{} = ", id(inst))?;
                }
                write!(f, "{}", kind.opcode())?;
                match kind {
                    InstKind::AllocVar { decl } | InstKind::ConstantRef { decl } => {
                        write!(f, " {}", ctx.decl_name(*decl))?;
                    }
                    InstKind::AllocArray { element, count } => {
                        write!(f, " {}, {}", ctx.type_name(*element), id(*count))?;
                    }
                    InstKind::Apply { callee, args } => {
                        write!(f, " {}({})", id(*callee), list(args))?;
                    }
                    InstKind::IntegerLiteral { value } | InstKind::IntegerValue { value } => {
                        write!(f, " {value}")?;
                    }
                    InstKind::FloatLiteral { bits } => write!(f, " {}", f64::from_bits(*bits))?,
                    InstKind::CharacterLiteral { value } => write!(f, " {value:?}")?,
                    InstKind::StringLiteral { value } => {
                        write!(f, " {:?}", ctx.interner().lookup(*value))?;
                    }
                    InstKind::Load { lvalue, is_take } => {
                        write!(f, " {}", id(*lvalue))?;
                        if *is_take {
                            write!(f, " [take]")?;
                        }
                    }
                    InstKind::Store {
                        src,
                        dest,
                        is_initialization,
                    } => {
                        write!(f, " {} to {}", id(*src), id(*dest))?;
                        if *is_initialization {
                            write!(f, " [initialization]")?;
                        }
                    }
                    InstKind::Copy {
                        src,
                        dest,
                        is_take_of_src,
                        is_initialization_of_dest,
                    } => {
                        write!(f, " {}", id(*src))?;
                        if *is_take_of_src {
                            write!(f, " [take]")?;
                        }
                        write!(f, " to {}", id(*dest))?;
                        if *is_initialization_of_dest {
                            write!(f, " [initialization]")?;
                        }
                    }
                    InstKind::Specialize { operand }
                    | InstKind::TypeConversion { operand }
                    | InstKind::Retain { operand }
                    | InstKind::Release { operand }
                    | InstKind::Dealloc { operand }
                    | InstKind::Destroy { operand } => write!(f, " {}", id(*operand))?,
                    InstKind::Tuple { elements } => write!(f, " ({})", list(elements))?,
                    InstKind::TupleElement { operand, field: n }
                    | InstKind::IndexLValue { operand, index: n } => {
                        write!(f, " {}, {n}", id(*operand))?;
                    }
                    InstKind::Return { value } => write!(f, " {}", id(*value))?,
                    InstKind::Branch { dest, args } => {
                        write!(f, " {dest}")?;
                        if !args.is_empty() {
                            write!(f, "({})", list(args))?;
                        }
                    }
                    InstKind::CondBranch {
                        condition,
                        true_dest,
                        false_dest,
                    } => write!(f, " {}, {true_dest}, {false_dest}", id(*condition))?,
                    InstKind::AllocTmp
                    | InstKind::ZeroValue
                    | InstKind::Metatype
                    | InstKind::Unreachable => {}
                }
                if kind.has_result() {
                    write!(f, " : {}", ctx.type_name(func.value_type(inst)))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn number_values(func: &Function) -> FxHashMap<ValueId, usize> {
    let mut numbers = FxHashMap::default();
    for (_, block) in func.blocks() {
        for &arg in &block.args {
            let next = numbers.len();
            numbers.entry(arg).or_insert(next);
        }
        for &inst in &block.insts {
            let has_result = func.inst(inst).is_some_and(|i| i.kind.has_result());
            if has_result {
                let next = numbers.len();
                numbers.entry(inst).or_insert(next);
            }
        }
    }
    numbers
}
