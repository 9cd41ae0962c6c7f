//! Typed instruction IR for the Tern compiler.
//!
//! Type-checked declarations lower into [`Function`]s made of basic blocks
//! of typed instructions. Every instruction result and block argument is a
//! [`ValueId`] carrying a type from the `tern_types` pool.
//!
//! - [`Builder`] constructs well-formed functions.
//! - [`verify_function`] checks structural and type invariants; it is an
//!   internal-consistency oracle, not a user-facing check.
//! - [`Function::display`] renders the textual form.

mod builder;
mod function;
mod printer;
mod verify;

#[cfg(test)]
mod test_helpers;

pub use builder::{BuildError, Builder};
pub use function::{
    BasicBlock, BlockId, Function, InstKind, Instruction, Operands, ValueData, ValueDef, ValueId,
};
pub use printer::FunctionDisplay;
pub use verify::{verify_function, verify_function_or_panic, VerifyError};
