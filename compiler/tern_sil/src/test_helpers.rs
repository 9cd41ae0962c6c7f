//! Fixtures shared by the unit tests of this crate.

use tern_types::{AstContext, Idx};

use crate::{verify_function, Builder, Function, VerifyError};

/// A function under construction plus the context that owns its types.
pub(crate) struct Fixture {
    pub ctx: AstContext,
    pub func: Function,
}

impl Fixture {
    /// Empty function `name : input -> result`.
    pub fn new(name: &str, input: Idx, result: Idx) -> Self {
        let mut ctx = AstContext::default();
        let ty = ctx.pool_mut().function(input, result);
        let func = Function::new(ctx.name(name), ty);
        Fixture { ctx, func }
    }

    pub fn builder(&mut self) -> Builder<'_> {
        Builder::new(self.ctx.pool_mut(), &mut self.func)
    }

    pub fn errors(&self) -> Vec<VerifyError> {
        verify_function(self.ctx.pool(), &self.func)
    }

    pub fn printed(&self) -> String {
        self.func.display(&self.ctx).to_string()
    }
}
