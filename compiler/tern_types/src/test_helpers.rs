//! Fixtures shared by the unit tests of this crate.

use tern_diagnostic::{Diagnostic, ErrorCode};
use tern_ir::Span;

use crate::{AstContext, ConformanceCache, ConformanceChecker, ConformsTo, DeclId, Idx, ModuleLookup};

/// Where conformance is demanded in tests that want diagnostics.
pub(crate) const USE_SITE: Span = Span::new(1000, 1010);

/// Distinct span for the `n`th declaration of a test.
pub(crate) fn sp(n: u32) -> Span {
    Span::new(n * 10, n * 10 + 5)
}

/// A context plus everything the conformance checker needs.
pub(crate) struct World {
    pub ctx: AstContext,
    pub cache: ConformanceCache,
    pub diags: Vec<Diagnostic>,
}

impl World {
    pub fn new() -> Self {
        World {
            ctx: AstContext::default(),
            cache: ConformanceCache::new(),
            diags: Vec::new(),
        }
    }

    pub fn checker(&mut self) -> ConformanceChecker<'_> {
        ConformanceChecker::new(&mut self.ctx, &ModuleLookup, &mut self.cache, &mut self.diags)
    }

    /// Conformance check that reports at [`USE_SITE`].
    pub fn conforms(&mut self, ty: Idx, proto: DeclId) -> Option<ConformsTo> {
        self.checker().conforms_to_protocol(ty, proto, Some(USE_SITE))
    }

    /// Speculative conformance check.
    pub fn conforms_quietly(&mut self, ty: Idx, proto: DeclId) -> Option<ConformsTo> {
        self.checker().conforms_to_protocol(ty, proto, None)
    }

    /// The type a nominal or protocol declaration introduces.
    pub fn declared(&self, decl: DeclId) -> Idx {
        self.ctx
            .declared_type(decl)
            .unwrap_or_else(|| panic!("{decl:?} declares no type"))
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.diags.iter().map(|d| d.code).collect()
    }
}
