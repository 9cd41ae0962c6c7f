//! One compilation's worth of middle-end state.
//!
//! A [`Session`] owns the declaration context, the conformance cache and
//! the diagnostic queue. Conformance queries report into the queue; IR
//! verification and the ARC passes read the context and change nothing in
//! it.

use tern_arc::{ArcStats, Module};
use tern_diagnostic::{Diagnostic, DiagnosticQueue};
use tern_ir::Span;
use tern_sil::VerifyError;
use tern_types::{
    AstContext, ConformanceCache, ConformanceChecker, ConformanceId, ConformanceMap, ConformsTo,
    DeclId, Idx, ModuleLookup, ProtocolConformance, SubstitutionFailure, SubstitutionMap,
};

use crate::CompilerOptions;

/// A stage of the pipeline that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IR verification failed for `{function}` ({} violations)", errors.len())]
    Verify {
        function: String,
        errors: Vec<VerifyError>,
    },

    #[error("compilation stopped after {count} errors")]
    Diagnostics { count: usize },
}

pub struct Session {
    ctx: AstContext,
    conformances: ConformanceCache,
    diagnostics: DiagnosticQueue,
    options: CompilerOptions,
}

impl Session {
    pub fn new(ctx: AstContext, options: CompilerOptions) -> Self {
        let diagnostics = DiagnosticQueue::with_config(options.diagnostics.clone());
        Session {
            ctx,
            conformances: ConformanceCache::new(),
            diagnostics,
            options,
        }
    }

    pub fn ctx(&self) -> &AstContext {
        &self.ctx
    }

    /// Declarations may still be added between queries.
    pub fn ctx_mut(&mut self) -> &mut AstContext {
        &mut self.ctx
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn checker(&mut self) -> ConformanceChecker<'_> {
        ConformanceChecker::new(
            &mut self.ctx,
            &ModuleLookup,
            &mut self.conformances,
            &mut self.diagnostics,
        )
    }

    /// Does `ty` conform to `proto`? Failures are diagnosed at `complain`.
    pub fn conforms_to(
        &mut self,
        ty: Idx,
        proto: DeclId,
        complain: Option<Span>,
    ) -> Option<ConformsTo> {
        let result = self.checker().conforms_to_protocol(ty, proto, complain);
        tracing::debug!(
            ty = ty.raw(),
            proto = proto.raw(),
            conforms = result.is_some(),
            "conformance query"
        );
        result
    }

    pub fn conformance(&self, id: ConformanceId) -> &ProtocolConformance {
        self.conformances.get(id)
    }

    /// Check the replacement of every archetype in `subs` against its
    /// protocols and return the conformances found, keyed by archetype.
    pub fn check_substitutions(
        &mut self,
        subs: &SubstitutionMap,
        complain: Option<Span>,
    ) -> Result<ConformanceMap, SubstitutionFailure> {
        let mut conformances = ConformanceMap::default();
        self.checker()
            .check_substitutions(subs, &mut conformances, complain, None)?;
        Ok(conformances)
    }

    /// Verify an IR function built against this session's context.
    ///
    /// Does nothing when verification is off. With `fatal_verify` set a
    /// violation panics.
    pub fn verify(&self, func: &tern_sil::Function) -> Result<(), SessionError> {
        if !self.options.verify_sil {
            return Ok(());
        }
        if self.options.fatal_verify {
            tern_sil::verify_function_or_panic(self.ctx.pool(), func);
            return Ok(());
        }
        let errors = tern_sil::verify_function(self.ctx.pool(), func);
        if errors.is_empty() {
            return Ok(());
        }
        let function = self.ctx.interner().lookup(func.name).to_owned();
        tracing::debug!(%function, violations = errors.len(), "IR verification failed");
        Err(SessionError::Verify { function, errors })
    }

    /// Run the enabled ARC phases over `module`: optimization first, then
    /// expansion.
    pub fn run_arc(&self, module: &mut Module) -> ArcStats {
        let mut stats = ArcStats::default();
        if self.options.arc_optimize {
            stats += tern_arc::optimize_module(module, &self.options.arc);
        }
        if self.options.arc_expand {
            stats += tern_arc::expand_module(module, &self.options.arc);
        }
        tracing::debug!(
            functions = module.num_functions(),
            changes = stats.total(),
            "ARC pipeline finished"
        );
        stats
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    /// Drain the queued diagnostics in source order.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.flush()
    }

    /// End the session: the queued diagnostics if none is an error.
    pub fn finish(mut self) -> Result<Vec<Diagnostic>, SessionError> {
        if self.has_errors() {
            return Err(SessionError::Diagnostics {
                count: self.error_count(),
            });
        }
        Ok(self.take_diagnostics())
    }
}

#[cfg(test)]
mod tests;
