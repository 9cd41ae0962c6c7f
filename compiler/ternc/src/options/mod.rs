//! Compiler configuration.

use tern_arc::ArcOptions;
use tern_diagnostic::DiagnosticConfig;

/// Disables ARC Phases A and B.
const NO_ARC_OPT: &str = "TERN_NO_ARC_OPT";
/// Disables IR verification.
const NO_VERIFY: &str = "TERN_NO_VERIFY";

/// What a [`Session`](crate::Session) runs and how it reports.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CompilerOptions {
    /// Error limit and deduplication for user-facing diagnostics.
    pub diagnostics: DiagnosticConfig,
    /// Verify IR functions handed to the session.
    pub verify_sil: bool,
    /// A verification failure panics instead of returning an error.
    pub fatal_verify: bool,
    /// Run ARC canonicalization and motion.
    pub arc_optimize: bool,
    /// Run ARC expansion.
    pub arc_expand: bool,
    /// Individual ARC optimizations.
    pub arc: ArcOptions,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            diagnostics: DiagnosticConfig::default(),
            verify_sil: true,
            fatal_verify: cfg!(debug_assertions),
            arc_optimize: true,
            arc_expand: true,
            arc: ArcOptions::default(),
        }
    }
}

impl CompilerOptions {
    /// Defaults adjusted by `TERN_NO_ARC_OPT` and `TERN_NO_VERIFY`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var_os(key).is_some())
    }

    /// Defaults adjusted by whichever switches `is_set` reports present.
    pub fn from_vars(is_set: impl Fn(&str) -> bool) -> Self {
        let mut options = CompilerOptions::default();
        if is_set(NO_ARC_OPT) {
            options.arc_optimize = false;
        }
        if is_set(NO_VERIFY) {
            options.verify_sil = false;
        }
        options
    }
}
