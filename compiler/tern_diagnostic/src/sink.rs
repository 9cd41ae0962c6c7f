//! The reporting interface checkers write to.

use crate::Diagnostic;

/// Receiver for user-facing diagnostics.
///
/// Reporting never fails and never aborts the caller: zero or more reports
/// accumulate while checking continues.
pub trait DiagnosticSink {
    fn report(&mut self, diag: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diag: Diagnostic) {
        self.push(diag);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diag: Diagnostic) {
        (**self).report(diag);
    }
}
