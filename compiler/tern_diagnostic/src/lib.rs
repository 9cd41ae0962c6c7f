//! Diagnostics for user-facing semantic errors.
//!
//! Checkers never return user errors through `Result`. They build a
//! [`Diagnostic`] and hand it to a [`DiagnosticSink`], then keep going so one
//! run surfaces as many problems as possible. Internal-consistency failures
//! (IR verifier violations and the like) are not diagnostics and never go
//! through this crate.

mod diagnostic;
mod error_code;
pub mod queue;
mod sink;

pub use diagnostic::{
    ambiguous_witnesses, ambiguous_witnesses_type, inherited_protocol_does_not_conform,
    no_witnesses, no_witnesses_type, type_does_not_conform, unresolvable_substitution, Diagnostic,
    Label, Severity, WitnessKind,
};
pub use error_code::ErrorCode;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
pub use sink::DiagnosticSink;
