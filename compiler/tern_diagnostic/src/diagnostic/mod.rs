use std::fmt;

use tern_ir::Span;

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A labeled span with a message.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

impl Label {
    /// Create a primary label (the main error location).
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: true,
        }
    }

    /// Create a secondary label (related context, e.g. a candidate witness).
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: false,
        }
    }
}

/// A user-facing diagnostic.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn new_with_severity(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a primary label at the error location.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Get the primary span (first primary label's span).
    pub fn primary_span(&self) -> Option<Span> {
        self.labels.iter().find(|l| l.is_primary).map(|l| l.span)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)?;

        for label in &self.labels {
            let marker = if label.is_primary { "-->" } else { "   " };
            write!(f, "\n  {} {:?}: {}", marker, label.span, label.message)?;
        }

        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }

        Ok(())
    }
}

// ── Conformance diagnostics ─────────────────────────────────────────

/// What kind of value requirement a witness diagnostic is about.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum WitnessKind {
    Function,
    Property,
    Subscript,
}

impl WitnessKind {
    fn as_str(self) -> &'static str {
        match self {
            WitnessKind::Function => "function",
            WitnessKind::Property => "property",
            WitnessKind::Subscript => "subscript",
        }
    }
}

/// Headline for a failed conformance. Emitted at most once per check.
pub fn type_does_not_conform(span: Span, ty: &str, protocol: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2001)
        .with_message(format!("type `{ty}` does not conform to protocol `{protocol}`"))
        .with_label(span, format!("`{ty}` is required to conform to `{protocol}` here"))
}

pub fn inherited_protocol_does_not_conform(
    span: Span,
    ty: &str,
    inherited: &str,
) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2002)
        .with_message(format!(
            "type `{ty}` does not conform to inherited protocol `{inherited}`"
        ))
        .with_label(span, format!("`{inherited}` is inherited here"))
}

/// Several candidate types could bind an associated type.
///
/// `candidates` holds the location and rendered type of every viable
/// candidate; each becomes a secondary label.
pub fn ambiguous_witnesses_type(
    span: Span,
    assoc_name: &str,
    candidates: &[(Span, String)],
) -> Diagnostic {
    let mut diag = Diagnostic::error(ErrorCode::E2003)
        .with_message(format!("multiple matching types named `{assoc_name}`"))
        .with_label(span, format!("associated type `{assoc_name}` required here"));
    for (candidate_span, candidate_ty) in candidates {
        diag = diag.with_secondary_label(
            *candidate_span,
            format!("possibly intended match `{candidate_ty}`"),
        );
    }
    diag
}

/// No candidate type binds an associated type.
///
/// `rejected` lists candidates that were found by name but did not satisfy
/// the associated type's own protocol requirements.
pub fn no_witnesses_type(
    span: Span,
    assoc_name: &str,
    rejected: &[(Span, String, String)],
) -> Diagnostic {
    let mut diag = Diagnostic::error(ErrorCode::E2004)
        .with_message(format!("protocol requires nested type `{assoc_name}`"))
        .with_label(span, format!("`{assoc_name}` declared here"));
    for (candidate_span, candidate_ty, protocol) in rejected {
        diag = diag.with_secondary_label(
            *candidate_span,
            format!("possibly intended match `{candidate_ty}` does not conform to `{protocol}`"),
        );
    }
    diag
}

/// Several members could satisfy a value requirement.
pub fn ambiguous_witnesses(
    span: Span,
    kind: WitnessKind,
    name: &str,
    required_ty: &str,
    candidates: &[Span],
) -> Diagnostic {
    let mut diag = Diagnostic::error(ErrorCode::E2005)
        .with_message(format!(
            "multiple matching {} named `{name}` with type `{required_ty}`",
            kind.as_str()
        ))
        .with_label(span, "requirement declared here");
    for candidate in candidates {
        diag = diag.with_secondary_label(*candidate, "possibly intended match");
    }
    diag
}

/// No member satisfies a value requirement.
pub fn no_witnesses(span: Span, kind: WitnessKind, name: &str, required_ty: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2006)
        .with_message(format!(
            "protocol requires {} `{name}` with type `{required_ty}`",
            kind.as_str()
        ))
        .with_label(span, "requirement declared here")
}

/// A nested type of a generic argument could not be resolved.
pub fn unresolvable_substitution(span: Span, archetype: &str, replacement: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E3001)
        .with_message(format!(
            "cannot substitute `{replacement}` for `{archetype}`: no matching nested type"
        ))
        .with_label(span, "required by this use")
}
