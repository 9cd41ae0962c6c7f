use std::fmt;

/// Error codes for compiler diagnostics.
///
/// Format: E#### where the first digit names the phase:
/// - E2xxx: Protocol conformance
/// - E3xxx: Generic substitution
/// - E9xxx: Internal compiler errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Conformance Errors (E2xxx)
    /// Type does not conform to protocol (headline)
    E2001,
    /// Inherited protocol is not satisfied
    E2002,
    /// Several types could satisfy an associated type
    E2003,
    /// No type satisfies an associated type
    E2004,
    /// Several members could satisfy a requirement
    E2005,
    /// No member satisfies a requirement
    E2006,

    // Substitution Errors (E3xxx)
    /// Replacement type for a generic parameter could not be computed
    E3001,

    // Internal Errors (E9xxx)
    /// IR failed verification
    E9001,
    /// Too many errors
    E9002,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
    }

    /// Whether this code belongs to the conformance checker.
    pub fn is_conformance_error(&self) -> bool {
        self.as_str().starts_with("E2")
    }

    /// Whether this is an internal compiler error.
    pub fn is_internal_error(&self) -> bool {
        self.as_str().starts_with("E9")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E2005.to_string(), "E2005");
    }

    #[test]
    fn test_error_code_phase() {
        assert!(ErrorCode::E2001.is_conformance_error());
        assert!(!ErrorCode::E3001.is_conformance_error());
        assert!(ErrorCode::E9001.is_internal_error());
    }
}
