use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidConfig,
    DocumentNotFound,
    UnsupportedDocument,
    DocumentReadFailed,
    InsufficientInput,
    WorkerPoolFailed,
    ComparisonFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidConfig => "E1002",
            Self::DocumentNotFound => "E2001",
            Self::UnsupportedDocument => "E2002",
            Self::DocumentReadFailed => "E2003",
            Self::InsufficientInput => "E2004",
            Self::WorkerPoolFailed => "E5001",
            Self::ComparisonFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfig => "Invalid configuration value",
            Self::DocumentNotFound => "Document not found",
            Self::UnsupportedDocument => "Unsupported document type",
            Self::DocumentReadFailed => "Document could not be read",
            Self::InsufficientInput => "Not enough documents to compare",
            Self::WorkerPoolFailed => "Worker pool could not be started",
            Self::ComparisonFailed => "Pair comparison failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in treesim.toml and retry."),
            Self::InvalidConfig => {
                Some("Weights must be finite and >= 0; max_workers must be positive or \"auto\"; max_depth must be 2..=4096.")
            }
            Self::DocumentNotFound => Some("Check the path; inputs are resolved from the current directory."),
            Self::UnsupportedDocument => Some("Only Markdown (.md) files are compared."),
            Self::DocumentReadFailed => Some("Check file permissions."),
            Self::InsufficientInput => Some("Pass at least two Markdown files."),
            Self::WorkerPoolFailed => Some("Lower --workers or check thread limits (ulimit -u)."),
            Self::ComparisonFailed => {
                Some("Run with --verbose for the reason; raise engine.max_depth for deeply nested documents.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the similarity core.
///
/// Comparisons themselves never fail; a pair that cannot be scored is
/// recorded as [`crate::scores::PairOutcome::Failed`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The rayon worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::WorkerPool(_) => ErrorCode::WorkerPoolFailed,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorCode};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidConfig,
            ErrorCode::DocumentNotFound,
            ErrorCode::UnsupportedDocument,
            ErrorCode::DocumentReadFailed,
            ErrorCode::InsufficientInput,
            ErrorCode::WorkerPoolFailed,
            ErrorCode::ComparisonFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvalidConfig.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn invalid_config_maps_to_code_and_hint() {
        let err = Error::InvalidConfig("text_weight must be finite".into());
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert!(err.hint().is_some());
        assert!(err.to_string().contains("text_weight"));
    }

    #[test]
    fn runtime_and_input_codes_carry_hints() {
        assert_eq!(ErrorCode::ComparisonFailed.code(), "E5002");
        assert!(ErrorCode::ComparisonFailed.hint().is_some_and(|h| h.contains("max_depth")));
        assert_eq!(ErrorCode::UnsupportedDocument.code(), "E2002");
        assert!(ErrorCode::UnsupportedDocument.hint().is_some());
    }
}
