//! Error taxonomy of a command execution.

use ez_cqrs_store::{BoxError, DatabaseError};
use thiserror::Error;

/// Everything that can stop a command execution.
///
/// `D` is the application's closed set of business-rule violations, usually
/// one enum per bounded context.
#[derive(Debug, Error)]
pub enum ExecutionError<D> {
    /// The command payload was rejected before execution.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A business rule was violated. Safe to show to the caller.
    #[error("{0}")]
    Domain(D),

    /// The persistence layer failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Any other technical failure. Meant for logs, not for the caller.
    #[error(transparent)]
    Unexpected(#[from] UnexpectedError),
}

/// Discriminant of [`ExecutionError`], used for metric labels and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Domain,
    Database,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Domain => "domain",
            ErrorKind::Database => "database",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<D> ExecutionError<D> {
    /// Wraps a business-rule violation.
    pub fn domain(err: D) -> Self {
        Self::Domain(err)
    }

    /// Wraps a lower-layer persistence failure.
    pub fn database(err: impl Into<BoxError>) -> Self {
        Self::Database(DatabaseError::backend(err))
    }

    /// Wraps any other failure.
    pub fn unexpected(err: impl Into<BoxError>) -> Self {
        Self::Unexpected(UnexpectedError::new(err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::Validation(_) => ErrorKind::Validation,
            ExecutionError::Domain(_) => ErrorKind::Domain,
            ExecutionError::Database(_) => ErrorKind::Database,
            ExecutionError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Returns true for failures of the infrastructure rather than of the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ExecutionError::Database(_) | ExecutionError::Unexpected(_)
        )
    }

    /// Returns the business-rule violation, if that is what this is.
    pub fn as_domain(&self) -> Option<&D> {
        match self {
            ExecutionError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// A technical error that prevented the command from being applied.
///
/// The accompanying message should be logged for investigation rather than
/// returned to the user.
#[derive(Debug, Error)]
#[error("Unexpected error: {source}")]
pub struct UnexpectedError {
    #[source]
    source: BoxError,
}

impl UnexpectedError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self { source: err.into() }
    }
}

/// One rejected field of a command payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Schema-level rejection of a command, raised before it is executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Creates an error for a single field.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![FieldViolation {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// Starts collecting violations.
    pub fn builder() -> ValidationErrorBuilder {
        ValidationErrorBuilder::default()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }
}

/// Accumulates field violations and turns them into a validation result.
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    violations: Vec<FieldViolation>,
}

impl ValidationErrorBuilder {
    /// Records a violation unless `condition` holds.
    pub fn ensure(
        self,
        condition: bool,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        if condition {
            self
        } else {
            self.violation(field, message)
        }
    }

    /// Records a violation.
    pub fn violation(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
        self
    }

    /// Returns `Ok(())` when nothing was recorded.
    pub fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.violations,
            })
        }
    }
}
