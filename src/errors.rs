use serde_json::{json, Value};
use thiserror::Error;

/// Domain error taxonomy for the governance core.
///
/// Every variant carries a human-readable message and a structured
/// `details` object with stable machine-readable fields (`path`,
/// `field_key`, `operator`, `ruleset_version_id`, ...) so callers can
/// handle failures programmatically.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: bad condition tree, type/operator violation,
    /// disallowed rule-type publish.
    #[error("validation error: {message}")]
    Validation { message: String, details: Value },

    /// Referenced entity does not exist.
    #[error("not found: {message}")]
    NotFound { message: String, details: Value },

    /// Optimistic-lock mismatch, natural-key duplicate, or
    /// idempotency-key reuse with a different payload.
    #[error("conflict: {message}")]
    Conflict { message: String, details: Value },

    /// Disallowed lifecycle transition.
    #[error("invalid state: {message}")]
    InvalidState { message: String, details: Value },

    /// Permission denied, including maker-equals-checker.
    #[error("forbidden: {message}")]
    Forbidden { message: String, details: Value },

    /// Validation failed while compiling a ruleset version.
    #[error("compilation error: {message}")]
    Compilation { message: String, details: Value },

    /// Object-storage I/O failure or checksum mismatch for an
    /// existing artifact key.
    #[error("publishing error: {message}")]
    Publishing { message: String, details: Value },

    /// Database constraint violation surfaced after retries.
    #[error("integrity error: {message}")]
    Integrity { message: String, details: Value },

    /// Transient dependency failure.
    #[error("unavailable: {message}")]
    Unavailable { message: String, details: Value },
}

impl Error {
    pub fn validation(message: impl Into<String>, details: Value) -> Self {
        Error::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Error::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Error::Conflict {
            message: message.into(),
            details,
        }
    }

    pub fn invalid_state(message: impl Into<String>, details: Value) -> Self {
        Error::InvalidState {
            message: message.into(),
            details,
        }
    }

    pub fn forbidden(message: impl Into<String>, details: Value) -> Self {
        Error::Forbidden {
            message: message.into(),
            details,
        }
    }

    pub fn compilation(message: impl Into<String>, details: Value) -> Self {
        Error::Compilation {
            message: message.into(),
            details,
        }
    }

    pub fn publishing(message: impl Into<String>, details: Value) -> Self {
        Error::Publishing {
            message: message.into(),
            details,
        }
    }

    pub fn integrity(message: impl Into<String>, details: Value) -> Self {
        Error::Integrity {
            message: message.into(),
            details,
        }
    }

    pub fn unavailable(message: impl Into<String>, details: Value) -> Self {
        Error::Unavailable {
            message: message.into(),
            details,
        }
    }

    /// Stable error kind for the wire envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "ValidationError",
            Error::NotFound { .. } => "NotFoundError",
            Error::Conflict { .. } => "ConflictError",
            Error::InvalidState { .. } => "InvalidStateError",
            Error::Forbidden { .. } => "ForbiddenError",
            Error::Compilation { .. } => "CompilationError",
            Error::Publishing { .. } => "PublishingError",
            Error::Integrity { .. } => "IntegrityError",
            Error::Unavailable { .. } => "UnavailableError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Validation { message, .. }
            | Error::NotFound { message, .. }
            | Error::Conflict { message, .. }
            | Error::InvalidState { message, .. }
            | Error::Forbidden { message, .. }
            | Error::Compilation { message, .. }
            | Error::Publishing { message, .. }
            | Error::Integrity { message, .. }
            | Error::Unavailable { message, .. } => message,
        }
    }

    pub fn details(&self) -> &Value {
        match self {
            Error::Validation { details, .. }
            | Error::NotFound { details, .. }
            | Error::Conflict { details, .. }
            | Error::InvalidState { details, .. }
            | Error::Forbidden { details, .. }
            | Error::Compilation { details, .. }
            | Error::Publishing { details, .. }
            | Error::Integrity { details, .. }
            | Error::Unavailable { details, .. } => details,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => Error::not_found("row not found", json!({})),
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::conflict(
                "unique constraint violation",
                json!({ "constraint": db.constraint() }),
            ),
            sqlx::Error::Database(db)
                if db.is_foreign_key_violation() || db.is_check_violation() =>
            {
                Error::integrity(
                    "database constraint violation",
                    json!({ "constraint": db.constraint() }),
                )
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Error::unavailable("database unavailable", json!({ "error": e.to_string() }))
            }
            _ => Error::integrity("database error", json!({ "error": e.to_string() })),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        let e = Error::validation("bad tree", json!({"path": "$.and[0]"}));
        assert_eq!(e.kind(), "ValidationError");

        let e = Error::publishing("upload failed", json!({}));
        assert_eq!(e.kind(), "PublishingError");

        let e = Error::forbidden("maker cannot approve own submission", json!({}));
        assert_eq!(e.kind(), "ForbiddenError");
    }

    #[test]
    fn test_details_round_trip() {
        let e = Error::conflict("stale version", json!({"expected": 3, "actual": 4}));
        assert_eq!(e.details()["expected"], 3);
        assert_eq!(e.message(), "stale version");
    }
}
