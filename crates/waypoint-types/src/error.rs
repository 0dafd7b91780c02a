use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from repository operations (used by the `StateStore` port in waypoint-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Classification attached to a failure by the component that raised it.
///
/// The kind travels unchanged from the failing action up to the caller of a
/// run, where it decides how the failure is reported (e.g. HTTP status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The caller supplied input the action rejects.
    BadRequest,
    /// The application configuration is wrong.
    Misconfiguration,
    /// The state store failed underneath an action.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::BadRequest => "BAD_REQUEST",
            FailureKind::Misconfiguration => "MISCONFIGURATION",
            FailureKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BAD_REQUEST" => Ok(FailureKind::BadRequest),
            "MISCONFIGURATION" => Ok(FailureKind::Misconfiguration),
            "INTERNAL" => Ok(FailureKind::Internal),
            other => Err(format!("unknown failure kind '{other}'")),
        }
    }
}

/// A kind-tagged failure raised while building or invoking an action.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ActionError {
    pub kind: FailureKind,
    pub message: String,
    /// Optional structured detail (e.g. the list of schema violations).
    pub diagnostic: Option<Value>,
}

impl ActionError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(FailureKind::BadRequest, message)
    }

    pub fn misconfiguration(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Misconfiguration, message)
    }

    pub fn with_diagnostic(mut self, diagnostic: Value) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }
}

impl From<RepositoryError> for ActionError {
    fn from(err: RepositoryError) -> Self {
        ActionError::new(FailureKind::Internal, err.to_string())
    }
}
