//! The module contains the errors the engine can throw.
//!
//! Every variant belongs to one [`ErrorKind`], the taxonomy exposed at the
//! transport boundary:
//!
//! - [`InvalidInput`] and [`InvalidFields`] are `incorrect-input`.
//! - [`NotFound`] is `not-found`.
//! - [`Unauthorized`] is `unauthorized`.
//! - [`ExistingKey`] is `conflict`.
//! - [`Database`], [`Fetch`] and [`PartialMove`] are `dependency`.
//! - [`Unknown`] is `unknown`.
//!
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`InvalidFields`]: EngineError::InvalidFields
//!  [`NotFound`]: EngineError::NotFound
//!  [`Unauthorized`]: EngineError::Unauthorized
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`Database`]: EngineError::Database
//!  [`Fetch`]: EngineError::Fetch
//!  [`PartialMove`]: EngineError::PartialMove
//!  [`Unknown`]: EngineError::Unknown
use std::fmt;

use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared with the HTTP layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    IncorrectInput,
    NotFound,
    Unauthorized,
    Conflict,
    Dependency,
    Unknown,
}

impl ErrorKind {
    /// Short tag used in the error envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncorrectInput => "incorrect-input",
            Self::NotFound => "not-found",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Dependency => "dependency",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single invalid field reported by a validating constructor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid fields: {}", join_fields(.0))]
    InvalidFields(Vec<FieldError>),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Remote fetch failed: {0}")]
    Fetch(String),
    #[error("Move interrupted after {updated} updates: {message}")]
    PartialMove { updated: u64, message: String },
    #[error("Unknown error: {0}")]
    Unknown(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidFields(_) => ErrorKind::IncorrectInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::ExistingKey(_) => ErrorKind::Conflict,
            Self::Fetch(_) | Self::PartialMove { .. } | Self::Database(_) => {
                ErrorKind::Dependency
            }
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidFields(a), Self::InvalidFields(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Fetch(a), Self::Fetch(b)) => a == b,
            (
                Self::PartialMove {
                    updated: a,
                    message: m,
                },
                Self::PartialMove {
                    updated: b,
                    message: n,
                },
            ) => a == b && m == n,
            (Self::Unknown(a), Self::Unknown(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
