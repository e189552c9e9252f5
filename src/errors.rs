use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type returned by every core service operation.
///
/// The variants mirror how callers are expected to react: validation and
/// not-found errors are presentable ("scan again"), conflicts describe a
/// physical-world constraint ("pallet is full"), and database errors are
/// infrastructure failures that were rolled back before surfacing.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse category exposed to the HTTP/UI collaborators so they can decide
/// how to render a failure without matching on message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Infrastructure,
}

impl ServiceError {
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, key))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) | ServiceError::InvalidStatus(_) => ErrorKind::Validation,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Database(_) | ServiceError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}
