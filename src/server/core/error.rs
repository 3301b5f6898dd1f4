use derive_more::{Display, Error};

pub(crate) type CoreResult<T> = Result<T, CoreError>;

/// Error kinds surfaced by the core. The HTTP layer maps each kind onto a
/// response category; the kinds themselves stay protocol-agnostic.
#[derive(Debug, Display, Error)]
pub(crate) enum CoreError {
    /// malformed or missing input, rejected before anything is written
    #[display("{reason}")]
    Validation { reason: String },
    /// table already held by another order, or an illegal status transition
    #[display("{reason}")]
    Conflict { reason: String },
    #[display("{what} not found")]
    NotFound { what: String },
    /// auto-assignment requested but every table is occupied
    #[display("no free table available")]
    NoCapacity,
    #[display("database error: {source}")]
    Storage { source: tokio_postgres::Error },
    #[display("unknown error")]
    Unknown,
}

impl CoreError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

impl From<tokio_postgres::Error> for CoreError {
    fn from(source: tokio_postgres::Error) -> Self {
        Self::Storage { source }
    }
}
