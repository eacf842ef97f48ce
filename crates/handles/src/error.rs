use lilac_common::{HandleType, TpError};

/// Crate-wide result type for handle operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Handle zero, never allocated, or of the wrong type.
    #[error("invalid {handle_type:?} handle {handle}")]
    InvalidHandle { handle_type: HandleType, handle: u32 },

    /// Identifier has no handle in a static repository.
    #[error("no {handle_type:?} handle named {id:?}")]
    UnknownId { handle_type: HandleType, id: String },

    /// Identifier rejected by the normalizer.
    #[error("invalid identifier {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    /// Release of a handle that holds no references.
    #[error("handle {handle} is not held")]
    NotHeld { handle: u32 },

    /// This connection has no repository for the handle type.
    #[error("handle type {handle_type:?} is not supported")]
    NotSupported { handle_type: HandleType },
}

impl Error {
    #[must_use]
    pub fn invalid_id(id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidId {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<Error> for TpError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::InvalidHandle { .. } | Error::UnknownId { .. } | Error::InvalidId { .. } => {
                TpError::InvalidHandle(message)
            },
            Error::NotHeld { .. } => TpError::NotAvailable(message),
            Error::NotSupported { .. } => TpError::NotImplemented(message),
        }
    }
}
