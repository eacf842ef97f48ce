use lilac_common::TpError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The engine session is gone (or was never attached).
    #[error("call has already ended")]
    NoSession,
    #[error("media session already attached to {object_path}")]
    AlreadyAttached { object_path: String },
    #[error("no stream named {sid:?}")]
    UnknownStream { sid: String },
    #[error("{message}")]
    InvalidInput { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<Error> for TpError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput { message } => Self::InvalidArgument(message),
            other => Self::NotAvailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
