use lilac_common::{FromMessage, TpError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// The operation needs a connected connection.
    #[error("connection is not connected")]
    NotConnected,

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("{message}")]
    NotImplemented { message: String },

    #[error("{message}")]
    NotAvailable { message: String },

    #[error(transparent)]
    Engine(#[from] lilac_engine::Error),

    #[error(transparent)]
    Handles(#[from] lilac_handles::Error),

    #[error(transparent)]
    Channels(#[from] lilac_channels::Error),

    #[error(transparent)]
    Media(#[from] lilac_media::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_available(message: impl Into<String>) -> Self {
        Self::NotAvailable {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

lilac_common::impl_context!();

impl From<Error> for TpError {
    fn from(err: Error) -> Self {
        match err {
            Error::Message(m) => Self::NotAvailable(m),
            Error::NotConnected => Self::Disconnected(err.to_string()),
            Error::InvalidInput { message } => Self::InvalidArgument(message),
            Error::NotImplemented { message } => Self::NotImplemented(message),
            Error::NotAvailable { message } => Self::NotAvailable(message),
            Error::Engine(e) => e.into(),
            Error::Handles(e) => e.into(),
            Error::Channels(e) => e.into(),
            Error::Media(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
