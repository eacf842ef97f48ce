use lilac_common::TpError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No protocol plugin with this id is loaded.
    #[error("protocol {0:?} not found")]
    UnknownProtocol(String),

    /// The conversation was already destroyed.
    #[error("conversation with {peer} has ended")]
    ConversationGone { peer: String },

    /// The account is not signed on.
    #[error("account {0} is not connected")]
    NotConnected(String),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<Error> for TpError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::UnknownProtocol(_) => TpError::NotImplemented(message),
            Error::ConversationGone { .. } => TpError::NotAvailable(message),
            Error::NotConnected(_) => TpError::Disconnected(message),
            Error::Message(_) => TpError::NetworkError(message),
        }
    }
}
