use lilac_common::TpError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors shared across channel factories.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("{message}")]
    InvalidInput { message: String },

    /// Operation is currently unavailable (not connected, no such channel).
    #[error("channel operation unavailable: {message}")]
    Unavailable { message: String },

    /// A channel already exists for this (type, handle) pair.
    #[error("a {channel_type} channel already exists for handle {handle}")]
    DuplicateChannel {
        channel_type: &'static str,
        handle: u32,
    },

    #[error(transparent)]
    Handles(#[from] lilac_handles::Error),

    #[error(transparent)]
    Engine(#[from] lilac_engine::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }
}

impl From<Error> for TpError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput { message } => Self::InvalidArgument(message),
            Error::Unavailable { .. } | Error::DuplicateChannel { .. } => {
                Self::NotAvailable(err.to_string())
            },
            Error::Handles(e) => e.into(),
            Error::Engine(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_keeps_message_verbatim() {
        let tp: TpError = Error::invalid_input("invalid message type: 7").into();
        assert!(matches!(tp, TpError::InvalidArgument(ref m) if m == "invalid message type: 7"));
    }

    #[test]
    fn duplicate_maps_to_not_available() {
        let tp: TpError = Error::DuplicateChannel {
            channel_type: "ContactList",
            handle: 1,
        }
        .into();
        assert_eq!(tp.name(), "NotAvailable");
    }
}
