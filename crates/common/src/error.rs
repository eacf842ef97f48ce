use thiserror::Error;

// ── Telepathy error taxonomy ────────────────────────────────────────────────

/// Errors as seen by a Telepathy client.
///
/// Every crate-local error converts into one of these before it crosses the
/// bus. The variant decides the D-Bus error name; the payload is the
/// human-readable message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TpError {
    /// Raised when one of the provided arguments is invalid.
    #[error("{0}")]
    InvalidArgument(String),

    /// Raised when the requested functionality is temporarily unavailable.
    #[error("{0}")]
    NotAvailable(String),

    /// Raised when the requested method, channel, etc is not available on
    /// this connection.
    #[error("{0}")]
    NotImplemented(String),

    /// The connection is not currently connected and cannot be used.
    #[error("{0}")]
    Disconnected(String),

    /// The handle specified is unknown on this channel or connection.
    #[error("{0}")]
    InvalidHandle(String),

    /// Raised when there is an error reading from or writing to the network.
    #[error("{0}")]
    NetworkError(String),

    /// The contact is not capable of the requested operation.
    #[error("{0}")]
    NotCapable(String),
}

impl TpError {
    /// The short error name, appended to `org.freedesktop.Telepathy.Error.`
    /// on the bus.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::NotAvailable(_) => "NotAvailable",
            Self::NotImplemented(_) => "NotImplemented",
            Self::Disconnected(_) => "Disconnected",
            Self::InvalidHandle(_) => "InvalidHandle",
            Self::NetworkError(_) => "NetworkError",
            Self::NotCapable(_) => "NotCapable",
        }
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub fn not_available(message: impl Into<String>) -> Self {
        Self::NotAvailable(message.into())
    }

    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }
}

// ── Shared context trait ────────────────────────────────────────────────────

/// Trait for error types that can be constructed from a plain message string.
///
/// Implement this for your crate's error type, then invoke [`impl_context!`]
/// in your error module to get `.context()` and `.with_context()` on `Result`
/// and `Option`.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait with `.context()` and `.with_context()`
/// methods on `Result` and `Option`.
///
/// Invoke inside a module that defines `Error: FromMessage` and
/// `type Result<T> = std::result::Result<T, Error>`.
///
/// ```ignore
/// // in crates/foo/src/error.rs
/// lilac_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let ctx = context.into();
                self.map_err(|source| {
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let ctx = f().into();
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(context.into()))
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tp_error_names() {
        assert_eq!(TpError::invalid_argument("x").name(), "InvalidArgument");
        assert_eq!(TpError::not_available("x").name(), "NotAvailable");
        assert_eq!(TpError::not_implemented("x").name(), "NotImplemented");
        assert_eq!(TpError::Disconnected("x".into()).name(), "Disconnected");
    }

    #[test]
    fn tp_error_displays_message_only() {
        let err = TpError::invalid_argument("invalid message type: 7");
        assert_eq!(err.to_string(), "invalid message type: 7");
    }
}
