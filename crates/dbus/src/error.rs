use {lilac_common::TpError, zbus::DBusError};

/// Errors as they leave a method call, named
/// `org.freedesktop.Telepathy.Error.<Variant>`.
#[derive(Debug, DBusError)]
#[zbus(prefix = "org.freedesktop.Telepathy.Error")]
pub enum TpDbusError {
    #[zbus(error)]
    ZBus(zbus::Error),
    InvalidArgument(String),
    NotAvailable(String),
    NotImplemented(String),
    Disconnected(String),
    InvalidHandle(String),
    NetworkError(String),
    NotCapable(String),
}

pub type Result<T, E = TpDbusError> = std::result::Result<T, E>;

impl From<TpError> for TpDbusError {
    fn from(err: TpError) -> Self {
        match err {
            TpError::InvalidArgument(m) => Self::InvalidArgument(m),
            TpError::NotAvailable(m) => Self::NotAvailable(m),
            TpError::NotImplemented(m) => Self::NotImplemented(m),
            TpError::Disconnected(m) => Self::Disconnected(m),
            TpError::InvalidHandle(m) => Self::InvalidHandle(m),
            TpError::NetworkError(m) => Self::NetworkError(m),
            TpError::NotCapable(m) => Self::NotCapable(m),
        }
    }
}

impl From<lilac_connection::Error> for TpDbusError {
    fn from(err: lilac_connection::Error) -> Self {
        TpError::from(err).into()
    }
}

impl From<zbus::zvariant::Error> for TpDbusError {
    fn from(err: zbus::zvariant::Error) -> Self {
        Self::ZBus(err.into())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(lilac_connection::Error::NotConnected, "Disconnected")]
    #[case(lilac_connection::Error::invalid_input("bad"), "InvalidArgument")]
    #[case(lilac_connection::Error::not_implemented("no"), "NotImplemented")]
    #[case(lilac_connection::Error::not_available("gone"), "NotAvailable")]
    fn connection_errors_keep_their_names(
        #[case] err: lilac_connection::Error,
        #[case] name: &str,
    ) {
        let err = TpDbusError::from(err);
        assert_eq!(
            DBusError::name(&err).to_string(),
            format!("org.freedesktop.Telepathy.Error.{name}")
        );
    }

    #[test]
    fn message_survives() {
        let err = TpDbusError::from(TpError::invalid_argument("invalid message type: 9"));
        assert_eq!(DBusError::description(&err), Some("invalid message type: 9"));
    }
}
