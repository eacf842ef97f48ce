use {
    lilac_common::{ConnectionStatus, StatusReason},
    lilac_engine::DisconnectReason,
};

/// Lifecycle phase of a connection.
///
/// `New` is reported to clients as disconnected. Phases only move forward;
/// `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    New,
    Connecting,
    Connected,
    Disconnected,
}

impl Phase {
    #[must_use]
    pub fn status(self) -> ConnectionStatus {
        match self {
            Self::New | Self::Disconnected => ConnectionStatus::Disconnected,
            Self::Connecting => ConnectionStatus::Connecting,
            Self::Connected => ConnectionStatus::Connected,
        }
    }

    /// Whether moving to `next` is allowed.
    #[must_use]
    pub fn can_move_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::New | Self::Connecting | Self::Connected, Self::Disconnected)
        )
    }
}

/// Map the engine's reason for dropping a connection to a status reason.
#[must_use]
pub fn status_reason(reason: DisconnectReason) -> StatusReason {
    match reason {
        DisconnectReason::NetworkError => StatusReason::NetworkError,
        DisconnectReason::InvalidUsername
        | DisconnectReason::AuthenticationFailed
        | DisconnectReason::AuthenticationImpossible => StatusReason::AuthenticationFailed,
        DisconnectReason::NoSslSupport | DisconnectReason::EncryptionError => {
            StatusReason::EncryptionError
        },
        DisconnectReason::NameInUse => StatusReason::NameInUse,
        DisconnectReason::CertNotProvided => StatusReason::CertNotProvided,
        DisconnectReason::CertUntrusted => StatusReason::CertUntrusted,
        DisconnectReason::CertExpired => StatusReason::CertExpired,
        DisconnectReason::CertNotActivated => StatusReason::CertNotActivated,
        DisconnectReason::CertHostnameMismatch => StatusReason::CertHostnameMismatch,
        DisconnectReason::CertFingerprintMismatch => StatusReason::CertFingerprintMismatch,
        DisconnectReason::CertSelfSigned => StatusReason::CertSelfSigned,
        DisconnectReason::CertOtherError => StatusReason::CertOtherError,
        DisconnectReason::InvalidSettings | DisconnectReason::OtherError => {
            StatusReason::NoneSpecified
        },
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(Phase::New, Phase::Connecting, true)]
    #[case(Phase::Connecting, Phase::Connected, true)]
    #[case(Phase::Connected, Phase::Disconnected, true)]
    #[case(Phase::New, Phase::Disconnected, true)]
    #[case(Phase::Connected, Phase::Connecting, false)]
    #[case(Phase::Disconnected, Phase::Connecting, false)]
    #[case(Phase::Disconnected, Phase::Disconnected, false)]
    #[case(Phase::New, Phase::Connected, false)]
    fn transitions(#[case] from: Phase, #[case] to: Phase, #[case] allowed: bool) {
        assert_eq!(from.can_move_to(to), allowed);
    }

    #[test]
    fn new_reports_disconnected() {
        assert_eq!(Phase::New.status(), ConnectionStatus::Disconnected);
    }

    #[rstest]
    #[case(DisconnectReason::NetworkError, StatusReason::NetworkError)]
    #[case(DisconnectReason::AuthenticationFailed, StatusReason::AuthenticationFailed)]
    #[case(DisconnectReason::NoSslSupport, StatusReason::EncryptionError)]
    #[case(DisconnectReason::CertSelfSigned, StatusReason::CertSelfSigned)]
    #[case(DisconnectReason::OtherError, StatusReason::NoneSpecified)]
    fn engine_reasons(#[case] reason: DisconnectReason, #[case] expected: StatusReason) {
        assert_eq!(status_reason(reason), expected);
    }
}
