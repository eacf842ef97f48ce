use std::{fmt, num::NonZeroU32};

use serde::{Deserialize, Serialize};

/// Opaque identifier for a contact, list, group or room.
///
/// Handles are never zero; zero is reserved on the bus to mean "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Wrap a raw bus value. Returns `None` for zero.
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> Self {
        handle.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of entity a handle refers to. Values follow the Telepathy
/// `Handle_Type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum HandleType {
    None = 0,
    Contact = 1,
    Room = 2,
    List = 3,
    Group = 4,
}

impl HandleType {
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Contact),
            2 => Some(Self::Room),
            3 => Some(Self::List),
            4 => Some(Self::Group),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Connection status as reported on the bus (`Connection_Status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum ConnectionStatus {
    Connected = 0,
    Connecting = 1,
    Disconnected = 2,
}

impl ConnectionStatus {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Reason accompanying a status change (`Connection_Status_Reason`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum StatusReason {
    #[default]
    NoneSpecified = 0,
    Requested = 1,
    NetworkError = 2,
    AuthenticationFailed = 3,
    EncryptionError = 4,
    NameInUse = 5,
    CertNotProvided = 6,
    CertUntrusted = 7,
    CertExpired = 8,
    CertNotActivated = 9,
    CertHostnameMismatch = 10,
    CertFingerprintMismatch = 11,
    CertSelfSigned = 12,
    CertOtherError = 13,
}

impl StatusReason {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_handle() {
        assert!(Handle::new(0).is_none());
        assert_eq!(Handle::new(7).map(Handle::get), Some(7));
    }

    #[test]
    fn handle_type_round_trips_through_raw() {
        for raw in 0..=4 {
            let ty = HandleType::from_raw(raw);
            assert_eq!(ty.map(HandleType::as_u32), Some(raw));
        }
        assert!(HandleType::from_raw(5).is_none());
    }

    #[test]
    fn status_values_match_bus_numbering() {
        assert_eq!(ConnectionStatus::Connected.as_u32(), 0);
        assert_eq!(ConnectionStatus::Connecting.as_u32(), 1);
        assert_eq!(ConnectionStatus::Disconnected.as_u32(), 2);
        assert_eq!(StatusReason::Requested.as_u32(), 1);
        assert_eq!(StatusReason::NetworkError.as_u32(), 2);
    }
}
