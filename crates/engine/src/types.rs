use std::collections::BTreeMap;

use {
    bitflags::bitflags,
    serde::{Deserialize, Serialize},
};

/// Engine-side status kinds. Values follow the engine's own numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum StatusPrimitive {
    Unset = 0,
    Offline = 1,
    Available = 2,
    Unavailable = 3,
    Invisible = 4,
    Away = 5,
    ExtendedAway = 6,
    Mobile = 7,
    Tune = 8,
}

impl StatusPrimitive {
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Unset,
            1 => Self::Offline,
            2 => Self::Available,
            3 => Self::Unavailable,
            4 => Self::Invisible,
            5 => Self::Away,
            6 => Self::ExtendedAway,
            7 => Self::Mobile,
            8 => Self::Tune,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// An active status as reported by the engine.
///
/// `primitive` is kept raw: engines are free to report values this crate
/// does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub id: String,
    pub primitive: u32,
    /// Status message, possibly containing markup.
    pub message: Option<String>,
}

impl EngineStatus {
    pub fn new(id: impl Into<String>, primitive: StatusPrimitive) -> Self {
        Self {
            id: id.into(),
            primitive: primitive.as_u32(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Default value (and so type) of a protocol option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "default")]
pub enum OptionValue {
    String(String),
    Int(i32),
    Bool(bool),
}

/// One account option a protocol exposes (server, port, resource, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOption {
    pub pref_name: String,
    pub label: String,
    pub default: OptionValue,
}

impl AccountOption {
    pub fn string(pref_name: &str, label: &str, default: &str) -> Self {
        Self {
            pref_name: pref_name.into(),
            label: label.into(),
            default: OptionValue::String(default.into()),
        }
    }

    pub fn int(pref_name: &str, label: &str, default: i32) -> Self {
        Self {
            pref_name: pref_name.into(),
            label: label.into(),
            default: OptionValue::Int(default),
        }
    }
}

/// A loaded protocol plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolInfo {
    /// Short id used on the bus (`xmpp`, `oscar`, ...).
    pub id: String,
    pub name: String,
    /// Options in the order the plugin declares them.
    pub options: Vec<AccountOption>,
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buddy {
    pub name: String,
    pub alias: Option<String>,
    pub status: Option<EngineStatus>,
}

impl Buddy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: EngineStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Why the engine is dropping a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    NetworkError,
    InvalidUsername,
    AuthenticationFailed,
    AuthenticationImpossible,
    NoSslSupport,
    EncryptionError,
    NameInUse,
    InvalidSettings,
    CertNotProvided,
    CertUntrusted,
    CertExpired,
    CertNotActivated,
    CertHostnameMismatch,
    CertFingerprintMismatch,
    CertSelfSigned,
    CertOtherError,
    OtherError,
}

bitflags! {
    /// Media capabilities as the engine expresses them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MediaCaps: u32 {
        const AUDIO = 1 << 0;
        const AUDIO_SINGLE_DIRECTION = 1 << 1;
        const VIDEO = 1 << 2;
        const VIDEO_SINGLE_DIRECTION = 1 << 3;
        const AUDIO_VIDEO = 1 << 4;
        const MODIFY_SESSION = 1 << 5;
        const CHANGE_DIRECTION = 1 << 6;
    }
}

/// Media session lifecycle states reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaState {
    New,
    Connected,
    End,
}

/// Stream media type, numbered as Telepathy's `Media_Stream_Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MediaType {
    Audio = 0,
    Video = 1,
}

impl MediaType {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// A codec offered or accepted for a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    pub id: u32,
    pub encoding_name: String,
    pub media_type: MediaType,
    pub clock_rate: u32,
    pub channels: u32,
    pub params: BTreeMap<String, String>,
}

/// A transport candidate for a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub foundation: String,
    pub component: u32,
    pub ip: String,
    pub port: u16,
    pub protocol: String,
    pub priority: u32,
    pub username: Option<String>,
    pub password: Option<String>,
}
