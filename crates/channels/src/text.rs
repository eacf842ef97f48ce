use serde::Serialize;

/// `Channel_Text_Message_Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MessageType {
    Normal = 0,
    Action = 1,
    Notice = 2,
    AutoReply = 3,
}

impl MessageType {
    pub const ALL: [Self; 4] = [Self::Normal, Self::Action, Self::Notice, Self::AutoReply];

    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_u32() == raw)
    }

    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// An incoming message waiting to be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMessage {
    pub id: u32,
    pub timestamp: u64,
    pub sender: u32,
    pub message_type: MessageType,
    pub flags: u32,
    pub text: String,
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Split an engine message into its Telepathy type and body.
///
/// IRC-style `/me ` prefixes become actions.
pub(crate) fn classify_incoming(text: &str, auto_reply: bool) -> (MessageType, String) {
    if auto_reply {
        return (MessageType::AutoReply, text.to_string());
    }
    match text.strip_prefix("/me ") {
        Some(rest) => (MessageType::Action, rest.to_string()),
        None => (MessageType::Normal, text.to_string()),
    }
}
