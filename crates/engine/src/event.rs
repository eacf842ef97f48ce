use std::{fmt, sync::Arc};

use crate::{
    MediaSession,
    types::{Candidate, Codec, DisconnectReason, EngineStatus, MediaState, MediaType},
};

/// Identifies one engine account: protocol id plus username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountKey {
    pub protocol: String,
    pub username: String,
}

impl AccountKey {
    pub fn new(protocol: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            username: username.into(),
        }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.protocol, self.username)
    }
}

/// Asynchronous callbacks from the engine.
///
/// Every event names the account it concerns; subscribers ignore events for
/// accounts they do not own.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The account finished signing on.
    SignedOn { account: AccountKey },
    /// The account is about to sign off.
    SigningOff { account: AccountKey },
    /// The account has fully signed off.
    SignedOff { account: AccountKey },
    /// The engine is about to drop the connection for `reason`.
    ConnectionError {
        account: AccountKey,
        reason: DisconnectReason,
        description: String,
    },
    /// Our own active status changed.
    AccountStatusChanged {
        account: AccountKey,
        status: Option<EngineStatus>,
    },
    /// A roster contact's active status changed.
    BuddyStatusChanged {
        account: AccountKey,
        buddy: String,
        status: Option<EngineStatus>,
    },
    BuddySignedOn { account: AccountKey, buddy: String },
    BuddySignedOff { account: AccountKey, buddy: String },
    /// A raw presence stanza arrived from `from`. Capability discovery may
    /// complete some time after this.
    PresenceStanza { account: AccountKey, from: String },
    /// An instant message arrived.
    ReceivedIm {
        account: AccountKey,
        from: String,
        text: String,
        auto_reply: bool,
        timestamp: u64,
    },
    /// The engine destroyed the conversation with `peer`.
    ConversationDestroyed { account: AccountKey, peer: String },
    /// The engine created a media session with `peer`.
    MediaCreated {
        account: AccountKey,
        peer: String,
        media: Arc<dyn MediaSession>,
    },
    /// A stream was added to a media session.
    MediaStreamAdded {
        account: AccountKey,
        media_id: String,
        sid: String,
        who: String,
        media_type: MediaType,
    },
    /// A media session, stream, or participant changed state.
    MediaStateChanged {
        account: AccountKey,
        media_id: String,
        state: MediaState,
        sid: Option<String>,
        name: Option<String>,
    },
    /// The remote side offered transport candidates for stream `sid`.
    MediaCandidates {
        account: AccountKey,
        media_id: String,
        sid: String,
        who: String,
        candidates: Vec<Candidate>,
    },
    /// The remote side offered codecs for stream `sid`.
    MediaCodecs {
        account: AccountKey,
        media_id: String,
        sid: String,
        who: String,
        codecs: Vec<Codec>,
    },
}

impl EngineEvent {
    /// The account this event concerns.
    pub fn account(&self) -> &AccountKey {
        match self {
            Self::SignedOn { account }
            | Self::SigningOff { account }
            | Self::SignedOff { account }
            | Self::ConnectionError { account, .. }
            | Self::AccountStatusChanged { account, .. }
            | Self::BuddyStatusChanged { account, .. }
            | Self::BuddySignedOn { account, .. }
            | Self::BuddySignedOff { account, .. }
            | Self::PresenceStanza { account, .. }
            | Self::ReceivedIm { account, .. }
            | Self::ConversationDestroyed { account, .. }
            | Self::MediaCreated { account, .. }
            | Self::MediaStreamAdded { account, .. }
            | Self::MediaStateChanged { account, .. }
            | Self::MediaCandidates { account, .. }
            | Self::MediaCodecs { account, .. } => account,
        }
    }
}
