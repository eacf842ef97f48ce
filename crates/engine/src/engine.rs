use std::{fmt, sync::Arc};

use crate::{
    AccountKey, EventSender, Result, SubscriptionId,
    types::{Buddy, EngineStatus, MediaCaps, ProtocolInfo, StatusPrimitive},
};

/// The multi-protocol IM engine.
pub trait Engine: Send + Sync {
    /// Every loaded protocol plugin.
    fn protocols(&self) -> Vec<ProtocolInfo>;

    fn find_protocol(&self, id: &str) -> Option<ProtocolInfo>;

    /// Create an account for `username` on protocol `protocol_id`.
    fn new_account(&self, username: &str, protocol_id: &str) -> Result<Arc<dyn Account>>;

    /// Forget an account and everything the engine stored for it.
    fn delete_account(&self, account: &AccountKey);

    /// Media capabilities this UI advertises to every contact.
    fn ui_media_caps(&self) -> MediaCaps;

    fn set_ui_media_caps(&self, caps: MediaCaps);

    fn subscribe(&self, sender: EventSender) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// One account inside the engine.
///
/// Calls never block: anything that involves the network completes later
/// and is reported as an [`crate::EngineEvent`].
pub trait Account: Send + Sync {
    fn key(&self) -> &AccountKey;

    fn set_password(&self, password: &str);

    /// Set a protocol option by preference name.
    fn set_string(&self, pref_name: &str, value: &str);

    fn set_enabled(&self, enabled: bool);

    fn connect(&self);

    fn disconnect(&self);

    /// Whether a disconnect is already in progress.
    fn is_disconnecting(&self) -> bool;

    /// Canonical form of a contact identifier for this protocol.
    fn normalize(&self, id: &str) -> String;

    fn buddies(&self) -> Vec<Buddy>;

    fn find_buddy(&self, name: &str) -> Option<Buddy>;

    fn active_status(&self) -> Option<EngineStatus>;

    /// Id of the first status type with the given primitive, if the
    /// protocol has one.
    fn status_type_id_with_primitive(&self, primitive: StatusPrimitive) -> Option<String>;

    /// Activate status `status_id` with `attrs` (e.g. `("message", text)`).
    fn set_status_list(&self, status_id: &str, active: bool, attrs: &[(String, String)]);

    /// Open an IM conversation with `peer`.
    fn new_conversation(&self, peer: &str) -> Result<Arc<dyn Conversation>>;

    /// Media capabilities the engine last discovered for `peer`.
    fn media_caps(&self, peer: &str) -> MediaCaps;
}

/// An open one-to-one conversation.
pub trait Conversation: Send + Sync {
    fn peer(&self) -> &str;

    fn send_im(&self, text: &str) -> Result<()>;

    /// Tear the conversation down. Idempotent.
    fn destroy(&self);
}

/// An engine media session (one call).
pub trait MediaSession: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// End the whole session.
    fn end(&self);
}
