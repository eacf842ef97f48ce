//! In-process engine.
//!
//! Accounts never touch the network: `connect` signs on immediately,
//! `disconnect` signs off, and every call is recorded so tests and the
//! `lilac protocols` command can inspect what the connection manager asked
//! for. Rosters, per-contact media caps and status types are seeded with
//! builder methods before accounts are created.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, info};

use crate::{
    Account, AccountKey, Conversation, Engine, EngineEvent, Error, EventSender, MediaSession,
    Result, Subscribers, SubscriptionId,
    types::{AccountOption, Buddy, EngineStatus, MediaCaps, ProtocolInfo, StatusPrimitive},
};

fn builtin_protocols() -> Vec<ProtocolInfo> {
    vec![
        ProtocolInfo {
            id: "loopback".into(),
            name: "Loopback".into(),
            options: vec![AccountOption::string("server", "Server", "localhost")],
        },
        ProtocolInfo {
            id: "xmpp".into(),
            name: "XMPP".into(),
            options: vec![
                AccountOption::string("resource", "Resource", ""),
                AccountOption::int("port", "Connect port", 5222),
                AccountOption::string("connect_server", "Connect server", ""),
            ],
        },
        ProtocolInfo {
            id: "oscar".into(),
            name: "AIM/ICQ".into(),
            options: vec![
                AccountOption::string("server", "Server", "login.oscar.aol.com"),
                AccountOption::int("port", "Port", 5190),
            ],
        },
        ProtocolInfo {
            id: "bare".into(),
            name: "Bare".into(),
            options: Vec::new(),
        },
    ]
}

fn default_status_types() -> Vec<(String, StatusPrimitive)> {
    [
        ("available", StatusPrimitive::Available),
        ("unavailable", StatusPrimitive::Unavailable),
        ("away", StatusPrimitive::Away),
        ("extended_away", StatusPrimitive::ExtendedAway),
        ("invisible", StatusPrimitive::Invisible),
        ("offline", StatusPrimitive::Offline),
    ]
    .into_iter()
    .map(|(id, p)| (id.to_string(), p))
    .collect()
}

#[derive(Clone, Default)]
struct Seed {
    buddies: Vec<Buddy>,
    caps: HashMap<String, MediaCaps>,
    status_types: Option<Vec<(String, StatusPrimitive)>>,
    echo: bool,
}

/// Engine that keeps everything in memory.
pub struct LoopbackEngine {
    protocols: Vec<ProtocolInfo>,
    subscribers: Arc<Subscribers>,
    ui_caps: Mutex<MediaCaps>,
    seed: Seed,
    accounts: Mutex<HashMap<AccountKey, Arc<LoopbackAccount>>>,
    deleted: Mutex<Vec<AccountKey>>,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self {
            protocols: builtin_protocols(),
            subscribers: Arc::new(Subscribers::new()),
            ui_caps: Mutex::new(MediaCaps::empty()),
            seed: Seed::default(),
            accounts: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Add `buddy` to the roster of every account created afterwards.
    #[must_use]
    pub fn with_buddy(mut self, buddy: Buddy) -> Self {
        self.seed.buddies.push(buddy);
        self
    }

    /// Media caps reported for `peer` by accounts created afterwards.
    #[must_use]
    pub fn with_contact_caps(mut self, peer: &str, caps: MediaCaps) -> Self {
        self.seed.caps.insert(peer.to_string(), caps);
        self
    }

    /// Replace the status types accounts expose.
    #[must_use]
    pub fn with_status_types(mut self, types: &[(&str, StatusPrimitive)]) -> Self {
        self.seed.status_types = Some(
            types
                .iter()
                .map(|(id, p)| ((*id).to_string(), *p))
                .collect(),
        );
        self
    }

    /// Reflect every sent IM back as an incoming one.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.seed.echo = echo;
        self
    }

    /// The account registered under `key`, if it has not been deleted.
    pub fn account(&self, key: &AccountKey) -> Option<Arc<LoopbackAccount>> {
        self.accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Accounts removed with [`Engine::delete_account`], oldest first.
    pub fn deleted_accounts(&self) -> Vec<AccountKey> {
        self.deleted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Publish an arbitrary event, as if it came from a protocol plugin.
    pub fn emit(&self, event: EngineEvent) {
        self.subscribers.publish(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Tear down a conversation from the remote side.
    pub fn close_conversation_remotely(&self, key: &AccountKey, peer: &str) {
        if let Some(account) = self.account(key) {
            account.shared.forget_conversation(peer);
        }
        self.emit(EngineEvent::ConversationDestroyed {
            account: key.clone(),
            peer: peer.to_string(),
        });
    }

    /// Start an incoming call from `peer`.
    pub fn start_media(&self, key: &AccountKey, peer: &str, media_id: &str) -> Arc<LoopbackMedia> {
        let media = Arc::new(LoopbackMedia {
            id: media_id.to_string(),
            ended: AtomicBool::new(false),
        });
        self.emit(EngineEvent::MediaCreated {
            account: key.clone(),
            peer: peer.to_string(),
            media: Arc::clone(&media) as Arc<dyn MediaSession>,
        });
        media
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for LoopbackEngine {
    fn protocols(&self) -> Vec<ProtocolInfo> {
        self.protocols.clone()
    }

    fn find_protocol(&self, id: &str) -> Option<ProtocolInfo> {
        self.protocols.iter().find(|p| p.id == id).cloned()
    }

    fn new_account(&self, username: &str, protocol_id: &str) -> Result<Arc<dyn Account>> {
        if self.find_protocol(protocol_id).is_none() {
            return Err(Error::UnknownProtocol(protocol_id.to_string()));
        }
        let key = AccountKey::new(protocol_id, username);
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let account = accounts
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(account = %key, "creating loopback account");
                Arc::new(LoopbackAccount::new(
                    key.clone(),
                    self.seed.clone(),
                    Arc::clone(&self.subscribers),
                ))
            })
            .clone();
        Ok(account)
    }

    fn delete_account(&self, account: &AccountKey) {
        let removed = self
            .accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(account);
        if removed.is_some() {
            info!(account = %account, "deleted loopback account");
            self.deleted
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(account.clone());
        }
    }

    fn ui_media_caps(&self) -> MediaCaps {
        *self.ui_caps.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_ui_media_caps(&self, caps: MediaCaps) {
        *self.ui_caps.lock().unwrap_or_else(|e| e.into_inner()) = caps;
    }

    fn subscribe(&self, sender: EventSender) -> SubscriptionId {
        self.subscribers.subscribe(sender)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }
}

/// A status list activation, as recorded by [`LoopbackAccount`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub id: String,
    pub active: bool,
    pub attrs: Vec<(String, String)>,
}

#[derive(Default)]
struct Record {
    password: Option<String>,
    strings: BTreeMap<String, String>,
    enabled: bool,
    connects: u32,
    signed_on: bool,
    disconnecting: bool,
    sent: Vec<(String, String)>,
    status_changes: Vec<StatusChange>,
    active_status: Option<EngineStatus>,
    conversations: HashMap<String, Arc<LoopbackConversation>>,
}

struct Shared {
    key: AccountKey,
    echo: bool,
    subscribers: Arc<Subscribers>,
    record: Mutex<Record>,
}

impl Shared {
    fn record(&self) -> std::sync::MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn forget_conversation(&self, peer: &str) {
        if let Some(conv) = self.record().conversations.remove(peer) {
            conv.destroyed.store(true, Ordering::SeqCst);
        }
    }
}

/// An account of [`LoopbackEngine`].
pub struct LoopbackAccount {
    shared: Arc<Shared>,
    buddies: Vec<Buddy>,
    caps: Mutex<HashMap<String, MediaCaps>>,
    status_types: Vec<(String, StatusPrimitive)>,
}

impl LoopbackAccount {
    fn new(key: AccountKey, seed: Seed, subscribers: Arc<Subscribers>) -> Self {
        Self {
            shared: Arc::new(Shared {
                key,
                echo: seed.echo,
                subscribers,
                record: Mutex::new(Record::default()),
            }),
            buddies: seed.buddies,
            caps: Mutex::new(seed.caps),
            status_types: seed.status_types.unwrap_or_else(default_status_types),
        }
    }

    pub fn password(&self) -> Option<String> {
        self.shared.record().password.clone()
    }

    pub fn string(&self, pref_name: &str) -> Option<String> {
        self.shared.record().strings.get(pref_name).cloned()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.record().enabled
    }

    /// How many times `connect` was called.
    pub fn connect_count(&self) -> u32 {
        self.shared.record().connects
    }

    /// Every `(peer, text)` sent through a conversation.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.shared.record().sent.clone()
    }

    pub fn status_changes(&self) -> Vec<StatusChange> {
        self.shared.record().status_changes.clone()
    }

    pub fn has_conversation(&self, peer: &str) -> bool {
        self.shared.record().conversations.contains_key(peer)
    }

    /// Change what the engine reports for `peer`, as if discovery completed.
    pub fn set_contact_caps(&self, peer: &str, caps: MediaCaps) {
        self.caps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(peer.to_string(), caps);
    }

    fn publish(&self, event: EngineEvent) {
        self.shared.subscribers.publish(event);
    }
}

impl Account for LoopbackAccount {
    fn key(&self) -> &AccountKey {
        &self.shared.key
    }

    fn set_password(&self, password: &str) {
        self.shared.record().password = Some(password.to_string());
    }

    fn set_string(&self, pref_name: &str, value: &str) {
        self.shared
            .record()
            .strings
            .insert(pref_name.to_string(), value.to_string());
    }

    fn set_enabled(&self, enabled: bool) {
        self.shared.record().enabled = enabled;
    }

    fn connect(&self) {
        {
            let mut record = self.shared.record();
            record.connects += 1;
            if record.signed_on {
                return;
            }
            record.signed_on = true;
            record.disconnecting = false;
            if record.active_status.is_none() {
                record.active_status =
                    Some(EngineStatus::new("available", StatusPrimitive::Available));
            }
        }
        self.publish(EngineEvent::SignedOn {
            account: self.shared.key.clone(),
        });
    }

    fn disconnect(&self) {
        {
            let mut record = self.shared.record();
            if record.disconnecting {
                return;
            }
            record.disconnecting = true;
            record.signed_on = false;
        }
        let account = self.shared.key.clone();
        self.publish(EngineEvent::SigningOff {
            account: account.clone(),
        });
        self.publish(EngineEvent::SignedOff { account });
    }

    fn is_disconnecting(&self) -> bool {
        self.shared.record().disconnecting
    }

    fn normalize(&self, id: &str) -> String {
        match self.shared.key.protocol.as_str() {
            "xmpp" => id
                .split('/')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase(),
            "oscar" => id.replace(' ', "").to_lowercase(),
            _ => id.to_string(),
        }
    }

    fn buddies(&self) -> Vec<Buddy> {
        self.buddies.clone()
    }

    fn find_buddy(&self, name: &str) -> Option<Buddy> {
        self.buddies.iter().find(|b| b.name == name).cloned()
    }

    fn active_status(&self) -> Option<EngineStatus> {
        self.shared.record().active_status.clone()
    }

    fn status_type_id_with_primitive(&self, primitive: StatusPrimitive) -> Option<String> {
        self.status_types
            .iter()
            .find(|(_, p)| *p == primitive)
            .map(|(id, _)| id.clone())
    }

    fn set_status_list(&self, status_id: &str, active: bool, attrs: &[(String, String)]) {
        let primitive = self
            .status_types
            .iter()
            .find(|(id, _)| id == status_id)
            .map(|(_, p)| *p);
        let message = attrs
            .iter()
            .find(|(k, _)| k == "message")
            .map(|(_, v)| v.clone());

        let status = {
            let mut record = self.shared.record();
            record.status_changes.push(StatusChange {
                id: status_id.to_string(),
                active,
                attrs: attrs.to_vec(),
            });
            let Some(primitive) = primitive.filter(|_| active) else {
                debug!(account = %self.shared.key, status_id, "ignoring unknown or inactive status");
                return;
            };
            let status = EngineStatus {
                id: status_id.to_string(),
                primitive: primitive.as_u32(),
                message,
            };
            record.active_status = Some(status.clone());
            if !record.signed_on {
                return;
            }
            status
        };
        self.publish(EngineEvent::AccountStatusChanged {
            account: self.shared.key.clone(),
            status: Some(status),
        });
    }

    fn new_conversation(&self, peer: &str) -> Result<Arc<dyn Conversation>> {
        let mut record = self.shared.record();
        if !record.signed_on {
            return Err(Error::NotConnected(self.shared.key.to_string()));
        }
        let conv = record
            .conversations
            .entry(peer.to_string())
            .or_insert_with(|| {
                Arc::new(LoopbackConversation {
                    peer: peer.to_string(),
                    shared: Arc::clone(&self.shared),
                    destroyed: AtomicBool::new(false),
                })
            })
            .clone();
        Ok(conv)
    }

    fn media_caps(&self, peer: &str) -> MediaCaps {
        self.caps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(peer)
            .copied()
            .unwrap_or_default()
    }
}

/// A conversation of [`LoopbackAccount`].
pub struct LoopbackConversation {
    peer: String,
    shared: Arc<Shared>,
    destroyed: AtomicBool,
}

impl LoopbackConversation {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Conversation for LoopbackConversation {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn send_im(&self, text: &str) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::ConversationGone {
                peer: self.peer.clone(),
            });
        }
        self.shared
            .record()
            .sent
            .push((self.peer.clone(), text.to_string()));
        if self.shared.echo {
            self.shared.subscribers.publish(EngineEvent::ReceivedIm {
                account: self.shared.key.clone(),
                from: self.peer.clone(),
                text: text.to_string(),
                auto_reply: false,
                timestamp: 0,
            });
        }
        Ok(())
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.shared.record().conversations.remove(&self.peer);
        }
    }
}

/// A call started with [`LoopbackEngine::start_media`].
#[derive(Debug)]
pub struct LoopbackMedia {
    id: String,
    ended: AtomicBool,
}

impl LoopbackMedia {
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl MediaSession for LoopbackMedia {
    fn id(&self) -> &str {
        &self.id
    }

    fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, tokio::sync::mpsc};

    #[test]
    fn unknown_protocol_is_rejected() {
        let engine = LoopbackEngine::new();
        assert!(matches!(
            engine.new_account("me", "nope"),
            Err(Error::UnknownProtocol(p)) if p == "nope"
        ));
    }

    #[test]
    fn new_account_reuses_existing() {
        let engine = LoopbackEngine::new();
        let a = engine.new_account("me", "loopback").unwrap();
        a.set_password("hunter2");
        let b = engine.new_account("me", "loopback").unwrap();
        assert_eq!(a.key(), b.key());
        let rec = engine.account(a.key()).unwrap();
        assert_eq!(rec.password().as_deref(), Some("hunter2"));
    }

    #[test]
    fn connect_and_disconnect_publish_events() {
        let engine = LoopbackEngine::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.subscribe(tx);
        let account = engine.new_account("me", "loopback").unwrap();

        account.connect();
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::SignedOn { .. })));

        account.disconnect();
        account.disconnect();
        assert!(account.is_disconnecting());
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::SigningOff { .. })));
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::SignedOff { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn echo_reflects_sent_messages() {
        let engine = LoopbackEngine::new().with_echo(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.subscribe(tx);
        let account = engine.new_account("me", "loopback").unwrap();
        account.connect();
        let _ = rx.try_recv();

        let conv = account.new_conversation("bob").unwrap();
        conv.send_im("hi").unwrap();
        match rx.try_recv().unwrap() {
            EngineEvent::ReceivedIm { from, text, .. } => {
                assert_eq!(from, "bob");
                assert_eq!(text, "hi");
            },
            other => panic!("unexpected event: {other:?}"),
        }
        let rec = engine.account(account.key()).unwrap();
        assert_eq!(rec.sent_messages(), vec![("bob".into(), "hi".into())]);
    }

    #[test]
    fn conversation_requires_sign_on() {
        let engine = LoopbackEngine::new();
        let account = engine.new_account("me", "loopback").unwrap();
        assert!(matches!(
            account.new_conversation("bob"),
            Err(Error::NotConnected(_))
        ));
    }

    #[test]
    fn destroyed_conversation_refuses_to_send() {
        let engine = LoopbackEngine::new();
        let account = engine.new_account("me", "loopback").unwrap();
        account.connect();
        let conv = account.new_conversation("bob").unwrap();
        conv.destroy();
        conv.destroy();
        assert!(matches!(
            conv.send_im("late"),
            Err(Error::ConversationGone { .. })
        ));
    }

    #[test]
    fn set_status_list_updates_active_status() {
        let engine = LoopbackEngine::new();
        let account = engine.new_account("me", "loopback").unwrap();
        account.connect();
        account.set_status_list("away", true, &[("message".into(), "lunch".into())]);
        let status = account.active_status().unwrap();
        assert_eq!(status.id, "away");
        assert_eq!(status.primitive, StatusPrimitive::Away.as_u32());
        assert_eq!(status.message.as_deref(), Some("lunch"));
    }

    #[rstest]
    #[case("xmpp", "Bob@Example.com/Laptop", "bob@example.com")]
    #[case("oscar", "Some Body", "somebody")]
    #[case("loopback", "Bob", "Bob")]
    fn normalization_follows_protocol(
        #[case] protocol: &str,
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        let engine = LoopbackEngine::new();
        let account = engine.new_account("me", protocol).unwrap();
        assert_eq!(account.normalize(input), expected);
    }

    #[test]
    fn delete_is_recorded() {
        let engine = LoopbackEngine::new();
        let account = engine.new_account("me", "bare").unwrap();
        let key = account.key().clone();
        engine.delete_account(&key);
        engine.delete_account(&key);
        assert!(engine.account(&key).is_none());
        assert_eq!(engine.deleted_accounts(), vec![key]);
    }
}
