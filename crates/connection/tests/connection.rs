#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Connection behaviour driven synchronously against the loopback engine.

use std::sync::Arc;

use {
    lilac_channels::ChannelEvent,
    lilac_common::{
        ConnectionStatus, HandleType, StatusReason, TpError,
        names::{
            IFACE_CHANNEL_TYPE_CONTACT_LIST, IFACE_CHANNEL_TYPE_STREAMED_MEDIA,
            IFACE_CHANNEL_TYPE_TEXT,
        },
    },
    lilac_connection::{
        Connection, ConnectionEvent, ConnectionOptions, ConnectionParams, Error, Phase, Wiring,
        WiringReceivers,
    },
    lilac_engine::{
        Account, AccountKey, Buddy, DisconnectReason, Engine, EngineEvent, EngineStatus,
        MediaCaps, MediaState, MediaType, StatusPrimitive,
        loopback::{LoopbackAccount, LoopbackEngine},
    },
    lilac_handles::HandleRepo,
    lilac_media::MediaEvent,
};

const ME: &str = "me@example.com";

struct Harness {
    engine: Arc<LoopbackEngine>,
    conn: Connection,
    rx: WiringReceivers,
}

impl Harness {
    fn new(engine: LoopbackEngine, params: ConnectionParams) -> Self {
        let engine = Arc::new(engine);
        let (wiring, rx) = Wiring::new();
        let conn = Connection::new(
            Arc::clone(&engine) as Arc<dyn Engine>,
            params,
            ConnectionOptions::default(),
            wiring,
        )
        .unwrap();
        Self { engine, conn, rx }
    }

    fn xmpp(engine: LoopbackEngine) -> Self {
        Self::new(engine, ConnectionParams::new("xmpp", ME, "secret"))
    }

    /// Start and sign on, discarding the events that produces.
    fn connected(engine: LoopbackEngine) -> Self {
        let mut h = Self::xmpp(engine);
        h.conn.start().unwrap();
        h.pump();
        assert_eq!(h.conn.phase(), Phase::Connected);
        h.events();
        h
    }

    fn key(&self) -> AccountKey {
        AccountKey::new(self.conn.protocol(), &self.conn.params().username)
    }

    fn account(&self) -> Arc<LoopbackAccount> {
        self.engine.account(&self.key()).unwrap()
    }

    /// Deliver queued engine events and commands until both queues are idle.
    fn pump(&mut self) {
        loop {
            let mut progressed = false;
            while let Ok(event) = self.rx.engine.try_recv() {
                self.conn.handle_engine_event(event);
                progressed = true;
            }
            while let Ok(command) = self.rx.commands.try_recv() {
                self.conn.handle_command(command);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    fn events(&mut self) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| self.rx.events.try_recv().ok()).collect()
    }

    fn statuses(&mut self) -> Vec<(ConnectionStatus, StatusReason)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConnectionEvent::StatusChanged { status, reason } => Some((status, reason)),
                _ => None,
            })
            .collect()
    }

    fn contact(&self, id: &str) -> u32 {
        self.conn
            .request_handles(HandleType::Contact.as_u32(), &[id.to_string()])
            .unwrap()[0]
    }
}

fn tp_name(err: Error) -> &'static str {
    TpError::from(err).name()
}

fn bob() -> Buddy {
    Buddy::new("bob@example.com").with_status(
        EngineStatus::new("away", StatusPrimitive::Away).with_message("<b>lunch</b>"),
    )
}

// ── lifecycle ───────────────────────────────────────────────────────────────

#[test]
fn start_then_sign_on() {
    let mut h = Harness::xmpp(LoopbackEngine::new().with_buddy(bob()));
    assert_eq!(h.conn.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        h.conn.bus_name(),
        "org.freedesktop.Telepathy.Connection.lilac.xmpp.me_40example_2ecom"
    );

    h.conn.start().unwrap();
    assert_eq!(h.conn.status(), ConnectionStatus::Connecting);
    let account = h.account();
    assert_eq!(account.password().as_deref(), Some("secret"));
    assert!(account.is_enabled());
    assert_eq!(account.connect_count(), 1);

    h.pump();
    let events = h.events();
    let statuses: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::StatusChanged { status, reason } => Some((*status, *reason)),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![
        (ConnectionStatus::Connecting, StatusReason::Requested),
        (ConnectionStatus::Connected, StatusReason::Requested),
    ]);

    let bob = h.conn.handles().contacts().lookup("bob@example.com").unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        ConnectionEvent::Channel(ChannelEvent::MembersChanged { added, .. }) if added == &vec![bob.get()]
    )));

    let me = h.conn.get_self_handle().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        ConnectionEvent::PresencesChanged(p) if p.get(&me).is_some_and(|s| s.status == "available")
    )));
}

#[test]
fn start_is_a_no_op_after_the_first_call() {
    let mut h = Harness::xmpp(LoopbackEngine::new());
    h.conn.start().unwrap();
    h.conn.start().unwrap();
    h.pump();
    h.conn.start().unwrap();
    assert_eq!(h.account().connect_count(), 1);
    assert_eq!(h.statuses().len(), 2);
}

#[test]
fn unknown_protocol_fails_construction() {
    let (wiring, _rx) = Wiring::new();
    let err = Connection::new(
        Arc::new(LoopbackEngine::new()),
        ConnectionParams::new("irc", "me", "pw"),
        ConnectionOptions::default(),
        wiring,
    )
    .err()
    .unwrap();
    assert_eq!(tp_name(err), "NotImplemented");
}

#[test]
fn server_override_goes_to_the_protocols_server_option() {
    let mut xmpp = Harness::new(
        LoopbackEngine::new(),
        ConnectionParams::new("xmpp", ME, "pw").with_server("talk.example.com"),
    );
    xmpp.conn.start().unwrap();
    assert_eq!(
        xmpp.account().string("connect_server").as_deref(),
        Some("talk.example.com")
    );

    let mut oscar = Harness::new(
        LoopbackEngine::new(),
        ConnectionParams::new("oscar", "Me Me", "pw").with_server("login.example.com"),
    );
    oscar.conn.start().unwrap();
    assert_eq!(
        oscar.account().string("server").as_deref(),
        Some("login.example.com")
    );

    let mut bare = Harness::new(
        LoopbackEngine::new(),
        ConnectionParams::new("bare", "me", "pw").with_server("ignored.example.com"),
    );
    bare.conn.start().unwrap();
    assert!(bare.account().string("server").is_none());
    assert!(bare.account().string("connect_server").is_none());
}

#[test]
fn shutdown_before_start_finishes_immediately() {
    let mut h = Harness::xmpp(LoopbackEngine::new());
    h.conn.shutdown();
    assert!(h.conn.is_finished());
    let events = h.events();
    assert_eq!(events, vec![
        ConnectionEvent::StatusChanged {
            status: ConnectionStatus::Disconnected,
            reason: StatusReason::Requested,
        },
        ConnectionEvent::ShutdownFinished,
    ]);
    assert!(h.engine.account(&h.key()).is_none());
}

#[test]
fn shutdown_tears_everything_down() {
    let mut h = Harness::connected(LoopbackEngine::new().with_buddy(bob()));
    let bob = h.contact("bob@example.com");
    h.conn
        .request_channel(IFACE_CHANNEL_TYPE_TEXT, HandleType::Contact.as_u32(), bob, false)
        .unwrap();
    h.events();
    assert_eq!(h.engine.subscriber_count(), 1);

    h.conn.shutdown();
    h.conn.shutdown();
    h.pump();

    let events = h.events();
    let statuses = events
        .iter()
        .filter(|e| matches!(e, ConnectionEvent::StatusChanged { .. }))
        .collect::<Vec<_>>();
    assert_eq!(statuses, vec![&ConnectionEvent::StatusChanged {
        status: ConnectionStatus::Disconnected,
        reason: StatusReason::Requested,
    }]);
    let closed = events
        .iter()
        .filter(|e| matches!(e, ConnectionEvent::Channel(ChannelEvent::Closed { .. })))
        .count();
    assert_eq!(closed, 2, "text channel and subscribe list");
    assert_eq!(events.last(), Some(&ConnectionEvent::ShutdownFinished));

    assert!(h.conn.is_finished());
    assert_eq!(h.engine.deleted_accounts(), vec![h.key()]);
    assert_eq!(h.engine.subscriber_count(), 0);
}

#[test]
fn connection_error_reason_is_reported_once() {
    let mut h = Harness::connected(LoopbackEngine::new());
    h.engine.emit(EngineEvent::ConnectionError {
        account: h.key(),
        reason: DisconnectReason::AuthenticationFailed,
        description: "bad password".into(),
    });
    h.account().disconnect();
    h.pump();
    assert_eq!(h.statuses(), vec![(
        ConnectionStatus::Disconnected,
        StatusReason::AuthenticationFailed
    )]);
    assert!(h.conn.is_finished());
}

#[test]
fn events_for_other_accounts_are_ignored() {
    let mut h = Harness::connected(LoopbackEngine::new());
    h.engine.emit(EngineEvent::SignedOff {
        account: AccountKey::new("xmpp", "someone.else@example.com"),
    });
    h.pump();
    assert_eq!(h.conn.phase(), Phase::Connected);
    assert!(h.events().is_empty());
}

// ── handles ─────────────────────────────────────────────────────────────────

#[test]
fn handle_methods_require_connected() {
    let h = Harness::xmpp(LoopbackEngine::new());
    let err = h
        .conn
        .request_handles(HandleType::Contact.as_u32(), &["bob".into()])
        .unwrap_err();
    assert_eq!(tp_name(err), "Disconnected");
    assert!(matches!(h.conn.list_channels(), Err(Error::NotConnected)));
}

#[test]
fn handles_are_normalized_and_inspectable() {
    let h = Harness::connected(LoopbackEngine::new());
    let a = h.contact("Alice@Example.com/laptop");
    let b = h.contact("alice@example.com");
    assert_eq!(a, b);
    assert_eq!(
        h.conn
            .inspect_handles(HandleType::Contact.as_u32(), &[a])
            .unwrap(),
        vec!["alice@example.com".to_string()]
    );
    h.conn
        .hold_handles(HandleType::Contact.as_u32(), &[a])
        .unwrap();
    h.conn
        .release_handles(HandleType::Contact.as_u32(), &[a, a])
        .unwrap();
    let err = h
        .conn
        .inspect_handles(HandleType::Contact.as_u32(), &[0])
        .unwrap_err();
    assert_eq!(tp_name(err), "InvalidHandle");
}

// ── channels ────────────────────────────────────────────────────────────────

#[test]
fn channel_requests_are_routed_to_the_right_factory() {
    let mut h = Harness::connected(LoopbackEngine::new());
    let bob = h.contact("bob@example.com");
    let contact = HandleType::Contact.as_u32();
    let list = HandleType::List.as_u32();

    let path = h
        .conn
        .request_channel(IFACE_CHANNEL_TYPE_TEXT, contact, bob, false)
        .unwrap();
    assert!(path.ends_with(&format!("/ImChannel{bob}")));
    assert_eq!(
        h.conn
            .request_channel(IFACE_CHANNEL_TYPE_TEXT, contact, bob, false)
            .unwrap(),
        path
    );
    let new_channels = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, ConnectionEvent::Channel(ChannelEvent::NewChannel { .. })))
        .count();
    assert_eq!(new_channels, 1);

    let subscribe = h
        .conn
        .request_channel(IFACE_CHANNEL_TYPE_CONTACT_LIST, list, 1, false)
        .unwrap();
    assert!(subscribe.ends_with("/ContactListChannel/List/subscribe"));
    assert_eq!(h.conn.list_channels().unwrap().len(), 2);

    let cases = [
        (IFACE_CHANNEL_TYPE_STREAMED_MEDIA, contact, bob, "NotImplemented"),
        (IFACE_CHANNEL_TYPE_CONTACT_LIST, HandleType::Group.as_u32(), 1, "NotImplemented"),
        (IFACE_CHANNEL_TYPE_CONTACT_LIST, contact, bob, "NotAvailable"),
        (IFACE_CHANNEL_TYPE_CONTACT_LIST, list, 9, "InvalidHandle"),
        (IFACE_CHANNEL_TYPE_TEXT, list, 1, "NotAvailable"),
        (IFACE_CHANNEL_TYPE_TEXT, contact, 999, "InvalidHandle"),
    ];
    for (channel_type, handle_type, handle, expected) in cases {
        let err = h
            .conn
            .request_channel(channel_type, handle_type, handle, false)
            .unwrap_err();
        assert_eq!(tp_name(err), expected, "{channel_type} {handle_type} {handle}");
    }
}

#[test]
fn invalid_message_type_sends_nothing() {
    let mut h = Harness::connected(LoopbackEngine::new());
    let bob = h.contact("bob@example.com");
    let path = h
        .conn
        .request_channel(IFACE_CHANNEL_TYPE_TEXT, HandleType::Contact.as_u32(), bob, false)
        .unwrap();
    h.events();

    let err = h.conn.send_message(&path, 7, "hi").unwrap_err();
    assert_eq!(TpError::from(err), TpError::InvalidArgument(
        "invalid message type: 7".into()
    ));
    assert!(h.account().sent_messages().is_empty());
    assert!(h.events().is_empty());

    h.conn.send_message(&path, 1, "waves").unwrap();
    assert_eq!(h.account().sent_messages(), vec![(
        "bob@example.com".to_string(),
        "waves".to_string()
    )]);
    assert!(matches!(
        h.events().as_slice(),
        [ConnectionEvent::Channel(ChannelEvent::Sent { text, .. })] if text == "waves"
    ));
}

#[test]
fn incoming_messages_open_a_channel_and_queue() {
    let mut h = Harness::connected(LoopbackEngine::new());
    h.engine.emit(EngineEvent::ReceivedIm {
        account: h.key(),
        from: "Carol@Example.com".into(),
        text: "/me waves".into(),
        auto_reply: false,
        timestamp: 1_700_000_000,
    });
    h.pump();

    let channels = h.conn.list_channels().unwrap();
    let text = channels
        .iter()
        .find(|c| c.channel_type == IFACE_CHANNEL_TYPE_TEXT)
        .unwrap();
    let pending = h.conn.list_pending_messages(&text.object_path, false).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].text, "waves");
    assert_eq!(pending[0].timestamp, 1_700_000_000);

    let err = h
        .conn
        .acknowledge_pending_messages(&text.object_path, &[pending[0].id, 42])
        .unwrap_err();
    assert_eq!(tp_name(err), "InvalidArgument");
    h.conn
        .acknowledge_pending_messages(&text.object_path, &[pending[0].id])
        .unwrap();
    assert!(
        h.conn
            .list_pending_messages(&text.object_path, false)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn engine_side_conversation_end_closes_the_channel() {
    let mut h = Harness::connected(LoopbackEngine::new());
    let bob = h.contact("bob@example.com");
    let path = h
        .conn
        .request_channel(IFACE_CHANNEL_TYPE_TEXT, HandleType::Contact.as_u32(), bob, false)
        .unwrap();
    h.events();

    h.engine
        .close_conversation_remotely(&h.key(), "bob@example.com");
    h.pump();
    assert_eq!(h.events(), vec![ConnectionEvent::Channel(ChannelEvent::Closed {
        object_path: path.clone()
    })]);
    assert!(h.conn.close_text_channel(&path).is_ok());
}

#[test]
fn closing_a_text_channel_twice_succeeds() {
    let mut h = Harness::connected(LoopbackEngine::new());
    let bob = h.contact("bob@example.com");
    let path = h
        .conn
        .request_channel(IFACE_CHANNEL_TYPE_TEXT, HandleType::Contact.as_u32(), bob, false)
        .unwrap();
    h.events();

    h.conn.close_text_channel(&path).unwrap();
    h.pump();
    h.conn.close_text_channel(&path).unwrap();
    h.conn
        .close_text_channel("/org/freedesktop/Telepathy/Connection/lilac/xmpp/me/ImChannel99")
        .unwrap();
}

#[test]
fn failed_start_forgets_the_engine_account() {
    let mut h = Harness::new(
        LoopbackEngine::new(),
        ConnectionParams::new("xmpp", "/phone", "secret"),
    );
    assert!(h.conn.start().is_err());
    assert_eq!(h.conn.phase(), Phase::New);
    assert!(h.engine.account(&h.key()).is_none());
    assert_eq!(h.engine.deleted_accounts(), vec![h.key()]);
    assert!(h.events().is_empty());
}

// ── presence ────────────────────────────────────────────────────────────────

#[test]
fn set_presence_picks_the_matching_status_type() {
    let mut h = Harness::connected(LoopbackEngine::new());
    h.conn.set_presence("away", "brb").unwrap();
    h.conn.set_presence("hidden", "ignored").unwrap();

    let changes = h.account().status_changes();
    assert_eq!(changes[0].id, "away");
    assert!(changes[0].active);
    assert_eq!(changes[0].attrs, vec![("message".to_string(), "brb".to_string())]);
    assert_eq!(changes[1].id, "invisible");
    assert!(changes[1].attrs.is_empty());

    h.pump();
    let me = h.conn.get_self_handle().unwrap();
    let seen: Vec<String> = h
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ConnectionEvent::PresencesChanged(p) => p.get(&me).map(|s| s.status.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(seen, vec!["away".to_string(), "hidden".to_string()]);
}

#[test]
fn set_presence_falls_back_to_available() {
    let h = Harness::connected(
        LoopbackEngine::new().with_status_types(&[("available", StatusPrimitive::Available)]),
    );
    h.conn.set_presence("xa", "gone").unwrap();
    assert_eq!(h.account().status_changes()[0].id, "available");
}

#[test]
fn unsettable_or_unknown_statuses_are_rejected() {
    let h = Harness::connected(LoopbackEngine::new());
    for status in ["offline", "unknown", "dancing"] {
        let err = h.conn.set_presence(status, "").unwrap_err();
        assert_eq!(tp_name(err), "InvalidArgument", "{status}");
    }
    assert!(h.account().status_changes().is_empty());
}

#[test]
fn buddy_presence_is_translated() {
    let mut h = Harness::connected(LoopbackEngine::new().with_buddy(bob()));
    let bob = h.contact("bob@example.com");
    let presences = h.conn.get_presences(&[bob]).unwrap();
    assert_eq!(presences[&bob].status, "away");
    assert_eq!(presences[&bob].message, "lunch");

    h.engine.emit(EngineEvent::BuddyStatusChanged {
        account: h.key(),
        buddy: "bob@example.com".into(),
        status: Some(EngineStatus::new("busy", StatusPrimitive::Unavailable)),
    });
    h.pump();
    assert!(matches!(
        h.events().as_slice(),
        [ConnectionEvent::PresencesChanged(p)] if p.len() == 1 && p[&bob].status == "busy"
    ));

    let stranger = h.contact("nobody@example.com");
    assert_eq!(h.conn.get_presences(&[stranger]).unwrap()[&stranger].status, "unknown");
}

// ── capabilities ────────────────────────────────────────────────────────────

#[test]
fn advertise_only_signals_real_changes() {
    let mut h = Harness::connected(LoopbackEngine::new());
    let me = h.conn.get_self_handle().unwrap();
    let media = IFACE_CHANNEL_TYPE_STREAMED_MEDIA.to_string();

    let result = h
        .conn
        .advertise_capabilities(&[(media.clone(), 1)], &[])
        .unwrap();
    assert!(result.contains(&(media.clone(), 1)));
    assert_eq!(h.engine.ui_media_caps(), MediaCaps::AUDIO);
    match h.events().as_slice() {
        [ConnectionEvent::CapabilitiesChanged(changes)] => {
            assert_eq!(changes[0].handle, me);
            assert_eq!((changes[0].old_specific, changes[0].new_specific), (0, 1));
        },
        other => panic!("unexpected events: {other:?}"),
    }

    h.conn
        .advertise_capabilities(&[(media.clone(), 1)], &[])
        .unwrap();
    assert!(h.events().is_empty());

    // Removal resets before adds apply.
    h.conn
        .advertise_capabilities(&[(media.clone(), 2)], &[media.clone()])
        .unwrap();
    assert_eq!(h.engine.ui_media_caps(), MediaCaps::VIDEO);
    assert_eq!(h.events().len(), 1);
}

#[test]
fn get_capabilities_reports_text_and_media() {
    let h = Harness::connected(
        LoopbackEngine::new().with_contact_caps("bob@example.com", MediaCaps::AUDIO_VIDEO),
    );
    let bob = h.contact("bob@example.com");
    let carol = h.contact("carol@example.com");

    let caps = h.conn.get_capabilities(&[0, bob, carol]).unwrap();
    let for_handle = |handle: u32| {
        caps.iter()
            .filter(|c| c.handle == handle)
            .map(|c| (c.channel_type.as_str(), c.specific))
            .collect::<Vec<_>>()
    };
    assert_eq!(for_handle(0), vec![(IFACE_CHANNEL_TYPE_TEXT, 0)]);
    assert_eq!(for_handle(bob), vec![
        (IFACE_CHANNEL_TYPE_TEXT, 0),
        (IFACE_CHANNEL_TYPE_STREAMED_MEDIA, 3)
    ]);
    assert_eq!(for_handle(carol), vec![(IFACE_CHANNEL_TYPE_TEXT, 0)]);
    assert!(caps.iter().all(|c| c.generic == 3));

    assert_eq!(tp_name(h.conn.get_capabilities(&[777]).unwrap_err()), "InvalidHandle");

    let contact_caps = h.conn.get_contact_capabilities(&[0, bob]).unwrap();
    assert!(contact_caps[0].1.is_empty());
    assert_eq!(contact_caps[1].1.len(), 1);
    assert_eq!(contact_caps[1].1[0].channel_type, IFACE_CHANNEL_TYPE_TEXT);
}

#[test]
fn update_capabilities_requires_connected() {
    let h = Harness::xmpp(LoopbackEngine::new());
    assert_eq!(tp_name(h.conn.update_capabilities().unwrap_err()), "Disconnected");
    let h = Harness::connected(LoopbackEngine::new());
    h.conn.update_capabilities().unwrap();
}

// ── media ───────────────────────────────────────────────────────────────────

#[test]
fn media_session_lifecycle() {
    let mut h = Harness::connected(LoopbackEngine::new());
    let media = h.engine.start_media(&h.key(), "bob@example.com", "call-1");
    h.engine.emit(EngineEvent::MediaStreamAdded {
        account: h.key(),
        media_id: "call-1".into(),
        sid: "audio1".into(),
        who: "bob@example.com".into(),
        media_type: MediaType::Audio,
    });
    h.pump();

    let session = match h.events().as_slice() {
        [ConnectionEvent::Media(MediaEvent::NewSessionHandler { session_path, session_type })] => {
            assert_eq!(session_type, "rtp");
            assert!(session_path.ends_with("/MediaChannel1"));
            session_path.clone()
        },
        other => panic!("unexpected events: {other:?}"),
    };

    h.conn.media_ready(&session).unwrap();
    h.conn.media_ready(&session).unwrap();
    let announced = h
        .events()
        .into_iter()
        .filter(|e| matches!(e, ConnectionEvent::Media(MediaEvent::NewStreamHandler { .. })))
        .count();
    assert_eq!(announced, 1);

    h.conn.media_error(&session, 1, "no devices").unwrap();
    assert!(media.is_ended());
    assert!(h.conn.media_backend(&session).unwrap().streams().is_empty());

    h.engine.emit(EngineEvent::MediaStateChanged {
        account: h.key(),
        media_id: "call-1".into(),
        state: MediaState::End,
        sid: None,
        name: None,
    });
    h.pump();
    assert!(h.conn.media_sessions().is_empty());
    assert!(h.events().iter().any(|e| matches!(
        e,
        ConnectionEvent::Media(MediaEvent::SessionClosed { .. })
    )));
    assert_eq!(tp_name(h.conn.media_ready(&session).unwrap_err()), "NotAvailable");
}
