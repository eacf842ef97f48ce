//! The connection state machine and its Connection-interface surface.

use std::{sync::Arc, time::Duration};

use {
    lilac_channels::{
        ChannelContext, ChannelInfo, ContactListFactory, FactoryRegistry, ImChannelFactory,
        RequestStatus,
    },
    lilac_common::{
        ConnectionStatus, Handle, HandleType, StatusReason, escape_as_identifier,
        names::{
            IFACE_CONNECTION_CAPABILITIES, IFACE_CONNECTION_CONTACT_CAPABILITIES,
            IFACE_CONNECTION_SIMPLE_PRESENCE, connection_bus_name, connection_object_path,
        },
    },
    lilac_engine::{
        Account, Engine, EngineEvent, EventReceiver, EventSender, ProtocolInfo, SubscriptionId,
    },
    lilac_handles::{HandleRepo, HandleRepos},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::{
    Command, ConnectionEvent, ConnectionEventSender, ConnectionParams, Error, Phase, Result,
    capabilities::CapabilityState, media::MediaSessions, server_option::find_server_option,
    status::status_reason,
};

/// Tunables for a connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// How long after a presence stanza to re-read a contact's media caps.
    pub poll_delay: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            poll_delay: Duration::from_secs(10),
        }
    }
}

/// The queues a connection talks through. Built by the driver.
pub struct Wiring {
    pub events: ConnectionEventSender,
    /// Handed to the engine on start; events come back to the driver.
    pub engine: EventSender,
    pub commands: mpsc::UnboundedSender<Command>,
}

/// Receiving ends of a [`Wiring`].
pub struct WiringReceivers {
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
    pub engine: EventReceiver,
    pub commands: mpsc::UnboundedReceiver<Command>,
}

impl Wiring {
    /// Fresh unbounded queues.
    pub fn new() -> (Self, WiringReceivers) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        (
            Self {
                events: ConnectionEventSender::new(events_tx),
                engine: engine_tx,
                commands: commands_tx,
            },
            WiringReceivers {
                events: events_rx,
                engine: engine_rx,
                commands: commands_rx,
            },
        )
    }
}

/// One Telepathy connection backed by one engine account.
pub struct Connection {
    engine: Arc<dyn Engine>,
    params: ConnectionParams,
    protocol: ProtocolInfo,
    options: ConnectionOptions,
    unique_name: String,
    bus_name: String,
    object_path: String,

    phase: Phase,
    /// Reason from the last `ConnectionError`, used when we go down.
    pending_reason: Option<StatusReason>,
    finished: bool,

    handles: Arc<HandleRepos>,
    account: Option<Arc<dyn Account>>,
    subscription: Option<SubscriptionId>,

    ctx: Arc<ChannelContext>,
    factories: FactoryRegistry,
    pub(crate) caps: CapabilityState,
    pub(crate) media: MediaSessions,

    pub(crate) events: ConnectionEventSender,
    engine_tx: EventSender,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
}

impl Connection {
    /// Build a connection for `params`. Fails if the engine has no such
    /// protocol.
    pub fn new(
        engine: Arc<dyn Engine>,
        params: ConnectionParams,
        options: ConnectionOptions,
        wiring: Wiring,
    ) -> Result<Self> {
        let protocol = engine
            .find_protocol(&params.protocol)
            .ok_or_else(|| lilac_engine::Error::UnknownProtocol(params.protocol.clone()))?;

        let unique_name = escape_as_identifier(&params.username);
        let bus_name = connection_bus_name(&protocol.id, &unique_name);
        let object_path = connection_object_path(&protocol.id, &unique_name);

        let handles = Arc::new(HandleRepos::new());
        let ctx = Arc::new(ChannelContext::new(
            object_path.clone(),
            Arc::clone(&handles),
            Arc::new(wiring.events.clone()),
        ));
        let mut factories = FactoryRegistry::new();
        factories.register(Box::new(ContactListFactory::new(Arc::clone(&ctx))));
        factories.register(Box::new(ImChannelFactory::new(Arc::clone(&ctx))));

        Ok(Self {
            engine,
            params,
            protocol,
            options,
            unique_name,
            bus_name,
            object_path,
            phase: Phase::New,
            pending_reason: None,
            finished: false,
            handles,
            account: None,
            subscription: None,
            ctx,
            factories,
            caps: CapabilityState::default(),
            media: MediaSessions::default(),
            events: wiring.events,
            engine_tx: wiring.engine,
            commands: wiring.commands,
        })
    }

    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Escaped username; the last element of the bus name and object path.
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Whether teardown has completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn handles(&self) -> &HandleRepos {
        &self.handles
    }

    pub fn self_handle(&self) -> Option<Handle> {
        self.ctx.self_handle()
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub(crate) fn account(&self) -> Option<&Arc<dyn Account>> {
        self.account.as_ref()
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        self.events.emit(event);
    }

    pub(crate) fn require_connected(&self) -> Result<()> {
        if self.phase == Phase::Connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn set_phase(&mut self, next: Phase, reason: StatusReason) {
        if !self.phase.can_move_to(next) {
            warn!(from = ?self.phase, to = ?next, "ignoring invalid status transition");
            return;
        }
        info!(
            connection = %self.unique_name,
            from = ?self.phase,
            to = ?next,
            ?reason,
            "connection status changed"
        );
        self.phase = next;
        self.emit(ConnectionEvent::StatusChanged {
            status: next.status(),
            reason,
        });
    }

    // Lifecycle.

    /// `Connection.Connect`. Only does anything in the new phase.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != Phase::New {
            debug!(connection = %self.unique_name, phase = ?self.phase, "already started");
            return Ok(());
        }

        let account = self
            .engine
            .new_account(&self.params.username, &self.protocol.id)?;

        let normalizer = Arc::clone(&account);
        self.handles
            .contacts()
            .set_normalizer(Arc::new(move |id: &str| -> lilac_handles::Result<String> {
                Ok(normalizer.normalize(id))
            }));
        let self_handle = match self.handles.contacts().ensure(&self.params.username) {
            Ok(handle) => handle,
            Err(e) => {
                self.engine.delete_account(account.key());
                return Err(e.into());
            },
        };
        self.ctx.set_session(Arc::clone(&account), self_handle);

        account.set_password(self.params.password());
        if let Some(server) = self.params.server() {
            match find_server_option(&self.protocol) {
                Some(option) => {
                    debug!(option = %option.pref_name, server, "applying server override");
                    account.set_string(&option.pref_name, server);
                },
                None => debug!(server, "server override ignored"),
            }
        }
        account.set_enabled(true);

        self.subscription = Some(self.engine.subscribe(self.engine_tx.clone()));
        self.account = Some(Arc::clone(&account));

        account.connect();
        self.set_phase(Phase::Connecting, StatusReason::Requested);
        self.factories.connecting();
        Ok(())
    }

    /// `Connection.Disconnect`.
    pub fn shutdown(&mut self) {
        match self.phase {
            Phase::Disconnected => {},
            Phase::New => {
                self.set_phase(Phase::Disconnected, StatusReason::Requested);
                self.finish();
            },
            Phase::Connecting | Phase::Connected => {
                self.go_disconnected(StatusReason::Requested);
                if let Some(account) = &self.account
                    && !account.is_disconnecting()
                {
                    account.disconnect();
                }
            },
        }
    }

    fn go_disconnected(&mut self, reason: StatusReason) {
        if self.phase == Phase::Disconnected {
            return;
        }
        self.set_phase(Phase::Disconnected, reason);
        self.factories.disconnected();
        self.factories.close_all();
        self.caps.cancel_timers();
        self.close_media();
    }

    /// Deferred teardown after the engine has signed off.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        if let Some(account) = self.account.take() {
            self.engine.delete_account(account.key());
        }
        if let Some(id) = self.subscription.take() {
            self.engine.unsubscribe(id);
        }
        self.ctx.clear_session();
        self.finished = true;
        info!(connection = %self.unique_name, "connection finished");
        self.emit(ConnectionEvent::ShutdownFinished);
    }

    /// Handle one engine callback. Events for other accounts are ignored.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.finished {
            return;
        }
        let Some(account) = self.account.clone() else {
            return;
        };
        if event.account() != account.key() {
            return;
        }

        match event {
            EngineEvent::SignedOn { .. } => {
                self.set_phase(Phase::Connected, StatusReason::Requested);
                self.factories.connected();
                self.emit_self_presence();
            },
            EngineEvent::SigningOff { .. } => {
                let reason = self.pending_reason.unwrap_or_default();
                self.go_disconnected(reason);
            },
            EngineEvent::SignedOff { .. } => {
                let reason = self.pending_reason.unwrap_or_default();
                self.go_disconnected(reason);
                if self.commands.send(Command::FinishShutdown).is_err() {
                    // No driver; finish in place.
                    self.finish();
                }
            },
            EngineEvent::ConnectionError {
                reason,
                description,
                ..
            } => {
                warn!(connection = %self.unique_name, ?reason, description, "connection error");
                self.pending_reason = Some(status_reason(reason));
            },
            EngineEvent::AccountStatusChanged { status, .. } => {
                if let Some(me) = self.self_handle() {
                    let status = crate::PresenceStatus::from_engine(status.as_ref());
                    self.emit_presence(me, &status);
                }
            },
            EngineEvent::BuddyStatusChanged { buddy, status, .. } => {
                self.buddy_status_changed(&buddy, status.as_ref());
            },
            EngineEvent::BuddySignedOn { buddy, .. } | EngineEvent::BuddySignedOff { buddy, .. } => {
                let status = account.find_buddy(&buddy).and_then(|b| b.status);
                self.buddy_status_changed(&buddy, status.as_ref());
            },
            EngineEvent::PresenceStanza { from, .. } => self.schedule_caps_poll(&from),
            EngineEvent::ReceivedIm {
                from,
                text,
                auto_reply,
                timestamp,
                ..
            } => {
                if let Some(im) = self.factories.get_mut::<ImChannelFactory>()
                    && let Err(e) = im.message_received(&from, &text, auto_reply, timestamp)
                {
                    warn!(from, error = %e, "dropping incoming message");
                }
            },
            EngineEvent::ConversationDestroyed { peer, .. } => {
                if let Some(im) = self.factories.get_mut::<ImChannelFactory>() {
                    im.conversation_destroyed(&peer);
                }
            },
            EngineEvent::MediaCreated { peer, media, .. } => self.media_created(&peer, media),
            EngineEvent::MediaStreamAdded {
                media_id,
                sid,
                who,
                media_type,
                ..
            } => self.media_stream_added(&media_id, &sid, &who, media_type),
            EngineEvent::MediaStateChanged {
                media_id,
                state,
                sid,
                name,
                ..
            } => self.media_state_changed(&media_id, state, sid.as_deref(), name.as_deref()),
            EngineEvent::MediaCandidates {
                media_id,
                sid,
                who,
                candidates,
                ..
            } => {
                if let Some(backend) = self.media.backend_mut(&media_id) {
                    backend.add_remote_candidates(&sid, &who, candidates);
                }
            },
            EngineEvent::MediaCodecs {
                media_id,
                sid,
                who,
                codecs,
                ..
            } => {
                if let Some(backend) = self.media.backend_mut(&media_id) {
                    backend.set_remote_codecs(&sid, &who, codecs);
                }
            },
        }
    }

    /// Handle a command the connection posted to itself.
    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::FinishShutdown => self.finish(),
            Command::PollCapabilities { timer, handle } => self.poll_capabilities(timer, handle),
        }
    }

    // Connection interface.

    /// `Connection.GetStatus`.
    pub fn status(&self) -> ConnectionStatus {
        self.phase.status()
    }

    /// `Connection.GetSelfHandle`.
    pub fn get_self_handle(&self) -> Result<u32> {
        self.require_connected()?;
        self.self_handle()
            .map(Handle::get)
            .ok_or(Error::NotConnected)
    }

    /// `Connection.GetProtocol`.
    pub fn protocol(&self) -> &str {
        &self.protocol.id
    }

    /// `Connection.GetInterfaces`.
    pub fn interfaces(&self) -> Vec<&'static str> {
        vec![
            IFACE_CONNECTION_SIMPLE_PRESENCE,
            IFACE_CONNECTION_CAPABILITIES,
            IFACE_CONNECTION_CONTACT_CAPABILITIES,
        ]
    }

    fn repo(&self, handle_type: u32) -> Result<&dyn HandleRepo> {
        let handle_type = HandleType::from_raw(handle_type)
            .ok_or_else(|| Error::invalid_input(format!("unknown handle type {handle_type}")))?;
        Ok(self.handles.get(handle_type)?)
    }

    /// `Connection.InspectHandles`.
    pub fn inspect_handles(&self, handle_type: u32, handles: &[u32]) -> Result<Vec<String>> {
        self.require_connected()?;
        let repo = self.repo(handle_type)?;
        handles
            .iter()
            .map(|raw| Ok(repo.inspect(repo.validate(*raw)?)?))
            .collect()
    }

    /// `Connection.RequestHandles`. Every returned handle is held once.
    pub fn request_handles(&self, handle_type: u32, names: &[String]) -> Result<Vec<u32>> {
        self.require_connected()?;
        let repo = self.repo(handle_type)?;
        let handles = names
            .iter()
            .map(|name| repo.ensure(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for handle in &handles {
            repo.ref_handle(*handle)?;
        }
        Ok(handles.into_iter().map(Handle::get).collect())
    }

    /// `Connection.HoldHandles`.
    pub fn hold_handles(&self, handle_type: u32, handles: &[u32]) -> Result<()> {
        self.require_connected()?;
        let repo = self.repo(handle_type)?;
        let handles = handles
            .iter()
            .map(|raw| repo.validate(*raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for handle in handles {
            repo.ref_handle(handle)?;
        }
        Ok(())
    }

    /// `Connection.ReleaseHandles`.
    pub fn release_handles(&self, handle_type: u32, handles: &[u32]) -> Result<()> {
        self.require_connected()?;
        let repo = self.repo(handle_type)?;
        let handles = handles
            .iter()
            .map(|raw| repo.validate(*raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for handle in handles {
            repo.unref_handle(handle)?;
        }
        Ok(())
    }

    /// `Connection.ListChannels`.
    pub fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        self.require_connected()?;
        Ok(self.factories.channels())
    }

    /// `Connection.RequestChannel`. Returns the channel's object path.
    pub fn request_channel(
        &mut self,
        channel_type: &str,
        handle_type: u32,
        handle: u32,
        suppress_handler: bool,
    ) -> Result<String> {
        self.require_connected()?;
        let handle_type = HandleType::from_raw(handle_type)
            .ok_or_else(|| Error::invalid_input(format!("unknown handle type {handle_type}")))?;
        match self
            .factories
            .request(channel_type, handle_type, handle, suppress_handler)
        {
            RequestStatus::Created(info) | RequestStatus::Existing(info) => Ok(info.object_path),
            RequestStatus::NotImplemented => Err(Error::not_implemented(format!(
                "channel type {channel_type} is not implemented"
            ))),
            RequestStatus::NotAvailable(message) => Err(Error::not_available(message)),
            RequestStatus::InvalidHandle => Err(lilac_handles::Error::InvalidHandle {
                handle_type,
                handle,
            }
            .into()),
            RequestStatus::Error(e) => Err(e.into()),
        }
    }

    // Channel access for the bus layer.

    pub fn im_channels(&self) -> Result<&ImChannelFactory> {
        self.factories
            .get::<ImChannelFactory>()
            .ok_or_else(|| Error::not_available("no text channel factory"))
    }

    pub fn im_channels_mut(&mut self) -> Result<&mut ImChannelFactory> {
        self.factories
            .get_mut::<ImChannelFactory>()
            .ok_or_else(|| Error::not_available("no text channel factory"))
    }

    pub fn contact_lists(&self) -> Result<&ContactListFactory> {
        self.factories
            .get::<ContactListFactory>()
            .ok_or_else(|| Error::not_available("no contact list factory"))
    }

    /// Text channel `object_path` → its target handle.
    fn im_handle(&self, object_path: &str) -> Result<Handle> {
        self.im_channels()?
            .find_by_path(object_path)
            .map(lilac_channels::ImChannel::handle)
            .ok_or_else(|| Error::not_available(format!("no channel at {object_path}")))
    }

    /// `Channel.Type.Text.Send` on the channel at `object_path`.
    pub fn send_message(&mut self, object_path: &str, message_type: u32, text: &str) -> Result<()> {
        let handle = self.im_handle(object_path)?;
        Ok(self.im_channels_mut()?.send(handle, message_type, text)?)
    }

    /// `Channel.Close` on a text channel. Always succeeds, even for a
    /// channel that is already gone.
    pub fn close_text_channel(&mut self, object_path: &str) -> Result<()> {
        let Ok(handle) = self.im_handle(object_path) else {
            debug!(object_path, "close on a text channel that no longer exists");
            return Ok(());
        };
        Ok(self.im_channels_mut()?.close(handle)?)
    }

    /// `Channel.Type.Text.ListPendingMessages`.
    pub fn list_pending_messages(
        &mut self,
        object_path: &str,
        clear: bool,
    ) -> Result<Vec<lilac_channels::PendingMessage>> {
        let handle = self.im_handle(object_path)?;
        Ok(self.im_channels_mut()?.list_pending(handle, clear)?)
    }

    /// `Channel.Type.Text.AcknowledgePendingMessages`.
    pub fn acknowledge_pending_messages(&mut self, object_path: &str, ids: &[u32]) -> Result<()> {
        let handle = self.im_handle(object_path)?;
        Ok(self.im_channels_mut()?.acknowledge(handle, ids)?)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.engine.unsubscribe(id);
        }
    }
}
