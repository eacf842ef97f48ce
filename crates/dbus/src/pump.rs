//! Exporting a connection and forwarding its events to the bus.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use {
    lilac_channels::{ChannelEvent, ChannelInfo},
    lilac_connection::{ConnectionEvent, ConnectionHandle, ConnectionManager},
    lilac_media::MediaEvent,
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
    zbus::{
        Connection,
        object_server::{Interface, SignalEmitter},
        zvariant::ObjectPath,
    },
};

use crate::{
    CapabilitiesIface, ChannelIface, ConnectionIface, ContactCapabilitiesIface, GroupIface,
    MediaSignallingIface, PresenceIface, SessionHandlerIface, StreamHandlerIface, TextIface,
    channel, convert,
};

/// Export `conn` under its own bus name and object path, then spawn the
/// task that forwards its events until it shuts down.
pub async fn export_connection(
    bus: &Connection,
    manager: Arc<ConnectionManager>,
    conn: ConnectionHandle,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
) -> zbus::Result<()> {
    let path = conn.object_path().to_string();
    let server = bus.object_server();
    server.at(path.as_str(), ConnectionIface::new(conn.clone())).await?;
    server.at(path.as_str(), PresenceIface::new(conn.clone())).await?;
    server.at(path.as_str(), CapabilitiesIface::new(conn.clone())).await?;
    server
        .at(path.as_str(), ContactCapabilitiesIface::new(conn.clone()))
        .await?;
    // Peer-to-peer links have no bus daemon to own names on.
    if bus.unique_name().is_some() {
        bus.request_name(conn.bus_name()).await?;
    }
    info!(bus_name = %conn.bus_name(), path = %path, "connection exported");

    let pump = Pump {
        bus: bus.clone(),
        manager,
        path,
        conn,
        channels: HashSet::new(),
        sessions: HashMap::new(),
    };
    tokio::spawn(pump.run(events));
    Ok(())
}

struct Pump {
    bus: Connection,
    manager: Arc<ConnectionManager>,
    conn: ConnectionHandle,
    path: String,
    /// Exported channel paths.
    channels: HashSet<String>,
    /// Exported session paths and their stream paths.
    sessions: HashMap<String, Vec<String>>,
}

impl Pump {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<ConnectionEvent>) {
        while let Some(event) = events.recv().await {
            let done = event == ConnectionEvent::ShutdownFinished;
            if let Err(e) = self.dispatch(event).await {
                warn!(path = %self.path, error = %e, "failed to forward connection event");
            }
            if done {
                break;
            }
        }
        self.unexport().await;
    }

    fn emitter<'p>(&self, path: &'p str) -> zbus::Result<SignalEmitter<'p>> {
        SignalEmitter::new(&self.bus, path)
    }

    async fn dispatch(&mut self, event: ConnectionEvent) -> zbus::Result<()> {
        match event {
            ConnectionEvent::StatusChanged { status, reason } => {
                ConnectionIface::status_changed(
                    &self.emitter(&self.path)?,
                    status.as_u32(),
                    reason.as_u32(),
                )
                .await
            },
            ConnectionEvent::PresencesChanged(map) => {
                PresenceIface::presences_changed(&self.emitter(&self.path)?, convert::presences(map))
                    .await
            },
            ConnectionEvent::CapabilitiesChanged(changes) => {
                CapabilitiesIface::capabilities_changed(
                    &self.emitter(&self.path)?,
                    convert::capability_changes(changes),
                )
                .await
            },
            ConnectionEvent::Channel(event) => self.channel_event(event).await,
            ConnectionEvent::Media(event) => self.media_event(event).await,
            ConnectionEvent::ShutdownFinished => Ok(()),
        }
    }

    async fn serve<I: Interface>(&self, path: &str, iface: I) -> zbus::Result<()> {
        if !self.bus.object_server().at(path, iface).await? {
            debug!(path, interface = %I::name(), "interface already exported");
        }
        Ok(())
    }

    async fn unserve<I: Interface>(&self, path: &str) {
        if let Err(e) = self.bus.object_server().remove::<I, _>(path).await {
            debug!(path, interface = %I::name(), error = %e, "interface was not exported");
        }
    }

    async fn channel_event(&mut self, event: ChannelEvent) -> zbus::Result<()> {
        match event {
            ChannelEvent::NewChannel {
                info,
                suppress_handler,
            } => {
                self.export_channel(&info).await?;
                ConnectionIface::new_channel(
                    &self.emitter(&self.path)?,
                    ObjectPath::try_from(info.object_path.as_str())?,
                    info.channel_type,
                    info.handle_type.as_u32(),
                    info.handle,
                    suppress_handler,
                )
                .await
            },
            ChannelEvent::Closed { object_path } => {
                ChannelIface::closed(&self.emitter(&object_path)?).await?;
                self.unexport_channel(&object_path).await;
                Ok(())
            },
            ChannelEvent::MembersChanged {
                object_path,
                message,
                added,
                removed,
                local_pending,
                remote_pending,
                actor,
                reason,
            } => {
                GroupIface::members_changed(
                    &self.emitter(&object_path)?,
                    &message,
                    added,
                    removed,
                    local_pending,
                    remote_pending,
                    actor,
                    reason,
                )
                .await
            },
            ChannelEvent::Received {
                object_path,
                message,
            } => {
                let (id, timestamp, sender, kind, flags, text) = convert::pending(message);
                TextIface::received(
                    &self.emitter(&object_path)?,
                    id,
                    timestamp,
                    sender,
                    kind,
                    flags,
                    &text,
                )
                .await
            },
            ChannelEvent::Sent {
                object_path,
                timestamp,
                message_type,
                text,
            } => {
                TextIface::sent(
                    &self.emitter(&object_path)?,
                    u32::try_from(timestamp).unwrap_or(u32::MAX),
                    message_type.as_u32(),
                    &text,
                )
                .await
            },
        }
    }

    /// Requested channels are usually exported already, by the call that
    /// created them.
    async fn export_channel(&mut self, info: &ChannelInfo) -> zbus::Result<()> {
        channel::export_channel(&self.bus.object_server(), &self.conn, info).await?;
        self.channels.insert(info.object_path.clone());
        Ok(())
    }

    async fn unexport_channel(&mut self, path: &str) {
        self.unserve::<ChannelIface>(path).await;
        self.unserve::<TextIface>(path).await;
        self.unserve::<GroupIface>(path).await;
        self.channels.remove(path);
        debug!(path, "channel unexported");
    }

    async fn media_event(&mut self, event: MediaEvent) -> zbus::Result<()> {
        match event {
            MediaEvent::NewSessionHandler {
                session_path,
                session_type,
            } => {
                self.serve(
                    &session_path,
                    MediaSignallingIface::new(self.conn.clone(), &session_path),
                )
                .await?;
                self.serve(
                    &session_path,
                    SessionHandlerIface::new(self.conn.clone(), &session_path),
                )
                .await?;
                self.sessions.entry(session_path.clone()).or_default();
                MediaSignallingIface::new_session_handler(
                    &self.emitter(&session_path)?,
                    ObjectPath::try_from(session_path.as_str())?,
                    &session_type,
                )
                .await
            },
            MediaEvent::NewStreamHandler {
                session_path,
                stream_path,
                id,
                media_type,
                direction,
            } => {
                self.serve(
                    &stream_path,
                    StreamHandlerIface::new(self.conn.clone(), &stream_path),
                )
                .await?;
                self.sessions
                    .entry(session_path.clone())
                    .or_default()
                    .push(stream_path.clone());
                SessionHandlerIface::new_stream_handler(
                    &self.emitter(&session_path)?,
                    ObjectPath::try_from(stream_path.as_str())?,
                    id,
                    media_type.as_u32(),
                    direction.as_u32(),
                )
                .await
            },
            MediaEvent::RemoteCodecs {
                stream_path,
                codecs,
            } => {
                StreamHandlerIface::set_remote_codecs(
                    &self.emitter(&stream_path)?,
                    codecs.into_iter().map(convert::codec).collect(),
                )
                .await
            },
            MediaEvent::RemoteCandidates {
                stream_path,
                candidates,
            } => {
                let emitter = self.emitter(&stream_path)?;
                for candidate in candidates {
                    let foundation = candidate.foundation.clone();
                    StreamHandlerIface::add_remote_candidate(&emitter, &foundation, vec![
                        convert::transport(candidate),
                    ])
                    .await?;
                }
                Ok(())
            },
            MediaEvent::StreamError {
                stream_path,
                code,
                message,
            } => {
                warn!(stream = %stream_path, code, %message, "media stream failed");
                Ok(())
            },
            MediaEvent::StreamClosed { stream_path } => {
                StreamHandlerIface::close(&self.emitter(&stream_path)?).await?;
                self.unserve::<StreamHandlerIface>(&stream_path).await;
                for streams in self.sessions.values_mut() {
                    streams.retain(|p| *p != stream_path);
                }
                Ok(())
            },
            MediaEvent::SessionClosed { session_path } => {
                self.unexport_session(&session_path).await;
                Ok(())
            },
        }
    }

    async fn unexport_session(&mut self, session_path: &str) {
        for stream in self.sessions.remove(session_path).unwrap_or_default() {
            self.unserve::<StreamHandlerIface>(&stream).await;
        }
        self.unserve::<MediaSignallingIface>(session_path).await;
        self.unserve::<SessionHandlerIface>(session_path).await;
        debug!(session = session_path, "media session unexported");
    }

    async fn unexport(mut self) {
        let channels: Vec<String> = self.channels.iter().cloned().collect();
        for path in channels {
            self.unexport_channel(&path).await;
        }
        let sessions: Vec<String> = self.sessions.keys().cloned().collect();
        for path in sessions {
            self.unexport_session(&path).await;
        }

        let path = self.path.clone();
        self.unserve::<ConnectionIface>(&path).await;
        self.unserve::<PresenceIface>(&path).await;
        self.unserve::<CapabilitiesIface>(&path).await;
        self.unserve::<ContactCapabilitiesIface>(&path).await;
        if self.bus.unique_name().is_some()
            && let Err(e) = self.bus.release_name(self.conn.bus_name()).await
        {
            warn!(bus_name = %self.conn.bus_name(), error = %e, "failed to release bus name");
        }
        self.manager.remove(self.conn.bus_name());
        info!(bus_name = %self.conn.bus_name(), "connection unexported");
    }
}
