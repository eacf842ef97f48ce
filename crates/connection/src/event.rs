use std::collections::BTreeMap;

use {
    lilac_channels::{ChannelEvent, ChannelEventSink},
    lilac_common::{ConnectionStatus, StatusReason},
    lilac_media::{MediaEvent, MediaEventSink},
    tokio::sync::mpsc,
    tracing::debug,
};

use crate::{CapabilityChange, SimplePresence};

/// Everything a connection wants signalled on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// `Connection.StatusChanged(uu)`.
    StatusChanged {
        status: ConnectionStatus,
        reason: StatusReason,
    },
    /// `SimplePresence.PresencesChanged(a{u(uss)})`.
    PresencesChanged(BTreeMap<u32, SimplePresence>),
    /// `Capabilities.CapabilitiesChanged(a(usuuuu))`.
    CapabilitiesChanged(Vec<CapabilityChange>),
    Channel(ChannelEvent),
    Media(MediaEvent),
    /// Teardown completed; the connection object can be dropped.
    ShutdownFinished,
}

/// Sender half of a connection's event stream. Also serves as the channel
/// and media event sink so every signal leaves through one queue.
#[derive(Clone)]
pub struct ConnectionEventSender(mpsc::UnboundedSender<ConnectionEvent>);

impl ConnectionEventSender {
    pub fn new(tx: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self(tx)
    }

    pub fn emit(&self, event: ConnectionEvent) {
        if self.0.send(event).is_err() {
            debug!("connection event receiver dropped");
        }
    }
}

impl ChannelEventSink for ConnectionEventSender {
    fn emit(&self, event: ChannelEvent) {
        ConnectionEventSender::emit(self, ConnectionEvent::Channel(event));
    }
}

impl MediaEventSink for ConnectionEventSender {
    fn emit(&self, event: MediaEvent) {
        ConnectionEventSender::emit(self, ConnectionEvent::Media(event));
    }
}
