use tokio::sync::mpsc;

use crate::{ChannelInfo, PendingMessage, text::MessageType};

/// Channel-side changes that become bus signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A channel was created and should be exported.
    NewChannel {
        info: ChannelInfo,
        suppress_handler: bool,
    },
    /// The channel at `object_path` closed and should be unexported.
    Closed { object_path: String },
    /// `Group.MembersChanged` on a list channel.
    MembersChanged {
        object_path: String,
        message: String,
        added: Vec<u32>,
        removed: Vec<u32>,
        local_pending: Vec<u32>,
        remote_pending: Vec<u32>,
        actor: u32,
        reason: u32,
    },
    /// `Text.Received`.
    Received {
        object_path: String,
        message: PendingMessage,
    },
    /// `Text.Sent`.
    Sent {
        object_path: String,
        timestamp: u64,
        message_type: MessageType,
        text: String,
    },
}

/// Sink for channel events; the connection forwards them to the bus layer.
pub trait ChannelEventSink: Send + Sync {
    fn emit(&self, event: ChannelEvent);
}

impl ChannelEventSink for mpsc::UnboundedSender<ChannelEvent> {
    fn emit(&self, event: ChannelEvent) {
        if self.send(event).is_err() {
            tracing::debug!("channel event receiver dropped");
        }
    }
}
