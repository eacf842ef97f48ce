//! One-to-one text channels.

use std::{
    any::Any,
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use {
    lilac_common::{Handle, HandleType, names::IFACE_CHANNEL_TYPE_TEXT},
    lilac_engine::Conversation,
    lilac_handles::HandleRepo,
    tracing::{debug, info, warn},
};

use crate::{
    ChannelContext, ChannelEvent, ChannelFactory, ChannelInfo, Error, MessageType,
    PendingMessage, RequestStatus, Result,
    text::{classify_incoming, unix_now},
};

/// A text channel wrapping one engine conversation.
pub struct ImChannel {
    object_path: String,
    handle: Handle,
    conversation: Arc<dyn Conversation>,
    pending: VecDeque<PendingMessage>,
    next_id: u32,
}

impl ImChannel {
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn channel_type(&self) -> &'static str {
        IFACE_CHANNEL_TYPE_TEXT
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn handle_type(&self) -> HandleType {
        HandleType::Contact
    }

    pub fn interfaces(&self) -> Vec<&'static str> {
        Vec::new()
    }

    pub fn message_types(&self) -> Vec<u32> {
        MessageType::ALL.iter().map(|t| t.as_u32()).collect()
    }

    pub fn pending_messages(&self) -> impl Iterator<Item = &PendingMessage> {
        self.pending.iter()
    }

    fn info(&self) -> ChannelInfo {
        ChannelInfo {
            object_path: self.object_path.clone(),
            channel_type: IFACE_CHANNEL_TYPE_TEXT,
            handle_type: HandleType::Contact,
            handle: self.handle.get(),
        }
    }

    fn enqueue(&mut self, sender: Handle, message_type: MessageType, text: String, timestamp: u64) -> PendingMessage {
        let message = PendingMessage {
            id: self.next_id,
            timestamp,
            sender: sender.get(),
            message_type,
            flags: 0,
            text,
        };
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.push_back(message.clone());
        message
    }
}

/// Owns the text channels of one connection, one per contact.
pub struct ImChannelFactory {
    ctx: Arc<ChannelContext>,
    channels: HashMap<Handle, ImChannel>,
}

impl ImChannelFactory {
    pub fn new(ctx: Arc<ChannelContext>) -> Self {
        Self {
            ctx,
            channels: HashMap::new(),
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&ImChannel> {
        self.channels.get(&handle)
    }

    pub fn find_by_path(&self, object_path: &str) -> Option<&ImChannel> {
        self.channels.values().find(|c| c.object_path == object_path)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn channel_mut(&mut self, handle: Handle) -> Result<&mut ImChannel> {
        self.channels
            .get_mut(&handle)
            .ok_or_else(|| Error::unavailable(format!("no text channel for handle {handle}")))
    }

    /// Create the text channel for `handle`: take a reference on the
    /// handle, open the engine conversation and announce the channel.
    pub fn create_channel(&mut self, handle: Handle, suppress_handler: bool) -> Result<ChannelInfo> {
        if self.channels.contains_key(&handle) {
            return Err(Error::DuplicateChannel {
                channel_type: "Text",
                handle: handle.get(),
            });
        }
        let account = self.ctx.require_account()?;
        let contacts = self.ctx.handles().contacts();
        let recipient = contacts.inspect(handle)?;
        contacts.ref_handle(handle)?;

        let conversation = match account.new_conversation(&recipient) {
            Ok(c) => c,
            Err(e) => {
                if let Err(unref) = contacts.unref_handle(handle) {
                    debug!(%handle, error = %unref, "releasing handle after failed open");
                }
                return Err(e.into());
            },
        };

        let chan = ImChannel {
            object_path: format!("{}/ImChannel{}", self.ctx.object_path(), handle),
            handle,
            conversation,
            pending: VecDeque::new(),
            next_id: 0,
        };
        let info = chan.info();
        debug!(%handle, %recipient, object_path = %info.object_path, "created text channel");
        self.channels.insert(handle, chan);
        self.ctx.emit(ChannelEvent::NewChannel {
            info: info.clone(),
            suppress_handler,
        });
        Ok(info)
    }

    /// `Text.Send`. Unknown message types are rejected before anything is
    /// sent.
    pub fn send(&mut self, handle: Handle, message_type: u32, text: &str) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let chan = self.channel_mut(handle)?;
        let Some(message_type) = MessageType::from_raw(message_type) else {
            debug!(message_type, "invalid message type");
            return Err(Error::invalid_input(format!(
                "invalid message type: {message_type}"
            )));
        };
        chan.conversation.send_im(text)?;
        ctx.emit(ChannelEvent::Sent {
            object_path: chan.object_path.clone(),
            timestamp: unix_now(),
            message_type,
            text: text.to_string(),
        });
        Ok(())
    }

    /// `Channel.Close`. Destroys the conversation; closing an already
    /// closed channel is not an error.
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        if let Some(chan) = self.channels.remove(&handle) {
            chan.conversation.destroy();
            self.release(chan);
        }
        Ok(())
    }

    /// The engine tore the conversation with `peer` down on its own.
    pub fn conversation_destroyed(&mut self, peer: &str) {
        let Some(handle) = self.ctx.handles().contacts().lookup(peer) else {
            return;
        };
        if let Some(chan) = self.channels.remove(&handle) {
            info!(%handle, peer, "conversation closed by the engine");
            self.release(chan);
        }
    }

    /// An IM arrived from `from`. Opens a channel if none exists.
    pub fn message_received(
        &mut self,
        from: &str,
        text: &str,
        auto_reply: bool,
        timestamp: u64,
    ) -> Result<PendingMessage> {
        let sender = self.ctx.handles().contacts().ensure(from)?;
        if !self.channels.contains_key(&sender) {
            self.create_channel(sender, false)?;
        }
        let ctx = Arc::clone(&self.ctx);
        let chan = self.channel_mut(sender)?;
        let (message_type, body) = classify_incoming(text, auto_reply);
        let timestamp = if timestamp == 0 { unix_now() } else { timestamp };
        let message = chan.enqueue(sender, message_type, body, timestamp);
        ctx.emit(ChannelEvent::Received {
            object_path: chan.object_path.clone(),
            message: message.clone(),
        });
        Ok(message)
    }

    /// `Text.ListPendingMessages`.
    pub fn list_pending(&mut self, handle: Handle, clear: bool) -> Result<Vec<PendingMessage>> {
        let chan = self.channel_mut(handle)?;
        if clear {
            Ok(chan.pending.drain(..).collect())
        } else {
            Ok(chan.pending.iter().cloned().collect())
        }
    }

    /// `Text.AcknowledgePendingMessages`. Either every id is acknowledged
    /// or none is.
    pub fn acknowledge(&mut self, handle: Handle, ids: &[u32]) -> Result<()> {
        let chan = self.channel_mut(handle)?;
        if let Some(missing) = ids
            .iter()
            .find(|id| !chan.pending.iter().any(|m| m.id == **id))
        {
            return Err(Error::invalid_input(format!(
                "invalid pending message id: {missing}"
            )));
        }
        chan.pending.retain(|m| !ids.contains(&m.id));
        Ok(())
    }

    fn release(&self, chan: ImChannel) {
        if let Err(e) = self.ctx.handles().contacts().unref_handle(chan.handle) {
            warn!(handle = %chan.handle, error = %e, "releasing text channel handle");
        }
        self.ctx.emit(ChannelEvent::Closed {
            object_path: chan.object_path,
        });
    }
}

impl ChannelFactory for ImChannelFactory {
    fn name(&self) -> &'static str {
        "im"
    }

    fn close_all(&mut self) {
        let channels: Vec<ImChannel> = self.channels.drain().map(|(_, c)| c).collect();
        for chan in channels {
            chan.conversation.destroy();
            self.release(chan);
        }
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        self.channels.values().map(ImChannel::info).collect()
    }

    fn request(
        &mut self,
        channel_type: &str,
        handle_type: HandleType,
        handle: u32,
        suppress_handler: bool,
    ) -> RequestStatus {
        if channel_type != IFACE_CHANNEL_TYPE_TEXT {
            return RequestStatus::NotImplemented;
        }
        if handle_type != HandleType::Contact {
            return RequestStatus::NotAvailable(format!(
                "text channels cannot target handle type {}",
                handle_type.as_u32()
            ));
        }
        let Ok(handle) = self.ctx.handles().contacts().validate(handle) else {
            return RequestStatus::InvalidHandle;
        };
        if let Some(chan) = self.channels.get(&handle) {
            return RequestStatus::Existing(chan.info());
        }
        match self.create_channel(handle, suppress_handler) {
            Ok(info) => RequestStatus::Created(info),
            Err(e) => RequestStatus::Error(e),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
