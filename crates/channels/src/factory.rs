use std::{
    any::Any,
    sync::{Arc, RwLock},
};

use {
    lilac_common::{Handle, HandleType},
    lilac_engine::Account,
    lilac_handles::HandleRepos,
};

use crate::{ChannelEvent, ChannelEventSink, Error};

/// What a client sees of a live channel (`ListChannels` entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub object_path: String,
    pub channel_type: &'static str,
    pub handle_type: HandleType,
    pub handle: u32,
}

/// Outcome of [`ChannelFactory::request`].
#[derive(Debug)]
pub enum RequestStatus {
    /// A new channel was created for this request.
    Created(ChannelInfo),
    /// A channel already existed and is returned as-is.
    Existing(ChannelInfo),
    /// This factory does not deal with the requested channel type.
    NotImplemented,
    /// The channel type is handled but not for this target.
    NotAvailable(String),
    InvalidHandle,
    Error(Error),
}

/// Produces and owns channels of one kind.
///
/// Lifecycle hooks are called by the connection as its status changes.
pub trait ChannelFactory: Any + Send {
    fn name(&self) -> &'static str;

    /// Close and forget every channel.
    fn close_all(&mut self);

    fn connecting(&mut self) {}

    fn connected(&mut self) {}

    fn disconnected(&mut self) {}

    /// Every live channel.
    fn channels(&self) -> Vec<ChannelInfo>;

    fn request(
        &mut self,
        channel_type: &str,
        handle_type: HandleType,
        handle: u32,
        suppress_handler: bool,
    ) -> RequestStatus;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Session {
    account: Arc<dyn Account>,
    self_handle: Handle,
}

/// State shared by every factory of one connection.
pub struct ChannelContext {
    object_path: String,
    handles: Arc<HandleRepos>,
    sink: Arc<dyn ChannelEventSink>,
    session: RwLock<Option<Session>>,
}

impl ChannelContext {
    pub fn new(
        object_path: impl Into<String>,
        handles: Arc<HandleRepos>,
        sink: Arc<dyn ChannelEventSink>,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            handles,
            sink,
            session: RwLock::new(None),
        }
    }

    /// Object path of the owning connection.
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn handles(&self) -> &HandleRepos {
        &self.handles
    }

    pub fn emit(&self, event: ChannelEvent) {
        self.sink.emit(event);
    }

    /// Attach the backing account once the connection has created it.
    pub fn set_session(&self, account: Arc<dyn Account>, self_handle: Handle) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = Some(Session {
            account,
            self_handle,
        });
    }

    pub fn clear_session(&self) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = None;
    }

    pub fn account(&self) -> Option<Arc<dyn Account>> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| Arc::clone(&s.account))
    }

    pub fn self_handle(&self) -> Option<Handle> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.self_handle)
    }

    pub(crate) fn require_account(&self) -> crate::Result<Arc<dyn Account>> {
        self.account()
            .ok_or_else(|| Error::unavailable("connection has no account"))
    }
}
