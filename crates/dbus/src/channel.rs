//! Channel objects: the common `Channel` interface plus `Type.Text` for IM
//! channels and `Interface.Group` for contact lists.

use {
    lilac_channels::{ChannelInfo, ListChannel},
    lilac_common::names::{IFACE_CHANNEL_INTERFACE_GROUP, IFACE_CHANNEL_TYPE_TEXT},
    lilac_connection::{Connection, ConnectionHandle},
    tracing::debug,
    zbus::{
        interface,
        object_server::{ObjectServer, SignalEmitter},
    },
};

use crate::{
    Result, TpDbusError,
    convert::{self, PendingTuple},
};

/// Export the objects behind `info` at its path. A channel that is already
/// exported is left alone.
pub(crate) async fn export_channel(
    server: &ObjectServer,
    conn: &ConnectionHandle,
    info: &ChannelInfo,
) -> zbus::Result<()> {
    let path = info.object_path.as_str();
    if !server
        .at(path, ChannelIface::new(conn.clone(), info.clone()))
        .await?
    {
        return Ok(());
    }
    if ChannelIface::is_text(info) {
        server.at(path, TextIface::new(conn.clone(), path)).await?;
    } else {
        server.at(path, GroupIface::new(conn.clone(), path)).await?;
    }
    debug!(path, channel_type = info.channel_type, "channel exported");
    Ok(())
}

/// `org.freedesktop.Telepathy.Channel`.
pub struct ChannelIface {
    conn: ConnectionHandle,
    info: ChannelInfo,
}

impl ChannelIface {
    pub fn new(conn: ConnectionHandle, info: ChannelInfo) -> Self {
        Self { conn, info }
    }

    pub(crate) fn is_text(info: &ChannelInfo) -> bool {
        info.channel_type == IFACE_CHANNEL_TYPE_TEXT
    }
}

#[interface(name = "org.freedesktop.Telepathy.Channel")]
impl ChannelIface {
    /// Text channels close; contact lists live as long as the connection.
    fn close(&self) -> Result<()> {
        if !Self::is_text(&self.info) {
            return Err(TpDbusError::NotImplemented(
                "contact lists cannot be closed".into(),
            ));
        }
        Ok(self.conn.lock().close_text_channel(&self.info.object_path)?)
    }

    fn get_channel_type(&self) -> String {
        self.info.channel_type.to_string()
    }

    fn get_handle(&self) -> (u32, u32) {
        (self.info.handle_type.as_u32(), self.info.handle)
    }

    fn get_interfaces(&self) -> Vec<String> {
        if Self::is_text(&self.info) {
            Vec::new()
        } else {
            vec![IFACE_CHANNEL_INTERFACE_GROUP.to_string()]
        }
    }

    #[zbus(signal)]
    pub async fn closed(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;
}

/// `org.freedesktop.Telepathy.Channel.Type.Text`.
pub struct TextIface {
    conn: ConnectionHandle,
    path: String,
}

impl TextIface {
    pub fn new(conn: ConnectionHandle, path: impl Into<String>) -> Self {
        Self {
            conn,
            path: path.into(),
        }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Channel.Type.Text")]
impl TextIface {
    fn send(&self, message_type: u32, text: String) -> Result<()> {
        Ok(self.conn.lock().send_message(&self.path, message_type, &text)?)
    }

    fn list_pending_messages(&self, clear: bool) -> Result<Vec<PendingTuple>> {
        let messages = self.conn.lock().list_pending_messages(&self.path, clear)?;
        Ok(messages.into_iter().map(convert::pending).collect())
    }

    fn acknowledge_pending_messages(&self, ids: Vec<u32>) -> Result<()> {
        Ok(self.conn.lock().acknowledge_pending_messages(&self.path, &ids)?)
    }

    fn get_message_types(&self) -> Result<Vec<u32>> {
        let conn = self.conn.lock();
        conn.im_channels()?
            .find_by_path(&self.path)
            .map(|c| c.message_types())
            .ok_or_else(|| TpDbusError::NotAvailable(format!("no channel at {}", self.path)))
    }

    #[zbus(signal)]
    pub async fn received(
        emitter: &SignalEmitter<'_>,
        id: u32,
        timestamp: u32,
        sender: u32,
        message_type: u32,
        flags: u32,
        text: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn sent(
        emitter: &SignalEmitter<'_>,
        timestamp: u32,
        message_type: u32,
        text: &str,
    ) -> zbus::Result<()>;
}

/// `org.freedesktop.Telepathy.Channel.Interface.Group` on a contact list.
/// Membership mirrors the roster and cannot be changed from the bus.
pub struct GroupIface {
    conn: ConnectionHandle,
    path: String,
}

impl GroupIface {
    pub fn new(conn: ConnectionHandle, path: impl Into<String>) -> Self {
        Self {
            conn,
            path: path.into(),
        }
    }

    fn with_list<T>(&self, f: impl FnOnce(&Connection, &ListChannel) -> T) -> Result<T> {
        let conn = self.conn.lock();
        let list = conn
            .contact_lists()?
            .find_by_path(&self.path)
            .ok_or_else(|| TpDbusError::NotAvailable(format!("no channel at {}", self.path)))?;
        Ok(f(&conn, list))
    }
}

#[interface(name = "org.freedesktop.Telepathy.Channel.Interface.Group")]
impl GroupIface {
    fn get_members(&self) -> Result<Vec<u32>> {
        self.with_list(|_, list| list.members())
    }

    fn get_local_pending_members(&self) -> Vec<u32> {
        Vec::new()
    }

    fn get_remote_pending_members(&self) -> Vec<u32> {
        Vec::new()
    }

    fn get_all_members(&self) -> Result<(Vec<u32>, Vec<u32>, Vec<u32>)> {
        self.with_list(|_, list| (list.members(), Vec::new(), Vec::new()))
    }

    fn get_self_handle(&self) -> Result<u32> {
        Ok(self.with_list(|conn, _| conn.get_self_handle())??)
    }

    fn get_group_flags(&self) -> Result<u32> {
        self.with_list(|_, list| list.group_flags())
    }

    fn add_members(&self, _contacts: Vec<u32>, _message: String) -> Result<()> {
        Err(TpDbusError::NotImplemented("the roster cannot be edited".into()))
    }

    fn remove_members(&self, _contacts: Vec<u32>, _message: String) -> Result<()> {
        Err(TpDbusError::NotImplemented("the roster cannot be edited".into()))
    }

    #[zbus(signal)]
    pub async fn members_changed(
        emitter: &SignalEmitter<'_>,
        message: &str,
        added: Vec<u32>,
        removed: Vec<u32>,
        local_pending: Vec<u32>,
        remote_pending: Vec<u32>,
        actor: u32,
        reason: u32,
    ) -> zbus::Result<()>;
}
