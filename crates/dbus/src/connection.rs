use {
    lilac_connection::ConnectionHandle,
    tracing::info,
    zbus::{
        interface,
        object_server::{ObjectServer, SignalEmitter},
        zvariant::{ObjectPath, OwnedObjectPath},
    },
};

use crate::{Result, channel, convert};

/// `org.freedesktop.Telepathy.Connection`.
pub struct ConnectionIface {
    conn: ConnectionHandle,
}

impl ConnectionIface {
    pub fn new(conn: ConnectionHandle) -> Self {
        Self { conn }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Connection")]
impl ConnectionIface {
    fn connect(&self) -> Result<()> {
        info!(bus_name = %self.conn.bus_name(), "connect requested");
        Ok(self.conn.lock().start()?)
    }

    fn disconnect(&self) {
        info!(bus_name = %self.conn.bus_name(), "disconnect requested");
        self.conn.disconnect();
    }

    fn get_status(&self) -> u32 {
        self.conn.lock().status().as_u32()
    }

    fn get_self_handle(&self) -> Result<u32> {
        Ok(self.conn.lock().get_self_handle()?)
    }

    fn get_protocol(&self) -> String {
        self.conn.lock().protocol().to_string()
    }

    fn get_interfaces(&self) -> Vec<String> {
        self.conn
            .lock()
            .interfaces()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn inspect_handles(&self, handle_type: u32, handles: Vec<u32>) -> Result<Vec<String>> {
        Ok(self.conn.lock().inspect_handles(handle_type, &handles)?)
    }

    fn request_handles(&self, handle_type: u32, names: Vec<String>) -> Result<Vec<u32>> {
        Ok(self.conn.lock().request_handles(handle_type, &names)?)
    }

    fn hold_handles(&self, handle_type: u32, handles: Vec<u32>) -> Result<()> {
        Ok(self.conn.lock().hold_handles(handle_type, &handles)?)
    }

    fn release_handles(&self, handle_type: u32, handles: Vec<u32>) -> Result<()> {
        Ok(self.conn.lock().release_handles(handle_type, &handles)?)
    }

    fn list_channels(&self) -> Result<Vec<(OwnedObjectPath, String, u32, u32)>> {
        let channels = self.conn.lock().list_channels()?;
        channels.iter().map(convert::channel).collect()
    }

    /// The channel object is on the bus before the reply goes out.
    async fn request_channel(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
        channel_type: String,
        handle_type: u32,
        handle: u32,
        suppress_handler: bool,
    ) -> Result<OwnedObjectPath> {
        let (path, info) = {
            let mut conn = self.conn.lock();
            let path =
                conn.request_channel(&channel_type, handle_type, handle, suppress_handler)?;
            let info = conn
                .list_channels()?
                .into_iter()
                .find(|c| c.object_path == path);
            (path, info)
        };
        if let Some(info) = info {
            channel::export_channel(server, &self.conn, &info).await?;
        }
        convert::object_path(&path)
    }

    #[zbus(signal)]
    pub async fn status_changed(
        emitter: &SignalEmitter<'_>,
        status: u32,
        reason: u32,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn new_channel(
        emitter: &SignalEmitter<'_>,
        object_path: ObjectPath<'_>,
        channel_type: &str,
        handle_type: u32,
        handle: u32,
        suppress_handler: bool,
    ) -> zbus::Result<()>;
}
