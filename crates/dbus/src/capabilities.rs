use std::collections::HashMap;

use {
    lilac_connection::ConnectionHandle,
    zbus::{interface, object_server::SignalEmitter, zvariant::OwnedValue},
};

use crate::{
    Result,
    convert::{self, ChannelClassTuple},
};

/// `org.freedesktop.Telepathy.Connection.Interface.Capabilities`.
pub struct CapabilitiesIface {
    conn: ConnectionHandle,
}

impl CapabilitiesIface {
    pub fn new(conn: ConnectionHandle) -> Self {
        Self { conn }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Connection.Interface.Capabilities")]
impl CapabilitiesIface {
    fn advertise_capabilities(
        &self,
        add: Vec<(String, u32)>,
        remove: Vec<String>,
    ) -> Result<Vec<(String, u32)>> {
        Ok(self.conn.lock().advertise_capabilities(&add, &remove)?)
    }

    fn get_capabilities(&self, handles: Vec<u32>) -> Result<Vec<(u32, String, u32, u32)>> {
        let entries = self.conn.lock().get_capabilities(&handles)?;
        Ok(convert::capability_entries(entries))
    }

    #[zbus(signal)]
    pub async fn capabilities_changed(
        emitter: &SignalEmitter<'_>,
        caps: Vec<(u32, String, u32, u32, u32, u32)>,
    ) -> zbus::Result<()>;
}

type HandlerCapabilities = (String, Vec<HashMap<String, OwnedValue>>, Vec<String>);

/// `org.freedesktop.Telepathy.Connection.Interface.ContactCapabilities`.
pub struct ContactCapabilitiesIface {
    conn: ConnectionHandle,
}

impl ContactCapabilitiesIface {
    pub fn new(conn: ConnectionHandle) -> Self {
        Self { conn }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Connection.Interface.ContactCapabilities")]
impl ContactCapabilitiesIface {
    /// `a(saa{sv}as)`: handler capabilities are accepted and ignored.
    fn update_capabilities(&self, _handler_capabilities: Vec<HandlerCapabilities>) -> Result<()> {
        Ok(self.conn.lock().update_capabilities()?)
    }

    fn get_contact_capabilities(
        &self,
        handles: Vec<u32>,
    ) -> Result<HashMap<u32, Vec<ChannelClassTuple>>> {
        let caps = self.conn.lock().get_contact_capabilities(&handles)?;
        Ok(caps
            .into_iter()
            .map(|(handle, classes)| {
                (handle, classes.into_iter().map(convert::channel_class).collect())
            })
            .collect())
    }
}
