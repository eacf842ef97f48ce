use std::collections::HashMap;

use {
    lilac_connection::ConnectionHandle,
    zbus::{interface, object_server::SignalEmitter},
};

use crate::{Result, convert};

/// `org.freedesktop.Telepathy.Connection.Interface.SimplePresence`.
pub struct PresenceIface {
    conn: ConnectionHandle,
}

impl PresenceIface {
    pub fn new(conn: ConnectionHandle) -> Self {
        Self { conn }
    }
}

#[interface(name = "org.freedesktop.Telepathy.Connection.Interface.SimplePresence")]
impl PresenceIface {
    fn set_presence(&self, status: String, status_message: String) -> Result<()> {
        Ok(self.conn.lock().set_presence(&status, &status_message)?)
    }

    fn get_presences(&self, contacts: Vec<u32>) -> Result<HashMap<u32, (u32, String, String)>> {
        let map = self.conn.lock().get_presences(&contacts)?;
        Ok(convert::presences(map))
    }

    #[zbus(property)]
    fn statuses(&self) -> HashMap<String, (u32, bool, bool)> {
        self.conn.lock().statuses().into_iter().collect()
    }

    #[zbus(signal)]
    pub async fn presences_changed(
        emitter: &SignalEmitter<'_>,
        presence: HashMap<u32, (u32, String, String)>,
    ) -> zbus::Result<()>;
}
