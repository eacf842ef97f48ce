use std::{collections::HashMap, sync::Arc};

use {
    lilac_common::names::{CM_BUS_NAME_PREFIX, CM_OBJECT_PATH_PREFIX},
    lilac_connection::ConnectionManager,
    tracing::{info, warn},
    zbus::{
        Connection, interface,
        object_server::SignalEmitter,
        zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value},
    },
};

use crate::{Result, convert, export_connection};

/// `org.freedesktop.Telepathy.ConnectionManager`.
pub struct ManagerIface {
    manager: Arc<ConnectionManager>,
}

impl ManagerIface {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

#[interface(name = "org.freedesktop.Telepathy.ConnectionManager")]
impl ManagerIface {
    fn list_protocols(&self) -> Vec<String> {
        self.manager.list_protocols()
    }

    fn get_parameters(&self, protocol: String) -> Result<Vec<(String, u32, String, Value<'static>)>> {
        let params = self.manager.get_parameters(&protocol)?;
        Ok(params.into_iter().map(convert::param).collect())
    }

    async fn request_connection(
        &self,
        protocol: String,
        parameters: HashMap<String, OwnedValue>,
        #[zbus(connection)] bus: &Connection,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> Result<(String, OwnedObjectPath)> {
        let params = convert::connection_params(&protocol, parameters)?;
        let (conn, events) = self.manager.request_connection(params)?;
        let bus_name = conn.bus_name().to_string();
        let path = convert::object_path(conn.object_path())?;

        if let Err(e) = export_connection(bus, Arc::clone(&self.manager), conn.clone(), events).await {
            warn!(bus_name = %bus_name, error = %e, "failed to export connection");
            conn.abort();
            self.manager.remove(&bus_name);
            return Err(e.into());
        }

        Self::new_connection(
            &emitter,
            &bus_name,
            ObjectPath::try_from(path.as_str())?,
            &protocol,
        )
        .await?;
        Ok((bus_name, path))
    }

    #[zbus(signal)]
    pub async fn new_connection(
        emitter: &SignalEmitter<'_>,
        bus_name: &str,
        object_path: ObjectPath<'_>,
        protocol: &str,
    ) -> zbus::Result<()>;
}

/// Which bus to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusType {
    #[default]
    Session,
    System,
}

/// Connect to the bus, export the manager object and claim
/// `org.freedesktop.Telepathy.ConnectionManager.<name>`.
pub async fn serve(
    bus_type: BusType,
    name: &str,
    manager: Arc<ConnectionManager>,
) -> zbus::Result<Connection> {
    let bus_name = format!("{CM_BUS_NAME_PREFIX}{name}");
    let path = format!("{CM_OBJECT_PATH_PREFIX}{name}");
    let builder = match bus_type {
        BusType::Session => zbus::connection::Builder::session()?,
        BusType::System => zbus::connection::Builder::system()?,
    };
    let bus = builder
        .serve_at(path.as_str(), ManagerIface::new(manager))?
        .name(bus_name.as_str())?
        .build()
        .await?;
    info!(bus_name = %bus_name, path = %path, "connection manager on the bus");
    Ok(bus)
}
