//! The ConnectionManager object: protocol listing, parameters and
//! connection creation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    bitflags::bitflags,
    lilac_common::{escape_as_identifier, names::connection_bus_name},
    lilac_engine::{Engine, OptionValue, ProtocolInfo},
    tokio::sync::mpsc,
    tracing::info,
};

use crate::{
    ConnectionEvent, ConnectionHandle, ConnectionOptions, ConnectionParams, Error, Result,
    server_option::SERVER_OPTION_NAMES,
};

bitflags! {
    /// `Conn_Mgr_Param_Flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParamFlags: u32 {
        const REQUIRED = 1 << 0;
        const REGISTER = 1 << 1;
        const HAS_DEFAULT = 1 << 2;
        const SECRET = 1 << 3;
    }
}

/// One `GetParameters` entry `(susv)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub flags: ParamFlags,
    pub signature: &'static str,
    pub default: Option<OptionValue>,
}

/// Creates connections and keeps track of the live ones.
pub struct ConnectionManager {
    engine: Arc<dyn Engine>,
    options: ConnectionOptions,
    connections: Mutex<HashMap<String, ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new(engine: Arc<dyn Engine>, options: ConnectionOptions) -> Self {
        Self {
            engine,
            options,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// `ConnectionManager.ListProtocols`.
    pub fn list_protocols(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engine.protocols().into_iter().map(|p| p.id).collect();
        ids.sort();
        ids
    }

    fn protocol(&self, id: &str) -> Result<ProtocolInfo> {
        self.engine
            .find_protocol(id)
            .ok_or_else(|| Error::not_implemented(format!("unknown protocol {id}")))
    }

    /// `ConnectionManager.GetParameters`.
    pub fn get_parameters(&self, protocol: &str) -> Result<Vec<ParamSpec>> {
        let protocol = self.protocol(protocol)?;
        let mut params = vec![
            ParamSpec {
                name: "account".into(),
                flags: ParamFlags::REQUIRED,
                signature: "s",
                default: None,
            },
            ParamSpec {
                name: "password".into(),
                flags: ParamFlags::REQUIRED | ParamFlags::SECRET,
                signature: "s",
                default: None,
            },
        ];
        if let Some(option) = protocol
            .options
            .iter()
            .find(|o| SERVER_OPTION_NAMES.contains(&o.pref_name.as_str()))
        {
            params.push(ParamSpec {
                name: "server".into(),
                flags: ParamFlags::HAS_DEFAULT,
                signature: "s",
                default: Some(option.default.clone()),
            });
        }
        Ok(params)
    }

    /// `ConnectionManager.RequestConnection`. Returns the new connection and
    /// its event stream; the caller exports it on the bus.
    pub fn request_connection(
        &self,
        params: ConnectionParams,
    ) -> Result<(ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>)> {
        let protocol = self.protocol(&params.protocol)?;
        if params.username.is_empty() {
            return Err(Error::invalid_input("account must not be empty"));
        }
        let bus_name = connection_bus_name(&protocol.id, &escape_as_identifier(&params.username));

        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.retain(|_, c| c.is_running());
        if connections.contains_key(&bus_name) {
            return Err(Error::not_available(format!(
                "a connection named {bus_name} already exists"
            )));
        }

        let (handle, events) =
            ConnectionHandle::spawn(Arc::clone(&self.engine), params, self.options.clone())?;
        info!(bus_name = %handle.bus_name(), "connection requested");
        connections.insert(handle.bus_name().to_string(), handle.clone());
        Ok((handle, events))
    }

    /// Live connections, by bus name.
    pub fn connections(&self) -> Vec<ConnectionHandle> {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.retain(|_, c| c.is_running());
        connections.values().cloned().collect()
    }

    /// Forget a connection once its bus objects are gone.
    pub fn remove(&self, bus_name: &str) -> Option<ConnectionHandle> {
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(bus_name)
    }
}
