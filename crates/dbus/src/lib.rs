//! Telepathy objects on the bus.
//!
//! [`serve`] claims the connection manager's name and exports the
//! [`ManagerIface`]. Every connection it creates is exported by
//! [`export_connection`], which also spawns the pump that turns the
//! connection's [`ConnectionEvent`](lilac_connection::ConnectionEvent)s into
//! signals and object (un)registrations.

pub mod capabilities;
pub mod channel;
pub mod connection;
pub mod convert;
pub mod error;
pub mod manager;
pub mod media;
pub mod presence;
pub mod pump;

pub use {
    capabilities::{CapabilitiesIface, ContactCapabilitiesIface},
    channel::{ChannelIface, GroupIface, TextIface},
    connection::ConnectionIface,
    error::{Result, TpDbusError},
    manager::{BusType, ManagerIface, serve},
    media::{MediaSignallingIface, SessionHandlerIface, StreamHandlerIface},
    presence::PresenceIface,
    pump::export_connection,
};
