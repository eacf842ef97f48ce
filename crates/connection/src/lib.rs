//! One Telepathy connection per engine account.
//!
//! [`Connection`] is a single struct that implements the Connection,
//! SimplePresence, Capabilities and ContactCapabilities surfaces plus the
//! media session bookkeeping. It is driven by one task per connection
//! ([`driver::ConnectionHandle`]) that feeds it engine events and its own
//! deferred commands under a single lock.
//!
//! [`ConnectionManager`] creates connections and tracks the live ones.

pub mod capabilities;
pub mod connection;
pub mod driver;
pub mod error;
pub mod event;
pub mod manager;
pub mod media;
pub mod params;
pub mod presence;
pub mod server_option;
pub mod status;

pub use {
    capabilities::{
        CapabilityChange, CapabilityEntry, GenericCaps, RequestableChannelClass, StreamedMediaCaps,
    },
    connection::{Connection, ConnectionOptions, Wiring, WiringReceivers},
    driver::{Command, ConnectionHandle},
    error::{Error, Result},
    event::{ConnectionEvent, ConnectionEventSender},
    manager::{ConnectionManager, ParamFlags, ParamSpec},
    params::ConnectionParams,
    presence::{PresenceStatus, PresenceType, STATUSES, SimplePresence, StatusSpec},
    status::Phase,
};
