//! Telepathy channels and the factories that own them.
//!
//! A connection owns one [`FactoryRegistry`] holding a
//! [`ContactListFactory`] (the `subscribe` roster list) and an
//! [`ImChannelFactory`] (one text channel per contact). Factories keep
//! their channels in maps keyed by handle and report everything that should
//! become a bus signal as a [`ChannelEvent`].

pub mod contact_list;
pub mod error;
pub mod event;
pub mod factory;
pub mod im;
pub mod registry;
pub mod text;

pub use {
    contact_list::{ContactListFactory, ListChannel},
    error::{Error, Result},
    event::{ChannelEvent, ChannelEventSink},
    factory::{ChannelContext, ChannelFactory, ChannelInfo, RequestStatus},
    im::{ImChannel, ImChannelFactory},
    registry::FactoryRegistry,
    text::{MessageType, PendingMessage},
};
