//! Backing-engine abstraction.
//!
//! The multi-protocol IM engine (accounts, conversations, presence, media)
//! sits behind the [`Engine`], [`Account`], [`Conversation`] and
//! [`MediaSession`] traits. Asynchronous engine callbacks are delivered as
//! [`EngineEvent`]s to subscribers.
//!
//! [`loopback::LoopbackEngine`] is an in-process implementation used by the
//! binary's `loopback` protocol and by tests.

pub mod engine;
pub mod error;
pub mod event;
pub mod loopback;
pub mod subscription;
pub mod types;

pub use {
    engine::{Account, Conversation, Engine, MediaSession},
    error::{Error, Result},
    event::{AccountKey, EngineEvent},
    subscription::{EventReceiver, EventSender, Subscribers, SubscriptionId},
    types::{
        AccountOption, Buddy, Candidate, Codec, DisconnectReason, EngineStatus, MediaCaps,
        MediaState, MediaType, OptionValue, ProtocolInfo, StatusPrimitive,
    },
};
