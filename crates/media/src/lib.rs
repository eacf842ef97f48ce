//! Media session handling: one [`MediaBackend`] per engine call, holding
//! the [`MediaStream`]s the engine has added to it.

pub mod backend;
pub mod error;
pub mod event;
pub mod stream;

pub use {
    backend::MediaBackend,
    error::{Error, Result},
    event::{MediaEvent, MediaEventSink, StreamDirection},
    stream::MediaStream,
};
