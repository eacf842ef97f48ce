//! Shared types, error definitions, and Telepathy naming used across all
//! lilac crates.

pub mod error;
pub mod escape;
pub mod names;
pub mod types;

pub use {
    error::{FromMessage, TpError},
    escape::escape_as_identifier,
    types::{ConnectionStatus, Handle, HandleType, StatusReason},
};
