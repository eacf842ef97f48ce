//! Configuration loading and env substitution.
//!
//! Config files: `lilac.toml`, `lilac.yaml`, `lilac.yml` or `lilac.json`,
//! searched in `./` then `~/.config/lilac/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, find_or_default_config_path, load_config, save_config},
    schema::{AccountConfig, BusKind, CapabilitiesConfig, LilacConfig, LoggingConfig, ManagerConfig},
};
