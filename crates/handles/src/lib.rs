//! Handle repositories.
//!
//! Maps opaque numeric handles to string identifiers per handle type.
//! Contacts and groups use a dynamic repository that allocates handles on
//! demand; contact lists use a static repository fixed at construction.

pub mod dynamic;
pub mod error;
pub mod repo;
pub mod static_repo;

pub use {
    dynamic::{DynamicHandleRepo, Normalizer},
    error::{Error, Result},
    repo::{HandleRepo, HandleRepos},
    static_repo::StaticHandleRepo,
};
