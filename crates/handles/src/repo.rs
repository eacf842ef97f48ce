use lilac_common::{Handle, HandleType, names::LIST_HANDLE_NAMES};

use crate::{DynamicHandleRepo, Error, Result, StaticHandleRepo};

/// A repository of handles of one type.
///
/// Every method takes `&self`; implementations keep their tables behind a
/// lock so the repository can be shared between the connection and its
/// channel factories.
pub trait HandleRepo: Send + Sync {
    /// The type of every handle in this repository.
    fn handle_type(&self) -> HandleType;

    /// Return the handle for `id`, allocating one if the repository allows.
    ///
    /// Does not take a reference; callers that keep the handle call
    /// [`HandleRepo::ref_handle`].
    fn ensure(&self, id: &str) -> Result<Handle>;

    /// Return the handle for `id` if one exists, without allocating.
    fn lookup(&self, id: &str) -> Option<Handle>;

    /// The identifier a handle stands for.
    fn inspect(&self, handle: Handle) -> Result<String>;

    fn is_valid(&self, handle: Handle) -> bool;

    /// Take a reference on a valid handle.
    fn ref_handle(&self, handle: Handle) -> Result<()>;

    /// Drop a reference previously taken with [`HandleRepo::ref_handle`].
    fn unref_handle(&self, handle: Handle) -> Result<()>;

    /// Validate a raw bus value as a handle of this repository.
    fn validate(&self, raw: u32) -> Result<Handle> {
        Handle::new(raw)
            .filter(|h| self.is_valid(*h))
            .ok_or(Error::InvalidHandle {
                handle_type: self.handle_type(),
                handle: raw,
            })
    }
}

/// The set of handle repositories owned by one connection.
pub struct HandleRepos {
    contacts: DynamicHandleRepo,
    groups: DynamicHandleRepo,
    lists: StaticHandleRepo,
}

impl HandleRepos {
    pub fn new() -> Self {
        Self {
            contacts: DynamicHandleRepo::new(HandleType::Contact),
            groups: DynamicHandleRepo::new(HandleType::Group),
            lists: StaticHandleRepo::new(HandleType::List, LIST_HANDLE_NAMES),
        }
    }

    pub fn contacts(&self) -> &DynamicHandleRepo {
        &self.contacts
    }

    pub fn groups(&self) -> &DynamicHandleRepo {
        &self.groups
    }

    pub fn lists(&self) -> &StaticHandleRepo {
        &self.lists
    }

    /// Repository for `handle_type`. Rooms are not supported.
    pub fn get(&self, handle_type: HandleType) -> Result<&dyn HandleRepo> {
        match handle_type {
            HandleType::Contact => Ok(&self.contacts),
            HandleType::Group => Ok(&self.groups),
            HandleType::List => Ok(&self.lists),
            HandleType::None | HandleType::Room => Err(Error::NotSupported { handle_type }),
        }
    }
}

impl Default for HandleRepos {
    fn default() -> Self {
        Self::new()
    }
}
