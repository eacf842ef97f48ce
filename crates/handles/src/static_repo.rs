use lilac_common::{Handle, HandleType};

use crate::{Error, HandleRepo, Result};

/// Repository with a fixed set of names. Handle `n` is the `n`th name,
/// counting from one.
pub struct StaticHandleRepo {
    handle_type: HandleType,
    names: Vec<String>,
}

impl StaticHandleRepo {
    pub fn new(handle_type: HandleType, names: &[&str]) -> Self {
        Self {
            handle_type,
            names: names.iter().map(|n| (*n).to_string()).collect(),
        }
    }

    fn index(&self, handle: Handle) -> Option<usize> {
        let idx = usize::try_from(handle.get()).ok()?.checked_sub(1)?;
        (idx < self.names.len()).then_some(idx)
    }

    fn invalid(&self, handle: Handle) -> Error {
        Error::InvalidHandle {
            handle_type: self.handle_type,
            handle: handle.get(),
        }
    }
}

impl HandleRepo for StaticHandleRepo {
    fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    fn ensure(&self, id: &str) -> Result<Handle> {
        self.lookup(id).ok_or_else(|| Error::UnknownId {
            handle_type: self.handle_type,
            id: id.to_string(),
        })
    }

    fn lookup(&self, id: &str) -> Option<Handle> {
        let pos = self.names.iter().position(|n| n == id)?;
        Handle::new(u32::try_from(pos).ok()?.checked_add(1)?)
    }

    fn inspect(&self, handle: Handle) -> Result<String> {
        self.index(handle)
            .map(|i| self.names[i].clone())
            .ok_or_else(|| self.invalid(handle))
    }

    fn is_valid(&self, handle: Handle) -> bool {
        self.index(handle).is_some()
    }

    fn ref_handle(&self, handle: Handle) -> Result<()> {
        if self.is_valid(handle) {
            Ok(())
        } else {
            Err(self.invalid(handle))
        }
    }

    fn unref_handle(&self, handle: Handle) -> Result<()> {
        self.ref_handle(handle)
    }
}
