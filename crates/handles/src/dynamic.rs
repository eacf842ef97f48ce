use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use {
    lilac_common::{Handle, HandleType},
    tracing::trace,
};

use crate::{Error, HandleRepo, Result};

/// Maps a client-supplied identifier to its canonical form.
pub type Normalizer = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

struct Entry {
    id: String,
    refs: u32,
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<String, Handle>,
    entries: HashMap<Handle, Entry>,
    last: u32,
}

/// Repository that allocates a handle the first time an identifier is seen.
///
/// Handles stay valid for the lifetime of the repository, so a given
/// normalized identifier always maps to the same handle. Reference counts
/// record who is holding a handle; they never free it.
pub struct DynamicHandleRepo {
    handle_type: HandleType,
    normalizer: RwLock<Option<Normalizer>>,
    tables: Mutex<Tables>,
}

impl DynamicHandleRepo {
    pub fn new(handle_type: HandleType) -> Self {
        Self {
            handle_type,
            normalizer: RwLock::new(None),
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Install the normalizer used by subsequent `ensure`/`lookup` calls.
    pub fn set_normalizer(&self, normalizer: Normalizer) {
        let mut slot = self.normalizer.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(normalizer);
    }

    /// Number of references currently held on `handle`.
    pub fn ref_count(&self, handle: Handle) -> Option<u32> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.entries.get(&handle).map(|e| e.refs)
    }

    fn normalize(&self, id: &str) -> Result<String> {
        if id.is_empty() {
            return Err(Error::invalid_id(id, "identifier is empty"));
        }
        let normalizer = self
            .normalizer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let normalized = match normalizer {
            Some(f) => f(id)?,
            None => id.to_string(),
        };
        if normalized.is_empty() {
            return Err(Error::invalid_id(id, "identifier normalizes to nothing"));
        }
        Ok(normalized)
    }

    fn invalid(&self, handle: Handle) -> Error {
        Error::InvalidHandle {
            handle_type: self.handle_type,
            handle: handle.get(),
        }
    }
}

impl HandleRepo for DynamicHandleRepo {
    fn handle_type(&self) -> HandleType {
        self.handle_type
    }

    fn ensure(&self, id: &str) -> Result<Handle> {
        let normalized = self.normalize(id)?;
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = tables.by_id.get(&normalized) {
            return Ok(*handle);
        }

        let next = tables.last.checked_add(1).ok_or_else(|| {
            Error::invalid_id(normalized.clone(), "handle space exhausted")
        })?;
        let handle = Handle::new(next).ok_or_else(|| {
            Error::invalid_id(normalized.clone(), "handle space exhausted")
        })?;
        tables.last = next;
        tables.by_id.insert(normalized.clone(), handle);
        trace!(handle_type = ?self.handle_type, %handle, id = %normalized, "allocated handle");
        tables.entries.insert(handle, Entry {
            id: normalized,
            refs: 0,
        });
        Ok(handle)
    }

    fn lookup(&self, id: &str) -> Option<Handle> {
        let normalized = self.normalize(id).ok()?;
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.by_id.get(&normalized).copied()
    }

    fn inspect(&self, handle: Handle) -> Result<String> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables
            .entries
            .get(&handle)
            .map(|e| e.id.clone())
            .ok_or_else(|| self.invalid(handle))
    }

    fn is_valid(&self, handle: Handle) -> bool {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.entries.contains_key(&handle)
    }

    fn ref_handle(&self, handle: Handle) -> Result<()> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let entry = tables
            .entries
            .get_mut(&handle)
            .ok_or_else(|| self.invalid(handle))?;
        entry.refs = entry.refs.saturating_add(1);
        Ok(())
    }

    fn unref_handle(&self, handle: Handle) -> Result<()> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let entry = tables
            .entries
            .get_mut(&handle)
            .ok_or_else(|| self.invalid(handle))?;
        if entry.refs == 0 {
            return Err(Error::NotHeld {
                handle: handle.get(),
            });
        }
        entry.refs -= 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_stable_per_identifier() {
        let repo = DynamicHandleRepo::new(HandleType::Contact);
        let a = repo.ensure("alice").unwrap();
        let b = repo.ensure("bob").unwrap();
        assert_ne!(a, b);
        assert_eq!(repo.ensure("alice").unwrap(), a);
        assert_eq!(repo.inspect(b).unwrap(), "bob");
    }

    #[test]
    fn normalizer_folds_identifiers() {
        let repo = DynamicHandleRepo::new(HandleType::Contact);
        repo.set_normalizer(Arc::new(|id: &str| -> Result<String> {
            Ok(id.trim().to_lowercase())
        }));
        let a = repo.ensure("Alice@Example.com").unwrap();
        assert_eq!(repo.ensure(" alice@example.com ").unwrap(), a);
        assert_eq!(repo.inspect(a).unwrap(), "alice@example.com");
        assert_eq!(repo.lookup("ALICE@EXAMPLE.COM"), Some(a));
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let repo = DynamicHandleRepo::new(HandleType::Contact);
        assert!(matches!(repo.ensure(""), Err(Error::InvalidId { .. })));
    }

    #[test]
    fn identifier_normalized_to_nothing_is_rejected() {
        let repo = DynamicHandleRepo::new(HandleType::Contact);
        repo.set_normalizer(Arc::new(|id: &str| -> Result<String> {
            Ok(id.split('/').next().unwrap_or_default().to_string())
        }));
        assert!(matches!(repo.ensure("/phone"), Err(Error::InvalidId { .. })));
        assert!(repo.lookup("/phone").is_none());
    }

    #[test]
    fn references_are_counted() {
        let repo = DynamicHandleRepo::new(HandleType::Contact);
        let h = repo.ensure("carol").unwrap();
        assert_eq!(repo.ref_count(h), Some(0));
        repo.ref_handle(h).unwrap();
        repo.ref_handle(h).unwrap();
        assert_eq!(repo.ref_count(h), Some(2));
        repo.unref_handle(h).unwrap();
        repo.unref_handle(h).unwrap();
        assert!(matches!(repo.unref_handle(h), Err(Error::NotHeld { .. })));
        // Released handles stay valid.
        assert!(repo.is_valid(h));
    }

    #[test]
    fn unknown_handle_is_invalid() {
        let repo = DynamicHandleRepo::new(HandleType::Group);
        let bogus = Handle::new(99).unwrap();
        assert!(!repo.is_valid(bogus));
        assert!(repo.inspect(bogus).is_err());
        assert!(repo.ref_handle(bogus).is_err());
        assert!(repo.lookup("nobody").is_none());
    }
}
