//! TapeStoreManager - routes requests to tape stores.
//!
//! Every request is served from one store. Normally that is the default store
//! bound to `tapes_path`; a `tape_path` hook can pick a different directory
//! per request, in which case the store for that directory is created on
//! first use and kept for the rest of the run.

use super::TapeStore;
use crate::error::{ConfigError, ProxyError, TapeError};
use crate::options::Options;
use crate::tape::{Request, Tape};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct TapeStoreManager {
    options: Arc<Options>,
    /// Stores by absolute, lexically normalized root directory
    stores: RwLock<HashMap<PathBuf, Arc<TapeStore>>>,
    default_store: Option<Arc<TapeStore>>,
}

impl TapeStoreManager {
    /// Create the manager and load the default store, if `tapes_path` is set.
    pub fn new(options: Arc<Options>) -> Result<Self, TapeError> {
        let mut stores = HashMap::new();
        let default_store = match &options.tapes_path {
            Some(path) => {
                let root = absolute(path)?;
                let store = Arc::new(TapeStore::open(&root, Arc::clone(&options))?);
                stores.insert(root, Arc::clone(&store));
                Some(store)
            }
            None => None,
        };

        Ok(Self {
            options,
            stores: RwLock::new(stores),
            default_store,
        })
    }

    /// The store that should serve `request`.
    pub fn store_for(&self, request: &Request) -> Result<Arc<TapeStore>, ProxyError> {
        let generated = self
            .options
            .hooks
            .tape_path
            .as_ref()
            .and_then(|tape_path| tape_path(request))
            .filter(|p| !p.trim().is_empty());

        match generated {
            Some(path) => self.store_at(Path::new(&path)),
            None => self
                .default_store
                .clone()
                .ok_or_else(|| ConfigError::NoTapeStorePath.into()),
        }
    }

    fn store_at(&self, path: &Path) -> Result<Arc<TapeStore>, ProxyError> {
        let root = absolute(path)?;
        if let Some(store) = self.stores.read().get(&root) {
            return Ok(Arc::clone(store));
        }

        let mut stores = self.stores.write();
        // Another request may have created it while we waited for the lock.
        if let Some(store) = stores.get(&root) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(TapeStore::open(&root, Arc::clone(&self.options))?);
        info!("Opened tape store at {:?}", root);
        stores.insert(root, Arc::clone(&store));
        Ok(store)
    }

    /// All managed stores, default store included.
    pub fn stores(&self) -> Vec<Arc<TapeStore>> {
        let mut stores: Vec<_> = self.stores.read().values().cloned().collect();
        stores.sort_by(|a, b| a.path().cmp(b.path()));
        stores
    }

    pub fn all_tapes(&self) -> Vec<Arc<Tape>> {
        self.stores().iter().flat_map(|store| store.tapes()).collect()
    }

    pub fn reset_tape_usage(&self) {
        for store in self.stores() {
            store.reset_tape_usage();
        }
    }

    pub fn has_tape_been_used(&self, name: &str) -> bool {
        self.stores()
            .iter()
            .any(|store| store.has_tape_been_used(name))
    }
}

/// Absolute form of `path` with `.` and `..` resolved without touching the
/// filesystem.
fn absolute(path: &Path) -> Result<PathBuf, TapeError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| TapeError::io(path, e))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
