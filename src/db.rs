//! The thin facade an application actually talks to: one handle holding a
//! block store and the tree's current root, forwarding get/set/delete/
//! commit and refusing everything but a repeat `close` once closed.

use std::path::Path;

use tracing::debug;

use crate::block_store::BlockStore;
use crate::error::{Error, Result};
use crate::tree::Tree;

/// An open handle to a persistent-bst file.
///
/// Not a process-wide singleton: every piece of state a handle needs lives
/// on the `Database` value itself, and durability across handles (in this
/// process or another) is synchronized purely through the backing file's
/// advisory lock.
#[derive(Debug)]
pub struct Database {
    store: Option<BlockStore>,
    tree: Tree,
}

impl Database {
    /// Opens `path`, creating it if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Database> {
        let mut store = BlockStore::open(path)?;
        let tree = Tree::open(&mut store)?;
        Ok(Database {
            store: Some(store),
            tree,
        })
    }

    /// Looks up `key`, returning the value most recently bound to it by a
    /// `set` that this handle has either made itself or observed via a
    /// commit from another handle.
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let Database { store, tree } = self;
        let store = store.as_mut().ok_or(Error::Closed)?;
        tree.get(store, key)
    }

    /// Binds `key` to `value`. The change is visible to this handle
    /// immediately but not durable, and not visible to other handles,
    /// until `commit`.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let Database { store, tree } = self;
        let store = store.as_mut().ok_or(Error::Closed)?;
        tree.set(store, key, value)
    }

    /// Removes `key`. Fails with [`Error::NotFound`] if it is not present,
    /// leaving the in-memory tree unchanged.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let Database { store, tree } = self;
        let store = store.as_mut().ok_or(Error::Closed)?;
        tree.delete(store, key)
    }

    /// Publishes the current in-memory root as the new durable version.
    /// Two consecutive commits with no intervening write publish the same
    /// address the second time.
    pub fn commit(&mut self) -> Result<()> {
        let Database { store, tree } = self;
        let store = store.as_mut().ok_or(Error::Closed)?;
        tree.commit(store)
    }

    /// The key at the current in-memory root; a test hook for observing
    /// balance behavior, not part of the storage contract.
    pub fn root_key(&mut self) -> Result<Vec<u8>> {
        let Database { store, tree } = self;
        let store = store.as_mut().ok_or(Error::Closed)?;
        tree.root_key(store)
    }

    /// Releases the file lock if held and closes the file. Idempotent:
    /// closing an already-closed handle is a no-op, not an error.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut store) = self.store.take() {
            debug!("closing database handle");
            store.close()?;
        }
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Opens `path` as a persistent-bst database, creating it if needed. A
/// thin wrapper over [`Database::open`].
pub fn connect<P: AsRef<Path>>(path: P) -> Result<Database> {
    Database::open(path)
}
