//! The lazy reference layer that unifies "in-memory unwritten payload" and
//! "on-disk payload at address A". This is what makes the tree a persistent
//! data structure: every update threads a chain of fresh `Ref`s from a new
//! root down to the touched leaf, while everything else is shared by
//! address with the previous version.

use crate::block_store::{Address, BlockStore};
use crate::error::Result;

/// A type that can be the resident payload of a [`Ref`].
///
/// `Vec<u8>` (opaque values) and [`crate::node::Node`] (tree nodes) are the
/// two implementations this crate needs; a node's `prepare_to_store`
/// recursively stores its children and value before it serializes itself,
/// which is what keeps a write bounded to the modified path plus one new
/// value.
pub trait Storable: Sized {
    /// Called once, immediately before `encode`, so that anything this
    /// payload depends on is durable before the payload's own bytes (which
    /// may reference it by address) are written.
    fn prepare_to_store(&mut self, _store: &mut BlockStore) -> Result<()> {
        Ok(())
    }

    /// Serializes the payload to its on-disk block bytes.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Deserializes a payload from block bytes.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

impl Storable for Vec<u8> {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

/// A handle that may carry a resident payload, an on-disk address, or both,
/// and lazily bridges the two.
#[derive(Debug)]
pub enum Ref<T> {
    /// Empty subtree / absent value.
    Null,
    /// A payload built in memory this has not yet been written.
    Resident(Box<T>),
    /// An address on disk with no payload materialized in memory.
    Persisted(Address),
    /// A payload that has been stored and whose address is known.
    Both(Box<T>, Address),
}

impl<T: Clone> Clone for Ref<T> {
    fn clone(&self) -> Self {
        match self {
            Ref::Null => Ref::Null,
            Ref::Resident(v) => Ref::Resident(v.clone()),
            Ref::Persisted(a) => Ref::Persisted(*a),
            Ref::Both(v, a) => Ref::Both(v.clone(), *a),
        }
    }
}

impl<T: Storable + Clone> Ref<T> {
    /// A reference to an in-memory payload not yet written anywhere.
    pub fn resident(value: T) -> Self {
        Ref::Resident(Box::new(value))
    }

    /// A reference to an address, or `Null` if the address is the
    /// reserved "none" value.
    pub fn at(addr: Address) -> Self {
        if addr == 0 {
            Ref::Null
        } else {
            Ref::Persisted(addr)
        }
    }

    /// True for the empty-subtree / absent-value reference.
    pub fn is_null(&self) -> bool {
        matches!(self, Ref::Null)
    }

    /// The on-disk address this reference resolves to, or `0` if it has
    /// not been stored yet (or is `Null`).
    pub fn address(&self) -> Address {
        match self {
            Ref::Null | Ref::Resident(_) => 0,
            Ref::Persisted(addr) | Ref::Both(_, addr) => *addr,
        }
    }

    /// Materializes the referent: the resident payload if there is one,
    /// otherwise the block read and decoded from disk. Returns `None` for
    /// `Null`.
    pub fn resolve(&self, store: &mut BlockStore) -> Result<Option<T>> {
        match self {
            Ref::Null => Ok(None),
            Ref::Resident(v) | Ref::Both(v, _) => Ok(Some((**v).clone())),
            Ref::Persisted(addr) => {
                let bytes = store.read(*addr)?;
                Ok(Some(T::decode(&bytes)?))
            }
        }
    }

    /// Ensures the referent is durable, writing it (and, for a node,
    /// recursively storing its dependents first) if it has not been
    /// written yet. A no-op if the reference is already persisted or
    /// `Null`. Returns the referent's address.
    pub fn store(&mut self, store: &mut BlockStore) -> Result<Address> {
        match self {
            Ref::Null => Ok(0),
            Ref::Persisted(addr) | Ref::Both(_, addr) => Ok(*addr),
            Ref::Resident(_) => {
                let mut boxed = match std::mem::replace(self, Ref::Null) {
                    Ref::Resident(b) => b,
                    _ => unreachable!("checked above"),
                };
                boxed.prepare_to_store(store)?;
                let bytes = boxed.encode()?;
                let addr = store.write(&bytes)?;
                *self = Ref::Both(boxed, addr);
                Ok(addr)
            }
        }
    }
}
