//! Error kinds surfaced by the block store, the reference layer, and the
//! tree. Every public operation either succeeds or returns exactly one of
//! these; none is retried internally.

use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The error kinds a database handle can raise.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `get` or `delete` was called for a key that is not present in the
    /// current tree.
    #[error("key not found")]
    NotFound,

    /// Any operation called after the handle was closed.
    #[error("database handle is closed")]
    Closed,

    /// `root_key` was called on an empty tree.
    #[error("tree is empty")]
    Empty,

    /// The block store detected a structurally invalid block: a length
    /// prefix that runs past end of file, a reserved address, or a node
    /// block that fails to decode.
    #[error("corrupt block store: {0}")]
    Corruption(String),

    /// The underlying file failed a read, write, seek, or lock operation.
    #[error("I/O error")]
    Io(#[from] io::Error),
}
