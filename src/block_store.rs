//! The append-only block file and its atomic root-swap commit protocol.
//!
//! Everything that touches durability or cross-process exclusion lives
//! here: the rest of the crate only ever asks a `BlockStore` to read an
//! address, write some bytes, or publish a new root.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Absolute byte offset into the backing file. `0` means "none".
pub type Address = u64;

/// Size in bytes of the zero-filled header that guarantees the root
/// address write always lands on a sector boundary.
pub const SUPERBLOCK_SIZE: usize = 4096;

const LENGTH_PREFIX_SIZE: u64 = 8;

/// Owns the backing file: append-only blocks, the root pointer, and the
/// whole-file advisory lock that serializes writers across processes.
#[derive(Debug)]
pub struct BlockStore {
    file: File,
    locked: bool,
}

impl BlockStore {
    /// Opens `path` for reading and writing, creating it if it does not
    /// exist. On first open of a new file the superblock is padded with
    /// zero bytes so later writes start on a sector-aligned offset.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<BlockStore> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let mut store = BlockStore {
            file,
            locked: false,
        };
        store.ensure_superblock()?;
        Ok(store)
    }

    fn ensure_superblock(&mut self) -> Result<()> {
        self.lock()?;
        let end = self.file.seek(SeekFrom::End(0))?;
        if end < SUPERBLOCK_SIZE as u64 {
            debug!(bytes = SUPERBLOCK_SIZE as u64 - end, "padding superblock");
            let padding = vec![0u8; SUPERBLOCK_SIZE - end as usize];
            self.file.write_all(&padding)?;
        }
        self.unlock()?;
        Ok(())
    }

    /// Whether this handle currently holds the exclusive advisory lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Takes the exclusive lock if this handle does not already hold it.
    /// Returns `true` if the lock was newly acquired, `false` if it was
    /// already held (reentrant at most once).
    pub fn lock(&mut self) -> Result<bool> {
        if self.locked {
            return Ok(false);
        }
        trace!("acquiring exclusive lock");
        self.file.lock_exclusive()?;
        self.locked = true;
        Ok(true)
    }

    /// Flushes and releases the lock if held; a no-op otherwise.
    pub fn unlock(&mut self) -> Result<()> {
        if self.locked {
            self.file.flush()?;
            FileExt::unlock(&self.file)?;
            self.locked = false;
            trace!("released exclusive lock");
        }
        Ok(())
    }

    /// Reads the length-prefixed block at `addr`.
    pub fn read(&mut self, addr: Address) -> Result<Vec<u8>> {
        if addr == 0 {
            return Err(Error::Corruption(
                "address 0 is reserved and does not name a block".into(),
            ));
        }
        self.file.seek(SeekFrom::Start(addr))?;
        let mut len_bytes = [0u8; 8];
        self.file.read_exact(&mut len_bytes)?;
        let len = u64::from_be_bytes(len_bytes);

        let file_len = self.file.metadata()?.len();
        if addr.saturating_add(LENGTH_PREFIX_SIZE).saturating_add(len) > file_len {
            return Err(Error::Corruption(format!(
                "block at {addr} claims length {len}, which runs past end of file ({file_len} bytes)"
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Appends a length-prefixed block to end of file, returning the
    /// address of its length prefix. Acquires the lock if not already
    /// held; does not flush or release it (batched by `commit_root_address`).
    pub fn write(&mut self, data: &[u8]) -> Result<Address> {
        self.lock()?;
        let addr = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&(data.len() as u64).to_be_bytes())?;
        self.file.write_all(data)?;
        trace!(addr, len = data.len(), "wrote block");
        Ok(addr)
    }

    /// Reads the root address currently published in the superblock.
    pub fn get_root_address(&mut self) -> Result<Address> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8; 8];
        self.file.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Publishes `addr` as the new root: this single sector-aligned write
    /// is the linearization point of a transaction.
    pub fn commit_root_address(&mut self, addr: Address) -> Result<()> {
        self.lock()?;
        self.file.flush()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&addr.to_be_bytes())?;
        self.file.flush()?;
        debug!(addr, "published new root address");
        self.unlock()?;
        Ok(())
    }

    /// Releases the lock if held. The file itself closes on drop.
    pub fn close(&mut self) -> Result<()> {
        self.unlock()
    }
}
