//! An embedded, single-file, ordered key-value store backed by a
//! persistent (copy-on-write) left-leaning red-black tree.
//!
//! Writers thread a fresh path of nodes from a new root down to the
//! touched leaf; every earlier version stays byte-intact on disk until a
//! new root address is published at a fixed, sector-aligned offset. That
//! single 8-byte write is the only mutation to already-written bytes the
//! file ever sees, and it is what makes a commit atomic.
//!
//! ```no_run
//! use persistent_bst::connect;
//!
//! # fn main() -> persistent_bst::Result<()> {
//! let mut db = connect("example.dbdb")?;
//! db.set(b"pavlos".to_vec(), b"aged".to_vec())?;
//! db.commit()?;
//! assert_eq!(db.get(b"pavlos")?, b"aged");
//! # Ok(())
//! # }
//! ```

mod block_store;
mod db;
mod error;
mod node;
mod reference;
mod tree;

pub use db::{connect, Database};
pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn open_empty_tree() {
        let file = NamedTempFile::new().unwrap();
        {
            let db = Database::open(file.path());
            assert!(db.is_ok());
        }
        let mut db = Database::open(file.path()).unwrap();
        assert!(matches!(db.root_key(), Err(Error::Empty)));
    }

    #[test]
    fn get_on_fresh_file_is_not_found() {
        let file = NamedTempFile::new().unwrap();
        let mut db = Database::open(file.path()).unwrap();
        assert!(matches!(db.get(b"anything"), Err(Error::NotFound)));
    }

    #[test]
    fn operations_after_close_are_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut db = Database::open(file.path()).unwrap();
        db.close().unwrap();
        assert!(matches!(db.get(b"x"), Err(Error::Closed)));
        assert!(matches!(
            db.set(b"x".to_vec(), b"y".to_vec()),
            Err(Error::Closed)
        ));
        assert!(matches!(db.commit(), Err(Error::Closed)));
        // closing twice is not an error
        assert!(db.close().is_ok());
    }
}
