//! End-to-end scenarios from spec.md §8: each opens a fresh file through
//! `connect`, drives a sequence of set/delete/commit/close/reopen calls,
//! and checks the externally observable result. These are the acceptance
//! tests for the crate, not unit tests of any one module.

use persistent_bst::{connect, Error};
use tempfile::NamedTempFile;

/// Installs a `tracing` subscriber so the block store's and tree's
/// `debug!`/`trace!` spans print under `cargo test -- --nocapture` (set
/// `RUST_LOG=persistent_bst=trace` to see everything). Safe to call from
/// every test: `try_init` no-ops once a subscriber is already installed.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn temp_path() -> NamedTempFile {
    init_tracing();
    NamedTempFile::new().expect("failed to create temp file")
}

/// P2 / scenario 1: uncommitted writes do not survive close + reopen.
#[test]
fn uncommitted_writes_are_lost_on_reopen() {
    let file = temp_path();
    {
        let mut db = connect(file.path()).unwrap();
        db.set(b"rahul".to_vec(), b"aged".to_vec()).unwrap();
        db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
        db.set(b"kobe".to_vec(), b"stillyoung".to_vec()).unwrap();
        db.close().unwrap();
    }
    let mut db = connect(file.path()).unwrap();
    assert!(matches!(db.get(b"rahul"), Err(Error::NotFound)));
}

/// P1 / scenario 2: committed writes survive close + reopen.
#[test]
fn committed_writes_survive_reopen() {
    let file = temp_path();
    {
        let mut db = connect(file.path()).unwrap();
        db.set(b"rahul".to_vec(), b"aged".to_vec()).unwrap();
        db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
        db.set(b"kobe".to_vec(), b"stillyoung".to_vec()).unwrap();
        db.commit().unwrap();
        db.close().unwrap();
    }
    let mut db = connect(file.path()).unwrap();
    assert_eq!(db.get(b"rahul").unwrap(), b"aged");
}

/// P5 / scenario 3: shadowing a key within the same uncommitted session.
#[test]
fn shadowing_within_a_session() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    db.set(b"rahul".to_vec(), b"aged".to_vec()).unwrap();
    db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
    db.set(b"kobe".to_vec(), b"stillyoung".to_vec()).unwrap();
    db.set(b"rahul".to_vec(), b"young".to_vec()).unwrap();
    assert_eq!(db.get(b"rahul").unwrap(), b"young");
}

/// P5 / scenario 4: shadowing survives a commit and reopen.
#[test]
fn shadowing_survives_commit_and_reopen() {
    let file = temp_path();
    {
        let mut db = connect(file.path()).unwrap();
        db.set(b"rahul".to_vec(), b"aged".to_vec()).unwrap();
        db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
        db.set(b"kobe".to_vec(), b"stillyoung".to_vec()).unwrap();
        db.set(b"rahul".to_vec(), b"young".to_vec()).unwrap();
        db.commit().unwrap();
        db.close().unwrap();
    }
    let mut db = connect(file.path()).unwrap();
    assert_eq!(db.get(b"rahul").unwrap(), b"young");
}

/// Scenario 5: a committed delete makes the key disappear across reopen.
#[test]
fn committed_delete_survives_reopen() {
    let file = temp_path();
    {
        let mut db = connect(file.path()).unwrap();
        db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
        db.delete(b"pavlos").unwrap();
        db.commit().unwrap();
        db.close().unwrap();
    }
    let mut db = connect(file.path()).unwrap();
    assert!(matches!(db.get(b"pavlos"), Err(Error::NotFound)));
}

/// Scenario 6: three ordered inserts rotate the middle key to the root
/// rather than leaving a degenerate right spine.
#[test]
fn balancing_keeps_the_middle_key_at_the_root() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
    db.set(b"rahul".to_vec(), b"aged".to_vec()).unwrap();
    db.set(b"victor".to_vec(), b"aged".to_vec()).unwrap();
    assert_eq!(db.root_key().unwrap(), b"rahul");
}

/// P6 / scenario 7: a second handle's commit is visible to a third handle
/// without either handle ever sharing in-memory state.
#[test]
fn cross_handle_visibility() {
    let file = temp_path();
    {
        let mut a = connect(file.path()).unwrap();
        a.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
        a.commit().unwrap();
        a.close().unwrap();
    }
    {
        let mut b = connect(file.path()).unwrap();
        b.set(b"rahul".to_vec(), b"young".to_vec()).unwrap();
        b.commit().unwrap();
        b.close().unwrap();
    }
    let mut c = connect(file.path()).unwrap();
    assert_eq!(c.get(b"pavlos").unwrap(), b"aged");
    assert_eq!(c.get(b"rahul").unwrap(), b"young");
}

/// P4: two consecutive commits with no intervening write are idempotent —
/// the second publishes the same root address as the first.
#[test]
fn repeated_commit_is_idempotent() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
    db.commit().unwrap();
    let size_after_first_commit = std::fs::metadata(file.path()).unwrap().len();
    db.commit().unwrap();
    let size_after_second_commit = std::fs::metadata(file.path()).unwrap().len();
    assert_eq!(size_after_first_commit, size_after_second_commit);
}

/// P7: the file never shrinks, even across a delete.
#[test]
fn file_size_is_monotone() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    let mut last_len = std::fs::metadata(file.path()).unwrap().len();
    for (key, value) in [
        (&b"a"[..], &b"1"[..]),
        (&b"b"[..], &b"2"[..]),
        (&b"c"[..], &b"3"[..]),
    ] {
        db.set(key.to_vec(), value.to_vec()).unwrap();
        db.commit().unwrap();
        let len = std::fs::metadata(file.path()).unwrap().len();
        assert!(len >= last_len);
        last_len = len;
    }
    db.delete(b"b").unwrap();
    db.commit().unwrap();
    let len = std::fs::metadata(file.path()).unwrap().len();
    assert!(len >= last_len);
}

/// Deleting an absent key raises NotFound and does not disturb the tree.
#[test]
fn delete_of_missing_key_is_not_found_and_harmless() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
    assert!(matches!(db.delete(b"victor"), Err(Error::NotFound)));
    assert_eq!(db.get(b"pavlos").unwrap(), b"aged");
}

/// `get` for a key that was never set raises NotFound, not some other
/// error kind, even once the tree is non-empty.
#[test]
fn get_of_missing_key_in_nonempty_tree_is_not_found() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
    db.set(b"rahul".to_vec(), b"aged".to_vec()).unwrap();
    db.commit().unwrap();
    assert!(matches!(db.get(b"victor"), Err(Error::NotFound)));
}

/// Overwriting a key keeps only the latest value reachable by `get`, even
/// though the old value's bytes may still be lying around in the file
/// (permitted by P5).
#[test]
fn overwrite_keeps_only_latest_value() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    db.set(b"pavlos".to_vec(), b"aged".to_vec()).unwrap();
    db.set(b"pavlos".to_vec(), b"young".to_vec()).unwrap();
    db.commit().unwrap();
    assert_eq!(db.get(b"pavlos").unwrap(), b"young");
}

/// root_key on an empty, freshly-opened file raises Empty rather than
/// panicking or returning a default key.
#[test]
fn root_key_on_empty_tree_is_empty_error() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    assert!(matches!(db.root_key(), Err(Error::Empty)));
}

/// A larger, out-of-order insertion sequence still finds every key, and
/// deletion removes exactly the key asked for.
#[test]
fn many_keys_insert_and_delete() {
    let file = temp_path();
    let mut db = connect(file.path()).unwrap();
    let keys: Vec<Vec<u8>> = (0..64).map(|i: u32| format!("key-{i:03}").into_bytes()).collect();
    for (i, key) in keys.iter().enumerate() {
        db.set(key.clone(), format!("value-{i}").into_bytes()).unwrap();
    }
    db.commit().unwrap();
    db.close().unwrap();

    let mut db = connect(file.path()).unwrap();
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(db.get(key).unwrap(), format!("value-{i}").into_bytes());
    }

    db.delete(&keys[10]).unwrap();
    db.delete(&keys[30]).unwrap();
    db.commit().unwrap();
    db.close().unwrap();

    let mut db = connect(file.path()).unwrap();
    assert!(matches!(db.get(&keys[10]), Err(Error::NotFound)));
    assert!(matches!(db.get(&keys[30]), Err(Error::NotFound)));
    for (i, key) in keys.iter().enumerate() {
        if i == 10 || i == 30 {
            continue;
        }
        assert_eq!(db.get(key).unwrap(), format!("value-{i}").into_bytes());
    }
}
