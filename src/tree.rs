//! The persistent left-leaning red-black tree: pure functional insert and
//! delete over [`NodeRef`]s, local rebalancing, and the commit that
//! cascades dirty writes down to the superblock.
//!
//! Every operation below is a straight translation of spec.md §4.3's
//! recursive descriptions. None of it mutates an existing node: each
//! function returns a fresh [`NodeRef`] (or the original, untouched, when
//! a subtree needs no change), so a new root always shares whatever
//! subtrees the update did not touch with the previous version.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::block_store::BlockStore;
use crate::error::{Error, Result};
use crate::node::{Color, Node, NodeRef, ValueRef};
use crate::reference::Ref;

/// The persistent tree rooted at a single node reference.
#[derive(Debug)]
pub struct Tree {
    root: NodeRef,
}

impl Tree {
    /// Opens the tree rooted at whatever address is currently published in
    /// `store`'s superblock (0, i.e. an empty tree, on a fresh store).
    pub fn open(store: &mut BlockStore) -> Result<Tree> {
        let addr = store.get_root_address()?;
        Ok(Tree { root: Ref::at(addr) })
    }

    fn refresh(&mut self, store: &mut BlockStore) -> Result<()> {
        let addr = store.get_root_address()?;
        trace!(addr, "refreshed root reference from superblock");
        self.root = Ref::at(addr);
        Ok(())
    }

    /// Looks up `key`. Refreshes from the superblock first unless this
    /// handle already holds the writer lock, so a reader always sees the
    /// most recently committed version.
    pub fn get(&mut self, store: &mut BlockStore, key: &[u8]) -> Result<Vec<u8>> {
        if !store.is_locked() {
            self.refresh(store)?;
        }
        let mut current = self.root.clone();
        loop {
            let node = current.resolve(store)?.ok_or(Error::NotFound)?;
            current = match key.cmp(node.key.as_slice()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => {
                    return node.value.resolve(store)?.ok_or_else(|| {
                        Error::Corruption(format!(
                            "node for key {:?} has no bound value",
                            node.key
                        ))
                    });
                }
            };
        }
    }

    /// Inserts `key` → `value`. Acquires the writer lock (refreshing the
    /// root if this is the first write by this handle since open or the
    /// last commit), builds a new, blackened root by functional insertion,
    /// and installs it as the in-memory root. Not durable until `commit`.
    pub fn set(&mut self, store: &mut BlockStore, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        if store.lock()? {
            self.refresh(store)?;
        }
        trace!(key = ?key, "set");
        let value_ref = Ref::resident(value);
        let new_root = Self::insert(store, self.root.clone(), key, value_ref)?;
        self.root = Self::blacken(store, new_root)?;
        Ok(())
    }

    /// Deletes `key`. Acquires the writer lock and refreshes as `set`
    /// does. Raises [`Error::NotFound`] and leaves the root unchanged if
    /// the key is absent. The rebuilt spine is not re-balanced and the
    /// root is not re-blackened afterward (see DESIGN.md OQ1/OQ2).
    pub fn delete(&mut self, store: &mut BlockStore, key: &[u8]) -> Result<()> {
        if store.lock()? {
            self.refresh(store)?;
        }
        trace!(key = ?key, "delete");
        self.root = Self::delete_node(store, self.root.clone(), key)?;
        Ok(())
    }

    /// Stores every dirty node reachable from the current root, then
    /// publishes its address as the new superblock root. This is the
    /// transaction's durability boundary; the writer lock is released by
    /// `commit_root_address` once the write lands.
    pub fn commit(&mut self, store: &mut BlockStore) -> Result<()> {
        let addr = self.root.store(store)?;
        store.commit_root_address(addr)?;
        debug!(addr, "committed tree");
        Ok(())
    }

    /// The key at the current in-memory root. Does not refresh: this is a
    /// window into whatever this handle has built, committed or not.
    pub fn root_key(&mut self, store: &mut BlockStore) -> Result<Vec<u8>> {
        match self.root.resolve(store)? {
            None => Err(Error::Empty),
            Some(node) => Ok(node.key),
        }
    }

    fn insert(
        store: &mut BlockStore,
        node_ref: NodeRef,
        key: Vec<u8>,
        value_ref: ValueRef,
    ) -> Result<NodeRef> {
        let node = node_ref.resolve(store)?;
        let new_node = match node {
            None => Node::leaf(key, value_ref),
            Some(node) => match key.cmp(&node.key) {
                Ordering::Less => {
                    let new_left = Self::insert(store, node.left.clone(), key, value_ref)?;
                    let new_left = Self::balance(store, new_left)?;
                    let candidate = Node {
                        left: new_left,
                        ..node
                    };
                    return Self::balance(store, Ref::resident(candidate));
                }
                Ordering::Greater => {
                    let new_right = Self::insert(store, node.right.clone(), key, value_ref)?;
                    let new_right = Self::balance(store, new_right)?;
                    let candidate = Node {
                        right: new_right,
                        ..node
                    };
                    return Self::balance(store, Ref::resident(candidate));
                }
                Ordering::Equal => Node {
                    value: value_ref,
                    ..node
                },
            },
        };
        Ok(Ref::resident(new_node))
    }

    fn delete_node(store: &mut BlockStore, node_ref: NodeRef, key: &[u8]) -> Result<NodeRef> {
        let node = node_ref.resolve(store)?.ok_or(Error::NotFound)?;
        let new_node = match key.cmp(node.key.as_slice()) {
            Ordering::Less => {
                let new_left = Self::delete_node(store, node.left.clone(), key)?;
                Node {
                    left: new_left,
                    ..node
                }
            }
            Ordering::Greater => {
                let new_right = Self::delete_node(store, node.right.clone(), key)?;
                Node {
                    right: new_right,
                    ..node
                }
            }
            Ordering::Equal => {
                let has_left = node.left.resolve(store)?.is_some();
                let has_right = node.right.resolve(store)?.is_some();
                match (has_left, has_right) {
                    (true, true) => {
                        let max = Self::find_max(store, node.left.clone())?;
                        let new_left = Self::delete_node(store, node.left.clone(), &max.key)?;
                        Node {
                            left: new_left,
                            key: max.key,
                            value: max.value,
                            right: node.right,
                            color: node.color,
                        }
                    }
                    (true, false) => return Ok(node.left),
                    (false, _) => return Ok(node.right),
                }
            }
        };
        Ok(Ref::resident(new_node))
    }

    /// Walks right from `node_ref` until it runs out of right children,
    /// returning the node found there.
    fn find_max(store: &mut BlockStore, node_ref: NodeRef) -> Result<Node> {
        let mut node = node_ref
            .resolve(store)?
            .expect("find_max is only called on a subtree known to be non-null");
        loop {
            match node.right.resolve(store)? {
                None => return Ok(node),
                Some(next) => node = next,
            }
        }
    }

    /// Restores the local left-leaning red-black invariants at `node_ref`.
    /// A null or already-RED node needs no work. Otherwise up to one
    /// rotation (possibly preceded by a rotation of a child) plus a
    /// recolor brings the node back into shape; see spec.md §4.3.
    fn balance(store: &mut BlockStore, node_ref: NodeRef) -> Result<NodeRef> {
        let node = match node_ref.resolve(store)? {
            None => return Ok(node_ref),
            Some(n) => n,
        };
        if node.is_red() {
            return Ok(node_ref);
        }

        let left_red = Self::ref_is_red(store, &node.left)?;
        let right_red = Self::ref_is_red(store, &node.right)?;

        if left_red {
            let left = node
                .left
                .resolve(store)?
                .expect("left_red implies a non-null left child");
            if right_red {
                return Ok(Ref::resident(Self::recolor(store, node)?));
            }
            if Self::ref_is_red(store, &left.left)? {
                let rotated = Self::rotate_right(store, node)?;
                return Ok(Ref::resident(Self::recolor(store, rotated)?));
            }
            if Self::ref_is_red(store, &left.right)? {
                let new_left = Ref::resident(Self::rotate_left(store, left)?);
                let node = Node {
                    left: new_left,
                    ..node
                };
                let rotated = Self::rotate_right(store, node)?;
                return Ok(Ref::resident(Self::recolor(store, rotated)?));
            }
        }
        if right_red {
            let right = node
                .right
                .resolve(store)?
                .expect("right_red implies a non-null right child");
            if Self::ref_is_red(store, &right.right)? {
                let rotated = Self::rotate_left(store, node)?;
                return Ok(Ref::resident(Self::recolor(store, rotated)?));
            }
            if Self::ref_is_red(store, &right.left)? {
                let new_right = Ref::resident(Self::rotate_right(store, right)?);
                let node = Node {
                    right: new_right,
                    ..node
                };
                let rotated = Self::rotate_left(store, node)?;
                return Ok(Ref::resident(Self::recolor(store, rotated)?));
            }
        }
        Ok(Ref::resident(node))
    }

    fn ref_is_red(store: &mut BlockStore, node_ref: &NodeRef) -> Result<bool> {
        Ok(node_ref.resolve(store)?.map_or(false, |n| n.is_red()))
    }

    /// `rotate_left(N)`: the new node takes R's key/value, its left child
    /// is a fresh node cloned from N with right child = R.left and N's
    /// color, and its right child is R.right, colored as R.
    fn rotate_left(store: &mut BlockStore, node: Node) -> Result<Node> {
        let right = node
            .right
            .resolve(store)?
            .expect("rotate_left requires a non-null right child");
        let new_left = Node {
            left: node.left,
            key: node.key,
            value: node.value,
            right: right.left,
            color: node.color,
        };
        Ok(Node {
            left: Ref::resident(new_left),
            key: right.key,
            value: right.value,
            right: right.right,
            color: right.color,
        })
    }

    /// Structural mirror of [`Self::rotate_left`].
    fn rotate_right(store: &mut BlockStore, node: Node) -> Result<Node> {
        let left = node
            .left
            .resolve(store)?
            .expect("rotate_right requires a non-null left child");
        let new_right = Node {
            left: left.right,
            key: node.key,
            value: node.value,
            right: node.right,
            color: node.color,
        };
        Ok(Node {
            left: left.left,
            key: left.key,
            value: left.value,
            right: Ref::resident(new_right),
            color: left.color,
        })
    }

    /// Paints both children BLACK and the node itself RED.
    fn recolor(store: &mut BlockStore, node: Node) -> Result<Node> {
        let left = Self::blacken(store, node.left)?;
        let right = Self::blacken(store, node.right)?;
        Ok(Node {
            left,
            key: node.key,
            value: node.value,
            right,
            color: Color::Red,
        })
    }

    /// Returns a clone of the referent colored BLACK, or `Null` unchanged.
    fn blacken(store: &mut BlockStore, node_ref: NodeRef) -> Result<NodeRef> {
        match node_ref.resolve(store)? {
            None => Ok(Ref::Null),
            Some(n) => Ok(Ref::resident(Node {
                color: Color::Black,
                ..n
            })),
        }
    }
}
