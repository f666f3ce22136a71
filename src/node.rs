//! Tree nodes and their on-disk encoding.

use serde::{Deserialize, Serialize};

use crate::block_store::{Address, BlockStore};
use crate::error::{Error, Result};
use crate::reference::{Ref, Storable};

/// A node's position in the left-leaning red-black coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

impl Color {
    fn to_u8(self) -> u8 {
        match self {
            Color::Red => 0,
            Color::Black => 1,
        }
    }

    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Color::Red),
            1 => Ok(Color::Black),
            other => Err(Error::Corruption(format!(
                "node block has invalid color byte {other}"
            ))),
        }
    }
}

/// A reference to a tree node.
pub type NodeRef = Ref<Node>;
/// A reference to a value block.
pub type ValueRef = Ref<Vec<u8>>;

/// A tree entry: a key, a reference to its value block, references to its
/// two children, and a color.
#[derive(Debug, Clone)]
pub struct Node {
    pub left: NodeRef,
    pub key: Vec<u8>,
    pub value: ValueRef,
    pub right: NodeRef,
    pub color: Color,
}

impl Node {
    pub fn leaf(key: Vec<u8>, value: ValueRef) -> Node {
        Node {
            left: Ref::Null,
            key,
            value,
            right: Ref::Null,
            color: Color::Red,
        }
    }

    pub fn is_red(&self) -> bool {
        self.color == Color::Red
    }
}

/// The on-disk shape of a node block: addresses of dependents plus the key
/// and color inline. This is the implementation's private wire format —
/// self-delimiting and deterministic, but not guaranteed stable across
/// implementations.
#[derive(Serialize, Deserialize)]
struct NodeRecord {
    left: Address,
    key: Vec<u8>,
    value: Address,
    right: Address,
    color: u8,
}

impl Storable for Node {
    fn prepare_to_store(&mut self, store: &mut BlockStore) -> Result<()> {
        // Value and children must be durable before this node's own bytes
        // are written, since the node's encoding references them only by
        // address.
        self.value.store(store)?;
        self.left.store(store)?;
        self.right.store(store)?;
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let record = NodeRecord {
            left: self.left.address(),
            key: self.key.clone(),
            value: self.value.address(),
            right: self.right.address(),
            color: self.color.to_u8(),
        };
        bincode::serialize(&record).map_err(|e| Error::Corruption(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let record: NodeRecord = bincode::deserialize(bytes)
            .map_err(|e| Error::Corruption(e.to_string()))?;
        Ok(Node {
            left: Ref::at(record.left),
            key: record.key,
            value: Ref::at(record.value),
            right: Ref::at(record.right),
            color: Color::from_u8(record.color)?,
        })
    }
}
