use serde::Serialize;
use types::{
    nonstandard::PayloadStatus,
    phase0::{
        containers::Checkpoint,
        primitives::{Gwei, Slot, H256},
    },
};

use crate::node::Node;

/// Point-in-time view of a [`Store`](crate::Store) for debugging endpoints and tests.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ForkChoiceDump {
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub proposer_boost_root: Option<H256>,
    pub head_root: Option<H256>,
    pub node_count: usize,
    /// Ordered by slot, then by root.
    pub nodes: Vec<NodeDump>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct NodeDump {
    pub root: H256,
    pub parent_root: Option<H256>,
    pub slot: Slot,
    pub weight: Gwei,
    pub best_child: Option<H256>,
    pub best_descendant: Option<H256>,
    pub payload_status: PayloadStatus,
}

impl From<&Node> for NodeDump {
    fn from(node: &Node) -> Self {
        Self {
            root: node.root,
            parent_root: node.parent_root,
            slot: node.slot,
            weight: node.weight,
            best_child: node.best_child,
            best_descendant: node.best_descendant,
            payload_status: node.payload_status,
        }
    }
}
