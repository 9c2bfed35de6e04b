use clock::Tick;
use serde::Serialize;
use types::{
    nonstandard::PayloadStatus,
    phase0::{
        containers::Checkpoint,
        primitives::{Gwei, Slot, ValidatorIndex, H256},
    },
};

use crate::misc::BlockAndCheckpoints;

/// A block in the fork choice tree.
///
/// Links to other nodes are stored as roots and resolved through [`Store`](crate::Store).
/// Only `weight`, `best_child`, `best_descendant` and `payload_status` change after insertion.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Node {
    pub root: H256,
    pub parent_root: Option<H256>,
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub weight: Gwei,
    pub best_child: Option<H256>,
    /// [`None`] means the node is its own best descendant.
    pub best_descendant: Option<H256>,
    pub payload_status: PayloadStatus,
    pub timestamp: Tick,
}

impl Node {
    pub(crate) const fn new(
        block: BlockAndCheckpoints,
        payload_status: PayloadStatus,
        timestamp: Tick,
    ) -> Self {
        let BlockAndCheckpoints {
            root,
            parent_root,
            slot,
            proposer_index,
            justified_checkpoint,
            finalized_checkpoint,
        } = block;

        Self {
            root,
            parent_root,
            slot,
            proposer_index,
            justified_checkpoint,
            finalized_checkpoint,
            weight: 0,
            best_child: None,
            best_descendant: None,
            payload_status,
            timestamp,
        }
    }

    /// Score used to pick the best child.
    ///
    /// > Ties broken by favoring block with lexicographically higher root
    #[must_use]
    pub const fn score(&self) -> (Gwei, H256) {
        (self.weight, self.root)
    }

    #[must_use]
    pub fn head_candidate(&self) -> H256 {
        self.best_descendant.unwrap_or(self.root)
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.payload_status.is_valid()
    }

    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        self.payload_status.is_invalid()
    }

    #[must_use]
    pub const fn is_optimistic(&self) -> bool {
        self.payload_status.is_optimistic()
    }
}
