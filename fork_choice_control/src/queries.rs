use anyhow::Result;
use clock::Tick;
use fork_choice_store::{ChainHead, Error as StoreError, ForkChoiceDump, Store};
use types::{
    nonstandard::{PayloadStatus, WithStatus},
    phase0::{
        containers::Checkpoint,
        primitives::{Slot, H256},
    },
    preset::Preset,
};

use crate::{controller::Controller, misc::ForkTip};

// Queries take the read lock for as long as they run.
// Use `Controller::store_snapshot` to run several queries against the same state.
impl<P: Preset> Controller<P> {
    /// Canonical head along with its execution status.
    pub fn head(&self) -> Result<WithStatus<H256>> {
        self.store().head_with_status()
    }

    pub fn head_slot(&self) -> Result<Slot> {
        let store = self.store();
        let head = store.head()?;

        store
            .node(head)
            .map(|node| node.slot)
            .ok_or_else(|| StoreError::NodeNotFound { root: head }.into())
    }

    #[must_use]
    pub fn chain_heads(&self) -> Vec<ChainHead> {
        self.store().chain_heads()
    }

    #[must_use]
    pub fn fork_tips(&self) -> Vec<ForkTip> {
        let store = self.store();

        store
            .chain_heads()
            .into_iter()
            .map(|ChainHead { slot, root }| ForkTip {
                root,
                slot,
                execution_optimistic: store.is_optimistic(root).unwrap_or_default(),
            })
            .collect()
    }

    /// Fails with [`StoreError::NodeNotFound`] for unknown and pruned blocks.
    pub fn is_optimistic_for_root(&self, block_root: H256) -> Result<bool> {
        self.store()
            .is_optimistic(block_root)
            .ok_or_else(|| StoreError::NodeNotFound { root: block_root }.into())
    }

    #[must_use]
    pub fn payload_status(&self, block_root: H256) -> Option<PayloadStatus> {
        self.store().payload_status(block_root)
    }

    #[must_use]
    pub fn fork_choice_dump(&self) -> ForkChoiceDump {
        self.store().dump()
    }

    /// Returns a copy of the store that later mutations do not affect.
    ///
    /// This is cheap because the store consists of persistent data structures.
    #[must_use]
    pub fn store_snapshot(&self) -> Store<P> {
        self.store().clone()
    }

    #[must_use]
    pub fn tick(&self) -> Tick {
        self.store().tick()
    }

    #[must_use]
    pub fn slot(&self) -> Slot {
        self.store().slot()
    }

    #[must_use]
    pub fn justified_checkpoint(&self) -> Checkpoint {
        self.store().justified_checkpoint()
    }

    #[must_use]
    pub fn finalized_checkpoint(&self) -> Checkpoint {
        self.store().finalized_checkpoint()
    }

    #[must_use]
    pub fn proposer_boost_root(&self) -> Option<H256> {
        self.store().proposer_boost_root()
    }

    #[must_use]
    pub fn is_forward_synced(&self) -> bool {
        self.store().is_forward_synced()
    }
}
