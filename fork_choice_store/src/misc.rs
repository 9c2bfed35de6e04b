use derive_more::Constructor;
use serde::Serialize;
use strum::AsRefStr;
use types::phase0::{
    containers::Checkpoint,
    primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
};

pub type Difference = i64;

/// A processed block along with the checkpoints recorded in its post-state.
///
/// This is all fork choice needs to know about a block.
/// Producing it requires running the state transition, which is done outside the store.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct BlockAndCheckpoints {
    pub root: H256,
    /// [`None`] only for the anchor the store is initialized with.
    pub parent_root: Option<H256>,
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

/// The latest message of a single validator.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Constructor)]
pub struct Vote {
    pub validator_index: ValidatorIndex,
    pub block_root: H256,
    pub target_epoch: Epoch,
}

/// Vote table entry.
///
/// `current_*` fields describe the vote currently reflected in block weights.
/// `next_*` fields describe the latest vote received.
/// The two are reconciled whenever votes are applied.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct VoteTracker {
    pub current_root: Option<H256>,
    pub current_balance: Gwei,
    pub next_root: Option<H256>,
    pub next_epoch: Epoch,
}

impl VoteTracker {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.next_root.is_none()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProposerBoost {
    pub root: H256,
    pub score: Gwei,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize)]
pub struct ChainHead {
    pub slot: Slot,
    pub root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, AsRefStr)]
pub enum ApplyBlockChanges {
    AlreadyKnown,
    CanonicalChainExtended {
        finalized_checkpoint_updated: bool,
    },
    Reorganized {
        finalized_checkpoint_updated: bool,
        old_head: H256,
    },
    AlternateChainExtended {
        finalized_checkpoint_updated: bool,
    },
}

impl ApplyBlockChanges {
    #[must_use]
    pub const fn is_finalized_checkpoint_updated(&self) -> bool {
        match *self {
            Self::AlreadyKnown => false,
            Self::CanonicalChainExtended {
                finalized_checkpoint_updated,
            }
            | Self::Reorganized {
                finalized_checkpoint_updated,
                ..
            }
            | Self::AlternateChainExtended {
                finalized_checkpoint_updated,
            } => finalized_checkpoint_updated,
        }
    }

    pub(crate) const fn with_finalized_checkpoint_updated(self) -> Self {
        match self {
            Self::AlreadyKnown => Self::AlreadyKnown,
            Self::CanonicalChainExtended { .. } => Self::CanonicalChainExtended {
                finalized_checkpoint_updated: true,
            },
            Self::Reorganized { old_head, .. } => Self::Reorganized {
                finalized_checkpoint_updated: true,
                old_head,
            },
            Self::AlternateChainExtended { .. } => Self::AlternateChainExtended {
                finalized_checkpoint_updated: true,
            },
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, AsRefStr)]
pub enum ApplyTickChanges {
    TickUpdated,
    SlotUpdated,
    Reorganized { old_head: H256 },
}
