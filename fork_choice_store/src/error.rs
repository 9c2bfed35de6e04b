use static_assertions::assert_eq_size;
use strum::AsRefStr;
use thiserror::Error;
use types::phase0::{
    containers::Checkpoint,
    primitives::{Gwei, Slot, ValidatorIndex, H256},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("block is not present in fork choice store: {root:?}")]
    NodeNotFound { root: H256 },
    #[error("block has no parent root and is not the anchor: {root:?}")]
    MissingParentRoot { root: H256 },
    #[error("parent of block is not present in fork choice store (block: {root:?}, parent: {parent_root:?})")]
    UnknownParent { root: H256, parent_root: H256 },
    #[error(
        "block slot is not later than parent slot \
         (block: {root:?}, slot: {slot}, parent_slot: {parent_slot})"
    )]
    SlotNotAfterParent {
        root: H256,
        slot: Slot,
        parent_slot: Slot,
    },
    #[error(
        "block equivocates with an existing block \
         (block: {root:?}, existing: {existing_root:?}, slot: {slot}, proposer: {proposer_index})"
    )]
    Equivocation {
        root: H256,
        existing_root: H256,
        slot: Slot,
        proposer_index: ValidatorIndex,
    },
    #[error(
        "finalized checkpoint moved backwards \
         (old: {old_checkpoint}, new: {new_checkpoint})"
    )]
    FinalizedEpochReverted {
        old_checkpoint: Checkpoint,
        new_checkpoint: Checkpoint,
    },
    #[error(
        "finalized checkpoint conflicts with current one \
         (old: {old_checkpoint}, new: {new_checkpoint})"
    )]
    FinalizedCheckpointConflict {
        old_checkpoint: Checkpoint,
        new_checkpoint: Checkpoint,
    },
    #[error(
        "finalized checkpoint does not descend from current one \
         (old: {old_checkpoint}, new: {new_checkpoint})"
    )]
    FinalizedNotDescendant {
        old_checkpoint: Checkpoint,
        new_checkpoint: Checkpoint,
    },
    #[error("block with valid payload has invalid ancestor (block: {root:?}, ancestor: {ancestor_root:?})")]
    InvalidAncestorOfValidPayload { root: H256, ancestor_root: H256 },
    #[error("block previously marked invalid was reported valid: {root:?}")]
    InvalidPayloadValidated { root: H256 },
    #[error("block previously marked valid was reported invalid: {root:?}")]
    ValidPayloadInvalidated { root: H256 },
    #[error("justified block has an invalid payload: {root:?}")]
    JustifiedNodeInvalid { root: H256 },
    #[error("best descendant is not present in fork choice store (block: {root:?}, best_descendant: {best_descendant:?})")]
    DanglingBestDescendant { root: H256, best_descendant: H256 },
    #[error("weight of block went below zero (block: {root:?}, weight: {weight}, difference: {difference})")]
    WeightUnderflow {
        root: H256,
        weight: Gwei,
        difference: i64,
    },
    #[error("weight of block overflowed (block: {root:?}, weight: {weight}, difference: {difference})")]
    WeightOverflow {
        root: H256,
        weight: Gwei,
        difference: i64,
    },
    #[error("vote difference for block overflowed: {root:?}")]
    DifferenceOverflow { root: H256 },
}

impl Error {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NodeNotFound { .. } => ErrorClass::NotFound,
            Self::MissingParentRoot { .. }
            | Self::UnknownParent { .. }
            | Self::SlotNotAfterParent { .. }
            | Self::FinalizedEpochReverted { .. }
            | Self::FinalizedCheckpointConflict { .. }
            | Self::FinalizedNotDescendant { .. }
            | Self::InvalidAncestorOfValidPayload { .. } => ErrorClass::InvalidAncestry,
            Self::Equivocation { .. } => ErrorClass::Equivocation,
            Self::InvalidPayloadValidated { .. }
            | Self::ValidPayloadInvalidated { .. }
            | Self::JustifiedNodeInvalid { .. }
            | Self::DanglingBestDescendant { .. }
            | Self::WeightUnderflow { .. }
            | Self::WeightOverflow { .. }
            | Self::DifferenceOverflow { .. } => ErrorClass::InconsistentState,
        }
    }

    /// Fatal errors mean the store can no longer be trusted to produce a safe head.
    ///
    /// Callers should stop feeding the store and wait for operator intervention.
    /// Attempts to validate an invalid payload are rejected without affecting the store.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::FinalizedEpochReverted { .. }
            | Self::FinalizedCheckpointConflict { .. }
            | Self::FinalizedNotDescendant { .. } => true,
            Self::InvalidPayloadValidated { .. } => false,
            _ => matches!(self.class(), ErrorClass::InconsistentState),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, AsRefStr)]
pub enum ErrorClass {
    NotFound,
    InvalidAncestry,
    Equivocation,
    InconsistentState,
}

/// Classifies an error returned by [`Store`](crate::Store) methods.
///
/// Errors that did not originate in the store are treated as [`ErrorClass::InconsistentState`].
#[must_use]
pub fn classify(error: &anyhow::Error) -> ErrorClass {
    error
        .downcast_ref::<Error>()
        .map_or(ErrorClass::InconsistentState, Error::class)
}

/// Like [`classify`], but for [`Error::is_fatal`].
#[must_use]
pub fn is_fatal(error: &anyhow::Error) -> bool {
    error.downcast_ref::<Error>().is_none_or(Error::is_fatal)
}

assert_eq_size!(Error, [usize; 11]);
