use fork_choice_store::Error as StoreError;
use serde::Serialize;
use strum::IntoStaticStr;
use thiserror::Error;
use types::phase0::primitives::{Slot, H256};

#[derive(Debug, Error)]
pub enum Error {
    #[error("fork choice is halted after a fatal error and must be restarted")]
    Halted,
}

/// Reasons for rejecting objects submitted by collaborators.
///
/// Only used for logging. Callers receive the underlying error.
#[derive(Clone, Copy, PartialEq, Eq, Debug, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum RejectionReason {
    InvalidBlock,
    EquivocatingBlock,
    UnsafeCheckpoint,
    ConflictingPayloadStatus,
    Other,
}

impl RejectionReason {
    #[must_use]
    pub fn of(error: &anyhow::Error) -> Self {
        match error.downcast_ref() {
            Some(
                StoreError::MissingParentRoot { .. }
                | StoreError::UnknownParent { .. }
                | StoreError::SlotNotAfterParent { .. },
            ) => Self::InvalidBlock,
            Some(StoreError::Equivocation { .. }) => Self::EquivocatingBlock,
            Some(
                StoreError::FinalizedEpochReverted { .. }
                | StoreError::FinalizedCheckpointConflict { .. }
                | StoreError::FinalizedNotDescendant { .. },
            ) => Self::UnsafeCheckpoint,
            Some(
                StoreError::InvalidAncestorOfValidPayload { .. }
                | StoreError::InvalidPayloadValidated { .. }
                | StoreError::ValidPayloadInvalidated { .. },
            ) => Self::ConflictingPayloadStatus,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct ForkTip {
    pub root: H256,
    pub slot: Slot,
    pub execution_optimistic: bool,
}
