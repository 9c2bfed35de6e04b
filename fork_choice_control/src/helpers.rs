use core::ops::Range;
use std::sync::Arc;

use clock::Tick;
use fork_choice_store::{ApplyBlockChanges, BlockAndCheckpoints, ErrorClass, StoreConfig, Vote};
use types::{
    config::Config,
    nonstandard::PayloadStatus,
    phase0::{
        containers::Checkpoint,
        primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
    preset::Minimal,
};

use crate::controller::Controller;

pub const GENESIS: H256 = H256::zero();

// 200 validators with a balance of 1 produce a proposer boost of 10 in the minimal preset.
pub const VALIDATOR_COUNT: usize = 200;

pub struct Context {
    controller: Arc<Controller<Minimal>>,
}

impl Context {
    #[must_use]
    pub fn minimal() -> Self {
        Self::with_balances(core::iter::repeat_n(1, VALIDATOR_COUNT).collect())
    }

    #[must_use]
    pub fn with_balances(balances: Arc<[Gwei]>) -> Self {
        let anchor = BlockAndCheckpoints {
            root: GENESIS,
            parent_root: None,
            slot: 0,
            proposer_index: 0,
            justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
        };

        let controller = Controller::new(
            Arc::new(Config::minimal()),
            StoreConfig::default(),
            anchor,
            balances,
            Tick::start_of_slot(0),
        )
        .expect("minimal configuration should be valid");

        Self { controller }
    }

    #[must_use]
    pub fn controller(&self) -> &Arc<Controller<Minimal>> {
        &self.controller
    }

    /// Proposer indices are derived from roots so that distinct blocks never equivocate.
    #[must_use]
    pub fn block(&self, root: H256, parent_root: H256, slot: Slot) -> BlockAndCheckpoints {
        BlockAndCheckpoints {
            root,
            parent_root: Some(parent_root),
            slot,
            proposer_index: root.to_low_u64_be(),
            justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),
        }
    }

    pub fn on_slot(&self, slot: Slot) {
        self.on_tick(Tick::start_of_slot(slot));
    }

    pub fn on_tick(&self, tick: Tick) {
        self.controller
            .on_tick(tick)
            .expect("tick should be applied");
    }

    pub fn on_acceptable_block(&self, block: BlockAndCheckpoints) -> ApplyBlockChanges {
        let changes = self
            .controller
            .on_block(block, PayloadStatus::Valid)
            .expect("block should be accepted");

        assert_ne!(changes, ApplyBlockChanges::AlreadyKnown);

        changes
    }

    pub fn on_optimistic_block(&self, block: BlockAndCheckpoints) {
        self.controller
            .on_block(block, PayloadStatus::Optimistic)
            .expect("block should be accepted");
    }

    pub fn on_ignorable_block(&self, block: BlockAndCheckpoints) {
        let changes = self
            .controller
            .on_block(block, PayloadStatus::Valid)
            .expect("duplicate block should not be an error");

        assert_eq!(changes, ApplyBlockChanges::AlreadyKnown);
    }

    pub fn on_rejected_block(&self, block: BlockAndCheckpoints) -> ErrorClass {
        let error = self
            .controller
            .on_block(block, PayloadStatus::Valid)
            .expect_err("block should be rejected");

        fork_choice_store::classify(&error)
    }

    pub fn on_votes(
        &self,
        block_root: H256,
        validator_indices: Range<ValidatorIndex>,
        target_epoch: Epoch,
    ) {
        self.controller
            .on_votes(
                validator_indices
                    .map(|validator_index| Vote::new(validator_index, block_root, target_epoch)),
            )
            .expect("votes should be applied");
    }

    pub fn on_valid_payload(&self, block_root: H256) {
        self.controller
            .on_payload_status(block_root, PayloadStatus::Valid)
            .expect("payload status should be recorded");
    }

    pub fn assert_head(&self, expected_head: H256) {
        let actual_head = self.controller.head().expect("head should exist").value;
        assert_eq!(actual_head, expected_head);
    }

    pub fn assert_proposer_boost_root(&self, expected_root: Option<H256>) {
        assert_eq!(self.controller.proposer_boost_root(), expected_root);
    }

    pub fn assert_payload_status(&self, block_root: H256, expected_status: PayloadStatus) {
        assert_eq!(
            self.controller.payload_status(block_root),
            Some(expected_status),
        );
    }

    pub fn assert_status(&self, expected_status: Status) {
        let head = self.controller.head().expect("head should exist");
        let snapshot = self.controller.store_snapshot();

        let actual_status = Status {
            head: head.value,
            optimistic: head.optimistic,
            store_justified_epoch: snapshot.justified_checkpoint().epoch,
            store_finalized_epoch: snapshot.finalized_checkpoint().epoch,
            chain_head_count: snapshot.chain_heads().len(),
            node_count: snapshot.node_count(),
        };

        assert_eq!(actual_status, expected_status);
    }
}

#[derive(PartialEq, Eq, Debug)]
pub struct Status {
    pub head: H256,
    pub optimistic: bool,
    pub store_justified_epoch: Epoch,
    pub store_finalized_epoch: Epoch,
    pub chain_head_count: usize,
    pub node_count: usize,
}

#[must_use]
pub const fn root(byte: u8) -> H256 {
    H256::repeat_byte(byte)
}
