// All mutations of the fork choice store go through a single `RwLock`.
// Readers observe a totally ordered sequence of store states and never see partial updates.
//
// Nothing here blocks on I/O while holding the lock. Callers waiting for an execution engine or a
// database do so before calling the `on_*` methods.
//
// A fatal error halts the controller. All later mutations fail with `Error::Halted` until the
// application is restarted. Queries keep working so that the state can be inspected.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{ensure, Result};
use clock::Tick;
use fork_choice_store::{
    ApplyBlockChanges, ApplyTickChanges, BlockAndCheckpoints, Store, StoreConfig, Vote,
};
use log::{debug, error};
use parking_lot::{RwLock, RwLockReadGuard};
use types::{
    config::Config as ChainConfig,
    nonstandard::PayloadStatus,
    phase0::{
        containers::Checkpoint,
        primitives::{Gwei, ValidatorIndex, H256},
    },
    preset::Preset,
};

use crate::misc::{Error, RejectionReason};

pub struct Controller<P: Preset> {
    store: RwLock<Store<P>>,
    halted: AtomicBool,
}

impl<P: Preset> Controller<P> {
    pub fn new(
        chain_config: Arc<ChainConfig>,
        store_config: StoreConfig,
        anchor: BlockAndCheckpoints,
        balances: Arc<[Gwei]>,
        tick: Tick,
    ) -> Result<Arc<Self>> {
        chain_config.validate()?;

        let mut store = Store::new(chain_config, store_config, anchor, balances);

        store.apply_tick(tick)?;

        Ok(Arc::new(Self {
            store: RwLock::new(store),
            halted: AtomicBool::new(false),
        }))
    }

    pub fn on_block(
        &self,
        block: BlockAndCheckpoints,
        payload_status: PayloadStatus,
    ) -> Result<ApplyBlockChanges> {
        let changes = self.mutate(|store| store.apply_block(block, payload_status))?;

        if let ApplyBlockChanges::Reorganized { old_head, .. } = changes {
            features::log!(
                LogHeadChanges,
                "block {:?} caused a reorganization away from {old_head:?}",
                block.root,
            );
        }

        Ok(changes)
    }

    pub fn on_optimistic_chain(
        &self,
        blocks: impl IntoIterator<Item = BlockAndCheckpoints>,
    ) -> Result<ApplyBlockChanges> {
        self.mutate(|store| store.insert_optimistic_chain(blocks))
    }

    pub fn on_votes(&self, votes: impl IntoIterator<Item = Vote>) -> Result<Option<H256>> {
        self.mutate(|store| store.apply_votes(votes))
    }

    pub fn on_vote(&self, vote: Vote, balance: Gwei) -> Result<Option<H256>> {
        self.mutate(|store| store.process_vote(vote, balance))
    }

    pub fn on_justified_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        self.mutate(|store| Ok(store.update_justified_checkpoint(checkpoint)))
    }

    pub fn on_finalized_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        self.mutate(|store| store.update_finalized_checkpoint(checkpoint))
    }

    /// Records a payload status reported by the execution layer.
    ///
    /// [`PayloadStatus::Optimistic`] means the execution layer has not decided yet and is ignored.
    pub fn on_payload_status(
        &self,
        block_root: H256,
        payload_status: PayloadStatus,
    ) -> Result<Option<H256>> {
        let valid = match payload_status {
            PayloadStatus::Valid => true,
            PayloadStatus::Invalid => false,
            PayloadStatus::Optimistic => return Ok(None),
        };

        self.mutate(|store| store.set_optimistic_status(block_root, valid))
    }

    pub fn on_balances(&self, balances: Arc<[Gwei]>) -> Result<Option<H256>> {
        self.mutate(|store| store.update_balances(balances))
    }

    pub fn on_slashed_validators(
        &self,
        validator_indices: impl IntoIterator<Item = ValidatorIndex>,
    ) -> Result<Option<H256>> {
        self.mutate(|store| store.apply_slashed_validators(validator_indices))
    }

    pub fn on_tick(&self, tick: Tick) -> Result<Option<ApplyTickChanges>> {
        self.mutate(|store| store.apply_tick(tick))
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub(crate) fn store(&self) -> RwLockReadGuard<'_, Store<P>> {
        self.store.read()
    }

    fn mutate<T>(&self, mutation: impl FnOnce(&mut Store<P>) -> Result<T>) -> Result<T> {
        let mut store = self.store.write();

        // Checked under the lock so that writers queued behind a fatal error see the halt.
        ensure!(!self.is_halted(), Error::Halted);

        mutation(&mut store).inspect_err(|error| {
            let reason: &str = RejectionReason::of(error).into();

            if fork_choice_store::is_fatal(error) {
                error!("fork choice halted ({reason}): {error:?}");
                self.halted.store(true, Ordering::SeqCst);
            } else {
                debug!("fork choice rejected input ({reason}): {error}");
            }
        })
    }
}
