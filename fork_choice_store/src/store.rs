use core::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use anyhow::{bail, ensure, Result};
use clock::Tick;
use hash_hasher::{HashedMap, HashedSet};
use helper_functions::misc;
use im::{HashMap, HashSet, Vector};
use itertools::Itertools as _;
use log::{debug, info, warn};
use tap::Pipe as _;
use typenum::Unsigned as _;
use types::{
    config::Config as ChainConfig,
    nonstandard::{PayloadStatus, WithStatus},
    phase0::{
        containers::Checkpoint,
        primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
};

use crate::{
    dump::{ForkChoiceDump, NodeDump},
    error::Error,
    misc::{
        ApplyBlockChanges, ApplyTickChanges, BlockAndCheckpoints, ChainHead, Difference,
        ProposerBoost, Vote, VoteTracker,
    },
    node::Node,
    store_config::StoreConfig,
};

/// In-memory fork choice state.
///
/// Every node in the store descends from the tree root, which is always the finalized block.
/// Methods that return [`Err`] with a fatal [`Error`] may leave the store partially updated.
/// See [`Error::is_fatal`].
#[derive(Clone)]
pub struct Store<P: Preset> {
    chain_config: Arc<ChainConfig>,
    store_config: StoreConfig,
    tick: Tick,
    justified_checkpoint: Checkpoint,
    finalized_checkpoint: Checkpoint,
    proposer_boost: Option<ProposerBoost>,
    timely_proposer_score: OnceLock<Gwei>,
    tree_root: H256,
    nodes: HashMap<H256, Node>,
    children: HashMap<H256, Vector<H256>>,
    votes: HashMap<ValidatorIndex, VoteTracker>,
    balances: Arc<[Gwei]>,
    slashed_indices: HashSet<ValidatorIndex>,
    phantom: PhantomData<P>,
}

impl<P: Preset> Store<P> {
    /// Creates a store anchored at a finalized block.
    ///
    /// The anchor is assumed to have a valid execution payload.
    #[must_use]
    pub fn new(
        chain_config: Arc<ChainConfig>,
        store_config: StoreConfig,
        anchor: BlockAndCheckpoints,
        balances: Arc<[Gwei]>,
    ) -> Self {
        let anchor_root = anchor.root;
        let anchor_epoch = misc::compute_epoch_at_slot::<P>(anchor.slot);

        // The anchor checkpoints are not stored in the anchor's state if it is not a genesis
        // block, so they have to be derived from the anchor itself.
        let checkpoint = Checkpoint {
            epoch: anchor_epoch,
            root: anchor_root,
        };

        let tick = Tick::start_of_slot(anchor.slot);
        let node = Node::new(anchor, PayloadStatus::Valid, tick);

        Self {
            chain_config,
            store_config,
            tick,
            justified_checkpoint: checkpoint,
            finalized_checkpoint: checkpoint,
            proposer_boost: None,
            timely_proposer_score: OnceLock::new(),
            tree_root: anchor_root,
            nodes: HashMap::unit(anchor_root, node),
            children: HashMap::new(),
            votes: HashMap::new(),
            balances,
            slashed_indices: HashSet::new(),
            phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn chain_config(&self) -> &Arc<ChainConfig> {
        &self.chain_config
    }

    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        self.store_config
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.tick.slot
    }

    #[must_use]
    pub fn current_epoch(&self) -> Epoch {
        self.tick.epoch::<P>()
    }

    #[must_use]
    pub const fn justified_checkpoint(&self) -> Checkpoint {
        self.justified_checkpoint
    }

    #[must_use]
    pub const fn finalized_checkpoint(&self) -> Checkpoint {
        self.finalized_checkpoint
    }

    #[must_use]
    pub fn proposer_boost_root(&self) -> Option<H256> {
        self.proposer_boost.map(|boost| boost.root)
    }

    #[must_use]
    pub const fn tree_root(&self) -> H256 {
        self.tree_root
    }

    #[must_use]
    pub fn node(&self, root: H256) -> Option<&Node> {
        self.nodes.get(&root)
    }

    #[must_use]
    pub fn contains_node(&self, root: H256) -> bool {
        self.nodes.contains_key(&root)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn vote(&self, validator_index: ValidatorIndex) -> Option<&VoteTracker> {
        self.votes.get(&validator_index)
    }

    #[must_use]
    pub fn balances(&self) -> &Arc<[Gwei]> {
        &self.balances
    }

    #[must_use]
    pub fn is_slashed(&self, validator_index: ValidatorIndex) -> bool {
        self.slashed_indices.contains(&validator_index)
    }

    #[must_use]
    pub fn payload_status(&self, root: H256) -> Option<PayloadStatus> {
        self.node(root).map(|node| node.payload_status)
    }

    /// Returns [`None`] if the block is not in the store.
    ///
    /// Blocks that have been pruned are no longer optimistic from the point of view of the caller,
    /// but the store cannot tell them apart from blocks it has never seen.
    #[must_use]
    pub fn is_optimistic(&self, root: H256) -> Option<bool> {
        self.node(root).map(Node::is_optimistic)
    }

    /// Greedy walk along best descendants, starting at the justified block.
    ///
    /// The walk starts at the tree root if the justified block is not in the store.
    pub fn head(&self) -> Result<H256> {
        let start_root = if self.contains_node(self.justified_checkpoint.root) {
            self.justified_checkpoint.root
        } else {
            self.tree_root
        };

        let start = self
            .node(start_root)
            .ok_or(Error::NodeNotFound { root: start_root })?;

        ensure!(
            !start.is_invalid(),
            Error::JustifiedNodeInvalid { root: start_root },
        );

        let head = start.head_candidate();

        ensure!(
            self.contains_node(head),
            Error::DanglingBestDescendant {
                root: start_root,
                best_descendant: head,
            },
        );

        Ok(head)
    }

    pub fn head_with_status(&self) -> Result<WithStatus<H256>> {
        let head = self.head()?;
        let node = self.node(head).ok_or(Error::NodeNotFound { root: head })?;

        Ok(WithStatus {
            value: head,
            optimistic: node.is_optimistic(),
            finalized: head == self.finalized_checkpoint.root,
        })
    }

    /// Tips of all forks that can still become the head.
    ///
    /// A tip is a block with no children other than invalid ones.
    #[must_use]
    pub fn chain_heads(&self) -> Vec<ChainHead> {
        self.nodes
            .values()
            .filter(|node| !node.is_invalid())
            .filter(|node| self.children_of(node.root).all(Node::is_invalid))
            .map(|node| ChainHead {
                slot: node.slot,
                root: node.root,
            })
            .sorted()
            .collect()
    }

    /// [`get_ancestor`](https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/fork-choice.md#get_ancestor)
    ///
    /// Returns [`None`] if `root` is not in the store or the ancestor has been pruned.
    #[must_use]
    pub fn ancestor(&self, root: H256, slot: Slot) -> Option<H256> {
        self.chain_ending_with(root)
            .find(|node| node.slot <= slot)
            .map(|node| node.root)
    }

    /// Every block is considered a descendant of itself.
    #[must_use]
    pub fn is_descendant(&self, ancestor_root: H256, descendant_root: H256) -> bool {
        let Some(ancestor) = self.node(ancestor_root) else {
            return false;
        };

        self.ancestor(descendant_root, ancestor.slot) == Some(ancestor_root)
    }

    #[must_use]
    pub fn common_ancestor(&self, root_a: H256, root_b: H256) -> Option<H256> {
        let mut node_a = self.node(root_a)?;
        let mut node_b = self.node(root_b)?;

        while node_a.root != node_b.root {
            if node_a.slot >= node_b.slot {
                node_a = self.parent(node_a)?;
            } else {
                node_b = self.parent(node_b)?;
            }
        }

        Some(node_a.root)
    }

    /// Iterates over the block with `root` and its ancestors, newest first.
    pub fn chain_ending_with(&self, root: H256) -> impl Iterator<Item = &Node> {
        core::iter::successors(self.node(root), |node| self.parent(node))
    }

    #[must_use]
    pub fn is_forward_synced(&self) -> bool {
        self.head()
            .ok()
            .and_then(|head| self.node(head))
            .is_some_and(|head| head.slot + self.store_config.max_empty_slots >= self.slot())
    }

    #[must_use]
    pub fn dump(&self) -> ForkChoiceDump {
        let nodes = self
            .nodes
            .values()
            .map(NodeDump::from)
            .sorted_by_key(|node| (node.slot, node.root))
            .collect_vec();

        ForkChoiceDump {
            justified_checkpoint: self.justified_checkpoint,
            finalized_checkpoint: self.finalized_checkpoint,
            proposer_boost_root: self.proposer_boost_root(),
            head_root: self.head().ok(),
            node_count: nodes.len(),
            nodes,
        }
    }

    /// Rejects blocks that share a slot, parent and proposer with a block already in the store.
    ///
    /// Blocks from different proposers competing for the same slot are allowed.
    /// That is how forks appear in the first place.
    pub fn validate_equivocation(&self, block: &BlockAndCheckpoints) -> Result<()> {
        let Some(parent_root) = block.parent_root else {
            return Ok(());
        };

        let existing = self.children_of(parent_root).find(|sibling| {
            sibling.slot == block.slot
                && sibling.proposer_index == block.proposer_index
                && sibling.root != block.root
        });

        if let Some(existing) = existing {
            bail!(Error::Equivocation {
                root: block.root,
                existing_root: existing.root,
                slot: block.slot,
                proposer_index: block.proposer_index,
            });
        }

        Ok(())
    }

    /// Adds a block to the tree without touching store checkpoints.
    pub fn insert_node(
        &mut self,
        block: BlockAndCheckpoints,
        payload_status: PayloadStatus,
    ) -> Result<ApplyBlockChanges> {
        let old_head = self.current_head();

        if !self.insert(block, payload_status)? {
            return Ok(ApplyBlockChanges::AlreadyKnown);
        }

        Ok(self.block_changes(old_head))
    }

    /// Inserts blocks ordered from oldest to newest as [`PayloadStatus::Optimistic`].
    ///
    /// Blocks inserted before a failure remain in the store.
    pub fn insert_optimistic_chain(
        &mut self,
        blocks: impl IntoIterator<Item = BlockAndCheckpoints>,
    ) -> Result<ApplyBlockChanges> {
        let old_head = self.current_head();
        let mut inserted = 0_usize;

        for block in blocks {
            if self.insert(block, PayloadStatus::Optimistic)? {
                inserted += 1;
            }
        }

        debug!("inserted optimistic chain of {inserted} blocks");

        if inserted == 0 {
            return Ok(ApplyBlockChanges::AlreadyKnown);
        }

        Ok(self.block_changes(old_head))
    }

    /// Adds a block to the tree and pulls up store checkpoints from its post-state.
    ///
    /// Roughly corresponds to [`on_block`] from the Fork Choice specification.
    ///
    /// [`on_block`]: https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/fork-choice.md#on_block
    pub fn apply_block(
        &mut self,
        block: BlockAndCheckpoints,
        payload_status: PayloadStatus,
    ) -> Result<ApplyBlockChanges> {
        if self.contains_node(block.root) {
            return Ok(ApplyBlockChanges::AlreadyKnown);
        }

        let old_head = self.current_head();

        // Validate finality first so that a block carrying an unsafe checkpoint is not inserted.
        let finalize = block.finalized_checkpoint.epoch > self.finalized_checkpoint.epoch
            && self.validate_finalized_checkpoint(block.finalized_checkpoint)?;

        if !self.insert(block, payload_status)? {
            return Ok(ApplyBlockChanges::AlreadyKnown);
        }

        // > Update justified checkpoint
        if block.justified_checkpoint.epoch > self.justified_checkpoint.epoch {
            self.update_justified_checkpoint(block.justified_checkpoint);
        }

        // > Update finalized checkpoint
        if finalize {
            self.finalize(block.finalized_checkpoint);
            return Ok(self
                .block_changes(old_head)
                .with_finalized_checkpoint_updated());
        }

        Ok(self.block_changes(old_head))
    }

    /// Returns `true` if the checkpoint was accepted.
    ///
    /// Later justification always wins. Updates with an equal epoch replace the root.
    pub fn update_justified_checkpoint(&mut self, checkpoint: Checkpoint) -> bool {
        if checkpoint.epoch < self.justified_checkpoint.epoch {
            return false;
        }

        if checkpoint != self.justified_checkpoint {
            debug!(
                "justified checkpoint updated (old: {}, new: {checkpoint})",
                self.justified_checkpoint,
            );
        }

        self.justified_checkpoint = checkpoint;

        true
    }

    /// Moves finality forward and prunes every block that does not descend from the new root.
    ///
    /// Returns `Ok(false)` if the checkpoint is current or refers to an already pruned ancestor.
    /// The store is not modified if this returns [`Err`].
    pub fn update_finalized_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<bool> {
        if !self.validate_finalized_checkpoint(checkpoint)? {
            return Ok(false);
        }

        self.finalize(checkpoint);

        Ok(true)
    }

    /// Records the latest messages of validators and applies them to block weights.
    ///
    /// Effective balances are taken from the snapshot passed to [`Self::update_balances`].
    /// Returns the old head if the head moved to a different fork.
    pub fn apply_votes(&mut self, votes: impl IntoIterator<Item = Vote>) -> Result<Option<H256>> {
        self.apply_votes_with_balances(votes.into_iter().map(|vote| (vote, None)))
    }

    /// Like [`Self::apply_votes`] for a single vote with an explicit effective balance.
    pub fn process_vote(&mut self, vote: Vote, balance: Gwei) -> Result<Option<H256>> {
        self.apply_votes_with_balances(core::iter::once((vote, Some(balance))))
    }

    /// Replaces the effective balance snapshot and reweighs current votes.
    pub fn update_balances(&mut self, balances: Arc<[Gwei]>) -> Result<Option<H256>> {
        let old_head = self.current_head();

        // `Store.timely_proposer_score` is derived from `Store.balances`.
        self.timely_proposer_score.take();
        self.balances = balances;

        let mut differences = Self::difference_map();

        for (validator_index, tracker) in self.votes.iter_mut() {
            let Some(root) = tracker.current_root else {
                continue;
            };

            if self.slashed_indices.contains(validator_index) {
                continue;
            }

            let new_balance = balance_at(&self.balances, *validator_index);
            let old_balance = core::mem::replace(&mut tracker.current_balance, new_balance);

            // Update `differences` only if the balance changed.
            // This does not affect the result but improves performance.
            if old_balance == new_balance {
                continue;
            }

            let difference = differences.entry(root).or_default();

            *difference = difference
                .checked_sub_unsigned(old_balance)
                .and_then(|difference| difference.checked_add_unsigned(new_balance))
                .ok_or(Error::DifferenceOverflow { root })?;
        }

        self.apply_differences(differences)?;

        Ok(self.reorganized(old_head))
    }

    /// Removes the weight of slashed validators and ignores their future votes.
    ///
    /// Roughly corresponds to [`on_attester_slashing`] from the Fork Choice specification.
    ///
    /// [`on_attester_slashing`]: https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/fork-choice.md#on_attester_slashing
    pub fn apply_slashed_validators(
        &mut self,
        validator_indices: impl IntoIterator<Item = ValidatorIndex>,
    ) -> Result<Option<H256>> {
        let old_head = self.current_head();
        let mut differences = Self::difference_map();

        for validator_index in validator_indices {
            if self.slashed_indices.insert(validator_index).is_some() {
                continue;
            }

            let Some(tracker) = self.votes.get_mut(&validator_index) else {
                continue;
            };

            let balance = core::mem::take(&mut tracker.current_balance);

            if let Some(root) = tracker.current_root {
                let difference = differences.entry(root).or_default();

                *difference = difference
                    .checked_sub_unsigned(balance)
                    .ok_or(Error::DifferenceOverflow { root })?;
            }
        }

        self.apply_differences(differences)?;

        Ok(self.reorganized(old_head))
    }

    /// Records a payload status reported by the execution layer.
    ///
    /// Validity propagates to ancestors. Invalidity propagates to descendants.
    /// Returns the old head if the head moved to a different fork.
    pub fn set_optimistic_status(&mut self, root: H256, valid: bool) -> Result<Option<H256>> {
        let node = self.node(root).ok_or(Error::NodeNotFound { root })?;

        if valid {
            ensure!(!node.is_invalid(), Error::InvalidPayloadValidated { root });
            self.mark_chain_valid(root)?;
            return Ok(None);
        }

        match node.payload_status {
            PayloadStatus::Valid => bail!(Error::ValidPayloadInvalidated { root }),
            PayloadStatus::Invalid => return Ok(None),
            PayloadStatus::Optimistic => {}
        }

        let old_head = self.current_head();
        let weight = node.weight;
        let parent_root = node.parent_root;

        // The weight of an invalid block is excluded from its ancestors as if the votes for it
        // were removed. The proposer boost goes with it.
        if let Some(parent_root) = parent_root {
            self.apply_difference(parent_root, -Difference::try_from(weight)?)?;
        }

        let invalidated = self.descendants(root);

        for descendant_root in &invalidated {
            if let Some(descendant) = self.nodes.get_mut(descendant_root) {
                descendant.payload_status = PayloadStatus::Invalid;
                descendant.weight = 0;
                descendant.best_child = None;
                descendant.best_descendant = None;
            }
        }

        if self
            .proposer_boost
            .is_some_and(|boost| invalidated.contains(&boost.root))
        {
            self.proposer_boost = None;
        }

        if let Some(parent_root) = parent_root {
            self.refresh_best_links([parent_root]);
        }

        warn!(
            "execution payload invalidated (block: {root:?}, invalidated blocks: {})",
            invalidated.len(),
        );

        features::log!(
            LogPayloadStatusUpdates,
            "invalidated blocks: {:?}",
            invalidated.iter().format(", "),
        );

        Ok(self.reorganized(old_head))
    }

    /// Advances store time.
    ///
    /// Entering a new slot ends the proposer boost granted in the previous one.
    pub fn apply_tick(&mut self, new_tick: Tick) -> Result<Option<ApplyTickChanges>> {
        let old_tick = self.tick;

        // If multiple tick updates are performed in quick succession, they can come in any order.
        if new_tick <= old_tick {
            return Ok(None);
        }

        // > update store time
        self.tick = new_tick;

        if new_tick.slot <= old_tick.slot {
            // `new_tick` is a later tick in the same slot.
            return Ok(Some(ApplyTickChanges::TickUpdated));
        }

        let old_head = self.current_head();

        // > Reset store.proposer_boost_root if this is a new slot
        if let Some(ProposerBoost { root, score }) = self.proposer_boost.take() {
            self.apply_difference(root, -Difference::try_from(score)?)?;
            self.refresh_best_links([root]);
        }

        let changes = match self.reorganized(old_head) {
            Some(old_head) => ApplyTickChanges::Reorganized { old_head },
            None => ApplyTickChanges::SlotUpdated,
        };

        Ok(Some(changes))
    }

    /// Returns `false` for duplicates.
    fn insert(&mut self, block: BlockAndCheckpoints, payload_status: PayloadStatus) -> Result<bool> {
        let BlockAndCheckpoints {
            root,
            parent_root,
            slot,
            ..
        } = block;

        // Duplicate delivery is expected from gossip and sync running concurrently.
        if self.contains_node(root) {
            features::log!(DebugForkChoice, "ignoring known block: {root:?}");
            return Ok(false);
        }

        let parent_root = parent_root.ok_or(Error::MissingParentRoot { root })?;

        let parent = self
            .node(parent_root)
            .ok_or(Error::UnknownParent { root, parent_root })?;

        ensure!(
            slot > parent.slot,
            Error::SlotNotAfterParent {
                root,
                slot,
                parent_slot: parent.slot,
            },
        );

        // Descendants of invalid blocks are invalid.
        let payload_status = if parent.is_invalid() {
            ensure!(
                !payload_status.is_valid(),
                Error::InvalidAncestorOfValidPayload {
                    root,
                    ancestor_root: parent_root,
                },
            );

            PayloadStatus::Invalid
        } else {
            payload_status
        };

        self.validate_equivocation(&block)?;

        if payload_status.is_valid() {
            self.mark_chain_valid(parent_root)?;
        }

        self.nodes
            .insert(root, Node::new(block, payload_status, self.tick));

        self.children.entry(parent_root).or_default().push_back(root);

        if !payload_status.is_invalid() {
            let pending_balance = self.balance_voting_for(root)?;

            self.apply_difference(root, Difference::try_from(pending_balance)?)?;

            // Apply proposer boost to first block in case of equivocation.
            // See <https://github.com/ethereum/consensus-specs/pull/3352>.
            let is_before_attesting_interval = self.tick.is_before_attesting_interval();
            let is_first_block = self.proposer_boost.is_none();

            // > Add proposer score boost if the block is timely
            if self.slot() == slot && is_before_attesting_interval && is_first_block {
                let score = self.timely_proposer_score();

                self.proposer_boost = Some(ProposerBoost { root, score });
                self.apply_difference(root, Difference::try_from(score)?)?;

                features::log!(DebugForkChoice, "proposer boost of {score} applied to {root:?}");
            }
        }

        self.refresh_best_links([root]);

        features::log!(
            LogBlockInsertion,
            "inserted block (root: {root:?}, slot: {slot}, parent: {parent_root:?}, \
             payload_status: {payload_status})",
        );

        Ok(true)
    }

    /// Returns `Ok(true)` if the store should move to `checkpoint`.
    fn validate_finalized_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        let old_checkpoint = self.finalized_checkpoint;

        if checkpoint == old_checkpoint {
            return Ok(false);
        }

        if checkpoint.epoch < old_checkpoint.epoch {
            // The finalized block may stay the checkpoint root for several epochs.
            // Pruned ancestors of the tree root are implicitly finalized.
            ensure!(
                checkpoint.root == self.tree_root || !self.contains_node(checkpoint.root),
                Error::FinalizedEpochReverted {
                    old_checkpoint,
                    new_checkpoint: checkpoint,
                },
            );

            return Ok(false);
        }

        ensure!(
            checkpoint.epoch > old_checkpoint.epoch,
            Error::FinalizedCheckpointConflict {
                old_checkpoint,
                new_checkpoint: checkpoint,
            },
        );

        // Blocks that do not descend from the finalized block are pruned as soon as it is
        // finalized, so an unknown root here cannot be a descendant.
        ensure!(
            self.is_descendant(old_checkpoint.root, checkpoint.root),
            Error::FinalizedNotDescendant {
                old_checkpoint,
                new_checkpoint: checkpoint,
            },
        );

        Ok(true)
    }

    fn finalize(&mut self, checkpoint: Checkpoint) {
        info!(
            "finalized checkpoint updated (old: {}, new: {checkpoint})",
            self.finalized_checkpoint,
        );

        self.finalized_checkpoint = checkpoint;
        self.prune(checkpoint.root);

        // The justified checkpoint cannot be older than the finalized one.
        if self.justified_checkpoint.epoch < checkpoint.epoch
            || !self.contains_node(self.justified_checkpoint.root)
        {
            self.justified_checkpoint = checkpoint;
        }
    }

    fn prune(&mut self, new_root: H256) {
        let retained = self
            .descendants(new_root)
            .into_iter()
            .collect::<HashedSet<_>>();

        let old_count = self.nodes.len();

        self.nodes.retain(|root, _| retained.contains(root));
        self.children.retain(|root, _| retained.contains(root));
        self.tree_root = new_root;

        if self
            .proposer_boost
            .is_some_and(|boost| !retained.contains(&boost.root))
        {
            self.proposer_boost = None;
        }

        let pruned = old_count - self.nodes.len();

        debug!("pruned {pruned} blocks, {} remaining", self.nodes.len());

        features::log!(LogPruning, "pruned {pruned} blocks not descending from {new_root:?}");
    }

    fn apply_votes_with_balances(
        &mut self,
        votes: impl IntoIterator<Item = (Vote, Option<Gwei>)>,
    ) -> Result<Option<H256>> {
        let old_head = self.current_head();
        let mut updated = vec![];

        for (vote, balance) in votes {
            let Vote {
                validator_index,
                block_root,
                target_epoch,
            } = vote;

            // Votes from slashed validators are ignored.
            if self.slashed_indices.contains(&validator_index) {
                continue;
            }

            let tracker = self.votes.entry(validator_index).or_default();

            if !tracker.is_empty() && target_epoch <= tracker.next_epoch {
                continue;
            }

            tracker.next_root = Some(block_root);
            tracker.next_epoch = target_epoch;

            updated.push((validator_index, balance));
        }

        let mut differences = Self::difference_map();

        for (validator_index, balance) in updated {
            let new_balance = balance.unwrap_or_else(|| balance_at(&self.balances, validator_index));

            let Some(tracker) = self.votes.get_mut(&validator_index) else {
                continue;
            };

            if tracker.current_root == tracker.next_root && tracker.current_balance == new_balance {
                continue;
            }

            if let Some(old_root) = tracker.current_root {
                let difference = differences.entry(old_root).or_default();

                *difference = difference
                    .checked_sub_unsigned(tracker.current_balance)
                    .ok_or(Error::DifferenceOverflow { root: old_root })?;
            }

            if let Some(new_root) = tracker.next_root {
                let difference = differences.entry(new_root).or_default();

                *difference = difference
                    .checked_add_unsigned(new_balance)
                    .ok_or(Error::DifferenceOverflow { root: new_root })?;
            }

            tracker.current_root = tracker.next_root;
            tracker.current_balance = new_balance;
        }

        features::log!(
            LogVoteBatches,
            "applying vote differences to {} blocks",
            differences.len(),
        );

        self.apply_differences(differences)?;

        Ok(self.reorganized(old_head))
    }

    fn apply_differences(
        &mut self,
        differences: impl IntoIterator<Item = (H256, Difference)>,
    ) -> Result<()> {
        let mut changed = vec![];

        for (root, difference) in differences {
            if difference != 0 {
                self.apply_difference(root, difference)?;
                changed.push(root);
            }
        }

        self.refresh_best_links(changed);

        Ok(())
    }

    /// Adds `difference` to the weight of the block with `root` and all of its ancestors.
    ///
    /// Unknown and invalid blocks do not contribute to the weights of their ancestors.
    fn apply_difference(&mut self, root: H256, difference: Difference) -> Result<()> {
        if difference == 0 || self.node(root).is_none_or(Node::is_invalid) {
            return Ok(());
        }

        let mut next_root = Some(root);

        // The walk ends at the tree root because its parent has been pruned.
        while let Some(node) = next_root.and_then(|root| self.nodes.get_mut(&root)) {
            let weight = node.weight;

            node.weight = weight.checked_add_signed(difference).ok_or_else(|| {
                if difference < 0 {
                    Error::WeightUnderflow {
                        root: node.root,
                        weight,
                        difference,
                    }
                } else {
                    Error::WeightOverflow {
                        root: node.root,
                        weight,
                        difference,
                    }
                }
            })?;

            next_root = node.parent_root;
        }

        Ok(())
    }

    /// Recomputes `best_child` and `best_descendant` on the paths from `roots` to the tree root.
    fn refresh_best_links(&mut self, roots: impl IntoIterator<Item = H256>) {
        let mut on_paths = HashedSet::default();

        for root in roots {
            for node in self.chain_ending_with(root) {
                // Paths converge. Everything above a visited node has been collected already.
                if !on_paths.insert(node.root) {
                    break;
                }
            }
        }

        // Children must be updated before their parents.
        let ordered = on_paths
            .into_iter()
            .filter_map(|root| self.node(root))
            .map(|node| (node.slot, node.root))
            .sorted()
            .rev()
            .collect_vec();

        for (_, root) in ordered {
            self.update_best_links(root);
        }
    }

    fn update_best_links(&mut self, root: H256) {
        let best_child = self
            .children_of(root)
            .filter(|child| !child.is_invalid())
            .max_by_key(|child| child.score())
            .map(|child| (child.root, child.head_candidate()));

        if let Some(node) = self.nodes.get_mut(&root) {
            if node.is_invalid() {
                node.best_child = None;
                node.best_descendant = None;
            } else {
                node.best_child = best_child.map(|(child, _)| child);
                node.best_descendant = best_child.map(|(_, descendant)| descendant);
            }
        }
    }

    /// Marks the block with `root` and its optimistic ancestors as valid.
    ///
    /// Does not modify the store if an invalid ancestor is found.
    fn mark_chain_valid(&mut self, root: H256) -> Result<()> {
        let mut validated = vec![];

        for node in self.chain_ending_with(root) {
            match node.payload_status {
                PayloadStatus::Valid => break,
                PayloadStatus::Invalid => bail!(Error::InvalidAncestorOfValidPayload {
                    root,
                    ancestor_root: node.root,
                }),
                PayloadStatus::Optimistic => validated.push(node.root),
            }
        }

        for validated_root in &validated {
            if let Some(node) = self.nodes.get_mut(validated_root) {
                node.payload_status = PayloadStatus::Valid;
            }
        }

        if !validated.is_empty() {
            features::log!(
                LogPayloadStatusUpdates,
                "validated {} blocks ending with {root:?}",
                validated.len(),
            );
        }

        Ok(())
    }

    /// Sum of balances of validators whose applied vote targets `root`.
    ///
    /// Votes may arrive before the block they vote for.
    fn balance_voting_for(&self, root: H256) -> Result<Gwei> {
        self.votes
            .values()
            .filter(|tracker| tracker.current_root == Some(root))
            .try_fold(0, |sum: Gwei, tracker| sum.checked_add(tracker.current_balance))
            .ok_or(Error::DifferenceOverflow { root })?
            .pipe(Ok)
    }

    fn timely_proposer_score(&self) -> Gwei {
        *self.timely_proposer_score.get_or_init(|| {
            let total_active_balance = self
                .balances
                .iter()
                .copied()
                .fold(0, Gwei::saturating_add);

            let committee_weight = total_active_balance / P::SlotsPerEpoch::U64;

            committee_weight.saturating_mul(self.chain_config.proposer_score_boost) / 100
        })
    }

    /// Includes the block with `root` itself.
    fn descendants(&self, root: H256) -> Vec<H256> {
        let mut descendants = vec![];
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            descendants.push(current);

            if let Some(children) = self.children.get(&current) {
                stack.extend(children.iter().copied());
            }
        }

        descendants
    }

    fn children_of(&self, root: H256) -> impl Iterator<Item = &Node> {
        self.children
            .get(&root)
            .into_iter()
            .flatten()
            .filter_map(|child| self.node(*child))
    }

    fn parent(&self, node: &Node) -> Option<&Node> {
        self.node(node.parent_root?)
    }

    fn current_head(&self) -> Option<H256> {
        self.head().ok()
    }

    fn reorganized(&self, old_head: Option<H256>) -> Option<H256> {
        let old_head = old_head?;
        let new_head = self.current_head()?;

        if self.is_descendant(old_head, new_head) {
            return None;
        }

        features::log!(LogHeadChanges, "reorganized from {old_head:?} to {new_head:?}");

        Some(old_head)
    }

    fn block_changes(&self, old_head: Option<H256>) -> ApplyBlockChanges {
        let new_head = self.current_head();

        if old_head.is_some() && old_head == new_head {
            return ApplyBlockChanges::AlternateChainExtended {
                finalized_checkpoint_updated: false,
            };
        }

        features::log!(LogHeadChanges, "head moved from {old_head:?} to {new_head:?}");

        match self.reorganized(old_head) {
            Some(old_head) => ApplyBlockChanges::Reorganized {
                finalized_checkpoint_updated: false,
                old_head,
            },
            None => ApplyBlockChanges::CanonicalChainExtended {
                finalized_checkpoint_updated: false,
            },
        }
    }

    fn difference_map() -> HashedMap<H256, Difference> {
        // `hash_hasher::HashedMap` is slightly faster than `std::collections::HashMap`.
        // It should be safe because block roots are already hashed.
        HashedMap::default()
    }
}

fn balance_at(balances: &[Gwei], validator_index: ValidatorIndex) -> Gwei {
    usize::try_from(validator_index)
        .ok()
        .and_then(|index| balances.get(index))
        .copied()
        .unwrap_or_default()
}
