//! Implementation of [Beacon Chain Fork Choice] as a tree of blocks keyed by root.
//!
//! `fork_choice_control::extra_tests` has some diagrams that may help.
//!
//! Every block is stored as a [`Node`] that knows its parent, its accumulated weight and the best
//! leaf reachable through it. Children are kept in a separate index so that subtrees can be walked
//! when a payload is invalidated or the tree is pruned.
//!
//! Votes are processed in batches. Each validator has a single [`VoteTracker`] holding the vote
//! currently reflected in block weights and the latest vote received. Applying a batch turns the
//! difference between the two into signed deltas, one per block root. Each delta is added to the
//! block and all of its ancestors, after which `best_child` and `best_descendant` are recomputed
//! on the affected paths only. Finding the head is then a single lookup starting at the justified
//! block.
//!
//! Weights of invalid blocks are zero and never change. Their ancestors do not count them.
//!
//! We assume finalized parts of the chain cannot be forked. Finalizing a block removes everything
//! that does not descend from it, so the tree root is always the finalized block.
//!
//! This implementation makes use of persistent data structures, but they are not required for the
//! algorithm to work. They're only used to make snapshots cheap.
//!
//! Operations that reject their input return [`Err`] without modifying the store.
//! [`Error::is_fatal`] tells whether the error means the store can no longer be relied on.
//!
//! [Beacon Chain Fork Choice]: https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/fork-choice.md

pub use crate::{
    dump::{ForkChoiceDump, NodeDump},
    error::{classify, is_fatal, Error, ErrorClass},
    misc::{
        ApplyBlockChanges, ApplyTickChanges, BlockAndCheckpoints, ChainHead, Difference,
        ProposerBoost, Vote, VoteTracker,
    },
    node::Node,
    store::Store,
    store_config::StoreConfig,
};

mod dump;
mod error;
mod misc;
mod node;
mod store;
mod store_config;
