//! Supporting code for the fork choice store.
//!
//! This crate handles the following concerns:
//! - Sharing a single [`Store`](fork_choice_store::Store) between writers and readers.
//! - Halting after errors that make the store unsafe to use.
//! - Logging rejected input.
//! - Testing.

pub use crate::{
    controller::Controller,
    misc::{Error, ForkTip, RejectionReason},
};

mod controller;
mod misc;
mod queries;

#[cfg(test)]
mod helpers;
