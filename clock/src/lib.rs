//! Time as seen by fork choice.
//!
//! Slots are divided into [`INTERVALS_PER_SLOT`] intervals and every interval is further divided
//! into 4 ticks. Fork choice only cares about which interval a tick falls into. The extra ticks
//! let callers schedule work at finer granularity without the store having to know about it.
//!
//! Proposer boost may only be granted during the first interval of a slot.
//! See [`Tick::is_before_attesting_interval`].
//!
//! [`INTERVALS_PER_SLOT`]: types::phase0::consts::INTERVALS_PER_SLOT

use core::time::Duration;

use anyhow::Result;
use enum_iterator::Sequence;
use helper_functions::misc;
use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use thiserror::Error;
use types::{
    config::Config,
    phase0::{
        consts::GENESIS_SLOT,
        primitives::{Epoch, Slot, UnixSeconds},
    },
    preset::Preset,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Deserialize, Serialize)]
pub struct Tick {
    pub slot: Slot,
    pub kind: TickKind,
}

impl Tick {
    #[must_use]
    pub const fn new(slot: Slot, kind: TickKind) -> Self {
        Self { slot, kind }
    }

    #[must_use]
    pub const fn start_of_slot(slot: Slot) -> Self {
        Self::new(slot, TickKind::Propose)
    }

    pub fn at_time(config: &Config, time: UnixSeconds, genesis_time: UnixSeconds) -> Result<Self> {
        let duration_since_unix_epoch = Duration::from_secs(time);
        Self::from_duration(config, duration_since_unix_epoch, genesis_time)
    }

    #[must_use]
    pub fn epoch<P: Preset>(self) -> Epoch {
        misc::compute_epoch_at_slot::<P>(self.slot)
    }

    #[must_use]
    pub const fn is_before_attesting_interval(self) -> bool {
        matches!(
            self.kind,
            TickKind::Propose
                | TickKind::ProposeSecond
                | TickKind::ProposeThird
                | TickKind::ProposeFourth,
        )
    }

    #[must_use]
    pub const fn is_start_of_slot(self) -> bool {
        matches!(self.kind, TickKind::Propose)
    }

    #[must_use]
    pub fn is_start_of_epoch<P: Preset>(self) -> bool {
        misc::is_epoch_start::<P>(self.slot) && self.is_start_of_slot()
    }

    pub fn next(self) -> Result<Self> {
        let Self { slot, kind } = self;

        let next = match kind.next() {
            Some(next_kind) => Self::new(slot, next_kind),
            None => Self::start_of_slot(slot.checked_add(1).ok_or(Error::RanOutOfSlots)?),
        };

        Ok(next)
    }

    fn from_duration(
        config: &Config,
        duration_since_unix_epoch: Duration,
        genesis_time: UnixSeconds,
    ) -> Result<Self> {
        let unix_epoch_to_genesis = Duration::from_secs(genesis_time);

        // `Duration` does not implement `Div<Duration>` or `Rem<Duration>`,
        // so we have to do arithmetic on nanoseconds.
        let nanos_since_genesis = duration_since_unix_epoch
            .saturating_sub(unix_epoch_to_genesis)
            .as_nanos();

        let nanos_per_slot = config.slot_duration().as_nanos();
        let nanos_per_tick = tick_duration(config).as_nanos();

        let slots_since_genesis = u64::try_from(nanos_since_genesis / nanos_per_slot)?;
        let ticks_since_slot = usize::try_from(nanos_since_genesis % nanos_per_slot / nanos_per_tick)?;

        let slot = GENESIS_SLOT
            .checked_add(slots_since_genesis)
            .ok_or(Error::RanOutOfSlots)?;

        // Slot durations that are not divisible by the number of ticks leave a remainder.
        // Time in the remainder belongs to the last tick of the slot.
        let kind = enum_iterator::all::<TickKind>()
            .nth(ticks_since_slot)
            .unwrap_or(TickKind::AggregateFourth);

        Ok(Self::new(slot, kind))
    }
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Sequence,
    AsRefStr,
    Deserialize,
    Serialize,
)]
pub enum TickKind {
    Propose,
    ProposeSecond,
    ProposeThird,
    ProposeFourth,
    Attest,
    AttestSecond,
    AttestThird,
    AttestFourth,
    Aggregate,
    AggregateSecond,
    AggregateThird,
    AggregateFourth,
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum Error {
    #[error("ran out of slots")]
    RanOutOfSlots,
}

fn tick_duration(config: &Config) -> Duration {
    let ticks_per_slot = u32::try_from(TickKind::CARDINALITY)
        .expect("number of ticks per slot fits in u32");

    config.slot_duration() / ticks_per_slot
}
