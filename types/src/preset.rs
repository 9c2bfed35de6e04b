#![allow(clippy::module_name_repetitions)]

use core::{fmt::Debug, hash::Hash, num::NonZeroU64};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use typenum::{NonZero, Unsigned, U32, U8};

/// Compile-time configuration variables.
///
/// Only the items used by fork choice are modeled.
/// See [presets in `consensus-specs`](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets).
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    type SlotsPerEpoch: Unsigned + NonZero;

    const NAME: PresetName;

    #[must_use]
    fn slots_per_epoch() -> NonZeroU64 {
        NonZeroU64::new(Self::SlotsPerEpoch::U64)
            .expect("typenum::NonZero guarantees that SlotsPerEpoch is nonzero")
    }
}

/// [Mainnet preset](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets/mainnet).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    type SlotsPerEpoch = U32;

    const NAME: PresetName = PresetName::Mainnet;
}

/// [Minimal preset](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets/minimal).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    type SlotsPerEpoch = U8;

    const NAME: PresetName = PresetName::Minimal;
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Display, EnumString, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PresetName {
    #[default]
    Mainnet,
    Minimal,
}
