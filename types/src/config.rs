use core::{num::NonZeroU64, time::Duration};
use std::borrow::Cow;

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::preset::PresetName;

/// Configuration variables customizable at runtime.
///
/// Only the variables read by fork choice and the clock are modeled.
/// Unknown keys are ignored so that full `config.yaml` files from `consensus-specs` can be loaded.
///
/// See [configurations in `consensus-specs`](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/configs).
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              `Config` has no invariants enforced during deserialization. \
              Use `Config::validate` to check values read from user input."
)]
#[expect(
    clippy::struct_field_names,
    reason = "config_name starts with the same name as the struct"
)]
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,
    pub preset_base: PresetName,

    // Time parameters
    pub seconds_per_slot: NonZeroU64,

    // Fork choice
    pub proposer_score_boost: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Meta
            // Use `default` as the default `config_name` and override it in `Config::mainnet`.
            config_name: Cow::Borrowed("default"),
            preset_base: PresetName::Mainnet,

            // Time parameters
            seconds_per_slot: nonzero!(12_u64),

            // Fork choice
            proposer_score_boost: 40,
        }
    }
}

impl Config {
    /// [Mainnet configuration](https://github.com/eth-clients/mainnet/blob/978f1794eada6f85bee76e4d2d5959a5fb8e0cc5/metadata/config.yaml).
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            ..Self::default()
        }
    }

    /// [Minimal configuration](https://github.com/ethereum/consensus-specs/blob/aac851f860fa384916f62027b2dbe3318a354c5b/configs/minimal.yaml).
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            config_name: Cow::Borrowed("minimal"),
            preset_base: PresetName::Minimal,
            seconds_per_slot: nonzero!(6_u64),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot.get())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.proposer_score_boost > 100 {
            return Err(Error::ProposerScoreBoostTooHigh {
                proposer_score_boost: self.proposer_score_boost,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("PROPOSER_SCORE_BOOST is a percentage but is {proposer_score_boost}")]
    ProposerScoreBoostTooHigh { proposer_score_boost: u64 },
}
