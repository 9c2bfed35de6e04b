use core::ops::Range;

use typenum::Unsigned as _;
use types::{
    phase0::primitives::{Epoch, Slot},
    preset::Preset,
};

#[must_use]
pub fn compute_epoch_at_slot<P: Preset>(slot: Slot) -> Epoch {
    slot / P::SlotsPerEpoch::U64
}

#[must_use]
pub const fn compute_start_slot_at_epoch<P: Preset>(epoch: Epoch) -> Slot {
    epoch.saturating_mul(P::SlotsPerEpoch::U64)
}

#[must_use]
pub fn is_epoch_start<P: Preset>(slot: Slot) -> bool {
    slots_since_epoch_start::<P>(slot) == 0
}

// `consensus-specs` uses this in at least 2 places:
// - <https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/fork-choice.md#compute_slots_since_epoch_start>
// - <https://github.com/ethereum/consensus-specs/blob/v1.3.0/specs/phase0/validator.md#broadcast-attestation>
#[must_use]
pub fn slots_since_epoch_start<P: Preset>(slot: Slot) -> u64 {
    slot - compute_start_slot_at_epoch::<P>(compute_epoch_at_slot::<P>(slot))
}

#[must_use]
pub const fn slots_in_epoch<P: Preset>(epoch: Epoch) -> Range<Slot> {
    compute_start_slot_at_epoch::<P>(epoch)..compute_start_slot_at_epoch::<P>(epoch + 1)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::preset::{Mainnet, Minimal};

    use super::*;

    #[test_case(0 => 0)]
    #[test_case(7 => 0)]
    #[test_case(8 => 1)]
    #[test_case(9 => 1)]
    #[test_case(64 => 8)]
    fn epoch_at_slot_with_minimal_preset(slot: Slot) -> Epoch {
        compute_epoch_at_slot::<Minimal>(slot)
    }

    #[test]
    fn start_slot_at_epoch() {
        assert_eq!(compute_start_slot_at_epoch::<Minimal>(1), 8);
        assert_eq!(compute_start_slot_at_epoch::<Mainnet>(1), 32);
        assert_eq!(compute_start_slot_at_epoch::<Mainnet>(Epoch::MAX), Slot::MAX);
    }

    #[test_case(0 => true)]
    #[test_case(1 => false)]
    #[test_case(31 => false)]
    #[test_case(32 => true)]
    fn epoch_start_with_mainnet_preset(slot: Slot) -> bool {
        is_epoch_start::<Mainnet>(slot)
    }

    #[test]
    fn slots_in_epoch_covers_whole_epoch() {
        assert_eq!(slots_in_epoch::<Minimal>(2), 16..24);
        assert_eq!(slots_since_epoch_start::<Minimal>(21), 5);
    }
}
