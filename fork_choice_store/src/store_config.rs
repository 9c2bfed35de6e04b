use derivative::Derivative;
use serde::Deserialize;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Derivative, Deserialize)]
#[derivative(Default)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Number of slots the head may lag behind the clock before the node is considered out of sync.
    #[derivative(Default(value = "32"))]
    pub max_empty_slots: u64,
}
