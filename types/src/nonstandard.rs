use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Execution status of a block as reported by the execution layer.
///
/// [`PayloadStatus::Valid`] and [`PayloadStatus::Invalid`] are terminal.
/// A block can only leave [`PayloadStatus::Optimistic`].
#[derive(
    Clone, Copy, PartialEq, Eq, Debug, AsRefStr, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PayloadStatus {
    Valid,
    Invalid,
    Optimistic,
}

impl PayloadStatus {
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    #[must_use]
    pub const fn is_invalid(self) -> bool {
        matches!(self, Self::Invalid)
    }

    #[must_use]
    pub const fn is_optimistic(self) -> bool {
        matches!(self, Self::Optimistic)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct WithStatus<T> {
    pub value: T,
    pub optimistic: bool,
    pub finalized: bool,
}

/// [`WithStatus`] should not have a constructor that accepts values for all of its fields.
/// Anonymous arguments can lead to bugs when multiple of them have the same type.
/// Mixing up the two [`bool`] fields in [`WithStatus`] would be particularly dangerous.
/// ```compile_fail
/// # use types::nonstandard::WithStatus;
/// #
/// // Which is which? One is safe, one is dangerous.
/// WithStatus::new((), false, true);
/// WithStatus::new((), true, false);
/// ```
impl<T> WithStatus<T> {
    #[must_use]
    pub const fn valid_and_finalized(value: T) -> Self {
        Self {
            value,
            optimistic: false,
            finalized: true,
        }
    }

    #[must_use]
    pub const fn valid_and_unfinalized(value: T) -> Self {
        Self {
            value,
            optimistic: false,
            finalized: false,
        }
    }

    #[must_use]
    pub fn value(self) -> T {
        self.value
    }

    #[must_use]
    pub fn map<U>(self, function: impl FnOnce(T) -> U) -> WithStatus<U> {
        let Self {
            value,
            optimistic,
            finalized,
        } = self;

        WithStatus {
            value: function(value),
            optimistic,
            finalized,
        }
    }
}
