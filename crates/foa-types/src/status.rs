use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Confirmation state of a chain or entry.
///
/// The state machine is monotonic: `Queued -> Processing -> Completed`.
/// Variants are declared in that order so the derived `Ord` matches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Admitted locally, not yet accepted by the network.
    Queued,
    /// Submitted to the network; confirmed data may be partially mirrored.
    Processing,
    /// Fully mirrored. Terminal.
    Completed,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 3] = [Self::Queued, Self::Processing, Self::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    /// Whether moving from `self` to `next` is allowed. Staying put is allowed.
    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        next >= *self
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Still waiting on the network (queued or processing).
    pub fn is_pending(&self) -> bool {
        !self.is_completed()
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            other => Err(TypeError::InvalidStatus(other.to_string())),
        }
    }
}
