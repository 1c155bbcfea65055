use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an API user (UUID v7, so ids sort by creation time).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An API user with a write quota.
///
/// `usage` only ever grows, and only as a side effect of an admitted write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub access_key: String,
    pub usage: u64,
    /// Maximum usage units; `0` means unlimited.
    pub usage_limit: u64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, access_key: impl Into<String>, usage_limit: u64) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            access_key: access_key.into(),
            usage: 0,
            usage_limit,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.usage_limit == 0
    }

    /// Whether a write costing `cost` units fits in the remaining quota.
    pub fn can_afford(&self, cost: u64) -> bool {
        self.is_unlimited() || self.usage_limit.saturating_sub(self.usage) >= cost
    }

    /// Remaining units, or `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        (!self.is_unlimited()).then(|| self.usage_limit.saturating_sub(self.usage))
    }
}
