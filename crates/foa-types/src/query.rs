use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bytes::ExtId;
use crate::error::TypeError;
use crate::id::ChainId;
use crate::status::SyncStatus;
use crate::user::UserId;

/// Sort direction over ledger order (entries) or creation order (chains).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(TypeError::InvalidSort(other.to_string())),
        }
    }
}

/// Offset pagination plus sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub start: usize,
    pub limit: usize,
    pub sort: SortOrder,
}

impl Pagination {
    pub const DEFAULT_START: usize = 0;
    pub const DEFAULT_LIMIT: usize = 30;

    pub fn new(start: usize, limit: usize, sort: SortOrder) -> Self {
        Self { start, limit, sort }
    }

    /// Parse raw query-string values. Absent or empty values take defaults.
    pub fn parse(
        start: Option<&str>,
        limit: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Self, TypeError> {
        let start = parse_count("start", start)?.unwrap_or(Self::DEFAULT_START);
        let limit = parse_count("limit", limit)?.unwrap_or(Self::DEFAULT_LIMIT);
        let sort = match sort.filter(|s| !s.is_empty()) {
            Some(s) => s.parse()?,
            None => SortOrder::default(),
        };
        Ok(Self { start, limit, sort })
    }

    /// Apply the window to items already sorted ascending.
    ///
    /// Returns the selected page and the total item count.
    pub fn apply<T>(&self, mut items: Vec<T>) -> Page<T> {
        let total = items.len();
        if self.sort == SortOrder::Desc {
            items.reverse();
        }
        let items = items
            .into_iter()
            .skip(self.start)
            .take(self.limit)
            .collect();
        Page { items, total }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            start: Self::DEFAULT_START,
            limit: Self::DEFAULT_LIMIT,
            sort: SortOrder::default(),
        }
    }
}

fn parse_count(field: &'static str, raw: Option<&str>) -> Result<Option<usize>, TypeError> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .map_err(|_| TypeError::InvalidInteger {
                field,
                value: s.to_string(),
            }),
    }
}

/// One page of results and the size of the whole result set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Filter over stored chains.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainFilter {
    pub owner: Option<UserId>,
    pub status: Option<SyncStatus>,
    /// Chains must carry every one of these external ids.
    pub ext_ids: Vec<ExtId>,
}

impl ChainFilter {
    pub fn owned_by(owner: UserId) -> Self {
        Self {
            owner: Some(owner),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: Option<SyncStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_ext_ids(mut self, ext_ids: Vec<ExtId>) -> Self {
        self.ext_ids = ext_ids;
        self
    }
}

/// Filter over the entries of one chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryFilter {
    pub chain_id: ChainId,
    pub status: Option<SyncStatus>,
    pub ext_ids: Vec<ExtId>,
}

impl EntryFilter {
    pub fn for_chain(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            status: None,
            ext_ids: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Option<SyncStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_ext_ids(mut self, ext_ids: Vec<ExtId>) -> Self {
        self.ext_ids = ext_ids;
        self
    }
}

/// Parse an optional status query parameter. Empty means "no filter".
pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<SyncStatus>, TypeError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| s.parse::<SyncStatus>())
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let p = Pagination::parse(None, None, None).unwrap();
        assert_eq!(p, Pagination::new(0, 30, SortOrder::Desc));
        let p = Pagination::parse(Some(""), Some(""), Some("")).unwrap();
        assert_eq!(p, Pagination::default());
    }

    #[test]
    fn rejects_negative_and_non_numeric() {
        let err = Pagination::parse(Some("-1"), None, None).unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidInteger {
                field: "start",
                value: "-1".into()
            }
        );
        assert!(Pagination::parse(None, Some("ten"), None).is_err());
    }

    #[test]
    fn rejects_unknown_sort() {
        assert_eq!(
            Pagination::parse(None, None, Some("random")).unwrap_err(),
            TypeError::InvalidSort("random".into())
        );
        let p = Pagination::parse(Some("5"), Some("10"), Some("asc")).unwrap();
        assert_eq!(p, Pagination::new(5, 10, SortOrder::Asc));
    }

    #[test]
    fn apply_windows_and_reverses() {
        let items: Vec<u32> = (0..10).collect();
        let asc = Pagination::new(2, 3, SortOrder::Asc).apply(items.clone());
        assert_eq!(asc.items, vec![2, 3, 4]);
        assert_eq!(asc.total, 10);

        let desc = Pagination::new(0, 4, SortOrder::Desc).apply(items.clone());
        assert_eq!(desc.items, vec![9, 8, 7, 6]);

        let past_end = Pagination::new(20, 5, SortOrder::Asc).apply(items);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 10);
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some("")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("completed")).unwrap(),
            Some(SyncStatus::Completed)
        );
        assert!(parse_status_filter(Some("done")).is_err());
    }
}
