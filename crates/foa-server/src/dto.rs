//! Request bodies, query strings, and response views of the REST API.

use foa_types::{
    parse_status_filter, Chain, ChainId, Content, ExtId, Link, Pagination, SyncStatus, TypeError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChainRequest {
    #[serde(default)]
    pub ext_ids: Vec<ExtId>,
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub chain_id: ChainId,
    #[serde(default)]
    pub ext_ids: Vec<ExtId>,
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub ext_ids: Vec<ExtId>,
}

/// `?status&start&limit&sort&force`, kept as raw strings so malformed values
/// surface as validation errors instead of decode failures.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub start: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub force: Option<String>,
}

impl ListParams {
    pub fn pagination(&self) -> Result<Pagination, TypeError> {
        Pagination::parse(
            self.start.as_deref(),
            self.limit.as_deref(),
            self.sort.as_deref(),
        )
    }

    pub fn status(&self) -> Result<Option<SyncStatus>, TypeError> {
        parse_status_filter(self.status.as_deref())
    }

    pub fn force(&self) -> bool {
        self.force.as_deref() == Some("true")
    }
}

/// A chain with its hypermedia links.
#[derive(Debug, Serialize)]
pub struct ChainView {
    #[serde(flatten)]
    pub chain: Chain,
    pub links: Vec<Link>,
}

impl From<Chain> for ChainView {
    fn from(chain: Chain) -> Self {
        let links = vec![Link::first_entry(&chain.first_entry_hash)];
        Self { chain, links }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foa_types::{EntryHash, SortOrder};

    #[test]
    fn list_params_defaults() {
        let params = ListParams::default();
        assert_eq!(params.pagination().unwrap(), Pagination::default());
        assert_eq!(params.status().unwrap(), None);
        assert!(!params.force());
    }

    #[test]
    fn list_params_parse() {
        let params = ListParams {
            status: Some("processing".into()),
            start: Some("10".into()),
            limit: Some("5".into()),
            sort: Some("asc".into()),
            force: Some("true".into()),
        };
        assert_eq!(
            params.pagination().unwrap(),
            Pagination::new(10, 5, SortOrder::Asc)
        );
        assert_eq!(params.status().unwrap(), Some(SyncStatus::Processing));
        assert!(params.force());

        let bad = ListParams {
            limit: Some("-1".into()),
            ..ListParams::default()
        };
        assert!(bad.pagination().is_err());
        let bad = ListParams {
            status: Some("done".into()),
            ..ListParams::default()
        };
        assert!(bad.status().is_err());
    }

    #[test]
    fn entry_request_decodes_base64() {
        let chain_id = ChainId::from_hash([1; 32]);
        let json = format!(r#"{{"chainId":"{chain_id}","extIds":["YQ=="],"content":"aGk="}}"#);
        let req: CreateEntryRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.chain_id, chain_id);
        assert_eq!(req.ext_ids, vec![ExtId::from("a")]);
        assert_eq!(req.content, Some(Content::from("hi")));
    }

    #[test]
    fn chain_view_links_first_entry() {
        let hash = EntryHash::from_hash([2; 32]);
        let chain = Chain {
            chain_id: ChainId::from_hash([1; 32]),
            ext_ids: vec![ExtId::from("a")],
            content: None,
            first_entry_hash: hash,
            status: SyncStatus::Queued,
            owners: Default::default(),
            created_at: Default::default(),
            synced_height: 0,
            network_ref: None,
            write_seq: None,
        };
        let json = serde_json::to_value(ChainView::from(chain)).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["links"][0]["rel"], "firstEntry");
        assert_eq!(json["links"][0]["href"], format!("/entries/{hash}"));
    }
}
