//! Tencent Cloud API v3 client and the VPC-family service calls

pub mod address;
pub mod bandwidth_package;
pub mod client;
pub mod eni;
pub mod error;
pub mod ha_vip;
pub mod nat_gateway;
pub mod network_acl;
pub mod private_nat;
pub mod retry;
pub mod route_table;
pub mod security_group;
pub mod signer;
pub mod subnet;
pub mod tag;
pub mod task;
pub mod vpc;

pub use client::{Client, ClientConfig, RetryConfig, Service};
pub use error::{is_expected, is_not_found, ApiError};
pub use retry::{retry, retry_error, RetryError};
pub use signer::Credentials;
pub use task::{wait_for_state, wait_vpc_task, PollState};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;

/// Page size used for every paged Describe call
pub const PAGE_SIZE: u64 = 100;

/// `Filters` entry of Describe calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            values: vec![value.into()],
        }
    }
}

/// Only the request id is needed from most mutating calls; for asynchronous
/// ones it doubles as the task id
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ack {
    #[serde(default)]
    pub request_id: String,
}

/// `"true"`/`"false"` as the VPC API expects for flag strings
pub fn bool_str(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Tag pair as carried in `TagSet` and `Tags`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

pub fn tags_from_map(tags: &std::collections::HashMap<String, String>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = tags
        .iter()
        .map(|(k, v)| Tag {
            key: k.clone(),
            value: v.clone(),
        })
        .collect();
    tags.sort_by(|a, b| a.key.cmp(&b.key));
    tags
}

pub fn tags_to_map(tags: &[Tag]) -> std::collections::HashMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Reads pages of [`PAGE_SIZE`] starting at offset 0 until an empty or short
/// page. The same id showing up twice means the listing shifted under us.
pub async fn collect_pages<T, F, Fut, K>(
    action: &str,
    mut fetch: F,
    id_of: K,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
    K: Fn(&T) -> String,
{
    let mut offset = 0;
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    loop {
        let page = fetch(offset, PAGE_SIZE).await?;
        let count = page.len() as u64;

        for item in page {
            let id = id_of(&item);
            if !seen.insert(id.clone()) {
                return Err(ApiError::InconsistentState(format!(
                    "get repeated id [{}] when doing {}",
                    id, action
                )));
            }
            items.push(item);
        }

        if count < PAGE_SIZE {
            return Ok(items);
        }
        offset += PAGE_SIZE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_pages_reads_until_short_page() {
        let items = collect_pages(
            "DescribeVpcs",
            |offset, limit| async move {
                let end = std::cmp::min(offset + limit, 230);
                Ok((offset..end).collect::<Vec<u64>>())
            },
            |n| n.to_string(),
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 230);
        assert_eq!(items[229], 229);
    }

    #[tokio::test]
    async fn collect_pages_rejects_duplicates() {
        let err = collect_pages(
            "DescribeSubnets",
            |_, _| async { Ok(vec!["subnet-1".to_string(), "subnet-1".to_string()]) },
            |s| s.clone(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::InconsistentState(_)));
        assert!(err.to_string().contains("subnet-1"));
    }

    #[test]
    fn tags_are_sorted_by_key() {
        let map = [("b", "2"), ("a", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let tags = tags_from_map(&map);
        assert_eq!(tags[0].key, "a");
        assert_eq!(tags_to_map(&tags), map);
    }
}
