//! Tag service calls

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Ack, ApiError, Client, Service};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TagPair {
    tag_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag_value: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyResourceTagsRequest<'a> {
    resource: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    replace_tags: Vec<TagPair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delete_tags: Vec<TagPair>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResourceTagsRequest<'a> {
    service_type: &'a str,
    resource_prefix: &'a str,
    resource_region: &'a str,
    resource_ids: [&'a str; 1],
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResourceTagsResponse {
    #[serde(default)]
    tags: Vec<TagPair>,
    #[serde(default)]
    total_count: u64,
}

pub struct TagApi<'a> {
    client: &'a Client,
}

impl<'a> TagApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Upserts `replace` and removes `delete` on the resource named by its
    /// six-segment `qcs::` name
    pub async fn modify_tags(
        &self,
        resource_name: &str,
        replace: &HashMap<String, String>,
        delete: &[String],
    ) -> Result<(), ApiError> {
        if replace.is_empty() && delete.is_empty() {
            return Ok(());
        }

        let mut replace_tags: Vec<TagPair> = replace
            .iter()
            .map(|(k, v)| TagPair {
                tag_key: k.clone(),
                tag_value: Some(v.clone()),
            })
            .collect();
        replace_tags.sort_by(|a, b| a.tag_key.cmp(&b.tag_key));

        let request = ModifyResourceTagsRequest {
            resource: resource_name,
            replace_tags,
            delete_tags: delete
                .iter()
                .map(|k| TagPair {
                    tag_key: k.clone(),
                    tag_value: None,
                })
                .collect(),
        };

        let _: Ack = self
            .client
            .call_with_retry(
                Service::Tag,
                "ModifyResourceTags",
                &request,
                self.client.write_timeout(),
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn describe_tags(
        &self,
        service_type: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        let region = self.client.region();
        let mut tags = HashMap::new();
        let mut offset = 0;

        loop {
            let response: DescribeResourceTagsResponse = self
                .client
                .call_with_retry(
                    Service::Tag,
                    "DescribeResourceTagsByResourceIds",
                    &DescribeResourceTagsRequest {
                        service_type,
                        resource_prefix: resource_type,
                        resource_region: region,
                        resource_ids: [resource_id],
                        offset,
                        limit: super::PAGE_SIZE,
                    },
                    self.client.read_timeout(),
                    &[],
                )
                .await?;

            let count = response.tags.len() as u64;
            for tag in response.tags {
                tags.insert(tag.tag_key, tag.tag_value.unwrap_or_default());
            }
            offset += count;
            if count < super::PAGE_SIZE || offset >= response.total_count {
                return Ok(tags);
            }
        }
    }
}
