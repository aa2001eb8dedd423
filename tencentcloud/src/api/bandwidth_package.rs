//! Bandwidth package calls

use serde::{Deserialize, Serialize};

use super::{collect_pages, wait_for_state, Ack, ApiError, Client, Filter, PollState, Tag};

pub const BWP_STATUS_CREATED: &str = "CREATED";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BandwidthPackageResource {
    pub resource_type: String,
    pub resource_id: String,
    pub address_ip: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BandwidthPackageInfo {
    pub bandwidth_package_id: String,
    pub bandwidth_package_name: String,
    pub network_type: String,
    pub charge_type: String,
    pub status: String,
    pub bandwidth: i64,
    pub egress: String,
    pub created_time: String,
    pub resource_set: Vec<BandwidthPackageResource>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBandwidthPackageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_max_bandwidth: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateBandwidthPackageResponse {
    #[serde(default)]
    bandwidth_package_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeBandwidthPackagesRequest<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    bandwidth_package_ids: &'a [String],
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeBandwidthPackagesResponse {
    #[serde(default)]
    bandwidth_package_set: Vec<BandwidthPackageInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyBandwidthPackageAttributeRequest<'a> {
    bandwidth_package_id: &'a str,
    bandwidth_package_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyBandwidthPackageBandwidthRequest<'a> {
    bandwidth_package_id: &'a str,
    internet_max_bandwidth: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BandwidthPackageIdRequest<'a> {
    bandwidth_package_id: &'a str,
}

/// Body of Add/RemoveBandwidthPackageResources
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BandwidthPackageResourcesRequest {
    pub bandwidth_package_id: String,
    pub resource_type: String,
    pub resource_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl BandwidthPackageResourcesRequest {
    pub fn new(bwp_id: &str, resource_id: &str) -> Self {
        Self {
            bandwidth_package_id: bwp_id.to_string(),
            resource_type: resource_type_of(resource_id).to_string(),
            resource_ids: vec![resource_id.to_string()],
            network_type: None,
            protocol: None,
        }
    }
}

/// EIPs are `Address` resources, everything else is a load balancer
pub fn resource_type_of(resource_id: &str) -> &'static str {
    if resource_id.starts_with("eip") {
        "Address"
    } else {
        "LoadBalance"
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeBandwidthPackageResourcesRequest<'a> {
    bandwidth_package_id: &'a str,
    filters: Vec<Filter>,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeBandwidthPackageResourcesResponse {
    #[serde(default)]
    resource_set: Vec<BandwidthPackageResource>,
}

pub struct BandwidthPackageApi<'a> {
    client: &'a Client,
}

impl<'a> BandwidthPackageApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Creates the package and waits until it is `CREATED`
    pub async fn create(&self, request: &CreateBandwidthPackageRequest) -> Result<String, ApiError> {
        let response: CreateBandwidthPackageResponse = self
            .client
            .write("CreateBandwidthPackage", request, &[])
            .await?;
        let bwp_id = response.bandwidth_package_id;
        if bwp_id.is_empty() {
            return Err(ApiError::InconsistentState(
                "create bandwidth package returned no id".to_string(),
            ));
        }

        let id = bwp_id.as_str();
        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(id).await {
                    Ok(Some(bwp)) if bwp.status == BWP_STATUS_CREATED => PollState::Done(()),
                    Ok(_) => PollState::Pending,
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await?;
        Ok(bwp_id)
    }

    pub async fn describe(
        &self,
        ids: &[String],
        filters: &[Filter],
    ) -> Result<Vec<BandwidthPackageInfo>, ApiError> {
        collect_pages(
            "DescribeBandwidthPackages",
            move |offset, limit| async move {
                let response: DescribeBandwidthPackagesResponse = self
                    .client
                    .read(
                        "DescribeBandwidthPackages",
                        &DescribeBandwidthPackagesRequest {
                            bandwidth_package_ids: ids,
                            filters,
                            offset,
                            limit,
                        },
                    )
                    .await?;
                Ok(response.bandwidth_package_set)
            },
            |bwp| bwp.bandwidth_package_id.clone(),
        )
        .await
    }

    pub async fn describe_by_id(&self, bwp_id: &str) -> Result<Option<BandwidthPackageInfo>, ApiError> {
        match self.describe(&[bwp_id.to_string()], &[]).await {
            Ok(bwps) => Ok(bwps.into_iter().find(|b| b.bandwidth_package_id == bwp_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_name(&self, bwp_id: &str, name: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyBandwidthPackageAttribute",
                &ModifyBandwidthPackageAttributeRequest {
                    bandwidth_package_id: bwp_id,
                    bandwidth_package_name: name,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn modify_bandwidth(&self, bwp_id: &str, bandwidth: i64) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyBandwidthPackageBandwidth",
                &ModifyBandwidthPackageBandwidthRequest {
                    bandwidth_package_id: bwp_id,
                    internet_max_bandwidth: bandwidth,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    /// Deletes the package and waits until it is gone
    pub async fn delete(&self, bwp_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DeleteBandwidthPackage",
                &BandwidthPackageIdRequest {
                    bandwidth_package_id: bwp_id,
                },
                &[],
            )
            .await?;

        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(bwp_id).await {
                    Ok(None) => PollState::Done(()),
                    Ok(Some(_)) => PollState::Pending,
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }

    pub async fn add_resources(&self, request: &BandwidthPackageResourcesRequest) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write("AddBandwidthPackageResources", request, &[])
            .await?;
        Ok(())
    }

    pub async fn remove_resources(
        &self,
        request: &BandwidthPackageResourcesRequest,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write("RemoveBandwidthPackageResources", request, &[])
            .await?;
        Ok(())
    }

    pub async fn describe_resource(
        &self,
        bwp_id: &str,
        resource_id: &str,
    ) -> Result<Option<BandwidthPackageResource>, ApiError> {
        let result: Result<DescribeBandwidthPackageResourcesResponse, ApiError> = self
            .client
            .read(
                "DescribeBandwidthPackageResources",
                &DescribeBandwidthPackageResourcesRequest {
                    bandwidth_package_id: bwp_id,
                    filters: vec![Filter::new("resource-id", resource_id)],
                    offset: 0,
                    limit: super::PAGE_SIZE,
                },
            )
            .await;
        match result {
            Ok(response) => Ok(response
                .resource_set
                .into_iter()
                .find(|r| r.resource_id == resource_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_from_id() {
        assert_eq!(resource_type_of("eip-abc"), "Address");
        assert_eq!(resource_type_of("lb-abc"), "LoadBalance");

        let request = BandwidthPackageResourcesRequest::new("bwp-1", "eip-1");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["ResourceType"], "Address");
        assert_eq!(json["ResourceIds"], serde_json::json!(["eip-1"]));
        assert!(json.get("Protocol").is_none());
    }
}
