//! Subnet calls

use serde::{Deserialize, Serialize};

use super::{collect_pages, Ack, ApiError, Client, Filter, Tag};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SubnetInfo {
    pub subnet_id: String,
    pub vpc_id: String,
    pub subnet_name: String,
    pub cidr_block: String,
    pub zone: String,
    pub route_table_id: String,
    pub is_default: bool,
    pub enable_broadcast: bool,
    pub available_ip_address_count: u64,
    pub created_time: String,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSubnetRequest {
    pub vpc_id: String,
    pub subnet_name: String,
    pub cidr_block: String,
    pub zone: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSubnetResponse {
    subnet: SubnetInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSubnetsRequest<'a> {
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
    offset: String,
    limit: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSubnetsResponse {
    #[serde(default)]
    subnet_set: Vec<SubnetInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifySubnetAttributeRequest<'a> {
    subnet_id: &'a str,
    subnet_name: &'a str,
    enable_broadcast: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubnetIdRequest<'a> {
    subnet_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReplaceRouteTableAssociationRequest<'a> {
    subnet_id: &'a str,
    route_table_id: &'a str,
}

pub struct SubnetApi<'a> {
    client: &'a Client,
}

impl<'a> SubnetApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateSubnetRequest) -> Result<SubnetInfo, ApiError> {
        let response: CreateSubnetResponse =
            self.client.write("CreateSubnet", request, &[]).await?;
        Ok(response.subnet)
    }

    pub async fn describe(&self, filters: &[Filter]) -> Result<Vec<SubnetInfo>, ApiError> {
        collect_pages(
            "DescribeSubnets",
            move |offset, limit| async move {
                let response: DescribeSubnetsResponse = self
                    .client
                    .read(
                        "DescribeSubnets",
                        &DescribeSubnetsRequest {
                            filters,
                            offset: offset.to_string(),
                            limit: limit.to_string(),
                        },
                    )
                    .await?;
                Ok(response.subnet_set)
            },
            |subnet| subnet.subnet_id.clone(),
        )
        .await
    }

    pub async fn describe_by_id(&self, subnet_id: &str) -> Result<Option<SubnetInfo>, ApiError> {
        match self.describe(&[Filter::new("subnet-id", subnet_id)]).await {
            Ok(subnets) => Ok(subnets.into_iter().find(|s| s.subnet_id == subnet_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_attribute(
        &self,
        subnet_id: &str,
        name: &str,
        is_multicast: bool,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifySubnetAttribute",
                &ModifySubnetAttributeRequest {
                    subnet_id,
                    subnet_name: name,
                    enable_broadcast: super::bool_str(is_multicast),
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, subnet_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write("DeleteSubnet", &SubnetIdRequest { subnet_id }, &[])
            .await?;
        Ok(())
    }

    pub async fn replace_route_table(
        &self,
        subnet_id: &str,
        route_table_id: &str,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ReplaceRouteTableAssociation",
                &ReplaceRouteTableAssociationRequest {
                    subnet_id,
                    route_table_id,
                },
                &[],
            )
            .await?;
        Ok(())
    }
}
