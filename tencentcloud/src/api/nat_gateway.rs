//! NAT gateway calls

use serde::{Deserialize, Serialize};

use super::{collect_pages, Ack, ApiError, Client, Filter, Tag};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NatGatewayAddress {
    pub address_id: String,
    pub public_ip_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NatGatewayInfo {
    pub nat_gateway_id: String,
    pub nat_gateway_name: String,
    pub vpc_id: String,
    /// PENDING, AVAILABLE, FAILED, DELETING, ...
    pub state: String,
    pub max_concurrent_connection: u64,
    pub internet_max_bandwidth_out: u64,
    pub created_time: String,
    pub public_ip_address_set: Vec<NatGatewayAddress>,
    pub zone: String,
    pub subnet_id: String,
    pub nat_product_version: u64,
    pub tag_set: Vec<Tag>,
}

impl NatGatewayInfo {
    pub fn public_ips(&self) -> Vec<String> {
        self.public_ip_address_set
            .iter()
            .map(|a| a.public_ip_address.clone())
            .collect()
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateNatGatewayRequest {
    pub nat_gateway_name: String,
    pub vpc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_max_bandwidth_out: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_connection: Option<u64>,
    pub public_ip_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat_product_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_public_ip_addresses_bandwidth_out: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NatGatewaySetResponse {
    #[serde(default)]
    nat_gateway_set: Vec<NatGatewayInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeNatGatewaysRequest<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    nat_gateway_ids: &'a [String],
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
    offset: u64,
    limit: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyNatGatewayAttributeRequest<'a> {
    nat_gateway_id: &'a str,
    nat_gateway_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    internet_max_bandwidth_out: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResetNatGatewayConnectionRequest<'a> {
    nat_gateway_id: &'a str,
    max_concurrent_connection: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NatGatewayAddressRequest<'a> {
    nat_gateway_id: &'a str,
    public_ip_addresses: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NatGatewayIdRequest<'a> {
    nat_gateway_id: &'a str,
}

pub struct NatGatewayApi<'a> {
    client: &'a Client,
}

impl<'a> NatGatewayApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateNatGatewayRequest) -> Result<NatGatewayInfo, ApiError> {
        let response: NatGatewaySetResponse =
            self.client.write("CreateNatGateway", request, &[]).await?;
        response
            .nat_gateway_set
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InconsistentState("create NAT gateway failed.".to_string()))
    }

    pub async fn describe(
        &self,
        ids: &[String],
        filters: &[Filter],
    ) -> Result<Vec<NatGatewayInfo>, ApiError> {
        collect_pages(
            "DescribeNatGateways",
            move |offset, limit| async move {
                let response: NatGatewaySetResponse = self
                    .client
                    .read(
                        "DescribeNatGateways",
                        &DescribeNatGatewaysRequest {
                            nat_gateway_ids: ids,
                            filters,
                            offset,
                            limit,
                        },
                    )
                    .await?;
                Ok(response.nat_gateway_set)
            },
            |nat| nat.nat_gateway_id.clone(),
        )
        .await
    }

    pub async fn describe_by_id(&self, nat_id: &str) -> Result<Option<NatGatewayInfo>, ApiError> {
        match self.describe(&[nat_id.to_string()], &[]).await {
            Ok(nats) => Ok(nats.into_iter().find(|n| n.nat_gateway_id == nat_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_attribute(
        &self,
        nat_id: &str,
        name: &str,
        bandwidth: Option<u64>,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyNatGatewayAttribute",
                &ModifyNatGatewayAttributeRequest {
                    nat_gateway_id: nat_id,
                    nat_gateway_name: name,
                    internet_max_bandwidth_out: bandwidth,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn reset_connection(&self, nat_id: &str, max_concurrent: u64) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ResetNatGatewayConnection",
                &ResetNatGatewayConnectionRequest {
                    nat_gateway_id: nat_id,
                    max_concurrent_connection: max_concurrent,
                },
                &["InternalError"],
            )
            .await?;
        Ok(())
    }

    /// Returns the task id to wait on
    pub async fn associate_addresses(&self, nat_id: &str, ips: &[String]) -> Result<String, ApiError> {
        let ack: Ack = self
            .client
            .write(
                "AssociateNatGatewayAddress",
                &NatGatewayAddressRequest {
                    nat_gateway_id: nat_id,
                    public_ip_addresses: ips,
                },
                &[],
            )
            .await?;
        Ok(ack.request_id)
    }

    /// Returns the task id to wait on
    pub async fn disassociate_addresses(
        &self,
        nat_id: &str,
        ips: &[String],
    ) -> Result<String, ApiError> {
        let ack: Ack = self
            .client
            .write(
                "DisassociateNatGatewayAddress",
                &NatGatewayAddressRequest {
                    nat_gateway_id: nat_id,
                    public_ip_addresses: ips,
                },
                &[],
            )
            .await?;
        Ok(ack.request_id)
    }

    pub async fn delete(&self, nat_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DeleteNatGateway",
                &NatGatewayIdRequest {
                    nat_gateway_id: nat_id,
                },
                &[],
            )
            .await?;
        Ok(())
    }
}
