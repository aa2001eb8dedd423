//! VPC calls

use serde::{Deserialize, Serialize};

use super::{collect_pages, Ack, ApiError, Client, Filter, Tag};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AssistantCidr {
    pub cidr_block: String,
    /// 0 for a normal assistant CIDR, 1 for a container one
    pub assistant_type: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VpcInfo {
    pub vpc_id: String,
    pub vpc_name: String,
    pub cidr_block: String,
    pub is_default: bool,
    pub enable_multicast: bool,
    pub created_time: String,
    pub dns_server_set: Vec<String>,
    pub assistant_cidr_set: Vec<AssistantCidr>,
    pub tag_set: Vec<Tag>,
}

impl VpcInfo {
    /// Normal assistant CIDRs, skipping the container ones
    pub fn assistant_cidrs(&self) -> Vec<String> {
        self.assistant_cidr_set
            .iter()
            .filter(|c| c.assistant_type == 0)
            .map(|c| c.cidr_block.clone())
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVpcRequest {
    pub vpc_name: String,
    pub cidr_block: String,
    pub enable_multicast: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyVpcAttributeRequest {
    pub vpc_id: String,
    pub vpc_name: String,
    pub enable_multicast: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateVpcResponse {
    vpc: VpcInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpcsRequest<'a> {
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
    offset: String,
    limit: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpcsResponse {
    #[serde(default)]
    vpc_set: Vec<VpcInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct VpcIdRequest<'a> {
    vpc_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssistantCidrRequest<'a> {
    vpc_id: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    cidr_blocks: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyAssistantCidrRequest<'a> {
    vpc_id: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    new_cidr_blocks: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    old_cidr_blocks: &'a [String],
}

pub struct VpcApi<'a> {
    client: &'a Client,
}

impl<'a> VpcApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateVpcRequest) -> Result<VpcInfo, ApiError> {
        let response: CreateVpcResponse = self.client.write("CreateVpc", request, &[]).await?;
        Ok(response.vpc)
    }

    pub async fn describe(&self, filters: &[Filter]) -> Result<Vec<VpcInfo>, ApiError> {
        collect_pages(
            "DescribeVpcs",
            move |offset, limit| async move {
                let response: DescribeVpcsResponse = self
                    .client
                    .read(
                        "DescribeVpcs",
                        &DescribeVpcsRequest {
                            filters,
                            offset: offset.to_string(),
                            limit: limit.to_string(),
                        },
                    )
                    .await?;
                Ok(response.vpc_set)
            },
            |vpc| vpc.vpc_id.clone(),
        )
        .await
    }

    /// `None` when no VPC has this id
    pub async fn describe_by_id(&self, vpc_id: &str) -> Result<Option<VpcInfo>, ApiError> {
        match self.describe(&[Filter::new("vpc-id", vpc_id)]).await {
            Ok(vpcs) => Ok(vpcs.into_iter().find(|v| v.vpc_id == vpc_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_attribute(&self, request: &ModifyVpcAttributeRequest) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write("ModifyVpcAttribute", request, &[])
            .await?;
        Ok(())
    }

    pub async fn delete(&self, vpc_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write("DeleteVpc", &VpcIdRequest { vpc_id }, &[])
            .await?;
        Ok(())
    }

    pub async fn create_assistant_cidr(&self, vpc_id: &str, cidrs: &[String]) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "CreateAssistantCidr",
                &AssistantCidrRequest {
                    vpc_id,
                    cidr_blocks: cidrs,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn modify_assistant_cidr(
        &self,
        vpc_id: &str,
        new_cidrs: &[String],
        old_cidrs: &[String],
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyAssistantCidr",
                &ModifyAssistantCidrRequest {
                    vpc_id,
                    new_cidr_blocks: new_cidrs,
                    old_cidr_blocks: old_cidrs,
                },
                &[],
            )
            .await?;
        Ok(())
    }
}
