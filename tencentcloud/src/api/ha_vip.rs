//! HA VIP calls

use serde::{Deserialize, Serialize};

use super::{collect_pages, wait_for_state, Ack, ApiError, Client, Filter, PollState};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HaVipInfo {
    pub ha_vip_id: String,
    pub ha_vip_name: String,
    pub vip: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub network_interface_id: String,
    pub instance_id: String,
    pub address_ip: String,
    pub state: String,
    pub created_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateHaVipRequest {
    pub vpc_id: String,
    pub subnet_id: String,
    pub ha_vip_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateHaVipResponse {
    ha_vip: HaVipInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeHaVipsRequest<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    ha_vip_ids: &'a [String],
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeHaVipsResponse {
    #[serde(default)]
    ha_vip_set: Vec<HaVipInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyHaVipAttributeRequest<'a> {
    ha_vip_id: &'a str,
    ha_vip_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HaVipIdRequest<'a> {
    ha_vip_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HaVipAddressRequest<'a> {
    ha_vip_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_ip: Option<&'a str>,
}

pub struct HaVipApi<'a> {
    client: &'a Client,
}

impl<'a> HaVipApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateHaVipRequest) -> Result<HaVipInfo, ApiError> {
        let response: CreateHaVipResponse = self.client.write("CreateHaVip", request, &[]).await?;
        Ok(response.ha_vip)
    }

    pub async fn describe(&self, ids: &[String], filters: &[Filter]) -> Result<Vec<HaVipInfo>, ApiError> {
        collect_pages(
            "DescribeHaVips",
            move |offset, limit| async move {
                let response: DescribeHaVipsResponse = self
                    .client
                    .read(
                        "DescribeHaVips",
                        &DescribeHaVipsRequest {
                            ha_vip_ids: ids,
                            filters,
                            offset,
                            limit,
                        },
                    )
                    .await?;
                Ok(response.ha_vip_set)
            },
            |vip| vip.ha_vip_id.clone(),
        )
        .await
    }

    pub async fn describe_by_id(&self, ha_vip_id: &str) -> Result<Option<HaVipInfo>, ApiError> {
        match self.describe(&[ha_vip_id.to_string()], &[]).await {
            Ok(vips) => Ok(vips.into_iter().find(|v| v.ha_vip_id == ha_vip_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_name(&self, ha_vip_id: &str, name: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyHaVipAttribute",
                &ModifyHaVipAttributeRequest {
                    ha_vip_id,
                    ha_vip_name: name,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, ha_vip_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write("DeleteHaVip", &HaVipIdRequest { ha_vip_id }, &["InternalError"])
            .await?;
        Ok(())
    }

    /// Binds the EIP and waits until the HA VIP reports it
    pub async fn associate_address(&self, ha_vip_id: &str, address_ip: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "AssociateAddressWithHaVip",
                &HaVipAddressRequest {
                    ha_vip_id,
                    address_ip: Some(address_ip),
                },
                &[],
            )
            .await?;
        self.wait_address(ha_vip_id, address_ip).await
    }

    /// Unbinds the EIP and waits until the HA VIP reports no address
    pub async fn disassociate_address(&self, ha_vip_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DisassociateAddressFromHaVip",
                &HaVipAddressRequest {
                    ha_vip_id,
                    address_ip: None,
                },
                &[],
            )
            .await?;
        self.wait_address(ha_vip_id, "").await
    }

    async fn wait_address(&self, ha_vip_id: &str, address_ip: &str) -> Result<(), ApiError> {
        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(ha_vip_id).await {
                    Ok(Some(vip)) if vip.address_ip == address_ip => PollState::Done(()),
                    Ok(Some(_)) => PollState::Pending,
                    Ok(None) => PollState::Failed(ApiError::InconsistentState(format!(
                        "HA VIP [{}] not found",
                        ha_vip_id
                    ))),
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }
}
