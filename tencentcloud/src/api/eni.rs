//! Elastic network interface calls

use serde::{Deserialize, Serialize};

use super::{collect_pages, wait_for_state, wait_vpc_task, Ack, ApiError, Client, Filter, PollState, Tag};

/// Private IPs per Create/Assign/Unassign call
pub const ENI_IP_CHUNK: usize = 10;

pub const ENI_STATE_AVAILABLE: &str = "AVAILABLE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PrivateIpAddress {
    pub private_ip_address: String,
    pub primary: bool,
    pub description: String,
}

/// CVM binding of an ENI
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EniAttachment {
    pub instance_id: String,
    pub device_index: u64,
    pub attach_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EniInfo {
    pub network_interface_id: String,
    pub network_interface_name: String,
    pub network_interface_description: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub group_set: Vec<String>,
    pub primary: bool,
    pub mac_address: String,
    pub state: String,
    pub private_ip_address_set: Vec<PrivateIpAddress>,
    pub created_time: String,
    pub tag_set: Vec<Tag>,
    pub cdc_id: String,
    pub attachment: Option<EniAttachment>,
}

impl EniInfo {
    /// Instance the ENI is bound to, if any
    pub fn attached_instance(&self) -> Option<&str> {
        self.attachment
            .as_ref()
            .map(|a| a.instance_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEniRequest {
    pub network_interface_name: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub network_interface_description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    /// Secondary IPs to allocate besides the primary one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_private_ip_address_count: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub private_ip_addresses: Vec<PrivateIpAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateEniResponse {
    network_interface: EniInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeEnisRequest<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    network_interface_ids: &'a [String],
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeEnisResponse {
    #[serde(default)]
    network_interface_set: Vec<EniInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyEniAttributeRequest<'a> {
    network_interface_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_interface_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_interface_description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_group_ids: Option<&'a [String]>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PrivateIpsRequest<'a> {
    network_interface_id: &'a str,
    #[serde(skip_serializing_if = "<[PrivateIpAddress]>::is_empty")]
    private_ip_addresses: &'a [PrivateIpAddress],
    #[serde(skip_serializing_if = "Option::is_none")]
    secondary_private_ip_address_count: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EniIdRequest<'a> {
    network_interface_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EniInstanceRequest<'a> {
    network_interface_id: &'a str,
    instance_id: &'a str,
}

pub struct EniApi<'a> {
    client: &'a Client,
}

impl<'a> EniApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateEniRequest) -> Result<EniInfo, ApiError> {
        let response: CreateEniResponse = self
            .client
            .write("CreateNetworkInterface", request, &[])
            .await?;
        Ok(response.network_interface)
    }

    pub async fn describe(
        &self,
        ids: &[String],
        filters: &[Filter],
    ) -> Result<Vec<EniInfo>, ApiError> {
        collect_pages(
            "DescribeNetworkInterfaces",
            move |offset, limit| async move {
                let response: DescribeEnisResponse = self
                    .client
                    .read(
                        "DescribeNetworkInterfaces",
                        &DescribeEnisRequest {
                            network_interface_ids: ids,
                            filters,
                            offset,
                            limit,
                        },
                    )
                    .await?;
                Ok(response.network_interface_set)
            },
            |eni| eni.network_interface_id.clone(),
        )
        .await
    }

    pub async fn describe_by_id(&self, eni_id: &str) -> Result<Option<EniInfo>, ApiError> {
        match self.describe(&[eni_id.to_string()], &[]).await {
            Ok(enis) => Ok(enis
                .into_iter()
                .find(|e| e.network_interface_id == eni_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Waits until the ENI is `AVAILABLE` and reports at least `ip_count`
    /// private IPs
    pub async fn wait_ready(&self, eni_id: &str, ip_count: usize) -> Result<EniInfo, ApiError> {
        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(eni_id).await {
                    Ok(Some(eni))
                        if eni.state == ENI_STATE_AVAILABLE
                            && eni.private_ip_address_set.len() >= ip_count =>
                    {
                        PollState::Done(eni)
                    }
                    Ok(Some(eni)) => {
                        tracing::debug!(eni_id, state = %eni.state, "eni not ready yet");
                        PollState::Pending
                    }
                    Ok(None) => PollState::Pending,
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }

    pub async fn modify_attribute(
        &self,
        eni_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        security_groups: Option<&[String]>,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyNetworkInterfaceAttribute",
                &ModifyEniAttributeRequest {
                    network_interface_id: eni_id,
                    network_interface_name: name,
                    network_interface_description: description,
                    security_group_ids: security_groups,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    /// Assigns either the given IPs or `count` automatically chosen ones,
    /// then waits for the task
    pub async fn assign_private_ips(
        &self,
        eni_id: &str,
        ips: &[PrivateIpAddress],
        count: Option<u64>,
    ) -> Result<(), ApiError> {
        let ack: Ack = self
            .client
            .write(
                "AssignPrivateIpAddresses",
                &PrivateIpsRequest {
                    network_interface_id: eni_id,
                    private_ip_addresses: ips,
                    secondary_private_ip_address_count: count,
                },
                &[],
            )
            .await?;
        wait_vpc_task(self.client, &ack.request_id).await
    }

    pub async fn unassign_private_ips(&self, eni_id: &str, ips: &[String]) -> Result<(), ApiError> {
        let ips: Vec<PrivateIpAddress> = ips
            .iter()
            .map(|ip| PrivateIpAddress {
                private_ip_address: ip.clone(),
                ..Default::default()
            })
            .collect();
        let ack: Ack = self
            .client
            .write(
                "UnassignPrivateIpAddresses",
                &PrivateIpsRequest {
                    network_interface_id: eni_id,
                    private_ip_addresses: &ips,
                    secondary_private_ip_address_count: None,
                },
                &[],
            )
            .await?;
        wait_vpc_task(self.client, &ack.request_id).await
    }

    pub async fn modify_ip_description(
        &self,
        eni_id: &str,
        ip: &str,
        description: &str,
    ) -> Result<(), ApiError> {
        let ips = [PrivateIpAddress {
            private_ip_address: ip.to_string(),
            primary: false,
            description: description.to_string(),
        }];
        let _: Ack = self
            .client
            .write(
                "ModifyPrivateIpAddressesAttribute",
                &PrivateIpsRequest {
                    network_interface_id: eni_id,
                    private_ip_addresses: &ips,
                    secondary_private_ip_address_count: None,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    /// Deletes the ENI and waits until it no longer shows up
    pub async fn delete(&self, eni_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DeleteNetworkInterface",
                &EniIdRequest {
                    network_interface_id: eni_id,
                },
                &[],
            )
            .await?;

        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(eni_id).await {
                    Ok(None) => PollState::Done(()),
                    Ok(Some(_)) => PollState::Pending,
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }

    /// Binds the ENI to a CVM instance, then waits until the binding shows
    /// up and the ENI is `AVAILABLE` again
    pub async fn attach(&self, eni_id: &str, instance_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "AttachNetworkInterface",
                &EniInstanceRequest {
                    network_interface_id: eni_id,
                    instance_id,
                },
                &[],
            )
            .await?;

        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(eni_id).await {
                    Ok(Some(eni)) => match eni.attached_instance() {
                        Some(id) if id != instance_id => {
                            PollState::Failed(ApiError::InconsistentState(format!(
                                "eni [{}] is bound to instance [{}], not [{}]",
                                eni_id, id, instance_id
                            )))
                        }
                        Some(_) if eni.state == ENI_STATE_AVAILABLE => PollState::Done(()),
                        _ => {
                            tracing::debug!(eni_id, state = %eni.state, "eni attachment not ready yet");
                            PollState::Pending
                        }
                    },
                    Ok(None) => PollState::Failed(ApiError::InconsistentState(format!(
                        "eni [{}] not found while attaching",
                        eni_id
                    ))),
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }

    /// Unbinds the ENI and waits until it is free and `AVAILABLE`. A missing
    /// ENI or instance counts as detached.
    pub async fn detach(&self, eni_id: &str, instance_id: &str) -> Result<(), ApiError> {
        let result: Result<Ack, ApiError> = self
            .client
            .write(
                "DetachNetworkInterface",
                &EniInstanceRequest {
                    network_interface_id: eni_id,
                    instance_id,
                },
                &["UnsupportedOperation.InvalidState"],
            )
            .await;
        match result {
            Ok(_) => {}
            Err(e) if super::is_not_found(&e) => return Ok(()),
            Err(e) => return Err(e),
        }

        wait_for_state(
            self.client.read_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(eni_id).await {
                    Ok(None) => PollState::Done(()),
                    Ok(Some(eni)) if eni.attached_instance().is_none() && eni.state == ENI_STATE_AVAILABLE => {
                        PollState::Done(())
                    }
                    Ok(Some(eni)) => {
                        tracing::debug!(eni_id, state = %eni.state, "eni still bound");
                        PollState::Pending
                    }
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }
}

/// Splits IPs into per-call chunks of [`ENI_IP_CHUNK`]
pub fn chunk_ips<T: Clone>(ips: &[T]) -> Vec<Vec<T>> {
    ips.chunks(ENI_IP_CHUNK).map(<[T]>::to_vec).collect()
}

/// Chunks of a count of automatically assigned IPs
pub fn chunk_count(count: u64) -> Vec<u64> {
    let chunk = ENI_IP_CHUNK as u64;
    let mut chunks = vec![chunk; (count / chunk) as usize];
    if count % chunk > 0 {
        chunks.push(count % chunk);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_of_ten() {
        let ips: Vec<u32> = (0..23).collect();
        let chunks = chunk_ips(&ips);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2], vec![20, 21, 22]);

        assert_eq!(chunk_count(25), vec![10, 10, 5]);
        assert_eq!(chunk_count(10), vec![10]);
        assert!(chunk_count(0).is_empty());
    }

    #[test]
    fn create_request_omits_empty_fields() {
        let request = CreateEniRequest {
            network_interface_name: "eni".to_string(),
            vpc_id: "vpc-1".to_string(),
            subnet_id: "subnet-1".to_string(),
            secondary_private_ip_address_count: Some(2),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["SecondaryPrivateIpAddressCount"], 2);
        assert!(json.get("PrivateIpAddresses").is_none());
        assert!(json.get("SecurityGroupIds").is_none());
        assert_eq!(json["NetworkInterfaceDescription"], "");
    }

    #[test]
    fn describe_reports_cdc_and_binding() {
        let eni: EniInfo = serde_json::from_value(serde_json::json!({
            "NetworkInterfaceId": "eni-1",
            "State": "AVAILABLE",
            "CdcId": "cluster-1",
            "Attachment": {"InstanceId": "ins-1", "DeviceIndex": 1}
        }))
        .unwrap();
        assert_eq!(eni.cdc_id, "cluster-1");
        assert_eq!(eni.attached_instance(), Some("ins-1"));

        let free: EniInfo = serde_json::from_value(serde_json::json!({
            "NetworkInterfaceId": "eni-2",
            "Attachment": {"InstanceId": ""}
        }))
        .unwrap();
        assert_eq!(free.attached_instance(), None);
        assert_eq!(free.cdc_id, "");
    }
}
