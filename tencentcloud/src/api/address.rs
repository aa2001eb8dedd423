//! Elastic IP calls

use serde::{Deserialize, Serialize};

use super::{wait_for_state, Ack, ApiError, Client, Filter, PollState, Tag};

pub const EIP_STATUS_BIND: &str = "BIND";
pub const EIP_STATUS_UNBIND: &str = "UNBIND";
pub const EIP_STATUS_BIND_ENI: &str = "BIND_ENI";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddressInfo {
    pub address_id: String,
    pub address_name: String,
    pub address_ip: String,
    pub address_status: String,
    pub address_type: String,
    pub instance_id: String,
    pub network_interface_id: String,
    pub private_address_ip: String,
    pub internet_charge_type: String,
    pub internet_service_provider: String,
    pub bandwidth: Option<u64>,
    pub created_time: String,
    pub tag_set: Vec<Tag>,
}

impl AddressInfo {
    pub fn is_bound(&self) -> bool {
        self.address_status == EIP_STATUS_BIND || self.address_status == EIP_STATUS_BIND_ENI
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocateAddressRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_service_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_charge_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_max_bandwidth_out: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_package_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AllocateAddressesResponse {
    #[serde(default)]
    address_set: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAddressesRequest<'a> {
    #[serde(skip_serializing_if = "<[&str]>::is_empty")]
    address_ids: &'a [&'a str],
    #[serde(skip_serializing_if = "<[Filter]>::is_empty")]
    filters: &'a [Filter],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAddressesResponse {
    #[serde(default)]
    address_set: Vec<AddressInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyAddressAttributeRequest<'a> {
    address_id: &'a str,
    address_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AddressIdsRequest<'a> {
    address_ids: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AddressIdRequest<'a> {
    address_id: &'a str,
}

/// Target of AssociateAddress: either a CVM instance or an ENI private IP
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddressTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_interface_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
}

impl AddressTarget {
    /// True when the address reports exactly this binding
    pub fn matches(&self, address: &AddressInfo) -> bool {
        match (&self.instance_id, &self.network_interface_id) {
            (Some(instance_id), _) => address.instance_id == *instance_id,
            (None, Some(eni_id)) => {
                let ip_matches = match &self.private_ip_address {
                    Some(ip) => address.private_address_ip == *ip,
                    None => true,
                };
                address.network_interface_id == *eni_id && ip_matches
            }
            (None, None) => false,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssociateAddressRequest<'a> {
    address_id: &'a str,
    #[serde(flatten)]
    target: &'a AddressTarget,
}

pub struct AddressApi<'a> {
    client: &'a Client,
}

impl<'a> AddressApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    async fn describe(&self, ids: &[&str], filters: &[Filter]) -> Result<Vec<AddressInfo>, ApiError> {
        let response: DescribeAddressesResponse = self
            .client
            .read(
                "DescribeAddresses",
                &DescribeAddressesRequest {
                    address_ids: ids,
                    filters,
                },
            )
            .await?;
        Ok(response.address_set)
    }

    pub async fn describe_by_ip(&self, address_ip: &str) -> Result<Option<AddressInfo>, ApiError> {
        let addresses = self
            .describe(&[], &[Filter::new("address-ip", address_ip)])
            .await?;
        Ok(addresses.into_iter().find(|a| a.address_ip == address_ip))
    }

    pub async fn describe_by_id(&self, eip_id: &str) -> Result<Option<AddressInfo>, ApiError> {
        match self.describe(&[eip_id], &[]).await {
            Ok(addresses) => Ok(addresses.into_iter().find(|a| a.address_id == eip_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Allocates one EIP and waits until it is ready to bind
    pub async fn allocate(&self, request: &AllocateAddressRequest) -> Result<String, ApiError> {
        let response: AllocateAddressesResponse = self
            .client
            .write("AllocateAddresses", request, &[])
            .await?;
        let Some(eip_id) = response.address_set.into_iter().next() else {
            return Err(ApiError::InconsistentState(
                "AllocateAddresses returned no address id".to_string(),
            ));
        };

        self.wait_status(&eip_id, |a| a.address_status == EIP_STATUS_UNBIND)
            .await?;
        Ok(eip_id)
    }

    pub async fn modify_name(&self, eip_id: &str, name: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyAddressAttribute",
                &ModifyAddressAttributeRequest {
                    address_id: eip_id,
                    address_name: name,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    /// Releases the EIP and waits until it no longer shows up
    pub async fn release(&self, eip_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ReleaseAddresses",
                &AddressIdsRequest {
                    address_ids: [eip_id],
                },
                &[],
            )
            .await?;

        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(eip_id).await {
                    Ok(None) => PollState::Done(()),
                    Ok(Some(_)) => PollState::Pending,
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }

    /// Binds the EIP and waits until the binding is reported
    pub async fn associate(&self, eip_id: &str, target: &AddressTarget) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "AssociateAddress",
                &AssociateAddressRequest {
                    address_id: eip_id,
                    target,
                },
                &[],
            )
            .await?;

        self.wait_status(eip_id, |a| a.is_bound() && target.matches(a))
            .await
    }

    /// Unbinds the EIP and waits until it is `UNBIND`. An address that is
    /// gone or already unbound needs nothing.
    pub async fn disassociate(&self, eip_id: &str) -> Result<(), ApiError> {
        match self.describe_by_id(eip_id).await? {
            None => return Ok(()),
            Some(address) if address.address_status == EIP_STATUS_UNBIND => return Ok(()),
            Some(_) => {}
        }

        let _: Ack = self
            .client
            .write(
                "DisassociateAddress",
                &AddressIdRequest { address_id: eip_id },
                &[],
            )
            .await?;

        self.wait_status(eip_id, |a| a.address_status == EIP_STATUS_UNBIND)
            .await
    }

    async fn wait_status<F>(&self, eip_id: &str, ready: F) -> Result<(), ApiError>
    where
        F: Fn(&AddressInfo) -> bool,
    {
        let ready = &ready;
        wait_for_state(
            self.client.write_timeout(),
            self.client.poll_interval(),
            move || async move {
                match self.describe_by_id(eip_id).await {
                    Ok(Some(address)) if ready(&address) => PollState::Done(()),
                    Ok(Some(address)) => {
                        tracing::debug!(eip_id, status = %address.address_status, "eip not settled yet");
                        PollState::Pending
                    }
                    Ok(None) => PollState::Failed(ApiError::InconsistentState(format!(
                        "eip [{}] not found",
                        eip_id
                    ))),
                    Err(e) => PollState::from_error(e),
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientConfig;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    fn client(url: &str) -> Client {
        let mut config = ClientConfig::new("AKIDtest", "secret", "ap-guangzhou");
        config.endpoint = Some(url.to_string());
        config.poll_interval = Duration::from_millis(10);
        config.write_timeout = Duration::from_secs(3);
        Client::new(config).unwrap()
    }

    fn address(status: &str, instance_id: &str) -> serde_json::Value {
        json!({
            "AddressId": "eip-1",
            "AddressIp": "1.1.1.1",
            "AddressStatus": status,
            "InstanceId": instance_id
        })
    }

    #[test]
    fn association_targets_serialize_flat() {
        let target = AddressTarget {
            network_interface_id: Some("eni-1".to_string()),
            private_ip_address: Some("10.0.0.5".to_string()),
            ..Default::default()
        };
        let body = serde_json::to_value(AssociateAddressRequest {
            address_id: "eip-1",
            target: &target,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"AddressId": "eip-1", "NetworkInterfaceId": "eni-1", "PrivateIpAddress": "10.0.0.5"})
        );

        let bound: AddressInfo = serde_json::from_value(json!({
            "AddressStatus": "BIND_ENI",
            "NetworkInterfaceId": "eni-1",
            "PrivateAddressIp": "10.0.0.5"
        }))
        .unwrap();
        assert!(bound.is_bound());
        assert!(target.matches(&bound));
        assert!(!AddressTarget::default().matches(&bound));
    }

    #[tokio::test]
    async fn associate_waits_for_bind() {
        let mut server = Server::new_async().await;
        let associate = server
            .mock("POST", "/")
            .match_header("x-tc-action", "AssociateAddress")
            .match_body(Matcher::Json(json!({"AddressId": "eip-1", "InstanceId": "ins-1"})))
            .with_body(json!({"Response": {"TaskId": "7", "RequestId": "req-1"}}).to_string())
            .create_async()
            .await;
        let binding = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeAddresses")
            .with_body(json!({"Response": {"AddressSet": [address("BINDING", "")], "RequestId": "req-2"}}).to_string())
            .expect(2)
            .create_async()
            .await;
        let bound = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeAddresses")
            .with_body(json!({"Response": {"AddressSet": [address("BIND", "ins-1")], "RequestId": "req-3"}}).to_string())
            .create_async()
            .await;

        let client = client(&server.url());
        let target = AddressTarget {
            instance_id: Some("ins-1".to_string()),
            ..Default::default()
        };
        client.addresses().associate("eip-1", &target).await.unwrap();

        associate.assert_async().await;
        binding.assert_async().await;
        bound.assert_async().await;
    }

    #[tokio::test]
    async fn disassociate_skips_unbound_address() {
        let mut server = Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeAddresses")
            .with_body(json!({"Response": {"AddressSet": [address("UNBIND", "")], "RequestId": "req-1"}}).to_string())
            .create_async()
            .await;
        let disassociate = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DisassociateAddress")
            .expect(0)
            .create_async()
            .await;

        client(&server.url())
            .addresses()
            .disassociate("eip-1")
            .await
            .unwrap();
        disassociate.assert_async().await;
    }
}
