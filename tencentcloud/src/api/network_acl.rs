//! Network ACL calls: the ACL itself, its rule entries, subnet binding and
//! quintuple entries

use serde::{Deserialize, Serialize};

use super::{collect_pages, Ack, ApiError, Client, Filter, Tag};
use crate::rules::LiteRule;

/// Plain ACL entry as sent by ModifyNetworkAclEntries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkAclEntry {
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub port: String,
    pub cidr_block: String,
    pub action: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl From<&LiteRule> for NetworkAclEntry {
    fn from(rule: &LiteRule) -> Self {
        Self {
            protocol: rule.protocol.clone(),
            port: rule.port.clone(),
            cidr_block: rule.cidr_ip.clone(),
            action: rule.action.clone(),
            description: String::new(),
        }
    }
}

impl From<&NetworkAclEntry> for LiteRule {
    fn from(entry: &NetworkAclEntry) -> Self {
        LiteRule::from_cloud(&entry.action, &entry.cidr_block, &entry.port, &entry.protocol)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclSubnet {
    pub subnet_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkAclInfo {
    pub network_acl_id: String,
    pub network_acl_name: String,
    pub vpc_id: String,
    pub created_time: String,
    pub subnet_set: Vec<AclSubnet>,
    pub ingress_entries: Vec<NetworkAclEntry>,
    pub egress_entries: Vec<NetworkAclEntry>,
    pub tag_set: Vec<Tag>,
}

impl NetworkAclInfo {
    pub fn subnet_ids(&self) -> Vec<String> {
        self.subnet_set.iter().map(|s| s.subnet_id.clone()).collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateNetworkAclRequest<'a> {
    vpc_id: &'a str,
    network_acl_name: &'a str,
    #[serde(skip_serializing_if = "<[Tag]>::is_empty")]
    tags: &'a [Tag],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateNetworkAclResponse {
    network_acl: NetworkAclInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeNetworkAclsRequest<'a> {
    filters: &'a [Filter],
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeNetworkAclsResponse {
    #[serde(default)]
    network_acl_set: Vec<NetworkAclInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyNetworkAclAttributeRequest<'a> {
    network_acl_id: &'a str,
    network_acl_name: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkAclEntrySet {
    pub ingress: Vec<NetworkAclEntry>,
    pub egress: Vec<NetworkAclEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyNetworkAclEntriesRequest<'a> {
    network_acl_id: &'a str,
    network_acl_entry_set: &'a NetworkAclEntrySet,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AclSubnetsRequest<'a> {
    network_acl_id: &'a str,
    subnet_ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkAclIdRequest<'a> {
    network_acl_id: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkAclQuintupleEntry {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_port: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_cidr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination_port: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub destination_cidr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network_acl_quintuple_entry_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing)]
    pub create_time: String,
    /// `INGRESS` or `EGRESS`, only reported by Describe
    #[serde(skip_serializing)]
    pub network_acl_direction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkAclQuintupleSet {
    pub ingress: Vec<NetworkAclQuintupleEntry>,
    pub egress: Vec<NetworkAclQuintupleEntry>,
}

impl NetworkAclQuintupleSet {
    pub fn is_empty(&self) -> bool {
        self.ingress.is_empty() && self.egress.is_empty()
    }

    /// Splits a flat Describe listing by direction
    pub fn from_entries(entries: Vec<NetworkAclQuintupleEntry>) -> Self {
        let (ingress, egress) = entries
            .into_iter()
            .partition(|e| e.network_acl_direction.eq_ignore_ascii_case("INGRESS"));
        Self { ingress, egress }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QuintupleEntriesRequest<'a> {
    network_acl_id: &'a str,
    network_acl_quintuple_set: &'a NetworkAclQuintupleSet,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeQuintupleEntriesRequest<'a> {
    network_acl_id: &'a str,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeQuintupleEntriesResponse {
    #[serde(default)]
    network_acl_quintuple_set: Vec<NetworkAclQuintupleEntry>,
}

pub struct NetworkAclApi<'a> {
    client: &'a Client,
}

impl<'a> NetworkAclApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, vpc_id: &str, name: &str, tags: &[Tag]) -> Result<NetworkAclInfo, ApiError> {
        let response: CreateNetworkAclResponse = self
            .client
            .write(
                "CreateNetworkAcl",
                &CreateNetworkAclRequest {
                    vpc_id,
                    network_acl_name: name,
                    tags,
                },
                &[],
            )
            .await?;
        Ok(response.network_acl)
    }

    pub async fn describe(&self, filters: &[Filter]) -> Result<Vec<NetworkAclInfo>, ApiError> {
        collect_pages(
            "DescribeNetworkAcls",
            move |offset, limit| async move {
                let response: DescribeNetworkAclsResponse = self
                    .client
                    .read(
                        "DescribeNetworkAcls",
                        &DescribeNetworkAclsRequest {
                            filters,
                            offset,
                            limit,
                        },
                    )
                    .await?;
                Ok(response.network_acl_set)
            },
            |acl| acl.network_acl_id.clone(),
        )
        .await
    }

    pub async fn describe_by_id(&self, acl_id: &str) -> Result<Option<NetworkAclInfo>, ApiError> {
        match self.describe(&[Filter::new("network-acl-id", acl_id)]).await {
            Ok(acls) => Ok(acls.into_iter().find(|a| a.network_acl_id == acl_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_name(&self, acl_id: &str, name: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyNetworkAclAttribute",
                &ModifyNetworkAclAttributeRequest {
                    network_acl_id: acl_id,
                    network_acl_name: name,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    /// Replaces every ingress and egress entry of the ACL
    pub async fn replace_entries(&self, acl_id: &str, set: &NetworkAclEntrySet) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifyNetworkAclEntries",
                &ModifyNetworkAclEntriesRequest {
                    network_acl_id: acl_id,
                    network_acl_entry_set: set,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn associate_subnets(&self, acl_id: &str, subnet_ids: &[String]) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "AssociateNetworkAclSubnets",
                &AclSubnetsRequest {
                    network_acl_id: acl_id,
                    subnet_ids,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn disassociate_subnets(&self, acl_id: &str, subnet_ids: &[String]) -> Result<(), ApiError> {
        if subnet_ids.is_empty() {
            return Ok(());
        }
        let result: Result<Ack, ApiError> = self
            .client
            .write(
                "DisassociateNetworkAclSubnets",
                &AclSubnetsRequest {
                    network_acl_id: acl_id,
                    subnet_ids,
                },
                &[],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if super::is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Unbinds every subnet still using the ACL, then deletes it. An ACL
    /// that is already gone counts as deleted.
    pub async fn delete(&self, acl_id: &str) -> Result<(), ApiError> {
        if let Some(acl) = self.describe_by_id(acl_id).await? {
            self.disassociate_subnets(acl_id, &acl.subnet_ids()).await?;
        }

        let result: Result<Ack, ApiError> = self
            .client
            .write(
                "DeleteNetworkAcl",
                &NetworkAclIdRequest {
                    network_acl_id: acl_id,
                },
                &[],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if super::is_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn send(&self, action: &str, acl_id: &str, set: &NetworkAclQuintupleSet) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                action,
                &QuintupleEntriesRequest {
                    network_acl_id: acl_id,
                    network_acl_quintuple_set: set,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn create_entries(&self, acl_id: &str, set: &NetworkAclQuintupleSet) -> Result<(), ApiError> {
        self.send("CreateNetworkAclQuintupleEntries", acl_id, set).await
    }

    pub async fn modify_entries(&self, acl_id: &str, set: &NetworkAclQuintupleSet) -> Result<(), ApiError> {
        self.send("ModifyNetworkAclQuintupleEntries", acl_id, set).await
    }

    pub async fn delete_entries(&self, acl_id: &str, set: &NetworkAclQuintupleSet) -> Result<(), ApiError> {
        if set.is_empty() {
            return Ok(());
        }
        self.send("DeleteNetworkAclQuintupleEntries", acl_id, set).await
    }

    /// `None` when the ACL itself is gone
    pub async fn describe_entries(&self, acl_id: &str) -> Result<Option<NetworkAclQuintupleSet>, ApiError> {
        let result = collect_pages(
            "DescribeNetworkAclQuintupleEntries",
            move |offset, limit| async move {
                let response: DescribeQuintupleEntriesResponse = self
                    .client
                    .read(
                        "DescribeNetworkAclQuintupleEntries",
                        &DescribeQuintupleEntriesRequest {
                            network_acl_id: acl_id,
                            offset,
                            limit,
                        },
                    )
                    .await?;
                Ok(response.network_acl_quintuple_set)
            },
            |entry| entry.network_acl_quintuple_entry_id.clone(),
        )
        .await;

        match result {
            Ok(entries) => Ok(Some(NetworkAclQuintupleSet::from_entries(entries))),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_split_by_direction() {
        let entries: Vec<NetworkAclQuintupleEntry> = serde_json::from_value(serde_json::json!([
            {"NetworkAclQuintupleEntryId": "acli45-1", "NetworkAclDirection": "INGRESS", "Protocol": "TCP", "Priority": 1},
            {"NetworkAclQuintupleEntryId": "acli45-2", "NetworkAclDirection": "EGRESS", "Protocol": "ALL"}
        ]))
        .unwrap();

        let set = NetworkAclQuintupleSet::from_entries(entries);
        assert_eq!(set.ingress.len(), 1);
        assert_eq!(set.egress[0].network_acl_quintuple_entry_id, "acli45-2");

        let json = serde_json::to_value(&set.ingress[0]).unwrap();
        assert!(json.get("NetworkAclDirection").is_none());
        assert_eq!(json["Priority"], 1);
    }

    #[test]
    fn entries_follow_rule_strings() {
        let rule = LiteRule::parse("ACCEPT#10.0.0.0/16#ALL#ICMP", "acl").unwrap();
        let entry = NetworkAclEntry::from(&rule);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Protocol": "ICMP", "CidrBlock": "10.0.0.0/16", "Action": "ACCEPT"})
        );

        let reported: NetworkAclEntry = serde_json::from_value(serde_json::json!({
            "Protocol": "tcp", "Port": "80", "CidrBlock": "0.0.0.0/0", "Action": "DROP"
        }))
        .unwrap();
        assert_eq!(LiteRule::from(&reported).to_string(), "DROP#0.0.0.0/0#80#TCP");
    }

    #[tokio::test]
    async fn delete_unbinds_subnets_first() {
        use crate::api::ClientConfig;
        use mockito::{Matcher, Server};

        let mut server = Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeNetworkAcls")
            .with_body(
                serde_json::json!({"Response": {
                    "NetworkAclSet": [{"NetworkAclId": "acl-1", "SubnetSet": [{"SubnetId": "subnet-1"}, {"SubnetId": "subnet-2"}]}],
                    "RequestId": "req-1"
                }})
                .to_string(),
            )
            .create_async()
            .await;
        let unbind = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DisassociateNetworkAclSubnets")
            .match_body(Matcher::Json(serde_json::json!({
                "NetworkAclId": "acl-1",
                "SubnetIds": ["subnet-1", "subnet-2"]
            })))
            .with_body(serde_json::json!({"Response": {"RequestId": "req-2"}}).to_string())
            .create_async()
            .await;
        let delete = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DeleteNetworkAcl")
            .with_body(
                serde_json::json!({"Response": {
                    "Error": {"Code": "ResourceNotFound", "Message": "gone"},
                    "RequestId": "req-3"
                }})
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = ClientConfig::new("AKIDtest", "secret", "ap-guangzhou");
        config.endpoint = Some(server.url());
        let client = Client::new(config).unwrap();
        client.network_acls().delete("acl-1").await.unwrap();

        unbind.assert_async().await;
        delete.assert_async().await;
    }
}
