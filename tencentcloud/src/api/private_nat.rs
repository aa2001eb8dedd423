//! Private NAT gateway translation rules

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{collect_pages, wait_vpc_task, ApiError, Client};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TranslationNatRule {
    /// `LOCAL` or `PEER`
    pub translation_direction: String,
    /// `NETWORK_LAYER` or `TRANSPORT_LAYER`
    pub translation_type: String,
    pub translation_ip: String,
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub original_ip: String,
}

impl TranslationNatRule {
    fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.translation_direction, self.translation_type, self.translation_ip, self.original_ip
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateTranslationNatRuleRequest<'a> {
    nat_gateway_id: &'a str,
    translation_nat_rules: &'a [TranslationNatRule],
}

/// Rule writes may hand back a task id, as a string or a number
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranslationNatRuleTask {
    #[serde(default)]
    task_id: Option<serde_json::Value>,
}

impl TranslationNatRuleTask {
    async fn wait(self, client: &Client) -> Result<(), ApiError> {
        let task_id = match self.task_id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        if task_id.is_empty() {
            return Ok(());
        }
        wait_vpc_task(client, &task_id).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTranslationNatRulesRequest<'a> {
    nat_gateway_id: &'a str,
    offset: u64,
    limit: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTranslationNatRulesResponse {
    #[serde(default)]
    translation_nat_rule_set: Vec<TranslationNatRule>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteTranslationNatRuleRequest<'a> {
    nat_gateway_id: &'a str,
    translation_direction: &'a str,
    translation_type: &'a str,
    translation_ips: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    original_ips: Vec<String>,
}

pub struct PrivateNatApi<'a> {
    client: &'a Client,
}

impl<'a> PrivateNatApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create_rules(&self, nat_id: &str, rules: &[TranslationNatRule]) -> Result<(), ApiError> {
        if rules.is_empty() {
            return Ok(());
        }
        let task: TranslationNatRuleTask = self
            .client
            .write(
                "CreatePrivateNatGatewayTranslationNatRule",
                &CreateTranslationNatRuleRequest {
                    nat_gateway_id: nat_id,
                    translation_nat_rules: rules,
                },
                &[],
            )
            .await?;
        task.wait(self.client).await
    }

    pub async fn describe_rules(&self, nat_id: &str) -> Result<Vec<TranslationNatRule>, ApiError> {
        collect_pages(
            "DescribePrivateNatGatewayTranslationNatRules",
            move |offset, limit| async move {
                let response: DescribeTranslationNatRulesResponse = self
                    .client
                    .read(
                        "DescribePrivateNatGatewayTranslationNatRules",
                        &DescribeTranslationNatRulesRequest {
                            nat_gateway_id: nat_id,
                            offset,
                            limit,
                        },
                    )
                    .await?;
                Ok(response.translation_nat_rule_set)
            },
            TranslationNatRule::key,
        )
        .await
    }

    /// One delete call per direction and translation type. `OriginalIps`
    /// lines up index for index with `TranslationIps` and is left out only
    /// when no rule in the group has one.
    pub async fn delete_rules(&self, nat_id: &str, rules: &[TranslationNatRule]) -> Result<(), ApiError> {
        for ((direction, translation_type), group) in group_rules(rules) {
            let (translation_ips, original_ips) = rule_ips(&group);
            let task: TranslationNatRuleTask = self
                .client
                .write(
                    "DeletePrivateNatGatewayTranslationNatRule",
                    &DeleteTranslationNatRuleRequest {
                        nat_gateway_id: nat_id,
                        translation_direction: &direction,
                        translation_type: &translation_type,
                        translation_ips,
                        original_ips,
                    },
                    &[],
                )
                .await?;
            task.wait(self.client).await?;
        }
        Ok(())
    }
}

fn rule_ips(group: &[&TranslationNatRule]) -> (Vec<String>, Vec<String>) {
    let translation_ips = group.iter().map(|r| r.translation_ip.clone()).collect();
    let original_ips = if group.iter().any(|r| !r.original_ip.is_empty()) {
        group.iter().map(|r| r.original_ip.clone()).collect()
    } else {
        Vec::new()
    };
    (translation_ips, original_ips)
}

fn group_rules(rules: &[TranslationNatRule]) -> BTreeMap<(String, String), Vec<&TranslationNatRule>> {
    let mut groups: BTreeMap<(String, String), Vec<&TranslationNatRule>> = BTreeMap::new();
    for rule in rules {
        groups
            .entry((rule.translation_direction.clone(), rule.translation_type.clone()))
            .or_default()
            .push(rule);
    }
    groups
}

/// Rules only in `old` and rules only in `new`
pub fn diff_rules(
    old: &[TranslationNatRule],
    new: &[TranslationNatRule],
) -> (Vec<TranslationNatRule>, Vec<TranslationNatRule>) {
    let removed = old.iter().filter(|r| !new.contains(r)).cloned().collect();
    let added = new.iter().filter(|r| !old.contains(r)).cloned().collect();
    (removed, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::ClientConfig;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn rule(direction: &str, ip: &str) -> TranslationNatRule {
        TranslationNatRule {
            translation_direction: direction.to_string(),
            translation_type: "NETWORK_LAYER".to_string(),
            translation_ip: ip.to_string(),
            description: "test".to_string(),
            original_ip: "10.0.0.1".to_string(),
        }
    }

    #[test]
    fn diff_and_group() {
        let old = vec![rule("LOCAL", "2.2.2.2"), rule("PEER", "3.3.3.3")];
        let new = vec![rule("LOCAL", "2.2.2.2"), rule("LOCAL", "4.4.4.4")];

        let (removed, added) = diff_rules(&old, &new);
        assert_eq!(removed, vec![rule("PEER", "3.3.3.3")]);
        assert_eq!(added, vec![rule("LOCAL", "4.4.4.4")]);

        let groups = group_rules(&new);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[&("LOCAL".to_string(), "NETWORK_LAYER".to_string())].len(),
            2
        );
    }

    #[test]
    fn original_ips_stay_aligned_with_translation_ips() {
        let mut bare = rule("LOCAL", "5.5.5.5");
        bare.original_ip = String::new();
        let with_original = rule("LOCAL", "2.2.2.2");

        let (translation, original) = rule_ips(&[&bare, &with_original]);
        assert_eq!(translation, vec!["5.5.5.5", "2.2.2.2"]);
        assert_eq!(original, vec!["", "10.0.0.1"]);

        let (_, none) = rule_ips(&[&bare]);
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn delete_rules_waits_for_returned_task() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DeletePrivateNatGatewayTranslationNatRule")
            .match_body(Matcher::Json(serde_json::json!({
                "NatGatewayId": "intranat-1",
                "TranslationDirection": "LOCAL",
                "TranslationType": "NETWORK_LAYER",
                "TranslationIps": ["2.2.2.2"],
                "OriginalIps": ["10.0.0.1"]
            })))
            .with_body(r#"{"Response":{"TaskId":"task-9","RequestId":"r1"}}"#)
            .expect(1)
            .create_async()
            .await;
        let task = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeVpcTaskResult")
            .match_body(Matcher::Json(serde_json::json!({"TaskId": "task-9"})))
            .with_body(r#"{"Response":{"Status":"SUCCESS","Output":"","RequestId":"r2"}}"#)
            .expect(1)
            .create_async()
            .await;

        let mut config = ClientConfig::new("id", "key", "ap-guangzhou");
        config.endpoint = Some(server.url());
        config.poll_interval = Duration::from_millis(10);
        let client = Client::new(config).unwrap();

        client
            .private_nat()
            .delete_rules("intranat-1", &[rule("LOCAL", "2.2.2.2")])
            .await
            .unwrap();

        delete.assert_async().await;
        task.assert_async().await;
    }
}
