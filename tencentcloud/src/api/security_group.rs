//! Security group and security group policy calls

use serde::{Deserialize, Serialize};

use super::{Ack, ApiError, Client, Tag};
use crate::api::error::MUTEX_TASK_RUNNING;
use crate::ids::SecurityGroupRuleInfo;
use crate::rules::LiteRule;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SecurityGroupInfo {
    pub security_group_id: String,
    pub security_group_name: String,
    pub security_group_desc: String,
    pub project_id: String,
    pub is_default: bool,
    pub created_time: String,
    pub tag_set: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddressTemplateSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_group_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceTemplateSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_group_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_template: Option<AddressTemplateSpecification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_template: Option<ServiceTemplateSpecification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_description: Option<String>,
}

impl SecurityGroupPolicy {
    /// Policy as sent on create
    pub fn for_create(info: &SecurityGroupRuleInfo) -> Self {
        let address_template = (info.address_template_id.is_some()
            || info.address_template_group_id.is_some())
        .then(|| AddressTemplateSpecification {
            address_id: info.address_template_id.clone(),
            address_group_id: info.address_template_group_id.clone(),
        });
        let service_template = (info.protocol_template_id.is_some()
            || info.protocol_template_group_id.is_some())
        .then(|| ServiceTemplateSpecification {
            service_id: info.protocol_template_id.clone(),
            service_group_id: info.protocol_template_group_id.clone(),
        });

        Self {
            protocol: info.protocol.as_ref().map(|p| p.to_uppercase()),
            port: info.port_range.clone(),
            cidr_block: info.cidr_ip.clone(),
            security_group_id: info.source_sg_id.clone(),
            address_template,
            service_template,
            action: Some(info.action.to_uppercase()),
            policy_description: info.description.clone(),
        }
    }

    /// Policy as sent on delete: defaulted fields are left out
    pub fn for_delete(info: &SecurityGroupRuleInfo) -> Self {
        let mut policy = Self::for_create(info);
        policy.policy_description = None;
        policy.cidr_block = info.cidr_ip.clone().filter(|c| !c.is_empty());
        policy.protocol = info
            .protocol
            .clone()
            .filter(|p| p != "ALL")
            .map(|p| p.to_uppercase());
        policy.port = info.port_range.clone().filter(|p| p != "ALL");
        policy.security_group_id = info.source_sg_id.clone().filter(|s| !s.is_empty());
        policy
    }

    /// Plain CIDR policy of a lite rule
    pub fn from_lite_rule(rule: &LiteRule) -> Self {
        Self {
            protocol: Some(rule.protocol.clone()),
            port: Some(rule.port.clone()).filter(|p| !p.is_empty()),
            cidr_block: Some(rule.cidr_ip.clone()),
            action: Some(rule.action.clone()),
            ..Default::default()
        }
    }

    /// The lite rule this policy reads as. Policies sourced from another
    /// group or an address template have no lite form.
    pub fn lite_rule(&self) -> Option<LiteRule> {
        let cidr = self.cidr_block.as_deref().filter(|c| !c.is_empty())?;
        let sourced = self
            .security_group_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
            || self.address_template.is_some()
            || self.service_template.is_some();
        if sourced {
            return None;
        }
        Some(LiteRule::from_cloud(
            self.action.as_deref().unwrap_or_default(),
            cidr,
            self.port.as_deref().unwrap_or_default(),
            self.protocol.as_deref().unwrap_or("ALL"),
        ))
    }

    /// Whether this cloud policy is the one described by `info`
    pub fn matches(&self, info: &SecurityGroupRuleInfo) -> bool {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();

        if field(&self.policy_description) != field(&info.description) {
            return false;
        }
        if field(&self.cidr_block) != field(&info.cidr_ip) {
            return false;
        }
        if field(&self.port) != field(&info.port_range) {
            return false;
        }
        if !field(&self.protocol).eq_ignore_ascii_case(&field(&info.protocol)) {
            return false;
        }
        if field(&self.security_group_id) != field(&info.source_sg_id) {
            return false;
        }
        if !field(&self.action).eq_ignore_ascii_case(&info.action) {
            return false;
        }

        let address = self.address_template.clone().unwrap_or_default();
        if info.address_template_id.is_some() && address.address_id != info.address_template_id {
            return false;
        }
        if info.address_template_group_id.is_some()
            && address.address_group_id != info.address_template_group_id
        {
            return false;
        }
        let service = self.service_template.clone().unwrap_or_default();
        if info.protocol_template_id.is_some() && service.service_id != info.protocol_template_id {
            return false;
        }
        if info.protocol_template_group_id.is_some()
            && service.service_group_id != info.protocol_template_group_id
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupPolicySet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<SecurityGroupPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<SecurityGroupPolicy>,
}

impl SecurityGroupPolicySet {
    /// A set holding one policy in the direction named by `policy_type`
    pub fn single(policy_type: &str, policy: SecurityGroupPolicy) -> Self {
        let mut set = Self::default();
        if policy_type.eq_ignore_ascii_case("egress") {
            set.egress.push(policy);
        } else {
            set.ingress.push(policy);
        }
        set
    }

    pub fn direction(&self, policy_type: &str) -> &[SecurityGroupPolicy] {
        if policy_type.eq_ignore_ascii_case("egress") {
            &self.egress
        } else {
            &self.ingress
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSecurityGroupRequest<'a> {
    group_name: &'a str,
    group_description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(skip_serializing_if = "<[Tag]>::is_empty")]
    tags: &'a [Tag],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateSecurityGroupResponse {
    security_group: SecurityGroupInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroupsRequest<'a> {
    security_group_ids: [&'a str; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroupsResponse {
    #[serde(default)]
    security_group_set: Vec<SecurityGroupInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifySecurityGroupAttributeRequest<'a> {
    security_group_id: &'a str,
    group_name: &'a str,
    group_description: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityGroupIdRequest<'a> {
    security_group_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PoliciesRequest<'a> {
    security_group_id: &'a str,
    security_group_policy_set: SecurityGroupPolicySet,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecurityGroupPoliciesResponse {
    #[serde(default)]
    security_group_policy_set: SecurityGroupPolicySet,
}

pub struct SecurityGroupApi<'a> {
    client: &'a Client,
}

impl<'a> SecurityGroupApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(
        &self,
        name: &str,
        description: &str,
        project_id: Option<i64>,
        tags: &[Tag],
    ) -> Result<SecurityGroupInfo, ApiError> {
        let response: CreateSecurityGroupResponse = self
            .client
            .write(
                "CreateSecurityGroup",
                &CreateSecurityGroupRequest {
                    group_name: name,
                    group_description: description,
                    project_id: project_id.map(|p| p.to_string()),
                    tags,
                },
                &[],
            )
            .await?;
        Ok(response.security_group)
    }

    pub async fn describe_by_id(&self, sg_id: &str) -> Result<Option<SecurityGroupInfo>, ApiError> {
        let result: Result<DescribeSecurityGroupsResponse, _> = self
            .client
            .read(
                "DescribeSecurityGroups",
                &DescribeSecurityGroupsRequest {
                    security_group_ids: [sg_id],
                },
            )
            .await;
        match result {
            Ok(response) => Ok(response
                .security_group_set
                .into_iter()
                .find(|sg| sg.security_group_id == sg_id)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn modify_attribute(
        &self,
        sg_id: &str,
        name: &str,
        description: &str,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifySecurityGroupAttribute",
                &ModifySecurityGroupAttributeRequest {
                    security_group_id: sg_id,
                    group_name: name,
                    group_description: description,
                },
                &[],
            )
            .await?;
        Ok(())
    }

    /// Deletion is refused while instances still use the group, so
    /// `ResourceInUse` is retried until the write timeout
    pub async fn delete(&self, sg_id: &str) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DeleteSecurityGroup",
                &SecurityGroupIdRequest {
                    security_group_id: sg_id,
                },
                &["ResourceInUse"],
            )
            .await?;
        Ok(())
    }

    pub async fn create_policy(&self, info: &SecurityGroupRuleInfo) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "CreateSecurityGroupPolicies",
                &PoliciesRequest {
                    security_group_id: &info.sg_id,
                    security_group_policy_set: SecurityGroupPolicySet::single(
                        &info.policy_type,
                        SecurityGroupPolicy::for_create(info),
                    ),
                },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;
        Ok(())
    }

    pub async fn describe_policies(
        &self,
        sg_id: &str,
    ) -> Result<Option<SecurityGroupPolicySet>, ApiError> {
        let result: Result<DescribeSecurityGroupPoliciesResponse, _> = self
            .client
            .read(
                "DescribeSecurityGroupPolicies",
                &SecurityGroupIdRequest {
                    security_group_id: sg_id,
                },
            )
            .await;
        match result {
            Ok(response) => Ok(Some(response.security_group_policy_set)),
            Err(e) if super::is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The cloud policy matching `info`; `None` when it or its group is gone
    pub async fn find_policy(
        &self,
        info: &SecurityGroupRuleInfo,
    ) -> Result<Option<SecurityGroupPolicy>, ApiError> {
        let Some(set) = self.describe_policies(&info.sg_id).await? else {
            return Ok(None);
        };
        Ok(set
            .direction(&info.policy_type)
            .iter()
            .find(|p| p.matches(info))
            .cloned())
    }

    /// Replaces every ingress and egress policy of the group
    pub async fn replace_policies(
        &self,
        sg_id: &str,
        set: SecurityGroupPolicySet,
    ) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "ModifySecurityGroupPolicies",
                &PoliciesRequest {
                    security_group_id: sg_id,
                    security_group_policy_set: set,
                },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_policies(
        &self,
        sg_id: &str,
        set: SecurityGroupPolicySet,
    ) -> Result<(), ApiError> {
        if set.ingress.is_empty() && set.egress.is_empty() {
            return Ok(());
        }
        let _: Ack = self
            .client
            .write(
                "DeleteSecurityGroupPolicies",
                &PoliciesRequest {
                    security_group_id: sg_id,
                    security_group_policy_set: set,
                },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;
        Ok(())
    }

    pub async fn delete_policy(&self, info: &SecurityGroupRuleInfo) -> Result<(), ApiError> {
        let _: Ack = self
            .client
            .write(
                "DeleteSecurityGroupPolicies",
                &PoliciesRequest {
                    security_group_id: &info.sg_id,
                    security_group_policy_set: SecurityGroupPolicySet::single(
                        &info.policy_type,
                        SecurityGroupPolicy::for_delete(info),
                    ),
                },
                &[MUTEX_TASK_RUNNING],
            )
            .await?;
        Ok(())
    }
}
