//! Security group lite rule resource implementation
//!
//! Owns the whole policy set of a group, written as `ACTION#CIDR#PORT#PROTOCOL`
//! strings. Policies sourced from another group or an address template are
//! outside of what it manages and are not read back.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    rule_list, set_optional_list, state_id, Outcome,
};
use crate::api::security_group::{SecurityGroupPolicy, SecurityGroupPolicySet};
use crate::api::Client;
use crate::rules::RuleListValidator;

const RULE_KIND: &str = "security group";

fn rules_attribute(name: &str, direction: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::list_of(AttributeType::String))
        .description(&format!(
            "{} rules set. A rule must match the following format: [action]#[cidr_ip]#[port]#[protocol]. \
             The available value of 'action' is `ACCEPT` and `DROP`. The 'cidr_ip' must be an IP \
             address network or segment. The 'port' valid format is `80`, `80,443`, `80-90` or \
             `ALL`. The available value of 'protocol' is `TCP`, `UDP`, `ICMP` and `ALL`. When \
             'protocol' is `ICMP` or `ALL`, the 'port' must be `ALL`.",
            direction
        ))
        .optional()
        .validator(RuleListValidator::create(RULE_KIND))
        .build()
}

/// Policy set from the rule lists of `value`, in configured order
fn policy_set(value: &DynamicValue) -> Outcome<SecurityGroupPolicySet> {
    let policies = |name: &str| -> Outcome<Vec<SecurityGroupPolicy>> {
        Ok(rule_list(value, name, RULE_KIND)?
            .iter()
            .map(SecurityGroupPolicy::from_lite_rule)
            .collect())
    };
    Ok(SecurityGroupPolicySet {
        ingress: policies("ingress")?,
        egress: policies("egress")?,
    })
}

fn rule_strings(policies: &[SecurityGroupPolicy]) -> Vec<String> {
    policies
        .iter()
        .filter_map(SecurityGroupPolicy::lite_rule)
        .map(|rule| rule.to_string())
        .collect()
}

#[derive(Default)]
pub struct SecurityGroupLiteRuleResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl SecurityGroupLiteRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for SecurityGroupLiteRuleResource {
    fn type_name(&self) -> &str {
        "tencentcloud_security_group_lite_rule"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provide a resource to create security group some lite rules quickly.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("security_group_id", AttributeType::String)
                    .description("ID of the security group.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(rules_attribute("ingress", "Ingress"))
            .attribute(rules_attribute("egress", "Egress"))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics,
            };
        };

        let mut state = request.planned_state.clone();
        let result = async {
            let sg_id = required_string(&request.planned_state, "security_group_id")?;
            self.apply_rules(client, &sg_id, &request.planned_state, &mut state)
                .await
        }
        .await;
        if let Err(diag) = result {
            diagnostics.push(diag);
        }

        CreateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
                private: request.private,
                deferred: None,
            };
        };

        let mut state = request.current_state.clone();
        let result = match state_id(&state) {
            Ok(id) => self.read_rules(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "security group of lite rules not found, removing from state");
                None
            }
            Err(diag) => {
                diagnostics.push(diag);
                Some(request.current_state)
            }
        };

        ReadResourceResponse {
            new_state,
            diagnostics,
            private: request.private,
            deferred: None,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return UpdateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics,
            };
        };

        let mut state = request.planned_state.clone();
        let result = async {
            let sg_id = state_id(&request.prior_state)?;
            self.apply_rules(client, &sg_id, &request.planned_state, &mut state)
                .await
        }
        .await;
        if let Err(diag) = result {
            diagnostics.push(diag);
            state = request.prior_state;
        }

        UpdateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return DeleteResourceResponse { diagnostics };
        };

        let result = async {
            let sg_id = state_id(&request.prior_state)?;
            let set = policy_set(&request.prior_state)?;
            match client.security_groups().delete_policies(&sg_id, set).await {
                Ok(()) => Ok(()),
                Err(e) if crate::api::is_not_found(&e) => Ok(()),
                Err(e) => Err(api_error("Failed to delete lite rules")(e)),
            }
        }
        .await;
        if let Err(diag) = result {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

impl SecurityGroupLiteRuleResource {
    /// Replaces the policy set of the group with the planned rules
    async fn apply_rules(
        &self,
        client: &Client,
        sg_id: &str,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let set = policy_set(planned)?;
        client
            .security_groups()
            .replace_policies(sg_id, set)
            .await
            .map_err(api_error("Failed to set lite rules"))?;
        let _ = state.set_string(&path("id"), sg_id.to_string());

        if !self.read_rules(client, sg_id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read lite rules",
                format!("Security group [{}] not found after setting rules", sg_id),
            ));
        }
        Ok(())
    }

    async fn read_rules(&self, client: &Client, sg_id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(set) = client
            .security_groups()
            .describe_policies(sg_id)
            .await
            .map_err(api_error("Failed to read lite rules"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), sg_id.to_string());
        let _ = state.set_string(&path("security_group_id"), sg_id.to_string());
        set_optional_list(state, "ingress", rule_strings(&set.ingress));
        set_optional_list(state, "egress", rule_strings(&set.egress));

        Ok(true)
    }
}

#[async_trait]
impl ResourceWithImportState for SecurityGroupLiteRuleResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };
        import_state_passthrough_id(&ctx, path("id"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for SecurityGroupLiteRuleResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        self.provider_data =
            extract_provider_data(request.provider_data, "resource", &mut diagnostics);
        ConfigureResourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_round_trip_through_policies() {
        let mut value = DynamicValue::empty_object();
        value
            .set_string_list(
                &path("egress"),
                vec![
                    "DROP#8.8.8.8#ALL#ALL".to_string(),
                    "ACCEPT#10.0.0.0/8#80-90#UDP".to_string(),
                ],
            )
            .unwrap();

        let set = policy_set(&value).unwrap();
        assert!(set.ingress.is_empty());
        assert_eq!(set.egress[0].port, None);
        assert_eq!(set.egress[1].port.as_deref(), Some("80-90"));
        assert_eq!(
            rule_strings(&set.egress),
            vec!["DROP#8.8.8.8#ALL#ALL", "ACCEPT#10.0.0.0/8#80-90#UDP"]
        );
    }

    #[test]
    fn policies_from_other_groups_are_not_read_back() {
        let policies = vec![
            SecurityGroupPolicy {
                security_group_id: Some("sg-other".to_string()),
                action: Some("ACCEPT".to_string()),
                protocol: Some("ALL".to_string()),
                ..Default::default()
            },
            SecurityGroupPolicy {
                cidr_block: Some("0.0.0.0/0".to_string()),
                action: Some("accept".to_string()),
                protocol: Some("tcp".to_string()),
                port: Some("443".to_string()),
                ..Default::default()
            },
        ];
        assert_eq!(rule_strings(&policies), vec!["ACCEPT#0.0.0.0/0#443#TCP"]);
    }
}
