//! Private NAT gateway translation rule resource implementation
//!
//! One Terraform resource owns the whole rule list of a gateway. Updates
//! delete the rules that disappeared and create the ones that are new, rules
//! present on both sides are left untouched.

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::private_nat::{diff_rules, TranslationNatRule};
use crate::api::Client;

const RULES: &str = "translation_nat_rules";

fn field(item: &HashMap<String, Dynamic>, name: &str) -> String {
    item.get(name)
        .and_then(Dynamic::as_str)
        .unwrap_or_default()
        .to_string()
}

fn rules_of(value: &DynamicValue) -> Vec<TranslationNatRule> {
    value
        .get_object_list(&path(RULES))
        .iter()
        .map(|item| TranslationNatRule {
            translation_direction: field(item, "translation_direction"),
            translation_type: field(item, "translation_type"),
            translation_ip: field(item, "translation_ip"),
            description: field(item, "description"),
            original_ip: field(item, "original_ip"),
        })
        .collect()
}

fn rule_object(rule: &TranslationNatRule) -> HashMap<String, Dynamic> {
    let original_ip = if rule.original_ip.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::from(rule.original_ip.as_str())
    };
    HashMap::from([
        (
            "translation_direction".to_string(),
            Dynamic::from(rule.translation_direction.as_str()),
        ),
        (
            "translation_type".to_string(),
            Dynamic::from(rule.translation_type.as_str()),
        ),
        (
            "translation_ip".to_string(),
            Dynamic::from(rule.translation_ip.as_str()),
        ),
        ("description".to_string(), Dynamic::from(rule.description.as_str())),
        ("original_ip".to_string(), original_ip),
    ])
}

/// Keeps remote rules in the order they were configured, unknown ones last
fn order_like(known: &[TranslationNatRule], mut remote: Vec<TranslationNatRule>) -> Vec<TranslationNatRule> {
    let rank = |rule: &TranslationNatRule| {
        known
            .iter()
            .position(|k| k == rule)
            .unwrap_or(known.len())
    };
    remote.sort_by_key(|rule| rank(rule));
    remote
}

#[derive(Default)]
pub struct VpcPrivateNatGatewayTranslationNatRuleResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcPrivateNatGatewayTranslationNatRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for VpcPrivateNatGatewayTranslationNatRuleResource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_private_nat_gateway_translation_nat_rule"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let rule_block = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("translation_direction", AttributeType::String)
                    .description("Translation rule target, optional values `LOCAL`, `PEER`.")
                    .required()
                    .validator(StringOneOfValidator::create(&["LOCAL", "PEER"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("translation_type", AttributeType::String)
                    .description("Translation rule type, optional values `NETWORK_LAYER`, `TRANSPORT_LAYER`.")
                    .required()
                    .validator(StringOneOfValidator::create(&[
                        "NETWORK_LAYER",
                        "TRANSPORT_LAYER",
                    ]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("translation_ip", AttributeType::String)
                    .description("Mapped IP. For a network layer rule it must be a single IP, for a transport layer rule it may be a range.")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("Translation rule description.")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("original_ip", AttributeType::String)
                    .description("Source IP. Required when the translation type is `NETWORK_LAYER`.")
                    .optional()
                    .build(),
            )
            .build_block();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to manage the translation rules of a private NAT gateway.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("nat_gateway_id", AttributeType::String)
                    .description("The unique ID of the private NAT gateway, such as `intranat-xxxxxxxx`.")
                    .required()
                    .force_new()
                    .build(),
            )
            .block(NestedBlock::list(RULES, rule_block))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        if !request.config.is_unknown_at(&path(RULES)) {
            for (idx, rule) in rules_of(&request.config).iter().enumerate() {
                if rule.translation_type == "NETWORK_LAYER" && rule.original_ip.is_empty() {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing original IP",
                            "`original_ip` is required when `translation_type` is `NETWORK_LAYER`",
                        )
                        .with_attribute(path(RULES).index(idx as i64).attribute("original_ip")),
                    );
                }
            }
        }

        ValidateResourceConfigResponse { diagnostics }
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
        if let Err(diag) = self.create_rules(client, &request.planned_state, &mut state).await {
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
                tracing::warn!(log_id = %ctx.log_id(), "translation nat rules not found, removing from state");
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
        if let Err(diag) = self
            .update_rules(client, &request.prior_state, &request.planned_state, &mut state)
            .await
        {
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
            let nat_id = state_id(&request.prior_state)?;
            let private_nat = client.private_nat();
            let rules = private_nat
                .describe_rules(&nat_id)
                .await
                .map_err(api_error("Failed to read translation nat rules"))?;
            private_nat
                .delete_rules(&nat_id, &rules)
                .await
                .map_err(api_error("Failed to delete translation nat rules"))
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

impl VpcPrivateNatGatewayTranslationNatRuleResource {
    async fn create_rules(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let nat_id = required_string(planned, "nat_gateway_id")?;

        client
            .private_nat()
            .create_rules(&nat_id, &rules_of(planned))
            .await
            .map_err(api_error("Failed to create translation nat rules"))?;
        let _ = state.set_string(&path("id"), nat_id.clone());

        if !self.read_rules(client, &nat_id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read translation nat rules",
                format!("private nat gateway [{}] has no translation rules after create", nat_id),
            ));
        }
        Ok(())
    }

    async fn read_rules(&self, client: &Client, nat_id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let remote = client
            .private_nat()
            .describe_rules(nat_id)
            .await
            .map_err(api_error("Failed to read translation nat rules"))?;
        if remote.is_empty() {
            return Ok(false);
        }

        let rules = order_like(&rules_of(state), remote);
        let _ = state.set_string(&path("id"), nat_id.to_string());
        let _ = state.set_string(&path("nat_gateway_id"), nat_id.to_string());
        let _ = state.set_object_list(&path(RULES), rules.iter().map(rule_object).collect());

        Ok(true)
    }

    async fn update_rules(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let nat_id = state_id(prior)?;
        let (removed, added) = diff_rules(&rules_of(prior), &rules_of(planned));
        let private_nat = client.private_nat();

        if !removed.is_empty() {
            tracing::debug!(nat_id = %nat_id, count = removed.len(), "deleting translation nat rules");
            private_nat
                .delete_rules(&nat_id, &removed)
                .await
                .map_err(api_error("Failed to delete translation nat rules"))?;
        }
        if !added.is_empty() {
            tracing::debug!(nat_id = %nat_id, count = added.len(), "creating translation nat rules");
            private_nat
                .create_rules(&nat_id, &added)
                .await
                .map_err(api_error("Failed to create translation nat rules"))?;
        }

        if !self.read_rules(client, &nat_id, state).await? {
            let _ = state.set_object_list(&path(RULES), vec![]);
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for VpcPrivateNatGatewayTranslationNatRuleResource {
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
impl ResourceWithConfigure for VpcPrivateNatGatewayTranslationNatRuleResource {
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

    fn rule(ip: &str) -> TranslationNatRule {
        TranslationNatRule {
            translation_direction: "LOCAL".to_string(),
            translation_type: "NETWORK_LAYER".to_string(),
            translation_ip: ip.to_string(),
            description: "rule".to_string(),
            original_ip: "10.0.0.1".to_string(),
        }
    }

    #[test]
    fn remote_rules_follow_configured_order() {
        let known = vec![rule("2.2.2.2"), rule("1.1.1.1")];
        let remote = vec![rule("3.3.3.3"), rule("1.1.1.1"), rule("2.2.2.2")];

        let ordered = order_like(&known, remote);
        assert_eq!(ordered, vec![rule("2.2.2.2"), rule("1.1.1.1"), rule("3.3.3.3")]);
    }

    #[test]
    fn rules_round_trip_through_state() {
        let mut state = DynamicValue::empty_object();
        let mut no_original = rule("4.4.4.4");
        no_original.translation_type = "TRANSPORT_LAYER".to_string();
        no_original.original_ip = String::new();

        state
            .set_object_list(&path(RULES), vec![rule_object(&rule("1.1.1.1")), rule_object(&no_original)])
            .unwrap();

        assert!(state.get(&path(RULES).index(1).attribute("original_ip")).is_null());
        assert_eq!(rules_of(&state), vec![rule("1.1.1.1"), no_original]);
    }
}
