//! Security group rule resource implementation
//!
//! A rule has no cloud-side id, so its Terraform id is the encoded rule
//! description and every attribute forces replacement.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::{CidrValidator, StringOneOfValidator};

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::Client;
use crate::ids::SecurityGroupRuleInfo;
use crate::rules::valid_port_range;

const SOURCES: [&str; 4] = [
    "cidr_ip",
    "source_sgid",
    "address_template_id",
    "address_template_group_id",
];

fn rule_info(value: &DynamicValue) -> Outcome<SecurityGroupRuleInfo> {
    let opt = |name: &str| value.get_string_opt(&path(name)).filter(|v| !v.is_empty());
    Ok(SecurityGroupRuleInfo {
        sg_id: required_string(value, "security_group_id")?,
        policy_type: required_string(value, "type")?,
        action: required_string(value, "policy")?,
        cidr_ip: opt("cidr_ip"),
        protocol: opt("ip_protocol"),
        port_range: opt("port_range"),
        source_sg_id: opt("source_sgid"),
        description: opt("description"),
        address_template_id: opt("address_template_id"),
        address_template_group_id: opt("address_template_group_id"),
        protocol_template_id: opt("protocol_template_id"),
        protocol_template_group_id: opt("protocol_template_group_id"),
    })
}

#[derive(Default)]
pub struct SecurityGroupRuleResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl SecurityGroupRuleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn force_new_string(name: &str, description: &str) -> AttributeBuilder {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .force_new()
}

#[async_trait]
impl Resource for SecurityGroupRuleResource {
    fn type_name(&self) -> &str {
        "tencentcloud_security_group_rule"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to create a security group rule.")
            .attribute(id_attribute())
            .attribute(
                force_new_string("security_group_id", "ID of the security group to be queried.")
                    .required()
                    .build(),
            )
            .attribute(
                force_new_string("type", "Type of the security group rule. Valid values: `ingress` and `egress`.")
                    .required()
                    .validator(StringOneOfValidator::create(&["ingress", "egress"]))
                    .build(),
            )
            .attribute(
                force_new_string("policy", "Rule policy of security group. Valid values: `ACCEPT` and `DROP`.")
                    .required()
                    .validator(StringOneOfValidator::create(&["ACCEPT", "DROP"]))
                    .build(),
            )
            .attribute(
                force_new_string("cidr_ip", "An IP address network or segment, and conflict with `source_sgid` and `address_template`.")
                    .validator(CidrValidator::create())
                    .build(),
            )
            .attribute(
                force_new_string("source_sgid", "ID of the nested security group, and conflicts with `cidr_ip` and `address_template`.")
                    .build(),
            )
            .attribute(
                force_new_string("address_template_id", "Address template ID, conflicts with `address_template_group_id`.")
                    .build(),
            )
            .attribute(
                force_new_string("address_template_group_id", "Address template group ID, conflicts with `address_template_id`.")
                    .build(),
            )
            .attribute(
                force_new_string("ip_protocol", "Type of IP protocol. Valid values: `TCP`, `UDP`, `ICMP`, `ICMPv6` and `ALL`. Conflicts with `protocol_template`.")
                    .validator(StringOneOfValidator::create(&["TCP", "UDP", "ICMP", "ICMPv6", "ALL"]))
                    .build(),
            )
            .attribute(
                force_new_string("port_range", "Range of the port. The available value can be one, multiple or one segment. E.g. `80`, `80,90` and `80-90`. Default to all ports, and conflicts with `protocol_template`.")
                    .build(),
            )
            .attribute(
                force_new_string("protocol_template_id", "Protocol template ID, conflicts with `protocol_template_group_id`.")
                    .build(),
            )
            .attribute(
                force_new_string("protocol_template_group_id", "Protocol template group ID, conflicts with `protocol_template_id`.")
                    .build(),
            )
            .attribute(
                force_new_string("description", "Description of the security group rule.")
                    .build(),
            )
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
        let config = &request.config;

        if !SOURCES.iter().any(|name| config.is_unknown_at(&path(name))) {
            let set: Vec<&str> = SOURCES
                .iter()
                .copied()
                .filter(|name| config.is_set(&path(name)))
                .collect();
            if set.len() != 1 {
                diagnostics.push(Diagnostic::error(
                    "Invalid rule source",
                    format!(
                        "exactly one of `{}` must be set, got {}",
                        SOURCES.join("`, `"),
                        set.len()
                    ),
                ));
            }
        }

        let uses_template = config.is_set(&path("protocol_template_id"))
            || config.is_set(&path("protocol_template_group_id"));
        if uses_template
            && (config.is_set(&path("ip_protocol")) || config.is_set(&path("port_range")))
        {
            diagnostics.push(Diagnostic::error(
                "Conflicting attributes",
                "`protocol_template_id` and `protocol_template_group_id` conflict with `ip_protocol` and `port_range`",
            ));
        }
        if config.is_set(&path("protocol_template_id"))
            && config.is_set(&path("protocol_template_group_id"))
        {
            diagnostics.push(
                Diagnostic::error(
                    "Conflicting attributes",
                    "`protocol_template_id` conflicts with `protocol_template_group_id`",
                )
                .with_attribute(path("protocol_template_group_id")),
            );
        }

        if let Some(port_range) = config.get_string_opt(&path("port_range")) {
            if !valid_port_range(&port_range) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid port_range",
                        format!("invalid value {}, should like 80, 80,90 or 80-90", port_range),
                    )
                    .with_attribute(path("port_range")),
                );
            }

            let protocol = config
                .get_string_opt(&path("ip_protocol"))
                .unwrap_or_else(|| "ALL".to_string())
                .to_uppercase();
            if protocol.starts_with("ICMP") || protocol == "ALL" {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid port_range",
                        format!("when ip_protocol is {}, port_range can't be set", protocol),
                    )
                    .with_attribute(path("port_range")),
                );
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
        if let Err(diag) = self.create_rule(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_rule(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "security group rule not found, removing from state");
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
        // every attribute forces replacement
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(client) = require_client(&self.provider_data, &mut diagnostics) else {
            return DeleteResourceResponse { diagnostics };
        };

        if let Err(diag) = self.delete_rule(client, &request.prior_state).await {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }
}

impl SecurityGroupRuleResource {
    async fn create_rule(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let info = rule_info(planned)?;

        client
            .security_groups()
            .create_policy(&info)
            .await
            .map_err(api_error("Failed to create security group rule"))?;

        let id = info
            .with_cloud_defaults()
            .to_id()
            .map_err(|e| Diagnostic::error("Failed to encode security group rule id", e.to_string()))?;
        let _ = state.set_string(&path("id"), id.clone());

        if !self.read_rule(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read security group rule",
                format!("security group rule [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_rule(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let info = SecurityGroupRuleInfo::parse(id)
            .map_err(|e| Diagnostic::error("Invalid security group rule id", e.to_string()))?;

        let Some(policy) = client
            .security_groups()
            .find_policy(&info)
            .await
            .map_err(api_error("Failed to read security group rule"))?
        else {
            return Ok(false);
        };

        let set_opt = |state: &mut DynamicValue, name: &str, value: Option<String>| {
            match value.filter(|v| !v.is_empty()) {
                Some(v) => {
                    let _ = state.set_string(&path(name), v);
                }
                None => {
                    let _ = state.set_null(&path(name));
                }
            }
        };

        let _ = state.set_string(&path("security_group_id"), info.sg_id.clone());
        let _ = state.set_string(&path("type"), info.policy_type.clone());
        let _ = state.set_string(&path("policy"), info.action.to_uppercase());
        set_opt(state, "cidr_ip", policy.cidr_block.clone());
        set_opt(state, "source_sgid", policy.security_group_id.clone());
        set_opt(state, "description", policy.policy_description.clone());

        // ALL is what the cloud reports when protocol or ports were omitted
        if info.protocol_template_id.is_none() && info.protocol_template_group_id.is_none() {
            let configured = |name: &str| state.is_set(&path(name));
            let protocol = policy.protocol.clone().filter(|p| p != "ALL" || configured("ip_protocol"));
            let port = policy.port.clone().filter(|p| p != "ALL" || configured("port_range"));
            set_opt(state, "ip_protocol", protocol);
            set_opt(state, "port_range", port);
        }

        Ok(true)
    }

    async fn delete_rule(&self, client: &Client, prior: &DynamicValue) -> Outcome<()> {
        let id = state_id(prior)?;
        let info = SecurityGroupRuleInfo::parse(&id)
            .map_err(|e| Diagnostic::error("Invalid security group rule id", e.to_string()))?;

        client
            .security_groups()
            .delete_policy(&info)
            .await
            .map_err(api_error("Failed to delete security group rule"))
    }
}

#[async_trait]
impl ResourceWithConfigure for SecurityGroupRuleResource {
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
    fn port_ranges() {
        for ok in ["80", "80,443,8080", "8000-9000", "ALL"] {
            assert!(valid_port_range(ok), "{ok} should be valid");
        }
        for bad in ["", "80-", "80,", "abc", "123456", "80-90,100"] {
            assert!(!valid_port_range(bad), "{bad} should be invalid");
        }
    }
}
