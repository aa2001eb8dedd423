//! Network ACL resource implementation

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
use tfplug::validator::StringLengthValidator;

use super::common::{
    api_error, changed, create_time_attribute, extract_provider_data, id_attribute, path,
    require_client, required_string, rule_list, set_optional_list, set_tags, state_id,
    tags_attribute, update_tags, Outcome,
};
use crate::api::network_acl::{NetworkAclEntry, NetworkAclEntrySet, NetworkAclInfo};
use crate::api::{tags_from_map, tags_to_map, Client};
use crate::rules::{LiteRule, RuleListValidator};

const RULE_KIND: &str = "acl";

fn rules_attribute(name: &str, direction: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::list_of(AttributeType::String))
        .description(&format!(
            "{} rules. A rule must match the following format: [action]#[cidr_ip]#[port]#[protocol]. \
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

/// Entry set for ModifyNetworkAclEntries from the planned rule lists
fn entry_set(planned: &DynamicValue) -> Outcome<NetworkAclEntrySet> {
    let entries = |name: &str| -> Outcome<Vec<NetworkAclEntry>> {
        Ok(rule_list(planned, name, RULE_KIND)?
            .iter()
            .map(NetworkAclEntry::from)
            .collect())
    };
    Ok(NetworkAclEntrySet {
        ingress: entries("ingress")?,
        egress: entries("egress")?,
    })
}

fn rule_strings(entries: &[NetworkAclEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| LiteRule::from(entry).to_string())
        .collect()
}

#[derive(Default)]
pub struct VpcAclResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcAclResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for VpcAclResource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_acl"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provide a resource to create a VPC ACL instance.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .description("ID of the VPC instance.")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Name of the network ACL.")
                    .required()
                    .validator(StringLengthValidator::between(1, 60))
                    .build(),
            )
            .attribute(rules_attribute("ingress", "Ingress"))
            .attribute(rules_attribute("egress", "Egress"))
            .attribute(tags_attribute())
            .attribute(create_time_attribute("create_time"))
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
        if let Err(diag) = self.create_acl(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_acl(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "network acl not found, removing from state");
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
            .update_acl(client, &request.prior_state, &request.planned_state, &mut state)
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

        let result = match state_id(&request.prior_state) {
            Ok(id) => client
                .network_acls()
                .delete(&id)
                .await
                .map_err(api_error("Failed to delete network ACL")),
            Err(diag) => Err(diag),
        };
        if let Err(diag) = result {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

impl VpcAclResource {
    async fn create_acl(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let entries = entry_set(planned)?;
        let acl = client
            .network_acls()
            .create(
                &required_string(planned, "vpc_id")?,
                &required_string(planned, "name")?,
                &tags_from_map(&planned.get_string_map(&path("tags"))),
            )
            .await
            .map_err(api_error("Failed to create network ACL"))?;
        let id = acl.network_acl_id;
        let _ = state.set_string(&path("id"), id.clone());

        if !entries.ingress.is_empty() || !entries.egress.is_empty() {
            client
                .network_acls()
                .replace_entries(&id, &entries)
                .await
                .map_err(api_error("Failed to set network ACL rules"))?;
        }

        if !self.read_acl(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read network ACL",
                format!("Network ACL [{}] not found after create", id),
            ));
        }
        Ok(())
    }

    async fn read_acl(&self, client: &Client, id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(acl) = client
            .network_acls()
            .describe_by_id(id)
            .await
            .map_err(api_error("Failed to read network ACL"))?
        else {
            return Ok(false);
        };

        set_acl_state(state, acl);
        Ok(true)
    }

    async fn update_acl(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let id = state_id(prior)?;

        if changed(prior, planned, "name") {
            client
                .network_acls()
                .modify_name(&id, &required_string(planned, "name")?)
                .await
                .map_err(api_error("Failed to update network ACL"))?;
        }

        if changed(prior, planned, "ingress") || changed(prior, planned, "egress") {
            client
                .network_acls()
                .replace_entries(&id, &entry_set(planned)?)
                .await
                .map_err(api_error("Failed to update network ACL rules"))?;
        }

        update_tags(client, "acl", &id, prior, planned).await?;

        if !self.read_acl(client, &id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read network ACL",
                format!("Network ACL [{}] not found after update", id),
            ));
        }
        Ok(())
    }
}

fn set_acl_state(state: &mut DynamicValue, acl: NetworkAclInfo) {
    let _ = state.set_string(&path("id"), acl.network_acl_id);
    let _ = state.set_string(&path("vpc_id"), acl.vpc_id);
    let _ = state.set_string(&path("name"), acl.network_acl_name);
    let _ = state.set_string(&path("create_time"), acl.created_time);
    set_optional_list(state, "ingress", rule_strings(&acl.ingress_entries));
    set_optional_list(state, "egress", rule_strings(&acl.egress_entries));
    set_tags(state, tags_to_map(&acl.tag_set));
}

#[async_trait]
impl ResourceWithImportState for VpcAclResource {
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
impl ResourceWithConfigure for VpcAclResource {
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
    fn planned_rules_become_entries() {
        let mut planned = DynamicValue::empty_object();
        planned
            .set_string_list(
                &path("ingress"),
                vec![
                    "ACCEPT#192.168.1.0/24#800#TCP".to_string(),
                    "ACCEPT#192.168.1.0/24#ALL#ICMP".to_string(),
                ],
            )
            .unwrap();

        let set = entry_set(&planned).unwrap();
        assert_eq!(set.ingress.len(), 2);
        assert_eq!(set.ingress[0].port, "800");
        assert_eq!(set.ingress[1].port, "");
        assert!(set.egress.is_empty());
        assert_eq!(
            rule_strings(&set.ingress),
            vec!["ACCEPT#192.168.1.0/24#800#TCP", "ACCEPT#192.168.1.0/24#ALL#ICMP"]
        );
    }

    #[test]
    fn bad_rule_names_the_attribute() {
        let mut planned = DynamicValue::empty_object();
        planned
            .set_string_list(&path("egress"), vec!["ACCEPT#0.0.0.0/0#ALL".to_string()])
            .unwrap();

        let diag = entry_set(&planned).unwrap_err();
        assert_eq!(diag.summary, "Invalid acl rule");
        assert!(diag.detail.contains("ACCEPT#0.0.0.0/0#ALL"));
    }
}
