//! Network ACL quintuple entries resource implementation

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Block, NestedBlock, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

use super::common::{
    api_error, extract_provider_data, id_attribute, path, require_client, required_string,
    state_id, Outcome,
};
use crate::api::network_acl::{NetworkAclQuintupleEntry, NetworkAclQuintupleSet};
use crate::api::Client;

const SET: &str = "network_acl_quintuple_set";

const STRING_FIELDS: &[(&str, &str)] = &[
    ("protocol", "Protocol, value range: `TCP`, `UDP`, `ICMP`, `ALL`."),
    ("description", "Description."),
    ("source_port", "Source port (all, single port, range). When the protocol is ALL or ICMP, the port cannot be specified."),
    ("source_cidr", "Source CIDR."),
    ("destination_port", "Destination port (all, single port, range). When the protocol is ALL or ICMP, the port cannot be specified."),
    ("destination_cidr", "Destination CIDR."),
];

fn direction_path(direction: &str) -> AttributePath {
    path(SET).attribute(direction)
}

fn entry_block() -> Block {
    let mut builder = SchemaBuilder::new();
    for (name, description) in STRING_FIELDS {
        builder = builder.attribute(
            AttributeBuilder::new(name, AttributeType::String)
                .description(*description)
                .optional()
                .build(),
        );
    }
    builder
        .attribute(
            AttributeBuilder::new("action", AttributeType::String)
                .description("Action, `ACCEPT` or `DROP`.")
                .optional()
                .validator(StringOneOfValidator::create(&["ACCEPT", "DROP"]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("priority", AttributeType::Number)
                .description("Priority, starting from 1.")
                .optional()
                .computed()
                .plan_modifier(Box::new(UseStateForUnknown))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("network_acl_quintuple_entry_id", AttributeType::String)
                .description("Unique ID of a network ACL entry.")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("create_time", AttributeType::String)
                .description("Creation time.")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("network_acl_direction", AttributeType::String)
                .description("Direction, `INGRESS` or `EGRESS`.")
                .computed()
                .build(),
        )
        .build_block()
}

fn text(item: &HashMap<String, Dynamic>, name: &str) -> String {
    item.get(name)
        .and_then(Dynamic::as_str)
        .unwrap_or_default()
        .to_string()
}

fn entries_of(value: &DynamicValue, direction: &str) -> Vec<NetworkAclQuintupleEntry> {
    value
        .get_object_list(&direction_path(direction))
        .iter()
        .map(|item| NetworkAclQuintupleEntry {
            protocol: text(item, "protocol"),
            description: text(item, "description"),
            source_port: text(item, "source_port"),
            source_cidr: text(item, "source_cidr"),
            destination_port: text(item, "destination_port"),
            destination_cidr: text(item, "destination_cidr"),
            action: text(item, "action"),
            network_acl_quintuple_entry_id: text(item, "network_acl_quintuple_entry_id"),
            priority: item.get("priority").and_then(Dynamic::as_i64),
            create_time: text(item, "create_time"),
            network_acl_direction: text(item, "network_acl_direction"),
        })
        .collect()
}

fn set_of(value: &DynamicValue) -> NetworkAclQuintupleSet {
    NetworkAclQuintupleSet {
        ingress: entries_of(value, "ingress"),
        egress: entries_of(value, "egress"),
    }
}

fn optional_text(value: &str) -> Dynamic {
    if value.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::from(value)
    }
}

fn entry_object(entry: &NetworkAclQuintupleEntry) -> Dynamic {
    Dynamic::Map(HashMap::from([
        ("protocol".to_string(), optional_text(&entry.protocol)),
        ("description".to_string(), optional_text(&entry.description)),
        ("source_port".to_string(), optional_text(&entry.source_port)),
        ("source_cidr".to_string(), optional_text(&entry.source_cidr)),
        ("destination_port".to_string(), optional_text(&entry.destination_port)),
        ("destination_cidr".to_string(), optional_text(&entry.destination_cidr)),
        ("action".to_string(), optional_text(&entry.action)),
        (
            "priority".to_string(),
            entry.priority.map(Dynamic::from).unwrap_or(Dynamic::Null),
        ),
        (
            "network_acl_quintuple_entry_id".to_string(),
            Dynamic::from(entry.network_acl_quintuple_entry_id.as_str()),
        ),
        ("create_time".to_string(), Dynamic::from(entry.create_time.as_str())),
        (
            "network_acl_direction".to_string(),
            Dynamic::from(entry.network_acl_direction.as_str()),
        ),
    ]))
}

/// Changes needed to turn the prior entries of one direction into the
/// planned ones. Entries are matched by position: a planned entry takes the
/// id of the prior entry at the same index and is modified in place.
#[derive(Debug, Default, PartialEq)]
struct DirectionChange {
    modify: Vec<NetworkAclQuintupleEntry>,
    create: Vec<NetworkAclQuintupleEntry>,
    delete: Vec<NetworkAclQuintupleEntry>,
}

fn plan_direction(
    prior: &[NetworkAclQuintupleEntry],
    planned: &[NetworkAclQuintupleEntry],
) -> DirectionChange {
    let mut change = DirectionChange::default();

    for (idx, entry) in planned.iter().enumerate() {
        let mut entry = entry.clone();
        match prior.get(idx) {
            Some(old) if !old.network_acl_quintuple_entry_id.is_empty() => {
                entry.network_acl_quintuple_entry_id = old.network_acl_quintuple_entry_id.clone();
                if !same_rule(old, &entry) {
                    change.modify.push(entry);
                }
            }
            _ => {
                entry.network_acl_quintuple_entry_id.clear();
                change.create.push(entry);
            }
        }
    }
    change.delete = prior.iter().skip(planned.len()).cloned().collect();

    change
}

fn same_rule(a: &NetworkAclQuintupleEntry, b: &NetworkAclQuintupleEntry) -> bool {
    a.protocol == b.protocol
        && a.description == b.description
        && a.source_port == b.source_port
        && a.source_cidr == b.source_cidr
        && a.destination_port == b.destination_port
        && a.destination_cidr == b.destination_cidr
        && a.action == b.action
        && (b.priority.is_none() || a.priority == b.priority)
}

#[derive(Default)]
pub struct VpcNetworkAclQuintupleResource {
    provider_data: Option<crate::TencentCloudProviderData>,
}

impl VpcNetworkAclQuintupleResource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resource for VpcNetworkAclQuintupleResource {
    fn type_name(&self) -> &str {
        "tencentcloud_vpc_network_acl_quintuple"
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let set_block = SchemaBuilder::new()
            .block(NestedBlock::list("ingress", entry_block()))
            .block(NestedBlock::list("egress", entry_block()))
            .build_block();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Provides a resource to manage the quintuple entries of a network ACL.")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("network_acl_id", AttributeType::String)
                    .description("Network ACL instance ID. The form is `acl-12345678`.")
                    .required()
                    .force_new()
                    .build(),
            )
            .block(NestedBlock::single(SET, set_block))
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
        if let Err(diag) = self.create_entries(client, &request.planned_state, &mut state).await {
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
            Ok(id) => self.read_entries(client, &id, &mut state).await,
            Err(diag) => Err(diag),
        };

        let new_state = match result {
            Ok(true) => Some(state),
            Ok(false) => {
                tracing::warn!(log_id = %ctx.log_id(), "network acl not found, removing quintuple entries from state");
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
            .update_entries(client, &request.prior_state, &request.planned_state, &mut state)
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
            let acl_id = state_id(&request.prior_state)?;
            let acls = client.network_acls();
            let Some(current) = acls
                .describe_entries(&acl_id)
                .await
                .map_err(api_error("Failed to read network ACL quintuple entries"))?
            else {
                return Ok(());
            };
            acls.delete_entries(&acl_id, &current)
                .await
                .map_err(api_error("Failed to delete network ACL quintuple entries"))
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

impl VpcNetworkAclQuintupleResource {
    async fn create_entries(
        &self,
        client: &Client,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let acl_id = required_string(planned, "network_acl_id")?;
        let mut set = set_of(planned);
        for entry in set.ingress.iter_mut().chain(set.egress.iter_mut()) {
            entry.network_acl_quintuple_entry_id.clear();
        }

        client
            .network_acls()
            .create_entries(&acl_id, &set)
            .await
            .map_err(api_error("Failed to create network ACL quintuple entries"))?;
        let _ = state.set_string(&path("id"), acl_id.clone());

        if !self.read_entries(client, &acl_id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read network ACL quintuple entries",
                format!("network ACL [{}] not found after create", acl_id),
            ));
        }
        Ok(())
    }

    async fn read_entries(&self, client: &Client, acl_id: &str, state: &mut DynamicValue) -> Outcome<bool> {
        let Some(set) = client
            .network_acls()
            .describe_entries(acl_id)
            .await
            .map_err(api_error("Failed to read network ACL quintuple entries"))?
        else {
            return Ok(false);
        };

        let _ = state.set_string(&path("id"), acl_id.to_string());
        let _ = state.set_string(&path("network_acl_id"), acl_id.to_string());
        let _ = state.set_map(
            &path(SET),
            HashMap::from([
                (
                    "ingress".to_string(),
                    Dynamic::List(set.ingress.iter().map(entry_object).collect()),
                ),
                (
                    "egress".to_string(),
                    Dynamic::List(set.egress.iter().map(entry_object).collect()),
                ),
            ]),
        );

        Ok(true)
    }

    async fn update_entries(
        &self,
        client: &Client,
        prior: &DynamicValue,
        planned: &DynamicValue,
        state: &mut DynamicValue,
    ) -> Outcome<()> {
        let acl_id = state_id(prior)?;
        let acls = client.network_acls();

        let ingress = plan_direction(&entries_of(prior, "ingress"), &entries_of(planned, "ingress"));
        let egress = plan_direction(&entries_of(prior, "egress"), &entries_of(planned, "egress"));

        let delete = NetworkAclQuintupleSet {
            ingress: ingress.delete,
            egress: egress.delete,
        };
        acls.delete_entries(&acl_id, &delete)
            .await
            .map_err(api_error("Failed to delete network ACL quintuple entries"))?;

        let modify = NetworkAclQuintupleSet {
            ingress: ingress.modify,
            egress: egress.modify,
        };
        if !modify.is_empty() {
            acls.modify_entries(&acl_id, &modify)
                .await
                .map_err(api_error("Failed to modify network ACL quintuple entries"))?;
        }

        let create = NetworkAclQuintupleSet {
            ingress: ingress.create,
            egress: egress.create,
        };
        if !create.is_empty() {
            acls.create_entries(&acl_id, &create)
                .await
                .map_err(api_error("Failed to create network ACL quintuple entries"))?;
        }

        if !self.read_entries(client, &acl_id, state).await? {
            return Err(Diagnostic::error(
                "Failed to read network ACL quintuple entries",
                format!("network ACL [{}] not found after update", acl_id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceWithImportState for VpcNetworkAclQuintupleResource {
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
impl ResourceWithConfigure for VpcNetworkAclQuintupleResource {
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

    fn entry(id: &str, port: &str) -> NetworkAclQuintupleEntry {
        NetworkAclQuintupleEntry {
            protocol: "TCP".to_string(),
            destination_port: port.to_string(),
            destination_cidr: "10.0.0.0/16".to_string(),
            action: "ACCEPT".to_string(),
            network_acl_quintuple_entry_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn positional_plan_modifies_creates_and_deletes() {
        let prior = vec![entry("e-1", "80"), entry("e-2", "443"), entry("e-3", "22")];
        let planned = vec![entry("", "80"), entry("", "8443")];

        let change = plan_direction(&prior, &planned);
        assert_eq!(change.modify, vec![entry("e-2", "8443")]);
        assert!(change.create.is_empty());
        assert_eq!(change.delete, vec![entry("e-3", "22")]);

        let grown = vec![entry("", "80"), entry("", "443"), entry("", "22"), entry("", "3389")];
        let change = plan_direction(&prior, &grown);
        assert!(change.modify.is_empty());
        assert_eq!(change.create, vec![entry("", "3389")]);
        assert!(change.delete.is_empty());
    }

    #[test]
    fn state_entries_read_back_by_direction() {
        let mut state = DynamicValue::empty_object();
        state
            .set_map(
                &path(SET),
                HashMap::from([
                    ("ingress".to_string(), Dynamic::List(vec![entry_object(&entry("e-1", "80"))])),
                    ("egress".to_string(), Dynamic::List(vec![])),
                ]),
            )
            .unwrap();

        let set = set_of(&state);
        assert_eq!(set.ingress, vec![entry("e-1", "80")]);
        assert!(set.egress.is_empty());
        assert!(state
            .get(&direction_path("ingress").index(0).attribute("source_cidr"))
            .is_null());
    }
}
